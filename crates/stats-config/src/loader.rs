//! Configuration loading and validation.
//!
//! Reads the YAML document, expands `${VAR}` / `${VAR:-default}` environment
//! references, parses it against the schema and checks every cross-field
//! invariant. All failures surface as a [`ConfigurationError`] before any
//! task planning happens.

use std::collections::HashSet;
use std::path::Path;

use stats_common::{date_sequence, FilePathTemplate};

use crate::error::ConfigurationError;
use crate::schema::{ChunkShape, Dimension, StatsConfig};

/// Load, expand and validate a configuration file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<StatsConfig, ConfigurationError> {
    let content =
        std::fs::read_to_string(path.as_ref()).map_err(|source| ConfigurationError::Read {
            path: path.as_ref().to_path_buf(),
            source,
        })?;
    load_config_str(&content)
}

/// Load, expand and validate a configuration document from memory.
pub fn load_config_str(content: &str) -> Result<StatsConfig, ConfigurationError> {
    let expanded = expand_env_vars(content)?;
    let config: StatsConfig = serde_yaml::from_str(&expanded)?;
    validate(&config)?;
    Ok(config)
}

/// Expand environment variables in the document.
/// Supports `${VAR}` and `${VAR:-default}` syntax.
pub fn expand_env_vars(content: &str) -> Result<String, ConfigurationError> {
    let mut result = String::with_capacity(content.len());
    let mut chars = content.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();

            let mut var_expr = String::new();
            let mut brace_count = 1;
            while brace_count > 0 {
                match chars.next() {
                    Some('{') => {
                        brace_count += 1;
                        var_expr.push('{');
                    }
                    Some('}') => {
                        brace_count -= 1;
                        if brace_count > 0 {
                            var_expr.push('}');
                        }
                    }
                    Some(c) => var_expr.push(c),
                    None => return Err(ConfigurationError::UnclosedSubstitution(var_expr)),
                }
            }

            result.push_str(&resolve_var_expr(&var_expr)?);
        } else {
            result.push(ch);
        }
    }

    Ok(result)
}

fn resolve_var_expr(expr: &str) -> Result<String, ConfigurationError> {
    if let Some((var_name, default)) = expr.split_once(":-") {
        match std::env::var(var_name.trim()) {
            Ok(val) if !val.is_empty() => Ok(val),
            _ => Ok(default.to_string()),
        }
    } else {
        std::env::var(expr.trim())
            .map_err(|_| ConfigurationError::MissingEnvVar(expr.trim().to_string()))
    }
}

/// Check every cross-field invariant of a parsed document.
pub fn validate(config: &StatsConfig) -> Result<(), ConfigurationError> {
    validate_sources(config)?;
    validate_date_ranges(config)?;
    validate_storage(config)?;
    validate_chunking(config)?;
    if let Some(region) = &config.input_region {
        region.mode()?;
    }
    validate_output_products(config)?;
    Ok(())
}

fn validate_sources(config: &StatsConfig) -> Result<(), ConfigurationError> {
    if config.sources.is_empty() {
        return Err(ConfigurationError::NoSources);
    }
    for source in &config.sources {
        if source.measurements.is_empty() {
            return Err(ConfigurationError::NoMeasurements(source.product.clone()));
        }
        if let Some(fuse_func) = &source.fuse_func {
            if !is_dotted_path(fuse_func) {
                return Err(ConfigurationError::InvalidFuseFunc {
                    product: source.product.clone(),
                    fuse_func: fuse_func.clone(),
                });
            }
        }
    }
    Ok(())
}

/// A fusion reference is a non-empty dotted path of identifiers,
/// e.g. `digitalearthau.utils.wofs_fuser`.
fn is_dotted_path(s: &str) -> bool {
    !s.is_empty()
        && s.split('.').all(|part| {
            !part.is_empty()
                && part
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_')
                && !part.chars().next().is_some_and(|c| c.is_ascii_digit())
        })
}

fn validate_date_ranges(config: &StatsConfig) -> Result<(), ConfigurationError> {
    let dr = &config.date_ranges;
    if dr.start_date > dr.end_date {
        return Err(ConfigurationError::InvertedDateRange {
            start: dr.start_date,
            end: dr.end_date,
        });
    }
    let epochs = date_sequence(dr.start_date, dr.end_date, dr.stats_duration, dr.step_size);
    if epochs.is_empty() {
        return Err(ConfigurationError::EmptyDateRange {
            start: dr.start_date,
            end: dr.end_date,
            duration: dr.stats_duration.to_string(),
        });
    }
    Ok(())
}

fn validate_storage(config: &StatsConfig) -> Result<(), ConfigurationError> {
    // GridSpec::new rejects non-positive tile sizes, zero resolutions and
    // tiles that are not a whole number of pixels.
    config.grid()?;

    let order = &config.storage.dimension_order;
    let unique: HashSet<Dimension> = order.iter().copied().collect();
    if order.len() != 3 || unique.len() != 3 {
        return Err(ConfigurationError::InvalidDimensionOrder(
            order.iter().map(|d| format!("{d:?}").to_lowercase()).collect(),
        ));
    }
    Ok(())
}

fn validate_chunking(config: &StatsConfig) -> Result<(), ConfigurationError> {
    check_positive(&config.storage.chunking)?;
    check_positive(&config.computation.chunking)?;

    // The in-memory chunk must cover whole storage chunks so the reduction
    // writes are aligned with the on-disk layout.
    let storage = config.storage.chunking;
    let computation = config.computation.chunking;
    for (dim, c, s) in [
        ("x", computation.x, storage.x),
        ("y", computation.y, storage.y),
    ] {
        if c % s != 0 {
            return Err(ConfigurationError::ChunkMismatch {
                dim,
                computation: c,
                storage: s,
            });
        }
    }
    Ok(())
}

fn check_positive(chunking: &ChunkShape) -> Result<(), ConfigurationError> {
    for (dim, value) in [("x", chunking.x), ("y", chunking.y), ("time", chunking.time)] {
        if value == 0 {
            return Err(ConfigurationError::NonPositiveChunk { dim });
        }
    }
    Ok(())
}

fn validate_output_products(config: &StatsConfig) -> Result<(), ConfigurationError> {
    if config.output_products.is_empty() {
        return Err(ConfigurationError::NoOutputProducts);
    }

    let mut seen = HashSet::new();
    for product in &config.output_products {
        if !seen.insert(product.name.as_str()) {
            return Err(ConfigurationError::DuplicateProduct(product.name.clone()));
        }

        FilePathTemplate::parse(&product.file_path_template).map_err(|err| {
            ConfigurationError::InvalidProduct {
                product: product.name.clone(),
                message: err.to_string(),
            }
        })?;

        let extension = Path::new(&product.file_path_template)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");
        let valid = config.storage.driver.valid_extensions();
        if !valid.contains(&extension) {
            return Err(ConfigurationError::InvalidProduct {
                product: product.name.clone(),
                message: format!(
                    "file_path_template extension '.{extension}' is not valid for the \
                     {:?} driver (expected one of {valid:?})",
                    config.storage.driver
                ),
            });
        }
    }
    Ok(())
}
