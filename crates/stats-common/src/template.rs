//! Output filename templates.
//!
//! Templates carry substitution tokens resolved once per task: `{x}` and
//! `{y}` (tile index), `{name}` (output product name), `{epoch_start}` and
//! `{epoch_end}` (epoch bounds, with an optional strftime format after a
//! colon, e.g. `{epoch_start:%Y-%m}`). `{{` and `}}` escape literal braces.

use std::fmt;

use thiserror::Error;

use crate::tile::TileIndex;
use crate::time::DateRange;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Unknown template token '{{{0}}}'")]
    UnknownToken(String),

    #[error("Unclosed template token '{{{0}'")]
    UnclosedToken(String),

    #[error("Unmatched '}}' in template")]
    UnmatchedBrace,

    #[error("Token '{{{0}}}' does not take a format")]
    UnexpectedFormat(String),

    #[error("Invalid date format '{format}' in token '{{{token}}}'")]
    InvalidDateFormat { token: String, format: String },
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    TileX,
    TileY,
    Name,
    /// Epoch bound with optional strftime format; start when `true`.
    Epoch { start: bool, format: Option<String> },
}

/// A parsed filename template.
///
/// Parsing happens once at configuration-validation time so unresolvable
/// tokens fail fast, before any task runs.
#[derive(Debug, Clone, PartialEq)]
pub struct FilePathTemplate {
    raw: String,
    segments: Vec<Segment>,
}

/// Values substituted into a template for one task.
#[derive(Debug, Clone, Copy)]
pub struct TemplateContext<'a> {
    pub tile: TileIndex,
    pub epoch: DateRange,
    pub name: &'a str,
}

// str(date) in the engine's metadata is ISO formatted.
const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

impl FilePathTemplate {
    pub fn parse(raw: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = raw.chars().peekable();

        while let Some(ch) = chars.next() {
            match ch {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '}' => return Err(TemplateError::UnmatchedBrace),
                '{' => {
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    let mut body = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(c) => body.push(c),
                            None => return Err(TemplateError::UnclosedToken(body)),
                        }
                    }
                    segments.push(Self::parse_token(&body)?);
                }
                _ => literal.push(ch),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    fn parse_token(body: &str) -> Result<Segment, TemplateError> {
        let (name, format) = match body.split_once(':') {
            Some((name, fmt)) => (name, Some(fmt.to_string())),
            None => (body, None),
        };
        match name {
            "epoch_start" | "epoch_end" => {
                if let Some(fmt) = &format {
                    Self::check_date_format(name, fmt)?;
                }
                Ok(Segment::Epoch {
                    start: name == "epoch_start",
                    format,
                })
            }
            "x" | "y" | "name" if format.is_some() => {
                Err(TemplateError::UnexpectedFormat(name.to_string()))
            }
            "x" => Ok(Segment::TileX),
            "y" => Ok(Segment::TileY),
            "name" => Ok(Segment::Name),
            other => Err(TemplateError::UnknownToken(other.to_string())),
        }
    }

    /// Reject strftime formats chrono cannot render, so a bad epoch token
    /// fails at validation time instead of corrupting filenames later.
    fn check_date_format(token: &str, fmt: &str) -> Result<(), TemplateError> {
        use chrono::format::{Item, StrftimeItems};

        let invalid = StrftimeItems::new(fmt).any(|item| matches!(item, Item::Error));
        if invalid {
            return Err(TemplateError::InvalidDateFormat {
                token: token.to_string(),
                format: fmt.to_string(),
            });
        }
        Ok(())
    }

    /// The template text as written in the configuration.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Substitute all tokens for one task.
    pub fn format(&self, ctx: &TemplateContext<'_>) -> String {
        use fmt::Write;

        let mut out = String::with_capacity(self.raw.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(s) => out.push_str(s),
                Segment::TileX => {
                    let _ = write!(out, "{}", ctx.tile.x);
                }
                Segment::TileY => {
                    let _ = write!(out, "{}", ctx.tile.y);
                }
                Segment::Name => out.push_str(ctx.name),
                Segment::Epoch { start, format } => {
                    let date = if *start { ctx.epoch.start } else { ctx.epoch.end };
                    let fmt = format.as_deref().unwrap_or(DEFAULT_DATE_FORMAT);
                    let _ = write!(out, "{}", date.format(fmt));
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ctx<'a>(name: &'a str) -> TemplateContext<'a> {
        TemplateContext {
            tile: TileIndex::new(8, -20),
            epoch: DateRange::new(
                NaiveDate::from_ymd_opt(2017, 7, 1).unwrap(),
                NaiveDate::from_ymd_opt(2017, 8, 1).unwrap(),
            ),
            name,
        }
    }

    #[test]
    fn test_wofs_summary_filename() {
        let template =
            FilePathTemplate::parse("WOFS_3577_{x}_{y}_{epoch_start:%Y-%m}__summary.nc").unwrap();
        assert_eq!(
            template.format(&ctx("wofs_summary")),
            "WOFS_3577_8_-20_2017-07__summary.nc"
        );
    }

    #[test]
    fn test_all_tokens() {
        let template =
            FilePathTemplate::parse("{name}/{x}_{y}/{epoch_start}_{epoch_end}.nc").unwrap();
        assert_eq!(
            template.format(&ctx("wofs_summary")),
            "wofs_summary/8_-20/2017-07-01_2017-08-01.nc"
        );
    }

    #[test]
    fn test_escaped_braces() {
        let template = FilePathTemplate::parse("{{x}}_{x}.nc").unwrap();
        assert_eq!(template.format(&ctx("p")), "{x}_8.nc");
    }

    #[test]
    fn test_unknown_token_rejected() {
        let err = FilePathTemplate::parse("{var_name}.nc").unwrap_err();
        assert!(matches!(err, TemplateError::UnknownToken(t) if t == "var_name"));
    }

    #[test]
    fn test_invalid_date_format_rejected_at_parse() {
        let err = FilePathTemplate::parse("WOFS_{x}_{epoch_start:%Q}__summary.nc").unwrap_err();
        assert!(matches!(
            err,
            TemplateError::InvalidDateFormat { ref token, ref format }
                if token == "epoch_start" && format == "%Q"
        ));

        // A valid format still renders the full date.
        let template = FilePathTemplate::parse("WOFS_{x}_{epoch_start:%Y%m%d}.nc").unwrap();
        assert_eq!(template.format(&ctx("p")), "WOFS_8_20170701.nc");
    }

    #[test]
    fn test_malformed_templates_rejected() {
        assert!(matches!(
            FilePathTemplate::parse("{x.nc"),
            Err(TemplateError::UnclosedToken(_))
        ));
        assert!(matches!(
            FilePathTemplate::parse("x}.nc"),
            Err(TemplateError::UnmatchedBrace)
        ));
        assert!(matches!(
            FilePathTemplate::parse("{x:%03d}.nc"),
            Err(TemplateError::UnexpectedFormat(_))
        ));
    }
}
