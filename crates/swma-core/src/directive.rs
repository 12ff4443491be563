//! Declarative change directives

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One declared change to a single attribute
///
/// In configuration files a percentage is written as a string ending in `%`
/// (`"+30%"`, `"-10%"`), an absolute value as a plain number.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawDirective", into = "RawDirective")]
pub enum Directive {
    /// Signed percentage relative to the baseline value
    Percent(f64),
    /// Replacement value
    Absolute(f64),
}

impl Directive {
    pub fn is_percent(&self) -> bool {
        matches!(self, Directive::Percent(_))
    }
}

impl FromStr for Directive {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if let Some(number) = trimmed.strip_suffix('%') {
            let value: f64 = number
                .trim()
                .parse()
                .map_err(|_| Error::invalid_directive(s, "percentage is not a number"))?;
            return Ok(Directive::Percent(value));
        }
        trimmed
            .parse()
            .map(Directive::Absolute)
            .map_err(|_| Error::invalid_directive(s, "expected a number or a percentage like +30%"))
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Directive::Percent(p) => write!(f, "{:+}%", p),
            Directive::Absolute(v) => write!(f, "{}", v),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawDirective {
    Number(f64),
    Text(String),
}

impl TryFrom<RawDirective> for Directive {
    type Error = Error;

    fn try_from(raw: RawDirective) -> Result<Self> {
        match raw {
            RawDirective::Number(v) => Ok(Directive::Absolute(v)),
            RawDirective::Text(s) => s.parse(),
        }
    }
}

impl From<Directive> for RawDirective {
    fn from(directive: Directive) -> Self {
        match directive {
            Directive::Percent(_) => RawDirective::Text(directive.to_string()),
            Directive::Absolute(v) => RawDirective::Number(v),
        }
    }
}
