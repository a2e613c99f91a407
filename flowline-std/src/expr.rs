//! Integer-valued settings that may refer to event variables.
//!
//! A setting is either a literal (`"5"`) or a variable reference
//! (`"#[vars.retries]"`). It is parsed once at configuration time and evaluated
//! against each event.

use flowline_core::{ConfigError, Event, FlowError, Value};
use std::{fmt, str::FromStr};

/// A parsed integer setting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntExpr {
    /// A constant.
    Literal(i64),
    /// The value of an event variable.
    Variable(String),
}

impl IntExpr {
    /// Evaluate against `event`.
    ///
    /// Variables holding integers or integer strings evaluate to that integer.
    pub fn evaluate(&self, event: &Event) -> Result<i64, FlowError> {
        match self {
            Self::Literal(value) => Ok(*value),
            Self::Variable(name) => match event.variable(name) {
                Some(Value::Int(value)) => Ok(*value),
                Some(Value::String(text)) => text.trim().parse().map_err(|_| {
                    FlowError::Expression(format!("variable `{name}` is not an integer: {text:?}"))
                }),
                Some(other) => Err(FlowError::Expression(format!(
                    "variable `{name}` is not an integer: {}",
                    other.kind()
                ))),
                None => Err(FlowError::Expression(format!("variable `{name}` is not defined"))),
            },
        }
    }
}

impl FromStr for IntExpr {
    type Err = ConfigError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let text = text.trim();
        if let Some(inner) = text.strip_prefix("#[").and_then(|rest| rest.strip_suffix(']')) {
            let name = inner
                .trim()
                .strip_prefix("vars.")
                .map(str::trim)
                .filter(|name| !name.is_empty() && !name.contains(char::is_whitespace))
                .ok_or_else(|| {
                    ConfigError::invalid("expression", format!("unsupported expression `{text}`"))
                })?;
            return Ok(Self::Variable(name.to_owned()));
        }
        text.parse()
            .map(Self::Literal)
            .map_err(|_| ConfigError::invalid("expression", format!("not an integer: `{text}`")))
    }
}

impl fmt::Display for IntExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => write!(f, "{value}"),
            Self::Variable(name) => write!(f, "#[vars.{name}]"),
        }
    }
}
