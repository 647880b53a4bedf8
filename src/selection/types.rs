//! Validated selection values and loop outcomes.

use serde::Deserialize;
use serde_json::{Map, Value};
use std::error::Error as StdError;
use std::fmt;

/// A validated tool selection, ready to invoke.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolSelection {
    pub server_name: String,
    pub tool_name: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
    #[serde(default)]
    pub reasoning: Option<String>,
}

/// A validated resource selection, ready to read.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSelection {
    pub server_name: String,
    pub uri: String,
    #[serde(default)]
    pub reasoning: Option<String>,
}

/// Validator verdict on one tool-selection payload. The escape field is a
/// distinct arm rather than an optional flag on the selection.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolChoice {
    Tool(ToolSelection),
    NoneAvailable { reasoning: Option<String> },
}

/// Validator verdict on one resource-selection payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceChoice {
    Resource(ResourceSelection),
    NoneAvailable { reasoning: Option<String> },
}

/// Terminal result of the bounded selection loop. `Abandoned` is an ordinary
/// value meaning "no selection", not a failure.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionOutcome<T> {
    Selected(T),
    NoneAvailable {
        reasoning: Option<String>,
    },
    Abandoned {
        attempts: u32,
        last_errors: Vec<String>,
    },
}

/// Why one attempt was rejected. Drives feedback generation and never
/// escapes the loop directly.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionError {
    /// No JSON object could be extracted from the response text.
    MalformedResponse(String),
    /// The payload parsed but violated the selection schema; one entry per
    /// violation.
    SchemaValidation(Vec<String>),
    /// The backend call itself failed.
    Backend(String),
}

impl fmt::Display for SelectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionError::MalformedResponse(preview) => {
                write!(f, "Response did not contain a parsable JSON object: {}", preview)
            }
            SelectionError::SchemaValidation(errors) => {
                write!(f, "Selection failed validation: {}", errors.join("; "))
            }
            SelectionError::Backend(message) => {
                write!(f, "Selection backend call failed: {}", message)
            }
        }
    }
}

impl StdError for SelectionError {}
