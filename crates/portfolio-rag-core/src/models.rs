//! Core data models shared by the retrieval and aggregation paths.

use serde::{Deserialize, Serialize};

/// Label of the holdings dataset, used in document content and attributions.
pub const HOLDINGS_FILE: &str = "holdings.csv";
/// Label of the trades dataset, used in document content and attributions.
pub const TRADES_FILE: &str = "trades.csv";

/// Points back to the table row a document or aggregate was derived from.
///
/// `row_index` is the zero-based position in the source table, not a
/// stable business key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Attribution {
    pub file: String,
    pub row_index: usize,
}

impl Attribution {
    pub fn new(file: impl Into<String>, row_index: usize) -> Self {
        Self {
            file: file.into(),
            row_index,
        }
    }
}

/// Immutable unit indexed for retrieval: one flattened table row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    /// `FILE: <name> | ROW: <n> | col=val | ...`, non-null cells only.
    pub content: String,
    pub attribution: Attribution,
}

/// Speaker of a chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Upper-case label used when rendering history into a prompt.
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Assistant => "ASSISTANT",
        }
    }
}

/// One turn of session history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}
