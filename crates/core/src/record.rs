use std::cmp::Ordering;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{RecordId, Value};

/// One parsed input line. Ordering and equality look at `value` only, so two
/// records with the same value are interchangeable when ranking.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub value: Value,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LineError {
    #[error("expected 2 whitespace-separated tokens, found {found}")]
    WrongTokenCount { found: usize },
    #[error("identifier '{token}' is not an integer")]
    InvalidId { token: String },
    #[error("value '{token}' is not an integer")]
    InvalidValue { token: String },
}

impl Record {
    pub fn new(id: RecordId, value: Value) -> Self {
        Self { id, value }
    }

    /// Parse `"<identifier> <value>"`.
    pub fn parse_line(line: &str) -> Result<Self, LineError> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let (id_token, value_token) = match tokens.as_slice() {
            [id, value] => (*id, *value),
            other => return Err(LineError::WrongTokenCount { found: other.len() }),
        };
        let id = id_token.parse::<RecordId>().map_err(|_| LineError::InvalidId {
            token: id_token.to_string(),
        })?;
        let value = value_token
            .parse::<Value>()
            .map_err(|_| LineError::InvalidValue {
                token: value_token.to_string(),
            })?;
        Ok(Self { id, value })
    }
}

impl FromStr for Record {
    type Err = LineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_line(s)
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for Record {}

impl PartialOrd for Record {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Record {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value.cmp(&other.value)
    }
}
