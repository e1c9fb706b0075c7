// ABOUTME: Validated owner key (conversation or session id) for sandboxes.
// ABOUTME: Derives the engine-safe name fragment used in container names.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Characters of the owner key that make it into engine resource names.
const SLUG_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum OwnerKeyError {
    #[error("owner key cannot be empty")]
    Empty,

    #[error("invalid character in owner key: {0:?}")]
    InvalidChar(char),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct OwnerKey(String);

impl OwnerKey {
    pub fn new(value: &str) -> Result<Self, OwnerKeyError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(OwnerKeyError::Empty);
        }

        if let Some(c) = trimmed.chars().find(|c| c.is_control() || c.is_whitespace()) {
            return Err(OwnerKeyError::InvalidChar(c));
        }

        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Prefix of the key usable in engine names: `[A-Za-z0-9_.-]` only.
    pub fn slug(&self) -> String {
        self.0
            .chars()
            .take(SLUG_LEN)
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-' {
                    c
                } else {
                    '-'
                }
            })
            .collect()
    }
}

impl fmt::Display for OwnerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
