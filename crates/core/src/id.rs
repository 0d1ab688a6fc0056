//! Strongly-typed identifiers used across the domain.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Longest identifier the identity provider is expected to issue.
pub const MAX_STAFF_ID_LEN: usize = 128;

/// Identifier of a staff account.
///
/// Issued by the identity provider and opaque to this service; it doubles as the
/// primary key of the staff record in the document store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StaffId(String);

impl StaffId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for StaffId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for StaffId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for StaffId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(DomainError::invalid_id("StaffId: empty"));
        }
        if s.len() > MAX_STAFF_ID_LEN {
            return Err(DomainError::invalid_id(format!(
                "StaffId: longer than {MAX_STAFF_ID_LEN} bytes"
            )));
        }
        if s.contains('/') {
            return Err(DomainError::invalid_id("StaffId: contains '/'"));
        }
        Ok(Self(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_provider_issued_ids() {
        let id: StaffId = "kX9pQ2LrTz0aVb7cN1mW3yE5uH4j".parse().unwrap();
        assert_eq!(id.as_str(), "kX9pQ2LrTz0aVb7cN1mW3yE5uH4j");
        assert_eq!(id.to_string(), "kX9pQ2LrTz0aVb7cN1mW3yE5uH4j");
    }

    #[test]
    fn rejects_blank_and_path_like_ids() {
        assert!("".parse::<StaffId>().is_err());
        assert!("   ".parse::<StaffId>().is_err());
        assert!("users/abc".parse::<StaffId>().is_err());
        assert!("x".repeat(MAX_STAFF_ID_LEN + 1).parse::<StaffId>().is_err());
    }
}
