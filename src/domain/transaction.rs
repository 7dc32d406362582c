//! Transaction status state machine.
//!
//! `INITIATED -> PROCESSING -> {SUCCESS, FAILED, HASH_MISMATCH}`, where
//! PROCESSING is transient and may be skipped. Terminal statuses are never
//! silently reverted; a conflicting terminal rewrite is last-write-wins and
//! the caller is expected to log it loudly.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxnStatus {
    Initiated,
    Processing,
    Success,
    Failed,
    HashMismatch,
}

#[derive(Debug, Error)]
#[error("unrecognized transaction status: {0}")]
pub struct ParseStatusError(String);

impl TxnStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxnStatus::Initiated => "INITIATED",
            TxnStatus::Processing => "PROCESSING",
            TxnStatus::Success => "SUCCESS",
            TxnStatus::Failed => "FAILED",
            TxnStatus::HashMismatch => "HASH_MISMATCH",
        }
    }

    /// Terminal statuses accept metadata updates but no silent reversal.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TxnStatus::Success | TxnStatus::Failed | TxnStatus::HashMismatch
        )
    }

    /// Statuses the reconciliation sweep is allowed to force-fail.
    pub fn is_sweepable(&self) -> bool {
        matches!(self, TxnStatus::Initiated | TxnStatus::Processing)
    }

    /// Maps the gateway's free-form status word onto our state machine.
    /// Anything unrecognized is treated as a failure rather than left
    /// dangling in a non-terminal state.
    pub fn from_gateway(raw: &str) -> TxnStatus {
        match raw.trim().to_ascii_lowercase().as_str() {
            "success" | "successful" | "captured" => TxnStatus::Success,
            "pending" | "in progress" | "initiated" => TxnStatus::Processing,
            _ => TxnStatus::Failed,
        }
    }
}

impl fmt::Display for TxnStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TxnStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INITIATED" => Ok(TxnStatus::Initiated),
            "PROCESSING" => Ok(TxnStatus::Processing),
            "SUCCESS" => Ok(TxnStatus::Success),
            "FAILED" => Ok(TxnStatus::Failed),
            "HASH_MISMATCH" => Ok(TxnStatus::HashMismatch),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

impl TryFrom<String> for TxnStatus {
    type Error = ParseStatusError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
