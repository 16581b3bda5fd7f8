//! Error types for the swap submitter

use std::time::Duration;
use thiserror::Error;

/// Errors raised while constructing the submitter or loading its inputs.
///
/// Anything that happens during a submission is folded into a
/// [`crate::SubmissionResult`] instead; these never reach `submit` callers.
#[derive(Error, Debug)]
pub enum SubmitterError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Wallet error: {0}")]
    Wallet(String),

    #[error("Invalid amount {value:?}: {message}")]
    InvalidAmount { value: String, message: String },
}

/// Result type for submitter operations
pub type SubmitterResult<T> = Result<T, SubmitterError>;

/// Closed set of failure categories reported by the remote ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerErrorKind {
    /// Wallet cannot cover value + gas.
    InsufficientFunds,
    /// Signing credential missing or rejected by the node.
    MissingCredential,
    /// The nonce was already consumed on-chain.
    NonceTooLow,
    /// Any other sequencing conflict (gaps, replacement, "invalid nonce").
    NonceConflict,
    /// Remote call exceeded its deadline.
    Timeout,
    /// Transport failure: connection refused, reset, HTTP 5xx.
    Unavailable,
    /// Node rejected the transaction for an unclassified reason.
    Rejected,
}

impl LedgerErrorKind {
    /// Kinds that cannot resolve themselves within a retry window.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LedgerErrorKind::InsufficientFunds | LedgerErrorKind::MissingCredential
        )
    }

    /// Kinds that mean the cached nonce can no longer be trusted.
    pub fn is_sequencing(&self) -> bool {
        matches!(
            self,
            LedgerErrorKind::NonceTooLow | LedgerErrorKind::NonceConflict
        )
    }
}

/// A failed call against the remote ledger.
///
/// Displays as the original message so it can be surfaced to the caller
/// verbatim.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct LedgerError {
    kind: LedgerErrorKind,
    message: String,
}

impl LedgerError {
    pub fn new(kind: LedgerErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Classify an opaque node or transport message.
    ///
    /// Terminal categories are checked before the generic nonce match, so
    /// "nonce too low" never lands in [`LedgerErrorKind::NonceConflict`].
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();

        let kind = if lower.contains("insufficient funds") {
            LedgerErrorKind::InsufficientFunds
        } else if message.contains("PRIVATE_KEY") || lower.contains("private key") {
            LedgerErrorKind::MissingCredential
        } else if lower.contains("nonce too low") {
            LedgerErrorKind::NonceTooLow
        } else if lower.contains("nonce") {
            LedgerErrorKind::NonceConflict
        } else if lower.contains("timed out") || lower.contains("timeout") {
            LedgerErrorKind::Timeout
        } else if lower.contains("connection")
            || lower.contains("unavailable")
            || lower.contains("502")
            || lower.contains("503")
        {
            LedgerErrorKind::Unavailable
        } else {
            LedgerErrorKind::Rejected
        };

        Self { kind, message }
    }

    /// Deadline exceeded for a named remote operation
    pub fn timeout(operation: &str, limit: Duration) -> Self {
        Self::new(
            LedgerErrorKind::Timeout,
            format!("{} timed out after {}ms", operation, limit.as_millis()),
        )
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(LedgerErrorKind::Unavailable, message)
    }

    pub fn kind(&self) -> LedgerErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Result type for ledger calls
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Why a single submission attempt did not produce a transaction hash.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AttemptError {
    #[error("{0}")]
    Nonce(LedgerError),

    #[error("signing failed")]
    Signing,

    #[error("{0}")]
    Broadcast(LedgerError),
}

/// What the retry loop does after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Stop and report the error.
    Terminal,
    /// Drop the cached nonce, then retry if budget remains.
    InvalidateAndRetry,
    /// Retry if budget remains.
    Retry,
}

impl AttemptError {
    /// Decide the follow-up for a failure on the given 1-based attempt.
    ///
    /// "nonce too low" on the first attempt means something outside this
    /// process spent the nonce. On later attempts our own earlier broadcast
    /// may have landed, so it is treated as a stale cache.
    pub fn disposition(&self, attempt: u32) -> Disposition {
        match self {
            AttemptError::Signing => Disposition::Terminal,
            AttemptError::Nonce(_) => Disposition::Retry,
            AttemptError::Broadcast(err) => {
                let kind = err.kind();
                if kind.is_terminal() {
                    Disposition::Terminal
                } else if kind == LedgerErrorKind::NonceTooLow && attempt <= 1 {
                    Disposition::Terminal
                } else if kind.is_sequencing() {
                    Disposition::InvalidateAndRetry
                } else {
                    Disposition::Retry
                }
            }
        }
    }

    /// True when the node never accepted a transaction under the attempt's nonce
    pub fn leaves_nonce_unused(&self) -> bool {
        match self {
            AttemptError::Nonce(_) => false,
            AttemptError::Signing => true,
            AttemptError::Broadcast(err) => err.kind().is_terminal(),
        }
    }

    /// Short label used for metrics and logs
    pub fn label(&self) -> &'static str {
        match self {
            AttemptError::Nonce(_) => "nonce",
            AttemptError::Signing => "signing",
            AttemptError::Broadcast(_) => "broadcast",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_categories_win_over_nonce() {
        let err = LedgerError::from_message("nonce too low: next nonce 12, tx nonce 11");
        assert_eq!(err.kind(), LedgerErrorKind::NonceTooLow);

        let err = LedgerError::from_message(
            "insufficient funds for gas * price + value: address 0xabc nonce 4",
        );
        assert_eq!(err.kind(), LedgerErrorKind::InsufficientFunds);

        let err = LedgerError::from_message("Missing PRIVATE_KEY in environment");
        assert_eq!(err.kind(), LedgerErrorKind::MissingCredential);
    }

    #[test]
    fn test_other_messages() {
        assert_eq!(
            LedgerError::from_message("invalid nonce; got 9, expected 7").kind(),
            LedgerErrorKind::NonceConflict
        );
        assert_eq!(
            LedgerError::from_message("error sending request: connection reset").kind(),
            LedgerErrorKind::Unavailable
        );
        assert_eq!(
            LedgerError::from_message("replacement transaction underpriced").kind(),
            LedgerErrorKind::Rejected
        );
    }

    #[test]
    fn test_display_is_original_message() {
        let err = LedgerError::from_message("insufficient funds for transfer");
        assert_eq!(err.to_string(), "insufficient funds for transfer");
        assert_eq!(AttemptError::Signing.to_string(), "signing failed");
    }

    #[test]
    fn test_disposition() {
        let too_low = AttemptError::Broadcast(LedgerError::from_message("nonce too low"));
        assert_eq!(too_low.disposition(1), Disposition::Terminal);
        assert_eq!(too_low.disposition(2), Disposition::InvalidateAndRetry);

        let funds = AttemptError::Broadcast(LedgerError::from_message("insufficient funds"));
        assert_eq!(funds.disposition(2), Disposition::Terminal);

        let gap = AttemptError::Broadcast(LedgerError::from_message("nonce gap detected"));
        assert_eq!(gap.disposition(1), Disposition::InvalidateAndRetry);

        let key = AttemptError::Broadcast(LedgerError::from_message("Missing PRIVATE_KEY"));
        assert_eq!(key.disposition(1), Disposition::Terminal);

        let slow = LedgerError::timeout("broadcast", Duration::from_secs(1));
        assert_eq!(AttemptError::Broadcast(slow).disposition(1), Disposition::Retry);

        let fetch = AttemptError::Nonce(LedgerError::unavailable("all providers failed"));
        assert_eq!(fetch.disposition(1), Disposition::Retry);
        assert_eq!(AttemptError::Signing.disposition(1), Disposition::Terminal);
    }

    #[test]
    fn test_unused_nonce() {
        assert!(AttemptError::Signing.leaves_nonce_unused());
        assert!(AttemptError::Broadcast(LedgerError::from_message("insufficient funds"))
            .leaves_nonce_unused());
        assert!(!AttemptError::Broadcast(LedgerError::from_message("nonce too low"))
            .leaves_nonce_unused());
        assert!(!AttemptError::Broadcast(LedgerError::timeout("broadcast", Duration::ZERO))
            .leaves_nonce_unused());
    }
}
