//! Transaction submission with nonce caching and gas selection

mod engine;
mod gas;
mod nonce;

pub use engine::{SubmissionEngine, SubmissionResult, MAX_RETRIES_EXCEEDED};
pub use gas::GasResolver;
pub use nonce::NonceSequencer;
