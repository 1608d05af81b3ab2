//! API key pool and retry controller
//!
//! Holds an ordered list of API keys with a cursor and drives generation
//! attempts against it. Rotation policy:
//! 1. Caller configures the pool from a comma list (environment) or a newline
//!    list (interactive editing) → cursor resets to 0
//! 2. Controller sends the request with the key at the cursor
//! 3. Quota or credential failure with more than one key → advance the cursor
//!    and try again
//! 4. Any other failure, or a single key → surface the failure immediately
//! 5. After one attempt per key without success → aggregate failure

pub mod error;
pub mod pool;
pub mod retry;

pub use error::{Error, Result};
pub use pool::{Delimiter, KeyPool, PoolSnapshot, SelectedKey, parse_keys};
pub use retry::{AttemptRecord, GenerateReport, RetryController, should_rotate};
