//! Common types shared by the CinePrompt crates

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::{Credential, Secret};
