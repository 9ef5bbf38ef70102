//! Error types and result handling.
//!
//! The crate distinguishes two failure families:
//!
//! - **Configuration errors** ([`Error::MissingParameter`], [`Error::ChoiceGroup`],
//!   [`Error::UrlParse`]) are raised while a request is being composed. They are
//!   never retried; the caller must fix the mapping specification or the argument
//!   bag.
//! - **Transport errors** ([`Error::Transport`]) are raised by a single
//!   synchronous execute when the transport reports a non-zero error code. Batch
//!   execution never raises them; each member request records its own error state
//!   and the batch reports an aggregate boolean instead.

use thiserror::Error;

/// Errors produced while composing, executing, or decoding requests.
#[derive(Error, Debug)]
pub enum Error {
    /// A mapping rule flagged with `#` did not resolve to a non-empty value.
    #[error("missing required parameter `{0}`")]
    MissingParameter(String),

    /// No alternative of a choice group resolved to a non-empty value.
    #[error("choice group unsatisfied: none of the alternatives resolved")]
    ChoiceGroup,

    /// A URL string could not be parsed into its components.
    #[error("invalid url: {0}")]
    UrlParse(String),

    /// An encode stage failed to produce a request body.
    #[error("encode failed: {0}")]
    Encode(String),

    /// A decode stage failed to interpret a response body.
    #[error("decode failed: {0}")]
    Decode(String),

    /// The transport reported a failure for a single synchronous execute.
    #[error("transport error {code}: {message}")]
    Transport {
        /// Non-zero transport error code.
        code: i32,
        /// Human-readable message from the transport.
        message: String,
    },

    /// A batch job could not be set up or driven.
    #[error("batch error: {0}")]
    Batch(String),
}

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Decode(err.to_string())
    }
}
