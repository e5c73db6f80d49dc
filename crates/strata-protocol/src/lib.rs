//! Shared data contracts for trait composition.
//! Trait definitions come in from external loaders, composed objects and validation results go
//! out to renderers and CI tooling. Everything here is plain data with serde and JSON Schema
//! derives; the composition logic itself lives in `strata-core`.

mod composed;
mod issue;
mod trait_def;

pub use composed::*;
pub use issue::*;
pub use trait_def::*;

/// Shared error type for contract parsing and validation routines.
#[derive(thiserror::Error, Debug)]
pub enum ProtocolError {
    #[error("invalid trait definition `{name}`: {reason}")]
    InvalidTrait { name: String, reason: String },
    #[error("assertion failed: {0}")]
    AssertionFailed(&'static str),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Lightweight semantic validation on top of schema-compatible deserialization.
pub trait Validate {
    fn validate(&self) -> Result<(), ProtocolError>;
}
