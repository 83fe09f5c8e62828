//! Error types for signature parsing and version checks.

use thiserror::Error;

use crate::ctype::CType;

/// Why a binding signature was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("signature is empty")]
    Empty,

    #[error("expected an identifier at position {position}")]
    InvalidIdentifier { position: usize },

    #[error("expected '(' after the name at position {position}")]
    MissingOpenParen { position: usize },

    #[error("argument list is not terminated by ')'")]
    UnterminatedArgs,

    #[error("unknown type tag '{tag}' at position {position}")]
    UnknownTag { tag: char, position: usize },

    #[error("void is only valid as a return type (argument {index})")]
    VoidArgument { index: usize },

    #[error("missing return type tag")]
    MissingReturn,

    #[error("unexpected trailing input at position {position}")]
    TrailingInput { position: usize },
}

impl SignatureError {
    /// Error for a void argument in an explicit descriptor.
    pub fn void_argument(args: &[CType]) -> Option<Self> {
        args.iter()
            .position(|t| t.is_void())
            .map(|index| SignatureError::VoidArgument { index })
    }
}

/// Errors raised by the version compatibility check.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    #[error("invalid version component limit {limit}, expected 1..=3")]
    InvalidLimit { limit: usize },

    #[error(
        "installed native library version {runtime} and application version {application} are incompatible"
    )]
    Mismatch {
        runtime: String,
        application: String,
    },
}
