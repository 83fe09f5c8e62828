//! Error types for the binder.

use netpcap_core::{CType, SignatureError};
use thiserror::Error;

/// Errors produced while binding or invoking foreign functions.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ForeignError {
    /// Malformed signature or descriptor. Raised at bind time.
    #[error("invalid foreign signature '{signature}': {source}")]
    InvalidSignature {
        signature: String,
        #[source]
        source: SignatureError,
    },

    /// The native symbol is not exported by any searched library.
    #[error("native C symbol \"{symbol}\" not found")]
    SymbolNotFound { symbol: String },

    /// No upcall method with this name is registered on the holder.
    #[error("upcall method '{method}' not found in '{holder}'")]
    UpcallTargetNotFound { holder: String, method: String },

    /// The upcall target is private and accessibility override is disabled.
    #[error("upcall method '{holder}::{method}' is not accessible")]
    AccessDenied { holder: String, method: String },

    /// Several overloads share the name and none or many match the request.
    #[error("ambiguous upcall target '{holder}::{method}{descriptor}' ({candidates} candidates)")]
    AmbiguousUpcallTarget {
        holder: String,
        method: String,
        descriptor: String,
        candidates: usize,
    },

    /// The only candidate was registered with a different descriptor.
    #[error("upcall method '{holder}::{method}' is declared as {declared}, requested {requested}")]
    UpcallSignatureMismatch {
        holder: String,
        method: String,
        declared: String,
        requested: String,
    },

    /// Invocation of a downcall whose symbol could not be bound.
    #[error("foreign function '{symbol}' is unavailable")]
    DowncallUnavailable {
        symbol: String,
        #[source]
        cause: Box<ForeignError>,
    },

    /// Address requested from an upcall that could not be bound.
    #[error("upcall '{method}' is unavailable")]
    UpcallUnavailable {
        method: String,
        #[source]
        cause: Box<ForeignError>,
    },

    #[error("'{symbol}' takes {expected} arguments, {found} given")]
    ArgumentCount {
        symbol: String,
        expected: usize,
        found: usize,
    },

    #[error("argument {index} of '{symbol}' must be {expected}, found {found}")]
    ArgumentType {
        symbol: String,
        index: usize,
        expected: CType,
        found: String,
    },

    #[error("'{symbol}' returns {found}, not {expected}")]
    ReturnType {
        symbol: String,
        expected: CType,
        found: CType,
    },

    /// The scope owning an upcall stub has been released.
    #[error("upcall scope '{scope}' has been released")]
    ScopeReleased { scope: String },

    #[error("failed to load native library '{library}': {message}")]
    LibraryLoad { library: String, message: String },

    #[error(transparent)]
    Session(#[from] SessionFault),
}

impl ForeignError {
    pub(crate) fn invalid_signature(signature: impl Into<String>, source: SignatureError) -> Self {
        ForeignError::InvalidSignature {
            signature: signature.into(),
            source,
        }
    }

    /// The resolution failure behind an unavailable binding, if any.
    pub fn cause(&self) -> Option<&ForeignError> {
        match self {
            ForeignError::DowncallUnavailable { cause, .. }
            | ForeignError::UpcallUnavailable { cause, .. } => Some(cause),
            _ => None,
        }
    }
}

/// Faults raised by a binder session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionFault {
    #[error("binder session '{session}' is already closed")]
    AlreadyClosed { session: String },

    #[error("missing upcall methods {methods:?} in '{session}'")]
    MissingUpcalls {
        session: String,
        methods: Vec<String>,
    },

    #[error("missing symbols in '{session}': downcalls {downcalls:?}, upcalls {upcalls:?}")]
    MissingSymbols {
        session: String,
        downcalls: Vec<String>,
        upcalls: Vec<String>,
    },

    /// Raised by a user-supplied policy.
    #[error("missing-symbol policy for '{session}' failed: {message}")]
    Policy { session: String, message: String },
}
