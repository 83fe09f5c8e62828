//! Foreign binding for the netpcap native library.
//!
//! This crate turns compact signatures into callable native functions and
//! Rust callbacks into native function pointers:
//! - [`DowncallBinder`] resolves symbols and builds [`ForeignDowncall`]s
//! - [`UpcallBinder`] installs [`ForeignUpcall`] stubs for methods registered
//!   on an [`UpcallClass`], owned by an [`UpcallScope`]
//! - [`BinderSession`] batches the failures of one initialization pass and
//!   reports them to a [`MissingSymbolsPolicy`] when it closes

// Error types
mod error;
pub use error::{ForeignError, SessionFault};

// Symbol sources
mod symbols;
pub use symbols::{ProcessSymbols, SymbolLookup, SymbolTable};

mod library;
pub use library::NativeLibrary;

// Call interfaces
mod call;

mod downcall;
pub use downcall::{DowncallBinder, ForeignDowncall};

pub mod upcall;
pub use upcall::{
    ForeignUpcall, UpcallBinder, UpcallClass, UpcallClassBuilder, UpcallFn, UpcallMethod,
    UpcallScope, Visibility,
};

// Sessions
mod policy;
pub use policy::{IgnoreMissing, MissingSymbolsPolicy, RequireAll, RequireUpcalls};

mod options;
pub use options::{LIBRARIES_ENV, SessionOptions};

mod session;
pub use session::BinderSession;

// Re-export core types for convenience
pub use netpcap_core::{CType, CValue, CallDescriptor, NativeAddress, Signature};
