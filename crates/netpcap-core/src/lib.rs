//! Core types for the netpcap foreign binder.
//!
//! This crate holds everything that does not touch the native loader:
//! - The C type table ([`CType`], [`ValueLayout`], [`ManagedType`])
//! - Managed values and opaque addresses ([`CValue`], [`NativeAddress`])
//! - Call descriptors and the compact signature grammar
//! - Small utilities shared with the capture API: timestamp precision,
//!   IPv4 address values and version compatibility checks

mod ctype;
pub use ctype::{CType, Encoding, ManagedType, ValueLayout};

mod value;
pub use value::{CValue, NativeAddress};

mod descriptor;
pub use descriptor::CallDescriptor;

mod signature;
pub use signature::Signature;

mod error;
pub use error::{SignatureError, VersionError};

pub mod net;
pub mod tstamp;
pub mod version;

pub use net::NetIp4Address;
pub use tstamp::TimestampPrecision;
