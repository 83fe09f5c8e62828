//! Dynamic binding layer for the native packet-capture library.
//!
//! Native entry points are described by compact signatures such as
//! `"pcap_setfilter(AA)I"` and bound at runtime; Rust callbacks are exposed
//! to native code as function pointers. See [`netpcap_foreign`] for the
//! binders and sessions and [`netpcap_core`] for the type table and
//! signature grammar.

pub use netpcap_core;
pub use netpcap_foreign;

mod error;
pub use error::PcapError;

pub mod runtime;
pub use runtime::PcapRuntime;

pub mod prelude {
    pub use crate::error::PcapError;
    pub use crate::runtime::PcapRuntime;
    pub use netpcap_core::{
        CType, CValue, CallDescriptor, NativeAddress, NetIp4Address, Signature, SignatureError,
        TimestampPrecision, VersionError,
    };
    pub use netpcap_foreign::{
        BinderSession, DowncallBinder, ForeignDowncall, ForeignError, ForeignUpcall,
        IgnoreMissing, MissingSymbolsPolicy, RequireAll, RequireUpcalls, SessionFault,
        SessionOptions, UpcallBinder, UpcallClass, UpcallScope,
    };
}
