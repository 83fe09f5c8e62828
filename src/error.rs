use netpcap_core::VersionError;
use netpcap_foreign::{ForeignError, SessionFault};
use thiserror::Error;

/// Errors surfaced by the capture runtime.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PcapError {
    #[error(transparent)]
    Foreign(#[from] ForeignError),

    #[error(transparent)]
    Session(#[from] SessionFault),

    #[error(transparent)]
    Version(#[from] VersionError),

    /// A native call reported failure with an error buffer.
    #[error("{function} failed ({code}): {message}")]
    Native {
        function: &'static str,
        code: i32,
        message: String,
    },
}

impl PcapError {
    /// True when the error comes from a native symbol that could not be
    /// resolved when the runtime was bound.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, PcapError::Foreign(ForeignError::DowncallUnavailable { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable() {
        let err = PcapError::from(ForeignError::DowncallUnavailable {
            symbol: "pcap_init".into(),
            cause: Box::new(ForeignError::SymbolNotFound {
                symbol: "pcap_init".into(),
            }),
        });
        assert!(err.is_unavailable());
        assert!(err.to_string().contains("pcap_init"));
    }

    #[test]
    fn test_native_message() {
        let err = PcapError::Native {
            function: "pcap_init",
            code: -1,
            message: "unknown options specified".into(),
        };
        assert_eq!(
            err.to_string(),
            "pcap_init failed (-1): unknown options specified"
        );
        assert!(!err.is_unavailable());
    }
}
