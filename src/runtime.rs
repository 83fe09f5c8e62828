//! Bootstrap bindings for the native capture library.
//!
//! [`PcapRuntime`] binds the handful of library-wide entry points every
//! capture program needs before it opens a device. Entry points missing from
//! older libpcap builds (`pcap_init` appeared in 1.10) stay unbound and
//! report [`PcapError::is_unavailable`] when called.

use std::ffi::{CStr, CString, c_char};

use netpcap_core::version::{self, DEFAULT_COMPONENT_LIMIT};
use netpcap_core::{CValue, NativeAddress, NetIp4Address};
use netpcap_foreign::{BinderSession, ForeignDowncall, SessionOptions};

use crate::error::PcapError;

/// Size of the error buffers libpcap writes into.
pub const PCAP_ERRBUF_SIZE: usize = 256;

/// `pcap_init` option: strings use the local code page.
pub const PCAP_CHAR_ENC_LOCAL: u32 = 0;
/// `pcap_init` option: strings are UTF-8.
pub const PCAP_CHAR_ENC_UTF_8: u32 = 1;

#[cfg(windows)]
const DEFAULT_LIBRARY: &str = "wpcap";
#[cfg(not(windows))]
const DEFAULT_LIBRARY: &str = "pcap";

const SESSION_NAME: &str = "PcapRuntime";

/// Library-wide libpcap entry points.
#[derive(Debug)]
pub struct PcapRuntime {
    lib_version: ForeignDowncall<PcapError>,
    init: ForeignDowncall<PcapError>,
    strerror: ForeignDowncall<PcapError>,
    lookupnet: ForeignDowncall<PcapError>,
}

impl PcapRuntime {
    /// Load libpcap and bind the runtime entry points.
    ///
    /// Libraries listed in `options` are loaded in order; with none listed
    /// the platform's default capture library is used.
    pub fn load(options: &SessionOptions) -> Result<Self, PcapError> {
        let options = if options.library_count() == 0 {
            options.clone().library(DEFAULT_LIBRARY)
        } else {
            options.clone()
        };
        BinderSession::with_options(SESSION_NAME, &options)?.run(Self::bind)
    }

    /// Bind the runtime entry points in an existing session.
    pub fn bind(session: &mut BinderSession) -> Result<Self, PcapError> {
        let runtime = Self {
            lib_version: session.downcall("pcap_lib_version()A")?,
            init: session.downcall("pcap_init(IA)I")?,
            strerror: session.downcall("pcap_strerror(I)A")?,
            lookupnet: session.downcall("pcap_lookupnet(AAAA)I")?,
        };
        log::debug!("bound {SESSION_NAME}: {:?}", session.missing_downcalls());
        Ok(runtime)
    }

    /// The library's version banner, e.g. `"libpcap version 1.10.4 (with TPACKET_V3)"`.
    pub fn lib_version(&self) -> Result<String, PcapError> {
        // SAFETY: returns a pointer to a static string.
        let text = unsafe { self.lib_version.invoke_address(&[]) }?;
        Ok(c_string(text))
    }

    /// Fail unless the loaded library is at least `application` (major.minor).
    pub fn check_version(&self, application: &str) -> Result<(), PcapError> {
        let banner = self.lib_version()?;
        let runtime = version_number(&banner).unwrap_or(&banner);
        version::check_version(runtime, application, DEFAULT_COMPONENT_LIMIT)?;
        Ok(())
    }

    /// Initialize the library with `options`, such as [`PCAP_CHAR_ENC_UTF_8`].
    pub fn init(&self, options: u32) -> Result<(), PcapError> {
        let mut errbuf = [0 as c_char; PCAP_ERRBUF_SIZE];
        // SAFETY: `errbuf` is PCAP_ERRBUF_SIZE bytes, as pcap_init requires.
        let code = unsafe {
            self.init.invoke_int(&[
                CValue::Int(options as i32),
                CValue::Address(NativeAddress::from_mut_ptr(errbuf.as_mut_ptr())),
            ])
        }?;
        if code != 0 {
            return Err(native_error("pcap_init", code, &errbuf));
        }
        Ok(())
    }

    /// Message text for a libpcap error code.
    pub fn strerror(&self, code: i32) -> Result<String, PcapError> {
        // SAFETY: returns a pointer to a static or thread-local string.
        let text = unsafe { self.strerror.invoke_address(&[CValue::Int(code)]) }?;
        Ok(c_string(text))
    }

    /// Network number and netmask of `device`.
    pub fn lookup_net(&self, device: &str) -> Result<NetIp4Address, PcapError> {
        let device_name = CString::new(device).map_err(|_| PcapError::Native {
            function: "pcap_lookupnet",
            code: -1,
            message: format!("device name {device:?} contains a NUL byte"),
        })?;
        let mut net: u32 = 0;
        let mut mask: u32 = 0;
        let mut errbuf = [0 as c_char; PCAP_ERRBUF_SIZE];
        // SAFETY: every pointer argument outlives the call and the out
        // parameters are 32-bit as bpf_u_int32 requires.
        let code = unsafe {
            self.lookupnet.invoke_int(&[
                CValue::Address(NativeAddress::from_ptr(device_name.as_ptr())),
                CValue::Address(NativeAddress::from_mut_ptr(&mut net as *mut u32)),
                CValue::Address(NativeAddress::from_mut_ptr(&mut mask as *mut u32)),
                CValue::Address(NativeAddress::from_mut_ptr(errbuf.as_mut_ptr())),
            ])
        }?;
        if code != 0 {
            return Err(native_error("pcap_lookupnet", code, &errbuf));
        }
        Ok(NetIp4Address::new(net, mask))
    }
}

/// Version number embedded in a library banner.
///
/// Npcap reports its own release first ("Npcap version 1.79, based on libpcap
/// version 1.10.4"), so the number following "libpcap version" wins when
/// present. Otherwise the first token starting with a digit is used. The
/// token is cut at the first character that cannot appear in a version.
fn version_number(banner: &str) -> Option<&str> {
    const LIBPCAP: &str = "libpcap version";
    let tail = banner
        .find(LIBPCAP)
        .map_or(banner, |at| &banner[at + LIBPCAP.len()..]);
    let token = tail
        .split_whitespace()
        .find(|token| token.starts_with(|c: char| c.is_ascii_digit()))?;
    let end = token
        .find(|c: char| !(c.is_ascii_digit() || matches!(c, '.' | '+' | '-')))
        .unwrap_or(token.len());
    Some(&token[..end])
}

fn c_string(address: NativeAddress) -> String {
    if address.is_null() {
        return String::new();
    }
    // SAFETY: libpcap returns NUL-terminated strings.
    unsafe { CStr::from_ptr(address.as_ptr::<c_char>()) }
        .to_string_lossy()
        .into_owned()
}

fn native_error(function: &'static str, code: i32, errbuf: &[c_char]) -> PcapError {
    let bytes: Vec<u8> = errbuf
        .iter()
        .take_while(|&&c| c != 0)
        .map(|&c| c as u8)
        .collect();
    PcapError::Native {
        function,
        code,
        message: String::from_utf8_lossy(&bytes).into_owned(),
    }
}
