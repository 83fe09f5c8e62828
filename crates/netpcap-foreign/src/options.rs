//! Session configuration.

use std::env;
use std::ffi::OsStr;
use std::path::PathBuf;

use crate::error::ForeignError;
use crate::library::NativeLibrary;

/// Environment variable listing extra native libraries, in the platform's
/// path-list format (`:`-separated on Unix, `;` on Windows).
pub const LIBRARIES_ENV: &str = "NETPCAP_LIBRARIES";

#[derive(Debug, Clone, PartialEq, Eq)]
enum LibrarySource {
    Name(String),
    Path(PathBuf),
}

/// Options for [`BinderSession::with_options`](crate::BinderSession::with_options).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionOptions {
    libraries: Vec<LibrarySource>,
    make_accessible: bool,
}

impl SessionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options read from [`LIBRARIES_ENV`]. Entries containing a path
    /// separator or an extension are loaded as paths, the rest by base name.
    pub fn from_env() -> Self {
        match env::var_os(LIBRARIES_ENV) {
            Some(list) => Self::from_list(&list),
            None => Self::default(),
        }
    }

    fn from_list(list: &OsStr) -> Self {
        let mut options = Self::default();
        for entry in env::split_paths(list) {
            if entry.as_os_str().is_empty() {
                continue;
            }
            let text = entry.to_string_lossy();
            if entry.components().count() > 1 || entry.extension().is_some() {
                options = options.library_path(entry);
            } else {
                options = options.library(text.into_owned());
            }
        }
        options
    }

    /// Load a library by base name, e.g. `"pcap"`.
    pub fn library(mut self, name: impl Into<String>) -> Self {
        self.libraries.push(LibrarySource::Name(name.into()));
        self
    }

    /// Load a library from an explicit path.
    pub fn library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.libraries.push(LibrarySource::Path(path.into()));
        self
    }

    /// Allow binding private upcall methods.
    pub fn make_accessible(mut self, enabled: bool) -> Self {
        self.make_accessible = enabled;
        self
    }

    pub fn is_make_accessible(&self) -> bool {
        self.make_accessible
    }

    pub fn library_count(&self) -> usize {
        self.libraries.len()
    }

    /// Load every configured library, in order.
    pub(crate) fn load_libraries(&self) -> Result<Vec<NativeLibrary>, ForeignError> {
        self.libraries
            .iter()
            .map(|source| match source {
                LibrarySource::Name(name) => NativeLibrary::load_by_name(name),
                LibrarySource::Path(path) => NativeLibrary::load(path),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let options = SessionOptions::new()
            .library("pcap")
            .library_path("/opt/pcap/lib/libpcap.so.1")
            .make_accessible(true);
        assert_eq!(options.library_count(), 2);
        assert!(options.is_make_accessible());
        assert_eq!(
            options.libraries,
            vec![
                LibrarySource::Name("pcap".into()),
                LibrarySource::Path("/opt/pcap/lib/libpcap.so.1".into())
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_from_list() {
        let options = SessionOptions::from_list(OsStr::new("pcap::/usr/lib/libwpcap.so:npcap.dll"));
        assert_eq!(
            options.libraries,
            vec![
                LibrarySource::Name("pcap".into()),
                LibrarySource::Path("/usr/lib/libwpcap.so".into()),
                LibrarySource::Path("npcap.dll".into()),
            ]
        );
        assert!(!options.is_make_accessible());
    }

    #[test]
    fn test_missing_library_fails_to_load() {
        let options = SessionOptions::new().library("netpcap_definitely_missing");
        assert!(matches!(
            options.load_libraries(),
            Err(ForeignError::LibraryLoad { .. })
        ));
    }
}
