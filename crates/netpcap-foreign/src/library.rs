//! Native library loading.

use std::fmt;
use std::path::Path;

use libloading::Library;

use netpcap_core::NativeAddress;

use crate::error::ForeignError;
use crate::symbols::{SymbolLookup, library_symbol};

/// A dynamically loaded native library.
pub struct NativeLibrary {
    library: Library,
    /// Path or file name the library was opened with.
    path: String,
}

impl NativeLibrary {
    /// Load a library from an explicit path.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ForeignError> {
        let path = path.as_ref();
        // SAFETY: loading runs the library's initialisers; callers choose
        // which libraries to trust.
        let library = unsafe { Library::new(path) }.map_err(|e| ForeignError::LibraryLoad {
            library: path.display().to_string(),
            message: e.to_string(),
        })?;

        log::debug!("loaded native library {}", path.display());
        Ok(Self {
            library,
            path: path.display().to_string(),
        })
    }

    /// Load a library by base name (`pcap` → `libpcap.so`, `pcap.dll`, ...),
    /// searching the platform's standard paths.
    pub fn load_by_name(name: &str) -> Result<Self, ForeignError> {
        let file_name = Self::platform_lib_name(name);
        Self::load(&file_name).map_err(|e| match e {
            ForeignError::LibraryLoad { message, .. } => ForeignError::LibraryLoad {
                library: format!("{name} (tried '{file_name}')"),
                message,
            },
            other => other,
        })
    }

    /// Load `library` as a path if it looks like one, otherwise by base name.
    pub fn open(library: &str) -> Result<Self, ForeignError> {
        let looks_like_path = library.contains(std::path::MAIN_SEPARATOR)
            || library.contains('/')
            || Path::new(library).extension().is_some();
        if looks_like_path {
            Self::load(library)
        } else {
            Self::load_by_name(library)
        }
    }

    fn platform_lib_name(name: &str) -> String {
        #[cfg(target_os = "windows")]
        {
            format!("{}.dll", name)
        }
        #[cfg(target_os = "macos")]
        {
            format!("lib{}.dylib", name)
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        {
            format!("lib{}.so", name)
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl SymbolLookup for NativeLibrary {
    fn lookup(&self, name: &str) -> Option<NativeAddress> {
        library_symbol(&self.library, name)
    }

    fn describe(&self) -> String {
        self.path.clone()
    }
}

impl fmt::Debug for NativeLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeLibrary")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}
