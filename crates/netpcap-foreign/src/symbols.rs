//! Symbol lookup.
//!
//! A [`SymbolLookup`] maps a symbol name to a native address. Sessions search
//! a chain of lookups: explicitly loaded libraries first, in the order they
//! were added, then the process image.

use std::ffi::c_void;
use std::fmt;
use std::sync::Arc;

use lazy_static::lazy_static;
use libloading::Library;
use rustc_hash::FxHashMap;

use netpcap_core::NativeAddress;

/// A source of native symbols.
///
/// Implementations are read-only after construction and shared between
/// sessions and the bindings resolved from them; a bound downcall keeps its
/// lookup alive, which keeps the backing library loaded.
pub trait SymbolLookup: Send + Sync {
    fn lookup(&self, name: &str) -> Option<NativeAddress>;

    /// Name used in diagnostics.
    fn describe(&self) -> String;
}

/// Look `name` up in an open library handle.
pub(crate) fn library_symbol(library: &Library, name: &str) -> Option<NativeAddress> {
    // SAFETY: the symbol is read as an untyped address and never called here.
    let symbol = unsafe { library.get::<*mut c_void>(name.as_bytes()) }.ok()?;
    let address = NativeAddress::from_mut_ptr(*symbol);
    (!address.is_null()).then_some(address)
}

/// Symbols already loaded into the running process.
pub struct ProcessSymbols {
    image: Option<Library>,
}

#[cfg(unix)]
fn open_process_image() -> Option<Library> {
    Some(libloading::os::unix::Library::this().into())
}

#[cfg(windows)]
fn open_process_image() -> Option<Library> {
    libloading::os::windows::Library::this().ok().map(Into::into)
}

#[cfg(not(any(unix, windows)))]
fn open_process_image() -> Option<Library> {
    None
}

lazy_static! {
    static ref PROCESS_SYMBOLS: Arc<ProcessSymbols> = Arc::new(ProcessSymbols {
        image: open_process_image(),
    });
}

impl ProcessSymbols {
    /// The process-wide lookup.
    pub fn shared() -> Arc<ProcessSymbols> {
        Arc::clone(&PROCESS_SYMBOLS)
    }
}

impl SymbolLookup for ProcessSymbols {
    fn lookup(&self, name: &str) -> Option<NativeAddress> {
        self.image.as_ref().and_then(|lib| library_symbol(lib, name))
    }

    fn describe(&self) -> String {
        "<process>".to_string()
    }
}

impl fmt::Debug for ProcessSymbols {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessSymbols")
            .field("available", &self.image.is_some())
            .finish()
    }
}

/// An explicit name → address table.
///
/// Useful for functions linked statically into the binary, and for upcall
/// stubs that native code should find by name.
#[derive(Debug, Default, Clone)]
pub struct SymbolTable {
    name: String,
    symbols: FxHashMap<String, NativeAddress>,
}

impl SymbolTable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            symbols: FxHashMap::default(),
        }
    }

    pub fn insert(&mut self, symbol: impl Into<String>, address: NativeAddress) -> &mut Self {
        self.symbols.insert(symbol.into(), address);
        self
    }

    pub fn with(mut self, symbol: impl Into<String>, address: NativeAddress) -> Self {
        self.insert(symbol, address);
        self
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

impl SymbolLookup for SymbolTable {
    fn lookup(&self, name: &str) -> Option<NativeAddress> {
        self.symbols.get(name).copied()
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}

/// Search `chain` in order, returning the address and the lookup that owns it.
pub(crate) fn resolve(
    chain: &[Arc<dyn SymbolLookup>],
    name: &str,
) -> Option<(NativeAddress, Arc<dyn SymbolLookup>)> {
    chain
        .iter()
        .find_map(|lookup| lookup.lookup(name).map(|address| (address, Arc::clone(lookup))))
}
