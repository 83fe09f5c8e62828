//! Binder sessions.
//!
//! A [`BinderSession`] groups the bindings made during one initialization
//! pass. Symbols that cannot be resolved do not interrupt the pass: the
//! session records their names and hands both lists to its
//! [`MissingSymbolsPolicy`] exactly once, when the session closes.
//!
//! ```no_run
//! use netpcap_foreign::{BinderSession, ForeignDowncall, ForeignError};
//!
//! let mut session = BinderSession::open("pcap");
//! let pcap_init: ForeignDowncall = session.downcall("pcap_init(IA)I")?;
//! let pcap_lookupnet: ForeignDowncall = session.downcall("pcap_lookupnet(AAAA)I")?;
//! session.close()?;
//! # let _ = (pcap_init, pcap_lookupnet);
//! # Ok::<(), ForeignError>(())
//! ```

use std::fmt;
use std::sync::Arc;

use netpcap_core::CType;

use crate::downcall::{DowncallBinder, ForeignDowncall};
use crate::error::{ForeignError, SessionFault};
use crate::library::NativeLibrary;
use crate::options::SessionOptions;
use crate::policy::{MissingSymbolsPolicy, RequireUpcalls};
use crate::symbols::{ProcessSymbols, SymbolLookup};
use crate::upcall::{ForeignUpcall, UpcallBinder, UpcallClass, UpcallScope};

/// A scoped aggregation of binding requests.
pub struct BinderSession {
    name: String,
    /// Explicit lookups, searched in insertion order before the process image.
    lookups: Vec<Arc<dyn SymbolLookup>>,
    process: Arc<dyn SymbolLookup>,
    missing_downcalls: Vec<String>,
    missing_upcalls: Vec<String>,
    make_accessible: bool,
    policy: Box<dyn MissingSymbolsPolicy>,
    closed: bool,
}

impl BinderSession {
    /// Open a session over the process's loaded libraries, with the
    /// [`RequireUpcalls`] policy.
    pub fn open(name: impl Into<String>) -> Self {
        let process: Arc<dyn SymbolLookup> = ProcessSymbols::shared();
        Self {
            name: name.into(),
            lookups: Vec::new(),
            process,
            missing_downcalls: Vec::new(),
            missing_upcalls: Vec::new(),
            make_accessible: false,
            policy: Box::new(RequireUpcalls),
            closed: false,
        }
    }

    /// Open a session and load the libraries named in `options`.
    pub fn with_options(
        name: impl Into<String>,
        options: &SessionOptions,
    ) -> Result<Self, ForeignError> {
        let mut session = Self::open(name);
        session.make_accessible = options.is_make_accessible();
        for library in options.load_libraries()? {
            session.lookups.push(Arc::new(library));
        }
        Ok(session)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Downcall symbols that could not be resolved, in request order.
    pub fn missing_downcalls(&self) -> &[String] {
        &self.missing_downcalls
    }

    /// Upcall methods that could not be found, in request order.
    pub fn missing_upcalls(&self) -> &[String] {
        &self.missing_upcalls
    }

    pub fn set_missing_symbols_policy(&mut self, policy: impl MissingSymbolsPolicy + 'static) {
        self.policy = Box::new(policy);
    }

    pub fn set_make_accessible(&mut self, enabled: bool) {
        self.make_accessible = enabled;
    }

    /// Load a native library by base name or path and search it before the
    /// process image.
    pub fn load_library(&mut self, library: &str) -> Result<(), ForeignError> {
        self.ensure_open()?;
        let library = NativeLibrary::open(library)?;
        self.lookups.push(Arc::new(library));
        Ok(())
    }

    /// Search `lookup` before the process image.
    pub fn add_symbols(&mut self, lookup: Arc<dyn SymbolLookup>) -> Result<(), ForeignError> {
        self.ensure_open()?;
        self.lookups.push(lookup);
        Ok(())
    }

    /// Bind a downcall from a signature such as `"pcap_setfilter(AA)I"`.
    pub fn downcall<E: From<ForeignError>>(
        &mut self,
        signature: &str,
    ) -> Result<ForeignDowncall<E>, ForeignError> {
        self.ensure_open()?;
        let downcall = self.downcall_binder().bind_by_signature(signature)?;
        Ok(self.record_downcall(downcall))
    }

    /// Bind a downcall from an explicit descriptor.
    pub fn downcall_by_descriptor<E: From<ForeignError>>(
        &mut self,
        symbol: &str,
        ret: CType,
        args: &[CType],
    ) -> Result<ForeignDowncall<E>, ForeignError> {
        self.ensure_open()?;
        let downcall = self.downcall_binder().bind_by_descriptor(symbol, ret, args)?;
        Ok(self.record_downcall(downcall))
    }

    /// Bind an upcall stub owned by `scope` from a signature such as
    /// `"callback(AAA)V"`.
    pub fn upcall(
        &mut self,
        scope: &UpcallScope,
        class: &UpcallClass,
        signature: &str,
    ) -> Result<ForeignUpcall, ForeignError> {
        self.ensure_open()?;
        let upcall = self.upcall_binder().bind_by_signature(scope, class, signature)?;
        Ok(self.record_upcall(upcall))
    }

    /// Bind an upcall stub from a method name and explicit descriptor.
    pub fn upcall_by_name(
        &mut self,
        scope: &UpcallScope,
        class: &UpcallClass,
        method: &str,
        ret: CType,
        args: &[CType],
    ) -> Result<ForeignUpcall, ForeignError> {
        self.ensure_open()?;
        let upcall = self
            .upcall_binder()
            .bind_by_name(scope, class, method, ret, args)?;
        Ok(self.record_upcall(upcall))
    }

    /// Run the missing-symbol policy and make the session inert.
    ///
    /// The policy runs exactly once, even when nothing is missing. Closing
    /// again fails with [`SessionFault::AlreadyClosed`].
    pub fn close(&mut self) -> Result<(), SessionFault> {
        if self.closed {
            return Err(self.already_closed());
        }
        self.closed = true;
        log::info!(
            "closing binder session '{}': {} missing downcalls, {} missing upcalls",
            self.name,
            self.missing_downcalls.len(),
            self.missing_upcalls.len()
        );
        self.policy
            .on_missing_symbols(&self.name, &self.missing_downcalls, &self.missing_upcalls)
    }

    /// Run `init` against the session, then close it.
    ///
    /// The session is closed on every path, unless `init` already closed it.
    /// An error from `init` takes precedence over a fault raised by the
    /// policy.
    pub fn run<T, E, F>(mut self, init: F) -> Result<T, E>
    where
        F: FnOnce(&mut Self) -> Result<T, E>,
        E: From<SessionFault>,
    {
        let outcome = init(&mut self);
        let closed = if self.closed { Ok(()) } else { self.close() };
        match (outcome, closed) {
            (Err(e), closed) => {
                if let Err(fault) = closed {
                    log::error!("{fault}");
                }
                Err(e)
            }
            (Ok(_), Err(fault)) => Err(E::from(fault)),
            (Ok(value), Ok(())) => Ok(value),
        }
    }

    fn ensure_open(&self) -> Result<(), SessionFault> {
        if self.closed {
            Err(self.already_closed())
        } else {
            Ok(())
        }
    }

    fn already_closed(&self) -> SessionFault {
        SessionFault::AlreadyClosed {
            session: self.name.clone(),
        }
    }

    fn downcall_binder(&self) -> DowncallBinder {
        let mut chain = self.lookups.clone();
        chain.push(Arc::clone(&self.process));
        DowncallBinder::new(chain)
    }

    fn upcall_binder(&self) -> UpcallBinder {
        UpcallBinder::new(self.make_accessible)
    }

    fn record_downcall<E: From<ForeignError>>(&mut self, downcall: ForeignDowncall<E>) -> ForeignDowncall<E> {
        if !downcall.is_bound() {
            self.missing_downcalls.push(downcall.symbol_name().to_string());
        }
        downcall
    }

    fn record_upcall(&mut self, upcall: ForeignUpcall) -> ForeignUpcall {
        if !upcall.is_bound() {
            self.missing_upcalls.push(upcall.method_name().to_string());
        }
        upcall
    }
}

impl Drop for BinderSession {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(fault) = self.close() {
            log::error!("binder session '{}' dropped without close: {fault}", self.name);
        }
    }
}

impl fmt::Debug for BinderSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lookups: Vec<String> = self.lookups.iter().map(|l| l.describe()).collect();
        f.debug_struct("BinderSession")
            .field("name", &self.name)
            .field("lookups", &lookups)
            .field("missing_downcalls", &self.missing_downcalls)
            .field("missing_upcalls", &self.missing_upcalls)
            .field("make_accessible", &self.make_accessible)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}
