//! Lifetime scopes for upcall trampolines.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use lazy_static::lazy_static;

use netpcap_core::{CallDescriptor, NativeAddress};

use crate::error::ForeignError;
use crate::upcall::class::UpcallFn;
use crate::upcall::trampoline::{Trampoline, UpcallThunk};

const GLOBAL_SCOPE_NAME: &str = "global";

lazy_static! {
    static ref GLOBAL_SCOPE: UpcallScope = UpcallScope {
        state: Arc::new(ScopeState::new(GLOBAL_SCOPE_NAME, true)),
    };
}

pub(crate) struct ScopeState {
    name: String,
    global: bool,
    released: AtomicBool,
    stubs: Mutex<Vec<Trampoline>>,
}

impl ScopeState {
    fn new(name: &str, global: bool) -> Self {
        Self {
            name: name.to_string(),
            global,
            released: AtomicBool::new(false),
            stubs: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    fn stubs(&self) -> std::sync::MutexGuard<'_, Vec<Trampoline>> {
        self.stubs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn release(&self) {
        if self.global {
            log::warn!("the global upcall scope cannot be released");
            return;
        }
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        let freed = std::mem::take(&mut *self.stubs());
        log::debug!("released upcall scope '{}' ({} stubs)", self.name, freed.len());
    }
}

/// Owner of native upcall stubs.
///
/// Stubs created in a scope stay callable until the scope is released,
/// either with [`UpcallScope::release`] or when the scope is dropped. The
/// [global](UpcallScope::global) scope lives for the whole process.
pub struct UpcallScope {
    state: Arc<ScopeState>,
}

impl UpcallScope {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            state: Arc::new(ScopeState::new(&name, false)),
        }
    }

    /// The process-wide scope. Stubs installed here are never freed.
    pub fn global() -> &'static UpcallScope {
        &GLOBAL_SCOPE
    }

    pub fn name(&self) -> &str {
        self.state.name()
    }

    pub fn is_global(&self) -> bool {
        self.state.global
    }

    pub fn is_released(&self) -> bool {
        self.state.is_released()
    }

    /// Number of live stubs owned by this scope.
    pub fn stub_count(&self) -> usize {
        self.state.stubs().len()
    }

    /// Free every stub created in this scope. Idempotent.
    pub fn release(&self) {
        self.state.release();
    }

    /// Build a trampoline for `target` and hand ownership to this scope.
    pub(crate) fn install(
        &self,
        method: &str,
        descriptor: &CallDescriptor,
        target: UpcallFn,
    ) -> Result<(NativeAddress, Arc<ScopeState>), ForeignError> {
        let mut stubs = self.state.stubs();
        if self.state.is_released() {
            return Err(ForeignError::ScopeReleased {
                scope: self.state.name.clone(),
            });
        }
        let trampoline = Trampoline::new(UpcallThunk {
            method: method.to_string(),
            descriptor: descriptor.clone(),
            target,
        });
        let address = trampoline.address();
        log::debug!(
            "installed upcall stub '{}{descriptor}' at {address} in scope '{}'",
            trampoline.method(),
            self.state.name
        );
        stubs.push(trampoline);
        Ok((address, Arc::clone(&self.state)))
    }
}

impl Drop for UpcallScope {
    fn drop(&mut self) {
        self.state.release();
    }
}

impl fmt::Debug for ScopeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeState")
            .field("name", &self.name)
            .field("global", &self.global)
            .field("released", &self.is_released())
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for UpcallScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpcallScope")
            .field("name", &self.state.name)
            .field("global", &self.state.global)
            .field("released", &self.is_released())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netpcap_core::{CType, CValue};

    fn noop() -> UpcallFn {
        Arc::new(|_: &[CValue]| CValue::Void)
    }

    #[test]
    fn test_install_and_release() {
        let scope = UpcallScope::new("capture");
        let desc = CallDescriptor::of_void(&[CType::Pointer]).unwrap();
        let (address, state) = scope.install("callback", &desc, noop()).unwrap();
        assert!(!address.is_null());
        assert_eq!(scope.stub_count(), 1);
        assert!(!state.is_released());

        scope.release();
        assert!(scope.is_released());
        assert!(state.is_released());
        assert_eq!(scope.stub_count(), 0);

        // idempotent
        scope.release();
        let err = scope.install("callback", &desc, noop()).unwrap_err();
        assert_eq!(
            err,
            ForeignError::ScopeReleased {
                scope: "capture".into()
            }
        );
    }

    #[test]
    fn test_debug_output() {
        let scope = UpcallScope::new("debug");
        let desc = CallDescriptor::of_void(&[]).unwrap();
        let (_, state) = scope.install("tick", &desc, noop()).unwrap();
        assert_eq!(
            format!("{state:?}"),
            "ScopeState { name: \"debug\", global: false, released: false, .. }"
        );
        scope.release();
        assert_eq!(
            format!("{scope:?}"),
            "UpcallScope { name: \"debug\", global: false, released: true }"
        );
    }

    #[test]
    fn test_drop_releases() {
        let desc = CallDescriptor::of_void(&[]).unwrap();
        let state = {
            let scope = UpcallScope::new("short-lived");
            scope.install("tick", &desc, noop()).unwrap().1
        };
        assert!(state.is_released());
        assert_eq!(state.name(), "short-lived");
    }

    #[test]
    fn test_global_scope_is_never_released() {
        let global = UpcallScope::global();
        assert!(global.is_global());
        assert_eq!(global.name(), "global");
        global.release();
        assert!(!global.is_released());
        assert!(std::ptr::eq(global, UpcallScope::global()));
    }
}
