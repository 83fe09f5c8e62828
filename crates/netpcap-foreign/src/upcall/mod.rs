//! Upcalls: native → Rust callbacks.
//!
//! An [`UpcallBinder`] looks a method up on an [`UpcallClass`], checks its
//! declared descriptor and accessibility, and installs a native-callable stub
//! for it in an [`UpcallScope`]. The resulting [`ForeignUpcall`] exposes the
//! stub's address for passing to native code.
//!
//! Lookup, ambiguity and access failures are reported immediately. A method
//! name with no registration at all yields an unbound upcall instead, so a
//! session can batch it with other missing symbols.

mod class;
mod scope;
mod trampoline;

use std::fmt;
use std::sync::Arc;

use netpcap_core::{CType, CallDescriptor, NativeAddress, Signature};

use crate::downcall::describe;
use crate::error::ForeignError;

pub use class::{UpcallClass, UpcallClassBuilder, UpcallFn, UpcallMethod, Visibility};
pub use scope::UpcallScope;

use scope::ScopeState;

enum UpcallState {
    Bound {
        address: NativeAddress,
        scope: Arc<ScopeState>,
    },
    Unbound {
        cause: ForeignError,
    },
}

/// A native-callable stub for an upcall method, or the reason it could not
/// be made.
pub struct ForeignUpcall {
    method: String,
    descriptor: CallDescriptor,
    state: UpcallState,
}

impl ForeignUpcall {
    pub fn method_name(&self) -> &str {
        &self.method
    }

    pub fn descriptor(&self) -> &CallDescriptor {
        &self.descriptor
    }

    pub fn is_bound(&self) -> bool {
        matches!(self.state, UpcallState::Bound { .. })
    }

    pub fn failure(&self) -> Option<&ForeignError> {
        match &self.state {
            UpcallState::Bound { .. } => None,
            UpcallState::Unbound { cause } => Some(cause),
        }
    }

    /// Name of the owning scope, `None` when unbound.
    pub fn scope_name(&self) -> Option<&str> {
        match &self.state {
            UpcallState::Bound { scope, .. } => Some(scope.name()),
            UpcallState::Unbound { .. } => None,
        }
    }

    /// The stub's entry point.
    ///
    /// Fails with [`ForeignError::UpcallUnavailable`] if the method could not
    /// be bound and with [`ForeignError::ScopeReleased`] once the owning
    /// scope has freed the stub.
    pub fn address(&self) -> Result<NativeAddress, ForeignError> {
        match &self.state {
            UpcallState::Bound { address, scope } => {
                if scope.is_released() {
                    Err(ForeignError::ScopeReleased {
                        scope: scope.name().to_string(),
                    })
                } else {
                    Ok(*address)
                }
            }
            UpcallState::Unbound { cause } => Err(ForeignError::UpcallUnavailable {
                method: self.method.clone(),
                cause: Box::new(cause.clone()),
            }),
        }
    }
}

impl fmt::Debug for ForeignUpcall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("ForeignUpcall");
        s.field("method", &self.method)
            .field("descriptor", &self.descriptor.to_string());
        match &self.state {
            UpcallState::Bound { address, scope } => s
                .field("address", address)
                .field("scope", &scope.name()),
            UpcallState::Unbound { cause } => s.field("cause", cause),
        };
        s.finish()
    }
}

/// Builds upcall stubs from registered methods.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpcallBinder {
    make_accessible: bool,
}

impl UpcallBinder {
    pub fn new(make_accessible: bool) -> Self {
        Self { make_accessible }
    }

    pub fn make_accessible(&self) -> bool {
        self.make_accessible
    }

    /// Bind from a signature such as `"callback(AAA)V"`.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn bind_by_signature(
        &self,
        scope: &UpcallScope,
        class: &UpcallClass,
        signature: &str,
    ) -> Result<ForeignUpcall, ForeignError> {
        let parsed = Signature::parse(signature)
            .map_err(|e| ForeignError::invalid_signature(signature, e))?;
        let (method, descriptor) = parsed.into_parts();
        self.bind(scope, class, method, descriptor)
    }

    /// Bind from a method name and an explicit descriptor.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn bind_by_name(
        &self,
        scope: &UpcallScope,
        class: &UpcallClass,
        method: &str,
        ret: CType,
        args: &[CType],
    ) -> Result<ForeignUpcall, ForeignError> {
        let descriptor = CallDescriptor::new(ret, args)
            .map_err(|e| ForeignError::invalid_signature(describe(method, ret, args), e))?;
        self.bind(scope, class, method.to_string(), descriptor)
    }

    fn bind(
        &self,
        scope: &UpcallScope,
        class: &UpcallClass,
        method: String,
        descriptor: CallDescriptor,
    ) -> Result<ForeignUpcall, ForeignError> {
        let Some(target) = select(class, &method, &descriptor)? else {
            log::warn!("upcall method '{}::{method}' not found", class.name());
            let cause = ForeignError::UpcallTargetNotFound {
                holder: class.name().to_string(),
                method: method.clone(),
            };
            return Ok(ForeignUpcall {
                method,
                descriptor,
                state: UpcallState::Unbound { cause },
            });
        };

        let handle = target.handle(class.name(), self.make_accessible)?;

        let (address, scope) = scope.install(&method, &descriptor, handle)?;
        Ok(ForeignUpcall {
            method,
            descriptor,
            state: UpcallState::Bound { address, scope },
        })
    }
}

/// Pick the registered method for a request.
///
/// `Ok(None)` means nothing is registered under the name.
fn select<'c>(
    class: &'c UpcallClass,
    method: &str,
    descriptor: &CallDescriptor,
) -> Result<Option<&'c UpcallMethod>, ForeignError> {
    match class.methods_named(method) {
        [] => Ok(None),
        [only] => {
            if only.descriptor() == descriptor {
                Ok(Some(only))
            } else {
                Err(ForeignError::UpcallSignatureMismatch {
                    holder: class.name().to_string(),
                    method: method.to_string(),
                    declared: only.descriptor().to_string(),
                    requested: descriptor.to_string(),
                })
            }
        }
        overloads => {
            let mut matching = overloads.iter().filter(|m| m.descriptor() == descriptor);
            match (matching.next(), matching.next()) {
                (Some(chosen), None) => Ok(Some(chosen)),
                _ => Err(ForeignError::AmbiguousUpcallTarget {
                    holder: class.name().to_string(),
                    method: method.to_string(),
                    descriptor: descriptor.to_string(),
                    candidates: overloads.len(),
                }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netpcap_core::CValue;

    fn handlers() -> UpcallClass {
        UpcallClass::builder("Handlers")
            .method("callback(AAA)V", |_| CValue::Void)
            .unwrap()
            .method("compare(AA)I", |_| CValue::Int(0))
            .unwrap()
            .method("overloaded(I)I", |args| args[0])
            .unwrap()
            .method("overloaded(J)J", |args| args[0])
            .unwrap()
            .method("twin(I)I", |_| CValue::Int(1))
            .unwrap()
            .method("twin(I)I", |_| CValue::Int(2))
            .unwrap()
            .private_method("hidden()I", |_| CValue::Int(7))
            .unwrap()
            .build()
    }

    #[test]
    fn test_bind_single_method() {
        let scope = UpcallScope::new("test");
        let class = handlers();
        let upcall = UpcallBinder::default()
            .bind_by_signature(&scope, &class, "callback(AAA)V")
            .unwrap();
        assert!(upcall.is_bound());
        assert_eq!(upcall.method_name(), "callback");
        assert_eq!(upcall.scope_name(), Some("test"));
        assert!(!upcall.address().unwrap().is_null());
        assert_eq!(scope.stub_count(), 1);
    }

    #[test]
    fn test_missing_method_is_deferred() {
        let scope = UpcallScope::new("test");
        let class = handlers();
        let upcall = UpcallBinder::default()
            .bind_by_signature(&scope, &class, "absent(I)V")
            .unwrap();
        assert!(!upcall.is_bound());
        assert_eq!(upcall.scope_name(), None);
        let err = upcall.address().unwrap_err();
        assert_eq!(
            err.cause(),
            Some(&ForeignError::UpcallTargetNotFound {
                holder: "Handlers".into(),
                method: "absent".into()
            })
        );
        assert_eq!(scope.stub_count(), 0);
    }

    #[test]
    fn test_single_candidate_descriptor_mismatch() {
        let scope = UpcallScope::new("test");
        let err = UpcallBinder::default()
            .bind_by_signature(&scope, &handlers(), "compare(AA)J")
            .unwrap_err();
        assert_eq!(
            err,
            ForeignError::UpcallSignatureMismatch {
                holder: "Handlers".into(),
                method: "compare".into(),
                declared: "(AA)I".into(),
                requested: "(AA)J".into(),
            }
        );
    }

    #[test]
    fn test_overloads_narrowed_by_descriptor() {
        let scope = UpcallScope::new("test");
        let class = handlers();
        let binder = UpcallBinder::default();
        let long = binder
            .bind_by_name(&scope, &class, "overloaded", CType::Long, &[CType::Long])
            .unwrap();
        assert!(long.is_bound());
        assert_eq!(long.descriptor().to_string(), "(J)J");

        let err = binder
            .bind_by_signature(&scope, &class, "overloaded(D)D")
            .unwrap_err();
        assert!(matches!(
            err,
            ForeignError::AmbiguousUpcallTarget { candidates: 2, .. }
        ));
    }

    #[test]
    fn test_identical_overloads_are_ambiguous() {
        let scope = UpcallScope::new("test");
        let err = UpcallBinder::default()
            .bind_by_signature(&scope, &handlers(), "twin(I)I")
            .unwrap_err();
        assert!(matches!(err, ForeignError::AmbiguousUpcallTarget { .. }));
    }

    #[test]
    fn test_private_method_requires_override() {
        let scope = UpcallScope::new("test");
        let class = handlers();
        let err = UpcallBinder::new(false)
            .bind_by_signature(&scope, &class, "hidden()I")
            .unwrap_err();
        assert_eq!(
            err,
            ForeignError::AccessDenied {
                holder: "Handlers".into(),
                method: "hidden".into()
            }
        );

        let upcall = UpcallBinder::new(true)
            .bind_by_signature(&scope, &class, "hidden()I")
            .unwrap();
        assert!(upcall.is_bound());
        assert!(matches!(
            UpcallBinder::new(false).bind_by_signature(&scope, &class, "hidden()I"),
            Err(ForeignError::AccessDenied { .. })
        ));
    }

    #[test]
    fn test_override_is_per_binder_across_threads() {
        let class = Arc::new(handlers());
        let scope = Arc::new(UpcallScope::new("threads"));
        let spawn = |make_accessible: bool| {
            let class = Arc::clone(&class);
            let scope = Arc::clone(&scope);
            std::thread::spawn(move || {
                let binder = UpcallBinder::new(make_accessible);
                (0..200)
                    .filter(|_| binder.bind_by_signature(&scope, &class, "hidden()I").is_ok())
                    .count()
            })
        };
        let widening = spawn(true);
        let strict = spawn(false);
        assert_eq!(widening.join().unwrap(), 200);
        assert_eq!(strict.join().unwrap(), 0);
        assert_eq!(scope.stub_count(), 200);
    }

    #[test]
    fn test_released_scope_invalidates_address() {
        let scope = UpcallScope::new("short");
        let class = handlers();
        let binder = UpcallBinder::default();
        let upcall = binder
            .bind_by_signature(&scope, &class, "callback(AAA)V")
            .unwrap();
        scope.release();
        assert_eq!(
            upcall.address().unwrap_err(),
            ForeignError::ScopeReleased {
                scope: "short".into()
            }
        );
        assert!(matches!(
            binder.bind_by_signature(&scope, &class, "callback(AAA)V"),
            Err(ForeignError::ScopeReleased { .. })
        ));
    }

    #[test]
    fn test_void_argument_rejected() {
        let scope = UpcallScope::new("test");
        let err = UpcallBinder::default()
            .bind_by_name(&scope, &handlers(), "callback", CType::Void, &[CType::Void])
            .unwrap_err();
        assert!(matches!(err, ForeignError::InvalidSignature { .. }));
    }
}
