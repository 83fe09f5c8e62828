//! Upcall holder classes.
//!
//! Rust has no runtime reflection, so the methods native code may call back
//! into are registered up front on an [`UpcallClass`]. The class is the
//! registration table the upcall binder searches by method name.
//!
//! # Example
//!
//! ```
//! use netpcap_core::CValue;
//! use netpcap_foreign::UpcallClass;
//!
//! let dispatcher = UpcallClass::builder("PcapDispatcher")
//!     .method("callback(AAA)V", |_args: &[CValue]| CValue::Void)?
//!     .private_method("on_error(I)I", |args: &[CValue]| args[0])?
//!     .build();
//! assert_eq!(dispatcher.methods_named("callback").len(), 1);
//! # Ok::<(), netpcap_foreign::ForeignError>(())
//! ```

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use netpcap_core::{CValue, CallDescriptor, Signature};

use crate::error::ForeignError;

/// Callable target of an upcall.
pub type UpcallFn = Arc<dyn Fn(&[CValue]) -> CValue + Send + Sync>;

/// Visibility of a registered upcall method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Visibility::Public => write!(f, "public"),
            Visibility::Private => write!(f, "private"),
        }
    }
}

/// A method registered on an [`UpcallClass`].
///
/// Immutable once built; binders only read it, so one class may be bound
/// from several threads with different accessibility settings.
pub struct UpcallMethod {
    name: String,
    descriptor: CallDescriptor,
    visibility: Visibility,
    target: UpcallFn,
}

impl UpcallMethod {
    fn new(signature: Signature, visibility: Visibility, target: UpcallFn) -> Self {
        let (name, descriptor) = signature.into_parts();
        Self {
            name,
            descriptor,
            visibility,
            target,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn descriptor(&self) -> &CallDescriptor {
        &self.descriptor
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    /// Whether a binder with the given override setting may call this method.
    pub fn is_accessible_to(&self, make_accessible: bool) -> bool {
        self.visibility == Visibility::Public || make_accessible
    }

    /// Obtain the callable. Private methods require `make_accessible`.
    pub(crate) fn handle(&self, holder: &str, make_accessible: bool) -> Result<UpcallFn, ForeignError> {
        if !self.is_accessible_to(make_accessible) {
            return Err(ForeignError::AccessDenied {
                holder: holder.to_string(),
                method: self.name.clone(),
            });
        }
        Ok(Arc::clone(&self.target))
    }
}

impl fmt::Debug for UpcallMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpcallMethod")
            .field("name", &self.name)
            .field("descriptor", &self.descriptor.to_string())
            .field("visibility", &self.visibility)
            .finish_non_exhaustive()
    }
}

/// A named table of upcall methods. Overloads share a name.
pub struct UpcallClass {
    name: String,
    methods: FxHashMap<String, Vec<UpcallMethod>>,
}

impl UpcallClass {
    pub fn builder(name: impl Into<String>) -> UpcallClassBuilder {
        UpcallClassBuilder {
            name: name.into(),
            methods: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// All overloads registered under `name`, in registration order.
    pub fn methods_named(&self, name: &str) -> &[UpcallMethod] {
        self.methods.get(name).map_or(&[], Vec::as_slice)
    }

    pub fn method_count(&self) -> usize {
        self.methods.values().map(Vec::len).sum()
    }
}

impl fmt::Debug for UpcallClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.methods.keys().collect();
        names.sort();
        f.debug_struct("UpcallClass")
            .field("name", &self.name)
            .field("methods", &names)
            .finish()
    }
}

/// Builder for [`UpcallClass`].
pub struct UpcallClassBuilder {
    name: String,
    methods: Vec<UpcallMethod>,
}

impl UpcallClassBuilder {
    /// Register a public method declared by a signature such as
    /// `"callback(AAA)V"`.
    pub fn method<F>(self, signature: &str, target: F) -> Result<Self, ForeignError>
    where
        F: Fn(&[CValue]) -> CValue + Send + Sync + 'static,
    {
        self.register(signature, Visibility::Public, Arc::new(target))
    }

    /// Register a private method. Binding it requires accessibility override.
    pub fn private_method<F>(self, signature: &str, target: F) -> Result<Self, ForeignError>
    where
        F: Fn(&[CValue]) -> CValue + Send + Sync + 'static,
    {
        self.register(signature, Visibility::Private, Arc::new(target))
    }

    fn register(
        mut self,
        signature: &str,
        visibility: Visibility,
        target: UpcallFn,
    ) -> Result<Self, ForeignError> {
        let parsed = Signature::parse(signature)
            .map_err(|e| ForeignError::invalid_signature(signature, e))?;
        self.methods.push(UpcallMethod::new(parsed, visibility, target));
        Ok(self)
    }

    pub fn build(self) -> UpcallClass {
        let mut methods: FxHashMap<String, Vec<UpcallMethod>> = FxHashMap::default();
        for method in self.methods {
            methods.entry(method.name.clone()).or_default().push(method);
        }
        UpcallClass {
            name: self.name,
            methods,
        }
    }
}
