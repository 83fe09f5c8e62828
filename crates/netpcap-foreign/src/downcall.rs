//! Downcalls: Rust → native calls through resolved symbols.
//!
//! A [`DowncallBinder`] never fails because a symbol is missing. Native
//! libraries differ between versions, so an absent optional entry point must
//! not abort a whole initialisation pass. Instead the binder returns an
//! unbound [`ForeignDowncall`] that reports the resolution failure when it is
//! invoked, and the owning session records the name for its policy.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use netpcap_core::{CType, CValue, CallDescriptor, NativeAddress, Signature};

use crate::call::CallHandle;
use crate::error::ForeignError;
use crate::symbols::{self, SymbolLookup};

enum DowncallState {
    Bound {
        address: NativeAddress,
        handle: CallHandle,
        /// Keeps the library that exported the symbol loaded.
        _owner: Option<Arc<dyn SymbolLookup>>,
    },
    Unbound {
        descriptor: CallDescriptor,
        cause: ForeignError,
    },
}

/// A typed foreign function.
///
/// `E` is the error type invocations report. It only needs to be
/// constructible from [`ForeignError`], so a capture API can surface binding
/// failures through its own error enum.
pub struct ForeignDowncall<E = ForeignError> {
    symbol: String,
    state: DowncallState,
    _error: PhantomData<fn() -> E>,
}

impl<E: From<ForeignError>> ForeignDowncall<E> {
    fn bound(
        symbol: String,
        address: NativeAddress,
        descriptor: CallDescriptor,
        owner: Option<Arc<dyn SymbolLookup>>,
    ) -> Self {
        log::debug!("bound downcall {symbol}{descriptor} at {address}");
        Self {
            symbol,
            state: DowncallState::Bound {
                address,
                handle: CallHandle::new(address, descriptor),
                _owner: owner,
            },
            _error: PhantomData,
        }
    }

    /// The failure-state downcall: every invocation reports `cause`.
    pub fn unbound(symbol: impl Into<String>, descriptor: CallDescriptor, cause: ForeignError) -> Self {
        Self {
            symbol: symbol.into(),
            state: DowncallState::Unbound { descriptor, cause },
            _error: PhantomData,
        }
    }

    /// Bind a downcall to an address obtained elsewhere, such as a function
    /// pointer returned by native code or an upcall stub. The address must
    /// stay valid for as long as the downcall is invoked.
    pub fn from_address(
        symbol: impl Into<String>,
        address: NativeAddress,
        descriptor: CallDescriptor,
    ) -> Self {
        Self::bound(symbol.into(), address, descriptor, None)
    }

    pub fn symbol_name(&self) -> &str {
        &self.symbol
    }

    pub fn is_bound(&self) -> bool {
        matches!(self.state, DowncallState::Bound { .. })
    }

    /// Resolved address, `None` when unbound.
    pub fn address(&self) -> Option<NativeAddress> {
        match &self.state {
            DowncallState::Bound { address, .. } => Some(*address),
            DowncallState::Unbound { .. } => None,
        }
    }

    pub fn descriptor(&self) -> &CallDescriptor {
        match &self.state {
            DowncallState::Bound { handle, .. } => handle.descriptor(),
            DowncallState::Unbound { descriptor, .. } => descriptor,
        }
    }

    /// Why the downcall could not be bound.
    pub fn failure(&self) -> Option<&ForeignError> {
        match &self.state {
            DowncallState::Bound { .. } => None,
            DowncallState::Unbound { cause, .. } => Some(cause),
        }
    }

    /// Call the native function.
    ///
    /// Arguments are checked against the descriptor before the call. An
    /// unbound downcall fails with [`ForeignError::DowncallUnavailable`]
    /// wrapping the resolution failure.
    ///
    /// # Safety
    ///
    /// The descriptor must match the native function's C signature and every
    /// address argument must be valid for what the function does with it.
    pub unsafe fn invoke(&self, args: &[CValue]) -> Result<CValue, E> {
        match &self.state {
            DowncallState::Bound { handle, .. } => {
                unsafe { handle.invoke(&self.symbol, args) }.map_err(E::from)
            }
            DowncallState::Unbound { cause, .. } => Err(E::from(ForeignError::DowncallUnavailable {
                symbol: self.symbol.clone(),
                cause: Box::new(cause.clone()),
            })),
        }
    }

    /// # Safety
    ///
    /// See [`ForeignDowncall::invoke`].
    pub unsafe fn invoke_int(&self, args: &[CValue]) -> Result<i32, E> {
        let value = unsafe { self.invoke(args) }?;
        self.expect_return(value, CType::Int, CValue::as_int)
    }

    /// # Safety
    ///
    /// See [`ForeignDowncall::invoke`].
    pub unsafe fn invoke_long(&self, args: &[CValue]) -> Result<i64, E> {
        let value = unsafe { self.invoke(args) }?;
        self.expect_return(value, CType::Long, CValue::as_long)
    }

    /// # Safety
    ///
    /// See [`ForeignDowncall::invoke`].
    pub unsafe fn invoke_address(&self, args: &[CValue]) -> Result<NativeAddress, E> {
        let value = unsafe { self.invoke(args) }?;
        self.expect_return(value, CType::Pointer, CValue::as_address)
    }

    /// # Safety
    ///
    /// See [`ForeignDowncall::invoke`].
    pub unsafe fn invoke_void(&self, args: &[CValue]) -> Result<(), E> {
        let value = unsafe { self.invoke(args) }?;
        self.expect_return(value, CType::Void, |v| v.is_void().then_some(()))
    }

    fn expect_return<T>(
        &self,
        value: CValue,
        expected: CType,
        extract: impl FnOnce(&CValue) -> Option<T>,
    ) -> Result<T, E> {
        extract(&value).ok_or_else(|| {
            E::from(ForeignError::ReturnType {
                symbol: self.symbol.clone(),
                expected,
                found: self.descriptor().return_type(),
            })
        })
    }
}

impl<E> fmt::Debug for ForeignDowncall<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("ForeignDowncall");
        s.field("symbol", &self.symbol);
        match &self.state {
            DowncallState::Bound { address, handle, .. } => {
                s.field("address", address).field("handle", handle)
            }
            DowncallState::Unbound { cause, .. } => s.field("cause", cause),
        };
        s.finish()
    }
}

/// Resolves symbols and builds downcalls.
pub struct DowncallBinder {
    chain: Vec<Arc<dyn SymbolLookup>>,
}

impl DowncallBinder {
    /// A binder searching `chain` in order.
    pub fn new(chain: Vec<Arc<dyn SymbolLookup>>) -> Self {
        Self { chain }
    }

    /// A binder over the process image only.
    pub fn process() -> Self {
        let process: Arc<dyn SymbolLookup> = symbols::ProcessSymbols::shared();
        Self::new(vec![process])
    }

    /// Bind from a signature such as `"pcap_setfilter(AA)I"`.
    ///
    /// Only a malformed signature fails; a missing symbol yields an unbound
    /// downcall.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn bind_by_signature<E: From<ForeignError>>(
        &self,
        signature: &str,
    ) -> Result<ForeignDowncall<E>, ForeignError> {
        let parsed = Signature::parse(signature)
            .map_err(|e| ForeignError::invalid_signature(signature, e))?;
        let (symbol, descriptor) = parsed.into_parts();
        Ok(self.bind(symbol, descriptor))
    }

    /// Bind from an explicit return type and argument types.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn bind_by_descriptor<E: From<ForeignError>>(
        &self,
        symbol: &str,
        ret: CType,
        args: &[CType],
    ) -> Result<ForeignDowncall<E>, ForeignError> {
        let descriptor = CallDescriptor::new(ret, args)
            .map_err(|e| ForeignError::invalid_signature(describe(symbol, ret, args), e))?;
        Ok(self.bind(symbol.to_string(), descriptor))
    }

    fn bind<E: From<ForeignError>>(
        &self,
        symbol: String,
        descriptor: CallDescriptor,
    ) -> ForeignDowncall<E> {
        match symbols::resolve(&self.chain, &symbol) {
            Some((address, owner)) => ForeignDowncall::bound(symbol, address, descriptor, Some(owner)),
            None => {
                log::warn!("native C symbol \"{symbol}\" not found");
                let cause = ForeignError::SymbolNotFound {
                    symbol: symbol.clone(),
                };
                ForeignDowncall::unbound(symbol, descriptor, cause)
            }
        }
    }
}

/// Render an explicit descriptor request for diagnostics, keeping void
/// arguments visible.
pub(crate) fn describe(name: &str, ret: CType, args: &[CType]) -> String {
    let args: Vec<&str> = args.iter().map(|t| t.name()).collect();
    format!("{ret} {name}({})", args.join(", "))
}

impl fmt::Debug for DowncallBinder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let chain: Vec<String> = self.chain.iter().map(|l| l.describe()).collect();
        f.debug_struct("DowncallBinder").field("chain", &chain).finish()
    }
}
