//! Call handles: a prepared libffi call interface bound to a code address.

use std::ffi::c_void;
use std::fmt;

use libffi::middle::{Arg, Cif, CodePtr, Type};
use libffi::raw::ffi_arg;

use netpcap_core::{CValue, CallDescriptor, NativeAddress, ValueLayout};

use crate::error::ForeignError;

/// libffi type for a layout from the type table.
pub(crate) fn ffi_type(layout: ValueLayout) -> Type {
    match layout {
        ValueLayout::Address => Type::pointer(),
        ValueLayout::Byte => Type::i8(),
        ValueLayout::Short => Type::i16(),
        ValueLayout::Int => Type::i32(),
        ValueLayout::Long => Type::i64(),
        ValueLayout::Float => Type::f32(),
        ValueLayout::Double => Type::f64(),
    }
}

/// Prepare a call interface for `descriptor` using the platform's default ABI.
pub(crate) fn prepare_cif(descriptor: &CallDescriptor) -> Cif {
    let args: Vec<Type> = descriptor.arg_layouts().map(ffi_type).collect();
    let ret = descriptor.return_layout().map_or_else(Type::void, ffi_type);
    Cif::new(args, ret)
}

/// Check `args` against the descriptor before anything reaches native code.
pub(crate) fn check_args(
    symbol: &str,
    descriptor: &CallDescriptor,
    args: &[CValue],
) -> Result<(), ForeignError> {
    let expected = descriptor.args();
    if expected.len() != args.len() {
        return Err(ForeignError::ArgumentCount {
            symbol: symbol.to_string(),
            expected: expected.len(),
            found: args.len(),
        });
    }
    for (index, (ctype, value)) in expected.iter().zip(args).enumerate() {
        if !value.conforms_to(*ctype) {
            return Err(ForeignError::ArgumentType {
                symbol: symbol.to_string(),
                index,
                expected: *ctype,
                found: value
                    .managed_type()
                    .map_or_else(|| "void".to_string(), |t| t.to_string()),
            });
        }
    }
    Ok(())
}

fn as_arg(value: &CValue) -> Arg {
    match value {
        CValue::Address(address) => Arg::new(address),
        CValue::Char(v) => Arg::new(v),
        CValue::Short(v) => Arg::new(v),
        CValue::Int(v) => Arg::new(v),
        CValue::Long(v) => Arg::new(v),
        CValue::Float(v) => Arg::new(v),
        CValue::Double(v) => Arg::new(v),
        // Rejected by `check_args`; void arguments never reach the CIF.
        CValue::Void => Arg::new(&()),
    }
}

/// An invocable native function.
pub(crate) struct CallHandle {
    cif: Cif,
    code: CodePtr,
    descriptor: CallDescriptor,
}

// SAFETY: the CIF is fully prepared on construction and only read by
// `ffi_call`; the code pointer is an immutable address.
unsafe impl Send for CallHandle {}
unsafe impl Sync for CallHandle {}

impl CallHandle {
    pub(crate) fn new(address: NativeAddress, descriptor: CallDescriptor) -> Self {
        Self {
            cif: prepare_cif(&descriptor),
            code: CodePtr::from_ptr(address.as_ptr::<c_void>()),
            descriptor,
        }
    }

    pub(crate) fn descriptor(&self) -> &CallDescriptor {
        &self.descriptor
    }

    /// Validate `args` and call the native function.
    ///
    /// # Safety
    ///
    /// The descriptor must match the native function's real C signature and
    /// every address argument must be valid for the callee.
    pub(crate) unsafe fn invoke(
        &self,
        symbol: &str,
        args: &[CValue],
    ) -> Result<CValue, ForeignError> {
        check_args(symbol, &self.descriptor, args)?;
        let ffi_args: Vec<Arg> = args.iter().map(as_arg).collect();
        let code = self.code;

        // Integral returns narrower than a register come back widened to
        // `ffi_arg`.
        let value = unsafe {
            match self.descriptor.return_layout() {
                None => {
                    self.cif.call::<()>(code, &ffi_args);
                    CValue::Void
                }
                Some(ValueLayout::Address) => CValue::Address(NativeAddress::from_mut_ptr(
                    self.cif.call::<*mut c_void>(code, &ffi_args),
                )),
                Some(ValueLayout::Byte) => CValue::Char(self.cif.call::<ffi_arg>(code, &ffi_args) as i8),
                Some(ValueLayout::Short) => {
                    CValue::Short(self.cif.call::<ffi_arg>(code, &ffi_args) as i16)
                }
                Some(ValueLayout::Int) => CValue::Int(self.cif.call::<ffi_arg>(code, &ffi_args) as i32),
                Some(ValueLayout::Long) => CValue::Long(self.cif.call::<i64>(code, &ffi_args)),
                Some(ValueLayout::Float) => CValue::Float(self.cif.call::<f32>(code, &ffi_args)),
                Some(ValueLayout::Double) => CValue::Double(self.cif.call::<f64>(code, &ffi_args)),
            }
        };
        Ok(value)
    }
}

impl fmt::Debug for CallHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallHandle")
            .field("code", &self.code.as_ptr())
            .field("descriptor", &self.descriptor.to_string())
            .finish()
    }
}
