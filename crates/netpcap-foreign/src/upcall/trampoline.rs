//! Native-callable trampolines built from libffi closures.

use std::ffi::c_void;
use std::panic::{self, AssertUnwindSafe};

use libffi::low::ffi_cif;
use libffi::middle::Closure;
use libffi::raw::ffi_arg;

use netpcap_core::{CValue, CallDescriptor, NativeAddress, ValueLayout};

use crate::call::prepare_cif;
use crate::upcall::class::UpcallFn;

/// Everything the trampoline needs to dispatch one native call.
pub(crate) struct UpcallThunk {
    pub(crate) method: String,
    pub(crate) descriptor: CallDescriptor,
    pub(crate) target: UpcallFn,
}

/// A libffi closure together with the thunk it dispatches to.
pub(crate) struct Trampoline {
    // Declared before `thunk` so the closure is freed first.
    closure: Closure<'static>,
    thunk: Box<UpcallThunk>,
}

// SAFETY: the closure's code and CIF are immutable once prepared, and the
// thunk only holds `Send + Sync` data.
unsafe impl Send for Trampoline {}
unsafe impl Sync for Trampoline {}

impl Trampoline {
    pub(crate) fn new(thunk: UpcallThunk) -> Self {
        let thunk = Box::new(thunk);
        let cif = prepare_cif(&thunk.descriptor);
        // SAFETY: the thunk lives on the heap for as long as the trampoline
        // does, and the closure referencing it is dropped before it.
        let userdata: &'static UpcallThunk = unsafe { &*(thunk.as_ref() as *const UpcallThunk) };
        let closure = Closure::new(cif, dispatch, userdata);
        Self { closure, thunk }
    }

    pub(crate) fn address(&self) -> NativeAddress {
        NativeAddress::from_ptr(*self.closure.code_ptr() as *const c_void)
    }

    pub(crate) fn method(&self) -> &str {
        &self.thunk.method
    }
}

unsafe fn read_arg(layout: ValueLayout, slot: *const c_void) -> CValue {
    unsafe {
        match layout {
            ValueLayout::Address => {
                CValue::Address(NativeAddress::from_mut_ptr(*(slot as *const *mut c_void)))
            }
            ValueLayout::Byte => CValue::Char(*(slot as *const i8)),
            ValueLayout::Short => CValue::Short(*(slot as *const i16)),
            ValueLayout::Int => CValue::Int(*(slot as *const i32)),
            ValueLayout::Long => CValue::Long(*(slot as *const i64)),
            ValueLayout::Float => CValue::Float(*(slot as *const f32)),
            ValueLayout::Double => CValue::Double(*(slot as *const f64)),
        }
    }
}

/// Store `value` in libffi's return buffer. Narrow integers are widened to
/// `ffi_arg`; the buffer is at least as large as the return type.
unsafe fn write_return(value: CValue, result: *mut ffi_arg) {
    unsafe {
        match value {
            CValue::Void => {}
            CValue::Char(v) => *result = i64::from(v) as ffi_arg,
            CValue::Short(v) => *result = i64::from(v) as ffi_arg,
            CValue::Int(v) => *result = i64::from(v) as ffi_arg,
            CValue::Long(v) => *(result as *mut i64) = v,
            CValue::Float(v) => *(result as *mut f32) = v,
            CValue::Double(v) => *(result as *mut f64) = v,
            CValue::Address(a) => *(result as *mut *mut c_void) = a.as_ptr(),
        }
    }
}

unsafe extern "C" fn dispatch(
    _cif: &ffi_cif,
    result: &mut ffi_arg,
    args: *const *const c_void,
    thunk: &UpcallThunk,
) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let values: Vec<CValue> = thunk
            .descriptor
            .arg_layouts()
            .enumerate()
            .map(|(i, layout)| unsafe { read_arg(layout, *args.add(i)) })
            .collect();
        (thunk.target)(&values)
    }));

    let value = match outcome {
        Ok(value) => value,
        Err(_) => {
            log::error!("upcall '{}' panicked across the native boundary", thunk.method);
            std::process::abort();
        }
    };

    let expected = thunk.descriptor.return_type();
    let value = if value.conforms_to(expected) {
        value
    } else {
        log::error!(
            "upcall '{}' returned {value}, expected {expected}; returning zero",
            thunk.method
        );
        CValue::zero(expected)
    };
    unsafe { write_return(value, result) };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use netpcap_core::CType;

    fn trampoline(sig_ret: CType, args: &[CType], target: UpcallFn) -> Trampoline {
        Trampoline::new(UpcallThunk {
            method: "test".into(),
            descriptor: CallDescriptor::new(sig_ret, args).unwrap(),
            target,
        })
    }

    #[test]
    fn test_trampoline_is_callable() {
        let t = trampoline(
            CType::Int,
            &[CType::Int, CType::Int],
            Arc::new(|args: &[CValue]| {
                CValue::Int(args[0].as_int().unwrap_or(0) - args[1].as_int().unwrap_or(0))
            }),
        );
        assert!(!t.address().is_null());
        assert_eq!(t.method(), "test");
        let f: extern "C" fn(i32, i32) -> i32 = unsafe { std::mem::transmute(t.address().as_ptr::<c_void>()) };
        assert_eq!(f(10, 3), 7);
        assert_eq!(f(-4, 4), -8);
    }

    #[test]
    fn test_trampoline_doubles_and_chars() {
        let t = trampoline(
            CType::Double,
            &[CType::Char, CType::Double],
            Arc::new(|args: &[CValue]| {
                CValue::Double(f64::from(args[0].as_char().unwrap_or(0)) * args[1].as_double().unwrap_or(0.0))
            }),
        );
        let f: extern "C" fn(i8, f64) -> f64 = unsafe { std::mem::transmute(t.address().as_ptr::<c_void>()) };
        assert_eq!(f(-2, 1.25), -2.5);
    }

    #[test]
    fn test_mismatched_return_becomes_zero() {
        let t = trampoline(CType::Long, &[], Arc::new(|_: &[CValue]| CValue::Int(5)));
        let f: extern "C" fn() -> i64 = unsafe { std::mem::transmute(t.address().as_ptr::<c_void>()) };
        assert_eq!(f(), 0);
    }

    #[test]
    fn test_void_trampoline_sees_pointer() {
        let seen = Arc::new(std::sync::Mutex::new(None));
        let sink = Arc::clone(&seen);
        let t = trampoline(
            CType::Void,
            &[CType::Pointer],
            Arc::new(move |args: &[CValue]| {
                *sink.lock().unwrap() = args[0].as_address();
                CValue::Void
            }),
        );
        let f: extern "C" fn(*mut c_void) = unsafe { std::mem::transmute(t.address().as_ptr::<c_void>()) };
        let mut x = 1u32;
        f((&mut x as *mut u32).cast());
        assert_eq!(*seen.lock().unwrap(), Some(NativeAddress::from_mut_ptr(&mut x as *mut u32)));
    }
}
