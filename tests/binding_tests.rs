//! Binding real libc entry points through the process symbol table.

#![cfg(unix)]

use std::ffi::c_void;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use netpcap::prelude::*;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ============================================================================
// Downcalls
// ============================================================================

#[test]
fn test_getpid() {
    init_logging();
    let getpid: ForeignDowncall = DowncallBinder::process()
        .bind_by_signature("getpid()I")
        .unwrap();
    assert!(getpid.is_bound());
    assert!(getpid.address().is_some());
    assert!(getpid.descriptor().args().is_empty());
    assert_eq!(getpid.descriptor().return_type(), CType::Int);

    let pid = unsafe { getpid.invoke_int(&[]) }.unwrap();
    assert_eq!(pid as u32, std::process::id());
}

#[test]
fn test_abs_and_labs() {
    init_logging();
    let binder = DowncallBinder::process();
    let abs: ForeignDowncall = binder.bind_by_signature("abs(I)I").unwrap();
    let labs: ForeignDowncall = binder
        .bind_by_descriptor("labs", CType::Long, &[CType::Long])
        .unwrap();

    assert_eq!(unsafe { abs.invoke(&[CValue::Int(-17)]) }.unwrap(), CValue::Int(17));
    assert_eq!(
        unsafe { labs.invoke_long(&[CValue::Long(-(1 << 40))]) }.unwrap(),
        1 << 40
    );
}

#[test]
fn test_argument_checks_happen_before_the_call() {
    let abs: ForeignDowncall = DowncallBinder::process()
        .bind_by_signature("abs(I)I")
        .unwrap();
    assert!(matches!(
        unsafe { abs.invoke(&[]) },
        Err(ForeignError::ArgumentCount { expected: 1, found: 0, .. })
    ));
    assert!(matches!(
        unsafe { abs.invoke(&[CValue::Double(1.0)]) },
        Err(ForeignError::ArgumentType { index: 0, .. })
    ));
}

#[test]
fn test_missing_symbol_is_deferred() {
    init_logging();
    let missing: ForeignDowncall = DowncallBinder::process()
        .bind_by_signature("netpcap_no_such_symbol(AA)I")
        .unwrap();
    assert!(!missing.is_bound());
    let err = unsafe {
        missing.invoke(&[
            CValue::Address(NativeAddress::NULL),
            CValue::Address(NativeAddress::NULL),
        ])
    }
    .unwrap_err();
    assert_eq!(
        err.cause(),
        Some(&ForeignError::SymbolNotFound {
            symbol: "netpcap_no_such_symbol".into()
        })
    );
}

#[test]
fn test_setfilter_signature() {
    let signature = Signature::parse("pcap_setfilter(AA)I").unwrap();
    assert_eq!(signature.name(), "pcap_setfilter");
    assert_eq!(signature.args(), &[CType::Pointer, CType::Pointer]);
    assert_eq!(signature.return_type(), CType::Int);
}

// ============================================================================
// Upcalls
// ============================================================================

fn comparator(calls: &Arc<AtomicUsize>) -> UpcallClass {
    let calls = Arc::clone(calls);
    UpcallClass::builder("IntComparator")
        .method("compare(AA)I", move |args: &[CValue]| {
            calls.fetch_add(1, Ordering::Relaxed);
            let read = |v: &CValue| {
                v.as_address()
                    .map_or(0, |a| unsafe { *a.as_ptr::<i32>() })
            };
            CValue::Int(read(&args[0]).cmp(&read(&args[1])) as i32)
        })
        .unwrap()
        .build()
}

#[cfg(target_pointer_width = "64")]
#[test]
fn test_qsort_with_upcall_comparator() {
    init_logging();
    let calls = Arc::new(AtomicUsize::new(0));
    let class = comparator(&calls);
    let scope = UpcallScope::new("qsort");

    let mut session = BinderSession::open("libc");
    let qsort: ForeignDowncall = session.downcall("qsort(AJJA)V").unwrap();
    let compare = session.upcall(&scope, &class, "compare(AA)I").unwrap();
    session.close().unwrap();

    let mut values = [42i32, -7, 19, 0, 3, -100, 8];
    unsafe {
        qsort.invoke_void(&[
            CValue::Address(NativeAddress::from_mut_ptr(values.as_mut_ptr())),
            CValue::Long(values.len() as i64),
            CValue::Long(size_of::<i32>() as i64),
            CValue::Address(compare.address().unwrap()),
        ])
    }
    .unwrap();

    assert_eq!(values, [-100, -7, 0, 3, 8, 19, 42]);
    assert!(calls.load(Ordering::Relaxed) > 0);
}

#[test]
fn test_upcall_stub_is_callable_through_a_downcall() {
    let calls = Arc::new(AtomicUsize::new(0));
    let class = comparator(&calls);
    let scope = UpcallScope::new("direct");
    let compare = UpcallBinder::default()
        .bind_by_signature(&scope, &class, "compare(AA)I")
        .unwrap();

    let call: ForeignDowncall = ForeignDowncall::from_address(
        "compare",
        compare.address().unwrap(),
        compare.descriptor().clone(),
    );
    let (a, b) = (5i32, 9i32);
    let result = unsafe {
        call.invoke_int(&[
            CValue::Address(NativeAddress::from_ptr(&a as *const i32)),
            CValue::Address(NativeAddress::from_ptr(&b as *const i32)),
        ])
    }
    .unwrap();
    assert_eq!(result, -1);
    assert_eq!(calls.load(Ordering::Relaxed), 1);
}

#[test]
fn test_release_invalidates_address() {
    let calls = Arc::new(AtomicUsize::new(0));
    let class = comparator(&calls);
    let scope = UpcallScope::new("released");
    let compare = UpcallBinder::default()
        .bind_by_signature(&scope, &class, "compare(AA)I")
        .unwrap();
    let address = compare.address().unwrap();
    assert_ne!(address.as_ptr::<c_void>(), std::ptr::null_mut());

    scope.release();
    assert_eq!(
        compare.address(),
        Err(ForeignError::ScopeReleased {
            scope: "released".into()
        })
    );
}
