//! Values crossing the native boundary.

use std::ffi::c_void;
use std::fmt;

use crate::ctype::{CType, ManagedType};

/// An opaque native address.
///
/// Addresses are handed out by symbol lookup and upcall stubs and are passed
/// back into downcalls. They are never exposed as an integer; the only way
/// out is [`NativeAddress::as_ptr`].
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct NativeAddress(*mut c_void);

// SAFETY: an address is just a value; dereferencing it is always unsafe and
// goes through `as_ptr`.
unsafe impl Send for NativeAddress {}
unsafe impl Sync for NativeAddress {}

impl NativeAddress {
    pub const NULL: NativeAddress = NativeAddress(std::ptr::null_mut());

    pub fn from_ptr<T>(ptr: *const T) -> Self {
        NativeAddress(ptr as *mut c_void)
    }

    pub fn from_mut_ptr<T>(ptr: *mut T) -> Self {
        NativeAddress(ptr.cast())
    }

    pub fn as_ptr<T>(self) -> *mut T {
        self.0.cast()
    }

    pub fn is_null(self) -> bool {
        self.0.is_null()
    }
}

impl Default for NativeAddress {
    fn default() -> Self {
        NativeAddress::NULL
    }
}

impl fmt::Debug for NativeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeAddress({:p})", self.0)
    }
}

impl fmt::Display for NativeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:p}", self.0)
    }
}

/// A managed value of one of the table's primitive types.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CValue {
    Void,
    Address(NativeAddress),
    Char(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
}

impl CValue {
    /// Managed type of the payload, `None` for `Void`.
    pub fn managed_type(&self) -> Option<ManagedType> {
        match self {
            CValue::Void => None,
            CValue::Address(_) => Some(ManagedType::Address),
            CValue::Char(_) => Some(ManagedType::I8),
            CValue::Short(_) => Some(ManagedType::I16),
            CValue::Int(_) => Some(ManagedType::I32),
            CValue::Long(_) => Some(ManagedType::I64),
            CValue::Float(_) => Some(ManagedType::F32),
            CValue::Double(_) => Some(ManagedType::F64),
        }
    }

    /// Whether this value can be passed where `ctype` is expected.
    pub fn conforms_to(&self, ctype: CType) -> bool {
        self.managed_type() == ctype.managed_type()
    }

    /// The zero value for `ctype`.
    pub fn zero(ctype: CType) -> CValue {
        match ctype.managed_type() {
            None => CValue::Void,
            Some(ManagedType::Address) => CValue::Address(NativeAddress::NULL),
            Some(ManagedType::I8) => CValue::Char(0),
            Some(ManagedType::I16) => CValue::Short(0),
            Some(ManagedType::I32) => CValue::Int(0),
            Some(ManagedType::I64) => CValue::Long(0),
            Some(ManagedType::F32) => CValue::Float(0.0),
            Some(ManagedType::F64) => CValue::Double(0.0),
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, CValue::Void)
    }

    pub fn as_address(&self) -> Option<NativeAddress> {
        match *self {
            CValue::Address(address) => Some(address),
            _ => None,
        }
    }

    pub fn as_char(&self) -> Option<i8> {
        match *self {
            CValue::Char(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_short(&self) -> Option<i16> {
        match *self {
            CValue::Short(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match *self {
            CValue::Int(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match *self {
            CValue::Long(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match *self {
            CValue::Float(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match *self {
            CValue::Double(v) => Some(v),
            _ => None,
        }
    }
}

impl From<NativeAddress> for CValue {
    fn from(value: NativeAddress) -> Self {
        CValue::Address(value)
    }
}

impl From<i8> for CValue {
    fn from(value: i8) -> Self {
        CValue::Char(value)
    }
}

impl From<i16> for CValue {
    fn from(value: i16) -> Self {
        CValue::Short(value)
    }
}

impl From<i32> for CValue {
    fn from(value: i32) -> Self {
        CValue::Int(value)
    }
}

impl From<i64> for CValue {
    fn from(value: i64) -> Self {
        CValue::Long(value)
    }
}

impl From<f32> for CValue {
    fn from(value: f32) -> Self {
        CValue::Float(value)
    }
}

impl From<f64> for CValue {
    fn from(value: f64) -> Self {
        CValue::Double(value)
    }
}

impl fmt::Display for CValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CValue::Void => write!(f, "void"),
            CValue::Address(a) => write!(f, "{a}"),
            CValue::Char(v) => write!(f, "{v}"),
            CValue::Short(v) => write!(f, "{v}"),
            CValue::Int(v) => write!(f, "{v}"),
            CValue::Long(v) => write!(f, "{v}"),
            CValue::Float(v) => write!(f, "{v}"),
            CValue::Double(v) => write!(f, "{v}"),
        }
    }
}
