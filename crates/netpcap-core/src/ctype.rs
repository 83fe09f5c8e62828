//! The C type table.
//!
//! Every type the binder can pass across the native boundary is listed here
//! exactly once, together with its native layout and the managed value type
//! that carries it on the Rust side. Both the downcall and the upcall side
//! derive their ABI shape from this table and nothing else.

use std::ffi::c_void;
use std::fmt;
use std::mem::{align_of, size_of};

/// A primitive C type that can appear in a binding signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CType {
    /// `void *` and friends.
    Pointer,
    /// `char` (signed byte).
    Char,
    /// `short`.
    Short,
    /// `int`.
    Int,
    /// 64-bit `long`.
    Long,
    /// `float`.
    Float,
    /// `double`.
    Double,
    /// `va_list`, passed as an address.
    VaList,
    /// No value. Only valid as a return type.
    Void,
}

impl CType {
    /// The full table, in declaration order.
    pub const ALL: [CType; 9] = [
        CType::Pointer,
        CType::Char,
        CType::Short,
        CType::Int,
        CType::Long,
        CType::Float,
        CType::Double,
        CType::VaList,
        CType::Void,
    ];

    /// Native memory layout, `None` for `Void`.
    pub const fn layout(self) -> Option<ValueLayout> {
        match self {
            CType::Pointer | CType::VaList => Some(ValueLayout::Address),
            CType::Char => Some(ValueLayout::Byte),
            CType::Short => Some(ValueLayout::Short),
            CType::Int => Some(ValueLayout::Int),
            CType::Long => Some(ValueLayout::Long),
            CType::Float => Some(ValueLayout::Float),
            CType::Double => Some(ValueLayout::Double),
            CType::Void => None,
        }
    }

    /// Managed type carrying values of this C type, `None` for `Void`.
    pub const fn managed_type(self) -> Option<ManagedType> {
        match self {
            CType::Pointer | CType::VaList => Some(ManagedType::Address),
            CType::Char => Some(ManagedType::I8),
            CType::Short => Some(ManagedType::I16),
            CType::Int => Some(ManagedType::I32),
            CType::Long => Some(ManagedType::I64),
            CType::Float => Some(ManagedType::F32),
            CType::Double => Some(ManagedType::F64),
            CType::Void => None,
        }
    }

    /// Map a signature letter to its type.
    pub const fn from_tag(tag: char) -> Option<CType> {
        match tag {
            'A' => Some(CType::Pointer),
            'B' => Some(CType::Char),
            'S' => Some(CType::Short),
            'I' => Some(CType::Int),
            'J' => Some(CType::Long),
            'F' => Some(CType::Float),
            'D' => Some(CType::Double),
            'V' => Some(CType::Void),
            _ => None,
        }
    }

    /// The signature letter for this type.
    ///
    /// `VaList` has no letter of its own and can only be requested through an
    /// explicit descriptor.
    pub const fn tag(self) -> Option<char> {
        match self {
            CType::Pointer => Some('A'),
            CType::Char => Some('B'),
            CType::Short => Some('S'),
            CType::Int => Some('I'),
            CType::Long => Some('J'),
            CType::Float => Some('F'),
            CType::Double => Some('D'),
            CType::Void => Some('V'),
            CType::VaList => None,
        }
    }

    pub const fn is_void(self) -> bool {
        matches!(self, CType::Void)
    }

    /// C spelling, used in diagnostics.
    pub const fn name(self) -> &'static str {
        match self {
            CType::Pointer => "void*",
            CType::Char => "char",
            CType::Short => "short",
            CType::Int => "int",
            CType::Long => "long",
            CType::Float => "float",
            CType::Double => "double",
            CType::VaList => "va_list",
            CType::Void => "void",
        }
    }
}

impl fmt::Display for CType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Native memory layout of a single value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueLayout {
    Address,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
}

impl ValueLayout {
    pub const fn size(self) -> usize {
        match self {
            ValueLayout::Address => size_of::<*const c_void>(),
            ValueLayout::Byte => size_of::<i8>(),
            ValueLayout::Short => size_of::<i16>(),
            ValueLayout::Int => size_of::<i32>(),
            ValueLayout::Long => size_of::<i64>(),
            ValueLayout::Float => size_of::<f32>(),
            ValueLayout::Double => size_of::<f64>(),
        }
    }

    pub const fn align(self) -> usize {
        match self {
            ValueLayout::Address => align_of::<*const c_void>(),
            ValueLayout::Byte => align_of::<i8>(),
            ValueLayout::Short => align_of::<i16>(),
            ValueLayout::Int => align_of::<i32>(),
            ValueLayout::Long => align_of::<i64>(),
            ValueLayout::Float => align_of::<f32>(),
            ValueLayout::Double => align_of::<f64>(),
        }
    }

    pub const fn encoding(self) -> Encoding {
        match self {
            ValueLayout::Address => Encoding::Address,
            ValueLayout::Byte | ValueLayout::Short | ValueLayout::Int | ValueLayout::Long => {
                Encoding::SignedInteger
            }
            ValueLayout::Float | ValueLayout::Double => Encoding::Float,
        }
    }
}

/// How the bits of a [`ValueLayout`] are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    Address,
    SignedInteger,
    Float,
}

/// Rust primitive carrying a C value on the managed side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ManagedType {
    Address,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
}

impl ManagedType {
    pub const fn name(self) -> &'static str {
        match self {
            ManagedType::Address => "NativeAddress",
            ManagedType::I8 => "i8",
            ManagedType::I16 => "i16",
            ManagedType::I32 => "i32",
            ManagedType::I64 => "i64",
            ManagedType::F32 => "f32",
            ManagedType::F64 => "f64",
        }
    }
}

impl fmt::Display for ManagedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_void_has_no_layout_or_managed_type() {
        assert_eq!(CType::Void.layout(), None);
        assert_eq!(CType::Void.managed_type(), None);
        assert!(CType::Void.is_void());
    }

    #[test]
    fn test_every_non_void_type_is_complete() {
        for ctype in CType::ALL.into_iter().filter(|t| !t.is_void()) {
            let layout = ctype.layout().unwrap();
            assert!(layout.size() > 0, "{ctype} has zero size");
            assert!(layout.align() > 0);
            assert!(ctype.managed_type().is_some());
        }
    }

    #[test]
    fn test_va_list_is_passed_as_address() {
        assert_eq!(CType::VaList.layout(), CType::Pointer.layout());
        assert_eq!(CType::VaList.managed_type(), Some(ManagedType::Address));
        assert_eq!(CType::VaList.tag(), None);
    }

    #[test]
    fn test_tags_round_trip() {
        for ctype in CType::ALL {
            if let Some(tag) = ctype.tag() {
                assert_eq!(CType::from_tag(tag), Some(ctype));
            }
        }
        assert_eq!(CType::from_tag('C'), None);
        assert_eq!(CType::from_tag('a'), None);
    }

    #[test]
    fn test_fixed_width_layouts() {
        assert_eq!(ValueLayout::Byte.size(), 1);
        assert_eq!(ValueLayout::Short.size(), 2);
        assert_eq!(ValueLayout::Int.size(), 4);
        assert_eq!(ValueLayout::Long.size(), 8);
        assert_eq!(ValueLayout::Float.size(), 4);
        assert_eq!(ValueLayout::Double.size(), 8);
        assert_eq!(ValueLayout::Address.size(), size_of::<usize>());
        assert_eq!(ValueLayout::Long.encoding(), Encoding::SignedInteger);
        assert_eq!(ValueLayout::Double.encoding(), Encoding::Float);
    }
}
