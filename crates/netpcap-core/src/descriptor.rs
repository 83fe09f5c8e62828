//! Call descriptors: the ordered argument types and optional return type of a
//! native function.

use std::fmt;

use crate::ctype::{CType, ValueLayout};
use crate::error::SignatureError;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallDescriptor {
    args: Vec<CType>,
    /// `None` for a void-returning function.
    ret: Option<CType>,
}

impl CallDescriptor {
    /// Build a descriptor from a return type and argument types.
    ///
    /// A `Void` return produces a void descriptor; `Void` among the
    /// arguments is rejected.
    pub fn new(ret: CType, args: &[CType]) -> Result<Self, SignatureError> {
        if let Some(err) = SignatureError::void_argument(args) {
            return Err(err);
        }
        Ok(Self {
            args: args.to_vec(),
            ret: (!ret.is_void()).then_some(ret),
        })
    }

    pub fn of_void(args: &[CType]) -> Result<Self, SignatureError> {
        Self::new(CType::Void, args)
    }

    pub fn args(&self) -> &[CType] {
        &self.args
    }

    /// Return type, `CType::Void` when the function returns nothing.
    pub fn return_type(&self) -> CType {
        self.ret.unwrap_or(CType::Void)
    }

    pub fn is_void(&self) -> bool {
        self.ret.is_none()
    }

    pub fn arg_layouts(&self) -> impl Iterator<Item = ValueLayout> + '_ {
        self.args.iter().filter_map(|t| t.layout())
    }

    pub fn return_layout(&self) -> Option<ValueLayout> {
        self.ret.and_then(CType::layout)
    }
}

impl fmt::Display for CallDescriptor {
    /// Renders the tag form `(ARGS)RET`. `va_list` has no letter and is
    /// shown as `A`, its layout.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for arg in &self.args {
            write!(f, "{}", arg.tag().unwrap_or('A'))?;
        }
        write!(f, "){}", self.return_type().tag().unwrap_or('A'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_void_return_is_absent() {
        let desc = CallDescriptor::new(CType::Void, &[CType::Int]).unwrap();
        assert!(desc.is_void());
        assert_eq!(desc.return_layout(), None);
        assert_eq!(desc.return_type(), CType::Void);
    }

    #[test]
    fn test_void_argument_rejected() {
        let err = CallDescriptor::new(CType::Int, &[CType::Pointer, CType::Void]).unwrap_err();
        assert_eq!(err, SignatureError::VoidArgument { index: 1 });
    }

    #[test]
    fn test_layouts_follow_args() {
        let desc = CallDescriptor::new(CType::Int, &[CType::Pointer, CType::Long]).unwrap();
        let layouts: Vec<_> = desc.arg_layouts().collect();
        assert_eq!(layouts, vec![ValueLayout::Address, ValueLayout::Long]);
        assert_eq!(desc.return_layout(), Some(ValueLayout::Int));
    }

    #[test]
    fn test_display() {
        let desc = CallDescriptor::new(CType::Int, &[CType::Pointer, CType::Pointer]).unwrap();
        assert_eq!(desc.to_string(), "(AA)I");
        let desc = CallDescriptor::of_void(&[CType::VaList]).unwrap();
        assert_eq!(desc.to_string(), "(A)V");
    }
}
