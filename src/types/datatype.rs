//! Datatype descriptors produced by the declaration parser

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use crate::frontend::ast::NodeId;

/// Machine word of the 32-bit target
pub const DATA_SIZE_DWORD: usize = 4;
pub const DATA_SIZE_WORD: usize = 2;
pub const DATA_SIZE_BYTE: usize = 1;
pub const DATA_SIZE_ZERO: usize = 0;

/// Modifier bits of a [`Datatype`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DatatypeFlags(u32);

impl DatatypeFlags {
    pub const NONE: Self = Self(0);
    pub const SIGNED: Self = Self(1 << 0);
    pub const STATIC: Self = Self(1 << 1);
    pub const CONST: Self = Self(1 << 2);
    pub const POINTER: Self = Self(1 << 3);
    pub const ARRAY: Self = Self(1 << 4);
    pub const EXTERN: Self = Self(1 << 5);
    pub const RESTRICT: Self = Self(1 << 6);
    pub const IGNORE_TYPE_CHECKING: Self = Self(1 << 7);
    pub const SECONDARY: Self = Self(1 << 8);
    pub const STRUCT_UNION_NO_NAME: Self = Self(1 << 9);
    pub const LITERAL: Self = Self(1 << 10);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }
}

impl BitOr for DatatypeFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for DatatypeFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Base kind of a datatype
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatatypeKind {
    Void,
    Char,
    Short,
    Integer,
    Long,
    Float,
    Double,
    Struct,
    Union,
}

impl DatatypeKind {
    /// Kind named by a base type keyword
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "void" => Some(Self::Void),
            "char" => Some(Self::Char),
            "short" => Some(Self::Short),
            "int" => Some(Self::Integer),
            "long" => Some(Self::Long),
            "float" => Some(Self::Float),
            "double" => Some(Self::Double),
            "struct" => Some(Self::Struct),
            "union" => Some(Self::Union),
            _ => None,
        }
    }

    /// Byte size of a primitive. `long` and `double` follow the 32-bit model
    /// and are both 4 bytes wide.
    pub fn primitive_size(self) -> usize {
        match self {
            Self::Void => DATA_SIZE_ZERO,
            Self::Char => DATA_SIZE_BYTE,
            Self::Short => DATA_SIZE_WORD,
            Self::Integer | Self::Long | Self::Float | Self::Double => DATA_SIZE_DWORD,
            Self::Struct | Self::Union => DATA_SIZE_ZERO,
        }
    }

    pub fn is_primitive(self) -> bool {
        !self.is_struct_or_union()
    }

    pub fn is_struct_or_union(self) -> bool {
        matches!(self, Self::Struct | Self::Union)
    }

    /// Whether another primitive keyword may follow this one
    pub fn allows_secondary(self) -> bool {
        matches!(self, Self::Long | Self::Short | Self::Double | Self::Float)
    }
}

/// Array dimensions of a declarator
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ArrayInfo {
    /// Size of each `[N]` in declaration order
    pub brackets: Vec<usize>,
    /// Total size in bytes
    pub size: usize,
}

/// A resolved type
#[derive(Debug, Clone, PartialEq)]
pub struct Datatype {
    pub flags: DatatypeFlags,
    pub kind: DatatypeKind,
    pub secondary: Option<Box<Datatype>>,
    /// Keyword or struct/union tag the type was written with
    pub type_str: String,
    /// Size of one element, not counting pointers or arrays
    pub size: usize,
    pub pointer_depth: usize,
    /// Body of the struct or union definition, when known
    pub struct_node: Option<NodeId>,
    pub array: Option<ArrayInfo>,
}

impl Datatype {
    pub fn new(kind: DatatypeKind, type_str: impl Into<String>) -> Self {
        Self {
            flags: DatatypeFlags::SIGNED,
            kind,
            secondary: None,
            type_str: type_str.into(),
            size: kind.primitive_size(),
            pointer_depth: 0,
            struct_node: None,
            array: None,
        }
    }

    /// Plain primitive named by `keyword`
    pub fn primitive(keyword: &str) -> Option<Self> {
        DatatypeKind::from_keyword(keyword)
            .filter(|kind| kind.is_primitive())
            .map(|kind| Self::new(kind, keyword))
    }

    pub fn is_pointer(&self) -> bool {
        self.flags.contains(DatatypeFlags::POINTER) && self.pointer_depth > 0
    }

    pub fn is_array(&self) -> bool {
        self.flags.contains(DatatypeFlags::ARRAY)
    }

    pub fn is_struct_or_union(&self) -> bool {
        self.kind.is_struct_or_union()
    }

    /// Size of one element: pointers are a machine word regardless of the pointee
    pub fn element_size(&self) -> usize {
        if self.flags.contains(DatatypeFlags::POINTER) {
            return DATA_SIZE_DWORD;
        }
        self.size
    }

    /// Size ignoring pointer-ness; arrays report their total size
    pub fn size_no_ptr(&self) -> usize {
        match &self.array {
            Some(array) if self.is_array() => array.size,
            _ => self.size,
        }
    }

    /// Storage size of a value of this type
    pub fn size(&self) -> usize {
        if self.is_pointer() && !self.is_array() {
            return DATA_SIZE_DWORD;
        }
        self.size_no_ptr()
    }
}

impl fmt::Display for Datatype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.flags.contains(DatatypeFlags::CONST) {
            write!(f, "const ")?;
        }
        if !self.flags.contains(DatatypeFlags::SIGNED) {
            write!(f, "unsigned ")?;
        }
        if self.is_struct_or_union() {
            let keyword = if self.kind == DatatypeKind::Struct { "struct" } else { "union" };
            write!(f, "{} ", keyword)?;
        }
        write!(f, "{}", self.type_str)?;
        if let Some(secondary) = &self.secondary {
            write!(f, " {}", secondary.type_str)?;
        }
        for _ in 0..self.pointer_depth {
            write!(f, "*")?;
        }
        if let Some(array) = &self.array {
            for n in &array.brackets {
                write!(f, "[{}]", n)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_primitive_sizes() {
        let sizes: Vec<usize> = ["void", "char", "short", "int", "long", "float", "double"]
            .iter()
            .map(|k| Datatype::primitive(k).unwrap().size())
            .collect();
        assert_eq!(sizes, vec![0, 1, 2, 4, 4, 4, 4]);
        assert!(Datatype::primitive("struct").is_none());
    }

    #[test]
    fn test_pointer_is_a_word() {
        let mut dt = Datatype::primitive("char").unwrap();
        dt.pointer_depth = 2;
        dt.flags |= DatatypeFlags::POINTER;
        assert_eq!(dt.size(), 4);
        assert_eq!(dt.element_size(), 4);
        assert_eq!(dt.to_string(), "char**");
    }

    #[test]
    fn test_array_size() {
        let mut dt = Datatype::primitive("short").unwrap();
        dt.flags |= DatatypeFlags::ARRAY;
        dt.array = Some(ArrayInfo {
            brackets: vec![3, 2],
            size: 12,
        });
        assert_eq!(dt.size(), 12);
        assert_eq!(dt.element_size(), 2);
    }

    #[test]
    fn test_flags() {
        let mut flags = DatatypeFlags::SIGNED | DatatypeFlags::CONST;
        assert!(flags.contains(DatatypeFlags::CONST));
        flags.remove(DatatypeFlags::SIGNED);
        assert!(!flags.contains(DatatypeFlags::SIGNED));
        flags.insert(DatatypeFlags::EXTERN);
        assert!(flags.contains(DatatypeFlags::EXTERN | DatatypeFlags::CONST));
    }
}
