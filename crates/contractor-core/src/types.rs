//! Type references for the metadata object model.
//!
//! A [`TypeRef`] names a type the way compiled metadata does: either a
//! primitive, a definition in the unit, an instantiation of a generic
//! definition, or a generic parameter of the enclosing type or method.
//! Type definitions themselves live in [`TypeDef`](crate::member::TypeDef).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::id::TypeId;

/// A reference to a type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeRef {
    /// Built-in primitive type.
    Primitive(PrimitiveType),

    /// Non-generic (or open generic) type definition in the unit.
    Named(TypeId),

    /// Instantiation of a generic type definition: `Def<A, B>`.
    Generic { def: TypeId, args: Vec<TypeRef> },

    /// Generic parameter of the containing type, by position (`!0`).
    TypeParam(u16),

    /// Generic parameter of the containing method, by position (`!!0`).
    MethodParam(u16),

    /// Unmanaged pointer: `T*`.
    Pointer(Box<TypeRef>),

    /// Managed reference (ref/out parameters): `T&`.
    ByRef(Box<TypeRef>),

    /// Single-dimensional array: `T[]`.
    Array(Box<TypeRef>),
}

/// Primitive types with dedicated metadata encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveType {
    Void,
    Bool,
    Char,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    String,
    Object,
    IntPtr,
}

/// The kind of a type definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeKind {
    Class,
    Struct,
    Interface,
    Enum,
    Delegate,
}

/// Accessibility of a type or member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Visibility {
    Public,
    Protected,
    Internal,
    Private,
}

impl TypeRef {
    pub const VOID: TypeRef = TypeRef::Primitive(PrimitiveType::Void);
    pub const BOOL: TypeRef = TypeRef::Primitive(PrimitiveType::Bool);
    pub const I32: TypeRef = TypeRef::Primitive(PrimitiveType::I32);
    pub const STRING: TypeRef = TypeRef::Primitive(PrimitiveType::String);
    pub const OBJECT: TypeRef = TypeRef::Primitive(PrimitiveType::Object);

    /// Returns the type definition this reference points at, if any.
    ///
    /// Generic instantiations resolve to their definition.
    pub fn definition(&self) -> Option<TypeId> {
        match self {
            TypeRef::Named(id) => Some(*id),
            TypeRef::Generic { def, .. } => Some(*def),
            _ => None,
        }
    }

    /// Returns the instantiation arguments (empty for non-generic references).
    pub fn type_args(&self) -> &[TypeRef] {
        match self {
            TypeRef::Generic { args, .. } => args,
            _ => &[],
        }
    }

    /// Returns `true` for `void`.
    pub fn is_void(&self) -> bool {
        matches!(self, TypeRef::Primitive(PrimitiveType::Void))
    }

    /// Wraps this type in a managed reference.
    pub fn by_ref(self) -> TypeRef {
        TypeRef::ByRef(Box::new(self))
    }

    /// Substitutes generic parameters with concrete arguments.
    ///
    /// `TypeParam(i)` is replaced by `type_args[i]` and `MethodParam(i)` by
    /// `method_args[i]`. Indices outside the supplied argument lists are left
    /// untouched so that partially specialized references stay well-formed.
    pub fn specialize(&self, type_args: &[TypeRef], method_args: &[TypeRef]) -> TypeRef {
        match self {
            TypeRef::TypeParam(i) => type_args
                .get(*i as usize)
                .cloned()
                .unwrap_or_else(|| self.clone()),
            TypeRef::MethodParam(i) => method_args
                .get(*i as usize)
                .cloned()
                .unwrap_or_else(|| self.clone()),
            TypeRef::Generic { def, args } => TypeRef::Generic {
                def: *def,
                args: args
                    .iter()
                    .map(|a| a.specialize(type_args, method_args))
                    .collect(),
            },
            TypeRef::Pointer(inner) => {
                TypeRef::Pointer(Box::new(inner.specialize(type_args, method_args)))
            }
            TypeRef::ByRef(inner) => {
                TypeRef::ByRef(Box::new(inner.specialize(type_args, method_args)))
            }
            TypeRef::Array(inner) => {
                TypeRef::Array(Box::new(inner.specialize(type_args, method_args)))
            }
            TypeRef::Primitive(_) | TypeRef::Named(_) => self.clone(),
        }
    }

    /// Returns `true` if the reference mentions any generic parameter.
    pub fn is_open(&self) -> bool {
        match self {
            TypeRef::TypeParam(_) | TypeRef::MethodParam(_) => true,
            TypeRef::Generic { args, .. } => args.iter().any(TypeRef::is_open),
            TypeRef::Pointer(inner) | TypeRef::ByRef(inner) | TypeRef::Array(inner) => {
                inner.is_open()
            }
            TypeRef::Primitive(_) | TypeRef::Named(_) => false,
        }
    }
}

impl PrimitiveType {
    /// The C#-style keyword for this primitive.
    pub fn keyword(self) -> &'static str {
        match self {
            PrimitiveType::Void => "void",
            PrimitiveType::Bool => "bool",
            PrimitiveType::Char => "char",
            PrimitiveType::I8 => "sbyte",
            PrimitiveType::I16 => "short",
            PrimitiveType::I32 => "int",
            PrimitiveType::I64 => "long",
            PrimitiveType::U8 => "byte",
            PrimitiveType::U16 => "ushort",
            PrimitiveType::U32 => "uint",
            PrimitiveType::U64 => "ulong",
            PrimitiveType::F32 => "float",
            PrimitiveType::F64 => "double",
            PrimitiveType::String => "string",
            PrimitiveType::Object => "object",
            PrimitiveType::IntPtr => "nint",
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Primitive(p) => write!(f, "{}", p.keyword()),
            TypeRef::Named(id) => write!(f, "#{}", id),
            TypeRef::Generic { def, args } => {
                write!(f, "#{}<", def)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ">")
            }
            TypeRef::TypeParam(i) => write!(f, "!{}", i),
            TypeRef::MethodParam(i) => write!(f, "!!{}", i),
            TypeRef::Pointer(inner) => write!(f, "{}*", inner),
            TypeRef::ByRef(inner) => write!(f, "{}&", inner),
            TypeRef::Array(inner) => write!(f, "{}[]", inner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn specialize_replaces_type_and_method_params() {
        let list_of_t = TypeRef::Generic {
            def: TypeId(4),
            args: vec![TypeRef::TypeParam(0), TypeRef::MethodParam(0)],
        };
        let specialized = list_of_t.specialize(&[TypeRef::I32], &[TypeRef::STRING]);
        assert_eq!(
            specialized,
            TypeRef::Generic {
                def: TypeId(4),
                args: vec![TypeRef::I32, TypeRef::STRING],
            }
        );
        assert!(!specialized.is_open());
    }

    #[test]
    fn specialize_leaves_out_of_range_params() {
        let t = TypeRef::Array(Box::new(TypeRef::TypeParam(3)));
        assert_eq!(t.specialize(&[TypeRef::I32], &[]), t);
        assert!(t.is_open());
    }

    #[test]
    fn definition_of_generic_instance() {
        let t = TypeRef::Generic {
            def: TypeId(9),
            args: vec![TypeRef::BOOL],
        };
        assert_eq!(t.definition(), Some(TypeId(9)));
        assert_eq!(t.type_args(), &[TypeRef::BOOL]);
        assert_eq!(TypeRef::I32.definition(), None);
    }

    #[test]
    fn display_forms() {
        let t = TypeRef::Generic {
            def: TypeId(2),
            args: vec![TypeRef::I32, TypeRef::TypeParam(0).by_ref()],
        };
        assert_eq!(t.to_string(), "#2<int, !0&>");
        assert_eq!(TypeRef::Array(Box::new(TypeRef::MethodParam(1))).to_string(), "!!1[]");
    }

    fn closed_type() -> impl Strategy<Value = TypeRef> {
        let leaf = prop_oneof![
            Just(TypeRef::I32),
            Just(TypeRef::BOOL),
            (0u32..5).prop_map(|i| TypeRef::Named(TypeId(i))),
        ];
        leaf.prop_recursive(3, 16, 3, |inner| {
            prop_oneof![
                inner.clone().prop_map(|t| TypeRef::Array(Box::new(t))),
                (0u32..5, prop::collection::vec(inner, 1..3))
                    .prop_map(|(d, args)| TypeRef::Generic { def: TypeId(d), args }),
            ]
        })
    }

    proptest! {
        #[test]
        fn specializing_closed_types_is_identity(t in closed_type()) {
            prop_assert_eq!(t.specialize(&[TypeRef::STRING], &[TypeRef::OBJECT]), t);
        }
    }
}
