//! Type, method and field definitions.
//!
//! [`MethodDef`] is the full method metadata -- the decompiled body, when
//! present, is a [`Block`] in normalized linear-block form. Custom attributes
//! are kept by full type name since the contract machinery only ever tests
//! for the presence of well-known marker attributes.

use serde::{Deserialize, Serialize};

use crate::ast::{Block, Literal, MethodRef, Param};
use crate::id::{FieldId, MethodId, TypeId};
use crate::types::{TypeKind, TypeRef, Visibility};

/// A positional custom-attribute argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeArg {
    Literal(Literal),
    Type(TypeRef),
}

/// A custom attribute attached to a unit, type or method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    /// Full name of the attribute type, e.g. `System.Diagnostics.Contracts.PureAttribute`.
    pub type_name: String,
    pub args: Vec<AttributeArg>,
}

impl Attribute {
    /// A marker attribute without arguments.
    pub fn marker(type_name: impl Into<String>) -> Self {
        Attribute {
            type_name: type_name.into(),
            args: Vec::new(),
        }
    }

    /// An attribute whose single argument is a `typeof(...)`.
    pub fn with_type(type_name: impl Into<String>, ty: TypeRef) -> Self {
        Attribute {
            type_name: type_name.into(),
            args: vec![AttributeArg::Type(ty)],
        }
    }

    /// The first `typeof(...)` argument, if any.
    pub fn type_arg(&self) -> Option<&TypeRef> {
        self.args.iter().find_map(|a| match a {
            AttributeArg::Type(t) => Some(t),
            AttributeArg::Literal(_) => None,
        })
    }
}

/// Returns `true` if `attributes` contains one named `type_name`.
pub fn has_attribute(attributes: &[Attribute], type_name: &str) -> bool {
    attributes.iter().any(|a| a.type_name == type_name)
}

/// Finds the attribute named `type_name`.
pub fn find_attribute<'a>(attributes: &'a [Attribute], type_name: &str) -> Option<&'a Attribute> {
    attributes.iter().find(|a| a.type_name == type_name)
}

/// Method modifiers relevant to override and contract resolution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodFlags {
    pub is_static: bool,
    pub is_virtual: bool,
    pub is_abstract: bool,
    /// `newslot`: the method starts a new vtable slot and overrides nothing.
    pub is_new_slot: bool,
    pub is_constructor: bool,
}

/// Full method definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodDef {
    pub id: MethodId,
    pub name: String,
    pub declaring_type: TypeId,
    pub visibility: Visibility,
    pub flags: MethodFlags,
    /// Names of the method's own generic parameters.
    pub generic_params: Vec<String>,
    /// Parameters in declaration order (`this` excluded).
    pub params: Vec<Param>,
    pub return_type: TypeRef,
    pub attributes: Vec<Attribute>,
    /// Methods this one explicitly implements or overrides (MethodImpl).
    pub explicit_overrides: Vec<MethodRef>,
    /// Decompiled body. `None` for abstract, interface and external methods.
    pub body: Option<Block>,
}

impl MethodDef {
    /// Creates a public, non-virtual instance method with no body.
    pub fn new(
        id: MethodId,
        declaring_type: TypeId,
        name: String,
        params: Vec<Param>,
        return_type: TypeRef,
    ) -> Self {
        MethodDef {
            id,
            name,
            declaring_type,
            visibility: Visibility::Public,
            flags: MethodFlags::default(),
            generic_params: Vec::new(),
            params,
            return_type,
            attributes: Vec::new(),
            explicit_overrides: Vec::new(),
            body: None,
        }
    }

    /// Returns the number of parameters.
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn is_static(&self) -> bool {
        self.flags.is_static
    }

    pub fn is_constructor(&self) -> bool {
        self.flags.is_constructor
    }

    pub fn has_attribute(&self, type_name: &str) -> bool {
        has_attribute(&self.attributes, type_name)
    }

    /// A non-generic reference to this method.
    pub fn reference(&self) -> MethodRef {
        MethodRef::new(self.id, self.name.clone())
    }
}

/// Full field definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDef {
    pub id: FieldId,
    pub name: String,
    pub declaring_type: TypeId,
    pub ty: TypeRef,
    pub is_static: bool,
}

/// Full type definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeDef {
    pub id: TypeId,
    pub namespace: String,
    pub name: String,
    pub kind: TypeKind,
    pub visibility: Visibility,
    /// Names of the type's generic parameters.
    pub generic_params: Vec<String>,
    pub base: Option<TypeRef>,
    pub interfaces: Vec<TypeRef>,
    pub methods: Vec<MethodId>,
    pub fields: Vec<FieldId>,
    pub attributes: Vec<Attribute>,
}

impl TypeDef {
    /// `Namespace.Name`, or just `Name` in the global namespace.
    pub fn full_name(&self) -> String {
        full_name(&self.namespace, &self.name)
    }

    pub fn is_interface(&self) -> bool {
        self.kind == TypeKind::Interface
    }

    pub fn has_attribute(&self, type_name: &str) -> bool {
        has_attribute(&self.attributes, type_name)
    }

    /// The open self-reference, `Name<!0, !1, ...>` for generic types.
    pub fn self_ref(&self) -> TypeRef {
        if self.generic_params.is_empty() {
            TypeRef::Named(self.id)
        } else {
            TypeRef::Generic {
                def: self.id,
                args: (0..self.generic_params.len() as u16)
                    .map(TypeRef::TypeParam)
                    .collect(),
            }
        }
    }
}

/// Joins a namespace and a simple name.
pub fn full_name(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", namespace, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_defaults() {
        let m = MethodDef::new(
            MethodId(1),
            TypeId(0),
            "Add".into(),
            vec![Param::new("a", TypeRef::I32), Param::new("b", TypeRef::I32)],
            TypeRef::I32,
        );

        assert_eq!(m.arity(), 2);
        assert_eq!(m.visibility, Visibility::Public);
        assert!(!m.is_static());
        assert!(!m.is_constructor());
        assert!(m.body.is_none());
        assert_eq!(m.reference().name, "Add");
    }

    #[test]
    fn attribute_lookup() {
        let attrs = vec![
            Attribute::marker("System.Diagnostics.Contracts.PureAttribute"),
            Attribute::with_type("Sample.TagAttribute", TypeRef::Named(TypeId(3))),
        ];
        assert!(has_attribute(&attrs, "System.Diagnostics.Contracts.PureAttribute"));
        assert!(!has_attribute(&attrs, "PureAttribute"));
        let tag = find_attribute(&attrs, "Sample.TagAttribute").unwrap();
        assert_eq!(tag.type_arg(), Some(&TypeRef::Named(TypeId(3))));
    }

    #[test]
    fn full_name_with_and_without_namespace() {
        assert_eq!(full_name("System", "String"), "System.String");
        assert_eq!(full_name("", "Program"), "Program");
    }

    #[test]
    fn serde_roundtrip_method_def() {
        let mut m = MethodDef::new(
            MethodId(5),
            TypeId(2),
            "Get".into(),
            vec![Param::new("index", TypeRef::I32)],
            TypeRef::TypeParam(0),
        );
        m.flags.is_virtual = true;
        m.attributes.push(Attribute::marker("System.Diagnostics.Contracts.PureAttribute"));

        let json = serde_json::to_string(&m).unwrap();
        let back: MethodDef = serde_json::from_str(&json).unwrap();
        let json2 = serde_json::to_string(&back).unwrap();
        assert_eq!(json, json2);
        assert!(back.flags.is_virtual);
    }
}
