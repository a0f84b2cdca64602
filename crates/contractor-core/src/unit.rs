//! The compilation unit: an in-memory, mutable assembly.
//!
//! [`Unit`] owns every type, method and field definition and hands out
//! their IDs. Definitions are kept in insertion order ([`IndexMap`]) so that
//! traversals (and therefore extraction output) are deterministic.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::ast::Param;
use crate::error::CoreError;
use crate::id::{FieldId, MethodId, TypeId};
use crate::member::{full_name, has_attribute, Attribute, FieldDef, MethodDef, TypeDef};
use crate::types::{TypeKind, TypeRef, Visibility};

/// A compiled unit (assembly) and all of its definitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Unit {
    pub name: String,
    /// Assembly-level custom attributes.
    pub attributes: Vec<Attribute>,
    types: IndexMap<TypeId, TypeDef>,
    methods: IndexMap<MethodId, MethodDef>,
    fields: IndexMap<FieldId, FieldDef>,
    /// Full name -> type lookup.
    type_names: HashMap<String, TypeId>,
    next_type_id: u32,
    next_method_id: u32,
    next_field_id: u32,
}

impl Unit {
    /// Creates an empty unit.
    pub fn new(name: &str) -> Self {
        Unit {
            name: name.to_string(),
            attributes: Vec::new(),
            types: IndexMap::new(),
            methods: IndexMap::new(),
            fields: IndexMap::new(),
            type_names: HashMap::new(),
            next_type_id: 0,
            next_method_id: 0,
            next_field_id: 0,
        }
    }

    /// Registers a public, non-generic type with no base and no members.
    ///
    /// Returns [`CoreError::DuplicateTypeName`] if a type with the same full
    /// name already exists.
    pub fn add_type(
        &mut self,
        namespace: &str,
        name: &str,
        kind: TypeKind,
    ) -> Result<TypeId, CoreError> {
        let full = full_name(namespace, name);
        if self.type_names.contains_key(&full) {
            return Err(CoreError::DuplicateTypeName { name: full });
        }

        let id = TypeId(self.next_type_id);
        self.next_type_id += 1;

        let base = match kind {
            TypeKind::Interface => None,
            _ => Some(TypeRef::OBJECT),
        };
        self.types.insert(
            id,
            TypeDef {
                id,
                namespace: namespace.to_string(),
                name: name.to_string(),
                kind,
                visibility: Visibility::Public,
                generic_params: Vec::new(),
                base,
                interfaces: Vec::new(),
                methods: Vec::new(),
                fields: Vec::new(),
                attributes: Vec::new(),
            },
        );
        self.type_names.insert(full, id);
        Ok(id)
    }

    /// Adds a method to `declaring` and returns its ID.
    ///
    /// Returns [`CoreError::TypeNotFound`] if the declaring type does not exist.
    pub fn add_method(
        &mut self,
        declaring: TypeId,
        name: &str,
        params: Vec<Param>,
        return_type: TypeRef,
    ) -> Result<MethodId, CoreError> {
        let id = MethodId(self.next_method_id);
        let ty = self
            .types
            .get_mut(&declaring)
            .ok_or(CoreError::TypeNotFound { id: declaring })?;
        self.next_method_id += 1;
        ty.methods.push(id);

        let mut method = MethodDef::new(id, declaring, name.to_string(), params, return_type);
        if ty.kind == TypeKind::Interface {
            method.flags.is_virtual = true;
            method.flags.is_abstract = true;
            method.flags.is_new_slot = true;
        }
        self.methods.insert(id, method);
        Ok(id)
    }

    /// Adds a field to `declaring` and returns its ID.
    pub fn add_field(
        &mut self,
        declaring: TypeId,
        name: &str,
        ty: TypeRef,
        is_static: bool,
    ) -> Result<FieldId, CoreError> {
        let id = FieldId(self.next_field_id);
        let owner = self
            .types
            .get_mut(&declaring)
            .ok_or(CoreError::TypeNotFound { id: declaring })?;
        self.next_field_id += 1;
        owner.fields.push(id);
        self.fields.insert(
            id,
            FieldDef {
                id,
                name: name.to_string(),
                declaring_type: declaring,
                ty,
                is_static,
            },
        );
        Ok(id)
    }

    pub fn type_def(&self, id: TypeId) -> Option<&TypeDef> {
        self.types.get(&id)
    }

    /// Mutable access to a type definition.
    ///
    /// Renaming a type through this handle does not update the name index;
    /// use it for base types, interfaces, attributes and generic parameters.
    pub fn type_mut(&mut self, id: TypeId) -> Option<&mut TypeDef> {
        self.types.get_mut(&id)
    }

    pub fn method(&self, id: MethodId) -> Option<&MethodDef> {
        self.methods.get(&id)
    }

    pub fn method_mut(&mut self, id: MethodId) -> Option<&mut MethodDef> {
        self.methods.get_mut(&id)
    }

    pub fn field(&self, id: FieldId) -> Option<&FieldDef> {
        self.fields.get(&id)
    }

    /// Like [`type_def`](Self::type_def) but reports a missing type as an error.
    pub fn require_type(&self, id: TypeId) -> Result<&TypeDef, CoreError> {
        self.type_def(id).ok_or(CoreError::TypeNotFound { id })
    }

    /// Like [`method`](Self::method) but reports a missing method as an error.
    pub fn require_method(&self, id: MethodId) -> Result<&MethodDef, CoreError> {
        self.method(id).ok_or(CoreError::MethodNotFound { id })
    }

    /// Looks up a type by `Namespace.Name`.
    pub fn find_type(&self, full_name: &str) -> Option<TypeId> {
        self.type_names.get(full_name).copied()
    }

    /// Methods declared by `ty`, in declaration order.
    pub fn methods_of(&self, ty: TypeId) -> impl Iterator<Item = &MethodDef> {
        self.types
            .get(&ty)
            .map(|t| t.methods.as_slice())
            .unwrap_or(&[])
            .iter()
            .filter_map(|id| self.methods.get(id))
    }

    /// Finds a method of `ty` by simple name and parameter count.
    pub fn find_method(&self, ty: TypeId, name: &str, arity: usize) -> Option<&MethodDef> {
        self.methods_of(ty)
            .find(|m| m.name == name && m.arity() == arity)
    }

    /// All types in declaration order.
    pub fn types(&self) -> impl Iterator<Item = &TypeDef> {
        self.types.values()
    }

    /// All methods in declaration order.
    pub fn methods(&self) -> impl Iterator<Item = &MethodDef> {
        self.methods.values()
    }

    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    pub fn method_count(&self) -> usize {
        self.methods.len()
    }

    pub fn has_attribute(&self, type_name: &str) -> bool {
        has_attribute(&self.attributes, type_name)
    }

    /// `Type::Method` for diagnostics. Falls back to the raw ID.
    pub fn method_display_name(&self, id: MethodId) -> String {
        match self.method(id) {
            Some(m) => match self.type_def(m.declaring_type) {
                Some(t) => format!("{}::{}", t.full_name(), m.name),
                None => m.name.clone(),
            },
            None => format!("MethodId({})", id.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_types_and_methods() {
        let mut unit = Unit::new("sample");
        let widget = unit.add_type("Sample", "Widget", TypeKind::Class).unwrap();
        let get = unit
            .add_method(widget, "Get", vec![Param::new("i", TypeRef::I32)], TypeRef::I32)
            .unwrap();

        assert_eq!(unit.find_type("Sample.Widget"), Some(widget));
        assert_eq!(unit.method(get).unwrap().declaring_type, widget);
        assert_eq!(unit.methods_of(widget).count(), 1);
        assert_eq!(unit.find_method(widget, "Get", 1).map(|m| m.id), Some(get));
        assert!(unit.find_method(widget, "Get", 0).is_none());
        assert_eq!(unit.method_display_name(get), "Sample.Widget::Get");
    }

    #[test]
    fn class_defaults_to_object_base_and_interface_has_none() {
        let mut unit = Unit::new("sample");
        let class = unit.add_type("", "C", TypeKind::Class).unwrap();
        let iface = unit.add_type("", "I", TypeKind::Interface).unwrap();
        assert_eq!(unit.type_def(class).unwrap().base, Some(TypeRef::OBJECT));
        assert_eq!(unit.type_def(iface).unwrap().base, None);
    }

    #[test]
    fn interface_methods_are_abstract_virtual() {
        let mut unit = Unit::new("sample");
        let iface = unit.add_type("", "IShape", TypeKind::Interface).unwrap();
        let area = unit.add_method(iface, "Area", vec![], TypeRef::I32).unwrap();
        let flags = unit.method(area).unwrap().flags;
        assert!(flags.is_virtual && flags.is_abstract && flags.is_new_slot);
    }

    #[test]
    fn duplicate_type_name_errors() {
        let mut unit = Unit::new("sample");
        unit.add_type("A", "B", TypeKind::Class).unwrap();
        match unit.add_type("A", "B", TypeKind::Struct) {
            Err(CoreError::DuplicateTypeName { name }) => assert_eq!(name, "A.B"),
            other => panic!("expected DuplicateTypeName, got {:?}", other),
        }
    }

    #[test]
    fn add_method_to_missing_type_errors() {
        let mut unit = Unit::new("sample");
        let result = unit.add_method(TypeId(42), "M", vec![], TypeRef::VOID);
        assert!(matches!(result, Err(CoreError::TypeNotFound { id }) if id == TypeId(42)));
    }

    #[test]
    fn fields_are_owned_by_type() {
        let mut unit = Unit::new("sample");
        let t = unit.add_type("", "Counter", TypeKind::Class).unwrap();
        let f = unit.add_field(t, "count", TypeRef::I32, false).unwrap();
        assert_eq!(unit.type_def(t).unwrap().fields, vec![f]);
        assert_eq!(unit.field(f).unwrap().name, "count");
    }

    #[test]
    fn serde_roundtrip_unit() {
        let mut unit = Unit::new("sample");
        let t = unit.add_type("N", "T", TypeKind::Class).unwrap();
        unit.add_method(t, "M", vec![], TypeRef::VOID).unwrap();

        let json = serde_json::to_string(&unit).unwrap();
        let back: Unit = serde_json::from_str(&json).unwrap();
        assert_eq!(back.find_type("N.T"), Some(t));
        assert_eq!(back.method_count(), 1);
        // IDs keep advancing after a round trip.
        let mut back = back;
        let next = back.add_type("N", "U", TypeKind::Class).unwrap();
        assert_eq!(next, TypeId(1));
    }
}
