//! Effective contracts: a method's own contract merged with the contracts it
//! inherits.
//!
//! Inherited contracts come, in this order, from
//!
//! 1. the overridden method of each base class, nearest first, stopping at
//!    the method that introduced the virtual slot;
//! 2. every implicitly implemented interface method (public instance
//!    methods only);
//! 3. every explicitly implemented or overridden method.
//!
//! Each inherited contract is specialized into the overriding method's
//! generic context and its parameters are renamed to the overrider's. The
//! merge concatenates clauses without de-duplication.

use std::collections::HashSet;

use contractor_core::{MethodDef, MethodId, TypeHierarchy, TypeRef, Visibility};
use serde::Serialize;

use crate::cache::{ContractCache, ContractKind};
use crate::contract::MethodContract;
use crate::error::ExtractError;
use crate::extractor::ContractExtractor;
use crate::specialize::{rename_params, Substitution};

/// How an ancestor method relates to the method inheriting from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Inheritance {
    Override,
    Interface,
    Explicit,
}

/// A method whose contract is inherited, with the declaring type's
/// instantiation as seen from the inheriting type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ancestor {
    pub method: MethodId,
    pub type_args: Vec<TypeRef>,
    pub inheritance: Inheritance,
}

/// Serves own and effective contracts, each computed at most once.
pub struct ContractProvider<'a> {
    extractor: ContractExtractor<'a>,
    hierarchy: TypeHierarchy,
    cache: ContractCache,
}

impl<'a> ContractProvider<'a> {
    /// Builds the type hierarchy of the extractor's unit.
    ///
    /// Fails with a [`CoreError::CyclicInheritance`](contractor_core::CoreError)
    /// when the unit's inheritance graph has a cycle.
    pub fn new(extractor: ContractExtractor<'a>) -> Result<Self, ExtractError> {
        let hierarchy = TypeHierarchy::new(extractor.unit())?;
        Ok(ContractProvider {
            extractor,
            hierarchy,
            cache: ContractCache::new(),
        })
    }

    pub fn extractor(&self) -> &ContractExtractor<'a> {
        &self.extractor
    }

    pub fn hierarchy(&self) -> &TypeHierarchy {
        &self.hierarchy
    }

    pub fn cache(&self) -> &ContractCache {
        &self.cache
    }

    pub fn own_contract(&self, id: MethodId) -> Result<Option<MethodContract>, ExtractError> {
        self.cache
            .get_or_try_insert_with(id, ContractKind::Own, || self.extractor.own_contract(id))
    }

    /// The own contract merged with every inherited contract. `None` only
    /// when no contract exists anywhere in the chain.
    pub fn effective_contract(&self, id: MethodId) -> Result<Option<MethodContract>, ExtractError> {
        self.cache
            .get_or_try_insert_with(id, ContractKind::Effective, || self.compute_effective(id))
    }

    fn compute_effective(&self, id: MethodId) -> Result<Option<MethodContract>, ExtractError> {
        let unit = self.extractor.unit();
        let method = unit.method(id).ok_or(ExtractError::MethodNotFound { id })?;

        let mut merged = self.own_contract(id)?;
        let mut visited = HashSet::from([id]);
        for ancestor in self.ancestors(method) {
            if !visited.insert(ancestor.method) {
                continue;
            }
            if unit.method(ancestor.method).is_none() {
                continue;
            }
            let Some(inherited) = self.own_contract(ancestor.method)? else {
                continue;
            };

            tracing::debug!(
                method = %unit.method_display_name(id),
                from = %unit.method_display_name(ancestor.method),
                inheritance = ?ancestor.inheritance,
                "inheriting contract"
            );
            let inherited = Substitution::new(&ancestor.type_args, &[])
                .contract(inherited)
                .map_exprs(&mut |e| rename_params(e, &method.params));
            merged.get_or_insert_with(MethodContract::default).append(inherited);
        }
        Ok(merged)
    }

    /// Every method `method` inherits a contract from, in merge order.
    pub fn ancestors(&self, method: &MethodDef) -> Vec<Ancestor> {
        let mut out = Vec::new();
        if method.is_static() || method.is_constructor() {
            return out;
        }

        let base_chain = self.hierarchy.base_chain(method.declaring_type);
        if method.flags.is_virtual && !method.flags.is_new_slot {
            for base in &base_chain {
                let Some(found) = self.matching_method(base, method, |m| m.flags.is_virtual) else {
                    continue;
                };
                out.push(Ancestor {
                    method: found.id,
                    type_args: base.type_args().to_vec(),
                    inheritance: Inheritance::Override,
                });
                if found.flags.is_new_slot {
                    break;
                }
            }
        }

        if method.visibility == Visibility::Public {
            let mut interfaces = self.hierarchy.all_interfaces(method.declaring_type);
            for base in &base_chain {
                if let Some(def) = base.definition() {
                    interfaces.extend(
                        self.hierarchy
                            .all_interfaces(def)
                            .iter()
                            .map(|i| i.specialize(base.type_args(), &[])),
                    );
                }
            }
            for iface in &interfaces {
                if let Some(found) = self.matching_method(iface, method, |_| true) {
                    out.push(Ancestor {
                        method: found.id,
                        type_args: iface.type_args().to_vec(),
                        inheritance: Inheritance::Interface,
                    });
                }
            }
        }

        for explicit in &method.explicit_overrides {
            out.push(Ancestor {
                method: explicit.method,
                type_args: explicit.type_args.to_vec(),
                inheritance: Inheritance::Explicit,
            });
        }
        out
    }

    /// The method of `owner` with `method`'s name and signature once the
    /// owner's generic parameters are replaced by `owner`'s arguments.
    fn matching_method(
        &self,
        owner: &TypeRef,
        method: &MethodDef,
        accept: impl Fn(&MethodDef) -> bool,
    ) -> Option<&'a MethodDef> {
        let unit = self.extractor.unit();
        let def = owner.definition()?;
        let args = owner.type_args();
        unit.methods_of(def).find(|m| {
            m.name == method.name
                && m.arity() == method.arity()
                && m.generic_params.len() == method.generic_params.len()
                && !m.is_static()
                && m.params
                    .iter()
                    .zip(&method.params)
                    .all(|(a, b)| a.ty.specialize(args, &[]) == b.ty)
                && accept(m)
        })
    }
}
