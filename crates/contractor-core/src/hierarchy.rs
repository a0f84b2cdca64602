//! Inheritance graph over the types of a unit.
//!
//! [`TypeHierarchy`] is a petgraph `DiGraph` with one node per type
//! definition and an edge from every type to its base class and to each
//! interface it lists. Edges carry the [`TypeRef`] used in the declaration
//! so generic instantiations (`class D : B<int>`) survive into queries.
//! References to types outside the unit produce no edge.

use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::algo::is_cyclic_directed;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use crate::error::CoreError;
use crate::id::TypeId;
use crate::types::TypeRef;
use crate::unit::Unit;

/// Relationship carried on a hierarchy edge.
#[derive(Debug, Clone, PartialEq)]
pub enum Relation {
    /// `derived : base`
    Base(TypeRef),
    /// `derived : interface`
    Implements(TypeRef),
}

/// The base-class / interface graph of a unit.
#[derive(Debug, Clone)]
pub struct TypeHierarchy {
    graph: DiGraph<TypeId, Relation, u32>,
    nodes: HashMap<TypeId, NodeIndex<u32>>,
}

impl TypeHierarchy {
    /// Builds the hierarchy for every type in `unit`.
    ///
    /// Returns [`CoreError::CyclicInheritance`] if a type (transitively)
    /// derives from itself.
    pub fn new(unit: &Unit) -> Result<Self, CoreError> {
        let mut graph = DiGraph::<TypeId, Relation, u32>::default();
        let mut nodes = HashMap::new();
        for ty in unit.types() {
            nodes.insert(ty.id, graph.add_node(ty.id));
        }

        for ty in unit.types() {
            let from = nodes[&ty.id];
            if let Some(base) = &ty.base {
                if let Some(to) = base.definition().and_then(|d| nodes.get(&d)) {
                    graph.add_edge(from, *to, Relation::Base(base.clone()));
                }
            }
            for iface in &ty.interfaces {
                if let Some(to) = iface.definition().and_then(|d| nodes.get(&d)) {
                    graph.add_edge(from, *to, Relation::Implements(iface.clone()));
                }
            }
        }

        if is_cyclic_directed(&graph) {
            let name = Self::find_cycle_member(&graph, unit)
                .unwrap_or_else(|| unit.name.clone());
            return Err(CoreError::CyclicInheritance { name });
        }

        Ok(TypeHierarchy { graph, nodes })
    }

    /// Names some type that sits on a cycle (for the error message).
    fn find_cycle_member(graph: &DiGraph<TypeId, Relation, u32>, unit: &Unit) -> Option<String> {
        petgraph::algo::kosaraju_scc(graph)
            .into_iter()
            .find(|scc| scc.len() > 1 || scc.iter().any(|n| graph.contains_edge(*n, *n)))
            .and_then(|scc| scc.first().copied())
            .and_then(|n| unit.type_def(graph[n]))
            .map(|t| t.full_name())
    }

    /// The declared base class of `ty`, if it is defined in the unit.
    pub fn base_of(&self, ty: TypeId) -> Option<&TypeRef> {
        let node = *self.nodes.get(&ty)?;
        self.graph
            .edges_directed(node, Direction::Outgoing)
            .find_map(|e| match e.weight() {
                Relation::Base(r) => Some(r),
                Relation::Implements(_) => None,
            })
    }

    /// Interfaces listed directly on `ty`, in declaration order.
    pub fn interfaces_of(&self, ty: TypeId) -> Vec<&TypeRef> {
        let Some(node) = self.nodes.get(&ty) else {
            return Vec::new();
        };
        // petgraph yields outgoing edges newest-first.
        let mut out: Vec<&TypeRef> = self
            .graph
            .edges_directed(*node, Direction::Outgoing)
            .filter_map(|e| match e.weight() {
                Relation::Implements(r) => Some(r),
                Relation::Base(_) => None,
            })
            .collect();
        out.reverse();
        out
    }

    /// Every interface `ty` implements, directly or through interface
    /// inheritance, breadth-first and de-duplicated.
    ///
    /// References are expressed in `ty`'s generic context: for
    /// `interface IList<T> : ICollection<T>` and `class C : IList<int>`, the
    /// result contains `IList<int>` and `ICollection<int>`.
    pub fn all_interfaces(&self, ty: TypeId) -> Vec<TypeRef> {
        let mut result = Vec::new();
        let mut seen = HashSet::new();
        let mut queue: VecDeque<TypeRef> =
            self.interfaces_of(ty).into_iter().cloned().collect();

        while let Some(iface) = queue.pop_front() {
            if !seen.insert(iface.clone()) {
                continue;
            }
            if let Some(def) = iface.definition() {
                for inherited in self.interfaces_of(def) {
                    queue.push_back(inherited.specialize(iface.type_args(), &[]));
                }
            }
            result.push(iface);
        }
        result
    }

    /// Base classes of `ty` from nearest to root, each in `ty`'s generic context.
    pub fn base_chain(&self, ty: TypeId) -> Vec<TypeRef> {
        let mut chain = Vec::new();
        let mut current = self.base_of(ty).cloned();
        while let Some(base) = current {
            current = base
                .definition()
                .and_then(|d| self.base_of(d))
                .map(|next| next.specialize(base.type_args(), &[]));
            chain.push(base);
        }
        chain
    }

    /// Types that list `ty` as base or interface.
    pub fn derived_of(&self, ty: TypeId) -> Vec<TypeId> {
        let Some(node) = self.nodes.get(&ty) else {
            return Vec::new();
        };
        self.graph
            .edges_directed(*node, Direction::Incoming)
            .map(|e| self.graph[e.source()])
            .collect()
    }
}
