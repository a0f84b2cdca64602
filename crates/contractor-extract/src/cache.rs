//! Extract-once memoization of method contracts.
//!
//! [`ContractCache`] stores the own and effective contract of every method
//! it has seen, keyed by [`MethodId`]. Backed by `DashMap` so a host may
//! share one cache across worker threads. The value is computed without
//! holding a shard lock; when two threads race on the same method the first
//! insert wins and both return that value.

use dashmap::DashMap;

use contractor_core::MethodId;

use crate::contract::MethodContract;
use crate::error::ExtractError;

/// Which contract of a method an entry holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContractKind {
    /// The method's own clauses only.
    Own,
    /// Own clauses merged with every inherited contract.
    Effective,
}

/// Per-session contract cache.
#[derive(Debug, Default)]
pub struct ContractCache {
    entries: DashMap<(MethodId, ContractKind), Option<MethodContract>>,
}

impl ContractCache {
    pub fn new() -> Self {
        ContractCache {
            entries: DashMap::new(),
        }
    }

    /// Returns a clone of the cached contract, if computed.
    ///
    /// The outer `Option` is the cache hit; the inner one is "no contract".
    pub fn get(&self, method: MethodId, kind: ContractKind) -> Option<Option<MethodContract>> {
        self.entries.get(&(method, kind)).map(|entry| entry.value().clone())
    }

    /// Returns the cached contract or computes, stores and returns it.
    ///
    /// Errors are not cached.
    pub fn get_or_try_insert_with<F>(
        &self,
        method: MethodId,
        kind: ContractKind,
        compute: F,
    ) -> Result<Option<MethodContract>, ExtractError>
    where
        F: FnOnce() -> Result<Option<MethodContract>, ExtractError>,
    {
        if let Some(hit) = self.get(method, kind) {
            return Ok(hit);
        }
        let value = compute()?;
        let entry = self.entries.entry((method, kind)).or_insert(value);
        Ok(entry.value().clone())
    }

    /// Drops every cached contract of `method`.
    pub fn invalidate(&self, method: MethodId) {
        self.entries.remove(&(method, ContractKind::Own));
        self.entries.remove(&(method, ContractKind::Effective));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}
