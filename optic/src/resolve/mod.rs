//! External collaborator boundaries
//!
//! The engine never queries a live, mutable method registry. Whatever
//! target-resolution mechanism the front-end uses is abstracted behind
//! [`TargetResolver`], a capability handed to the orchestrator alongside
//! the snapshot, required to be deterministic for a given snapshot.
//! [`IrProvider`] is the matching boundary for snapshot acquisition.
//!
//! [`StaticResolver`] is the shipped table-backed implementation for
//! closed-world embedders and tests.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::Result;
use crate::ir::{FunctionSnapshot, IrType};

/// One possible target of a dynamically dispatched call: the concrete
/// receiver type paired with the method identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MethodCandidate {
    pub receiver_type: String,
    pub method: String,
}

impl MethodCandidate {
    pub fn new(receiver_type: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            receiver_type: receiver_type.into(),
            method: method.into(),
        }
    }
}

/// Target-resolution oracle
///
/// Both methods must be deterministic for a given snapshot: same inputs,
/// same ordered output, every time. The devirtualization and
/// monomorphization passes apply their own enumeration ceilings on top.
pub trait TargetResolver: Sync {
    /// Ordered candidate targets for `method` on a receiver of the given
    /// declared type
    fn call_candidates(&self, method: &str, receiver: &IrType) -> Vec<MethodCandidate>;

    /// Concrete argument-type vectors observed at call sites of `function`,
    /// one entry per observed call site or registered specialization
    fn observed_instantiations(&self, function: &str) -> Vec<Vec<IrType>>;
}

/// Snapshot acquisition boundary (type-inference front-end)
pub trait IrProvider {
    /// A total, well-typed SSA snapshot for a successfully inferred
    /// instantiation, or `AnalysisError::IrUnavailable` carrying the
    /// front-end's diagnostic verbatim
    fn typed_ir(&self, function: &str, argument_types: &[IrType]) -> Result<FunctionSnapshot>;
}

/// Deterministic table-backed resolver
///
/// Candidate order is insertion order; instantiation order is insertion
/// order. The embedder registers what its world knows, nothing is looked
/// up live.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    impls: BTreeMap<String, Vec<MethodCandidate>>,
    instantiations: BTreeMap<String, Vec<Vec<IrType>>>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an implementation of `method` for the named receiver type
    pub fn add_impl(&mut self, method: impl Into<String>, receiver_type: impl Into<String>) {
        let method = method.into();
        let candidate = MethodCandidate::new(receiver_type, method.clone());
        self.impls.entry(method).or_default().push(candidate);
    }

    /// Register one observed instantiation of `function`
    pub fn add_instantiation(&mut self, function: impl Into<String>, argument_types: Vec<IrType>) {
        self.instantiations
            .entry(function.into())
            .or_default()
            .push(argument_types);
    }
}

impl TargetResolver for StaticResolver {
    fn call_candidates(&self, method: &str, receiver: &IrType) -> Vec<MethodCandidate> {
        let Some(candidates) = self.impls.get(method) else {
            return Vec::new();
        };
        if receiver.is_concrete() {
            // A concrete receiver narrows the table to matching types, but
            // the table may still hold several entries for it (open-world
            // registration).
            let name = receiver.name();
            candidates
                .iter()
                .filter(|c| c.receiver_type == name)
                .cloned()
                .collect()
        } else {
            candidates.clone()
        }
    }

    fn observed_instantiations(&self, function: &str) -> Vec<Vec<IrType>> {
        self.instantiations.get(function).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abstract_receiver_sees_all_impls() {
        let mut resolver = StaticResolver::new();
        resolver.add_impl("area", "Circle");
        resolver.add_impl("area", "Square");

        let any = IrType::Abstract("Shape".to_string());
        let candidates = resolver.call_candidates("area", &any);
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].receiver_type, "Circle");
    }

    #[test]
    fn test_concrete_receiver_narrows() {
        let mut resolver = StaticResolver::new();
        resolver.add_impl("area", "Circle");
        resolver.add_impl("area", "Square");

        let circle = IrType::Aggregate("Circle".to_string());
        let candidates = resolver.call_candidates("area", &circle);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].method, "area");
    }

    #[test]
    fn test_unknown_method_is_empty() {
        let resolver = StaticResolver::new();
        assert!(
            resolver
                .call_candidates("area", &IrType::Unknown)
                .is_empty()
        );
        assert!(resolver.observed_instantiations("f").is_empty());
    }
}
