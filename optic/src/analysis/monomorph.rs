//! Monomorphization analysis
//!
//! For every declared parameter with a non-concrete type, collects the
//! concrete types actually observed at call sites of the function. When
//! every abstract parameter has a closed, non-empty set, the pass proposes
//! one specialization signature per combination of concrete types.
//!
//! Determinism is load-bearing here: variant names must be byte-identical
//! across runs on the same input. Discovered types are kept in sorted
//! sets and the Cartesian product is generated position-major, so the
//! combination order - and with it every variant name - is a pure function
//! of the snapshot and resolver contents.

use std::collections::BTreeSet;

use crate::report::{AbstractParameter, MonomorphizationReport, Specialization, Suggestion};

use super::{AnalysisContext, AnalysisPass, PassReport};

pub struct MonomorphizationAnalysis;

impl AnalysisPass for MonomorphizationAnalysis {
    fn name(&self) -> &'static str {
        "monomorphization"
    }

    fn run(&self, cx: &AnalysisContext<'_>) -> PassReport {
        let observed = cx.resolver.observed_instantiations(&cx.snapshot.name);

        let mut parameters = Vec::new();
        let mut type_sets: Vec<BTreeSet<String>> = Vec::new();

        for (position, param) in cx.snapshot.params.iter().enumerate() {
            if param.ty.is_concrete() {
                continue;
            }

            let mut discovered = BTreeSet::new();
            let mut open = false;
            for instantiation in &observed {
                match instantiation.get(position) {
                    Some(ty) if ty.is_concrete() => {
                        discovered.insert(ty.name());
                    }
                    // A binding the resolver could not make concrete keeps
                    // the set open; no specialization is safe.
                    _ => open = true,
                }
            }

            let can_monomorphize = !discovered.is_empty() && !open;
            parameters.push(AbstractParameter {
                position,
                name: param.name.clone(),
                declared_type: param.ty.name(),
                discovered_concrete_types: discovered.iter().cloned().collect(),
                can_monomorphize,
            });
            type_sets.push(discovered);
        }

        let fully_resolvable =
            !parameters.is_empty() && parameters.iter().all(|p| p.can_monomorphize);

        let (specializations, truncated) = if fully_resolvable {
            build_specializations(&cx.snapshot.name, &type_sets, cx.config.specialization_ceiling)
        } else {
            (Vec::new(), false)
        };

        let mut suggestions = Vec::new();
        if fully_resolvable {
            suggestions.push(Suggestion::new(format!(
                "specialize `{}` into {} concrete variant(s) to remove runtime type dispatch",
                cx.snapshot.name,
                specializations.len(),
            )));
        }
        for p in parameters.iter().filter(|p| !p.can_monomorphize) {
            suggestions.push(Suggestion::new(format!(
                "parameter `{}` ({}) has no closed set of concrete instantiations; \
                 annotate call sites to enable specialization",
                p.name, p.declared_type,
            )));
        }

        PassReport::Monomorphization(MonomorphizationReport {
            function: cx.snapshot.name.clone(),
            parameters,
            specializations,
            truncated,
            warnings: cx.usedef.warnings().to_vec(),
            suggestions,
        })
    }
}

/// Cartesian product over the per-parameter sorted type sets,
/// position-major (earlier parameters vary slowest), capped at `ceiling`.
fn build_specializations(
    function: &str,
    type_sets: &[BTreeSet<String>],
    ceiling: usize,
) -> (Vec<Specialization>, bool) {
    let mut combos: Vec<Vec<String>> = vec![Vec::new()];
    let mut truncated = false;

    for set in type_sets {
        let mut next = Vec::with_capacity(combos.len() * set.len());
        'outer: for combo in &combos {
            for ty in set {
                if next.len() == ceiling {
                    truncated = true;
                    break 'outer;
                }
                let mut extended = combo.clone();
                extended.push(ty.clone());
                next.push(extended);
            }
        }
        combos = next;
    }

    let specializations = combos
        .into_iter()
        .enumerate()
        .map(|(index, concrete_types)| Specialization {
            variant_name: format!("{function}__v{index}"),
            concrete_types,
        })
        .collect();
    (specializations, truncated)
}
