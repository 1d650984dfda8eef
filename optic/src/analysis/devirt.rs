//! Devirtualization analysis
//!
//! For each dynamically dispatched call, enumerates the bounded set of
//! method identities that could match the receiver's declared type and
//! classifies how the call could be lowered: one candidate is a direct
//! call, two to four fit a closed type switch, anything else stays on the
//! dispatch path.
//!
//! Receiver abstractness and candidate multiplicity are independent
//! conditions. A concrete receiver with a single candidate needs no
//! analysis and is excluded; a concrete receiver whose resolution is still
//! open-world (several registered targets) is reported like any other
//! ambiguous site.

use crate::ir::{Callee, Op};
use crate::report::{CallSiteRecord, DevirtualizationReport, DispatchStrategy, Suggestion};

use super::{AnalysisContext, AnalysisPass, PassReport};

pub struct DevirtualizationAnalysis;

impl AnalysisPass for DevirtualizationAnalysis {
    fn name(&self) -> &'static str {
        "devirtualization"
    }

    fn run(&self, cx: &AnalysisContext<'_>) -> PassReport {
        let ceiling = cx.config.devirt_candidate_ceiling;
        let mut call_sites = Vec::new();

        for stmt in &cx.snapshot.statements {
            let Op::Call {
                callee: Callee::Virtual { method, receiver },
                ..
            } = &stmt.op
            else {
                continue;
            };

            let receiver_ty = cx.snapshot.value_type(*receiver);
            let mut candidates = cx.resolver.call_candidates(method, &receiver_ty);
            if candidates.len() > ceiling {
                // Enumeration abandoned at the ceiling. An abandoned search
                // records no candidates, keeping the strategy classification
                // a pure function of the recorded list length.
                candidates.clear();
            }

            if receiver_ty.is_concrete() && candidates.len() == 1 {
                // Already direct; no analysis needed.
                continue;
            }

            let strategy = match candidates.len() {
                1 => DispatchStrategy::Direct,
                2..=4 => DispatchStrategy::Switch,
                _ => DispatchStrategy::None,
            };

            call_sites.push(CallSiteRecord {
                stmt: stmt.id,
                method: method.clone(),
                receiver: *receiver,
                receiver_type: receiver_ty.name(),
                candidates,
                strategy,
            });
        }

        let suggestions = suggestions_for(&call_sites);
        PassReport::Devirtualization(DevirtualizationReport {
            function: cx.snapshot.name.clone(),
            call_sites,
            warnings: cx.usedef.warnings().to_vec(),
            suggestions,
        })
    }
}

/// Direct rewrites first, then switches, each in program order
fn suggestions_for(call_sites: &[CallSiteRecord]) -> Vec<Suggestion> {
    let mut suggestions = Vec::new();
    for c in call_sites
        .iter()
        .filter(|c| c.strategy == DispatchStrategy::Direct)
    {
        let target = &c.candidates[0];
        suggestions.push(Suggestion::with_fragments(
            format!(
                "replace dynamic dispatch at {} with a direct call to `{}::{}`",
                c.stmt, target.receiver_type, target.method
            ),
            format!("call {}.{}(...)", c.receiver, c.method),
            format!("call {}::{}(...)", target.receiver_type, target.method),
        ));
    }
    for c in call_sites
        .iter()
        .filter(|c| c.strategy == DispatchStrategy::Switch)
    {
        suggestions.push(Suggestion::new(format!(
            "expand dynamic dispatch at {} into a type switch over {} candidates",
            c.stmt,
            c.candidates.len(),
        )));
    }
    suggestions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::test_support::{run_pass_full, run_pass_with_resolver};
    use crate::config::AnalysisConfig;
    use crate::ir::{IrType, SnapshotBuilder};
    use crate::resolve::StaticResolver;

    fn devirt_report(
        snapshot: crate::ir::FunctionSnapshot,
        resolver: StaticResolver,
    ) -> DevirtualizationReport {
        match run_pass_with_resolver(&DevirtualizationAnalysis, snapshot, resolver) {
            PassReport::Devirtualization(report) => report,
            other => panic!("expected devirtualization report, got {}", other.pass_name()),
        }
    }

    fn shape_call_snapshot() -> crate::ir::FunctionSnapshot {
        let mut b = SnapshotBuilder::new("render");
        let shape = b.param("shape", IrType::Abstract("Shape".to_string()));
        let area = b.virtual_call("area", shape, &[], IrType::Float);
        b.ret(Some(area));
        b.finish()
    }

    #[test]
    fn test_single_candidate_is_direct() {
        let mut resolver = StaticResolver::new();
        resolver.add_impl("area", "Circle");

        let report = devirt_report(shape_call_snapshot(), resolver);
        assert_eq!(report.call_sites.len(), 1);
        assert_eq!(report.call_sites[0].strategy, DispatchStrategy::Direct);
        assert!(report.suggestions[0].message.contains("Circle::area"));
    }

    #[test]
    fn test_small_candidate_set_is_switch() {
        let mut resolver = StaticResolver::new();
        for ty in ["Circle", "Square", "Triangle"] {
            resolver.add_impl("area", ty);
        }

        let report = devirt_report(shape_call_snapshot(), resolver);
        assert_eq!(report.call_sites[0].strategy, DispatchStrategy::Switch);
        assert_eq!(report.call_sites[0].candidates.len(), 3);
    }

    #[test]
    fn test_no_candidates_is_none() {
        let report = devirt_report(shape_call_snapshot(), StaticResolver::new());
        assert_eq!(report.call_sites[0].strategy, DispatchStrategy::None);
    }

    #[test]
    fn test_five_candidates_is_none() {
        let mut resolver = StaticResolver::new();
        for ty in ["A", "B", "C", "D", "E"] {
            resolver.add_impl("area", ty);
        }

        let report = devirt_report(shape_call_snapshot(), resolver);
        assert_eq!(report.call_sites[0].strategy, DispatchStrategy::None);
    }

    #[test]
    fn test_ceiling_exceeded_abandons_enumeration() {
        let mut resolver = StaticResolver::new();
        for i in 0..40 {
            resolver.add_impl("area", format!("Impl{i:02}"));
        }

        let report = match run_pass_full(
            &DevirtualizationAnalysis,
            shape_call_snapshot(),
            resolver,
            AnalysisConfig::default(),
        ) {
            PassReport::Devirtualization(report) => report,
            other => panic!("expected devirtualization report, got {}", other.pass_name()),
        };

        let site = &report.call_sites[0];
        assert_eq!(site.strategy, DispatchStrategy::None);
        assert!(site.candidates.is_empty());
    }

    #[test]
    fn test_concrete_receiver_single_target_excluded() {
        let mut b = SnapshotBuilder::new("render");
        let shape = b.param("shape", IrType::Aggregate("Circle".to_string()));
        let area = b.virtual_call("area", shape, &[], IrType::Float);
        b.ret(Some(area));

        let mut resolver = StaticResolver::new();
        resolver.add_impl("area", "Circle");

        let report = devirt_report(b.finish(), resolver);
        assert!(report.call_sites.is_empty());
    }

    #[test]
    fn test_concrete_receiver_open_world_still_reported() {
        let mut b = SnapshotBuilder::new("render");
        let shape = b.param("shape", IrType::Aggregate("Circle".to_string()));
        let area = b.virtual_call("area", shape, &[], IrType::Float);
        b.ret(Some(area));

        // Two registered targets for the same concrete receiver type, as an
        // open-world method table can produce.
        let mut resolver = StaticResolver::new();
        resolver.add_impl("area", "Circle");
        resolver.add_impl("area", "Circle");

        let report = devirt_report(b.finish(), resolver);
        assert_eq!(report.call_sites.len(), 1);
        assert_eq!(report.call_sites[0].strategy, DispatchStrategy::Switch);
    }

    #[test]
    fn test_static_calls_are_not_reported() {
        let mut b = SnapshotBuilder::new("f");
        let x = b.param("x", IrType::Int);
        b.call("helper", &[x], IrType::Int);
        b.ret(None);

        let report = devirt_report(b.finish(), StaticResolver::new());
        assert!(report.call_sites.is_empty());
    }
}
