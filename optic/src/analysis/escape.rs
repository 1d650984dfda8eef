//! Escape analysis
//!
//! Classifies every allocation site as escaping or local by walking its
//! use contexts. A value escapes if it is returned, stored to an external
//! location, captured, merged through a phi, or passed to any call outside
//! the fixed allowlist of known-non-capturing operations.
//!
//! The conservative default is the soundness contract of this pass: a use
//! context the classifier cannot prove harmless counts as escaping.
//! Claiming escape for a local value costs a missed optimization; claiming
//! local for an escaping value would make generated code unsafe, so that
//! direction is never taken.

use crate::ir::usedef::UseKind;
use crate::ir::AllocCategory;
use crate::report::{EscapeRecord, EscapeReport, Suggestion};

use super::{AnalysisContext, AnalysisPass, PassReport};

pub struct EscapeAnalysis;

impl AnalysisPass for EscapeAnalysis {
    fn name(&self) -> &'static str {
        "escape"
    }

    fn run(&self, cx: &AnalysisContext<'_>) -> PassReport {
        let mut records = Vec::new();

        for site in cx.snapshot.allocation_sites() {
            let mut reasons = Vec::new();
            for use_site in cx.usedef.uses(site.value) {
                if let Some(reason) = escape_reason(&use_site.kind) {
                    reasons.push(format!("{reason} at {}", use_site.stmt));
                }
            }

            let escapes = !reasons.is_empty();
            let within = |limit: u64| site.size_bytes.is_some_and(|bytes| bytes <= limit);
            let stack_promotable = !escapes && within(cx.config.stack_promotion_limit);
            let scalar_replaceable = !escapes
                && site.category == AllocCategory::Array
                && within(cx.config.scalar_replacement_limit);

            records.push(EscapeRecord {
                site,
                escapes,
                reasons,
                stack_promotable,
                scalar_replaceable,
            });
        }

        let suggestions = suggestions_for(&records);
        PassReport::Escape(EscapeReport {
            function: cx.snapshot.name.clone(),
            records,
            warnings: cx.usedef.warnings().to_vec(),
            suggestions,
        })
    }
}

/// The reason a use context forces escape, or `None` for the allowlisted
/// harmless contexts. Anything not provably harmless escapes.
fn escape_reason(kind: &UseKind) -> Option<String> {
    match kind {
        UseKind::Returned => Some("returned".to_string()),
        UseKind::StoredExternal { binding } => {
            Some(format!("stored to external binding `{binding}`"))
        }
        UseKind::CallArg { callee } => Some(format!("passed to opaque call `{callee}`")),
        UseKind::ClosureCapture { function } => Some(format!("captured by closure `{function}`")),
        // No transitive tracking through phi merges; assume the merged
        // value outlives the allocation.
        UseKind::PhiInput => Some("merged through phi".to_string()),
        UseKind::BuiltinArg { op, index } => op
            .captures_operand(*index)
            .then(|| format!("retained by `{}`", op.symbol())),
        UseKind::BranchCondition | UseKind::Released => None,
    }
}

/// Scalar replacement first (larger win), then stack promotion, each in
/// program order.
fn suggestions_for(records: &[EscapeRecord]) -> Vec<Suggestion> {
    let mut suggestions = Vec::new();
    for r in records.iter().filter(|r| r.scalar_replaceable) {
        suggestions.push(Suggestion::with_fragments(
            format!(
                "replace array allocation {} with its element scalars",
                r.site.value
            ),
            format!("{} = alloc array", r.site.value),
            "one SSA value per element".to_string(),
        ));
    }
    for r in records.iter().filter(|r| r.stack_promotable && !r.scalar_replaceable) {
        suggestions.push(Suggestion::with_fragments(
            format!(
                "replace heap allocation {} with a fixed-size stack container",
                r.site.value
            ),
            format!("{} = alloc {} (heap)", r.site.value, r.site.category),
            format!("{} = alloc {} (stack)", r.site.value, r.site.category),
        ));
    }
    suggestions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::test_support::{run_pass, snapshot_with_local_array};
    use crate::ir::{AllocCategory, BuiltinOp, ConstValue, IrType, SnapshotBuilder};

    fn escape_report(snapshot: crate::ir::FunctionSnapshot) -> EscapeReport {
        match run_pass(&EscapeAnalysis, snapshot) {
            PassReport::Escape(report) => report,
            other => panic!("expected escape report, got {}", other.pass_name()),
        }
    }

    #[test]
    fn test_local_summed_array_is_stack_promotable() {
        let report = escape_report(snapshot_with_local_array());
        assert_eq!(report.records.len(), 1);
        let record = &report.records[0];
        assert!(!record.escapes);
        assert!(record.stack_promotable);
        assert!(promotion_invariant_holds(record));
    }

    #[test]
    fn test_returned_array_escapes() {
        let mut b = SnapshotBuilder::new("make_array");
        let arr = b.alloc(
            AllocCategory::Array,
            IrType::Array {
                elem: Box::new(IrType::Int),
                len: Some(10),
            },
            Some(80),
        );
        b.ret(Some(arr));
        let report = escape_report(b.finish());

        assert_eq!(report.records.len(), 1);
        let record = &report.records[0];
        assert!(record.escapes);
        assert!(record.reasons.iter().any(|r| r.contains("returned")));
        assert!(!record.stack_promotable);
        assert!(!record.scalar_replaceable);
    }

    #[test]
    fn test_opaque_call_argument_escapes() {
        let mut b = SnapshotBuilder::new("f");
        let arr = b.alloc(AllocCategory::Buffer, IrType::Buffer, Some(16));
        b.call("process", &[arr], IrType::Unit);
        b.ret(None);
        let report = escape_report(b.finish());

        assert!(report.records[0].escapes);
        assert!(
            report.records[0]
                .reasons
                .iter()
                .any(|r| r.contains("opaque call `process`"))
        );
    }

    #[test]
    fn test_stored_value_escapes_but_container_does_not() {
        let mut b = SnapshotBuilder::new("f");
        let arr = b.alloc(
            AllocCategory::Array,
            IrType::Array {
                elem: Box::new(IrType::Buffer),
                len: Some(2),
            },
            Some(16),
        );
        let buf = b.alloc(AllocCategory::Buffer, IrType::Buffer, Some(8));
        let idx = b.literal(ConstValue::Int(0));
        b.builtin(BuiltinOp::Store, &[arr, idx, buf], IrType::Unit);
        b.ret(None);
        let report = escape_report(b.finish());

        let container = &report.records[0];
        let stored = &report.records[1];
        assert!(!container.escapes);
        assert!(stored.escapes);
        assert!(stored.reasons.iter().any(|r| r.contains("retained by `store`")));
    }

    #[test]
    fn test_phi_merge_is_conservative() {
        let mut b = SnapshotBuilder::new("f");
        let a = b.alloc(AllocCategory::Aggregate, IrType::Aggregate("P".into()), Some(16));
        let c = b.alloc(AllocCategory::Aggregate, IrType::Aggregate("P".into()), Some(16));
        let merged = b.phi(&[a, c], IrType::Aggregate("P".into()));
        let _ = merged;
        b.ret(None);
        let report = escape_report(b.finish());

        assert!(report.records.iter().all(|r| r.escapes));
    }

    #[test]
    fn test_soundness_invariant() {
        // Over a mix of shapes, the promotion flags never contradict escape.
        let mut b = SnapshotBuilder::new("f");
        let small = b.alloc(
            AllocCategory::Array,
            IrType::Array {
                elem: Box::new(IrType::Int),
                len: Some(2),
            },
            Some(16),
        );
        let sum = b.builtin(BuiltinOp::Sum, &[small], IrType::Int);
        let big = b.alloc(
            AllocCategory::Array,
            IrType::Array {
                elem: Box::new(IrType::Int),
                len: Some(1000),
            },
            Some(8000),
        );
        b.store_global("shared", big);
        b.ret(Some(sum));
        let report = escape_report(b.finish());

        for record in &report.records {
            assert!(promotion_invariant_holds(record));
        }
        assert!(report.records[0].stack_promotable);
        assert!(report.records[0].scalar_replaceable);
        assert!(report.records[1].escapes);
    }

    /// stack_promotable and scalar_replaceable both imply !escapes
    fn promotion_invariant_holds(record: &EscapeRecord) -> bool {
        (!record.stack_promotable || !record.escapes)
            && (!record.scalar_replaceable || !record.escapes)
    }
}
