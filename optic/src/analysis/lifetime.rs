//! Lifetime analysis for manually-managed buffers
//!
//! Finds the last use of each managed buffer and scans every use context
//! between the allocation and the end of the function body for conflicts:
//! the buffer being returned, stored externally, captured by a closure,
//! retained by an opaque call, or explicitly released while later uses
//! remain. The scan is whole-function on the flat statement list - control
//! flow can place a use in any later position, so a containing-block scan
//! would be unsound.
//!
//! A conflict-free buffer is auto-freeable. The suggested release point is
//! the statement immediately after the last use, unless an explicit
//! release already covers it - the pass recognizes existing manual
//! releases and never suggests a duplicate, since double-release is the
//! defect class this analysis exists to keep out of generated code.

use crate::ir::usedef::UseKind;
use crate::ir::{AllocCategory, StmtId};
use crate::report::{LifetimeConflict, LifetimeRecord, LifetimeReport, Suggestion};

use super::{AnalysisContext, AnalysisPass, PassReport};

pub struct LifetimeAnalysis;

impl AnalysisPass for LifetimeAnalysis {
    fn name(&self) -> &'static str {
        "lifetime"
    }

    fn run(&self, cx: &AnalysisContext<'_>) -> PassReport {
        let mut records = Vec::new();

        for site in cx.snapshot.allocation_sites() {
            if site.category != AllocCategory::Buffer {
                continue;
            }

            let mut conflicts: Vec<LifetimeConflict> = Vec::new();
            let mut releases: Vec<StmtId> = Vec::new();
            let mut last_use: Option<StmtId> = None;

            for use_site in cx.usedef.uses(site.value) {
                match &use_site.kind {
                    UseKind::Released => {
                        releases.push(use_site.stmt);
                        continue;
                    }
                    UseKind::Returned => {
                        add_conflict(&mut conflicts, LifetimeConflict::Returned)
                    }
                    UseKind::StoredExternal { .. } => {
                        add_conflict(&mut conflicts, LifetimeConflict::StoredExternally)
                    }
                    UseKind::ClosureCapture { .. } => {
                        add_conflict(&mut conflicts, LifetimeConflict::CapturedByClosure)
                    }
                    UseKind::CallArg { .. } => {
                        add_conflict(&mut conflicts, LifetimeConflict::RetainedByCall)
                    }
                    UseKind::BuiltinArg { op, index } if op.captures_operand(*index) => {
                        // The buffer becomes reachable through the container
                        // it was stored into.
                        add_conflict(&mut conflicts, LifetimeConflict::StoredExternally)
                    }
                    UseKind::PhiInput => {
                        // Reachable through another SSA name after the merge.
                        add_conflict(&mut conflicts, LifetimeConflict::StoredExternally)
                    }
                    UseKind::BuiltinArg { .. } | UseKind::BranchCondition => {}
                }
                last_use = last_use.max(Some(use_site.stmt));
            }

            // A release before the last use leaves later uses reading freed
            // memory; a second release is a double-release. Either way no
            // automation is safe.
            let premature_release =
                last_use.is_some_and(|last| releases.iter().any(|r| *r < last));
            if premature_release || releases.len() > 1 {
                add_conflict(&mut conflicts, LifetimeConflict::AlreadyReleased);
            }

            let auto_freeable = conflicts.is_empty();
            let suggested_release_point = if auto_freeable && releases.is_empty() {
                Some(last_use.map(StmtId::next).unwrap_or(site.stmt.next()))
            } else {
                // Conflicted, or an explicit release already sits at or
                // after the last use: already handled.
                None
            };

            records.push(LifetimeRecord {
                site,
                last_use,
                conflicts,
                auto_freeable,
                suggested_release_point,
            });
        }

        let suggestions = suggestions_for(&records);
        PassReport::Lifetime(LifetimeReport {
            function: cx.snapshot.name.clone(),
            records,
            warnings: cx.usedef.warnings().to_vec(),
            suggestions,
        })
    }
}

/// Record a conflict once, in first-occurrence program order
fn add_conflict(conflicts: &mut Vec<LifetimeConflict>, conflict: LifetimeConflict) {
    if !conflicts.contains(&conflict) {
        conflicts.push(conflict);
    }
}

fn suggestions_for(records: &[LifetimeRecord]) -> Vec<Suggestion> {
    records
        .iter()
        .filter_map(|r| {
            let point = r.suggested_release_point?;
            Some(Suggestion::with_fragments(
                format!("insert release of {} at {point}", r.site.value),
                format!("{} never released", r.site.value),
                format!("release {} after its last use", r.site.value),
            ))
        })
        .collect()
}
