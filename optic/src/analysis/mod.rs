//! Analysis passes and the orchestrating pipeline
//!
//! Each pass is a pure, synchronous function of the immutable snapshot and
//! use-def index. Passes share nothing mutable, so the pipeline fans them
//! out across rayon workers and collects one outcome per pass in a fixed
//! order. A pass that faults is caught at the pass boundary and recorded
//! as a failed-pass marker; sibling passes are never blocked or corrupted.

pub mod constprop;
pub mod devirt;
pub mod escape;
pub mod lifetime;
pub mod monomorph;

pub use constprop::ConstPropAnalysis;
pub use devirt::DevirtualizationAnalysis;
pub use escape::EscapeAnalysis;
pub use lifetime::LifetimeAnalysis;
pub use monomorph::MonomorphizationAnalysis;

use std::panic::{AssertUnwindSafe, catch_unwind};

use rayon::prelude::*;
use serde::Serialize;

use crate::config::AnalysisConfig;
use crate::error::{InternalAnalysisError, Result};
use crate::ir::usedef::UseDefIndex;
use crate::ir::{FunctionSnapshot, IrType};
use crate::report::{
    ConstPropReport, DevirtualizationReport, EscapeReport, LifetimeReport, MonomorphizationReport,
};
use crate::resolve::{IrProvider, TargetResolver};

/// Shared read-only input of one pass execution
pub struct AnalysisContext<'a> {
    pub snapshot: &'a FunctionSnapshot,
    pub usedef: &'a UseDefIndex,
    pub resolver: &'a dyn TargetResolver,
    pub config: &'a AnalysisConfig,
}

/// One analysis pass
///
/// `run` must be pure: no I/O, no blocking, no mutation of the context.
/// Passes are executed concurrently, hence the `Sync + Send` bound.
pub trait AnalysisPass: Sync + Send {
    /// Stable pass name, used in failed-pass markers and logs
    fn name(&self) -> &'static str;

    fn run(&self, cx: &AnalysisContext<'_>) -> PassReport;
}

/// Completed report of a single pass
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "pass", content = "report")]
pub enum PassReport {
    Escape(EscapeReport),
    Monomorphization(MonomorphizationReport),
    Devirtualization(DevirtualizationReport),
    Lifetime(LifetimeReport),
    ConstantPropagation(ConstPropReport),
}

impl PassReport {
    pub fn pass_name(&self) -> &'static str {
        match self {
            PassReport::Escape(_) => "escape",
            PassReport::Monomorphization(_) => "monomorphization",
            PassReport::Devirtualization(_) => "devirtualization",
            PassReport::Lifetime(_) => "lifetime",
            PassReport::ConstantPropagation(_) => "constant-propagation",
        }
    }

    pub fn summary(&self) -> String {
        match self {
            PassReport::Escape(r) => r.summary(),
            PassReport::Monomorphization(r) => r.summary(),
            PassReport::Devirtualization(r) => r.summary(),
            PassReport::Lifetime(r) => r.summary(),
            PassReport::ConstantPropagation(r) => r.summary(),
        }
    }
}

impl std::fmt::Display for PassReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PassReport::Escape(r) => write!(f, "{r}"),
            PassReport::Monomorphization(r) => write!(f, "{r}"),
            PassReport::Devirtualization(r) => write!(f, "{r}"),
            PassReport::Lifetime(r) => write!(f, "{r}"),
            PassReport::ConstantPropagation(r) => write!(f, "{r}"),
        }
    }
}

/// Outcome of one pass: its report, or the failed-pass marker
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PassOutcome {
    Completed(PassReport),
    Failed(InternalAnalysisError),
}

impl PassOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, PassOutcome::Completed(_))
    }

    pub fn report(&self) -> Option<&PassReport> {
        match self {
            PassOutcome::Completed(report) => Some(report),
            PassOutcome::Failed(_) => None,
        }
    }
}

/// Aggregate result of all passes over one function snapshot
///
/// A `FunctionAnalysis` is always produced for a successfully-snapshotted
/// function, even when individual passes failed or degraded to
/// conservative placeholders.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionAnalysis {
    pub function: String,
    /// Fixed order: escape, monomorphization, devirtualization, lifetime,
    /// constant propagation
    pub outcomes: Vec<PassOutcome>,
}

impl FunctionAnalysis {
    pub fn completed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_completed()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.len() - self.completed_count()
    }

    pub fn escape(&self) -> Option<&EscapeReport> {
        self.outcomes.iter().find_map(|o| match o.report() {
            Some(PassReport::Escape(r)) => Some(r),
            _ => None,
        })
    }

    pub fn monomorphization(&self) -> Option<&MonomorphizationReport> {
        self.outcomes.iter().find_map(|o| match o.report() {
            Some(PassReport::Monomorphization(r)) => Some(r),
            _ => None,
        })
    }

    pub fn devirtualization(&self) -> Option<&DevirtualizationReport> {
        self.outcomes.iter().find_map(|o| match o.report() {
            Some(PassReport::Devirtualization(r)) => Some(r),
            _ => None,
        })
    }

    pub fn lifetime(&self) -> Option<&LifetimeReport> {
        self.outcomes.iter().find_map(|o| match o.report() {
            Some(PassReport::Lifetime(r)) => Some(r),
            _ => None,
        })
    }

    pub fn constprop(&self) -> Option<&ConstPropReport> {
        self.outcomes.iter().find_map(|o| match o.report() {
            Some(PassReport::ConstantPropagation(r)) => Some(r),
            _ => None,
        })
    }

    pub fn summary(&self) -> String {
        format!(
            "analysis of `{}`: {} passes completed, {} failed",
            self.function,
            self.completed_count(),
            self.failed_count(),
        )
    }

    /// Lossless structured rendering
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).expect("reports contain only serializable data")
    }
}

impl std::fmt::Display for FunctionAnalysis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.summary())?;
        for outcome in &self.outcomes {
            match outcome {
                PassOutcome::Completed(report) => write!(f, "{report}")?,
                PassOutcome::Failed(error) => writeln!(f, "{error}")?,
            }
        }
        Ok(())
    }
}

/// The orchestrating pipeline
///
/// Holds the pass list; `run` builds the use-def index once, fans the
/// passes out, and collects outcomes in pass-list order regardless of
/// completion order.
pub struct AnalysisPipeline {
    passes: Vec<Box<dyn AnalysisPass>>,
}

impl AnalysisPipeline {
    /// Pipeline with all five standard passes
    pub fn new() -> Self {
        Self {
            passes: vec![
                Box::new(EscapeAnalysis),
                Box::new(MonomorphizationAnalysis),
                Box::new(DevirtualizationAnalysis),
                Box::new(LifetimeAnalysis),
                Box::new(ConstPropAnalysis),
            ],
        }
    }

    /// Empty pipeline, for embedders that select passes themselves
    pub fn empty() -> Self {
        Self { passes: Vec::new() }
    }

    pub fn add_pass(&mut self, pass: Box<dyn AnalysisPass>) {
        self.passes.push(pass);
    }

    pub fn run(
        &self,
        snapshot: &FunctionSnapshot,
        resolver: &dyn TargetResolver,
        config: &AnalysisConfig,
    ) -> FunctionAnalysis {
        let usedef = UseDefIndex::build(snapshot);
        let cx = AnalysisContext {
            snapshot,
            usedef: &usedef,
            resolver,
            config,
        };

        log::debug!(
            "running {} analysis passes over `{}` ({} statements)",
            self.passes.len(),
            snapshot.name,
            snapshot.statements.len(),
        );

        let outcomes = self
            .passes
            .par_iter()
            .map(|pass| run_guarded(pass.as_ref(), &cx))
            .collect();

        FunctionAnalysis {
            function: snapshot.name.clone(),
            outcomes,
        }
    }
}

impl Default for AnalysisPipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Run one pass behind the panic boundary
fn run_guarded(pass: &dyn AnalysisPass, cx: &AnalysisContext<'_>) -> PassOutcome {
    match catch_unwind(AssertUnwindSafe(|| pass.run(cx))) {
        Ok(report) => PassOutcome::Completed(report),
        Err(payload) => {
            let error = InternalAnalysisError::new(pass.name(), panic_message(payload));
            log::error!("{error}");
            PassOutcome::Failed(error)
        }
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unrecoverable analysis fault".to_string()
    }
}

/// Run all five standard passes over one snapshot
pub fn analyze_function(
    snapshot: &FunctionSnapshot,
    resolver: &dyn TargetResolver,
    config: &AnalysisConfig,
) -> FunctionAnalysis {
    AnalysisPipeline::new().run(snapshot, resolver, config)
}

/// Fetch the snapshot from the front-end and analyze it. An
/// `IrUnavailable` failure is propagated verbatim; it is the only
/// caller-visible hard failure.
pub fn analyze_with_provider(
    provider: &dyn IrProvider,
    resolver: &dyn TargetResolver,
    function: &str,
    argument_types: &[IrType],
    config: &AnalysisConfig,
) -> Result<FunctionAnalysis> {
    let snapshot = provider.typed_ir(function, argument_types)?;
    Ok(analyze_function(&snapshot, resolver, config))
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Shared fixtures for the per-pass test modules

    use super::*;
    use crate::ir::usedef::UseDefIndex;
    use crate::ir::{AllocCategory, BuiltinOp, ConstValue, SnapshotBuilder};
    use crate::resolve::StaticResolver;

    /// Run one pass over a snapshot with an empty resolver and defaults
    pub fn run_pass(pass: &dyn AnalysisPass, snapshot: FunctionSnapshot) -> PassReport {
        run_pass_full(pass, snapshot, StaticResolver::new(), AnalysisConfig::default())
    }

    pub fn run_pass_with_resolver(
        pass: &dyn AnalysisPass,
        snapshot: FunctionSnapshot,
        resolver: StaticResolver,
    ) -> PassReport {
        run_pass_full(pass, snapshot, resolver, AnalysisConfig::default())
    }

    pub fn run_pass_full(
        pass: &dyn AnalysisPass,
        snapshot: FunctionSnapshot,
        resolver: StaticResolver,
        config: AnalysisConfig,
    ) -> PassReport {
        let usedef = UseDefIndex::build(&snapshot);
        let cx = AnalysisContext {
            snapshot: &snapshot,
            usedef: &usedef,
            resolver: &resolver,
            config: &config,
        };
        pass.run(&cx)
    }

    /// A function with one local array of known size 10, never returned,
    /// only summed
    pub fn snapshot_with_local_array() -> FunctionSnapshot {
        let mut b = SnapshotBuilder::new("sum_local");
        let arr = b.alloc(
            AllocCategory::Array,
            crate::ir::IrType::Array {
                elem: Box::new(crate::ir::IrType::Int),
                len: Some(10),
            },
            Some(80),
        );
        let total = b.builtin(BuiltinOp::Sum, &[arr], crate::ir::IrType::Int);
        let _ = b.literal(ConstValue::Int(0));
        b.ret(Some(total));
        b.finish()
    }
}
