//! Analysis reports
//!
//! One immutable report value per pass: summary counts, ordered per-entity
//! findings, warning-level notes for unrecognized constructs, and ranked
//! suggestions. Reports are data only - no callbacks, no IR mutation hooks.
//! The textual rendering (`Display`) and the structured rendering
//! (`serde_json` via `Serialize`) are both derived from the same value; the
//! structured form is lossless.

use serde::Serialize;

use crate::error::UnsupportedConstruct;
use crate::ir::{AllocationSite, ConstValue, StmtId, ValueId};
use crate::resolve::MethodCandidate;

/// Ranked, actionable recommendation. Position in the report's suggestion
/// list is the rank.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    pub message: String,
    /// Illustrative fragment of the current shape
    pub before: Option<String>,
    /// Illustrative fragment after applying the suggestion
    pub after: Option<String>,
}

impl Suggestion {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            before: None,
            after: None,
        }
    }

    pub fn with_fragments(
        message: impl Into<String>,
        before: impl Into<String>,
        after: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            before: Some(before.into()),
            after: Some(after.into()),
        }
    }
}

impl std::fmt::Display for Suggestion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let (Some(before), Some(after)) = (&self.before, &self.after) {
            write!(f, " [{before} -> {after}]")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Escape analysis
// ---------------------------------------------------------------------------

/// Escape classification of one allocation site
///
/// Invariants, enforced at construction: `stack_promotable` and
/// `scalar_replaceable` both imply `!escapes`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EscapeRecord {
    pub site: AllocationSite,
    pub escapes: bool,
    /// Ordered reasons, one per escaping use context
    pub reasons: Vec<String>,
    pub stack_promotable: bool,
    pub scalar_replaceable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EscapeReport {
    pub function: String,
    /// Ordered by allocation statement id (program order)
    pub records: Vec<EscapeRecord>,
    pub warnings: Vec<UnsupportedConstruct>,
    pub suggestions: Vec<Suggestion>,
}

impl EscapeReport {
    pub fn escaping_count(&self) -> usize {
        self.records.iter().filter(|r| r.escapes).count()
    }

    pub fn stack_promotable_count(&self) -> usize {
        self.records.iter().filter(|r| r.stack_promotable).count()
    }

    pub fn scalar_replaceable_count(&self) -> usize {
        self.records.iter().filter(|r| r.scalar_replaceable).count()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} allocations, {} escaping, {} stack-promotable, {} scalar-replaceable",
            self.records.len(),
            self.escaping_count(),
            self.stack_promotable_count(),
            self.scalar_replaceable_count(),
        )
    }
}

impl std::fmt::Display for EscapeReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "escape report for `{}`: {}", self.function, self.summary())?;
        for r in &self.records {
            let size = match r.site.size_bytes {
                Some(bytes) => format!("{bytes} bytes"),
                None => "size unknown".to_string(),
            };
            write!(
                f,
                "  {} = alloc {} ({}) at {}: ",
                r.site.value, r.site.category, size, r.site.stmt
            )?;
            if r.escapes {
                writeln!(f, "escapes ({})", r.reasons.join("; "))?;
            } else {
                let mut line = "local".to_string();
                if r.stack_promotable {
                    line.push_str(" [stack-promotable]");
                }
                if r.scalar_replaceable {
                    line.push_str(" [scalar-replaceable]");
                }
                writeln!(f, "{line}")?;
            }
        }
        write_notes(f, &self.warnings, &self.suggestions)
    }
}

// ---------------------------------------------------------------------------
// Monomorphization analysis
// ---------------------------------------------------------------------------

/// A declared parameter whose type is non-concrete
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AbstractParameter {
    pub position: usize,
    pub name: String,
    pub declared_type: String,
    /// Sorted by type name
    pub discovered_concrete_types: Vec<String>,
    /// True exactly when the discovered set is non-empty and closed
    pub can_monomorphize: bool,
}

/// One proposed specialization signature
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Specialization {
    /// Deterministic: an index over the stable sorted ordering of the
    /// discovered type combinations
    pub variant_name: String,
    /// Concrete type per abstract parameter, in parameter-position order
    pub concrete_types: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonomorphizationReport {
    pub function: String,
    pub parameters: Vec<AbstractParameter>,
    pub specializations: Vec<Specialization>,
    /// The Cartesian product hit the configured ceiling
    pub truncated: bool,
    pub warnings: Vec<UnsupportedConstruct>,
    pub suggestions: Vec<Suggestion>,
}

impl MonomorphizationReport {
    /// Every abstract parameter has a closed, non-empty concrete set
    pub fn fully_resolvable(&self) -> bool {
        !self.parameters.is_empty() && self.parameters.iter().all(|p| p.can_monomorphize)
    }

    pub fn unresolved_count(&self) -> usize {
        self.parameters.iter().filter(|p| !p.can_monomorphize).count()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} abstract parameters, {} unresolved, {} specializations{}",
            self.parameters.len(),
            self.unresolved_count(),
            self.specializations.len(),
            if self.truncated { " (truncated)" } else { "" },
        )
    }
}

impl std::fmt::Display for MonomorphizationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "monomorphization report for `{}`: {}",
            self.function,
            self.summary()
        )?;
        for p in &self.parameters {
            writeln!(
                f,
                "  parameter {} `{}`: declared {}, observed [{}]{}",
                p.position,
                p.name,
                p.declared_type,
                p.discovered_concrete_types.join(", "),
                if p.can_monomorphize { "" } else { " (unresolved)" },
            )?;
        }
        for s in &self.specializations {
            writeln!(f, "  variant {} <{}>", s.variant_name, s.concrete_types.join(", "))?;
        }
        write_notes(f, &self.warnings, &self.suggestions)
    }
}

// ---------------------------------------------------------------------------
// Devirtualization analysis
// ---------------------------------------------------------------------------

/// How a dynamically dispatched call could be lowered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DispatchStrategy {
    /// Exactly one candidate target
    Direct,
    /// Two to four candidates, amenable to a closed type switch
    Switch,
    /// Reserved for jump-table lowering; the classifier never selects it
    Table,
    /// Unknown, unbounded, or above the enumeration ceiling
    None,
}

impl std::fmt::Display for DispatchStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatchStrategy::Direct => write!(f, "direct"),
            DispatchStrategy::Switch => write!(f, "switch"),
            DispatchStrategy::Table => write!(f, "table"),
            DispatchStrategy::None => write!(f, "none"),
        }
    }
}

/// One call statement with a non-statically-resolved target
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallSiteRecord {
    pub stmt: StmtId,
    pub method: String,
    pub receiver: ValueId,
    pub receiver_type: String,
    /// Ordered as the resolver returned them, truncated at the ceiling
    pub candidates: Vec<MethodCandidate>,
    pub strategy: DispatchStrategy,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DevirtualizationReport {
    pub function: String,
    /// Ordered by call statement id
    pub call_sites: Vec<CallSiteRecord>,
    pub warnings: Vec<UnsupportedConstruct>,
    pub suggestions: Vec<Suggestion>,
}

impl DevirtualizationReport {
    pub fn count_with(&self, strategy: DispatchStrategy) -> usize {
        self.call_sites
            .iter()
            .filter(|c| c.strategy == strategy)
            .count()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} virtual call sites, {} direct, {} switch, {} unresolved",
            self.call_sites.len(),
            self.count_with(DispatchStrategy::Direct),
            self.count_with(DispatchStrategy::Switch),
            self.count_with(DispatchStrategy::None),
        )
    }
}

impl std::fmt::Display for DevirtualizationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "devirtualization report for `{}`: {}",
            self.function,
            self.summary()
        )?;
        for c in &self.call_sites {
            writeln!(
                f,
                "  {} `{}` on {} ({}): {} candidates -> {}",
                c.stmt,
                c.method,
                c.receiver,
                c.receiver_type,
                c.candidates.len(),
                c.strategy,
            )?;
        }
        write_notes(f, &self.warnings, &self.suggestions)
    }
}

// ---------------------------------------------------------------------------
// Lifetime analysis
// ---------------------------------------------------------------------------

/// Why an allocation cannot be automatically released
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LifetimeConflict {
    Returned,
    StoredExternally,
    CapturedByClosure,
    RetainedByCall,
    /// An explicit release precedes a later use of the value
    AlreadyReleased,
}

impl std::fmt::Display for LifetimeConflict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifetimeConflict::Returned => write!(f, "returned"),
            LifetimeConflict::StoredExternally => write!(f, "stored-externally"),
            LifetimeConflict::CapturedByClosure => write!(f, "captured-by-closure"),
            LifetimeConflict::RetainedByCall => write!(f, "retained-by-opaque-call"),
            LifetimeConflict::AlreadyReleased => write!(f, "already-explicitly-released"),
        }
    }
}

/// Lifetime classification of one manually-managed allocation
///
/// Invariant, enforced at construction: `auto_freeable` exactly when the
/// conflict set is empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LifetimeRecord {
    pub site: AllocationSite,
    pub last_use: Option<StmtId>,
    /// Deduplicated, in first-occurrence program order
    pub conflicts: Vec<LifetimeConflict>,
    pub auto_freeable: bool,
    /// Absent when a conflict exists or an explicit release already covers
    /// the value
    pub suggested_release_point: Option<StmtId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LifetimeReport {
    pub function: String,
    /// Ordered by allocation statement id
    pub records: Vec<LifetimeRecord>,
    pub warnings: Vec<UnsupportedConstruct>,
    pub suggestions: Vec<Suggestion>,
}

impl LifetimeReport {
    pub fn auto_freeable_count(&self) -> usize {
        self.records.iter().filter(|r| r.auto_freeable).count()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} managed buffers, {} auto-freeable, {} release suggestions",
            self.records.len(),
            self.auto_freeable_count(),
            self.records
                .iter()
                .filter(|r| r.suggested_release_point.is_some())
                .count(),
        )
    }
}

impl std::fmt::Display for LifetimeReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "lifetime report for `{}`: {}", self.function, self.summary())?;
        for r in &self.records {
            write!(f, "  {} allocated at {}: ", r.site.value, r.site.stmt)?;
            match (&r.conflicts[..], r.suggested_release_point) {
                ([], Some(point)) => writeln!(f, "auto-freeable, release at {point}")?,
                ([], None) => writeln!(f, "auto-freeable, already released")?,
                (conflicts, _) => {
                    let list: Vec<String> = conflicts.iter().map(|c| c.to_string()).collect();
                    writeln!(f, "conflicts [{}]", list.join(", "))?
                }
            }
        }
        write_notes(f, &self.warnings, &self.suggestions)
    }
}

// ---------------------------------------------------------------------------
// Constant propagation analysis
// ---------------------------------------------------------------------------

/// Where a constant came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Provenance {
    Literal,
    ImmutableGlobal,
    FoldedExpression,
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provenance::Literal => write!(f, "literal"),
            Provenance::ImmutableGlobal => write!(f, "immutable-global"),
            Provenance::FoldedExpression => write!(f, "folded-expression"),
        }
    }
}

/// A value proven constant
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConstantBinding {
    pub value: ValueId,
    pub literal: ConstValue,
    pub provenance: Provenance,
}

/// Branch arm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BranchArm {
    Then,
    Else,
}

impl std::fmt::Display for BranchArm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BranchArm::Then => write!(f, "then"),
            BranchArm::Else => write!(f, "else"),
        }
    }
}

/// A branch whose condition is constant; the named arm can never execute
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeadBranch {
    pub stmt: StmtId,
    pub condition: ValueId,
    pub eliminated_arm: BranchArm,
    /// Statement count of the unreachable arm, for code-reduction
    /// estimates only - nothing is removed
    pub eliminated_statement_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConstPropReport {
    pub function: String,
    /// In program order of the defining statements
    pub constants: Vec<ConstantBinding>,
    /// Ordered by branch statement id
    pub dead_branches: Vec<DeadBranch>,
    pub warnings: Vec<UnsupportedConstruct>,
    pub suggestions: Vec<Suggestion>,
}

impl ConstPropReport {
    pub fn constant(&self, value: ValueId) -> Option<&ConstantBinding> {
        self.constants.iter().find(|c| c.value == value)
    }

    pub fn folded_count(&self) -> usize {
        self.constants
            .iter()
            .filter(|c| c.provenance == Provenance::FoldedExpression)
            .count()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} constants ({} folded), {} dead branches",
            self.constants.len(),
            self.folded_count(),
            self.dead_branches.len(),
        )
    }
}

impl std::fmt::Display for ConstPropReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "constant propagation report for `{}`: {}",
            self.function,
            self.summary()
        )?;
        for c in &self.constants {
            writeln!(f, "  {} = {} ({})", c.value, c.literal, c.provenance)?;
        }
        for d in &self.dead_branches {
            writeln!(
                f,
                "  branch at {} never takes its {} arm ({} statements unreachable)",
                d.stmt, d.eliminated_arm, d.eliminated_statement_count,
            )?;
        }
        write_notes(f, &self.warnings, &self.suggestions)
    }
}

fn write_notes(
    f: &mut std::fmt::Formatter<'_>,
    warnings: &[UnsupportedConstruct],
    suggestions: &[Suggestion],
) -> std::fmt::Result {
    for w in warnings {
        writeln!(f, "  warning: {w}")?;
    }
    for (rank, s) in suggestions.iter().enumerate() {
        writeln!(f, "  suggestion {}: {}", rank + 1, s)?;
    }
    Ok(())
}
