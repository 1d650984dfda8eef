//! Constant propagation analysis
//!
//! Seeds a table with literals and externally-immutable bindings, then
//! folds every pure scalar operation whose operands already resolve to
//! constants. Because the IR is SSA, one forward pass over the statement
//! list reaches the fixed point - no operand can be defined after its use.
//!
//! A branch whose condition resolves to a constant yields a dead-branch
//! finding naming the arm that can never execute and its statement count.
//! Nothing is removed; the counts are code-reduction estimates.

use indexmap::IndexMap;

use crate::ir::{BuiltinOp, Callee, ConstValue, Op, ValueId};
use crate::report::{BranchArm, ConstPropReport, ConstantBinding, DeadBranch, Provenance, Suggestion};

use super::{AnalysisContext, AnalysisPass, PassReport};

pub struct ConstPropAnalysis;

impl AnalysisPass for ConstPropAnalysis {
    fn name(&self) -> &'static str {
        "constant-propagation"
    }

    fn run(&self, cx: &AnalysisContext<'_>) -> PassReport {
        // Insertion order is program order, so the report lists constants
        // in the order their defining statements appear.
        let mut table: IndexMap<ValueId, ConstantBinding> = IndexMap::new();
        let mut dead_branches = Vec::new();

        for stmt in &cx.snapshot.statements {
            match &stmt.op {
                Op::LiteralDef { value } => {
                    if let Some(result) = stmt.result {
                        bind(&mut table, result, value.clone(), Provenance::Literal);
                    }
                }
                Op::ExternalLoad { binding } => {
                    if let (Some(result), Some(value)) =
                        (stmt.result, cx.snapshot.const_globals.get(binding))
                    {
                        bind(&mut table, result, value.clone(), Provenance::ImmutableGlobal);
                    }
                }
                Op::Call {
                    callee: Callee::Builtin(op),
                    args,
                } if op.is_pure_scalar() => {
                    let operands: Option<Vec<&ConstValue>> = args
                        .iter()
                        .map(|arg| table.get(arg).map(|b| &b.literal))
                        .collect();
                    if let (Some(result), Some(operands)) = (stmt.result, operands)
                        && let Some(folded) = fold(*op, &operands)
                    {
                        bind(&mut table, result, folded, Provenance::FoldedExpression);
                    }
                }
                Op::Branch {
                    cond,
                    then_range,
                    else_range,
                } => {
                    if let Some(value) = table.get(cond).and_then(|b| b.literal.as_bool()) {
                        let (eliminated_arm, count) = if value {
                            (BranchArm::Else, else_range.len)
                        } else {
                            (BranchArm::Then, then_range.len)
                        };
                        dead_branches.push(DeadBranch {
                            stmt: stmt.id,
                            condition: *cond,
                            eliminated_arm,
                            eliminated_statement_count: count as usize,
                        });
                    }
                }
                _ => {}
            }
        }

        let constants: Vec<ConstantBinding> = table.into_values().collect();
        let suggestions = suggestions_for(&constants, &dead_branches);
        PassReport::ConstantPropagation(ConstPropReport {
            function: cx.snapshot.name.clone(),
            constants,
            dead_branches,
            warnings: cx.usedef.warnings().to_vec(),
            suggestions,
        })
    }
}

fn bind(
    table: &mut IndexMap<ValueId, ConstantBinding>,
    value: ValueId,
    literal: ConstValue,
    provenance: Provenance,
) {
    table.insert(
        value,
        ConstantBinding {
            value,
            literal,
            provenance,
        },
    );
}

/// Evaluate a pure scalar operator over constant operands. `None` means
/// "not constant": wrong arity, mismatched types, overflow, or division by
/// zero all stay conservatively unfolded.
fn fold(op: BuiltinOp, operands: &[&ConstValue]) -> Option<ConstValue> {
    use BuiltinOp::*;
    use ConstValue::*;

    match (op, operands) {
        (Neg, [Int(a)]) => a.checked_neg().map(Int),
        (Neg, [Float(a)]) => Some(Float(-a)),
        (Not, [Bool(a)]) => Some(Bool(!a)),

        (Add, [Int(a), Int(b)]) => a.checked_add(*b).map(Int),
        (Sub, [Int(a), Int(b)]) => a.checked_sub(*b).map(Int),
        (Mul, [Int(a), Int(b)]) => a.checked_mul(*b).map(Int),
        (Div, [Int(a), Int(b)]) => a.checked_div(*b).map(Int),
        (Mod, [Int(a), Int(b)]) => a.checked_rem(*b).map(Int),

        (Add, [Float(a), Float(b)]) => Some(Float(a + b)),
        (Sub, [Float(a), Float(b)]) => Some(Float(a - b)),
        (Mul, [Float(a), Float(b)]) => Some(Float(a * b)),
        (Div, [Float(a), Float(b)]) => Some(Float(a / b)),
        (Mod, [Float(a), Float(b)]) => Some(Float(a % b)),

        (Eq, [Int(a), Int(b)]) => Some(Bool(a == b)),
        (Ne, [Int(a), Int(b)]) => Some(Bool(a != b)),
        (Lt, [Int(a), Int(b)]) => Some(Bool(a < b)),
        (Le, [Int(a), Int(b)]) => Some(Bool(a <= b)),
        (Gt, [Int(a), Int(b)]) => Some(Bool(a > b)),
        (Ge, [Int(a), Int(b)]) => Some(Bool(a >= b)),

        (Eq, [Bool(a), Bool(b)]) => Some(Bool(a == b)),
        (Ne, [Bool(a), Bool(b)]) => Some(Bool(a != b)),
        (And, [Bool(a), Bool(b)]) => Some(Bool(*a && *b)),
        (Or, [Bool(a), Bool(b)]) => Some(Bool(*a || *b)),

        _ => None,
    }
}

fn suggestions_for(constants: &[ConstantBinding], dead_branches: &[DeadBranch]) -> Vec<Suggestion> {
    let mut suggestions = Vec::new();
    for d in dead_branches {
        suggestions.push(Suggestion::new(format!(
            "branch at {} always takes its {} arm; {} statement(s) are unreachable",
            d.stmt,
            match d.eliminated_arm {
                BranchArm::Then => BranchArm::Else,
                BranchArm::Else => BranchArm::Then,
            },
            d.eliminated_statement_count,
        )));
    }
    for c in constants
        .iter()
        .filter(|c| c.provenance == Provenance::FoldedExpression)
    {
        suggestions.push(Suggestion::with_fragments(
            format!("replace computation of {} with the constant {}", c.value, c.literal),
            format!("{} = <expression>", c.value),
            format!("{} = const {}", c.value, c.literal),
        ));
    }
    suggestions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::test_support::run_pass;
    use crate::ir::{IrType, SnapshotBuilder};

    fn constprop_report(snapshot: crate::ir::FunctionSnapshot) -> ConstPropReport {
        match run_pass(&ConstPropAnalysis, snapshot) {
            PassReport::ConstantPropagation(report) => report,
            other => panic!("expected constant propagation report, got {}", other.pass_name()),
        }
    }

    #[test]
    fn test_fold_chain() {
        // (10 + 20) * 2 folds to 60 through the table
        let mut b = SnapshotBuilder::new("f");
        let ten = b.literal(ConstValue::Int(10));
        let twenty = b.literal(ConstValue::Int(20));
        let sum = b.builtin(BuiltinOp::Add, &[ten, twenty], IrType::Int);
        let two = b.literal(ConstValue::Int(2));
        let product = b.builtin(BuiltinOp::Mul, &[sum, two], IrType::Int);
        b.ret(Some(product));
        let report = constprop_report(b.finish());

        let binding = report.constant(product).unwrap();
        assert_eq!(binding.literal, ConstValue::Int(60));
        assert_eq!(binding.provenance, Provenance::FoldedExpression);
        assert_eq!(report.folded_count(), 2);
    }

    #[test]
    fn test_immutable_global_seeds_table() {
        let mut b = SnapshotBuilder::new("f");
        b.const_global("MAX_DEPTH", ConstValue::Int(8));
        let depth = b.external_load("MAX_DEPTH", IrType::Int);
        let one = b.literal(ConstValue::Int(1));
        let next = b.builtin(BuiltinOp::Add, &[depth, one], IrType::Int);
        b.ret(Some(next));
        let report = constprop_report(b.finish());

        assert_eq!(
            report.constant(depth).unwrap().provenance,
            Provenance::ImmutableGlobal
        );
        assert_eq!(report.constant(next).unwrap().literal, ConstValue::Int(9));
    }

    #[test]
    fn test_mutable_external_is_not_constant() {
        let mut b = SnapshotBuilder::new("f");
        let depth = b.external_load("current_depth", IrType::Int);
        b.ret(Some(depth));
        let report = constprop_report(b.finish());
        assert!(report.constant(depth).is_none());
    }

    #[test]
    fn test_constant_false_branch_eliminates_then_arm() {
        let mut b = SnapshotBuilder::new("f");
        let cond = b.literal(ConstValue::Bool(false));
        b.branch(
            cond,
            |b| {
                b.literal(ConstValue::Int(1));
                b.literal(ConstValue::Int(2));
                b.literal(ConstValue::Int(3));
            },
            |b| {
                b.literal(ConstValue::Int(4));
            },
        );
        b.ret(None);
        let report = constprop_report(b.finish());

        assert_eq!(report.dead_branches.len(), 1);
        let dead = &report.dead_branches[0];
        assert_eq!(dead.eliminated_arm, BranchArm::Then);
        assert_eq!(dead.eliminated_statement_count, 3);
    }

    #[test]
    fn test_folded_comparison_feeds_branch() {
        let mut b = SnapshotBuilder::new("f");
        let three = b.literal(ConstValue::Int(3));
        let five = b.literal(ConstValue::Int(5));
        let cond = b.builtin(BuiltinOp::Lt, &[five, three], IrType::Bool);
        b.branch(
            cond,
            |b| {
                b.literal(ConstValue::Int(1));
            },
            |_| {},
        );
        b.ret(None);
        let report = constprop_report(b.finish());

        assert_eq!(report.constant(cond).unwrap().literal, ConstValue::Bool(false));
        assert_eq!(report.dead_branches[0].eliminated_arm, BranchArm::Then);
    }

    #[test]
    fn test_division_by_zero_stays_unfolded() {
        let mut b = SnapshotBuilder::new("f");
        let one = b.literal(ConstValue::Int(1));
        let zero = b.literal(ConstValue::Int(0));
        let quotient = b.builtin(BuiltinOp::Div, &[one, zero], IrType::Int);
        b.ret(Some(quotient));
        let report = constprop_report(b.finish());
        assert!(report.constant(quotient).is_none());
    }

    #[test]
    fn test_overflow_stays_unfolded() {
        let mut b = SnapshotBuilder::new("f");
        let max = b.literal(ConstValue::Int(i64::MAX));
        let one = b.literal(ConstValue::Int(1));
        let sum = b.builtin(BuiltinOp::Add, &[max, one], IrType::Int);
        b.ret(Some(sum));
        let report = constprop_report(b.finish());
        assert!(report.constant(sum).is_none());
    }

    #[test]
    fn test_non_constant_operand_blocks_fold() {
        let mut b = SnapshotBuilder::new("f");
        let x = b.param("x", IrType::Int);
        let one = b.literal(ConstValue::Int(1));
        let sum = b.builtin(BuiltinOp::Add, &[x, one], IrType::Int);
        b.ret(Some(sum));
        let report = constprop_report(b.finish());
        assert!(report.constant(sum).is_none());
        assert_eq!(report.constants.len(), 1);
    }

    #[test]
    fn test_constants_listed_in_program_order() {
        let mut b = SnapshotBuilder::new("f");
        let first = b.literal(ConstValue::Int(1));
        let second = b.literal(ConstValue::Int(2));
        let third = b.builtin(BuiltinOp::Add, &[first, second], IrType::Int);
        b.ret(Some(third));
        let report = constprop_report(b.finish());

        let order: Vec<ValueId> = report.constants.iter().map(|c| c.value).collect();
        assert_eq!(order, vec![first, second, third]);
    }

    #[test]
    fn test_mixed_types_stay_unfolded() {
        let mut b = SnapshotBuilder::new("f");
        let int = b.literal(ConstValue::Int(1));
        let float = b.literal(ConstValue::Float(2.0));
        let sum = b.builtin(BuiltinOp::Add, &[int, float], IrType::Unknown);
        b.ret(Some(sum));
        let report = constprop_report(b.finish());
        assert!(report.constant(sum).is_none());
    }
}
