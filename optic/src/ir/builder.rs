//! Snapshot construction
//!
//! [`SnapshotBuilder`] assigns value and statement ids consecutively and
//! keeps value definitions consistent with the statement list, so a
//! front-end (or a test) cannot produce a snapshot with mismatched ids.
//! Branch arms are built through closures and their statement ranges are
//! patched once the arm lengths are known.

use std::collections::BTreeMap;

use super::{
    AllocCategory, BuiltinOp, Callee, ConstValue, FunctionSnapshot, IrType, Op, Param, Span,
    Statement, StmtId, StmtRange, Value, ValueId, ValueKind,
};

/// Builder for [`FunctionSnapshot`]
pub struct SnapshotBuilder {
    name: String,
    params: Vec<Param>,
    ret_ty: IrType,
    values: Vec<Value>,
    statements: Vec<Statement>,
    const_globals: BTreeMap<String, ConstValue>,
}

impl SnapshotBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            ret_ty: IrType::Unit,
            values: Vec::new(),
            statements: Vec::new(),
            const_globals: BTreeMap::new(),
        }
    }

    pub fn set_return_type(&mut self, ty: IrType) {
        self.ret_ty = ty;
    }

    /// Declare a parameter. Parameters carry no defining statement.
    pub fn param(&mut self, name: impl Into<String>, ty: IrType) -> ValueId {
        let position = self.params.len();
        let id = self.push_value(ValueKind::Argument { position }, ty.clone(), None);
        self.params.push(Param {
            name: name.into(),
            ty,
            value: id,
        });
        id
    }

    /// Declare an externally-immutable global binding with a known value
    pub fn const_global(&mut self, binding: impl Into<String>, value: ConstValue) {
        self.const_globals.insert(binding.into(), value);
    }

    /// `%v = const <value>`
    pub fn literal(&mut self, value: ConstValue) -> ValueId {
        let ty = value.type_of();
        self.stmt_with_result(Op::LiteralDef { value }, ValueKind::Literal, ty)
    }

    /// `%v = external <binding>`
    pub fn external_load(&mut self, binding: impl Into<String>, ty: IrType) -> ValueId {
        self.stmt_with_result(
            Op::ExternalLoad {
                binding: binding.into(),
            },
            ValueKind::ExternalLoad,
            ty,
        )
    }

    /// `%v = alloc <category>`
    pub fn alloc(&mut self, category: AllocCategory, ty: IrType, size_bytes: Option<u64>) -> ValueId {
        self.stmt_with_result(
            Op::Alloc {
                category,
                size_bytes,
            },
            ValueKind::Allocation,
            ty,
        )
    }

    /// `%v = call <op>(args...)` for a known intrinsic
    pub fn builtin(&mut self, op: BuiltinOp, args: &[ValueId], result_ty: IrType) -> ValueId {
        self.stmt_with_result(
            Op::Call {
                callee: Callee::Builtin(op),
                args: args.to_vec(),
            },
            ValueKind::CallResult,
            result_ty,
        )
    }

    /// `%v = call <function>(args...)` for an opaque named function
    pub fn call(&mut self, function: impl Into<String>, args: &[ValueId], result_ty: IrType) -> ValueId {
        self.stmt_with_result(
            Op::Call {
                callee: Callee::Static(function.into()),
                args: args.to_vec(),
            },
            ValueKind::CallResult,
            result_ty,
        )
    }

    /// `%v = call %receiver.<method>(args...)` with dynamic dispatch
    pub fn virtual_call(
        &mut self,
        method: impl Into<String>,
        receiver: ValueId,
        args: &[ValueId],
        result_ty: IrType,
    ) -> ValueId {
        self.stmt_with_result(
            Op::Call {
                callee: Callee::Virtual {
                    method: method.into(),
                    receiver,
                },
                args: args.to_vec(),
            },
            ValueKind::CallResult,
            result_ty,
        )
    }

    /// `%v = phi(inputs...)`
    pub fn phi(&mut self, inputs: &[ValueId], ty: IrType) -> ValueId {
        self.stmt_with_result(
            Op::Phi {
                inputs: inputs.to_vec(),
            },
            ValueKind::Phi,
            ty,
        )
    }

    /// `%v = closure <function> [captures...]`
    pub fn closure(&mut self, function: impl Into<String>, captures: &[ValueId]) -> ValueId {
        self.stmt_with_result(
            Op::Closure {
                function: function.into(),
                captures: captures.to_vec(),
            },
            ValueKind::CallResult,
            IrType::Aggregate("Closure".to_string()),
        )
    }

    /// `global <binding> = %v`
    pub fn store_global(&mut self, binding: impl Into<String>, value: ValueId) {
        self.push_stmt(
            Op::StoreGlobal {
                binding: binding.into(),
                value,
            },
            None,
        );
    }

    /// `release %v`
    pub fn release(&mut self, value: ValueId) {
        self.push_stmt(Op::Release { value }, None);
    }

    /// `return %v` or `return`
    pub fn ret(&mut self, value: Option<ValueId>) {
        self.push_stmt(Op::Return { value }, None);
    }

    /// `branch %cond` with arms built by the two closures. The arm
    /// statement ranges are patched after the closures run.
    pub fn branch(
        &mut self,
        cond: ValueId,
        then_arm: impl FnOnce(&mut Self),
        else_arm: impl FnOnce(&mut Self),
    ) -> StmtId {
        let branch_at = self.push_stmt(
            Op::Branch {
                cond,
                then_range: StmtRange::new(0, 0),
                else_range: StmtRange::new(0, 0),
            },
            None,
        );

        let then_start = self.statements.len() as u32;
        then_arm(self);
        let then_len = self.statements.len() as u32 - then_start;

        let else_start = self.statements.len() as u32;
        else_arm(self);
        let else_len = self.statements.len() as u32 - else_start;

        if let Op::Branch {
            then_range,
            else_range,
            ..
        } = &mut self.statements[branch_at.index()].op
        {
            *then_range = StmtRange::new(then_start, then_len);
            *else_range = StmtRange::new(else_start, else_len);
        }
        branch_at
    }

    /// Attach a source span to the most recently added statement
    pub fn spanned(&mut self, span: Span) {
        if let Some(stmt) = self.statements.last_mut() {
            stmt.span = Some(span);
        }
    }

    pub fn finish(self) -> FunctionSnapshot {
        FunctionSnapshot {
            name: self.name,
            params: self.params,
            ret_ty: self.ret_ty,
            values: self.values,
            statements: self.statements,
            const_globals: self.const_globals,
        }
    }

    fn push_value(&mut self, kind: ValueKind, ty: IrType, def: Option<StmtId>) -> ValueId {
        let id = ValueId(self.values.len() as u32);
        self.values.push(Value { id, kind, ty, def });
        id
    }

    fn push_stmt(&mut self, op: Op, result: Option<ValueId>) -> StmtId {
        let id = StmtId(self.statements.len() as u32);
        self.statements.push(Statement {
            id,
            op,
            result,
            span: None,
        });
        id
    }

    fn stmt_with_result(&mut self, op: Op, kind: ValueKind, ty: IrType) -> ValueId {
        let stmt_id = StmtId(self.statements.len() as u32);
        let value = self.push_value(kind, ty, Some(stmt_id));
        self.push_stmt(op, Some(value));
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_consecutive() {
        let mut b = SnapshotBuilder::new("f");
        let x = b.param("x", IrType::Int);
        let lit = b.literal(ConstValue::Int(1));
        let sum = b.builtin(BuiltinOp::Add, &[x, lit], IrType::Int);
        b.ret(Some(sum));
        let snapshot = b.finish();

        assert_eq!(x, ValueId(0));
        assert_eq!(lit, ValueId(1));
        assert_eq!(sum, ValueId(2));
        assert_eq!(snapshot.statements.len(), 3);
        assert_eq!(snapshot.values[2].def, Some(StmtId(1)));
        assert_eq!(snapshot.values[0].def, None);
    }

    #[test]
    fn test_branch_arm_ranges() {
        let mut b = SnapshotBuilder::new("f");
        let cond = b.literal(ConstValue::Bool(true));
        let branch_at = b.branch(
            cond,
            |b| {
                b.literal(ConstValue::Int(1));
                b.literal(ConstValue::Int(2));
            },
            |b| {
                b.literal(ConstValue::Int(3));
            },
        );
        b.ret(None);
        let snapshot = b.finish();

        let Op::Branch {
            then_range,
            else_range,
            ..
        } = snapshot.stmt(branch_at).unwrap().op
        else {
            panic!("expected branch");
        };
        assert_eq!(then_range, StmtRange::new(2, 2));
        assert_eq!(else_range, StmtRange::new(4, 1));
    }

    #[test]
    fn test_nested_branch_ranges() {
        let mut b = SnapshotBuilder::new("f");
        let cond = b.literal(ConstValue::Bool(false));
        let outer = b.branch(
            cond,
            |b| {
                let inner_cond = b.literal(ConstValue::Bool(true));
                b.branch(
                    inner_cond,
                    |b| {
                        b.literal(ConstValue::Int(1));
                    },
                    |_| {},
                );
            },
            |_| {},
        );
        b.ret(None);
        let snapshot = b.finish();

        let Op::Branch { then_range, .. } = snapshot.stmt(outer).unwrap().op else {
            panic!("expected branch");
        };
        // inner literal + inner branch + arm statement
        assert_eq!(then_range.len, 3);
    }
}
