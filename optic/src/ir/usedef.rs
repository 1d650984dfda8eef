//! Use-Def Index
//!
//! One traversal over the snapshot producing, for every value, its defining
//! statement and the ordered list of tagged use contexts. The index is
//! total: every value gets an entry, possibly with an empty use list. All
//! five analysis passes consume this index; none repeats the scan.
//!
//! A malformed snapshot (dangling value reference, out-of-bounds branch
//! arm) cannot fail the build. The offending reference is recorded as an
//! [`UnsupportedConstruct`] warning and skipped; passes see the warning and
//! degrade to their conservative defaults.

use crate::error::UnsupportedConstruct;

use super::{BuiltinOp, Callee, FunctionSnapshot, Op, StmtId, ValueId};

/// How a statement references a value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UseKind {
    /// Operand of a known intrinsic, at the given operand position
    BuiltinArg { op: BuiltinOp, index: usize },
    /// Argument (or receiver) of an opaque call - static or virtual
    CallArg { callee: String },
    /// Returned from the function
    Returned,
    /// Condition of a branch
    BranchCondition,
    /// Stored to an external binding
    StoredExternal { binding: String },
    /// Input of a phi node
    PhiInput,
    /// Captured by a closure
    ClosureCapture { function: String },
    /// Explicitly released
    Released,
}

/// One tagged reference to a value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UseSite {
    pub stmt: StmtId,
    pub kind: UseKind,
}

/// Per-value definition and ordered uses for one snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct UseDefIndex {
    defs: Vec<Option<StmtId>>,
    uses: Vec<Vec<UseSite>>,
    warnings: Vec<UnsupportedConstruct>,
}

impl UseDefIndex {
    /// Build the index in a single program-order traversal. Total for any
    /// input; never panics.
    pub fn build(snapshot: &FunctionSnapshot) -> Self {
        let count = snapshot.values.len();
        let mut index = Self {
            defs: vec![None; count],
            uses: vec![Vec::new(); count],
            warnings: Vec::new(),
        };

        for value in &snapshot.values {
            if let Some(def) = value.def {
                index.defs[value.id.index()] = Some(def);
            }
        }

        for stmt in &snapshot.statements {
            if let Some(result) = stmt.result
                && result.index() >= count
            {
                index.warn(stmt.id, format!("result refers to undefined value {result}"));
            }

            match &stmt.op {
                Op::LiteralDef { .. } | Op::ExternalLoad { .. } | Op::Alloc { .. } => {}
                Op::Call { callee, args } => match callee {
                    Callee::Builtin(op) => {
                        for (i, arg) in args.iter().enumerate() {
                            index.record(stmt.id, *arg, UseKind::BuiltinArg { op: *op, index: i });
                        }
                    }
                    Callee::Static(name) => {
                        for arg in args {
                            index.record(
                                stmt.id,
                                *arg,
                                UseKind::CallArg {
                                    callee: name.clone(),
                                },
                            );
                        }
                    }
                    Callee::Virtual { method, receiver } => {
                        index.record(
                            stmt.id,
                            *receiver,
                            UseKind::CallArg {
                                callee: method.clone(),
                            },
                        );
                        for arg in args {
                            index.record(
                                stmt.id,
                                *arg,
                                UseKind::CallArg {
                                    callee: method.clone(),
                                },
                            );
                        }
                    }
                },
                Op::Phi { inputs } => {
                    for input in inputs {
                        index.record(stmt.id, *input, UseKind::PhiInput);
                    }
                }
                Op::Branch {
                    cond,
                    then_range,
                    else_range,
                } => {
                    index.record(stmt.id, *cond, UseKind::BranchCondition);
                    let end = snapshot.statements.len() as u32;
                    if then_range.end() > end || else_range.end() > end {
                        index.warn(stmt.id, "branch arm range extends past function end");
                    }
                }
                Op::Return { value } => {
                    if let Some(value) = value {
                        index.record(stmt.id, *value, UseKind::Returned);
                    }
                }
                Op::StoreGlobal { binding, value } => {
                    index.record(
                        stmt.id,
                        *value,
                        UseKind::StoredExternal {
                            binding: binding.clone(),
                        },
                    );
                }
                Op::Closure { function, captures } => {
                    for capture in captures {
                        index.record(
                            stmt.id,
                            *capture,
                            UseKind::ClosureCapture {
                                function: function.clone(),
                            },
                        );
                    }
                }
                Op::Release { value } => {
                    index.record(stmt.id, *value, UseKind::Released);
                }
            }
        }

        index
    }

    pub fn def(&self, value: ValueId) -> Option<StmtId> {
        self.defs.get(value.index()).copied().flatten()
    }

    /// Ordered use contexts of a value; empty for an unused or dangling id
    pub fn uses(&self, value: ValueId) -> &[UseSite] {
        self.uses.get(value.index()).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Last use by program-order statement id
    pub fn last_use(&self, value: ValueId) -> Option<StmtId> {
        self.uses(value).iter().map(|site| site.stmt).max()
    }

    pub fn warnings(&self) -> &[UnsupportedConstruct] {
        &self.warnings
    }

    fn record(&mut self, stmt: StmtId, value: ValueId, kind: UseKind) {
        match self.uses.get_mut(value.index()) {
            Some(sites) => sites.push(UseSite { stmt, kind }),
            None => self.warn(stmt, format!("reference to undefined value {value}")),
        }
    }

    fn warn(&mut self, stmt: StmtId, message: impl Into<String>) {
        let warning = UnsupportedConstruct::new(stmt, message);
        log::warn!("{warning}");
        self.warnings.push(warning);
    }
}
