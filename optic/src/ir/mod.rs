//! Typed SSA Intermediate Representation
//!
//! A [`FunctionSnapshot`] is the immutable, already-inferred representation
//! of one function instantiation: ordered statements, per-value inferred
//! types, parameter types, return type. It is supplied by the type-inference
//! front-end and never mutated by any analysis pass.
//!
//! The statement list is flat and program-ordered. A branch names its two
//! arms as contiguous statement-id ranges inside that flat list, so arm
//! sizes and whole-function scans never need block reconstruction.

mod builder;
pub mod usedef;

pub use builder::SnapshotBuilder;

use std::collections::BTreeMap;

use serde::Serialize;

/// SSA value identifier: `%3`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ValueId(pub u32);

impl ValueId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for ValueId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// Statement identifier: `s3`. Statement ids are consecutive positions in
/// the flat program-ordered statement list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct StmtId(pub u32);

impl StmtId {
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// The statement position immediately after this one
    pub fn next(self) -> StmtId {
        StmtId(self.0 + 1)
    }
}

impl std::fmt::Display for StmtId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// Source span carried through from the front-end, for diagnostics only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Constant value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ConstValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Unit,
}

impl ConstValue {
    pub fn type_of(&self) -> IrType {
        match self {
            ConstValue::Int(_) => IrType::Int,
            ConstValue::Float(_) => IrType::Float,
            ConstValue::Bool(_) => IrType::Bool,
            ConstValue::Str(_) => IrType::Str,
            ConstValue::Unit => IrType::Unit,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConstValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl std::fmt::Display for ConstValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConstValue::Int(v) => write!(f, "{v}"),
            ConstValue::Float(v) => write!(f, "{v}"),
            ConstValue::Bool(v) => write!(f, "{v}"),
            ConstValue::Str(v) => write!(f, "{v:?}"),
            ConstValue::Unit => write!(f, "()"),
        }
    }
}

/// Inferred type of a value
///
/// `Abstract` is a declared-but-unresolved type (an abstract numeric type,
/// an open interface). `Unknown` means inference produced nothing usable;
/// every pass treats it with its conservative default.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum IrType {
    Int,
    Float,
    Bool,
    Str,
    Unit,
    /// Array with optional statically-known length
    Array {
        elem: Box<IrType>,
        len: Option<u64>,
    },
    /// Named aggregate (struct-like)
    Aggregate(String),
    /// Manually-managed raw buffer
    Buffer,
    /// Declared non-concrete type, by name
    Abstract(String),
    Unknown,
}

impl IrType {
    /// A concrete type requires no further resolution. Arrays are concrete
    /// exactly when their element type is.
    pub fn is_concrete(&self) -> bool {
        match self {
            IrType::Abstract(_) | IrType::Unknown => false,
            IrType::Array { elem, .. } => elem.is_concrete(),
            _ => true,
        }
    }

    /// Canonical printable name, used for report entries and for the
    /// stable sorted ordering of discovered specialization types.
    pub fn name(&self) -> String {
        self.to_string()
    }
}

impl std::fmt::Display for IrType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IrType::Int => write!(f, "Int"),
            IrType::Float => write!(f, "Float"),
            IrType::Bool => write!(f, "Bool"),
            IrType::Str => write!(f, "Str"),
            IrType::Unit => write!(f, "Unit"),
            IrType::Array { elem, len: Some(n) } => write!(f, "[{elem}; {n}]"),
            IrType::Array { elem, len: None } => write!(f, "[{elem}]"),
            IrType::Aggregate(name) => write!(f, "{name}"),
            IrType::Buffer => write!(f, "Buffer"),
            IrType::Abstract(name) => write!(f, "{name}"),
            IrType::Unknown => write!(f, "?"),
        }
    }
}

/// Allocation category of an allocation site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AllocCategory {
    /// Homogeneous element container
    Array,
    /// Struct-like aggregate
    Aggregate,
    /// Manually-managed buffer; subject to lifetime analysis
    Buffer,
}

impl std::fmt::Display for AllocCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AllocCategory::Array => write!(f, "array"),
            AllocCategory::Aggregate => write!(f, "aggregate"),
            AllocCategory::Buffer => write!(f, "buffer"),
        }
    }
}

/// Intrinsic operation with fully known semantics
///
/// Scalar operators and the container operations the escape allowlist
/// covers are calls to this closed set. Everything else in a function body
/// is an opaque static call or a virtual call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BuiltinOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Neg,
    // Comparison
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    // Logical
    And,
    Or,
    Not,
    // Container operations: len(c), load(c, i), store(c, i, v), sum(c)
    Len,
    Load,
    Store,
    Sum,
}

impl BuiltinOp {
    /// Pure, side-effect-free scalar operator, eligible for constant folding
    pub fn is_pure_scalar(self) -> bool {
        !matches!(
            self,
            BuiltinOp::Len | BuiltinOp::Load | BuiltinOp::Store | BuiltinOp::Sum
        )
    }

    /// Whether the operand at `index` is retained beyond the operation.
    ///
    /// Container operations do not capture the container itself; `store`
    /// retains the stored value (operand 2) inside the container.
    pub fn captures_operand(self, index: usize) -> bool {
        match self {
            BuiltinOp::Store => index == 2,
            _ => false,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BuiltinOp::Add => "+",
            BuiltinOp::Sub => "-",
            BuiltinOp::Mul => "*",
            BuiltinOp::Div => "/",
            BuiltinOp::Mod => "%",
            BuiltinOp::Neg => "neg",
            BuiltinOp::Eq => "==",
            BuiltinOp::Ne => "!=",
            BuiltinOp::Lt => "<",
            BuiltinOp::Le => "<=",
            BuiltinOp::Gt => ">",
            BuiltinOp::Ge => ">=",
            BuiltinOp::And => "and",
            BuiltinOp::Or => "or",
            BuiltinOp::Not => "not",
            BuiltinOp::Len => "len",
            BuiltinOp::Load => "load",
            BuiltinOp::Store => "store",
            BuiltinOp::Sum => "sum",
        }
    }
}

/// Call target
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Callee {
    /// Known intrinsic
    Builtin(BuiltinOp),
    /// Named function with an opaque body
    Static(String),
    /// Dynamically dispatched method on a receiver value
    Virtual { method: String, receiver: ValueId },
}

/// Contiguous statement-id range, used for branch arms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StmtRange {
    pub start: u32,
    pub len: u32,
}

impl StmtRange {
    pub fn new(start: u32, len: u32) -> Self {
        Self { start, len }
    }

    pub fn end(self) -> u32 {
        self.start + self.len
    }

    pub fn is_empty(self) -> bool {
        self.len == 0
    }
}

/// IR operation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Op {
    /// `%v = const <value>`
    LiteralDef { value: ConstValue },
    /// `%v = external <binding>` - load of a named external binding
    ExternalLoad { binding: String },
    /// `%v = alloc <category>` with a byte-size estimate when the size is
    /// statically known
    Alloc {
        category: AllocCategory,
        size_bytes: Option<u64>,
    },
    /// `%v = call <callee>(args...)`
    Call { callee: Callee, args: Vec<ValueId> },
    /// `%v = phi(inputs...)`
    Phi { inputs: Vec<ValueId> },
    /// `branch %cond then <range> else <range>` - both arm ranges are
    /// contiguous spans of the flat statement list following the branch
    Branch {
        cond: ValueId,
        then_range: StmtRange,
        else_range: StmtRange,
    },
    /// `return %v` or `return`
    Return { value: Option<ValueId> },
    /// `global <binding> = %v` - store to an external location
    StoreGlobal { binding: String, value: ValueId },
    /// `%v = closure <function> [captures...]`
    Closure {
        function: String,
        captures: Vec<ValueId>,
    },
    /// `release %v` - explicit manual release of a buffer
    Release { value: ValueId },
}

/// Ordered IR statement. Never mutated after snapshot creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statement {
    pub id: StmtId,
    pub op: Op,
    pub result: Option<ValueId>,
    pub span: Option<Span>,
}

/// How a value came to exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ValueKind {
    Argument { position: usize },
    Literal,
    Allocation,
    CallResult,
    Phi,
    ExternalLoad,
}

/// SSA value: assigned exactly once, carries its inferred type.
/// Arguments have no defining statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Value {
    pub id: ValueId,
    pub kind: ValueKind,
    pub ty: IrType,
    pub def: Option<StmtId>,
}

/// Declared function parameter
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Param {
    pub name: String,
    pub ty: IrType,
    pub value: ValueId,
}

/// An allocation in the snapshot, as both escape and lifetime analysis see
/// it before tagging it with their own classification
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocationSite {
    pub value: ValueId,
    pub stmt: StmtId,
    pub category: AllocCategory,
    pub size_bytes: Option<u64>,
}

impl AllocationSite {
    pub fn size_known(&self) -> bool {
        self.size_bytes.is_some()
    }
}

/// Immutable typed SSA snapshot of one function instantiation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionSnapshot {
    pub name: String,
    pub params: Vec<Param>,
    pub ret_ty: IrType,
    pub values: Vec<Value>,
    pub statements: Vec<Statement>,
    /// Externally-declared immutable bindings with known values; seeds for
    /// constant propagation
    pub const_globals: BTreeMap<String, ConstValue>,
}

impl FunctionSnapshot {
    pub fn value(&self, id: ValueId) -> Option<&Value> {
        self.values.get(id.index())
    }

    /// Inferred type of a value; `Unknown` for a dangling reference
    pub fn value_type(&self, id: ValueId) -> IrType {
        self.value(id).map(|v| v.ty.clone()).unwrap_or(IrType::Unknown)
    }

    pub fn stmt(&self, id: StmtId) -> Option<&Statement> {
        self.statements.get(id.index())
    }

    /// One past the last statement id
    pub fn end_id(&self) -> StmtId {
        StmtId(self.statements.len() as u32)
    }

    /// All allocation sites in program order (by defining statement id)
    pub fn allocation_sites(&self) -> Vec<AllocationSite> {
        self.statements
            .iter()
            .filter_map(|stmt| match (&stmt.op, stmt.result) {
                (
                    Op::Alloc {
                        category,
                        size_bytes,
                    },
                    Some(value),
                ) => Some(AllocationSite {
                    value,
                    stmt: stmt.id,
                    category: *category,
                    size_bytes: *size_bytes,
                }),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concrete_types() {
        assert!(IrType::Int.is_concrete());
        assert!(IrType::Buffer.is_concrete());
        assert!(!IrType::Abstract("Number".to_string()).is_concrete());
        assert!(!IrType::Unknown.is_concrete());

        let abstract_array = IrType::Array {
            elem: Box::new(IrType::Abstract("Number".to_string())),
            len: Some(4),
        };
        assert!(!abstract_array.is_concrete());
    }

    #[test]
    fn test_type_names() {
        let arr = IrType::Array {
            elem: Box::new(IrType::Int),
            len: Some(10),
        };
        assert_eq!(arr.name(), "[Int; 10]");
        assert_eq!(IrType::Abstract("Number".to_string()).name(), "Number");
    }

    #[test]
    fn test_builtin_capture_positions() {
        assert!(BuiltinOp::Store.captures_operand(2));
        assert!(!BuiltinOp::Store.captures_operand(0));
        assert!(!BuiltinOp::Sum.captures_operand(0));
        assert!(!BuiltinOp::Len.captures_operand(0));
    }

    #[test]
    fn test_pure_scalar_allowlist() {
        assert!(BuiltinOp::Add.is_pure_scalar());
        assert!(BuiltinOp::Lt.is_pure_scalar());
        assert!(!BuiltinOp::Store.is_pure_scalar());
        assert!(!BuiltinOp::Sum.is_pure_scalar());
    }

    #[test]
    fn test_display_ids() {
        assert_eq!(ValueId(7).to_string(), "%7");
        assert_eq!(StmtId(3).to_string(), "s3");
    }

    #[test]
    fn test_allocation_sites_in_program_order() {
        let mut b = SnapshotBuilder::new("two_allocs");
        let first = b.alloc(
            AllocCategory::Array,
            IrType::Array {
                elem: Box::new(IrType::Int),
                len: Some(4),
            },
            Some(32),
        );
        let second = b.alloc(AllocCategory::Buffer, IrType::Buffer, None);
        b.ret(None);
        let snapshot = b.finish();

        let sites = snapshot.allocation_sites();
        assert_eq!(sites.len(), 2);
        assert_eq!(sites[0].value, first);
        assert_eq!(sites[1].value, second);
        assert!(sites[0].size_known());
        assert!(!sites[1].size_known());
    }
}
