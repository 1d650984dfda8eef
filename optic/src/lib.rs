//! Optic - static analysis engine for typed SSA IR
//!
//! Given one function body already lowered to typed single-assignment
//! form, Optic runs five independent, read-only analysis passes - escape,
//! monomorphization, devirtualization, lifetime, and constant propagation -
//! and produces one structured report per pass. It recommends; it never
//! rewrites.
//!
//! ```
//! use optic::ir::{AllocCategory, BuiltinOp, IrType, SnapshotBuilder};
//! use optic::{AnalysisConfig, StaticResolver, analyze_function};
//!
//! let mut b = SnapshotBuilder::new("sum_local");
//! let arr = b.alloc(
//!     AllocCategory::Array,
//!     IrType::Array { elem: Box::new(IrType::Int), len: Some(10) },
//!     Some(80),
//! );
//! let total = b.builtin(BuiltinOp::Sum, &[arr], IrType::Int);
//! b.ret(Some(total));
//!
//! let analysis = analyze_function(
//!     &b.finish(),
//!     &StaticResolver::new(),
//!     &AnalysisConfig::default(),
//! );
//! let escape = analysis.escape().unwrap();
//! assert!(!escape.records[0].escapes);
//! assert!(escape.records[0].stack_promotable);
//! ```

pub mod analysis;
pub mod config;
pub mod error;
pub mod ir;
pub mod report;
pub mod resolve;

pub use analysis::{
    AnalysisPass, AnalysisPipeline, FunctionAnalysis, PassOutcome, PassReport, analyze_function,
    analyze_with_provider,
};
pub use config::AnalysisConfig;
pub use error::{AnalysisError, InternalAnalysisError, Result, UnsupportedConstruct};
pub use ir::{FunctionSnapshot, SnapshotBuilder};
pub use resolve::{IrProvider, MethodCandidate, StaticResolver, TargetResolver};
