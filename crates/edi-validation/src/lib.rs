#![deny(warnings)]
#![deny(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

//! # edi-validation
//!
//! Syntax rule validation for closed EDI structure instances.
//!
//! A decoder tracks how often each child of a segment, composite or loop was
//! matched in a [`StructureUsage`] snapshot. When the instance closes, the
//! snapshot is checked against the structure's occurrence bounds and syntax
//! rules, and every violation is handed to a [`ValidationEventHandler`].
//!
//! ## Example Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use edi_schema::{
//!     EdiType, ElementBase, ElementType, StructureBuilder, SyntaxRule, SyntaxRuleKind, TypeKind,
//! };
//! use edi_validation::{StructureUsage, SyntaxValidationEngine, ValidationReport};
//!
//! let element = |id: &str| -> Arc<EdiType> {
//!     Arc::new(ElementType::new(id, ElementBase::String).into())
//! };
//! let segment = StructureBuilder::new("DTM", TypeKind::Segment)
//!     .reference(element("2005"), 0, 1)
//!     .reference(element("2380"), 0, 1)
//!     .rule(SyntaxRule::new(SyntaxRuleKind::Exclusion, vec![1, 2]))
//!     .build()
//!     .unwrap();
//!
//! let mut usage = StructureUsage::for_structure(&segment);
//! usage.record(1);
//! usage.record(2);
//!
//! let mut report = ValidationReport::new();
//! let count = SyntaxValidationEngine::new()
//!     .validate_structure(&segment, &usage, &mut report)
//!     .unwrap();
//! assert_eq!(count, 1);
//! ```

pub mod engine;
pub mod reporter;
pub mod rules;
pub mod usage;

// Re-export main types
pub use engine::{SyntaxValidationEngine, ValidationConfig};
pub use reporter::{
    FnHandler, SyntaxErrorCode, ValidationEvent, ValidationEventHandler, ValidationReport,
    Violation, from_fn,
};
pub use rules::{
    check_rule, validate_conditional, validate_exclusion, validate_list, validate_paired,
    validate_required, validate_single,
};
pub use usage::{Location, StructureUsage, UsageNode};

use edi_schema::DecodingContext;
use thiserror::Error;

/// Errors that prevent validation from running
#[derive(Error, Debug)]
pub enum Error {
    #[error("Malformed {kind} rule on '{structure}': position {position} outside 1..={children} or repeated")]
    MalformedRule {
        structure: String,
        kind: String,
        position: usize,
        children: usize,
    },

    #[error("Usage of '{structure}' tracks {found} children, structure declares {expected}")]
    SnapshotMismatch {
        structure: String,
        expected: usize,
        found: usize,
    },

    #[error("Schema error: {0}")]
    Schema(#[from] edi_schema::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Validate a usage snapshot against the structure the session's schema
/// declares under the snapshot's code, with default settings
///
/// # Errors
///
/// Returns [`Error::Schema`] when the session knows no such structure, and
/// otherwise whatever [`SyntaxValidationEngine::validate_structure`] returns.
pub fn validate_with_schema(
    context: &DecodingContext,
    usage: &StructureUsage,
    handler: &mut dyn ValidationEventHandler,
) -> Result<usize> {
    let structure = context
        .get_type(usage.code())
        .and_then(|node| node.as_complex())
        .ok_or_else(|| edi_schema::Error::NotFound(usage.code().to_string()))?;

    SyntaxValidationEngine::new().validate_structure(structure, usage, handler)
}
