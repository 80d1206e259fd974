//! # edi-schema
//!
//! Type graph model and schema composition for EDI decoders.
//!
//! A [`Schema`] is an immutable map from identifier to type node with a
//! designated main loop. Schemas are combined with [`Schema::reference`],
//! which grafts one schema's main loop into a loop of another and returns a
//! new schema that shares every untouched node with its inputs.
//!
//! Decoding sessions read a schema through a [`DecodingContext`], which pins
//! the schema snapshot and carries session-local control types.

pub mod builder;
pub mod composition;
pub mod handle;
pub mod loader;
pub mod model;
pub mod registry;
pub mod schema;
pub mod syntax;

pub use builder::StructureBuilder;
pub use handle::{DecodingContext, SchemaHandle};
pub use loader::SchemaLoader;
pub use model::{ComplexType, EdiType, ElementBase, ElementType, Reference, TypeKind};
pub use registry::ConcurrentSchemaRegistry;
pub use schema::{MAIN_LOOP_ID, Schema};
pub use syntax::{SyntaxRule, SyntaxRuleKind};

use thiserror::Error;

/// Errors that can occur when building, loading or composing schemas
#[derive(Error, Debug)]
pub enum Error {
    #[error("Schema has no loop root: {0}")]
    MissingRoot(String),

    #[error("Parent must be a loop: {0}")]
    ParentNotLoop(String),

    #[error("Parent is not in this schema: {0}")]
    ParentNotInSchema(String),

    #[error("Anchor is not referenced by parent: {0}")]
    AnchorNotChild(String),

    #[error("Referenced schema root must be a loop: {0}")]
    ReferencedRootNotLoop(String),

    #[error("Parent is not reachable from the main loop: {0}")]
    ParentUnreachable(String),

    #[error("Malformed {kind} rule on '{structure}': position {position} outside 1..={children} or repeated")]
    MalformedRule {
        structure: String,
        kind: String,
        position: usize,
        children: usize,
    },

    #[error("Type '{structure}' references unknown type '{target}'")]
    UnresolvedReference { structure: String, target: String },

    #[error("Unknown syntax rule kind: {0}")]
    UnknownRuleKind(String),

    #[error("Schema not found: {0}")]
    NotFound(String),

    #[error("Invalid schema format: {0}")]
    InvalidFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
