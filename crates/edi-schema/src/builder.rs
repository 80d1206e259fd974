//! Construction of complex type nodes.
//!
//! [`StructureBuilder`] is used by schema authoring code. The free functions
//! are the copy-on-write primitives used by composition: each one takes an
//! existing node and returns a new node with the same id, the next revision
//! and an edited reference sequence. The input node is never modified.

use crate::model::{ComplexType, EdiType, Reference, TypeKind};
use crate::syntax::SyntaxRule;
use crate::{Error, Result};
use std::sync::Arc;

/// Fluent builder for composites, segments and loops
#[derive(Debug)]
pub struct StructureBuilder {
    id: String,
    kind: TypeKind,
    references: Vec<Arc<Reference>>,
    syntax_rules: Vec<SyntaxRule>,
}

impl StructureBuilder {
    pub fn new(id: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            id: id.into(),
            kind,
            references: Vec::new(),
            syntax_rules: Vec::new(),
        }
    }

    /// Append a child reference
    #[must_use]
    pub fn reference(mut self, target: Arc<EdiType>, min_occurs: u32, max_occurs: u32) -> Self {
        self.references
            .push(Arc::new(Reference::new(target, min_occurs, max_occurs)));
        self
    }

    /// Append an already built reference
    #[must_use]
    pub fn push_reference(mut self, reference: Arc<Reference>) -> Self {
        self.references.push(reference);
        self
    }

    #[must_use]
    pub fn rule(mut self, rule: SyntaxRule) -> Self {
        self.syntax_rules.push(rule);
        self
    }

    /// Build the node, checking its kind and every rule position
    pub fn build(self) -> Result<ComplexType> {
        if !self.kind.is_complex() {
            return Err(Error::InvalidFormat(format!(
                "type '{}' of kind {} cannot own references",
                self.id, self.kind
            )));
        }

        let node = ComplexType {
            id: self.id,
            kind: self.kind,
            references: self.references,
            syntax_rules: self.syntax_rules,
            revision: 0,
        };
        check_rules(&node)?;
        Ok(node)
    }

    pub fn build_arc(self) -> Result<Arc<EdiType>> {
        self.build().map(|node| Arc::new(EdiType::Complex(node)))
    }
}

/// Fail with `MalformedRule` if any rule addresses a missing child
pub(crate) fn check_rules(node: &ComplexType) -> Result<()> {
    for rule in &node.syntax_rules {
        if let Some(position) = rule.invalid_position(node.references.len()) {
            return Err(Error::MalformedRule {
                structure: node.id.clone(),
                kind: rule.kind().to_string(),
                position,
                children: node.references.len(),
            });
        }
    }
    Ok(())
}

/// Rebuild `node` with a new reference sequence and rule set
pub fn rebuild(
    node: &ComplexType,
    references: Vec<Arc<Reference>>,
    syntax_rules: Vec<SyntaxRule>,
) -> Result<Arc<EdiType>> {
    let rebuilt = ComplexType {
        id: node.id.clone(),
        kind: node.kind,
        references,
        syntax_rules,
        revision: node.revision + 1,
    };
    check_rules(&rebuilt)?;
    Ok(Arc::new(EdiType::Complex(rebuilt)))
}

/// Rebuild `node` with the edge at `index` pointing at `target`.
///
/// The new edge keeps the occurrence bounds of the edge it replaces.
pub fn replace_target(
    node: &ComplexType,
    index: usize,
    target: Arc<EdiType>,
) -> Result<Arc<EdiType>> {
    let original = node.references.get(index).ok_or_else(|| {
        Error::InvalidFormat(format!(
            "reference index {index} out of range for '{}'",
            node.id
        ))
    })?;

    let mut references = node.references.clone();
    references[index] = Arc::new(Reference::new(
        target,
        original.min_occurs(),
        original.max_occurs(),
    ));

    rebuild(node, references, node.syntax_rules.clone())
}

/// Rebuild `node` with `inserted` placed immediately before the edge at
/// `index`.
///
/// The edge at `index` and everything after it keep their relative order.
/// Rule positions at or after `index` are moved so that every rule still
/// designates the same children.
pub fn insert_before(
    node: &ComplexType,
    index: usize,
    inserted: Vec<Arc<Reference>>,
) -> Result<Arc<EdiType>> {
    if index > node.references.len() {
        return Err(Error::InvalidFormat(format!(
            "reference index {index} out of range for '{}'",
            node.id
        )));
    }

    let count = inserted.len();
    let mut references = Vec::with_capacity(node.references.len() + count);
    references.extend(node.references[..index].iter().cloned());
    references.extend(inserted);
    references.extend(node.references[index..].iter().cloned());

    let syntax_rules = node
        .syntax_rules
        .iter()
        .map(|rule| rule.shifted(index + 1, count))
        .collect();

    rebuild(node, references, syntax_rules)
}
