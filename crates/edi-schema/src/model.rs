//! Schema model definitions
//!
//! Type nodes are immutable once built and shared as `Arc<EdiType>`, so two
//! schemas that were composed from one another hold the very same node for
//! every subtree that composition did not touch.

use crate::handle::SchemaHandle;
use crate::syntax::SyntaxRule;
use std::fmt;
use std::sync::Arc;

/// Structural kind of a type node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// Leaf value element
    Element,
    /// Composite element made of components
    Composite,
    /// Segment made of elements
    Segment,
    /// Loop (segment group) made of segments and nested loops
    Loop,
}

impl TypeKind {
    /// Whether this kind owns child references and syntax rules
    pub fn is_complex(self) -> bool {
        !matches!(self, TypeKind::Element)
    }

    /// Whether this kind is a structure (segment or loop)
    pub fn is_structure(self) -> bool {
        matches!(self, TypeKind::Segment | TypeKind::Loop)
    }
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TypeKind::Element => "element",
            TypeKind::Composite => "composite",
            TypeKind::Segment => "segment",
            TypeKind::Loop => "loop",
        };
        f.write_str(name)
    }
}

/// Value representation of a leaf element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ElementBase {
    #[default]
    String,
    Identifier,
    Numeric,
    Decimal,
    Date,
    Time,
    Binary,
}

/// A type node: either a leaf element or a complex type owning references
#[derive(Debug, Clone, PartialEq)]
pub enum EdiType {
    Element(ElementType),
    Complex(ComplexType),
}

impl EdiType {
    /// Identifier of this node, unique within a schema
    pub fn id(&self) -> &str {
        match self {
            EdiType::Element(element) => &element.id,
            EdiType::Complex(complex) => &complex.id,
        }
    }

    pub fn kind(&self) -> TypeKind {
        match self {
            EdiType::Element(_) => TypeKind::Element,
            EdiType::Complex(complex) => complex.kind,
        }
    }

    pub fn is_kind(&self, kind: TypeKind) -> bool {
        self.kind() == kind
    }

    pub fn as_element(&self) -> Option<&ElementType> {
        match self {
            EdiType::Element(element) => Some(element),
            EdiType::Complex(_) => None,
        }
    }

    pub fn as_complex(&self) -> Option<&ComplexType> {
        match self {
            EdiType::Element(_) => None,
            EdiType::Complex(complex) => Some(complex),
        }
    }

    /// Revision of the node; leaf elements are never rebuilt
    pub fn revision(&self) -> u32 {
        self.as_complex().map_or(0, |complex| complex.revision)
    }
}

impl From<ElementType> for EdiType {
    fn from(element: ElementType) -> Self {
        EdiType::Element(element)
    }
}

impl From<ComplexType> for EdiType {
    fn from(complex: ComplexType) -> Self {
        EdiType::Complex(complex)
    }
}

/// Leaf value element definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementType {
    pub id: String,
    pub base: ElementBase,
    pub min_length: usize,
    pub max_length: usize,
}

impl ElementType {
    pub fn new(id: impl Into<String>, base: ElementBase) -> Self {
        Self {
            id: id.into(),
            base,
            min_length: 0,
            max_length: usize::MAX,
        }
    }

    #[must_use]
    pub fn with_length(mut self, min_length: usize, max_length: usize) -> Self {
        self.min_length = min_length;
        self.max_length = max_length;
        self
    }
}

/// Composite, segment or loop definition.
///
/// Built through [`crate::builder::StructureBuilder`] (authoring) or the
/// copy-on-write helpers in [`crate::builder`] (composition), both of which
/// check that syntax rule positions fit the child sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct ComplexType {
    pub(crate) id: String,
    pub(crate) kind: TypeKind,
    pub(crate) references: Vec<Arc<Reference>>,
    pub(crate) syntax_rules: Vec<SyntaxRule>,
    pub(crate) revision: u32,
}

impl ComplexType {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    /// Child references in declaration order
    pub fn references(&self) -> &[Arc<Reference>] {
        &self.references
    }

    pub fn syntax_rules(&self) -> &[SyntaxRule] {
        &self.syntax_rules
    }

    /// Number of times this node has been rebuilt under the same id
    pub fn revision(&self) -> u32 {
        self.revision
    }

    /// Reference at a 1-based position
    pub fn reference_at(&self, position: usize) -> Option<&Arc<Reference>> {
        position
            .checked_sub(1)
            .and_then(|index| self.references.get(index))
    }

    /// Index of a reference, compared by identity
    pub fn index_of(&self, reference: &Arc<Reference>) -> Option<usize> {
        self.references
            .iter()
            .position(|candidate| Arc::ptr_eq(candidate, reference))
    }
}

/// An ordered edge from a complex type to a child type node
#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    target: Arc<EdiType>,
    min_occurs: u32,
    max_occurs: u32,
    schema: Option<SchemaHandle>,
}

impl Reference {
    pub fn new(target: Arc<EdiType>, min_occurs: u32, max_occurs: u32) -> Self {
        Self {
            target,
            min_occurs,
            max_occurs,
            schema: None,
        }
    }

    /// Fresh copy of an edge with the same target and occurrence bounds,
    /// resolved through `handle` from now on
    pub fn redirected(source: &Reference, handle: SchemaHandle) -> Self {
        Self {
            target: Arc::clone(&source.target),
            min_occurs: source.min_occurs,
            max_occurs: source.max_occurs,
            schema: Some(handle),
        }
    }

    /// Direct target captured when the edge was built
    pub fn target(&self) -> &Arc<EdiType> {
        &self.target
    }

    pub fn target_id(&self) -> &str {
        self.target.id()
    }

    pub fn min_occurs(&self) -> u32 {
        self.min_occurs
    }

    pub fn max_occurs(&self) -> u32 {
        self.max_occurs
    }

    /// Handle through which the target is resolved, if the edge was grafted
    pub fn schema(&self) -> Option<&SchemaHandle> {
        self.schema.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert!(!TypeKind::Element.is_complex());
        assert!(TypeKind::Composite.is_complex());
        assert!(!TypeKind::Composite.is_structure());
        assert!(TypeKind::Segment.is_structure());
        assert!(TypeKind::Loop.is_structure());
        assert_eq!(TypeKind::Loop.to_string(), "loop");
    }

    #[test]
    fn test_element_accessors() {
        let element: EdiType = ElementType::new("0062", ElementBase::Identifier)
            .with_length(1, 14)
            .into();

        assert_eq!(element.id(), "0062");
        assert!(element.is_kind(TypeKind::Element));
        assert!(element.as_complex().is_none());
        assert_eq!(element.revision(), 0);
        assert_eq!(element.as_element().unwrap().max_length, 14);
    }

    #[test]
    fn test_redirected_reference_keeps_bounds() {
        let target = Arc::new(EdiType::from(ElementType::new("1004", ElementBase::String)));
        let original = Reference::new(target, 0, 5);
        let handle = SchemaHandle::detached();

        let copy = Reference::redirected(&original, handle.clone());

        assert_eq!(copy.min_occurs(), 0);
        assert_eq!(copy.max_occurs(), 5);
        assert!(Arc::ptr_eq(copy.target(), original.target()));
        assert_eq!(copy.schema(), Some(&handle));
        assert!(original.schema().is_none());
    }
}
