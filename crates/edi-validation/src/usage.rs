//! Usage tracking for one structure instance
//!
//! A decoding session creates a [`StructureUsage`] when a segment, composite
//! or loop instance begins, records a use each time one of its children is
//! matched, validates the snapshot when the instance closes and then resets
//! or discards it. Usage state never lives in the schema.

use edi_schema::{ComplexType, TypeKind};

/// Match count of one child reference within the current instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageNode {
    code: String,
    position: usize,
    usage_count: u32,
}

impl UsageNode {
    /// Unused node for the child `code` at 1-based `position`
    pub fn new(code: impl Into<String>, position: usize) -> Self {
        Self {
            code: code.into(),
            position,
            usage_count: 0,
        }
    }

    /// Node already matched `count` times
    #[must_use]
    pub fn with_count(mut self, count: u32) -> Self {
        self.usage_count = count;
        self
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn usage_count(&self) -> u32 {
        self.usage_count
    }

    pub fn is_used(&self) -> bool {
        self.usage_count > 0
    }

    pub fn increment(&mut self) {
        self.usage_count = self.usage_count.saturating_add(1);
    }

    pub fn reset(&mut self) {
        self.usage_count = 0;
    }
}

/// Where a violation sits inside the enclosing segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Location {
    /// 1-based element position within the segment
    pub element: Option<usize>,
    /// 1-based component position within a composite
    pub component: Option<usize>,
    /// 0-based repetition index of a repeating element
    pub repetition: Option<usize>,
}

/// Usage snapshot of one structure instance's children
#[derive(Debug, Clone)]
pub struct StructureUsage {
    code: String,
    kind: TypeKind,
    declared_children: usize,
    element_position: Option<usize>,
    repetition: Option<usize>,
    children: Vec<UsageNode>,
}

impl StructureUsage {
    /// Snapshot with no usage nodes yet for a structure declaring
    /// `declared_children` references
    pub fn new(code: impl Into<String>, kind: TypeKind, declared_children: usize) -> Self {
        Self {
            code: code.into(),
            kind,
            declared_children,
            element_position: None,
            repetition: None,
            children: Vec::with_capacity(declared_children),
        }
    }

    /// Snapshot with one unused node per reference of `structure`
    pub fn for_structure(structure: &ComplexType) -> Self {
        let mut usage = Self::new(
            structure.id(),
            structure.kind(),
            structure.references().len(),
        );
        usage.children = structure
            .references()
            .iter()
            .enumerate()
            .map(|(index, reference)| UsageNode::new(reference.target_id(), index + 1))
            .collect();
        usage
    }

    /// Place a composite instance at `element_position` of its segment
    #[must_use]
    pub fn within_element(mut self, element_position: usize, repetition: Option<usize>) -> Self {
        self.element_position = Some(element_position);
        self.repetition = repetition;
        self
    }

    /// Append a usage node for the next child
    #[must_use]
    pub fn with_child(mut self, node: UsageNode) -> Self {
        self.children.push(node);
        self
    }

    pub fn push_child(&mut self, node: UsageNode) {
        self.children.push(node);
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    pub fn declared_children(&self) -> usize {
        self.declared_children
    }

    pub fn children(&self) -> &[UsageNode] {
        &self.children
    }

    /// Usage node at a 1-based position, if one was recorded
    pub fn child(&self, position: usize) -> Option<&UsageNode> {
        position
            .checked_sub(1)
            .and_then(|index| self.children.get(index))
    }

    /// Whether the child at a 1-based position was matched. Children past
    /// the recorded nodes were never begun and count as unused.
    pub fn is_used(&self, position: usize) -> bool {
        self.child(position).is_some_and(UsageNode::is_used)
    }

    pub fn usage_count(&self, position: usize) -> u32 {
        self.child(position).map_or(0, UsageNode::usage_count)
    }

    /// Record a match of the child at a 1-based position. Returns `false`
    /// when no usage node exists there.
    pub fn record(&mut self, position: usize) -> bool {
        match position
            .checked_sub(1)
            .and_then(|index| self.children.get_mut(index))
        {
            Some(node) => {
                node.increment();
                true
            }
            None => false,
        }
    }

    /// Clear all counts before the next occurrence of the structure
    pub fn reset(&mut self) {
        self.children.iter_mut().for_each(UsageNode::reset);
    }

    /// Location of the child at a 1-based position
    pub fn location_of(&self, position: usize) -> Location {
        match self.kind {
            TypeKind::Composite => Location {
                element: self.element_position,
                component: Some(position),
                repetition: self.repetition,
            },
            TypeKind::Segment => Location {
                element: Some(position),
                component: None,
                repetition: None,
            },
            TypeKind::Loop | TypeKind::Element => Location::default(),
        }
    }

    /// Location of the structure itself
    pub fn location(&self) -> Location {
        match self.kind {
            TypeKind::Composite => Location {
                element: self.element_position,
                component: None,
                repetition: self.repetition,
            },
            _ => Location::default(),
        }
    }
}
