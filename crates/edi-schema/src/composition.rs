//! Schema composition: grafting one schema's main loop into another
//!
//! Composition never touches the receiving schema. The merged schema starts
//! as a shallow copy of the receiving schema's map; only the chain of loops
//! between the graft point and the main loop is rebuilt, each under its
//! original id, and every other node is shared with the receiving schema.

use crate::builder;
use crate::handle::SchemaHandle;
use crate::model::{ComplexType, EdiType, Reference, TypeKind};
use crate::schema::Schema;
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, trace};

impl Schema {
    /// Graft `referenced`'s main loop into this schema.
    ///
    /// The children of `referenced`'s main loop are inserted into `parent`
    /// immediately before `anchor`, which stays in place after them. Types of
    /// `referenced` are then added under their own ids unless this schema
    /// already defines the id. On success `referenced`'s handle is redirected
    /// to the merged schema.
    ///
    /// Syntax rule positions of the rebuilt `parent` at or after the anchor
    /// are shifted by the number of grafted references.
    ///
    /// # Errors
    ///
    /// - [`Error::ParentNotLoop`] if `parent` is not a loop
    /// - [`Error::ParentNotInSchema`] if `parent` is not this schema's node for its id
    /// - [`Error::AnchorNotChild`] if `anchor` is not one of `parent`'s references
    /// - [`Error::ReferencedRootNotLoop`] if `referenced` has no loop root
    /// - [`Error::ParentUnreachable`] if `parent` cannot be reached from the main loop
    pub fn reference(
        &self,
        referenced: &Schema,
        parent: &Arc<EdiType>,
        anchor: &Arc<Reference>,
    ) -> Result<Arc<Schema>> {
        let parent_loop = parent
            .as_complex()
            .filter(|node| node.kind() == TypeKind::Loop)
            .ok_or_else(|| Error::ParentNotLoop(parent.id().to_string()))?;

        let known_parent = self
            .get_type(parent.id())
            .filter(|known| same_node(known, parent))
            .ok_or_else(|| Error::ParentNotInSchema(parent.id().to_string()))?;

        let anchor_index = parent_loop
            .index_of(anchor)
            .ok_or_else(|| Error::AnchorNotChild(parent.id().to_string()))?;

        let referenced_root = referenced
            .main_loop_node()
            .as_complex()
            .filter(|node| node.kind() == TypeKind::Loop)
            .ok_or_else(|| {
                Error::ReferencedRootNotLoop(referenced.main_loop_node().id().to_string())
            })?;

        debug!(
            parent_id = parent.id(),
            anchor = anchor.target_id(),
            index = anchor_index,
            grafted = referenced_root.references().len(),
            "composing schemas"
        );

        let handle = SchemaHandle::detached();
        let mut graft = Graft {
            receiving: self,
            types: self.types.clone(),
            referenced_root,
            parent: known_parent,
            anchor_index,
            handle: &handle,
            path: Vec::new(),
        };

        let main_loop = graft
            .attach(&self.main_loop)?
            .ok_or_else(|| Error::ParentUnreachable(parent.id().to_string()))?;

        let mut types = graft.types;
        for node in referenced.types() {
            types
                .entry(node.id().to_string())
                .or_insert_with(|| Arc::clone(node));
        }

        let merged = Schema::publish(types, main_loop, handle)?;
        referenced.handle().redirect(&merged);

        info!(
            main = merged.main_loop().id(),
            types = merged.len(),
            "schema composition complete"
        );
        Ok(merged)
    }
}

/// Same node by identity, or by id, revision and content
fn same_node(known: &Arc<EdiType>, candidate: &Arc<EdiType>) -> bool {
    Arc::ptr_eq(known, candidate)
        || (known.id() == candidate.id()
            && known.revision() == candidate.revision()
            && known == candidate)
}

struct Graft<'a> {
    receiving: &'a Schema,
    types: HashMap<String, Arc<EdiType>>,
    referenced_root: &'a ComplexType,
    parent: &'a Arc<EdiType>,
    anchor_index: usize,
    handle: &'a SchemaHandle,
    /// Ids of the loops between the main loop and the current node
    path: Vec<String>,
}

impl Graft<'_> {
    /// Depth-first search for the parent below `root`, following loop
    /// children in declaration order. Returns the rebuilt `root` when the
    /// parent was found in its subtree.
    fn attach(&mut self, root: &Arc<EdiType>) -> Result<Option<Arc<EdiType>>> {
        let Some(node) = root.as_complex() else {
            return Ok(None);
        };

        if same_node(root, self.parent) {
            return self.add_references(node).map(Some);
        }

        self.path.push(node.id().to_string());
        let rebuilt = self.attach_children(node);
        self.path.pop();
        rebuilt
    }

    fn attach_children(&mut self, node: &ComplexType) -> Result<Option<Arc<EdiType>>> {
        for (index, reference) in node.references().iter().enumerate() {
            let target = self.edge_target(reference);
            if !target.is_kind(TypeKind::Loop) {
                continue;
            }

            // a grafted edge may resolve to a loop that is already being searched
            if self.path.iter().any(|id| id == target.id()) {
                trace!(
                    loop_id = node.id(),
                    target = target.id(),
                    "skipping edge back into search path"
                );
                continue;
            }

            if let Some(rebuilt_child) = self.attach(&target)? {
                trace!(loop_id = node.id(), index, "rebuilding ancestor loop");
                let rebuilt = builder::replace_target(node, index, rebuilt_child)?;
                self.types.insert(node.id().to_string(), Arc::clone(&rebuilt));
                return Ok(Some(rebuilt));
            }
        }

        Ok(None)
    }

    /// Target of an edge as the receiving schema sees it. Grafted edges are
    /// looked up by id so that earlier compositions are observed.
    fn edge_target(&self, reference: &Reference) -> Arc<EdiType> {
        if reference.schema().is_some() {
            if let Some(node) = self.receiving.get_type(reference.target_id()) {
                return Arc::clone(node);
            }
        }
        Arc::clone(reference.target())
    }

    fn add_references(&mut self, node: &ComplexType) -> Result<Arc<EdiType>> {
        let inserted = self
            .referenced_root
            .references()
            .iter()
            .map(|reference| Arc::new(Reference::redirected(reference, self.handle.clone())))
            .collect();

        let rebuilt = builder::insert_before(node, self.anchor_index, inserted)?;
        self.types.insert(node.id().to_string(), Arc::clone(&rebuilt));
        Ok(rebuilt)
    }
}
