//! Immutable schema: an id to type map with a designated main loop

use crate::handle::{DecodingContext, SchemaHandle};
use crate::model::{ComplexType, EdiType, TypeKind};
use crate::{Error, Result};
use std::collections::HashMap;
use std::collections::hash_map::Values;
use std::sync::Arc;
use tracing::debug;

/// Default identifier of a schema's main loop
pub const MAIN_LOOP_ID: &str = "edi.schema.MAIN";

/// A complete type graph with a designated loop root
#[derive(Debug)]
pub struct Schema {
    pub(crate) types: HashMap<String, Arc<EdiType>>,
    pub(crate) main_loop: Arc<EdiType>,
    main: ComplexType,
    pub(crate) handle: SchemaHandle,
}

impl Schema {
    /// Build a schema from an id to type map.
    ///
    /// The graph is checked before it is published: every key must equal the
    /// id of its node, `main_id` must name a loop, every reference target
    /// must be registered, and every syntax rule must address existing
    /// children.
    pub fn build(types: HashMap<String, Arc<EdiType>>, main_id: &str) -> Result<Arc<Self>> {
        let main_loop = types
            .get(main_id)
            .filter(|node| node.is_kind(TypeKind::Loop))
            .cloned()
            .ok_or_else(|| Error::MissingRoot(main_id.to_string()))?;

        for (key, node) in &types {
            if key != node.id() {
                return Err(Error::InvalidFormat(format!(
                    "type registered as '{key}' has id '{}'",
                    node.id()
                )));
            }

            if let Some(complex) = node.as_complex() {
                crate::builder::check_rules(complex)?;

                for reference in complex.references() {
                    if !types.contains_key(reference.target_id()) {
                        return Err(Error::UnresolvedReference {
                            structure: complex.id().to_string(),
                            target: reference.target_id().to_string(),
                        });
                    }
                }
            }
        }

        debug!(main = main_id, types = types.len(), "built schema");
        Self::publish(types, main_loop, SchemaHandle::detached())
    }

    /// Build a schema from a list of nodes, keyed by their own ids
    pub fn from_nodes(
        nodes: impl IntoIterator<Item = Arc<EdiType>>,
        main_id: &str,
    ) -> Result<Arc<Self>> {
        let types = nodes
            .into_iter()
            .map(|node| (node.id().to_string(), node))
            .collect();
        Self::build(types, main_id)
    }

    /// Wrap already checked parts and point `handle` at the result
    pub(crate) fn publish(
        types: HashMap<String, Arc<EdiType>>,
        main_loop: Arc<EdiType>,
        handle: SchemaHandle,
    ) -> Result<Arc<Self>> {
        let main = main_loop
            .as_complex()
            .filter(|node| node.kind() == TypeKind::Loop)
            .cloned()
            .ok_or_else(|| Error::MissingRoot(main_loop.id().to_string()))?;

        let schema = Arc::new(Self {
            types,
            main_loop,
            main,
            handle,
        });
        schema.handle.redirect(&schema);
        Ok(schema)
    }

    /// Main (root) loop of the schema
    pub fn main_loop(&self) -> &ComplexType {
        &self.main
    }

    /// Main loop as a shareable node
    pub fn main_loop_node(&self) -> &Arc<EdiType> {
        &self.main_loop
    }

    pub fn get_type(&self, id: &str) -> Option<&Arc<EdiType>> {
        self.types.get(id)
    }

    pub fn contains_segment(&self, id: &str) -> bool {
        self.types
            .get(id)
            .is_some_and(|node| node.is_kind(TypeKind::Segment))
    }

    /// All type nodes, in no particular order
    pub fn types(&self) -> Values<'_, String, Arc<EdiType>> {
        self.types.values()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Indirection handle of this schema
    pub fn handle(&self) -> &SchemaHandle {
        &self.handle
    }

    /// Start a decoding session pinned to this schema
    pub fn session(self: &Arc<Self>) -> DecodingContext {
        DecodingContext::pinned(Arc::clone(self))
    }
}

impl<'a> IntoIterator for &'a Schema {
    type Item = &'a Arc<EdiType>;
    type IntoIter = Values<'a, String, Arc<EdiType>>;

    fn into_iter(self) -> Self::IntoIter {
        self.types()
    }
}
