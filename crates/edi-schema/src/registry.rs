//! Concurrent registry of named schemas
//!
//! Besides caching loaded schemas, the registry is the place where a named
//! schema is composed in place: [`ConcurrentSchemaRegistry::compose`] reads
//! the current snapshot, composes and swaps in the result while holding the
//! entry lock, so composition calls against one name are serialized.

use crate::schema::Schema;
use crate::{Error, Result};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use tracing::debug;

/// Thread-safe map from schema name to the current schema snapshot
#[derive(Debug, Default)]
pub struct ConcurrentSchemaRegistry {
    schemas: DashMap<String, Arc<Schema>>,
}

impl ConcurrentSchemaRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a schema, replacing any previous snapshot under `name`
    pub fn register(&self, name: impl Into<String>, schema: Arc<Schema>) {
        self.schemas.insert(name.into(), schema);
    }

    /// Get the current snapshot registered under `name`
    pub fn get(&self, name: &str) -> Option<Arc<Schema>> {
        self.schemas.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Check if a schema exists
    pub fn contains(&self, name: &str) -> bool {
        self.schemas.contains_key(name)
    }

    pub fn remove(&self, name: &str) -> Option<Arc<Schema>> {
        self.schemas.remove(name).map(|(_, schema)| schema)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Graft `referenced` into the schema registered under `name` and
    /// register the result in its place.
    ///
    /// `parent_id` names the receiving loop and `anchor_index` is the 0-based
    /// index of the anchor among its references; both are resolved against
    /// the snapshot current at the time the entry lock is taken.
    pub fn compose(
        &self,
        name: &str,
        referenced: &Schema,
        parent_id: &str,
        anchor_index: usize,
    ) -> Result<Arc<Schema>> {
        match self.schemas.entry(name.to_string()) {
            Entry::Occupied(mut entry) => {
                let merged = {
                    let current = entry.get();
                    let parent = current
                        .get_type(parent_id)
                        .cloned()
                        .ok_or_else(|| Error::ParentNotInSchema(parent_id.to_string()))?;
                    let anchor = parent
                        .as_complex()
                        .and_then(|node| node.references().get(anchor_index))
                        .cloned()
                        .ok_or_else(|| Error::AnchorNotChild(parent_id.to_string()))?;
                    current.reference(referenced, &parent, &anchor)?
                };

                debug!(schema = name, parent_id, anchor_index, "replacing composed schema");
                entry.insert(Arc::clone(&merged));
                Ok(merged)
            }
            Entry::Vacant(_) => Err(Error::NotFound(name.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::StructureBuilder;
    use crate::model::{EdiType, ElementBase, ElementType, TypeKind};
    use crate::schema::MAIN_LOOP_ID;

    fn schema(segments: &[&str]) -> Arc<Schema> {
        let e: Arc<EdiType> = Arc::new(ElementType::new("E", ElementBase::String).into());
        let mut nodes = vec![Arc::clone(&e)];
        let mut main = StructureBuilder::new(MAIN_LOOP_ID, TypeKind::Loop);
        for id in segments {
            let segment = StructureBuilder::new(*id, TypeKind::Segment)
                .reference(Arc::clone(&e), 0, 1)
                .build_arc()
                .unwrap();
            main = main.reference(Arc::clone(&segment), 0, 1);
            nodes.push(segment);
        }
        nodes.push(main.build_arc().unwrap());
        Schema::from_nodes(nodes, MAIN_LOOP_ID).unwrap()
    }

    #[test]
    fn test_register_and_get() {
        let registry = ConcurrentSchemaRegistry::new();
        assert!(registry.is_empty());

        let envelope = schema(&["UNB", "UNZ"]);
        registry.register("envelope", Arc::clone(&envelope));

        assert!(registry.contains("envelope"));
        assert_eq!(registry.len(), 1);
        assert!(Arc::ptr_eq(&registry.get("envelope").unwrap(), &envelope));
        assert!(registry.get("missing").is_none());

        assert!(registry.remove("envelope").is_some());
        assert!(!registry.contains("envelope"));
    }

    #[test]
    fn test_compose_replaces_snapshot() {
        let registry = ConcurrentSchemaRegistry::new();
        let envelope = schema(&["UNB", "UNZ"]);
        registry.register("envelope", Arc::clone(&envelope));

        let merged = registry
            .compose("envelope", &schema(&["BGM"]), MAIN_LOOP_ID, 1)
            .unwrap();

        let current = registry.get("envelope").unwrap();
        assert!(Arc::ptr_eq(&current, &merged));
        let ids: Vec<&str> = merged
            .main_loop()
            .references()
            .iter()
            .map(|r| r.target_id())
            .collect();
        assert_eq!(ids, vec!["UNB", "BGM", "UNZ"]);

        // the original snapshot is untouched
        assert_eq!(envelope.main_loop().references().len(), 2);
    }

    #[test]
    fn test_compose_errors() {
        let registry = ConcurrentSchemaRegistry::new();
        registry.register("envelope", schema(&["UNB", "UNZ"]));

        assert!(matches!(
            registry.compose("missing", &schema(&["BGM"]), MAIN_LOOP_ID, 0),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            registry.compose("envelope", &schema(&["BGM"]), "NOPE", 0),
            Err(Error::ParentNotInSchema(_))
        ));
        assert!(matches!(
            registry.compose("envelope", &schema(&["BGM"]), MAIN_LOOP_ID, 7),
            Err(Error::AnchorNotChild(_))
        ));
        assert!(matches!(
            registry.compose("envelope", &schema(&["BGM"]), "UNB", 0),
            Err(Error::ParentNotLoop(_))
        ));
    }

    #[test]
    fn test_concurrent_compose_is_serialized() {
        let registry = Arc::new(ConcurrentSchemaRegistry::new());
        registry.register("envelope", schema(&["UNB", "UNZ"]));

        let workers: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    registry
                        .compose("envelope", &schema(&["BGM"]), MAIN_LOOP_ID, 1)
                        .unwrap();
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        let current = registry.get("envelope").unwrap();
        // every graft observed the previous one
        assert_eq!(current.main_loop().references().len(), 2 + 8);
        assert_eq!(current.main_loop().revision(), 8);
    }
}
