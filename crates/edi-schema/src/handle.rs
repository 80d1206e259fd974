//! Schema indirection handles and per-session decoding contexts
//!
//! A [`SchemaHandle`] is a redirectable pointer to "the current schema".
//! Every schema owns one; composition stamps the merged schema's handle on
//! the references it grafts and redirects the referenced schema's handle to
//! the merged result.
//!
//! Lookups made while decoding go through a [`DecodingContext`]. A context
//! belongs to exactly one decoding session: it pins the schema snapshot that
//! was current when the session began and carries its own overlay of
//! control types, so concurrent sessions never see each other's state.

use crate::model::{ComplexType, EdiType, Reference, TypeKind};
use crate::schema::Schema;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};
use tracing::trace;

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

struct HandleState {
    id: u64,
    // Weak: a schema owns its own handle
    current: RwLock<Weak<Schema>>,
}

/// Redirectable pointer to the current schema
#[derive(Clone)]
pub struct SchemaHandle {
    state: Arc<HandleState>,
}

impl SchemaHandle {
    /// Handle that does not point at any schema yet
    pub fn detached() -> Self {
        Self {
            state: Arc::new(HandleState {
                id: NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed),
                current: RwLock::new(Weak::new()),
            }),
        }
    }

    /// Process-unique identity of this handle
    pub fn id(&self) -> u64 {
        self.state.id
    }

    /// Schema this handle currently points at, if it is still alive
    pub fn current(&self) -> Option<Arc<Schema>> {
        self.state
            .current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .upgrade()
    }

    /// Point this handle at `schema`
    pub fn redirect(&self, schema: &Arc<Schema>) {
        trace!(handle = self.id(), main = schema.main_loop().id(), "redirecting schema handle");
        *self
            .state
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::downgrade(schema);
    }

    /// Start a decoding session against the schema currently behind this handle
    pub fn session(&self) -> Option<DecodingContext> {
        self.current().map(DecodingContext::pinned)
    }
}

impl PartialEq for SchemaHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for SchemaHandle {}

impl fmt::Debug for SchemaHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaHandle").field("id", &self.id()).finish()
    }
}

/// Schema view owned by a single decoding session
#[derive(Debug, Clone)]
pub struct DecodingContext {
    schema: Arc<Schema>,
    control_types: HashMap<String, Arc<EdiType>>,
}

impl DecodingContext {
    pub(crate) fn pinned(schema: Arc<Schema>) -> Self {
        Self {
            schema,
            control_types: HashMap::new(),
        }
    }

    /// Schema snapshot this session decodes against
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Replace this session's control-type overlay
    pub fn set_control_types(&mut self, control_types: HashMap<String, Arc<EdiType>>) {
        trace!(count = control_types.len(), "setting session control types");
        self.control_types = control_types;
    }

    pub fn clear_control_types(&mut self) {
        self.control_types.clear();
    }

    pub fn control_types(&self) -> &HashMap<String, Arc<EdiType>> {
        &self.control_types
    }

    /// Look a type up in the pinned schema, then in the control overlay
    pub fn get_type(&self, id: &str) -> Option<&Arc<EdiType>> {
        self.schema
            .get_type(id)
            .or_else(|| self.control_types.get(id))
    }

    pub fn contains_segment(&self, id: &str) -> bool {
        self.schema.contains_segment(id)
    }

    pub fn types(&self) -> impl Iterator<Item = &Arc<EdiType>> {
        self.schema.types()
    }

    pub fn main_loop(&self) -> &ComplexType {
        self.schema.main_loop()
    }

    /// Target of `reference` as seen by this session.
    ///
    /// Grafted references resolve by id through the pinned snapshot and the
    /// overlay, so they follow every composition the snapshot contains no
    /// matter which schemas are still alive. An id the session does not know
    /// is looked up through the reference's handle, and the direct target is
    /// used when that fails too. Plain references always use their direct
    /// target.
    pub fn resolve(&self, reference: &Reference) -> Arc<EdiType> {
        let Some(handle) = reference.schema() else {
            return Arc::clone(reference.target());
        };
        let id = reference.target_id();

        self.get_type(id)
            .cloned()
            .or_else(|| {
                handle
                    .current()
                    .and_then(|schema| schema.get_type(id).cloned())
            })
            .unwrap_or_else(|| Arc::clone(reference.target()))
    }

    /// Whether `id` names a loop in this session's view
    pub fn is_loop(&self, id: &str) -> bool {
        self.get_type(id)
            .is_some_and(|node| node.is_kind(TypeKind::Loop))
    }
}
