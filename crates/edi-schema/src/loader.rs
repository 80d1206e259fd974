//! Schema loader for JSON and YAML type-graph documents
//!
//! A document lists every type of a schema in any order:
//!
//! ```yaml
//! name: orders
//! main: MAIN
//! types:
//!   - { id: "1004", kind: element, base: an, min_length: 1, max_length: 35 }
//!   - id: BGM
//!     kind: segment
//!     references: [{ ref: "1004", max_occurs: 1 }]
//!   - id: MAIN
//!     kind: loop
//!     references: [{ ref: BGM, min_occurs: 1 }]
//! ```
//!
//! Types are built bottom-up so that every reference shares the node that is
//! registered under its target id.

use crate::builder::StructureBuilder;
use crate::model::{EdiType, ElementBase, ElementType, TypeKind};
use crate::registry::ConcurrentSchemaRegistry;
use crate::schema::{MAIN_LOOP_ID, Schema};
use crate::syntax::{SyntaxRule, SyntaxRuleKind};
use crate::{Error, Result};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, trace};

/// Serializable schema format for loading from files
#[derive(Debug, Deserialize)]
struct SchemaFile {
    name: String,
    #[serde(default)]
    main: Option<String>,
    #[serde(default)]
    types: Vec<TypeFile>,
}

#[derive(Debug, Deserialize)]
struct TypeFile {
    id: String,
    kind: KindFile,
    #[serde(default)]
    base: BaseFile,
    #[serde(default)]
    min_length: usize,
    #[serde(default)]
    max_length: Option<usize>,
    #[serde(default)]
    references: Vec<ReferenceFile>,
    #[serde(default)]
    syntax: Vec<SyntaxFile>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum KindFile {
    Element,
    Composite,
    Segment,
    Loop,
}

impl From<KindFile> for TypeKind {
    fn from(kind: KindFile) -> Self {
        match kind {
            KindFile::Element => TypeKind::Element,
            KindFile::Composite => TypeKind::Composite,
            KindFile::Segment => TypeKind::Segment,
            KindFile::Loop => TypeKind::Loop,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
enum BaseFile {
    #[default]
    #[serde(alias = "an", alias = "a")]
    String,
    #[serde(alias = "id")]
    Identifier,
    #[serde(alias = "n")]
    Numeric,
    #[serde(alias = "r")]
    Decimal,
    #[serde(alias = "dt")]
    Date,
    #[serde(alias = "tm")]
    Time,
    #[serde(alias = "b")]
    Binary,
}

impl From<BaseFile> for ElementBase {
    fn from(base: BaseFile) -> Self {
        match base {
            BaseFile::String => ElementBase::String,
            BaseFile::Identifier => ElementBase::Identifier,
            BaseFile::Numeric => ElementBase::Numeric,
            BaseFile::Decimal => ElementBase::Decimal,
            BaseFile::Date => ElementBase::Date,
            BaseFile::Time => ElementBase::Time,
            BaseFile::Binary => ElementBase::Binary,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ReferenceFile {
    #[serde(rename = "ref")]
    target: String,
    #[serde(default)]
    min_occurs: u32,
    #[serde(default = "default_max_occurs")]
    max_occurs: u32,
}

fn default_max_occurs() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
struct SyntaxFile {
    kind: String,
    positions: Vec<usize>,
}

/// Builds type nodes bottom-up, detecting circular references
struct TypeResolver<'a> {
    definitions: HashMap<&'a str, &'a TypeFile>,
    built: HashMap<String, Arc<EdiType>>,
    in_progress: HashSet<&'a str>,
}

impl<'a> TypeResolver<'a> {
    fn new(types: &'a [TypeFile]) -> Result<Self> {
        let mut definitions = HashMap::with_capacity(types.len());
        for definition in types {
            if definitions.insert(definition.id.as_str(), definition).is_some() {
                return Err(Error::InvalidFormat(format!(
                    "duplicate type id '{}'",
                    definition.id
                )));
            }
        }

        Ok(Self {
            definitions,
            built: HashMap::with_capacity(types.len()),
            in_progress: HashSet::new(),
        })
    }

    fn resolve(&mut self, id: &str, referrer: &str) -> Result<Arc<EdiType>> {
        if let Some(node) = self.built.get(id) {
            return Ok(Arc::clone(node));
        }

        let definition = self.definitions.get(id).copied().ok_or_else(|| {
            Error::UnresolvedReference {
                structure: referrer.to_string(),
                target: id.to_string(),
            }
        })?;

        if !self.in_progress.insert(definition.id.as_str()) {
            return Err(Error::InvalidFormat(format!(
                "circular type reference: {referrer} -> {id}"
            )));
        }

        let node = self.build(definition)?;
        self.in_progress.remove(definition.id.as_str());
        self.built.insert(definition.id.clone(), Arc::clone(&node));
        trace!(id = %definition.id, kind = %node.kind(), "built type");
        Ok(node)
    }

    fn build(&mut self, definition: &'a TypeFile) -> Result<Arc<EdiType>> {
        let kind = TypeKind::from(definition.kind);

        if kind == TypeKind::Element {
            if !definition.references.is_empty() || !definition.syntax.is_empty() {
                return Err(Error::InvalidFormat(format!(
                    "element '{}' cannot declare references or syntax rules",
                    definition.id
                )));
            }
            let element = ElementType::new(definition.id.clone(), definition.base.into())
                .with_length(
                    definition.min_length,
                    definition.max_length.unwrap_or(usize::MAX),
                );
            return Ok(Arc::new(element.into()));
        }

        let mut builder = StructureBuilder::new(definition.id.clone(), kind);
        for reference in &definition.references {
            let target = self.resolve(&reference.target, &definition.id)?;
            builder = builder.reference(target, reference.min_occurs, reference.max_occurs);
        }
        for rule in &definition.syntax {
            let rule_kind: SyntaxRuleKind = rule.kind.parse()?;
            builder = builder.rule(SyntaxRule::new(rule_kind, rule.positions.clone()));
        }
        builder.build_arc()
    }

    fn finish(mut self, types: &'a [TypeFile]) -> Result<HashMap<String, Arc<EdiType>>> {
        for definition in types {
            self.resolve(&definition.id, &definition.id)?;
        }
        Ok(self.built)
    }
}

/// Loads schemas from JSON/YAML documents, caching by name
pub struct SchemaLoader {
    registry: Arc<ConcurrentSchemaRegistry>,
    schema_paths: Vec<PathBuf>,
}

impl SchemaLoader {
    /// Create a new schema loader with the given search paths
    pub fn new(schema_paths: Vec<PathBuf>) -> Self {
        Self {
            registry: Arc::new(ConcurrentSchemaRegistry::new()),
            schema_paths,
        }
    }

    /// Create a new schema loader with a pre-configured registry
    pub fn with_registry(
        registry: Arc<ConcurrentSchemaRegistry>,
        schema_paths: Vec<PathBuf>,
    ) -> Self {
        Self {
            registry,
            schema_paths,
        }
    }

    /// Load a schema by name, checking the registry before the search paths
    pub fn load(&self, name: &str) -> Result<Arc<Schema>> {
        if let Some(cached) = self.registry.get(name) {
            debug!("Cache hit for schema: {}", name);
            return Ok(cached);
        }

        trace!("Cache miss for schema: {}", name);
        let schema = self.load_from_disk(name)?;
        self.registry.register(name, Arc::clone(&schema));
        Ok(schema)
    }

    /// Load a schema from a specific file path
    pub fn load_from_file(&self, path: &Path) -> Result<Arc<Schema>> {
        trace!("Loading schema from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;

        if path
            .extension()
            .is_some_and(|e| e == "yaml" || e == "yml")
        {
            self.load_from_yaml(&content)
        } else {
            self.load_from_json(&content)
        }
    }

    /// Load a schema from JSON string
    pub fn load_from_json(&self, json: &str) -> Result<Arc<Schema>> {
        let schema_file: SchemaFile = serde_json::from_str(json)
            .map_err(|e| Error::InvalidFormat(format!("JSON parse error: {}", e)))?;

        Self::convert_schema_file(&schema_file)
    }

    /// Load a schema from YAML string
    pub fn load_from_yaml(&self, yaml: &str) -> Result<Arc<Schema>> {
        let schema_file: SchemaFile = serde_yaml::from_str(yaml)
            .map_err(|e| Error::InvalidFormat(format!("YAML parse error: {}", e)))?;

        Self::convert_schema_file(&schema_file)
    }

    fn convert_schema_file(schema_file: &SchemaFile) -> Result<Arc<Schema>> {
        let types = TypeResolver::new(&schema_file.types)?.finish(&schema_file.types)?;
        let main_id = schema_file.main.as_deref().unwrap_or(MAIN_LOOP_ID);

        let schema = Schema::build(types, main_id)?;
        info!(
            name = %schema_file.name,
            types = schema.len(),
            "Loaded schema"
        );
        Ok(schema)
    }

    fn load_from_disk(&self, name: &str) -> Result<Arc<Schema>> {
        let stem = name.to_lowercase();
        let variations = [
            format!("{stem}.json"),
            format!("{stem}.yaml"),
            format!("{stem}.yml"),
        ];

        for path in &self.schema_paths {
            for variation in &variations {
                let file_path = path.join(variation);
                if file_path.exists() {
                    trace!("Found schema file: {:?}", file_path);
                    return self.load_from_file(&file_path);
                }
            }
        }

        Err(Error::NotFound(format!(
            "Schema {} not found in search paths: {:?}",
            name, self.schema_paths
        )))
    }

    /// Add a search path for schema files
    pub fn add_path(&mut self, path: PathBuf) {
        self.schema_paths.push(path);
    }

    /// Get the registry (for composition and testing)
    pub fn registry(&self) -> &ConcurrentSchemaRegistry {
        &self.registry
    }
}

impl Default for SchemaLoader {
    fn default() -> Self {
        Self::new(vec![PathBuf::from(".")])
    }
}
