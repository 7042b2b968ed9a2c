//! Schema registry: the allowlist of queryable entities.
//!
//! The registry is the single source of truth for which entities, columns,
//! joins and operators a Plan may use, and which columns are sensitive. It is
//! declared in YAML (see `schema/registry.yaml`), checked for internal
//! consistency when loaded, and immutable afterwards.
//!
//! Every lookup fails closed: unknown names yield `false`, `None` or an error,
//! never a permissive default.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::Path;

use crate::is_identifier;
use crate::plan::{ColumnRef, Operator};

const BUILTIN_REGISTRY: &str = include_str!("../../../schema/registry.yaml");

/// Errors raised while loading or querying the registry.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("unknown entity '{0}'")]
    UnknownEntity(String),

    #[error("entity '{0}' is declared more than once")]
    DuplicateEntity(String),

    #[error("column '{column}' is declared more than once on entity '{entity}'")]
    DuplicateColumn { entity: String, column: String },

    #[error("sensitive column '{column}' is not a column of entity '{entity}'")]
    SensitiveColumnNotDeclared { entity: String, column: String },

    #[error("invalid join edge '{edge}': {reason}")]
    InvalidJoin { edge: String, reason: String },

    #[error("join '{0}' is declared more than once")]
    DuplicateJoin(String),

    #[error("'{0}' is not a valid identifier")]
    InvalidIdentifier(String),

    #[error("unknown operator '{0}'")]
    UnknownOperator(String),

    #[error("default limit {default} must lie within [1, {max}]")]
    InvalidLimits { default: u32, max: u32 },
}

// =============================================================================
// YAML definition
// =============================================================================

/// On-disk registry declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryDefinition {
    /// Registry version (semver format).
    #[serde(default = "default_version")]
    pub version: String,

    #[serde(default = "default_limit")]
    pub default_limit: u32,

    #[serde(default = "default_max_limit")]
    pub max_limit: u32,

    /// Operator keywords filters may use.
    #[serde(default = "default_operators")]
    pub operators: Vec<String>,

    pub entities: Vec<EntityDefinition>,

    #[serde(default)]
    pub joins: Vec<JoinDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityDefinition {
    pub name: String,

    /// Backing-store namespace (Postgres schema).
    pub schema: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub columns: Vec<ColumnSpec>,

    #[serde(default)]
    pub sensitive: Vec<String>,
}

/// A column is either a bare name (text) or a name with a declared type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnSpec {
    Name(String),
    Typed {
        name: String,
        #[serde(rename = "type", default)]
        column_type: ColumnType,
    },
}

impl ColumnSpec {
    fn into_column(self) -> Column {
        match self {
            ColumnSpec::Name(name) => Column {
                name,
                column_type: ColumnType::Text,
            },
            ColumnSpec::Typed { name, column_type } => Column { name, column_type },
        }
    }
}

/// Allowed key equality `from = to`, both in `entity.column` form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinDefinition {
    pub from: String,
    pub to: String,
}

fn default_version() -> String {
    "1.0.0".to_string()
}

fn default_limit() -> u32 {
    50
}

fn default_max_limit() -> u32 {
    200
}

fn default_operators() -> Vec<String> {
    Operator::ALL.iter().map(|op| op.as_sql().to_string()).collect()
}

// =============================================================================
// Loaded registry
// =============================================================================

/// Declared column type. Drives value checks and positional parameter casts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    #[default]
    Text,
    Integer,
    Numeric,
    Date,
    Timestamp,
    Boolean,
}

impl ColumnType {
    /// Explicit Postgres cast for a bound parameter, if one is needed.
    pub fn pg_cast(&self) -> Option<&'static str> {
        match self {
            ColumnType::Numeric => Some("numeric"),
            ColumnType::Date => Some("date"),
            ColumnType::Timestamp => Some("timestamp"),
            ColumnType::Text | ColumnType::Integer | ColumnType::Boolean => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
}

#[derive(Debug, Clone)]
pub struct Entity {
    pub name: String,
    pub schema: String,
    pub description: Option<String>,
    pub columns: Vec<Column>,
    pub sensitive: BTreeSet<String>,
}

impl Entity {
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }
}

/// An allowed join between two entities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinEdge {
    pub from: ColumnRef,
    pub to: ColumnRef,
}

impl JoinEdge {
    /// Shorthand the planner uses to request this join, e.g. `policies->customers`.
    pub fn shorthand(&self) -> String {
        format!("{}->{}", self.from.entity, self.to.entity)
    }

    /// Key equality as query text.
    pub fn on_clause(&self) -> String {
        format!("{} = {}", self.from, self.to)
    }

    /// The endpoint opposite `entity`, if `entity` is an endpoint.
    pub fn other_side(&self, entity: &str) -> Option<&str> {
        if self.from.entity == entity {
            Some(&self.to.entity)
        } else if self.to.entity == entity {
            Some(&self.from.entity)
        } else {
            None
        }
    }
}

/// Immutable allowlist of entities, columns, joins and operators.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    version: String,
    entities: Vec<Entity>,
    index: HashMap<String, usize>,
    joins: Vec<JoinEdge>,
    operators: BTreeSet<Operator>,
    default_limit: u32,
    max_limit: u32,
}

impl SchemaRegistry {
    /// The registry bundled with this crate.
    pub fn builtin() -> Result<Self, RegistryError> {
        Self::from_yaml(BUILTIN_REGISTRY)
    }

    /// Load a registry from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse and check a registry from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self, RegistryError> {
        let def: RegistryDefinition = serde_yaml::from_str(content)?;
        Self::from_definition(def)
    }

    /// Build a registry, enforcing its invariants.
    pub fn from_definition(def: RegistryDefinition) -> Result<Self, RegistryError> {
        if def.max_limit == 0 || def.default_limit == 0 || def.default_limit > def.max_limit {
            return Err(RegistryError::InvalidLimits {
                default: def.default_limit,
                max: def.max_limit,
            });
        }

        let mut entities = Vec::with_capacity(def.entities.len());
        let mut index = HashMap::new();

        for ent in def.entities {
            check_identifier(&ent.name)?;
            check_identifier(&ent.schema)?;
            if index.contains_key(&ent.name) {
                return Err(RegistryError::DuplicateEntity(ent.name));
            }

            let mut columns: Vec<Column> = Vec::with_capacity(ent.columns.len());
            for spec in ent.columns {
                let col = spec.into_column();
                check_identifier(&col.name)?;
                if columns.iter().any(|c| c.name == col.name) {
                    return Err(RegistryError::DuplicateColumn {
                        entity: ent.name,
                        column: col.name,
                    });
                }
                columns.push(col);
            }

            let mut sensitive = BTreeSet::new();
            for s in ent.sensitive {
                if !columns.iter().any(|c| c.name == s) {
                    return Err(RegistryError::SensitiveColumnNotDeclared {
                        entity: ent.name,
                        column: s,
                    });
                }
                sensitive.insert(s);
            }

            index.insert(ent.name.clone(), entities.len());
            entities.push(Entity {
                name: ent.name,
                schema: ent.schema,
                description: ent.description,
                columns,
                sensitive,
            });
        }

        let mut operators = BTreeSet::new();
        for op in &def.operators {
            let parsed =
                Operator::parse(op).ok_or_else(|| RegistryError::UnknownOperator(op.clone()))?;
            operators.insert(parsed);
        }

        let mut registry = Self {
            version: def.version,
            entities,
            index,
            joins: Vec::new(),
            operators,
            default_limit: def.default_limit,
            max_limit: def.max_limit,
        };

        for j in def.joins {
            let edge = registry.resolve_join(&j)?;
            let shorthand = edge.shorthand();
            if registry.joins.iter().any(|e| e.shorthand() == shorthand) {
                return Err(RegistryError::DuplicateJoin(shorthand));
            }
            registry.joins.push(edge);
        }

        tracing::debug!(
            version = %registry.version,
            entities = registry.entities.len(),
            joins = registry.joins.len(),
            "Schema registry loaded"
        );

        Ok(registry)
    }

    fn resolve_join(&self, def: &JoinDefinition) -> Result<JoinEdge, RegistryError> {
        let edge_name = format!("{} = {}", def.from, def.to);
        let endpoint = |reference: &str| -> Result<ColumnRef, RegistryError> {
            let (entity, column) =
                ColumnRef::split_qualified(reference).ok_or_else(|| RegistryError::InvalidJoin {
                    edge: edge_name.clone(),
                    reason: format!("'{}' is not in entity.column form", reference),
                })?;
            let ent = self.entity(entity).ok_or_else(|| RegistryError::InvalidJoin {
                edge: edge_name.clone(),
                reason: format!("unknown entity '{}'", entity),
            })?;
            if !ent.has_column(column) {
                return Err(RegistryError::InvalidJoin {
                    edge: edge_name.clone(),
                    reason: format!("unknown column '{}'", reference),
                });
            }
            Ok(ColumnRef::new(entity, column))
        };

        let from = endpoint(&def.from)?;
        let to = endpoint(&def.to)?;
        if from.entity == to.entity {
            return Err(RegistryError::InvalidJoin {
                edge: edge_name,
                reason: "self joins are not supported".to_string(),
            });
        }
        Ok(JoinEdge { from, to })
    }

    // -------------------------------------------------------------------------
    // Lookups
    // -------------------------------------------------------------------------

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn entity(&self, name: &str) -> Option<&Entity> {
        self.index.get(name).map(|&i| &self.entities[i])
    }

    fn require(&self, entity: &str) -> Result<&Entity, RegistryError> {
        self.entity(entity)
            .ok_or_else(|| RegistryError::UnknownEntity(entity.to_string()))
    }

    /// Ordered column names of an entity.
    pub fn columns_of(&self, entity: &str) -> Result<Vec<&str>, RegistryError> {
        Ok(self
            .require(entity)?
            .columns
            .iter()
            .map(|c| c.name.as_str())
            .collect())
    }

    /// Sensitive column names of an entity.
    pub fn sensitive_columns_of(&self, entity: &str) -> Result<&BTreeSet<String>, RegistryError> {
        Ok(&self.require(entity)?.sensitive)
    }

    /// Whether `entity.column` is sensitive. Unknown references are not.
    pub fn is_sensitive(&self, column: &ColumnRef) -> bool {
        self.entity(&column.entity)
            .map(|e| e.sensitive.contains(&column.column))
            .unwrap_or(false)
    }

    /// Union of sensitive column names across every entity.
    pub fn all_sensitive_columns(&self) -> BTreeSet<&str> {
        self.entities
            .iter()
            .flat_map(|e| e.sensitive.iter().map(|s| s.as_str()))
            .collect()
    }

    /// Whether a reference names an allowlisted column.
    ///
    /// `entity.column` must exist exactly; a bare name must exist on at least
    /// one entity.
    pub fn is_allowed_column(&self, reference: &str) -> bool {
        match ColumnRef::split_qualified(reference) {
            Some((entity, column)) => self
                .entity(entity)
                .map(|e| e.has_column(column))
                .unwrap_or(false),
            None => self.entities.iter().any(|e| e.has_column(reference)),
        }
    }

    pub fn column_type(&self, column: &ColumnRef) -> Option<ColumnType> {
        self.entity(&column.entity)
            .and_then(|e| e.column(&column.column))
            .map(|c| c.column_type)
    }

    /// Whether a join shorthand (`a->b`) is declared.
    pub fn is_allowed_join(&self, shorthand: &str) -> bool {
        self.join(shorthand).is_some()
    }

    pub fn join(&self, shorthand: &str) -> Option<&JoinEdge> {
        let shorthand = shorthand.trim();
        self.joins.iter().find(|e| e.shorthand() == shorthand)
    }

    pub fn joins(&self) -> &[JoinEdge] {
        &self.joins
    }

    pub fn is_allowed_operator(&self, op: Operator) -> bool {
        self.operators.contains(&op)
    }

    pub fn operators(&self) -> impl Iterator<Item = Operator> + '_ {
        self.operators.iter().copied()
    }

    /// Backing-store reference with an alias equal to the entity name,
    /// e.g. `core."customers" customers`.
    pub fn qualified_table_ref(&self, entity: &str) -> Result<String, RegistryError> {
        let ent = self.require(entity)?;
        Ok(format!("{}.\"{}\" {}", ent.schema, ent.name, ent.name))
    }

    pub fn default_limit(&self) -> u32 {
        self.default_limit
    }

    pub fn max_limit(&self) -> u32 {
        self.max_limit
    }

    /// `(default, max)` row limits.
    pub fn limits(&self) -> (u32, u32) {
        (self.default_limit, self.max_limit)
    }
}

fn check_identifier(name: &str) -> Result<(), RegistryError> {
    if is_identifier(name) {
        Ok(())
    } else {
        Err(RegistryError::InvalidIdentifier(name.to_string()))
    }
}
