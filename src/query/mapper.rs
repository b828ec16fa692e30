//! Record to entity conversion.
//!
//! A record either carries the whole element under the builder alias, or a
//! projection: one column per requested field plus synthetic identity and
//! label columns.

use tracing::trace;

use crate::client::{CypherValue, Record};
use crate::cypher::escape_identifier;
use crate::error::{GrmError, Result};
use crate::model::Entity;
use crate::value::{Properties, Value};

/// Column carrying `id(alias)` in projected records.
pub const ID_COLUMN: &str = "__id";
/// Column carrying `labels(alias)` for projected nodes.
pub const LABELS_COLUMN: &str = "__labels";
/// Column carrying `type(alias)` for projected relationships.
pub const LABEL_COLUMN: &str = "__label";

/// Graph element a mapper expects.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ElementKind {
    /// Vertex.
    Node,
    /// Edge.
    Relationship,
}

/// Layout of the records a statement returns.
#[derive(Clone, Debug, PartialEq)]
pub enum RecordShape {
    /// The element itself under the alias column.
    Whole,
    /// Only the listed fields, read from `alias.field` columns.
    Projected(Vec<String>),
}

impl RecordShape {
    /// Projected shape when fields are requested.
    pub fn from_fields(fields: Option<&[&str]>) -> Self {
        match fields {
            Some(fields) => RecordShape::Projected(fields.iter().map(|f| (*f).to_owned()).collect()),
            None => RecordShape::Whole,
        }
    }

    /// RETURN items producing this shape for an element bound to `alias`.
    pub fn return_items(&self, alias: &str, kind: ElementKind) -> Vec<String> {
        match self {
            RecordShape::Whole => vec![alias.to_owned()],
            RecordShape::Projected(fields) => {
                let mut items: Vec<String> = fields
                    .iter()
                    .map(|field| {
                        format!(
                            "{alias}.{} AS {}",
                            escape_identifier(field),
                            escape_identifier(&projected_column(alias, field))
                        )
                    })
                    .collect();
                items.push(format!("id({alias}) AS {ID_COLUMN}"));
                items.push(match kind {
                    ElementKind::Node => format!("labels({alias}) AS {LABELS_COLUMN}"),
                    ElementKind::Relationship => format!("type({alias}) AS {LABEL_COLUMN}"),
                });
                items
            }
        }
    }
}

/// Column name holding a projected field.
pub fn projected_column(alias: &str, field: &str) -> String {
    format!("{alias}.{field}")
}

/// Converts records of one statement into entities.
#[derive(Clone, Debug)]
pub struct RecordMapper {
    alias: String,
    kind: ElementKind,
    shape: RecordShape,
}

impl RecordMapper {
    /// Mapper for elements bound to `alias`.
    pub fn new(alias: impl Into<String>, kind: ElementKind, shape: RecordShape) -> Self {
        Self {
            alias: alias.into(),
            kind,
            shape,
        }
    }

    /// Builds one entity from `record`.
    pub fn map(&self, record: &Record) -> Result<Entity> {
        let entity = match &self.shape {
            RecordShape::Whole => self.map_whole(record.get(&self.alias)?)?,
            RecordShape::Projected(fields) => self.map_projected(record, fields)?,
        };
        trace!(alias = %self.alias, id = ?entity.id(), "mapped record");
        Ok(entity)
    }

    /// Builds one entity from a value holding a whole element.
    pub fn map_whole(&self, value: &CypherValue) -> Result<Entity> {
        match (self.kind, value) {
            (ElementKind::Node, CypherValue::Node(node)) => Ok(Entity::from_parts(
                Some(node.id),
                node.labels.iter().cloned(),
                materialize_map(&node.properties.0)?,
            )),
            (ElementKind::Relationship, CypherValue::Relationship(rel)) => {
                let mut entity = Entity::from_parts(
                    Some(rel.id),
                    [rel.rel_type.clone()],
                    materialize_map(&rel.properties.0)?,
                );
                entity.set_endpoints(rel.start_id, rel.end_id);
                Ok(entity)
            }
            (ElementKind::Node, other) => {
                Err(GrmError::unexpected(&self.alias, "node", other.kind()))
            }
            (ElementKind::Relationship, other) => {
                Err(GrmError::unexpected(&self.alias, "relationship", other.kind()))
            }
        }
    }

    fn map_projected(&self, record: &Record, fields: &[String]) -> Result<Entity> {
        let id = match record.get(ID_COLUMN)? {
            CypherValue::Int(id) => *id,
            other => return Err(GrmError::unexpected(ID_COLUMN, "integer", other.kind())),
        };
        let labels = match self.kind {
            ElementKind::Node => match record.get(LABELS_COLUMN)? {
                CypherValue::List(list) => list
                    .0
                    .iter()
                    .map(|label| match label {
                        CypherValue::String(label) => Ok(label.clone()),
                        other => Err(GrmError::unexpected(LABELS_COLUMN, "string", other.kind())),
                    })
                    .collect::<Result<Vec<_>>>()?,
                other => return Err(GrmError::unexpected(LABELS_COLUMN, "list", other.kind())),
            },
            ElementKind::Relationship => match record.get(LABEL_COLUMN)? {
                CypherValue::String(label) => vec![label.clone()],
                other => return Err(GrmError::unexpected(LABEL_COLUMN, "string", other.kind())),
            },
        };
        let mut properties = Properties::new();
        for field in fields {
            let column = projected_column(&self.alias, field);
            let value = materialize(&column, record.get(&column)?)?;
            properties.insert(field.clone(), value);
        }
        Ok(Entity::from_parts(Some(id), labels, properties))
    }
}

/// Deep-converts a driver value into a plain [`Value`].
///
/// Graph elements cannot be stored as properties and are rejected.
pub fn materialize(field: &str, value: &CypherValue) -> Result<Value> {
    Ok(match value {
        CypherValue::Null => Value::Null,
        CypherValue::Bool(v) => Value::Bool(*v),
        CypherValue::Int(v) => Value::Int(*v),
        CypherValue::Float(v) => Value::Float(*v),
        CypherValue::String(v) => Value::String(v.clone()),
        CypherValue::List(items) => Value::List(
            items
                .0
                .iter()
                .map(|item| materialize(field, item))
                .collect::<Result<_>>()?,
        ),
        CypherValue::Map(map) => Value::Map(materialize_map(&map.0)?),
        CypherValue::Node(_) | CypherValue::Relationship(_) => {
            return Err(GrmError::unexpected(field, "property value", value.kind()))
        }
    })
}

fn materialize_map<'a, I>(entries: I) -> Result<Properties>
where
    I: IntoIterator<Item = (&'a String, &'a CypherValue)>,
{
    entries
        .into_iter()
        .map(|(key, value)| Ok((key.clone(), materialize(key, value)?)))
        .collect()
}
