use std::collections::BTreeMap;

use crate::error::{GrmError, Result};

/// Driver-side list; materialized into [`crate::Value::List`] by the mapper.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CypherList(pub Vec<CypherValue>);

/// Driver-side map; materialized into [`crate::Value::Map`] by the mapper.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CypherMap(pub BTreeMap<String, CypherValue>);

/// Node as returned by the driver.
#[derive(Clone, Debug, PartialEq)]
pub struct GraphNode {
    /// Database identifier.
    pub id: i64,
    /// Labels in the order the driver reported them.
    pub labels: Vec<String>,
    /// Stored properties.
    pub properties: CypherMap,
}

/// Relationship as returned by the driver.
#[derive(Clone, Debug, PartialEq)]
pub struct GraphRelationship {
    /// Database identifier.
    pub id: i64,
    /// Relationship type.
    pub rel_type: String,
    /// Identifier of the start node.
    pub start_id: i64,
    /// Identifier of the end node.
    pub end_id: i64,
    /// Stored properties.
    pub properties: CypherMap,
}

/// Value held in a record column.
#[derive(Clone, Debug, PartialEq)]
pub enum CypherValue {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Floating-point value.
    Float(f64),
    /// String value.
    String(String),
    /// Driver list.
    List(CypherList),
    /// Driver map.
    Map(CypherMap),
    /// Whole node.
    Node(GraphNode),
    /// Whole relationship.
    Relationship(GraphRelationship),
}

impl CypherValue {
    /// Short name of the value's shape, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            CypherValue::Null => "null",
            CypherValue::Bool(_) => "boolean",
            CypherValue::Int(_) => "integer",
            CypherValue::Float(_) => "float",
            CypherValue::String(_) => "string",
            CypherValue::List(_) => "list",
            CypherValue::Map(_) => "map",
            CypherValue::Node(_) => "node",
            CypherValue::Relationship(_) => "relationship",
        }
    }

    /// Builds a driver list from anything convertible into values.
    pub fn list<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<CypherValue>,
    {
        CypherValue::List(CypherList(items.into_iter().map(Into::into).collect()))
    }
}

impl From<&str> for CypherValue {
    fn from(value: &str) -> Self {
        CypherValue::String(value.to_owned())
    }
}

impl From<String> for CypherValue {
    fn from(value: String) -> Self {
        CypherValue::String(value)
    }
}

impl From<i64> for CypherValue {
    fn from(value: i64) -> Self {
        CypherValue::Int(value)
    }
}

impl From<f64> for CypherValue {
    fn from(value: f64) -> Self {
        CypherValue::Float(value)
    }
}

impl From<bool> for CypherValue {
    fn from(value: bool) -> Self {
        CypherValue::Bool(value)
    }
}

impl From<GraphNode> for CypherValue {
    fn from(node: GraphNode) -> Self {
        CypherValue::Node(node)
    }
}

impl From<GraphRelationship> for CypherValue {
    fn from(rel: GraphRelationship) -> Self {
        CypherValue::Relationship(rel)
    }
}

impl FromIterator<(String, CypherValue)> for CypherMap {
    fn from_iter<I: IntoIterator<Item = (String, CypherValue)>>(iter: I) -> Self {
        CypherMap(iter.into_iter().collect())
    }
}

/// Single output row: ordered `(column, value)` pairs.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, CypherValue)>,
}

impl Record {
    /// Builds a record from column/value pairs, keeping their order.
    pub fn new<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, CypherValue)>,
        K: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Returns the value of column `key`.
    pub fn get(&self, key: &str) -> Result<&CypherValue> {
        self.fields
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value)
            .ok_or_else(|| GrmError::MissingField(key.to_owned()))
    }

    /// Returns the value of the first column.
    pub fn first(&self) -> Option<&CypherValue> {
        self.fields.first().map(|(_, value)| value)
    }

    /// Column names in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }
}

/// Every record a statement produced.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SummarizedResult {
    records: Vec<Record>,
}

impl SummarizedResult {
    /// Wraps the records of one statement.
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    /// Returns the first record, or [`GrmError::EmptyResult`].
    pub fn first(&self) -> Result<&Record> {
        self.records.first().ok_or(GrmError::EmptyResult)
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true when the statement produced no rows.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Borrows the records.
    pub fn records(&self) -> &[Record] {
        &self.records
    }
}

impl IntoIterator for SummarizedResult {
    type Item = Record;
    type IntoIter = std::vec::IntoIter<Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl FromIterator<Record> for SummarizedResult {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
