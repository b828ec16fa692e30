use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::error::{GrmError, Result};
use crate::query::{
    EntityStream, Filterable, NodeQueryBuilder, RelationshipQueryBuilder, Target,
};
use crate::value::{Properties, Value};

use super::relation::{self, Related, RelationSchema};
use super::{check_field, EntityId, Model};

/// Id and property-equality filters selecting nodes or relationships.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Lookup {
    /// Matches a single element by id.
    pub id: Option<EntityId>,
    /// Each entry adds a `property = value` filter.
    pub properties: Properties,
}

impl Lookup {
    /// Matches everything.
    pub fn all() -> Self {
        Self::default()
    }

    /// Matches the element with `id`.
    pub fn by_id(id: EntityId) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    /// Matches elements whose properties equal `properties`.
    pub fn matching(properties: Properties) -> Self {
        Self {
            id: None,
            properties,
        }
    }

    /// Adds one property-equality filter.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    fn apply<F: Filterable>(&self, builder: &mut F) {
        if let Some(id) = self.id {
            builder.where_id(id);
        }
        for (key, value) in &self.properties {
            builder.r#where(key.clone(), value.clone());
        }
    }
}

impl From<EntityId> for Lookup {
    fn from(id: EntityId) -> Self {
        Lookup::by_id(id)
    }
}

impl From<Properties> for Lookup {
    fn from(properties: Properties) -> Self {
        Lookup::matching(properties)
    }
}

fn check_fields<M: Model>(properties: &Properties) -> Result<()> {
    properties.keys().try_for_each(|key| check_field::<M>(key))
}

/// Active-record surface of a node type.
///
/// Every operation runs on the type's [`CONNECTION`](Model::CONNECTION), or
/// on the configured default connection.
pub trait NodeModel: Model {
    /// Relations reachable from nodes of this type.
    fn relations() -> RelationSchema {
        RelationSchema::new()
    }

    /// Builder bound to this type.
    fn query() -> NodeQueryBuilder<Self> {
        NodeQueryBuilder::for_model()
    }

    /// Streams matching nodes.
    fn get(
        lookup: impl Into<Lookup>,
        fields: Option<&[&str]>,
        skip: Option<u64>,
        limit: Option<u64>,
    ) -> Result<EntityStream<Self>> {
        let mut query = Self::query();
        lookup.into().apply(&mut query);
        query.get(fields, skip, limit)
    }

    /// First matching node.
    fn first(
        lookup: impl Into<Lookup>,
        fields: Option<&[&str]>,
        skip: Option<u64>,
    ) -> Result<Option<Self>> {
        let mut query = Self::query();
        lookup.into().apply(&mut query);
        query.first(fields, skip)
    }

    /// Number of matching nodes.
    fn count(lookup: impl Into<Lookup>) -> Result<i64> {
        let mut query = Self::query();
        lookup.into().apply(&mut query);
        query.count()
    }

    /// Creates a node with `properties`.
    fn create(properties: Properties) -> Result<Self> {
        check_fields::<Self>(&properties)?;
        let mut query = Self::query();
        query.properties(properties);
        query.create()
    }

    /// Creates one node per property map in a single statement.
    fn insert(records: Vec<Properties>) -> Result<Vec<Self>> {
        for properties in &records {
            check_fields::<Self>(properties)?;
        }
        Self::query().create_many(records)
    }

    /// Deletes matching nodes and returns how many were deleted.
    fn delete(lookup: impl Into<Lookup>) -> Result<i64> {
        let mut query = Self::query();
        lookup.into().apply(&mut query);
        query.delete()
    }

    /// Deletes matching nodes with their relationships.
    fn detach_delete(lookup: impl Into<Lookup>) -> Result<i64> {
        let mut query = Self::query();
        lookup.into().apply(&mut query);
        query.detach_delete()
    }

    /// Returns the first node whose properties equal `properties`, creating
    /// one if none exists.
    ///
    /// Not atomic: concurrent callers may both miss and both create.
    fn first_or_create(properties: Properties) -> Result<Self> {
        if let Some(found) = Self::first(Lookup::matching(properties.clone()), None, None)? {
            return Ok(found);
        }
        debug!(label = %Self::label(), "no match, creating");
        Self::create(properties)
    }

    /// Loads the named relations that are not cached yet, in one statement.
    fn load(&mut self, accessors: &[&str]) -> Result<&mut Self> {
        load_into(self, accessors, false)?;
        Ok(self)
    }

    /// Loads the named relations even if they are cached.
    fn reload(&mut self, accessors: &[&str]) -> Result<&mut Self> {
        load_into(self, accessors, true)?;
        Ok(self)
    }

    /// Nodes related through `accessor`, loading them on first access.
    fn related(&mut self, accessor: &str) -> Result<&Related> {
        load_into(self, &[accessor], false)?;
        self.entity()
            .cached_relation(accessor)
            .ok_or_else(|| GrmError::MissingRelation {
                relation: accessor.to_owned(),
                label: Self::label(),
            })
    }

    /// The node related through a single-valued relation, typed as `R`.
    fn related_one<R: Model>(&mut self, accessor: &str) -> Result<Option<R>> {
        match self.related(accessor)? {
            Related::One(node) => Ok(node
                .clone()
                .map(|node| R::from_entity(node.into_entity()))),
            Related::Many(_) => Err(GrmError::invalid(format!(
                "relation '{accessor}' yields many nodes; use related_many"
            ))),
        }
    }

    /// The nodes related through a multi-valued relation, typed as `R`.
    fn related_many<R: Model>(&mut self, accessor: &str) -> Result<Vec<R>> {
        match self.related(accessor)? {
            Related::Many(nodes) => Ok(nodes
                .iter()
                .cloned()
                .map(|node| R::from_entity(node.into_entity()))
                .collect()),
            Related::One(_) => Err(GrmError::invalid(format!(
                "relation '{accessor}' yields at most one node; use related_one"
            ))),
        }
    }
}

fn load_into<M: NodeModel>(model: &mut M, accessors: &[&str], force: bool) -> Result<()> {
    let target = Target::from_connection(M::CONNECTION);
    relation::load(
        model.entity_mut(),
        &M::label(),
        &M::relations(),
        accessors,
        force,
        &target,
    )
}

type ConfigureEndpoint = Arc<dyn Fn(&mut NodeQueryBuilder) + Send + Sync>;

/// Selects one endpoint of a relationship.
#[derive(Clone)]
pub enum Endpoint {
    /// A persisted node, optionally narrowed by label.
    Node {
        /// Node id.
        id: EntityId,
        /// Label added to the endpoint pattern.
        label: Option<String>,
    },
    /// Arbitrary configuration of the endpoint builder.
    Configure(ConfigureEndpoint),
}

impl Endpoint {
    /// The node with `id`.
    pub fn id(id: EntityId) -> Self {
        Endpoint::Node { id, label: None }
    }

    /// A persisted model instance; fails if it has no id.
    pub fn node<M: Model>(model: &M) -> Result<Self> {
        let id = model.id().ok_or_else(|| {
            GrmError::invalid(format!(
                "a '{}' must be persisted before it can be an endpoint",
                M::label()
            ))
        })?;
        Ok(Endpoint::Node {
            id,
            label: Some(M::label()),
        })
    }

    /// Endpoint selected by a closure over its builder.
    pub fn configure<F>(configure: F) -> Self
    where
        F: Fn(&mut NodeQueryBuilder) + Send + Sync + 'static,
    {
        Endpoint::Configure(Arc::new(configure))
    }

    fn apply(&self, builder: &mut NodeQueryBuilder) {
        match self {
            Endpoint::Node { id, label } => {
                if let Some(label) = label {
                    builder.label(label.clone());
                }
                builder.where_id(*id);
            }
            Endpoint::Configure(configure) => configure(builder),
        }
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Node { id, label } => f
                .debug_struct("Node")
                .field("id", id)
                .field("label", label)
                .finish(),
            Endpoint::Configure(_) => f.write_str("Configure(..)"),
        }
    }
}

/// Filters selecting relationships.
#[derive(Clone, Debug)]
pub struct EdgeLookup {
    /// Matches a single relationship by id.
    pub id: Option<EntityId>,
    /// Left endpoint selector.
    pub left: Option<Endpoint>,
    /// Right endpoint selector.
    pub right: Option<Endpoint>,
    /// Each entry adds a `property = value` filter on the relationship.
    pub properties: Properties,
    /// Direction between the endpoints.
    pub left_to_right: bool,
}

impl Default for EdgeLookup {
    fn default() -> Self {
        Self {
            id: None,
            left: None,
            right: None,
            properties: Properties::new(),
            left_to_right: true,
        }
    }
}

impl EdgeLookup {
    /// Matches every relationship of the type, left to right.
    pub fn all() -> Self {
        Self::default()
    }

    /// Matches the relationship with `id`.
    pub fn by_id(id: EntityId) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    /// Sets the left endpoint selector.
    pub fn left(mut self, endpoint: Endpoint) -> Self {
        self.left = Some(endpoint);
        self
    }

    /// Sets the right endpoint selector.
    pub fn right(mut self, endpoint: Endpoint) -> Self {
        self.right = Some(endpoint);
        self
    }

    /// Adds one property-equality filter.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Sets the direction.
    pub fn left_to_right(mut self, left_to_right: bool) -> Self {
        self.left_to_right = left_to_right;
        self
    }

    fn apply<M: Model>(&self, builder: &mut RelationshipQueryBuilder<M>) {
        builder.left_to_right(self.left_to_right);
        if let Some(id) = self.id {
            builder.where_id(id);
        }
        if let Some(left) = &self.left {
            left.apply(builder.left_node());
        }
        if let Some(right) = &self.right {
            right.apply(builder.right_node());
        }
        for (key, value) in &self.properties {
            builder.r#where(key.clone(), value.clone());
        }
    }
}

/// Active-record surface of a relationship type.
pub trait RelationshipModel: Model {
    /// Builder bound to this type.
    fn query() -> RelationshipQueryBuilder<Self> {
        RelationshipQueryBuilder::for_model()
    }

    /// Streams matching relationships.
    fn get(
        lookup: EdgeLookup,
        fields: Option<&[&str]>,
        skip: Option<u64>,
        limit: Option<u64>,
    ) -> Result<EntityStream<Self>> {
        let mut query = Self::query();
        lookup.apply(&mut query);
        query.get(fields, skip, limit)
    }

    /// First matching relationship.
    fn first(
        lookup: EdgeLookup,
        fields: Option<&[&str]>,
        skip: Option<u64>,
    ) -> Result<Option<Self>> {
        let mut query = Self::query();
        lookup.apply(&mut query);
        query.first(fields, skip)
    }

    /// Number of matching relationships.
    fn count(lookup: EdgeLookup) -> Result<i64> {
        let mut query = Self::query();
        lookup.apply(&mut query);
        query.count()
    }

    /// Creates a relationship between the selected endpoints.
    fn create(
        left: Endpoint,
        right: Endpoint,
        properties: Properties,
        left_to_right: bool,
    ) -> Result<Self> {
        check_fields::<Self>(&properties)?;
        let mut query = Self::query();
        query.properties(properties).left_to_right(left_to_right);
        left.apply(query.left_node());
        right.apply(query.right_node());
        query.create()
    }

    /// Deletes matching relationships and returns how many were deleted.
    fn delete(lookup: EdgeLookup) -> Result<i64> {
        let mut query = Self::query();
        lookup.apply(&mut query);
        query.delete()
    }

    /// Returns the first relationship between the endpoints whose properties
    /// equal `properties`, creating one if none exists.
    ///
    /// Not atomic: concurrent callers may both miss and both create.
    fn first_or_create(
        left: Endpoint,
        right: Endpoint,
        properties: Properties,
        left_to_right: bool,
    ) -> Result<Self> {
        let lookup = EdgeLookup {
            id: None,
            left: Some(left.clone()),
            right: Some(right.clone()),
            properties: properties.clone(),
            left_to_right,
        };
        if let Some(found) = Self::first(lookup, None, None)? {
            return Ok(found);
        }
        debug!(rel_type = %Self::label(), "no match, creating");
        Self::create(left, right, properties, left_to_right)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::props;
    use crate::query::node::NODE_ALIAS;

    #[test]
    fn lookup_applies_id_then_properties() {
        let mut query = NodeQueryBuilder::new();
        Lookup::by_id(3).with("name", "Ada").apply(&mut query);
        assert_eq!(
            query.statement(None, None, None).unwrap().query_string(),
            "MATCH (node) WHERE (id(node) = $p0 AND node.name = $p1) RETURN node"
        );
        assert_eq!(query.alias_name(), NODE_ALIAS);
    }

    #[test]
    fn lookup_conversions() {
        assert_eq!(Lookup::from(5_i64), Lookup::by_id(5));
        assert_eq!(
            Lookup::from(props! { "a" => 1 }),
            Lookup::all().with("a", 1)
        );
    }

    #[test]
    fn edge_lookup_configures_endpoints() {
        let mut query = RelationshipQueryBuilder::new();
        EdgeLookup::by_id(8)
            .left(Endpoint::id(1))
            .right(Endpoint::configure(|node| {
                node.label("City").r#where("name", "Oslo");
            }))
            .left_to_right(false)
            .apply(&mut query);
        assert_eq!(
            query.statement(None, None, None).unwrap().query_string(),
            "MATCH (left)<-[rel]-(right:City) \
             WHERE (id(rel) = $p0 AND id(left) = $p1 AND right.name = $p2) RETURN rel"
        );
    }

    #[test]
    fn unpersisted_endpoint_is_rejected() {
        let node = crate::model::Node::default();
        let err = Endpoint::node(&node).unwrap_err();
        assert_eq!(err.code(), "InvalidArgument");
    }
}
