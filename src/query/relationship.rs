use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use tracing::debug;

use crate::client::GraphClient;
use crate::cypher::{
    Clause, CypherQuery, NodePattern, PatternDirection, Predicate, RelationshipPattern, SetItem,
    Statement,
};
use crate::error::{GrmError, Result};
use crate::model::entity::{reject_id_key, Labels};
use crate::model::{Model, Relationship};
use crate::value::{Properties, Value};

use super::mapper::{ElementKind, RecordMapper, RecordShape};
use super::node::NodeQueryBuilder;
use super::predicate::{Conditions, Filterable};
use super::stream::EntityStream;
use super::{Target, COUNT_COLUMN};

/// Alias bound to the matched relationship.
pub const REL_ALIAS: &str = "rel";
/// Alias bound to the left endpoint.
pub const LEFT_ALIAS: &str = "left";
/// Alias bound to the right endpoint.
pub const RIGHT_ALIAS: &str = "right";

/// Builds and runs statements over relationships between two node patterns.
///
/// Filters may be placed on the relationship itself and on either endpoint
/// builder; they are combined with AND when the statement is rendered, in
/// the order relationship, left, right.
pub struct RelationshipQueryBuilder<T = Relationship> {
    alias: String,
    entity_type: Option<String>,
    types: Labels,
    properties: Properties,
    conditions: Conditions,
    left: NodeQueryBuilder,
    right: NodeQueryBuilder,
    left_to_right: bool,
    target: Target,
    _marker: PhantomData<fn() -> T>,
}

impl RelationshipQueryBuilder<Relationship> {
    /// Builder for relationships of any type.
    pub fn new() -> Self {
        Self::with_binding(None, Target::Default)
    }
}

impl Default for RelationshipQueryBuilder<Relationship> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> RelationshipQueryBuilder<T> {
    fn with_binding(entity_type: Option<String>, target: Target) -> Self {
        Self {
            alias: REL_ALIAS.to_owned(),
            entity_type,
            types: Labels::new(),
            properties: Properties::new(),
            conditions: Conditions::new(),
            left: NodeQueryBuilder::endpoint(LEFT_ALIAS),
            right: NodeQueryBuilder::endpoint(RIGHT_ALIAS),
            left_to_right: true,
            target,
            _marker: PhantomData,
        }
    }
}

impl<T: Model> RelationshipQueryBuilder<T> {
    /// Builder bound to `T`, whose label is the relationship type.
    pub fn for_model() -> Self {
        Self::with_binding(Some(T::label()), Target::from_connection(T::CONNECTION))
    }

    /// Rebinds the builder to entity type `M`, keeping the query state.
    pub fn entity<M: Model>(self) -> RelationshipQueryBuilder<M> {
        let target = match self.target {
            Target::Default => Target::from_connection(M::CONNECTION),
            explicit => explicit,
        };
        RelationshipQueryBuilder {
            alias: self.alias,
            entity_type: Some(M::label()),
            types: self.types,
            properties: self.properties,
            conditions: self.conditions,
            left: self.left,
            right: self.right,
            left_to_right: self.left_to_right,
            target,
            _marker: PhantomData,
        }
    }

    /// Renames the statement-local alias of the relationship.
    pub fn alias(&mut self, alias: impl Into<String>) -> &mut Self {
        self.alias = alias.into();
        self
    }

    /// Adds an accepted relationship type.
    pub fn rel_type(&mut self, rel_type: impl Into<String>) -> &mut Self {
        let rel_type = rel_type.into();
        if !self.types.contains(&rel_type) {
            self.types.push(rel_type);
        }
        self
    }

    /// Sets one inline property used for matching and creation.
    pub fn property(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Merges inline properties.
    pub fn properties(&mut self, properties: Properties) -> &mut Self {
        self.properties.extend(properties);
        self
    }

    /// Left endpoint builder, aliased `left`.
    pub fn left_node(&mut self) -> &mut NodeQueryBuilder {
        &mut self.left
    }

    /// Right endpoint builder, aliased `right`.
    pub fn right_node(&mut self) -> &mut NodeQueryBuilder {
        &mut self.right
    }

    /// Points the relationship from left to right (the default) or back.
    pub fn left_to_right(&mut self, left_to_right: bool) -> &mut Self {
        self.left_to_right = left_to_right;
        self
    }

    /// Sends statements to `client` instead of resolving one.
    pub fn using(&mut self, client: Arc<dyn GraphClient>) -> &mut Self {
        self.target = Target::Client(client);
        self
    }

    /// Resolves the client for connection `name`.
    pub fn connection(&mut self, name: impl Into<String>) -> &mut Self {
        self.target = Target::Connection(name.into());
        self
    }

    /// Restores the freshly constructed query state, endpoints included.
    pub fn reset(&mut self) -> &mut Self {
        self.alias = REL_ALIAS.to_owned();
        self.types.clear();
        self.properties.clear();
        self.conditions.reset();
        self.left.reset();
        self.right.reset();
        self.left_to_right = true;
        self
    }

    /// Relationship types in render order, the bound type first.
    pub fn resolved_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.entity_type.iter().cloned().collect();
        for rel_type in &self.types {
            if !types.contains(rel_type) {
                types.push(rel_type.clone());
            }
        }
        types
    }

    /// `(left)-[rel:TYPE {props}]->(right)` with the endpoint patterns.
    pub fn pattern(&self) -> RelationshipPattern {
        RelationshipPattern {
            alias: Some(self.alias.clone()),
            types: self.resolved_types(),
            properties: self.properties.clone(),
            left: self.left.pattern(),
            right: self.right.pattern(),
            direction: PatternDirection::from_left_to_right(self.left_to_right),
        }
    }

    /// Relationship, left and right filters combined with AND.
    pub fn predicate(&self) -> Result<Option<Predicate>> {
        let mut parts: Vec<Predicate> = [
            self.conditions.to_predicate(&self.alias)?,
            self.left.predicate()?,
            self.right.predicate()?,
        ]
        .into_iter()
        .flatten()
        .collect();
        Ok(match parts.len() {
            0 => None,
            1 => parts.pop(),
            _ => Some(Predicate::And(parts)),
        })
    }

    /// Renders the `get` statement without running it.
    pub fn statement(
        &self,
        fields: Option<&[&str]>,
        skip: Option<u64>,
        limit: Option<u64>,
    ) -> Result<Statement> {
        let shape = RecordShape::from_fields(fields);
        Ok(self.select_query(&shape, skip, limit)?.render())
    }

    /// Matches relationships and streams them as `T`.
    pub fn get(
        &self,
        fields: Option<&[&str]>,
        skip: Option<u64>,
        limit: Option<u64>,
    ) -> Result<EntityStream<T>> {
        let shape = RecordShape::from_fields(fields);
        let query = self.select_query(&shape, skip, limit)?;
        let result = self.target.execute(&query)?;
        let mapper = RecordMapper::new(self.alias.clone(), ElementKind::Relationship, shape);
        Ok(EntityStream::new(result, mapper))
    }

    /// First matching relationship, if any.
    pub fn first(&self, fields: Option<&[&str]>, skip: Option<u64>) -> Result<Option<T>> {
        self.get(fields, skip, Some(1))?.first()
    }

    /// Number of matching relationships.
    pub fn count(&self) -> Result<i64> {
        let mut query = self.match_query()?;
        query.add_clause(Clause::Return(vec![self.count_item()]));
        self.target.execute_count(&query)
    }

    /// Creates one relationship between the nodes matched by the endpoint
    /// builders.
    ///
    /// Exactly one relationship type must be known. When the endpoints
    /// match nothing, the statement returns no rows and the call fails with
    /// [`GrmError::EmptyResult`].
    pub fn create(&self) -> Result<T> {
        let types = self.resolved_types();
        if types.len() != 1 {
            return Err(GrmError::invalid(format!(
                "creating a relationship requires exactly one type, found {}",
                types.len()
            )));
        }
        reject_id_key(&self.properties)?;
        let predicate = self.predicate()?;
        let created = RelationshipPattern {
            alias: Some(self.alias.clone()),
            types,
            properties: self.properties.clone(),
            left: NodePattern::new(self.left.alias_name()),
            right: NodePattern::new(self.right.alias_name()),
            direction: PatternDirection::from_left_to_right(self.left_to_right),
        };
        let mut query = CypherQuery::new();
        query.add_clause(Clause::Match(vec![
            self.left.pattern().into(),
            self.right.pattern().into(),
        ]));
        if let Some(predicate) = predicate {
            query.add_clause(Clause::Where(predicate));
        }
        query
            .add_clause(Clause::Create(vec![created.into()]))
            .add_clause(Clause::Return(vec![self.alias.clone()]));
        let result = self.target.execute(&query)?;
        let mapper = RecordMapper::new(
            self.alias.clone(),
            ElementKind::Relationship,
            RecordShape::Whole,
        );
        let entity = mapper.map(result.first()?)?;
        debug!(rel_type = ?entity.label(), id = ?entity.id(), "relationship created");
        Ok(T::from_entity(entity))
    }

    /// Sets properties on every matching relationship and returns how many
    /// matched.
    pub fn update(&self, properties: Properties) -> Result<i64> {
        if properties.is_empty() {
            return Err(GrmError::invalid("update requires at least one property"));
        }
        reject_id_key(&properties)?;
        let items = properties
            .into_iter()
            .map(|(key, value)| SetItem {
                alias: self.alias.clone(),
                key,
                value,
            })
            .collect();
        let mut query = self.match_query()?;
        query
            .add_clause(Clause::Set(items))
            .add_clause(Clause::Return(vec![self.count_item()]));
        self.target.execute_count(&query)
    }

    /// Deletes every matching relationship and returns how many were deleted.
    pub fn delete(&self) -> Result<i64> {
        let mut query = self.match_query()?;
        query
            .add_clause(Clause::Delete {
                items: vec![self.alias.clone()],
                detach: false,
            })
            .add_clause(Clause::Return(vec![self.count_item()]));
        self.target.execute_count(&query)
    }

    fn match_query(&self) -> Result<CypherQuery> {
        let predicate = self.predicate()?;
        let mut query = CypherQuery::new();
        query.add_clause(Clause::Match(vec![self.pattern().into()]));
        if let Some(predicate) = predicate {
            query.add_clause(Clause::Where(predicate));
        }
        Ok(query)
    }

    fn select_query(
        &self,
        shape: &RecordShape,
        skip: Option<u64>,
        limit: Option<u64>,
    ) -> Result<CypherQuery> {
        let mut query = self.match_query()?;
        query.add_clause(Clause::Return(
            shape.return_items(&self.alias, ElementKind::Relationship),
        ));
        if let Some(skip) = skip {
            query.add_clause(Clause::Skip(skip));
        }
        if let Some(limit) = limit {
            query.add_clause(Clause::Limit(limit));
        }
        Ok(query)
    }

    fn count_item(&self) -> String {
        format!("count({}) AS {COUNT_COLUMN}", self.alias)
    }
}

impl<T> Filterable for RelationshipQueryBuilder<T> {
    fn conditions(&self) -> &Conditions {
        &self.conditions
    }

    fn conditions_mut(&mut self) -> &mut Conditions {
        &mut self.conditions
    }
}

impl<T> Clone for RelationshipQueryBuilder<T> {
    fn clone(&self) -> Self {
        Self {
            alias: self.alias.clone(),
            entity_type: self.entity_type.clone(),
            types: self.types.clone(),
            properties: self.properties.clone(),
            conditions: self.conditions.clone(),
            left: self.left.clone(),
            right: self.right.clone(),
            left_to_right: self.left_to_right,
            target: self.target.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for RelationshipQueryBuilder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelationshipQueryBuilder")
            .field("alias", &self.alias)
            .field("entity_type", &self.entity_type)
            .field("types", &self.types)
            .field("properties", &self.properties)
            .field("conditions", &self.conditions)
            .field("left", &self.left)
            .field("right", &self.right)
            .field("left_to_right", &self.left_to_right)
            .field("target", &self.target)
            .finish()
    }
}
