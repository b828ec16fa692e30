use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use tracing::debug;

use crate::client::GraphClient;
use crate::cypher::{Clause, CypherQuery, NodePattern, Predicate, SetItem, Statement};
use crate::error::{GrmError, Result};
use crate::model::entity::{reject_id_key, Labels};
use crate::model::{Model, Node};
use crate::value::{Properties, Value};

use super::mapper::{ElementKind, RecordMapper, RecordShape};
use super::predicate::{Conditions, Filterable};
use super::stream::EntityStream;
use super::{Target, COUNT_COLUMN};

/// Alias bound to the matched node.
pub const NODE_ALIAS: &str = "node";

/// Builds and runs statements over nodes of one entity type.
///
/// ```
/// use grm::prelude::*;
/// use grm::query::NodeQueryBuilder;
///
/// let mut people = NodeQueryBuilder::new();
/// people.label("Person").property("name", "Ada").where_op("born", ">", 1800);
/// let statement = people.statement(None, None, Some(10)).unwrap();
/// assert_eq!(
///     statement.query_string(),
///     "MATCH (node:Person {name: $p0}) WHERE node.born > $p1 RETURN node LIMIT 10"
/// );
/// ```
pub struct NodeQueryBuilder<T = Node> {
    base_alias: &'static str,
    alias: String,
    entity_label: Option<String>,
    labels: Labels,
    properties: Properties,
    conditions: Conditions,
    target: Target,
    _marker: PhantomData<fn() -> T>,
}

impl NodeQueryBuilder<Node> {
    /// Builder for untyped nodes with no canonical label.
    pub fn new() -> Self {
        Self::with_binding(NODE_ALIAS, None, Target::Default)
    }

    pub(crate) fn endpoint(alias: &'static str) -> Self {
        Self::with_binding(alias, None, Target::Default)
    }
}

impl Default for NodeQueryBuilder<Node> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> NodeQueryBuilder<T> {
    fn with_binding(
        base_alias: &'static str,
        entity_label: Option<String>,
        target: Target,
    ) -> Self {
        Self {
            base_alias,
            alias: base_alias.to_owned(),
            entity_label,
            labels: Labels::new(),
            properties: Properties::new(),
            conditions: Conditions::new(),
            target,
            _marker: PhantomData,
        }
    }
}

impl<T: Model> NodeQueryBuilder<T> {
    /// Builder bound to `T`: its label leads every pattern and its
    /// connection is used unless another target is chosen.
    pub fn for_model() -> Self {
        Self::with_binding(
            NODE_ALIAS,
            Some(T::label()),
            Target::from_connection(T::CONNECTION),
        )
    }

    /// Rebinds the builder to entity type `M`, keeping the query state.
    ///
    /// An explicitly chosen client or connection is kept; otherwise `M`'s
    /// connection applies.
    pub fn entity<M: Model>(self) -> NodeQueryBuilder<M> {
        let target = match self.target {
            Target::Default => Target::from_connection(M::CONNECTION),
            explicit => explicit,
        };
        NodeQueryBuilder {
            base_alias: self.base_alias,
            alias: self.alias,
            entity_label: Some(M::label()),
            labels: self.labels,
            properties: self.properties,
            conditions: self.conditions,
            target,
            _marker: PhantomData,
        }
    }

    /// Renames the statement-local alias.
    pub fn alias(&mut self, alias: impl Into<String>) -> &mut Self {
        self.alias = alias.into();
        self
    }

    /// Current alias.
    pub fn alias_name(&self) -> &str {
        &self.alias
    }

    /// Adds a label after the canonical one.
    pub fn label(&mut self, label: impl Into<String>) -> &mut Self {
        let label = label.into();
        if !self.labels.contains(&label) {
            self.labels.push(label);
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

    /// Restores the freshly constructed query state.
    ///
    /// The entity binding and the execution target are kept.
    pub fn reset(&mut self) -> &mut Self {
        self.alias = self.base_alias.to_owned();
        self.labels.clear();
        self.properties.clear();
        self.conditions.reset();
        self
    }

    /// Labels in render order: the canonical label first, once.
    pub fn resolved_labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self.entity_label.iter().cloned().collect();
        for label in &self.labels {
            if !labels.contains(label) {
                labels.push(label.clone());
            }
        }
        labels
    }

    /// `(alias:Labels {props})`
    pub fn pattern(&self) -> NodePattern {
        NodePattern {
            alias: Some(self.alias.clone()),
            labels: self.resolved_labels(),
            properties: self.properties.clone(),
        }
    }

    /// Filter tree converted for the current alias.
    pub fn predicate(&self) -> Result<Option<Predicate>> {
        self.conditions.to_predicate(&self.alias)
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

    /// Matches nodes and streams them as `T`.
    ///
    /// No ordering is imposed, so `skip`/`limit` windows are only stable if
    /// the database returns rows in a stable order.
    pub fn get(
        &self,
        fields: Option<&[&str]>,
        skip: Option<u64>,
        limit: Option<u64>,
    ) -> Result<EntityStream<T>> {
        let shape = RecordShape::from_fields(fields);
        let query = self.select_query(&shape, skip, limit)?;
        let result = self.target.execute(&query)?;
        let mapper = RecordMapper::new(self.alias.clone(), ElementKind::Node, shape);
        Ok(EntityStream::new(result, mapper))
    }

    /// First matching node, if any.
    pub fn first(&self, fields: Option<&[&str]>, skip: Option<u64>) -> Result<Option<T>> {
        self.get(fields, skip, Some(1))?.first()
    }

    /// Number of matching nodes.
    pub fn count(&self) -> Result<i64> {
        let mut query = self.match_query()?;
        query.add_clause(Clause::Return(vec![self.count_item()]));
        self.target.execute_count(&query)
    }

    /// Creates one node from the builder's labels and properties.
    pub fn create(&self) -> Result<T> {
        reject_id_key(&self.properties)?;
        let mut query = CypherQuery::new();
        query
            .add_clause(Clause::Create(vec![self.pattern().into()]))
            .add_clause(Clause::Return(vec![self.alias.clone()]));
        let result = self.target.execute(&query)?;
        let mapper = RecordMapper::new(self.alias.clone(), ElementKind::Node, RecordShape::Whole);
        let entity = mapper.map(result.first()?)?;
        debug!(label = ?self.entity_label, id = ?entity.id(), "node created");
        Ok(T::from_entity(entity))
    }

    /// Creates one node per property map in a single statement.
    ///
    /// Every node gets the builder's labels; the builder's own properties
    /// are ignored. Entities come back in input order.
    pub fn create_many(&self, records: Vec<Properties>) -> Result<Vec<T>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }
        let labels = self.resolved_labels();
        let mut patterns = Vec::with_capacity(records.len());
        let mut aliases = Vec::with_capacity(records.len());
        for (index, properties) in records.into_iter().enumerate() {
            reject_id_key(&properties)?;
            let alias = format!("{}{index}", self.alias);
            patterns.push(
                NodePattern {
                    alias: Some(alias.clone()),
                    labels: labels.clone(),
                    properties,
                }
                .into(),
            );
            aliases.push(alias);
        }
        let mut query = CypherQuery::new();
        query
            .add_clause(Clause::Create(patterns))
            .add_clause(Clause::Return(aliases.clone()));
        let result = self.target.execute(&query)?;
        let record = result.first()?;
        aliases
            .into_iter()
            .map(|alias| {
                let mapper = RecordMapper::new(alias.as_str(), ElementKind::Node, RecordShape::Whole);
                mapper.map(record).map(T::from_entity)
            })
            .collect()
    }

    /// Sets properties on every matching node and returns how many matched.
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

    /// Deletes every matching node and returns how many were deleted.
    ///
    /// The database rejects deleting nodes that still have relationships;
    /// use [`detach_delete`](Self::detach_delete) for those.
    pub fn delete(&self) -> Result<i64> {
        self.delete_matching(false)
    }

    /// Deletes every matching node together with its relationships.
    pub fn detach_delete(&self) -> Result<i64> {
        self.delete_matching(true)
    }

    fn delete_matching(&self, detach: bool) -> Result<i64> {
        let mut query = self.match_query()?;
        query
            .add_clause(Clause::Delete {
                items: vec![self.alias.clone()],
                detach,
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
        query.add_clause(Clause::Return(shape.return_items(&self.alias, ElementKind::Node)));
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

impl<T> Filterable for NodeQueryBuilder<T> {
    fn conditions(&self) -> &Conditions {
        &self.conditions
    }

    fn conditions_mut(&mut self) -> &mut Conditions {
        &mut self.conditions
    }
}

impl<T> Clone for NodeQueryBuilder<T> {
    fn clone(&self) -> Self {
        Self {
            base_alias: self.base_alias,
            alias: self.alias.clone(),
            entity_label: self.entity_label.clone(),
            labels: self.labels.clone(),
            properties: self.properties.clone(),
            conditions: self.conditions.clone(),
            target: self.target.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for NodeQueryBuilder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeQueryBuilder")
            .field("alias", &self.alias)
            .field("entity_label", &self.entity_label)
            .field("labels", &self.labels)
            .field("properties", &self.properties)
            .field("conditions", &self.conditions)
            .field("target", &self.target)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{CypherMap, CypherValue, GraphNode, Record, ScriptedClient};
    use crate::model::Entity;
    use crate::props;

    struct Person(Node);

    impl Model for Person {
        fn from_entity(entity: Entity) -> Self {
            Person(Node::from_entity(entity))
        }

        fn entity(&self) -> &Entity {
            self.0.entity()
        }

        fn entity_mut(&mut self) -> &mut Entity {
            self.0.entity_mut()
        }

        fn into_entity(self) -> Entity {
            self.0.into_entity()
        }
    }

    fn scripted() -> (Arc<ScriptedClient>, NodeQueryBuilder<Person>) {
        let client = Arc::new(ScriptedClient::new());
        let mut builder = NodeQueryBuilder::<Person>::for_model();
        builder.using(client.clone());
        (client, builder)
    }

    fn person(id: i64, name: &str) -> Record {
        Record::new([(
            "node",
            CypherValue::from(GraphNode {
                id,
                labels: vec!["Person".into()],
                properties: CypherMap(
                    [("name".to_owned(), CypherValue::from(name))]
                        .into_iter()
                        .collect(),
                ),
            }),
        )])
    }

    #[test]
    fn canonical_label_leads_once() {
        let (_, mut builder) = scripted();
        builder.label("Author").label("Person");
        assert_eq!(builder.resolved_labels(), ["Person", "Author"]);
    }

    #[test]
    fn get_renders_projection_and_window() {
        let (_, mut builder) = scripted();
        builder.r#where("name", "Ada");
        let statement = builder
            .statement(Some(&["name", "born"][..]), Some(2), Some(5))
            .unwrap();
        assert_eq!(
            statement.query_string(),
            "MATCH (node:Person) WHERE node.name = $p0 RETURN node.name AS `node.name`, \
             node.born AS `node.born`, id(node) AS __id, labels(node) AS __labels SKIP 2 LIMIT 5"
        );
    }

    #[test]
    fn create_returns_mapped_entity() {
        let (client, mut builder) = scripted();
        client.respond(vec![person(1, "Ada")]);
        let created = builder.property("name", "Ada").create().unwrap();
        assert_eq!(created.id(), Some(1));
        let executed = client.last().unwrap();
        assert_eq!(
            executed.statement,
            "CREATE (node:Person {name: $p0}) RETURN node"
        );
        assert_eq!(executed.parameters, props! { "p0" => "Ada" });
    }

    #[test]
    fn create_rejects_predefined_id() {
        let (client, mut builder) = scripted();
        let err = builder.property("id", 3).create().err().unwrap();
        assert_eq!(err.code(), "InvalidArgument");
        assert!(client.executed().is_empty());
    }

    #[test]
    fn create_many_uses_indexed_aliases() {
        let (client, builder) = scripted();
        let node = |id: i64, name: &str| {
            CypherValue::from(GraphNode {
                id,
                labels: vec!["Person".into()],
                properties: CypherMap(
                    [("name".to_owned(), CypherValue::from(name))]
                        .into_iter()
                        .collect(),
                ),
            })
        };
        client.respond(vec![Record::new([
            ("node0", node(1, "Ada")),
            ("node1", node(2, "Grace")),
        ])]);
        let created = builder
            .create_many(vec![props! { "name" => "Ada" }, props! { "name" => "Grace" }])
            .unwrap();
        assert_eq!(
            created.iter().map(|p| p.id()).collect::<Vec<_>>(),
            [Some(1), Some(2)]
        );
        assert_eq!(
            client.last().unwrap().statement,
            "CREATE (node0:Person {name: $p0}), (node1:Person {name: $p1}) RETURN node0, node1"
        );
    }

    #[test]
    fn update_rejects_empty_maps_and_counts() {
        let (client, mut builder) = scripted();
        assert!(builder.update(Properties::new()).is_err());
        client.respond(vec![Record::new([("count", CypherValue::Int(2))])]);
        builder.where_op("born", "<", 1900);
        let updated = builder.update(props! { "era" => "victorian" }).unwrap();
        assert_eq!(updated, 2);
        assert_eq!(
            client.last().unwrap().statement,
            "MATCH (node:Person) WHERE node.born < $p0 SET node.era = $p1 \
             RETURN count(node) AS count"
        );
    }

    #[test]
    fn detach_delete_renders_keyword() {
        let (client, mut builder) = scripted();
        client.respond(vec![Record::new([("count", CypherValue::Int(1))])]);
        assert_eq!(builder.where_id(9).detach_delete().unwrap(), 1);
        assert_eq!(
            client.last().unwrap().statement,
            "MATCH (node:Person) WHERE id(node) = $p0 DETACH DELETE node \
             RETURN count(node) AS count"
        );
    }

    #[test]
    fn reset_keeps_binding_and_target() {
        let (client, mut builder) = scripted();
        builder
            .alias("p")
            .label("Author")
            .property("name", "Ada")
            .r#where("born", 1815);
        builder.reset();
        assert_eq!(builder.alias_name(), NODE_ALIAS);
        assert_eq!(
            builder.statement(None, None, None).unwrap().query_string(),
            "MATCH (node:Person) RETURN node"
        );
        client.respond(vec![Record::new([("count", CypherValue::Int(0))])]);
        assert_eq!(builder.count().unwrap(), 0);
        assert_eq!(client.executed().len(), 1);
    }

    #[test]
    fn unsupported_operator_stops_before_execution() {
        let (client, mut builder) = scripted();
        builder.where_op("name", "STARTS WITH", "A");
        assert!(matches!(
            builder.count(),
            Err(GrmError::UnsupportedOperator(op)) if op == "STARTS WITH"
        ));
        assert!(client.executed().is_empty());
    }

    #[test]
    fn entity_rebinds_label() {
        let mut builder = NodeQueryBuilder::new();
        builder.label("Extra");
        let typed = builder.entity::<Person>();
        assert_eq!(typed.resolved_labels(), ["Person", "Extra"]);
    }
}
