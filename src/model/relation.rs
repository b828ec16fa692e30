//! Declared relations and their lazy loading.
//!
//! A node model lists its relations in a [`RelationSchema`]. Loading reads
//! every requested relation that is not cached yet in one statement, one list
//! column per accessor:
//!
//! ```text
//! MATCH (node:Person) WHERE id(node) = $p0
//! RETURN [(node)-[:WROTE]->(related:Post) | related] AS posts
//! ```

use std::collections::BTreeMap;

use tracing::debug;

use crate::client::CypherValue;
use crate::cypher::{
    escape_identifier, pattern_text, Clause, CypherQuery, NodePattern, Operator, PatternDirection,
    Predicate, RelationshipPattern,
};
use crate::error::{GrmError, Result};
use crate::query::mapper::{ElementKind, RecordMapper, RecordShape};
use crate::query::predicate::ID_FIELD;
use crate::query::Target;

use super::{Entity, Model, Node};

const OWNER_ALIAS: &str = "node";
const RELATED_ALIAS: &str = "related";

/// Direction of a relation seen from the owning node.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Direction {
    /// `(owner)-[:TYPE]->(related)`
    #[default]
    Outgoing,
    /// `(owner)<-[:TYPE]-(related)`
    Incoming,
    /// Either way.
    Both,
}

impl Direction {
    fn pattern_direction(self) -> PatternDirection {
        match self {
            Direction::Outgoing => PatternDirection::LeftToRight,
            Direction::Incoming => PatternDirection::RightToLeft,
            Direction::Both => PatternDirection::Undirected,
        }
    }
}

/// One declared relation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Relation {
    /// Relationship type traversed.
    pub name: String,
    /// Label of the nodes at the far end.
    pub related_label: String,
    /// Traversal direction.
    pub direction: Direction,
    /// Whether the relation yields a list rather than at most one node.
    pub multiple: bool,
}

impl Relation {
    /// Outgoing, multiple relation of type `name` to nodes labelled `related_label`.
    pub fn new(name: impl Into<String>, related_label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            related_label: related_label.into(),
            direction: Direction::Outgoing,
            multiple: true,
        }
    }

    /// Relation of type `name` to nodes of model `M`.
    pub fn to<M: Model>(name: impl Into<String>) -> Self {
        Self::new(name, M::label())
    }

    /// Sets the traversal direction.
    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    /// Yields at most one related node.
    pub fn single(mut self) -> Self {
        self.multiple = false;
        self
    }

    fn comprehension(&self) -> String {
        let pattern = RelationshipPattern {
            alias: None,
            types: vec![self.name.clone()],
            left: NodePattern::new(OWNER_ALIAS),
            right: NodePattern::new(RELATED_ALIAS).with_label(self.related_label.clone()),
            direction: self.direction.pattern_direction(),
            ..RelationshipPattern::default()
        };
        format!("[{} | {RELATED_ALIAS}]", pattern_text(&pattern.into()))
    }
}

/// Relations of one node model, keyed by accessor name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RelationSchema {
    relations: BTreeMap<String, Relation>,
}

impl RelationSchema {
    /// Creates an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares `relation` under `accessor`.
    pub fn with(mut self, accessor: impl Into<String>, relation: Relation) -> Self {
        self.relations.insert(accessor.into(), relation);
        self
    }

    /// Relation declared under `accessor`.
    pub fn get(&self, accessor: &str) -> Option<&Relation> {
        self.relations.get(accessor)
    }

    /// Returns true when nothing is declared.
    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }

    /// Accessor names in order.
    pub fn accessors(&self) -> impl Iterator<Item = &str> {
        self.relations.keys().map(String::as_str)
    }
}

/// Loaded value of a relation.
#[derive(Clone, Debug, PartialEq)]
pub enum Related {
    /// Relation declared single: the node, if one exists.
    One(Option<Node>),
    /// Relation declared multiple: every related node, possibly none.
    Many(Vec<Node>),
}

impl Related {
    /// Related nodes, whatever the multiplicity.
    pub fn nodes(&self) -> &[Node] {
        match self {
            Related::One(Some(node)) => std::slice::from_ref(node),
            Related::One(None) => &[],
            Related::Many(nodes) => nodes,
        }
    }

    /// Number of related nodes.
    pub fn len(&self) -> usize {
        self.nodes().len()
    }

    /// Returns true when no node is related.
    pub fn is_empty(&self) -> bool {
        self.nodes().is_empty()
    }
}

/// Loads relations of `entity` into its cache with a single statement.
///
/// Accessors already cached are skipped unless `force` is set.
pub(crate) fn load(
    entity: &mut Entity,
    label: &str,
    schema: &RelationSchema,
    accessors: &[&str],
    force: bool,
    target: &Target,
) -> Result<()> {
    let mut pending: Vec<(&str, &Relation)> = Vec::new();
    for accessor in accessors {
        let relation = schema
            .get(accessor)
            .ok_or_else(|| GrmError::MissingRelation {
                relation: (*accessor).to_owned(),
                label: label.to_owned(),
            })?;
        let seen = pending.iter().any(|(name, _)| name == accessor);
        if !seen && (force || !entity.is_relation_cached(accessor)) {
            pending.push((accessor, relation));
        }
    }
    if pending.is_empty() {
        return Ok(());
    }
    let id = entity.id().ok_or_else(|| {
        GrmError::invalid(format!(
            "relations of a '{label}' can only be loaded once it is persisted"
        ))
    })?;

    let items = pending
        .iter()
        .map(|(accessor, relation)| {
            format!("{} AS {}", relation.comprehension(), escape_identifier(accessor))
        })
        .collect();
    let mut query = CypherQuery::new();
    query
        .add_clause(Clause::Match(vec![NodePattern::new(OWNER_ALIAS)
            .with_label(label)
            .into()]))
        .add_clause(Clause::Where(Predicate::Comparison {
            lhs: ID_FIELD.replace("%s", OWNER_ALIAS),
            operator: Operator::Equals,
            value: id.into(),
        }))
        .add_clause(Clause::Return(items));
    debug!(label, id, relations = pending.len(), "loading relations");

    let result = target.execute(&query)?;
    let record = result.first()?;
    let mapper = RecordMapper::new(RELATED_ALIAS, ElementKind::Node, RecordShape::Whole);
    for (accessor, relation) in pending {
        let nodes = match record.get(accessor)? {
            CypherValue::List(list) => list
                .0
                .iter()
                .map(|value| mapper.map_whole(value).map(Node::from_entity))
                .collect::<Result<Vec<_>>>()?,
            CypherValue::Null => Vec::new(),
            other => return Err(GrmError::unexpected(accessor, "list", other.kind())),
        };
        let related = if relation.multiple {
            Related::Many(nodes)
        } else {
            Related::One(nodes.into_iter().next())
        };
        entity.cache_relation(accessor, related);
    }
    Ok(())
}
