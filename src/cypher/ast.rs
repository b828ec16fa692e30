//! Clause, pattern and predicate tree assembled by the builders.
//!
//! The tree is deliberately small: it models exactly the clauses the node and
//! relationship builders emit. Literal values stay typed here and only become
//! parameters when the query is rendered.

use std::fmt;
use std::str::FromStr;

use crate::error::GrmError;
use crate::value::{Properties, Value};

use super::render::{self, Statement};

/// Comparison operators accepted by the predicate builder.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Operator {
    /// `=`
    Equals,
    /// `<>`
    NotEquals,
    /// `>`
    GreaterThan,
    /// `>=`
    GreaterThanOrEquals,
    /// `<`
    LessThan,
    /// `<=`
    LessThanOrEquals,
    /// `IS NULL`
    IsNull,
    /// `IS NOT NULL`
    IsNotNull,
}

impl Operator {
    /// Parses an operator token; whitespace and case are normalised first.
    pub fn parse(token: &str) -> Option<Self> {
        let normalised = token
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_ascii_uppercase();
        Some(match normalised.as_str() {
            "=" => Operator::Equals,
            "<>" => Operator::NotEquals,
            ">" => Operator::GreaterThan,
            ">=" => Operator::GreaterThanOrEquals,
            "<" => Operator::LessThan,
            "<=" => Operator::LessThanOrEquals,
            "IS NULL" => Operator::IsNull,
            "IS NOT NULL" => Operator::IsNotNull,
            _ => return None,
        })
    }

    /// Cypher spelling of the operator.
    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Equals => "=",
            Operator::NotEquals => "<>",
            Operator::GreaterThan => ">",
            Operator::GreaterThanOrEquals => ">=",
            Operator::LessThan => "<",
            Operator::LessThanOrEquals => "<=",
            Operator::IsNull => "IS NULL",
            Operator::IsNotNull => "IS NOT NULL",
        }
    }

    /// Unary operators take no right-hand side.
    pub fn is_unary(self) -> bool {
        matches!(self, Operator::IsNull | Operator::IsNotNull)
    }
}

impl FromStr for Operator {
    type Err = GrmError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        Operator::parse(token).ok_or_else(|| GrmError::UnsupportedOperator(token.to_owned()))
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// `(alias:Label {key: value})`
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NodePattern {
    /// Statement-local name.
    pub alias: Option<String>,
    /// Labels in render order.
    pub labels: Vec<String>,
    /// Inline property constraints.
    pub properties: Properties,
}

impl NodePattern {
    /// Pattern bound to `alias` with no labels or properties.
    pub fn new(alias: impl Into<String>) -> Self {
        Self {
            alias: Some(alias.into()),
            ..Self::default()
        }
    }

    /// Appends a label unless it is already present.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        let label = label.into();
        if !self.labels.contains(&label) {
            self.labels.push(label);
        }
        self
    }

    /// Replaces the inline property constraints.
    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }
}

/// Which way a relationship pattern points.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum PatternDirection {
    /// `(left)-[..]->(right)`
    #[default]
    LeftToRight,
    /// `(left)<-[..]-(right)`
    RightToLeft,
    /// `(left)-[..]-(right)`
    Undirected,
}

impl PatternDirection {
    /// Maps the builders' `left_to_right` flag.
    pub fn from_left_to_right(left_to_right: bool) -> Self {
        if left_to_right {
            PatternDirection::LeftToRight
        } else {
            PatternDirection::RightToLeft
        }
    }
}

/// `(left)-[alias:TYPE {key: value}]->(right)`
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RelationshipPattern {
    /// Statement-local name of the relationship.
    pub alias: Option<String>,
    /// Accepted relationship types; several render as alternatives.
    pub types: Vec<String>,
    /// Inline property constraints.
    pub properties: Properties,
    /// Left endpoint.
    pub left: NodePattern,
    /// Right endpoint.
    pub right: NodePattern,
    /// Direction between the endpoints.
    pub direction: PatternDirection,
}

/// Pattern element of a MATCH or CREATE clause.
#[derive(Clone, Debug, PartialEq)]
pub enum Pattern {
    /// Single node.
    Node(NodePattern),
    /// Relationship with its endpoints.
    Relationship(RelationshipPattern),
}

impl From<NodePattern> for Pattern {
    fn from(node: NodePattern) -> Self {
        Pattern::Node(node)
    }
}

impl From<RelationshipPattern> for Pattern {
    fn from(rel: RelationshipPattern) -> Self {
        Pattern::Relationship(rel)
    }
}

/// Boolean expression rendered inside a WHERE clause.
#[derive(Clone, Debug, PartialEq)]
pub enum Predicate {
    /// `lhs <op> value`; the value is ignored for unary operators.
    Comparison {
        /// Rendered left-hand side, e.g. `node.name` or `id(node)`.
        lhs: String,
        /// Comparison operator.
        operator: Operator,
        /// Right-hand side literal.
        value: Value,
    },
    /// Conjunction; empty means `true`.
    And(Vec<Predicate>),
    /// Disjunction; empty means `false`.
    Or(Vec<Predicate>),
    /// Negation.
    Not(Box<Predicate>),
}

/// `alias.key = value` inside a SET clause.
#[derive(Clone, Debug, PartialEq)]
pub struct SetItem {
    /// Element alias.
    pub alias: String,
    /// Property key.
    pub key: String,
    /// New value.
    pub value: Value,
}

/// Single clause of a statement.
#[derive(Clone, Debug, PartialEq)]
pub enum Clause {
    /// `MATCH p1, p2`
    Match(Vec<Pattern>),
    /// `WHERE predicate`
    Where(Predicate),
    /// `CREATE p1, p2`
    Create(Vec<Pattern>),
    /// `SET a.k = v, ...`
    Set(Vec<SetItem>),
    /// `[DETACH] DELETE a, b`
    Delete {
        /// Aliases to delete.
        items: Vec<String>,
        /// Remove attached relationships first.
        detach: bool,
    },
    /// `RETURN item, ...`; items are raw expressions.
    Return(Vec<String>),
    /// `SKIP n`
    Skip(u64),
    /// `LIMIT n`
    Limit(u64),
}

/// Ordered clause list forming one statement.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CypherQuery {
    clauses: Vec<Clause>,
}

impl CypherQuery {
    /// Creates an empty statement.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a clause.
    pub fn add_clause(&mut self, clause: Clause) -> &mut Self {
        self.clauses.push(clause);
        self
    }

    /// Clauses in order.
    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    /// Renders the statement text and its parameters.
    pub fn render(&self) -> Statement {
        render::render(self)
    }
}
