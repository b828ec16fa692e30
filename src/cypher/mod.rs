//! Minimal Cypher statement model and renderer.
//!
//! Builders assemble a [`CypherQuery`] from clauses; [`CypherQuery::render`]
//! produces the text handed to the client together with its parameter map.

pub mod ast;
pub mod render;

pub use ast::{
    Clause, CypherQuery, NodePattern, Operator, Pattern, PatternDirection, Predicate,
    RelationshipPattern, SetItem,
};
pub use render::{escape_identifier, pattern_text, property_ref, Statement};
