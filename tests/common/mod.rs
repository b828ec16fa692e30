#![allow(dead_code)]

use std::sync::Once;

use grm::client::{CypherMap, CypherValue, GraphNode, GraphRelationship, Record};
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("grm=debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .try_init();
    });
}

pub fn map<const N: usize>(entries: [(&str, CypherValue); N]) -> CypherMap {
    entries
        .into_iter()
        .map(|(key, value)| (key.to_owned(), value))
        .collect()
}

pub fn node<const N: usize>(id: i64, labels: &[&str], properties: [(&str, CypherValue); N]) -> CypherValue {
    CypherValue::Node(GraphNode {
        id,
        labels: labels.iter().map(|l| (*l).to_owned()).collect(),
        properties: map(properties),
    })
}

pub fn relationship<const N: usize>(
    id: i64,
    rel_type: &str,
    (start_id, end_id): (i64, i64),
    properties: [(&str, CypherValue); N],
) -> CypherValue {
    CypherValue::Relationship(GraphRelationship {
        id,
        rel_type: rel_type.to_owned(),
        start_id,
        end_id,
        properties: map(properties),
    })
}

/// One-column record.
pub fn row(column: &str, value: CypherValue) -> Record {
    Record::new([(column, value)])
}

/// Record answering a count, update or delete statement.
pub fn count(n: i64) -> Record {
    row("count", CypherValue::Int(n))
}
