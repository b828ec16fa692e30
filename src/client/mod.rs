//! Seam between the mapper and the graph database driver.
//!
//! The crate never speaks a wire protocol. Everything it needs from a driver is the
//! [`GraphClient`] trait: run one parameterized statement and hand back the records.

use std::collections::BTreeMap;

use crate::value::Value;

/// Records returned by a client and the values they carry.
pub mod record;

/// Process-wide client resolution by connection name.
pub mod resolver;

/// Scripted client used by tests and examples.
pub mod scripted;

pub use record::{
    CypherList, CypherMap, CypherValue, GraphNode, GraphRelationship, Record, SummarizedResult,
};
pub use resolver::{clear_client_resolver, resolve_client, set_client_resolver, Connections};
pub use scripted::{ExecutedStatement, ScriptedClient};

/// Named statement parameters.
pub type Parameters = BTreeMap<String, Value>;

/// Error type drivers report; propagated to callers unchanged.
pub type ClientError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Executes statements against a graph database.
pub trait GraphClient: Send + Sync {
    /// Runs `statement` with `parameters` and returns every record it produced.
    fn run(
        &self,
        statement: &str,
        parameters: &Parameters,
    ) -> std::result::Result<SummarizedResult, ClientError>;
}
