//! Node and relationship query builders.
//!
//! Builders collect state through chained calls, render one statement per
//! terminal operation and run it through the client selected by their
//! [`Target`]. Results come back as [`EntityStream`]s or scalar counts.

pub mod mapper;
pub mod node;
pub mod predicate;
pub mod relationship;
pub mod stream;

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use crate::client::{resolve_client, CypherValue, GraphClient, SummarizedResult};
use crate::config::settings;
use crate::cypher::CypherQuery;
use crate::error::{GrmError, Result};

pub use mapper::{ElementKind, RecordMapper, RecordShape};
pub use node::NodeQueryBuilder;
pub use predicate::{Conditions, Filterable, WherePredicate};
pub use relationship::RelationshipQueryBuilder;
pub use stream::EntityStream;

/// Column returned by count, update and delete statements.
pub const COUNT_COLUMN: &str = "count";

/// Where a builder sends its statements.
///
/// The target is not query state: it survives `reset()`.
#[derive(Clone, Default)]
pub enum Target {
    /// The connection named by the process-wide settings.
    #[default]
    Default,
    /// A connection resolved by name through the client resolver.
    Connection(String),
    /// A client injected directly, bypassing the resolver.
    Client(Arc<dyn GraphClient>),
}

impl Target {
    /// Target for an optional connection name.
    pub fn from_connection(name: Option<&str>) -> Self {
        name.map_or(Target::Default, |name| Target::Connection(name.to_owned()))
    }

    fn client(&self) -> Result<Arc<dyn GraphClient>> {
        match self {
            Target::Client(client) => Ok(Arc::clone(client)),
            Target::Connection(name) => resolve_client(name),
            Target::Default => resolve_client(&settings().default_connection),
        }
    }

    /// Runs `query` and returns every record.
    pub fn execute(&self, query: &CypherQuery) -> Result<SummarizedResult> {
        let statement = query.render();
        let client = self.client()?;
        let parameters = statement.parameters().len();
        if settings().log_statements {
            info!(via = ?self, parameters, %statement, "running statement");
        } else {
            debug!(via = ?self, parameters, %statement, "running statement");
        }
        let result = client
            .run(statement.query_string(), statement.parameters())
            .map_err(GrmError::Client)?;
        debug!(records = result.len(), "statement finished");
        Ok(result)
    }

    /// Runs an aggregate `query` and reads its `count` column.
    pub fn execute_count(&self, query: &CypherQuery) -> Result<i64> {
        let result = self.execute(query)?;
        match result.first()?.get(COUNT_COLUMN)? {
            CypherValue::Int(count) => Ok(*count),
            other => Err(GrmError::unexpected(COUNT_COLUMN, "integer", other.kind())),
        }
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Default => f.write_str("Default"),
            Target::Connection(name) => f.debug_tuple("Connection").field(name).finish(),
            Target::Client(_) => f.write_str("Client(..)"),
        }
    }
}
