//! Object-graph mapper for Cypher databases.
//!
//! Builders turn chained calls into parameterised Cypher, run it through an
//! injected [`GraphClient`], and map the records back into typed entities.
//! Domain types implement [`Model`] and opt into the active-record surface
//! with [`NodeModel`] or [`RelationshipModel`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod config;
pub mod cypher;
pub mod error;
pub mod model;
pub mod query;
pub mod value;

pub use client::{
    clear_client_resolver, resolve_client, set_client_resolver, Connections, GraphClient,
};
pub use config::{settings, Settings};
pub use error::{GrmError, Result};
pub use model::{Entity, EntityId, Model, Node, NodeModel, Relationship, RelationshipModel};
pub use query::{EntityStream, NodeQueryBuilder, RelationshipQueryBuilder};
pub use value::{Properties, Value};

/// Traits and types needed by most callers.
pub mod prelude {
    pub use crate::model::{
        Direction, EdgeLookup, Endpoint, Lookup, Model, NodeModel, Related, Relation,
        RelationSchema, RelationshipModel,
    };
    pub use crate::query::Filterable;
    pub use crate::value::{Properties, Value};
}
