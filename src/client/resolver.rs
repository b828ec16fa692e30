use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use tracing::{debug, trace};

use super::GraphClient;
use crate::error::{GrmError, Result};

type Resolver = Arc<dyn Fn(&str) -> Option<Arc<dyn GraphClient>> + Send + Sync>;

static RESOLVER: OnceLock<RwLock<Option<Resolver>>> = OnceLock::new();

fn slot() -> &'static RwLock<Option<Resolver>> {
    RESOLVER.get_or_init(|| RwLock::new(None))
}

/// Installs the process-wide resolver mapping a connection name to a client.
///
/// Returning `None` from the resolver reports the connection as unknown.
pub fn set_client_resolver<F>(resolver: F)
where
    F: Fn(&str) -> Option<Arc<dyn GraphClient>> + Send + Sync + 'static,
{
    debug!("client resolver installed");
    *slot().write() = Some(Arc::new(resolver));
}

/// Removes the process-wide resolver.
pub fn clear_client_resolver() {
    *slot().write() = None;
}

/// Resolves the client for `connection`.
pub fn resolve_client(connection: &str) -> Result<Arc<dyn GraphClient>> {
    // Clone out of the lock so the resolver may itself touch the registry.
    let resolver = slot()
        .read()
        .clone()
        .ok_or_else(|| GrmError::configuration("client resolver is not set"))?;
    trace!(connection, "resolving client");
    resolver(connection).ok_or_else(|| {
        GrmError::configuration(format!("no client registered for connection '{connection}'"))
    })
}

/// Named client registry that can act as the process-wide resolver.
#[derive(Clone, Default)]
pub struct Connections {
    clients: Arc<RwLock<HashMap<String, Arc<dyn GraphClient>>>>,
}

impl Connections {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `client` under `name`, replacing any previous entry.
    pub fn register(&self, name: impl Into<String>, client: Arc<dyn GraphClient>) {
        self.clients.write().insert(name.into(), client);
    }

    /// Removes the client registered under `name`.
    pub fn remove(&self, name: &str) -> Option<Arc<dyn GraphClient>> {
        self.clients.write().remove(name)
    }

    /// Looks up the client registered under `name`.
    pub fn get(&self, name: &str) -> Option<Arc<dyn GraphClient>> {
        self.clients.read().get(name).cloned()
    }

    /// Installs this registry as the process-wide resolver.
    ///
    /// Later registrations stay visible; the resolver shares the registry.
    pub fn install(&self) {
        let registry = self.clone();
        set_client_resolver(move |name| registry.get(name));
    }
}

impl fmt::Debug for Connections {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let clients = self.clients.read();
        let mut names: Vec<&str> = clients.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("Connections").field("names", &names).finish()
    }
}
