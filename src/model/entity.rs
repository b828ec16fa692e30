use std::collections::{BTreeMap, BTreeSet};

use serde::ser::{Serialize, SerializeMap, Serializer};
use smallvec::SmallVec;

use crate::error::{GrmError, Result};
use crate::value::{Properties, Value};

use super::relation::Related;

/// Database identifier of a node or relationship.
pub type EntityId = i64;

/// Label list; most nodes carry one or two labels and relationships one type.
pub type Labels = SmallVec<[String; 2]>;

/// Key that can never be written as an ordinary property.
pub const ID_KEY: &str = "id";

/// Identity, labels and properties of one graph element.
///
/// The serialized view is the property map without hidden keys.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Entity {
    id: Option<EntityId>,
    labels: Labels,
    properties: Properties,
    hidden: BTreeSet<String>,
    endpoints: Option<(EntityId, EntityId)>,
    relations: BTreeMap<String, Related>,
}

impl Entity {
    /// Creates an unpersisted entity with the given properties.
    ///
    /// Fails if the map contains an `id` key.
    pub fn new(properties: Properties) -> Result<Self> {
        reject_id_key(&properties)?;
        Ok(Self {
            properties,
            ..Self::default()
        })
    }

    /// Assembles an entity read back from the database.
    pub fn from_parts<I, L>(id: Option<EntityId>, labels: I, properties: Properties) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<String>,
    {
        Self {
            id,
            labels: labels.into_iter().map(Into::into).collect(),
            properties,
            ..Self::default()
        }
    }

    /// Database identifier, absent until persisted.
    pub fn id(&self) -> Option<EntityId> {
        self.id
    }

    /// Returns true once the entity carries an identifier.
    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    /// Sets the identifier; an identifier is never reassigned.
    pub fn assign_id(&mut self, id: EntityId) -> Result<()> {
        if let Some(existing) = self.id {
            return Err(GrmError::invalid(format!(
                "entity already has id {existing}; ids are immutable"
            )));
        }
        self.id = Some(id);
        Ok(())
    }

    /// Labels of a node, or the single type of a relationship.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// First label or relationship type.
    pub fn label(&self) -> Option<&str> {
        self.labels.first().map(String::as_str)
    }

    /// Adds a label unless already present.
    pub fn add_label(&mut self, label: impl Into<String>) {
        let label = label.into();
        if !self.labels.contains(&label) {
            self.labels.push(label);
        }
    }

    /// All properties, hidden ones included.
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// Reads one property.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// Returns true if the property is set.
    pub fn has(&self, key: &str) -> bool {
        self.properties.contains_key(key)
    }

    /// Writes one property, returning the previous value.
    ///
    /// The key `id` is read-only.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Result<Option<Value>> {
        let key = key.into();
        if key == ID_KEY {
            return Err(read_only_id());
        }
        Ok(self.properties.insert(key, value.into()))
    }

    /// Removes one property.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.properties.remove(key)
    }

    /// Excludes keys from the serialized view.
    pub fn hide<I, K>(&mut self, keys: I)
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.hidden.extend(keys.into_iter().map(Into::into));
    }

    /// Re-includes previously hidden keys.
    pub fn show<I, K>(&mut self, keys: I)
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        for key in keys {
            self.hidden.remove(key.as_ref());
        }
    }

    /// Returns true if `key` is excluded from the serialized view.
    pub fn is_hidden(&self, key: &str) -> bool {
        self.hidden.contains(key)
    }

    /// Properties that are not hidden.
    pub fn visible_properties(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.properties
            .iter()
            .filter(|(key, _)| !self.hidden.contains(key.as_str()))
            .map(|(key, value)| (key.as_str(), value))
    }

    /// JSON object of the visible properties.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Start and end node ids of a relationship read as a whole element.
    pub fn endpoints(&self) -> Option<(EntityId, EntityId)> {
        self.endpoints
    }

    pub(crate) fn set_endpoints(&mut self, start: EntityId, end: EntityId) {
        self.endpoints = Some((start, end));
    }

    pub(crate) fn cached_relation(&self, name: &str) -> Option<&Related> {
        self.relations.get(name)
    }

    pub(crate) fn is_relation_cached(&self, name: &str) -> bool {
        self.relations.contains_key(name)
    }

    pub(crate) fn cache_relation(&mut self, name: impl Into<String>, related: Related) {
        self.relations.insert(name.into(), related);
    }
}

impl Serialize for Entity {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let visible: Vec<_> = self.visible_properties().collect();
        let mut map = serializer.serialize_map(Some(visible.len()))?;
        for (key, value) in visible {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

pub(crate) fn reject_id_key(properties: &Properties) -> Result<()> {
    if properties.contains_key(ID_KEY) {
        return Err(read_only_id());
    }
    Ok(())
}

fn read_only_id() -> GrmError {
    GrmError::invalid("the \"id\" property is read-only")
}
