//! Typed entities and the active-record facade.
//!
//! A domain type implements [`Model`] to wrap an [`Entity`]; node types add
//! [`NodeModel`] and relationship types [`RelationshipModel`] to get the
//! query, creation and relation-loading surface. [`impl_model!`] writes the
//! wrapping boilerplate for newtypes over `Entity`.
//!
//! [`impl_model!`]: crate::impl_model

pub mod entity;
pub mod facade;
pub mod relation;

use serde::Serialize;

use crate::error::{GrmError, Result};
use crate::value::Value;

pub use entity::{Entity, EntityId};
pub use facade::{EdgeLookup, Endpoint, Lookup, NodeModel, RelationshipModel};
pub use relation::{Direction, Related, Relation, RelationSchema};

/// Domain type backed by an [`Entity`].
pub trait Model: Sized {
    /// Canonical label or relationship type; the bare type name when unset.
    const LABEL: Option<&'static str> = None;
    /// Connection used by the facade; the configured default when unset.
    const CONNECTION: Option<&'static str> = None;
    /// Allowed property names; any name when unset.
    const FIELDS: Option<&'static [&'static str]> = None;

    /// Wraps an entity read from or written to the database.
    fn from_entity(entity: Entity) -> Self;

    /// Borrows the wrapped entity.
    fn entity(&self) -> &Entity;

    /// Mutably borrows the wrapped entity.
    fn entity_mut(&mut self) -> &mut Entity;

    /// Unwraps the entity.
    fn into_entity(self) -> Entity;

    /// Canonical label of the type.
    fn label() -> String {
        Self::LABEL
            .map(str::to_owned)
            .unwrap_or_else(|| short_type_name::<Self>().to_owned())
    }

    /// Database identifier, absent until persisted.
    fn id(&self) -> Option<EntityId> {
        self.entity().id()
    }

    /// Reads one property.
    fn property(&self, key: &str) -> Option<&Value> {
        self.entity().get(key)
    }

    /// Returns true if the property is set.
    fn has_property(&self, key: &str) -> bool {
        self.entity().has(key)
    }

    /// Writes one property, returning the previous value.
    ///
    /// Rejects `id` and, when [`FIELDS`](Self::FIELDS) is set, undeclared names.
    fn set_property(
        &mut self,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<Option<Value>> {
        let key = key.into();
        check_field::<Self>(&key)?;
        self.entity_mut().set(key, value)
    }
}

pub(crate) fn check_field<M: Model>(key: &str) -> Result<()> {
    match M::FIELDS {
        Some(fields) if !fields.contains(&key) => Err(GrmError::invalid(format!(
            "property '{key}' is not declared on '{}'",
            M::label()
        ))),
        _ => Ok(()),
    }
}

/// Last path segment of the type name, generics stripped.
pub(crate) fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Implements [`Model`] for a tuple newtype over [`Entity`].
///
/// Associated constants may be given in braces.
///
/// ```
/// use grm::model::{Entity, Model};
///
/// struct Person(Entity);
/// grm::impl_model!(Person { const LABEL: Option<&'static str> = Some("Human"); });
///
/// assert_eq!(Person::label(), "Human");
/// ```
#[macro_export]
macro_rules! impl_model {
    ($ty:ty { $($body:tt)* }) => {
        impl $crate::model::Model for $ty {
            $($body)*

            fn from_entity(entity: $crate::model::Entity) -> Self {
                Self(entity)
            }

            fn entity(&self) -> &$crate::model::Entity {
                &self.0
            }

            fn entity_mut(&mut self) -> &mut $crate::model::Entity {
                &mut self.0
            }

            fn into_entity(self) -> $crate::model::Entity {
                self.0
            }
        }
    };
    ($ty:ty) => {
        $crate::impl_model!($ty {});
    };
}

/// Untyped node, as returned for relations and label-free queries.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Node(Entity);

/// Untyped relationship.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Relationship(Entity);

impl_model!(Node);
impl_model!(Relationship);

impl Node {
    /// Labels of the node.
    pub fn labels(&self) -> &[String] {
        self.0.labels()
    }
}

impl Relationship {
    /// Relationship type.
    pub fn rel_type(&self) -> Option<&str> {
        self.0.label()
    }

    /// Start and end node ids, when read as a whole element.
    pub fn endpoints(&self) -> Option<(EntityId, EntityId)> {
        self.0.endpoints()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::props;

    struct Account(Entity);
    impl_model!(Account {
        const FIELDS: Option<&'static [&'static str]> = Some(&["email", "plan"]);
    });

    mod nested {
        pub struct Wrapper<T>(pub T);
    }

    #[test]
    fn label_defaults_to_bare_type_name() {
        assert_eq!(Account::label(), "Account");
        assert_eq!(Node::label(), "Node");
        assert_eq!(short_type_name::<nested::Wrapper<Vec<u8>>>(), "Wrapper");
    }

    #[test]
    fn field_list_restricts_properties() {
        let entity = Entity::new(props! { "email" => "a@b.c" }).unwrap();
        let mut account = Account::from_entity(entity);
        assert!(account.set_property("plan", "pro").unwrap().is_none());
        let err = account.set_property("nickname", "x").unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid argument: property 'nickname' is not declared on 'Account'"
        );
        assert!(account.set_property("id", 1).is_err());
        assert_eq!(account.property("plan"), Some(&Value::from("pro")));
        assert!(!account.has_property("nickname"));
    }
}
