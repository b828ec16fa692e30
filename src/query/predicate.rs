//! Boolean filter trees built from chained `where` calls.
//!
//! Every call appends to the root using one merge rule: an empty root takes
//! the new predicate, a root that already is the matching junction gains one
//! more child, anything else is wrapped together with the new predicate.
//! Invalid operator tokens are remembered and reported when the tree is
//! converted, so a chain never has to be interrupted by a `?`.

use std::fmt;
use std::sync::Arc;

use crate::cypher::{property_ref, Operator, Predicate};
use crate::error::{GrmError, Result};
use crate::value::Value;

/// Field template matching an element by database id.
pub const ID_FIELD: &str = "id(%s)";

/// Deferred filter group, evaluated against a fresh [`Conditions`].
pub type NestedFilter = Arc<dyn Fn(&mut Conditions) + Send + Sync>;

/// Node of an unrendered filter tree.
#[derive(Clone)]
pub enum WherePredicate {
    /// `field <operator> value`.
    Comparison {
        /// Property name, or a function template such as `id(%s)`.
        field: String,
        /// Parsed operator.
        operator: Operator,
        /// Right-hand side.
        value: Value,
    },
    /// Group built lazily by a closure.
    Nested(NestedFilter),
    /// Conjunction.
    And(Vec<WherePredicate>),
    /// Disjunction.
    Or(Vec<WherePredicate>),
    /// Negation.
    Not(Box<WherePredicate>),
}

impl fmt::Debug for WherePredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WherePredicate::Comparison {
                field,
                operator,
                value,
            } => f
                .debug_struct("Comparison")
                .field("field", field)
                .field("operator", operator)
                .field("value", value)
                .finish(),
            WherePredicate::Nested(_) => f.write_str("Nested(..)"),
            WherePredicate::And(children) => f.debug_tuple("And").field(children).finish(),
            WherePredicate::Or(children) => f.debug_tuple("Or").field(children).finish(),
            WherePredicate::Not(inner) => f.debug_tuple("Not").field(inner).finish(),
        }
    }
}

impl PartialEq for WherePredicate {
    fn eq(&self, other: &Self) -> bool {
        use WherePredicate::*;
        match (self, other) {
            (
                Comparison {
                    field: lf,
                    operator: lo,
                    value: lv,
                },
                Comparison {
                    field: rf,
                    operator: ro,
                    value: rv,
                },
            ) => lf == rf && lo == ro && lv == rv,
            (Nested(l), Nested(r)) => Arc::ptr_eq(l, r),
            (And(l), And(r)) | (Or(l), Or(r)) => l == r,
            (Not(l), Not(r)) => l == r,
            _ => false,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Junction {
    And,
    Or,
}

/// Filter tree under construction plus the first operator error seen.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Conditions {
    root: Option<WherePredicate>,
    error: Option<String>,
}

impl Conditions {
    /// Creates an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current root, if any predicate was added.
    pub fn root(&self) -> Option<&WherePredicate> {
        self.root.as_ref()
    }

    /// Returns true when no predicate was added.
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Drops the tree and any recorded error.
    pub fn reset(&mut self) {
        self.root = None;
        self.error = None;
    }

    /// Converts the tree for an element bound to `alias`.
    ///
    /// Fails with [`GrmError::UnsupportedOperator`] if any call in the chain,
    /// including calls made inside nested groups, used an unknown operator.
    pub fn to_predicate(&self, alias: &str) -> Result<Option<Predicate>> {
        if let Some(token) = &self.error {
            return Err(GrmError::UnsupportedOperator(token.clone()));
        }
        self.root
            .as_ref()
            .map(|root| convert(root, alias))
            .transpose()
    }

    fn append(&mut self, junction: Junction, predicate: WherePredicate) {
        self.root = Some(match (self.root.take(), junction) {
            (None, _) => predicate,
            (Some(WherePredicate::And(mut children)), Junction::And) => {
                children.push(predicate);
                WherePredicate::And(children)
            }
            (Some(WherePredicate::Or(mut children)), Junction::Or) => {
                children.push(predicate);
                WherePredicate::Or(children)
            }
            (Some(existing), Junction::And) => WherePredicate::And(vec![existing, predicate]),
            (Some(existing), Junction::Or) => WherePredicate::Or(vec![existing, predicate]),
        });
    }

    fn append_comparison(
        &mut self,
        junction: Junction,
        negate: bool,
        field: String,
        operator: &str,
        value: Value,
    ) {
        match Operator::parse(operator) {
            Some(operator) => {
                let comparison = WherePredicate::Comparison {
                    field,
                    operator,
                    value,
                };
                self.append(junction, negated(negate, comparison));
            }
            None => self.record_error(operator),
        }
    }

    fn append_nested(&mut self, junction: Junction, negate: bool, build: NestedFilter) {
        self.append(junction, negated(negate, WherePredicate::Nested(build)));
    }

    fn record_error(&mut self, token: &str) {
        if self.error.is_none() {
            self.error = Some(token.to_owned());
        }
    }
}

fn negated(negate: bool, predicate: WherePredicate) -> WherePredicate {
    if negate {
        WherePredicate::Not(Box::new(predicate))
    } else {
        predicate
    }
}

fn convert(predicate: &WherePredicate, alias: &str) -> Result<Predicate> {
    Ok(match predicate {
        WherePredicate::Comparison {
            field,
            operator,
            value,
        } => Predicate::Comparison {
            lhs: left_hand_side(field, alias),
            operator: *operator,
            value: value.clone(),
        },
        WherePredicate::Nested(build) => {
            let mut scoped = Conditions::new();
            build(&mut scoped);
            scoped
                .to_predicate(alias)?
                .unwrap_or_else(|| Predicate::And(Vec::new()))
        }
        WherePredicate::And(children) => Predicate::And(convert_all(children, alias)?),
        WherePredicate::Or(children) => Predicate::Or(convert_all(children, alias)?),
        WherePredicate::Not(inner) => Predicate::Not(Box::new(convert(inner, alias)?)),
    })
}

fn convert_all(children: &[WherePredicate], alias: &str) -> Result<Vec<Predicate>> {
    children.iter().map(|child| convert(child, alias)).collect()
}

fn left_hand_side(field: &str, alias: &str) -> String {
    if field.contains('(') {
        field.replace("%s", alias)
    } else {
        property_ref(alias, field)
    }
}

/// Chainable filter methods shared by every builder that owns a [`Conditions`].
///
/// `where` is a keyword, so the plain equality filter is spelled `r#where`.
pub trait Filterable {
    /// Borrows the filter tree.
    fn conditions(&self) -> &Conditions;

    /// Mutably borrows the filter tree.
    fn conditions_mut(&mut self) -> &mut Conditions;

    /// AND-appends `field = value`.
    fn r#where(&mut self, field: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.where_op(field, "=", value)
    }

    /// AND-appends `field <operator> value`.
    fn where_op(
        &mut self,
        field: impl Into<String>,
        operator: &str,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.conditions_mut().append_comparison(
            Junction::And,
            false,
            field.into(),
            operator,
            value.into(),
        );
        self
    }

    /// AND-appends a group built by `build` on a fresh tree.
    fn where_nested<F>(&mut self, build: F) -> &mut Self
    where
        F: Fn(&mut Conditions) + Send + Sync + 'static,
    {
        self.conditions_mut()
            .append_nested(Junction::And, false, Arc::new(build));
        self
    }

    /// OR-appends `field = value`.
    fn or_where(&mut self, field: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.or_where_op(field, "=", value)
    }

    /// OR-appends `field <operator> value`.
    fn or_where_op(
        &mut self,
        field: impl Into<String>,
        operator: &str,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.conditions_mut().append_comparison(
            Junction::Or,
            false,
            field.into(),
            operator,
            value.into(),
        );
        self
    }

    /// OR-appends a nested group.
    fn or_where_nested<F>(&mut self, build: F) -> &mut Self
    where
        F: Fn(&mut Conditions) + Send + Sync + 'static,
    {
        self.conditions_mut()
            .append_nested(Junction::Or, false, Arc::new(build));
        self
    }

    /// AND-appends `NOT (field = value)`.
    fn where_not(&mut self, field: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.where_not_op(field, "=", value)
    }

    /// AND-appends `NOT (field <operator> value)`.
    fn where_not_op(
        &mut self,
        field: impl Into<String>,
        operator: &str,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.conditions_mut().append_comparison(
            Junction::And,
            true,
            field.into(),
            operator,
            value.into(),
        );
        self
    }

    /// AND-appends a negated nested group.
    fn where_not_nested<F>(&mut self, build: F) -> &mut Self
    where
        F: Fn(&mut Conditions) + Send + Sync + 'static,
    {
        self.conditions_mut()
            .append_nested(Junction::And, true, Arc::new(build));
        self
    }

    /// OR-appends `NOT (field = value)`.
    fn or_where_not(&mut self, field: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.or_where_not_op(field, "=", value)
    }

    /// OR-appends `NOT (field <operator> value)`.
    fn or_where_not_op(
        &mut self,
        field: impl Into<String>,
        operator: &str,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.conditions_mut().append_comparison(
            Junction::Or,
            true,
            field.into(),
            operator,
            value.into(),
        );
        self
    }

    /// OR-appends a negated nested group.
    fn or_where_not_nested<F>(&mut self, build: F) -> &mut Self
    where
        F: Fn(&mut Conditions) + Send + Sync + 'static,
    {
        self.conditions_mut()
            .append_nested(Junction::Or, true, Arc::new(build));
        self
    }

    /// AND-appends `id(alias) = id`.
    fn where_id(&mut self, id: i64) -> &mut Self {
        self.where_op(ID_FIELD, "=", id)
    }

    /// AND-appends `id(alias) <operator> id`.
    fn where_id_op(&mut self, operator: &str, id: i64) -> &mut Self {
        self.where_op(ID_FIELD, operator, id)
    }
}

impl Filterable for Conditions {
    fn conditions(&self) -> &Conditions {
        self
    }

    fn conditions_mut(&mut self) -> &mut Conditions {
        self
    }
}
