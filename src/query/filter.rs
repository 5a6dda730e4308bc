// Copyright 2023 Remi Bernotavicius

use super::{Field, FieldKind, Value};
use crate::error::{validation, Result};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    #[default]
    Default,
    Insensitive,
}

/// A comparison applied to a single field.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `Equals(Value::Null)` matches null fields.
    Equals(Value),
    NotEquals(Value),
    In(Vec<Value>),
    NotIn(Vec<Value>),
    Lt(Value),
    Lte(Value),
    Gt(Value),
    Gte(Value),
    Contains(String, QueryMode),
    StartsWith(String, QueryMode),
    EndsWith(String, QueryMode),
    IsNull,
    IsNotNull,
    Has(String),
    HasEvery(Vec<String>),
    HasSome(Vec<String>),
    IsEmpty(bool),
}

impl Condition {
    /// Rejects conditions which make no sense for the given field before anything is sent to
    /// the database.
    pub(crate) fn check<F: Field>(&self, field: F) -> Result<()> {
        self.check_against(field.kind(), field.column(), field.is_nullable())
    }

    /// Like [`Self::check`], for any expression holding values of `kind`.
    pub(crate) fn check_against(&self, kind: FieldKind, name: &str, nullable: bool) -> Result<()> {
        let check_value = |value: &Value| {
            if value.is_null() {
                if nullable {
                    return Ok(());
                }
                return Err(validation!("field `{name}` is not nullable"));
            }
            if !kind.accepts(value) {
                return Err(validation!(
                    "value {value} is not valid for field `{name}` of kind {kind:?}"
                ));
            }
            Ok(())
        };

        match self {
            Self::Equals(v) | Self::NotEquals(v) => check_value(v),
            Self::In(values) | Self::NotIn(values) => {
                for v in values {
                    if v.is_null() {
                        return Err(validation!("`in` lists for `{name}` cannot contain null"));
                    }
                    check_value(v)?;
                }
                Ok(())
            }
            Self::Lt(v) | Self::Lte(v) | Self::Gt(v) | Self::Gte(v) => {
                if kind == FieldKind::List {
                    return Err(validation!("field `{name}` does not support range comparisons"));
                }
                if v.is_null() {
                    return Err(validation!("cannot compare `{name}` against null"));
                }
                check_value(v)
            }
            Self::Contains(..) | Self::StartsWith(..) | Self::EndsWith(..) => {
                if kind != FieldKind::Text {
                    return Err(validation!("field `{name}` is not a text field"));
                }
                Ok(())
            }
            Self::IsNull | Self::IsNotNull => {
                if !nullable {
                    return Err(validation!("field `{name}` is not nullable"));
                }
                Ok(())
            }
            Self::Has(_) | Self::HasEvery(_) | Self::HasSome(_) | Self::IsEmpty(_) => {
                if kind != FieldKind::List {
                    return Err(validation!("field `{name}` is not a list field"));
                }
                Ok(())
            }
        }
    }
}

/// A filter over the fields of one model.
#[derive(Debug, Clone, PartialEq)]
pub enum Where<F> {
    Field(F, Condition),
    /// True when empty.
    And(Vec<Where<F>>),
    /// False when empty.
    Or(Vec<Where<F>>),
    Not(Box<Where<F>>),
}

impl<F: Field> Where<F> {
    pub fn field(field: F, condition: Condition) -> Self {
        Self::Field(field, condition)
    }

    pub fn equals(field: F, value: impl Into<Value>) -> Self {
        Self::Field(field, Condition::Equals(value.into()))
    }

    pub fn not_equals(field: F, value: impl Into<Value>) -> Self {
        Self::Field(field, Condition::NotEquals(value.into()))
    }

    pub fn is_in<V: Into<Value>>(field: F, values: impl IntoIterator<Item = V>) -> Self {
        Self::Field(field, Condition::In(values.into_iter().map(Into::into).collect()))
    }

    pub fn not_in<V: Into<Value>>(field: F, values: impl IntoIterator<Item = V>) -> Self {
        Self::Field(
            field,
            Condition::NotIn(values.into_iter().map(Into::into).collect()),
        )
    }

    pub fn lt(field: F, value: impl Into<Value>) -> Self {
        Self::Field(field, Condition::Lt(value.into()))
    }

    pub fn lte(field: F, value: impl Into<Value>) -> Self {
        Self::Field(field, Condition::Lte(value.into()))
    }

    pub fn gt(field: F, value: impl Into<Value>) -> Self {
        Self::Field(field, Condition::Gt(value.into()))
    }

    pub fn gte(field: F, value: impl Into<Value>) -> Self {
        Self::Field(field, Condition::Gte(value.into()))
    }

    pub fn contains(field: F, pattern: impl Into<String>, mode: QueryMode) -> Self {
        Self::Field(field, Condition::Contains(pattern.into(), mode))
    }

    pub fn starts_with(field: F, pattern: impl Into<String>, mode: QueryMode) -> Self {
        Self::Field(field, Condition::StartsWith(pattern.into(), mode))
    }

    pub fn ends_with(field: F, pattern: impl Into<String>, mode: QueryMode) -> Self {
        Self::Field(field, Condition::EndsWith(pattern.into(), mode))
    }

    pub fn is_null(field: F) -> Self {
        Self::Field(field, Condition::IsNull)
    }

    pub fn is_not_null(field: F) -> Self {
        Self::Field(field, Condition::IsNotNull)
    }

    pub fn has(field: F, tag: impl Into<String>) -> Self {
        Self::Field(field, Condition::Has(tag.into()))
    }

    pub fn has_every<S: Into<String>>(field: F, tags: impl IntoIterator<Item = S>) -> Self {
        Self::Field(
            field,
            Condition::HasEvery(tags.into_iter().map(Into::into).collect()),
        )
    }

    pub fn has_some<S: Into<String>>(field: F, tags: impl IntoIterator<Item = S>) -> Self {
        Self::Field(
            field,
            Condition::HasSome(tags.into_iter().map(Into::into).collect()),
        )
    }

    pub fn is_empty(field: F, empty: bool) -> Self {
        Self::Field(field, Condition::IsEmpty(empty))
    }

    pub fn and(self, other: Self) -> Self {
        match self {
            Self::And(mut all) => {
                all.push(other);
                Self::And(all)
            }
            this => Self::And(vec![this, other]),
        }
    }

    pub fn or(self, other: Self) -> Self {
        match self {
            Self::Or(mut any) => {
                any.push(other);
                Self::Or(any)
            }
            this => Self::Or(vec![this, other]),
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// Validates every condition in the tree.
    pub(crate) fn check(&self) -> Result<()> {
        match self {
            Self::Field(field, condition) => condition.check(*field),
            Self::And(all) | Self::Or(all) => all.iter().try_for_each(Self::check),
            Self::Not(inner) => inner.check(),
        }
    }
}

#[test]
fn condition_checks() {
    use crate::database::models::RecipeField;

    assert!(Condition::Contains("bread".into(), QueryMode::Insensitive)
        .check(RecipeField::Name)
        .is_ok());
    assert!(Condition::Contains("bread".into(), QueryMode::Default)
        .check(RecipeField::PrepTimeMinutes)
        .is_err());
    assert!(Condition::Has("vegan".into()).check(RecipeField::Tags).is_ok());
    assert!(Condition::Has("vegan".into()).check(RecipeField::Name).is_err());
    assert!(Condition::IsNull.check(RecipeField::CategoryId).is_ok());
    assert!(Condition::IsNull.check(RecipeField::Instructions).is_err());
    assert!(Condition::Equals(Value::Null)
        .check(RecipeField::Name)
        .is_err());
    assert!(Condition::Gt(Value::from("x"))
        .check(RecipeField::CookTimeMinutes)
        .is_err());
    assert!(Condition::In(vec![Value::Int(1), Value::Null])
        .check(RecipeField::Id)
        .is_err());
}

#[test]
fn where_combinators() {
    use crate::database::models::CategoryField;

    let filter = Where::equals(CategoryField::Name, "bread")
        .and(Where::is_null(CategoryField::Description))
        .and(Where::gt(CategoryField::Id, 3));
    match &filter {
        Where::And(all) => assert_eq!(all.len(), 3),
        other => panic!("unexpected filter {other:?}"),
    }
    assert!(filter.check().is_ok());
    assert!(Where::has(CategoryField::Name, "x").not().check().is_err());
}
