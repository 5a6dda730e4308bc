// Copyright 2023 Remi Bernotavicius

use super::{Condition, Field, Value, Where};
use crate::error::{validation, Result};
use derive_more::Display;

#[derive(Debug, Display, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SortOrder {
    #[default]
    #[display("ASC")]
    Asc,
    #[display("DESC")]
    Desc,
}

impl SortOrder {
    pub fn reversed(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NullsOrder {
    #[display("NULLS FIRST")]
    First,
    #[display("NULLS LAST")]
    Last,
}

impl NullsOrder {
    fn reversed(self) -> Self {
        match self {
            Self::First => Self::Last,
            Self::Last => Self::First,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBy<F> {
    pub field: F,
    pub direction: SortOrder,
    pub nulls: Option<NullsOrder>,
}

impl<F: Field> OrderBy<F> {
    pub fn asc(field: F) -> Self {
        Self {
            field,
            direction: SortOrder::Asc,
            nulls: None,
        }
    }

    pub fn desc(field: F) -> Self {
        Self {
            field,
            direction: SortOrder::Desc,
            nulls: None,
        }
    }

    pub fn nulls_first(mut self) -> Self {
        self.nulls = Some(NullsOrder::First);
        self
    }

    pub fn nulls_last(mut self) -> Self {
        self.nulls = Some(NullsOrder::Last);
        self
    }

    /// Where nulls end up. SQLite sorts them as the smallest value unless told otherwise.
    pub fn placement(&self) -> NullsOrder {
        self.nulls.unwrap_or(match self.direction {
            SortOrder::Asc => NullsOrder::First,
            SortOrder::Desc => NullsOrder::Last,
        })
    }

    /// The same ordering walked from the other end.
    pub fn reversed(&self) -> Self {
        Self {
            field: self.field,
            direction: self.direction.reversed(),
            nulls: self
                .field
                .is_nullable()
                .then(|| self.placement().reversed()),
        }
    }

    pub(crate) fn check(&self) -> Result<()> {
        let name = self.field.column();
        if !self.field.kind().is_orderable() {
            return Err(validation!("cannot order by list field `{name}`"));
        }
        if self.nulls.is_some() && !self.field.is_nullable() {
            return Err(validation!(
                "null ordering given for field `{name}` which is not nullable"
            ));
        }
        Ok(())
    }

    /// Matches the rows which sort strictly after a row holding `value` in this field.
    pub(crate) fn after(&self, value: Value) -> Where<F> {
        let field = self.field;
        match (value, self.placement()) {
            (Value::Null, NullsOrder::First) => Where::Field(field, Condition::IsNotNull),
            (Value::Null, NullsOrder::Last) => Where::Or(vec![]),
            (value, placement) => {
                let beyond = match self.direction {
                    SortOrder::Asc => Where::Field(field, Condition::Gt(value)),
                    SortOrder::Desc => Where::Field(field, Condition::Lt(value)),
                };
                if placement == NullsOrder::Last && field.is_nullable() {
                    beyond.or(Where::Field(field, Condition::IsNull))
                } else {
                    beyond
                }
            }
        }
    }
}

#[test]
fn reversed_ordering_swaps_nulls() {
    use crate::database::models::RecipeField;

    let order = OrderBy::asc(RecipeField::CategoryId);
    assert_eq!(order.placement(), NullsOrder::First);
    let reversed = order.reversed();
    assert_eq!(reversed.direction, SortOrder::Desc);
    assert_eq!(reversed.placement(), NullsOrder::Last);
    assert_eq!(reversed.reversed().placement(), NullsOrder::First);

    let by_name = OrderBy::asc(RecipeField::Name).reversed();
    assert_eq!(by_name.nulls, None);
    assert!(by_name.check().is_ok());
}

#[test]
fn ordering_checks() {
    use crate::database::models::RecipeField;

    assert!(OrderBy::asc(RecipeField::Tags).check().is_err());
    assert!(OrderBy::asc(RecipeField::Name).nulls_last().check().is_err());
    assert!(OrderBy::desc(RecipeField::CategoryId)
        .nulls_first()
        .check()
        .is_ok());
}

#[test]
fn after_cursor_value() {
    use crate::database::models::RecipeField;

    let order = OrderBy::asc(RecipeField::CategoryId);
    assert_eq!(
        order.after(Value::Null),
        Where::Field(RecipeField::CategoryId, Condition::IsNotNull)
    );
    assert_eq!(
        order.nulls_last().after(Value::Int(4)),
        Where::Or(vec![
            Where::Field(RecipeField::CategoryId, Condition::Gt(Value::Int(4))),
            Where::Field(RecipeField::CategoryId, Condition::IsNull),
        ])
    );
    assert_eq!(
        OrderBy::desc(RecipeField::Name).after(Value::from("m")),
        Where::Field(RecipeField::Name, Condition::Lt(Value::from("m")))
    );
}
