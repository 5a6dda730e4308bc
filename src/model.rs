// Copyright 2023 Remi Bernotavicius

use crate::error::Result;
use crate::query::{Field, Value, Where};
use diesel::sqlite::Sqlite;
use diesel::QueryableByName;
use std::fmt;

/// A table the repository layer knows how to read and write.
pub trait Model: QueryableByName<Sqlite> + Clone + fmt::Debug + Send + 'static {
    /// The name used in errors and omit rules, e.g. `UnitQuantity`.
    const NAME: &'static str;
    const TABLE: &'static str;
    const ID: Self::Field;
    const CREATED_AT: Self::Field;
    const UPDATED_AT: Self::Field;

    type Field: Field;
    type Unique: Unique<Self>;
    type Create: Input<Self>;
    type Update: Input<Self>;

    fn id(&self) -> i32;

    fn get(&self, field: Self::Field) -> Value;

    /// Application-level checks run before a row is inserted.
    fn validate_create(_input: &Self::Create) -> Result<()> {
        Ok(())
    }

    /// Application-level checks run against a row about to be updated.
    fn validate_update(_existing: &Self, _input: &Self::Update) -> Result<()> {
        Ok(())
    }

    /// Whether `validate_update` needs the existing rows at all. Updates which don't touch the
    /// validated fields skip loading them.
    fn update_requires_validation(_input: &Self::Update) -> bool {
        false
    }
}

/// A key identifying at most one row.
pub trait Unique<M: Model>: Clone + fmt::Debug {
    fn to_where(&self) -> Where<M::Field>;
}

/// Column assignments for an insert or an update.
pub trait Input<M: Model> {
    fn assignments(&self) -> Vec<(M::Field, Value)>;
}

/// Records an assignment for an update field which was given a value.
pub(crate) fn changed<F, T>(out: &mut Vec<(F, Value)>, field: F, value: &Option<T>)
where
    T: Clone + Into<Value>,
{
    if let Some(value) = value {
        out.push((field, value.clone().into()));
    }
}
