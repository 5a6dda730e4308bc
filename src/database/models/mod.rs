// Copyright 2023 Remi Bernotavicius

use crate::model::Model;
use crate::query::{Field as _, Value};
use diesel::backend::Backend;
use diesel::deserialize::{self, FromSql, FromSqlRow};
use diesel::expression::AsExpression;
use diesel::serialize::{self, IsNull, Output, ToSql};
use diesel::sql_types::Text;
use diesel::sqlite::Sqlite;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr as _;

mod category;
mod ingredient;
mod ingredient_category;
mod recipe;
mod unit_of_measure;
mod unit_quantity;
mod user;

pub use category::{Category, CategoryCreate, CategoryField, CategoryId, CategoryUnique, CategoryUpdate};
pub use ingredient::{
    Ingredient, IngredientCreate, IngredientField, IngredientId, IngredientUnique, IngredientUpdate,
};
pub use ingredient_category::{
    IngredientCategory, IngredientCategoryCreate, IngredientCategoryField, IngredientCategoryId,
    IngredientCategoryUnique, IngredientCategoryUpdate,
};
pub use recipe::{Recipe, RecipeCreate, RecipeField, RecipeId, RecipeUnique, RecipeUpdate};
pub use unit_of_measure::{
    UnitOfMeasure, UnitOfMeasureCreate, UnitOfMeasureField, UnitOfMeasureId, UnitOfMeasureUnique,
    UnitOfMeasureUpdate, UnitType, UnitTypeMapping,
};
pub use unit_quantity::{
    UnitQuantity, UnitQuantityCreate, UnitQuantityField, UnitQuantityId, UnitQuantityUnique,
    UnitQuantityUpdate,
};
pub use user::{hash_password, verify_password, User, UserCreate, UserField, UserId, UserUnique, UserUpdate};

macro_rules! id_type {
    ($name:ident) => {
        #[derive(
            diesel_derive_newtype::DieselNewType,
            derive_more::Display,
            serde::Serialize,
            serde::Deserialize,
            Debug,
            Hash,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Copy,
            Clone,
        )]
        #[serde(transparent)]
        pub struct $name(i32);

        impl $name {
            pub fn new(id: i32) -> Self {
                Self(id)
            }

            pub fn get(self) -> i32 {
                self.0
            }
        }

        impl From<$name> for crate::query::Value {
            fn from(id: $name) -> Self {
                Self::Int(id.0.into())
            }
        }
    };
}

pub(crate) use id_type;

/// An exact decimal amount, stored as normalized text.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, AsExpression, FromSqlRow, Serialize, Deserialize,
)]
#[diesel(sql_type = Text)]
#[serde(transparent)]
pub struct Quantity(pub Decimal);

impl Quantity {
    pub fn new(value: impl Into<Decimal>) -> Self {
        Self(value.into())
    }

    pub fn parse(s: &str) -> crate::Result<Self> {
        Decimal::from_str(s)
            .map(Self)
            .map_err(|e| crate::error::validation!("invalid decimal `{s}`: {e}"))
    }

    pub fn value(self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

impl From<Decimal> for Quantity {
    fn from(d: Decimal) -> Self {
        Self(d)
    }
}

impl From<i32> for Quantity {
    fn from(i: i32) -> Self {
        Self(i.into())
    }
}

impl From<Quantity> for Value {
    fn from(q: Quantity) -> Self {
        Self::Decimal(q.0)
    }
}

impl FromSql<Text, Sqlite> for Quantity {
    fn from_sql(bytes: <Sqlite as Backend>::RawValue<'_>) -> deserialize::Result<Self> {
        let text = <String as FromSql<Text, Sqlite>>::from_sql(bytes)?;
        Ok(Self(Decimal::from_str(text.trim())?))
    }
}

impl ToSql<Text, Sqlite> for Quantity {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Sqlite>) -> serialize::Result {
        out.set_value(self.0.normalize().to_string());
        Ok(IsNull::No)
    }
}

/// An ordered list of tags, stored as a JSON array.
#[derive(Debug, Clone, Default, PartialEq, Eq, AsExpression, FromSqlRow, Serialize, Deserialize)]
#[diesel(sql_type = Text)]
#[serde(transparent)]
pub struct Tags(pub Vec<String>);

impl Tags {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for Tags {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl From<Tags> for Value {
    fn from(tags: Tags) -> Self {
        Self::List(tags.0)
    }
}

impl FromSql<Text, Sqlite> for Tags {
    fn from_sql(bytes: <Sqlite as Backend>::RawValue<'_>) -> deserialize::Result<Self> {
        let text = <String as FromSql<Text, Sqlite>>::from_sql(bytes)?;
        Ok(Self(serde_json::from_str(&text)?))
    }
}

impl ToSql<Text, Sqlite> for Tags {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Sqlite>) -> serialize::Result {
        out.set_value(serde_json::to_string(&self.0)?);
        Ok(IsNull::No)
    }
}

/// Every model with the names of its columns.
pub(crate) fn known_models() -> Vec<(&'static str, Vec<&'static str>)> {
    fn entry<M: Model>() -> (&'static str, Vec<&'static str>) {
        (
            M::NAME,
            <M::Field as crate::query::Field>::all()
                .into_iter()
                .map(|f| f.column())
                .collect(),
        )
    }
    vec![
        entry::<Category>(),
        entry::<IngredientCategory>(),
        entry::<UnitOfMeasure>(),
        entry::<Ingredient>(),
        entry::<Recipe>(),
        entry::<UnitQuantity>(),
        entry::<User>(),
    ]
}

#[test]
fn quantity_text_is_normalized() {
    assert_eq!(Quantity::parse("500.00").unwrap().to_string(), "500");
    assert_eq!(Quantity::parse("0.250").unwrap().to_string(), "0.25");
    assert!(Quantity::parse("lots").is_err());
    assert_eq!(Value::from(Quantity::new(3)), Value::Decimal(3.into()));
}

#[test]
fn known_models_list_columns() {
    let models = known_models();
    let (_, columns) = models.iter().find(|(name, _)| *name == "UnitQuantity").unwrap();
    assert!(columns.contains(&"order"));
    assert!(columns.contains(&"sub_recipe_id"));
    let (_, columns) = models.iter().find(|(name, _)| *name == "UnitOfMeasure").unwrap();
    assert!(columns.contains(&"unit_type"));
}
