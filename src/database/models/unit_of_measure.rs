// Copyright 2023 Remi Bernotavicius

use super::{id_type, Recipe, RecipeField, UnitQuantity, UnitQuantityField};
use crate::model::{changed, Input, Model, Unique};
use crate::query::{Field, FieldKind, Value, Where};
use crate::relation::HasMany;
use chrono::NaiveDateTime;
use derive_more::Display;
use diesel::QueryableByName;
use diesel_derive_enum::DbEnum;
use serde::{Deserialize, Serialize};
use strum::{EnumIter, IntoStaticStr};

id_type!(UnitOfMeasureId);

#[derive(
    Debug,
    Display,
    EnumIter,
    IntoStaticStr,
    Hash,
    Copy,
    Clone,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    DbEnum,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum UnitType {
    #[db_rename = "WEIGHT"]
    #[display("WEIGHT")]
    Weight,
    #[db_rename = "VOLUME"]
    #[display("VOLUME")]
    Volume,
    #[db_rename = "COUNT"]
    #[display("COUNT")]
    Count,
    #[db_rename = "OTHER"]
    #[display("OTHER")]
    Other,
}

impl UnitType {
    pub const VARIANTS: &'static [&'static str] = &["WEIGHT", "VOLUME", "COUNT", "OTHER"];

    pub fn as_str(self) -> &'static str {
        self.into()
    }

    pub fn iter() -> impl Iterator<Item = Self> {
        <Self as strum::IntoEnumIterator>::iter()
    }
}

impl From<UnitType> for Value {
    fn from(t: UnitType) -> Self {
        Self::Text(t.as_str().into())
    }
}

#[derive(QueryableByName, Serialize, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::database::schema::units_of_measure)]
pub struct UnitOfMeasure {
    pub id: UnitOfMeasureId,
    pub name: String,
    pub abbreviation: Option<String>,
    pub unit_type: Option<UnitType>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Hash, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum UnitOfMeasureField {
    Id,
    Name,
    Abbreviation,
    UnitType,
    CreatedAt,
    UpdatedAt,
}

impl Field for UnitOfMeasureField {
    fn kind(self) -> FieldKind {
        match self {
            Self::Id => FieldKind::Int,
            Self::Name | Self::Abbreviation => FieldKind::Text,
            Self::UnitType => FieldKind::Enum(UnitType::VARIANTS),
            Self::CreatedAt | Self::UpdatedAt => FieldKind::DateTime,
        }
    }

    fn is_nullable(self) -> bool {
        matches!(self, Self::Abbreviation | Self::UnitType)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UnitOfMeasureUnique {
    Id(UnitOfMeasureId),
    Name(String),
    Abbreviation(String),
}

impl Unique<UnitOfMeasure> for UnitOfMeasureUnique {
    fn to_where(&self) -> Where<UnitOfMeasureField> {
        match self {
            Self::Id(id) => Where::equals(UnitOfMeasureField::Id, *id),
            Self::Name(name) => Where::equals(UnitOfMeasureField::Name, name.as_str()),
            Self::Abbreviation(a) => Where::equals(UnitOfMeasureField::Abbreviation, a.as_str()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnitOfMeasureCreate {
    pub name: String,
    pub abbreviation: Option<String>,
    pub unit_type: Option<UnitType>,
}

impl UnitOfMeasureCreate {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn abbreviation(mut self, abbreviation: impl Into<String>) -> Self {
        self.abbreviation = Some(abbreviation.into());
        self
    }

    pub fn unit_type(mut self, unit_type: UnitType) -> Self {
        self.unit_type = Some(unit_type);
        self
    }
}

impl Input<UnitOfMeasure> for UnitOfMeasureCreate {
    fn assignments(&self) -> Vec<(UnitOfMeasureField, Value)> {
        vec![
            (UnitOfMeasureField::Name, self.name.clone().into()),
            (UnitOfMeasureField::Abbreviation, self.abbreviation.clone().into()),
            (UnitOfMeasureField::UnitType, self.unit_type.into()),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnitOfMeasureUpdate {
    pub name: Option<String>,
    pub abbreviation: Option<Option<String>>,
    pub unit_type: Option<Option<UnitType>>,
}

impl Input<UnitOfMeasure> for UnitOfMeasureUpdate {
    fn assignments(&self) -> Vec<(UnitOfMeasureField, Value)> {
        let mut out = vec![];
        changed(&mut out, UnitOfMeasureField::Name, &self.name);
        changed(&mut out, UnitOfMeasureField::Abbreviation, &self.abbreviation);
        changed(&mut out, UnitOfMeasureField::UnitType, &self.unit_type);
        out
    }
}

impl Model for UnitOfMeasure {
    const NAME: &'static str = "UnitOfMeasure";
    const TABLE: &'static str = "units_of_measure";
    const ID: UnitOfMeasureField = UnitOfMeasureField::Id;
    const CREATED_AT: UnitOfMeasureField = UnitOfMeasureField::CreatedAt;
    const UPDATED_AT: UnitOfMeasureField = UnitOfMeasureField::UpdatedAt;

    type Field = UnitOfMeasureField;
    type Unique = UnitOfMeasureUnique;
    type Create = UnitOfMeasureCreate;
    type Update = UnitOfMeasureUpdate;

    fn id(&self) -> i32 {
        self.id.get()
    }

    fn get(&self, field: UnitOfMeasureField) -> Value {
        match field {
            UnitOfMeasureField::Id => self.id.into(),
            UnitOfMeasureField::Name => self.name.clone().into(),
            UnitOfMeasureField::Abbreviation => self.abbreviation.clone().into(),
            UnitOfMeasureField::UnitType => self.unit_type.into(),
            UnitOfMeasureField::CreatedAt => self.created_at.into(),
            UnitOfMeasureField::UpdatedAt => self.updated_at.into(),
        }
    }
}

impl UnitOfMeasure {
    pub const YIELDED_RECIPES: HasMany<UnitOfMeasure, Recipe> =
        HasMany::new("yielded_recipes", RecipeField::YieldUnitId);
    pub const UNIT_QUANTITIES: HasMany<UnitOfMeasure, UnitQuantity> =
        HasMany::new("unit_quantities", UnitQuantityField::UnitId);
}

#[test]
fn unit_type_names() {
    assert_eq!(UnitType::Weight.as_str(), "WEIGHT");
    assert_eq!(UnitType::Count.to_string(), "COUNT");
    assert_eq!(
        UnitType::iter().map(UnitType::as_str).collect::<Vec<_>>(),
        UnitType::VARIANTS
    );
    assert_eq!(Value::from(Some(UnitType::Volume)), Value::from("VOLUME"));
}
