// Copyright 2023 Remi Bernotavicius

use super::{id_type, Ingredient, IngredientField};
use crate::model::{changed, Input, Model, Unique};
use crate::query::{Field, FieldKind, Value, Where};
use crate::relation::HasMany;
use chrono::NaiveDateTime;
use diesel::QueryableByName;
use serde::Serialize;
use strum::{EnumIter, IntoStaticStr};

id_type!(IngredientCategoryId);

#[derive(QueryableByName, Serialize, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::database::schema::ingredient_categories)]
pub struct IngredientCategory {
    pub id: IngredientCategoryId,
    pub name: String,
    pub description: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Hash, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum IngredientCategoryField {
    Id,
    Name,
    Description,
    CreatedAt,
    UpdatedAt,
}

impl Field for IngredientCategoryField {
    fn kind(self) -> FieldKind {
        match self {
            Self::Id => FieldKind::Int,
            Self::Name | Self::Description => FieldKind::Text,
            Self::CreatedAt | Self::UpdatedAt => FieldKind::DateTime,
        }
    }

    fn is_nullable(self) -> bool {
        self == Self::Description
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum IngredientCategoryUnique {
    Id(IngredientCategoryId),
    Name(String),
}

impl Unique<IngredientCategory> for IngredientCategoryUnique {
    fn to_where(&self) -> Where<IngredientCategoryField> {
        match self {
            Self::Id(id) => Where::equals(IngredientCategoryField::Id, *id),
            Self::Name(name) => Where::equals(IngredientCategoryField::Name, name.as_str()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngredientCategoryCreate {
    pub name: String,
    pub description: Option<String>,
}

impl IngredientCategoryCreate {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

impl Input<IngredientCategory> for IngredientCategoryCreate {
    fn assignments(&self) -> Vec<(IngredientCategoryField, Value)> {
        vec![
            (IngredientCategoryField::Name, self.name.clone().into()),
            (IngredientCategoryField::Description, self.description.clone().into()),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngredientCategoryUpdate {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
}

impl Input<IngredientCategory> for IngredientCategoryUpdate {
    fn assignments(&self) -> Vec<(IngredientCategoryField, Value)> {
        let mut out = vec![];
        changed(&mut out, IngredientCategoryField::Name, &self.name);
        changed(&mut out, IngredientCategoryField::Description, &self.description);
        out
    }
}

impl Model for IngredientCategory {
    const NAME: &'static str = "IngredientCategory";
    const TABLE: &'static str = "ingredient_categories";
    const ID: IngredientCategoryField = IngredientCategoryField::Id;
    const CREATED_AT: IngredientCategoryField = IngredientCategoryField::CreatedAt;
    const UPDATED_AT: IngredientCategoryField = IngredientCategoryField::UpdatedAt;

    type Field = IngredientCategoryField;
    type Unique = IngredientCategoryUnique;
    type Create = IngredientCategoryCreate;
    type Update = IngredientCategoryUpdate;

    fn id(&self) -> i32 {
        self.id.get()
    }

    fn get(&self, field: IngredientCategoryField) -> Value {
        match field {
            IngredientCategoryField::Id => self.id.into(),
            IngredientCategoryField::Name => self.name.clone().into(),
            IngredientCategoryField::Description => self.description.clone().into(),
            IngredientCategoryField::CreatedAt => self.created_at.into(),
            IngredientCategoryField::UpdatedAt => self.updated_at.into(),
        }
    }
}

impl IngredientCategory {
    pub const INGREDIENTS: HasMany<IngredientCategory, Ingredient> =
        HasMany::new("ingredients", IngredientField::IngredientCategoryId);
}
