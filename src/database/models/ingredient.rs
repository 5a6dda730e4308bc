// Copyright 2023 Remi Bernotavicius

use super::{id_type, IngredientCategory, IngredientCategoryId, UnitQuantity, UnitQuantityField};
use crate::model::{changed, Input, Model, Unique};
use crate::query::{Field, FieldKind, Value, Where};
use crate::relation::{BelongsTo, HasMany};
use chrono::NaiveDateTime;
use diesel::QueryableByName;
use serde::Serialize;
use strum::{EnumIter, IntoStaticStr};

id_type!(IngredientId);

#[derive(QueryableByName, Serialize, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::database::schema::ingredients)]
pub struct Ingredient {
    pub id: IngredientId,
    pub name: String,
    pub description: Option<String>,
    pub ingredient_category_id: Option<IngredientCategoryId>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Hash, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum IngredientField {
    Id,
    Name,
    Description,
    IngredientCategoryId,
    CreatedAt,
    UpdatedAt,
}

impl Field for IngredientField {
    fn kind(self) -> FieldKind {
        match self {
            Self::Id | Self::IngredientCategoryId => FieldKind::Int,
            Self::Name | Self::Description => FieldKind::Text,
            Self::CreatedAt | Self::UpdatedAt => FieldKind::DateTime,
        }
    }

    fn is_nullable(self) -> bool {
        matches!(self, Self::Description | Self::IngredientCategoryId)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum IngredientUnique {
    Id(IngredientId),
    Name(String),
}

impl Unique<Ingredient> for IngredientUnique {
    fn to_where(&self) -> Where<IngredientField> {
        match self {
            Self::Id(id) => Where::equals(IngredientField::Id, *id),
            Self::Name(name) => Where::equals(IngredientField::Name, name.as_str()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngredientCreate {
    pub name: String,
    pub description: Option<String>,
    pub ingredient_category_id: Option<IngredientCategoryId>,
}

impl IngredientCreate {
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

    pub fn category(mut self, id: IngredientCategoryId) -> Self {
        self.ingredient_category_id = Some(id);
        self
    }
}

impl Input<Ingredient> for IngredientCreate {
    fn assignments(&self) -> Vec<(IngredientField, Value)> {
        vec![
            (IngredientField::Name, self.name.clone().into()),
            (IngredientField::Description, self.description.clone().into()),
            (
                IngredientField::IngredientCategoryId,
                self.ingredient_category_id.into(),
            ),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngredientUpdate {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub ingredient_category_id: Option<Option<IngredientCategoryId>>,
}

impl Input<Ingredient> for IngredientUpdate {
    fn assignments(&self) -> Vec<(IngredientField, Value)> {
        let mut out = vec![];
        changed(&mut out, IngredientField::Name, &self.name);
        changed(&mut out, IngredientField::Description, &self.description);
        changed(
            &mut out,
            IngredientField::IngredientCategoryId,
            &self.ingredient_category_id,
        );
        out
    }
}

impl Model for Ingredient {
    const NAME: &'static str = "Ingredient";
    const TABLE: &'static str = "ingredients";
    const ID: IngredientField = IngredientField::Id;
    const CREATED_AT: IngredientField = IngredientField::CreatedAt;
    const UPDATED_AT: IngredientField = IngredientField::UpdatedAt;

    type Field = IngredientField;
    type Unique = IngredientUnique;
    type Create = IngredientCreate;
    type Update = IngredientUpdate;

    fn id(&self) -> i32 {
        self.id.get()
    }

    fn get(&self, field: IngredientField) -> Value {
        match field {
            IngredientField::Id => self.id.into(),
            IngredientField::Name => self.name.clone().into(),
            IngredientField::Description => self.description.clone().into(),
            IngredientField::IngredientCategoryId => self.ingredient_category_id.into(),
            IngredientField::CreatedAt => self.created_at.into(),
            IngredientField::UpdatedAt => self.updated_at.into(),
        }
    }
}

impl Ingredient {
    pub const INGREDIENT_CATEGORY: BelongsTo<Ingredient, IngredientCategory> =
        BelongsTo::optional("ingredient_category", IngredientField::IngredientCategoryId);
    pub const UNIT_QUANTITIES: HasMany<Ingredient, UnitQuantity> =
        HasMany::new("unit_quantities", UnitQuantityField::IngredientId);
}
