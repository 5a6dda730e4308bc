// Copyright 2023 Remi Bernotavicius

use super::{id_type, Recipe, RecipeField};
use crate::model::{changed, Input, Model, Unique};
use crate::query::{Field, FieldKind, Value, Where};
use crate::relation::HasMany;
use chrono::NaiveDateTime;
use diesel::QueryableByName;
use serde::Serialize;
use strum::{EnumIter, IntoStaticStr};

id_type!(CategoryId);

#[derive(QueryableByName, Serialize, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::database::schema::categories)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub description: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Hash, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum CategoryField {
    Id,
    Name,
    Description,
    CreatedAt,
    UpdatedAt,
}

impl Field for CategoryField {
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
pub enum CategoryUnique {
    Id(CategoryId),
    Name(String),
}

impl Unique<Category> for CategoryUnique {
    fn to_where(&self) -> Where<CategoryField> {
        match self {
            Self::Id(id) => Where::equals(CategoryField::Id, *id),
            Self::Name(name) => Where::equals(CategoryField::Name, name.as_str()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryCreate {
    pub name: String,
    pub description: Option<String>,
}

impl CategoryCreate {
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

impl Input<Category> for CategoryCreate {
    fn assignments(&self) -> Vec<(CategoryField, Value)> {
        vec![
            (CategoryField::Name, self.name.clone().into()),
            (CategoryField::Description, self.description.clone().into()),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryUpdate {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
}

impl Input<Category> for CategoryUpdate {
    fn assignments(&self) -> Vec<(CategoryField, Value)> {
        let mut out = vec![];
        changed(&mut out, CategoryField::Name, &self.name);
        changed(&mut out, CategoryField::Description, &self.description);
        out
    }
}

impl Model for Category {
    const NAME: &'static str = "Category";
    const TABLE: &'static str = "categories";
    const ID: CategoryField = CategoryField::Id;
    const CREATED_AT: CategoryField = CategoryField::CreatedAt;
    const UPDATED_AT: CategoryField = CategoryField::UpdatedAt;

    type Field = CategoryField;
    type Unique = CategoryUnique;
    type Create = CategoryCreate;
    type Update = CategoryUpdate;

    fn id(&self) -> i32 {
        self.id.get()
    }

    fn get(&self, field: CategoryField) -> Value {
        match field {
            CategoryField::Id => self.id.into(),
            CategoryField::Name => self.name.clone().into(),
            CategoryField::Description => self.description.clone().into(),
            CategoryField::CreatedAt => self.created_at.into(),
            CategoryField::UpdatedAt => self.updated_at.into(),
        }
    }
}

impl Category {
    pub const RECIPES: HasMany<Category, Recipe> = HasMany::new("recipes", RecipeField::CategoryId);
}
