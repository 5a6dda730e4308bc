// Copyright 2023 Remi Bernotavicius

use super::{
    id_type, Category, CategoryId, Quantity, Tags, UnitOfMeasure, UnitOfMeasureId, UnitQuantity,
    UnitQuantityField, User, UserId,
};
use crate::model::{changed, Input, Model, Unique};
use crate::query::{Field, FieldKind, Value, Where};
use crate::relation::{BelongsTo, HasMany};
use chrono::NaiveDateTime;
use diesel::QueryableByName;
use serde::Serialize;
use strum::{EnumIter, IntoStaticStr};

id_type!(RecipeId);

#[derive(QueryableByName, Serialize, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::database::schema::recipes)]
pub struct Recipe {
    pub id: RecipeId,
    pub name: String,
    pub description: Option<String>,
    pub instructions: String,
    pub yield_quantity: Option<Quantity>,
    pub yield_unit_id: Option<UnitOfMeasureId>,
    pub prep_time_minutes: Option<i32>,
    pub cook_time_minutes: Option<i32>,
    pub tags: Tags,
    pub category_id: Option<CategoryId>,
    pub user_id: Option<UserId>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Hash, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum RecipeField {
    Id,
    Name,
    Description,
    Instructions,
    YieldQuantity,
    YieldUnitId,
    PrepTimeMinutes,
    CookTimeMinutes,
    Tags,
    CategoryId,
    UserId,
    CreatedAt,
    UpdatedAt,
}

impl Field for RecipeField {
    fn kind(self) -> FieldKind {
        match self {
            Self::Id
            | Self::YieldUnitId
            | Self::PrepTimeMinutes
            | Self::CookTimeMinutes
            | Self::CategoryId
            | Self::UserId => FieldKind::Int,
            Self::Name | Self::Description | Self::Instructions => FieldKind::Text,
            Self::YieldQuantity => FieldKind::Decimal,
            Self::Tags => FieldKind::List,
            Self::CreatedAt | Self::UpdatedAt => FieldKind::DateTime,
        }
    }

    fn is_nullable(self) -> bool {
        matches!(
            self,
            Self::Description
                | Self::YieldQuantity
                | Self::YieldUnitId
                | Self::PrepTimeMinutes
                | Self::CookTimeMinutes
                | Self::CategoryId
                | Self::UserId
        )
    }
}

/// Recipe names aren't unique, so the id is the only key.
#[derive(Debug, Clone, PartialEq)]
pub enum RecipeUnique {
    Id(RecipeId),
}

impl Unique<Recipe> for RecipeUnique {
    fn to_where(&self) -> Where<RecipeField> {
        match self {
            Self::Id(id) => Where::equals(RecipeField::Id, *id),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipeCreate {
    pub name: String,
    pub description: Option<String>,
    pub instructions: String,
    pub yield_quantity: Option<Quantity>,
    pub yield_unit_id: Option<UnitOfMeasureId>,
    pub prep_time_minutes: Option<i32>,
    pub cook_time_minutes: Option<i32>,
    pub tags: Tags,
    pub category_id: Option<CategoryId>,
    pub user_id: Option<UserId>,
}

impl RecipeCreate {
    pub fn new(name: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instructions: instructions.into(),
            ..Default::default()
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn yields(mut self, quantity: impl Into<Quantity>, unit: UnitOfMeasureId) -> Self {
        self.yield_quantity = Some(quantity.into());
        self.yield_unit_id = Some(unit);
        self
    }

    pub fn times(mut self, prep_minutes: i32, cook_minutes: i32) -> Self {
        self.prep_time_minutes = Some(prep_minutes);
        self.cook_time_minutes = Some(cook_minutes);
        self
    }

    pub fn tags<S: Into<String>>(mut self, tags: impl IntoIterator<Item = S>) -> Self {
        self.tags = tags.into_iter().collect();
        self
    }

    pub fn category(mut self, id: CategoryId) -> Self {
        self.category_id = Some(id);
        self
    }

    pub fn author(mut self, id: UserId) -> Self {
        self.user_id = Some(id);
        self
    }
}

impl Input<Recipe> for RecipeCreate {
    fn assignments(&self) -> Vec<(RecipeField, Value)> {
        vec![
            (RecipeField::Name, self.name.clone().into()),
            (RecipeField::Description, self.description.clone().into()),
            (RecipeField::Instructions, self.instructions.clone().into()),
            (RecipeField::YieldQuantity, self.yield_quantity.into()),
            (RecipeField::YieldUnitId, self.yield_unit_id.into()),
            (RecipeField::PrepTimeMinutes, self.prep_time_minutes.into()),
            (RecipeField::CookTimeMinutes, self.cook_time_minutes.into()),
            (RecipeField::Tags, self.tags.clone().into()),
            (RecipeField::CategoryId, self.category_id.into()),
            (RecipeField::UserId, self.user_id.into()),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipeUpdate {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub instructions: Option<String>,
    pub yield_quantity: Option<Option<Quantity>>,
    pub yield_unit_id: Option<Option<UnitOfMeasureId>>,
    pub prep_time_minutes: Option<Option<i32>>,
    pub cook_time_minutes: Option<Option<i32>>,
    pub tags: Option<Tags>,
    pub category_id: Option<Option<CategoryId>>,
    pub user_id: Option<Option<UserId>>,
}

impl Input<Recipe> for RecipeUpdate {
    fn assignments(&self) -> Vec<(RecipeField, Value)> {
        let mut out = vec![];
        changed(&mut out, RecipeField::Name, &self.name);
        changed(&mut out, RecipeField::Description, &self.description);
        changed(&mut out, RecipeField::Instructions, &self.instructions);
        changed(&mut out, RecipeField::YieldQuantity, &self.yield_quantity);
        changed(&mut out, RecipeField::YieldUnitId, &self.yield_unit_id);
        changed(&mut out, RecipeField::PrepTimeMinutes, &self.prep_time_minutes);
        changed(&mut out, RecipeField::CookTimeMinutes, &self.cook_time_minutes);
        changed(&mut out, RecipeField::Tags, &self.tags);
        changed(&mut out, RecipeField::CategoryId, &self.category_id);
        changed(&mut out, RecipeField::UserId, &self.user_id);
        out
    }
}

impl Model for Recipe {
    const NAME: &'static str = "Recipe";
    const TABLE: &'static str = "recipes";
    const ID: RecipeField = RecipeField::Id;
    const CREATED_AT: RecipeField = RecipeField::CreatedAt;
    const UPDATED_AT: RecipeField = RecipeField::UpdatedAt;

    type Field = RecipeField;
    type Unique = RecipeUnique;
    type Create = RecipeCreate;
    type Update = RecipeUpdate;

    fn id(&self) -> i32 {
        self.id.get()
    }

    fn get(&self, field: RecipeField) -> Value {
        match field {
            RecipeField::Id => self.id.into(),
            RecipeField::Name => self.name.clone().into(),
            RecipeField::Description => self.description.clone().into(),
            RecipeField::Instructions => self.instructions.clone().into(),
            RecipeField::YieldQuantity => self.yield_quantity.into(),
            RecipeField::YieldUnitId => self.yield_unit_id.into(),
            RecipeField::PrepTimeMinutes => self.prep_time_minutes.into(),
            RecipeField::CookTimeMinutes => self.cook_time_minutes.into(),
            RecipeField::Tags => self.tags.clone().into(),
            RecipeField::CategoryId => self.category_id.into(),
            RecipeField::UserId => self.user_id.into(),
            RecipeField::CreatedAt => self.created_at.into(),
            RecipeField::UpdatedAt => self.updated_at.into(),
        }
    }
}

impl Recipe {
    pub const CATEGORY: BelongsTo<Recipe, Category> =
        BelongsTo::optional("category", RecipeField::CategoryId);
    pub const YIELD_UNIT: BelongsTo<Recipe, UnitOfMeasure> =
        BelongsTo::optional("yield_unit", RecipeField::YieldUnitId);
    pub const USER: BelongsTo<Recipe, User> = BelongsTo::optional("user", RecipeField::UserId);
    /// The lines making up this recipe.
    pub const RECIPE_INGREDIENTS: HasMany<Recipe, UnitQuantity> =
        HasMany::new("recipe_ingredients", UnitQuantityField::RecipeId);
    /// The lines of other recipes which use this one as a component.
    pub const USED_AS_SUB_RECIPE: HasMany<Recipe, UnitQuantity> =
        HasMany::new("used_as_sub_recipe", UnitQuantityField::SubRecipeId);
}
