// Copyright 2023 Remi Bernotavicius

use super::{
    id_type, Ingredient, IngredientId, Quantity, Recipe, RecipeId, UnitOfMeasure, UnitOfMeasureId,
};
use crate::error::{validation, Result};
use crate::model::{changed, Input, Model, Unique};
use crate::query::{Field, FieldKind, Value, Where};
use crate::relation::BelongsTo;
use chrono::NaiveDateTime;
use diesel::QueryableByName;
use serde::Serialize;
use strum::{EnumIter, IntoStaticStr};

id_type!(UnitQuantityId);

/// One line of a recipe: an amount of either an ingredient or another recipe.
#[derive(QueryableByName, Serialize, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::database::schema::unit_quantities)]
pub struct UnitQuantity {
    pub id: UnitQuantityId,
    pub recipe_id: RecipeId,
    pub ingredient_id: Option<IngredientId>,
    pub sub_recipe_id: Option<RecipeId>,
    pub quantity: Quantity,
    pub unit_id: UnitOfMeasureId,
    pub order: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Hash, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum UnitQuantityField {
    Id,
    RecipeId,
    IngredientId,
    SubRecipeId,
    Quantity,
    UnitId,
    Order,
    CreatedAt,
    UpdatedAt,
}

impl Field for UnitQuantityField {
    fn kind(self) -> FieldKind {
        match self {
            Self::Id
            | Self::RecipeId
            | Self::IngredientId
            | Self::SubRecipeId
            | Self::UnitId
            | Self::Order => FieldKind::Int,
            Self::Quantity => FieldKind::Decimal,
            Self::CreatedAt | Self::UpdatedAt => FieldKind::DateTime,
        }
    }

    fn is_nullable(self) -> bool {
        matches!(self, Self::IngredientId | Self::SubRecipeId)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UnitQuantityUnique {
    Id(UnitQuantityId),
}

impl Unique<UnitQuantity> for UnitQuantityUnique {
    fn to_where(&self) -> Where<UnitQuantityField> {
        match self {
            Self::Id(id) => Where::equals(UnitQuantityField::Id, *id),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnitQuantityCreate {
    pub recipe_id: RecipeId,
    pub ingredient_id: Option<IngredientId>,
    pub sub_recipe_id: Option<RecipeId>,
    pub quantity: Quantity,
    pub unit_id: UnitOfMeasureId,
    pub order: i32,
}

impl UnitQuantityCreate {
    pub fn ingredient(
        recipe_id: RecipeId,
        ingredient_id: IngredientId,
        quantity: impl Into<Quantity>,
        unit_id: UnitOfMeasureId,
    ) -> Self {
        Self {
            recipe_id,
            ingredient_id: Some(ingredient_id),
            sub_recipe_id: None,
            quantity: quantity.into(),
            unit_id,
            order: 0,
        }
    }

    pub fn sub_recipe(
        recipe_id: RecipeId,
        sub_recipe_id: RecipeId,
        quantity: impl Into<Quantity>,
        unit_id: UnitOfMeasureId,
    ) -> Self {
        Self {
            recipe_id,
            ingredient_id: None,
            sub_recipe_id: Some(sub_recipe_id),
            quantity: quantity.into(),
            unit_id,
            order: 0,
        }
    }

    pub fn order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }
}

impl Input<UnitQuantity> for UnitQuantityCreate {
    fn assignments(&self) -> Vec<(UnitQuantityField, Value)> {
        vec![
            (UnitQuantityField::RecipeId, self.recipe_id.into()),
            (UnitQuantityField::IngredientId, self.ingredient_id.into()),
            (UnitQuantityField::SubRecipeId, self.sub_recipe_id.into()),
            (UnitQuantityField::Quantity, self.quantity.into()),
            (UnitQuantityField::UnitId, self.unit_id.into()),
            (UnitQuantityField::Order, self.order.into()),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnitQuantityUpdate {
    pub recipe_id: Option<RecipeId>,
    pub ingredient_id: Option<Option<IngredientId>>,
    pub sub_recipe_id: Option<Option<RecipeId>>,
    pub quantity: Option<Quantity>,
    pub unit_id: Option<UnitOfMeasureId>,
    pub order: Option<i32>,
}

impl Input<UnitQuantity> for UnitQuantityUpdate {
    fn assignments(&self) -> Vec<(UnitQuantityField, Value)> {
        let mut out = vec![];
        changed(&mut out, UnitQuantityField::RecipeId, &self.recipe_id);
        changed(&mut out, UnitQuantityField::IngredientId, &self.ingredient_id);
        changed(&mut out, UnitQuantityField::SubRecipeId, &self.sub_recipe_id);
        changed(&mut out, UnitQuantityField::Quantity, &self.quantity);
        changed(&mut out, UnitQuantityField::UnitId, &self.unit_id);
        changed(&mut out, UnitQuantityField::Order, &self.order);
        out
    }
}

/// A line names exactly one component, and a recipe can't contain itself.
fn check_line(
    recipe_id: RecipeId,
    ingredient_id: Option<IngredientId>,
    sub_recipe_id: Option<RecipeId>,
) -> Result<()> {
    match (ingredient_id, sub_recipe_id) {
        (Some(ingredient), Some(sub_recipe)) => Err(validation!(
            "unit quantity refers to both ingredient {ingredient} and sub-recipe {sub_recipe}"
        )),
        (None, None) => Err(validation!(
            "unit quantity must refer to either an ingredient or a sub-recipe"
        )),
        (None, Some(sub_recipe)) if sub_recipe == recipe_id => Err(validation!(
            "recipe {recipe_id} cannot be used as its own sub-recipe"
        )),
        _ => Ok(()),
    }
}

impl Model for UnitQuantity {
    const NAME: &'static str = "UnitQuantity";
    const TABLE: &'static str = "unit_quantities";
    const ID: UnitQuantityField = UnitQuantityField::Id;
    const CREATED_AT: UnitQuantityField = UnitQuantityField::CreatedAt;
    const UPDATED_AT: UnitQuantityField = UnitQuantityField::UpdatedAt;

    type Field = UnitQuantityField;
    type Unique = UnitQuantityUnique;
    type Create = UnitQuantityCreate;
    type Update = UnitQuantityUpdate;

    fn id(&self) -> i32 {
        self.id.get()
    }

    fn get(&self, field: UnitQuantityField) -> Value {
        match field {
            UnitQuantityField::Id => self.id.into(),
            UnitQuantityField::RecipeId => self.recipe_id.into(),
            UnitQuantityField::IngredientId => self.ingredient_id.into(),
            UnitQuantityField::SubRecipeId => self.sub_recipe_id.into(),
            UnitQuantityField::Quantity => self.quantity.into(),
            UnitQuantityField::UnitId => self.unit_id.into(),
            UnitQuantityField::Order => self.order.into(),
            UnitQuantityField::CreatedAt => self.created_at.into(),
            UnitQuantityField::UpdatedAt => self.updated_at.into(),
        }
    }

    fn validate_create(input: &UnitQuantityCreate) -> Result<()> {
        check_line(input.recipe_id, input.ingredient_id, input.sub_recipe_id)
    }

    fn validate_update(existing: &Self, input: &UnitQuantityUpdate) -> Result<()> {
        check_line(
            input.recipe_id.unwrap_or(existing.recipe_id),
            input.ingredient_id.unwrap_or(existing.ingredient_id),
            input.sub_recipe_id.unwrap_or(existing.sub_recipe_id),
        )
    }

    fn update_requires_validation(input: &UnitQuantityUpdate) -> bool {
        input.recipe_id.is_some() || input.ingredient_id.is_some() || input.sub_recipe_id.is_some()
    }
}

impl UnitQuantity {
    pub const RECIPE: BelongsTo<UnitQuantity, Recipe> =
        BelongsTo::required("recipe", UnitQuantityField::RecipeId);
    pub const INGREDIENT: BelongsTo<UnitQuantity, Ingredient> =
        BelongsTo::optional("ingredient", UnitQuantityField::IngredientId);
    pub const SUB_RECIPE: BelongsTo<UnitQuantity, Recipe> =
        BelongsTo::optional("sub_recipe", UnitQuantityField::SubRecipeId);
    pub const UNIT: BelongsTo<UnitQuantity, UnitOfMeasure> =
        BelongsTo::required("unit", UnitQuantityField::UnitId);
}

#[test]
fn lines_need_exactly_one_component() {
    let recipe = RecipeId::new(1);
    let unit = UnitOfMeasureId::new(1);

    let flour = UnitQuantityCreate::ingredient(recipe, IngredientId::new(2), 500, unit);
    assert!(UnitQuantity::validate_create(&flour).is_ok());

    let dough = UnitQuantityCreate::sub_recipe(recipe, RecipeId::new(3), 1, unit);
    assert!(UnitQuantity::validate_create(&dough).is_ok());

    let both = UnitQuantityCreate {
        sub_recipe_id: Some(RecipeId::new(3)),
        ..flour.clone()
    };
    assert!(matches!(
        UnitQuantity::validate_create(&both),
        Err(crate::Error::Validation(_))
    ));

    let neither = UnitQuantityCreate {
        ingredient_id: None,
        ..flour
    };
    assert!(UnitQuantity::validate_create(&neither).is_err());

    let itself = UnitQuantityCreate::sub_recipe(recipe, recipe, 1, unit);
    assert!(UnitQuantity::validate_create(&itself).is_err());
}

#[test]
fn updates_are_checked_against_the_merged_row() {
    let existing = UnitQuantity {
        id: UnitQuantityId::new(1),
        recipe_id: RecipeId::new(1),
        ingredient_id: Some(IngredientId::new(2)),
        sub_recipe_id: None,
        quantity: Quantity::new(500),
        unit_id: UnitOfMeasureId::new(1),
        order: 0,
        created_at: NaiveDateTime::default(),
        updated_at: NaiveDateTime::default(),
    };

    let add_sub_recipe = UnitQuantityUpdate {
        sub_recipe_id: Some(Some(RecipeId::new(3))),
        ..Default::default()
    };
    assert!(UnitQuantity::update_requires_validation(&add_sub_recipe));
    assert!(UnitQuantity::validate_update(&existing, &add_sub_recipe).is_err());

    let swap = UnitQuantityUpdate {
        ingredient_id: Some(None),
        sub_recipe_id: Some(Some(RecipeId::new(3))),
        ..Default::default()
    };
    assert!(UnitQuantity::validate_update(&existing, &swap).is_ok());

    let quantity_only = UnitQuantityUpdate {
        quantity: Some(Quantity::new(250)),
        ..Default::default()
    };
    assert!(!UnitQuantity::update_requires_validation(&quantity_only));
}
