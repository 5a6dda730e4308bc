// Copyright 2023 Remi Bernotavicius

//! Whole recipes: a recipe together with everything it refers to.

use crate::client::Executor;
use crate::database::models::{
    Category, Ingredient, Recipe, RecipeUnique, UnitOfMeasure, UnitQuantity, UnitQuantityField,
    User,
};
use crate::error::{Error, ErrorCode, Result};
use crate::query::FindMany;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Component {
    Ingredient(Ingredient),
    SubRecipe(Recipe),
}

impl Component {
    pub fn name(&self) -> &str {
        match self {
            Self::Ingredient(i) => &i.name,
            Self::SubRecipe(r) => &r.name,
        }
    }
}

/// One line of a recipe with its unit and component resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineDetail {
    pub line: UnitQuantity,
    pub unit: UnitOfMeasure,
    pub component: Component,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecipeDetail {
    pub recipe: Recipe,
    pub category: Option<Category>,
    pub yield_unit: Option<UnitOfMeasure>,
    pub author: Option<User>,
    /// Ordered by each line's `order`.
    pub lines: Vec<LineDetail>,
}

fn dangling_line(line: &UnitQuantity, missing: &str) -> Error {
    Error::known(
        ErrorCode::RelatedRecordNotFound,
        format!("UnitQuantity {} has no {missing}", line.id),
        Some("unit_quantities".into()),
    )
}

/// Loads a recipe with its category, yield unit, author and lines. Pass a transaction to read
/// all of it from one snapshot.
pub fn recipe_detail<X: Executor>(exec: &X, key: &RecipeUnique) -> Result<Option<RecipeDetail>> {
    let Some(recipe) = exec.recipes().find_unique(key)? else {
        return Ok(None);
    };
    let category = Recipe::CATEGORY.fetch(exec, &recipe)?;
    let yield_unit = Recipe::YIELD_UNIT.fetch(exec, &recipe)?;
    let author = Recipe::USER.fetch(exec, &recipe)?;

    let lines = Recipe::RECIPE_INGREDIENTS.fetch(
        exec,
        &recipe,
        FindMany::new().asc(UnitQuantityField::Order),
    )?;
    let units = UnitQuantity::UNIT.include(exec, &lines)?;
    let ingredients = UnitQuantity::INGREDIENT.include(exec, &lines)?;
    let sub_recipes = UnitQuantity::SUB_RECIPE.include(exec, &lines)?;

    let lines = lines
        .into_iter()
        .zip(units)
        .zip(ingredients.into_iter().zip(sub_recipes))
        .map(|((line, unit), (ingredient, sub_recipe))| {
            let component = match (ingredient, sub_recipe) {
                (Some(ingredient), _) => Component::Ingredient(ingredient),
                (None, Some(recipe)) => Component::SubRecipe(recipe),
                (None, None) => {
                    return Err(dangling_line(&line, "ingredient or sub-recipe"))
                }
            };
            let unit = unit.ok_or_else(|| dangling_line(&line, "unit"))?;
            Ok(LineDetail {
                line,
                unit,
                component,
            })
        })
        .collect::<Result<_>>()?;

    Ok(Some(RecipeDetail {
        recipe,
        category,
        yield_unit,
        author,
        lines,
    }))
}
