// Copyright 2023 Remi Bernotavicius

#![allow(dead_code)]

use recipe_catalog::database::models::{
    Category, CategoryCreate, Ingredient, IngredientCreate, Recipe, RecipeCreate, UnitOfMeasure,
    UnitOfMeasureCreate, UnitQuantityCreate, UnitType,
};
use recipe_catalog::{Client, ClientConfig, Executor as _};
use rust_decimal::Decimal;

pub struct TestDb {
    pub client: Client,
    pub dir: tempfile::TempDir,
}

pub fn config(dir: &tempfile::TempDir) -> ClientConfig {
    let path = dir.path().join("catalog.sqlite");
    ClientConfig::default().with_datasource_url(path.to_string_lossy())
}

pub fn connect() -> TestDb {
    connect_with(|config| config)
}

pub fn connect_with(customize: impl FnOnce(ClientConfig) -> ClientConfig) -> TestDb {
    let dir = tempfile::tempdir().unwrap();
    let client = Client::connect(customize(config(&dir))).unwrap();
    TestDb { client, dir }
}

/// A bread recipe, and a sandwich which uses the bread as a sub-recipe.
pub struct Bread {
    pub gram: UnitOfMeasure,
    pub cup: UnitOfMeasure,
    pub loaf: UnitOfMeasure,
    pub flour: Ingredient,
    pub water: Ingredient,
    pub salt: Ingredient,
    pub category: Category,
    pub bread: Recipe,
    pub sandwich: Recipe,
}

pub fn seed_bread(client: &Client) -> Bread {
    let units = client.units_of_measure();
    let gram = units
        .create(UnitOfMeasureCreate::new("gram").abbreviation("g").unit_type(UnitType::Weight))
        .unwrap();
    let cup = units
        .create(UnitOfMeasureCreate::new("cup").unit_type(UnitType::Volume))
        .unwrap();
    let loaf = units
        .create(UnitOfMeasureCreate::new("loaf").unit_type(UnitType::Count))
        .unwrap();

    let ingredients = client.ingredients();
    let flour = ingredients.create(IngredientCreate::new("flour")).unwrap();
    let water = ingredients.create(IngredientCreate::new("water")).unwrap();
    let salt = ingredients.create(IngredientCreate::new("salt")).unwrap();

    let category = client.categories().create(CategoryCreate::new("Bread")).unwrap();
    let bread = client
        .recipes()
        .create(
            RecipeCreate::new("Basic Bread", "Mix, knead, proof, bake.")
                .yields(1, loaf.id)
                .times(20, 45)
                .tags(["baking", "vegan"])
                .category(category.id),
        )
        .unwrap();
    let sandwich = client
        .recipes()
        .create(RecipeCreate::new("Sandwich", "Slice and fill.").tags(["lunch"]))
        .unwrap();

    let lines = client.unit_quantities();
    lines
        .create(UnitQuantityCreate::ingredient(bread.id, salt.id, 9, gram.id).order(3))
        .unwrap();
    lines
        .create(UnitQuantityCreate::ingredient(bread.id, flour.id, 500, gram.id).order(1))
        .unwrap();
    lines
        .create(
            UnitQuantityCreate::ingredient(bread.id, water.id, Decimal::new(15, 1), cup.id)
                .order(2),
        )
        .unwrap();
    lines
        .create(UnitQuantityCreate::sub_recipe(sandwich.id, bread.id, Decimal::new(5, 1), loaf.id))
        .unwrap();

    Bread {
        gram,
        cup,
        loaf,
        flour,
        water,
        salt,
        category,
        bread,
        sandwich,
    }
}
