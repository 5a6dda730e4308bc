// Copyright 2023 Remi Bernotavicius

mod common;

use recipe_catalog::catalog::{recipe_detail, Component};
use recipe_catalog::database::models::{
    Category, CategoryCreate, CategoryField, CategoryUnique, CategoryUpdate, IngredientUnique,
    RecipeCreate, RecipeField, RecipeUnique, RecipeUpdate, UnitQuantityCreate,
    UnitQuantityField, UnitQuantityUpdate, UserCreate, UserField, UserUnique,
};
use recipe_catalog::query::{FindMany, Selection, Value, Where};
use recipe_catalog::{Error, ErrorCode, Executor as _};

#[test]
fn unique_violation_names_the_column() {
    let db = common::connect();
    let categories = db.client.categories();
    categories.create(CategoryCreate::new("Bread")).unwrap();

    let error = categories.create(CategoryCreate::new("Bread")).unwrap_err();
    assert_eq!(error.code(), Some(ErrorCode::UniqueConstraintFailed));
    match error {
        Error::KnownRequest { target, .. } => {
            assert!(target.unwrap().contains("name"));
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(categories.count(None).unwrap(), 1);
}

#[test]
fn missing_rows() {
    let db = common::connect();
    let categories = db.client.categories();
    let key = CategoryUnique::Name("Soup".into());

    assert_eq!(categories.find_unique(&key).unwrap(), None);
    assert!(categories.find_unique_or_throw(&key).unwrap_err().is_not_found());
    assert!(categories
        .update(&key, CategoryUpdate::default())
        .unwrap_err()
        .is_not_found());
    assert!(categories.delete(&key).unwrap_err().is_not_found());
}

#[test]
fn updates_touch_only_given_fields() {
    let db = common::connect();
    let categories = db.client.categories();
    let created = categories
        .create(CategoryCreate::new("Soup").description("Hot"))
        .unwrap();

    let updated = categories
        .update(
            &CategoryUnique::Id(created.id),
            CategoryUpdate {
                description: Some(None),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(updated.name, "Soup");
    assert_eq!(updated.description, None);
    assert_eq!(updated.created_at, created.created_at);
    assert!(updated.updated_at >= created.updated_at);
}

#[test]
fn lines_need_exactly_one_component() {
    let db = common::connect();
    let bread = common::seed_bread(&db.client);
    let lines = db.client.unit_quantities();

    let mut both = UnitQuantityCreate::ingredient(bread.sandwich.id, bread.salt.id, 1, bread.gram.id);
    both.sub_recipe_id = Some(bread.bread.id);
    assert!(matches!(lines.create(both), Err(Error::Validation(_))));

    let mut neither = UnitQuantityCreate::ingredient(bread.sandwich.id, bread.salt.id, 1, bread.gram.id);
    neither.ingredient_id = None;
    assert!(matches!(lines.create(neither), Err(Error::Validation(_))));

    let own = UnitQuantityCreate::sub_recipe(bread.bread.id, bread.bread.id, 1, bread.loaf.id);
    assert!(matches!(lines.create(own), Err(Error::Validation(_))));

    // Giving an ingredient line a sub-recipe too would break it.
    let update = UnitQuantityUpdate {
        sub_recipe_id: Some(Some(bread.sandwich.id)),
        ..Default::default()
    };
    let error = lines
        .update_many(
            Some(Where::equals(UnitQuantityField::RecipeId, bread.bread.id)),
            update,
        )
        .unwrap_err();
    assert!(matches!(error, Error::Validation(_)));
    assert_eq!(
        lines
            .count(Some(Where::is_not_null(UnitQuantityField::SubRecipeId)))
            .unwrap(),
        1
    );
}

#[test]
fn foreign_keys_are_enforced() {
    let db = common::connect();
    let bread = common::seed_bread(&db.client);

    let dangling = UnitQuantityCreate::ingredient(
        bread.sandwich.id,
        recipe_catalog::database::models::IngredientId::new(999),
        1,
        bread.gram.id,
    );
    let error = db.client.unit_quantities().create(dangling).unwrap_err();
    assert_eq!(error.code(), Some(ErrorCode::ForeignKeyConstraintFailed));

    // Used by a line, so it can't go.
    let error = db
        .client
        .ingredients()
        .delete(&IngredientUnique::Name("flour".into()))
        .unwrap_err();
    assert_eq!(error.code(), Some(ErrorCode::ForeignKeyConstraintFailed));

    // Used as a sub-recipe by the sandwich.
    let error = db
        .client
        .recipes()
        .delete(&RecipeUnique::Id(bread.bread.id))
        .unwrap_err();
    assert_eq!(error.code(), Some(ErrorCode::ForeignKeyConstraintFailed));
}

#[test]
fn deletes_follow_relation_policies() {
    let db = common::connect();
    let bread = common::seed_bread(&db.client);

    db.client
        .categories()
        .delete(&CategoryUnique::Id(bread.category.id))
        .unwrap();
    let recipe = db
        .client
        .recipes()
        .find_unique_or_throw(&RecipeUnique::Id(bread.bread.id))
        .unwrap();
    assert_eq!(recipe.category_id, None);

    let lines = db.client.unit_quantities();
    assert_eq!(lines.count(None).unwrap(), 4);
    db.client
        .recipes()
        .delete(&RecipeUnique::Id(bread.sandwich.id))
        .unwrap();
    assert_eq!(lines.count(None).unwrap(), 3);
    db.client
        .recipes()
        .delete(&RecipeUnique::Id(bread.bread.id))
        .unwrap();
    assert_eq!(lines.count(None).unwrap(), 0);
}

#[test]
fn tags_are_stored_in_order() {
    let db = common::connect();
    let bread = common::seed_bread(&db.client);
    let recipes = db.client.recipes();
    recipes
        .create(RecipeCreate::new("Water", "Pour."))
        .unwrap();

    let found = recipes
        .find_unique_or_throw(&RecipeUnique::Id(bread.bread.id))
        .unwrap();
    assert_eq!(found.tags.iter().collect::<Vec<_>>(), vec!["baking", "vegan"]);

    let names = |filter| {
        recipes
            .find_many(FindMany::new().filter(filter).asc(RecipeField::Name))
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect::<Vec<_>>()
    };
    assert_eq!(names(Where::has(RecipeField::Tags, "vegan")), vec!["Basic Bread"]);
    assert_eq!(
        names(Where::has_every(RecipeField::Tags, ["vegan", "baking"])),
        vec!["Basic Bread"]
    );
    assert!(names(Where::has_every(RecipeField::Tags, ["vegan", "lunch"])).is_empty());
    assert_eq!(
        names(Where::has_some(RecipeField::Tags, ["vegan", "lunch"])),
        vec!["Basic Bread", "Sandwich"]
    );
    assert_eq!(names(Where::is_empty(RecipeField::Tags, true)), vec!["Water"]);

    let retagged = recipes
        .update(
            &RecipeUnique::Id(bread.sandwich.id),
            RecipeUpdate {
                tags: Some(["quick", "lunch"].into_iter().collect()),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(retagged.tags.iter().collect::<Vec<_>>(), vec!["quick", "lunch"]);
}

#[test]
fn recipe_detail_resolves_every_relation() {
    let db = common::connect();
    let bread = common::seed_bread(&db.client);

    let detail = recipe_detail(&db.client, &RecipeUnique::Id(bread.bread.id))
        .unwrap()
        .unwrap();
    assert_eq!(detail.recipe.name, "Basic Bread");
    assert_eq!(detail.category.unwrap().name, "Bread");
    assert_eq!(detail.yield_unit.unwrap().id, bread.loaf.id);
    assert_eq!(detail.author, None);

    let lines: Vec<_> = detail
        .lines
        .iter()
        .map(|l| (l.component.name(), l.line.quantity.to_string(), l.unit.name.as_str()))
        .collect();
    assert_eq!(
        lines,
        vec![
            ("flour", "500".to_owned(), "gram"),
            ("water", "1.5".to_owned(), "cup"),
            ("salt", "9".to_owned(), "gram"),
        ]
    );

    assert_eq!(detail.lines[0].unit.abbreviation.as_deref(), Some("g"));

    let sandwich = db
        .client
        .transaction(|tx| recipe_detail(tx, &RecipeUnique::Id(bread.sandwich.id)))
        .unwrap()
        .unwrap();
    assert_eq!(sandwich.lines.len(), 1);
    match &sandwich.lines[0].component {
        Component::SubRecipe(recipe) => assert_eq!(recipe.id, bread.bread.id),
        other => panic!("unexpected component {other:?}"),
    }

    let missing = recipe_detail(
        &db.client,
        &RecipeUnique::Id(recipe_catalog::database::models::RecipeId::new(999)),
    )
    .unwrap();
    assert!(missing.is_none());
}

#[test]
fn relations_load_for_many_parents() {
    let db = common::connect();
    let bread = common::seed_bread(&db.client);
    let soup = db
        .client
        .categories()
        .create(CategoryCreate::new("Soup"))
        .unwrap();
    for name in ["Rye", "Sourdough"] {
        db.client
            .recipes()
            .create(RecipeCreate::new(name, "Bake.").category(bread.category.id))
            .unwrap();
    }

    let parents = vec![bread.category.clone(), soup];
    let children = Category::RECIPES
        .include(
            &db.client,
            &parents,
            FindMany::new().desc(RecipeField::Name).take(2),
        )
        .unwrap();
    let names: Vec<Vec<&str>> = children
        .iter()
        .map(|c| c.iter().map(|r| r.name.as_str()).collect())
        .collect();
    assert_eq!(names, vec![vec!["Sourdough", "Rye"], vec![]]);

    let all = Category::RECIPES
        .fetch(&db.client, &bread.category, FindMany::new())
        .unwrap();
    assert_eq!(all.len(), 3);

    let error = Category::RECIPES
        .include(
            &db.client,
            &parents,
            FindMany::new().cursor(RecipeUnique::Id(bread.bread.id)),
        )
        .unwrap_err();
    assert!(matches!(error, Error::Validation(_)));
}

#[test]
fn upsert_creates_then_updates() {
    let db = common::connect();
    let categories = db.client.categories();
    let key = CategoryUnique::Name("Pasta".into());
    let update = || CategoryUpdate {
        description: Some(Some("Noodles".into())),
        ..Default::default()
    };

    let created = categories
        .upsert(&key, CategoryCreate::new("Pasta"), update())
        .unwrap();
    assert_eq!(created.description, None);

    let updated = categories
        .upsert(&key, CategoryCreate::new("Pasta"), update())
        .unwrap();
    assert_eq!(updated.id, created.id);
    assert_eq!(updated.description.as_deref(), Some("Noodles"));
    assert_eq!(categories.count(None).unwrap(), 1);
}

#[test]
fn create_many_can_skip_duplicates() {
    let db = common::connect();
    let categories = db.client.categories();
    let inputs = |names: &[&str]| -> Vec<CategoryCreate> {
        names.iter().map(|n| CategoryCreate::new(*n)).collect()
    };

    assert_eq!(categories.create_many(inputs(&["A", "B"]), false).unwrap(), 2);
    assert_eq!(categories.create_many(inputs(&["B", "C"]), true).unwrap(), 1);

    let error = categories
        .create_many(inputs(&["D", "A"]), false)
        .unwrap_err();
    assert_eq!(error.code(), Some(ErrorCode::UniqueConstraintFailed));
    // Nothing from the failed call was kept.
    assert_eq!(categories.count(None).unwrap(), 3);
    assert_eq!(categories.create_many(vec![], false).unwrap(), 0);
}

#[test]
fn omitted_fields_stay_out_of_records() {
    let db = common::connect_with(|config| config.with_omit("User", &["password"]));
    let hash = recipe_catalog::database::models::hash_password("hunter2", 4).unwrap();
    let user = db
        .client
        .users()
        .create(UserCreate::new("cook@example.com", hash).name("Cook"))
        .unwrap();
    assert!(user.check_password("hunter2").unwrap());

    let records = db
        .client
        .users()
        .find_many_records(FindMany::new(), Selection::Default)
        .unwrap();
    assert_eq!(records.len(), 1);
    assert!(!records[0].contains("password"));
    assert_eq!(
        records[0].get("email"),
        Some(&Value::Text("cook@example.com".into()))
    );

    let only = db
        .client
        .users()
        .find_many_records(
            FindMany::new(),
            Selection::Only(vec![UserField::Email, UserField::Password]),
        )
        .unwrap();
    assert_eq!(only[0].columns().collect::<Vec<_>>(), vec!["email", "password"]);

    let json = serde_json::to_value(&user).unwrap();
    assert!(json.get("password").is_none());

    let by_email = db
        .client
        .users()
        .find_unique(&UserUnique::Email("cook@example.com".into()))
        .unwrap();
    assert_eq!(by_email.map(|u| u.id), Some(user.id));
}

#[test]
fn unknown_omit_rules_fail_to_connect() {
    let dir = tempfile::tempdir().unwrap();
    let config = common::config(&dir).with_omit("User", &["shoe_size"]);
    let error = recipe_catalog::Client::connect(config).unwrap_err();
    assert!(matches!(error, Error::Initialization(_)));

    let config = common::config(&dir).with_omit("Shoe", &["size"]);
    let error = recipe_catalog::Client::connect(config).unwrap_err();
    assert!(matches!(error, Error::Initialization(_)));
}

#[test]
fn delete_many_and_update_many_count_rows() {
    let db = common::connect();
    let categories = db.client.categories();
    for name in ["Bread", "Brunch", "Soup"] {
        categories.create(CategoryCreate::new(name)).unwrap();
    }

    let starts_with_br = || {
        Where::starts_with(
            CategoryField::Name,
            "br",
            recipe_catalog::query::QueryMode::Insensitive,
        )
    };
    let changed = categories
        .update_many(
            Some(starts_with_br()),
            CategoryUpdate {
                description: Some(Some("Morning".into())),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(changed, 2);
    assert_eq!(categories.delete_many(Some(starts_with_br())).unwrap(), 2);
    assert_eq!(categories.delete_many(None).unwrap(), 1);
}
