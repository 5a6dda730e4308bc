// Copyright 2023 Remi Bernotavicius

mod common;

use recipe_catalog::aggregate::{Aggregate, AggregateKey, GroupBy, GroupOrder, Having};
use recipe_catalog::database::models::{
    Category, CategoryCreate, CategoryField, CategoryId, CategoryUnique, IngredientField, RecipeCreate,
    RecipeField, UnitOfMeasureField, UnitQuantityField, UnitType,
};
use recipe_catalog::database::models::{IngredientCreate, UnitQuantityCreate, UnitQuantityUnique};
use recipe_catalog::query::{Condition, FindMany, OrderBy, QueryMode, SortOrder, Value, Where};
use recipe_catalog::{Error, Executor as _};
use rust_decimal::Decimal;

fn seed_categories(db: &common::TestDb) -> Vec<CategoryId> {
    ["A", "B", "C", "D", "E"]
        .into_iter()
        .map(|name| {
            db.client
                .categories()
                .create(CategoryCreate::new(name))
                .unwrap()
                .id
        })
        .collect()
}

fn category_names(db: &common::TestDb, args: FindMany<Category>) -> Vec<String> {
    db.client
        .categories()
        .find_many(args)
        .unwrap()
        .into_iter()
        .map(|c| c.name)
        .collect()
}

#[test]
fn cursors_page_both_ways() {
    let db = common::connect();
    seed_categories(&db);
    let at_c = || {
        FindMany::new()
            .asc(CategoryField::Name)
            .cursor(CategoryUnique::Name("C".into()))
    };

    assert_eq!(category_names(&db, at_c().take(2)), vec!["C", "D"]);
    assert_eq!(category_names(&db, at_c().take(2).skip(1)), vec!["D", "E"]);
    assert_eq!(category_names(&db, at_c().take(-2)), vec!["B", "C"]);
    assert_eq!(category_names(&db, at_c().take(-5)), vec!["A", "B", "C"]);
    assert_eq!(category_names(&db, at_c()), vec!["C", "D", "E"]);

    let missing = FindMany::new().cursor(CategoryUnique::Name("Z".into())).take(2);
    assert!(category_names(&db, missing).is_empty());

    // Without an explicit order, pages follow the id.
    assert_eq!(category_names(&db, FindMany::new().take(-2)), vec!["D", "E"]);
    assert_eq!(
        category_names(&db, FindMany::new().desc(CategoryField::Name).skip(3)),
        vec!["B", "A"]
    );
}

#[test]
fn find_first_respects_order() {
    let db = common::connect();
    seed_categories(&db);
    let categories = db.client.categories();

    let last = categories
        .find_first(FindMany::new().desc(CategoryField::Name))
        .unwrap()
        .unwrap();
    assert_eq!(last.name, "E");

    let z = || FindMany::new().filter(Where::equals(CategoryField::Name, "Z".to_owned()));
    assert!(categories.find_first(z()).unwrap().is_none());
    assert!(categories.find_first_or_throw(z()).unwrap_err().is_not_found());
}

#[test]
fn nulls_are_placed_as_asked() {
    let db = common::connect();
    let recipes = db.client.recipes();
    recipes
        .create(RecipeCreate::new("Slow", "Wait.").times(10, 100))
        .unwrap();
    recipes.create(RecipeCreate::new("Unknown", "?")).unwrap();
    recipes
        .create(RecipeCreate::new("Quick", "Go.").times(5, 1))
        .unwrap();

    let names = |order: OrderBy<RecipeField>| {
        recipes
            .find_many(FindMany::new().order_by(order))
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect::<Vec<_>>()
    };
    assert_eq!(
        names(OrderBy::asc(RecipeField::PrepTimeMinutes).nulls_last()),
        vec!["Quick", "Slow", "Unknown"]
    );
    assert_eq!(
        names(OrderBy::asc(RecipeField::PrepTimeMinutes)),
        vec!["Unknown", "Quick", "Slow"]
    );
    assert_eq!(
        names(OrderBy::desc(RecipeField::PrepTimeMinutes).nulls_first()),
        vec!["Unknown", "Slow", "Quick"]
    );

    // Walking backwards over a nullable order keeps the requested placement.
    let tail = recipes
        .find_many(
            FindMany::new()
                .order_by(OrderBy::asc(RecipeField::PrepTimeMinutes).nulls_last())
                .take(-2),
        )
        .unwrap();
    assert_eq!(
        tail.into_iter().map(|r| r.name).collect::<Vec<_>>(),
        vec!["Slow", "Unknown"]
    );
}

#[test]
fn filters_combine() {
    let db = common::connect();
    let bread = common::seed_bread(&db.client);
    let ingredients = db.client.ingredients();
    let names = |filter: Where<IngredientField>| {
        ingredients
            .find_many(FindMany::new().filter(filter).asc(IngredientField::Name))
            .unwrap()
            .into_iter()
            .map(|i| i.name)
            .collect::<Vec<_>>()
    };

    assert_eq!(
        names(Where::contains(IngredientField::Name, "A", QueryMode::Insensitive)),
        vec!["salt", "water"]
    );
    assert!(names(Where::contains(IngredientField::Name, "A", QueryMode::Default)).is_empty());
    assert_eq!(
        names(Where::ends_with(IngredientField::Name, "r", QueryMode::Default)),
        vec!["flour", "water"]
    );
    assert_eq!(
        names(Where::is_in(IngredientField::Id, [bread.flour.id, bread.salt.id])),
        vec!["flour", "salt"]
    );
    assert_eq!(
        names(
            Where::equals(IngredientField::Name, "flour".to_owned())
                .or(Where::equals(IngredientField::Name, "salt".to_owned()))
                .not()
        ),
        vec!["water"]
    );
    assert_eq!(
        names(Where::is_in(IngredientField::Id, Vec::<Value>::new())),
        Vec::<String>::new()
    );
    assert_eq!(
        names(Where::not_in(IngredientField::Id, Vec::<Value>::new())).len(),
        3
    );
    assert_eq!(names(Where::is_null(IngredientField::IngredientCategoryId)).len(), 3);

    let units = db
        .client
        .units_of_measure()
        .find_many(FindMany::new().filter(Where::equals(
            UnitOfMeasureField::UnitType,
            UnitType::Volume,
        )))
        .unwrap();
    assert_eq!(units.len(), 1);
    assert_eq!(units[0].id, bread.cup.id);
}

#[test]
fn decimals_compare_by_value() {
    let db = common::connect();
    common::seed_bread(&db.client);
    let lines = db.client.unit_quantities();

    let in_range = lines
        .find_many(
            FindMany::new()
                .filter(Where::gt(UnitQuantityField::Quantity, 1))
                .filter(Where::lt(UnitQuantityField::Quantity, Decimal::new(4005, 1)))
                .asc(UnitQuantityField::Quantity),
        )
        .unwrap();
    let quantities: Vec<String> = in_range.iter().map(|l| l.quantity.to_string()).collect();
    assert_eq!(quantities, vec!["1.5", "9"]);

    let all: Vec<String> = lines
        .find_many(FindMany::new().asc(UnitQuantityField::Quantity))
        .unwrap()
        .iter()
        .map(|l| l.quantity.to_string())
        .collect();
    assert_eq!(all, vec!["0.5", "1.5", "9", "500"]);
}

#[test]
fn invalid_filters_are_rejected() {
    let db = common::connect();
    let recipes = db.client.recipes();

    let wrong_kind = Where::field(
        RecipeField::PrepTimeMinutes,
        Condition::Contains("5".into(), QueryMode::Default),
    );
    assert!(matches!(
        recipes.find_many(FindMany::new().filter(wrong_kind)),
        Err(Error::Validation(_))
    ));
    assert!(matches!(
        recipes.find_many(FindMany::new().filter(Where::equals(RecipeField::Name, 3))),
        Err(Error::Validation(_))
    ));
    assert!(matches!(
        recipes.find_many(FindMany::new().asc(RecipeField::Tags)),
        Err(Error::Validation(_))
    ));
    assert!(matches!(
        recipes.count(Some(Where::equals(RecipeField::Name, Value::Null))),
        Err(Error::Validation(_))
    ));
}

#[test]
fn aggregates_are_exact() {
    let db = common::connect();
    let bread = common::seed_bread(&db.client);
    let lines = db.client.unit_quantities();

    let sum = AggregateKey::sum(UnitQuantityField::Quantity);
    let min = AggregateKey::min(UnitQuantityField::Quantity);
    let max = AggregateKey::max(UnitQuantityField::Quantity);
    let result = lines
        .aggregate(
            Aggregate::new(
                FindMany::new().filter(Where::equals(UnitQuantityField::RecipeId, bread.bread.id)),
            )
            .select(AggregateKey::count_all())
            .select(sum)
            .select(min)
            .select(max),
        )
        .unwrap();
    assert_eq!(result.count_all(), Some(3));
    assert_eq!(result.get(&sum), Some(&Value::Decimal(Decimal::new(5105, 1))));
    assert_eq!(result.get(&min), Some(&Value::Decimal(Decimal::new(15, 1))));
    assert_eq!(result.get(&max), Some(&Value::Decimal(Decimal::from(500))));

    let empty = lines
        .aggregate(
            Aggregate::new(FindMany::new().filter(Where::equals(UnitQuantityField::Order, 99)))
                .select(AggregateKey::count_all())
                .select(sum),
        )
        .unwrap();
    assert_eq!(empty.count_all(), Some(0));
    assert_eq!(empty.get(&sum), Some(&Value::Null));

    let not_numeric = AggregateKey::sum(UnitQuantityField::CreatedAt);
    assert!(matches!(
        lines.aggregate(Aggregate::new(FindMany::new()).select(not_numeric)),
        Err(Error::Validation(_))
    ));
}

#[test]
fn groups_need_an_order_to_page() {
    let db = common::connect();
    let bread = common::seed_bread(&db.client);
    let lines = db.client.unit_quantities();
    let count = AggregateKey::count_all();

    let unordered = GroupBy::new([UnitQuantityField::RecipeId])
        .select(count)
        .take(1);
    assert!(matches!(lines.group_by(unordered), Err(Error::Validation(_))));

    let largest = lines
        .group_by(
            GroupBy::new([UnitQuantityField::RecipeId])
                .select(count)
                .order_by(GroupOrder::Aggregate(count, SortOrder::Desc))
                .take(1),
        )
        .unwrap();
    assert_eq!(largest.len(), 1);
    assert_eq!(
        largest[0].get(UnitQuantityField::RecipeId),
        Some(&Value::from(bread.bread.id))
    );
    assert_eq!(largest[0].aggregate(&count), Some(&Value::Int(3)));

    let by_unit = lines
        .group_by(
            GroupBy::new([UnitQuantityField::UnitId])
                .select(AggregateKey::sum(UnitQuantityField::Quantity))
                .having(Having::Aggregate(count, Condition::Gte(Value::Int(2))))
                .order_by(GroupOrder::Field(UnitQuantityField::UnitId, SortOrder::Asc)),
        )
        .unwrap();
    assert_eq!(by_unit.len(), 1);
    assert_eq!(
        by_unit[0].get(UnitQuantityField::UnitId),
        Some(&Value::from(bread.gram.id))
    );
    assert_eq!(
        by_unit[0].aggregate(&AggregateKey::sum(UnitQuantityField::Quantity)),
        Some(&Value::Decimal(Decimal::from(509)))
    );

    let unknown_field = GroupBy::new([UnitQuantityField::RecipeId])
        .order_by(GroupOrder::Field(UnitQuantityField::UnitId, SortOrder::Asc));
    assert!(matches!(lines.group_by(unknown_field), Err(Error::Validation(_))));
}

#[test]
fn recipes_group_by_category() {
    let db = common::connect();
    let bread = common::seed_bread(&db.client);
    let recipes = db.client.recipes();
    let count = AggregateKey::count_all();

    let unordered = GroupBy::new([RecipeField::CategoryId]).select(count).take(10);
    assert!(matches!(recipes.group_by(unordered), Err(Error::Validation(_))));

    let groups = recipes
        .group_by(
            GroupBy::new([RecipeField::CategoryId])
                .select(count)
                .order_by(GroupOrder::Field(RecipeField::CategoryId, SortOrder::Asc))
                .take(10),
        )
        .unwrap();
    let counts: Vec<_> = groups
        .iter()
        .map(|g| (g.get(RecipeField::CategoryId).cloned(), g.aggregate(&count).cloned()))
        .collect();
    assert_eq!(
        counts,
        vec![
            (Some(Value::Null), Some(Value::Int(1))),
            (Some(Value::from(bread.category.id)), Some(Value::Int(1))),
        ]
    );

    let json = serde_json::to_value(&groups[1]).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "category_id": bread.category.id.get(),
            "aggregates": {"count(*)": 1},
        })
    );
}

#[test]
fn averages_are_exact() {
    let db = common::connect();
    let bread = common::seed_bread(&db.client);
    let avg = AggregateKey::avg(UnitQuantityField::Quantity);
    let result = db
        .client
        .unit_quantities()
        .aggregate(
            Aggregate::new(
                FindMany::new()
                    .filter(Where::equals(UnitQuantityField::UnitId, bread.gram.id)),
            )
            .select(avg),
        )
        .unwrap();
    assert_eq!(result.get(&avg), Some(&Value::Decimal(Decimal::new(2545, 1))));
}

#[test]
fn counts_follow_filters() {
    let db = common::connect();
    let bread = common::seed_bread(&db.client);
    let recipes = db.client.recipes();

    assert_eq!(recipes.count(None).unwrap(), 2);
    assert_eq!(
        recipes
            .count(Some(Where::equals(RecipeField::CategoryId, bread.category.id)))
            .unwrap(),
        1
    );
    assert_eq!(
        recipes
            .count(Some(Where::equals(RecipeField::CategoryId, Value::Null)))
            .unwrap(),
        1
    );
}

#[test]
fn decimal_precision_survives_filters_and_cursors() {
    let db = common::connect();
    let bread = common::seed_bread(&db.client);
    let lines = db.client.unit_quantities();
    let tenth = Decimal::new(1, 1);
    let just_above = Decimal::new(10000000000000001, 17);
    let create = |quantity: Decimal| {
        lines
            .create(UnitQuantityCreate::ingredient(
                bread.sandwich.id,
                bread.salt.id,
                quantity,
                bread.gram.id,
            ))
            .unwrap()
    };
    let low = create(tenth);
    let high = create(just_above);
    let quantities = |args: FindMany<_>| {
        lines
            .find_many(args)
            .unwrap()
            .iter()
            .map(|l| l.quantity.to_string())
            .collect::<Vec<_>>()
    };

    assert_eq!(
        quantities(
            FindMany::new()
                .filter(Where::gt(UnitQuantityField::Quantity, tenth))
                .filter(Where::lt(UnitQuantityField::Quantity, 1))
                .asc(UnitQuantityField::Quantity)
        ),
        vec!["0.10000000000000001", "0.5"]
    );
    assert_eq!(
        quantities(FindMany::new().filter(Where::equals(UnitQuantityField::Quantity, tenth))),
        vec!["0.1"]
    );

    let by_quantity = || FindMany::new().asc(UnitQuantityField::Quantity);
    assert_eq!(
        quantities(by_quantity().cursor(UnitQuantityUnique::Id(low.id)).take(3)),
        vec!["0.1", "0.10000000000000001", "0.5"]
    );
    assert_eq!(
        quantities(by_quantity().cursor(UnitQuantityUnique::Id(high.id)).take(-2)),
        vec!["0.1", "0.10000000000000001"]
    );
    assert_eq!(
        quantities(by_quantity().cursor(UnitQuantityUnique::Id(high.id)).take(2)),
        vec!["0.10000000000000001", "0.5"]
    );

    let max = AggregateKey::max(UnitQuantityField::Quantity);
    let sum = AggregateKey::sum(UnitQuantityField::Quantity);
    let small = lines
        .aggregate(
            Aggregate::new(
                FindMany::new().filter(Where::lt(UnitQuantityField::Quantity, Decimal::new(2, 1))),
            )
            .select(max)
            .select(sum),
        )
        .unwrap();
    assert_eq!(small.get(&max), Some(&Value::Decimal(just_above)));
    assert_eq!(
        small.get(&sum),
        Some(&Value::Decimal(Decimal::new(20000000000000001, 17)))
    );

    // Aggregates cover exactly the page a cursor selects.
    let page = lines
        .aggregate(
            Aggregate::new(by_quantity().cursor(UnitQuantityUnique::Id(high.id)).take(2))
                .select(AggregateKey::count_all())
                .select(sum),
        )
        .unwrap();
    assert_eq!(page.count_all(), Some(2));
    assert_eq!(
        page.get(&sum),
        Some(&Value::Decimal(Decimal::new(60000000000000001, 17)))
    );
}

#[test]
fn insensitive_filters_fold_unicode() {
    let db = common::connect();
    let ingredients = db.client.ingredients();
    ingredients.create(IngredientCreate::new("Épice")).unwrap();
    ingredients.create(IngredientCreate::new("ÖL")).unwrap();
    let count = |filter: Where<IngredientField>| ingredients.count(Some(filter)).unwrap();

    assert_eq!(
        count(Where::contains(IngredientField::Name, "épice", QueryMode::Insensitive)),
        1
    );
    assert_eq!(
        count(Where::contains(IngredientField::Name, "épice", QueryMode::Default)),
        0
    );
    assert_eq!(
        count(Where::starts_with(IngredientField::Name, "öl", QueryMode::Insensitive)),
        1
    );
    assert_eq!(
        count(Where::ends_with(IngredientField::Name, "PICE", QueryMode::Insensitive)),
        1
    );
    assert_eq!(
        count(Where::starts_with(IngredientField::Name, "pice", QueryMode::Insensitive)),
        0
    );
}

#[test]
fn groups_compare_decimal_aggregates_by_value() {
    let db = common::connect();
    let bread = common::seed_bread(&db.client);
    let sum = AggregateKey::sum(UnitQuantityField::Quantity);

    // As text "509" sorts below "9.5".
    let heavy = db
        .client
        .unit_quantities()
        .group_by(
            GroupBy::new([UnitQuantityField::UnitId])
                .select(sum)
                .having(Having::Aggregate(sum, Condition::Gt(Value::Decimal(Decimal::new(95, 1)))))
                .order_by(GroupOrder::Aggregate(sum, SortOrder::Desc)),
        )
        .unwrap();
    assert_eq!(heavy.len(), 1);
    assert_eq!(heavy[0].get(UnitQuantityField::UnitId), Some(&Value::from(bread.gram.id)));
    assert_eq!(heavy[0].aggregate(&sum), Some(&Value::Decimal(Decimal::from(509))));

    let avg = AggregateKey::avg(UnitQuantityField::Order);
    let by_recipe = db
        .client
        .unit_quantities()
        .group_by(
            GroupBy::new([UnitQuantityField::RecipeId])
                .select(avg)
                .order_by(GroupOrder::Aggregate(avg, SortOrder::Asc))
                .skip(1)
                .take(1),
        )
        .unwrap();
    assert_eq!(by_recipe.len(), 1);
    assert_eq!(
        by_recipe[0].get(UnitQuantityField::RecipeId),
        Some(&Value::from(bread.bread.id))
    );
    assert_eq!(by_recipe[0].aggregate(&avg), Some(&Value::Decimal(Decimal::from(2))));
}

#[test]
fn pages_beyond_sqlite_limits_are_rejected() {
    let db = common::connect();
    let categories = db.client.categories();
    seed_categories(&db);

    assert!(matches!(
        categories.find_many(FindMany::new().take(i64::MIN)),
        Err(Error::Validation(_))
    ));
    assert!(matches!(
        categories.find_many(FindMany::new().skip(u64::MAX)),
        Err(Error::Validation(_))
    ));
    let groups = GroupBy::new([CategoryField::Name])
        .order_by(GroupOrder::Field(CategoryField::Name, SortOrder::Asc))
        .take(u64::MAX);
    assert!(matches!(categories.group_by(groups), Err(Error::Validation(_))));
    assert_eq!(
        categories
            .find_many(FindMany::new().take(i64::MAX).skip(3))
            .unwrap()
            .len(),
        2
    );
}
