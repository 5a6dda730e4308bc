// Copyright 2023 Remi Bernotavicius

mod common;

use diesel::sql_types::{BigInt, Text};
use diesel::QueryableByName;
use recipe_catalog::client::BatchOperation;
use recipe_catalog::database::models::{CategoryCreate, CategoryField, CategoryUnique};
use recipe_catalog::logging::LogEvent;
use recipe_catalog::query::{FindMany, Value, Where};
use recipe_catalog::{
    Client, ClientConfig, Error, ErrorCode, ErrorFormat, Executor as _, IsolationLevel,
    LogDefinition, LogLevel, Transaction, TransactionOptions,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[test]
fn failed_transactions_roll_back() {
    let db = common::connect();
    let result: recipe_catalog::Result<()> = db.client.transaction(|tx| {
        tx.categories().create(CategoryCreate::new("Soup"))?;
        assert_eq!(tx.categories().count(None)?, 1);
        Err(Error::Validation("changed my mind".into()))
    });
    assert!(matches!(result, Err(Error::Validation(_))));
    assert_eq!(db.client.categories().count(None).unwrap(), 0);

    let created = db
        .client
        .transaction(|tx| {
            let soup = tx.categories().create(CategoryCreate::new("Soup"))?;
            // Multi-statement operations nest as savepoints.
            tx.categories().upsert(
                &CategoryUnique::Name("Stew".into()),
                CategoryCreate::new("Stew"),
                Default::default(),
            )?;
            Ok(soup)
        })
        .unwrap();
    assert_eq!(created.name, "Soup");
    assert_eq!(db.client.categories().count(None).unwrap(), 2);
}

#[test]
fn batches_apply_together() {
    let db = common::connect();
    let create = |name: &'static str| -> BatchOperation<'static, String> {
        Box::new(move |tx: &Transaction<'_>| Ok(tx.categories().create(CategoryCreate::new(name))?.name))
    };

    let names = db.client.batch(vec![create("A"), create("B")]).unwrap();
    assert_eq!(names, vec!["A", "B"]);

    let error = db
        .client
        .batch(vec![create("C"), create("A")])
        .unwrap_err();
    assert_eq!(error.code(), Some(ErrorCode::UniqueConstraintFailed));
    assert_eq!(db.client.categories().count(None).unwrap(), 2);
}

#[test]
fn slow_transactions_expire() {
    let db = common::connect();
    let options = TransactionOptions {
        timeout_ms: 50,
        ..Default::default()
    };

    let error = db
        .client
        .transaction_with(options, |tx| {
            tx.categories().create(CategoryCreate::new("Soup"))?;
            std::thread::sleep(Duration::from_millis(100));
            tx.categories().count(None)
        })
        .unwrap_err();
    assert_eq!(error.code(), Some(ErrorCode::TransactionExpired));

    // Expiring after the last statement still rolls back.
    let error = db
        .client
        .transaction_with(options, |tx| {
            tx.categories().create(CategoryCreate::new("Stew"))?;
            std::thread::sleep(Duration::from_millis(100));
            Ok(())
        })
        .unwrap_err();
    assert_eq!(error.code(), Some(ErrorCode::TransactionExpired));
    assert_eq!(db.client.categories().count(None).unwrap(), 0);
}

#[test]
fn isolation_levels_run() {
    let db = common::connect();
    for level in [
        IsolationLevel::Serializable,
        IsolationLevel::ReadUncommitted,
        IsolationLevel::ReadCommitted,
    ] {
        let options = TransactionOptions {
            isolation_level: Some(level),
            ..Default::default()
        };
        db.client
            .transaction_with(options, |tx| {
                tx.categories()
                    .create(CategoryCreate::new(format!("{level:?}")))
            })
            .unwrap();
    }
    assert_eq!(db.client.categories().count(None).unwrap(), 3);
}

#[derive(QueryableByName, Debug, PartialEq)]
struct NameCount {
    #[diesel(sql_type = Text)]
    name: String,
    #[diesel(sql_type = BigInt)]
    lines: i64,
}

#[test]
fn raw_queries() {
    let db = common::connect();
    let bread = common::seed_bread(&db.client);

    let changed = db
        .client
        .execute_raw(
            "UPDATE ingredients SET description = ? WHERE name IN (?, ?)",
            vec![
                Value::Text("dry".into()),
                Value::Text("flour".into()),
                Value::Text("salt".into()),
            ],
        )
        .unwrap();
    assert_eq!(changed, 2);

    let rows = db
        .client
        .query_raw(
            "SELECT name, description FROM ingredients WHERE id = ?",
            vec![bread.water.id.into()],
        )
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("name"), Some("water"));
    assert_eq!(rows[0].get("description"), None);
    assert_eq!(rows[0].columns().collect::<Vec<_>>(), vec!["name", "description"]);

    let counts: Vec<NameCount> = db
        .client
        .query_raw_as(
            "SELECT r.name AS name, COUNT(q.id) AS lines FROM recipes r \
             JOIN unit_quantities q ON q.recipe_id = r.id \
             GROUP BY r.id ORDER BY lines DESC",
            vec![],
        )
        .unwrap();
    assert_eq!(
        counts,
        vec![
            NameCount {
                name: "Basic Bread".into(),
                lines: 3
            },
            NameCount {
                name: "Sandwich".into(),
                lines: 1
            },
        ]
    );

    let error = db.client.query_raw("SELECT * FROM nowhere", vec![]).unwrap_err();
    assert!(matches!(error, Error::UnknownRequest(_)));

    let json = serde_json::to_value(&rows[0]).unwrap();
    assert_eq!(json, serde_json::json!({"name": "water", "description": null}));
}

#[test]
fn query_events_reach_listeners() {
    let db = common::connect_with(|config| {
        config
            .with_log(LogDefinition::event(LogLevel::Query))
            .with_log(LogDefinition::event(LogLevel::Error))
    });
    let queries = Arc::new(Mutex::new(vec![]));
    let errors = Arc::new(Mutex::new(vec![]));
    {
        let queries = queries.clone();
        db.client.on(LogLevel::Query, move |event| {
            if let LogEvent::Query(q) = event {
                queries.lock().unwrap().push((q.query.clone(), q.params.clone()));
            }
        });
        let errors = errors.clone();
        db.client.on(LogLevel::Error, move |event| {
            if let LogEvent::Error(e) = event {
                errors.lock().unwrap().push(e.message.clone());
            }
        });
    }

    db.client
        .categories()
        .find_many(FindMany::new().filter(Where::equals(CategoryField::Name, "Soup".to_owned())))
        .unwrap();
    let seen = queries.lock().unwrap().clone();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].0.starts_with("SELECT * FROM \"categories\""));
    assert_eq!(seen[0].1, "[\"Soup\"]");
    assert!(errors.lock().unwrap().is_empty());

    db.client.query_raw("SELECT * FROM nowhere", vec![]).unwrap_err();
    assert_eq!(errors.lock().unwrap().len(), 1);
}

#[test]
fn bad_datasources_fail_to_initialize() {
    let config = ClientConfig {
        connect_timeout_ms: 500,
        ..Default::default()
    }
    .with_datasource_url("/nonexistent/directory/catalog.sqlite");
    let error = Client::connect(config).unwrap_err();
    assert!(matches!(error, Error::Initialization(_)));
    assert!(error.render(ErrorFormat::Minimal).starts_with("initialization error"));
}

#[test]
fn config_files_are_read() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.toml");
    let database = dir.path().join("catalog.sqlite");
    std::fs::write(
        &path,
        format!(
            "datasource_url = {:?}\n\
             error_format = \"minimal\"\n\
             [transaction_options]\n\
             timeout_ms = 1000\n",
            database.to_string_lossy()
        ),
    )
    .unwrap();

    let config = ClientConfig::from_toml_file(&path).unwrap();
    assert_eq!(config.transaction_options.timeout_ms, 1000);
    let client = Client::connect(config).unwrap();
    let error = client
        .categories()
        .find_unique_or_throw(&CategoryUnique::Name("Soup".into()))
        .unwrap_err();
    assert!(client.render_error(&error).starts_with("known request error[P2025]"));
    assert!(database.exists());
}
