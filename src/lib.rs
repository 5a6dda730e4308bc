// Copyright 2023 Remi Bernotavicius

//! A typed data-access layer for a recipe catalog stored in SQLite: per-model repositories with
//! filtering, cursor pagination, aggregation and grouping, relations, transactions and raw SQL.

pub mod aggregate;
pub mod catalog;
pub mod client;
pub mod config;
pub mod database;
pub mod error;
pub mod logging;
pub mod model;
pub mod query;
pub mod relation;
pub mod repository;

pub use client::{BatchOperation, Client, Executor, RawRow, Transaction};
pub use config::{ClientConfig, IsolationLevel, OmitConfig, TransactionOptions};
pub use error::{Error, ErrorCode, ErrorFormat, Result};
pub use logging::{LogDefinition, LogEmit, LogEvent, LogLevel};
