// Copyright 2023 Remi Bernotavicius

//! Query, info, warning and error events, written to the `log` facade or handed to listeners.

use crate::query::statement::Statement;
use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    #[display("query")]
    Query,
    #[display("info")]
    Info,
    #[display("warn")]
    Warn,
    #[display("error")]
    Error,
}

impl LogLevel {
    /// The `log` level stdout events of this level are written at.
    pub fn filter(self) -> log::LevelFilter {
        match self {
            Self::Query | Self::Info => log::LevelFilter::Info,
            Self::Warn => log::LevelFilter::Warn,
            Self::Error => log::LevelFilter::Error,
        }
    }
}

/// The `log` level a logger needs for every stdout definition to show up. Never quieter than
/// warnings.
pub fn stdout_filter(definitions: &[LogDefinition]) -> log::LevelFilter {
    definitions
        .iter()
        .filter(|d| d.emit == LogEmit::Stdout)
        .map(|d| d.level.filter())
        .fold(log::LevelFilter::Warn, Ord::max)
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogEmit {
    #[default]
    Stdout,
    Event,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct LogDefinition {
    pub level: LogLevel,
    #[serde(default)]
    pub emit: LogEmit,
}

impl LogDefinition {
    pub fn stdout(level: LogLevel) -> Self {
        Self {
            level,
            emit: LogEmit::Stdout,
        }
    }

    pub fn event(level: LogLevel) -> Self {
        Self {
            level,
            emit: LogEmit::Event,
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueryEvent {
    pub timestamp: DateTime<Utc>,
    pub query: String,
    pub params: String,
    pub duration: Duration,
    pub target: &'static str,
}

#[derive(Debug, Clone)]
pub struct MessageEvent {
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub target: &'static str,
}

#[derive(Debug, Clone)]
pub enum LogEvent {
    Query(QueryEvent),
    Info(MessageEvent),
    Warn(MessageEvent),
    Error(MessageEvent),
}

impl LogEvent {
    pub fn level(&self) -> LogLevel {
        match self {
            Self::Query(_) => LogLevel::Query,
            Self::Info(_) => LogLevel::Info,
            Self::Warn(_) => LogLevel::Warn,
            Self::Error(_) => LogLevel::Error,
        }
    }
}

const QUERY_TARGET: &str = "recipe_catalog::query";
const CLIENT_TARGET: &str = "recipe_catalog::client";

type Listener = Arc<dyn Fn(&LogEvent) + Send + Sync>;

#[derive(Default)]
struct Inner {
    stdout: BTreeSet<LogLevel>,
    events: BTreeSet<LogLevel>,
    listeners: RwLock<Vec<(LogLevel, Listener)>>,
}

/// Where the events of one client go. Cloning shares the listeners.
#[derive(Clone, Default)]
pub struct QueryLog {
    inner: Arc<Inner>,
}

impl fmt::Debug for QueryLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryLog")
            .field("stdout", &self.inner.stdout)
            .field("events", &self.inner.events)
            .finish_non_exhaustive()
    }
}

impl QueryLog {
    pub fn new(definitions: &[LogDefinition]) -> Self {
        let select = |emit| {
            definitions
                .iter()
                .filter(|d| d.emit == emit)
                .map(|d| d.level)
                .collect()
        };
        Self {
            inner: Arc::new(Inner {
                stdout: select(LogEmit::Stdout),
                events: select(LogEmit::Event),
                listeners: Default::default(),
            }),
        }
    }

    /// Registers a listener for one level. It only hears events for levels configured with
    /// [`LogEmit::Event`].
    pub fn on(&self, level: LogLevel, listener: impl Fn(&LogEvent) + Send + Sync + 'static) {
        if !self.inner.events.contains(&level) {
            log::warn!(
                target: CLIENT_TARGET,
                "listener registered for `{level}` events, but that level doesn't emit events"
            );
        }
        self.inner
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((level, Arc::new(listener)));
    }

    fn enabled(&self, level: LogLevel) -> bool {
        self.inner.stdout.contains(&level) || self.inner.events.contains(&level)
    }

    fn emit(&self, event: LogEvent) {
        let level = event.level();
        if self.inner.stdout.contains(&level) {
            match &event {
                LogEvent::Query(q) => log::info!(
                    target: QUERY_TARGET,
                    "{} {} ({}ms)",
                    q.query,
                    q.params,
                    q.duration.as_millis()
                ),
                LogEvent::Info(m) => log::info!(target: m.target, "{}", m.message),
                LogEvent::Warn(m) => log::warn!(target: m.target, "{}", m.message),
                LogEvent::Error(m) => log::error!(target: m.target, "{}", m.message),
            }
        }
        if self.inner.events.contains(&level) {
            // Listeners may register more listeners, so call them without holding the lock.
            let listeners: Vec<Listener> = self
                .inner
                .listeners
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .iter()
                .filter(|(l, _)| *l == level)
                .map(|(_, listener)| listener.clone())
                .collect();
            for listener in listeners {
                listener(&event);
            }
        }
    }

    fn message(&self, level: LogLevel, message: impl fmt::Display) {
        if !self.enabled(level) {
            return;
        }
        let event = MessageEvent {
            timestamp: Utc::now(),
            message: message.to_string(),
            target: CLIENT_TARGET,
        };
        self.emit(match level {
            LogLevel::Info => LogEvent::Info(event),
            LogLevel::Warn => LogEvent::Warn(event),
            _ => LogEvent::Error(event),
        });
    }

    pub(crate) fn info(&self, message: impl fmt::Display) {
        self.message(LogLevel::Info, message)
    }

    pub(crate) fn warn(&self, message: impl fmt::Display) {
        self.message(LogLevel::Warn, message)
    }

    pub(crate) fn error(&self, message: impl fmt::Display) {
        self.message(LogLevel::Error, message)
    }

    pub(crate) fn statement(
        &self,
        statement: &Statement,
        duration: Duration,
        error: Option<&diesel::result::Error>,
    ) {
        self.raw_statement(statement.sql(), || statement.params_text(), duration, error)
    }

    fn raw_statement(
        &self,
        sql: &str,
        params: impl FnOnce() -> String,
        duration: Duration,
        error: Option<&diesel::result::Error>,
    ) {
        if self.enabled(LogLevel::Query) {
            self.emit(LogEvent::Query(QueryEvent {
                timestamp: Utc::now(),
                query: sql.to_owned(),
                params: params(),
                duration,
                target: QUERY_TARGET,
            }));
        }
        if let Some(error) = error {
            self.error(format_args!("statement failed: {error}: {sql}"));
        }
    }
}

#[test]
fn events_reach_listeners_of_their_level() {
    use std::sync::Mutex;

    let log = QueryLog::new(&[
        LogDefinition::event(LogLevel::Query),
        LogDefinition::event(LogLevel::Error),
        LogDefinition::stdout(LogLevel::Info),
    ]);
    let seen = Arc::new(Mutex::new(vec![]));

    let queries = seen.clone();
    log.on(LogLevel::Query, move |event| {
        if let LogEvent::Query(q) = event {
            queries.lock().unwrap().push(format!("{} {}", q.query, q.params));
        }
    });
    let errors = seen.clone();
    log.on(LogLevel::Error, move |event| {
        if let LogEvent::Error(m) = event {
            errors.lock().unwrap().push(m.message.clone());
        }
    });

    let statement = Statement::with_params("SELECT ?", vec![1.into()]);
    log.statement(&statement, Duration::from_millis(3), None);
    log.info("not an event");
    log.error("boom");

    assert_eq!(*seen.lock().unwrap(), vec!["SELECT ? [1]", "boom"]);
}

#[test]
fn disabled_levels_are_dropped() {
    use std::sync::atomic::{AtomicUsize, Ordering};

    let log = QueryLog::new(&[]);
    let count = Arc::new(AtomicUsize::new(0));
    let counter = count.clone();
    log.on(LogLevel::Query, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    log.statement(&Statement::new("SELECT 1"), Duration::ZERO, None);
    assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[test]
fn stdout_definitions_pick_the_logger_level() {
    assert_eq!(stdout_filter(&[]), log::LevelFilter::Warn);
    assert_eq!(
        stdout_filter(&[LogDefinition::stdout(LogLevel::Error)]),
        log::LevelFilter::Warn
    );
    assert_eq!(
        stdout_filter(&[
            LogDefinition::stdout(LogLevel::Warn),
            LogDefinition::stdout(LogLevel::Query)
        ]),
        log::LevelFilter::Info
    );
    // Events go to listeners, not to the logger.
    assert_eq!(
        stdout_filter(&[LogDefinition::event(LogLevel::Query)]),
        log::LevelFilter::Warn
    );
    for level in [LogLevel::Query, LogLevel::Info, LogLevel::Warn, LogLevel::Error] {
        assert!(stdout_filter(&[LogDefinition::stdout(level)]) >= level.filter());
    }
}
