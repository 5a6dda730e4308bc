// Copyright 2023 Remi Bernotavicius

//! The query model shared by every repository: values, field metadata, filters, sorting,
//! pagination and field selection. Everything here is validated before it is turned into SQL.

use crate::error::{unknown, Result};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use std::hash::Hash;
use std::str::FromStr as _;

mod args;
mod filter;
mod order;
mod select;
pub(crate) mod statement;

pub(crate) use args::check_page;
pub use args::FindMany;
pub use filter::{Condition, QueryMode, Where};
pub use order::{NullsOrder, OrderBy, SortOrder};
pub use select::{Record, Selection};

/// The storage kind of a field. Decides which conditions, sorts and aggregates are allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Int,
    Decimal,
    Text,
    DateTime,
    Enum(&'static [&'static str]),
    List,
}

impl FieldKind {
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Int | Self::Decimal)
    }

    pub fn is_orderable(self) -> bool {
        !matches!(self, Self::List)
    }

    /// Whether `value` can be compared against a field of this kind.
    pub fn accepts(self, value: &Value) -> bool {
        match (self, value) {
            (Self::Int, Value::Int(_)) => true,
            (Self::Decimal, Value::Decimal(_) | Value::Int(_)) => true,
            (Self::Text, Value::Text(_)) => true,
            (Self::Enum(variants), Value::Text(v)) => variants.contains(&v.as_str()),
            (Self::DateTime, Value::DateTime(_)) => true,
            (Self::List, Value::List(_)) => true,
            _ => false,
        }
    }

    /// Brings a value into the representation stored for this kind.
    pub(crate) fn coerce(self, value: Value) -> Value {
        match (self, value) {
            (Self::Decimal, Value::Int(i)) => Value::Decimal(Decimal::from(i)),
            (_, value) => value,
        }
    }
}

/// A column of a model. Implemented by the per-model field enums (`RecipeField`, ...).
pub trait Field:
    Copy
    + Eq
    + Ord
    + Hash
    + fmt::Debug
    + Into<&'static str>
    + strum::IntoEnumIterator
    + Send
    + Sync
    + 'static
{
    fn kind(self) -> FieldKind;

    fn is_nullable(self) -> bool {
        false
    }

    fn column(self) -> &'static str {
        self.into()
    }

    fn all() -> Vec<Self> {
        Self::iter().collect()
    }
}

/// A dynamically typed column value, used for filter arguments, raw query parameters, group
/// keys and projected records.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Int(i64),
    Decimal(Decimal),
    Text(String),
    DateTime(NaiveDateTime),
    List(Vec<String>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Self::Int(i) => Some(Decimal::from(*i)),
            Self::Decimal(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Reads SQLite's text rendering of a value of `kind`.
    pub(crate) fn decode(kind: FieldKind, text: Option<&str>) -> Result<Self> {
        let Some(text) = text else {
            return Ok(Self::Null);
        };
        let invalid = || unknown!("cannot read {text:?} as a {kind:?} value");
        Ok(match kind {
            FieldKind::Int => Self::Int(text.parse().map_err(|_| invalid())?),
            FieldKind::Decimal => {
                Self::Decimal(Decimal::from_str(text).map_err(|_| invalid())?.normalize())
            }
            FieldKind::Text | FieldKind::Enum(_) => Self::Text(text.to_owned()),
            FieldKind::DateTime => Self::DateTime(
                NaiveDateTime::parse_from_str(text, "%F %T%.f").map_err(|_| invalid())?,
            ),
            FieldKind::List => Self::List(serde_json::from_str(text).map_err(|_| invalid())?),
        })
    }

    pub(crate) fn encode_list(list: &[String]) -> String {
        serde_json::to_string(list).unwrap_or_else(|_| "[]".into())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Decimal(d) => write!(f, "{}", d.normalize()),
            Self::Text(s) => write!(f, "{s:?}"),
            Self::DateTime(t) => write!(f, "\"{t}\""),
            Self::List(l) => write!(f, "{}", Self::encode_list(l)),
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Self::Decimal(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.into())
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Self::DateTime(v)
    }
}

impl From<Vec<String>> for Value {
    fn from(v: Vec<String>) -> Self {
        Self::List(v)
    }
}

impl From<Vec<&str>> for Value {
    fn from(v: Vec<&str>) -> Self {
        Self::List(v.into_iter().map(String::from).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

#[test]
fn value_display() {
    use std::str::FromStr as _;

    assert_eq!(Value::from("flour").to_string(), "\"flour\"");
    assert_eq!(
        Value::Decimal(Decimal::from_str("500.00").unwrap()).to_string(),
        "500"
    );
    assert_eq!(
        Value::from(vec!["vegan", "quick"]).to_string(),
        r#"["vegan","quick"]"#
    );
    assert_eq!(Value::Null.to_string(), "NULL");
}

#[test]
fn values_decode_from_sqlite_text() {
    use chrono::NaiveDate;

    assert_eq!(Value::decode(FieldKind::Int, Some("42")).unwrap(), Value::Int(42));
    assert_eq!(
        Value::decode(FieldKind::Decimal, Some("0.10000000000000001")).unwrap(),
        Value::Decimal(Decimal::new(10000000000000001, 17))
    );
    assert_eq!(Value::decode(FieldKind::Text, None).unwrap(), Value::Null);
    assert_eq!(
        Value::decode(FieldKind::DateTime, Some("2024-03-02 18:15:00.5")).unwrap(),
        Value::DateTime(
            NaiveDate::from_ymd_opt(2024, 3, 2)
                .unwrap()
                .and_hms_milli_opt(18, 15, 0, 500)
                .unwrap()
        )
    );
    assert_eq!(
        Value::decode(FieldKind::List, Some(r#"["vegan"]"#)).unwrap(),
        Value::from(vec!["vegan"])
    );
    assert!(matches!(
        Value::decode(FieldKind::Int, Some("1.5")),
        Err(crate::Error::UnknownRequest(_))
    ));
}

#[test]
fn field_kind_accepts() {
    const UNITS: &[&str] = &["WEIGHT", "VOLUME"];

    assert!(FieldKind::Decimal.accepts(&Value::Int(3)));
    assert!(!FieldKind::Int.accepts(&Value::from("3")));
    assert!(FieldKind::Enum(UNITS).accepts(&Value::from("WEIGHT")));
    assert!(!FieldKind::Enum(UNITS).accepts(&Value::from("weight")));
    assert!(!FieldKind::List.accepts(&Value::from("vegan")));
    assert_eq!(
        FieldKind::Decimal.coerce(Value::Int(3)),
        Value::Decimal(Decimal::from(3))
    );
}
