// Copyright 2023 Remi Bernotavicius

//! SQL functions and collations every pooled connection carries.
//!
//! Decimals are stored as normalized text. The `decimal` collation orders that text by numeric
//! value, so comparisons, sorting and `MIN`/`MAX` stay exact. `decimal_sum` and `decimal_avg`
//! add them up without going through floating point.

use super::Connection;
use diesel::define_sql_function;
use diesel::sql_types::{Nullable, Text};
use diesel::sqlite::SqliteAggregateFunction;
use diesel::QueryResult;
use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::str::FromStr as _;

pub const DECIMAL_COLLATION: &str = "decimal";

/// What the decimal aggregates return when the total doesn't fit a decimal.
pub(crate) const OVERFLOWED: &str = "overflow";

define_sql_function! {
    /// Lower-cases text the way `str::to_lowercase` does, including non-ASCII letters.
    fn fold_case(text: Nullable<Text>) -> Nullable<Text>;
}

define_sql_function! {
    #[aggregate]
    fn decimal_sum(value: Nullable<Text>) -> Nullable<Text>;
}

define_sql_function! {
    #[aggregate]
    fn decimal_avg(value: Nullable<Text>) -> Nullable<Text>;
}

/// Orders decimal text by value. Text which isn't a decimal sorts after every decimal.
pub fn compare_decimals(a: &str, b: &str) -> Ordering {
    match (Decimal::from_str(a), Decimal::from_str(b)) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

#[derive(Debug, Default)]
struct Total {
    sum: Decimal,
    count: u64,
    overflowed: bool,
}

impl Total {
    fn add(&mut self, value: Option<String>) {
        let Some(value) = value else {
            return;
        };
        self.count += 1;
        let next = Decimal::from_str(&value)
            .ok()
            .and_then(|v| self.sum.checked_add(v));
        match next {
            Some(sum) => self.sum = sum,
            None => self.overflowed = true,
        }
    }

    fn finish(self, f: impl FnOnce(Decimal, u64) -> Option<Decimal>) -> Option<String> {
        if self.count == 0 {
            return None;
        }
        if self.overflowed {
            return Some(OVERFLOWED.into());
        }
        Some(match f(self.sum, self.count) {
            Some(total) => total.normalize().to_string(),
            None => OVERFLOWED.into(),
        })
    }
}

#[derive(Debug, Default)]
struct DecimalSum(Total);

impl SqliteAggregateFunction<Option<String>> for DecimalSum {
    type Output = Option<String>;

    fn step(&mut self, value: Option<String>) {
        self.0.add(value);
    }

    fn finalize(aggregator: Option<Self>) -> Option<String> {
        aggregator.and_then(|a| a.0.finish(|sum, _| Some(sum)))
    }
}

#[derive(Debug, Default)]
struct DecimalAvg(Total);

impl SqliteAggregateFunction<Option<String>> for DecimalAvg {
    type Output = Option<String>;

    fn step(&mut self, value: Option<String>) {
        self.0.add(value);
    }

    fn finalize(aggregator: Option<Self>) -> Option<String> {
        aggregator.and_then(|a| {
            a.0.finish(|sum, count| sum.checked_div(Decimal::from(count)))
        })
    }
}

pub(crate) fn register(conn: &mut Connection) -> QueryResult<()> {
    conn.register_collation(DECIMAL_COLLATION, compare_decimals)?;
    fold_case_utils::register_impl(conn, |text: Option<String>| {
        text.map(|t| t.to_lowercase())
    })?;
    decimal_sum_utils::register_impl::<DecimalSum, _>(conn)?;
    decimal_avg_utils::register_impl::<DecimalAvg, _>(conn)?;
    Ok(())
}

#[test]
fn decimals_compare_by_value() {
    assert_eq!(compare_decimals("0.10000000000000001", "0.1"), Ordering::Greater);
    assert_eq!(compare_decimals("10", "9.5"), Ordering::Greater);
    assert_eq!(compare_decimals("-2", "1"), Ordering::Less);
    assert_eq!(compare_decimals("1.50", "1.5"), Ordering::Equal);
    assert_eq!(compare_decimals("x", "1"), Ordering::Greater);
}

#[test]
fn registered_functions_run() {
    use diesel::sql_types::Integer;
    use diesel::{Connection as _, QueryableByName, RunQueryDsl as _};

    #[derive(QueryableByName)]
    struct Row {
        #[diesel(sql_type = Nullable<Text>)]
        folded: Option<String>,
        #[diesel(sql_type = Nullable<Text>)]
        total: Option<String>,
        #[diesel(sql_type = Nullable<Text>)]
        average: Option<String>,
        #[diesel(sql_type = Nullable<Text>)]
        largest: Option<String>,
        #[diesel(sql_type = Integer)]
        above: i32,
    }

    let mut conn = Connection::establish(":memory:").unwrap();
    register(&mut conn).unwrap();
    let row = diesel::sql_query(
        "WITH v(q) AS (VALUES ('0.1'), ('0.2'), ('10.5'), (NULL)) \
         SELECT fold_case('ÉPICE') AS folded, decimal_sum(q) AS total, \
         decimal_avg(q) AS average, MAX(q COLLATE decimal) AS largest, \
         SUM(q COLLATE decimal > '9.5') AS above FROM v",
    )
    .get_result::<Row>(&mut conn)
    .unwrap();
    assert_eq!(row.folded.as_deref(), Some("épice"));
    assert_eq!(row.total.as_deref(), Some("10.8"));
    assert_eq!(row.average.as_deref(), Some("3.6"));
    assert_eq!(row.largest.as_deref(), Some("10.5"));
    assert_eq!(row.above, 1);

    let empty = diesel::sql_query(
        "SELECT NULL AS folded, decimal_sum(q) AS total, decimal_avg(q) AS average, \
         MAX(q) AS largest, 0 AS above FROM (SELECT '1' AS q WHERE 0)",
    )
    .get_result::<Row>(&mut conn)
    .unwrap();
    assert_eq!(empty.total, None);
    assert_eq!(empty.average, None);
}
