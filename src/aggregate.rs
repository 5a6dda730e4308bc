// Copyright 2023 Remi Bernotavicius

//! Count, sum, average, minimum and maximum over rows, optionally grouped.
//!
//! Everything is computed by SQLite. Decimal columns hold normalized text, so their sums and
//! averages go through the `decimal_sum` and `decimal_avg` functions and their comparisons
//! through the `decimal` collation, never through floating point.

use crate::client::RawRow;
use crate::database::functions::OVERFLOWED;
use crate::error::{unknown, validation, Result};
use crate::model::Model;
use crate::query::statement::{comparable, quote, Statement};
use crate::query::{check_page, Condition, Field, FieldKind, FindMany, SortOrder, Value};
use derive_more::Display;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

fn column<F: Field>(table: &str, field: F) -> String {
    format!("{}.{}", quote(table), quote(field.column()))
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AggregateFn {
    #[display("count")]
    Count,
    #[display("avg")]
    Avg,
    #[display("sum")]
    Sum,
    #[display("min")]
    Min,
    #[display("max")]
    Max,
}

/// One aggregate to compute. A `None` field counts rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AggregateKey<F> {
    pub function: AggregateFn,
    pub field: Option<F>,
}

impl<F: Field> AggregateKey<F> {
    pub fn count_all() -> Self {
        Self {
            function: AggregateFn::Count,
            field: None,
        }
    }

    fn of(function: AggregateFn, field: F) -> Self {
        Self {
            function,
            field: Some(field),
        }
    }

    pub fn count(field: F) -> Self {
        Self::of(AggregateFn::Count, field)
    }

    pub fn avg(field: F) -> Self {
        Self::of(AggregateFn::Avg, field)
    }

    pub fn sum(field: F) -> Self {
        Self::of(AggregateFn::Sum, field)
    }

    pub fn min(field: F) -> Self {
        Self::of(AggregateFn::Min, field)
    }

    pub fn max(field: F) -> Self {
        Self::of(AggregateFn::Max, field)
    }

    fn check(&self) -> Result<()> {
        let Some(field) = self.field else {
            if self.function == AggregateFn::Count {
                return Ok(());
            }
            return Err(validation!("`{}` needs a field", self.function));
        };
        let kind = field.kind();
        match self.function {
            AggregateFn::Avg | AggregateFn::Sum if !kind.is_numeric() => Err(validation!(
                "cannot {} non-numeric field `{}`",
                self.function,
                field.column()
            )),
            AggregateFn::Min | AggregateFn::Max if kind == FieldKind::List => Err(validation!(
                "cannot take the {} of list field `{}`",
                self.function,
                field.column()
            )),
            _ => Ok(()),
        }
    }

    /// The kind of value the aggregate produces.
    fn result_kind(&self) -> FieldKind {
        match (self.function, self.field) {
            (AggregateFn::Count, _) | (_, None) => FieldKind::Int,
            (AggregateFn::Sum, Some(field)) if field.kind() == FieldKind::Int => FieldKind::Int,
            (AggregateFn::Sum | AggregateFn::Avg, Some(_)) => FieldKind::Decimal,
            (AggregateFn::Min | AggregateFn::Max, Some(field)) => field.kind(),
        }
    }

    fn name(&self) -> String {
        match self.field {
            Some(field) => format!("{}({})", self.function, field.column()),
            None => format!("{}(*)", self.function),
        }
    }

    fn to_sql(&self, table: &str) -> String {
        let Some(field) = self.field else {
            return "COUNT(*)".into();
        };
        let column = column(table, field);
        let integer = field.kind() == FieldKind::Int;
        match self.function {
            AggregateFn::Count => format!("COUNT({column})"),
            AggregateFn::Sum if integer => format!("SUM({column})"),
            AggregateFn::Sum => format!("decimal_sum({column})"),
            AggregateFn::Avg if integer => format!("decimal_avg(CAST({column} AS TEXT))"),
            AggregateFn::Avg => format!("decimal_avg({column})"),
            AggregateFn::Min => format!("MIN({})", comparable(&column, field.kind())),
            AggregateFn::Max => format!("MAX({})", comparable(&column, field.kind())),
        }
    }

    fn decode(&self, text: Option<&str>) -> Result<Value> {
        let kind = self.result_kind();
        if kind == FieldKind::Decimal && text == Some(OVERFLOWED) {
            return Err(unknown!("{} overflowed", self.name()));
        }
        Value::decode(kind, text)
    }
}

/// Computed aggregates by key.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregates<F>(BTreeMap<AggregateKey<F>, Value>);

impl<F: Field> Aggregates<F> {
    /// Reads `keys` from the `a0`, `a1`, ... columns of `row`.
    fn read(keys: &BTreeSet<AggregateKey<F>>, row: &RawRow) -> Result<Self> {
        keys.iter()
            .enumerate()
            .map(|(i, key)| Ok((*key, key.decode(row.get(&format!("a{i}")))?)))
            .collect::<Result<BTreeMap<_, _>>>()
            .map(Self)
    }

    pub fn get(&self, key: &AggregateKey<F>) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn count_all(&self) -> Option<i64> {
        self.get(&AggregateKey::count_all()).and_then(Value::as_i64)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AggregateKey<F>, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<F> Default for Aggregates<F> {
    fn default() -> Self {
        Self(BTreeMap::new())
    }
}

impl<F: Field> Serialize for Aggregates<F> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap as _;

        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            map.serialize_entry(&key.name(), value)?;
        }
        map.end()
    }
}

/// Aggregates over the rows selected by a [`FindMany`], including its pagination.
pub struct Aggregate<M: Model> {
    pub find: FindMany<M>,
    pub select: BTreeSet<AggregateKey<M::Field>>,
}

impl<M: Model> Aggregate<M> {
    pub fn new(find: FindMany<M>) -> Self {
        Self {
            find,
            select: BTreeSet::new(),
        }
    }

    pub fn select(mut self, key: AggregateKey<M::Field>) -> Self {
        self.select.insert(key);
        self
    }

    pub(crate) fn check(&self) -> Result<()> {
        self.find.check()?;
        self.select.iter().try_for_each(AggregateKey::check)
    }

    /// Wraps the statement selecting the rows in one computing the aggregates over them.
    pub(crate) fn to_statement(&self, rows: Statement) -> Statement {
        let outputs: Vec<String> = self
            .select
            .iter()
            .enumerate()
            .map(|(i, key)| format!("{} AS \"a{i}\"", key.to_sql(M::TABLE)))
            .collect();
        let mut statement = Statement::new(format!("SELECT {} FROM (", outputs.join(", ")));
        statement.append(rows);
        statement.push(&format!(") AS {}", quote(M::TABLE)));
        statement
    }

    pub(crate) fn read(&self, rows: &[RawRow]) -> Result<Aggregates<M::Field>> {
        let row = rows
            .first()
            .ok_or_else(|| unknown!("aggregate query returned no row"))?;
        Aggregates::read(&self.select, row)
    }
}

/// A filter over groups: their `by` fields or their aggregates.
#[derive(Debug, Clone, PartialEq)]
pub enum Having<F> {
    Field(F, Condition),
    Aggregate(AggregateKey<F>, Condition),
    And(Vec<Having<F>>),
    Or(Vec<Having<F>>),
    Not(Box<Having<F>>),
}

impl<F: Field> Having<F> {
    fn check(&self, by: &[F]) -> Result<()> {
        match self {
            Self::Field(field, condition) => {
                if !by.contains(field) {
                    return Err(validation!(
                        "having refers to `{}` which is not grouped by",
                        field.column()
                    ));
                }
                condition.check(*field)
            }
            Self::Aggregate(key, condition) => {
                key.check()?;
                match condition {
                    Condition::Contains(..)
                    | Condition::StartsWith(..)
                    | Condition::EndsWith(..)
                    | Condition::Has(_)
                    | Condition::HasEvery(_)
                    | Condition::HasSome(_)
                    | Condition::IsEmpty(_) => Err(validation!(
                        "having on {} only supports comparisons",
                        key.function
                    )),
                    _ => condition.check_against(key.result_kind(), &key.name(), true),
                }
            }
            Self::And(all) | Self::Or(all) => all.iter().try_for_each(|h| h.check(by)),
            Self::Not(inner) => inner.check(by),
        }
    }

    fn push_sql(&self, statement: &mut Statement, table: &str) {
        match self {
            Self::Field(field, condition) => {
                statement.push_comparison(&column(table, *field), field.kind(), condition);
            }
            Self::Aggregate(key, condition) => {
                statement.push_comparison(&key.to_sql(table), key.result_kind(), condition);
            }
            Self::And(all) => Self::push_junction(statement, table, all, " AND ", "1 = 1"),
            Self::Or(any) => Self::push_junction(statement, table, any, " OR ", "0 = 1"),
            Self::Not(inner) => {
                statement.push("NOT (");
                inner.push_sql(statement, table);
                statement.push(")");
            }
        }
    }

    fn push_junction(
        statement: &mut Statement,
        table: &str,
        parts: &[Self],
        separator: &str,
        empty: &str,
    ) {
        if parts.is_empty() {
            statement.push(empty);
            return;
        }
        statement.push("(");
        for (i, part) in parts.iter().enumerate() {
            if i > 0 {
                statement.push(separator);
            }
            part.push_sql(statement, table);
        }
        statement.push(")");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupOrder<F> {
    Field(F, SortOrder),
    Aggregate(AggregateKey<F>, SortOrder),
}

impl<F: Field> GroupOrder<F> {
    fn to_sql(&self, table: &str) -> String {
        match self {
            Self::Field(field, direction) => {
                format!("{} {direction}", comparable(&column(table, *field), field.kind()))
            }
            Self::Aggregate(key, direction) => {
                format!("{} {direction}", comparable(&key.to_sql(table), key.result_kind()))
            }
        }
    }
}

/// One group: the values it was grouped by and its aggregates.
#[derive(Debug, Clone, PartialEq)]
pub struct Group<F> {
    pub by: BTreeMap<F, Value>,
    pub aggregates: Aggregates<F>,
}

impl<F: Field> Group<F> {
    pub fn get(&self, field: F) -> Option<&Value> {
        self.by.get(&field)
    }

    pub fn aggregate(&self, key: &AggregateKey<F>) -> Option<&Value> {
        self.aggregates.get(key)
    }
}

impl<F: Field> Serialize for Group<F> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap as _;

        let mut map = serializer.serialize_map(Some(self.by.len() + 1))?;
        for (field, value) in &self.by {
            map.serialize_entry(field.column(), value)?;
        }
        map.serialize_entry("aggregates", &self.aggregates)?;
        map.end()
    }
}

/// Group rows by the distinct values of `by`, then filter, order and page the groups.
#[derive(Debug, Clone)]
pub struct GroupBy<F: Field> {
    pub by: Vec<F>,
    pub filter: Option<crate::query::Where<F>>,
    pub having: Option<Having<F>>,
    pub order_by: Vec<GroupOrder<F>>,
    pub take: Option<u64>,
    pub skip: Option<u64>,
    pub select: BTreeSet<AggregateKey<F>>,
}

impl<F: Field> GroupBy<F> {
    pub fn new(by: impl IntoIterator<Item = F>) -> Self {
        Self {
            by: by.into_iter().collect(),
            filter: None,
            having: None,
            order_by: vec![],
            take: None,
            skip: None,
            select: BTreeSet::new(),
        }
    }

    pub fn filter(mut self, filter: crate::query::Where<F>) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.and(filter),
            None => filter,
        });
        self
    }

    pub fn having(mut self, having: Having<F>) -> Self {
        self.having = Some(having);
        self
    }

    pub fn order_by(mut self, order: GroupOrder<F>) -> Self {
        self.order_by.push(order);
        self
    }

    pub fn take(mut self, take: u64) -> Self {
        self.take = Some(take);
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn select(mut self, key: AggregateKey<F>) -> Self {
        self.select.insert(key);
        self
    }

    pub(crate) fn check(&self) -> Result<()> {
        if self.by.is_empty() {
            return Err(validation!("group by needs at least one field"));
        }
        if let Some(field) = self.by.iter().find(|f| !f.kind().is_orderable()) {
            return Err(validation!("cannot group by list field `{}`", field.column()));
        }
        check_page(self.take, self.skip)?;
        if (self.take.is_some() || self.skip.is_some()) && self.order_by.is_empty() {
            return Err(validation!(
                "group by with take or skip needs an order_by, otherwise the page is undefined"
            ));
        }
        if let Some(filter) = &self.filter {
            filter.check()?;
        }
        self.select.iter().try_for_each(AggregateKey::check)?;
        for order in &self.order_by {
            match order {
                GroupOrder::Field(field, _) if !self.by.contains(field) => {
                    return Err(validation!(
                        "cannot order groups by `{}` which is not grouped by",
                        field.column()
                    ));
                }
                GroupOrder::Aggregate(key, _) => key.check()?,
                GroupOrder::Field(..) => {}
            }
        }
        if let Some(having) = &self.having {
            having.check(&self.by)?;
        }
        Ok(())
    }

    /// Compiles the grouping into one statement over `table`. Group values come back as the
    /// `g0`, `g1`, ... columns and the selected aggregates as `a0`, `a1`, ...
    pub(crate) fn to_statement(&self, table: &str) -> Result<Statement> {
        let outputs: Vec<String> = self
            .by
            .iter()
            .enumerate()
            .map(|(i, field)| format!("{} AS \"g{i}\"", column(table, *field)))
            .chain(
                self.select
                    .iter()
                    .enumerate()
                    .map(|(i, key)| format!("{} AS \"a{i}\"", key.to_sql(table))),
            )
            .collect();
        let mut statement =
            Statement::new(format!("SELECT {} FROM {}", outputs.join(", "), quote(table)));
        statement.push_where(table, self.filter.as_ref())?;

        let grouped: Vec<String> = self.by.iter().map(|f| column(table, *f)).collect();
        statement.push(&format!(" GROUP BY {}", grouped.join(", ")));
        if let Some(having) = &self.having {
            statement.push(" HAVING ");
            having.push_sql(&mut statement, table);
        }

        // Groups tied on every order come back in the order of their values.
        let orders: Vec<String> = self
            .order_by
            .iter()
            .map(|o| o.to_sql(table))
            .chain(
                self.by
                    .iter()
                    .map(|f| format!("{} ASC", comparable(&column(table, *f), f.kind()))),
            )
            .collect();
        statement.push(&format!(" ORDER BY {}", orders.join(", ")));
        statement.push_limit(self.take, self.skip);
        Ok(statement)
    }

    pub(crate) fn read(&self, rows: &[RawRow]) -> Result<Vec<Group<F>>> {
        rows.iter()
            .map(|row| {
                let by = self
                    .by
                    .iter()
                    .enumerate()
                    .map(|(i, field)| {
                        Ok((*field, Value::decode(field.kind(), row.get(&format!("g{i}")))?))
                    })
                    .collect::<Result<BTreeMap<_, _>>>()?;
                Ok(Group {
                    by,
                    aggregates: Aggregates::read(&self.select, row)?,
                })
            })
            .collect()
    }
}

#[test]
fn aggregates_compile_to_exact_sql() {
    use crate::database::models::{UnitQuantity, UnitQuantityField as F};

    let aggregate = Aggregate::<UnitQuantity>::new(FindMany::new())
        .select(AggregateKey::count_all())
        .select(AggregateKey::sum(F::Quantity))
        .select(AggregateKey::avg(F::Order))
        .select(AggregateKey::max(F::Quantity));
    aggregate.check().unwrap();
    let statement = aggregate.to_statement(Statement::new("SELECT * FROM \"unit_quantities\""));
    assert_eq!(
        statement.sql(),
        "SELECT COUNT(*) AS \"a0\", \
         decimal_avg(CAST(\"unit_quantities\".\"order\" AS TEXT)) AS \"a1\", \
         decimal_sum(\"unit_quantities\".\"quantity\") AS \"a2\", \
         MAX(\"unit_quantities\".\"quantity\" COLLATE decimal) AS \"a3\" \
         FROM (SELECT * FROM \"unit_quantities\") AS \"unit_quantities\""
    );
}

#[test]
fn aggregate_checks() {
    use crate::database::models::RecipeField as F;

    assert!(AggregateKey::sum(F::Name).check().is_err());
    assert!(AggregateKey::avg(F::PrepTimeMinutes).check().is_ok());
    assert!(AggregateKey::min(F::Tags).check().is_err());
    assert!(AggregateKey::min(F::Name).check().is_ok());
    assert!(AggregateKey::<F> {
        function: AggregateFn::Sum,
        field: None
    }
    .check()
    .is_err());
}

#[test]
fn group_by_checks() {
    use crate::database::models::RecipeField as F;

    let count = AggregateKey::count_all();
    assert!(GroupBy::<F>::new([]).check().is_err());
    assert!(GroupBy::new([F::CategoryId])
        .select(count)
        .take(10)
        .check()
        .is_err());
    assert!(GroupBy::new([F::CategoryId])
        .select(count)
        .order_by(GroupOrder::Field(F::CategoryId, SortOrder::Asc))
        .take(10)
        .check()
        .is_ok());
    assert!(GroupBy::new([F::CategoryId])
        .order_by(GroupOrder::Field(F::Name, SortOrder::Asc))
        .check()
        .is_err());
    assert!(GroupBy::new([F::CategoryId])
        .having(Having::Field(F::Name, Condition::Equals("x".into())))
        .check()
        .is_err());
    assert!(GroupBy::new([F::Tags]).check().is_err());
}

#[test]
fn groups_compile_to_one_statement() {
    use crate::database::models::UnitQuantityField as F;
    use crate::query::Where;

    let count = AggregateKey::count_all();
    let sum = AggregateKey::sum(F::Quantity);
    let group_by = GroupBy::new([F::RecipeId])
        .filter(Where::gt(F::Quantity, 1))
        .select(count)
        .having(Having::Aggregate(sum, Condition::Gt(Value::Int(2))))
        .order_by(GroupOrder::Aggregate(sum, SortOrder::Desc))
        .take(1);
    group_by.check().unwrap();
    let statement = group_by.to_statement("unit_quantities").unwrap();

    assert_eq!(
        statement.sql(),
        "SELECT \"unit_quantities\".\"recipe_id\" AS \"g0\", COUNT(*) AS \"a0\" \
         FROM \"unit_quantities\" \
         WHERE \"unit_quantities\".\"quantity\" COLLATE decimal > ? \
         GROUP BY \"unit_quantities\".\"recipe_id\" \
         HAVING decimal_sum(\"unit_quantities\".\"quantity\") COLLATE decimal > ? \
         ORDER BY decimal_sum(\"unit_quantities\".\"quantity\") COLLATE decimal DESC, \
         \"unit_quantities\".\"recipe_id\" ASC LIMIT 1"
    );
    assert_eq!(
        statement.params(),
        &[
            Value::Decimal(rust_decimal::Decimal::from(1)),
            Value::Decimal(rust_decimal::Decimal::from(2))
        ]
    );
}

#[test]
fn having_values_match_the_aggregate() {
    use crate::database::models::UnitQuantityField as F;

    let count = AggregateKey::<F>::count_all();
    let half = Value::Decimal(rust_decimal::Decimal::new(5, 1));
    let by_recipe = || GroupBy::new([F::RecipeId]).select(count);
    assert!(by_recipe()
        .having(Having::Aggregate(count, Condition::Gt(half.clone())))
        .check()
        .is_err());
    assert!(by_recipe()
        .having(Having::Aggregate(AggregateKey::avg(F::Order), Condition::Gt(half)))
        .check()
        .is_ok());
    assert!(by_recipe()
        .having(Having::Aggregate(count, Condition::Gte(Value::Int(2))))
        .check()
        .is_ok());
}
