// Copyright 2023 Remi Bernotavicius

//! Turns the query model into parametrized SQLite statements and runs them through diesel.

use super::{Condition, Field, FieldKind, OrderBy, QueryMode, Value, Where};
use crate::database::functions::DECIMAL_COLLATION;
use crate::database::Connection;
use crate::error::Result;
use crate::logging::QueryLog;
use diesel::query_builder::{BoxedSqlQuery, SqlQuery};
use diesel::sql_types::{BigInt, Nullable, Text, Timestamp};
use diesel::sqlite::Sqlite;
use diesel::{QueryableByName, RunQueryDsl as _};
use std::collections::BTreeSet;
use std::time::Instant;

pub(crate) fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// `expression` as it is compared and sorted. Decimal text goes through the decimal collation.
pub(crate) fn comparable(expression: &str, kind: FieldKind) -> String {
    match kind {
        FieldKind::Decimal => format!("{expression} COLLATE {DECIMAL_COLLATION}"),
        _ => expression.to_owned(),
    }
}

/// SQL text plus the values bound to its `?` placeholders, in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Statement {
    sql: String,
    params: Vec<Value>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: vec![],
        }
    }

    pub fn with_params(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    #[cfg(test)]
    pub fn params(&self) -> &[Value] {
        &self.params
    }

    pub fn params_text(&self) -> String {
        let params: Vec<_> = self.params.iter().map(Value::to_string).collect();
        format!("[{}]", params.join(","))
    }

    pub fn push(&mut self, sql: &str) -> &mut Self {
        self.sql.push_str(sql);
        self
    }

    /// Appends another statement, SQL and parameters both.
    pub fn append(&mut self, other: Statement) -> &mut Self {
        self.sql.push_str(&other.sql);
        self.params.extend(other.params);
        self
    }

    pub fn push_param(&mut self, value: Value) -> &mut Self {
        self.sql.push('?');
        self.params.push(value);
        self
    }

    pub fn push_param_list(&mut self, values: impl IntoIterator<Item = Value>) -> &mut Self {
        self.push("(");
        for (i, value) in values.into_iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.push_param(value);
        }
        self.push(")")
    }

    /// Appends ` WHERE ...` when there is a filter.
    pub fn push_where<F: Field>(&mut self, table: &str, filter: Option<&Where<F>>) -> Result<()> {
        if let Some(filter) = filter {
            filter.check()?;
            self.push(" WHERE ");
            self.push_filter(table, filter);
        }
        Ok(())
    }

    fn push_filter<F: Field>(&mut self, table: &str, filter: &Where<F>) {
        match filter {
            Where::Field(field, condition) => self.push_condition(table, *field, condition),
            Where::And(all) => self.push_junction(table, all, " AND ", "1 = 1"),
            Where::Or(any) => self.push_junction(table, any, " OR ", "0 = 1"),
            Where::Not(inner) => {
                self.push("NOT (");
                self.push_filter(table, inner);
                self.push(")");
            }
        }
    }

    fn push_junction<F: Field>(
        &mut self,
        table: &str,
        parts: &[Where<F>],
        separator: &str,
        empty: &str,
    ) {
        if parts.is_empty() {
            self.push(empty);
            return;
        }
        self.push("(");
        for (i, part) in parts.iter().enumerate() {
            if i > 0 {
                self.push(separator);
            }
            self.push_filter(table, part);
        }
        self.push(")");
    }

    fn push_condition<F: Field>(&mut self, table: &str, field: F, condition: &Condition) {
        let column = format!("{}.{}", quote(table), quote(field.column()));
        self.push_comparison(&column, field.kind(), condition);
    }

    /// Appends `condition` applied to `column`, an SQL expression holding values of `kind`.
    pub fn push_comparison(&mut self, column: &str, kind: FieldKind, condition: &Condition) {
        let compared = comparable(column, kind);
        let param = |value: &Value| kind.coerce(value.clone());
        let folded = |c: &str, mode: QueryMode| match mode {
            QueryMode::Default => c.to_owned(),
            QueryMode::Insensitive => format!("fold_case({c})"),
        };

        match condition {
            Condition::Equals(Value::Null) | Condition::IsNull => {
                self.push(&format!("{column} IS NULL"));
            }
            Condition::NotEquals(Value::Null) | Condition::IsNotNull => {
                self.push(&format!("{column} IS NOT NULL"));
            }
            Condition::Equals(value) => {
                self.push(&format!("{compared} = ")).push_param(param(value));
            }
            Condition::NotEquals(value) => {
                self.push(&format!("{compared} <> ")).push_param(param(value));
            }
            Condition::In(values) if values.is_empty() => {
                self.push("0 = 1");
            }
            Condition::NotIn(values) if values.is_empty() => {
                self.push("1 = 1");
            }
            Condition::In(values) => {
                self.push(&format!("{compared} IN "))
                    .push_param_list(values.iter().map(param));
            }
            Condition::NotIn(values) => {
                self.push(&format!("{compared} NOT IN "))
                    .push_param_list(values.iter().map(param));
            }
            Condition::Lt(value)
            | Condition::Lte(value)
            | Condition::Gt(value)
            | Condition::Gte(value) => {
                let operator = match condition {
                    Condition::Lt(_) => "<",
                    Condition::Lte(_) => "<=",
                    Condition::Gt(_) => ">",
                    _ => ">=",
                };
                self.push(&format!("{compared} {operator} "))
                    .push_param(param(value));
            }
            Condition::Contains(pattern, mode) => {
                self.push(&format!("instr({}, {}) > 0", folded(column, *mode), folded("?", *mode)));
                self.params.push(pattern.clone().into());
            }
            Condition::StartsWith(pattern, mode) => {
                self.push(&format!("instr({}, {}) = 1", folded(column, *mode), folded("?", *mode)));
                self.params.push(pattern.clone().into());
            }
            Condition::EndsWith(pattern, _) if pattern.is_empty() => {
                self.push(&format!("{column} IS NOT NULL"));
            }
            Condition::EndsWith(pattern, mode) => {
                let pattern_sql = folded("?", *mode);
                self.push(&format!(
                    "substr({}, -length({pattern_sql})) = {pattern_sql}",
                    folded(column, *mode),
                ));
                self.params.push(pattern.clone().into());
                self.params.push(pattern.clone().into());
            }
            Condition::Has(tag) => {
                self.push(&format!(
                    "EXISTS (SELECT 1 FROM json_each({column}) WHERE json_each.value = "
                ))
                .push_param(tag.clone().into())
                .push(")");
            }
            Condition::HasEvery(tags) => {
                let tags: BTreeSet<&String> = tags.iter().collect();
                if tags.is_empty() {
                    self.push("1 = 1");
                    return;
                }
                self.push(&format!(
                    "(SELECT COUNT(DISTINCT json_each.value) FROM json_each({column}) \
                     WHERE json_each.value IN "
                ))
                .push_param_list(tags.iter().map(|t| Value::from(t.as_str())))
                .push(&format!(") = {}", tags.len()));
            }
            Condition::HasSome(tags) => {
                if tags.is_empty() {
                    self.push("0 = 1");
                    return;
                }
                self.push(&format!(
                    "EXISTS (SELECT 1 FROM json_each({column}) WHERE json_each.value IN "
                ))
                .push_param_list(tags.iter().map(|t| Value::from(t.as_str())))
                .push(")");
            }
            Condition::IsEmpty(empty) => {
                let operator = if *empty { "=" } else { ">" };
                self.push(&format!("json_array_length({column}) {operator} 0"));
            }
        }
    }

    /// Appends ` ORDER BY ...`; nothing when `orders` is empty.
    pub fn push_order_by<F: Field>(&mut self, table: &str, orders: &[OrderBy<F>]) -> Result<()> {
        for (i, order) in orders.iter().enumerate() {
            order.check()?;
            self.push(if i == 0 { " ORDER BY " } else { ", " });
            let column = format!("{}.{}", quote(table), quote(order.field.column()));
            let expression = comparable(&column, order.field.kind());
            self.push(&format!(
                "{expression} {} {}",
                order.direction,
                order.placement()
            ));
        }
        Ok(())
    }

    pub fn push_limit(&mut self, take: Option<u64>, skip: Option<u64>) -> &mut Self {
        match (take, skip) {
            (None, None) => self,
            (Some(take), None) => self.push(&format!(" LIMIT {take}")),
            (take, Some(skip)) => {
                let take = take.map_or(-1, |t| i64::try_from(t).unwrap_or(i64::MAX));
                self.push(&format!(" LIMIT {take} OFFSET {skip}"))
            }
        }
    }

    fn to_query(&self) -> BoxedSqlQuery<'static, Sqlite, SqlQuery> {
        let query: BoxedSqlQuery<'static, Sqlite, SqlQuery> =
            diesel::sql_query(self.sql.clone()).into_boxed();
        self.params.iter().fold(query, |query, value| match value {
            Value::Null => query.bind::<Nullable<Text>, _>(None::<String>),
            Value::Int(i) => query.bind::<BigInt, _>(*i),
            Value::Decimal(d) => query.bind::<Text, _>(d.normalize().to_string()),
            Value::Text(s) => query.bind::<Text, _>(s.clone()),
            Value::DateTime(t) => query.bind::<Timestamp, _>(*t),
            Value::List(l) => query.bind::<Text, _>(Value::encode_list(l)),
        })
    }

    /// Runs a statement which returns rows.
    pub fn load<T>(&self, conn: &mut Connection, log: &QueryLog) -> Result<Vec<T>>
    where
        T: QueryableByName<Sqlite> + 'static,
    {
        let started = Instant::now();
        let result = self.to_query().load::<T>(conn);
        log.statement(self, started.elapsed(), result.as_ref().err());
        Ok(result?)
    }

    /// Runs a statement which doesn't return rows, giving back the number of affected rows.
    pub fn execute(&self, conn: &mut Connection, log: &QueryLog) -> Result<usize> {
        let started = Instant::now();
        let result = self.to_query().execute(conn);
        log.statement(self, started.elapsed(), result.as_ref().err());
        Ok(result?)
    }
}

#[test]
fn compiles_filters() {
    use crate::database::models::RecipeField;

    let filter = Where::contains(RecipeField::Name, "Bread", QueryMode::Insensitive)
        .and(Where::is_in(RecipeField::CategoryId, [1, 2]))
        .and(Where::has(RecipeField::Tags, "vegan"))
        .and(Where::is_null(RecipeField::UserId).not());

    let mut statement = Statement::new("SELECT * FROM \"recipes\"");
    statement.push_where("recipes", Some(&filter)).unwrap();
    assert_eq!(
        statement.sql(),
        "SELECT * FROM \"recipes\" WHERE (instr(fold_case(\"recipes\".\"name\"), fold_case(?)) > 0 \
         AND \"recipes\".\"category_id\" IN (?, ?) \
         AND EXISTS (SELECT 1 FROM json_each(\"recipes\".\"tags\") WHERE json_each.value = ?) \
         AND NOT (\"recipes\".\"user_id\" IS NULL))"
    );
    assert_eq!(
        statement.params(),
        &[
            Value::from("Bread"),
            Value::Int(1),
            Value::Int(2),
            Value::from("vegan")
        ]
    );
    assert_eq!(statement.params_text(), r#"["Bread",1,2,"vegan"]"#);
}

#[test]
fn compiles_decimal_ranges_and_ordering() {
    use crate::database::models::UnitQuantityField;
    use rust_decimal::Decimal;

    let mut statement = Statement::new("SELECT * FROM \"unit_quantities\"");
    statement
        .push_where(
            "unit_quantities",
            Some(&Where::gte(UnitQuantityField::Quantity, 250)),
        )
        .unwrap();
    statement
        .push_order_by(
            "unit_quantities",
            &[
                OrderBy::desc(UnitQuantityField::Quantity),
                OrderBy::asc(UnitQuantityField::IngredientId).nulls_last(),
            ],
        )
        .unwrap();
    statement.push_limit(Some(10), Some(20));
    assert_eq!(
        statement.sql(),
        "SELECT * FROM \"unit_quantities\" \
         WHERE \"unit_quantities\".\"quantity\" COLLATE decimal >= ? \
         ORDER BY \"unit_quantities\".\"quantity\" COLLATE decimal DESC NULLS LAST, \
         \"unit_quantities\".\"ingredient_id\" ASC NULLS LAST LIMIT 10 OFFSET 20"
    );
    assert_eq!(statement.params(), &[Value::Decimal(Decimal::from(250))]);
}

#[test]
fn empty_junctions_and_lists() {
    use crate::database::models::CategoryField;

    let filter = Where::Or(vec![])
        .and(Where::And(vec![]))
        .and(Where::is_in(CategoryField::Id, Vec::<i32>::new()));
    let mut statement = Statement::new("");
    statement.push_where("categories", Some(&filter)).unwrap();
    assert_eq!(statement.sql(), " WHERE (0 = 1 AND 1 = 1 AND 0 = 1)");
    assert!(statement.params().is_empty());
}

#[test]
fn invalid_filters_are_rejected_before_sql() {
    use crate::database::models::RecipeField;

    let mut statement = Statement::new("SELECT 1");
    let result = statement.push_where(
        "recipes",
        Some(&Where::starts_with(RecipeField::Tags, "x", QueryMode::Default)),
    );
    assert!(matches!(result, Err(crate::Error::Validation(_))));
    assert_eq!(statement.sql(), "SELECT 1");
}
