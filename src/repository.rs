// Copyright 2023 Remi Bernotavicius

//! The per-model operations. Every operation validates its arguments, then runs its statements
//! on one connection. Operations made of several statements run inside a transaction (a savepoint
//! when the caller already opened one).

use crate::aggregate::{Aggregate, Aggregates, Group, GroupBy};
use crate::client::{Executor, RawRow};
use crate::database::Connection;
use crate::error::{validation, Error, Result};
use crate::logging::QueryLog;
use crate::model::{Input, Model, Unique as _};
use crate::query::statement::{quote, Statement};
use crate::query::{Field, FindMany, OrderBy, Record, Selection, Value, Where};
use chrono::Utc;
use diesel::sql_types::BigInt;
use diesel::{Connection as _, QueryableByName, RunQueryDsl as _};
use std::marker::PhantomData;

/// SQLite's default limit on bound parameters per statement.
const MAX_VARIABLES: usize = 999;

/// Typed access to the rows of `M`, borrowed from a client or a transaction.
pub struct Repository<'e, M, X> {
    exec: &'e X,
    model: PhantomData<fn() -> M>,
}

impl<'e, M: Model, X: Executor> Repository<'e, M, X> {
    pub(crate) fn new(exec: &'e X) -> Self {
        Self {
            exec,
            model: PhantomData,
        }
    }

    fn run<T>(&self, f: impl FnOnce(&mut Connection, &QueryLog) -> Result<T>) -> Result<T> {
        let log = self.exec.query_log();
        self.exec.with_connection(|conn| f(conn, log))
    }

    pub fn find_unique(&self, key: &M::Unique) -> Result<Option<M>> {
        self.run(|conn, log| first_where::<M>(conn, log, &key.to_where()))
    }

    pub fn find_unique_or_throw(&self, key: &M::Unique) -> Result<M> {
        self.find_unique(key)?
            .ok_or_else(|| Error::not_found(M::NAME))
    }

    pub fn find_first(&self, args: FindMany<M>) -> Result<Option<M>> {
        let take = if args.is_backwards() { -1 } else { 1 };
        Ok(self.find_many(args.take(take))?.pop())
    }

    pub fn find_first_or_throw(&self, args: FindMany<M>) -> Result<M> {
        self.find_first(args)?
            .ok_or_else(|| Error::not_found(M::NAME))
    }

    pub fn find_many(&self, args: FindMany<M>) -> Result<Vec<M>> {
        self.run(|conn, log| find_many::<M>(conn, log, &args))
    }

    /// Like [`Self::find_many`], projecting each row onto `selection`.
    pub fn find_many_records(
        &self,
        args: FindMany<M>,
        selection: Selection<M::Field>,
    ) -> Result<Vec<Record>> {
        let omit = self.exec.omit_rules();
        Ok(self
            .find_many(args)?
            .iter()
            .map(|row| Record::project(row, &selection, omit))
            .collect())
    }

    pub fn create(&self, input: M::Create) -> Result<M> {
        self.run(|conn, log| create::<M>(conn, log, &input))
    }

    /// Inserts every row and returns how many were inserted. With `skip_duplicates`, rows
    /// colliding with a unique constraint are left out instead of failing the call.
    pub fn create_many(&self, inputs: Vec<M::Create>, skip_duplicates: bool) -> Result<usize> {
        self.run(|conn, log| create_many::<M>(conn, log, &inputs, skip_duplicates))
    }

    pub fn update(&self, key: &M::Unique, input: M::Update) -> Result<M> {
        self.run(|conn, log| update::<M>(conn, log, &key.to_where(), &input))
    }

    pub fn update_many(&self, filter: Option<Where<M::Field>>, input: M::Update) -> Result<usize> {
        self.run(|conn, log| update_many::<M>(conn, log, filter.as_ref(), &input))
    }

    /// Updates the row matching `key`, or creates it when there is none.
    pub fn upsert(&self, key: &M::Unique, create: M::Create, update: M::Update) -> Result<M> {
        self.run(|conn, log| {
            conn.transaction(|conn| {
                let filter = key.to_where();
                match first_where::<M>(conn, log, &filter)? {
                    Some(existing) => {
                        self::update::<M>(conn, log, &id_filter::<M>(existing.id()), &update)
                    }
                    None => self::create::<M>(conn, log, &create),
                }
            })
        })
    }

    pub fn delete(&self, key: &M::Unique) -> Result<M> {
        self.run(|conn, log| {
            conn.transaction(|conn| {
                let existing = first_where::<M>(conn, log, &key.to_where())?
                    .ok_or_else(|| Error::not_found(M::NAME))?;
                let mut statement = Statement::new(format!("DELETE FROM {}", quote(M::TABLE)));
                statement.push_where(M::TABLE, Some(&id_filter::<M>(existing.id())))?;
                statement.execute(conn, log)?;
                Ok(existing)
            })
        })
    }

    pub fn delete_many(&self, filter: Option<Where<M::Field>>) -> Result<usize> {
        self.run(|conn, log| {
            let mut statement = Statement::new(format!("DELETE FROM {}", quote(M::TABLE)));
            statement.push_where(M::TABLE, filter.as_ref())?;
            statement.execute(conn, log)
        })
    }

    pub fn count(&self, filter: Option<Where<M::Field>>) -> Result<u64> {
        self.run(|conn, log| count::<M>(conn, log, filter.as_ref()))
    }

    pub fn aggregate(&self, args: Aggregate<M>) -> Result<Aggregates<M::Field>> {
        args.check()?;
        if args.select.is_empty() {
            return Ok(Aggregates::default());
        }
        self.run(|conn, log| {
            let rows = match find_statement::<M>(conn, log, &args.find)? {
                Some(rows) => rows,
                // A missing cursor row selects nothing.
                None => {
                    let mut nothing = select_from::<M>();
                    nothing.push(" WHERE 0 = 1");
                    nothing
                }
            };
            let result = args.to_statement(rows).load::<RawRow>(conn, log)?;
            args.read(&result)
        })
    }

    pub fn group_by(&self, args: GroupBy<M::Field>) -> Result<Vec<Group<M::Field>>> {
        args.check()?;
        self.run(|conn, log| {
            let rows = args.to_statement(M::TABLE)?.load::<RawRow>(conn, log)?;
            args.read(&rows)
        })
    }
}

#[derive(QueryableByName)]
struct CountRow {
    #[diesel(sql_type = BigInt)]
    count: i64,
}

fn id_filter<M: Model>(id: i32) -> Where<M::Field> {
    Where::equals(M::ID, id)
}

fn select_from<M: Model>() -> Statement {
    Statement::new(format!("SELECT * FROM {}", quote(M::TABLE)))
}

pub(crate) fn first_where<M: Model>(
    conn: &mut Connection,
    log: &QueryLog,
    filter: &Where<M::Field>,
) -> Result<Option<M>> {
    let mut statement = select_from::<M>();
    statement.push_where(M::TABLE, Some(filter))?;
    statement.push_limit(Some(1), None);
    Ok(statement.load::<M>(conn, log)?.pop())
}

fn count<M: Model>(
    conn: &mut Connection,
    log: &QueryLog,
    filter: Option<&Where<M::Field>>,
) -> Result<u64> {
    let mut statement = Statement::new(format!("SELECT COUNT(*) AS count FROM {}", quote(M::TABLE)));
    statement.push_where(M::TABLE, filter)?;
    let rows = statement.load::<CountRow>(conn, log)?;
    Ok(rows.first().map_or(0, |r| r.count.max(0) as u64))
}

/// Matches the rows at or after `row` when walking `orders`. The last order must be unique so
/// that the rows equal on every order are exactly `row`.
fn at_or_after<M: Model>(orders: &[OrderBy<M::Field>], row: &M) -> Where<M::Field> {
    let mut branches = vec![];
    let mut equal = vec![];
    for order in orders {
        let value = row.get(order.field);
        let mut branch = equal.clone();
        branch.push(order.after(value.clone()));
        branches.push(Where::And(branch));
        equal.push(match value {
            Value::Null => Where::is_null(order.field),
            value => Where::equals(order.field, value),
        });
    }
    branches.push(Where::And(equal));
    Where::Or(branches)
}

pub(crate) fn find_many<M: Model>(
    conn: &mut Connection,
    log: &QueryLog,
    args: &FindMany<M>,
) -> Result<Vec<M>> {
    let Some(statement) = find_statement::<M>(conn, log, args)? else {
        return Ok(vec![]);
    };
    let mut rows = statement.load::<M>(conn, log)?;
    if args.is_backwards() {
        rows.reverse();
    }
    Ok(rows)
}

/// The statement selecting the page `args` describes, or `None` when its cursor row is gone.
/// Backwards pages come out in reverse.
fn find_statement<M: Model>(
    conn: &mut Connection,
    log: &QueryLog,
    args: &FindMany<M>,
) -> Result<Option<Statement>> {
    args.check()?;
    let backwards = args.is_backwards();

    let mut orders = args.order_by.clone();
    if (!orders.is_empty() || args.cursor.is_some() || backwards)
        && !orders.iter().any(|o| o.field == M::ID)
    {
        orders.push(OrderBy::asc(M::ID));
    }
    if backwards {
        orders = orders.iter().map(OrderBy::reversed).collect();
    }

    let mut filter = args.filter.clone();
    if let Some(cursor) = &args.cursor {
        let Some(row) = first_where::<M>(conn, log, &cursor.to_where())? else {
            return Ok(None);
        };
        let keyset = at_or_after::<M>(&orders, &row);
        filter = Some(match filter {
            Some(filter) => filter.and(keyset),
            None => keyset,
        });
    }

    let mut statement = select_from::<M>();
    statement.push_where(M::TABLE, filter.as_ref())?;
    statement.push_order_by(M::TABLE, &orders)?;
    statement.push_limit(args.take.map(i64::unsigned_abs), args.skip);
    Ok(Some(statement))
}

/// Checks assignment values against their fields before they are written.
fn check_assignments<M: Model>(assignments: &[(M::Field, Value)]) -> Result<()> {
    for (field, value) in assignments {
        if value.is_null() {
            if !field.is_nullable() {
                return Err(validation!(
                    "`{}` of {} cannot be null",
                    field.column(),
                    M::NAME
                ));
            }
        } else if !field.kind().accepts(value) {
            return Err(validation!(
                "value {value} is not valid for `{}` of {}",
                field.column(),
                M::NAME
            ));
        }
    }
    Ok(())
}

fn insert_rows<M: Model>(
    conn: &mut Connection,
    log: &QueryLog,
    rows: &[Vec<(M::Field, Value)>],
    skip_duplicates: bool,
) -> Result<usize> {
    let Some(first) = rows.first() else {
        return Ok(0);
    };
    let columns: Vec<String> = first.iter().map(|(f, _)| quote(f.column())).collect();
    let mut statement = Statement::new(format!(
        "INSERT{} INTO {} ({}) VALUES ",
        if skip_duplicates { " OR IGNORE" } else { "" },
        quote(M::TABLE),
        columns.join(", ")
    ));
    for (i, row) in rows.iter().enumerate() {
        if i > 0 {
            statement.push(", ");
        }
        statement.push_param_list(row.iter().map(|(f, v)| f.kind().coerce(v.clone())));
    }
    statement.execute(conn, log)
}

fn with_timestamps<M: Model>(mut assignments: Vec<(M::Field, Value)>) -> Vec<(M::Field, Value)> {
    let now = Value::DateTime(Utc::now().naive_utc());
    assignments.push((M::CREATED_AT, now.clone()));
    assignments.push((M::UPDATED_AT, now));
    assignments
}

fn last_insert_id(conn: &mut Connection) -> Result<i32> {
    let id = diesel::select(diesel::dsl::sql::<BigInt>("last_insert_rowid()")).get_result::<i64>(conn)?;
    i32::try_from(id).map_err(|_| validation!("row id {id} is out of range"))
}

fn create<M: Model>(conn: &mut Connection, log: &QueryLog, input: &M::Create) -> Result<M> {
    M::validate_create(input)?;
    let assignments = with_timestamps::<M>(input.assignments());
    check_assignments::<M>(&assignments)?;
    conn.transaction(|conn| {
        insert_rows::<M>(conn, log, &[assignments], false)?;
        let id = last_insert_id(conn)?;
        first_where::<M>(conn, log, &id_filter::<M>(id))?
            .ok_or_else(|| Error::not_found(M::NAME))
    })
}

fn create_many<M: Model>(
    conn: &mut Connection,
    log: &QueryLog,
    inputs: &[M::Create],
    skip_duplicates: bool,
) -> Result<usize> {
    let mut rows = Vec::with_capacity(inputs.len());
    for input in inputs {
        M::validate_create(input)?;
        let assignments = with_timestamps::<M>(input.assignments());
        check_assignments::<M>(&assignments)?;
        rows.push(assignments);
    }
    let Some(width) = rows.first().map(Vec::len) else {
        return Ok(0);
    };
    let per_statement = (MAX_VARIABLES / width.max(1)).max(1);
    conn.transaction(|conn| {
        let mut inserted = 0;
        for chunk in rows.chunks(per_statement) {
            inserted += insert_rows::<M>(conn, log, chunk, skip_duplicates)?;
        }
        Ok(inserted)
    })
}

fn update_statement<M: Model>(
    input: &M::Update,
    filter: Option<&Where<M::Field>>,
) -> Result<Statement> {
    let mut assignments = input.assignments();
    assignments.push((M::UPDATED_AT, Value::DateTime(Utc::now().naive_utc())));
    check_assignments::<M>(&assignments)?;

    let mut statement = Statement::new(format!("UPDATE {} SET ", quote(M::TABLE)));
    for (i, (field, value)) in assignments.into_iter().enumerate() {
        if i > 0 {
            statement.push(", ");
        }
        statement
            .push(&format!("{} = ", quote(field.column())))
            .push_param(field.kind().coerce(value));
    }
    statement.push_where(M::TABLE, filter)?;
    Ok(statement)
}

fn update<M: Model>(
    conn: &mut Connection,
    log: &QueryLog,
    filter: &Where<M::Field>,
    input: &M::Update,
) -> Result<M> {
    conn.transaction(|conn| {
        let existing =
            first_where::<M>(conn, log, filter)?.ok_or_else(|| Error::not_found(M::NAME))?;
        M::validate_update(&existing, input)?;
        let by_id = id_filter::<M>(existing.id());
        update_statement::<M>(input, Some(&by_id))?.execute(conn, log)?;
        first_where::<M>(conn, log, &by_id)?.ok_or_else(|| Error::not_found(M::NAME))
    })
}

fn update_many<M: Model>(
    conn: &mut Connection,
    log: &QueryLog,
    filter: Option<&Where<M::Field>>,
    input: &M::Update,
) -> Result<usize> {
    let statement = update_statement::<M>(input, filter)?;
    conn.transaction(|conn| {
        if M::update_requires_validation(input) {
            let mut select = select_from::<M>();
            select.push_where(M::TABLE, filter)?;
            for existing in select.load::<M>(conn, log)? {
                M::validate_update(&existing, input)?;
            }
        }
        statement.execute(conn, log)
    })
}
