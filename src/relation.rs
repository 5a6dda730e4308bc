// Copyright 2023 Remi Bernotavicius

//! Relations between models, resolved lazily (`fetch`, one query per parent) or eagerly
//! (`include`, one query for a whole slice of parents).

use crate::client::Executor;
use crate::error::{validation, Error, ErrorCode, Result};
use crate::model::Model;
use crate::query::{FindMany, OrderBy, Value, Where};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::marker::PhantomData;

/// The rows of `C` whose `foreign_key` points at a `P`.
pub struct HasMany<P, C: Model> {
    pub name: &'static str,
    pub foreign_key: C::Field,
    models: PhantomData<fn() -> (P, C)>,
}

impl<P: Model, C: Model> HasMany<P, C> {
    pub const fn new(name: &'static str, foreign_key: C::Field) -> Self {
        Self {
            name,
            foreign_key,
            models: PhantomData,
        }
    }

    /// The children of one parent, with their own filter, order, cursor and page.
    pub fn fetch<X: Executor>(&self, exec: &X, parent: &P, args: FindMany<C>) -> Result<Vec<C>> {
        exec.repository::<C>()
            .find_many(args.filter(Where::equals(self.foreign_key, parent.id())))
    }

    /// The children of every parent, in the order of `parents`. Filter and order apply in the
    /// query, skip and take apply per parent.
    pub fn include<X: Executor>(
        &self,
        exec: &X,
        parents: &[P],
        args: FindMany<C>,
    ) -> Result<Vec<Vec<C>>> {
        if args.cursor.is_some() {
            return Err(validation!(
                "cursors aren't supported when including `{}` for several parents",
                self.name
            ));
        }
        if parents.is_empty() {
            return Ok(vec![]);
        }

        let ids: BTreeSet<i32> = parents.iter().map(Model::id).collect();
        let FindMany {
            filter,
            mut order_by,
            take,
            skip,
            ..
        } = args;
        if order_by.is_empty() {
            order_by.push(OrderBy::asc(C::ID));
        }
        let mut find = FindMany::new().filter(Where::is_in(self.foreign_key, ids));
        if let Some(filter) = filter {
            find = find.filter(filter);
        }
        find.order_by = order_by;

        let mut by_parent: HashMap<i64, Vec<C>> = HashMap::new();
        for child in exec.repository::<C>().find_many(find)? {
            if let Some(parent) = child.get(self.foreign_key).as_i64() {
                by_parent.entry(parent).or_default().push(child);
            }
        }
        Ok(parents
            .iter()
            .map(|p| {
                let children = by_parent.get(&i64::from(p.id())).cloned().unwrap_or_default();
                page(children, take, skip)
            })
            .collect())
    }
}

/// `take` and `skip` over already ordered rows. A negative `take` keeps the last rows.
fn page<T>(mut rows: Vec<T>, take: Option<i64>, skip: Option<u64>) -> Vec<T> {
    let skip = usize::try_from(skip.unwrap_or(0)).unwrap_or(usize::MAX);
    match take {
        Some(take) if take < 0 => {
            let end = rows.len().saturating_sub(skip);
            let count = usize::try_from(take.unsigned_abs()).unwrap_or(usize::MAX);
            rows.drain(end.saturating_sub(count)..end).collect()
        }
        take => {
            let count = take.map_or(usize::MAX, |t| usize::try_from(t).unwrap_or(usize::MAX));
            rows.into_iter().skip(skip).take(count).collect()
        }
    }
}

impl<P, C: Model> Clone for HasMany<P, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<P, C: Model> Copy for HasMany<P, C> {}

impl<P, C: Model> fmt::Debug for HasMany<P, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HasMany")
            .field("name", &self.name)
            .field("foreign_key", &self.foreign_key)
            .finish()
    }
}

/// The `P` a `C` points at through `foreign_key`. A required relation with a missing row is a
/// data integrity error.
pub struct BelongsTo<C: Model, P> {
    pub name: &'static str,
    pub foreign_key: C::Field,
    pub required: bool,
    models: PhantomData<fn() -> (C, P)>,
}

impl<C: Model, P: Model> BelongsTo<C, P> {
    pub const fn required(name: &'static str, foreign_key: C::Field) -> Self {
        Self {
            name,
            foreign_key,
            required: true,
            models: PhantomData,
        }
    }

    pub const fn optional(name: &'static str, foreign_key: C::Field) -> Self {
        Self {
            name,
            foreign_key,
            required: false,
            models: PhantomData,
        }
    }

    fn missing(&self, child: &C) -> Error {
        Error::known(
            ErrorCode::RelatedRecordNotFound,
            format!(
                "{} {} has no {} for required relation `{}`",
                C::NAME,
                child.id(),
                P::NAME,
                self.name
            ),
            Some(self.name.to_owned()),
        )
    }

    fn resolve(&self, child: &C, found: Option<P>) -> Result<Option<P>> {
        match found {
            None if self.required => Err(self.missing(child)),
            found => Ok(found),
        }
    }

    pub fn fetch<X: Executor>(&self, exec: &X, child: &C) -> Result<Option<P>> {
        let found = match child.get(self.foreign_key) {
            Value::Null => None,
            id => exec
                .repository::<P>()
                .find_first(FindMany::new().filter(Where::equals(P::ID, id)))?,
        };
        self.resolve(child, found)
    }

    /// The related row of every child, in the order of `children`, with one query.
    pub fn include<X: Executor>(&self, exec: &X, children: &[C]) -> Result<Vec<Option<P>>> {
        let ids: BTreeSet<i64> = children
            .iter()
            .filter_map(|c| c.get(self.foreign_key).as_i64())
            .collect();
        let parents: HashMap<i64, P> = if ids.is_empty() {
            HashMap::new()
        } else {
            exec.repository::<P>()
                .find_many(FindMany::new().filter(Where::is_in(P::ID, ids)))?
                .into_iter()
                .map(|p| (i64::from(p.id()), p))
                .collect()
        };
        children
            .iter()
            .map(|child| {
                let found = child
                    .get(self.foreign_key)
                    .as_i64()
                    .and_then(|id| parents.get(&id).cloned());
                self.resolve(child, found)
            })
            .collect()
    }
}

impl<C: Model, P> Clone for BelongsTo<C, P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C: Model, P> Copy for BelongsTo<C, P> {}

impl<C: Model, P> fmt::Debug for BelongsTo<C, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BelongsTo")
            .field("name", &self.name)
            .field("foreign_key", &self.foreign_key)
            .field("required", &self.required)
            .finish()
    }
}

#[test]
fn paging_per_parent() {
    let rows = || vec![1, 2, 3, 4, 5];
    assert_eq!(page(rows(), None, None), vec![1, 2, 3, 4, 5]);
    assert_eq!(page(rows(), Some(2), Some(1)), vec![2, 3]);
    assert_eq!(page(rows(), Some(-2), None), vec![4, 5]);
    assert_eq!(page(rows(), Some(-2), Some(1)), vec![3, 4]);
    assert_eq!(page(rows(), Some(-10), Some(4)), vec![1]);
    assert_eq!(page(rows(), Some(3), Some(9)), Vec::<i32>::new());
}
