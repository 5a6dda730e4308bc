// Copyright 2023 Remi Bernotavicius

use super::{OrderBy, Where};
use crate::error::{validation, Result};
use crate::model::Model;
use std::fmt;

/// Filter, sort and pagination for reading many rows of `M`.
///
/// A negative `take` reads backwards from the end of the ordering (or from the cursor), but the
/// rows still come back in the requested order. The cursor row itself is part of the page.
pub struct FindMany<M: Model> {
    pub filter: Option<Where<M::Field>>,
    pub order_by: Vec<OrderBy<M::Field>>,
    pub cursor: Option<M::Unique>,
    pub take: Option<i64>,
    pub skip: Option<u64>,
}

impl<M: Model> FindMany<M> {
    pub fn new() -> Self {
        Self {
            filter: None,
            order_by: vec![],
            cursor: None,
            take: None,
            skip: None,
        }
    }

    /// Adds `filter`, AND-ed with any filter already present.
    pub fn filter(mut self, filter: Where<M::Field>) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.and(filter),
            None => filter,
        });
        self
    }

    pub fn order_by(mut self, order: OrderBy<M::Field>) -> Self {
        self.order_by.push(order);
        self
    }

    pub fn asc(self, field: M::Field) -> Self {
        self.order_by(OrderBy::asc(field))
    }

    pub fn desc(self, field: M::Field) -> Self {
        self.order_by(OrderBy::desc(field))
    }

    pub fn cursor(mut self, cursor: M::Unique) -> Self {
        self.cursor = Some(cursor);
        self
    }

    pub fn take(mut self, take: i64) -> Self {
        self.take = Some(take);
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub(crate) fn is_backwards(&self) -> bool {
        self.take.is_some_and(|t| t < 0)
    }

    pub(crate) fn check(&self) -> Result<()> {
        check_page(self.take.map(i64::unsigned_abs), self.skip)?;
        if let Some(filter) = &self.filter {
            filter.check()?;
        }
        self.order_by.iter().try_for_each(OrderBy::check)
    }
}

/// SQLite takes `LIMIT` and `OFFSET` as signed 64-bit integers.
pub(crate) fn check_page(take: Option<u64>, skip: Option<u64>) -> Result<()> {
    let limit = i64::MAX.unsigned_abs();
    if take.is_some_and(|t| t > limit) {
        return Err(validation!("take must be within {}..={limit}", -i64::MAX));
    }
    if skip.is_some_and(|s| s > limit) {
        return Err(validation!("skip must be at most {limit}"));
    }
    Ok(())
}

impl<M: Model> Default for FindMany<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Model> Clone for FindMany<M> {
    fn clone(&self) -> Self {
        Self {
            filter: self.filter.clone(),
            order_by: self.order_by.clone(),
            cursor: self.cursor.clone(),
            take: self.take,
            skip: self.skip,
        }
    }
}

impl<M: Model> fmt::Debug for FindMany<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FindMany")
            .field("model", &M::NAME)
            .field("filter", &self.filter)
            .field("order_by", &self.order_by)
            .field("cursor", &self.cursor)
            .field("take", &self.take)
            .field("skip", &self.skip)
            .finish()
    }
}

#[test]
fn pages_beyond_sqlite_limits_are_rejected() {
    use crate::database::models::Category;

    assert!(FindMany::<Category>::new().take(i64::MAX).check().is_ok());
    assert!(FindMany::<Category>::new().take(-i64::MAX).check().is_ok());
    assert!(matches!(
        FindMany::<Category>::new().take(i64::MIN).check(),
        Err(crate::Error::Validation(_))
    ));
    assert!(matches!(
        FindMany::<Category>::new().skip(u64::MAX).check(),
        Err(crate::Error::Validation(_))
    ));
}
