// Copyright 2023 Remi Bernotavicius

use super::{Field, Value};
use crate::config::OmitConfig;
use crate::model::Model;
use serde::Serialize;
use std::collections::BTreeMap;

/// Which fields of a row end up in a [`Record`].
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Selection<F> {
    /// Every field except the ones the client is configured to omit for the model.
    #[default]
    Default,
    /// Exactly these fields, regardless of the omit configuration.
    Only(Vec<F>),
    /// The default selection minus these fields.
    Omit(Vec<F>),
}

impl<F: Field> Selection<F> {
    fn includes(&self, field: F, omitted: &dyn Fn(F) -> bool) -> bool {
        match self {
            Self::Default => !omitted(field),
            Self::Only(fields) => fields.contains(&field),
            Self::Omit(fields) => !omitted(field) && !fields.contains(&field),
        }
    }
}

/// A row projected onto a subset of its fields, keyed by column name.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct Record(BTreeMap<&'static str, Value>);

impl Record {
    pub(crate) fn project<M: Model>(
        row: &M,
        selection: &Selection<M::Field>,
        omit: &OmitConfig,
    ) -> Self {
        let omitted = |field: M::Field| omit.omits(M::NAME, field.column());
        Self(
            M::Field::all()
                .into_iter()
                .filter(|field| selection.includes(*field, &omitted))
                .map(|field| (field.column(), row.get(field)))
                .collect(),
        )
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0.get(column)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.0.contains_key(column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
