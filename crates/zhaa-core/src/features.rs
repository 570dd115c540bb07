use std::sync::Arc;

use arrow::{
    array::{ArrayRef, Float64Array},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{ZhaaError, ZhaaResult};

/// An ordered mapping from feature name to one value per event.
///
/// Every column has the same length. Tables are appended to in arrival order and can be exported
/// as an [`arrow`] [`RecordBatch`] of `Float64` columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureTable {
    columns: IndexMap<String, Vec<f64>>,
}

impl FeatureTable {
    /// An empty table with the given columns.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: names.into_iter().map(|n| (n.into(), Vec::new())).collect(),
        }
    }

    /// Build a table from existing columns, checking that they all have the same length.
    pub fn from_columns(columns: IndexMap<String, Vec<f64>>) -> ZhaaResult<Self> {
        let mut table = Self::default();
        for (name, values) in columns {
            table.push_column(&name, values)?;
        }
        Ok(table)
    }

    /// Add a column at the end of the table (or replace an existing one in place).
    pub fn push_column(&mut self, name: &str, values: Vec<f64>) -> ZhaaResult<()> {
        let expected = self
            .columns
            .iter()
            .find(|(other, _)| other.as_str() != name)
            .map(|(_, other_values)| other_values.len());
        if let Some(expected) = expected.filter(|&n| n != values.len()) {
            return Err(ZhaaError::LengthMismatch {
                context: format!("feature column \"{name}\""),
                expected,
                actual: values.len(),
            });
        }
        self.columns.insert(name.to_string(), values);
        Ok(())
    }

    /// Number of rows (events).
    pub fn n_rows(&self) -> usize {
        self.columns.values().next().map_or(0, Vec::len)
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.n_rows() == 0
    }

    /// Column names, in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    pub fn columns(&self) -> &IndexMap<String, Vec<f64>> {
        &self.columns
    }

    /// Append the rows of `other` after the rows of this table.
    ///
    /// A table without columns adopts the columns of `other`, and appending a table without
    /// columns does nothing. Otherwise both tables must have the same column names in the same
    /// order.
    pub fn append(&mut self, other: &FeatureTable) -> ZhaaResult<()> {
        if other.columns.is_empty() {
            return Ok(());
        }
        if self.columns.is_empty() {
            self.columns = other.columns.clone();
            return Ok(());
        }
        if !self.names().eq(other.names()) {
            return Err(ZhaaError::Custom(format!(
                "cannot append feature table with columns {:?} to one with columns {:?}",
                other.names().collect::<Vec<_>>(),
                self.names().collect::<Vec<_>>()
            )));
        }
        for (values, more) in self.columns.values_mut().zip(other.columns.values()) {
            values.extend_from_slice(more);
        }
        Ok(())
    }

    /// Gather the named columns, in the given order, into a row-major [`FeatureMatrix`].
    pub fn matrix<S: AsRef<str>>(&self, names: &[S]) -> ZhaaResult<FeatureMatrix> {
        let columns = names
            .iter()
            .map(|name| {
                self.column(name.as_ref()).ok_or_else(|| {
                    ZhaaError::Custom(format!("no feature column named \"{}\"", name.as_ref()))
                })
            })
            .collect::<ZhaaResult<Vec<_>>>()?;
        let n_rows = self.n_rows();
        let values = (0..n_rows)
            .flat_map(|row| columns.iter().map(move |column| column[row]))
            .collect();
        Ok(FeatureMatrix {
            names: names.iter().map(|n| n.as_ref().to_string()).collect(),
            values,
            n_rows,
        })
    }

    /// Convert the table into an [`arrow`] [`RecordBatch`] with one non-nullable `Float64` column
    /// per feature.
    pub fn to_record_batch(&self) -> ZhaaResult<RecordBatch> {
        let fields: Vec<Field> = self
            .names()
            .map(|name| Field::new(name, DataType::Float64, false))
            .collect();
        let columns: Vec<ArrayRef> = self
            .columns
            .values()
            .map(|values| Arc::new(Float64Array::from(values.clone())) as ArrayRef)
            .collect();
        Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
    }
}

/// A dense, row-major matrix of events × named features, as handed to a scorer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureMatrix {
    names: Vec<String>,
    values: Vec<f64>,
    n_rows: usize,
}

impl FeatureMatrix {
    /// Feature (column) names, in order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Number of events.
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Number of features.
    pub fn n_features(&self) -> usize {
        self.names.len()
    }

    /// The features of one event.
    pub fn row(&self, index: usize) -> &[f64] {
        let width = self.n_features();
        &self.values[index * width..(index + 1) * width]
    }

    /// Iterate over the events' feature rows.
    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        (0..self.n_rows).map(move |i| self.row(i))
    }

    /// The flat row-major storage.
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }
}
