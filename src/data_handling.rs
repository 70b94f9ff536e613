//! In-memory feature tables handed to the selector.
//!
//! `FeatureMatrix` is an ordered list of named columns, each numeric (`NaN`
//! marks a missing cell) or categorical (`None` marks a missing cell). The row
//! count is stored separately so a projection down to zero columns still
//! reports the original number of rows.
use std::collections::HashSet;

use ndarray::Array2;

use crate::error::{ModelError, SelectorError};

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Numeric(Vec<f64>),
    Categorical(Vec<Option<String>>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    pub fn numeric(name: impl Into<String>, values: Vec<f64>) -> Self {
        Column {
            name: name.into(),
            data: ColumnData::Numeric(values),
        }
    }

    pub fn categorical<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>,
    {
        Column {
            name: name.into(),
            data: ColumnData::Categorical(values.into_iter().map(|v| v.map(Into::into)).collect()),
        }
    }

    pub fn len(&self) -> usize {
        match &self.data {
            ColumnData::Numeric(values) => values.len(),
            ColumnData::Categorical(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self.data, ColumnData::Numeric(_))
    }

    pub fn as_numeric(&self) -> Option<&[f64]> {
        match &self.data {
            ColumnData::Numeric(values) => Some(values),
            ColumnData::Categorical(_) => None,
        }
    }

    pub fn missing_count(&self) -> usize {
        match &self.data {
            ColumnData::Numeric(values) => values.iter().filter(|v| v.is_nan()).count(),
            ColumnData::Categorical(values) => values.iter().filter(|v| v.is_none()).count(),
        }
    }

    /// Category key of a row. Numeric columns declared categorical use the
    /// textual form of the value; missing cells map to `None`.
    pub fn category_key(&self, row: usize) -> Option<String> {
        match &self.data {
            ColumnData::Numeric(values) => {
                let v = values[row];
                if v.is_nan() {
                    None
                } else {
                    Some(v.to_string())
                }
            }
            ColumnData::Categorical(values) => values[row].clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    columns: Vec<Column>,
    nrows: usize,
}

impl FeatureMatrix {
    /// Build a table from columns. The row count is taken from the first column.
    pub fn new(columns: Vec<Column>) -> Result<Self, SelectorError> {
        let nrows = columns.first().map(Column::len).unwrap_or(0);
        Self::with_rows(nrows, columns)
    }

    /// Build a table with an explicit row count, allowing zero columns.
    pub fn with_rows(nrows: usize, columns: Vec<Column>) -> Result<Self, SelectorError> {
        let mut seen = HashSet::with_capacity(columns.len());
        for column in &columns {
            if column.len() != nrows {
                return Err(SelectorError::DataValidation(format!(
                    "Column '{}' has {} rows, expected {}",
                    column.name,
                    column.len(),
                    nrows
                )));
            }
            if !seen.insert(column.name.as_str()) {
                return Err(SelectorError::DataValidation(format!(
                    "Duplicate column name '{}'",
                    column.name
                )));
            }
        }
        Ok(FeatureMatrix { columns, nrows })
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.columns.len()
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.nrows, self.columns.len())
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Project onto `names`, in the order given.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<FeatureMatrix, SelectorError> {
        let mut columns = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            let column = self.column(name).ok_or_else(|| {
                SelectorError::DataValidation(format!("Column '{}' not found in input", name))
            })?;
            columns.push(column.clone());
        }
        FeatureMatrix::with_rows(self.nrows, columns)
    }

    /// A copy of this table with `extra` columns appended on the right.
    pub fn with_appended(&self, extra: Vec<Column>) -> Result<FeatureMatrix, SelectorError> {
        let mut columns = self.columns.clone();
        columns.extend(extra);
        FeatureMatrix::with_rows(self.nrows, columns)
    }

    pub fn has_missing(&self) -> bool {
        self.columns.iter().any(|c| c.missing_count() > 0)
    }

    /// Dense row-major view of an all-numeric table.
    ///
    /// Fails with the name of the first non-numeric column.
    pub fn to_array(&self) -> Result<Array2<f64>, ModelError> {
        let ncols = self.columns.len();
        let mut data = vec![0.0; self.nrows * ncols];
        for (c, column) in self.columns.iter().enumerate() {
            let values = column.as_numeric().ok_or_else(|| {
                ModelError::InvalidInput(format!(
                    "column '{}' is not numeric-encoded",
                    column.name
                ))
            })?;
            for (r, &v) in values.iter().enumerate() {
                data[r * ncols + c] = v;
            }
        }
        Array2::from_shape_vec((self.nrows, ncols), data)
            .map_err(|e| ModelError::InvalidInput(e.to_string()))
    }
}
