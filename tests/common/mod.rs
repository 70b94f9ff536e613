//! Shared fixtures: the Titanic-style sample table in `tests/data`.
#![allow(dead_code)]

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use hisoka::config::ModelParams;
use hisoka::data_handling::{Column, FeatureMatrix};

pub const NUMERICAL: [&str; 5] = ["Pclass", "Age", "SibSp", "Parch", "Fare"];
pub const CATEGORICAL: [&str; 1] = ["Sex"];
pub const TARGET: &str = "Survived";

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn dataset_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/data/sample_dataset.csv")
}

/// Small models keep the full option grid fast.
pub fn small_params() -> ModelParams {
    ModelParams {
        n_estimators: Some(15),
        max_depth: Some(4),
        ..Default::default()
    }
}

struct RawRows {
    numeric: Vec<Vec<f64>>,
    sex: Vec<Option<String>>,
    target: Vec<f64>,
}

fn parse_cell(value: &str) -> Result<f64> {
    if value.trim().is_empty() {
        return Ok(f64::NAN);
    }
    value
        .trim()
        .parse::<f64>()
        .with_context(|| format!("cannot parse '{}' as a number", value))
}

fn read_rows() -> Result<RawRows> {
    let mut reader = csv::Reader::from_path(dataset_path())?;
    let headers = reader.headers()?.clone();
    let index = |name: &str| -> Result<usize> {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| anyhow!("column '{}' missing from sample_dataset.csv", name))
    };
    let numeric_idx: Vec<usize> = NUMERICAL.iter().map(|n| index(*n)).collect::<Result<_>>()?;
    let sex_idx = index(CATEGORICAL[0])?;
    let target_idx = index(TARGET)?;

    let mut rows = RawRows {
        numeric: vec![Vec::new(); NUMERICAL.len()],
        sex: Vec::new(),
        target: Vec::new(),
    };
    for record in reader.records() {
        let record = record?;
        for (column, &i) in rows.numeric.iter_mut().zip(&numeric_idx) {
            column.push(parse_cell(&record[i])?);
        }
        let sex = record[sex_idx].trim();
        rows.sex.push(if sex.is_empty() { None } else { Some(sex.to_string()) });
        rows.target.push(parse_cell(&record[target_idx])?);
    }
    Ok(rows)
}

fn numeric_columns(rows: &RawRows, impute: bool) -> Vec<Column> {
    NUMERICAL
        .iter()
        .zip(&rows.numeric)
        .map(|(name, values)| {
            let values = if impute {
                values.iter().map(|v| if v.is_nan() { 0.0 } else { *v }).collect()
            } else {
                values.clone()
            };
            Column::numeric(*name, values)
        })
        .collect()
}

fn encoded_sex(rows: &RawRows) -> Column {
    let values = rows
        .sex
        .iter()
        .map(|s| match s.as_deref() {
            Some("female") => 1.0,
            Some("male") => 0.0,
            _ => f64::NAN,
        })
        .collect();
    Column::numeric("Sex", values)
}

/// Numeric predictors plus `Sex` as raw strings; `Age` has missing cells.
pub fn load_raw() -> Result<(FeatureMatrix, Vec<f64>)> {
    let rows = read_rows()?;
    let mut columns = numeric_columns(&rows, false);
    columns.push(Column::categorical("Sex", rows.sex.clone()));
    Ok((FeatureMatrix::new(columns)?, rows.target))
}

/// `Sex` encoded as female = 1, male = 0; missing cells kept.
pub fn load_encoded() -> Result<(FeatureMatrix, Vec<f64>)> {
    let rows = read_rows()?;
    let mut columns = numeric_columns(&rows, false);
    columns.push(encoded_sex(&rows));
    Ok((FeatureMatrix::new(columns)?, rows.target))
}

/// Encoded table with every missing cell replaced by zero.
pub fn load_imputed() -> Result<(FeatureMatrix, Vec<f64>)> {
    let rows = read_rows()?;
    let mut columns = numeric_columns(&rows, true);
    let sex = encoded_sex(&rows);
    let sex_values = sex
        .as_numeric()
        .unwrap_or(&[])
        .iter()
        .map(|v| if v.is_nan() { 0.0 } else { *v })
        .collect();
    columns.push(Column::numeric("Sex", sex_values));
    Ok((FeatureMatrix::new(columns)?, rows.target))
}
