//! Run the random-probe selector on a Titanic-style CSV.
//!
//! ```text
//! cargo run --example titanic_selection -- [path/to/file.csv] [model] [importance_method]
//! ```
//!
//! The file needs `Survived`, `Pclass`, `Sex`, `Age`, `SibSp`, `Parch` and
//! `Fare` columns. `Sex` is kept as text and declared categorical, so only
//! `catboost` accepts it unencoded.
use anyhow::{anyhow, Context, Result};
use hisoka::config::SelectorConfig;
use hisoka::data_handling::{Column, FeatureMatrix};
use hisoka::feature_selection::random_probe::RandomFeatureSelector;

const NUMERICAL: [&str; 5] = ["Pclass", "Age", "SibSp", "Parch", "Fare"];

fn load(path: &str) -> Result<(FeatureMatrix, Vec<f64>)> {
    let mut reader = csv::Reader::from_path(path).with_context(|| format!("cannot open {}", path))?;
    let headers = reader.headers()?.clone();
    let index = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| anyhow!("column '{}' not found in {}", name, path))
    };
    let numeric_idx = NUMERICAL.iter().map(|n| index(*n)).collect::<Result<Vec<_>>>()?;
    let sex_idx = index("Sex")?;
    let target_idx = index("Survived")?;

    let mut numeric = vec![Vec::new(); NUMERICAL.len()];
    let mut sex = Vec::new();
    let mut target = Vec::new();
    for record in reader.records() {
        let record = record?;
        for (values, &i) in numeric.iter_mut().zip(&numeric_idx) {
            let cell = record[i].trim();
            values.push(if cell.is_empty() { f64::NAN } else { cell.parse::<f64>()? });
        }
        let cell = record[sex_idx].trim();
        sex.push(if cell.is_empty() { None } else { Some(cell.to_string()) });
        target.push(record[target_idx].trim().parse::<f64>()?);
    }

    let mut columns: Vec<Column> = NUMERICAL
        .iter()
        .zip(numeric)
        .map(|(name, values)| Column::numeric(*name, values))
        .collect();
    columns.push(Column::categorical("Sex", sex));
    Ok((FeatureMatrix::new(columns)?, target))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();
    let default_path = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/data/sample_dataset.csv");
    let path = args.get(1).cloned().unwrap_or_else(|| default_path.to_string());
    let model = args.get(2).map(String::as_str).unwrap_or("catboost");
    let importance = args.get(3).map(String::as_str).unwrap_or("embedded");

    let (x, y) = load(&path)?;
    log::info!("Loaded {} rows x {} columns from {}", x.nrows(), x.ncols(), path);

    let config = SelectorConfig::new(model, importance, "float", "classification")
        .with_categorical_columns(["Sex"])
        .with_number_of_fits(5)
        .with_n_probes(3)
        .with_seed(42);
    let mut selector = RandomFeatureSelector::new(config);
    let reduced = selector.fit_transform(&x, &y)?;

    if let Some(importance) = selector.aggregated_importance() {
        println!("{:<8} {:>10}  kept", "feature", "score");
        for (name, score) in importance.features() {
            let kept = selector
                .selection()
                .and_then(|s| s.is_selected(name))
                .unwrap_or(false);
            println!("{:<8} {:>10.4}  {}", name, score, kept);
        }
        println!("{:<8} {:>10.4}", "baseline", importance.baseline());
    }
    println!("Reduced table: {:?}", reduced.column_names());
    Ok(())
}
