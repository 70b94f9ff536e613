//! Synthetic noise columns injected into every fit.
use rand::Rng;

use crate::config::RandVarType;
use crate::data_handling::Column;

/// Largest value an integer probe can take.
pub const INTEGER_PROBE_MAX: u32 = 100;

/// Names for `n_probes` probe columns that do not collide with `existing`.
///
/// The i-th probe is `__probe_{i}`; on a clash underscores are prepended
/// until the name is free.
pub fn probe_names<S: AsRef<str>>(existing: &[S], n_probes: usize) -> Vec<String> {
    let taken = |name: &str| existing.iter().any(|e| e.as_ref() == name);
    (0..n_probes)
        .map(|i| {
            let mut name = format!("__probe_{}", i);
            while taken(name.as_str()) {
                name.insert(0, '_');
            }
            name
        })
        .collect()
}

/// Draw one fresh column per name.
///
/// Integer probes are uniform on `0..=100`, float probes uniform on `[0, 1)`.
pub fn draw_probes<R: Rng + ?Sized>(
    rng: &mut R,
    names: &[String],
    nrows: usize,
    rand_var_type: RandVarType,
) -> Vec<Column> {
    names
        .iter()
        .map(|name| {
            let values: Vec<f64> = match rand_var_type {
                RandVarType::Integer => (0..nrows)
                    .map(|_| rng.gen_range(0..=INTEGER_PROBE_MAX) as f64)
                    .collect(),
                RandVarType::Float => (0..nrows).map(|_| rng.gen::<f64>()).collect(),
            };
            Column::numeric(name.clone(), values)
        })
        .collect()
}
