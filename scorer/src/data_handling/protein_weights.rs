use std::collections::HashMap;
use std::path::PathBuf;

use polars::prelude::*;
use tracing::{error, info};

use crate::errors::{config_err, data_err, ScoringResult};
use crate::helper_functions::{read_tsv, require_column};
use crate::models::TableSource;

pub const IDENTIFIER_COL: &str = "Identifier";
pub const WEIGHT_PREFIX: &str = "random_sampling_";

/// Per-trial protein abundance weights (`Identifier`, `Random_sampling_1..N`).
pub struct ProteinWeightTable {
    pub path: PathBuf,
}

impl TableSource for ProteinWeightTable {
    fn load(&self) -> PolarsResult<DataFrame> {
        info!("Reading protein weights from {}", self.path.display());
        let df = read_tsv(&self.path).map_err(|e| {
            error!("Failed to read protein weight table: {}", e);
            e
        })?;
        require_column(&df, IDENTIFIER_COL, &self.path.display().to_string())?;
        Ok(df)
    }
}

fn weight_column_name(df: &DataFrame, trial: usize) -> Option<String> {
    let wanted = format!("{}{}", WEIGHT_PREFIX, trial + 1);
    df.get_column_names()
        .into_iter()
        .find(|c| c.to_lowercase() == wanted)
        .map(|c| c.to_string())
}

/// Identifier to one weight per trial. Missing values become 0; negative
/// weights are rejected.
pub fn protein_weights(df: &DataFrame, trials: usize) -> ScoringResult<HashMap<String, Vec<f64>>> {
    let ids = df.column(IDENTIFIER_COL)?.str()?.clone();
    let mut columns = Vec::with_capacity(trials);
    for trial in 0..trials {
        let name = weight_column_name(df, trial).ok_or_else(|| {
            config_err(format!(
                "Protein weight table has no column for trial {} but {} trials are configured",
                trial + 1,
                trials
            ))
        })?;
        let col = df.column(&name)?.cast(&DataType::Float64)?;
        columns.push(col.f64()?.clone());
    }

    let mut weights = HashMap::with_capacity(df.height());
    for i in 0..df.height() {
        let Some(id) = ids.get(i) else { continue };
        let mut per_trial = Vec::with_capacity(trials);
        for col in &columns {
            let w = col.get(i).filter(|w| w.is_finite()).unwrap_or(0.0);
            if w < 0.0 {
                return Err(data_err(format!("Protein {} has negative sampling weight {}", id, w)));
            }
            per_trial.push(w);
        }
        weights.insert(id.to_string(), per_trial);
    }
    info!("Loaded sampling weights for {} proteins and {} trials", weights.len(), trials);
    Ok(weights)
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::df;

    #[test]
    fn reads_trial_columns_case_insensitively() {
        let df = df![
            "Identifier" => &["P1", "P2"],
            "Random_sampling_1" => &[Some(2.0), None],
            "random_sampling_2" => &[0.5, 1.5]
        ]
        .unwrap();
        let w = protein_weights(&df, 2).unwrap();
        assert_eq!(w["P1"], vec![2.0, 0.5]);
        assert_eq!(w["P2"], vec![0.0, 1.5]);
    }

    #[test]
    fn too_few_columns_is_config_error() {
        let df = df![
            "Identifier" => &["P1"],
            "Random_sampling_1" => &[1.0]
        ]
        .unwrap();
        assert!(protein_weights(&df, 3).is_err());
    }

    #[test]
    fn negative_weight_rejected() {
        let df = df![
            "Identifier" => &["P1"],
            "Random_sampling_1" => &[-1.0]
        ]
        .unwrap();
        assert!(protein_weights(&df, 1).is_err());
    }
}
