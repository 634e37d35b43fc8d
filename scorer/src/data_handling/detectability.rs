use std::collections::HashMap;
use std::path::PathBuf;

use polars::prelude::*;
use tracing::{error, info};

use crate::errors::{data_err, ScoringResult};
use crate::helper_functions::{read_tsv, require_column};
use crate::models::TableSource;

pub const PEPTIDE_COL: &str = "peptide";
pub const PREDICTION_COL: &str = "prediction";

/// Raw detectability predictions exported by the external predictor.
pub struct DetectabilityTable {
    pub path: PathBuf,
}

impl TableSource for DetectabilityTable {
    fn load(&self) -> PolarsResult<DataFrame> {
        info!("Reading detectability predictions from {}", self.path.display());
        let df = read_tsv(&self.path).map_err(|e| {
            error!("Failed to read detectability table: {}", e);
            e
        })?;
        let source = self.path.display().to_string();
        require_column(&df, PEPTIDE_COL, &source)?;
        require_column(&df, PREDICTION_COL, &source)?;
        Ok(df)
    }
}

/// Peptide sequence to raw prediction in `[0, 1]`. Null predictions are skipped.
pub fn raw_predictions(df: &DataFrame) -> ScoringResult<HashMap<String, f64>> {
    let peptides = df.column(PEPTIDE_COL)?.str()?;
    let preds = df.column(PREDICTION_COL)?.cast(&DataType::Float64)?;
    let preds = preds.f64()?;

    let mut out = HashMap::with_capacity(df.height());
    for (peptide, pred) in peptides.into_iter().zip(preds.into_iter()) {
        let (Some(peptide), Some(pred)) = (peptide, pred) else { continue };
        if !(0.0..=1.0).contains(&pred) {
            return Err(data_err(format!(
                "Detectability prediction {} for {} lies outside [0, 1]",
                pred, peptide
            )));
        }
        out.insert(peptide.to_string(), pred);
    }
    Ok(out)
}
