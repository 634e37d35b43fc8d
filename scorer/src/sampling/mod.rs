pub mod planner;
pub mod sampler;
pub mod weighting;

use polars::prelude::*;
use tracing::info;

use crate::data_handling::peptide_table::{
    ENZYME_COL, LOCATION_COL, MC_COL, PEPTIDE_COL, PROTEIN_COL,
};
use crate::errors::{config_err, data_err, ScoringResult};
use crate::helper_functions::require_column;
use crate::models::{trial_label, PeptideRow};

pub const GROUP_COL: &str = "Group";
pub const DETECTABILITY_WEIGHT_COL: &str = "detectability_weight";

/// Peptide rows together with one selection flag per row and trial.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingOutcome {
    pub rows: Vec<PeptideRow>,
    /// `selections[trial][row]`
    pub selections: Vec<Vec<bool>>,
}

impl SamplingOutcome {
    pub fn trials(&self) -> usize {
        self.selections.len()
    }

    /// Rows selected in `trial`, in row order.
    pub fn selected(&self, trial: usize) -> impl Iterator<Item = &PeptideRow> {
        self.rows
            .iter()
            .zip(&self.selections[trial])
            .filter_map(|(row, &sel)| sel.then_some(row))
    }

    /// Drops rows that were not selected in any trial.
    pub fn prune(self) -> Self {
        let before = self.rows.len();
        let keep: Vec<bool> = (0..before)
            .map(|i| self.selections.iter().any(|trial| trial[i]))
            .collect();

        let rows: Vec<PeptideRow> = self
            .rows
            .into_iter()
            .zip(&keep)
            .filter_map(|(row, &k)| k.then_some(row))
            .collect();
        let selections: Vec<Vec<bool>> = self
            .selections
            .into_iter()
            .map(|trial| {
                trial
                    .into_iter()
                    .zip(&keep)
                    .filter_map(|(s, &k)| k.then_some(s))
                    .collect()
            })
            .collect();

        info!("Pruned {} never-sampled rows, {} remain", before - rows.len(), rows.len());
        Self { rows, selections }
    }
}

/// Sampling table with one 0/1 `sampling_<k>` column per trial.
pub fn sampling_table(outcome: &SamplingOutcome) -> PolarsResult<DataFrame> {
    let rows = &outcome.rows;
    let mut df = DataFrame::default();
    df.with_column(Series::new(
        PlSmallStr::from(PEPTIDE_COL),
        rows.iter().map(|r| r.peptide.as_str()).collect::<Vec<_>>(),
    ))?;
    df.with_column(Series::new(
        PlSmallStr::from(PROTEIN_COL),
        rows.iter().map(|r| r.protein.as_str()).collect::<Vec<_>>(),
    ))?;
    df.with_column(Series::new(
        PlSmallStr::from(LOCATION_COL),
        rows.iter().map(|r| r.location as i64).collect::<Vec<_>>(),
    ))?;
    df.with_column(Series::new(
        PlSmallStr::from(ENZYME_COL),
        rows.iter().map(|r| r.enzyme.as_str()).collect::<Vec<_>>(),
    ))?;
    df.with_column(Series::new(
        PlSmallStr::from(MC_COL),
        rows.iter().map(|r| r.missed_cleavages as i64).collect::<Vec<_>>(),
    ))?;
    df.with_column(Series::new(
        PlSmallStr::from(GROUP_COL),
        rows.iter().map(|r| r.protein_length_group.as_str()).collect::<Vec<_>>(),
    ))?;
    df.with_column(Series::new(
        PlSmallStr::from(DETECTABILITY_WEIGHT_COL),
        rows.iter().map(|r| r.detectability_weight).collect::<Vec<_>>(),
    ))?;
    for (trial, flags) in outcome.selections.iter().enumerate() {
        df.with_column(Series::new(
            PlSmallStr::from(trial_label(trial)),
            flags.iter().map(|&s| s as i32).collect::<Vec<_>>(),
        ))?;
    }
    Ok(df)
}

/// Reads a sampling table written by [`sampling_table`] back into an outcome.
pub fn outcome_from_table(
    df: &DataFrame,
    expected_trials: usize,
) -> ScoringResult<SamplingOutcome> {
    for col in [PEPTIDE_COL, PROTEIN_COL, LOCATION_COL, ENZYME_COL, MC_COL, GROUP_COL] {
        require_column(df, col, "sampling table")?;
    }

    let names = df.get_column_names();
    let available = (0..)
        .take_while(|&k| names.iter().any(|c| c.as_str() == trial_label(k)))
        .count();
    if expected_trials == 0 {
        return Err(config_err("At least one trial is required"));
    }
    if available < expected_trials {
        return Err(config_err(format!(
            "Sampling table holds {} trials, configuration asks for {}",
            available, expected_trials
        )));
    }
    if available > expected_trials {
        info!(
            "Sampling table holds {} trials, analysing the first {}",
            available, expected_trials
        );
    }
    let trials = expected_trials;

    let peptides = df.column(PEPTIDE_COL)?.str()?;
    let proteins = df.column(PROTEIN_COL)?.str()?;
    let enzymes = df.column(ENZYME_COL)?.str()?;
    let groups = df.column(GROUP_COL)?.str()?;
    let locations = df.column(LOCATION_COL)?.cast(&DataType::Int64)?;
    let locations = locations.i64()?;
    let mcs = df.column(MC_COL)?.cast(&DataType::Int64)?;
    let mcs = mcs.i64()?;
    let detect = if df.get_column_names().iter().any(|c| c.as_str() == DETECTABILITY_WEIGHT_COL) {
        Some(df.column(DETECTABILITY_WEIGHT_COL)?.cast(&DataType::Float64)?)
    } else {
        None
    };
    let detect = detect.as_ref().map(|c| c.f64()).transpose()?;

    let mut rows = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let (Some(peptide), Some(protein), Some(enzyme), Some(group), Some(location), Some(mc)) = (
            peptides.get(i),
            proteins.get(i),
            enzymes.get(i),
            groups.get(i),
            locations.get(i),
            mcs.get(i),
        ) else {
            return Err(data_err(format!("Sampling table row {} is incomplete", i + 1)));
        };
        if location < 1 || mc < 0 {
            return Err(data_err(format!(
                "Sampling table row {} has invalid location or MC",
                i + 1
            )));
        }
        rows.push(PeptideRow {
            peptide: peptide.to_string(),
            protein: protein.to_string(),
            location: location as usize,
            enzyme: enzyme.to_string(),
            missed_cleavages: mc as u32,
            detectability_weight: detect.and_then(|d| d.get(i)).unwrap_or(1.0),
            protein_length_group: group.to_string(),
            protein_weights: Vec::new(),
        });
    }

    let mut selections = Vec::with_capacity(trials);
    for trial in 0..trials {
        let col = df.column(&trial_label(trial))?.cast(&DataType::Int64)?;
        let flags: Vec<bool> = col.i64()?.into_iter().map(|v| v.unwrap_or(0) != 0).collect();
        selections.push(flags);
    }

    info!("Loaded {} sampled rows over {} trials", rows.len(), trials);
    Ok(SamplingOutcome { rows, selections })
}
