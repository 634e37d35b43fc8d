use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use polars::prelude::*;
use tracing::{debug, error, info, warn};

use crate::config::AggregationMode;
use crate::errors::{data_err, ScoringResult};
use crate::helper_functions::{has_column, read_tsv, require_column};
use crate::models::{PeptideRow, TableSource};
use crate::protein::ReferenceProteome;

pub const PEPTIDE_COL: &str = "peptide";
pub const PROTEIN_COL: &str = "protein";
pub const LOCATION_COL: &str = "location";
pub const ENZYME_COL: &str = "Enzyme";
pub const MC_COL: &str = "MC";
pub const DETECTABILITY_COL: &str = "detectability";

/// Digested and mapped peptides, one row per (peptide, protein, enzyme).
pub struct PeptideTable {
    pub path: PathBuf,
}

impl TableSource for PeptideTable {
    fn load(&self) -> PolarsResult<DataFrame> {
        info!("Reading peptide table from {}", self.path.display());
        let df = match read_tsv(&self.path) {
            Ok(df) => df,
            Err(e) => {
                error!("Failed to read peptide table: {}", e);
                return Err(e);
            }
        };
        let source = self.path.display().to_string();
        for col in [PEPTIDE_COL, PROTEIN_COL, LOCATION_COL, ENZYME_COL, MC_COL] {
            require_column(&df, col, &source)?;
        }
        Ok(df)
    }
}

/// Typed peptide rows plus raw detectability predictions when the table
/// carries a `detectability` column.
pub struct PeptideRows {
    pub rows: Vec<PeptideRow>,
    pub embedded_predictions: Option<HashMap<String, f64>>,
}

pub fn peptide_rows(df: &DataFrame) -> ScoringResult<PeptideRows> {
    let peptides = df.column(PEPTIDE_COL)?.str()?.clone();
    let proteins = df.column(PROTEIN_COL)?.str()?.clone();
    let enzymes = df.column(ENZYME_COL)?.str()?.clone();
    let locations = df.column(LOCATION_COL)?.cast(&DataType::Int64)?;
    let locations = locations.i64()?;
    let mcs = df.column(MC_COL)?.cast(&DataType::Int64)?;
    let mcs = mcs.i64()?;

    let mut rows = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let (Some(peptide), Some(protein), Some(enzyme)) =
            (peptides.get(i), proteins.get(i), enzymes.get(i))
        else {
            return Err(data_err(format!("Peptide table row {} has empty text fields", i + 1)));
        };
        let location = match locations.get(i) {
            Some(l) if l >= 1 => l as usize,
            other => {
                return Err(data_err(format!(
                    "Peptide {} has invalid location {:?}; locations are 1-based",
                    peptide, other
                )))
            }
        };
        let missed_cleavages = match mcs.get(i) {
            Some(mc) if mc >= 0 => mc as u32,
            other => {
                return Err(data_err(format!(
                    "Peptide {} has invalid missed-cleavage count {:?}",
                    peptide, other
                )))
            }
        };
        rows.push(PeptideRow {
            peptide: peptide.to_string(),
            protein: protein.to_string(),
            location,
            enzyme: enzyme.to_string(),
            missed_cleavages,
            detectability_weight: 1.0,
            protein_length_group: String::new(),
            protein_weights: Vec::new(),
        });
    }

    let duplicates = count_duplicate_pairs(&rows);
    if duplicates > 0 {
        warn!(
            "{} peptide/enzyme pairs occur more than once; rows are kept as given",
            duplicates
        );
    }

    let embedded_predictions = if has_column(df, DETECTABILITY_COL) {
        let preds = df.column(DETECTABILITY_COL)?.cast(&DataType::Float64)?;
        let preds = preds.f64()?;
        let map: HashMap<String, f64> = rows
            .iter()
            .zip(preds.into_iter())
            .filter_map(|(row, p)| p.map(|p| (row.peptide.clone(), p)))
            .collect();
        debug!("Peptide table carries {} detectability predictions", map.len());
        Some(map)
    } else {
        None
    };

    info!("Loaded {} peptide rows", rows.len());
    Ok(PeptideRows {
        rows,
        embedded_predictions,
    })
}

fn count_duplicate_pairs(rows: &[PeptideRow]) -> usize {
    let mut seen = HashSet::with_capacity(rows.len());
    rows.iter()
        .filter(|r| !seen.insert((r.peptide.as_str(), r.enzyme.as_str())))
        .count()
}

/// Attaches the length group of each row's protein and drops rows whose
/// protein is not part of the reference proteome. Fails when more than
/// `max_unresolved_fraction` of the rows had to be dropped.
pub fn resolve_protein_groups(
    rows: Vec<PeptideRow>,
    proteome: &ReferenceProteome,
    mode: AggregationMode,
    max_unresolved_fraction: f64,
) -> ScoringResult<Vec<PeptideRow>> {
    let total = rows.len();
    let mut resolved = Vec::with_capacity(total);
    for mut row in rows {
        let group = match mode {
            AggregationMode::UniqueProteins => proteome.get(&row.protein).map(|p| p.group.clone()),
            AggregationMode::ProteinGroups => row
                .accessions()
                .find_map(|acc| proteome.get(acc))
                .map(|p| p.group.clone()),
        };
        if let Some(group) = group {
            row.protein_length_group = group;
            resolved.push(row);
        }
    }

    let dropped = total - resolved.len();
    if dropped > 0 {
        let fraction = dropped as f64 / total as f64;
        warn!(
            "{} of {} peptide rows ({:.1} %) map to proteins missing from the reference proteome and are ignored",
            dropped,
            total,
            fraction * 100.0
        );
        if fraction > max_unresolved_fraction {
            return Err(data_err(format!(
                "{:.1} % of peptide rows could not be resolved against the reference proteome (tolerance {:.1} %)",
                fraction * 100.0,
                max_unresolved_fraction * 100.0
            )));
        }
    }
    Ok(resolved)
}
