use std::path::PathBuf;

use polars::prelude::*;
use tracing::{error, info};

use crate::errors::{data_err, ScoringResult};
use crate::helper_functions::{has_column, read_tsv, require_column};
use crate::models::TableSource;
use crate::protein::{bin_labels, length_group, ReferenceProteome, ReferenceProtein};

pub const IDENTIFIER_COL: &str = "Identifier";
pub const LENGTH_COL: &str = "Sequence_Len[aa]";
pub const GROUP_COL: &str = "Group";

pub struct ProteomeTable {
    pub path: PathBuf,
}

impl TableSource for ProteomeTable {
    fn load(&self) -> PolarsResult<DataFrame> {
        info!("Reading reference proteome from {}", self.path.display());
        let df = read_tsv(&self.path).map_err(|e| {
            error!("Failed to read reference proteome: {}", e);
            e
        })?;
        let source = self.path.display().to_string();
        require_column(&df, IDENTIFIER_COL, &source)?;
        require_column(&df, LENGTH_COL, &source)?;
        Ok(df)
    }
}

/// Builds the reference proteome. Uses the `Group` column when present,
/// otherwise bins proteins by length with `length_bins`.
pub fn reference_proteome(df: &DataFrame, length_bins: &[u64]) -> ScoringResult<ReferenceProteome> {
    let ids = df.column(IDENTIFIER_COL)?.str()?.clone();
    let lengths = df.column(LENGTH_COL)?.cast(&DataType::Int64)?;
    let lengths = lengths.i64()?;
    let groups = if has_column(df, GROUP_COL) {
        Some(df.column(GROUP_COL)?.str()?.clone())
    } else {
        info!("No {} column, binning proteins by length with edges {:?}", GROUP_COL, length_bins);
        None
    };
    let labels = bin_labels(length_bins);

    let mut proteins = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let identifier = ids.get(i).ok_or_else(|| {
            data_err(format!("Reference proteome row {} has no identifier", i + 1))
        })?;
        let sequence_length = match lengths.get(i) {
            Some(l) if l > 0 => l as usize,
            other => {
                return Err(data_err(format!(
                    "Protein {} has invalid sequence length {:?}",
                    identifier, other
                )))
            }
        };
        let group = match groups.as_ref().and_then(|g| g.get(i)) {
            Some(g) => g.to_string(),
            None => length_group(sequence_length, length_bins, &labels),
        };
        proteins.push(ReferenceProtein {
            identifier: identifier.to_string(),
            sequence_length,
            group,
        });
    }

    let proteome = ReferenceProteome::new(proteins)?;
    for group in proteome.groups() {
        info!("{:<25} {:>8} proteins", group, proteome.members(&group).count());
    }
    Ok(proteome)
}
