use std::fmt;

use polars::prelude::*;

/// Anything that can be read into a polars table.
pub trait TableSource {
    fn load(&self) -> PolarsResult<DataFrame>;
}

pub const MIN_PEPTIDES_PER_PROTEIN: usize = 2;
pub const COMBINATION_SEPARATOR: &str = " - ";

/// One mapped peptide occurrence from the digestion/mapping step.
#[derive(Debug, Clone, PartialEq)]
pub struct PeptideRow {
    pub peptide: String,
    /// Single accession, or `;`-separated accessions for shared peptides.
    pub protein: String,
    /// 1-based start position in the protein sequence.
    pub location: usize,
    pub enzyme: String,
    pub missed_cleavages: u32,
    pub detectability_weight: f64,
    pub protein_length_group: String,
    /// Protein abundance weight per trial; empty means 1.0 everywhere.
    pub protein_weights: Vec<f64>,
}

impl PeptideRow {
    pub fn stratum_key(&self) -> StratumKey {
        StratumKey::new(&self.enzyme, self.missed_cleavages)
    }

    /// Sampling weight of this row in trial `trial` (0-based).
    pub fn trial_weight(&self, trial: usize) -> f64 {
        let abundance = self.protein_weights.get(trial).copied().unwrap_or(1.0);
        abundance * self.detectability_weight
    }

    pub fn accessions(&self) -> impl Iterator<Item = &str> {
        self.protein.split(';').map(str::trim).filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StratumKey {
    pub enzyme: String,
    pub missed_cleavages: u32,
}

impl StratumKey {
    pub fn new(enzyme: &str, missed_cleavages: u32) -> Self {
        Self {
            enzyme: enzyme.to_string(),
            missed_cleavages,
        }
    }
}

impl fmt::Display for StratumKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}__{}", self.enzyme, self.missed_cleavages)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stratum {
    pub key: StratumKey,
    /// Normalised so that all strata of one enzyme sum to 1.
    pub frequency: f64,
    pub available_count: usize,
    pub target_size: usize,
}

/// Ordered subset of the configured enzymes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Combination(pub Vec<String>);

impl Combination {
    pub fn contains(&self, enzyme: &str) -> bool {
        self.0.iter().any(|e| e == enzyme)
    }

    pub fn label(&self) -> String {
        self.0.join(COMBINATION_SEPARATOR)
    }
}

impl fmt::Display for Combination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

pub fn trial_label(trial: usize) -> String {
    format!("sampling_{}", trial + 1)
}

/// Counts and distribution statistics over one set of identified proteins.
/// Means and medians of an empty set are NaN.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProteinStats {
    pub protein_count: usize,
    pub peptide_count: usize,
    pub mean_peptides: f64,
    pub median_peptides: f64,
    pub mean_coverage: f64,
    pub median_coverage: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultRecord {
    pub combination: String,
    pub group: String,
    pub trial: usize,
    pub min_peptides_per_protein: usize,
    pub unfiltered: ProteinStats,
    pub filtered: ProteinStats,
}

/// Ratios against the baseline and the resulting weighted geometric mean.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreVariant {
    pub protein_ratio: f64,
    pub peptide_ratio: f64,
    pub coverage_ratio: f64,
    pub score: f64,
}

impl ScoreVariant {
    pub fn undefined() -> Self {
        Self {
            protein_ratio: f64::NAN,
            peptide_ratio: f64::NAN,
            coverage_ratio: f64::NAN,
            score: f64::NAN,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreRecord {
    pub result: ResultRecord,
    pub baseline: Option<ResultRecord>,
    pub unfiltered: ScoreVariant,
    pub filtered: ScoreVariant,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreSummary {
    pub mean: f64,
    pub std_dev: f64,
    pub count: usize,
    pub median: f64,
    pub mad: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRecord {
    pub combination: String,
    pub group: String,
    pub unfiltered: ScoreSummary,
    pub filtered: ScoreSummary,
}
