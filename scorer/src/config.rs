use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::{config_err, ScoringError, ScoringResult};

pub const DEFAULT_CONFIG_FILE: &str = "scoring_config.json";

/// How the per-enzyme `sampling_target` is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingBasis {
    /// Absolute number of peptides drawn per enzyme.
    #[default]
    Number,
    /// Fraction of the enzyme's total peptide pool.
    Coverage,
}

/// Counting unit used by the result aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationMode {
    #[default]
    UniqueProteins,
    /// Shared peptides are assigned to every listed accession and proteins with
    /// identical evidence collapse into one group. Less validated than
    /// `UniqueProteins`.
    ProteinGroups,
}

/// Missed-cleavage frequencies as they appear in parameter files: either a
/// JSON array or the bracketed string form `"[0.74,0.21,0.05]"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FrequencyVector {
    Values(Vec<f64>),
    Encoded(String),
}

impl FrequencyVector {
    pub fn to_vec(&self) -> ScoringResult<Vec<f64>> {
        match self {
            FrequencyVector::Values(v) => Ok(v.clone()),
            FrequencyVector::Encoded(s) => parse_frequency_string(s),
        }
    }
}

fn parse_frequency_string(raw: &str) -> ScoringResult<Vec<f64>> {
    let inner = raw.trim().trim_start_matches('[').trim_end_matches(']');
    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }
    inner
        .split(',')
        .map(|tok| {
            let tok = tok.trim();
            tok.parse::<f64>().map_err(|_| {
                config_err(format!("Cannot parse '{}' in frequency vector '{}'", tok, raw))
            })
        })
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProteaseSettings {
    pub name: String,
    pub max_missed_cleavages: u32,
    pub missed_cleavage_frequencies: FrequencyVector,
    /// Peptide count or pool fraction, depending on [`SamplingBasis`].
    pub sampling_target: f64,
}

/// Exponents of the weighted geometric mean. Only constructible with finite,
/// strictly positive values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawScoreWeights")]
pub struct ScoreWeights {
    protein_ids: f64,
    peptide_ids: f64,
    coverage: f64,
}

#[derive(Deserialize)]
struct RawScoreWeights {
    protein_ids: f64,
    peptide_ids: f64,
    coverage: f64,
}

impl TryFrom<RawScoreWeights> for ScoreWeights {
    type Error = ScoringError;

    fn try_from(raw: RawScoreWeights) -> Result<Self, Self::Error> {
        ScoreWeights::new(raw.protein_ids, raw.peptide_ids, raw.coverage)
    }
}

impl ScoreWeights {
    pub fn new(protein_ids: f64, peptide_ids: f64, coverage: f64) -> ScoringResult<Self> {
        for (name, w) in [
            ("protein_ids", protein_ids),
            ("peptide_ids", peptide_ids),
            ("coverage", coverage),
        ] {
            if !w.is_finite() || w <= 0.0 {
                return Err(config_err(format!(
                    "Score weight '{}' must be a finite value > 0, got {}",
                    name, w
                )));
            }
        }
        Ok(Self {
            protein_ids,
            peptide_ids,
            coverage,
        })
    }

    pub fn protein_ids(&self) -> f64 {
        self.protein_ids
    }

    pub fn peptide_ids(&self) -> f64 {
        self.peptide_ids
    }

    pub fn coverage(&self) -> f64 {
        self.coverage
    }

    pub fn total(&self) -> f64 {
        self.protein_ids + self.peptide_ids + self.coverage
    }
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            protein_ids: 1.0,
            peptide_ids: 1.0,
            coverage: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectabilitySettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_detectability_weight")]
    pub weight: f64,
}

impl Default for DetectabilitySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            weight: default_detectability_weight(),
        }
    }
}

fn default_detectability_weight() -> f64 {
    1.0
}

fn default_trials() -> usize {
    100
}

fn default_max_combination_size() -> usize {
    3
}

fn default_baseline() -> String {
    "trypsin".to_string()
}

fn default_length_bins() -> Vec<u64> {
    vec![0, 50, 100, 99999]
}

fn default_max_unresolved_fraction() -> f64 {
    0.5
}

fn default_output_directory() -> PathBuf {
    PathBuf::from("results")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub peptide_table: PathBuf,
    pub proteome_table: PathBuf,
    #[serde(default)]
    pub protein_weight_table: Option<PathBuf>,
    #[serde(default)]
    pub detectability_table: Option<PathBuf>,
    #[serde(default = "default_output_directory")]
    pub output_directory: PathBuf,

    pub proteases: Vec<ProteaseSettings>,
    #[serde(default)]
    pub sampling_basis: SamplingBasis,
    #[serde(default = "default_trials")]
    pub trials: usize,
    #[serde(default = "default_max_combination_size")]
    pub max_combination_size: usize,
    #[serde(default)]
    pub score_weights: ScoreWeights,
    #[serde(default)]
    pub detectability: DetectabilitySettings,
    #[serde(default)]
    pub aggregation_mode: AggregationMode,
    #[serde(default = "default_baseline")]
    pub baseline_protease: String,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_length_bins")]
    pub length_bins: Vec<u64>,
    #[serde(default = "default_max_unresolved_fraction")]
    pub max_unresolved_fraction: f64,
    #[serde(default)]
    pub write_sampling_table: bool,
    #[serde(default)]
    pub existing_sampling_table: Option<PathBuf>,
}

impl ScoringConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> ScoringResult<Self> {
        info!("Reading configuration from {}", path.as_ref().display());
        let file = File::open(path.as_ref())?;
        let config: ScoringConfig = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    pub fn enzyme_names(&self) -> Vec<String> {
        self.proteases.iter().map(|p| p.name.clone()).collect()
    }

    /// Fails on the first structurally invalid setting. Runs before any
    /// table is read.
    pub fn validate(&self) -> ScoringResult<()> {
        if self.proteases.is_empty() {
            return Err(config_err("At least one protease must be configured"));
        }

        let mut seen = HashSet::new();
        for p in &self.proteases {
            if !seen.insert(p.name.as_str()) {
                return Err(config_err(format!("Protease '{}' is listed twice", p.name)));
            }

            let freqs = p.missed_cleavage_frequencies.to_vec()?;
            if freqs.len() != p.max_missed_cleavages as usize + 1 {
                return Err(config_err(format!(
                    "Protease '{}': {} missed-cleavage frequencies given, expected {} (max MC {})",
                    p.name,
                    freqs.len(),
                    p.max_missed_cleavages + 1,
                    p.max_missed_cleavages
                )));
            }
            if freqs.iter().any(|f| !f.is_finite() || *f < 0.0) {
                return Err(config_err(format!(
                    "Protease '{}': missed-cleavage frequencies must be finite and >= 0",
                    p.name
                )));
            }
            if freqs.iter().sum::<f64>() <= 0.0 {
                return Err(config_err(format!(
                    "Protease '{}': missed-cleavage frequencies sum to zero",
                    p.name
                )));
            }

            if !p.sampling_target.is_finite() || p.sampling_target < 0.0 {
                return Err(config_err(format!(
                    "Protease '{}': sampling target must be finite and >= 0",
                    p.name
                )));
            }
            if self.sampling_basis == SamplingBasis::Coverage && p.sampling_target > 1.0 {
                return Err(config_err(format!(
                    "Protease '{}': sampling target {} is not a fraction but sampling is based on coverage",
                    p.name, p.sampling_target
                )));
            }
        }

        if self.trials == 0 {
            return Err(config_err("Number of sampling trials must be at least 1"));
        }
        if self.max_combination_size == 0 {
            return Err(config_err("max_combination_size must be at least 1"));
        }
        if !self.proteases.iter().any(|p| p.name == self.baseline_protease) {
            return Err(config_err(format!(
                "Baseline protease '{}' is not among the configured proteases",
                self.baseline_protease
            )));
        }
        if self.detectability.enabled {
            if !self.detectability.weight.is_finite() || self.detectability.weight < 0.0 {
                return Err(config_err("Detectability weight must be finite and >= 0"));
            }
        }
        if self.length_bins.len() < 2 || self.length_bins.windows(2).any(|w| w[0] >= w[1]) {
            return Err(config_err(
                "length_bins needs at least two strictly increasing edges",
            ));
        }
        if !(0.0..=1.0).contains(&self.max_unresolved_fraction) {
            return Err(config_err("max_unresolved_fraction must lie within [0, 1]"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_json(extra: &str) -> String {
        format!(
            r#"{{
                "peptide_table": "peptides.tsv",
                "proteome_table": "proteome.tsv",
                "proteases": [
                    {{"name": "trypsin", "max_missed_cleavages": 2,
                      "missed_cleavage_frequencies": "[0.7415,0.2090,0.0484]",
                      "sampling_target": 1000}},
                    {{"name": "lys-c", "max_missed_cleavages": 1,
                      "missed_cleavage_frequencies": [0.8, 0.2],
                      "sampling_target": 500}}
                ]{}
            }}"#,
            extra
        )
    }

    #[test]
    fn parses_both_frequency_forms() {
        let cfg: ScoringConfig = serde_json::from_str(&minimal_json("")).unwrap();
        cfg.validate().unwrap();
        assert_eq!(
            cfg.proteases[0].missed_cleavage_frequencies.to_vec().unwrap(),
            vec![0.7415, 0.2090, 0.0484]
        );
        assert_eq!(cfg.proteases[1].missed_cleavage_frequencies.to_vec().unwrap(), vec![0.8, 0.2]);
        assert_eq!(cfg.baseline_protease, "trypsin");
        assert_eq!(cfg.trials, 100);
        assert_eq!(cfg.aggregation_mode, AggregationMode::UniqueProteins);
    }

    #[test]
    fn frequency_length_mismatch_is_fatal() {
        let json = minimal_json("").replace("[0.8, 0.2]", "[0.8, 0.1, 0.1]");
        let cfg: ScoringConfig = serde_json::from_str(&json).unwrap();
        assert!(matches!(cfg.validate(), Err(ScoringError::Config(_))));
    }

    #[test]
    fn non_positive_weights_rejected_on_construction() {
        assert!(ScoreWeights::new(1.0, 0.0, 1.0).is_err());
        assert!(ScoreWeights::new(1.0, 1.0, -2.0).is_err());
        assert!(ScoreWeights::new(f64::NAN, 1.0, 1.0).is_err());
        let json = minimal_json(
            r#", "score_weights": {"protein_ids": 0, "peptide_ids": 0, "coverage": 0}"#,
        );
        assert!(serde_json::from_str::<ScoringConfig>(&json).is_err());
    }

    #[test]
    fn unknown_baseline_rejected() {
        let json = minimal_json(r#", "baseline_protease": "glu-c""#);
        let cfg: ScoringConfig = serde_json::from_str(&json).unwrap();
        assert!(cfg.validate().is_err());
    }
}
