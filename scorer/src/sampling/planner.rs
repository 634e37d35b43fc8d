use std::collections::HashMap;

use tracing::{debug, warn};

use crate::config::{ProteaseSettings, SamplingBasis};
use crate::errors::ScoringResult;
use crate::models::{PeptideRow, Stratum, StratumKey};

/// Rows per (enzyme, MC) stratum.
pub fn available_counts(rows: &[PeptideRow]) -> HashMap<StratumKey, usize> {
    let mut counts = HashMap::new();
    for row in rows {
        *counts.entry(row.stratum_key()).or_insert(0) += 1;
    }
    counts
}

/// Scales `raw` to sum 1. Warns when the raw sum is off by more than 1 %.
pub fn normalise_frequencies(enzyme: &str, raw: &[f64]) -> Vec<f64> {
    let sum: f64 = raw.iter().sum();
    if !(0.99..=1.01).contains(&sum) {
        warn!(
            "Missed-cleavage frequencies of {} sum to {:.4}; normalising to 1.0",
            enzyme, sum
        );
    }
    raw.iter().map(|f| f / sum).collect()
}

/// One stratum per configured (enzyme, MC) pair, in configuration order.
pub fn plan_strata(
    proteases: &[ProteaseSettings],
    basis: SamplingBasis,
    available: &HashMap<StratumKey, usize>,
) -> ScoringResult<Vec<Stratum>> {
    let mut strata = Vec::new();
    for protease in proteases {
        let frequencies = normalise_frequencies(
            &protease.name,
            &protease.missed_cleavage_frequencies.to_vec()?,
        );
        let keys: Vec<StratumKey> = (0..=protease.max_missed_cleavages)
            .map(|mc| StratumKey::new(&protease.name, mc))
            .collect();

        let enzyme_total = match basis {
            SamplingBasis::Number => protease.sampling_target,
            SamplingBasis::Coverage => {
                let pool: usize = keys.iter().map(|k| available.get(k).copied().unwrap_or(0)).sum();
                protease.sampling_target * pool as f64
            }
        };
        debug!("{:<20} total sampling target {:.1}", protease.name, enzyme_total);

        for (key, frequency) in keys.into_iter().zip(frequencies) {
            let available_count = available.get(&key).copied().unwrap_or(0);
            let nominal = (enzyme_total * frequency).round() as usize;
            let target_size = if nominal > available_count {
                if available_count > 0 {
                    warn!(
                        "Stratum {} asks for {} peptides but only {} are available; sampling all of them",
                        key, nominal, available_count
                    );
                } else {
                    debug!("Stratum {} has no peptides", key);
                }
                available_count
            } else {
                nominal
            };
            strata.push(Stratum {
                key,
                frequency,
                available_count,
                target_size,
            });
        }
    }
    Ok(strata)
}
