//! Per-row sampling weights: protein abundance per trial times peptide
//! detectability.

use std::collections::HashMap;

use tracing::{info, warn};

use crate::config::DetectabilitySettings;
use crate::errors::{data_err, ScoringResult};
use crate::models::PeptideRow;

/// Turns raw predictor output into sampling weights.
///
/// The predictor reports the probability of a peptide *not* being detected,
/// so each value is inverted, raised to `4 × weight` and divided by the
/// maximum over all peptides.
pub fn effective_detectability(raw: &[f64], weight: f64) -> Vec<f64> {
    let exponent = 4.0 * weight;
    let transformed: Vec<f64> = raw.iter().map(|d| (1.0 - d).powf(exponent)).collect();
    let max = transformed.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !(max > 0.0) || !max.is_finite() {
        warn!("All transformed detectability values are zero; peptides are drawn uniformly");
        return vec![0.0; raw.len()];
    }
    transformed.into_iter().map(|t| t / max).collect()
}

/// Sets `detectability_weight` on every row. Rows whose peptide has no
/// prediction get the mean raw prediction.
pub fn apply_detectability(
    rows: &mut [PeptideRow],
    predictions: Option<&HashMap<String, f64>>,
    settings: &DetectabilitySettings,
) -> ScoringResult<()> {
    if !settings.enabled {
        rows.iter_mut().for_each(|r| r.detectability_weight = 1.0);
        return Ok(());
    }
    let predictions = predictions.filter(|p| !p.is_empty()).ok_or_else(|| {
        data_err("Detectability weighting is enabled but no predictions were loaded")
    })?;

    let matched: Vec<Option<f64>> =
        rows.iter().map(|r| predictions.get(&r.peptide).copied()).collect();
    let known: Vec<f64> = matched.iter().flatten().copied().collect();
    let fallback = if known.is_empty() {
        predictions.values().sum::<f64>() / predictions.len() as f64
    } else {
        known.iter().sum::<f64>() / known.len() as f64
    };
    let missing = matched.iter().filter(|m| m.is_none()).count();
    if missing > 0 {
        warn!(
            "{} peptide rows have no detectability prediction; using mean prediction {:.4}",
            missing, fallback
        );
    }

    let raw: Vec<f64> = matched.into_iter().map(|m| m.unwrap_or(fallback)).collect();
    let effective = effective_detectability(&raw, settings.weight);
    for (row, w) in rows.iter_mut().zip(effective) {
        row.detectability_weight = w;
    }
    info!("Applied detectability weights (weight parameter {})", settings.weight);
    Ok(())
}

/// Attaches per-trial abundance weights. A shared row (several accessions)
/// gets the sum of its members' weights; proteins without weights count as 0.
pub fn apply_protein_weights(
    rows: &mut [PeptideRow],
    weights: &HashMap<String, Vec<f64>>,
    trials: usize,
) {
    let mut unweighted = 0usize;
    for row in rows.iter_mut() {
        let mut per_trial = vec![0.0; trials];
        let mut found = false;
        for acc in row.accessions() {
            if let Some(w) = weights.get(acc) {
                found = true;
                per_trial.iter_mut().zip(w).for_each(|(t, w)| *t += w);
            }
        }
        if !found {
            unweighted += 1;
        }
        row.protein_weights = per_trial;
    }
    if unweighted > 0 {
        warn!(
            "{} peptide rows belong to proteins without sampling weights and are only drawn once a stratum is exhausted",
            unweighted
        );
    }
}
