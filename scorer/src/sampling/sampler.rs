use std::cmp::Ordering;
use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::errors::{ScoringError, ScoringResult};
use crate::models::{PeptideRow, Stratum, StratumKey};

/// Draws `k` of `weights.len()` items without replacement, each draw
/// proportional to weight (Efraimidis–Spirakis exponential keys).
///
/// Items with zero or invalid weight are only taken once all positive-weight
/// items are used up, in random order among themselves.
pub fn draw_weighted<R: Rng + ?Sized>(weights: &[f64], k: usize, rng: &mut R) -> Vec<usize> {
    let mut keyed: Vec<(f64, f64, usize)> = weights
        .iter()
        .enumerate()
        .map(|(i, &w)| {
            // u in (0, 1]
            let u = 1.0 - rng.gen::<f64>();
            let key = if w > 0.0 && w.is_finite() { u.ln() / w } else { f64::NEG_INFINITY };
            (key, rng.gen::<f64>(), i)
        })
        .collect();

    keyed.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal))
    });
    keyed.into_iter().take(k).map(|(_, _, i)| i).collect()
}

fn trial_rng(seed: Option<u64>, trial: usize) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s.wrapping_add(trial as u64)),
        None => StdRng::from_entropy(),
    }
}

/// Row indices per stratum, in row order.
fn stratum_members(rows: &[PeptideRow]) -> HashMap<StratumKey, Vec<usize>> {
    let mut members: HashMap<StratumKey, Vec<usize>> = HashMap::new();
    for (i, row) in rows.iter().enumerate() {
        members.entry(row.stratum_key()).or_default().push(i);
    }
    members
}

/// Selection flags of one trial: exactly `target_size` rows per stratum.
pub fn sample_trial(
    rows: &[PeptideRow],
    strata: &[Stratum],
    members: &HashMap<StratumKey, Vec<usize>>,
    trial: usize,
    seed: Option<u64>,
) -> ScoringResult<Vec<bool>> {
    let mut rng = trial_rng(seed, trial);
    let mut selected = vec![false; rows.len()];
    let empty = Vec::new();

    for stratum in strata {
        let idx = members.get(&stratum.key).unwrap_or(&empty);
        if stratum.target_size > idx.len() {
            return Err(ScoringError::DataSufficiency(format!(
                "Stratum {} needs {} peptides in trial {} but only {} are available",
                stratum.key,
                stratum.target_size,
                trial + 1,
                idx.len()
            )));
        }
        if stratum.target_size == 0 {
            continue;
        }
        let weights: Vec<f64> = idx.iter().map(|&i| rows[i].trial_weight(trial)).collect();
        for pick in draw_weighted(&weights, stratum.target_size, &mut rng) {
            selected[idx[pick]] = true;
        }
    }
    Ok(selected)
}

/// Runs all trials. Trials are independent, so they are drawn in parallel;
/// with a seed the result equals sequential drawing.
pub fn sample_trials(
    rows: &[PeptideRow],
    strata: &[Stratum],
    trials: usize,
    seed: Option<u64>,
) -> ScoringResult<Vec<Vec<bool>>> {
    let members = stratum_members(rows);
    let outside: usize = members
        .iter()
        .filter(|(k, _)| !strata.iter().any(|s| &s.key == *k))
        .map(|(_, v)| v.len())
        .sum();
    if outside > 0 {
        debug!("{} peptide rows fall outside the configured strata and are never sampled", outside);
    }

    let planned: usize = strata.iter().map(|s| s.target_size).sum();
    info!("Drawing {} peptides in each of {} sampling trials", planned, trials);

    (0..trials)
        .into_par_iter()
        .map(|trial| sample_trial(rows, strata, &members, trial, seed))
        .collect()
}
