use std::collections::HashMap;

use tracing::{info, warn};

use crate::config::ScoreWeights;
use crate::models::{ProteinStats, ResultRecord, ScoreRecord, ScoreVariant};

/// `numerator / denominator`, NaN when the denominator is zero, missing or
/// not finite.
pub fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 || !denominator.is_finite() {
        return f64::NAN;
    }
    numerator / denominator
}

/// `(Π rᵢ^wᵢ)^(1 / Σ wᵢ)`; NaN in any ratio gives NaN.
pub fn weighted_geometric_mean(ratios: [f64; 3], weights: &ScoreWeights) -> f64 {
    let product = ratios[0].powf(weights.protein_ids())
        * ratios[1].powf(weights.peptide_ids())
        * ratios[2].powf(weights.coverage());
    product.powf(1.0 / weights.total())
}

pub fn score_variant(
    stats: &ProteinStats,
    baseline: Option<&ProteinStats>,
    weights: &ScoreWeights,
) -> ScoreVariant {
    let Some(base) = baseline else {
        return ScoreVariant::undefined();
    };
    let protein_ratio = ratio(stats.protein_count as f64, base.protein_count as f64);
    let peptide_ratio = ratio(stats.peptide_count as f64, base.peptide_count as f64);
    let coverage_ratio = ratio(stats.mean_coverage, base.mean_coverage);
    ScoreVariant {
        protein_ratio,
        peptide_ratio,
        coverage_ratio,
        score: weighted_geometric_mean([protein_ratio, peptide_ratio, coverage_ratio], weights),
    }
}

/// Left-joins every non-baseline record to the baseline record of the same
/// (group, trial) and scores both variants. Baseline records are not scored.
pub fn score_results(
    results: &[ResultRecord],
    baseline_label: &str,
    weights: &ScoreWeights,
) -> Vec<ScoreRecord> {
    let baseline: HashMap<(&str, usize), &ResultRecord> = results
        .iter()
        .filter(|r| r.combination == baseline_label)
        .map(|r| ((r.group.as_str(), r.trial), r))
        .collect();
    if baseline.is_empty() {
        warn!("No {} results found; all scores are undefined", baseline_label);
    }

    let scored: Vec<ScoreRecord> = results
        .iter()
        .filter(|r| r.combination != baseline_label)
        .map(|r| {
            let base = baseline.get(&(r.group.as_str(), r.trial)).copied();
            ScoreRecord {
                result: r.clone(),
                baseline: base.cloned(),
                unfiltered: score_variant(&r.unfiltered, base.map(|b| &b.unfiltered), weights),
                filtered: score_variant(&r.filtered, base.map(|b| &b.filtered), weights),
            }
        })
        .collect();

    let undefined = scored.iter().filter(|s| s.unfiltered.score.is_nan()).count();
    info!(
        "Scored {} records against {} ({} undefined)",
        scored.len(),
        baseline_label,
        undefined
    );
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(proteins: usize, peptides: usize, coverage: f64) -> ProteinStats {
        ProteinStats {
            protein_count: proteins,
            peptide_count: peptides,
            mean_peptides: f64::NAN,
            median_peptides: f64::NAN,
            mean_coverage: coverage,
            median_coverage: coverage,
        }
    }

    fn record(combination: &str, trial: usize, s: ProteinStats) -> ResultRecord {
        ResultRecord {
            combination: combination.into(),
            group: "g".into(),
            trial,
            min_peptides_per_protein: 2,
            unfiltered: s,
            filtered: s,
        }
    }

    #[test]
    fn identical_stats_score_exactly_one() {
        for w in [(1.0, 1.0, 1.0), (0.3, 2.0, 7.5), (1e-3, 1e3, 0.5)] {
            let weights = ScoreWeights::new(w.0, w.1, w.2).unwrap();
            let s = stats(12, 40, 0.37);
            let v = score_variant(&s, Some(&s), &weights);
            assert_eq!(v.score, 1.0);
        }
    }

    #[test]
    fn zero_denominator_is_nan() {
        let weights = ScoreWeights::default();
        let v = score_variant(&stats(3, 5, 0.5), Some(&stats(0, 0, f64::NAN)), &weights);
        assert!(v.protein_ratio.is_nan());
        assert!(v.coverage_ratio.is_nan());
        assert!(v.score.is_nan());
        assert!(score_variant(&stats(3, 5, 0.5), None, &weights).score.is_nan());
    }

    #[test]
    fn geometric_mean_uses_each_weight() {
        let weights = ScoreWeights::new(1.0, 1.0, 2.0).unwrap();
        // 2^1 * 1^1 * 4^2 = 32, ^(1/4)
        let expected = 32f64.powf(0.25);
        let g = weighted_geometric_mean([2.0, 1.0, 4.0], &weights);
        assert!((g - expected).abs() < 1e-12);
        // coverage weight, not peptide weight, applies to the coverage ratio
        let other = ScoreWeights::new(1.0, 2.0, 1.0).unwrap();
        assert!((weighted_geometric_mean([2.0, 1.0, 4.0], &other) - 8f64.powf(0.25)).abs() < 1e-12);
    }

    #[test]
    fn baseline_is_not_scored_and_joins_by_trial() {
        let results = vec![
            record("trypsin", 0, stats(10, 20, 0.5)),
            record("trypsin", 1, stats(5, 10, 0.25)),
            record("lys-c", 0, stats(5, 10, 0.5)),
            record("lys-c", 1, stats(5, 10, 0.5)),
        ];
        let scored = score_results(&results, "trypsin", &ScoreWeights::default());
        assert_eq!(scored.len(), 2);
        assert!(scored.iter().all(|s| s.result.combination == "lys-c"));
        assert_eq!(scored[0].unfiltered.protein_ratio, 0.5);
        assert_eq!(scored[1].unfiltered.protein_ratio, 1.0);
        assert_eq!(scored[1].unfiltered.coverage_ratio, 2.0);
        assert_eq!(scored[1].baseline.as_ref().unwrap().trial, 1);
    }
}
