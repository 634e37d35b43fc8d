use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::models::{ScoreRecord, ScoreSummary, SummaryRecord};
use crate::stats;

fn summarise_scores(scores: &[f64]) -> ScoreSummary {
    // undefined scores are skipped
    let values = stats::finite_only(scores);
    ScoreSummary {
        mean: stats::mean(&values),
        std_dev: stats::std_dev(&values),
        count: values.len(),
        median: stats::median(&values),
        mad: stats::median_abs_deviation(&values),
    }
}

/// Descending with NaN after every number.
fn desc_nan_last(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}

/// One record per (combination, group), sorted by group ascending and mean
/// unfiltered score descending.
pub fn summarise(scores: &[ScoreRecord]) -> Vec<SummaryRecord> {
    let mut by_unit: BTreeMap<(&str, &str), (Vec<f64>, Vec<f64>)> = BTreeMap::new();
    for s in scores {
        let entry = by_unit
            .entry((s.result.combination.as_str(), s.result.group.as_str()))
            .or_default();
        entry.0.push(s.unfiltered.score);
        entry.1.push(s.filtered.score);
    }

    let mut out: Vec<SummaryRecord> = by_unit
        .into_iter()
        .map(|((combination, group), (unfiltered, filtered))| SummaryRecord {
            combination: combination.to_string(),
            group: group.to_string(),
            unfiltered: summarise_scores(&unfiltered),
            filtered: summarise_scores(&filtered),
        })
        .collect();

    out.sort_by(|a, b| {
        a.group
            .cmp(&b.group)
            .then_with(|| desc_nan_last(a.unfiltered.mean, b.unfiltered.mean))
            .then_with(|| a.combination.cmp(&b.combination))
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ProteinStats, ResultRecord, ScoreVariant};

    fn score(combination: &str, group: &str, trial: usize, value: f64) -> ScoreRecord {
        let stats = ProteinStats {
            protein_count: 1,
            peptide_count: 1,
            mean_peptides: 1.0,
            median_peptides: 1.0,
            mean_coverage: 0.1,
            median_coverage: 0.1,
        };
        let variant = ScoreVariant {
            protein_ratio: value,
            peptide_ratio: value,
            coverage_ratio: value,
            score: value,
        };
        ScoreRecord {
            result: ResultRecord {
                combination: combination.into(),
                group: group.into(),
                trial,
                min_peptides_per_protein: 2,
                unfiltered: stats,
                filtered: stats,
            },
            baseline: None,
            unfiltered: variant,
            filtered: variant,
        }
    }

    #[test]
    fn statistics_skip_undefined_scores() {
        let records = vec![
            score("lys-c", "g", 0, 1.0),
            score("lys-c", "g", 1, 2.0),
            score("lys-c", "g", 2, f64::NAN),
            score("lys-c", "g", 3, 6.0),
        ];
        let s = &summarise(&records)[0];
        assert_eq!(s.unfiltered.count, 3);
        assert!((s.unfiltered.mean - 3.0).abs() < 1e-12);
        assert!((s.unfiltered.median - 2.0).abs() < 1e-12);
        assert!((s.unfiltered.std_dev - 7f64.sqrt()).abs() < 1e-12);
        // |1-2|, |2-2|, |6-2| -> 1, 0, 4
        assert!((s.unfiltered.mad - 1.0).abs() < 1e-12);
    }

    #[test]
    fn sorted_by_group_then_score() {
        let records = vec![
            score("a", "small_proteins", 0, 0.8),
            score("b", "small_proteins", 0, 1.2),
            score("c", "small_proteins", 0, f64::NAN),
            score("a", "large_proteins", 0, 0.5),
        ];
        let order: Vec<(String, String)> = summarise(&records)
            .into_iter()
            .map(|s| (s.group, s.combination))
            .collect();
        assert_eq!(
            order,
            vec![
                ("large_proteins".to_string(), "a".to_string()),
                ("small_proteins".to_string(), "b".to_string()),
                ("small_proteins".to_string(), "a".to_string()),
                ("small_proteins".to_string(), "c".to_string()),
            ]
        );
    }
}
