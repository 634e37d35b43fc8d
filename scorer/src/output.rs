use std::path::{Path, PathBuf};

use polars::prelude::*;
use tracing::info;

use crate::config::ScoreWeights;
use crate::helper_functions::{nan_to_none, write_tsv};
use crate::models::{trial_label, ProteinStats, ScoreRecord, ScoreSummary, SummaryRecord};

pub const SCORES_FILE: &str = "protease_scores.tsv";
pub const SUMMARY_FILE: &str = "protease_scores_summary.tsv";
pub const SAMPLING_FILE: &str = "RandomSampling.tsv";

//───────────────────────────────── helpers ─────────────────────────────────//

fn float_col(name: &str, values: impl Iterator<Item = f64>) -> Series {
    Series::new(PlSmallStr::from(name), values.map(nan_to_none).collect::<Vec<Option<f64>>>())
}

fn count_col(name: &str, values: impl Iterator<Item = Option<usize>>) -> Series {
    Series::new(
        PlSmallStr::from(name),
        values.map(|v| v.map(|c| c as i64)).collect::<Vec<Option<i64>>>(),
    )
}

fn text_col<'a>(name: &str, values: impl Iterator<Item = &'a str>) -> Series {
    Series::new(PlSmallStr::from(name), values.collect::<Vec<&str>>())
}

fn field(
    stats: &[Option<ProteinStats>],
    get: fn(&ProteinStats) -> f64,
) -> impl Iterator<Item = f64> + '_ {
    stats.iter().map(move |s| s.as_ref().map(get).unwrap_or(f64::NAN))
}

/// The statistic columns of one variant, optionally suffixed.
fn stats_columns(
    variant: &str,
    suffix: &str,
    stats: &[Option<ProteinStats>],
    min_peptides: &[Option<usize>],
    out: &mut Vec<Series>,
) {
    let name = |label: &str| format!("{} ({}){}", label, variant, suffix);

    out.push(count_col(
        &name("Total proteins identified"),
        stats.iter().map(|s| s.map(|s| s.protein_count)),
    ));
    out.push(count_col(
        &name("Total number of peptides identified"),
        stats.iter().map(|s| s.map(|s| s.peptide_count)),
    ));
    out.push(float_col(
        &name("Mean number of peptides per protein identified"),
        field(stats, |s| s.mean_peptides),
    ));
    out.push(float_col(
        &name("Median number of peptides per protein identified"),
        field(stats, |s| s.median_peptides),
    ));
    out.push(float_col(&name("Mean protein coverage"), field(stats, |s| s.mean_coverage)));
    out.push(float_col(&name("Median protein coverage"), field(stats, |s| s.median_coverage)));
    if variant == "unfiltered" {
        out.push(count_col(
            &format!("Min peptides per protein for filtering{}", suffix),
            min_peptides.iter().copied(),
        ));
    }
}

// ───────── public API ─────────

/// Per-trial score table. Baseline statistics carry the baseline name as
/// suffix; undefined values become nulls (written as `NA`).
pub fn scores_frame(
    records: &[ScoreRecord],
    weights: &ScoreWeights,
    baseline_name: &str,
) -> PolarsResult<DataFrame> {
    let mut cols: Vec<Series> = vec![
        text_col("Protease combination", records.iter().map(|r| r.result.combination.as_str())),
        text_col("Protein group", records.iter().map(|r| r.result.group.as_str())),
        Series::new(
            PlSmallStr::from("Random sampling"),
            records.iter().map(|r| trial_label(r.result.trial)).collect::<Vec<String>>(),
        ),
        float_col("Protease score (unfiltered)", records.iter().map(|r| r.unfiltered.score)),
        float_col("Protease score (filtered)", records.iter().map(|r| r.filtered.score)),
    ];

    let own_unf: Vec<Option<ProteinStats>> =
        records.iter().map(|r| Some(r.result.unfiltered)).collect();
    let own_fil: Vec<Option<ProteinStats>> =
        records.iter().map(|r| Some(r.result.filtered)).collect();
    let own_min: Vec<Option<usize>> =
        records.iter().map(|r| Some(r.result.min_peptides_per_protein)).collect();
    stats_columns("unfiltered", "", &own_unf, &own_min, &mut cols);
    stats_columns("filtered", "", &own_fil, &own_min, &mut cols);

    let suffix = format!(" {}", baseline_name);
    let base_unf: Vec<Option<ProteinStats>> =
        records.iter().map(|r| r.baseline.as_ref().map(|b| b.unfiltered)).collect();
    let base_fil: Vec<Option<ProteinStats>> =
        records.iter().map(|r| r.baseline.as_ref().map(|b| b.filtered)).collect();
    let base_min: Vec<Option<usize>> =
        records.iter().map(|r| r.baseline.as_ref().map(|b| b.min_peptides_per_protein)).collect();
    stats_columns("unfiltered", &suffix, &base_unf, &base_min, &mut cols);
    stats_columns("filtered", &suffix, &base_fil, &base_min, &mut cols);

    let n = records.len();
    for variant in ["unfiltered", "filtered"] {
        let pick = |r: &ScoreRecord| {
            if variant == "unfiltered" {
                r.unfiltered
            } else {
                r.filtered
            }
        };
        cols.push(float_col(
            &format!("Protein ID ratio ({})", variant),
            records.iter().map(|r| pick(r).protein_ratio),
        ));
        cols.push(float_col(
            &format!("Peptide ID ratio ({})", variant),
            records.iter().map(|r| pick(r).peptide_ratio),
        ));
        cols.push(float_col(
            &format!("Protein coverage ratio ({})", variant),
            records.iter().map(|r| pick(r).coverage_ratio),
        ));
    }
    cols.push(float_col("Protein ID weight", std::iter::repeat(weights.protein_ids()).take(n)));
    cols.push(float_col("Peptide ID weight", std::iter::repeat(weights.peptide_ids()).take(n)));
    cols.push(float_col("Protein coverage weight", std::iter::repeat(weights.coverage()).take(n)));

    DataFrame::new(cols.into_iter().map(Column::from).collect())
}

fn summary_columns(variant: &str, values: &[ScoreSummary], out: &mut Vec<Series>) {
    out.push(float_col(&format!("Mean_score_{}", variant), values.iter().map(|s| s.mean)));
    out.push(float_col(&format!("SD_score_{}", variant), values.iter().map(|s| s.std_dev)));
    out.push(count_col(&format!("Count_score_{}", variant), values.iter().map(|s| Some(s.count))));
    out.push(float_col(&format!("Median_score_{}", variant), values.iter().map(|s| s.median)));
    out.push(float_col(&format!("MAD_score_{}", variant), values.iter().map(|s| s.mad)));
}

pub fn summary_frame(records: &[SummaryRecord]) -> PolarsResult<DataFrame> {
    let mut cols = vec![
        text_col("Protease combination", records.iter().map(|r| r.combination.as_str())),
        text_col("Protein group", records.iter().map(|r| r.group.as_str())),
    ];
    let unfiltered: Vec<ScoreSummary> = records.iter().map(|r| r.unfiltered).collect();
    let filtered: Vec<ScoreSummary> = records.iter().map(|r| r.filtered).collect();
    summary_columns("unfiltered", &unfiltered, &mut cols);
    summary_columns("filtered", &filtered, &mut cols);
    DataFrame::new(cols.into_iter().map(Column::from).collect())
}

/// Writes both result tables into `dir`; returns the written paths.
pub fn write_results(
    dir: &Path,
    scores: &[ScoreRecord],
    summary: &[SummaryRecord],
    weights: &ScoreWeights,
    baseline_name: &str,
) -> PolarsResult<(PathBuf, PathBuf)> {
    let scores_path = dir.join(SCORES_FILE);
    let summary_path = dir.join(SUMMARY_FILE);
    write_tsv(&mut scores_frame(scores, weights, baseline_name)?, &scores_path)?;
    write_tsv(&mut summary_frame(summary)?, &summary_path)?;
    info!("Saved results to {} and {}", scores_path.display(), summary_path.display());
    Ok((scores_path, summary_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ResultRecord, ScoreVariant};

    fn stats(proteins: usize) -> ProteinStats {
        ProteinStats {
            protein_count: proteins,
            peptide_count: proteins * 2,
            mean_peptides: 2.0,
            median_peptides: 2.0,
            mean_coverage: 0.4,
            median_coverage: 0.4,
        }
    }

    fn record(combination: &str, baseline: bool, score: f64) -> ScoreRecord {
        let result = |c: &str| ResultRecord {
            combination: c.into(),
            group: "small_proteins".into(),
            trial: 0,
            min_peptides_per_protein: 2,
            unfiltered: stats(4),
            filtered: stats(2),
        };
        ScoreRecord {
            result: result(combination),
            baseline: baseline.then(|| result("trypsin")),
            unfiltered: ScoreVariant {
                protein_ratio: 1.0,
                peptide_ratio: 1.0,
                coverage_ratio: 1.0,
                score,
            },
            filtered: ScoreVariant::undefined(),
        }
    }

    #[test]
    fn score_table_layout() {
        let records = vec![record("lys-c", true, 1.0), record("glu-c", false, f64::NAN)];
        let df = scores_frame(&records, &ScoreWeights::default(), "trypsin").unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(df.width(), 5 + 13 + 13 + 6 + 3);
        let base = df.column("Total proteins identified (unfiltered) trypsin").unwrap();
        assert_eq!(base.null_count(), 1);
        assert_eq!(df.column("Protease score (unfiltered)").unwrap().null_count(), 1);
        assert_eq!(df.column("Protease score (filtered)").unwrap().null_count(), 2);
        assert_eq!(
            df.column("Random sampling").unwrap().str().unwrap().get(0),
            Some("sampling_1")
        );
    }

    #[test]
    fn written_files_mark_missing_values() {
        let dir = tempfile::tempdir().unwrap();
        let records = vec![record("glu-c", false, f64::NAN)];
        let summary = crate::analysis::summary::summarise(&records);
        let (scores, summary_path) = write_results(
            dir.path(),
            &records,
            &summary,
            &ScoreWeights::default(),
            "trypsin",
        )
        .unwrap();
        let text = std::fs::read_to_string(scores).unwrap();
        assert!(text.lines().nth(1).unwrap().contains("NA"));
        let text = std::fs::read_to_string(summary_path).unwrap();
        assert!(text.starts_with("Protease combination\tProtein group\tMean_score_unfiltered"));
    }
}
