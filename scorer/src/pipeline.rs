use std::collections::HashMap;
use std::fs::create_dir_all;

use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use tracing::{debug, info};

use crate::analysis::aggregation::aggregate_unit;
use crate::analysis::combinations::enumerate_combinations;
use crate::analysis::scoring::score_results;
use crate::analysis::summary::summarise;
use crate::config::ScoringConfig;
use crate::data_handling::detectability::{raw_predictions, DetectabilityTable};
use crate::data_handling::peptide_table::{peptide_rows, resolve_protein_groups, PeptideTable};
use crate::data_handling::protein_weights::{protein_weights, ProteinWeightTable};
use crate::data_handling::proteome::{reference_proteome, ProteomeTable};
use crate::errors::{data_err, ScoringResult};
use crate::helper_functions::{read_tsv, worker_count, write_tsv};
use crate::models::{Combination, PeptideRow, ResultRecord, ScoreRecord, SummaryRecord, TableSource};
use crate::output::{write_results, SAMPLING_FILE};
use crate::protein::ReferenceProteome;
use crate::sampling::planner::{available_counts, plan_strata};
use crate::sampling::sampler::sample_trials;
use crate::sampling::weighting::{apply_detectability, apply_protein_weights};
use crate::sampling::{outcome_from_table, sampling_table, SamplingOutcome};

pub struct PipelineOutput {
    pub results: Vec<ResultRecord>,
    pub scores: Vec<ScoreRecord>,
    pub summary: Vec<SummaryRecord>,
}

/// Weights, plans and samples the peptide rows, then prunes rows that no
/// trial selected.
pub fn draw_samples(
    config: &ScoringConfig,
    proteome: &ReferenceProteome,
    rows: Vec<PeptideRow>,
    predictions: Option<&HashMap<String, f64>>,
    weights: Option<&HashMap<String, Vec<f64>>>,
) -> ScoringResult<SamplingOutcome> {
    let mut rows = resolve_protein_groups(
        rows,
        proteome,
        config.aggregation_mode,
        config.max_unresolved_fraction,
    )?;
    if let Some(weights) = weights {
        apply_protein_weights(&mut rows, weights, config.trials);
    }
    apply_detectability(&mut rows, predictions, &config.detectability)?;

    let strata = plan_strata(&config.proteases, config.sampling_basis, &available_counts(&rows))?;
    for s in &strata {
        debug!(
            "{:<25} freq = {:>6.4}  available = {:>8}  target = {:>8}",
            s.key.to_string(),
            s.frequency,
            s.available_count,
            s.target_size
        );
    }

    let selections = sample_trials(&rows, &strata, config.trials, config.seed)?;
    Ok(SamplingOutcome { rows, selections }.prune())
}

/// Aggregates every (combination, group) unit on a bounded worker pool, then
/// scores and summarises.
pub fn analyse(
    config: &ScoringConfig,
    proteome: &ReferenceProteome,
    outcome: &SamplingOutcome,
) -> ScoringResult<PipelineOutput> {
    let combinations = enumerate_combinations(&config.enzyme_names(), config.max_combination_size)?;
    let groups = proteome.groups();
    let units: Vec<(usize, &Combination, &String)> = combinations
        .iter()
        .enumerate()
        .flat_map(|(i, c)| groups.iter().map(move |g| (i, c, g)))
        .collect();
    let total = units.len();

    let workers = worker_count();
    info!("Analysing {} units on {} workers", total, workers);
    let pool = ThreadPoolBuilder::new().num_threads(workers).build()?;

    let per_unit: Vec<Vec<ResultRecord>> = pool.install(|| {
        units
            .par_iter()
            .enumerate()
            .map(|(n, (_, combination, group))| {
                info!(
                    "Started analysing protease combination {} of {} ({} / {})",
                    n + 1,
                    total,
                    combination,
                    group
                );
                aggregate_unit(combination, group, outcome, proteome, config.aggregation_mode)
            })
            .collect::<ScoringResult<Vec<_>>>()
    })?;

    // completion order is arbitrary; restore group, combination, trial order
    let mut ordered: Vec<(usize, ResultRecord)> = units
        .iter()
        .zip(per_unit)
        .flat_map(|((i, _, _), records)| records.into_iter().map(move |r| (*i, r)))
        .collect();
    ordered.sort_by(|(ia, a), (ib, b)| {
        a.group.cmp(&b.group).then(ia.cmp(ib)).then(a.trial.cmp(&b.trial))
    });
    let results: Vec<ResultRecord> = ordered.into_iter().map(|(_, r)| r).collect();

    let scores = score_results(&results, &config.baseline_protease, &config.score_weights);
    let summary = summarise(&scores);
    Ok(PipelineOutput {
        results,
        scores,
        summary,
    })
}

/// Full run: read inputs, sample (or reuse a sampling table), analyse, write.
pub fn run(config: &ScoringConfig) -> ScoringResult<PipelineOutput> {
    config.validate()?;
    create_dir_all(&config.output_directory)?;

    let proteome_df = ProteomeTable { path: config.proteome_table.clone() }.load()?;
    let proteome = reference_proteome(&proteome_df, &config.length_bins)?;
    if proteome.is_empty() {
        return Err(data_err("Reference proteome is empty"));
    }
    info!("Reference proteome holds {} proteins", proteome.len());

    let outcome = match &config.existing_sampling_table {
        Some(path) => {
            info!("Reusing sampling table {}", path.display());
            outcome_from_table(&read_tsv(path)?, config.trials)?.prune()
        }
        None => {
            let peptide_df = PeptideTable { path: config.peptide_table.clone() }.load()?;
            let parsed = peptide_rows(&peptide_df)?;

            let weights = match &config.protein_weight_table {
                Some(path) => {
                    let df = ProteinWeightTable { path: path.clone() }.load()?;
                    Some(protein_weights(&df, config.trials)?)
                }
                None => None,
            };
            let predictions = match (&config.detectability_table, config.detectability.enabled) {
                (Some(path), true) => {
                    let df = DetectabilityTable { path: path.clone() }.load()?;
                    Some(raw_predictions(&df)?)
                }
                _ => parsed.embedded_predictions,
            };

            let outcome = draw_samples(
                config,
                &proteome,
                parsed.rows,
                predictions.as_ref(),
                weights.as_ref(),
            )?;
            if config.write_sampling_table {
                write_tsv(
                    &mut sampling_table(&outcome)?,
                    config.output_directory.join(SAMPLING_FILE),
                )?;
            }
            outcome
        }
    };

    let output = analyse(config, &proteome, &outcome)?;
    write_results(
        &config.output_directory,
        &output.scores,
        &output.summary,
        &config.score_weights,
        &config.baseline_protease,
    )?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        AggregationMode, DetectabilitySettings, FrequencyVector, ProteaseSettings, SamplingBasis,
        ScoreWeights,
    };
    use crate::protein::ReferenceProtein;
    use std::path::PathBuf;

    fn protease(name: &str, target: f64) -> ProteaseSettings {
        ProteaseSettings {
            name: name.into(),
            max_missed_cleavages: 0,
            missed_cleavage_frequencies: FrequencyVector::Values(vec![1.0]),
            sampling_target: target,
        }
    }

    fn config(
        proteases: Vec<ProteaseSettings>,
        basis: SamplingBasis,
        trials: usize,
    ) -> ScoringConfig {
        ScoringConfig {
            peptide_table: PathBuf::from("peptides.tsv"),
            proteome_table: PathBuf::from("proteome.tsv"),
            protein_weight_table: None,
            detectability_table: None,
            output_directory: PathBuf::from("results"),
            proteases,
            sampling_basis: basis,
            trials,
            max_combination_size: 2,
            score_weights: ScoreWeights::default(),
            detectability: DetectabilitySettings::default(),
            aggregation_mode: AggregationMode::UniqueProteins,
            baseline_protease: "trypsin".into(),
            seed: Some(5),
            length_bins: vec![0, 50, 100, 99999],
            max_unresolved_fraction: 0.5,
            write_sampling_table: false,
            existing_sampling_table: None,
        }
    }

    fn proteome() -> ReferenceProteome {
        ReferenceProteome::new(
            [("P1", 10), ("P2", 20), ("P3", 30)]
                .into_iter()
                .map(|(id, len)| ReferenceProtein {
                    identifier: id.into(),
                    sequence_length: len,
                    group: "small_proteins".into(),
                })
                .collect(),
        )
        .unwrap()
    }

    fn row(peptide: &str, protein: &str, location: usize, enzyme: &str) -> PeptideRow {
        PeptideRow {
            peptide: peptide.into(),
            protein: protein.into(),
            location,
            enzyme: enzyme.into(),
            missed_cleavages: 0,
            detectability_weight: 1.0,
            protein_length_group: String::new(),
            protein_weights: Vec::new(),
        }
    }

    /// Trypsin tiles all three proteins, lys-c covers half of P1.
    fn digest() -> Vec<PeptideRow> {
        vec![
            row("AAAAAAAAAA", "P1", 1, "trypsin"),
            row("BBBBBBBBBB", "P2", 1, "trypsin"),
            row("CCCCCCCCCC", "P2", 11, "trypsin"),
            row("DDDDDDDDDDDDDDD", "P3", 1, "trypsin"),
            row("EEEEEEEEEEEEEEE", "P3", 16, "trypsin"),
            row("AAAAA", "P1", 1, "lys-c"),
        ]
    }

    #[test]
    fn trypsin_lysc_scenario() {
        let cfg = config(
            vec![protease("trypsin", 1.0), protease("lys-c", 1.0)],
            SamplingBasis::Coverage,
            1,
        );
        let p = proteome();
        let outcome = draw_samples(&cfg, &p, digest(), None, None).unwrap();
        assert_eq!(outcome.rows.len(), 6);

        let out = analyse(&cfg, &p, &outcome).unwrap();
        let combos: Vec<&str> = out.results.iter().map(|r| r.combination.as_str()).collect();
        assert_eq!(combos, vec!["trypsin", "lys-c", "trypsin - lys-c"]);

        let trypsin = &out.results[0];
        assert_eq!(trypsin.unfiltered.protein_count, 3);
        assert_eq!(trypsin.unfiltered.mean_coverage, 1.0);

        // trypsin is the baseline and gets no score of its own
        assert_eq!(out.scores.len(), 2);
        let lysc = &out.scores[0];
        assert_eq!(lysc.result.combination, "lys-c");
        assert!((lysc.unfiltered.protein_ratio - 1.0 / 3.0).abs() < 1e-12);
        assert!(lysc.unfiltered.protein_ratio < 1.0);
        // lys-c never reaches two peptides per protein
        assert!(lysc.filtered.score.is_nan());

        let both = &out.scores[1];
        assert_eq!(both.unfiltered.protein_ratio, 1.0);
        assert_eq!(both.unfiltered.coverage_ratio, 1.0);
        assert!(both.unfiltered.peptide_ratio > 1.0);

        assert_eq!(out.summary.len(), 2);
        assert_eq!(out.summary[0].combination, "trypsin - lys-c");
    }

    #[test]
    fn oversized_target_is_clamped_not_fatal() {
        let rows: Vec<PeptideRow> = (0..50)
            .map(|i| row(&format!("K{}", i), "P3", 1, "trypsin"))
            .collect();
        let cfg = config(vec![protease("trypsin", 100.0)], SamplingBasis::Number, 2);
        let outcome = draw_samples(&cfg, &proteome(), rows, None, None).unwrap();
        for trial in 0..2 {
            assert_eq!(outcome.selected(trial).count(), 50);
        }
    }

    #[test]
    fn detectability_of_one_matches_disabled() {
        let rows: Vec<PeptideRow> = (0..40)
            .map(|i| row(&format!("K{}", i), "P3", 1, "trypsin"))
            .collect();
        let mut cfg = config(vec![protease("trypsin", 10.0)], SamplingBasis::Number, 20);
        let disabled = draw_samples(&cfg, &proteome(), rows.clone(), None, None).unwrap();

        // raw output is the probability of not being detected
        let predictions: HashMap<String, f64> =
            rows.iter().map(|r| (r.peptide.clone(), 0.0)).collect();
        cfg.detectability = DetectabilitySettings {
            enabled: true,
            weight: 1.0,
        };
        let enabled = draw_samples(&cfg, &proteome(), rows, Some(&predictions), None).unwrap();

        assert_eq!(disabled.selections, enabled.selections);
    }

    #[test]
    fn full_run_writes_tables() {
        let dir = tempfile::tempdir().unwrap();
        let peptides = dir.path().join("peptides.tsv");
        let proteome = dir.path().join("proteome.tsv");
        let mut peptide_text = String::from("peptide\tprotein\tlocation\tEnzyme\tMC\n");
        for r in digest() {
            peptide_text.push_str(&format!(
                "{}\t{}\t{}\t{}\t0\n",
                r.peptide, r.protein, r.location, r.enzyme
            ));
        }
        std::fs::write(&peptides, peptide_text).unwrap();
        let proteome_text = "Identifier\tSequence_Len[aa]\nP1\t10\nP2\t20\nP3\t30\n";
        std::fs::write(&proteome, proteome_text).unwrap();

        let mut cfg = config(
            vec![protease("trypsin", 1.0), protease("lys-c", 1.0)],
            SamplingBasis::Coverage,
            3,
        );
        cfg.peptide_table = peptides;
        cfg.proteome_table = proteome;
        cfg.output_directory = dir.path().join("out");
        cfg.write_sampling_table = true;

        let out = run(&cfg).unwrap();
        assert_eq!(out.results.len(), 9);
        assert!(cfg.output_directory.join(crate::output::SCORES_FILE).exists());
        assert!(cfg.output_directory.join(crate::output::SUMMARY_FILE).exists());
        let sampling = cfg.output_directory.join(SAMPLING_FILE);
        assert!(sampling.exists());

        // a second run can start from the written sampling table
        cfg.existing_sampling_table = Some(sampling);
        let again = run(&cfg).unwrap();
        assert_eq!(format!("{:?}", again.results), format!("{:?}", out.results));
    }
}
