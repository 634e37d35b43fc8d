use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::config::AggregationMode;
use crate::errors::ScoringResult;
use crate::models::{Combination, ProteinStats, ResultRecord, MIN_PEPTIDES_PER_PROTEIN};
use crate::protein::{Protein, ReferenceProteome};
use crate::sampling::SamplingOutcome;
use crate::stats;

/// Peptide count and coverage of one counted unit (protein or protein group).
#[derive(Debug, Clone, Copy, PartialEq)]
struct Evidence {
    peptides: usize,
    coverage: f64,
}

/// Proteins of `group` filled with the peptides selected in `trial` by any
/// enzyme of `combination`.
fn reconstruct(
    combination: &Combination,
    group: &str,
    trial: usize,
    outcome: &SamplingOutcome,
    proteome: &ReferenceProteome,
    mode: AggregationMode,
) -> ScoringResult<Vec<Protein>> {
    let mut proteins = proteome.fresh_group(group);
    let index: HashMap<String, usize> = proteins
        .iter()
        .enumerate()
        .map(|(i, p)| (p.identifier.clone(), i))
        .collect();

    for row in outcome.selected(trial).filter(|r| combination.contains(&r.enzyme)) {
        match mode {
            AggregationMode::UniqueProteins => {
                if let Some(&i) = index.get(&row.protein) {
                    proteins[i].add_peptide(&row.peptide, row.location)?;
                }
            }
            AggregationMode::ProteinGroups => {
                for acc in row.accessions() {
                    if let Some(&i) = index.get(acc) {
                        proteins[i].add_peptide(&row.peptide, row.location)?;
                    }
                }
            }
        }
    }
    Ok(proteins)
}

fn protein_evidence(proteins: &mut [Protein]) -> Vec<Evidence> {
    proteins
        .iter_mut()
        .filter(|p| p.peptide_count() > 0)
        .map(|p| Evidence {
            peptides: p.peptide_count(),
            coverage: p.coverage(),
        })
        .collect()
}

/// Collapses proteins with identical peptide sets into one group. A group
/// counts its distinct peptides; its coverage is the median member coverage.
fn group_evidence(proteins: &mut [Protein]) -> Vec<Evidence> {
    let mut groups: BTreeMap<BTreeSet<String>, Vec<f64>> = BTreeMap::new();
    for p in proteins.iter_mut().filter(|p| p.peptide_count() > 0) {
        let peptides: BTreeSet<String> = p.peptides().iter().map(|a| a.sequence.clone()).collect();
        let coverage = p.coverage();
        groups.entry(peptides).or_default().push(coverage);
    }
    groups
        .into_iter()
        .map(|(peptides, coverages)| Evidence {
            peptides: peptides.len(),
            coverage: stats::median(&coverages),
        })
        .collect()
}

fn summarise(evidence: &[Evidence], min_peptides: usize) -> ProteinStats {
    let kept: Vec<&Evidence> = evidence.iter().filter(|e| e.peptides >= min_peptides).collect();
    let counts: Vec<usize> = kept.iter().map(|e| e.peptides).collect();
    let peptides = stats::counts_as_f64(&counts);
    let coverages: Vec<f64> = kept.iter().map(|e| e.coverage).collect();
    ProteinStats {
        protein_count: kept.len(),
        peptide_count: counts.iter().sum(),
        mean_peptides: stats::mean(&peptides),
        median_peptides: stats::median(&peptides),
        mean_coverage: stats::mean(&coverages),
        median_coverage: stats::median(&coverages),
    }
}

/// Statistics of one (combination, group, trial). Pure: repeated calls with
/// the same inputs give identical records.
pub fn aggregate_trial(
    combination: &Combination,
    group: &str,
    trial: usize,
    outcome: &SamplingOutcome,
    proteome: &ReferenceProteome,
    mode: AggregationMode,
) -> ScoringResult<ResultRecord> {
    let mut proteins = reconstruct(combination, group, trial, outcome, proteome, mode)?;
    let evidence = match mode {
        AggregationMode::UniqueProteins => protein_evidence(&mut proteins),
        AggregationMode::ProteinGroups => group_evidence(&mut proteins),
    };
    Ok(ResultRecord {
        combination: combination.label(),
        group: group.to_string(),
        trial,
        min_peptides_per_protein: MIN_PEPTIDES_PER_PROTEIN,
        unfiltered: summarise(&evidence, 1),
        filtered: summarise(&evidence, MIN_PEPTIDES_PER_PROTEIN),
    })
}

/// All trials of one (combination, group) unit, sequentially.
pub fn aggregate_unit(
    combination: &Combination,
    group: &str,
    outcome: &SamplingOutcome,
    proteome: &ReferenceProteome,
    mode: AggregationMode,
) -> ScoringResult<Vec<ResultRecord>> {
    (0..outcome.trials())
        .map(|trial| aggregate_trial(combination, group, trial, outcome, proteome, mode))
        .collect()
}
