use std::collections::{BTreeMap, HashMap};

use crate::errors::{data_err, ScoringResult};

pub const UNKNOWN_GROUP: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignedPeptide {
    pub sequence: String,
    /// 1-based start position.
    pub start: usize,
    pub length: usize,
}

/// A protein and the peptides assigned to it during one reconstruction.
#[derive(Debug, Clone)]
pub struct Protein {
    pub identifier: String,
    pub sequence_length: usize,
    peptides: Vec<AssignedPeptide>,
    coverage: Option<f64>,
}

impl Protein {
    pub fn new(identifier: &str, sequence_length: usize) -> Self {
        Self {
            identifier: identifier.to_string(),
            sequence_length,
            peptides: Vec::new(),
            coverage: None,
        }
    }

    /// Appends a peptide starting at the 1-based `location`. A span reaching
    /// past the end of the sequence is a data error.
    pub fn add_peptide(&mut self, sequence: &str, location: usize) -> ScoringResult<()> {
        let length = sequence.len();
        if location == 0 || location - 1 + length > self.sequence_length {
            return Err(data_err(format!(
                "Peptide {} at position {} (length {}) does not fit into protein {} of length {}",
                sequence, location, length, self.identifier, self.sequence_length
            )));
        }
        self.peptides.push(AssignedPeptide {
            sequence: sequence.to_string(),
            start: location,
            length,
        });
        self.coverage = None;
        Ok(())
    }

    pub fn peptides(&self) -> &[AssignedPeptide] {
        &self.peptides
    }

    pub fn peptide_count(&self) -> usize {
        self.peptides.len()
    }

    /// Fraction of residues covered by at least one peptide. Cached until the
    /// next `add_peptide`.
    pub fn coverage(&mut self) -> f64 {
        if let Some(c) = self.coverage {
            return c;
        }
        let c = self.compute_coverage();
        self.coverage = Some(c);
        c
    }

    fn compute_coverage(&self) -> f64 {
        if self.sequence_length == 0 {
            return f64::NAN;
        }
        let mut covered = vec![false; self.sequence_length];
        for pep in &self.peptides {
            let begin = pep.start - 1;
            covered[begin..begin + pep.length].iter_mut().for_each(|c| *c = true);
        }
        covered.iter().filter(|&&c| c).count() as f64 / self.sequence_length as f64
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceProtein {
    pub identifier: String,
    pub sequence_length: usize,
    pub group: String,
}

/// The full reference proteome, indexed by identifier and by length group.
#[derive(Debug, Clone, Default)]
pub struct ReferenceProteome {
    proteins: Vec<ReferenceProtein>,
    by_id: HashMap<String, usize>,
    by_group: BTreeMap<String, Vec<usize>>,
}

impl ReferenceProteome {
    pub fn new(proteins: Vec<ReferenceProtein>) -> ScoringResult<Self> {
        let mut by_id = HashMap::with_capacity(proteins.len());
        let mut by_group: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (idx, p) in proteins.iter().enumerate() {
            if p.sequence_length == 0 {
                return Err(data_err(format!("Protein {} has sequence length 0", p.identifier)));
            }
            if by_id.insert(p.identifier.clone(), idx).is_some() {
                return Err(data_err(format!(
                    "Protein {} appears more than once in the reference proteome",
                    p.identifier
                )));
            }
            by_group.entry(p.group.clone()).or_default().push(idx);
        }
        Ok(Self {
            proteins,
            by_id,
            by_group,
        })
    }

    pub fn len(&self) -> usize {
        self.proteins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proteins.is_empty()
    }

    pub fn get(&self, identifier: &str) -> Option<&ReferenceProtein> {
        self.by_id.get(identifier).map(|&i| &self.proteins[i])
    }

    /// Group labels in ascending order.
    pub fn groups(&self) -> Vec<String> {
        self.by_group.keys().cloned().collect()
    }

    pub fn members(&self, group: &str) -> impl Iterator<Item = &ReferenceProtein> {
        self.by_group
            .get(group)
            .into_iter()
            .flat_map(move |idx| idx.iter().map(move |&i| &self.proteins[i]))
    }

    /// Fresh, empty protein containers for every member of `group`.
    pub fn fresh_group(&self, group: &str) -> Vec<Protein> {
        self.members(group)
            .map(|p| Protein::new(&p.identifier, p.sequence_length))
            .collect()
    }
}

/// Names of the bins spanned by `edges`: two or three bins get size names,
/// anything else is numbered.
pub fn bin_labels(edges: &[u64]) -> Vec<String> {
    match edges.len() {
        3 => vec!["small_proteins".into(), "large_proteins".into()],
        4 => vec!["small_proteins".into(), "medium_proteins".into(), "large_proteins".into()],
        n => (1..n).map(|i| format!("group_{}", i)).collect(),
    }
}

/// Bin of a protein of `length` residues, with bins `(edges[i], edges[i + 1]]`.
pub fn length_group(length: usize, edges: &[u64], labels: &[String]) -> String {
    let length = length as u64;
    edges
        .windows(2)
        .zip(labels)
        .find(|(w, _)| length > w[0] && length <= w[1])
        .map(|(_, label)| label.clone())
        .unwrap_or_else(|| UNKNOWN_GROUP.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_tiling_gives_exact_coverage() {
        let mut p = Protein::new("P1", 10);
        p.add_peptide("ABCD", 1).unwrap();
        p.add_peptide("EFG", 5).unwrap();
        p.add_peptide("HIJ", 8).unwrap();
        assert_eq!(p.coverage(), 1.0);
    }

    #[test]
    fn coverage_cache_invalidated_on_add() {
        let mut p = Protein::new("P1", 10);
        p.add_peptide("ABCDE", 1).unwrap();
        assert_eq!(p.coverage(), 0.5);
        p.add_peptide("CDEFG", 3).unwrap();
        assert_eq!(p.coverage(), 0.7);
        assert_eq!(p.peptide_count(), 2);
    }

    #[test]
    fn span_beyond_sequence_is_error() {
        let mut p = Protein::new("P1", 5);
        assert!(p.add_peptide("ABC", 4).is_err());
        assert!(p.add_peptide("ABC", 0).is_err());
        assert!(p.add_peptide("ABC", 3).is_ok());
    }

    #[test]
    fn bins_follow_upper_inclusive_edges() {
        let edges = [0, 50, 100, 99999];
        let labels = bin_labels(&edges);
        assert_eq!(length_group(50, &edges, &labels), "small_proteins");
        assert_eq!(length_group(51, &edges, &labels), "medium_proteins");
        assert_eq!(length_group(500, &edges, &labels), "large_proteins");
        assert_eq!(length_group(100_000, &edges, &labels), UNKNOWN_GROUP);
        assert_eq!(bin_labels(&[0, 10, 20, 30, 40]).last().unwrap(), "group_4");
    }

    #[test]
    fn proteome_groups_sorted() {
        let proteome = ReferenceProteome::new(vec![
            ReferenceProtein {
                identifier: "B".into(),
                sequence_length: 300,
                group: "large_proteins".into(),
            },
            ReferenceProtein {
                identifier: "A".into(),
                sequence_length: 30,
                group: "small_proteins".into(),
            },
        ])
        .unwrap();
        assert_eq!(proteome.groups(), vec!["large_proteins", "small_proteins"]);
        assert_eq!(proteome.fresh_group("small_proteins")[0].identifier, "A");
        assert!(proteome.get("C").is_none());
    }
}
