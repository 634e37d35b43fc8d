use tracing::info;

use crate::errors::{config_err, ScoringResult};
use crate::models::Combination;

/// All subsets of `enzymes` with 1 to `max_size` members, ordered by size and
/// then by member position. Members keep their input order.
pub fn enumerate_combinations(
    enzymes: &[String],
    max_size: usize,
) -> ScoringResult<Vec<Combination>> {
    if max_size == 0 {
        return Err(config_err("Maximum combination size must be at least 1"));
    }
    let max_size = max_size.min(enzymes.len());

    let mut out = Vec::new();
    for size in 1..=max_size {
        let mut idx: Vec<usize> = (0..size).collect();
        loop {
            out.push(Combination(idx.iter().map(|&i| enzymes[i].clone()).collect()));

            // advance to the next index tuple in lexicographic order
            let n = enzymes.len();
            let Some(pos) = (0..size).rev().find(|&p| idx[p] != p + n - size) else {
                break;
            };
            idx[pos] += 1;
            for p in pos + 1..size {
                idx[p] = idx[p - 1] + 1;
            }
        }
    }
    info!("{} protease combinations of up to {} enzymes", out.len(), max_size);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn labels(c: &[Combination]) -> Vec<String> {
        c.iter().map(|c| c.label()).collect()
    }

    #[test]
    fn two_enzymes() {
        let c = enumerate_combinations(&names(&["trypsin", "lys-c"]), 2).unwrap();
        assert_eq!(labels(&c), vec!["trypsin", "lys-c", "trypsin - lys-c"]);
    }

    #[test]
    fn order_follows_input() {
        let c = enumerate_combinations(&names(&["c", "a", "b"]), 3).unwrap();
        assert_eq!(
            labels(&c),
            vec!["c", "a", "b", "c - a", "c - b", "a - b", "c - a - b"]
        );
    }

    #[test]
    fn size_clamped_and_zero_rejected() {
        let five = names(&["trypsin", "lysarginase", "glu-c", "chymotrypsin", "lys-c"]);
        assert_eq!(enumerate_combinations(&five, 9).unwrap().len(), 31);
        assert_eq!(enumerate_combinations(&five, 2).unwrap().len(), 15);
        assert!(enumerate_combinations(&five, 0).is_err());
    }
}
