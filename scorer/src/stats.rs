//! NaN-aware descriptive statistics on top of `statrs`.
//!
//! Empty inputs give NaN rather than 0 so that "nothing identified" stays
//! distinguishable from a legitimate zero downstream.

use statrs::statistics::{Data, Median, Statistics};

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().mean()
}

pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    Data::new(values.to_vec()).median()
}

/// Sample standard deviation (n - 1 denominator); NaN below two values.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    values.iter().std_dev()
}

/// `median(|x - median(x)|)`, unscaled.
pub fn median_abs_deviation(values: &[f64]) -> f64 {
    let centre = median(values);
    if centre.is_nan() {
        return f64::NAN;
    }
    let deviations: Vec<f64> = values.iter().map(|v| (v - centre).abs()).collect();
    median(&deviations)
}

pub fn counts_as_f64(counts: &[usize]) -> Vec<f64> {
    counts.iter().map(|&c| c as f64).collect()
}

/// Drops NaN and infinite values.
pub fn finite_only(values: &[f64]) -> Vec<f64> {
    values.iter().copied().filter(|v| v.is_finite()).collect()
}
