//! Data-driven weight learning and refinement.
//!
//! Learns metric weights against a target column (usually a conversion
//! metric), refines them with simple search strategies, and always returns a
//! weight map normalized to sum 1. Learned weights are an alternative to the
//! built-in recipes, not a replacement for them.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tracing::warn;

use crate::model::table::CanonicalTable;
use crate::report::pearson;

pub const CTR_SENSITIVITY_BOOST: f64 = 0.1;

/// Quantile bin count for the mutual-information estimator.
const MI_BINS: usize = 4;

#[derive(Debug, Error)]
pub enum WeightError {
    #[error("target column {0} not found in table")]
    MissingTarget(String),
    #[error("no metric columns available for weight learning")]
    NoMetrics,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WeightMethod {
    Equal,
    Correlation,
    MutualInformation,
    FScore,
    Variance,
    Custom(BTreeMap<String, f64>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RefineStrategy {
    Grid { steps: usize },
    Random { iterations: usize, seed: u64 },
    Genetic { population: usize, generations: usize, seed: u64 },
}

/// Learns one weight per metric from the data. Weights come back normalized;
/// a degenerate signal (every raw weight zero) falls back to equal weights.
pub fn learn_weights(
    table: &CanonicalTable,
    metrics: &[String],
    target: &str,
    method: &WeightMethod,
) -> Result<BTreeMap<String, f64>, WeightError> {
    let usable: Vec<&String> = metrics.iter().filter(|m| table.has_column(m)).collect();
    if usable.is_empty() {
        return Err(WeightError::NoMetrics);
    }
    if !matches!(method, WeightMethod::Equal | WeightMethod::Custom(_))
        && !table.has_column(target)
    {
        return Err(WeightError::MissingTarget(target.to_string()));
    }

    let raw: Vec<f64> = match method {
        WeightMethod::Equal => vec![1.0; usable.len()],
        WeightMethod::Correlation => usable
            .iter()
            .map(|m| paired(table, m, target, |x, y| pearson(x, y).abs()))
            .collect(),
        WeightMethod::MutualInformation => usable
            .iter()
            .map(|m| paired(table, m, target, mutual_information))
            .collect(),
        WeightMethod::FScore => usable
            .iter()
            .map(|m| paired(table, m, target, f_score))
            .collect(),
        WeightMethod::Variance => {
            let variances: Vec<f64> = usable
                .iter()
                .map(|m| {
                    let finite: Vec<f64> = table
                        .column(m)
                        .into_iter()
                        .filter(|v| v.is_finite())
                        .collect();
                    variance(&finite)
                })
                .collect();
            minmax_scale(&variances)
        }
        WeightMethod::Custom(custom) => usable
            .iter()
            .map(|m| custom.get(m.as_str()).copied().unwrap_or(0.0).max(0.0))
            .collect(),
    };

    let mut weights: BTreeMap<String, f64> = usable
        .iter()
        .zip(&raw)
        .map(|(m, w)| ((*m).clone(), if w.is_finite() { w.max(0.0) } else { 0.0 }))
        .collect();
    if !normalize(&mut weights) {
        warn!("learned weights degenerate, falling back to equal weighting");
        let equal = 1.0 / usable.len() as f64;
        for w in weights.values_mut() {
            *w = equal;
        }
    }
    Ok(weights)
}

/// Searches near the learned weights for a vector whose weighted score
/// correlates best with the target. Never returns something worse than the
/// starting point.
pub fn refine_weights(
    table: &CanonicalTable,
    target: &str,
    initial: &BTreeMap<String, f64>,
    strategy: RefineStrategy,
) -> Result<BTreeMap<String, f64>, WeightError> {
    let metrics: Vec<String> = initial.keys().cloned().collect();
    if metrics.is_empty() {
        return Err(WeightError::NoMetrics);
    }
    if !table.has_column(target) {
        return Err(WeightError::MissingTarget(target.to_string()));
    }

    let (matrix, target_values) = build_matrix(table, &metrics, target);
    let start: Vec<f64> = metrics.iter().map(|m| initial[m]).collect();
    let objective = |weights: &[f64]| weighted_score_correlation(&matrix, &target_values, weights);

    let mut best = start.clone();
    let mut best_fit = objective(&start);

    match strategy {
        RefineStrategy::Grid { steps } => {
            let steps = steps.max(1);
            let mut candidate = vec![0usize; metrics.len()];
            grid_search(
                &mut candidate,
                0,
                steps,
                &mut |parts| {
                    let weights: Vec<f64> =
                        parts.iter().map(|&p| p as f64 / steps as f64).collect();
                    let fit = objective(&weights);
                    if fit > best_fit {
                        best_fit = fit;
                        best = weights;
                    }
                },
            );
        }
        RefineStrategy::Random { iterations, seed } => {
            let mut rng = StdRng::seed_from_u64(seed);
            for _ in 0..iterations {
                let weights = random_simplex(&mut rng, metrics.len());
                let fit = objective(&weights);
                if fit > best_fit {
                    best_fit = fit;
                    best = weights;
                }
            }
        }
        RefineStrategy::Genetic {
            population,
            generations,
            seed,
        } => {
            let mut rng = StdRng::seed_from_u64(seed);
            let population = population.max(2);
            let mut pool: Vec<Vec<f64>> = vec![start.clone()];
            while pool.len() < population {
                pool.push(random_simplex(&mut rng, metrics.len()));
            }
            for _ in 0..generations {
                let mut ranked: Vec<(f64, Vec<f64>)> =
                    pool.drain(..).map(|w| (objective(&w), w)).collect();
                ranked.sort_by(|a, b| {
                    b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal)
                });
                let survivors = (ranked.len() / 2).max(1);
                let parents: Vec<Vec<f64>> = ranked
                    .into_iter()
                    .take(survivors)
                    .map(|(_, w)| w)
                    .collect();
                let mut next = parents.clone();
                while next.len() < population {
                    let a = &parents[rng.random_range(0..parents.len())];
                    let b = &parents[rng.random_range(0..parents.len())];
                    next.push(crossover(&mut rng, a, b));
                }
                pool = next;
            }
            for candidate in &pool {
                let fit = objective(candidate);
                if fit > best_fit {
                    best_fit = fit;
                    best = candidate.clone();
                }
            }
        }
    }

    let mut result: BTreeMap<String, f64> = metrics.into_iter().zip(best).collect();
    if !normalize(&mut result) {
        return Ok(initial.clone());
    }
    Ok(result)
}

/// Shifts weight toward CTR for click-focused campaigns; the rest shrink
/// proportionally so the sum stays 1.
pub fn apply_ctr_sensitivity(weights: &mut BTreeMap<String, f64>, boost: f64) {
    if let Some(w) = weights.get_mut("ctr") {
        *w += boost;
        normalize(weights);
    }
}

fn normalize(weights: &mut BTreeMap<String, f64>) -> bool {
    let sum: f64 = weights.values().sum();
    if sum <= 0.0 || !sum.is_finite() {
        return false;
    }
    for w in weights.values_mut() {
        *w /= sum;
    }
    true
}

/// Runs `f` over the rows where both the metric and the target are finite.
fn paired(table: &CanonicalTable, metric: &str, target: &str, f: fn(&[f64], &[f64]) -> f64) -> f64 {
    let xs = table.column(metric);
    let ys = table.column(target);
    let mut px = Vec::with_capacity(xs.len());
    let mut py = Vec::with_capacity(ys.len());
    for (x, y) in xs.iter().zip(&ys) {
        if x.is_finite() && y.is_finite() {
            px.push(*x);
            py.push(*y);
        }
    }
    f(&px, &py)
}

fn variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = values.iter().sum::<f64>() / values.len() as f64;
    values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64
}

fn minmax_scale(values: &[f64]) -> Vec<f64> {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = max - min;
    if !span.is_finite() || span == 0.0 {
        return vec![1.0; values.len()];
    }
    values.iter().map(|v| (v - min) / span).collect()
}

/// ANOVA-style score from the squared correlation; unbounded as r approaches
/// 1, so the denominator is floored.
fn f_score(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len();
    if n < 3 {
        return 0.0;
    }
    let r = pearson(x, y);
    let r2 = r * r;
    r2 / (1.0 - r2).max(1e-12) * (n as f64 - 2.0)
}

/// Discrete mutual information over quantile bins.
fn mutual_information(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len();
    if n < MI_BINS {
        return 0.0;
    }
    let bx = quantile_bins(x);
    let by = quantile_bins(y);

    let mut joint = [[0usize; MI_BINS]; MI_BINS];
    let mut mx = [0usize; MI_BINS];
    let mut my = [0usize; MI_BINS];
    for (a, b) in bx.iter().zip(&by) {
        joint[*a][*b] += 1;
        mx[*a] += 1;
        my[*b] += 1;
    }

    let total = n as f64;
    let mut mi = 0.0;
    for (a, row) in joint.iter().enumerate() {
        for (b, &count) in row.iter().enumerate() {
            if count == 0 {
                continue;
            }
            let pxy = count as f64 / total;
            let px = mx[a] as f64 / total;
            let py = my[b] as f64 / total;
            mi += pxy * (pxy / (px * py)).ln();
        }
    }
    mi.max(0.0)
}

fn quantile_bins(values: &[f64]) -> Vec<usize> {
    let mut sorted: Vec<f64> = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let cuts: Vec<f64> = (1..MI_BINS)
        .map(|i| crate::report::quantile_sorted(&sorted, i as f64 / MI_BINS as f64))
        .collect();
    values
        .iter()
        .map(|v| cuts.iter().filter(|c| v > c).count())
        .collect()
}

/// Rows-by-metrics matrix, each metric min-max scaled to [0,1], restricted to
/// rows with a finite target.
fn build_matrix(
    table: &CanonicalTable,
    metrics: &[String],
    target: &str,
) -> (Vec<Vec<f64>>, Vec<f64>) {
    let target_column = table.column(target);
    let keep: Vec<usize> = target_column
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_finite())
        .map(|(row, _)| row)
        .collect();

    let mut matrix: Vec<Vec<f64>> = vec![vec![0.0; metrics.len()]; keep.len()];
    for (m_idx, metric) in metrics.iter().enumerate() {
        let column = table.column(metric);
        let selected: Vec<f64> = keep
            .iter()
            .map(|&row| if column[row].is_finite() { column[row] } else { 0.0 })
            .collect();
        let scaled = minmax_scale(&selected);
        for (out_row, value) in scaled.iter().enumerate() {
            matrix[out_row][m_idx] = *value;
        }
    }
    let target_values: Vec<f64> = keep.iter().map(|&row| target_column[row]).collect();
    (matrix, target_values)
}

fn weighted_score_correlation(matrix: &[Vec<f64>], target: &[f64], weights: &[f64]) -> f64 {
    if matrix.is_empty() {
        return f64::NEG_INFINITY;
    }
    let sum: f64 = weights.iter().sum();
    if sum <= 0.0 {
        return f64::NEG_INFINITY;
    }
    let scores: Vec<f64> = matrix
        .iter()
        .map(|row| row.iter().zip(weights).map(|(v, w)| v * w).sum::<f64>() / sum)
        .collect();
    let r = pearson(&scores, target);
    if r.is_finite() { r } else { f64::NEG_INFINITY }
}

/// Enumerates every composition of `steps` into the weight slots.
fn grid_search(
    candidate: &mut Vec<usize>,
    index: usize,
    remaining: usize,
    visit: &mut dyn FnMut(&[usize]),
) {
    if index == candidate.len() - 1 {
        candidate[index] = remaining;
        visit(candidate);
        return;
    }
    for part in 0..=remaining {
        candidate[index] = part;
        grid_search(candidate, index + 1, remaining - part, visit);
    }
}

fn random_simplex(rng: &mut StdRng, len: usize) -> Vec<f64> {
    loop {
        let raw: Vec<f64> = (0..len).map(|_| rng.random::<f64>()).collect();
        let sum: f64 = raw.iter().sum();
        if sum > 0.0 {
            return raw.into_iter().map(|v| v / sum).collect();
        }
    }
}

fn crossover(rng: &mut StdRng, a: &[f64], b: &[f64]) -> Vec<f64> {
    let mut child: Vec<f64> = a
        .iter()
        .zip(b)
        .map(|(x, y)| {
            let blend = (x + y) / 2.0;
            let jitter = rng.random_range(-0.1..0.1);
            (blend + jitter).max(0.0)
        })
        .collect();
    let sum: f64 = child.iter().sum();
    if sum > 0.0 {
        for v in &mut child {
            *v /= sum;
        }
    } else {
        let equal = 1.0 / child.len() as f64;
        for v in &mut child {
            *v = equal;
        }
    }
    child
}

#[cfg(test)]
#[path = "../tests/src_inline/weights.rs"]
mod tests;
