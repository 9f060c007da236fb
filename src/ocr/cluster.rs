//! Splits OCR letter heights into top, middle and bottom key rows.
//!
//! Two strategies sit behind [`RowClusterer`]: a 1-D k-means and a 1-D
//! Gaussian mixture fitted by EM. Both start from the same quantile-based
//! centres, so repeated runs on the same input agree exactly.

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

use super::observe::CharacterObservation;
use crate::config::{ClusteringMethod, OcrConfig};
use crate::stats;

/// Row clusters requested from the strategies
pub const ROW_COUNT: usize = 3;

/// Lower bound on a mixture component's variance, in px²
const VARIANCE_FLOOR: f64 = 1.0;

/// Converged once the log-likelihood improves by less than this
const LOG_LIKELIHOOD_EPSILON: f64 = 1e-6;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Row {
    Top,
    Middle,
    Bottom,
}

impl Row {
    pub const ALL: [Row; ROW_COUNT] = [Row::Top, Row::Middle, Row::Bottom];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Output of a clustering strategy: one label per value plus the centres.
#[derive(Clone, Debug, PartialEq)]
pub struct Clustering {
    pub labels: Vec<usize>,
    pub centers: Vec<f64>,
}

pub trait RowClusterer {
    fn name(&self) -> &'static str;

    /// Partitions `values` into `k` groups. Callers guarantee at least `k`
    /// distinct values.
    fn fit(&self, values: &[f64], k: usize) -> Clustering;
}

/// Centres spread over the quantiles at (2i + 1) / 2k of the distinct values,
/// so repeated heights cannot stack two centres on one row.
fn quantile_centers(values: &[f64], k: usize) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted.dedup();
    (0..k)
        .map(|i| stats::percentile(&sorted, 100.0 * (2 * i + 1) as f64 / (2 * k) as f64))
        .collect()
}

/// Index of the closest centre; ties go to the lower index.
fn nearest(value: f64, centers: &[f64]) -> usize {
    centers
        .iter()
        .enumerate()
        .fold((0, f64::INFINITY), |(best, best_dist), (i, &c)| {
            let dist = (value - c).abs();
            if dist < best_dist { (i, dist) } else { (best, best_dist) }
        })
        .0
}

/// Lloyd's algorithm on a line.
pub struct KMeans1d {
    pub max_iterations: usize,
}

impl RowClusterer for KMeans1d {
    fn name(&self) -> &'static str {
        "kmeans"
    }

    fn fit(&self, values: &[f64], k: usize) -> Clustering {
        let mut centers = quantile_centers(values, k);
        let mut labels: Vec<usize> = values.iter().map(|&v| nearest(v, &centers)).collect();

        for _ in 0..self.max_iterations {
            for (cluster, center) in centers.iter_mut().enumerate() {
                let members: Vec<f64> = values
                    .iter()
                    .zip(&labels)
                    .filter(|(_, l)| **l == cluster)
                    .map(|(&v, _)| v)
                    .collect();
                // An emptied cluster keeps its previous centre
                if !members.is_empty() {
                    *center = stats::mean(&members);
                }
            }

            let next: Vec<usize> = values.iter().map(|&v| nearest(v, &centers)).collect();
            if next == labels {
                break;
            }
            labels = next;
        }

        Clustering { labels, centers }
    }
}

/// Gaussian mixture fitted with EM, seeded from k-means.
pub struct GaussianMixture1d {
    pub max_iterations: usize,
}

fn gaussian_density(x: f64, mean: f64, variance: f64) -> f64 {
    let diff = x - mean;
    (-(diff * diff) / (2.0 * variance)).exp() / (2.0 * std::f64::consts::PI * variance).sqrt()
}

impl RowClusterer for GaussianMixture1d {
    fn name(&self) -> &'static str {
        "gaussian_mixture"
    }

    fn fit(&self, values: &[f64], k: usize) -> Clustering {
        let seed = KMeans1d { max_iterations: self.max_iterations }.fit(values, k);
        let n = values.len() as f64;

        let mut means = seed.centers.clone();
        let mut variances: Vec<f64> = (0..k)
            .map(|c| {
                let members: Vec<f64> = values
                    .iter()
                    .zip(&seed.labels)
                    .filter(|(_, l)| **l == c)
                    .map(|(&v, _)| v)
                    .collect();
                stats::std_dev(&members).powi(2).max(VARIANCE_FLOOR)
            })
            .collect();
        let mut weights = vec![1.0 / k as f64; k];
        let mut responsibilities = vec![vec![0.0; k]; values.len()];
        let mut previous_ll = f64::NEG_INFINITY;

        for _ in 0..self.max_iterations {
            // E step
            let mut log_likelihood = 0.0;
            for (i, &x) in values.iter().enumerate() {
                let densities: Vec<f64> = (0..k)
                    .map(|c| weights[c] * gaussian_density(x, means[c], variances[c]))
                    .collect();
                let total: f64 = densities.iter().sum();
                if total > 0.0 {
                    for c in 0..k {
                        responsibilities[i][c] = densities[c] / total;
                    }
                    log_likelihood += total.ln();
                } else {
                    // Far from every component: hand it to the nearest mean
                    let c = nearest(x, &means);
                    responsibilities[i] = vec![0.0; k];
                    responsibilities[i][c] = 1.0;
                }
            }

            // M step
            for c in 0..k {
                let nk: f64 = responsibilities.iter().map(|r| r[c]).sum();
                if nk <= f64::EPSILON {
                    continue;
                }
                let mean = values
                    .iter()
                    .zip(&responsibilities)
                    .map(|(&x, r)| r[c] * x)
                    .sum::<f64>()
                    / nk;
                let variance = values
                    .iter()
                    .zip(&responsibilities)
                    .map(|(&x, r)| r[c] * (x - mean).powi(2))
                    .sum::<f64>()
                    / nk;
                means[c] = mean;
                variances[c] = variance.max(VARIANCE_FLOOR);
                weights[c] = nk / n;
            }

            if (log_likelihood - previous_ll).abs() < LOG_LIKELIHOOD_EPSILON {
                break;
            }
            previous_ll = log_likelihood;
        }

        let labels = responsibilities
            .iter()
            .map(|r| {
                r.iter()
                    .enumerate()
                    .fold((0, f64::NEG_INFINITY), |(best, best_p), (c, &p)| {
                        if p > best_p { (c, p) } else { (best, best_p) }
                    })
                    .0
            })
            .collect();

        Clustering { labels, centers: means }
    }
}

/// Strategy selected in the configuration.
pub fn clusterer_for(config: &OcrConfig) -> Box<dyn RowClusterer> {
    match config.clustering {
        ClusteringMethod::Kmeans => Box::new(KMeans1d { max_iterations: config.max_iterations }),
        ClusteringMethod::GaussianMixture => {
            Box::new(GaussianMixture1d { max_iterations: config.max_iterations })
        }
    }
}

/// Too few letters (or too few distinct heights) to form three rows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InsufficientObservations {
    pub distinct: usize,
    pub required: usize,
}

/// Letters grouped by key row.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RowAssignment {
    pub rows: BTreeMap<char, Row>,
    /// Cluster centres (mean y), top to bottom
    pub centers: [f64; ROW_COUNT],
    /// Letters of each row ordered left to right
    pub sequences: [Vec<char>; ROW_COUNT],
}

impl RowAssignment {
    pub fn row_of(&self, character: char) -> Option<Row> {
        self.rows.get(&character).copied()
    }

    pub fn sequence(&self, row: Row) -> &[char] {
        &self.sequences[row.index()]
    }
}

/// Assigns every observed letter to a row.
///
/// Needs at least `min_characters` letters and three distinct heights.
pub fn cluster_rows(
    observations: &[CharacterObservation],
    config: &OcrConfig,
) -> Result<RowAssignment, InsufficientObservations> {
    if observations.len() < config.min_characters {
        return Err(InsufficientObservations {
            distinct: observations.len(),
            required: config.min_characters,
        });
    }

    let values: Vec<f64> = observations.iter().map(|o| o.y).collect();
    let mut distinct_heights = values.clone();
    distinct_heights.sort_by(f64::total_cmp);
    distinct_heights.dedup();
    if distinct_heights.len() < ROW_COUNT {
        return Err(InsufficientObservations {
            distinct: distinct_heights.len(),
            required: ROW_COUNT,
        });
    }

    let clusterer = clusterer_for(config);
    let clustering = clusterer.fit(&values, ROW_COUNT);

    // Rank clusters by centre so the smallest y becomes the top row
    let mut order: Vec<usize> = (0..ROW_COUNT).collect();
    order.sort_by(|&a, &b| clustering.centers[a].total_cmp(&clustering.centers[b]));
    let mut rank = [0usize; ROW_COUNT];
    for (r, &cluster) in order.iter().enumerate() {
        rank[cluster] = r;
    }

    let mut rows = BTreeMap::new();
    let mut placed: [Vec<(f64, char)>; ROW_COUNT] = Default::default();
    for (observation, &label) in observations.iter().zip(&clustering.labels) {
        let row = Row::ALL[rank[label]];
        rows.insert(observation.character, row);
        placed[row.index()].push((observation.x, observation.character));
    }

    let sequences = placed.map(|mut row| {
        row.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        row.into_iter().map(|(_, c)| c).collect::<Vec<char>>()
    });
    let centers = [
        clustering.centers[order[0]],
        clustering.centers[order[1]],
        clustering.centers[order[2]],
    ];

    debug!(
        "OCR rows via {}: centres {:.1} / {:.1} / {:.1}, sizes {}/{}/{}",
        clusterer.name(),
        centers[0],
        centers[1],
        centers[2],
        sequences[0].len(),
        sequences[1].len(),
        sequences[2].len()
    );

    Ok(RowAssignment { rows, centers, sequences })
}
