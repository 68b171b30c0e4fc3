//! Density-based rejection of sporadic observer positions

use crate::algorithms::geo::distance_m;
use crate::core::GeoPoint;

/// Cluster membership of a single observer position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterLabel {
    Cluster(usize),
    Noise,
}

impl ClusterLabel {
    pub fn is_noise(&self) -> bool {
        matches!(self, ClusterLabel::Noise)
    }
}

/// Label per input position, index-aligned with the input slice
#[derive(Debug, Clone)]
pub struct ClusterAssignment {
    pub labels: Vec<ClusterLabel>,
    pub cluster_count: usize,
}

impl ClusterAssignment {
    pub fn noise_count(&self) -> usize {
        self.labels.iter().filter(|label| label.is_noise()).count()
    }
}

/// DBSCAN over observer positions.
///
/// Two positions are neighbors when their ground distance is at most
/// `eps_m`; a position is a core point when it has at least `min_samples`
/// neighbors, counting itself. Core points and points density-reachable
/// from them form clusters; everything else is noise.
#[derive(Debug, Clone)]
pub struct DensityClusterer {
    pub eps_m: f64,
    pub min_samples: usize,
}

impl DensityClusterer {
    pub fn new(eps_m: f64, min_samples: usize) -> Self {
        Self { eps_m, min_samples }
    }

    /// Assign a cluster label to every position. Deterministic for a given
    /// input order: clusters are seeded by ascending index.
    pub fn assign(&self, points: &[GeoPoint]) -> ClusterAssignment {
        let n = points.len();
        let neighborhoods: Vec<Vec<usize>> = (0..n)
            .map(|i| {
                (0..n)
                    .filter(|&j| distance_m(points[i], points[j]) <= self.eps_m)
                    .collect()
            })
            .collect();

        let mut labels = vec![None::<ClusterLabel>; n];
        let mut cluster_count = 0;

        for seed in 0..n {
            if labels[seed].is_some() {
                continue;
            }
            if neighborhoods[seed].len() < self.min_samples {
                labels[seed] = Some(ClusterLabel::Noise);
                continue;
            }

            let cluster = ClusterLabel::Cluster(cluster_count);
            cluster_count += 1;
            labels[seed] = Some(cluster);

            // Breadth-first expansion over density-reachable points
            let mut frontier: Vec<usize> = neighborhoods[seed].clone();
            let mut cursor = 0;
            while cursor < frontier.len() {
                let point = frontier[cursor];
                cursor += 1;

                match labels[point] {
                    // Border point previously dismissed as noise joins the cluster
                    Some(ClusterLabel::Noise) => labels[point] = Some(cluster),
                    Some(_) => continue,
                    None => {
                        labels[point] = Some(cluster);
                        if neighborhoods[point].len() >= self.min_samples {
                            frontier.extend_from_slice(&neighborhoods[point]);
                        }
                    }
                }
            }
        }

        ClusterAssignment {
            labels: labels.into_iter().map(|label| label.unwrap_or(ClusterLabel::Noise)).collect(),
            cluster_count,
        }
    }
}
