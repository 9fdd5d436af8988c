// Copyright 2025 The tractmap Authors
// SPDX-License-Identifier: Apache-2.0

/*!
Weighted centroid aggregation.

For the samples `(x_i, y_i, z_i, w_i)` of a region:

```text
denom      = Σ w_i
centroid   = trunc(Σ x_i·w_i / denom), trunc(Σ y_i·w_i / denom), trunc(Σ z_i·w_i / denom)
avg_weight = denom / n
```

Coordinates are truncated toward zero, never rounded. A region without samples,
whose weights sum to zero, or whose weighted mean is not finite gets no
centroid at all. Samples with a non-finite coordinate or weight are rejected
before aggregation.
*/

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};
use tractmap_atlas::{ExperimentId, RegionId};

use crate::data::{ForkData, ProjectionSide};
use crate::stages::ExperimentFailure;

/// One experiment's contribution to its region's centroid
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightedSample {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub weight: f64,
}

impl WeightedSample {
    pub fn new(x: f64, y: f64, z: f64, weight: f64) -> Self {
        Self { x, y, z, weight }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite() && self.weight.is_finite()
    }
}

/// Samples of one fork, region → experiment → sample
pub type SampleSet = BTreeMap<RegionId, BTreeMap<ExperimentId, WeightedSample>>;

/// Projection-weighted position of a region
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Centroid {
    pub x: i64,
    pub y: i64,
    pub z: i64,
    /// Mean projection metric of the contributing experiments
    pub avg_weight: f64,
}

/// Centroid of one sample set, `None` when it cannot be computed
pub fn weighted_centroid<'a, I>(samples: I) -> Option<Centroid>
where
    I: IntoIterator<Item = &'a WeightedSample>,
{
    let mut count = 0usize;
    let (mut denom, mut sx, mut sy, mut sz) = (0.0f64, 0.0f64, 0.0f64, 0.0f64);
    for sample in samples {
        count += 1;
        denom += sample.weight;
        sx += sample.x * sample.weight;
        sy += sample.y * sample.weight;
        sz += sample.z * sample.weight;
    }
    if count == 0 || denom == 0.0 || !denom.is_finite() {
        return None;
    }
    let (x, y, z) = (sx / denom, sy / denom, sz / denom);
    // `as i64` saturates and maps NaN to 0
    if !(x.is_finite() && y.is_finite() && z.is_finite()) {
        return None;
    }
    Some(Centroid {
        x: x.trunc() as i64,
        y: y.trunc() as i64,
        z: z.trunc() as i64,
        avg_weight: denom / count as f64,
    })
}

/// Centroid per region; regions without a centroid are left out
pub fn aggregate(samples: &SampleSet) -> BTreeMap<RegionId, Centroid> {
    let mut centroids = BTreeMap::new();
    for (&region, region_samples) in samples {
        if region_samples.is_empty() {
            continue;
        }
        match weighted_centroid(region_samples.values()) {
            Some(centroid) => {
                centroids.insert(region, centroid);
            }
            None => warn!(
                target: "tractmap-curation",
                "Region {}: no centroid from {} samples (zero weight sum or non-finite position)",
                region,
                region_samples.len()
            ),
        }
    }
    centroids
}

/// Centroid inputs of a fork, weighted by `metric`
///
/// Every region of the fork appears in the result, possibly without samples.
pub fn centroid_samples(fork: &ForkData, metric: &str) -> (SampleSet, Vec<ExperimentFailure>) {
    let mut failures = Vec::new();
    let samples = fork
        .regions
        .iter()
        .map(|(&region, records)| {
            let mut region_samples = BTreeMap::new();
            for record in records {
                match record.metric(metric) {
                    Some(weight) => {
                        let sample = WeightedSample::new(record.x, record.y, record.z, weight);
                        if sample.is_finite() {
                            region_samples.insert(record.experiment_id, sample);
                        } else {
                            failures.push(ExperimentFailure::new(
                                region,
                                record.experiment_id,
                                format!(
                                    "non-finite centroid sample ({}, {}, {}, weight {})",
                                    sample.x, sample.y, sample.z, sample.weight
                                ),
                            ));
                        }
                    }
                    None => failures.push(ExperimentFailure::new(
                        region,
                        record.experiment_id,
                        format!("no '{}' value for the centroid weight", metric),
                    )),
                }
            }
            (region, region_samples)
        })
        .collect();
    (samples, failures)
}

/// `"<n> <side> centroids computed out of <m> regions"`
pub fn centroid_summary(side: ProjectionSide, centroids: &BTreeMap<RegionId, Centroid>, samples: &SampleSet) -> String {
    let summary = format!(
        "{} {} centroids computed out of {} regions",
        centroids.len(),
        side,
        samples.len()
    );
    info!(target: "tractmap-curation", "{}", summary);
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ProjectionRecord;
    use tractmap_atlas::Hemisphere;

    #[test]
    fn test_weighted_centroid_truncates() {
        let samples = [WeightedSample::new(0.0, 0.0, 0.0, 1.0), WeightedSample::new(10.0, 0.0, 0.0, 3.0)];
        let centroid = weighted_centroid(&samples).unwrap();
        assert_eq!((centroid.x, centroid.y, centroid.z), (7, 0, 0));
        assert_eq!(centroid.avg_weight, 2.0);
    }

    #[test]
    fn test_truncation_is_toward_zero() {
        let samples = [WeightedSample::new(-10.0, 9.9, 5.5, 1.0), WeightedSample::new(-5.0, 0.0, 5.5, 1.0)];
        let centroid = weighted_centroid(&samples).unwrap();
        assert_eq!((centroid.x, centroid.y, centroid.z), (-7, 4, 5));
    }

    #[test]
    fn test_empty_and_zero_weight_regions_are_omitted() {
        let samples: SampleSet = BTreeMap::from([
            (1, BTreeMap::new()),
            (2, BTreeMap::from([(10, WeightedSample::new(5.0, 5.0, 5.0, 0.0))])),
            (3, BTreeMap::from([(11, WeightedSample::new(4.0, 6.0, 8.0, 0.5))])),
        ]);
        let centroids = aggregate(&samples);
        assert!(!centroids.contains_key(&1));
        assert!(!centroids.contains_key(&2));
        assert_eq!(centroids[&3], Centroid { x: 4, y: 6, z: 8, avg_weight: 0.5 });
        assert_eq!(
            centroid_summary(ProjectionSide::Ipsilateral, &centroids, &samples),
            "1 ipsilateral centroids computed out of 3 regions"
        );
    }

    #[test]
    fn test_samples_use_primary_metric() {
        let fork = ForkData {
            hemisphere: Hemisphere::Left,
            regions: BTreeMap::from([(
                385,
                vec![ProjectionRecord {
                    experiment_id: 4,
                    hemisphere: Hemisphere::Left,
                    x: 1.0,
                    y: 2.0,
                    z: 3.0,
                    metrics: BTreeMap::from([("projection_density".to_string(), 0.7)]),
                }],
            )]),
        };
        let (samples, failures) = centroid_samples(&fork, "projection_density");
        assert!(failures.is_empty());
        assert_eq!(samples[&385][&4], WeightedSample::new(1.0, 2.0, 3.0, 0.7));

        let (samples, failures) = centroid_samples(&fork, "projection_energy");
        assert!(samples[&385].is_empty());
        assert_eq!(failures.len(), 1);
    }

    #[test]
    fn test_non_finite_positions_give_no_centroid() {
        assert_eq!(weighted_centroid(&[WeightedSample::new(f64::NAN, 1.0, 1.0, 1.0)]), None);
        assert_eq!(weighted_centroid(&[WeightedSample::new(1.0, f64::INFINITY, 1.0, 1.0)]), None);
        // Finite inputs whose weighted sum overflows
        assert_eq!(weighted_centroid(&[WeightedSample::new(f64::MAX, 0.0, 0.0, 4.0)]), None);

        let samples: SampleSet = BTreeMap::from([
            (1, BTreeMap::from([(10, WeightedSample::new(f64::NAN, 0.0, 0.0, 1.0))])),
            (2, BTreeMap::from([(11, WeightedSample::new(2.0, 2.0, 2.0, 1.0))])),
        ]);
        let centroids = aggregate(&samples);
        assert!(!centroids.contains_key(&1));
        assert_eq!(centroids[&2], Centroid { x: 2, y: 2, z: 2, avg_weight: 1.0 });
    }

    #[test]
    fn test_non_finite_records_are_failures() {
        let record = |experiment_id, x: f64, weight: f64| ProjectionRecord {
            experiment_id,
            hemisphere: Hemisphere::Right,
            x,
            y: 0.0,
            z: 0.0,
            metrics: BTreeMap::from([("projection_density".to_string(), weight)]),
        };
        let fork = ForkData {
            hemisphere: Hemisphere::Right,
            regions: BTreeMap::from([(
                385,
                vec![record(1, f64::NAN, 1.0), record(2, 4.0, f64::INFINITY), record(3, 6.0, 2.0)],
            )]),
        };

        let (samples, failures) = centroid_samples(&fork, "projection_density");

        assert_eq!(samples[&385].keys().copied().collect::<Vec<_>>(), vec![3]);
        let failed: Vec<_> = failures.iter().map(|f| f.experiment_id).collect();
        assert_eq!(failed, vec![1, 2]);
        assert_eq!(aggregate(&samples)[&385], Centroid { x: 6, y: 0, z: 0, avg_weight: 2.0 });
    }
}
