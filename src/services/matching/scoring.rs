use super::types::{Entity, MetricScore, ObservationTable};
use chrono::NaiveDate;
use statrs::statistics::Statistics;
use std::collections::BTreeMap;

/// Sample standard deviation needs at least two points.
pub const MIN_MATCHED_POINTS: usize = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct PairScores {
    /// Date-aligned observation pairs (inner join, duplicates fan out).
    pub matched_dates: usize,
    pub scores: Vec<MetricScore>,
}

impl PairScores {
    pub fn has_insufficient(&self) -> bool {
        self.scores.iter().any(MetricScore::is_insufficient)
    }
}

/// Scores `control` as a twin for `test`, one score per metric in table order.
///
/// Returns `None` when the two entities sit in different filters; such pairs
/// are not candidates at all.
pub fn score_pair(table: &ObservationTable, test: &Entity, control: &Entity) -> Option<PairScores> {
    if test.filter != control.filter {
        return None;
    }

    let mut control_by_date: BTreeMap<NaiveDate, Vec<&[Option<f64>]>> = BTreeMap::new();
    for row in table.observations(control) {
        control_by_date
            .entry(row.date)
            .or_default()
            .push(row.values.as_slice());
    }

    let mut diffs: Vec<Vec<f64>> = vec![Vec::new(); table.metrics().len()];
    let mut matched_dates = 0usize;
    for row in table.observations(test) {
        let Some(partners) = control_by_date.get(&row.date) else {
            continue;
        };
        for partner in partners {
            matched_dates += 1;
            for (metric_diffs, (a, b)) in diffs.iter_mut().zip(row.values.iter().zip(partner.iter())) {
                if let (Some(a), Some(b)) = (a, b) {
                    metric_diffs.push((a - b).abs());
                }
            }
        }
    }

    // The join visits rows in test-side order; sort so the running mean and
    // variance see the same sequence whichever entity is passed first.
    for metric_diffs in &mut diffs {
        metric_diffs.sort_by(f64::total_cmp);
    }

    Some(PairScores {
        matched_dates,
        scores: diffs.iter().map(|d| dissimilarity(d)).collect(),
    })
}

/// `mean(diffs) + sample_sd(diffs)` over absolute differences.
pub fn dissimilarity(abs_diffs: &[f64]) -> MetricScore {
    let matched = abs_diffs.len();
    if matched < MIN_MATCHED_POINTS {
        return MetricScore::Insufficient { matched };
    }
    let mean = abs_diffs.iter().mean();
    let sd = abs_diffs.iter().std_dev();
    let score = mean + sd;
    if score.is_finite() {
        MetricScore::Value(score)
    } else {
        MetricScore::Insufficient { matched }
    }
}
