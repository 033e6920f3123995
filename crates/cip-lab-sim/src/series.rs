//! ---
//! cip_section: "11-simulation"
//! cip_subsection: "module"
//! cip_type: "source"
//! cip_scope: "code"
//! cip_description: "Bounded time series feeding the charts."
//! cip_version: "v0.1.0"
//! cip_owner: "tbd"
//! ---
use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::model::MetricSample;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub tick: u64,
    pub value: f64,
}

/// FIFO ring buffer; the oldest point is evicted once capacity is reached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSeries {
    capacity: usize,
    points: VecDeque<SeriesPoint>,
}

impl MetricSeries {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            points: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, tick: u64, value: f64) {
        if self.points.len() == self.capacity {
            self.points.pop_front();
        }
        self.points.push_back(SeriesPoint { tick, value });
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn latest(&self) -> Option<SeriesPoint> {
        self.points.back().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SeriesPoint> {
        self.points.iter()
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    /// `(tick, value)` pairs as expected by chart widgets.
    pub fn xy(&self) -> Vec<(f64, f64)> {
        self.points
            .iter()
            .map(|point| (point.tick as f64, point.value))
            .collect()
    }

    /// Minimum and maximum value currently held.
    pub fn value_bounds(&self) -> Option<(f64, f64)> {
        self.points.iter().fold(None, |acc, point| match acc {
            None => Some((point.value, point.value)),
            Some((lo, hi)) => Some((lo.min(point.value), hi.max(point.value))),
        })
    }
}

/// The three charted series of one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSeries {
    pub temperature: MetricSeries,
    pub conductivity: MetricSeries,
    pub rpm: MetricSeries,
}

impl SessionSeries {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            temperature: MetricSeries::with_capacity(capacity),
            conductivity: MetricSeries::with_capacity(capacity),
            rpm: MetricSeries::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, sample: &MetricSample) {
        self.temperature.push(sample.tick, sample.temperature_c);
        self.conductivity
            .push(sample.tick, sample.conductivity_ms_cm);
        self.rpm.push(sample.tick, sample.rpm);
    }

    pub fn clear(&mut self) {
        self.temperature.clear();
        self.conductivity.clear();
        self.rpm.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_oldest_on_overflow() {
        let mut series = MetricSeries::with_capacity(3);
        for tick in 1..=5 {
            series.push(tick, tick as f64 * 10.0);
        }
        assert_eq!(series.len(), 3);
        let ticks: Vec<u64> = series.iter().map(|p| p.tick).collect();
        assert_eq!(ticks, vec![3, 4, 5]);
        assert_eq!(series.latest().map(|p| p.value), Some(50.0));
        assert_eq!(series.value_bounds(), Some((30.0, 50.0)));
    }

    #[test]
    fn zero_capacity_is_promoted_to_one() {
        let mut series = MetricSeries::with_capacity(0);
        series.push(1, 1.0);
        series.push(2, 2.0);
        assert_eq!(series.capacity(), 1);
        assert_eq!(series.xy(), vec![(2.0, 2.0)]);
    }

    #[test]
    fn session_series_fans_out_samples() {
        let mut series = SessionSeries::with_capacity(30);
        series.push(&MetricSample {
            tick: 4,
            temperature_c: 30.0,
            conductivity_ms_cm: 2.4,
            rpm: 20.0,
        });
        assert_eq!(series.temperature.latest().map(|p| p.value), Some(30.0));
        assert_eq!(series.conductivity.latest().map(|p| p.value), Some(2.4));
        assert_eq!(series.rpm.latest().map(|p| p.tick), Some(4));
        series.clear();
        assert!(series.rpm.is_empty());
    }
}
