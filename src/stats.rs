use serde::Serialize;
use std::collections::VecDeque;

use crate::approximator::FitMetrics;

/// Rolling window of training metrics; the oldest values drop out first.
#[derive(Debug, Clone)]
pub struct Statistics {
    loss: VecDeque<f32>,
    accuracy: VecDeque<f32>, // percent
    limit: usize,
}

impl Statistics {
    pub fn new(limit: usize) -> Self {
        Self { loss: VecDeque::with_capacity(limit + 1), accuracy: VecDeque::with_capacity(limit + 1), limit: limit.max(1) }
    }

    pub fn record(&mut self, metrics: FitMetrics) {
        self.loss.push_back(metrics.loss);
        self.accuracy.push_back(metrics.accuracy * 100.0);
        while self.loss.len() > self.limit {
            self.loss.pop_front();
        }
        while self.accuracy.len() > self.limit {
            self.accuracy.pop_front();
        }
    }

    pub fn mean_loss(&self) -> Option<f32> { mean(&self.loss) }
    pub fn mean_accuracy(&self) -> Option<f32> { mean(&self.accuracy) }
}

fn mean(xs: &VecDeque<f32>) -> Option<f32> {
    if xs.is_empty() {
        None
    } else {
        Some(xs.iter().sum::<f32>() / xs.len() as f32)
    }
}

/// Running sums for one episode's fits.
#[derive(Debug, Clone, Copy, Default)]
pub struct FitTally {
    pub fits: u32,
    loss_sum: f32,
    accuracy_sum: f32,
}

impl FitTally {
    pub fn add(&mut self, metrics: FitMetrics) {
        self.fits += 1;
        self.loss_sum += metrics.loss;
        self.accuracy_sum += metrics.accuracy;
    }

    pub fn mean_loss(&self) -> Option<f32> {
        (self.fits > 0).then(|| self.loss_sum / self.fits as f32)
    }

    pub fn mean_accuracy(&self) -> Option<f32> {
        (self.fits > 0).then(|| self.accuracy_sum / self.fits as f32)
    }
}

/// Summary of one finished episode.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpisodeReport {
    pub episode: usize,
    pub score: u32,
    pub steps: u32,
    pub epsilon: f64,
    pub explored: u32,
    pub exploited: u32,
    pub mean_loss: Option<f32>,
    pub mean_accuracy: Option<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_drops_oldest() {
        let mut stats = Statistics::new(3);
        for i in 0..5 {
            stats.record(FitMetrics { loss: i as f32, accuracy: 0.5 });
        }
        // only 2, 3 and 4 remain
        assert_eq!(stats.mean_loss(), Some(3.0));
        assert_eq!(stats.mean_accuracy(), Some(50.0));
    }

    #[test]
    fn empty_tally_has_no_means() {
        let mut tally = FitTally::default();
        assert_eq!(tally.mean_loss(), None);
        tally.add(FitMetrics { loss: 2.0, accuracy: 1.0 });
        tally.add(FitMetrics { loss: 4.0, accuracy: 0.0 });
        assert_eq!(tally.mean_loss(), Some(3.0));
        assert_eq!(tally.mean_accuracy(), Some(0.5));
    }
}
