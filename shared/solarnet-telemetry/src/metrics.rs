//! Statement counters and latency window

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

const DEFAULT_WINDOW: usize = 1024;

/// Shared monotonic count; clones observe the same value.
#[derive(Debug, Clone)]
pub struct Counter {
    name: &'static str,
    total: Arc<AtomicU64>,
}

impl Counter {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            total: Arc::default(),
        }
    }

    pub fn add(&self, n: u64) {
        self.total.fetch_add(n, Ordering::Relaxed);
    }

    pub fn inc(&self) {
        self.add(1);
    }

    pub fn get(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Keeps the most recent `window` samples; older ones are evicted first.
#[derive(Debug, Clone)]
pub struct Histogram {
    name: &'static str,
    window: usize,
    samples: Arc<Mutex<VecDeque<f64>>>,
}

/// Point-in-time view over a histogram window
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LatencySummary {
    pub count: usize,
    pub mean: f64,
    pub p50: f64,
    pub p95: f64,
    pub max: f64,
}

impl Histogram {
    pub fn new(name: &'static str) -> Self {
        Self::with_window(name, DEFAULT_WINDOW)
    }

    pub fn with_window(name: &'static str, window: usize) -> Self {
        let window = window.max(1);
        Self {
            name,
            window,
            samples: Arc::new(Mutex::new(VecDeque::with_capacity(window))),
        }
    }

    pub fn record(&self, value: f64) {
        let mut samples = self.samples.lock();
        if samples.len() == self.window {
            samples.pop_front();
        }
        samples.push_back(value);
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn summary(&self) -> LatencySummary {
        let mut sorted: Vec<f64> = self.samples.lock().iter().copied().collect();
        if sorted.is_empty() {
            return LatencySummary::default();
        }
        sorted.sort_by(f64::total_cmp);

        // nearest rank
        let rank = |q: f64| {
            let idx = ((q * sorted.len() as f64).ceil() as usize).saturating_sub(1);
            sorted[idx.min(sorted.len() - 1)]
        };
        LatencySummary {
            count: sorted.len(),
            mean: sorted.iter().sum::<f64>() / sorted.len() as f64,
            p50: rank(0.50),
            p95: rank(0.95),
            max: sorted[sorted.len() - 1],
        }
    }
}
