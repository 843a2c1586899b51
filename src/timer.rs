// Lap timer with trimmed statistics
// Lap averages drop the fastest and slowest 20% of samples once at least 5 laps exist,
// which keeps warm-up iterations and scheduler hiccups out of throughput numbers.

use std::time::Instant;

/// Minimum lap count before the 20%/80% trimming kicks in.
const FILTER_MIN_LAPS: usize = 5;

/// Accumulating stopwatch that records per-iteration laps.
#[derive(Debug, Clone)]
pub struct Timer {
    /// Seconds accumulated over finished intervals
    counter: f64,
    /// Start of the in-flight interval, if running
    started: Option<Instant>,
    laps: Vec<f64>,
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer {
    /// Create a running timer.
    pub fn new() -> Self {
        let mut timer = Self::paused();
        timer.start();
        timer
    }

    /// Create a timer that does not measure until `start` is called.
    pub fn paused() -> Self {
        Self {
            counter: 0.0,
            started: None,
            laps: Vec::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.started.is_some()
    }

    pub fn start(&mut self) {
        if self.started.is_none() {
            self.started = Some(Instant::now());
        }
    }

    pub fn stop(&mut self) {
        if let Some(started) = self.started.take() {
            self.counter += started.elapsed().as_secs_f64();
        }
    }

    /// Drop the accumulated time and pause. Laps are kept.
    pub fn reset(&mut self) {
        self.counter = 0.0;
        self.started = None;
    }

    pub fn restart(&mut self) {
        self.reset();
        self.start();
    }

    /// Accumulated seconds plus the in-flight interval, never negative.
    pub fn elapsed(&self) -> f64 {
        let mut total = self.counter;
        if let Some(started) = self.started {
            total += started.elapsed().as_secs_f64();
        }
        total.max(0.0)
    }

    /// Record the current elapsed time as a lap and start measuring the next one.
    pub fn next_lap(&mut self) -> f64 {
        let lap = self.elapsed();
        self.laps.push(lap);
        self.restart();
        lap
    }

    pub fn laps(&self) -> &[f64] {
        &self.laps
    }

    pub fn clear_laps(&mut self) {
        self.laps.clear();
    }

    /// Trimmed mean of the recorded laps (see `filtered_laps`).
    pub fn lap_avg(&self) -> f64 {
        mean(&self.filtered_laps())
    }

    /// Trimmed standard deviation of the recorded laps.
    pub fn lap_std(&self) -> f64 {
        let laps = self.filtered_laps();
        if laps.is_empty() {
            return 0.0;
        }
        let avg = mean(&laps);
        let mean_sq = laps.iter().map(|lap| lap * lap).sum::<f64>() / laps.len() as f64;
        (mean_sq - avg * avg).max(0.0).sqrt()
    }

    /// Laps sorted ascending with the lowest and highest fifth removed.
    /// Fewer than 5 laps are returned untrimmed.
    pub fn filtered_laps(&self) -> Vec<f64> {
        let mut laps = self.laps.clone();
        laps.sort_by(f64::total_cmp);

        let count = laps.len();
        if count >= FILTER_MIN_LAPS {
            let cut = count / 5;
            laps.truncate(count - cut);
            laps.drain(..cut);
        }
        laps
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}
