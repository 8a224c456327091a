//! Chunk arrival timing: time to first token and time between tokens.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct TimingTracker {
    start_time: Instant,
    first_chunk_time: Option<Instant>,
    chunk_timestamps: Vec<Instant>,
    end_time: Option<Instant>,
}

/// Timing figures computed at finalization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimingSummary {
    /// First chunk minus start; zero when no chunk arrived.
    pub ttft: Duration,
    /// Mean gap between consecutive chunks; zero below two chunks.
    pub tbt: Duration,
    /// End minus start.
    pub duration: Duration,
}

impl TimingTracker {
    pub fn new(start_time: Instant) -> Self {
        Self {
            start_time,
            first_chunk_time: None,
            chunk_timestamps: Vec::new(),
            end_time: None,
        }
    }

    pub fn start_time(&self) -> Instant {
        self.start_time
    }

    /// Set once [`finalize`](Self::finalize) has run.
    pub fn end_time(&self) -> Option<Instant> {
        self.end_time
    }

    pub fn chunk_count(&self) -> usize {
        self.chunk_timestamps.len()
    }

    pub fn on_chunk(&mut self, now: Instant) {
        if self.first_chunk_time.is_none() {
            self.first_chunk_time = Some(now);
        }
        self.chunk_timestamps.push(now);
    }

    pub fn finalize(&mut self, now: Instant) -> TimingSummary {
        self.end_time = Some(now);
        TimingSummary {
            ttft: self.ttft(),
            tbt: self.tbt(),
            duration: now.saturating_duration_since(self.start_time),
        }
    }

    fn ttft(&self) -> Duration {
        self.first_chunk_time
            .map(|first| first.saturating_duration_since(self.start_time))
            .unwrap_or_default()
    }

    fn tbt(&self) -> Duration {
        let gaps = self.chunk_timestamps.len().saturating_sub(1);
        if gaps == 0 {
            return Duration::ZERO;
        }
        let total: Duration = self
            .chunk_timestamps
            .windows(2)
            .map(|w| w[1].saturating_duration_since(w[0]))
            .sum();
        total / u32::try_from(gaps).unwrap_or(u32::MAX)
    }
}
