use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::plan::PartPlan;

/// Maps one part's progress to a whole-file percentage.
///
/// `round(100 * (base_before + part_percent / 100 * part_size) / file_size)`,
/// clamped to 0–100. A zero-byte file is reported as complete.
pub fn overall_percent(part_size: u64, part_percent: f64, base_before: u64, file_size: u64) -> u8 {
    let part_bytes = part_percent.clamp(0.0, 100.0) / 100.0 * part_size as f64;
    percent_of(base_before as f64 + part_bytes, file_size)
}

fn percent_of(transferred: f64, file_size: u64) -> u8 {
    if file_size == 0 {
        return 100;
    }
    let pct = (100.0 * transferred / file_size as f64).round();
    pct.clamp(0.0, 100.0) as u8
}

// ---------------------------------------------------------------------------
// ProgressAggregator
// ---------------------------------------------------------------------------

/// Running whole-file progress for one upload invocation.
///
/// `uploaded_bytes_base` only grows, by exactly a part's size, when that
/// part completes. In-flight parts contribute their sent bytes; the
/// reported percentage never decreases, even when a failed PUT attempt
/// restarts a part from zero.
#[derive(Debug)]
pub struct ProgressAggregator {
    file_size: u64,
    uploaded_bytes_base: u64,
    in_flight: BTreeMap<u32, f64>,
    completed: BTreeSet<u32>,
    last_percent: u8,
}

impl ProgressAggregator {
    pub fn new(file_size: u64) -> Self {
        Self {
            file_size,
            uploaded_bytes_base: 0,
            in_flight: BTreeMap::new(),
            completed: BTreeSet::new(),
            last_percent: 0,
        }
    }

    /// Records `part_percent` (0–100) for an in-flight part and returns the
    /// overall percentage.
    pub fn update(&mut self, part: &PartPlan, part_percent: f64) -> u8 {
        let sent = part_percent.clamp(0.0, 100.0) / 100.0 * part.len() as f64;
        self.record(part, sent)
    }

    /// Records absolute bytes sent for an in-flight part.
    pub fn update_bytes(&mut self, part: &PartPlan, sent: u64) -> u8 {
        self.record(part, sent.min(part.len()) as f64)
    }

    fn record(&mut self, part: &PartPlan, sent: f64) -> u8 {
        if !self.completed.contains(&part.part_number) {
            let entry = self.in_flight.entry(part.part_number).or_insert(0.0);
            *entry = entry.max(sent);
        }
        self.emit()
    }

    /// Moves a part into the completed base. Completing a part twice has no
    /// further effect.
    pub fn complete_part(&mut self, part: &PartPlan) -> u8 {
        if self.completed.insert(part.part_number) {
            self.in_flight.remove(&part.part_number);
            self.uploaded_bytes_base += part.len();
        }
        self.emit()
    }

    /// Forces 100% once the whole upload has succeeded.
    pub fn finish(&mut self) -> u8 {
        self.last_percent = 100;
        self.last_percent
    }

    fn emit(&mut self) -> u8 {
        let pct = percent_of(self.transferred_exact(), self.file_size);
        self.last_percent = self.last_percent.max(pct);
        self.last_percent
    }

    fn transferred_exact(&self) -> f64 {
        self.uploaded_bytes_base as f64 + self.in_flight.values().sum::<f64>()
    }

    /// Bytes of fully completed parts.
    pub fn uploaded_bytes_base(&self) -> u64 {
        self.uploaded_bytes_base
    }

    /// Completed bytes plus bytes sent for in-flight parts.
    pub fn transferred_bytes(&self) -> u64 {
        (self.transferred_exact() as u64).min(self.file_size)
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Last reported percentage.
    pub fn percent(&self) -> u8 {
        self.last_percent
    }
}

// ---------------------------------------------------------------------------
// SpeedCalculator
// ---------------------------------------------------------------------------

/// Sliding-window throughput estimate.
#[derive(Debug)]
pub struct SpeedCalculator {
    inner: Mutex<SpeedWindow>,
}

#[derive(Debug)]
struct SpeedWindow {
    samples: VecDeque<(Instant, u64)>,
    max_samples: usize,
    window: Duration,
}

impl Default for SpeedCalculator {
    fn default() -> Self {
        Self::new(Duration::from_secs(5), 100)
    }
}

impl SpeedCalculator {
    pub fn new(window: Duration, max_samples: usize) -> Self {
        Self {
            inner: Mutex::new(SpeedWindow {
                samples: VecDeque::new(),
                max_samples: max_samples.max(2),
                window,
            }),
        }
    }

    /// Records `bytes` transferred now.
    pub fn add_sample(&self, bytes: u64) {
        self.add_sample_at(Instant::now(), bytes);
    }

    /// Records `bytes` transferred at `at`.
    pub fn add_sample_at(&self, at: Instant, bytes: u64) {
        let mut w = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        w.samples.push_back((at, bytes));

        if let Some(cutoff) = at.checked_sub(w.window) {
            while w.samples.front().is_some_and(|(t, _)| *t < cutoff) {
                w.samples.pop_front();
            }
        }
        while w.samples.len() > w.max_samples {
            w.samples.pop_front();
        }
    }

    /// Average bytes/second across the window; 0.0 with fewer than two
    /// samples.
    pub fn bytes_per_second(&self) -> f64 {
        let w = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let (Some((first, _)), Some((last, _))) = (w.samples.front(), w.samples.back()) else {
            return 0.0;
        };
        let elapsed = last.duration_since(*first);
        if elapsed.is_zero() {
            return 0.0;
        }
        // The first sample marks the window start; its bytes precede it.
        let bytes: u64 = w.samples.iter().skip(1).map(|(_, b)| b).sum();
        bytes as f64 / elapsed.as_secs_f64()
    }

    /// Estimated time to send `remaining_bytes`, if any throughput is known.
    pub fn eta(&self, remaining_bytes: u64) -> Option<Duration> {
        let speed = self.bytes_per_second();
        (speed > 0.0).then(|| Duration::from_secs_f64(remaining_bytes as f64 / speed))
    }
}
