//! CPU utilization sampling
//!
//! Idle time is measured by counting executions of a lowest-priority
//! background task: every pass through that task calls
//! [`IdleCounters::mark_idle`], so the execution count is a direct proxy for
//! spare CPU capacity. The engine periodically snapshots the count into an
//! interval and converts it to a busy percentage with pure integer
//! arithmetic.
//!
//! # Sharing discipline
//!
//! `IdleCounters` is the only state shared between execution contexts and
//! every field has a single writer: the background task owns the execution
//! count and the timestamp ring, the engine owns the diagnostics mask, and
//! all marking/averaging state lives privately in [`UtilizationTracker`] on
//! the engine side. Relaxed atomics are sufficient; if the background task
//! is starved completely the interval simply comes out near zero, which the
//! conversion reports as a fully busy CPU.

use core::sync::atomic::{AtomicU32, Ordering};

use crate::core::events::EngineEvent;
use crate::core::traits::Collaborators;
use crate::log_debug;

pub mod diag;

pub use diag::{diag_summary, DiagSummary};

/// Utilization basis: 10000 = 100.00% busy
pub const UTIL_TOTAL: u32 = 10_000;

/// Idle timestamp ring length (power of two)
pub const UTIL_DIAG_ARRAY_LEN: usize = 16;

/// Ring index mask
pub const UTIL_DIAG_ARRAY_MASK: u32 = (UTIL_DIAG_ARRAY_LEN - 1) as u32;

/// Number of (delta, frequency) pairs in a diagnostics report
pub const UTIL_DIAG_REPORTS: usize = 4;

/// Default idle-sample diagnostics mask (recording effectively disabled)
pub const DEFAULT_UTIL_MASK: u32 = 0xFFFF_FFFF;

/// Default conversion multiplier applied before the divisor
pub const DEFAULT_UTIL_MULT1: u32 = 1;

/// Default conversion divisor
pub const DEFAULT_UTIL_DIV: u32 = 1;

/// Default conversion multiplier applied after the divisor
pub const DEFAULT_UTIL_MULT2: u32 = 1;

/// Mark calls per interval computation
pub const UTIL_CALLS_PER_MARK: u32 = 1;

/// Engine cycles per utilization monitoring pass
pub const UTIL_CYCLES_PER_INTERVAL: u32 = 1;

/// Intervals in the rolling average/peak window
pub const UTIL_AVERAGE_INTERVALS: usize = 4;

/// Busy level (of `UTIL_TOTAL`) treated as hogging
pub const UTIL_HOGGING_THRESHOLD: u32 = 9_900;

/// Consecutive hogging intervals before the event fires
pub const UTIL_HOGGING_TIMEOUT: u32 = 5;

/// State shared with the background idle task
///
/// Lives in a `static` so the idle task and the engine can both hold a
/// reference for the life of the process. The background task is the only
/// writer of the counter and the ring; the engine only writes the mask.
#[derive(Debug)]
pub struct IdleCounters {
    exec_count: AtomicU32,
    mask: AtomicU32,
    samples: [AtomicU32; UTIL_DIAG_ARRAY_LEN],
    sample_index: AtomicU32,
}

impl IdleCounters {
    /// Create counters with the default diagnostics mask
    pub const fn new() -> Self {
        const ZERO: AtomicU32 = AtomicU32::new(0);
        Self {
            exec_count: AtomicU32::new(0),
            mask: AtomicU32::new(DEFAULT_UTIL_MASK),
            samples: [ZERO; UTIL_DIAG_ARRAY_LEN],
            sample_index: AtomicU32::new(0),
        }
    }

    /// One pass of the background idle task
    ///
    /// Increments the idle execution count. When the count sits exactly on
    /// the diagnostics mask boundary (`count & mask == mask`, past the first
    /// window), `now_ticks` from the platform timebase is recorded into the
    /// timestamp ring for the diagnostics report.
    pub fn mark_idle(&self, now_ticks: u32) {
        let exec = self.exec_count.load(Ordering::Relaxed);
        let mask = self.mask.load(Ordering::Relaxed);

        if (exec & mask) == mask && exec > mask {
            let index = self.sample_index.load(Ordering::Relaxed);
            self.samples[(index & UTIL_DIAG_ARRAY_MASK) as usize]
                .store(now_ticks, Ordering::Relaxed);
            self.sample_index.store(index.wrapping_add(1), Ordering::Relaxed);
        }

        self.exec_count.store(exec.wrapping_add(1), Ordering::Relaxed);
    }

    /// Current idle execution count
    pub fn exec_count(&self) -> u32 {
        self.exec_count.load(Ordering::Relaxed)
    }

    /// Active diagnostics mask
    pub fn mask(&self) -> u32 {
        self.mask.load(Ordering::Relaxed)
    }

    /// Set the diagnostics mask (engine side)
    pub fn set_mask(&self, mask: u32) {
        self.mask.store(mask, Ordering::Relaxed);
    }

    /// Number of timestamps recorded since start
    pub fn sample_count(&self) -> u32 {
        self.sample_index.load(Ordering::Relaxed)
    }

    /// Copy out the timestamp ring for diagnostics
    pub fn snapshot_samples(&self) -> [u32; UTIL_DIAG_ARRAY_LEN] {
        let mut out = [0u32; UTIL_DIAG_ARRAY_LEN];
        for (slot, sample) in out.iter_mut().zip(self.samples.iter()) {
            *slot = sample.load(Ordering::Relaxed);
        }
        out
    }
}

impl Default for IdleCounters {
    fn default() -> Self {
        Self::new()
    }
}

/// Utilization conversion parameters
///
/// All three must be nonzero to be accepted; a zero divisor reaching the
/// conversion anyway yields a defined zero result rather than a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UtilParams {
    /// Multiplier applied before the divisor
    pub mult1: u32,
    /// Divisor
    pub div: u32,
    /// Multiplier applied after the divisor
    pub mult2: u32,
}

impl Default for UtilParams {
    fn default() -> Self {
        Self {
            mult1: DEFAULT_UTIL_MULT1,
            div: DEFAULT_UTIL_DIV,
            mult2: DEFAULT_UTIL_MULT2,
        }
    }
}

/// Parameter rejection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UtilError {
    /// One or more parameters were zero
    ZeroParameter,
}

/// Engine-side utilization state
///
/// Owns interval marking, the busy-percentage conversion, the rolling
/// average/peak window, and hogging detection. Single-threaded with the
/// rest of the engine.
pub struct UtilizationTracker {
    params: UtilParams,
    mark_calls: u32,
    last_exec: u32,
    last_interval: u32,
    cycle_counter: u32,
    current_util: u32,
    window: [u32; UTIL_AVERAGE_INTERVALS],
    window_next: usize,
    window_filled: usize,
    hog_intervals: u32,
    hog_reported: bool,
}

impl UtilizationTracker {
    /// Create a tracker with default conversion parameters
    pub fn new() -> Self {
        Self {
            params: UtilParams::default(),
            mark_calls: 0,
            last_exec: 0,
            last_interval: 0,
            cycle_counter: 0,
            current_util: 0,
            window: [0; UTIL_AVERAGE_INTERVALS],
            window_next: 0,
            window_filled: 0,
            hog_intervals: 0,
            hog_reported: false,
        }
    }

    /// One pass of the sampler's own cadence (e.g. a 1 Hz time callback)
    ///
    /// Counts calls against the calls-per-mark window; when the window
    /// completes, latches the idle execution delta since the previous mark
    /// as the current interval.
    pub fn utilization_mark(&mut self, counters: &IdleCounters) {
        self.mark_calls += 1;
        if self.mark_calls >= UTIL_CALLS_PER_MARK {
            let exec = counters.exec_count();
            self.last_interval = exec.wrapping_sub(self.last_exec);
            self.last_exec = exec;
            self.mark_calls = 0;
        }
    }

    /// Convert the latest interval to a busy level on the `UTIL_TOTAL` basis
    ///
    /// `UTIL_TOTAL - (interval * mult1 / div) * mult2`, clamped to the
    /// basis. A zero divisor yields 0 by definition.
    pub fn current_utilization(&self) -> u32 {
        if self.params.div == 0 {
            return 0;
        }
        let idle = (self.last_interval as u64 * self.params.mult1 as u64
            / self.params.div as u64)
            * self.params.mult2 as u64;
        if idle >= UTIL_TOTAL as u64 {
            0
        } else {
            UTIL_TOTAL - idle as u32
        }
    }

    /// Utilization monitoring pass, driven from the engine tick
    ///
    /// Runs the conversion on the configured cycles-per-interval sub-cadence
    /// (skipped cycles retain the previous value), maintains the rolling
    /// average/peak window, and detects sustained hogging when enabled.
    pub fn monitor_utilization<C: Collaborators>(&mut self, hog_enabled: bool, c: &mut C) {
        self.cycle_counter += 1;
        if self.cycle_counter < UTIL_CYCLES_PER_INTERVAL {
            return;
        }
        self.cycle_counter = 0;

        self.current_util = self.current_utilization();

        self.window[self.window_next] = self.current_util;
        self.window_next = (self.window_next + 1) % UTIL_AVERAGE_INTERVALS;
        if self.window_filled < UTIL_AVERAGE_INTERVALS {
            self.window_filled += 1;
        }

        if !hog_enabled {
            self.hog_intervals = 0;
            self.hog_reported = false;
            return;
        }

        if self.current_util > UTIL_HOGGING_THRESHOLD {
            self.hog_intervals = self.hog_intervals.saturating_add(1);
            if self.hog_intervals >= UTIL_HOGGING_TIMEOUT && !self.hog_reported {
                log_debug!("cpu hogging detected at {}", self.current_util);
                c.report(EngineEvent::CpuHogging {
                    utilization: self.current_util,
                });
                self.hog_reported = true;
            }
        } else {
            self.hog_intervals = 0;
            self.hog_reported = false;
        }
    }

    /// Replace the conversion parameters; all three must be nonzero
    pub fn set_params(&mut self, params: UtilParams) -> Result<(), UtilError> {
        if params.mult1 == 0 || params.div == 0 || params.mult2 == 0 {
            return Err(UtilError::ZeroParameter);
        }
        self.params = params;
        Ok(())
    }

    /// Active conversion parameters
    pub fn params(&self) -> UtilParams {
        self.params
    }

    /// Latest computed busy level (retained across skipped cycles)
    pub fn current(&self) -> u32 {
        self.current_util
    }

    /// Rolling average busy level over the interval window
    pub fn average(&self) -> u32 {
        if self.window_filled == 0 {
            return 0;
        }
        let sum: u64 = self.window[..self.window_filled]
            .iter()
            .map(|&v| v as u64)
            .sum();
        (sum / self.window_filled as u64) as u32
    }

    /// Peak busy level over the interval window
    pub fn peak(&self) -> u32 {
        self.window[..self.window_filled]
            .iter()
            .copied()
            .max()
            .unwrap_or(0)
    }

    /// Latest idle execution interval
    pub fn last_interval(&self) -> u32 {
        self.last_interval
    }

    #[cfg(test)]
    pub(crate) fn force_interval(&mut self, interval: u32) {
        self.last_interval = interval;
    }
}

impl Default for UtilizationTracker {
    fn default() -> Self {
        Self::new()
    }
}
