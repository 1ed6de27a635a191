//! Idle-sample diagnostics reduction
//!
//! The timestamp ring records the platform timebase each time the idle
//! execution count crosses the diagnostics mask boundary. For ground
//! analysis the interesting quantity is the *delta* between consecutive
//! timestamps: base time ticks elapsed per idle-tick window. Raw deltas can
//! be any magnitude, so the report aggregates them by frequency and carries
//! only the four most common (delta, frequency) pairs, keeping the report a
//! fixed size no matter how the counters behave.

use super::{IdleCounters, UTIL_DIAG_ARRAY_LEN, UTIL_DIAG_REPORTS};

/// Unoccupied aggregation slot marker
const UNUSED_SLOT: u32 = u32::MAX;

/// Reduced diagnostics dump
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiagSummary {
    /// Mask active while the ring was recorded
    pub mask: u32,
    /// Most frequent timestamp deltas with their occurrence counts, most
    /// frequent first; unused tail pairs are `(u32::MAX, 0)`
    pub entries: [(u32, u32); UTIL_DIAG_REPORTS],
}

/// Reduce the current timestamp ring to a fixed-size report
///
/// Deltas are taken between adjacent ring entries (wrapping both the ring
/// and the 32-bit timebase), counted per distinct value, and the
/// `UTIL_DIAG_REPORTS` most frequent are returned. Ties keep first-recorded
/// order.
pub fn diag_summary(counters: &IdleCounters) -> DiagSummary {
    let samples = counters.snapshot_samples();

    let mut values = [UNUSED_SLOT; UTIL_DIAG_ARRAY_LEN];
    let mut counts = [0u32; UTIL_DIAG_ARRAY_LEN];

    for i in 0..UTIL_DIAG_ARRAY_LEN {
        let next = samples[(i + 1) % UTIL_DIAG_ARRAY_LEN];
        let delta = next.wrapping_sub(samples[i]);

        for j in 0..UTIL_DIAG_ARRAY_LEN {
            if values[j] == delta && counts[j] > 0 {
                counts[j] += 1;
                break;
            }
            if counts[j] == 0 {
                values[j] = delta;
                counts[j] = 1;
                break;
            }
        }
    }

    let mut entries = [(UNUSED_SLOT, 0u32); UTIL_DIAG_REPORTS];
    let mut taken = [false; UTIL_DIAG_ARRAY_LEN];
    for entry in entries.iter_mut() {
        let mut best: Option<usize> = None;
        for j in 0..UTIL_DIAG_ARRAY_LEN {
            if taken[j] || counts[j] == 0 {
                continue;
            }
            match best {
                Some(b) if counts[j] <= counts[b] => {}
                _ => best = Some(j),
            }
        }
        let Some(b) = best else {
            break;
        };
        taken[b] = true;
        *entry = (values[b], counts[b]);
    }

    DiagSummary {
        mask: counters.mask(),
        entries,
    }
}
