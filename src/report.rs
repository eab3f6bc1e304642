use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;

/// Finalized timings for a single request, delivered to the completion
/// callback once the response is about to be sent.
#[derive(Debug, Clone, Serialize)]
pub struct TimingReport {
    /// Path of the request these timings were recorded for.
    pub path: String,

    /// Start marker. Always `0.0` in a delivered report: the start
    /// reference is zeroed when the timer stops.
    pub start_ms: f64,

    /// Elapsed milliseconds from timer start to finalization. Strictly
    /// greater than any split recorded before it.
    pub end_ms: f64,

    /// Named checkpoints in recording order, each the elapsed milliseconds
    /// from timer start to the moment the split was taken.
    pub splits: IndexMap<String, f64>,
}

impl TimingReport {
    /// Elapsed milliseconds recorded under `key`, if any.
    pub fn get(&self, key: &str) -> Option<f64> {
        self.splits.get(key).copied()
    }
}

/// `Server-Timing`-style rendering, e.g. `db; dur=1.204, total; dur=3.511`.
impl fmt::Display for TimingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, elapsed) in &self.splits {
            write!(f, "{key}; dur={elapsed:.3}, ")?;
        }
        write!(f, "total; dur={:.3}", self.end_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TimingReport {
        TimingReport {
            path: "/".to_string(),
            start_ms: 0.0,
            end_ms: 3.5,
            splits: IndexMap::from([
                ("db".to_string(), 1.25),
                ("render".to_string(), 2.5),
            ]),
        }
    }

    #[test]
    fn test_get_returns_recorded_split() {
        let report = sample();
        assert_eq!(report.get("db"), Some(1.25));
        assert_eq!(report.get("missing"), None);
    }

    #[test]
    fn test_display_lists_splits_in_order_then_total() {
        let rendered = sample().to_string();
        assert_eq!(rendered, "db; dur=1.250, render; dur=2.500, total; dur=3.500");
    }
}
