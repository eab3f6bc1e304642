use std::sync::Arc;

use axum::http::Extensions;

use crate::config::TimerConfig;
use crate::report::TimingReport;
use crate::split_layer::SplitLayer;
use crate::start_layer::StartLayer;
use crate::timer_error::SplitTimerError;
use crate::timer_state::TimerHandle;

/// Stateless factory for the timing layers.
///
/// Holds only configuration: every per-request record lives in that
/// request's extensions, so one `SplitTimer` (or any number of clones of
/// it) can serve arbitrarily many concurrent requests. Each call to
/// [`new`](SplitTimer::new) or [`with_config`](SplitTimer::with_config)
/// yields an independent instance; no process-wide singleton is involved.
#[derive(Debug, Clone, Default)]
pub struct SplitTimer {
    config: TimerConfig,
}

impl SplitTimer {
    /// Strict-mode timer: misuse surfaces at the call site.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: TimerConfig) -> Self {
        SplitTimer { config }
    }

    /// Start layer with no completion callback. Timings are still measured
    /// but dropped at finalization; the first such start for a request logs
    /// a warning unless a callback was registered earlier in the chain.
    pub fn start(&self) -> StartLayer {
        StartLayer::new(None)
    }

    /// Start layer that delivers the finalized [`TimingReport`] to
    /// `callback` once the response is about to be sent. If several start
    /// layers run in one chain, the last callback registered wins and the
    /// clock restarts at each of them, but finalization happens only once.
    pub fn start_with<F>(&self, callback: F) -> StartLayer
    where
        F: Fn(TimingReport) + Send + Sync + 'static,
    {
        StartLayer::new(Some(Arc::new(callback)))
    }

    /// Middleware that records a split under `key` as requests pass.
    ///
    /// The key is validated here, before any request flows through the
    /// returned layer.
    ///
    /// # Panics
    ///
    /// In strict mode, if `key` is empty. With
    /// [`suppress_errors`](TimerConfig::suppress_errors) the invalid layer
    /// degrades to a logged pass-through instead.
    pub fn split_route(&self, key: impl Into<String>) -> SplitLayer {
        let key = key.into();
        if key.is_empty() {
            if self.config.suppress_errors {
                tracing::debug!("ignoring split_route with an empty key");
                return SplitLayer::new(None, true);
            }
            panic!("split-timer: {}", SplitTimerError::EmptyKey);
        }
        SplitLayer::new(Some(key), self.config.suppress_errors)
    }

    /// Record a split directly against a request's extensions, for use from
    /// handlers or hand-rolled middleware. Requires that the start layer
    /// already ran for this request.
    ///
    /// Inside a handler it is usually more convenient to extract the
    /// [`TimerHandle`] itself (`Extension<TimerHandle>`) and call
    /// [`TimerHandle::split`] on it.
    pub fn split(&self, extensions: &Extensions, key: &str) -> Result<(), SplitTimerError> {
        let result = if key.is_empty() {
            Err(SplitTimerError::EmptyKey)
        } else {
            match extensions.get::<TimerHandle>() {
                Some(handle) => handle.split(key),
                None => Err(SplitTimerError::NotStarted),
            }
        };
        match result {
            Err(e) if self.config.suppress_errors => {
                tracing::debug!("suppressed timing error: {e}");
                Ok(())
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_without_start_is_a_state_error() {
        let timer = SplitTimer::new();
        let extensions = Extensions::new();
        assert_eq!(
            timer.split(&extensions, "key"),
            Err(SplitTimerError::NotStarted)
        );
    }

    #[test]
    fn test_empty_key_is_checked_before_state() {
        let timer = SplitTimer::new();
        let extensions = Extensions::new();
        assert_eq!(timer.split(&extensions, ""), Err(SplitTimerError::EmptyKey));
    }

    #[test]
    fn test_suppress_errors_turns_misuse_into_noops() {
        let timer = SplitTimer::with_config(TimerConfig {
            suppress_errors: true,
        });
        let extensions = Extensions::new();
        assert_eq!(timer.split(&extensions, "key"), Ok(()));
        assert_eq!(timer.split(&extensions, ""), Ok(()));
    }

    #[test]
    #[should_panic(expected = "non-empty")]
    fn test_split_route_empty_key_panics_in_strict_mode() {
        let timer = SplitTimer::new();
        let _ = timer.split_route("");
    }

    #[test]
    fn test_split_route_empty_key_is_suppressed() {
        let timer = SplitTimer::with_config(TimerConfig {
            suppress_errors: true,
        });
        // Must not panic; the layer becomes a pass-through.
        let _ = timer.split_route("");
    }

    #[test]
    fn test_config_deserializes_with_strict_default() {
        let config: TimerConfig = serde_json::from_str("{}").unwrap();
        assert!(!config.suppress_errors);
        let config: TimerConfig = serde_json::from_str(r#"{"suppress_errors": true}"#).unwrap();
        assert!(config.suppress_errors);
    }
}
