use std::error::Error;
use std::fmt;

/// Misuse of the timing API, raised at the point of the offending call.
///
/// These represent incorrect integration, not environmental failure, so
/// there is no retry story. Under
/// [`suppress_errors`](crate::TimerConfig::suppress_errors) both variants
/// are downgraded to logged no-ops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitTimerError {
    /// A split key was the empty string.
    EmptyKey,
    /// `split` was called for a request whose timer was never started.
    NotStarted,
}

impl fmt::Display for SplitTimerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SplitTimerError::EmptyKey => {
                write!(f, "key for a timer split must be a non-empty string")
            }
            SplitTimerError::NotStarted => {
                write!(
                    f,
                    "split() called for an unstarted timer; \
                     register the start() layer before calling split()"
                )
            }
        }
    }
}

impl Error for SplitTimerError {}
