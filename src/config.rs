use serde::Deserialize;

/// Construction-time options for [`SplitTimer`](crate::SplitTimer).
///
/// Deserializable with defaults so a host application can embed it in its
/// own configuration file.
#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimerConfig {
    /// When set, input-validation failures (empty split key, split before
    /// start) become logged no-ops instead of panics or errors. Off by
    /// default: misuse surfaces at the call site.
    #[serde(default)]
    pub suppress_errors: bool,
}
