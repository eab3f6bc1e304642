//! Per-request split timing for tower/axum middleware stacks.
//!
//! A [`SplitTimer`] hands out two kinds of layers: a start layer that
//! begins timing when a request enters the chain, and split layers that
//! record named checkpoints along the way. Once the inner service has
//! produced its response, and before that response is sent, the registered
//! callback receives a [`TimingReport`] with every checkpoint, a zeroed
//! start marker, and the total elapsed time.
//!
//! ```no_run
//! use axum::{routing::get, Router};
//! use split_timer::SplitTimer;
//! use tower::ServiceBuilder;
//!
//! let timer = SplitTimer::new();
//! let app: Router = Router::new()
//!     .route("/", get(|| async { "OK" }))
//!     .layer(
//!         ServiceBuilder::new()
//!             .layer(timer.start_with(|report| tracing::info!("{report}")))
//!             .layer(timer.split_route("routed")),
//!     );
//! ```
//!
//! Handlers can record splits too, either through
//! [`SplitTimer::split`] or by extracting the request's [`TimerHandle`]
//! with `Extension<TimerHandle>`.
//!
//! Diagnostics (missing callback, duplicate keys, misplaced layers) go
//! through [`tracing`]; nothing this crate does is ever visible to the
//! HTTP client.

mod config;
mod report;
mod split_layer;
mod start_layer;
mod timer;
mod timer_error;
mod timer_state;

pub use config::TimerConfig;
pub use report::TimingReport;
pub use split_layer::{SplitLayer, SplitService};
pub use start_layer::{StartLayer, StartService};
pub use timer::SplitTimer;
pub use timer_error::SplitTimerError;
pub use timer_state::TimerHandle;
