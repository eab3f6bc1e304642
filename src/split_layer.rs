use std::task::{Context, Poll};

use axum::http::Request;
use tower::{Layer, Service};

use crate::timer_state::TimerHandle;

/// Records a named split as requests pass through. Build one with
/// [`SplitTimer::split_route`](crate::SplitTimer::split_route).
#[derive(Clone)]
pub struct SplitLayer {
    // None when an invalid key was suppressed; the layer degrades to a
    // pass-through.
    key: Option<String>,
    suppress_errors: bool,
}

impl SplitLayer {
    pub(crate) fn new(key: Option<String>, suppress_errors: bool) -> Self {
        SplitLayer {
            key,
            suppress_errors,
        }
    }
}

impl<S> Layer<S> for SplitLayer {
    type Service = SplitService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SplitService {
            inner,
            key: self.key.clone(),
            suppress_errors: self.suppress_errors,
        }
    }
}

/// Service produced by [`SplitLayer`]. A synchronous pass-through: it
/// records the split against the request's timing state and forwards the
/// request untouched. Timing problems never reach the HTTP client; a
/// missing timer is reported on the diagnostic stream instead.
#[derive(Clone)]
pub struct SplitService<S> {
    inner: S,
    key: Option<String>,
    suppress_errors: bool,
}

impl<S, B> Service<Request<B>> for SplitService<S>
where
    S: Service<Request<B>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        if let Some(key) = &self.key {
            match req.extensions().get::<TimerHandle>() {
                Some(handle) => {
                    if let Err(e) = handle.split(key) {
                        tracing::error!("failed to record split {key:?}: {e}");
                    }
                }
                None if self.suppress_errors => {
                    tracing::debug!("split_route({key:?}) ran before the start() layer");
                }
                None => {
                    tracing::error!(
                        "split_route({key:?}) ran before the start() layer; no split recorded"
                    );
                }
            }
        }
        self.inner.call(req)
    }
}
