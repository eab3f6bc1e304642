use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::http::Request;
use tower::{Layer, Service};

use crate::timer_state::{ReportCallback, TimerHandle};

/// Starts (or restarts) the request timer. Build one with
/// [`SplitTimer::start`](crate::SplitTimer::start) or
/// [`SplitTimer::start_with`](crate::SplitTimer::start_with).
#[derive(Clone)]
pub struct StartLayer {
    callback: Option<ReportCallback>,
}

impl StartLayer {
    pub(crate) fn new(callback: Option<ReportCallback>) -> Self {
        StartLayer { callback }
    }
}

impl<S> Layer<S> for StartLayer {
    type Service = StartService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        StartService {
            inner,
            callback: self.callback.clone(),
        }
    }
}

/// Service produced by [`StartLayer`].
///
/// On the way in it attaches a [`TimerHandle`] to the request (or restarts
/// an existing one) and, for the first start layer a request meets, claims
/// the finalizer role. On the way out, once the inner service has produced
/// its response and before that response travels further up the stack, the
/// claiming service finalizes and delivers the report. Stacked start layers
/// restart the clock but never finalize twice, and the finalizer always
/// reads the state as it stands at response time.
#[derive(Clone)]
pub struct StartService<S> {
    inner: S,
    callback: Option<ReportCallback>,
}

impl<S, B> Service<Request<B>> for StartService<S>
where
    S: Service<Request<B>>,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<S::Response, S::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<B>) -> Self::Future {
        let handle = match req.extensions().get::<TimerHandle>() {
            Some(handle) => handle.clone(),
            None => {
                let handle = TimerHandle::new();
                req.extensions_mut().insert(handle.clone());
                handle
            }
        };
        let claimed = handle.begin(self.callback.clone());
        let finalizer = claimed.then(|| (handle, req.uri().path().to_string()));
        let response_future = self.inner.call(req);
        Box::pin(async move {
            let response = response_future.await?;
            if let Some((handle, path)) = finalizer {
                handle.finalize(&path);
            }
            Ok(response)
        })
    }
}
