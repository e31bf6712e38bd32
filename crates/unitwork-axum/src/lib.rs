//! Axum pipeline adapter for `unitwork`.
//!
//! [`SessionLayer`] wraps every request in a session scope, so handlers can
//! call [`unitwork::current_session`] without any setup of their own. On a
//! completed response the scope commits (when the manager's commit-on-exit
//! policy says so); if the handler panics or the request future is dropped
//! mid-flight (client disconnect, timeout), the scope's guard rolls the
//! session back and the failure propagates unchanged.
//!
//! Note that an error *response* (4xx/5xx built by the handler) is still a
//! completed response: the scope commits as usual. Handlers that want an
//! error response to discard writes should roll back through the handle, or
//! do their writes in a nested manual scope and let its result decide.

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use tower::{Layer, Service};
use unitwork::{ScopeError, SessionManager};

/// Installs a session scope around every request.
#[derive(Clone)]
pub struct SessionLayer {
    manager: Arc<SessionManager>,
}

impl SessionLayer {
    /// Wraps requests with scopes from `manager`.
    pub fn new(manager: Arc<SessionManager>) -> Self {
        Self { manager }
    }
}

impl<S> Layer<S> for SessionLayer {
    type Service = SessionService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SessionService {
            inner,
            manager: Arc::clone(&self.manager),
        }
    }
}

/// The service produced by [`SessionLayer`].
#[derive(Clone)]
pub struct SessionService<S> {
    inner: S,
    manager: Arc<SessionManager>,
}

impl<S> Service<Request<Body>> for SessionService<S>
where
    S: Service<Request<Body>, Response = Response, Error = Infallible> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Response, Infallible>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        // Take the service that was polled ready; leave a fresh clone behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let manager = Arc::clone(&self.manager);

        Box::pin(async move {
            let outcome = manager.scope(async move { inner.call(request).await }).await;

            match outcome {
                Ok(response) => Ok(response),
                // The inner service is infallible; only finalization can fail.
                Err(ScopeError::Task(never)) => match never {},
                Err(ScopeError::RollbackFailed { task: never, .. }) => match never {},
                Err(ScopeError::Finalize(error)) => {
                    tracing::error!(
                        error = %error,
                        "session finalization failed after a completed response"
                    );
                    Ok(StatusCode::INTERNAL_SERVER_ERROR.into_response())
                }
            }
        })
    }
}
