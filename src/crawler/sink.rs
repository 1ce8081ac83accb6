//! Output sinks for navigation results
//!
//! Workers push finished results from many threads at once, so every sink
//! must be `Send + Sync` and pushing must never block for long.

use crate::crawler::NavigationResult;
use std::sync::{mpsc, Arc, Mutex, PoisonError};
use tokio::sync::mpsc::UnboundedSender;

/// Destination for finished navigation results
pub trait ResultSink<P>: Send + Sync + 'static {
    /// Hands a result over to the sink
    ///
    /// Ownership of the result (and its page) moves to the sink.
    fn push(&self, result: NavigationResult<P>);
}

impl<P: Send + 'static> ResultSink<P> for UnboundedSender<NavigationResult<P>> {
    fn push(&self, result: NavigationResult<P>) {
        if let Err(err) = self.send(result) {
            tracing::warn!(
                url = %err.0.request.url(),
                "Result receiver dropped, discarding result"
            );
        }
    }
}

impl<P: Send + 'static> ResultSink<P> for mpsc::Sender<NavigationResult<P>> {
    fn push(&self, result: NavigationResult<P>) {
        if let Err(err) = self.send(result) {
            tracing::warn!(
                url = %err.0.request.url(),
                "Result receiver dropped, discarding result"
            );
        }
    }
}

impl<P: Send + 'static> ResultSink<P> for Mutex<Vec<NavigationResult<P>>> {
    fn push(&self, result: NavigationResult<P>) {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(result);
    }
}

impl<P, S> ResultSink<P> for Arc<S>
where
    S: ResultSink<P> + ?Sized,
{
    fn push(&self, result: NavigationResult<P>) {
        (**self).push(result);
    }
}
