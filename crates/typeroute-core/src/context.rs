//! Per-request invocation context.

use http::Extensions;
use tokio::sync::watch;
use uuid::Uuid;

/// Invocation context handed to handlers and custom parsers.
///
/// Carries the request id, an optional cancellation signal and typed
/// extensions supplied by the host framework.
#[derive(Debug, Clone)]
pub struct Context {
    request_id: Uuid,
    cancel: Option<watch::Receiver<bool>>,
    extensions: Extensions,
}

/// Cancels the [`Context`] it was created with.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl Context {
    /// A context with a fresh request id and no cancellation signal.
    pub fn new() -> Self {
        Self {
            request_id: Uuid::new_v4(),
            cancel: None,
            extensions: Extensions::new(),
        }
    }

    /// A context that aborts the handler once the returned handle fires.
    pub fn with_cancellation() -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        let mut ctx = Self::new();
        ctx.cancel = Some(rx);
        (ctx, CancelHandle { tx })
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn with_request_id(mut self, request_id: Uuid) -> Self {
        self.request_id = request_id;
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().map(|rx| *rx.borrow()).unwrap_or(false)
    }

    /// Resolves once the context is cancelled. Never resolves for contexts
    /// without a cancellation signal or whose handle was dropped.
    pub async fn cancelled(&self) {
        let Some(mut rx) = self.cancel.clone() else {
            return std::future::pending().await;
        };
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                return std::future::pending().await;
            }
        }
    }

    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    /// Typed extension lookup.
    pub fn get<T: Clone + Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions.get::<T>()
    }

    pub fn insert<T: Clone + Send + Sync + 'static>(&mut self, value: T) -> Option<T> {
        self.extensions.insert(value)
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn cancellation_resolves_waiters() {
        let (ctx, handle) = Context::with_cancellation();
        assert!(!ctx.is_cancelled());

        let waiter = {
            let ctx = ctx.clone();
            tokio::spawn(async move { ctx.cancelled().await })
        };
        handle.cancel();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should finish")
            .unwrap();
        assert!(ctx.is_cancelled());
    }

    #[tokio::test]
    async fn plain_context_never_cancels() {
        let ctx = Context::new();
        let result = tokio::time::timeout(Duration::from_millis(20), ctx.cancelled()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn dropped_handle_does_not_cancel() {
        let (ctx, handle) = Context::with_cancellation();
        drop(handle);
        let result = tokio::time::timeout(Duration::from_millis(20), ctx.cancelled()).await;
        assert!(result.is_err());
        assert!(!ctx.is_cancelled());
    }

    #[test]
    fn extensions_are_typed() {
        #[derive(Clone, Debug, PartialEq)]
        struct Tenant(&'static str);

        let mut ctx = Context::new();
        ctx.insert(Tenant("acme"));
        assert_eq!(ctx.get::<Tenant>(), Some(&Tenant("acme")));
        assert!(ctx.get::<u32>().is_none());
    }
}
