//! Async lifecycle signals.
//!
//! Named channels carrying a document payload to asynchronous handlers.
//! Handlers run in registration order and delivery awaits every handler
//! ("send and await all"), so a save that fires `pre_save` does not proceed
//! until all pre-save handlers finish.

use futures::future::BoxFuture;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

/// Keyword arguments forwarded to every handler of one delivery.
pub type SignalKwargs = HashMap<String, serde_json::Value>;

type Handler<T> = Arc<dyn Fn(Arc<T>, Arc<SignalKwargs>) -> BoxFuture<'static, ()> + Send + Sync>;

/// A named signal channel for payloads of type `T`.
pub struct Signal<T> {
    name: String,
    handlers: RwLock<Vec<Handler<T>>>,
}

impl<T: Send + Sync + 'static> Signal<T> {
    /// Creates a channel with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            handlers: RwLock::new(Vec::new()),
        }
    }

    /// Returns the channel name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registers an async handler. Handlers fire in registration order.
    pub fn connect<F, Fut>(&self, handler: F)
    where
        F: Fn(Arc<T>, Arc<SignalKwargs>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handler: Handler<T> =
            Arc::new(move |payload, kwargs| Box::pin(handler(payload, kwargs)));
        self.handlers.write().push(handler);
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.handlers.read().len()
    }

    /// Sends the payload with no keyword arguments.
    pub async fn send(&self, payload: Arc<T>) {
        self.send_with(payload, SignalKwargs::new()).await;
    }

    /// Sends the payload, awaiting every handler in registration order.
    pub async fn send_with(&self, payload: Arc<T>, kwargs: SignalKwargs) {
        let handlers: Vec<Handler<T>> = self.handlers.read().clone();
        if handlers.is_empty() {
            return;
        }
        debug!(signal = %self.name, handlers = handlers.len(), "dispatching signal");
        let kwargs = Arc::new(kwargs);
        for handler in handlers {
            handler(payload.clone(), kwargs.clone()).await;
        }
    }
}

/// The pre/post-save channel pair for one schema type.
pub struct DocumentSignals<T> {
    /// Fired before the document is written.
    pub pre_save: Signal<T>,
    /// Fired after the document is written.
    pub post_save: Signal<T>,
}

impl<T: Send + Sync + 'static> DocumentSignals<T> {
    /// Creates the channel pair.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pre_save: Signal::new("pre_save"),
            post_save: Signal::new("post_save"),
        }
    }
}

impl<T: Send + Sync + 'static> Default for DocumentSignals<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[tokio::test]
    async fn test_handlers_run_in_registration_order() {
        let signal: Signal<String> = Signal::new("pre_save");
        let calls = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let calls = calls.clone();
            signal.connect(move |payload: Arc<String>, _| {
                let calls = calls.clone();
                async move {
                    calls.lock().push(format!("{tag}:{payload}"));
                }
            });
        }
        assert_eq!(signal.receiver_count(), 3);

        signal.send(Arc::new("doc".to_string())).await;
        assert_eq!(
            *calls.lock(),
            vec!["first:doc", "second:doc", "third:doc"]
        );
    }

    #[tokio::test]
    async fn test_send_awaits_every_handler() {
        let signal: Signal<()> = Signal::new("post_save");
        let done = Arc::new(Mutex::new(0));

        for _ in 0..2 {
            let done = done.clone();
            signal.connect(move |_, _| {
                let done = done.clone();
                async move {
                    tokio::task::yield_now().await;
                    *done.lock() += 1;
                }
            });
        }

        signal.send(Arc::new(())).await;
        // Both handlers completed before send returned.
        assert_eq!(*done.lock(), 2);
    }

    #[tokio::test]
    async fn test_kwargs_reach_handlers() {
        let signal: Signal<()> = Signal::new("pre_save");
        let seen = Arc::new(Mutex::new(None));
        {
            let seen = seen.clone();
            signal.connect(move |_, kwargs: Arc<SignalKwargs>| {
                let seen = seen.clone();
                async move {
                    *seen.lock() = kwargs.get("created").cloned();
                }
            });
        }

        let mut kwargs = SignalKwargs::new();
        kwargs.insert("created".to_string(), serde_json::Value::Bool(true));
        signal.send_with(Arc::new(()), kwargs).await;
        assert_eq!(*seen.lock(), Some(serde_json::Value::Bool(true)));
    }

    #[tokio::test]
    async fn test_send_with_no_handlers_is_noop() {
        let signal: Signal<u32> = Signal::new("pre_save");
        signal.send(Arc::new(7)).await;
    }
}
