use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use rtvi_client_types::{ErrorResponse, RtviMessageInbound, RtviMessageOutbound};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::error::{Result, RtviError};
use crate::http::HttpMessageDispatcher;
use crate::promise::{Pending, Promise};
use crate::transport::Transport;

struct QueuedMessage {
    message: RtviMessageOutbound,
    enqueued_at: Instant,
    promise: Promise<RtviMessageInbound>,
}

struct DispatcherInner {
    transport: Arc<dyn Transport>,
    http: Option<Arc<HttpMessageDispatcher>>,
    queue: Mutex<Vec<QueuedMessage>>,
    timeout: Duration,
}

impl DispatcherInner {
    fn queue(&self) -> MutexGuard<'_, Vec<QueuedMessage>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn take(&self, id: &str) -> Option<QueuedMessage> {
        let mut queue = self.queue();
        let index = queue.iter().position(|q| q.message.id() == id)?;
        Some(queue.remove(index))
    }

    fn collect_garbage(&self) {
        let now = Instant::now();
        let expired: Vec<QueuedMessage> = {
            let mut queue = self.queue();
            let (expired, alive): (Vec<_>, Vec<_>) = queue
                .drain(..)
                .partition(|q| now.duration_since(q.enqueued_at) >= self.timeout);
            *queue = alive;
            expired
        };

        for queued in expired {
            tracing::warn!(
                "request timed out: {}, id={}",
                queued.message.message_type(),
                queued.message.id()
            );
            queued.promise.reject(RtviError::ResponseTimeout);
        }
    }
}

/// Correlates outbound requests with their responses.
///
/// Every dispatched request waits in a queue until a response with the same
/// id arrives or until it has waited longer than the response timeout. A
/// background task sweeps the queue at a fixed interval and stops when the
/// dispatcher is dropped.
pub struct MessageDispatcher {
    inner: Arc<DispatcherInner>,
    gc: JoinHandle<()>,
}

impl MessageDispatcher {
    /// Must be called from within a Tokio runtime.
    pub fn new(
        transport: Arc<dyn Transport>,
        http: Option<Arc<HttpMessageDispatcher>>,
        timeout: Duration,
        gc_interval: Duration,
    ) -> Self {
        let inner = Arc::new(DispatcherInner {
            transport,
            http,
            queue: Mutex::new(Vec::new()),
            timeout,
        });

        let weak: Weak<DispatcherInner> = Arc::downgrade(&inner);
        let gc = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(gc_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match weak.upgrade() {
                    Some(inner) => inner.collect_garbage(),
                    None => break,
                }
            }
        });

        Self { inner, gc }
    }

    /// Queues `message` and sends it, returning a future for its response.
    ///
    /// Uses the transport while it is connected and the HTTP fallback
    /// otherwise. A failed send leaves nothing behind in the queue.
    pub fn dispatch(&self, message: RtviMessageOutbound) -> Result<Pending<RtviMessageInbound>> {
        let id = message.id().to_string();
        let (promise, pending) = Promise::new();
        {
            let mut queue = self.inner.queue();
            if queue.iter().any(|q| q.message.id() == id) {
                return Err(RtviError::other(format!(
                    "a request with id {} is already pending",
                    id
                )));
            }
            queue.push(QueuedMessage {
                message: message.clone(),
                enqueued_at: Instant::now(),
                promise,
            });
        }
        tracing::debug!("dispatching request: {}, id={}", message.message_type(), id);

        if let Err(e) = self.send(&message) {
            tracing::error!("failed to send message: {}", e);
            self.inner.take(&id);
            return Err(e);
        }
        Ok(pending)
    }

    /// Dispatches `message` and waits for its response.
    pub async fn dispatch_async(&self, message: RtviMessageOutbound) -> Result<RtviMessageInbound> {
        self.dispatch(message)?.await
    }

    fn send(&self, message: &RtviMessageOutbound) -> Result<()> {
        if self.inner.transport.is_connected() {
            self.inner.transport.send_message(message)
        } else if let Some(http) = &self.inner.http {
            http.send_message(message)
        } else {
            Err(RtviError::FallbackNotSupported)
        }
    }

    /// Settles the request matching `message` with it. Returns `false` when
    /// no request with that id is pending.
    pub fn resolve(&self, message: &RtviMessageInbound) -> bool {
        let Some(queued) = message.id().and_then(|id| self.inner.take(id)) else {
            return false;
        };
        queued.promise.resolve(message.clone())
    }

    /// Fails the request matching `message` with the error it carries.
    /// Returns `false` when no request with that id is pending.
    pub fn reject(&self, message: &RtviMessageInbound) -> bool {
        let Some(queued) = message.id().and_then(|id| self.inner.take(id)) else {
            return false;
        };
        let error = match message.decode_data::<ErrorResponse>() {
            Ok(response) => RtviError::BotResponse {
                message: format!("Received error response from backend: {}", response.error()),
            },
            Err(_) => RtviError::BotResponse {
                message: "Received error response from backend.".to_string(),
            },
        };
        queued.promise.reject(error)
    }

    pub fn pending_count(&self) -> usize {
        self.inner.queue().len()
    }

    pub fn is_pending(&self, id: &str) -> bool {
        self.inner.queue().iter().any(|q| q.message.id() == id)
    }
}

impl Drop for MessageDispatcher {
    fn drop(&mut self) {
        self.gc.abort();
    }
}
