//! Callback Dispatch
//!
//! Routes callback and finish frames to the handlers registered for their
//! request id. Frames that arrive before the HTTP response (and therefore
//! before registration) are cached and replayed in arrival order.

use log::{debug, error, warn};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::oneshot;

use super::frames::{FrameKind, PushFrame};

/// Handler for one named callback
pub type Callback = Arc<dyn Fn(Value) + Send + Sync>;

/// Named callbacks for one streamed call.
///
/// Handlers run on the push channel task with the dispatch table locked.
/// They may read client state (`state`, `session_id`, `active_requests`)
/// but must not block or wait on another streamed call. A panicking
/// handler is logged and skipped.
#[derive(Clone, Default)]
pub struct CallbackMap {
    handlers: HashMap<String, Callback>,
}

impl CallbackMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style registration
    pub fn on<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        self.insert(name, handler);
        self
    }

    pub fn insert<F>(&mut self, name: impl Into<String>, handler: F)
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        self.handlers.insert(name.into(), Arc::new(handler));
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    pub fn get(&self, name: &str) -> Option<&Callback> {
        self.handlers.get(name)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for CallbackMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("CallbackMap").field("names", &names).finish()
    }
}

/// What happened to a dispatched frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Handed to this many callbacks
    Delivered(usize),
    /// Request not registered yet, frame kept for replay
    Cached,
    /// Finish frame resolved the request
    Completed,
    /// Frame had no request id or an unexpected type
    Ignored,
}

/// A registered streamed call
struct PendingRequest {
    callbacks: CallbackMap,
    finish: oneshot::Sender<Value>,
}

/// Callback table and early-frame cache for one connection
#[derive(Default)]
pub struct Dispatcher {
    pending: HashMap<String, PendingRequest>,
    cache: HashMap<String, Vec<PushFrame>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register handlers for `request_uuid` and replay cached frames.
    ///
    /// Returns the number of replayed frames.
    pub fn register(
        &mut self,
        request_uuid: &str,
        callbacks: CallbackMap,
        finish: oneshot::Sender<Value>,
    ) -> usize {
        self.pending.insert(
            request_uuid.to_string(),
            PendingRequest { callbacks, finish },
        );

        let cached = self.cache.remove(request_uuid).unwrap_or_default();
        let replayed = cached.len();
        if replayed > 0 {
            debug!("Replaying {} cached frame(s) for {}", replayed, request_uuid);
        }
        for frame in cached {
            self.dispatch(frame);
        }
        replayed
    }

    /// Route one callback or finish frame
    pub fn dispatch(&mut self, frame: PushFrame) -> Delivery {
        let Some(request_uuid) = frame.request_uuid().map(str::to_string) else {
            warn!("Dropping {:?} frame without request_uuid", frame.kind());
            return Delivery::Ignored;
        };

        if !self.pending.contains_key(&request_uuid) {
            return match frame.kind() {
                FrameKind::Callback | FrameKind::Finish => {
                    debug!("Caching {:?} frame for unregistered {}", frame.kind(), request_uuid);
                    self.cache.entry(request_uuid).or_default().push(frame);
                    Delivery::Cached
                }
                _ => Delivery::Ignored,
            };
        }

        match frame.kind() {
            FrameKind::Callback => {
                let Some(pending) = self.pending.get(&request_uuid) else {
                    return Delivery::Ignored;
                };
                let mut delivered = 0;
                for (name, value) in frame.fields() {
                    let Some(handler) = pending.callbacks.get(name) else {
                        continue;
                    };
                    if catch_unwind(AssertUnwindSafe(|| handler(value.clone()))).is_err() {
                        error!("Callback '{}' for {} panicked", name, request_uuid);
                        continue;
                    }
                    delivered += 1;
                }
                debug!("Delivered callback frame for {} to {} handler(s)", request_uuid, delivered);
                Delivery::Delivered(delivered)
            }
            FrameKind::Finish => {
                if let Some(pending) = self.pending.remove(&request_uuid) {
                    debug!("Request {} finished", request_uuid);
                    // Receiver gone means the caller stopped waiting
                    let _ = pending.finish.send(frame.into_value());
                }
                Delivery::Completed
            }
            _ => Delivery::Ignored,
        }
    }

    /// Forget a request and any frames cached for it
    pub fn discard(&mut self, request_uuid: &str) {
        self.pending.remove(request_uuid);
        self.cache.remove(request_uuid);
    }

    /// Drop frames cached for requests that were never registered
    pub fn clear_cache(&mut self) {
        if !self.cache.is_empty() {
            debug!("Discarding cached frames for {} request(s)", self.cache.len());
        }
        self.cache.clear();
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn cached_count(&self, request_uuid: &str) -> usize {
        self.cache.get(request_uuid).map(Vec::len).unwrap_or(0)
    }
}
