// src/transport/dispatch.rs

//! Inbound frame routing.
//!
//! The [`Dispatcher`] is the piece of a transport that turns a stream of
//! decoded inbound frames back into answers for waiting callers:
//!
//! - `result` frames complete the call registered under their `id`
//! - `ready` frames complete every subscription acknowledgement in `subs`
//! - `nosub` frames complete the call registered under their `id` (failed
//!   subscription or unsubscribe reply) and drop that id's push handler
//! - `connected` / `failed` frames complete the handshake
//! - `changed` / `added` / `removed` frames are pushed to the handler
//!   registered under their `id`; failing that, to the handler bound to
//!   their `(collection, fields.eventName)` stream
//!
//! Anything else (`ping`, `updated`, unknown kinds) is ignored. Heartbeats are
//! the connection owner's business.
//!
//! ## Concurrency
//!
//! Registries are guarded by short-lived mutexes. Push handlers are always
//! invoked after the registry lock has been released, so a handler may itself
//! issue calls through the same transport.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use serde_json::Value;
use tokio::sync::oneshot;

use crate::{
    // ---
    log_debug,
    log_trace,
    CorrelationId,
    PushHandler,
    Response,
    Result,
    RpcError,
};

/// Acquire a mutex guard, intentionally ignoring poisoning.
///
/// The protected state is a set of independent registry entries; a panic in
/// another task can at worst leave one caller unanswered.
fn lock_ignore_poison<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    // ---
    match m.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

type PendingMap = HashMap<CorrelationId, oneshot::Sender<Response>>;

/// `(collection, eventName)` pair a stream push frame carries.
type StreamKey = (String, String);

/// Registry of waiting calls and active subscriptions for one connection.
#[derive(Default)]
pub struct Dispatcher {
    pending: Mutex<PendingMap>,
    handshake: Mutex<Option<oneshot::Sender<Response>>>,
    subscriptions: Mutex<HashMap<CorrelationId, PushHandler>>,
    streams: Mutex<HashMap<StreamKey, CorrelationId>>,
    closed: AtomicBool,
}

impl Dispatcher {
    // ---
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(RpcError::ConnectionLost)
        } else {
            Ok(())
        }
    }

    /// Register a call waiting for the frame correlated by `id`.
    ///
    /// Returns a receiver that is completed with that frame, or closed when
    /// the dispatcher is closed.
    ///
    /// # Errors
    ///
    /// `RpcError::ConnectionLost` once the dispatcher is closed.
    pub fn register_call(&self, id: CorrelationId) -> Result<oneshot::Receiver<Response>> {
        // ---
        self.ensure_open()?;
        let (tx, rx) = oneshot::channel();
        lock_ignore_poison(&self.pending).insert(id, tx);
        Ok(rx)
    }

    /// Register the pending handshake, replacing any earlier one.
    ///
    /// # Errors
    ///
    /// `RpcError::ConnectionLost` once the dispatcher is closed.
    pub fn register_handshake(&self) -> Result<oneshot::Receiver<Response>> {
        // ---
        self.ensure_open()?;
        let (tx, rx) = oneshot::channel();
        *lock_ignore_poison(&self.handshake) = Some(tx);
        Ok(rx)
    }

    /// Register `handler` for push frames carrying `id`.
    ///
    /// # Errors
    ///
    /// `RpcError::ConnectionLost` once the dispatcher is closed.
    pub fn register_subscription(&self, id: CorrelationId, handler: PushHandler) -> Result<()> {
        // ---
        self.ensure_open()?;
        lock_ignore_poison(&self.subscriptions).insert(id, handler);
        Ok(())
    }

    /// Drop a pending call without answering it.
    pub fn forget_call(&self, id: &CorrelationId) -> bool {
        lock_ignore_poison(&self.pending).remove(id).is_some()
    }

    /// Drop a push handler.
    pub fn remove_subscription(&self, id: &CorrelationId) -> bool {
        // ---
        lock_ignore_poison(&self.streams).retain(|_, bound| bound != id);
        lock_ignore_poison(&self.subscriptions).remove(id).is_some()
    }

    /// Bind the stream `(collection, event_name)` to subscription `id`.
    ///
    /// Servers publish stream events with a placeholder frame `id`; such
    /// frames are routed through this binding instead.
    ///
    /// # Errors
    ///
    /// `RpcError::ConnectionLost` once the dispatcher is closed.
    pub fn bind_stream(
        &self,
        id: CorrelationId,
        collection: impl Into<String>,
        event_name: impl Into<String>,
    ) -> Result<()> {
        // ---
        self.ensure_open()?;
        lock_ignore_poison(&self.streams).insert((collection.into(), event_name.into()), id);
        Ok(())
    }

    fn push_handler(&self, id: Option<&CorrelationId>, frame: &Response) -> Option<PushHandler> {
        // ---
        let by_id = id.and_then(|id| lock_ignore_poison(&self.subscriptions).get(id).cloned());
        if by_id.is_some() {
            return by_id;
        }

        let key = (
            frame.get_str(&["collection"])?.to_owned(),
            frame.get_str(&["fields", "eventName"])?.to_owned(),
        );
        let bound = lock_ignore_poison(&self.streams).get(&key).cloned()?;
        lock_ignore_poison(&self.subscriptions).get(&bound).cloned()
    }

    /// Number of calls waiting for a response.
    pub fn pending_len(&self) -> usize {
        lock_ignore_poison(&self.pending).len()
    }

    /// Number of registered push handlers.
    pub fn subscription_len(&self) -> usize {
        lock_ignore_poison(&self.subscriptions).len()
    }

    /// Route one inbound frame.
    ///
    /// Returns `true` when the frame reached a waiting call or a handler.
    pub fn dispatch(&self, frame: Response) -> bool {
        // ---
        log_trace!("inbound {}", frame.content());

        let id = frame.get_str(&["id"]).map(CorrelationId::from);

        match (frame.msg(), id) {
            (Some("result"), Some(id)) => self.complete(&id, frame),

            (Some("ready"), _) => {
                let subs: Vec<CorrelationId> = frame
                    .get_field(&["subs"])
                    .and_then(Value::as_array)
                    .map(|subs| {
                        subs.iter()
                            .filter_map(Value::as_str)
                            .map(CorrelationId::from)
                            .collect()
                    })
                    .unwrap_or_default();

                let mut delivered = false;
                for id in &subs {
                    delivered |= self.complete(id, frame.clone());
                }
                delivered
            }

            (Some("nosub"), Some(id)) => {
                let removed = self.remove_subscription(&id);
                self.complete(&id, frame) || removed
            }

            (Some("connected" | "failed"), _) => {
                let tx = lock_ignore_poison(&self.handshake).take();
                match tx {
                    Some(tx) => tx.send(frame).is_ok(),
                    None => {
                        log_debug!("handshake reply without a pending connect");
                        false
                    }
                }
            }

            (Some("changed" | "added" | "removed"), id) => {
                match self.push_handler(id.as_ref(), &frame) {
                    Some(handler) => {
                        handler(frame);
                        true
                    }
                    None => {
                        log_debug!("push frame for unknown subscription {id:?}");
                        false
                    }
                }
            }

            (kind, _) => {
                log_debug!("ignoring inbound frame of kind {kind:?}");
                false
            }
        }
    }

    fn complete(&self, id: &CorrelationId, frame: Response) -> bool {
        // ---
        let tx = lock_ignore_poison(&self.pending).remove(id);

        match tx {
            Some(tx) => {
                if tx.send(frame).is_err() {
                    log_debug!("response arrived after call was abandoned (id: {id})");
                    return false;
                }
                true
            }
            None => {
                log_debug!("no pending call for id: {id}");
                false
            }
        }
    }

    /// Fail every waiting call and drop every handler.
    ///
    /// Receivers handed out earlier observe a closed channel, which
    /// transports report as `RpcError::ConnectionLost`.
    pub fn close(&self) {
        // ---
        self.closed.store(true, Ordering::Release);

        let abandoned = {
            let mut pending = lock_ignore_poison(&self.pending);
            let count = pending.len();
            pending.clear();
            count
        };
        lock_ignore_poison(&self.handshake).take();
        lock_ignore_poison(&self.subscriptions).clear();
        lock_ignore_poison(&self.streams).clear();

        log_debug!("dispatcher closed, {abandoned} pending call(s) abandoned");
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    fn counting_handler() -> (Arc<AtomicUsize>, PushHandler) {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        let handler: PushHandler = Arc::new(move |_frame| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        (count, handler)
    }

    #[test]
    fn test_result_completes_matching_call() {
        // ---
        let dispatcher = Dispatcher::new();
        let mut first = dispatcher.register_call("1".into()).unwrap();
        let mut second = dispatcher.register_call("2".into()).unwrap();
        assert_eq!(dispatcher.pending_len(), 2);

        // Out of order on purpose.
        assert!(dispatcher.dispatch(json!({"msg": "result", "id": "2", "result": 2}).into()));
        assert!(dispatcher.dispatch(json!({"msg": "result", "id": "1", "result": 1}).into()));

        assert_eq!(first.try_recv().unwrap().get_field(&["result"]), Some(&json!(1)));
        assert_eq!(second.try_recv().unwrap().get_field(&["result"]), Some(&json!(2)));
        assert_eq!(dispatcher.pending_len(), 0);
    }

    #[test]
    fn test_unknown_result_is_ignored() {
        // ---
        let dispatcher = Dispatcher::new();
        assert!(!dispatcher.dispatch(json!({"msg": "result", "id": "9"}).into()));
        assert!(!dispatcher.dispatch(json!({"msg": "ping"}).into()));
        assert!(!dispatcher.dispatch(json!({"no": "msg"}).into()));
    }

    #[test]
    fn test_ready_completes_every_listed_sub() {
        // ---
        let dispatcher = Dispatcher::new();
        let mut a = dispatcher.register_call("a".into()).unwrap();
        let mut b = dispatcher.register_call("b".into()).unwrap();

        assert!(dispatcher.dispatch(json!({"msg": "ready", "subs": ["a", "b"]}).into()));
        assert_eq!(a.try_recv().unwrap().msg(), Some("ready"));
        assert_eq!(b.try_recv().unwrap().msg(), Some("ready"));
    }

    #[test]
    fn test_push_frames_reach_their_handler_only() {
        // ---
        let dispatcher = Dispatcher::new();
        let (count_a, handler_a) = counting_handler();
        let (count_b, handler_b) = counting_handler();
        dispatcher.register_subscription("a".into(), handler_a).unwrap();
        dispatcher.register_subscription("b".into(), handler_b).unwrap();

        for _ in 0..3 {
            dispatcher.dispatch(json!({"msg": "changed", "id": "a", "fields": {}}).into());
        }
        dispatcher.dispatch(json!({"msg": "added", "id": "b"}).into());
        dispatcher.dispatch(json!({"msg": "changed", "id": "zzz"}).into());

        assert_eq!(count_a.load(Ordering::SeqCst), 3);
        assert_eq!(count_b.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stream_frames_route_by_collection_and_event() {
        // ---
        let dispatcher = Dispatcher::new();
        let (count, handler) = counting_handler();
        dispatcher.register_subscription("7".into(), handler).unwrap();
        dispatcher
            .bind_stream("7".into(), "stream-room-messages", "GENERAL")
            .unwrap();

        let frame = |event: &str| {
            json!({
                "msg": "changed",
                "collection": "stream-room-messages",
                "id": "id",
                "fields": { "eventName": event, "args": [] },
            })
        };

        assert!(dispatcher.dispatch(frame("GENERAL").into()));
        assert!(!dispatcher.dispatch(frame("random").into()));
        assert_eq!(count.load(Ordering::SeqCst), 1);

        dispatcher.remove_subscription(&"7".into());
        assert!(!dispatcher.dispatch(frame("GENERAL").into()));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_nosub_drops_handler_and_answers_call() {
        // ---
        let dispatcher = Dispatcher::new();
        let (count, handler) = counting_handler();
        dispatcher.register_subscription("s".into(), handler).unwrap();
        let mut rx = dispatcher.register_call("s".into()).unwrap();

        assert!(dispatcher.dispatch(json!({"msg": "nosub", "id": "s"}).into()));
        assert_eq!(rx.try_recv().unwrap().msg(), Some("nosub"));
        assert_eq!(dispatcher.subscription_len(), 0);

        dispatcher.dispatch(json!({"msg": "changed", "id": "s"}).into());
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_handshake() {
        // ---
        let dispatcher = Dispatcher::new();
        assert!(!dispatcher.dispatch(json!({"msg": "connected", "session": "x"}).into()));

        let mut rx = dispatcher.register_handshake().unwrap();
        assert!(dispatcher.dispatch(json!({"msg": "connected", "session": "x"}).into()));
        assert_eq!(rx.try_recv().unwrap().get_str(&["session"]), Some("x"));
    }

    #[test]
    fn test_close_fails_pending_and_rejects_new() {
        // ---
        let dispatcher = Dispatcher::new();
        let mut rx = dispatcher.register_call("1".into()).unwrap();
        let (_count, handler) = counting_handler();
        dispatcher.register_subscription("2".into(), handler.clone()).unwrap();

        dispatcher.close();

        assert!(rx.try_recv().is_err());
        assert_eq!(dispatcher.subscription_len(), 0);
        assert!(matches!(
            dispatcher.register_call("3".into()),
            Err(RpcError::ConnectionLost)
        ));
        assert!(matches!(
            dispatcher.register_subscription("4".into(), handler),
            Err(RpcError::ConnectionLost)
        ));
    }
}
