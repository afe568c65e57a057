use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::oneshot;

use crate::timing::Deadline;


/// A capacity-state transition observers can wait for.<br/>
/// 監視者が待機できる容量状態の遷移。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
  /// The queue length reached its capacity.<br/>
  /// キューの長さが容量に到達した。
  Full,
  /// The queue was drained to zero elements.<br/>
  /// キューの要素数が 0 になった。
  Empty,
}

impl Display for EventKind {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      EventKind::Full => write!(f, "full"),
      EventKind::Empty => write!(f, "empty"),
    }
  }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventBrokerError {
  #[error("event wait: timeout")]
  Timeout,
  #[error("event wait: broker dropped")]
  Closed,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct WaiterId(u64);

#[derive(Debug)]
struct WaiterSlot {
  id: WaiterId,
  sender: oneshot::Sender<()>,
}

type Registry = DashMap<EventKind, Vec<WaiterSlot>>;

/// Registry of one-shot waiters keyed by `EventKind`, owned by a single queue.<br/>
/// `EventKind` ごとのワンショット待機者のレジストリ。キューごとに一つ保持される。
///
/// Registration and dispatch both go through the shard lock of the kind's entry, so a waiter
/// registered concurrently with a dispatch is either completed by it or stays registered for the
/// next one.
#[derive(Debug, Default)]
pub struct EventBroker {
  registry: Arc<Registry>,
  next_id: AtomicU64,
}

impl EventBroker {
  pub fn new() -> Self {
    Self::default()
  }

  /// Registers a waiter for `kind` right away. Await it with `EventWaiter::wait`.
  pub fn waiter(&self, kind: EventKind) -> EventWaiter {
    let id = WaiterId(self.next_id.fetch_add(1, Ordering::Relaxed));
    let (sender, receiver) = oneshot::channel();
    self.registry.entry(kind).or_default().push(WaiterSlot { id, sender });
    tracing::trace!("EventBroker::waiter: registered: kind = {}, id = {:?}", kind, id);
    EventWaiter {
      id,
      kind,
      receiver,
      registry: Arc::downgrade(&self.registry),
    }
  }

  /// Waits until `kind` is dispatched or `deadline` passes.
  pub async fn wait_for(&self, kind: EventKind, deadline: Option<Deadline>) -> Result<(), EventBrokerError> {
    self.waiter(kind).wait(deadline).await
  }

  /// Completes every waiter registered for `kind` and clears the list. Returns the number woken.
  pub fn dispatch(&self, kind: EventKind) -> usize {
    let slots = match self.registry.remove(&kind) {
      Some((_, slots)) => slots,
      None => return 0,
    };
    let mut woken = 0;
    for slot in slots {
      if slot.sender.send(()).is_ok() {
        woken += 1;
      }
    }
    tracing::debug!("EventBroker::dispatch: kind = {}, woken = {}", kind, woken);
    woken
  }

  pub fn waiter_count(&self, kind: EventKind) -> usize {
    self.registry.get(&kind).map(|slots| slots.len()).unwrap_or(0)
  }
}

/// A registered one-shot waiter. Dropping it before it fires removes it from the broker.<br/>
/// 登録済みのワンショット待機者。発火前に破棄するとブローカーから削除される。
#[derive(Debug)]
pub struct EventWaiter {
  id: WaiterId,
  kind: EventKind,
  receiver: oneshot::Receiver<()>,
  registry: Weak<Registry>,
}

impl EventWaiter {
  pub fn id(&self) -> WaiterId {
    self.id
  }

  pub fn kind(&self) -> EventKind {
    self.kind
  }

  /// Waits for the dispatch, giving up at `deadline` if one is given.
  ///
  /// A dispatch that has already taken this waiter when the deadline passes still counts as
  /// delivered, so `dispatch` never counts a waiter whose caller saw `Timeout`.
  pub async fn wait(mut self, deadline: Option<Deadline>) -> Result<(), EventBrokerError> {
    let deadline = match deadline {
      None => return (&mut self.receiver).await.map_err(|_| EventBrokerError::Closed),
      Some(deadline) => deadline,
    };
    if let Ok(received) = tokio::time::timeout_at(deadline.instant(), &mut self.receiver).await {
      return received.map_err(|_| EventBrokerError::Closed);
    }
    if self.deregister() {
      tracing::debug!(
        "EventWaiter::wait: timed out: kind = {}, id = {:?}",
        self.kind,
        self.id
      );
      return Err(EventBrokerError::Timeout);
    }
    // The slot is gone: a dispatch owns the sender, or the broker was dropped.
    (&mut self.receiver).await.map_err(|_| EventBrokerError::Closed)
  }

  /// Removes this waiter's slot. Returns whether it was still registered.
  fn deregister(&self) -> bool {
    let registry = match self.registry.upgrade() {
      Some(registry) => registry,
      None => return false,
    };
    let removed = match registry.get_mut(&self.kind) {
      Some(mut slots) => {
        let before = slots.len();
        slots.retain(|slot| slot.id != self.id);
        slots.len() != before
      }
      None => false,
    };
    removed
  }
}

impl Drop for EventWaiter {
  fn drop(&mut self) {
    self.deregister();
  }
}
