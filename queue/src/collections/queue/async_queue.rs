use std::collections::VecDeque;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, Stream};
use tokio::sync::{Mutex, MutexGuard};
use tokio_condvar::Condvar;

use crate::collections::{
  ArgumentError, QueueBase, QueueError, QueueReader, QueueSize, QueueWriter, RemovalStrategy, TransferMode,
};
use crate::config::QueueConfig;
use crate::config_option::ConfigOption;
use crate::element::Element;
use crate::event_broker::{EventBroker, EventKind, EventWaiter};
use crate::timing::Deadline;

#[cfg(test)]
mod tests;


type Buffer<'a, E> = MutexGuard<'a, VecDeque<E>>;

/// A bounded or unbounded async queue shared between producer and consumer tasks.<br/>
/// プロデューサーとコンシューマーのタスク間で共有される、容量制限の有無を選べる非同期キュー。
///
/// Cloning yields another handle to the same queue. Use [`AsyncQueue::copy`] for an independent
/// queue holding the same elements.
///
/// Waiting tasks are woken through condition variables whenever the buffer changes. No ordering
/// is guaranteed among tasks waiting on the same condition.
pub struct AsyncQueue<E> {
  inner: Arc<Inner<E>>,
}

struct Inner<E> {
  buffer: Mutex<VecDeque<E>>,
  name: String,
  capacity: QueueSize,
  removal_strategy: RemovalStrategy,
  not_full: Condvar,
  not_empty: Condvar,
  broker: EventBroker,
}

impl<E> Clone for AsyncQueue<E> {
  fn clone(&self) -> Self {
    Self {
      inner: self.inner.clone(),
    }
  }
}

impl<E: Debug> Debug for AsyncQueue<E> {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("AsyncQueue")
      .field("name", &self.inner.name)
      .field("capacity", &self.inner.capacity)
      .field("removal_strategy", &self.inner.removal_strategy)
      .field("buffer", &self.inner.buffer)
      .finish()
  }
}

impl<E: Element> Inner<E> {
  async fn wait_on<'a>(
    &self,
    op: &'static str,
    condvar: &Condvar,
    buffer: Buffer<'a, E>,
    deadline: Option<Deadline>,
  ) -> Result<Buffer<'a, E>, QueueError<E>> {
    tracing::debug!(
      "AsyncQueue::{}: waiting: name = {}, len = {}",
      op,
      self.name,
      buffer.len()
    );
    let deadline = match deadline {
      None => return Ok(condvar.wait(buffer).await),
      Some(deadline) => deadline,
    };
    if deadline.is_expired() {
      tracing::debug!("AsyncQueue::{}: timed out: name = {}", op, self.name);
      return Err(QueueError::Timeout);
    }
    match tokio::time::timeout_at(deadline.instant(), condvar.wait(buffer)).await {
      Ok(buffer) => Ok(buffer),
      Err(_) => {
        tracing::debug!("AsyncQueue::{}: timed out: name = {}", op, self.name);
        Err(QueueError::Timeout)
      }
    }
  }

  async fn wait_not_full<'a>(
    &self,
    op: &'static str,
    buffer: Buffer<'a, E>,
    deadline: Option<Deadline>,
  ) -> Result<Buffer<'a, E>, QueueError<E>> {
    self.wait_on(op, &self.not_full, buffer, deadline).await
  }

  async fn wait_not_empty<'a>(
    &self,
    op: &'static str,
    buffer: Buffer<'a, E>,
    deadline: Option<Deadline>,
  ) -> Result<Buffer<'a, E>, QueueError<E>> {
    self.wait_on(op, &self.not_empty, buffer, deadline).await
  }

  /// Appends in one step. Dispatches Full if the step fills the queue.
  fn push_all(&self, buffer: &mut VecDeque<E>, elements: impl IntoIterator<Item = E>) {
    let before = buffer.len();
    buffer.extend(elements);
    let added = buffer.len() - before;
    if added == 0 {
      return;
    }
    tracing::trace!(
      "AsyncQueue::push: name = {}, added = {}, len = {}",
      self.name,
      added,
      buffer.len()
    );
    self.not_empty.notify_all();
    if self.capacity.is_reached_by(buffer.len()) {
      self.broker.dispatch(EventKind::Full);
    }
  }

  fn take_one(&self, buffer: &mut VecDeque<E>) -> Option<E> {
    let element = self.removal_strategy.take(buffer)?;
    self.removed(buffer.len(), 1);
    Some(element)
  }

  /// Removes up to `n` in one step. Dispatches Empty if the step drains the queue.
  fn take_up_to(&self, buffer: &mut VecDeque<E>, n: usize) -> Vec<E> {
    let taken = self.removal_strategy.take_up_to(buffer, n);
    if !taken.is_empty() {
      self.removed(buffer.len(), taken.len());
    }
    taken
  }

  fn removed(&self, len: usize, removed: usize) {
    tracing::trace!(
      "AsyncQueue::take: name = {}, removed = {}, len = {}",
      self.name,
      removed,
      len
    );
    self.not_full.notify_all();
    if len == 0 {
      self.broker.dispatch(EventKind::Empty);
    }
  }
}

/// Validates `gets` bounds and resolves the default `at_most`.
fn bulk_bounds(at_least: usize, at_most: Option<usize>) -> Result<usize, ArgumentError> {
  if at_least < 1 {
    return Err(ArgumentError::AtLeastBelowOne);
  }
  let at_most = at_most.unwrap_or(at_least);
  if at_least > at_most {
    return Err(ArgumentError::AtLeastExceedsAtMost { at_least, at_most });
  }
  Ok(at_most)
}

impl<E: Element> AsyncQueue<E> {
  pub fn new(capacity: QueueSize, removal_strategy: RemovalStrategy) -> Self {
    Self::with_config(QueueConfig {
      capacity,
      removal_strategy,
      ..QueueConfig::default()
    })
  }

  /// Bounded FIFO queue.
  pub fn fifo(capacity: usize) -> Self {
    Self::new(QueueSize::Limited(capacity), RemovalStrategy::Fifo)
  }

  /// Bounded LIFO queue.
  pub fn lifo(capacity: usize) -> Self {
    Self::new(QueueSize::Limited(capacity), RemovalStrategy::Lifo)
  }

  pub fn unbounded(removal_strategy: RemovalStrategy) -> Self {
    Self::new(QueueSize::Limitless, removal_strategy)
  }

  pub fn from_options(options: impl IntoIterator<Item = ConfigOption>) -> Self {
    Self::with_config(QueueConfig::from(options))
  }

  pub fn with_config(config: QueueConfig) -> Self {
    Self::with_elements_and_config(std::iter::empty(), config)
  }

  /// Creates a queue pre-filled with `elements` in insertion order.
  ///
  /// When more elements than `capacity` are given, only the newest `capacity` are kept.
  pub fn with_elements(
    elements: impl IntoIterator<Item = E>,
    capacity: QueueSize,
    removal_strategy: RemovalStrategy,
  ) -> Self {
    Self::with_elements_and_config(
      elements,
      QueueConfig {
        capacity,
        removal_strategy,
        ..QueueConfig::default()
      },
    )
  }

  pub fn with_elements_and_config(elements: impl IntoIterator<Item = E>, config: QueueConfig) -> Self {
    let mut buffer = elements.into_iter().collect::<VecDeque<_>>();
    if let QueueSize::Limited(capacity) = config.capacity {
      let excess = buffer.len().saturating_sub(capacity);
      buffer.drain(..excess);
    }
    Self {
      inner: Arc::new(Inner {
        buffer: Mutex::new(buffer),
        name: config.name,
        capacity: config.capacity,
        removal_strategy: config.removal_strategy,
        not_full: Condvar::new(),
        not_empty: Condvar::new(),
        broker: EventBroker::new(),
      }),
    }
  }

  pub fn name(&self) -> &str {
    &self.inner.name
  }

  pub fn removal_strategy(&self) -> RemovalStrategy {
    self.inner.removal_strategy
  }

  pub fn event_broker(&self) -> &EventBroker {
    &self.inner.broker
  }

  /// Registers a waiter for `kind` without waiting yet.
  ///
  /// Register before triggering the transition yourself so the dispatch cannot be missed.
  pub fn waiter(&self, kind: EventKind) -> EventWaiter {
    self.inner.broker.waiter(kind)
  }

  /// Waits until this queue next becomes full or empty, as selected by `kind`.<br/>
  /// このキューが次に満杯、または空になるまで待機します。
  ///
  /// # Return Value / 戻り値
  /// - `Ok(())` - If the event fired. / イベントが発火した場合。
  /// - `Err(QueueError::Timeout)` - If `deadline` passed first. / 先に期限に達した場合。
  pub async fn wait_for(&self, kind: EventKind, deadline: Option<Deadline>) -> Result<(), QueueError<E>> {
    Ok(self.inner.broker.wait_for(kind, deadline).await?)
  }

  /// Removes every element. Blocked producers are woken; no event is dispatched.
  pub async fn clear(&self) {
    let mut buffer = self.inner.buffer.lock().await;
    let cleared = buffer.len();
    buffer.clear();
    if cleared > 0 {
      tracing::debug!("AsyncQueue::clear: name = {}, cleared = {}", self.inner.name, cleared);
      self.inner.not_full.notify_all();
    }
  }

  pub async fn count(&self, element: &E) -> usize
  where
    E: PartialEq, {
    let buffer = self.inner.buffer.lock().await;
    buffer.iter().filter(|e| *e == element).count()
  }

  pub async fn contains(&self, element: &E) -> bool
  where
    E: PartialEq, {
    let buffer = self.inner.buffer.lock().await;
    buffer.contains(element)
  }

  /// Clones the element at `index`, counted from the oldest.
  pub async fn element_at(&self, index: usize) -> Option<E>
  where
    E: Clone, {
    let buffer = self.inner.buffer.lock().await;
    buffer.get(index).cloned()
  }

  /// Snapshot of the elements, oldest first.
  pub async fn to_vec(&self) -> Vec<E>
  where
    E: Clone, {
    let buffer = self.inner.buffer.lock().await;
    buffer.iter().cloned().collect()
  }

  /// Independent queue with the same configuration and a shallow copy of the elements.
  ///
  /// Waiters registered on this queue are not carried over.
  pub async fn copy(&self) -> Self
  where
    E: Clone, {
    let buffer = self.inner.buffer.lock().await;
    Self::with_elements_and_config(
      buffer.iter().cloned(),
      QueueConfig {
        name: self.inner.name.clone(),
        capacity: self.inner.capacity,
        removal_strategy: self.inner.removal_strategy,
      },
    )
  }

  /// Endless stream of `get` results.
  pub fn stream(&self) -> impl Stream<Item = E> + Send + 'static {
    stream::unfold(self.clone(), |queue| async move {
      let result = queue.get().await;
      result.ok().map(|element| (element, queue))
    })
  }

  async fn put_until(&self, element: E, deadline: Option<Deadline>) -> Result<(), QueueError<E>> {
    let inner = &self.inner;
    inner.capacity.admit(1)?;
    let mut buffer = inner.buffer.lock().await;
    while !inner.capacity.has_room_for(buffer.len(), 1) {
      buffer = inner.wait_not_full("put", buffer, deadline).await?;
    }
    inner.push_all(&mut buffer, std::iter::once(element));
    Ok(())
  }

  async fn puts_atomic(&self, elements: Vec<E>, deadline: Option<Deadline>) -> Result<(), QueueError<E>> {
    if elements.is_empty() {
      return Ok(());
    }
    let inner = &self.inner;
    inner.capacity.admit(elements.len())?;
    let mut buffer = inner.buffer.lock().await;
    while !inner.capacity.has_room_for(buffer.len(), elements.len()) {
      buffer = inner.wait_not_full("puts", buffer, deadline).await?;
    }
    inner.push_all(&mut buffer, elements);
    Ok(())
  }

  async fn puts_incremental(&self, elements: Vec<E>) -> Result<(), QueueError<E>> {
    if elements.is_empty() {
      return Ok(());
    }
    let inner = &self.inner;
    inner.capacity.admit(1)?;
    let mut pending = VecDeque::from(elements);
    let mut buffer = inner.buffer.lock().await;
    loop {
      let n = match inner.capacity.remaining(buffer.len()) {
        QueueSize::Limitless => pending.len(),
        QueueSize::Limited(free) => free.min(pending.len()),
      };
      inner.push_all(&mut buffer, pending.drain(..n));
      if pending.is_empty() {
        return Ok(());
      }
      buffer = inner.wait_not_full("puts", buffer, None).await?;
    }
  }

  async fn get_until(&self, deadline: Option<Deadline>) -> Result<E, QueueError<E>> {
    let inner = &self.inner;
    inner.capacity.admit(1)?;
    let mut buffer = inner.buffer.lock().await;
    loop {
      if let Some(element) = inner.take_one(&mut buffer) {
        return Ok(element);
      }
      buffer = inner.wait_not_empty("get", buffer, deadline).await?;
    }
  }

  async fn gets_atomic(
    &self,
    at_least: usize,
    at_most: usize,
    deadline: Option<Deadline>,
  ) -> Result<Vec<E>, QueueError<E>> {
    let inner = &self.inner;
    inner.capacity.admit(at_least)?;
    let mut buffer = inner.buffer.lock().await;
    while buffer.len() < at_least {
      buffer = inner.wait_not_empty("gets", buffer, deadline).await?;
    }
    Ok(inner.take_up_to(&mut buffer, at_most))
  }

  async fn gets_incremental(&self, at_least: usize, at_most: usize) -> Result<Vec<E>, QueueError<E>> {
    let inner = &self.inner;
    inner.capacity.admit(1)?;
    let mut collected = Vec::with_capacity(at_least);
    let mut buffer = inner.buffer.lock().await;
    loop {
      collected.extend(inner.take_up_to(&mut buffer, at_least - collected.len()));
      if collected.len() >= at_least {
        break;
      }
      buffer = inner.wait_not_empty("gets", buffer, None).await?;
    }
    // Producers get one more pass before the top-up, which never waits.
    drop(buffer);
    tokio::task::yield_now().await;
    let mut buffer = inner.buffer.lock().await;
    collected.extend(inner.take_up_to(&mut buffer, at_most - collected.len()));
    Ok(collected)
  }
}

#[async_trait]
impl<E: Element> QueueBase<E> for AsyncQueue<E> {
  async fn len(&self) -> usize {
    self.inner.buffer.lock().await.len()
  }

  fn capacity(&self) -> QueueSize {
    self.inner.capacity
  }
}

#[async_trait]
impl<E: Element> QueueWriter<E> for AsyncQueue<E> {
  async fn put(&self, element: E) -> Result<(), QueueError<E>> {
    self.put_until(element, None).await
  }

  async fn put_timeout(&self, element: E, deadline: Deadline) -> Result<(), QueueError<E>> {
    self.put_until(element, Some(deadline)).await
  }

  async fn put_no_wait(&self, element: E) -> Result<(), QueueError<E>> {
    let inner = &self.inner;
    let mut buffer = inner.buffer.lock().await;
    if !inner.capacity.has_room_for(buffer.len(), 1) {
      return Err(QueueError::Full(element));
    }
    inner.push_all(&mut buffer, std::iter::once(element));
    Ok(())
  }

  async fn puts(&self, elements: Vec<E>, mode: TransferMode) -> Result<(), QueueError<E>> {
    match mode {
      TransferMode::Atomic => self.puts_atomic(elements, None).await,
      TransferMode::Incremental => self.puts_incremental(elements).await,
    }
  }

  async fn puts_timeout(&self, elements: Vec<E>, deadline: Deadline) -> Result<(), QueueError<E>> {
    self.puts_atomic(elements, Some(deadline)).await
  }
}

#[async_trait]
impl<E: Element> QueueReader<E> for AsyncQueue<E> {
  async fn get(&self) -> Result<E, QueueError<E>> {
    self.get_until(None).await
  }

  async fn get_timeout(&self, deadline: Deadline) -> Result<E, QueueError<E>> {
    self.get_until(Some(deadline)).await
  }

  async fn get_no_wait(&self) -> Result<E, QueueError<E>> {
    let inner = &self.inner;
    let mut buffer = inner.buffer.lock().await;
    inner.take_one(&mut buffer).ok_or(QueueError::Empty)
  }

  async fn gets(&self, at_least: usize, at_most: Option<usize>, mode: TransferMode) -> Result<Vec<E>, QueueError<E>> {
    let at_most = bulk_bounds(at_least, at_most)?;
    if at_most == 1 {
      return self.get_until(None).await.map(|element| vec![element]);
    }
    match mode {
      TransferMode::Atomic => self.gets_atomic(at_least, at_most, None).await,
      TransferMode::Incremental => self.gets_incremental(at_least, at_most).await,
    }
  }

  async fn gets_timeout(
    &self,
    at_least: usize,
    at_most: Option<usize>,
    deadline: Deadline,
  ) -> Result<Vec<E>, QueueError<E>> {
    let at_most = bulk_bounds(at_least, at_most)?;
    if at_most == 1 {
      return self.get_until(Some(deadline)).await.map(|element| vec![element]);
    }
    self.gets_atomic(at_least, at_most, Some(deadline)).await
  }
}
