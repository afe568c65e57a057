use std::cmp::Ordering;
use std::fmt::Debug;

use async_trait::async_trait;
use thiserror::Error;

use crate::element::Element;
use crate::event_broker::EventBrokerError;
use crate::timing::Deadline;

mod async_queue;
mod removal_strategy;

pub use self::{async_queue::*, removal_strategy::*};

/// An error that occurs when a queue operation fails.<br/>
/// キューの操作に失敗した場合に発生するエラー。
#[derive(Error, Debug, PartialEq)]
pub enum QueueError<E> {
  /// A no-wait retrieval found the queue empty.
  #[error("Failed to get an element: the queue is empty")]
  Empty,
  /// A no-wait insertion found the queue full. The rejected element is handed back.
  #[error("Failed to put an element: the queue is full: {0:?}")]
  Full(E),
  #[error("Failed to complete before the deadline")]
  Timeout,
  #[error("Invalid argument: {0}")]
  InvalidArgument(ArgumentError),
  #[error("The event broker was dropped while waiting")]
  Closed,
}

impl<E> From<EventBrokerError> for QueueError<E> {
  fn from(value: EventBrokerError) -> Self {
    match value {
      EventBrokerError::Timeout => QueueError::Timeout,
      EventBrokerError::Closed => QueueError::Closed,
    }
  }
}

impl<E> From<ArgumentError> for QueueError<E> {
  fn from(value: ArgumentError) -> Self {
    QueueError::InvalidArgument(value)
  }
}

/// Malformed or unsatisfiable request parameters.<br/>
/// 不正、または満たすことのできない要求パラメータ。
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentError {
  #[error("at_least must be 1 or more")]
  AtLeastBelowOne,
  #[error("at_least ({at_least}) cannot be bigger than at_most ({at_most})")]
  AtLeastExceedsAtMost { at_least: usize, at_most: usize },
  #[error("{requested} elements can never fit into a queue of capacity {capacity}")]
  ExceedsCapacity { requested: usize, capacity: usize },
}

/// How a bulk operation moves its batch.<br/>
/// 一括操作におけるバッチの転送方法。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TransferMode {
  /// Waits until the whole batch can be moved, then moves it in one step.<br/>
  /// バッチ全体を転送できるまで待機し、一度に転送する。
  Atomic,
  /// Moves what fits or is available on each pass; other callers may interleave between passes.<br/>
  /// 各パスで可能な分だけ転送する。パスの間に他の呼び出し元の要素が割り込むことがある。
  #[default]
  Incremental,
}

/// The size of the queue.<br/>
/// キューのサイズ。
#[derive(Debug, Clone, Copy, Default, Eq)]
pub enum QueueSize {
  /// The queue has no capacity limit.<br/>
  /// キューに容量制限がない。
  #[default]
  Limitless,
  /// The queue has a capacity limit.<br/>
  /// キューに容量制限がある。
  Limited(usize),
}

impl QueueSize {
  /// Returns whether the queue has no capacity limit.<br/>
  /// キューに容量制限がないかどうかを返します。
  ///
  /// # Return Value / 戻り値
  /// - `true` - If the queue has no capacity limit. / キューに容量制限がない場合。
  /// - `false` - If the queue has a capacity limit. / キューに容量制限がある場合。
  pub fn is_limitless(&self) -> bool {
    matches!(self, QueueSize::Limitless)
  }

  /// Converts to an option type.<br/>
  /// オプション型に変換します。
  ///
  /// # Return Value / 戻り値
  /// - `None` - If the queue has no capacity limit. / キューに容量制限がない場合。
  /// - `Some(num)` - If the queue has a capacity limit. / キューに容量制限がある場合。
  pub fn to_option(&self) -> Option<usize> {
    match self {
      QueueSize::Limitless => None,
      QueueSize::Limited(c) => Some(*c),
    }
  }

  /// Free slots left when `len` elements are stored.<br/>
  /// `len` 個の要素が格納されている場合の空き容量。
  pub fn remaining(&self, len: usize) -> QueueSize {
    match self {
      QueueSize::Limitless => QueueSize::Limitless,
      QueueSize::Limited(c) => QueueSize::Limited(c.saturating_sub(len)),
    }
  }

  /// Whether `n` more elements fit when `len` elements are stored.
  pub fn has_room_for(&self, len: usize, n: usize) -> bool {
    match self.remaining(len) {
      QueueSize::Limitless => true,
      QueueSize::Limited(free) => n <= free,
    }
  }

  /// Whether `len` elements fill the queue. Never true for a limitless queue.
  pub fn is_reached_by(&self, len: usize) -> bool {
    match self {
      QueueSize::Limitless => false,
      QueueSize::Limited(c) => len >= *c,
    }
  }

  /// Fails when a request of `requested` elements can never be satisfied by this capacity.
  pub(crate) fn admit(&self, requested: usize) -> Result<(), ArgumentError> {
    match self.to_option() {
      Some(capacity) if requested > capacity => Err(ArgumentError::ExceedsCapacity { requested, capacity }),
      _ => Ok(()),
    }
  }
}

impl From<Option<usize>> for QueueSize {
  fn from(value: Option<usize>) -> Self {
    match value {
      Some(c) => QueueSize::Limited(c),
      None => QueueSize::Limitless,
    }
  }
}

impl PartialEq<Self> for QueueSize {
  fn eq(&self, other: &Self) -> bool {
    match (self, other) {
      (QueueSize::Limitless, QueueSize::Limitless) => true,
      (QueueSize::Limited(l), QueueSize::Limited(r)) => l == r,
      _ => false,
    }
  }
}

impl PartialOrd<Self> for QueueSize {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    match (self, other) {
      (QueueSize::Limitless, QueueSize::Limitless) => Some(Ordering::Equal),
      (QueueSize::Limitless, _) => Some(Ordering::Greater),
      (_, QueueSize::Limitless) => Some(Ordering::Less),
      (QueueSize::Limited(l), QueueSize::Limited(r)) => l.partial_cmp(r),
    }
  }
}

/// A trait that defines the capacity queries of a queue.<br/>
/// キューの容量に関する問い合わせを定義するトレイト。
#[async_trait]
pub trait QueueBase<E: Element>: Debug + Send + Sync {
  /// Returns the number of elements in this queue.<br/>
  /// このキューの要素数を返します。
  async fn len(&self) -> usize;

  /// Alias of `len`.
  async fn qsize(&self) -> usize {
    self.len().await
  }

  /// Returns the capacity of this queue.<br/>
  /// このキューの最大容量を返します。
  ///
  /// # Return Value / 戻り値
  /// - `QueueSize::Limitless` - If the queue has no capacity limit. / キューに容量制限がない場合。
  /// - `QueueSize::Limited(num)` - If the queue has a capacity limit. / キューに容量制限がある場合。
  fn capacity(&self) -> QueueSize;

  /// Returns whether this queue is empty.<br/>
  /// このキューが空かどうかを返します。
  async fn is_empty(&self) -> bool {
    self.len().await == 0
  }

  /// Returns whether this queue is non-empty.<br/>
  /// このキューが空でないかどうかを返します。
  async fn non_empty(&self) -> bool {
    !self.is_empty().await
  }

  /// Returns whether the queue size has reached its capacity. Always `false` for a limitless queue.<br/>
  /// このキューのサイズが容量まで到達したかどうかを返します。容量制限がない場合は常に `false`。
  async fn is_full(&self) -> bool {
    self.capacity().is_reached_by(self.len().await)
  }

  /// Returns the number of elements that can be inserted without waiting.<br/>
  /// 待機せずに挿入できる要素数を返します。
  async fn remaining_capacity(&self) -> QueueSize {
    self.capacity().remaining(self.len().await)
  }

  /// Returns whether `n` more elements fit right now. Always `true` for a limitless queue.<br/>
  /// 現時点で `n` 個の要素を追加できるかどうかを返します。容量制限がない場合は常に `true`。
  async fn has_room_for(&self, n: usize) -> bool {
    self.capacity().has_room_for(self.len().await, n)
  }
}

#[async_trait]
pub trait QueueWriter<E: Element>: QueueBase<E> {
  /// Inserts the element, waiting for a free slot if the queue is full.<br/>
  /// 要素を挿入します。キューが満杯の場合は空きが生じるまで待機します。
  ///
  /// # Return Value / 戻り値
  /// - `Ok(())` - If the element is inserted. / 要素が挿入された場合。
  /// - `Err(QueueError::InvalidArgument(_))` - If the queue has a capacity of zero. / 容量が 0 の場合。
  async fn put(&self, element: E) -> Result<(), QueueError<E>>;

  /// Like `put`, but gives up at `deadline`. The element is dropped on timeout.<br/>
  /// `put` と同様ですが、`deadline` で待機を打ち切ります。タイムアウト時、要素は破棄されます。
  ///
  /// # Return Value / 戻り値
  /// - `Err(QueueError::Timeout)` - If no slot was freed in time. / 期限内に空きが生じなかった場合。
  async fn put_timeout(&self, element: E, deadline: Deadline) -> Result<(), QueueError<E>>;

  /// Inserts the element only if a slot is free right now.<br/>
  /// 空きがある場合のみ要素を挿入します。
  ///
  /// # Return Value / 戻り値
  /// - `Ok(())` - If the element is inserted. / 要素が挿入された場合。
  /// - `Err(QueueError::Full(element))` - If the queue is full. / キューが満杯の場合。
  async fn put_no_wait(&self, element: E) -> Result<(), QueueError<E>>;

  /// Inserts all elements, either in one step (`Atomic`) or as slots free up (`Incremental`).<br/>
  /// 全要素を挿入します。一度に(`Atomic`)、または空きが生じるたびに(`Incremental`)。
  ///
  /// # Return Value / 戻り値
  /// - `Err(QueueError::InvalidArgument(_))` - If the batch can never fit. / バッチが決して収まらない場合。
  async fn puts(&self, elements: Vec<E>, mode: TransferMode) -> Result<(), QueueError<E>>;

  /// Atomic `puts` that gives up at `deadline`, leaving the queue untouched.<br/>
  /// `deadline` で待機を打ち切るアトミックな `puts`。タイムアウト時、キューは変更されません。
  async fn puts_timeout(&self, elements: Vec<E>, deadline: Deadline) -> Result<(), QueueError<E>>;
}

#[async_trait]
pub trait QueueReader<E: Element>: QueueBase<E> {
  /// Removes and returns one element, waiting while the queue is empty.<br/>
  /// 要素を一つ取り出して返します。キューが空の間は待機します。
  ///
  /// # Return Value / 戻り値
  /// - `Err(QueueError::InvalidArgument(_))` - If the queue has a capacity of zero. / 容量が 0 の場合。
  async fn get(&self) -> Result<E, QueueError<E>>;

  /// Like `get`, but gives up at `deadline`, leaving the queue untouched.<br/>
  /// `get` と同様ですが、`deadline` で待機を打ち切ります。
  ///
  /// # Return Value / 戻り値
  /// - `Err(QueueError::Timeout)` - If no element arrived in time. / 期限内に要素が届かなかった場合。
  async fn get_timeout(&self, deadline: Deadline) -> Result<E, QueueError<E>>;

  /// Removes and returns one element if one is available right now.<br/>
  /// 要素がある場合のみ取り出して返します。
  ///
  /// # Return Value / 戻り値
  /// - `Err(QueueError::Empty)` - If the queue is empty. / キューが空の場合。
  async fn get_no_wait(&self) -> Result<E, QueueError<E>>;

  /// Removes between `at_least` and `at_most` elements (`at_most` defaults to `at_least`).<br/>
  /// `at_least` 以上 `at_most` 以下の要素を取り出します(`at_most` の既定値は `at_least`)。
  ///
  /// # Return Value / 戻り値
  /// - `Err(QueueError::InvalidArgument(_))` - If `at_least < 1`, `at_least > at_most`,
  ///   or an atomic request exceeds the capacity. / 引数が不正な場合。
  async fn gets(&self, at_least: usize, at_most: Option<usize>, mode: TransferMode) -> Result<Vec<E>, QueueError<E>>;

  /// Atomic `gets` that gives up at `deadline`, leaving the queue untouched.<br/>
  /// `deadline` で待機を打ち切るアトミックな `gets`。タイムアウト時、キューは変更されません。
  async fn gets_timeout(
    &self,
    at_least: usize,
    at_most: Option<usize>,
    deadline: Deadline,
  ) -> Result<Vec<E>, QueueError<E>>;
}
