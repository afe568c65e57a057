use std::collections::VecDeque;
use std::fmt::{Display, Formatter};

/// Selects the end of the buffer an element is removed from.<br/>
/// 要素をバッファのどちら側から取り出すかを選択する。
///
/// Elements are always appended at the back; only removal differs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum RemovalStrategy {
  /// Oldest element first.<br/>
  /// 最も古い要素から取り出す。
  #[default]
  Fifo,
  /// Newest element first.<br/>
  /// 最も新しい要素から取り出す。
  Lifo,
}

impl RemovalStrategy {
  pub(crate) fn take<E>(&self, buffer: &mut VecDeque<E>) -> Option<E> {
    match self {
      RemovalStrategy::Fifo => buffer.pop_front(),
      RemovalStrategy::Lifo => buffer.pop_back(),
    }
  }

  /// Removes up to `n` elements in removal order.
  pub(crate) fn take_up_to<E>(&self, buffer: &mut VecDeque<E>, n: usize) -> Vec<E> {
    let n = n.min(buffer.len());
    match self {
      RemovalStrategy::Fifo => buffer.drain(..n).collect(),
      RemovalStrategy::Lifo => {
        let start = buffer.len() - n;
        buffer.drain(start..).rev().collect()
      }
    }
  }
}

impl Display for RemovalStrategy {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      RemovalStrategy::Fifo => write!(f, "fifo"),
      RemovalStrategy::Lifo => write!(f, "lifo"),
    }
  }
}
