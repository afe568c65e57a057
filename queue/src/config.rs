use crate::collections::{QueueSize, RemovalStrategy};
use crate::config_option::ConfigOption;

#[derive(Debug, Clone, PartialEq)]
pub struct QueueConfig {
  /// Appears in every log line the queue emits.
  pub name: String,
  pub capacity: QueueSize,
  pub removal_strategy: RemovalStrategy,
}

impl Default for QueueConfig {
  fn default() -> Self {
    QueueConfig {
      name: "async-queue".to_string(),
      capacity: QueueSize::Limitless,
      removal_strategy: RemovalStrategy::Fifo,
    }
  }
}

impl QueueConfig {
  pub fn from(options: impl IntoIterator<Item = ConfigOption>) -> QueueConfig {
    let mut config = QueueConfig::default();
    for option in options {
      option.apply(&mut config);
    }
    config
  }
}
