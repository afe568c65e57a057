use crate::collections::{QueueSize, RemovalStrategy};
use crate::config::QueueConfig;

#[derive(Debug, Clone)]
pub enum ConfigOption {
  SetName(String),
  SetCapacity(QueueSize),
  SetRemovalStrategy(RemovalStrategy),
}

impl ConfigOption {
  pub fn apply(&self, config: &mut QueueConfig) {
    match self {
      ConfigOption::SetName(name) => {
        config.name = name.clone();
      }
      ConfigOption::SetCapacity(capacity) => {
        config.capacity = *capacity;
      }
      ConfigOption::SetRemovalStrategy(removal_strategy) => {
        config.removal_strategy = *removal_strategy;
      }
    }
  }

  pub fn with_name(name: impl Into<String>) -> ConfigOption {
    ConfigOption::SetName(name.into())
  }

  pub fn with_capacity(capacity: usize) -> ConfigOption {
    ConfigOption::SetCapacity(QueueSize::Limited(capacity))
  }

  pub fn with_unbounded() -> ConfigOption {
    ConfigOption::SetCapacity(QueueSize::Limitless)
  }

  pub fn with_removal_strategy(removal_strategy: RemovalStrategy) -> ConfigOption {
    ConfigOption::SetRemovalStrategy(removal_strategy)
  }
}
