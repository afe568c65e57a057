use std::time::Duration;

use tokio::time::Instant;

/// Upper bound used when `now + timeout` does not fit into an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// An absolute point in time after which a blocking wait gives up with a timeout.<br/>
/// 待機を打ち切る絶対時刻。
///
/// Built from a relative `Duration` (measured from now) or from an absolute `Instant`.
/// Uses `tokio::time::Instant`, so paused test clocks apply.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Deadline(Instant);

impl Deadline {
  /// Deadline `timeout` from now.
  pub fn after(timeout: Duration) -> Self {
    let now = Instant::now();
    let at = now
      .checked_add(timeout)
      .unwrap_or_else(|| now + FAR_FUTURE);
    Self(at)
  }

  /// Deadline at the given instant.
  #[inline]
  pub const fn at(instant: Instant) -> Self {
    Self(instant)
  }

  #[inline]
  pub const fn instant(self) -> Instant {
    self.0
  }

  /// Whether the current time has reached this deadline.
  pub fn is_expired(self) -> bool {
    Instant::now() >= self.0
  }

  /// Time left until expiry, zero once expired.
  pub fn remaining(self) -> Duration {
    self.0.saturating_duration_since(Instant::now())
  }
}

impl From<Duration> for Deadline {
  #[inline]
  fn from(value: Duration) -> Self {
    Self::after(value)
  }
}

impl From<Instant> for Deadline {
  #[inline]
  fn from(value: Instant) -> Self {
    Self::at(value)
  }
}

impl From<std::time::Instant> for Deadline {
  #[inline]
  fn from(value: std::time::Instant) -> Self {
    Self::at(Instant::from_std(value))
  }
}

impl From<Deadline> for Instant {
  #[inline]
  fn from(value: Deadline) -> Self {
    value.instant()
  }
}
