use std::time::Duration;

use futures::StreamExt;
use rstest::*;
use tracing_subscriber::EnvFilter;

use crate::collections::{
  ArgumentError, AsyncQueue, QueueBase, QueueError, QueueReader, QueueSize, QueueWriter, RemovalStrategy,
};
use crate::config_option::ConfigOption;
use crate::element::Element;
use crate::event_broker::EventKind;
use crate::timing::Deadline;

#[derive(Debug, Clone, PartialEq)]
struct TestElement(i32);

impl Element for TestElement {}

fn init_tracing() {
  let _ = tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .try_init();
}

/// Lets every spawned task run until it blocks. Needs a paused clock.
async fn settle() {
  tokio::time::sleep(Duration::from_millis(1)).await;
}

#[rstest]
#[case(RemovalStrategy::Fifo, vec![1, 2, 3, 4])]
#[case(RemovalStrategy::Lifo, vec![4, 3, 2, 1])]
#[tokio::test]
async fn test_removal_order(#[case] removal_strategy: RemovalStrategy, #[case] expected: Vec<i32>) {
  init_tracing();
  let queue = AsyncQueue::new(QueueSize::Limited(4), removal_strategy);
  for i in 1..=4 {
    queue.put(TestElement(i)).await.unwrap();
  }

  let mut actual = vec![];
  for _ in 0..4 {
    actual.push(queue.get().await.unwrap().0);
  }
  assert_eq!(actual, expected);
  assert!(queue.is_empty().await);
}

#[tokio::test]
async fn test_put_no_wait_on_full_queue() {
  let queue = AsyncQueue::fifo(2);
  queue.put_no_wait(TestElement(1)).await.unwrap();
  queue.put_no_wait(TestElement(2)).await.unwrap();

  match queue.put_no_wait(TestElement(3)).await {
    Err(QueueError::Full(TestElement(3))) => (),
    other => panic!("Expected Full, got {:?}", other),
  }
  assert_eq!(queue.to_vec().await, vec![TestElement(1), TestElement(2)]);
}

#[tokio::test]
async fn test_get_no_wait_on_empty_queue() {
  let queue = AsyncQueue::<TestElement>::fifo(2);
  assert_eq!(queue.get_no_wait().await, Err(QueueError::Empty));
  assert_eq!(queue.len().await, 0);

  queue.put(TestElement(7)).await.unwrap();
  assert_eq!(queue.get_no_wait().await, Ok(TestElement(7)));
}

#[tokio::test(start_paused = true)]
async fn test_put_timeout_leaves_queue_unchanged() {
  init_tracing();
  let queue = AsyncQueue::fifo(1);
  queue.put(TestElement(1)).await.unwrap();

  let result = queue
    .put_timeout(TestElement(2), Deadline::after(Duration::from_millis(100)))
    .await;
  assert_eq!(result, Err(QueueError::Timeout));
  assert_eq!(queue.len().await, 1);
  assert_eq!(queue.to_vec().await, vec![TestElement(1)]);
}

#[tokio::test(start_paused = true)]
async fn test_put_timeout_succeeds_when_room_frees_in_time() {
  let queue = AsyncQueue::fifo(1);
  queue.put(TestElement(1)).await.unwrap();

  let producer = {
    let queue = queue.clone();
    tokio::spawn(async move {
      queue
        .put_timeout(TestElement(2), Deadline::after(Duration::from_secs(1)))
        .await
    })
  };
  settle().await;
  assert_eq!(queue.get().await.unwrap(), TestElement(1));

  assert_eq!(producer.await.unwrap(), Ok(()));
  assert_eq!(queue.to_vec().await, vec![TestElement(2)]);
}

#[tokio::test(start_paused = true)]
async fn test_get_timeout_on_empty_queue() {
  let queue = AsyncQueue::<TestElement>::fifo(3);
  let result = queue.get_timeout(Deadline::after(Duration::from_millis(10))).await;
  assert_eq!(result, Err(QueueError::Timeout));
  assert!(queue.is_empty().await);
}

#[tokio::test(start_paused = true)]
async fn test_blocked_put_completes_after_get() {
  init_tracing();
  // capacity = 2, FIFO: put(1), put(2), put(3) は待機、get() で 1 を取り出すと put(3) が完了する
  let queue = AsyncQueue::fifo(2);
  queue.put(TestElement(1)).await.unwrap();
  queue.put(TestElement(2)).await.unwrap();

  let producer = {
    let queue = queue.clone();
    tokio::spawn(async move { queue.put(TestElement(3)).await })
  };
  settle().await;
  assert!(!producer.is_finished());
  assert_eq!(queue.len().await, 2);

  assert_eq!(queue.get().await.unwrap(), TestElement(1));
  assert_eq!(producer.await.unwrap(), Ok(()));
  assert_eq!(queue.to_vec().await, vec![TestElement(2), TestElement(3)]);
}

#[tokio::test(start_paused = true)]
async fn test_blocked_get_completes_after_put() {
  let queue = AsyncQueue::<TestElement>::unbounded(RemovalStrategy::Lifo);
  let consumer = {
    let queue = queue.clone();
    tokio::spawn(async move { queue.get().await })
  };
  settle().await;
  assert!(!consumer.is_finished());

  queue.put(TestElement(42)).await.unwrap();
  assert_eq!(consumer.await.unwrap(), Ok(TestElement(42)));
}

#[tokio::test(start_paused = true)]
async fn test_full_event_fires_once_per_transition() {
  let queue = AsyncQueue::fifo(2);
  let waiter = queue.waiter(EventKind::Full);

  queue.put(TestElement(1)).await.unwrap();
  assert_eq!(queue.event_broker().waiter_count(EventKind::Full), 1);

  queue.put(TestElement(2)).await.unwrap();
  assert_eq!(queue.event_broker().waiter_count(EventKind::Full), 0);
  assert_eq!(waiter.wait(None).await, Ok(()));

  // 満杯のままでは再発火しない
  let late = queue.waiter(EventKind::Full);
  assert_eq!(queue.put_no_wait(TestElement(3)).await, Err(QueueError::Full(TestElement(3))));
  assert_eq!(
    late.wait(Some(Deadline::after(Duration::from_millis(10)))).await,
    Err(crate::event_broker::EventBrokerError::Timeout)
  );
}

#[tokio::test(start_paused = true)]
async fn test_empty_event_fires_when_drained() {
  let queue = AsyncQueue::with_elements(
    vec![TestElement(1), TestElement(2)],
    QueueSize::Limitless,
    RemovalStrategy::Fifo,
  );
  let observer = {
    let queue = queue.clone();
    tokio::spawn(async move { queue.wait_for(EventKind::Empty, None).await })
  };
  settle().await;

  queue.get().await.unwrap();
  settle().await;
  assert!(!observer.is_finished());

  queue.get_no_wait().await.unwrap();
  assert_eq!(observer.await.unwrap(), Ok(()));
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_times_out() {
  let queue = AsyncQueue::<TestElement>::fifo(1);
  let result = queue
    .wait_for(EventKind::Full, Some(Deadline::after(Duration::from_millis(20))))
    .await;
  assert_eq!(result, Err(QueueError::Timeout));
  assert_eq!(queue.event_broker().waiter_count(EventKind::Full), 0);
}

#[tokio::test]
async fn test_unbounded_capacity_predicates() {
  let queue = AsyncQueue::with_elements(0..10u32, QueueSize::Limitless, RemovalStrategy::Fifo);
  assert_eq!(queue.capacity(), QueueSize::Limitless);
  assert!(!queue.is_full().await);
  assert!(queue.has_room_for(usize::MAX).await);
  assert_eq!(queue.remaining_capacity().await, QueueSize::Limitless);
  assert_eq!(queue.qsize().await, 10);
}

#[rstest]
#[case(0, false, true, 3)]
#[case(2, false, false, 1)]
#[case(3, true, false, 0)]
#[tokio::test]
async fn test_bounded_capacity_predicates(
  #[case] len: u32,
  #[case] full: bool,
  #[case] empty: bool,
  #[case] free: usize,
) {
  let queue = AsyncQueue::with_elements(0..len, QueueSize::Limited(3), RemovalStrategy::Fifo);
  assert_eq!(queue.is_full().await, full);
  assert_eq!(queue.is_empty().await, empty);
  assert_eq!(queue.non_empty().await, !empty);
  assert_eq!(queue.remaining_capacity().await, QueueSize::Limited(free));
  assert!(queue.has_room_for(free).await);
  assert!(!queue.has_room_for(free + 1).await);
}

#[tokio::test]
async fn test_zero_capacity_queue() {
  let queue = AsyncQueue::fifo(0);
  assert!(queue.is_full().await);
  assert_eq!(
    queue.put(TestElement(1)).await,
    Err(QueueError::InvalidArgument(ArgumentError::ExceedsCapacity {
      requested: 1,
      capacity: 0
    }))
  );
  assert_eq!(queue.put_no_wait(TestElement(1)).await, Err(QueueError::Full(TestElement(1))));
}

#[tokio::test]
async fn test_initial_elements_keep_the_newest() {
  let queue = AsyncQueue::with_elements(1..=5, QueueSize::Limited(3), RemovalStrategy::Fifo);
  assert_eq!(queue.to_vec().await, vec![3, 4, 5]);
  assert!(queue.is_full().await);
}

#[tokio::test(start_paused = true)]
async fn test_clear_wakes_blocked_producer() {
  let queue = AsyncQueue::fifo(1);
  queue.put(TestElement(1)).await.unwrap();
  let producer = {
    let queue = queue.clone();
    tokio::spawn(async move { queue.put(TestElement(2)).await })
  };
  settle().await;

  queue.clear().await;
  assert_eq!(producer.await.unwrap(), Ok(()));
  assert_eq!(queue.to_vec().await, vec![TestElement(2)]);
}

#[tokio::test]
async fn test_copy_is_independent() {
  let queue = AsyncQueue::lifo(4);
  queue.put(TestElement(1)).await.unwrap();
  queue.put(TestElement(2)).await.unwrap();

  let copied = queue.copy().await;
  copied.put(TestElement(3)).await.unwrap();

  assert_eq!(queue.len().await, 2);
  assert_eq!(copied.len().await, 3);
  assert_eq!(copied.capacity(), QueueSize::Limited(4));
  assert_eq!(copied.removal_strategy(), RemovalStrategy::Lifo);
  assert_eq!(copied.get().await.unwrap(), TestElement(3));
}

#[tokio::test]
async fn test_clone_shares_the_buffer() {
  let queue = AsyncQueue::fifo(4);
  let handle = queue.clone();
  handle.put(TestElement(1)).await.unwrap();
  assert_eq!(queue.get().await.unwrap(), TestElement(1));
}

#[tokio::test]
async fn test_count_contains_and_element_at() {
  let queue = AsyncQueue::with_elements(vec!["a", "b", "a", "c"], QueueSize::Limitless, RemovalStrategy::Lifo);
  assert_eq!(queue.count(&"a").await, 2);
  assert_eq!(queue.count(&"z").await, 0);
  assert!(queue.contains(&"c").await);
  assert!(!queue.contains(&"z").await);
  assert_eq!(queue.element_at(0).await, Some("a"));
  assert_eq!(queue.element_at(3).await, Some("c"));
  assert_eq!(queue.element_at(4).await, None);
}

#[tokio::test]
async fn test_stream_yields_elements_in_removal_order() {
  let queue = AsyncQueue::with_elements(1..=3, QueueSize::Limited(3), RemovalStrategy::Fifo);
  let collected = queue.stream().take(3).collect::<Vec<_>>().await;
  assert_eq!(collected, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_from_options() {
  let queue = AsyncQueue::<TestElement>::from_options([
    ConfigOption::with_name("jobs"),
    ConfigOption::with_capacity(5),
    ConfigOption::with_removal_strategy(RemovalStrategy::Lifo),
  ]);
  assert_eq!(queue.name(), "jobs");
  assert_eq!(queue.capacity(), QueueSize::Limited(5));
  assert_eq!(queue.removal_strategy(), RemovalStrategy::Lifo);

  let debug = format!("{:?}", queue);
  assert!(debug.contains("jobs"));
  assert!(debug.contains("Limited(5)"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_producers_and_consumers() {
  init_tracing();
  let queue = AsyncQueue::<TestElement>::fifo(8);
  let mut producers = vec![];
  let mut consumers = vec![];

  for p in 0..4 {
    let queue = queue.clone();
    producers.push(tokio::spawn(async move {
      for i in 0..100 {
        queue.put(TestElement(p * 100 + i)).await.unwrap();
        assert!(queue.len().await <= 8);
      }
    }));
  }
  for _ in 0..2 {
    let queue = queue.clone();
    consumers.push(tokio::spawn(async move {
      let mut received = vec![];
      for _ in 0..200 {
        received.push(queue.get().await.unwrap().0);
      }
      received
    }));
  }

  for producer in producers {
    producer.await.unwrap();
  }
  let mut all = vec![];
  for consumer in consumers {
    all.extend(consumer.await.unwrap());
  }
  all.sort();
  assert_eq!(all, (0..400).collect::<Vec<_>>());
  assert!(queue.is_empty().await);
}
