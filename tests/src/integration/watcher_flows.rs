//! # Watcher Flows
//!
//! `ChainWatcher` (dn-02) driving a `ConfirmationPipeline` (dn-01) that
//! publishes into the bus, over mocked chain transports.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use dn_01_confirmation::{ConfirmationConfig, ConfirmationPipeline, ConfirmationSink};
    use dn_02_chain_watcher::{
        ChainClient, ChainWatcher, CheckpointStore, JsonCheckpointStore, MockChainClient,
        PollingFeed, SubscriptionFeed, TimeoutChainClient, WatcherConfig,
    };
    use shared_bus::{EventFilter, EventPublisher, InMemoryEventBus, Subscription};
    use shared_types::{ChainId, EventId};
    use tokio::sync::watch;
    use tokio::time::{sleep, timeout, Instant};

    use crate::integration::deposit_log;

    const POLL: Duration = Duration::from_millis(500);

    struct Setup {
        bus: Arc<InMemoryEventBus>,
        pipeline: Arc<ConfirmationPipeline>,
        sub: Subscription,
    }

    fn setup(chain: &str, depth: u64) -> Setup {
        let bus = Arc::new(InMemoryEventBus::new());
        let publisher: Arc<dyn EventPublisher> = bus.clone();
        let pipeline = Arc::new(ConfirmationPipeline::new(
            ConfirmationConfig::new(ChainId::new(chain), depth),
            publisher,
        ));
        let sub = bus.subscribe(EventFilter::all());
        Setup { bus, pipeline, sub }
    }

    fn config(depth: u64) -> WatcherConfig {
        WatcherConfig {
            required_depth: depth,
            start_height: Some(1),
            ..WatcherConfig::default()
        }
    }

    fn event_id(tag: u8) -> EventId {
        EventId::from_tx(&[tag; 32], 0)
    }

    async fn next_id(sub: &mut Subscription) -> EventId {
        timeout(Duration::from_secs(30), sub.recv())
            .await
            .expect("timed out waiting for delivery")
            .expect("bus closed")
            .event
            .id()
            .clone()
    }

    async fn wait_for_height(pipeline: &ConfirmationPipeline, height: u64) {
        timeout(Duration::from_secs(30), async {
            while pipeline.latest_height().await < Some(height) {
                sleep(Duration::from_millis(50)).await;
            }
        })
        .await
        .expect("watcher did not reach height");
    }

    /// Transport fails on 3 consecutive ticks, then succeeds: nothing is lost
    /// and processing starts at the first successful tick.
    #[tokio::test(start_paused = true)]
    async fn test_transport_failures_then_recovery() {
        let mut s = setup("bitcoin", 6);
        let mock = Arc::new(MockChainClient::new(ChainId::new("bitcoin")));
        mock.push_block(vec![deposit_log(0xA1)]);
        mock.extend(5);
        mock.fail_next_height_calls(3);

        let client: Arc<dyn ChainClient> = mock.clone();
        let feed = Box::new(PollingFeed::new(Arc::clone(&client), POLL));
        let sink: Arc<dyn ConfirmationSink> = s.pipeline.clone();
        let watcher = ChainWatcher::new(client, feed, sink, config(6));

        let (tx, rx) = watch::channel(false);
        let start = Instant::now();
        let task = tokio::spawn(watcher.run(rx));

        assert_eq!(next_id(&mut s.sub).await, event_id(0xA1));
        // Ticks at 0, 500 and 1000 ms failed
        assert!(start.elapsed() >= Duration::from_millis(1500));

        tx.send(true).unwrap();
        let stats = task.await.unwrap();
        assert_eq!(stats.skipped_signals, 3);
        assert_eq!(stats.last_processed, Some(6));
        assert_eq!(stats.blocks_processed, 6);
        assert!(s.sub.try_recv().unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_transport_is_bounded_by_timeout() {
        let mut s = setup("bitcoin", 2);
        let mock = Arc::new(MockChainClient::new(ChainId::new("bitcoin")));
        mock.push_block(vec![deposit_log(0xB2)]);
        mock.extend(1);
        mock.set_latency(Duration::from_secs(10));

        let client: Arc<dyn ChainClient> = Arc::new(TimeoutChainClient::new(
            mock.clone(),
            Duration::from_secs(3),
        ));
        let feed = Box::new(PollingFeed::new(Arc::clone(&client), POLL));
        let sink: Arc<dyn ConfirmationSink> = s.pipeline.clone();
        let watcher = ChainWatcher::new(client, feed, sink, config(2));

        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(watcher.run(rx));

        sleep(Duration::from_secs(7)).await;
        assert_eq!(s.pipeline.latest_height().await, None);

        mock.set_latency(Duration::ZERO);
        assert_eq!(next_id(&mut s.sub).await, event_id(0xB2));

        tx.send(true).unwrap();
        let stats = task.await.unwrap();
        assert!(stats.skipped_signals >= 2);
    }

    /// An unconfirmed event on a replaced branch is never delivered; events
    /// on the new branch are.
    #[tokio::test]
    async fn test_reorg_discards_orphaned_event() {
        let mut s = setup("bitcoin", 4);
        let mock = Arc::new(MockChainClient::new(ChainId::new("bitcoin")));
        mock.push_block(vec![deposit_log(0xAA)]);
        mock.extend(1);

        let client: Arc<dyn ChainClient> = mock.clone();
        let feed = Box::new(PollingFeed::new(Arc::clone(&client), POLL));
        let sink: Arc<dyn ConfirmationSink> = s.pipeline.clone();
        let mut watcher = ChainWatcher::new(client, feed, sink, config(4));
        let (_tx, rx) = watch::channel(false);

        watcher.catch_up(2, &rx).await;
        assert_eq!(s.pipeline.pending_len().await, 1);

        // Blocks 1 and 2 are replaced by a longer branch without the deposit
        let tip = mock.fork_at(1, 4);
        watcher.catch_up(tip, &rx).await;
        assert_eq!(s.pipeline.pending_len().await, 0);
        assert_eq!(watcher.last_processed(), Some(4));

        mock.push_block(vec![deposit_log(0xBB)]);
        mock.extend(3);
        watcher.catch_up(mock.tip(), &rx).await;

        assert_eq!(next_id(&mut s.sub).await, event_id(0xBB));
        assert!(s.sub.try_recv().unwrap().is_none());
        assert_eq!(s.bus.last_seq(&ChainId::new("bitcoin")), 1);
    }

    /// Head stream drops; the feed polls while reconnecting so no block is
    /// skipped, then resumes on the stream.
    #[tokio::test(start_paused = true)]
    async fn test_subscription_outage_loses_nothing() {
        let mut s = setup("spectrum", 2);
        let mock = Arc::new(MockChainClient::with_subscription(ChainId::new("spectrum")));
        mock.push_block(vec![deposit_log(0x01)]);
        mock.extend(1);

        let client: Arc<dyn ChainClient> = mock.clone();
        let feed = Box::new(SubscriptionFeed::new(Arc::clone(&client), POLL));
        let sink: Arc<dyn ConfirmationSink> = s.pipeline.clone();
        let watcher = ChainWatcher::new(client, feed, sink, config(2));

        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(watcher.run(rx));
        assert_eq!(next_id(&mut s.sub).await, event_id(0x01));

        // Outage: stream ends and the next two reconnects fail
        mock.fail_next_subscribes(2);
        mock.close_head_stream();
        mock.push_block(vec![deposit_log(0x02)]);
        mock.extend(1);
        assert_eq!(next_id(&mut s.sub).await, event_id(0x02));

        timeout(Duration::from_secs(30), async {
            while mock.subscribe_calls() < 4 {
                sleep(Duration::from_millis(100)).await;
            }
        })
        .await
        .unwrap();

        mock.push_block(vec![deposit_log(0x03)]);
        mock.extend(1);
        assert_eq!(next_id(&mut s.sub).await, event_id(0x03));
        wait_for_height(&s.pipeline, 6).await;

        tx.send(true).unwrap();
        let stats = task.await.unwrap();
        assert_eq!(stats.last_processed, Some(6));
        assert_eq!(s.bus.last_seq(&ChainId::new("spectrum")), 3);
    }

    /// A notary that was down while the chain grew by more than the required
    /// depth still delivers the deposit that was pending when it stopped.
    #[tokio::test(start_paused = true)]
    async fn test_restart_after_long_outage_delivers_pending() {
        let dir = std::env::temp_dir().join(format!("dn-restart-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let chain = ChainId::new("bitcoin");
        let mock = Arc::new(MockChainClient::new(chain.clone()));
        mock.extend(99);
        mock.push_block(vec![deposit_log(0xD0)]); // 100
        let config = WatcherConfig {
            required_depth: 6,
            ..WatcherConfig::default()
        };

        // First run: processes 94..=100, deposit still pending
        let mut s = setup("bitcoin", 6);
        let client: Arc<dyn ChainClient> = mock.clone();
        let feed = Box::new(PollingFeed::new(Arc::clone(&client), POLL));
        let sink: Arc<dyn ConfirmationSink> = s.pipeline.clone();
        let watcher = ChainWatcher::new(Arc::clone(&client), feed, sink, config.clone())
            .with_checkpoints(Arc::new(JsonCheckpointStore::new(&dir)));
        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(watcher.run(rx));
        wait_for_height(&s.pipeline, 100).await;
        tx.send(true).unwrap();
        assert_eq!(task.await.unwrap().last_processed, Some(100));
        assert_eq!(s.pipeline.pending_len().await, 1);
        assert!(s.sub.try_recv().unwrap().is_none());

        mock.extend(20);

        // Second run: fresh pipeline on the same bus, same config
        let publisher: Arc<dyn EventPublisher> = s.bus.clone();
        let pipeline = Arc::new(ConfirmationPipeline::new(
            ConfirmationConfig::new(chain.clone(), 6),
            publisher,
        ));
        let feed = Box::new(PollingFeed::new(Arc::clone(&client), POLL));
        let sink: Arc<dyn ConfirmationSink> = pipeline.clone();
        let store = Arc::new(JsonCheckpointStore::new(&dir));
        let watcher = ChainWatcher::new(client, feed, sink, config).with_checkpoints(store.clone());
        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(watcher.run(rx));

        assert_eq!(next_id(&mut s.sub).await, event_id(0xD0));
        wait_for_height(&pipeline, 120).await;
        tx.send(true).unwrap();
        let stats = task.await.unwrap();

        // Resumed at 100 - 6 + 1
        assert_eq!(stats.blocks_processed, 26);
        assert_eq!(store.load(&chain), Ok(Some(120)));
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
