//! # Bus Flows
//!
//! Delivery guarantees consumers rely on: resume after reconnect, per-chain
//! filtering and the stream adapter.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use dn_01_confirmation::{ConfirmationConfig, ConfirmationPipeline, ConfirmationSink};
    use shared_bus::{BusConfig, Cursor, EventFilter, EventPublisher, InMemoryEventBus};
    use shared_types::{ChainId, ConfirmedEvent};
    use tokio::time::timeout;
    use tokio_stream::StreamExt;

    use crate::integration::deposit;

    fn confirmed(chain: &str, id: &str, height: u64) -> ConfirmedEvent {
        ConfirmedEvent {
            event: deposit(chain, id, height),
            confirmed_at: height + 5,
        }
    }

    #[tokio::test]
    async fn test_resume_after_reconnect() {
        let bus = InMemoryEventBus::new();
        let chain = ChainId::new("bitcoin");
        let mut sub = bus.subscribe(EventFilter::all());

        for i in 0..5u64 {
            bus.publish(confirmed("bitcoin", &format!("ev-{i}"), 100 + i)).await;
        }

        assert_eq!(sub.recv().await.unwrap().seq, 1);
        assert_eq!(sub.recv().await.unwrap().seq, 2);
        let cursor = sub.cursor().clone();
        drop(sub);

        // Published while disconnected
        bus.publish(confirmed("bitcoin", "ev-5", 105)).await;

        let mut resumed = bus.subscribe_from(EventFilter::all(), cursor);
        let mut seqs = Vec::new();
        while let Ok(Some(delivery)) = resumed.try_recv() {
            seqs.push(delivery.seq);
        }
        assert_eq!(seqs, vec![3, 4, 5, 6]);
        assert_eq!(resumed.cursor().position(&chain), 6);
    }

    #[tokio::test]
    async fn test_persisted_cursor_resumes_per_chain() {
        let bus = InMemoryEventBus::new();
        for i in 0..3u64 {
            bus.publish(confirmed("bitcoin", &format!("b-{i}"), i)).await;
            bus.publish(confirmed("spectrum", &format!("s-{i}"), i)).await;
        }

        let mut cursor = Cursor::new();
        cursor.advance(&ChainId::new("bitcoin"), 3);
        cursor.advance(&ChainId::new("spectrum"), 1);

        let mut sub = bus.subscribe_from(EventFilter::all(), cursor);
        let mut ids = Vec::new();
        while let Ok(Some(delivery)) = sub.try_recv() {
            ids.push(delivery.event.id().as_str().to_string());
        }
        assert_eq!(ids, vec!["s-1", "s-2"]);
    }

    #[tokio::test]
    async fn test_filtered_subscriber_sees_only_its_chain() {
        let bus = Arc::new(InMemoryEventBus::new());
        let publisher: Arc<dyn EventPublisher> = bus.clone();
        let spectrum = ConfirmationPipeline::new(
            ConfirmationConfig::new(ChainId::new("spectrum"), 1),
            Arc::clone(&publisher),
        );
        let bitcoin = ConfirmationPipeline::new(
            ConfirmationConfig::new(ChainId::new("bitcoin"), 1),
            publisher,
        );
        let mut only_spectrum = bus.subscribe(EventFilter::chains(vec![ChainId::new("spectrum")]));

        bitcoin.observe_block(1, vec![deposit("bitcoin", "b", 1)]).await;
        spectrum.observe_block(1, vec![deposit("spectrum", "s", 1)]).await;

        let delivery = only_spectrum.recv().await.unwrap();
        assert_eq!(delivery.chain(), &ChainId::new("spectrum"));
        assert_eq!(only_spectrum.try_recv().unwrap(), None);
    }

    #[tokio::test]
    async fn test_lagging_subscriber_is_refilled() {
        let bus = InMemoryEventBus::with_config(BusConfig {
            channel_capacity: 4,
            ..BusConfig::default()
        });
        let mut slow = bus.subscribe(EventFilter::all());

        for i in 0..10u64 {
            bus.publish(confirmed("bitcoin", &format!("ev-{i}"), i)).await;
        }

        let mut seqs = Vec::new();
        while let Ok(Some(delivery)) = slow.try_recv() {
            seqs.push(delivery.seq);
        }
        assert_eq!(seqs, (1..=10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_event_stream_ends_on_close() {
        let bus = InMemoryEventBus::new();
        let stream = bus.event_stream(EventFilter::all());

        bus.publish(confirmed("bitcoin", "a", 1)).await;
        bus.publish(confirmed("bitcoin", "b", 2)).await;
        bus.close();

        let seqs: Vec<u64> = timeout(
            Duration::from_secs(1),
            stream.map(|delivery| delivery.seq).collect(),
        )
        .await
        .unwrap();
        assert_eq!(seqs, vec![1, 2]);
    }
}
