//! # Confirmation Flows
//!
//! `ConfirmationPipeline` (dn-01) publishing into `InMemoryEventBus`.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use dn_01_confirmation::{
        ConfirmationConfig, ConfirmationPipeline, ConfirmationSink, ObserveOutcome,
    };
    use shared_bus::{EventFilter, EventPublisher, InMemoryEventBus, Subscription};
    use shared_types::ChainId;

    use crate::integration::deposit;

    fn pipeline(bus: &Arc<InMemoryEventBus>, chain: &str, depth: u64) -> ConfirmationPipeline {
        let publisher: Arc<dyn EventPublisher> = bus.clone();
        ConfirmationPipeline::new(ConfirmationConfig::new(ChainId::new(chain), depth), publisher)
    }

    fn drain(subscription: &mut Subscription) -> Vec<String> {
        let mut ids = Vec::new();
        while let Ok(Some(delivery)) = subscription.try_recv() {
            ids.push(delivery.event.id().as_str().to_string());
        }
        ids
    }

    /// Depth 6, event at 100: pending through 104, delivered once at 105.
    #[tokio::test]
    async fn test_depth_six_scenario() {
        let bus = Arc::new(InMemoryEventBus::new());
        let mut sub = bus.subscribe(EventFilter::all());
        let pipeline = pipeline(&bus, "bitcoin", 6);

        pipeline
            .observe_block(100, vec![deposit("bitcoin", "aa:0", 100)])
            .await;
        for h in 101..=104 {
            assert!(pipeline.advance_height(h).await.is_empty());
        }
        assert!(drain(&mut sub).is_empty());
        assert_eq!(pipeline.pending_len().await, 1);

        let confirmed = pipeline.advance_height(105).await;
        assert_eq!(confirmed.len(), 1);
        assert_eq!(confirmed[0].confirmed_at, 105);
        assert!(pipeline.advance_height(105).await.is_empty());

        assert_eq!(drain(&mut sub), vec!["aa:0"]);
        assert_eq!(pipeline.pending_len().await, 0);
    }

    #[tokio::test]
    async fn test_observe_twice_keeps_one_record() {
        let bus = Arc::new(InMemoryEventBus::new());
        let pipeline = pipeline(&bus, "bitcoin", 6);

        assert_eq!(
            pipeline.observe(deposit("bitcoin", "aa:0", 100)).await,
            ObserveOutcome::Inserted
        );
        assert_eq!(
            pipeline.observe(deposit("bitcoin", "aa:0", 100)).await,
            ObserveOutcome::AlreadyPending
        );
        assert_eq!(pipeline.pending_len().await, 1);
    }

    #[tokio::test]
    async fn test_discard_removes_orphaned_heights_only() {
        let bus = Arc::new(InMemoryEventBus::new());
        let mut sub = bus.subscribe(EventFilter::all());
        let pipeline = pipeline(&bus, "bitcoin", 6);

        pipeline.observe_block(100, vec![deposit("bitcoin", "a", 100)]).await;
        pipeline.observe_block(101, vec![deposit("bitcoin", "b", 101)]).await;
        pipeline.observe_block(102, vec![deposit("bitcoin", "c", 102)]).await;

        let orphaned = pipeline.discard(101).await;
        let mut ids: Vec<_> = orphaned.iter().map(|e| e.id.as_str().to_string()).collect();
        ids.sort();
        assert_eq!(ids, vec!["b", "c"]);
        assert_eq!(pipeline.latest_height().await, Some(100));

        // The surviving event still confirms on the replacement branch
        for h in 101..=105 {
            pipeline.observe_block(h, Vec::new()).await;
        }
        assert_eq!(drain(&mut sub), vec!["a"]);
    }

    #[tokio::test]
    async fn test_delivery_in_observed_height_order() {
        let bus = Arc::new(InMemoryEventBus::new());
        let mut sub = bus.subscribe(EventFilter::all());
        let pipeline = pipeline(&bus, "bitcoin", 3);

        // Observed out of order, all confirmed by one advance
        pipeline.observe(deposit("bitcoin", "late", 12)).await;
        pipeline.observe(deposit("bitcoin", "early", 10)).await;
        pipeline.observe(deposit("bitcoin", "middle-1", 11)).await;
        pipeline.observe(deposit("bitcoin", "middle-2", 11)).await;
        pipeline.advance_height(20).await;

        let mut heights = Vec::new();
        let mut seqs = Vec::new();
        while let Ok(Some(delivery)) = sub.try_recv() {
            heights.push(delivery.event.observed_height());
            seqs.push(delivery.seq);
        }
        assert_eq!(heights, vec![10, 11, 11, 12]);
        assert_eq!(seqs, vec![1, 2, 3, 4]);
    }

    /// An event showing up below an already delivered height is refused
    /// instead of being delivered after it.
    #[tokio::test]
    async fn test_late_event_does_not_break_order() {
        let bus = Arc::new(InMemoryEventBus::new());
        let mut sub = bus.subscribe(EventFilter::all());
        let pipeline = pipeline(&bus, "bitcoin", 6);

        pipeline.observe(deposit("bitcoin", "a", 100)).await;
        assert_eq!(pipeline.advance_height(110).await.len(), 1);

        assert_eq!(
            pipeline.observe(deposit("bitcoin", "b", 95)).await,
            ObserveOutcome::BehindPromoted
        );
        assert!(pipeline.advance_height(110).await.is_empty());
        pipeline.observe(deposit("bitcoin", "c", 108)).await;
        pipeline.advance_height(113).await;

        let mut heights = Vec::new();
        while let Ok(Some(delivery)) = sub.try_recv() {
            heights.push(delivery.event.observed_height());
        }
        assert_eq!(heights, vec![100, 108]);
    }

    /// A restarted pipeline re-confirms what it sees again; the bus keeps
    /// consumers from seeing it twice.
    #[tokio::test]
    async fn test_restart_replay_is_deduplicated() {
        let bus = Arc::new(InMemoryEventBus::new());
        let mut sub = bus.subscribe(EventFilter::all());

        let first = pipeline(&bus, "bitcoin", 2);
        first.observe_block(50, vec![deposit("bitcoin", "x", 50)]).await;
        first.observe_block(51, Vec::new()).await;
        drop(first);

        let restarted = pipeline(&bus, "bitcoin", 2);
        restarted.observe_block(50, vec![deposit("bitcoin", "x", 50)]).await;
        let confirmed = restarted.observe_block(51, Vec::new()).await;
        assert_eq!(confirmed.len(), 1);

        assert_eq!(drain(&mut sub), vec!["x"]);
        assert_eq!(bus.last_seq(&ChainId::new("bitcoin")), 1);
    }

    #[tokio::test]
    async fn test_chains_are_namespaced() {
        let bus = Arc::new(InMemoryEventBus::new());
        let mut sub = bus.subscribe(EventFilter::all());
        let bitcoin = pipeline(&bus, "bitcoin", 1);
        let spectrum = pipeline(&bus, "spectrum", 1);

        bitcoin.observe_block(7, vec![deposit("bitcoin", "same", 7)]).await;
        spectrum.observe_block(7, vec![deposit("spectrum", "same", 7)]).await;

        assert_eq!(drain(&mut sub).len(), 2);
        assert_eq!(bus.last_seq(&ChainId::new("bitcoin")), 1);
        assert_eq!(bus.last_seq(&ChainId::new("spectrum")), 1);
    }
}
