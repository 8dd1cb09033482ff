use bytes::Bytes;
use peridot::core::pubsub::PubSubManager;

#[tokio::test]
async fn test_publish_counts_receivers() {
    let manager = PubSubManager::new();
    let channel = Bytes::from_static(b"news");

    assert_eq!(manager.publish(&channel, Bytes::from_static(b"lost")), 0);

    let mut rx1 = manager.subscribe(&channel);
    let mut rx2 = manager.subscribe(&channel);
    assert_eq!(manager.subscriber_count(&channel), 2);

    assert_eq!(manager.publish(&channel, Bytes::from_static(b"hi")), 2);
    assert_eq!(rx1.recv().await.unwrap(), Bytes::from_static(b"hi"));
    assert_eq!(rx2.recv().await.unwrap(), Bytes::from_static(b"hi"));
}

#[tokio::test]
async fn test_publish_does_not_cross_channels() {
    let manager = PubSubManager::new();
    let mut rx = manager.subscribe(&Bytes::from_static(b"a"));
    assert_eq!(manager.publish(&Bytes::from_static(b"b"), Bytes::from_static(b"x")), 0);
    assert_eq!(manager.publish(&Bytes::from_static(b"a"), Bytes::from_static(b"y")), 1);
    assert_eq!(rx.recv().await.unwrap(), Bytes::from_static(b"y"));
}

#[tokio::test]
async fn test_purge_drops_empty_channels() {
    let manager = PubSubManager::new();
    let channel = Bytes::from_static(b"temp");
    {
        let _rx = manager.subscribe(&channel);
        assert_eq!(manager.purge_empty_channels(), 0);
    }
    // The only receiver is gone; the channel can be reclaimed.
    assert_eq!(manager.purge_empty_channels(), 1);
    assert_eq!(manager.subscriber_count(&channel), 0);
}
