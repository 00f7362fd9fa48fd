mod common;

use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use leshy_client::LeshyClient;
use leshy_protocol::{Frame, FrameType, ProtocolError};
use leshy_server::config::BrokerConfig;
use leshy_server::core::broadcaster::MessageBroadcaster;
use leshy_server::core::pool::ConnectionMap;
use leshy_server::core::storage::DistributedSqlStorage;
use leshy_server::server;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::time::{sleep, timeout};

use crate::common::folder_to_use;

async fn spawn_broker(config: BrokerConfig) -> (String, watch::Sender<()>) {
    let pool = Arc::new(ConnectionMap::new(config.connection_ttl));
    let storage = DistributedSqlStorage::new(folder_to_use(), pool);
    let broadcaster = Arc::new(MessageBroadcaster::new(storage));

    let (shutdown_tx, shutdown_rx) = watch::channel(());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    tokio::spawn(server::serve(
        listener,
        broadcaster,
        Arc::new(config),
        shutdown_rx,
    ));

    (addr, shutdown_tx)
}

#[tokio::test]
async fn single_consumer_receives_acks_and_replays_nothing() {
    let (addr, _shutdown) = spawn_broker(BrokerConfig::default()).await;

    let mut publisher = LeshyClient::connect(&addr).await.unwrap();
    let ack = publisher.publish("tasks", &[0x7B, 0x7D]).await.unwrap();

    let subscriber = LeshyClient::connect(&addr).await.unwrap();
    let mut sub = subscriber.subscribe("tasks", "").await.unwrap();

    let delivery = timeout(Duration::from_secs(1), sub.next())
        .await
        .expect("backlog should arrive promptly")
        .unwrap()
        .expect("stream should stay open");
    assert_eq!(delivery.id, ack.id);
    assert_eq!(&delivery.data[..], &[0x7B, 0x7D]);

    sub.ack(&delivery.id).await.unwrap();
    drop(sub);
    sleep(Duration::from_millis(200)).await; // let the server process the ack

    let subscriber = LeshyClient::connect(&addr).await.unwrap();
    let mut sub = subscriber.subscribe("tasks", "").await.unwrap();
    assert!(
        timeout(Duration::from_millis(300), sub.next()).await.is_err(),
        "an acked message must not be replayed"
    );
}

#[tokio::test]
async fn named_consumer_replays_only_what_it_has_not_acked() {
    let (addr, _shutdown) = spawn_broker(BrokerConfig::default()).await;

    let mut publisher = LeshyClient::connect(&addr).await.unwrap();
    let first = publisher.publish("q", b"A").await.unwrap().id;
    let second = publisher.publish("q", b"A").await.unwrap().id;

    let subscriber = LeshyClient::connect(&addr).await.unwrap();
    let mut sub = subscriber.subscribe("q", "c1").await.unwrap();

    let d1 = timeout(Duration::from_secs(1), sub.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let d2 = timeout(Duration::from_secs(1), sub.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(d1.id, first, "backlog must replay in publish order");
    assert_eq!(d2.id, second);

    sub.ack(&first).await.unwrap();
    drop(sub);
    sleep(Duration::from_millis(200)).await;

    let subscriber = LeshyClient::connect(&addr).await.unwrap();
    let mut sub = subscriber.subscribe("q", "c1").await.unwrap();
    let replay = timeout(Duration::from_secs(1), sub.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(replay.id, second);
    assert!(timeout(Duration::from_millis(300), sub.next()).await.is_err());
}

#[tokio::test]
async fn consumers_ack_independently() {
    let (addr, _shutdown) = spawn_broker(BrokerConfig::default()).await;

    let mut publisher = LeshyClient::connect(&addr).await.unwrap();
    let id = publisher.publish("q", b"X").await.unwrap().id;

    let mut sub_a = LeshyClient::connect(&addr)
        .await
        .unwrap()
        .subscribe("q", "a")
        .await
        .unwrap();
    let mut sub_b = LeshyClient::connect(&addr)
        .await
        .unwrap()
        .subscribe("q", "b")
        .await
        .unwrap();

    for sub in [&mut sub_a, &mut sub_b] {
        let delivery = timeout(Duration::from_secs(1), sub.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(delivery.id, id);
        assert_eq!(&delivery.data[..], b"X");
    }

    sub_a.ack(&id).await.unwrap();
    drop(sub_a);
    drop(sub_b);
    sleep(Duration::from_millis(200)).await;

    // b never acked, so a fresh session on b replays the message.
    let mut sub_b = LeshyClient::connect(&addr)
        .await
        .unwrap()
        .subscribe("q", "b")
        .await
        .unwrap();
    let replay = timeout(Duration::from_secs(1), sub_b.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(replay.id, id);
}

#[tokio::test]
async fn silent_stream_is_closed_after_the_handshake_timeout() {
    let config = BrokerConfig {
        handshake_timeout: Duration::from_millis(200),
        ..BrokerConfig::default()
    };
    let (addr, _shutdown) = spawn_broker(config).await;

    let mut stream = TcpStream::connect(&addr).await.unwrap();

    // Send nothing; the server must give up on its own.
    let mut buf = BytesMut::with_capacity(256);
    let deadline = Duration::from_secs(2);
    let frame = timeout(deadline, async {
        loop {
            if let Some(frame) = Frame::decode(&mut buf).unwrap() {
                return frame;
            }
            let n = stream.read_buf(&mut buf).await.unwrap();
            assert!(n > 0, "connection closed without an error frame");
        }
    })
    .await
    .expect("server should time the handshake out");

    assert_eq!(frame.frame_type, FrameType::Error);
    assert_eq!(
        String::from_utf8_lossy(&frame.payload),
        "handshake timed out"
    );
}

#[tokio::test]
async fn live_publish_reaches_a_live_subscriber() {
    let (addr, _shutdown) = spawn_broker(BrokerConfig::default()).await;

    let subscriber = LeshyClient::connect(&addr).await.unwrap();
    let mut sub = subscriber.subscribe("t", "").await.unwrap();
    assert!(
        timeout(Duration::from_millis(200), sub.next()).await.is_err(),
        "a fresh queue has no backlog"
    );

    let mut publisher = LeshyClient::connect(&addr).await.unwrap();
    let id = publisher.publish("t", b"Y").await.unwrap().id;

    let delivery = timeout(Duration::from_secs(1), sub.next())
        .await
        .expect("live delivery should arrive within a second")
        .unwrap()
        .unwrap();
    assert_eq!(delivery.id, id);
    assert_eq!(&delivery.data[..], b"Y");
}

#[tokio::test]
async fn publishing_to_an_empty_queue_name_is_rejected() {
    let (addr, _shutdown) = spawn_broker(BrokerConfig::default()).await;

    let mut publisher = LeshyClient::connect(&addr).await.unwrap();
    match publisher.publish("", b"x").await {
        Err(ProtocolError::Remote(msg)) => {
            assert!(msg.contains("invalid queue name"), "unexpected error: {msg}")
        }
        other => panic!("expected a remote validation error, got {other:?}"),
    }

    // The connection survives the rejection.
    assert!(publisher.publish("ok", b"x").await.is_ok());
}
