mod common;

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use leshy_server::core::broadcaster::{Listener, MessageBroadcaster};
use leshy_server::core::pool::ConnectionMap;
use leshy_server::core::queue::{Consumer, Queue};
use leshy_server::core::storage::DistributedSqlStorage;
use tokio::time::timeout;

use crate::common::folder_to_use;

fn broadcaster() -> MessageBroadcaster {
    let pool = Arc::new(ConnectionMap::new(Duration::from_secs(60)));
    let storage = DistributedSqlStorage::new(folder_to_use(), pool);
    MessageBroadcaster::new(storage)
}

#[tokio::test]
async fn publish_before_subscribe_lands_in_the_backlog() {
    let broadcaster = broadcaster();
    let queue = Queue::new("tasks").unwrap();

    let id = broadcaster
        .publish_message(&queue, Bytes::from_static(b"payload"))
        .unwrap();

    let (listener, _rx) = Listener::new(queue, Consumer::new("").unwrap());
    let backlog = broadcaster.read_messages(&listener).unwrap();

    assert_eq!(backlog.len(), 1);
    assert_eq!(backlog[0].id, id);
    assert_eq!(backlog[0].data, b"payload");
    assert_eq!(broadcaster.listener_count(&listener.queue), 1);
}

#[tokio::test]
async fn live_publish_reaches_a_registered_listener() {
    let broadcaster = broadcaster();
    let queue = Queue::new("tasks").unwrap();

    let (listener, mut rx) = Listener::new(queue.clone(), Consumer::new("").unwrap());
    let backlog = broadcaster.read_messages(&listener).unwrap();
    assert!(backlog.is_empty());

    let id = broadcaster
        .publish_message(&queue, Bytes::from_static(b"live"))
        .unwrap();

    let delivery = timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("delivery should arrive promptly")
        .expect("channel should stay open");
    assert_eq!(delivery.id, id);
    assert_eq!(delivery.data, Bytes::from_static(b"live"));
}

#[tokio::test]
async fn every_listener_of_the_queue_gets_the_message() {
    let broadcaster = broadcaster();
    let queue = Queue::new("tasks").unwrap();

    let (first, mut rx1) = Listener::new(queue.clone(), Consumer::new("a").unwrap());
    let (second, mut rx2) = Listener::new(queue.clone(), Consumer::new("b").unwrap());
    broadcaster.read_messages(&first).unwrap();
    broadcaster.read_messages(&second).unwrap();

    let id = broadcaster
        .publish_message(&queue, Bytes::from_static(b"x"))
        .unwrap();

    for rx in [&mut rx1, &mut rx2] {
        let delivery = timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("delivery should arrive promptly")
            .expect("channel should stay open");
        assert_eq!(delivery.id, id);
    }
}

#[tokio::test]
async fn removed_listener_receives_nothing_further() {
    let broadcaster = broadcaster();
    let queue = Queue::new("tasks").unwrap();

    let (listener, mut rx) = Listener::new(queue.clone(), Consumer::new("").unwrap());
    broadcaster.read_messages(&listener).unwrap();
    broadcaster.remove_listener(&listener);
    assert_eq!(broadcaster.listener_count(&queue), 0);

    broadcaster
        .publish_message(&queue, Bytes::from_static(b"late"))
        .unwrap();

    assert!(
        timeout(Duration::from_millis(200), rx.recv()).await.is_err(),
        "a removed listener must not be delivered to"
    );
}

#[tokio::test]
async fn ack_goes_to_the_listeners_own_cursor() {
    let broadcaster = broadcaster();
    let queue = Queue::new("tasks").unwrap();

    let id = broadcaster
        .publish_message(&queue, Bytes::from_static(b"x"))
        .unwrap();

    let (listener, _rx) = Listener::new(queue.clone(), Consumer::new("c1").unwrap());
    broadcaster.read_messages(&listener).unwrap();
    broadcaster.ack(&listener, &id).unwrap();

    // c1 is drained, the primary cursor is untouched.
    let (again, _rx) = Listener::new(queue.clone(), Consumer::new("c1").unwrap());
    assert!(broadcaster.read_messages(&again).unwrap().is_empty());

    let (primary, _rx) = Listener::new(queue, Consumer::new("").unwrap());
    assert_eq!(broadcaster.read_messages(&primary).unwrap().len(), 1);
}
