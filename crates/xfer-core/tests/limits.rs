mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use xfer_core::record::NetworkClass;
use xfer_core::scheduler::{Scheduler, Submitted, TransferEvent};
use xfer_core::store::MemoryStore;
use xfer_core::status::TransferStatus;
use xfer_core::XferError;

fn count(list: &[xfer_core::record::TransferSnapshot], status: TransferStatus) -> usize {
    list.iter().filter(|s| s.status == status).count()
}

#[tokio::test(start_paused = true)]
async fn ten_downloads_never_exceed_five_per_host() {
    let transport = ScriptedTransport::new(Step::Gated);
    let mut h = start(config(5), Arc::clone(&transport));
    for i in 0..10 {
        h.handle.submit(download(&format!("d{i}"))).await.unwrap();
    }

    let handle = &h.handle;
    eventually("five transfers downloading", || async move {
        count(&handle.list().await.unwrap(), TransferStatus::Downloading) == 5
    })
    .await;
    let list = h.handle.list().await.unwrap();
    assert_eq!(count(&list, TransferStatus::QueuedForDownload), 5);
    for i in 0..5 {
        assert_eq!(
            snapshot(&h.handle, &format!("d{i}")).await.status,
            TransferStatus::Downloading
        );
    }

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(transport.running(), 5);

    // One completion admits exactly one queued record.
    transport.open_gate(1);
    assert!(h.events.recv().await.unwrap().is_success());
    eventually("a sixth transfer downloading", || async move {
        count(&handle.list().await.unwrap(), TransferStatus::Downloading) == 5
    })
    .await;
    tokio::time::sleep(Duration::from_secs(1)).await;
    let list = h.handle.list().await.unwrap();
    assert_eq!(count(&list, TransferStatus::Done), 1);
    assert_eq!(count(&list, TransferStatus::Downloading), 5);
    assert_eq!(count(&list, TransferStatus::QueuedForDownload), 4);
    assert_eq!(transport.started().len(), 6);
    assert!(drain_events(&mut h.events).is_empty());

    transport.open_gate(9);
    h.handle.drain().await.unwrap();
    assert_eq!(transport.max_running(), 5);
    let events = drain_events(&mut h.events);
    assert_eq!(events.len(), 9);
    assert!(events.iter().all(TransferEvent::is_success));
}

#[tokio::test]
async fn start_rejects_a_zero_host_limit() {
    let transport = ScriptedTransport::new(Step::Succeed);
    let err = Scheduler::start(
        config(0),
        transport,
        Arc::new(MemoryStore::new()),
    )
    .unwrap_err();
    assert!(err.to_string().contains("max_concurrent_per_host"), "{err}");
}

#[tokio::test(start_paused = true)]
async fn forced_upload_starts_before_earlier_upload() {
    let transport = ScriptedTransport::new(Step::Gated);
    let h = start(config(1), Arc::clone(&transport));
    h.handle.submit(upload("x")).await.unwrap();
    let t = &transport;
    eventually("x running", || async move { t.running() == 1 }).await;

    h.handle.submit(upload("a")).await.unwrap();
    h.handle.submit(upload("b").forced()).await.unwrap();
    assert_eq!(
        snapshot(&h.handle, "a").await.status,
        TransferStatus::QueuedForUpload
    );
    assert_eq!(
        snapshot(&h.handle, "b").await.status,
        TransferStatus::UploadForcedStart
    );

    transport.open_gate(3);
    h.handle.drain().await.unwrap();
    assert_eq!(transport.started_paths(), vec!["/x", "/b", "/a"]);
    assert_eq!(snapshot(&h.handle, "b").await.status, TransferStatus::Done);
}

#[tokio::test(start_paused = true)]
async fn network_classes_have_separate_slots() {
    let transport = ScriptedTransport::new(Step::Gated);
    let h = start(config(1), Arc::clone(&transport));
    h.handle.submit(download("wifi")).await.unwrap();
    h.handle
        .submit(download("cell").on_network(NetworkClass::Cellular))
        .await
        .unwrap();
    h.handle.submit(download("wifi2")).await.unwrap();

    let t = &transport;
    eventually("two transfers running", || async move { t.running() == 2 }).await;
    assert_eq!(
        snapshot(&h.handle, "wifi2").await.status,
        TransferStatus::QueuedForDownload
    );
    transport.open_gate(3);
    h.handle.drain().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn submit_beyond_capacity_is_refused() {
    let transport = ScriptedTransport::new(Step::Gated);
    let cfg = xfer_core::config::XferConfig {
        max_queue_capacity: 2,
        ..config(1)
    };
    let h = start(cfg, Arc::clone(&transport));
    h.handle.submit(download("a")).await.unwrap();
    h.handle.submit(download("b")).await.unwrap();
    assert_eq!(
        h.handle.submit(download("c")).await,
        Err(XferError::CapacityExceeded { limit: 2 })
    );

    transport.open_gate(2);
    h.handle.drain().await.unwrap();
    // Finished transfers no longer count against capacity.
    assert!(h.handle.submit(download("c")).await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn duplicate_id_returns_existing_transfer() {
    let transport = ScriptedTransport::new(Step::Gated);
    let h = start(config(1), Arc::clone(&transport));
    let first = h.handle.submit(download("a")).await.unwrap();
    assert_eq!(first, Submitted::Queued(tid("a")));

    let again = h.handle.submit(download("a")).await.unwrap();
    match again {
        Submitted::Duplicate(snap) => assert_eq!(snap.id, tid("a")),
        other => panic!("expected duplicate, got {other:?}"),
    }
    assert_eq!(h.handle.list().await.unwrap().len(), 1);

    transport.open_gate(1);
    h.handle.drain().await.unwrap();
    assert_eq!(transport.started_paths(), vec!["/a"]);
}

#[tokio::test(start_paused = true)]
async fn ids_are_assigned_when_missing() {
    let transport = ScriptedTransport::new(Step::Succeed);
    let mut h = start(config(2), Arc::clone(&transport));
    let req = xfer_core::record::TransferRequest::download("alice", SERVER, "/n", "/tmp/n");
    let submitted = h.handle.submit(req).await.unwrap();
    let id = submitted.id().clone();
    assert!(!id.as_str().is_empty());

    let ev = h.events.recv().await.unwrap();
    assert_eq!(ev.id(), &id);
    assert_eq!(ev.account(), "alice");
}

#[tokio::test(start_paused = true)]
async fn invalid_requests_are_rejected() {
    let transport = ScriptedTransport::new(Step::Succeed);
    let h = start(config(2), Arc::clone(&transport));
    let req = xfer_core::record::TransferRequest::download("alice", "nowhere", "/n", "/tmp/n");
    assert!(matches!(
        h.handle.submit(req).await,
        Err(XferError::InvalidRequest(_))
    ));
    assert!(h.handle.list().await.unwrap().is_empty());
}
