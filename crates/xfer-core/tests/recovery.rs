mod common;

use std::sync::Arc;

use common::*;
use xfer_core::config::XferConfig;
use xfer_core::record::TransferRecord;
use xfer_core::scheduler::TransferEvent;
use xfer_core::status::TransferStatus;
use xfer_core::store::{MemoryStore, MetadataStore};
use xfer_core::XferError;

#[tokio::test(start_paused = true)]
async fn interrupted_transfers_resume_after_restart() {
    let store = Arc::new(MemoryStore::new());

    let first = ScriptedTransport::new(Step::Gated);
    let mut h1 = start_with_store(config(1), Arc::clone(&first), Arc::clone(&store));
    h1.handle.submit(upload("p")).await.unwrap();
    h1.handle.submit(download("q")).await.unwrap();
    h1.handle.submit(upload("r")).await.unwrap();
    wait_for_status(&h1.handle, "p", TransferStatus::Uploading).await;
    wait_for_status(&h1.handle, "q", TransferStatus::Downloading).await;

    h1.handle.shutdown().await.unwrap();
    // Shutdown interrupts without notifying.
    assert!(h1.events.recv().await.is_none());
    assert_eq!(
        h1.handle.status(&tid("p")).await,
        Err(XferError::SchedulerStopped)
    );
    assert_eq!(
        store.read_status(&tid("p")).await.unwrap(),
        Some(TransferStatus::Uploading)
    );
    assert_eq!(
        store.read_status(&tid("r")).await.unwrap(),
        Some(TransferStatus::QueuedForUpload)
    );

    let second = ScriptedTransport::new(Step::Succeed);
    let mut h2 = start_with_store(config(1), Arc::clone(&second), Arc::clone(&store));
    h2.handle.drain().await.unwrap();

    let mut done: Vec<String> = drain_events(&mut h2.events)
        .into_iter()
        .filter(TransferEvent::is_success)
        .map(|e| e.id().as_str().to_string())
        .collect();
    done.sort();
    assert_eq!(done, vec!["p", "q", "r"]);
    for id in ["p", "q", "r"] {
        assert_eq!(
            store.read_status(&tid(id)).await.unwrap(),
            Some(TransferStatus::Done)
        );
    }
    // The upload that was running goes first again, ahead of the one queued behind it.
    let uploads: Vec<_> = second
        .started_paths()
        .into_iter()
        .filter(|p| p != "/q")
        .collect();
    assert_eq!(uploads, vec!["/p", "/r"]);
}

#[tokio::test(start_paused = true)]
async fn finished_transfers_are_not_recovered() {
    let store = Arc::new(MemoryStore::new());
    let first = ScriptedTransport::new(Step::Succeed);
    first.script(
        "/bad",
        [Step::Fail(xfer_core::transport::TransportError::http(404, "gone"))],
    );
    let h1 = start_with_store(config(2), Arc::clone(&first), Arc::clone(&store));
    h1.handle.submit(download("ok")).await.unwrap();
    h1.handle.submit(download("bad")).await.unwrap();
    h1.handle.drain().await.unwrap();
    h1.handle.shutdown().await.unwrap();

    let second = ScriptedTransport::new(Step::Succeed);
    let h2 = start_with_store(config(2), Arc::clone(&second), Arc::clone(&store));
    h2.handle.drain().await.unwrap();
    assert!(second.started().is_empty());
    assert!(h2.handle.list().await.unwrap().is_empty());
    assert_eq!(
        store.read_status(&tid("bad")).await.unwrap(),
        Some(TransferStatus::DownloadFailed)
    );
}

#[tokio::test(start_paused = true)]
async fn recovery_respects_queue_capacity() {
    let store = Arc::new(MemoryStore::new());
    for i in 0..6 {
        let record = TransferRecord::from_request(download(&format!("s{i}"))).unwrap();
        store.save(&record).await.unwrap();
    }

    let transport = ScriptedTransport::new(Step::Gated);
    let cfg = XferConfig {
        max_queue_capacity: 2,
        ..config(5)
    };
    let mut h = start_with_store(cfg, Arc::clone(&transport), Arc::clone(&store));
    let t = &transport;
    eventually("two transfers running", || async move { t.running() == 2 }).await;
    tokio::time::sleep(std::time::Duration::from_secs(1)).await;

    assert_eq!(h.handle.list().await.unwrap().len(), 2);
    assert_eq!(transport.started_paths(), vec!["/s0", "/s1"]);
    // The rest wait in the store, not in memory.
    assert_eq!(store.load_pending().await.unwrap().len(), 6);
    assert!(matches!(
        h.handle.submit(download("extra")).await,
        Err(XferError::CapacityExceeded { limit: 2 })
    ));

    // Finished transfers make room for the ones left behind.
    transport.open_gate(6);
    h.handle.drain().await.unwrap();
    let done = drain_events(&mut h.events)
        .iter()
        .filter(|e| e.is_success())
        .count();
    assert_eq!(done, 6);
    assert!(transport.max_running() <= 2);
    assert!(store.load_pending().await.unwrap().is_empty());
}
