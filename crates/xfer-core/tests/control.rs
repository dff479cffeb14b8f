mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use xfer_core::scheduler::TransferEvent;
use xfer_core::status::TransferStatus;
use xfer_core::store::MetadataStore;
use xfer_core::XferError;

#[tokio::test(start_paused = true)]
async fn suspend_keeps_the_slot_until_resume() {
    let transport = ScriptedTransport::new(Step::Slow { chunks: 5 });
    let mut h = start(config(1), Arc::clone(&transport));
    h.handle.submit(upload("a")).await.unwrap();
    h.handle.submit(upload("b")).await.unwrap();
    wait_for_status(&h.handle, "a", TransferStatus::Uploading).await;

    h.handle.suspend(&tid("a")).await.unwrap();
    assert_eq!(
        snapshot(&h.handle, "a").await.status,
        TransferStatus::Suspended
    );
    // Suspending twice is a no-op.
    h.handle.suspend(&tid("a")).await.unwrap();

    // The chunk already in flight may still land; nothing after it should.
    tokio::time::sleep(Duration::from_secs(2)).await;
    let before = snapshot(&h.handle, "a").await.bytes_done;
    assert!(before < 500);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(snapshot(&h.handle, "a").await.bytes_done, before);
    assert_eq!(transport.started_paths(), vec!["/a"]);
    assert_eq!(
        snapshot(&h.handle, "b").await.status,
        TransferStatus::QueuedForUpload
    );

    assert_eq!(
        h.handle.resume(&tid("a")).await,
        Ok(TransferStatus::Uploading)
    );
    let handle = &h.handle;
    eventually("upload moves again", || async move {
        snapshot(handle, "a").await.bytes_done > before
    })
    .await;
    h.handle.drain().await.unwrap();
    let ids: Vec<_> = drain_events(&mut h.events)
        .iter()
        .map(|e| e.id().as_str().to_string())
        .collect();
    assert_eq!(ids, vec!["a", "b"]);
    assert_eq!(transport.max_running(), 1);
}

#[tokio::test(start_paused = true)]
async fn suspended_transfers_are_not_swept() {
    let transport = ScriptedTransport::new(Step::Slow { chunks: 3 });
    let cfg = xfer_core::config::XferConfig {
        stalled_timeout_secs: 10,
        sweep_interval_secs: 1,
        ..config(1)
    };
    let mut h = start(cfg, Arc::clone(&transport));
    h.handle.submit(download("a")).await.unwrap();
    wait_for_status(&h.handle, "a", TransferStatus::Downloading).await;
    h.handle.suspend(&tid("a")).await.unwrap();

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(
        snapshot(&h.handle, "a").await.status,
        TransferStatus::Suspended
    );

    h.handle.resume(&tid("a")).await.unwrap();
    assert!(h.events.recv().await.unwrap().is_success());
    assert_eq!(transport.started().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn suspend_and_resume_errors() {
    let transport = ScriptedTransport::new(Step::Gated);
    let h = start(config(1), Arc::clone(&transport));
    h.handle.submit(upload("a")).await.unwrap();
    h.handle.submit(upload("b")).await.unwrap();
    wait_for_status(&h.handle, "a", TransferStatus::Uploading).await;

    assert_eq!(
        h.handle.resume(&tid("a")).await,
        Err(XferError::NotSuspended(tid("a")))
    );
    assert_eq!(
        h.handle.suspend(&tid("b")).await,
        Err(XferError::NotRunning(tid("b")))
    );
    assert_eq!(
        h.handle.resume(&tid("b")).await,
        Err(XferError::NotSuspended(tid("b")))
    );
    assert_eq!(
        h.handle.suspend(&tid("zz")).await,
        Err(XferError::NotFound(tid("zz")))
    );
    assert_eq!(
        h.handle.cancel(&tid("zz")).await,
        Err(XferError::NotFound(tid("zz")))
    );
    assert_eq!(
        h.handle.status(&tid("zz")).await,
        Err(XferError::NotFound(tid("zz")))
    );

    transport.open_gate(2);
    h.handle.drain().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn cancel_racing_completion_notifies_once() {
    let transport = ScriptedTransport::new(Step::Gated);
    let mut h = start(config(1), Arc::clone(&transport));
    h.handle.submit(download("a")).await.unwrap();
    h.handle.submit(download("b")).await.unwrap();
    wait_for_status(&h.handle, "a", TransferStatus::Downloading).await;

    // Let a's transport finish at the same moment it is cancelled.
    transport.open_gate(1);
    let outcome = h.handle.cancel(&tid("a")).await.unwrap();
    transport.open_gate(1);
    h.handle.drain().await.unwrap();

    let events = drain_events(&mut h.events);
    let for_a: Vec<_> = events.iter().filter(|e| e.id() == &tid("a")).collect();
    assert_eq!(for_a.len(), 1, "exactly one notification for a: {events:?}");
    match (outcome, for_a[0]) {
        (TransferStatus::Cancelled, TransferEvent::Failed { error, .. }) => {
            assert_eq!(error, &XferError::Cancelled)
        }
        (TransferStatus::Done, TransferEvent::Completed { .. }) => {}
        (status, ev) => panic!("cancel returned {status} but a reported {ev:?}"),
    }
    assert_eq!(events.len(), 2);
    assert!(events.iter().any(|e| e.id() == &tid("b") && e.is_success()));
    assert_eq!(snapshot(&h.handle, "a").await.status, outcome);

    // Cancelling a finished transfer changes nothing.
    assert_eq!(h.handle.cancel(&tid("a")).await, Ok(outcome));
    assert!(drain_events(&mut h.events).is_empty());
}

#[tokio::test(start_paused = true)]
async fn cancel_of_queued_transfer_never_starts_it() {
    let transport = ScriptedTransport::new(Step::Gated);
    let mut h = start(config(1), Arc::clone(&transport));
    h.handle.submit(upload("a")).await.unwrap();
    h.handle.submit(upload("b").forced()).await.unwrap();
    h.handle.submit(upload("c")).await.unwrap();
    let t = &transport;
    eventually("a running", || async move { t.running() == 1 }).await;

    assert_eq!(
        h.handle.cancel(&tid("b")).await,
        Ok(TransferStatus::Cancelled)
    );
    transport.open_gate(2);
    h.handle.drain().await.unwrap();

    assert_eq!(transport.started_paths(), vec!["/a", "/c"]);
    let events = drain_events(&mut h.events);
    let cancelled: Vec<_> = events.iter().filter(|e| !e.is_success()).collect();
    assert_eq!(cancelled.len(), 1);
    assert_eq!(cancelled[0].id(), &tid("b"));
}

#[tokio::test(start_paused = true)]
async fn list_and_acknowledge_finished_transfers() {
    let transport = ScriptedTransport::new(Step::Succeed);
    let h = start(config(2), Arc::clone(&transport));
    h.handle.submit(download("a")).await.unwrap();
    h.handle.submit(upload("b")).await.unwrap();
    h.handle.drain().await.unwrap();

    let list = h.handle.list().await.unwrap();
    assert_eq!(list.len(), 2);
    assert!(list.iter().all(|s| s.status == TransferStatus::Done));
    assert!(list.iter().all(|s| s.fraction() == 1.0));

    h.handle.acknowledge(&tid("a")).await.unwrap();
    assert_eq!(
        h.handle.status(&tid("a")).await,
        Err(XferError::NotFound(tid("a")))
    );
    assert_eq!(
        h.handle.acknowledge(&tid("a")).await,
        Err(XferError::NotFound(tid("a")))
    );
    assert_eq!(h.store.read_status(&tid("a")).await.unwrap(), None);
    assert_eq!(
        h.store.read_status(&tid("b")).await.unwrap(),
        Some(TransferStatus::Done)
    );
}

#[tokio::test(start_paused = true)]
async fn store_failures_do_not_fail_transfers() {
    let transport = ScriptedTransport::new(Step::Succeed);
    let mut h = start(config(2), Arc::clone(&transport));
    h.store.set_fail_writes(true);
    h.handle.submit(download("a")).await.unwrap();
    assert!(h.events.recv().await.unwrap().is_success());
    assert!(h.store.list().await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn handle_reports_stopped_scheduler() {
    let transport = ScriptedTransport::new(Step::Succeed);
    let mut h = start(config(2), Arc::clone(&transport));
    h.handle.shutdown().await.unwrap();
    assert_eq!(
        h.handle.submit(download("a")).await,
        Err(XferError::SchedulerStopped)
    );
    assert!(h.events.recv().await.is_none());
}
