//! ---
//! dl_section: "03-emulator"
//! dl_subsection: "integration-tests"
//! dl_type: "source"
//! dl_scope: "code"
//! dl_description: "Reachability prober timing behaviour."
//! dl_version: "v0.1.0"
//! dl_owner: "tbd"
//! ---
use std::time::{Duration, Instant};

use dynalocal_emulator::wait_for_reachable;
use tokio::net::TcpListener;

async fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    listener.local_addr().expect("addr").port()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn live_listener_resolves_well_under_deadline() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().unwrap().port();

    let started = Instant::now();
    wait_for_reachable("127.0.0.1", port, Duration::from_secs(5))
        .await
        .expect("listener should be reachable");
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn missing_listener_fails_at_or_after_deadline() {
    let port = free_port().await;
    let deadline = Duration::from_millis(200);

    let started = Instant::now();
    let err = wait_for_reachable("127.0.0.1", port, deadline)
        .await
        .expect_err("nothing is listening");
    let waited = started.elapsed();

    assert!(waited >= deadline, "gave up early after {waited:?}");
    assert!(waited < Duration::from_secs(2), "overshot deadline: {waited:?}");
    assert_eq!(err.port, port);
    assert_eq!(err.host, "127.0.0.1");
    assert!(err.elapsed >= deadline);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn listener_appearing_later_is_detected() {
    let port = free_port().await;
    let binder = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(150)).await;
        let listener = TcpListener::bind(("127.0.0.1", port)).await.expect("rebind");
        // Keep accepting so the port stays open until the prober connects.
        let _ = listener.accept().await;
    });

    wait_for_reachable("127.0.0.1", port, Duration::from_secs(5))
        .await
        .expect("listener should appear");
    binder.await.unwrap();
}
