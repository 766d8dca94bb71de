// tests/integration/reaping_test.rs

//! End-to-end tests against a real listener: idle connections are closed when
//! a later accept triggers a sweep, active ones are not.

use super::test_helpers::{TestServer, echo, is_closed_by_server};
use std::time::Duration;
use tokio::time::sleep;

const IDLE_TIMEOUT: Duration = Duration::from_millis(200);
const SWEEP_INTERVAL: Duration = Duration::from_millis(50);

#[tokio::test]
async fn test_echo_round_trip() {
    let server = TestServer::start(IDLE_TIMEOUT, SWEEP_INTERVAL).await;
    let mut client = server.connect().await;

    assert_eq!(echo(&mut client, "hello").await.unwrap(), "hello");
    assert_eq!(echo(&mut client, "again").await.unwrap(), "again");

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_idle_connection_closed_on_next_accept() {
    let server = TestServer::start(IDLE_TIMEOUT, SWEEP_INTERVAL).await;
    let mut zombie = server.connect().await;

    sleep(IDLE_TIMEOUT * 2).await;
    let mut newcomer = server.connect().await;

    assert!(is_closed_by_server(&mut zombie).await);
    assert_eq!(echo(&mut newcomer, "still here").await.unwrap(), "still here");

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_active_connection_survives_sweeps() {
    let server = TestServer::start(IDLE_TIMEOUT, SWEEP_INTERVAL).await;
    let mut chatty = server.connect().await;

    // Stay active for three idle timeouts while other clients trigger sweeps.
    for i in 0..6 {
        sleep(Duration::from_millis(100)).await;
        let line = format!("ping {i}");
        assert_eq!(echo(&mut chatty, &line).await.unwrap(), line);
        let _bystander = server.connect().await;
    }

    assert_eq!(echo(&mut chatty, "done").await.unwrap(), "done");
    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_no_sweep_without_new_connections() {
    let server = TestServer::start(IDLE_TIMEOUT, SWEEP_INTERVAL).await;
    let mut client = server.connect().await;

    // Well past the idle timeout, but nothing has triggered a sweep.
    sleep(IDLE_TIMEOUT * 3).await;
    assert_eq!(echo(&mut client, "late").await.unwrap(), "late");

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_server_shutdown_closes_clients() {
    let server = TestServer::start(Duration::from_secs(60), Duration::from_secs(10)).await;
    let mut client = server.connect().await;
    assert_eq!(echo(&mut client, "hi").await.unwrap(), "hi");

    server.stop().await.unwrap();
    assert!(is_closed_by_server(&mut client).await);
}
