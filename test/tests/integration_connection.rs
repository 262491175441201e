/// INTEGRATION TESTS: Connection failures
///
/// Severing the network under a live connection must fail pending work,
/// tell each connection listener exactly once, and tell Registry listeners
/// their Registry went away.

use std::{sync::Arc, thread, time::Duration};

use jsdt_client::{ConnectionListener, Manageable};
use jsdt_shared::{ConnectionEvent, JsdtError, RegistryEvent, RegistryEventKind};
use jsdt_test::{wait_until, Deployment, EventLog, TestClient, CONNECTION_TYPE, HOST};

#[test]
fn connection_listener_is_told_once() {
    let deployment = Deployment::start();
    let alice = TestClient::new("alice").handle();
    let other = deployment.new_toolkit();
    let session = other
        .create_session(&alice, &deployment.session_url("fragile"), true)
        .unwrap();
    let log = EventLog::<ConnectionEvent>::new();
    let listener: Arc<dyn ConnectionListener> = log.clone();
    other
        .naming()
        .add_connection_listener(HOST, CONNECTION_TYPE, listener.clone())
        .unwrap();

    assert!(deployment.network.sever(&deployment.session_endpoint()) > 0);

    let event = log.wait_for(|_| true).unwrap();
    assert_eq!(event.connection_type, CONNECTION_TYPE);
    assert!(!event.reason.is_empty());
    thread::sleep(Duration::from_millis(100));
    assert_eq!(log.events().len(), 1);

    // Listeners are forgotten once told
    assert!(matches!(
        other
            .naming()
            .remove_connection_listener(HOST, CONNECTION_TYPE, &listener),
        Err(JsdtError::NoSuchListener)
    ));
    assert!(wait_until(|| !other
        .connection_pool()
        .is_connected(&deployment.session_endpoint())));
    assert!(session.list_client_names().is_err());
}

#[test]
fn registry_listeners_hear_connection_failure() {
    let deployment = Deployment::start();
    let other = deployment.new_toolkit();
    let log = EventLog::<RegistryEvent>::new();
    other
        .naming()
        .add_registry_listener(HOST, log.clone())
        .unwrap();

    deployment.network.sever(&deployment.registry_endpoint());

    let failed = log
        .wait_for(|event| event.kind == RegistryEventKind::ConnectionFailed)
        .unwrap();
    assert_eq!(failed.url, None);
    assert_eq!(failed.address, deployment.registry_endpoint().to_string());
}

#[test]
fn reconnects_after_failure() {
    let deployment = Deployment::start();
    let alice = TestClient::new("alice").handle();
    let url = deployment.session_url("phoenix");
    let other = deployment.new_toolkit();
    other.create_session(&alice, &url, true).unwrap();

    deployment.network.sever(&deployment.session_endpoint());
    assert!(wait_until(|| !other
        .connection_pool()
        .is_connected(&deployment.session_endpoint())));

    // The host itself survived, so a fresh handle connects again
    let bob = TestClient::new("bob").handle();
    let session = other.create_session(&bob, &url, true).unwrap();
    assert!(session.list_client_names().unwrap().contains(&"bob".to_string()));
}

#[test]
fn unknown_connection_listener_is_rejected() {
    let deployment = Deployment::start();
    let listener: Arc<dyn ConnectionListener> = EventLog::<ConnectionEvent>::new();
    assert!(matches!(
        deployment
            .toolkit
            .naming()
            .remove_connection_listener(HOST, CONNECTION_TYPE, &listener),
        Err(JsdtError::NoSuchListener)
    ));
}
