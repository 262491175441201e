/// INTEGRATION TESTS: ByteArray values
///
/// Every set is applied by the host and announced once to each listening
/// process.

use std::{thread, time::Duration};

use jsdt_client::Manageable;
use jsdt_shared::{ByteArrayEvent, EventKind, JsdtError};
use jsdt_test::{Deployment, EventLog, TestClient};

#[test]
fn value_round_trips_with_one_change_event() {
    let deployment = Deployment::start();
    let alice = TestClient::new("alice").handle();
    let session = deployment
        .toolkit
        .create_session(&alice, &deployment.session_url("board"), true)
        .unwrap();
    let score = session.create_byte_array(&alice, "score", true).unwrap();
    let log = EventLog::<ByteArrayEvent>::new();
    score.add_listener(log.clone()).unwrap();

    score.set_value(&alice, b"42").unwrap();
    assert_eq!(score.get_value_as_bytes().unwrap(), b"42".to_vec());

    let changed = log
        .wait_for(|event| event.kind == EventKind::ValueChanged)
        .unwrap();
    assert_eq!(changed.client, "alice");
    assert_eq!(changed.value.as_deref(), Some(&b"42"[..]));

    thread::sleep(Duration::from_millis(100));
    assert_eq!(log.count(|event| event.kind == EventKind::ValueChanged), 1);
}

#[test]
fn other_processes_see_the_new_value() {
    let deployment = Deployment::start();
    let url = deployment.session_url("mirror");
    let alice = TestClient::new("alice").handle();
    let session = deployment.toolkit.create_session(&alice, &url, true).unwrap();
    let title = session.create_byte_array(&alice, "title", true).unwrap();

    let other = deployment.new_toolkit();
    let bob = TestClient::new("bob").handle();
    let remote = other
        .create_session(&bob, &url, true)
        .unwrap()
        .create_byte_array(&bob, "title", false)
        .unwrap();
    let log = EventLog::<ByteArrayEvent>::new();
    remote.add_listener(log.clone()).unwrap();

    title.set_value_string(&alice, "draft").unwrap();

    let changed = log
        .wait_for(|event| event.kind == EventKind::ValueChanged)
        .unwrap();
    assert_eq!(changed.value.as_deref(), Some(&b"draft"[..]));
    assert_eq!(remote.get_value_as_string().unwrap(), "draft");
    assert_eq!(remote.get_value_as_object::<String>().unwrap(), "draft");
}

#[test]
fn range_set_takes_a_slice() {
    let deployment = Deployment::start();
    let alice = TestClient::new("alice").handle();
    let session = deployment
        .toolkit
        .create_session(&alice, &deployment.session_url("slices"), true)
        .unwrap();
    let array = session.create_byte_array(&alice, "buffer", true).unwrap();

    array.set_value_range(&alice, b"xxhelloxx", 2, 5).unwrap();
    assert_eq!(array.get_value_as_string().unwrap(), "hello");
    assert!(matches!(
        array.set_value_range(&alice, b"short", 3, 5),
        Err(JsdtError::InvalidData { .. })
    ));
    assert_eq!(array.get_value_as_string().unwrap(), "hello");
}

#[test]
fn only_members_may_set() {
    let deployment = Deployment::start();
    let alice = TestClient::new("alice").handle();
    let bob = TestClient::new("bob").handle();
    let session = deployment
        .toolkit
        .create_session(&alice, &deployment.session_url("guarded"), true)
        .unwrap();
    session.join(&bob).unwrap();
    let array = session.create_byte_array(&alice, "notes", true).unwrap();

    assert!(matches!(
        array.set_value(&bob, b"sneaky"),
        Err(JsdtError::NoSuchClient { .. })
    ));
    assert_eq!(array.get_value_as_bytes().unwrap(), vec![0]);
}

#[test]
fn destroyed_array_is_gone() {
    let deployment = Deployment::start();
    let alice = TestClient::new("alice").handle();
    let session = deployment
        .toolkit
        .create_session(&alice, &deployment.session_url("scratch"), true)
        .unwrap();
    let array = session.create_byte_array(&alice, "temp", true).unwrap();
    assert_eq!(session.list_byte_array_names().unwrap(), vec!["temp"]);

    array.destroy(&alice).unwrap();

    assert!(session.list_byte_array_names().unwrap().is_empty());
    assert!(matches!(
        array.get_value_as_bytes(),
        Err(JsdtError::NoSuchByteArray { .. })
    ));
}
