/// INTEGRATION TESTS: Session lifecycle
///
/// Sessions are created through the Registry, hosted by whichever process
/// got to the endpoint first, and joined by Clients from any process on
/// the network.

use std::thread;

use jsdt_client::{Manageable, SessionListener};
use jsdt_shared::{ClientEvent, ClientEventKind, EventKind, JsdtError, SessionEvent};
use jsdt_test::{Deployment, EventLog, TestClient};

#[test]
fn concurrent_creates_yield_one_session() {
    let deployment = Deployment::start();
    let url = deployment.session_url("lobby");

    let creators: Vec<_> = (0..4)
        .map(|index| {
            let toolkit = deployment.new_toolkit();
            let url = url.clone();
            thread::spawn(move || {
                let client = TestClient::new(&format!("player-{}", index)).handle();
                toolkit.create_session(&client, &url, true)
            })
        })
        .collect();
    let sessions: Vec<_> = creators
        .into_iter()
        .map(|creator| creator.join().unwrap().unwrap())
        .collect();

    let bound = deployment.toolkit.naming().list().unwrap();
    assert_eq!(bound.iter().filter(|candidate| **candidate == url).count(), 1);

    let mut members = sessions[0].list_client_names().unwrap();
    members.sort();
    assert_eq!(
        members,
        vec!["player-0", "player-1", "player-2", "player-3"]
    );
    for session in &sessions {
        assert_eq!(session.url(), &url);
    }
}

#[test]
fn join_and_leave_are_announced() {
    let deployment = Deployment::start();
    let alice = TestClient::new("alice").handle();
    let bob = TestClient::new("bob").handle();
    let session = deployment
        .toolkit
        .create_session(&alice, &deployment.session_url("chat"), true)
        .unwrap();

    let log = EventLog::<SessionEvent>::new();
    session.add_listener(log.clone()).unwrap();

    session.join(&bob).unwrap();
    assert!(log
        .wait_for(|event| event.kind == EventKind::Joined && event.client == "bob")
        .is_some());
    assert!(matches!(
        session.join(&bob),
        Err(JsdtError::NameInUse { .. })
    ));

    session.leave(&bob).unwrap();
    assert!(log
        .wait_for(|event| event.kind == EventKind::Left && event.client == "bob")
        .is_some());
    assert_eq!(session.list_client_names().unwrap(), vec!["alice"]);
    assert!(matches!(
        session.leave(&bob),
        Err(JsdtError::NoSuchClient { .. })
    ));
}

#[test]
fn second_process_finds_existing_session() {
    let deployment = Deployment::start();
    let url = deployment.session_url("shared");
    let alice = TestClient::new("alice").handle();
    let first = deployment.toolkit.create_session(&alice, &url, true).unwrap();
    first.create_byte_array(&alice, "notes", false).unwrap();

    let other = deployment.new_toolkit();
    let bob = TestClient::new("bob").handle();
    assert!(other.session_exists(&url).unwrap());
    let second = other.create_session(&bob, &url, true).unwrap();

    assert_eq!(second.list_byte_array_names().unwrap(), vec!["notes"]);
    assert!(other.hosted_endpoints().is_empty());
    assert_eq!(
        deployment.toolkit.hosted_endpoints(),
        vec![deployment.session_endpoint()]
    );
}

#[test]
fn resource_creation_is_announced() {
    let deployment = Deployment::start();
    let alice = TestClient::new("alice").handle();
    let session = deployment
        .toolkit
        .create_session(&alice, &deployment.session_url("workspace"), true)
        .unwrap();
    let log = EventLog::<SessionEvent>::new();
    session.add_listener(log.clone()).unwrap();

    session.create_channel(&alice, "chat", true, true, false).unwrap();
    session.create_token(&alice, "pen", false).unwrap();

    let created = log
        .wait_for(|event| event.kind == EventKind::ChannelCreated)
        .unwrap();
    assert_eq!(created.resource.as_deref(), Some("chat"));
    assert!(log
        .wait_for(|event| event.kind == EventKind::TokenCreated)
        .is_some());
    assert!(session.channel_exists("chat").unwrap());
    assert!(!session.byte_array_exists("chat").unwrap());
}

#[test]
fn disabled_listener_events_are_not_delivered() {
    let deployment = Deployment::start();
    let alice = TestClient::new("alice").handle();
    let bob = TestClient::new("bob").handle();
    let session = deployment
        .toolkit
        .create_session(&alice, &deployment.session_url("quiet"), true)
        .unwrap();
    let log = EventLog::<SessionEvent>::new();
    let listener: std::sync::Arc<dyn SessionListener> = log.clone();
    session.add_listener(listener.clone()).unwrap();
    session
        .disable_listener_events(&listener, jsdt_shared::EventMask::JOINED)
        .unwrap();

    session.join(&bob).unwrap();
    session.leave(&bob).unwrap();
    assert!(log
        .wait_for(|event| event.kind == EventKind::Left)
        .is_some());
    assert_eq!(log.count(|event| event.kind == EventKind::Joined), 0);

    session.remove_listener(&listener).unwrap();
    assert!(matches!(
        session.remove_listener(&listener),
        Err(JsdtError::NoSuchListener)
    ));
}

#[test]
fn destroyed_session_is_unbound_and_closed() {
    let deployment = Deployment::start();
    let url = deployment.session_url("doomed");
    let alice = TestClient::new("alice").handle();
    let session = deployment.toolkit.create_session(&alice, &url, true).unwrap();

    session.destroy(&alice).unwrap();

    assert!(!deployment.toolkit.session_exists(&url).unwrap());
    assert!(!session.is_open());
    assert!(matches!(
        session.list_client_names(),
        Err(JsdtError::NoSuchSession { .. })
    ));
}

#[test]
fn session_url_must_name_a_session() {
    let deployment = Deployment::start();
    let alice = TestClient::new("alice").handle();
    let client_url = deployment.client_url("alice");
    assert!(matches!(
        deployment.toolkit.create_session(&alice, &client_url, true),
        Err(JsdtError::InvalidUrl { .. })
    ));
    let garbage = jsdt_shared::ResourceUrl::parse("not a url");
    assert!(matches!(
        deployment.toolkit.create_session(&alice, &garbage, true),
        Err(JsdtError::InvalidUrl { .. })
    ));
}

#[test]
fn concurrent_channel_creates_share_one_channel() {
    let deployment = Deployment::start();
    let url = deployment.session_url("race");
    let owner = TestClient::new("owner").handle();
    let session = deployment.toolkit.create_session(&owner, &url, true).unwrap();
    let log = EventLog::<SessionEvent>::new();
    session.add_listener(log.clone()).unwrap();

    let creators: Vec<_> = (0..4)
        .map(|index| {
            let toolkit = deployment.new_toolkit();
            let url = url.clone();
            thread::spawn(move || {
                let client = TestClient::new(&format!("racer-{}", index)).handle();
                let session = toolkit.create_session(&client, &url, true)?;
                let channel = session.create_channel(&client, "news", true, true, true)?;
                Ok::<_, JsdtError>((session, channel))
            })
        })
        .collect();
    // Held so the racers stay connected
    let _racers: Vec<_> = creators
        .into_iter()
        .map(|creator| creator.join().unwrap().unwrap())
        .collect();

    assert_eq!(session.list_channel_names().unwrap(), vec!["news"]);
    let channel = session.create_channel(&owner, "news", true, true, false).unwrap();
    assert_eq!(channel.list_client_names().unwrap().len(), 4);
    thread::sleep(std::time::Duration::from_millis(100));
    assert_eq!(log.count(|event| event.kind == EventKind::ChannelCreated), 1);
}

#[test]
fn invited_and_expelled_clients_are_told() {
    let deployment = Deployment::start();
    let alice = TestClient::new("alice").handle();
    let bob = TestClient::new("bob").handle();
    let session = deployment
        .toolkit
        .create_session(&alice, &deployment.session_url("party"), true)
        .unwrap();
    deployment
        .toolkit
        .create_client(&bob, &deployment.client_url("bob"))
        .unwrap();
    let told = EventLog::<ClientEvent>::new();
    deployment.toolkit.add_client_listener("bob", told.clone());

    session.invite(&alice, &["bob"]).unwrap();
    let invitation = told
        .wait_for(|event| event.kind == ClientEventKind::Invited)
        .unwrap();
    assert_eq!(invitation.from, "alice");
    assert_eq!(invitation.session, "party");

    session.join(&bob).unwrap();
    session.expel(&alice, &["bob"]).unwrap();
    assert!(told
        .wait_for(|event| event.kind == ClientEventKind::Expelled)
        .is_some());
    assert_eq!(session.list_client_names().unwrap(), vec!["alice"]);

    assert!(matches!(
        session.invite(&alice, &["nobody"]),
        Err(JsdtError::NoSuchClient { .. })
    ));
}

#[test]
fn closing_the_last_handle_drops_the_connection() {
    let deployment = Deployment::start();
    let url = deployment.session_url("visit");
    let alice = TestClient::new("alice").handle();
    let hosted = deployment.toolkit.create_session(&alice, &url, true).unwrap();

    let other = deployment.new_toolkit();
    let bob = TestClient::new("bob").handle();
    let visiting = other.create_session(&bob, &url, true).unwrap();
    assert!(other
        .connection_pool()
        .is_connected(&deployment.session_endpoint()));

    visiting.close(true);

    assert!(!visiting.is_open());
    assert!(matches!(
        visiting.list_client_names(),
        Err(JsdtError::NoSuchSession { .. })
    ));
    assert!(!other
        .connection_pool()
        .is_connected(&deployment.session_endpoint()));
    // The host treats the dropped connection as bob leaving
    assert!(jsdt_test::wait_until(|| hosted.list_client_names().unwrap() == vec!["alice"]));
}
