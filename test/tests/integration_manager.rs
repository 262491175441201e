/// INTEGRATION TESTS: Managers
///
/// A manager attached to a resource decides joins, creations and
/// destructions, and may challenge the Client before deciding.

use std::{thread, time::Duration};

use jsdt_client::Manageable;
use jsdt_shared::{EventKind, JsdtError, ManagerMask, SessionEvent, TokenEvent};
use jsdt_test::{DenyAll, Deployment, EventLog, PasswordManager, TestClient};

#[test]
fn refused_join_leaves_no_trace() {
    let deployment = Deployment::start();
    let manager = DenyAll::new();
    let alice = TestClient::new("alice").handle();
    let bob = TestClient::new("bob").handle();
    let session = deployment
        .toolkit
        .create_session_managed(
            &alice,
            &deployment.session_url("vault"),
            false,
            &manager.handle(),
        )
        .unwrap();
    assert!(session.is_managed().unwrap());
    let log = EventLog::<SessionEvent>::new();
    session.add_listener(log.clone()).unwrap();

    assert!(matches!(
        session.join(&bob),
        Err(JsdtError::PermissionDenied { .. })
    ));
    assert!(manager.asked() > 0);
    assert!(session.list_client_names().unwrap().is_empty());

    thread::sleep(Duration::from_millis(100));
    assert_eq!(log.count(|event| event.kind == EventKind::Joined), 0);
}

#[test]
fn password_challenge_decides_join() {
    let deployment = Deployment::start();
    let manager = PasswordManager::new("open sesame");
    let owner = TestClient::with_password("owner", "open sesame");
    let guest = TestClient::with_password("guest", "open sesame");
    let intruder = TestClient::with_password("intruder", "guess");
    let session = deployment
        .toolkit
        .create_session_managed(
            &owner.handle(),
            &deployment.session_url("club"),
            true,
            &manager.handle(),
        )
        .unwrap();

    session.join(&guest.handle()).unwrap();
    assert!(guest.challenges() > 0);
    assert!(matches!(
        session.join(&intruder.handle()),
        Err(JsdtError::PermissionDenied { .. })
    ));
    assert!(intruder.challenges() > 0);

    let mut members = session.list_client_names().unwrap();
    members.sort();
    assert_eq!(members, vec!["guest", "owner"]);
}

#[test]
fn disabled_manager_events_skip_the_manager() {
    let deployment = Deployment::start();
    let manager = DenyAll::new();
    let handle = manager.handle();
    let alice = TestClient::new("alice").handle();
    let session = deployment
        .toolkit
        .create_session_managed(&alice, &deployment.session_url("open-door"), false, &handle)
        .unwrap();

    session
        .disable_manager_events(&handle, ManagerMask::JOIN)
        .unwrap();
    session.join(&alice).unwrap();
    assert_eq!(manager.asked(), 0);

    // Creation is still guarded
    assert!(matches!(
        session.create_token(&alice, "pen", false),
        Err(JsdtError::PermissionDenied { .. })
    ));

    let stranger = DenyAll::new().handle();
    assert!(matches!(
        session.enable_manager_events(&stranger, ManagerMask::JOIN),
        Err(JsdtError::NoSuchManager { .. })
    ));
}

#[test]
fn existing_resource_only_accepts_its_own_manager() {
    let deployment = Deployment::start();
    let url = deployment.session_url("owned");
    let manager = PasswordManager::new("pw").handle();
    let owner = TestClient::with_password("owner", "pw").handle();
    deployment
        .toolkit
        .create_session_managed(&owner, &url, false, &manager)
        .unwrap();

    let again = deployment
        .toolkit
        .create_session_managed(&owner, &url, false, &manager)
        .unwrap();
    assert!(deployment.toolkit.session_managed(&url).unwrap());

    let rival = DenyAll::new().handle();
    assert!(matches!(
        deployment
            .toolkit
            .create_session_managed(&owner, &url, false, &rival),
        Err(JsdtError::ManagerExists { .. })
    ));
    drop(again);
}

#[test]
fn managed_token_guards_its_joins() {
    let deployment = Deployment::start();
    let alice = TestClient::new("alice").handle();
    let session = deployment
        .toolkit
        .create_session(&alice, &deployment.session_url("tokens"), true)
        .unwrap();
    let manager = DenyAll::new();
    let token = session
        .create_token_managed(&alice, "crown", false, &manager.handle())
        .unwrap();
    assert!(session.token_managed("crown").unwrap());
    assert!(!session.token_managed("missing").unwrap_or(false));

    let log = EventLog::<TokenEvent>::new();
    token.add_listener(log.clone()).unwrap();
    assert!(matches!(
        token.join(&alice),
        Err(JsdtError::PermissionDenied { .. })
    ));
    assert!(session.get_tokens_joined(&alice).unwrap().is_empty());
    assert_eq!(log.count(|event| event.kind == EventKind::Joined), 0);
}
