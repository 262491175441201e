/// INTEGRATION TESTS: Token mutual exclusion
///
/// Exclusive grabs, shared (inhibiting) grabs, releases, and the give
/// handshake between a holder and a recipient.

use std::{sync::Arc, thread, time::Duration};

use jsdt_client::{Manageable, Session, Token, Toolkit};
use jsdt_shared::{
    Client, ClientEvent, ClientEventKind, EventKind, GrabOutcome, JsdtError, TokenEvent,
    TokenStatus,
};
use jsdt_test::{wait_until, Deployment, EventLog, TestClient};

struct Table {
    _deployment: Deployment,
    toolkit: Toolkit,
    _session: Session,
    token: Token,
    alice: Arc<dyn Client>,
    bob: Arc<dyn Client>,
}

fn table(name: &str) -> Table {
    let deployment = Deployment::start();
    let toolkit = deployment.toolkit.clone();
    let alice = TestClient::new("alice").handle();
    let bob = TestClient::new("bob").handle();
    let session = toolkit
        .create_session(&alice, &deployment.session_url(name), true)
        .unwrap();
    session.join(&bob).unwrap();
    let token = session.create_token(&alice, "pen", true).unwrap();
    token.join(&bob).unwrap();
    Table {
        _deployment: deployment,
        toolkit,
        _session: session,
        token,
        alice,
        bob,
    }
}

#[test]
fn exclusive_grab_excludes_everyone_else() {
    let table = table("exclusive");
    let token = &table.token;

    assert_eq!(
        token.grab(&table.alice, true).unwrap(),
        GrabOutcome::Granted(TokenStatus::Grabbed)
    );
    assert_eq!(
        token.grab(&table.bob, true).unwrap(),
        GrabOutcome::Denied(TokenStatus::Grabbed)
    );
    assert_eq!(
        token.grab(&table.bob, false).unwrap(),
        GrabOutcome::Denied(TokenStatus::Grabbed)
    );
    assert_eq!(token.list_holder_names().unwrap(), vec!["alice"]);

    assert_eq!(token.release(&table.alice).unwrap(), TokenStatus::NotInUse);
    assert!(token.grab(&table.bob, true).unwrap().is_granted());
    assert_eq!(token.list_holder_names().unwrap(), vec!["bob"]);
}

#[test]
fn shared_grabs_accumulate() {
    let table = table("shared");
    let token = &table.token;

    assert_eq!(
        token.grab(&table.alice, false).unwrap(),
        GrabOutcome::Granted(TokenStatus::Inhibited)
    );
    assert_eq!(
        token.grab(&table.bob, false).unwrap(),
        GrabOutcome::Granted(TokenStatus::Inhibited)
    );
    assert_eq!(token.list_holder_names().unwrap(), vec!["alice", "bob"]);
    assert_eq!(
        token.grab(&table.alice, true).unwrap(),
        GrabOutcome::Denied(TokenStatus::Inhibited)
    );

    assert_eq!(token.release(&table.bob).unwrap(), TokenStatus::Inhibited);
    // The sole remaining holder may upgrade
    assert_eq!(
        token.grab(&table.alice, true).unwrap(),
        GrabOutcome::Granted(TokenStatus::Grabbed)
    );
}

#[test]
fn release_without_grab_changes_nothing() {
    let table = table("idle");
    let token = &table.token;
    let log = EventLog::<TokenEvent>::new();
    token.add_listener(log.clone()).unwrap();

    assert!(matches!(
        token.release(&table.bob),
        Err(JsdtError::ClientNotGrabbing { .. })
    ));
    assert_eq!(token.test().unwrap(), TokenStatus::NotInUse);

    // A later grab proves the listener is live and nothing came before it
    token.grab(&table.alice, true).unwrap();
    let first = log.wait_for(|_| true).unwrap();
    assert_eq!(first.kind, EventKind::Grabbed);
    assert_eq!(log.count(|event| event.kind == EventKind::Released), 0);
}

#[test]
fn non_member_cannot_grab() {
    let table = table("outsider");
    let carol = TestClient::new("carol").handle();
    assert!(matches!(
        table.token.grab(&carol, true),
        Err(JsdtError::NoSuchClient { .. })
    ));
}

#[test]
fn give_is_accepted_by_grabbing() {
    let table = table("give");
    let token = &table.token;
    let given = EventLog::<ClientEvent>::new();
    table.toolkit.add_client_listener("bob", given.clone());
    let events = EventLog::<TokenEvent>::new();
    token.add_listener(events.clone()).unwrap();

    token.grab(&table.alice, true).unwrap();
    assert_eq!(token.give(&table.alice, "bob").unwrap(), TokenStatus::Giving);
    assert_eq!(token.test().unwrap(), TokenStatus::Giving);

    let offer = given
        .wait_for(|event| event.kind == ClientEventKind::TokenGiven)
        .unwrap();
    assert_eq!(offer.from, "alice");
    assert_eq!(offer.resource, "pen");

    assert_eq!(
        token.grab(&table.bob, true).unwrap(),
        GrabOutcome::Granted(TokenStatus::Grabbed)
    );
    assert_eq!(token.list_holder_names().unwrap(), vec!["bob"]);
    let handed = events
        .wait_for(|event| event.kind == EventKind::Given)
        .unwrap();
    assert_eq!(handed.client, "alice");
    assert_eq!(handed.recipient.as_deref(), Some("bob"));
}

#[test]
fn unanswered_give_returns_to_giver() {
    let table = table("timeout");
    let token = &table.token;

    token.grab(&table.alice, true).unwrap();
    token.give(&table.alice, "bob").unwrap();

    assert!(wait_until(|| token.test().unwrap() == TokenStatus::Grabbed));
    assert_eq!(token.list_holder_names().unwrap(), vec!["alice"]);

    // Too late to accept
    thread::sleep(Duration::from_millis(50));
    assert_eq!(
        token.grab(&table.bob, true).unwrap(),
        GrabOutcome::Denied(TokenStatus::Grabbed)
    );
}

#[test]
fn cannot_give_what_is_not_held() {
    let table = table("empty-handed");
    assert!(matches!(
        table.token.give(&table.alice, "bob"),
        Err(JsdtError::ClientNotGrabbing { .. })
    ));
}

#[test]
fn request_reaches_holder() {
    let table = table("request");
    let token = &table.token;
    let asked = EventLog::<ClientEvent>::new();
    table.toolkit.add_client_listener("alice", asked.clone());

    token.grab(&table.alice, true).unwrap();
    assert_eq!(token.request(&table.bob).unwrap(), TokenStatus::Grabbed);

    let request = asked
        .wait_for(|event| event.kind == ClientEventKind::TokenRequested)
        .unwrap();
    assert_eq!(request.from, "bob");
    assert_eq!(request.client, "alice");
}

#[test]
fn leaving_releases_held_token() {
    let table = table("leaver");
    let token = &table.token;
    token.grab(&table.bob, true).unwrap();

    token.leave(&table.bob).unwrap();

    assert_eq!(token.test().unwrap(), TokenStatus::NotInUse);
    assert!(token.grab(&table.alice, true).unwrap().is_granted());
}
