/// INTEGRATION TESTS: Channel data delivery
///
/// Data reaches a Client either through its consumers or, without one,
/// through a mailbox that yields higher priorities first.

use std::{sync::Arc, time::Duration};

use jsdt_client::{Channel, ChannelConsumer, Manageable, Session};
use jsdt_shared::{
    ChannelEvent, ChannelMode, Client, ClientEvent, ClientEventKind, Data, EventKind, JsdtError,
    Priority,
};
use jsdt_test::{Deployment, EventLog, TestClient};

struct Room {
    deployment: Deployment,
    session: Session,
    channel: Channel,
    alice: Arc<dyn Client>,
    bob: Arc<dyn Client>,
}

fn room(name: &str, reliable: bool) -> Room {
    let deployment = Deployment::start();
    let alice = TestClient::new("alice").handle();
    let bob = TestClient::new("bob").handle();
    let session = deployment
        .toolkit
        .create_session(&alice, &deployment.session_url(name), true)
        .unwrap();
    session.join(&bob).unwrap();
    let channel = session
        .create_channel(&alice, "chat", reliable, true, true)
        .unwrap();
    channel.join(&bob).unwrap();
    Room {
        deployment,
        session,
        channel,
        alice,
        bob,
    }
}

fn payload(text: &str, priority: Priority) -> Data {
    Data::from_string(text).with_priority(priority)
}

#[test]
fn mailbox_yields_by_priority_then_arrival() {
    let room = room("priorities", true);
    let channel = &room.channel;
    let events = EventLog::<ChannelEvent>::new();
    channel.add_listener(events.clone()).unwrap();

    channel
        .send_to_others(&room.alice, payload("low-1", Priority::Low))
        .unwrap();
    channel
        .send_to_others(&room.alice, payload("top", Priority::Top))
        .unwrap();
    channel
        .send_to_others(&room.alice, payload("low-2", Priority::Low))
        .unwrap();
    channel
        .send_to_others(&room.alice, payload("high", Priority::High))
        .unwrap();

    // Events and data share one delivery order, so once carol's join is
    // seen every payload has reached the mailbox
    let carol = TestClient::new("carol").handle();
    room.session.join(&carol).unwrap();
    channel.join(&carol).unwrap();
    assert!(events
        .wait_for(|event| event.kind == EventKind::Joined && event.client == "carol")
        .is_some());

    let received: Vec<String> = (0..4)
        .map(|_| channel.receive(&room.bob).unwrap().as_string())
        .collect();
    assert_eq!(received, vec!["top", "high", "low-1", "low-2"]);
    assert!(!channel.data_available(&room.bob).unwrap());
    assert!(!channel.data_available(&room.alice).unwrap());
}

#[test]
fn received_data_is_stamped() {
    let room = room("stamps", true);
    room.channel
        .send_to_all(&room.alice, Data::from_string("hello"))
        .unwrap();

    let data = room
        .channel
        .receive_within(&room.bob, Duration::from_secs(5))
        .unwrap()
        .unwrap();
    assert_eq!(data.sender_name(), "alice");
    assert_eq!(data.channel_name(), "chat");
    assert_eq!(data.priority(), Priority::Medium);

    // send_to_all includes the sender
    let echo = room
        .channel
        .receive_within(&room.alice, Duration::from_secs(5))
        .unwrap();
    assert_eq!(echo.map(|data| data.as_string()).as_deref(), Some("hello"));
}

#[test]
fn receive_within_times_out_empty() {
    let room = room("silence", true);
    assert_eq!(
        room.channel
            .receive_within(&room.bob, Duration::from_millis(50))
            .unwrap(),
        None
    );
}

#[test]
fn consumers_take_data_ahead_of_mailbox() {
    let room = room("consumers", true);
    let channel = &room.channel;
    let consumed = EventLog::<Data>::new();
    let consumer: Arc<dyn ChannelConsumer> = consumed.clone();
    let events = EventLog::<ChannelEvent>::new();
    channel.add_listener(events.clone()).unwrap();

    channel.add_consumer(&room.bob, consumer.clone()).unwrap();
    assert!(events
        .wait_for(|event| event.kind == EventKind::ConsumerAdded && event.client == "bob")
        .is_some());

    channel
        .send_to_client(&room.alice, "bob", Data::from_string("direct"))
        .unwrap();
    let data = consumed.wait_for(|_| true).unwrap();
    assert_eq!(data.as_string(), "direct");
    assert!(!channel.data_available(&room.bob).unwrap());

    channel.remove_consumer(&room.bob, &consumer).unwrap();
    assert!(matches!(
        channel.remove_consumer(&room.bob, &consumer),
        Err(JsdtError::NoSuchConsumer { .. })
    ));
    assert!(matches!(
        channel.send_to_client(&room.alice, "bob", Data::from_string("gone")),
        Err(JsdtError::NoSuchConsumer { .. })
    ));
}

#[test]
fn unreliable_channel_keeps_its_options() {
    let room = room("lossy", false);
    assert!(!room.channel.is_reliable());
    assert!(room.channel.is_ordered());

    // A second handle learns the options from the host
    let again = room
        .session
        .create_channel(&room.bob, "chat", true, false, false)
        .unwrap();
    assert!(!again.is_reliable());
    assert!(again.is_ordered());

    again
        .send_to_others(&room.bob, Data::from_string("maybe"))
        .unwrap();
    let data = room
        .channel
        .receive_within(&room.alice, Duration::from_secs(5))
        .unwrap();
    assert_eq!(data.map(|data| data.as_string()).as_deref(), Some("maybe"));
}

#[test]
fn receiving_requires_membership() {
    let room = room("members-only", true);
    let carol = TestClient::new("carol").handle();
    assert!(matches!(
        room.channel.receive_within(&carol, Duration::from_millis(10)),
        Err(JsdtError::NoSuchClient { .. })
    ));
}

#[test]
fn leaving_closes_the_mailbox() {
    let room = room("leave", true);
    room.channel.leave(&room.bob).unwrap();
    assert!(matches!(
        room.channel.data_available(&room.bob),
        Err(JsdtError::NoSuchClient { .. })
    ));
    assert_eq!(room.channel.list_client_names().unwrap(), vec!["alice"]);
}

#[test]
fn rejoined_client_gets_its_consumers_back() {
    let room = room("rejoin", true);
    let channel = &room.channel;
    let first = EventLog::<Data>::new();
    let first_consumer: Arc<dyn ChannelConsumer> = first.clone();
    channel.add_consumer(&room.bob, first_consumer.clone()).unwrap();

    // The host forgets bob's consumers when bob leaves, and so does bob
    channel.leave(&room.bob).unwrap();
    assert!(matches!(
        channel.remove_consumer(&room.bob, &first_consumer),
        Err(JsdtError::NoSuchConsumer { .. })
    ));

    channel.join(&room.bob).unwrap();
    let second = EventLog::<Data>::new();
    channel.add_consumer(&room.bob, second.clone()).unwrap();
    channel
        .send_to_client(&room.alice, "bob", Data::from_string("welcome back"))
        .unwrap();
    let data = second.wait_for(|_| true).unwrap();
    assert_eq!(data.as_string(), "welcome back");
    assert!(first.events().is_empty());
}

#[test]
fn expelled_client_starts_without_consumers() {
    let room = room("expel-consumers", true);
    let channel = &room.channel;
    let consumed = EventLog::<Data>::new();
    let consumer: Arc<dyn ChannelConsumer> = consumed.clone();
    let events = EventLog::<ChannelEvent>::new();
    channel.add_listener(events.clone()).unwrap();
    channel.add_consumer(&room.bob, consumer.clone()).unwrap();

    let expulsions = EventLog::<ClientEvent>::new();
    room.deployment
        .toolkit
        .add_client_listener("bob", expulsions.clone());

    channel.expel(&room.alice, &["bob"]).unwrap();
    assert!(events
        .wait_for(|event| event.kind == EventKind::Expelled && event.client == "bob")
        .is_some());
    // Client listeners hear of the expulsion after bob's consumers are gone
    assert!(expulsions
        .wait_for(|event| event.kind == ClientEventKind::Expelled)
        .is_some());
    assert!(matches!(
        channel.remove_consumer(&room.bob, &consumer),
        Err(JsdtError::NoSuchConsumer { .. })
    ));

    channel.join(&room.bob).unwrap();
    channel.add_consumer(&room.bob, consumer).unwrap();
    channel
        .send_to_client(&room.alice, "bob", Data::from_string("again"))
        .unwrap();
    assert_eq!(consumed.wait_for(|_| true).unwrap().as_string(), "again");
}

#[test]
fn unreliable_sends_report_refusals() {
    let room = room("lossy-refusals", false);
    let channel = &room.channel;

    let dave = TestClient::new("dave").handle();
    room.session.join(&dave).unwrap();
    channel.join_with_mode(&dave, ChannelMode::ReadOnly).unwrap();
    assert!(matches!(
        channel.send_to_all(&dave, Data::from_string("shh")),
        Err(JsdtError::PermissionDenied { .. })
    ));

    let carol = TestClient::new("carol").handle();
    assert!(matches!(
        channel.send_to_others(&carol, Data::from_string("let me in")),
        Err(JsdtError::NoSuchClient { .. })
    ));

    assert!(matches!(
        channel.send_to_client(&room.alice, "bob", Data::from_string("nobody home")),
        Err(JsdtError::NoSuchConsumer { .. })
    ));
}

#[test]
fn recreated_channel_starts_fresh() {
    let room = room("recreate", true);
    let events = EventLog::<ChannelEvent>::new();
    room.channel.add_listener(events.clone()).unwrap();
    room.channel.destroy(&room.alice).unwrap();
    assert!(events
        .wait_for(|event| event.kind == EventKind::Destroyed)
        .is_some());
    assert!(matches!(
        room.channel.data_available(&room.bob),
        Err(JsdtError::NoSuchClient { .. })
    ));

    let channel = room
        .session
        .create_channel(&room.alice, "chat", true, true, true)
        .unwrap();
    channel.join(&room.bob).unwrap();
    channel
        .send_to_others(&room.alice, Data::from_string("round two"))
        .unwrap();
    let data = channel
        .receive_within(&room.bob, Duration::from_secs(5))
        .unwrap();
    assert_eq!(data.map(|data| data.as_string()).as_deref(), Some("round two"));

    // The listener belonged to the destroyed Channel
    let joined = events
        .events()
        .iter()
        .filter(|event| event.kind == EventKind::Joined)
        .count();
    assert_eq!(joined, 0);
}
