/// PROPERTY-BASED TESTS: Token state machine
///
/// Drives a TokenMachine through random operation sequences.
///
/// Key invariants:
/// 1. Grabbed has exactly one holder, Inhibited at least one, NotInUse none
/// 2. A granted exclusive grab leaves the grabber as sole holder
/// 3. A failed operation never changes the state

use proptest::prelude::*;
use jsdt_server::{TokenMachine, TokenState};
use jsdt_shared::TokenStatus;

const CLIENTS: [&str; 3] = ["alice", "bob", "carol"];

#[derive(Clone, Debug)]
enum Op {
    Grab(usize, bool),
    Release(usize),
    Give(usize, usize),
    Revert,
    Leave(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..CLIENTS.len(), any::<bool>())
            .prop_map(|(client, exclusive)| Op::Grab(client, exclusive)),
        (0..CLIENTS.len()).prop_map(Op::Release),
        (0..CLIENTS.len(), 0..CLIENTS.len())
            .prop_map(|(giver, recipient)| Op::Give(giver, recipient)),
        Just(Op::Revert),
        (0..CLIENTS.len()).prop_map(Op::Leave),
    ]
}

fn check_holders(token: &TokenMachine) -> Result<(), TestCaseError> {
    let holders = token.holders();
    match token.status() {
        TokenStatus::NotInUse => prop_assert!(holders.is_empty()),
        TokenStatus::Grabbed | TokenStatus::Giving => prop_assert_eq!(holders.len(), 1),
        TokenStatus::Inhibited => prop_assert!(!holders.is_empty()),
    }
    let mut sorted = holders.clone();
    sorted.sort();
    sorted.dedup();
    prop_assert_eq!(sorted, holders);
    Ok(())
}

proptest! {
    #[test]
    fn prop_holder_counts_match_status(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let mut token = TokenMachine::new("pen");
        let mut generation = 0;

        for op in ops {
            let before = token.state().clone();
            match op {
                Op::Grab(client, exclusive) => {
                    let (outcome, _) = token.grab(CLIENTS[client], exclusive);
                    if outcome.is_granted() {
                        prop_assert!(token.is_holder(CLIENTS[client]));
                        if exclusive {
                            prop_assert_eq!(token.holders(), vec![CLIENTS[client].to_string()]);
                        }
                    } else {
                        prop_assert_eq!(token.state(), &before);
                    }
                }
                Op::Release(client) => {
                    if token.release(CLIENTS[client]).is_err() {
                        prop_assert_eq!(token.state(), &before);
                    }
                }
                Op::Give(giver, recipient) => match token.give(CLIENTS[giver], CLIENTS[recipient]) {
                    Ok(next) => {
                        prop_assert_eq!(token.status(), TokenStatus::Giving);
                        generation = next;
                    }
                    Err(_) => prop_assert_eq!(token.state(), &before),
                },
                Op::Revert => {
                    if token.revert_give(generation) {
                        let reverted = matches!(
                            token.state(),
                            TokenState::Grabbed { .. } | TokenState::Inhibited { .. }
                        );
                        prop_assert!(reverted);
                    } else {
                        prop_assert_eq!(token.state(), &before);
                    }
                }
                Op::Leave(client) => {
                    token.remove_client(CLIENTS[client]);
                    let left = !token.is_holder(CLIENTS[client])
                        || matches!(before, TokenState::Giving { .. });
                    prop_assert!(left);
                }
            }
            check_holders(&token)?;
        }
    }

    #[test]
    fn prop_release_by_non_holder_fails(client in 0..CLIENTS.len(), holder in 0..CLIENTS.len()) {
        prop_assume!(client != holder);
        let mut token = TokenMachine::new("pen");
        token.grab(CLIENTS[holder], true);
        prop_assert!(token.release(CLIENTS[client]).is_err());
        prop_assert_eq!(token.holders(), vec![CLIENTS[holder].to_string()]);
    }
}
