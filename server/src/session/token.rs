use std::collections::BTreeSet;

use jsdt_shared::{EventKind, GrabOutcome, JsdtError, TokenStatus};

/// Who holds a Token right now
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenState {
    NotInUse,
    Grabbed {
        holder: String,
    },
    Inhibited {
        holders: BTreeSet<String>,
    },
    /// `giver` offered the Token to `recipient`, who has not grabbed it yet.
    /// `exclusive` remembers how the giver held it.
    Giving {
        giver: String,
        recipient: String,
        exclusive: bool,
    },
}

/// A state change listeners should hear about
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenChange {
    pub kind: EventKind,
    pub client: String,
    pub recipient: Option<String>,
}

impl TokenChange {
    fn new(kind: EventKind, client: &str) -> Self {
        Self {
            kind,
            client: client.to_string(),
            recipient: None,
        }
    }
}

/// The mutual-exclusion state machine of one Token. Every transition is
/// applied by the single host serving the Token, so they are linearizable.
///
/// `generation` moves on every give and every resolution of a give, letting
/// a delayed give timeout tell whether its give is still the pending one.
#[derive(Debug)]
pub struct TokenMachine {
    name: String,
    state: TokenState,
    generation: u64,
}

impl TokenMachine {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: TokenState::NotInUse,
            generation: 0,
        }
    }

    pub fn state(&self) -> &TokenState {
        &self.state
    }

    pub fn status(&self) -> TokenStatus {
        match self.state {
            TokenState::NotInUse => TokenStatus::NotInUse,
            TokenState::Grabbed { .. } => TokenStatus::Grabbed,
            TokenState::Inhibited { .. } => TokenStatus::Inhibited,
            TokenState::Giving { .. } => TokenStatus::Giving,
        }
    }

    /// Current holders, sorted. While giving, the giver still counts.
    pub fn holders(&self) -> Vec<String> {
        match &self.state {
            TokenState::NotInUse => Vec::new(),
            TokenState::Grabbed { holder } => vec![holder.clone()],
            TokenState::Inhibited { holders } => holders.iter().cloned().collect(),
            TokenState::Giving { giver, .. } => vec![giver.clone()],
        }
    }

    pub fn grab(&mut self, client: &str, exclusive: bool) -> (GrabOutcome, Option<TokenChange>) {
        let granted_kind = if exclusive {
            EventKind::Grabbed
        } else {
            EventKind::Inhibited
        };

        match &mut self.state {
            TokenState::NotInUse => {
                self.state = if exclusive {
                    TokenState::Grabbed {
                        holder: client.to_string(),
                    }
                } else {
                    TokenState::Inhibited {
                        holders: BTreeSet::from([client.to_string()]),
                    }
                };
                (
                    GrabOutcome::Granted(self.status()),
                    Some(TokenChange::new(granted_kind, client)),
                )
            }
            TokenState::Grabbed { holder } => {
                if holder == client {
                    (GrabOutcome::Granted(TokenStatus::Grabbed), None)
                } else {
                    (GrabOutcome::Denied(TokenStatus::Grabbed), None)
                }
            }
            TokenState::Inhibited { holders } => {
                if exclusive {
                    let sole = holders.len() == 1 && holders.contains(client);
                    if !sole {
                        return (GrabOutcome::Denied(TokenStatus::Inhibited), None);
                    }
                    self.state = TokenState::Grabbed {
                        holder: client.to_string(),
                    };
                    (
                        GrabOutcome::Granted(TokenStatus::Grabbed),
                        Some(TokenChange::new(EventKind::Grabbed, client)),
                    )
                } else if holders.insert(client.to_string()) {
                    (
                        GrabOutcome::Granted(TokenStatus::Inhibited),
                        Some(TokenChange::new(EventKind::Inhibited, client)),
                    )
                } else {
                    (GrabOutcome::Granted(TokenStatus::Inhibited), None)
                }
            }
            TokenState::Giving {
                giver,
                recipient,
                exclusive: held_exclusively,
            } => {
                if recipient != client {
                    return (GrabOutcome::Denied(TokenStatus::Giving), None);
                }
                // Grabbing is how the recipient accepts
                let change = TokenChange {
                    kind: EventKind::Given,
                    client: giver.clone(),
                    recipient: Some(recipient.clone()),
                };
                let held_exclusively = *held_exclusively;
                self.state = if held_exclusively {
                    TokenState::Grabbed {
                        holder: client.to_string(),
                    }
                } else {
                    TokenState::Inhibited {
                        holders: BTreeSet::from([client.to_string()]),
                    }
                };
                self.generation += 1;
                (GrabOutcome::Granted(self.status()), Some(change))
            }
        }
    }

    pub fn release(&mut self, client: &str) -> Result<Option<TokenChange>, JsdtError> {
        match &mut self.state {
            TokenState::Grabbed { holder } if holder == client => {
                self.state = TokenState::NotInUse;
            }
            TokenState::Inhibited { holders } if holders.contains(client) => {
                holders.remove(client);
                if holders.is_empty() {
                    self.state = TokenState::NotInUse;
                }
            }
            TokenState::Giving { giver, .. } if giver == client => {
                // The giver abandons the gift
                self.state = TokenState::NotInUse;
                self.generation += 1;
            }
            TokenState::Giving { recipient, .. } if recipient == client => {
                return Ok(None);
            }
            _ => return Err(self.not_grabbing(client)),
        }
        Ok(Some(TokenChange::new(EventKind::Released, client)))
    }

    /// Starts handing the Token from `giver` to `recipient`. Returns the
    /// generation a give timeout must present to revert it.
    pub fn give(&mut self, giver: &str, recipient: &str) -> Result<u64, JsdtError> {
        let exclusive = match &self.state {
            TokenState::Grabbed { holder } if holder == giver => true,
            TokenState::Inhibited { holders } if holders.len() == 1 && holders.contains(giver) => {
                false
            }
            _ => return Err(self.not_grabbing(giver)),
        };
        if giver == recipient {
            return Err(JsdtError::InvalidClient {
                reason: format!("{:?} cannot give token {:?} to itself", giver, self.name),
            });
        }
        self.state = TokenState::Giving {
            giver: giver.to_string(),
            recipient: recipient.to_string(),
            exclusive,
        };
        self.generation += 1;
        Ok(self.generation)
    }

    /// Puts an unresolved give back with its giver. Does nothing if the give
    /// of `generation` was already resolved.
    pub fn revert_give(&mut self, generation: u64) -> bool {
        if generation != self.generation {
            return false;
        }
        let TokenState::Giving {
            giver, exclusive, ..
        } = &self.state
        else {
            return false;
        };
        let restored = if *exclusive {
            TokenState::Grabbed {
                holder: giver.clone(),
            }
        } else {
            TokenState::Inhibited {
                holders: BTreeSet::from([giver.clone()]),
            }
        };
        self.state = restored;
        self.generation += 1;
        true
    }

    /// Drops every claim `client` has on the Token, as when it leaves
    pub fn remove_client(&mut self, client: &str) -> Option<TokenChange> {
        if let TokenState::Giving { recipient, .. } = &self.state {
            if recipient == client {
                self.revert_give(self.generation);
                return None;
            }
        }
        self.release(client).ok().flatten()
    }

    pub fn is_holder(&self, client: &str) -> bool {
        match &self.state {
            TokenState::NotInUse => false,
            TokenState::Grabbed { holder } => holder == client,
            TokenState::Inhibited { holders } => holders.contains(client),
            TokenState::Giving { giver, .. } => giver == client,
        }
    }

    fn not_grabbing(&self, client: &str) -> JsdtError {
        JsdtError::ClientNotGrabbing {
            client: client.to_string(),
            token: self.name.clone(),
        }
    }
}
