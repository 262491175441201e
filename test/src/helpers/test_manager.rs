use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use jsdt_shared::{AuthenticationInfo, Client, ManagerHandle, ResourceManager};

/// Challenges the Client and grants the action only if it answers with the
/// password
pub struct PasswordManager {
    password: Vec<u8>,
    issued: AtomicUsize,
}

impl PasswordManager {
    pub fn new(password: &str) -> Arc<Self> {
        Arc::new(Self {
            password: password.as_bytes().to_vec(),
            issued: AtomicUsize::new(0),
        })
    }

    pub fn handle(self: &Arc<Self>) -> ManagerHandle {
        ManagerHandle::new(self.clone())
    }

    pub fn issued(&self) -> usize {
        self.issued.load(Ordering::SeqCst)
    }
}

impl ResourceManager for PasswordManager {
    fn authorize(&self, info: &mut AuthenticationInfo, client: &dyn Client) -> bool {
        let nonce = self.issued.fetch_add(1, Ordering::SeqCst);
        info.set_challenge(nonce.to_be_bytes().to_vec());
        client.authenticate(info).as_deref() == Some(self.password.as_slice())
    }
}

/// Refuses everything it is asked about
#[derive(Default)]
pub struct DenyAll {
    asked: AtomicUsize,
}

impl DenyAll {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn handle(self: &Arc<Self>) -> ManagerHandle {
        ManagerHandle::new(self.clone())
    }

    pub fn asked(&self) -> usize {
        self.asked.load(Ordering::SeqCst)
    }
}

impl ResourceManager for DenyAll {
    fn authorize(&self, _info: &mut AuthenticationInfo, _client: &dyn Client) -> bool {
        self.asked.fetch_add(1, Ordering::SeqCst);
        false
    }
}
