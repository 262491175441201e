use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use jsdt_shared::{AuthenticationInfo, Client};

/// A Client that answers every challenge with a fixed password, or with
/// nothing when it has none
pub struct TestClient {
    name: String,
    password: Option<Vec<u8>>,
    challenges: AtomicUsize,
}

impl TestClient {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            password: None,
            challenges: AtomicUsize::new(0),
        })
    }

    pub fn with_password(name: &str, password: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            password: Some(password.as_bytes().to_vec()),
            challenges: AtomicUsize::new(0),
        })
    }

    /// The same Client as the handle toolkit operations take
    pub fn handle(self: &Arc<Self>) -> Arc<dyn Client> {
        self.clone()
    }

    /// How many challenges this Client has answered
    pub fn challenges(&self) -> usize {
        self.challenges.load(Ordering::SeqCst)
    }
}

impl Client for TestClient {
    fn name(&self) -> &str {
        &self.name
    }

    fn authenticate(&self, info: &AuthenticationInfo) -> Option<Vec<u8>> {
        if info.challenge().is_some() {
            self.challenges.fetch_add(1, Ordering::SeqCst);
        }
        self.password.clone()
    }
}
