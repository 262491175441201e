use std::{
    net::{IpAddr, Ipv4Addr},
    sync::Arc,
    time::Duration,
};

use jsdt_client::Toolkit;
use jsdt_shared::{
    properties::{
        GIVE_TIME, REGISTRY_HOST, REGISTRY_PORT as REGISTRY_PORT_KEY, REGISTRY_TIME,
        TIMEOUT_PERIOD,
    },
    transport::{Endpoint, LocalNetwork},
    Properties, ResourceUrl,
};

pub const HOST: &str = "127.0.0.1";
pub const REGISTRY_PORT: u16 = 4561;
pub const SESSION_PORT: u16 = 4600;
pub const CONNECTION_TYPE: &str = "socket";

/// Upper bound tests wait for anything asynchronous
pub const WAIT: Duration = Duration::from_secs(5);

/// A whole deployment inside one test: an in-process network and a
/// Toolkit that runs the Registry on it. Further toolkits on the same
/// network stand in for other processes.
pub struct Deployment {
    pub network: Arc<LocalNetwork>,
    pub toolkit: Toolkit,
}

impl Deployment {
    pub fn start() -> Self {
        let deployment = Self::without_registry();
        if let Err(error) = deployment.toolkit.start_registry() {
            panic!("registry did not start: {}", error);
        }
        deployment
    }

    pub fn without_registry() -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let network = LocalNetwork::new();
        let toolkit = Toolkit::new(network.clone(), &Self::properties());
        Self { network, toolkit }
    }

    /// Short timeouts so failure paths finish quickly
    pub fn properties() -> Properties {
        let mut properties = Properties::new();
        properties
            .set(REGISTRY_HOST, HOST)
            .set(REGISTRY_PORT_KEY, &REGISTRY_PORT.to_string())
            .set(REGISTRY_TIME, "2")
            .set(TIMEOUT_PERIOD, "2000")
            .set(GIVE_TIME, "300");
        properties
    }

    /// Another process on the same network
    pub fn new_toolkit(&self) -> Toolkit {
        Toolkit::new(self.network.clone(), &Self::properties())
    }

    pub fn session_url(&self, name: &str) -> ResourceUrl {
        ResourceUrl::session(HOST, SESSION_PORT, CONNECTION_TYPE, name)
    }

    pub fn client_url(&self, name: &str) -> ResourceUrl {
        ResourceUrl::client(HOST, SESSION_PORT, CONNECTION_TYPE, name)
    }

    pub fn session_endpoint(&self) -> Endpoint {
        Endpoint::new(IpAddr::V4(Ipv4Addr::LOCALHOST), SESSION_PORT, CONNECTION_TYPE)
    }

    pub fn registry_endpoint(&self) -> Endpoint {
        Endpoint::new(IpAddr::V4(Ipv4Addr::LOCALHOST), REGISTRY_PORT, CONNECTION_TYPE)
    }
}
