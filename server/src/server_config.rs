use std::{default::Default, time::Duration};

use jsdt_shared::Config;

/// Contains Config properties which will be used by a Session host or a
/// Registry
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Upper bound for one authentication challenge round-trip to a Client
    pub authentication_time: Duration,
    /// How long a Token give may stay unresolved before it reverts to the
    /// giver
    pub give_time: Duration,
}

impl From<&Config> for ServerConfig {
    fn from(config: &Config) -> Self {
        Self {
            authentication_time: config.authentication_time,
            give_time: config.give_time,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}
