use std::{collections::HashMap, default::Default, time::Duration};

use log::warn;

pub const REGISTRY_PORT: &str = "registryPort";
pub const REGISTRY_TIME: &str = "registryTime";
pub const REGISTRY_HOST: &str = "registryHost";
pub const TIMEOUT_PERIOD: &str = "timeoutPeriod";
pub const GIVE_TIME: &str = "giveTime";
pub const AUTHENTICATION_TIME: &str = "authenticationTime";
pub const CONNECTION_TYPE: &str = "connectionType";

const DEFAULTS: [(&str, &str); 7] = [
    (REGISTRY_PORT, "4561"),
    (REGISTRY_TIME, "60"),
    (REGISTRY_HOST, "localhost"),
    (TIMEOUT_PERIOD, "15000"),
    (GIVE_TIME, "15000"),
    (AUTHENTICATION_TIME, "15000"),
    (CONNECTION_TYPE, "socket"),
];

/// Key/value property set with built-in defaults. Overrides can be set per
/// key or in bulk; removing an override reverts the key to its default.
#[derive(Clone, Debug, Default)]
pub struct Properties {
    overrides: HashMap<String, String>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.overrides
            .get(key)
            .map(String::as_str)
            .or_else(|| default_value(key))
    }

    pub fn set(&mut self, key: &str, value: &str) -> &mut Self {
        self.overrides.insert(key.to_string(), value.to_string());
        self
    }

    pub fn set_all<'a, I>(&mut self, properties: I) -> &mut Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        for (key, value) in properties {
            self.set(key, value);
        }
        self
    }

    /// Drops the override for `key`, returning the value that was removed
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.overrides.remove(key)
    }

    /// The value of `key`, or `default` if it is missing or malformed
    fn parsed<T: std::str::FromStr>(&self, key: &str, default: T) -> T {
        match self.get(key) {
            Some(value) => value.parse().unwrap_or_else(|_| {
                warn!("property {}={:?} is malformed, using default", key, value);
                default
            }),
            None => default,
        }
    }

    pub fn to_config(&self) -> Config {
        Config {
            registry_port: self.parsed(REGISTRY_PORT, 4561),
            registry_time: Duration::from_secs(self.parsed(REGISTRY_TIME, 60)),
            registry_host: self.get(REGISTRY_HOST).unwrap_or("localhost").to_string(),
            timeout_period: Duration::from_millis(self.parsed(TIMEOUT_PERIOD, 15000)),
            give_time: Duration::from_millis(self.parsed(GIVE_TIME, 15000)),
            authentication_time: Duration::from_millis(self.parsed(AUTHENTICATION_TIME, 15000)),
            connection_type: self.get(CONNECTION_TYPE).unwrap_or("socket").to_string(),
        }
    }
}

fn default_value(key: &str) -> Option<&'static str> {
    DEFAULTS
        .iter()
        .find(|(default_key, _)| *default_key == key)
        .map(|(_, value)| *value)
}

/// Contains Config properties used by the toolkit context and by servers
#[derive(Clone, Debug)]
pub struct Config {
    /// Port the Registry listens on
    pub registry_port: u16,
    /// How long to poll for a freshly started Registry to answer
    pub registry_time: Duration,
    /// Host whose Registry is used when no host is given
    pub registry_host: String,
    /// Upper bound for any blocking request
    pub timeout_period: Duration,
    /// How long a Token give may stay unresolved before it reverts
    pub give_time: Duration,
    /// Upper bound for one authentication challenge round-trip
    pub authentication_time: Duration,
    /// Connection type used when no URL names one
    pub connection_type: String,
}

impl Default for Config {
    fn default() -> Self {
        Properties::new().to_config()
    }
}
