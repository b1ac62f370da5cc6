// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{fs, path::Path, time::Duration};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

use crate::cfg::enums::{Output, RotationFreq};

/// Top-level configuration for a [`crate::session::Session`] plus the
/// ambient logging/dispatch concerns around it.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Config {
    /// TCP endpoint and I/O timeouts.
    pub connection: ConnectionConfig,
    /// Credentials sent with LOGIN.
    pub login: LoginConfig,
    /// How notification/eval callbacks are run.
    pub dispatch: DispatchConfig,
    /// Logging subsystem settings.
    pub logging: LoggingConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ConnectionConfig {
    /// `host:port` of the routed service this client connects to.
    #[serde(rename = "Endpoint")]
    pub endpoint: String,

    #[serde(rename = "ConnectTimeout", with = "serde_secs")]
    pub connect_timeout: Duration,

    /// Deadline for any single request/response round trip.
    #[serde(rename = "RequestTimeout", with = "serde_secs")]
    pub request_timeout: Duration,

    /// How long `logout()` waits for the server's OK before closing the
    /// stream unilaterally.
    #[serde(rename = "LoginGracePeriod", with = "serde_secs")]
    pub login_grace_period: Duration,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct LoginConfig {
    #[serde(default, rename = "Username")]
    pub username: Option<String>,
    #[serde(default, rename = "Password")]
    pub password: Option<String>,
}

impl LoginConfig {
    /// `Some((user, pass))` when both halves of the credential pair are
    /// present, matching the `yaks.login` property's `user:pass` shape.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(u), Some(p)) => Some((u.as_str(), p.as_str())),
            _ => None,
        }
    }
}

/// Controls how NOTIFY/EVAL callbacks registered on a session are run.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct DispatchConfig {
    /// Number of worker threads backing the session's
    /// [`crate::session::Executor`]. `None` runs callbacks inline on the
    /// background receiver task, which is simplest but blocks further
    /// message processing for the callback's duration.
    #[serde(default, rename = "ExecutorThreads")]
    pub executor_threads: Option<usize>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct LoggingConfig {
    #[serde(rename = "Level")]
    pub level: String,
    #[serde(rename = "Output")]
    pub output: Output,
    #[serde(default, rename = "Json")]
    pub json: bool,
    #[serde(default, rename = "File")]
    pub file: Option<LogFileConfig>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct LogFileConfig {
    pub path: String,
    #[serde(default = "default_rotation")]
    pub rotation_frequency: RotationFreq,
}

fn default_rotation() -> RotationFreq {
    RotationFreq::Never
}

impl Config {
    /// Loads the configuration from YAML, validates it, and returns the
    /// ready-to-use value.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = fs::read_to_string(path)?;
        let mut cfg: Config =
            serde_yaml::from_str(&s).context("failed to parse config YAML")?;
        cfg.validate_and_normalize()?;
        Ok(cfg)
    }

    /// Validates invariants and normalizes derived fields.
    pub fn validate_and_normalize(&mut self) -> Result<()> {
        ensure!(!self.connection.endpoint.is_empty(), "Endpoint must not be empty");
        ensure!(
            self.connection.connect_timeout > Duration::ZERO,
            "ConnectTimeout must be > 0"
        );
        ensure!(
            self.connection.request_timeout > Duration::ZERO,
            "RequestTimeout must be > 0"
        );
        ensure!(
            self.login.username.is_some() == self.login.password.is_some(),
            "Username and Password must both be set or both be absent"
        );
        if let Some(n) = self.dispatch.executor_threads {
            ensure!(n >= 1, "ExecutorThreads must be >= 1 when set");
        }
        Ok(())
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
            login_grace_period: Duration::from_secs(5),
        }
    }
}

/// Serde helpers for representing `Duration` as a number of seconds.
mod serde_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(d)?;
        Ok(Duration::from_secs(secs))
    }
}
