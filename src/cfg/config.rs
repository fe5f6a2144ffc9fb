// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{fs, path::Path};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Config {
    /// ChronoSync group parameters.
    pub chrono: ChronoConfig,
    /// FullPSync group parameters.
    pub psync: PsyncConfig,
    /// Implementation/runtime parameters that never travel on the wire.
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

/// Parameters of a ChronoSync group.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ChronoConfig {
    /// The shared prefix sync interests are routed under,
    /// e.g. `/ndn/broadcast/app/room`.
    pub broadcast_prefix: String,

    /// This participant's application data prefix.
    pub application_data_prefix: String,

    /// Session number distinguishing restarts of the same participant.
    #[serde(default)]
    pub session_no: u64,

    /// Lifetime of the outstanding sync interest.
    #[serde(default = "default_sync_lifetime_ms")]
    pub sync_lifetime_ms: u64,

    /// Grace period before an unknown digest triggers recovery.
    #[serde(default = "default_recovery_delay_ms")]
    pub recovery_delay_ms: u64,
}

/// Parameters of a FullPSync group.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct PsyncConfig {
    /// The shared sync prefix, e.g. `/ndn/psync/topic`.
    pub sync_prefix: String,

    /// Expected number of set-difference entries; sizes the IBLT.
    #[serde(default = "default_expected_n_entries")]
    pub expected_n_entries: usize,

    /// Lifetime of sync interests; the reissue timer runs at half of it.
    #[serde(default = "default_sync_interest_lifetime_ms")]
    pub sync_interest_lifetime_ms: u64,

    /// Freshness of sync replies held in the segment store.
    #[serde(default = "default_sync_reply_freshness_ms")]
    pub sync_reply_freshness_ms: u64,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct RuntimeConfig {
    /// Optional logger config path handed to `logger::init_logger`.
    #[serde(default)]
    pub logger_config: Option<String>,
}

fn default_sync_lifetime_ms() -> u64 {
    5000
}

fn default_recovery_delay_ms() -> u64 {
    2000
}

fn default_expected_n_entries() -> usize {
    80
}

fn default_sync_interest_lifetime_ms() -> u64 {
    1000
}

fn default_sync_reply_freshness_ms() -> u64 {
    1000
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = fs::read_to_string(&path).with_context(|| {
            format!("failed to read config file {:?}", path.as_ref())
        })?;
        let config: Config = serde_yaml::from_str(&raw).with_context(|| {
            format!("failed to parse config file {:?}", path.as_ref())
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.chrono.broadcast_prefix.starts_with('/'),
            "broadcast_prefix must be an absolute name"
        );
        ensure!(
            self.chrono.application_data_prefix.starts_with('/'),
            "application_data_prefix must be an absolute name"
        );
        ensure!(
            self.psync.sync_prefix.starts_with('/'),
            "sync_prefix must be an absolute name"
        );
        ensure!(
            self.psync.expected_n_entries > 0,
            "expected_n_entries must be positive"
        );
        ensure!(
            self.chrono.sync_lifetime_ms > 0 && self.psync.sync_interest_lifetime_ms > 0,
            "interest lifetimes must be positive"
        );
        Ok(())
    }
}
