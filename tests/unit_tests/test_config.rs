// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;
use ndn_sync_rs::cfg::{cli::resolve_config_path, config::Config};

#[test]
fn test_load_config() -> Result<()> {
    let path = resolve_config_path("tests/config.yaml")?;
    let config = Config::load_from_file(path)?;

    assert_eq!(config.chrono.broadcast_prefix, "/ndn/broadcast/app/room");
    assert_eq!(config.chrono.application_data_prefix, "/ndn/app/alice");
    assert_eq!(config.chrono.session_no, 0);
    assert_eq!(config.chrono.sync_lifetime_ms, 5000);
    assert_eq!(config.chrono.recovery_delay_ms, 2000);

    assert_eq!(config.psync.sync_prefix, "/ndn/psync/topic");
    assert_eq!(config.psync.expected_n_entries, 40);
    assert_eq!(config.psync.sync_interest_lifetime_ms, 1000);
    assert_eq!(config.psync.sync_reply_freshness_ms, 1000);
    Ok(())
}

#[test]
fn test_relative_prefix_is_rejected() -> Result<()> {
    let yaml = r#"
chrono:
  broadcast_prefix: "ndn/broadcast"
  application_data_prefix: "/ndn/app/alice"
psync:
  sync_prefix: "/ndn/psync/topic"
"#;
    let config: Config = serde_yaml::from_str(yaml)?;
    assert!(config.validate().is_err());
    Ok(())
}
