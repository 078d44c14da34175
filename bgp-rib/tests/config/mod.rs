//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::rc::Rc;
use std::time::Duration;

use bgp_rib::af::Safi;
use bgp_rib::config::{Config, DampingCfg};
use bgp_rib::error::{ConfigError, Error};
use bgp_rib::plumbing::BgpPlumbing;
use bgp_rib::table::nhlookup::DirectResolver;
use const_addrs::net;

use crate::init_tracing;

#[test]
fn test_config_defaults() {
    let config = Config::parse("").unwrap();
    assert_eq!(config.safi, Safi::Unicast);
    assert!(config.ipv6);
    assert!(config.aggregates.is_empty());
    assert!(config.aggregate_policies().is_empty());
    assert_eq!(config.damping, DampingCfg::default());
    assert!(!config.damping.enabled);
}

#[test]
fn test_config_aggregates() {
    let config = Config::parse(
        r#"
        safi = "multicast"

        [[aggregates]]
        prefix = "10.0.0.0/8"

        [[aggregates]]
        prefix = "2001:db8::/32"
        summary_only = true
        "#,
    )
    .unwrap();
    assert_eq!(config.safi, Safi::Multicast);
    assert_eq!(config.aggregates.len(), 2);
    assert_eq!(config.aggregates[0].prefix, net!("10.0.0.0/8"));
    assert!(!config.aggregates[0].summary_only);
    assert_eq!(config.aggregates[1].prefix, net!("2001:db8::/32"));
    assert!(config.aggregates[1].summary_only);

    let policies = config.aggregate_policies();
    assert_eq!(policies.len(), 2);
    assert!(policies[1].summary_only);
}

#[test]
fn test_config_unknown_field() {
    let result = Config::parse("ipv4 = false");
    assert!(matches!(result, Err(ConfigError::Parse(_))));

    let result = Config::parse(
        r#"
        [[aggregates]]
        prefix = "10.0.0.0/8"
        as_set = true
        "#,
    );
    assert!(matches!(result, Err(ConfigError::Parse(_))));
}

#[test]
fn test_config_invalid_aggregate() {
    // Host bits set.
    let result = Config::parse(
        r#"
        [[aggregates]]
        prefix = "10.1.0.0/8"
        "#,
    );
    assert!(matches!(
        result,
        Err(ConfigError::InvalidAggregate(prefix))
            if prefix == net!("10.1.0.0/8")
    ));

    // Address family disabled.
    let result = Config::parse(
        r#"
        ipv6 = false

        [[aggregates]]
        prefix = "2001:db8::/32"
        "#,
    );
    assert!(matches!(result, Err(ConfigError::InvalidAggregate(_))));
}

#[test]
fn test_config_missing_file() {
    let result = Config::load(Some("/nonexistent/bgp-rib.toml"));
    assert!(matches!(result, Err(ConfigError::Io(path, _))
        if path == "/nonexistent/bgp-rib.toml"));
}

#[test]
fn test_config_damping() {
    let config = Config::parse(
        r#"
        [damping]
        enabled = true
        suppress = 1500
        "#,
    )
    .unwrap();
    let damping = config.damping;
    assert!(damping.enabled);
    assert_eq!(damping.suppress, 1500);
    assert_eq!(damping.half_life, 15);
    assert_eq!(damping.max_suppress, 60);
    assert_eq!(damping.reuse, 750);
    assert_eq!(damping.penalty, 1000);

    // Four half-lives fit in the maximum suppression time.
    assert_eq!(damping.ceiling(), 12000);
    assert_eq!(damping.decay(2000, Duration::from_secs(15 * 60)), 1000);
    assert_eq!(damping.decay(2000, Duration::ZERO), 2000);
}

#[test]
fn test_config_invalid_damping() {
    let result = Config::parse(
        r#"
        [damping]
        reuse = 3000
        "#,
    );
    assert!(matches!(result, Err(ConfigError::InvalidDamping(_))));

    let result = Config::parse(
        r#"
        [damping]
        half_life = 0
        "#,
    );
    assert!(matches!(result, Err(ConfigError::InvalidDamping(_))));

    let result = Config::parse(
        r#"
        [damping]
        max_suppress = 10
        "#,
    );
    assert!(matches!(result, Err(ConfigError::InvalidDamping(_))));

    let result = Config::parse(
        r#"
        [damping]
        reuse_limit = 800
        "#,
    );
    assert!(matches!(result, Err(ConfigError::Parse(_))));
}

#[test]
fn test_plumbing_load() {
    init_tracing();
    let result =
        BgpPlumbing::load(Some("/nonexistent/bgp-rib.toml"), resolver());
    assert!(matches!(
        result,
        Err(Error::ConfigError(ConfigError::Io(path, _)))
            if path == "/nonexistent/bgp-rib.toml"
    ));

    let path = std::env::temp_dir()
        .join(format!("bgp-rib-{}.toml", std::process::id()));
    std::fs::write(&path, "ipv6 = false\n").unwrap();
    let result = BgpPlumbing::load(path.to_str(), resolver());
    std::fs::remove_file(&path).unwrap();
    let rib = result.unwrap();
    assert!(rib.ipv6.is_none());
}

// ===== helper functions =====

fn resolver() -> Rc<DirectResolver> {
    Rc::new(DirectResolver)
}
