//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::time::Duration;

use bgp_rib_utils::ip::IpNetworkExt;
use ipnetwork::IpNetwork;
use serde::Deserialize;

use crate::af::Safi;
use crate::error::ConfigError;
use crate::policy::AggregatePolicy;

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub safi: Safi,
    pub ipv6: bool,
    pub aggregates: Vec<AggregateCfg>,
    pub damping: DampingCfg,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AggregateCfg {
    pub prefix: IpNetwork,
    #[serde(default)]
    pub summary_only: bool,
}

// Route flap damping parameters.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct DampingCfg {
    pub enabled: bool,
    // Time, in minutes, for the figure of merit to halve.
    pub half_life: u32,
    // Longest time, in minutes, a route can stay suppressed.
    pub max_suppress: u32,
    pub reuse: u32,
    pub suppress: u32,
    // Penalty of a withdrawal. Attribute changes cost half as much.
    pub penalty: u32,
}

// ===== impl Config =====

impl Config {
    pub const DFLT_FILEPATH: &'static str = "/etc/bgp-rib.toml";

    // Loads the configuration from the given file, or from the default
    // location if none is given.
    pub fn load(path: Option<&str>) -> Result<Config, ConfigError> {
        let path = path.unwrap_or(Config::DFLT_FILEPATH);
        let config_str = std::fs::read_to_string(path)
            .map_err(|error| ConfigError::Io(path.to_owned(), error))?;
        Config::parse(&config_str)
    }

    // Parses a configuration in TOML format.
    pub fn parse(config_str: &str) -> Result<Config, ConfigError> {
        let config: Config =
            toml::from_str(config_str).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    // Returns the source-match policies implementing the configured
    // aggregates.
    pub fn aggregate_policies(&self) -> Vec<AggregatePolicy> {
        self.aggregates
            .iter()
            .map(|aggr| AggregatePolicy::new(aggr.prefix, aggr.summary_only))
            .collect()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for aggr in &self.aggregates {
            if aggr.prefix.apply_mask() != aggr.prefix {
                return Err(ConfigError::InvalidAggregate(aggr.prefix));
            }
            if aggr.prefix.is_ipv6() && !self.ipv6 {
                return Err(ConfigError::InvalidAggregate(aggr.prefix));
            }
        }
        self.damping.validate()
    }
}

impl Default for Config {
    fn default() -> Config {
        Config {
            safi: Safi::Unicast,
            ipv6: true,
            aggregates: Default::default(),
            damping: Default::default(),
        }
    }
}

// ===== impl DampingCfg =====

impl DampingCfg {
    pub fn half_life(&self) -> Duration {
        Duration::from_secs(u64::from(self.half_life) * 60)
    }

    // Returns the highest figure of merit a route can reach, which decays
    // to the reuse threshold in `max_suppress` minutes.
    pub fn ceiling(&self) -> u32 {
        let half_lives =
            f64::from(self.max_suppress) / f64::from(self.half_life);
        let ceiling = f64::from(self.reuse) * half_lives.exp2();
        ceiling.min(f64::from(u32::MAX)) as u32
    }

    // Decays a figure of merit over the given time.
    pub fn decay(&self, merit: u32, elapsed: Duration) -> u32 {
        let half_lives =
            elapsed.as_secs_f64() / self.half_life().as_secs_f64();
        (f64::from(merit) * (-half_lives).exp2()) as u32
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.half_life == 0
            || self.max_suppress < self.half_life
            || self.reuse == 0
            || self.reuse >= self.suppress
        {
            return Err(ConfigError::InvalidDamping(*self));
        }
        Ok(())
    }
}

impl Default for DampingCfg {
    fn default() -> DampingCfg {
        DampingCfg {
            enabled: false,
            half_life: 15,
            max_suppress: 60,
            reuse: 750,
            suppress: 3000,
            penalty: 1000,
        }
    }
}
