//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use ipnetwork::IpNetwork;
use tracing::{error, warn, warn_span};

use crate::af::Afi;
use crate::config::DampingCfg;
use crate::peer::PeerId;

// RIB errors.
#[derive(Debug)]
pub enum Error {
    // Peers
    PeerNotFound(PeerId),
    PeerExists(PeerId),
    PeerDown(PeerId),
    PeerUp(PeerId),
    // Routes
    RouteNotFound(PeerId, IpNetwork),
    AddressFamilyDisabled(Afi),
    // Configuration
    ConfigError(ConfigError),
}

// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    Io(String, std::io::Error),
    Parse(toml::de::Error),
    InvalidAggregate(IpNetwork),
    InvalidDamping(DampingCfg),
}

// ===== impl Error =====

impl Error {
    pub fn log(&self) {
        match self {
            Error::PeerNotFound(peer_id)
            | Error::PeerExists(peer_id)
            | Error::PeerDown(peer_id)
            | Error::PeerUp(peer_id) => {
                warn_span!("peer", %peer_id).in_scope(|| {
                    warn!("{}", self);
                });
            }
            Error::RouteNotFound(peer_id, prefix) => {
                warn_span!("peer", %peer_id).in_scope(|| {
                    warn!(%prefix, "{}", self);
                });
            }
            Error::AddressFamilyDisabled(afi) => {
                warn!(%afi, "{}", self);
            }
            Error::ConfigError(error) => {
                error.log();
            }
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::PeerNotFound(..) => {
                write!(f, "peer not found")
            }
            Error::PeerExists(..) => {
                write!(f, "peer already exists")
            }
            Error::PeerDown(..) => {
                write!(f, "peering is down")
            }
            Error::PeerUp(..) => {
                write!(f, "peering is already up")
            }
            Error::RouteNotFound(..) => {
                write!(f, "route not found")
            }
            Error::AddressFamilyDisabled(..) => {
                write!(f, "address family disabled")
            }
            Error::ConfigError(error) => error.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::ConfigError(error) => Some(error),
            _ => None,
        }
    }
}

impl From<ConfigError> for Error {
    fn from(error: ConfigError) -> Error {
        Error::ConfigError(error)
    }
}

// ===== impl ConfigError =====

impl ConfigError {
    pub fn log(&self) {
        match self {
            ConfigError::Io(path, error) => {
                error!(%path, error = %with_source(error), "{}", self);
            }
            ConfigError::Parse(error) => {
                error!(error = %with_source(error), "{}", self);
            }
            ConfigError::InvalidAggregate(prefix) => {
                error!(%prefix, "{}", self);
            }
            ConfigError::InvalidDamping(config) => {
                error!(
                    half_life = %config.half_life,
                    max_suppress = %config.max_suppress,
                    reuse = %config.reuse,
                    suppress = %config.suppress,
                    "{}", self
                );
            }
        }
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(..) => {
                write!(f, "failed to read configuration file")
            }
            ConfigError::Parse(..) => {
                write!(f, "failed to parse configuration file")
            }
            ConfigError::InvalidAggregate(..) => {
                write!(f, "invalid aggregate prefix")
            }
            ConfigError::InvalidDamping(..) => {
                write!(f, "invalid route flap damping parameters")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(_, error) => Some(error),
            ConfigError::Parse(error) => Some(error),
            _ => None,
        }
    }
}

// ===== global functions =====

fn with_source<E: std::error::Error>(error: E) -> String {
    if let Some(source) = error.source() {
        format!("{} ({})", error, with_source(source))
    } else {
        error.to_string()
    }
}
