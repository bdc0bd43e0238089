//! Replica configuration: everything the core needs about the cluster and
//! its own timers, handed in as an already-constructed value. Parsing it
//! from disk or environment is outside this crate's scope; behind the
//! `toml_config` feature the struct gains `serde::Deserialize` so an
//! external bootstrap layer can hand us a parsed value without this crate
//! touching the filesystem itself.
use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::quorum::Quorum;

#[derive(Debug, Clone)]
#[cfg_attr(feature = "toml_config", derive(Deserialize))]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct ReplicaConfig {
    /// Opaque peer addresses; index in this list is the replica index.
    pub peers: Vec<String>,
    pub this_replica: i32,
    #[cfg_attr(feature = "toml_config", serde(default = "defaults::resend_period"))]
    pub resend_period: Duration,
    #[cfg_attr(
        feature = "toml_config",
        serde(default = "defaults::slow_path_timeout")
    )]
    pub slow_path_timeout: Duration,
    #[cfg_attr(
        feature = "toml_config",
        serde(default = "defaults::recovery_backoff_base")
    )]
    pub recovery_backoff_base: Duration,
    #[cfg_attr(
        feature = "toml_config",
        serde(default = "defaults::client_table_gc_watermark")
    )]
    pub client_table_gc_watermark: u64,
}

pub mod defaults {
    use std::time::Duration;

    pub fn resend_period() -> Duration {
        Duration::from_millis(500)
    }

    pub fn slow_path_timeout() -> Duration {
        Duration::from_millis(150)
    }

    pub fn recovery_backoff_base() -> Duration {
        Duration::from_millis(50)
    }

    pub fn client_table_gc_watermark() -> u64 {
        1000
    }
}

impl ReplicaConfig {
    pub fn new(peers: Vec<String>, this_replica: i32) -> Self {
        Self {
            peers,
            this_replica,
            resend_period: defaults::resend_period(),
            slow_path_timeout: defaults::slow_path_timeout(),
            recovery_backoff_base: defaults::recovery_backoff_base(),
            client_table_gc_watermark: defaults::client_table_gc_watermark(),
        }
    }

    pub fn n(&self) -> usize {
        self.peers.len()
    }

    pub fn quorum(&self) -> Quorum {
        Quorum::for_cluster_size(self.n())
    }

    pub fn peer_indices(&self) -> Vec<i32> {
        (0..self.peers.len() as i32)
            .filter(|&i| i != self.this_replica)
            .collect()
    }

    #[cfg(feature = "toml_config")]
    pub fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quorum_derives_from_peer_count() {
        let cfg = ReplicaConfig::new(
            vec!["a".into(), "b".into(), "c".into(), "d".into(), "e".into()],
            0,
        );
        assert_eq!(cfg.quorum().fast_quorum(), 4);
        assert_eq!(cfg.quorum().slow_quorum(), 3);
    }

    #[test]
    fn peer_indices_excludes_self() {
        let cfg = ReplicaConfig::new(vec!["a".into(), "b".into(), "c".into()], 1);
        assert_eq!(cfg.peer_indices(), vec![0, 2]);
    }

    #[cfg(feature = "toml_config")]
    #[test]
    fn deserializes_from_toml_with_defaults() {
        let toml_str = r#"
            peers = ["a", "b", "c"]
            this_replica = 0
        "#;
        let cfg = ReplicaConfig::from_toml(toml_str).unwrap();
        assert_eq!(cfg.n(), 3);
        assert_eq!(cfg.client_table_gc_watermark, 1000);
    }
}
