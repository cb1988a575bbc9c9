use crate::constants::{DEFAULT_LISTEN, DEFAULT_PEER_TIMEOUT_SECS, DEFAULT_REQUIRED_FIELDS};
use anyhow::{ensure, Context, Result};
use clap::Parser;
use ledger_core::constants::{DIFFICULTY, HASH_HEX_SIZE};
use std::{net::SocketAddr, time::Duration};

#[derive(Parser, Debug, Clone)]
#[command(name = "ledger-node")]
#[command(about = "Minimal peer-to-peer proof-of-work ledger node")]
pub struct Args {
    /// Address to listen on, e.g. 127.0.0.1:8000
    #[arg(long, default_value = DEFAULT_LISTEN)]
    pub listen: String,

    /// Base URL peers should use to reach this node (defaults to http://<listen>)
    #[arg(long)]
    pub advertise: Option<String>,

    /// Peer base URL to start with; may be given more than once
    #[arg(long = "peer")]
    pub peers: Vec<String>,

    /// Leading zero hex characters required in a block hash (at most 64)
    #[arg(long, default_value_t = DIFFICULTY)]
    pub difficulty: usize,

    /// Timeout for each outbound request to a peer
    #[arg(long, default_value_t = DEFAULT_PEER_TIMEOUT_SECS)]
    pub peer_timeout_secs: u64,

    /// Field a submitted transaction must carry; may be given more than once
    #[arg(long = "required-field")]
    pub required_fields: Vec<String>,
}

/// Settings the HTTP layer needs at runtime.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub listen: SocketAddr,
    pub advertise: String,
    pub difficulty: usize,
    pub peer_timeout: Duration,
    pub required_fields: Vec<String>,
}

impl NodeConfig {
    /// A difficulty above the digest length could never be met and would
    /// spin the miner forever.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.difficulty <= HASH_HEX_SIZE,
            "difficulty {} exceeds the {HASH_HEX_SIZE} hex characters of a block hash",
            self.difficulty
        );
        Ok(())
    }

    /// Defaults for a node bound to `listen`.
    pub fn new(listen: SocketAddr) -> Self {
        Self {
            listen,
            advertise: format!("http://{listen}"),
            difficulty: DIFFICULTY,
            peer_timeout: Duration::from_secs(DEFAULT_PEER_TIMEOUT_SECS),
            required_fields: DEFAULT_REQUIRED_FIELDS.map(String::from).to_vec(),
        }
    }
}

impl Args {
    pub fn node_config(&self) -> Result<NodeConfig> {
        let listen: SocketAddr = self
            .listen
            .parse()
            .with_context(|| format!("invalid listen address {:?}", self.listen))?;
        let mut config = NodeConfig::new(listen);
        if let Some(advertise) = &self.advertise {
            config.advertise = advertise.trim_end_matches('/').to_owned();
        }
        config.difficulty = self.difficulty;
        config.peer_timeout = Duration::from_secs(self.peer_timeout_secs);
        if !self.required_fields.is_empty() {
            config.required_fields = self.required_fields.clone();
        }
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = Args::parse_from(["ledger-node"]);
        let config = args.node_config().unwrap();
        assert_eq!(config.listen.to_string(), DEFAULT_LISTEN);
        assert_eq!(config.advertise, format!("http://{DEFAULT_LISTEN}"));
        assert_eq!(config.difficulty, DIFFICULTY);
        assert_eq!(config.peer_timeout, Duration::from_secs(5));
        assert_eq!(config.required_fields, vec!["author", "content"]);
        assert!(args.peers.is_empty());
    }

    #[test]
    fn overrides() {
        let args = Args::parse_from([
            "ledger-node",
            "--listen",
            "0.0.0.0:9000",
            "--advertise",
            "http://node-a.local:9000/",
            "--peer",
            "http://node-b.local:9000",
            "--peer",
            "http://node-c.local:9000",
            "--difficulty",
            "3",
            "--required-field",
            "memo",
        ]);
        let config = args.node_config().unwrap();
        assert_eq!(config.advertise, "http://node-a.local:9000");
        assert_eq!(config.difficulty, 3);
        assert_eq!(config.required_fields, vec!["memo"]);
        assert_eq!(args.peers.len(), 2);
    }

    #[test]
    fn rejects_bad_listen_address() {
        let args = Args::parse_from(["ledger-node", "--listen", "not-an-address"]);
        assert!(args.node_config().is_err());
    }

    #[test]
    fn rejects_bad_difficulty() {
        let args = Args::parse_from(["ledger-node", "--difficulty", "65"]);
        assert!(args.node_config().is_err());

        let args = Args::parse_from(["ledger-node", "--difficulty", "64"]);
        assert_eq!(args.node_config().unwrap().difficulty, HASH_HEX_SIZE);

        let mut config = NodeConfig::new(DEFAULT_LISTEN.parse().unwrap());
        config.difficulty = 1_000;
        assert!(config.validate().is_err());
    }
}
