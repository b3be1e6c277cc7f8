//! Process configuration: command line, environment, optional tunables file.
//!
//! The external contract is positional:
//!
//! ```text
//! torus-daemon <host> <port> [<node_id> [<anchor_host> <anchor_port>]]
//! ```
//!
//! Without `node_id` the process is a plain web server. With `node_id` it
//! participates in the ring; with an anchor it additionally starts in the
//! `Joining` state and addresses its first control packet there.
//!
//! Bootstrap neighbors come from the environment (`PRED_ID`/`PRED_IP`/
//! `PRED_PORT` and the `SUCC_*` triple), `NO_STABILIZE` disables the
//! periodic stabilization tick, and `TORUS_CONFIG` may name a TOML file of
//! operational tunables. Configuration faults fail the process at startup.

use std::net::{Ipv4Addr, SocketAddrV4, ToSocketAddrs};
use std::path::Path;

use serde::{Deserialize, Serialize};

use torus_dht::{MembershipStatus, Node};
use torus_types::Neighbor;

/// Error types for configuration parsing.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Wrong argument shape.
    #[error("usage: torus-daemon <host> <port> [<node_id> [<anchor_host> <anchor_port>]]")]
    Usage,

    /// A value that must be a decimal u16 is not.
    #[error("invalid {what}: {value:?} (expected a decimal 16-bit integer)")]
    InvalidU16 { what: &'static str, value: String },

    /// A host could not be resolved to an IPv4 address.
    #[error("cannot resolve {host:?} to an IPv4 address")]
    UnresolvableHost { host: String },

    /// A bootstrap neighbor is only partially specified.
    #[error("incomplete {prefix}_* environment: need all of ID, IP and PORT")]
    PartialNeighbor { prefix: &'static str },

    /// The tunables file could not be read or parsed.
    #[error("bad tunables file {path}: {reason}")]
    Tunables { path: String, reason: String },
}

/// Operational tunables, overridable from the `TORUS_CONFIG` TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tunables {
    /// Timer ticks between periodic stabilize rounds.
    #[serde(default = "default_stabilize_interval_ticks")]
    pub stabilize_interval_ticks: u64,
    /// Period of the event-loop timer in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Per-read timeout for a TCP client in milliseconds.
    #[serde(default = "default_client_read_timeout_ms")]
    pub client_read_timeout_ms: u64,
    /// Reads that make no progress before a client is given up on.
    #[serde(default = "default_receive_attempts")]
    pub receive_attempts: u32,
    /// Maximum entries in the object store.
    #[serde(default = "default_store_capacity")]
    pub store_capacity: usize,
}

// Default value functions

fn default_stabilize_interval_ticks() -> u64 {
    15
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_client_read_timeout_ms() -> u64 {
    1000
}

fn default_receive_attempts() -> u32 {
    1
}

fn default_store_capacity() -> usize {
    500
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            stabilize_interval_ticks: default_stabilize_interval_ticks(),
            poll_interval_ms: default_poll_interval_ms(),
            client_read_timeout_ms: default_client_read_timeout_ms(),
            receive_attempts: default_receive_attempts(),
            store_capacity: default_store_capacity(),
        }
    }
}

impl Tunables {
    /// Load tunables from the file at `path`, filling omitted fields with
    /// defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Tunables {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Tunables {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    /// Load tunables from the file named by `TORUS_CONFIG`, or defaults
    /// when the variable is unset.
    pub fn load() -> Result<Self, ConfigError> {
        match std::env::var("TORUS_CONFIG") {
            Ok(path) => Self::from_file(Path::new(&path)),
            Err(_) => Ok(Self::default()),
        }
    }
}

/// Ring participation settings for a DHT node.
#[derive(Debug, Clone)]
pub struct DhtConfig {
    /// The local ring identifier.
    pub node_id: u16,
    /// Entry point into an existing ring; presence means the node starts
    /// in the `Joining` state.
    pub anchor: Option<SocketAddrV4>,
    /// Bootstrap predecessor from the environment.
    pub pred: Option<Neighbor>,
    /// Bootstrap successor from the environment.
    pub succ: Option<Neighbor>,
}

/// Complete server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind (TCP and UDP).
    pub host: Ipv4Addr,
    /// Port to bind (TCP and UDP).
    pub port: u16,
    /// Ring participation; `None` means plain web-server mode.
    pub dht: Option<DhtConfig>,
    /// Whether the periodic stabilization tick is disabled.
    pub no_stabilize: bool,
    /// Operational tunables.
    pub tunables: Tunables,
}

impl ServerConfig {
    /// Build the configuration from command-line arguments (without the
    /// program name) and the process environment.
    pub fn load<I>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = String>,
    {
        let args: Vec<String> = args.into_iter().collect();
        let mut config = Self::from_args(&args)?;

        if let Some(dht) = &mut config.dht {
            dht.pred = neighbor_from_env("PRED")?;
            dht.succ = neighbor_from_env("SUCC")?;
        }
        config.no_stabilize = std::env::var_os("NO_STABILIZE").is_some();
        config.tunables = Tunables::load()?;

        Ok(config)
    }

    /// Parse the positional arguments alone.
    pub fn from_args(args: &[String]) -> Result<Self, ConfigError> {
        let (host, port, rest) = match args {
            [host, port, rest @ ..] if rest.len() <= 3 => (host, port, rest),
            _ => return Err(ConfigError::Usage),
        };

        let host = resolve_host(host)?;
        let port = parse_u16("port", port)?;

        let dht = match rest {
            [] => None,
            [node_id] => Some(DhtConfig {
                node_id: parse_u16("node id", node_id)?,
                anchor: None,
                pred: None,
                succ: None,
            }),
            [node_id, anchor_host, anchor_port] => Some(DhtConfig {
                node_id: parse_u16("node id", node_id)?,
                anchor: Some(SocketAddrV4::new(
                    resolve_host(anchor_host)?,
                    parse_u16("anchor port", anchor_port)?,
                )),
                pred: None,
                succ: None,
            }),
            _ => return Err(ConfigError::Usage),
        };

        Ok(Self {
            host,
            port,
            dht,
            no_stabilize: false,
            tunables: Tunables::default(),
        })
    }

    /// Build the node state this configuration describes, or `None` in
    /// plain web-server mode.
    pub fn build_node(&self) -> Option<Node> {
        let dht = self.dht.as_ref()?;
        let mut node = Node::new(dht.node_id, self.host, self.port);
        node.pred = dht.pred.clone();
        node.succ = dht.succ.clone();
        if dht.anchor.is_some() {
            node.status = MembershipStatus::Joining;
        }
        Some(node)
    }
}

/// Resolve a host argument to an IPv4 address. Accepts dotted quads
/// directly and resolves names through the system resolver.
fn resolve_host(host: &str) -> Result<Ipv4Addr, ConfigError> {
    if let Ok(addr) = host.parse::<Ipv4Addr>() {
        return Ok(addr);
    }
    let candidates = (host, 0u16)
        .to_socket_addrs()
        .map_err(|_| ConfigError::UnresolvableHost {
            host: host.to_string(),
        })?;
    for addr in candidates {
        if let std::net::SocketAddr::V4(v4) = addr {
            return Ok(*v4.ip());
        }
    }
    Err(ConfigError::UnresolvableHost {
        host: host.to_string(),
    })
}

fn parse_u16(what: &'static str, value: &str) -> Result<u16, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidU16 {
        what,
        value: value.to_string(),
    })
}

/// Read the `<prefix>_ID`/`_IP`/`_PORT` triple from the environment.
fn neighbor_from_env(prefix: &'static str) -> Result<Option<Neighbor>, ConfigError> {
    let var = |suffix: &str| std::env::var(format!("{prefix}_{suffix}")).ok();
    neighbor_from_vars(prefix, var("ID"), var("IP"), var("PORT"))
}

/// Assemble a bootstrap neighbor from its three variables. All three must
/// be present together.
fn neighbor_from_vars(
    prefix: &'static str,
    id: Option<String>,
    ip: Option<String>,
    port: Option<String>,
) -> Result<Option<Neighbor>, ConfigError> {
    match (id, ip, port) {
        (None, None, None) => Ok(None),
        (Some(id), Some(ip), Some(port)) => Ok(Some(Neighbor::new(
            parse_u16("neighbor id", &id)?,
            resolve_host(&ip)?,
            parse_u16("neighbor port", &port)?,
        ))),
        _ => Err(ConfigError::PartialNeighbor { prefix }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_plain_server_args() {
        let config = ServerConfig::from_args(&args(&["127.0.0.1", "8080"])).expect("parse");
        assert_eq!(config.host, Ipv4Addr::new(127, 0, 0, 1));
        assert_eq!(config.port, 8080);
        assert!(config.dht.is_none());
        assert!(config.build_node().is_none());
    }

    #[test]
    fn test_dht_node_args() {
        let config =
            ServerConfig::from_args(&args(&["127.0.0.1", "8080", "16384"])).expect("parse");
        let dht = config.dht.as_ref().expect("dht config");
        assert_eq!(dht.node_id, 16384);
        assert!(dht.anchor.is_none());

        let node = config.build_node().expect("node");
        assert_eq!(node.id, 16384);
        assert_eq!(node.status, MembershipStatus::Ok);
        assert!(node.is_alone());
    }

    #[test]
    fn test_anchor_args() {
        let config = ServerConfig::from_args(&args(&[
            "127.0.0.1",
            "8080",
            "8192",
            "127.0.0.1",
            "9090",
        ]))
        .expect("parse");
        let dht = config.dht.as_ref().expect("dht config");
        assert_eq!(
            dht.anchor,
            Some("127.0.0.1:9090".parse().expect("addr"))
        );

        let node = config.build_node().expect("node");
        assert_eq!(node.status, MembershipStatus::Joining);
    }

    #[test]
    fn test_bad_arg_shapes() {
        assert!(matches!(
            ServerConfig::from_args(&args(&["127.0.0.1"])),
            Err(ConfigError::Usage)
        ));
        assert!(matches!(
            ServerConfig::from_args(&args(&["127.0.0.1", "8080", "1", "127.0.0.1"])),
            Err(ConfigError::Usage)
        ));
        assert!(matches!(
            ServerConfig::from_args(&args(&[
                "127.0.0.1", "8080", "1", "127.0.0.1", "9090", "extra"
            ])),
            Err(ConfigError::Usage)
        ));
    }

    #[test]
    fn test_bad_numbers() {
        assert!(matches!(
            ServerConfig::from_args(&args(&["127.0.0.1", "99999"])),
            Err(ConfigError::InvalidU16 { what: "port", .. })
        ));
        assert!(matches!(
            ServerConfig::from_args(&args(&["127.0.0.1", "8080", "-3"])),
            Err(ConfigError::InvalidU16 {
                what: "node id",
                ..
            })
        ));
    }

    #[test]
    fn test_neighbor_from_vars() {
        let n = neighbor_from_vars(
            "PRED",
            Some("512".to_string()),
            Some("10.0.0.2".to_string()),
            Some("4001".to_string()),
        )
        .expect("parse")
        .expect("present");
        assert_eq!(n.id, 512);
        assert_eq!(n.host, Ipv4Addr::new(10, 0, 0, 2));
        assert_eq!(n.port, 4001);

        assert!(neighbor_from_vars("PRED", None, None, None)
            .expect("parse")
            .is_none());
        assert!(matches!(
            neighbor_from_vars("PRED", Some("512".to_string()), None, None),
            Err(ConfigError::PartialNeighbor { prefix: "PRED" })
        ));
    }

    #[test]
    fn test_tunables_defaults() {
        let t = Tunables::default();
        assert_eq!(t.stabilize_interval_ticks, 15);
        assert_eq!(t.poll_interval_ms, 100);
        assert_eq!(t.receive_attempts, 1);
        assert_eq!(t.store_capacity, 500);
    }

    #[test]
    fn test_tunables_partial_file() {
        let parsed: Tunables =
            toml::from_str("stabilize_interval_ticks = 30").expect("parse");
        assert_eq!(parsed.stabilize_interval_ticks, 30);
        assert_eq!(parsed.poll_interval_ms, 100, "omitted fields keep defaults");
    }

    #[test]
    fn test_tunables_roundtrip() {
        let t = Tunables::default();
        let text = toml::to_string(&t).expect("serialize");
        let back: Tunables = toml::from_str(&text).expect("parse");
        assert_eq!(back.store_capacity, t.store_capacity);
    }
}
