//! Demo Art-Net node daemon: loads a TOML config, brings one node up,
//! and logs the traffic it handles.

use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use serde::Deserialize;
use tracing::{error, info};

use artnode::{Node, NodeOptions, NodeType, PortDirection};
use artnode_protocol::{PortDataCode, PORT_ENABLE_INPUT, PORT_ENABLE_OUTPUT};

#[derive(Parser, Debug)]
#[command(name = "artnode", about = "Art-Net node daemon")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/node.toml")]
    config: PathBuf,

    /// Receive timeout per poll of the socket, in milliseconds
    #[arg(long, default_value_t = 1000)]
    timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
struct Config {
    node: NodeSection,
    #[serde(default)]
    ports: PortsSection,
}

#[derive(Debug, Clone, Deserialize)]
struct NodeSection {
    ip: Ipv4Addr,
    #[serde(default = "default_broadcast")]
    broadcast: Ipv4Addr,
    #[serde(default)]
    gateway: Option<Ipv4Addr>,
    #[serde(default)]
    netmask: Option<Ipv4Addr>,
    #[serde(default = "default_short_name")]
    short_name: String,
    #[serde(default)]
    long_name: String,
    #[serde(default)]
    subnet: u8,
    #[serde(default = "default_node_type")]
    node_type: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct PortsSection {
    /// Port addresses for input ports, by index
    #[serde(default)]
    inputs: Vec<u8>,
    /// Port addresses for output ports, by index
    #[serde(default)]
    outputs: Vec<u8>,
}

fn default_broadcast() -> Ipv4Addr {
    Ipv4Addr::BROADCAST
}

fn default_short_name() -> String {
    "artnode".to_string()
}

fn default_node_type() -> String {
    "node".to_string()
}

fn parse_node_type(name: &str) -> anyhow::Result<NodeType> {
    Ok(match name {
        "server" => NodeType::Server,
        "node" => NodeType::Node,
        "media-server" => NodeType::MediaServer,
        "route" => NodeType::Route,
        "backup" => NodeType::Backup,
        "raw" => NodeType::Raw,
        other => anyhow::bail!("unknown node type {other:?}"),
    })
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config_str = std::fs::read_to_string(&args.config).map_err(|e| {
        error!("Failed to read config file {:?}: {}", args.config, e);
        e
    })?;
    let config: Config = toml::from_str(&config_str).map_err(|e| {
        error!("Failed to parse config: {}", e);
        e
    })?;

    let node_type = parse_node_type(&config.node.node_type)?;
    info!(
        ip = %config.node.ip,
        broadcast = %config.node.broadcast,
        node_type = ?node_type,
        name = %config.node.short_name,
        "artnode starting"
    );

    let mut node = Node::new(NodeOptions {
        ip: config.node.ip,
        broadcast: config.node.broadcast,
        gateway: config.node.gateway.unwrap_or(Ipv4Addr::UNSPECIFIED),
        netmask: config.node.netmask.unwrap_or(Ipv4Addr::UNSPECIFIED),
        node_type,
        ..NodeOptions::default()
    });

    node.set_short_name(&config.node.short_name);
    node.set_long_name(&config.node.long_name);
    node.set_subnet_addr(config.node.subnet)?;

    for (id, &addr) in config.ports.inputs.iter().enumerate() {
        node.set_port_type(id, PORT_ENABLE_INPUT, PortDataCode::Dmx)?;
        node.set_port_addr(id, PortDirection::Input, addr)?;
    }
    for (id, &addr) in config.ports.outputs.iter().enumerate() {
        node.set_port_type(id, PORT_ENABLE_OUTPUT, PortDataCode::Dmx)?;
        node.set_port_addr(id, PortDirection::Output, addr)?;
    }

    node.set_dmx_handler(|port_id, data| {
        info!(port = port_id, bytes = data.len(), "dmx frame merged");
    });

    node.start()?;
    info!("node running; ctrl-c to exit");

    let timeout = Duration::from_millis(args.timeout_ms);
    loop {
        if let Err(e) = node.read(timeout) {
            error!("read failed: {}", e);
            node.stop()?;
            return Err(e.into());
        }
    }
}
