//! tftpd - Main executable
//!
//! A read-only TFTP server for network boot and firmware distribution.

mod interface;

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use argh::FromArgs;
use tftp::{RootDirResolver, TftpServer, TftpServerConfig, TransferConfig};

use crate::interface::get_interface_ip;

const DEFAULT_BIND: &str = "0.0.0.0:6969"; // use 6969 for non-root testing; redirect or run as root for :69
const DEFAULT_ROOT: &str = "./tftp_root";

#[derive(FromArgs, Debug)]
#[argh(
    description = "tftpd - read-only TFTP server",
    example = "Serve a boot directory on the standard port:\n  {command_name} --bind 0.0.0.0:69 --root /tftpboot",
    example = "Send transfers from a specific interface:\n  {command_name} --interface eth0 --root ./boot",
    example = "Tune retransmission:\n  {command_name} --timeout 1 --retries 10 --max-blksize 8192"
)]
struct CliConfig {
    #[argh(
        option,
        short = 'b',
        description = "bind address for requests",
        default = "DEFAULT_BIND.to_string()"
    )]
    bind: String,

    #[argh(
        option,
        short = 'r',
        description = "root directory to serve",
        default = "PathBuf::from(DEFAULT_ROOT)"
    )]
    root: PathBuf,

    #[argh(
        option,
        short = 'I',
        description = "network interface whose IPv4 address transfers are sent from"
    )]
    interface: Option<String>,

    #[argh(
        option,
        description = "largest block size granted to clients",
        default = "TransferConfig::default().max_block_size"
    )]
    max_blksize: u16,

    #[argh(
        option,
        short = 't',
        description = "retransmission timeout in seconds when not negotiated",
        default = "TransferConfig::default().default_timeout.as_secs()"
    )]
    timeout: u64,

    #[argh(
        option,
        description = "retransmissions before a transfer is abandoned",
        default = "TransferConfig::default().max_retries"
    )]
    retries: u32,

    #[argh(
        option,
        description = "maximum concurrent transfers",
        default = "TftpServerConfig::default().max_sessions"
    )]
    max_sessions: usize,
}

impl CliConfig {
    fn into_server_config(self) -> Result<(TftpServerConfig, PathBuf)> {
        let local_bind = match &self.interface {
            Some(name) => {
                let ip = get_interface_ip(name)
                    .with_context(|| format!("Cannot use network interface '{}'", name))?;
                Some(IpAddr::V4(ip))
            }
            None => None,
        };

        let config = TftpServerConfig {
            bind_address: self.bind,
            max_sessions: self.max_sessions,
            transfer_config: TransferConfig {
                max_block_size: self.max_blksize,
                default_timeout: Duration::from_secs(self.timeout),
                max_retries: self.retries,
                local_bind,
                ..Default::default()
            },
        };
        config.validate()?;

        Ok((config, self.root))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli_config: CliConfig = argh::from_env();
    let (config, root) = cli_config.into_server_config()?;

    anyhow::ensure!(root.is_dir(), "Root directory {} does not exist", root.display());
    let resolver = RootDirResolver::new(root);
    tracing::info!(
        "Starting TFTP server on {} with root: {}",
        config.bind_address,
        resolver.root().display()
    );

    let mut server = TftpServer::new(config, resolver);
    server
        .run_until(async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => tracing::info!("Received Ctrl-C"),
                Err(e) => tracing::error!("Failed to listen for Ctrl-C: {}", e),
            }
        })
        .await
}
