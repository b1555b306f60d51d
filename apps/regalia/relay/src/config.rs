use std::{
    net::{Ipv4Addr, SocketAddr},
    time::Duration,
};

use clap::Parser;

#[derive(Debug, Parser)]
#[command(
    name = "regalia-relay",
    author,
    version,
    about = "Relays car telemetry from one producer to every connected dashboard"
)]
pub struct Cli {
    /// Port to listen on; the relay binds all interfaces.
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Time given to open connections after a shutdown signal.
    #[arg(long, env = "REGALIA_SHUTDOWN_GRACE_SECS", default_value_t = 2)]
    pub shutdown_grace_secs: u64,
}

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub listen_addr: SocketAddr,
    pub shutdown_grace: Duration,
}

impl From<Cli> for RelayConfig {
    fn from(cli: Cli) -> Self {
        Self {
            listen_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, cli.port)),
            shutdown_grace: Duration::from_secs(cli.shutdown_grace_secs),
        }
    }
}
