use anyhow::Result;
use clap::Parser;
use regalia_dashboard::{
    app,
    config::{Cli, DashboardSettings},
    logging,
    terminal::{spawn_key_listener, TerminalSession},
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_level = cli.log_level;
    let settings = DashboardSettings::try_from(cli)?;
    let _log_guard = logging::init(log_level, settings.log_file.as_deref())?;
    info!(url = %settings.url, "starting regalia dashboard");

    let mut session = TerminalSession::enter()?;
    let keys = spawn_key_listener();
    let result = app::run(session.terminal_mut(), settings, keys).await;
    drop(session);

    info!("dashboard closed");
    result
}
