use std::{path::PathBuf, time::Duration};

use anyhow::{anyhow, Context};
use clap::Parser;
use url::Url;

use crate::{
    bootstrap::snapshot_url,
    logging::LogLevel,
    sort::{SortMode, SortPolicy},
    staleness::DEFAULT_TICK,
    transport::DEFAULT_RETRY_DELAY,
};

#[derive(Debug, Parser)]
#[command(
    name = "regalia-dashboard",
    author,
    version,
    about = "Live terminal dashboard for the Regalia telemetry relay"
)]
pub struct Cli {
    /// Websocket endpoint of the relay.
    #[arg(long, env = "REGALIA_RELAY_URL", default_value = "ws://127.0.0.1:8080/ws")]
    pub url: String,

    /// Fixed delay between reconnect attempts.
    #[arg(long, default_value_t = DEFAULT_RETRY_DELAY.as_millis() as u64)]
    pub retry_ms: u64,

    /// Staleness refresh period.
    #[arg(long, default_value_t = DEFAULT_TICK.as_millis() as u64)]
    pub tick_ms: u64,

    /// Initial card order.
    #[arg(long, value_enum, default_value_t = SortMode::Arrival)]
    pub sort: SortMode,

    /// Re-sort after every frame rather than only when `s` is pressed.
    #[arg(long, default_value_t = false)]
    pub auto_sort: bool,

    /// Raw frames kept in the log pane; 0 hides the pane.
    #[arg(long, default_value_t = 50)]
    pub raw_log_lines: usize,

    /// Skip fetching the relay's last snapshot on start.
    #[arg(long, default_value_t = false)]
    pub no_bootstrap: bool,

    /// Write logs to this file; the terminal is taken by the dashboard.
    #[arg(long, env = "REGALIA_DASHBOARD_LOG")]
    pub log_file: Option<PathBuf>,

    /// Verbosity of the log file.
    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,
}

#[derive(Debug, Clone)]
pub struct DashboardSettings {
    pub url: Url,
    pub snapshot_url: Option<Url>,
    pub retry_delay: Duration,
    pub tick_period: Duration,
    pub sort: SortPolicy,
    pub raw_log_lines: usize,
    pub log_file: Option<PathBuf>,
}

impl TryFrom<Cli> for DashboardSettings {
    type Error = anyhow::Error;

    fn try_from(cli: Cli) -> Result<Self, Self::Error> {
        let url =
            Url::parse(&cli.url).with_context(|| format!("invalid relay url: {}", cli.url))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(anyhow!("relay url must use ws:// or wss://, got {url}"));
        }
        if cli.tick_ms == 0 {
            return Err(anyhow!("--tick-ms must be greater than zero"));
        }
        let snapshot_url = if cli.no_bootstrap {
            None
        } else {
            Some(snapshot_url(&url)?)
        };
        Ok(Self {
            url,
            snapshot_url,
            retry_delay: Duration::from_millis(cli.retry_ms),
            tick_period: Duration::from_millis(cli.tick_ms),
            sort: SortPolicy {
                mode: cli.sort,
                auto: cli.auto_sort,
            },
            raw_log_lines: cli.raw_log_lines,
            log_file: cli.log_file,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> anyhow::Result<DashboardSettings> {
        let mut argv = vec!["regalia-dashboard"];
        argv.extend_from_slice(args);
        DashboardSettings::try_from(Cli::try_parse_from(argv)?)
    }

    #[test_timeout::timeout]
    fn defaults_follow_the_kiosk_profile() {
        let settings = parse(&["--url", "ws://127.0.0.1:8080/ws"]).unwrap();
        assert_eq!(settings.retry_delay, Duration::from_secs(1));
        assert_eq!(settings.tick_period, Duration::from_millis(500));
        assert_eq!(settings.sort, SortPolicy::default());
        assert_eq!(
            settings.snapshot_url.unwrap().as_str(),
            "http://127.0.0.1:8080/latest"
        );
    }

    #[test_timeout::timeout]
    fn sort_and_bootstrap_flags() {
        let settings = parse(&[
            "--url",
            "wss://relay.example.org/ws",
            "--sort",
            "recency",
            "--auto-sort",
            "--no-bootstrap",
        ])
        .unwrap();
        assert_eq!(settings.sort.mode, SortMode::Recency);
        assert!(settings.sort.auto);
        assert!(settings.snapshot_url.is_none());
    }

    #[test_timeout::timeout]
    fn rejects_http_urls() {
        assert!(parse(&["--url", "http://127.0.0.1:8080/ws"]).is_err());
        assert!(parse(&["--url", "not a url"]).is_err());
    }
}
