//! wis2-downloader command line entry point

use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use wis2_downloader::{BrokerTransport, Config, Wis2Downloader};

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Transport {
    Wss,
    Tls,
    Tcp,
}

impl From<Transport> for BrokerTransport {
    fn from(transport: Transport) -> Self {
        match transport {
            Transport::Wss => BrokerTransport::Wss,
            Transport::Tls => BrokerTransport::Tls,
            Transport::Tcp => BrokerTransport::Tcp,
        }
    }
}

/// Subscribe to WIS2 topics and download announced data
#[derive(Debug, Parser)]
#[command(name = "wis2-downloader", version, about)]
struct Cli {
    /// JSON configuration file; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Broker hostname
    #[arg(long)]
    broker: Option<String>,

    /// Broker port
    #[arg(long)]
    port: Option<u16>,

    /// Broker transport
    #[arg(long, value_enum)]
    transport: Option<Transport>,

    /// Broker username
    #[arg(long)]
    username: Option<String>,

    /// Broker password
    #[arg(long, env = "WIS2_BROKER_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Root directory for downloads; must exist and be writable
    #[arg(long)]
    download_dir: Option<PathBuf>,

    /// Startup subscription list (defaults to subscriptions.json next to the executable)
    #[arg(long)]
    subscriptions: Option<PathBuf>,

    /// Number of download workers
    #[arg(long)]
    workers: Option<usize>,

    /// Admin API bind address
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

impl Cli {
    fn into_config(self) -> wis2_downloader::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };

        if let Some(host) = self.broker {
            config.broker.host = host;
        }
        if let Some(port) = self.port {
            config.broker.port = port;
        }
        if let Some(transport) = self.transport {
            config.broker.transport = transport.into();
        }
        if let Some(username) = self.username {
            config.broker.username = username;
        }
        if let Some(password) = self.password {
            config.broker.password = password;
        }
        if let Some(dir) = self.download_dir {
            config.download.download_dir = Some(dir);
        }
        if let Some(path) = self.subscriptions {
            config.subscriptions_path = Some(path);
        }
        if let Some(workers) = self.workers {
            config.download.workers = workers;
        }
        if let Some(bind) = self.bind {
            config.server.api.bind_address = bind;
        }

        Ok(config)
    }
}

fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("wis2_downloader=info,tower_http=info"));

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry.with(fmt::layer()).init(),
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
    }
}

async fn run(cli: Cli) -> wis2_downloader::Result<()> {
    let config = cli.into_config()?;
    let downloader = Wis2Downloader::start(config).await?;

    let api = Arc::new(downloader.clone()).spawn_api_server();
    wis2_downloader::run_with_shutdown(downloader).await?;

    match api.await {
        Ok(result) => result,
        Err(e) => Err(wis2_downloader::Error::ApiServerError(e.to_string())),
    }
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_format);

    match run(cli).await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "wis2-downloader exited with an error");
            std::process::ExitCode::FAILURE
        }
    }
}
