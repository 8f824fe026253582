use std::path::PathBuf;

use clap::Parser;
use log::LevelFilter;
use ocr_logging::{ocr_info, ocr_warn, LogDestination};
use ocr_server::config::DEFAULT_CONFIG_PATH;
use ocr_server::ServerConfig;

#[derive(Debug, Parser)]
#[command(name = "ocr_server", about = "Proxy between the OCR client and the vision model API")]
struct Args {
    /// Path to the JSON configuration file.
    #[arg(env = "OCR_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Listen address, overriding `bind` from the file.
    #[arg(long)]
    bind: Option<String>,

    #[arg(long, default_value_t = LevelFilter::Info)]
    log_level: LevelFilter,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    ocr_logging::initialize(LogDestination::Terminal, args.log_level);

    let mut config = match ServerConfig::load(&args.config) {
        Ok(config) => config,
        Err(err) if err.is_not_found() => {
            ocr_warn!("{}; continuing with defaults", err);
            ServerConfig::default()
        }
        Err(err) => return Err(err.into()),
    }
    .with_env_overrides();
    if let Some(bind) = args.bind {
        config.bind = bind;
    }
    if config.api_key.is_empty() {
        ocr_warn!("No API key configured; upstream requests will be rejected");
    }
    ocr_info!("Loaded configuration: {:?}", config);

    ocr_server::serve(config).await
}
