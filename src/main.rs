use clap::Parser;
use cli::ObfsshCli;
use config::{ConfigError, Flag};
use tracing::{Level, debug, info, warn};

mod cli;
mod config;

fn log_level(debug: bool) -> Level {
    if debug { Level::DEBUG } else { Level::INFO }
}

pub fn main() -> Result<(), ConfigError> {
    let cli = ObfsshCli::parse();

    // the config file may turn debug on, so until it is read only the
    // command line decides the level
    let startup_logger = tracing_subscriber::fmt()
        .with_max_level(log_level(cli.debug.unwrap_or(false)))
        .finish();
    let config = tracing::subscriber::with_default(startup_logger, || cli.resolve())?;

    tracing_subscriber::fmt()
        .with_max_level(log_level(config.debug))
        .init();

    info!(
        "connecting to {}@{}:{} (tls: {})",
        config.username, config.host, config.port, config.tls
    );
    for (kind, spec) in config.forwards() {
        info!("{kind} forward: {spec}");
    }
    let no_forwards = [
        &config.local_forwards,
        &config.remote_forwards,
        &config.dynamic_forwards,
        &config.dynamic_http,
    ]
    .iter()
    .all(|list| list.is_empty());
    if config.not_run_cmd && no_forwards {
        warn!("not_run_cmd is set but no forwards are configured, the session will do nothing");
    }
    if !config.proxy.host.is_empty() {
        info!(
            "using {} proxy {}:{}",
            config.proxy.scheme, config.proxy.host, config.proxy.port
        );
    }
    for flag in [Flag::Host, Flag::Port, Flag::Username, Flag::PrivateKey] {
        let source = if config.is_explicit(flag) {
            "command line"
        } else {
            "config file or default"
        };
        debug!("{} taken from the {source}", flag.name());
    }
    debug!("resolved config: {:?}", config);
    Ok(())
}
