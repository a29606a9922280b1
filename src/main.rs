//! GuardianX - address reputation CLI
//!
//! Usage: guardianx <chain> <address>
//!
//! Prints the JSON validation report on stdout; logs go to stderr and are
//! filtered with `RUST_LOG` (default `info`).

use guardianx::{AddressValidator, Chain, GuardianConfig, JsonReportGenerator, ReportGenerator};

use eyre::{eyre, Result, WrapErr};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    let mut args = std::env::args().skip(1);
    let (chain, address) = match (args.next(), args.next()) {
        (Some(chain), Some(address)) => (chain, address),
        _ => return Err(eyre!("usage: guardianx <kadena|xrpl> <address>")),
    };
    let chain: Chain = chain.parse().wrap_err("Invalid chain argument")?;

    info!(
        "🛡️ {} v{} validating {} on {}",
        guardianx::utils::constants::APP_NAME,
        guardianx::utils::constants::APP_VERSION,
        address,
        chain
    );

    let config = GuardianConfig::from_env();
    config.log_summary();

    let validator = AddressValidator::from_config(config)?;
    let report = validator.validate(chain, address.trim()).await;

    let generator = JsonReportGenerator { pretty: true };
    println!("{}", generator.render(&report)?);

    let stats = validator.telemetry().get_stats();
    info!("{}", stats.summary());
    debug!("Telemetry: {}", stats.to_json());
    Ok(())
}
