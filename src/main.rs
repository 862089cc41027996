use clap::Parser;
use serde::Serialize;
use std::process::ExitCode;
use tracing::{error, info};

use consensus_oracle::config::AppConfig;
use consensus_oracle::convert::{convert, ConvertDirection};
use consensus_oracle::oracle::PriceOracle;

/// Consensus Oracle - verified crypto prices from multiple providers.
#[derive(Parser, Debug)]
#[command(name = "consensus-oracle")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Asset symbol (dogec, btc, eth, ltc)
    symbol: String,

    /// Fiat code (usd, eur, gbp, cad, aud). Defaults to oracle.default_fiat
    fiat: Option<String>,

    /// Print the full consensus, market data included, without cache fallback
    #[arg(long, conflicts_with = "convert")]
    full: bool,

    /// Convert this amount at the consensus price
    #[arg(long, value_name = "AMOUNT")]
    convert: Option<String>,

    /// Treat the amount as fiat and convert it to the asset
    #[arg(long, requires = "convert")]
    to_crypto: bool,
}

#[derive(Serialize)]
struct Conversion<'a> {
    symbol: &'a str,
    fiat: &'a str,
    price: f64,
    amount: &'a str,
    direction: &'static str,
    result: String,
    stale: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match AppConfig::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    config.logging.init();
    info!(config = %config, "consensus-oracle starting");

    match run(cli, &config).await {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Query failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, config: &AppConfig) -> anyhow::Result<String> {
    let oracle = PriceOracle::from_config(config)?;
    let fiat = cli
        .fiat
        .unwrap_or_else(|| config.default_fiat().code().to_string());

    if cli.full {
        let result = oracle.snapshot(&cli.symbol, &fiat).await?;
        return Ok(serde_json::to_string_pretty(&result)?);
    }

    let quote = oracle.get_quote(&cli.symbol, &fiat).await?;

    match cli.convert.as_deref() {
        Some(amount) => {
            let direction = if cli.to_crypto {
                ConvertDirection::ToCrypto
            } else {
                ConvertDirection::ToFiat
            };
            let result = convert(quote.price, amount, direction)?;

            let conversion = Conversion {
                symbol: &quote.symbol,
                fiat: &quote.fiat,
                price: quote.price,
                amount,
                direction: match direction {
                    ConvertDirection::ToFiat => "to_fiat",
                    ConvertDirection::ToCrypto => "to_crypto",
                },
                result: result.to_string(),
                stale: quote.stale,
            };
            Ok(serde_json::to_string_pretty(&conversion)?)
        }
        None => Ok(serde_json::to_string_pretty(&quote)?),
    }
}
