use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use trackly::codec;
use trackly::composer::{compose_tracking_link, validate};
use trackly::config::Config;
use trackly::dashboard::{self, render_text};
use trackly::open_store;
use url::Url;

#[derive(Parser)]
#[command(name = "trackly-admin")]
#[command(about = "Trackly link and visit management CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compose a tracking link for a destination
    Link {
        /// Destination URL (http:// or https://)
        destination: String,
        /// Page address to build the link on (defaults to PUBLIC_BASE_URL)
        #[arg(long)]
        base: Option<String>,
    },
    /// Decode a tracking parameter value
    Decode {
        /// Raw value of the url parameter
        key: String,
    },
    /// Print every recorded visit grouped by destination
    Visits,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Link { destination, base } => {
            validate(&destination).with_context(|| format!("Rejected '{}'", destination))?;

            let base = match base {
                Some(base) => base,
                None => Config::from_env()?
                    .tracker
                    .public_base_url
                    .context("Pass --base or set PUBLIC_BASE_URL")?,
            };
            let base = Url::parse(&base).with_context(|| format!("Invalid base URL: {}", base))?;

            println!("{}", compose_tracking_link(&base, &destination));
        }
        Commands::Decode { key } => {
            println!("{}", codec::decode(&key));
        }
        Commands::Visits => {
            let config = Config::from_env()?;
            let store = open_store(&config).await?;
            let view = dashboard::build(store.as_ref()).await?;
            print!("{}", render_text(&view));
        }
    }

    Ok(())
}
