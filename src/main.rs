use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use rowgraph::{
    client::{CancelSignal, Client},
    config,
    fixture::Fixture,
    tokenizer::{parameterize, Params},
    value::DbValue,
};
use std::path::PathBuf;

/// rowgraph - hydrate flat joined rows into nested entities
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Substitute named parameters into query text and print the result
    Parameterize {
        /// Query text containing :name tokens
        #[arg(long)]
        query: String,

        /// Bound parameter as name=value; values parse as JSON, otherwise as text
        #[arg(long = "param", value_parser = parse_param)]
        params: Vec<(String, DbValue)>,
    },

    /// Run a YAML fixture through the in-memory driver and print the entities
    Hydrate(HydrateArgs),
}

#[derive(Args)]
struct HydrateArgs {
    /// Fixture file
    fixture: PathBuf,

    /// Only the first entity, or null when there are no rows
    #[arg(long)]
    first: bool,

    /// Maximum nesting depth followed by the shape builder
    #[arg(long)]
    max_depth: Option<u16>,

    /// Use all resolved fields as identity where no key is declared
    #[arg(long)]
    identity_fallback: bool,

    /// YAML client configuration; environment variables are used otherwise
    #[arg(long)]
    config: Option<PathBuf>,
}

impl From<&HydrateArgs> for config::CliConfig {
    fn from(args: &HydrateArgs) -> Self {
        config::CliConfig {
            max_depth: args.max_depth,
            identity_fallback: args.identity_fallback.then_some(true),
            log_queries: None,
        }
    }
}

fn parse_param(raw: &str) -> Result<(String, DbValue), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{}'", raw))?;
    let value = match serde_json::from_str(value) {
        Ok(json) => DbValue::from_json(&json),
        Err(_) => DbValue::Text(value.to_string()),
    };
    Ok((name.to_string(), value))
}

async fn hydrate(args: HydrateArgs) -> anyhow::Result<()> {
    let mut client_config = match &args.config {
        Some(path) => config::ClientConfig::from_yaml_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => config::ClientConfig::from_env()?,
    };
    client_config.merge((&args).into());

    let fixture = Fixture::load(&args.fixture)?;
    let shape = fixture.entity_shape()?;
    let params = fixture.params();
    let client = Client::with_config(fixture.connector()?, client_config)?;
    let cancel = CancelSignal::never();

    let output = if args.first {
        let first = client
            .first_value_with(&shape, &fixture.query, &params, &cancel)
            .await?;
        serde_json::to_string_pretty(&first)?
    } else {
        let values = client
            .to_values_with(&shape, &fixture.query, &params, &cancel)
            .await?;
        log::info!("Hydrated {} {} entities", values.len(), shape.name);
        serde_json::to_string_pretty(&values)?
    };
    println!("{}", output);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // defaults to INFO, RUST_LOG overrides
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Command::Parameterize { query, params } => {
            let mut bound = Params::new();
            for (name, value) in params {
                bound.insert(name, value);
            }
            println!("{}", parameterize(&query, &bound)?);
        }
        Command::Hydrate(args) => hydrate(args).await?,
    }
    Ok(())
}
