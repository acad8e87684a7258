use std::path::PathBuf;
use std::process::ExitCode;
use tabql::config::{self, Config};
use tabql::core::db::{Credentials, SqliteProvider};
use tabql::guard::StdinConfirm;
use tabql::{repl, Database, Result, TabqlError};
use tracing::{error, info};

const USAGE: &str = "Usage: tabql [--config <path>] [--database <name>] [file.csv ...]";

/// Command-line arguments
#[derive(Debug, Default)]
struct Args {
    config: Option<PathBuf>,
    database: Option<String>,
    files: Vec<PathBuf>,
}

fn parse_args<I: Iterator<Item = String>>(mut args: I) -> Result<Args> {
    let mut parsed = Args::default();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let path = args
                    .next()
                    .ok_or_else(|| TabqlError::Config("--config requires a path".to_string()))?;
                parsed.config = Some(PathBuf::from(path));
            }
            "--database" => {
                let name = args
                    .next()
                    .ok_or_else(|| TabqlError::Config("--database requires a name".to_string()))?;
                parsed.database = Some(name);
            }
            option if option.starts_with("--") => {
                return Err(TabqlError::Config(format!("unknown option '{}'", option)));
            }
            _ => parsed.files.push(PathBuf::from(&arg)),
        }
    }
    Ok(parsed)
}

fn load(args: &Args) -> Result<Config> {
    match &args.config {
        Some(path) => config::load_config(path),
        None => match config::default_config_path() {
            Some(path) => config::load_or_default(path),
            None => Ok(Config::default()),
        },
    }
}

fn run(args: Args) -> Result<()> {
    let config = load(&args)?;
    let name = args.database.clone().unwrap_or_else(|| config.database());

    let mut provider = SqliteProvider::new(config.data_dir());
    if let Some(timeout) = config.busy_timeout() {
        provider = provider.with_busy_timeout(timeout);
    }
    let mut database = Database::new(
        provider,
        Credentials::new(&name)?,
        StdinConfirm::new(&config.affirmative()),
    )
    .with_inferencer(config.inferencer())
    .with_preview(config.preview());

    database.connect(true)?;
    for table in database.load_files(args.files.as_slice())? {
        println!("Loaded table '{}'", table);
    }

    repl::run_repl(&mut database, config.format());
    Ok(())
}

fn main() -> ExitCode {
    // Initialize the logging system using tracing subscriber
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    info!("Starting tabql...");

    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}\n{}", e, USAGE);
            return ExitCode::FAILURE;
        }
    };

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("ERROR: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Result<Args> {
        parse_args(raw.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_parse_args() {
        let parsed = args(&[
            "--config",
            "tabql.toml",
            "--database",
            "shop",
            "orders.csv",
            "customers.csv",
        ])
        .unwrap();
        assert_eq!(parsed.config, Some(PathBuf::from("tabql.toml")));
        assert_eq!(parsed.database.as_deref(), Some("shop"));
        assert_eq!(parsed.files.len(), 2);
    }

    #[test]
    fn test_positional_arguments_are_files() {
        let parsed = args(&["data/orders", "customers.csv"]).unwrap();
        assert!(parsed.database.is_none());
        assert_eq!(
            parsed.files,
            vec![PathBuf::from("data/orders"), PathBuf::from("customers.csv")]
        );

        let parsed = args(&["--database", "shop.v2"]).unwrap();
        assert_eq!(parsed.database.as_deref(), Some("shop.v2"));
        assert!(parsed.files.is_empty());
    }

    #[test]
    fn test_bad_options() {
        assert!(args(&["--config"]).is_err());
        assert!(args(&["--database"]).is_err());
        assert!(args(&["--verbose"]).is_err());
    }
}
