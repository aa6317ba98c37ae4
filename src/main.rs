use std::{env, fs::File, io, path::Path, process::ExitCode};

use tracing_subscriber::EnvFilter;

use bank_ledger::dlq::StdErrDLQ;
use bank_ledger::ingestion::CsvReader;
use bank_ledger::{Bank, Config, Engine, Error, MemoryStore};

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_filter).unwrap_or_else(|_| EnvFilter::new("warn"));

    // stdout carries the report
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

async fn run(commands: &Path, config: Config) -> Result<(), Error> {
    let file = File::open(commands)?;

    let store = MemoryStore::open(&config)?;
    let bank = Bank::new(store)
        .with_policy(config.lending.clone())
        .with_default_account_type(config.default_account_type);

    let mut engine = Engine::new(CsvReader::new(file), bank, StdErrDLQ::default());
    engine.process().await?;
    engine.flush(io::stdout().lock())
}

#[tokio::main] // using Tokio runtime for async
async fn main() -> ExitCode {
    let mut args = env::args().skip(1);

    let Some(commands) = args.next() else {
        eprintln!("usage: bank_ledger <commands.csv> [config.toml]");
        return ExitCode::from(2);
    };

    let config = match args.next() {
        Some(path) => Config::from_file(path),
        None => Config::from_env(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::from(2);
        }
    };

    init_tracing(&config);

    match run(Path::new(&commands), config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Run aborted");
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
