//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::error::CoinfolioError;
use crate::domain::signal::{generate_signal, TechnicalSignal, MIN_POINTS};

#[derive(Parser, Debug)]
#[command(name = "coinfolio", about = "Simulated crypto portfolio service")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the JSON API server
    Serve {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Create the profile store tables
    InitDb {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Give an existing account the ADMIN role
    GrantAdmin {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        email: String,
    },
    /// Output an argon2 hash for a password read from stdin
    HashPassword,
    /// Compute the technical signal from CSV price history
    Signal {
        /// A `<coin>.csv` file, or a directory of them
        #[arg(long)]
        csv: PathBuf,
        /// Print the signal as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Serve { config } => run_serve(&config),
        Command::InitDb { config } => run_init_db(&config),
        Command::GrantAdmin { config, email } => run_grant_admin(&config, &email),
        Command::HashPassword => run_hash_password(),
        Command::Signal { csv, json } => run_signal(&csv, json),
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|err| fail(&err))
}

fn fail(err: &CoinfolioError) -> ExitCode {
    eprintln!("error: {err}");
    ExitCode::from(err)
}

fn run_serve(config_path: &Path) -> ExitCode {
    #[cfg(feature = "web")]
    {
        use crate::adapters::coingecko_adapter::CoinGeckoAdapter;
        use crate::adapters::sqlite_adapter::SqliteAdapter;
        use crate::adapters::web::{build_router, AppState};
        use crate::domain::config_validation::server_settings;
        use std::sync::Arc;
        use tracing_subscriber::EnvFilter;

        eprintln!("Loading config from {}", config_path.display());
        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(code) => return code,
        };
        let settings = match server_settings(&config) {
            Ok(s) => s,
            Err(e) => return fail(&e),
        };

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&settings.log_filter));
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

        let store = match SqliteAdapter::open(&settings.store.path, settings.store.pool_size)
            .and_then(|s| s.initialize_schema().map(|_| s))
        {
            Ok(s) => s,
            Err(e) => return fail(&e),
        };
        let market = match CoinGeckoAdapter::new(settings.market.clone()) {
            Ok(m) => m,
            Err(e) => return fail(&e),
        };

        let state = AppState {
            store: Arc::new(store),
            market: Arc::new(market),
            cache_policy: settings.cache_policy,
        };

        let runtime = match tokio::runtime::Runtime::new() {
            Ok(rt) => rt,
            Err(e) => return fail(&CoinfolioError::Io(e)),
        };

        let result = runtime.block_on(async {
            let router = build_router(state, &settings.auth).await?;
            let listener = tokio::net::TcpListener::bind(&settings.listen).await?;
            eprintln!("Starting web server on {}", settings.listen);
            tracing::info!(listen = %settings.listen, "server started");
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = tokio::signal::ctrl_c().await;
                })
                .await?;
            Ok::<(), CoinfolioError>(())
        });

        match result {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => fail(&e),
        }
    }

    #[cfg(not(feature = "web"))]
    {
        let _ = config_path;
        eprintln!("error: web feature is required for serve");
        ExitCode::from(1)
    }
}

fn run_init_db(config_path: &Path) -> ExitCode {
    #[cfg(feature = "sqlite")]
    {
        use crate::adapters::sqlite_adapter::SqliteAdapter;

        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(code) => return code,
        };
        match SqliteAdapter::from_config(&config).and_then(|s| s.initialize_schema()) {
            Ok(()) => {
                eprintln!("Profile store initialised");
                ExitCode::SUCCESS
            }
            Err(e) => fail(&e),
        }
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = config_path;
        eprintln!("error: sqlite feature is required for init-db");
        ExitCode::from(1)
    }
}

fn run_grant_admin(config_path: &Path, email: &str) -> ExitCode {
    #[cfg(feature = "sqlite")]
    {
        use crate::adapters::sqlite_adapter::SqliteAdapter;
        use crate::domain::user::UserRole;
        use crate::ports::store_port::ProfileStore;

        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(code) => return code,
        };
        let store = match SqliteAdapter::from_config(&config) {
            Ok(s) => s,
            Err(e) => return fail(&e),
        };

        let email = email.trim().to_lowercase();
        let result = store.credentials_by_email(&email).and_then(|creds| {
            let creds = creds.ok_or_else(|| CoinfolioError::UserNotFound { id: email.clone() })?;
            let mut user = store.get_user(&creds.user_id)?;
            if user.is_admin() {
                return Ok(user);
            }
            user.role = UserRole::Admin;
            store.save_user(&user)
        });

        match result {
            Ok(user) => {
                println!("{} ({}) is now {}", user.email, user.id, user.role.as_str());
                ExitCode::SUCCESS
            }
            Err(e) => fail(&e),
        }
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = (config_path, email);
        eprintln!("error: sqlite feature is required for grant-admin");
        ExitCode::from(1)
    }
}

fn run_hash_password() -> ExitCode {
    #[cfg(feature = "web")]
    {
        use crate::adapters::web::auth::hash_password;
        use std::io::{self, BufRead};

        eprintln!("Enter password to hash:");
        let password = match io::stdin().lock().lines().next() {
            Some(Ok(line)) => line,
            Some(Err(e)) => return fail(&CoinfolioError::Io(e)),
            None => String::new(),
        };

        match hash_password(password.trim_end_matches('\r')) {
            Ok(hash) => {
                println!("{hash}");
                ExitCode::SUCCESS
            }
            Err(e) => fail(&e),
        }
    }

    #[cfg(not(feature = "web"))]
    {
        eprintln!("error: web feature is required for hash-password");
        ExitCode::from(1)
    }
}

/// Coins to evaluate: one file, or every `.csv` in a directory.
fn csv_targets(path: &Path) -> Result<(CsvAdapter, Vec<String>), CoinfolioError> {
    if path.is_dir() {
        let adapter = CsvAdapter::new(path.to_path_buf());
        let coins = adapter.list_coins()?;
        Ok((adapter, coins))
    } else {
        let (adapter, coin) = CsvAdapter::for_file(path)?;
        Ok((adapter, vec![coin]))
    }
}

pub fn format_signal(coin: &str, signal: &TechnicalSignal) -> String {
    format!(
        "{coin}: {} (confidence {:.0}%)\n  RSI(14):  {:.2} {}\n  SMA(50):  {:.2}\n  SMA(200): {:.2} {}\n  {}",
        signal.summary.recommendation.as_str(),
        signal.summary.confidence * 100.0,
        signal.rsi.value,
        signal.rsi.sentiment.as_str(),
        signal.moving_averages.sma50,
        signal.moving_averages.sma200,
        signal.moving_averages.sentiment.as_str(),
        signal.summary.text,
    )
}

fn run_signal(csv_path: &Path, json: bool) -> ExitCode {
    let (adapter, coins) = match csv_targets(csv_path) {
        Ok(t) => t,
        Err(e) => return fail(&e),
    };
    if coins.is_empty() {
        eprintln!("error: no .csv files in {}", csv_path.display());
        return ExitCode::from(1);
    }

    let mut exit = ExitCode::SUCCESS;
    for coin in &coins {
        let points = match adapter.fetch_history(coin) {
            Ok(p) => p,
            Err(e) => {
                exit = fail(&e);
                continue;
            }
        };
        let Some(signal) = generate_signal(&points) else {
            exit = fail(&CoinfolioError::InsufficientData {
                points: points.len(),
                minimum: MIN_POINTS,
            });
            continue;
        };
        if json {
            match serde_json::to_string_pretty(&serde_json::json!({ "coin": coin, "signal": signal })) {
                Ok(s) => println!("{s}"),
                Err(e) => {
                    eprintln!("error: {e}");
                    exit = ExitCode::from(1);
                }
            }
        } else {
            println!("{}", format_signal(coin, &signal));
        }
    }
    exit
}
