//! gigcache - find live shows near you from the terminal.
//!
//! Every invocation runs one discovery pass: the cached snapshot answers
//! when it is fresh and covers the requested window, otherwise the shows
//! endpoint is queried. Saved events, hidden events and hidden genres are
//! kept locally and optionally mirrored to a remote document.

mod commands;
mod output;

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use tracing::{info, warn, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use gigcache_core::auth::{CredentialStore, Session, SessionData, StaticToken, TokenProvider};
use gigcache_core::library::HttpDocumentStore;
use gigcache_core::{
    resolve, ApiClient, Config, Discovery, DiscoveryOutcome, DiscoverySettings,
    FileStore, FixedGeolocator, Geolocator, View,
};

use commands::{Command, USAGE};

/// Directory for daily-rotated log files; logs go to stderr only when unset.
const LOG_DIR_ENV: &str = "GIGCACHE_LOG_DIR";

/// Prefix of the rotated log files.
const LOG_FILE: &str = "gigcache.log";

/// Keychain account used when a session token is stored without a login.
const LOCAL_USERNAME: &str = "local";

/// Registry with the env filter, an optional non-blocking file layer and
/// a stderr layer. The guard flushes the file layer when dropped.
fn build_subscriber(
    filter: EnvFilter,
    log_dir: Option<&Path>,
) -> (impl Subscriber + Send + Sync + 'static, Option<WorkerGuard>) {
    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let file_appender = tracing_appender::rolling::daily(dir, LOG_FILE);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            (Some(fmt::layer().with_writer(non_blocking).with_ansi(false)), Some(guard))
        }
        None => (None, None),
    };
    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(fmt::layer().with_writer(io::stderr));
    (subscriber, guard)
}

/// Initialize the tracing subscriber for logging.
///
/// RUST_LOG controls the level (default `warn`). The returned guard must be
/// held until exit so buffered file output is flushed.
fn init_tracing() -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let log_dir = std::env::var(LOG_DIR_ENV)
        .ok()
        .filter(|d| !d.trim().is_empty())
        .map(PathBuf::from);
    let (subscriber, guard) = build_subscriber(filter, log_dir.as_deref());
    subscriber.init();
    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();
    let _log_guard = init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = Command::parse(&args)?;
    let config = Config::load_with_env();
    let data_dir = config.data_dir()?;

    match &command {
        Command::Help => {
            print!("{}", USAGE);
            return Ok(());
        }
        Command::Endpoint => {
            let resolved = resolve(
                config.base_url(),
                &config.endpoint_overrides(),
                config.origin.as_deref(),
            );
            let scope = if resolved.is_remote { "remote" } else { "same origin" };
            println!("{} ({})", resolved.endpoint, scope);
            return Ok(());
        }
        Command::Login { username, token } => return login(username, token),
        Command::Session(token) => return start_session(&config, &data_dir, token),
        Command::Logout => return logout(&config, &data_dir),
        _ => {}
    }

    info!(?command, "gigcache starting");
    let discovery = build_discovery(&config, &data_dir).await?;
    let initial = discovery.init().await;
    let outcome = run(&discovery, command, initial).await;
    if let DiscoveryOutcome::Failed(e) = &outcome {
        warn!(error = %e, "Discovery failed");
    }

    output::print_view(&discovery.render());
    discovery.close().await;
    Ok(())
}

async fn build_discovery(config: &Config, data_dir: &Path) -> Result<Discovery> {
    let store = Arc::new(FileStore::new(data_dir.to_path_buf())?);
    let geolocator: Arc<dyn Geolocator> = match config.location() {
        Some(location) => Arc::new(FixedGeolocator::new(location)),
        None => Arc::new(FixedGeolocator::unconfigured()),
    };
    let tokens = token_provider(config, store.as_ref());

    let remote = match config.remote_document_url.as_deref() {
        Some(url) => {
            let token = tokens.bearer_token().await.unwrap_or_else(|e| {
                warn!(error = %e, "Remote document requested without a usable token");
                None
            });
            Some(HttpDocumentStore::new(url, token)?)
        }
        None => None,
    };

    let discovery = Discovery::new(
        DiscoverySettings::from_config(config),
        store,
        ApiClient::new()?,
        geolocator,
        tokens,
    );
    Ok(match remote {
        Some(remote) => discovery.with_remote(Arc::new(remote)),
        None => discovery,
    })
}

/// Environment token first, then the keychain account, then a session file.
fn token_provider(config: &Config, store: &FileStore) -> Arc<dyn TokenProvider> {
    if let Some(token) = config.token.clone() {
        return Arc::new(StaticToken::new(token));
    }
    if let Some(username) = config.auth_username.as_deref() {
        return Arc::new(CredentialStore::new(username));
    }
    let session = Session::load(store, Utc::now()).unwrap_or_else(|e| {
        warn!(error = %e, "Ignoring unreadable session");
        Session::default()
    });
    Arc::new(session)
}

async fn run(discovery: &Discovery, command: Command, initial: DiscoveryOutcome) -> DiscoveryOutcome {
    match command {
        Command::Refresh => match initial {
            DiscoveryOutcome::Fetched { .. } => initial,
            _ => discovery.refresh().await,
        },
        Command::Saved { day } => {
            discovery.set_view(View::Saved);
            discovery.set_calendar_day(day);
            initial
        }
        Command::Save(id) => {
            match discovery.toggle_saved(&id) {
                Some(true) => println!("Saved {}", id),
                Some(false) => println!("Removed {} from saved events", id),
                None => eprintln!("No event with id {}", id),
            }
            initial
        }
        Command::Hide(id) => {
            if discovery.hide_event(&id) {
                println!("Hid {}", id);
            } else {
                println!("{} was already hidden", id);
            }
            initial
        }
        Command::Only(genres) if genres.iter().all(|g| g.eq_ignore_ascii_case("all")) => {
            discovery.select_all_genres();
            initial
        }
        Command::Only(genres) => {
            discovery.select_genres(&genres);
            initial
        }
        Command::HideGenre(genre) => {
            if !discovery.hide_genre(&genre) {
                println!("{} was already hidden", genre);
            }
            initial
        }
        Command::RestoreGenre(genre) => {
            if !discovery.restore_genre(&genre) {
                println!("{} was not hidden", genre);
            }
            initial
        }
        Command::Radius(radius) => discovery.set_radius(radius).await,
        Command::Days(days) => discovery.set_days(days).await,
        Command::Through(date) => discovery.set_days_through(date).await,
        Command::Discover
        | Command::Endpoint
        | Command::Login { .. }
        | Command::Session(_)
        | Command::Logout
        | Command::Help => initial,
    }
}

fn login(username: &str, token: &str) -> Result<()> {
    CredentialStore::new(username).store(token)?;
    // Only the file-backed settings are written back, never env overrides.
    let mut config = Config::load().unwrap_or_default();
    config.auth_username = Some(username.to_string());
    config.save()?;
    println!("Stored token for {}", username);
    Ok(())
}

fn start_session(config: &Config, data_dir: &Path, token: &str) -> Result<()> {
    let username = config.auth_username.as_deref().unwrap_or(LOCAL_USERNAME);
    let store = FileStore::new(data_dir.to_path_buf())?;
    let now = Utc::now();
    let session = Session::start(&store, SessionData::new(token, username, now))?;
    if let Some(data) = session.data() {
        println!("Session token valid for {} minutes", data.minutes_left(now));
    }
    if config.auth_username.is_some() {
        println!("Note: the keychain token for {} takes precedence; run logout to use the session", username);
    }
    Ok(())
}

fn logout(config: &Config, data_dir: &Path) -> Result<()> {
    if let Some(username) = config.auth_username.as_deref() {
        CredentialStore::new(username).delete()?;
        let mut file_config = Config::load().unwrap_or_default();
        file_config.auth_username = None;
        file_config.save()?;
    }
    Session::end(&FileStore::new(data_dir.to_path_buf())?)?;
    println!("Signed out");
    Ok(())
}
