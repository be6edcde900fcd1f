//! Sift - search a Gmail mailbox with a language model

mod cli;

use std::io;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, error, info};

use cli::Cli;
use inbox::{
    CancellationToken, GeminiClient, GeminiCredentials, GmailAuth, GmailClient, GmailCredentials,
    ResultPresenter, SearchObserver, SearchPipeline, SearchSettings, SearchState,
    StaticTokenProvider, TextPresenter, TokenProvider,
};

fn main() -> ExitCode {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    // Bootstrap config directory
    if let Err(e) = config::init() {
        error!("Failed to initialize config directory: {}", e);
    }

    let cli = Cli::parse();
    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Run one command; `Ok(false)` when the search itself failed and was reported
fn run(cli: &Cli) -> Result<bool> {
    if cli.logout {
        GmailAuth::clear_cached_token()?;
        println!("Signed out of Gmail.");
        return Ok(true);
    }

    let query = cli.query().context("Search query must not be empty")?;
    let settings = cli.apply(SearchSettings::load()?);
    debug!("Search settings: {:?}", settings);

    let tokens = token_provider(&settings)?;
    let gemini = GeminiCredentials::load()
        .context("No Gemini API key configured (gemini.json or GEMINI_API_KEY)")?;
    info!("Classifying with model {}", gemini.model);

    let model = GeminiClient::from_credentials(&gemini).with_retry(settings.retry);
    let source = GmailClient::new().with_retry(settings.retry);
    let pipeline =
        SearchPipeline::from_settings(tokens, Arc::new(source), Arc::new(model), &settings)?;

    // First Ctrl-C cancels the search, a second one exits immediately
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    ctrlc::set_handler(move || {
        if !interrupt(&on_interrupt) {
            std::process::exit(130);
        }
        eprintln!("Cancelling search, press Ctrl-C again to quit");
    })
    .context("Failed to install Ctrl-C handler")?;

    let mut presenter = TextPresenter::new(io::stdout());
    presenter.searching()?;

    match pipeline.search_with(query, &cancel, &LogObserver) {
        Ok(outcome) => {
            presenter.present(&outcome.results)?;
            let stats = &outcome.stats;
            info!(
                "{} pages, {} messages, {} without plaintext, {} fetch failures, {} classification failures, {}ms",
                stats.pages_fetched,
                stats.messages_fetched,
                stats.messages_without_body,
                stats.detail_failures,
                stats.classification_errors,
                stats.duration_ms
            );
            Ok(true)
        }
        Err(e) => {
            presenter.present_error(&e)?;
            Ok(false)
        }
    }
}

/// Cancel on the first interrupt; `false` once the search was already cancelled
fn interrupt(cancel: &CancellationToken) -> bool {
    if cancel.is_cancelled() {
        return false;
    }
    cancel.cancel();
    true
}

/// Static token from the environment if present, Gmail OAuth otherwise
fn token_provider(settings: &SearchSettings) -> Result<Arc<dyn TokenProvider>> {
    if let Some(provider) = StaticTokenProvider::from_env() {
        info!("Using access token from {}", StaticTokenProvider::ENV_VAR);
        return Ok(Arc::new(provider));
    }

    let creds = GmailCredentials::load().context(
        "No Gmail OAuth credentials found (google-credentials.json or GMAIL_CLIENT_ID / GMAIL_CLIENT_SECRET)",
    )?;
    let auth = GmailAuth::new(creds.client_id, creds.client_secret)?;
    if !auth.is_authenticated() && settings.interactive {
        info!("No cached Gmail token, a browser window may open for consent");
    }
    Ok(Arc::new(auth))
}

/// Reports pipeline progress through the log
struct LogObserver;

impl SearchObserver for LogObserver {
    fn on_state(&self, state: &SearchState) {
        debug!("Search state: {}", state);
    }

    fn on_progress(&self, processed: usize, total: usize) {
        if processed == total || processed % 50 == 0 {
            info!("Classified {}/{} messages", processed, total);
        }
    }
}
