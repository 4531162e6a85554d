#![cfg(not(tarpaulin_include))]

use sheetdesk::app::{self, AppState};
use sheetdesk::config::{AppConfig, DEFAULT_CONFIG_PATH, NotifierKind};
use sheetdesk::form::FormField;
use sheetdesk::mailer::EmailNotifier;
use sheetdesk::notify::{Notifier, TelegramNotifier};
use sheetdesk::range::A1Range;
use sheetdesk::transport::{GoogleSheetsTransport, MemoryTransport, SheetTransport};
use std::env;
use std::path::Path;
use std::sync::Arc;

/// Main entry point for the production request service
///
/// Reads `sheetdesk.toml` (or the file named by `SHEETDESK_CONFIG`), applies
/// `.env` and environment overrides, and serves the JSON API.
///
/// Passing `--offline` swaps the Google Sheets transport for an in-process
/// store seeded with the default form headers.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let offline = env::args().any(|arg| arg == "--offline");
    let path = env::var("SHEETDESK_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

    let mut config = if offline && !Path::new(&path).exists() {
        AppConfig::default()
    } else {
        AppConfig::from_file(&path)?
    };
    config.apply_env_overrides();
    if offline && config.sheets.requests_url.is_empty() {
        config.sheets.requests_url = "offline".to_string();
    }
    config.validate()?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(config.logging.level.as_str()))
        .init();

    let transport: Arc<dyn SheetTransport> = if offline {
        log::warn!("Running offline: submissions are kept in memory only");
        let store = MemoryTransport::new();
        for address in [config.sheets.requests_address()?, config.sheets.form_address()?] {
            let tab = A1Range::parse(&address.range)?
                .sheet
                .unwrap_or_else(|| "Sheet1".to_string());
            if store.snapshot(&address.sheet_id, &tab).is_empty() {
                store.seed(&address.sheet_id, &tab, vec![FormField::default_headers()]);
            }
        }
        Arc::new(store)
    } else {
        Arc::new(GoogleSheetsTransport::new(&config.sheets)?)
    };

    let notifier: Option<Arc<dyn Notifier>> = match config.notify.kind {
        NotifierKind::Telegram => Some(Arc::new(TelegramNotifier::new(&config.notify)?)),
        NotifierKind::Email => Some(Arc::new(EmailNotifier::new(&config.notify)?)),
        NotifierKind::None => None,
    };

    let state = AppState::new(&config, transport, notifier)?;
    app::run(config, state).await
}
