//! loglens TUI — ratatui application shell.

pub mod app;
pub mod commands;
pub mod event;
pub mod theme;
pub mod widgets;

use std::sync::Arc;

use loglens_client::BackendClient;
use loglens_core::{config::Config, Role, SourceSpec};

pub use app::App;

/// Start the TUI against the backend named in `config`.
///
/// Runs on a current-thread runtime: one event loop plus one task per feed.
/// A non-local `source` is requested from the backend before the feeds
/// switch to it.
pub fn run(config: Config, source: SourceSpec, role: Role) -> anyhow::Result<()> {
    let client = BackendClient::from_config(&config.backend)?;
    tracing::info!(base_url = %client.base_url(), role = role.as_str(), "starting tui");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        let theme = theme::Theme::load_default();
        let app = App::new(Arc::new(client), &config, &SourceSpec::local().key(), role, theme);
        let initial = (source != SourceSpec::local()).then_some(source);
        app.run(initial).await
    })
}
