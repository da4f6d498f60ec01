// Feedscope entry point.
//
// Startup sequence:
// 1. Initialize tracing (log to file, not terminal)
// 2. Load config
// 3. Build collaborators (team directory, preference store, feed/menu sinks)
// 4. Mount the widget
// 5. Spawn the host bridge, if enabled
// 6. Run the TUI until the user quits
// 7. Unmount and stop the bridge

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use feedscope_core::bridge::{self, BridgeOutbox};
use feedscope_core::collab::{CreateTeamLink, ExternalOpener, FeedScope, MenuChannel, TracingFeed};
use feedscope_core::config;
use feedscope_core::http::HttpTeamDirectory;
use feedscope_core::runtime::{Widget, WidgetParts};
use feedscope_core::store::JsonFileStore;
use tokio::sync::mpsc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Tracing
    init_tracing()?;
    info!("Feedscope starting up");

    // 2. Config
    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: api={}{}, bridge={}",
        config.api.base_url,
        config.api.teams_path,
        if config.bridge.enabled { "on" } else { "off" }
    );

    // 3. Collaborators
    let directory = HttpTeamDirectory::new(
        &config.api.base_url,
        &config.api.teams_path,
        config.credentials.api_token.clone(),
        config.api.timeout(),
    )
    .context("failed to build team directory client")?;

    let preference_path = config
        .storage
        .resolve_preference_path()
        .context("no home directory found; set storage.preference_path")?;
    info!("Preference file: {}", preference_path.display());
    let store = JsonFileStore::new(preference_path);

    let (outbox, outbound_rx) = if config.bridge.enabled {
        let (outbox, rx) = BridgeOutbox::channel();
        (Some(outbox), Some(rx))
    } else {
        (None, None)
    };
    let feed: Arc<dyn FeedScope> = match &outbox {
        Some(outbox) => Arc::new(outbox.clone()),
        None => Arc::new(TracingFeed),
    };
    let opener: Arc<dyn ExternalOpener> = match &outbox {
        Some(outbox) => Arc::new(outbox.clone()),
        None => Arc::new(TracingFeed),
    };
    let menu: Option<Arc<dyn MenuChannel>> =
        outbox.map(|outbox| Arc::new(outbox) as Arc<dyn MenuChannel>);
    let create_team = Some(CreateTeamLink {
        url: config.api.create_team_url.clone(),
        opener,
    });

    let user = config.session.user();
    match &user {
        Some(user) => info!("Signed in as {} ({})", user.username, user.uid),
        None => info!("No session configured, waiting for the host"),
    }

    // 4. Mount
    let (ui_tx, ui_rx) = mpsc::channel(256);
    let mut widget = Widget::mount(
        WidgetParts {
            directory: Arc::new(directory),
            store: Arc::new(store),
            feed: Some(feed),
            menu,
            create_team,
            user,
            timings: config.polling.timings(),
            online: true,
        },
        ui_tx,
    );

    // 5. Host bridge
    let bridge_handle = outbound_rx.map(|outbound| {
        let (host_tx, host_rx) = mpsc::channel(64);
        widget.subscribe(host_rx);
        let port = config.bridge.port;
        let cancel = widget.child_token();
        tokio::spawn(async move {
            if let Err(e) = bridge::run(port, host_tx, outbound, cancel).await {
                error!("Host bridge error on port {}: {}", port, e);
            }
        })
    });

    // 6. TUI (blocks until the user quits)
    if let Err(e) = feedscope_tui::run(ui_rx, widget.commands()).await {
        error!("TUI error: {}", e);
    }

    // 7. Cleanup
    widget.unmount().await;
    if let Some(handle) = bridge_handle {
        if tokio::time::timeout(Duration::from_secs(2), handle).await.is_err() {
            error!("Host bridge did not stop in time");
        }
    }

    info!("Feedscope shut down cleanly");
    Ok(())
}

/// Log to `logs/feedscope.log`; the terminal belongs to the TUI.
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("feedscope.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("feedscope=info,feedscope_core=info,feedscope_tui=info,warn")
        }))
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
