mod controller;
mod model;
mod view;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::Mutex;

use aniliberty_rs::api::{ApiClient, CollectionType};
use aniliberty_rs::auth::{self, AuthSession};
use aniliberty_rs::logging;
use aniliberty_rs::player::{HlsBackend, PlaybackSession, Quality};
use aniliberty_rs::storage::{FileStore, KeyValueStore, COLLECTIONS_KEY, FAVORITES_KEY};
use aniliberty_rs::store::{CatalogLoader, CollectionsRemote, FavoritesRemote, OptimisticStore};
use aniliberty_rs::AppConfig;

use controller::{AppController, AppServices};
use model::AppModel;
use view::{AppView, Screen};

/// Terminal client for the AniLiberty anime catalog
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Base URL of the API
    #[arg(long)]
    api_url: Option<String>,

    /// Directory for the token and cached favorites/collections
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Preferred stream quality (480p, 720p, 1080p)
    #[arg(long)]
    quality: Option<Quality>,

    /// Do not start playing when a stream is ready
    #[arg(long)]
    no_autoplay: bool,

    /// Automatic playback retries before giving up
    #[arg(long)]
    max_retries: Option<u32>,

    /// Log in with this login or email before starting
    #[arg(long, requires = "password")]
    login: Option<String>,

    #[arg(long, env = "ANILIBERTY_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Log in with a one-time code confirmed on another device
    #[arg(long, conflicts_with = "login")]
    otp: bool,

    /// End the stored session and exit
    #[arg(long)]
    logout: bool,
}

impl Cli {
    fn config(&self) -> AppConfig {
        let mut config = AppConfig::from_env();
        if let Some(url) = &self.api_url {
            config.api.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(dir) = &self.cache_dir {
            config.storage.cache_dir = dir.clone();
        }
        if let Some(quality) = self.quality {
            config.player.default_quality = quality;
        }
        if self.no_autoplay {
            config.player.autoplay = false;
        }
        if let Some(retries) = self.max_retries {
            config.player.max_retries = retries;
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let _log_guard = match logging::init_logging() {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: Failed to initialize logging: {}", e);
            None
        }
    };

    tracing::info!("=== AniLiberty-RS Client Starting ===");

    let config = cli.config();
    let storage: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(config.storage.cache_dir.clone()));
    let api = ApiClient::new(&config.api, storage.clone()).context("Failed to build the API client")?;

    // Step 1: Account
    let auth = AuthSession::new(api.clone());
    if cli.logout {
        auth.restore().await.ok();
        auth.logout().await;
        println!("Logged out.");
        return Ok(());
    }
    sign_in(&cli, &auth).await?;

    // Step 2: Stores, cached state first so the UI has something to show
    let favorites = OptimisticStore::new(FAVORITES_KEY, FavoritesRemote::new(api.clone()), storage.clone());
    let collections = OptimisticStore::new(COLLECTIONS_KEY, CollectionsRemote::new(api.clone()), storage.clone());
    for restored in [favorites.restore().await, collections.restore().await] {
        if let Err(e) = restored {
            tracing::warn!(error = %e, "Ignoring unreadable cached state");
        }
    }

    // Step 3: Player
    let http = reqwest::Client::builder()
        .user_agent(config.api.user_agent.clone())
        .build()
        .context("Failed to build the stream client")?;
    let (player, player_task) = PlaybackSession::spawn(HlsBackend::new(http), config.player.clone());

    let services = Arc::new(AppServices {
        catalog: CatalogLoader::new(api.clone(), config.catalog.clone()),
        config,
        auth,
        favorites,
        collections,
        player,
    });

    let app_model = AppModel::new();
    app_model.set_account(services.auth.user().map(|user| user.display_name())).await;
    let model = Arc::new(Mutex::new(app_model));
    let controller = AppController::new(model.clone(), services.clone());

    let controller_for_init = controller.clone();
    tokio::spawn(async move {
        controller_for_init.initial_load().await;
    });

    tracing::info!("Starting TUI...");

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, model, controller).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        tracing::error!(error = ?err, "Application error");
    }

    services.player.stop();
    drop(services);
    if tokio::time::timeout(Duration::from_secs(1), player_task).await.is_err() {
        tracing::debug!("Player task still busy at shutdown");
    }

    tracing::info!("AniLiberty-RS Client shutting down");
    Ok(())
}

/// Restore the stored session, or log in when asked to on the command line.
async fn sign_in(cli: &Cli, auth: &AuthSession) -> Result<()> {
    if let (Some(login), Some(password)) = (&cli.login, &cli.password) {
        let user = auth.login(login, password).await.context("Login failed")?;
        tracing::info!(user_id = user.id, "Logged in with password");
        return Ok(());
    }

    if cli.otp {
        let device_id = auth::device_id();
        let challenge = auth.request_otp(&device_id).await.context("Could not request a one-time code")?;
        println!("Confirm code {} on a device where you are logged in.", challenge.code);
        if let Some(left) = challenge.seconds_left(chrono::Utc::now()) {
            println!("The code expires in {left} seconds.");
        }
        println!("Then enter the confirmation code shown there:");

        let mut line = String::new();
        io::stdin().read_line(&mut line)?;
        let code: u32 = line.trim().parse().context("The code must be a number")?;
        let user = auth.login_with_otp(code, &device_id).await.context("One-time code login failed")?;
        tracing::info!(user_id = user.id, "Logged in with one-time code");
        return Ok(());
    }

    match auth.restore().await {
        Ok(Some(user)) => tracing::info!(user = %user.display_name(), "Using stored session"),
        Ok(None) => tracing::info!("Browsing as guest"),
        Err(e) => tracing::warn!(error = %e, "Could not verify stored session, keeping it"),
    }
    Ok(())
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    model: Arc<Mutex<AppModel>>,
    controller: AppController,
) -> io::Result<()> {
    let services = controller.services.clone();

    loop {
        let (ui_state, should_quit) = {
            let model_guard = model.lock().await;

            // Auto-clear old errors (after 5 seconds)
            model_guard.auto_clear_old_errors().await;

            (model_guard.get_ui_state().await, model_guard.should_quit().await)
        };

        if should_quit {
            break;
        }

        let screen = Screen {
            ui_state,
            catalog: services.catalog.snapshot(),
            playback: services.player.snapshot(),
            favorites: services.favorites.ids(),
            collections: services.collections.snapshot(),
            collection_counts: CollectionType::ALL
                .into_iter()
                .map(|collection| (collection, services.collections.releases_in(collection).len()))
                .collect(),
        };

        terminal.draw(|f| {
            AppView::render(f, &screen);
        })?;

        // Handle input with shorter poll time for smoother UI updates
        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if let Err(e) = controller.handle_key_event(key).await {
                    tracing::warn!(error = %e, "Key handling failed");
                }
            }
        }
    }

    Ok(())
}
