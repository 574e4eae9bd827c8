use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use xemphim_core::config::AppConfig;
use xemphim_core::models::{CategorySummary, NotificationTarget, ThemePreference};
use xemphim_core::servers::ServerListState;
use xemphim_runtime::{Runtime, RuntimeError};

const DEFAULT_FILTER: &str = "xemphim=info,xemphim_runtime=info,xemphim_core=info";

#[derive(Parser)]
#[command(name = "xemphim", about = "Xem Phim client: theme, notifications, playback")]
struct Cli {
    /// Also write logs to a daily-rotated file in this directory.
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show or change the theme preference.
    Theme {
        #[command(subcommand)]
        action: ThemeAction,
    },
    /// Unread notification badge.
    Unread {
        #[command(subcommand)]
        action: UnreadAction,
    },
    /// List this device's notification history.
    Notifications {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    /// Recently updated series.
    Latest,
    /// Search series by name.
    Search { query: String },
    /// Show a series and its episodes.
    Series { slug: String },
    /// Load an episode and list its servers.
    Episode {
        slug: String,
        /// Follow the episode's "next" link after loading it.
        #[arg(long, conflicts_with = "prev")]
        next: bool,
        /// Follow the episode's "previous" link after loading it.
        #[arg(long)]
        prev: bool,
        /// Server id to play instead of the default.
        #[arg(long)]
        server: Option<String>,
        /// Print the player page for the active server.
        #[arg(long)]
        html: bool,
    },
    /// Push device token used by the notification endpoints.
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },
    /// Configuration file locations.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ThemeAction {
    Show,
    /// One of: light, dark, system.
    Set { preference: ThemePreference },
    /// Cycle system -> light -> dark -> system.
    Toggle,
    /// Clear the stored preference.
    Reset,
}

#[derive(Subcommand)]
enum UnreadAction {
    Show,
    /// Mark one notification from the history as read.
    MarkRead { id: String },
    /// Keep polling the backend and print the count when it changes.
    Watch,
}

#[derive(Subcommand)]
enum TokenAction {
    Show,
    Set { value: String },
}

#[derive(Subcommand)]
enum ConfigAction {
    Path,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let _guard = init_tracing(cli.log_dir.as_deref());

    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(
    log_dir: Option<&std::path::Path>,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "xemphim.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(writer)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
            None
        }
    }
}

async fn run(command: Command) -> Result<(), RuntimeError> {
    match command {
        Command::Config {
            action: ConfigAction::Path,
        } => {
            println!("config: {}", AppConfig::config_path().display());
            println!("database: {}", AppConfig::db_path().display());
        }
        Command::Theme { action } => {
            let rt = Runtime::new()?;
            rt.load_theme().await;
            match action {
                ThemeAction::Show => {}
                ThemeAction::Set { preference } => rt.set_theme(preference).await?,
                ThemeAction::Toggle => {
                    rt.toggle_theme().await?;
                }
                ThemeAction::Reset => rt.reset_theme().await?,
            }
            println!(
                "preference: {} (rendering {})",
                rt.theme_preference(),
                rt.color_scheme()
            );
        }
        Command::Unread { action } => {
            let rt = Runtime::new()?;
            match action {
                UnreadAction::Show => {
                    rt.refresh_unread().await;
                }
                UnreadAction::MarkRead { id } => {
                    rt.refresh_unread().await;
                    let notification = rt
                        .find_notification(&id)
                        .await?
                        .ok_or_else(|| RuntimeError::NotFound(format!("notification {id}")))?;
                    if let Some(target) = rt.open_notification(&notification).await? {
                        println!("opens {}", describe_target(&target));
                    }
                }
                UnreadAction::Watch => return watch_unread(rt).await,
            }
            let state = rt.unread_state();
            println!("unread: {}", state.unread_count);
            if let Some(err) = state.error {
                println!("last sync failed: {err}");
            }
        }
        Command::Notifications { page, limit } => {
            let result = Runtime::new()?.notifications(page, limit).await?;
            for n in &result.data {
                let mark = if n.is_read { ' ' } else { '*' };
                println!(
                    "{mark} [{}] {}  {}  {}",
                    n.id,
                    n.sent_at.format("%Y-%m-%d %H:%M"),
                    n.title,
                    n.body
                );
                if let Some(target) = n.target() {
                    println!("    -> {}", describe_target(&target));
                }
            }
            println!(
                "page {}/{} ({} total)",
                result.pagination.page, result.pagination.pages, result.pagination.total
            );
            if let Some(next) = result.next_page() {
                println!("more: --page {next}");
            }
        }
        Command::Latest => {
            let page = Runtime::new()?.latest().await?;
            for series in &page.series {
                print_series_line(series);
            }
            println!("page {}/{} ({} total)", page.page, page.pages, page.total);
        }
        Command::Search { query } => {
            let results = Runtime::new()?.search(&query).await?;
            if results.is_empty() {
                println!("No series matching {query:?}");
            }
            for series in &results {
                print_series_line(series);
            }
        }
        Command::Series { slug } => {
            let series = Runtime::new()?.series(&slug).await?;
            println!("{}", series.title());
            if let Some(other) = series.another_name.as_deref() {
                println!("  {other}");
            }
            for episode in series.sorted_episodes() {
                if let Some(key) = episode.key() {
                    println!("  Tập {:>4}  {key}", episode.number());
                }
            }
        }
        Command::Episode {
            slug,
            next,
            prev,
            server,
            html,
        } => {
            let rt = Runtime::new()?;
            let mut state = rt.open_episode(&slug).await;
            if next || prev {
                if let ServerListState::Error(msg) = state {
                    return Err(RuntimeError::Api(msg));
                }
                let followed = if next {
                    rt.open_next_episode().await
                } else {
                    rt.open_previous_episode().await
                };
                state = followed.ok_or_else(|| {
                    let dir = if next { "next" } else { "previous" };
                    RuntimeError::NotFound(format!("{dir} episode of {slug}"))
                })?;
            }

            if let Some(record) = rt.current_episode() {
                println!("{}", record.display_title());
                let prev = record.prev_episode.as_deref().unwrap_or("-");
                let next = record.next_episode.as_deref().unwrap_or("-");
                println!("  prev: {prev}  next: {next}");
            }

            match state {
                ServerListState::Error(msg) => return Err(RuntimeError::Api(msg)),
                ServerListState::Empty => {
                    println!("No servers available for {slug}");
                    return Ok(());
                }
                _ => {}
            }
            if let Some(id) = server {
                if rt.select_server(&id).is_none() {
                    tracing::warn!(server = %id, "Unknown server, keeping default");
                }
            }

            let active = rt.active_server().map(|s| s.id);
            for s in rt.servers() {
                let mark = if Some(&s.id) == active.as_ref() { '>' } else { ' ' };
                println!("{mark} [{}] {}  {}", s.id, s.name, s.url);
            }

            if let Some(embed) = rt.player_embed().await {
                if html {
                    print!("{}", embed.html());
                } else {
                    let mode = if embed.is_sandboxed() { "sandboxed" } else { "trusted" };
                    let host = embed.host().unwrap_or_else(|| embed.url().to_string());
                    println!("player: {host} ({mode})");
                }
            }
        }
        Command::Token { action } => {
            let rt = Runtime::new()?;
            match action {
                TokenAction::Show => match rt.device_token().await {
                    Some(token) => println!("{token}"),
                    None => println!("no device token"),
                },
                TokenAction::Set { value } => rt.save_device_token(&value).await?,
            }
        }
    }

    Ok(())
}

fn describe_target(target: &NotificationTarget) -> String {
    match target {
        NotificationTarget::Episode(slug) => format!("episode {slug}"),
        NotificationTarget::Series(slug) => format!("series {slug}"),
    }
}

fn print_series_line(series: &CategorySummary) {
    let slug = series.slug.as_deref().unwrap_or("-");
    let latest = series
        .latest_episode()
        .map(|e| format!("  latest: Tập {}", e.number()))
        .unwrap_or_default();
    println!("[{slug}] {}{latest}", series.title());
}

async fn watch_unread(rt: Runtime) -> Result<(), RuntimeError> {
    let rt = Arc::new(rt);
    let (theme, state) = rt.initialize().await;
    tracing::info!(%theme, unread = state.unread_count, "Watching unread count");

    let store = rt.notification_store();
    let poller = rt.spawn_unread_poller();
    let mut last = None;
    let mut tick = tokio::time::interval(Duration::from_secs(1));

    loop {
        tokio::select! {
            _ = tick.tick() => {
                let count = store.unread_count();
                if last != Some(count) {
                    println!("unread: {count}");
                    last = Some(count);
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    poller.abort();
    Ok(())
}
