//! `QuickLaunch` - headless host for the quick-launch panel core
//!
//! Runs the catalog, recent-item and update operations from the command line.
//! A graphical front end drives the same `AppController`.

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use quicklaunch::{
    QuickLaunchError,
    catalog::CatalogStore,
    config::{ActionKind, ConfigManager, PanelPosition, SettingsPatch, Theme, Tile, TilePatch},
    controller::{AppController, CommandExecutor, STARTUP_CHECK_DELAY},
    error::get_user_friendly_error,
    events::EventBus,
    update::{ExecutableInstaller, GitHubReleaseSource, REPO_NAME, REPO_OWNER, UpdateManager},
    utils::{self, AutoStartManager},
    version,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Quick-launch panel core
#[derive(Debug, Parser)]
#[command(name = "quicklaunch", version = version::VERSION, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start the host: startup update check and event log
    Run,
    /// List tiles in display order
    List,
    /// Search enabled tiles by name
    Search {
        /// Case-insensitive filter
        filter: String,
    },
    /// Add a tile at the end of the catalog
    Add(AddArgs),
    /// Change fields of a tile
    Edit(EditArgs),
    /// Remove a tile
    Remove {
        /// Tile id
        id: String,
    },
    /// Move the tile at one position to another
    Move {
        /// Current position
        from: usize,
        /// New position
        to: usize,
    },
    /// Execute a tile, optionally with a path
    Launch {
        /// Tile id
        id: String,
        /// Path handed to the target
        path: Option<String>,
    },
    /// Record a recent item on a tile
    Recent {
        /// Tile id
        id: String,
        /// Item path
        path: String,
        /// Display name, defaults to the last path component
        #[arg(long)]
        name: Option<String>,
    },
    /// Clear the recent items of one tile, or of all tiles
    ClearRecent {
        /// Tile id; omit to clear every tile
        id: Option<String>,
    },
    /// Read or change settings
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Check for a newer release
    CheckUpdate,
    /// Download and install the newest release, then restart
    Update {
        /// Do not restart after installing
        #[arg(long)]
        no_restart: bool,
    },
    /// Manage launching at login
    Autostart {
        #[command(subcommand)]
        action: AutostartAction,
    },
    /// Print version and build information
    Version,
}

#[derive(Debug, Args)]
struct AddArgs {
    /// Display label
    name: String,
    /// Command, path or URL
    target: String,
    /// How the target is executed
    #[arg(long, default_value = "app")]
    action: ActionKind,
    /// Icon name
    #[arg(long, default_value = "")]
    icon: String,
    /// Working directory
    #[arg(long)]
    work_dir: Option<String>,
    /// Track recently used folders for this tile
    #[arg(long)]
    recent_folders: bool,
    /// Extra launch arguments
    #[arg(last = true)]
    args: Vec<String>,
}

#[derive(Debug, Args)]
struct EditArgs {
    /// Tile id
    id: String,
    /// New label
    #[arg(long)]
    name: Option<String>,
    /// New target
    #[arg(long)]
    target: Option<String>,
    /// New action kind
    #[arg(long)]
    action: Option<ActionKind>,
    /// New icon name
    #[arg(long)]
    icon: Option<String>,
    /// New colour, empty to clear
    #[arg(long)]
    color: Option<String>,
    /// Enable the tile
    #[arg(long, conflicts_with = "disable")]
    enable: bool,
    /// Disable the tile
    #[arg(long)]
    disable: bool,
}

impl EditArgs {
    fn into_patch(self) -> TilePatch {
        TilePatch {
            name: self.name,
            icon: self.icon,
            action: self.action,
            target: self.target,
            color: self.color.map(|c| Some(c).filter(|c| !c.is_empty())),
            enabled: match (self.enable, self.disable) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            },
            ..TilePatch::default()
        }
    }
}

#[derive(Debug, Subcommand)]
enum ConfigCommand {
    /// Print the settings as JSON
    Get,
    /// Change one setting
    Set {
        /// theme, hotkey, position, animation, blur, recentFoldersLimit or checkForUpdatesOnStartup
        key: String,
        /// New value
        value: String,
    },
}

#[derive(Debug, Clone, Copy, Subcommand)]
enum AutostartAction {
    /// Launch at login
    On,
    /// Do not launch at login
    Off,
    /// Show whether launching at login is enabled
    Status,
}

/// Main entry point for the application
///
/// Initializes logging, opens the configuration, wires the controller and
/// runs the requested command.
fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_dir = ConfigManager::default_config_dir();
    utils::init_logging(&config_dir).context("Failed to initialize logging system")?;
    info!("QuickLaunch v{} starting...", version::VERSION);

    let controller = build_controller().context("Failed to initialize core components")?;

    let command = cli.command.unwrap_or(Command::Run);
    if let Err(e) = run_command(&controller, command) {
        error!("Command failed: {:#}", e);
        if let Some(ql_error) = e.downcast_ref::<QuickLaunchError>() {
            eprintln!("{}", get_user_friendly_error(ql_error));
        }
        return Err(e);
    }

    info!("QuickLaunch shutting down");
    Ok(())
}

/// Opens the catalog and connects the update lifecycle and start-at-login entry
fn build_controller() -> Result<AppController> {
    let manager = ConfigManager::at_default_location();
    info!("Using configuration at {:?}", manager.path());
    let store = CatalogStore::open(Arc::new(manager)).context("Failed to load application configuration")?;
    info!("Configuration loaded with {} tiles", store.list().len());

    let installer = ExecutableInstaller::current().context("Failed to locate the running executable")?;
    installer.cleanup_backup();

    let source = GitHubReleaseSource::new(REPO_OWNER, REPO_NAME).context("Failed to create HTTP client")?;
    let events = EventBus::new();
    let updates = UpdateManager::new(
        version::current_version(),
        Arc::new(source),
        Arc::new(installer),
        events.clone(),
    );

    let autostart = AutoStartManager::for_current_platform().context("Failed to set up auto-start")?;

    Ok(
        AppController::new(Arc::new(store), updates, autostart, events)
            .with_executor(Arc::new(CommandExecutor)),
    )
}

fn run_command(controller: &AppController, command: Command) -> Result<()> {
    match command {
        Command::Run => run_host(controller),
        Command::List => {
            for tile in controller.get_tiles() {
                print_tile(&tile);
            }
            Ok(())
        }
        Command::Search { filter } => {
            for tile in controller.search_tiles(&filter) {
                print_tile(&tile);
            }
            Ok(())
        }
        Command::Add(args) => {
            let mut tile = Tile::new(uuid::Uuid::new_v4().to_string(), args.name, args.action, args.target);
            tile.icon = args.icon;
            tile.work_dir = args.work_dir;
            tile.args = args.args;
            if args.recent_folders {
                tile = tile.with_recent_folders();
            }
            let added = controller.add_tile(tile)?;
            println!("{}", added.id);
            Ok(())
        }
        Command::Edit(args) => {
            let id = args.id.clone();
            let patch = args.into_patch();
            if patch.is_empty() {
                bail!("nothing to change for tile {id}");
            }
            print_tile(&controller.update_tile(&id, patch)?);
            Ok(())
        }
        Command::Remove { id } => {
            let removed = controller.remove_tile(&id)?;
            println!("Removed {}", removed.name);
            Ok(())
        }
        Command::Move { from, to } => {
            for tile in controller.reorder_tiles(from, to)? {
                print_tile(&tile);
            }
            Ok(())
        }
        Command::Launch { id, path } => {
            controller.launch_tile(&id, path.as_deref())?;
            Ok(())
        }
        Command::Recent { id, path, name } => {
            let name = name.unwrap_or_else(|| display_name(&path));
            let tile = controller.add_recent_item(&id, &path, &name)?;
            for item in &tile.sub_menu_items {
                println!("{}  {}", item.timestamp.to_rfc3339(), item.path);
            }
            Ok(())
        }
        Command::ClearRecent { id } => {
            controller.clear_recent_items(id.as_deref().unwrap_or(""))?;
            Ok(())
        }
        Command::Config(ConfigCommand::Get) => {
            let settings = controller.get_config().settings;
            println!("{}", serde_json::to_string_pretty(&settings)?);
            Ok(())
        }
        Command::Config(ConfigCommand::Set { key, value }) => {
            let patch = settings_patch(&key, &value)?;
            let settings = controller.update_config(&patch)?;
            println!("{}", serde_json::to_string_pretty(&settings)?);
            Ok(())
        }
        Command::CheckUpdate => {
            let info = controller.check_for_update()?;
            if info.available {
                println!("Update available: {} -> {}", info.current_version, info.latest_version);
                println!("{}", info.release_url);
            } else {
                println!("QuickLaunch {} is up to date", info.current_version);
            }
            Ok(())
        }
        Command::Update { no_restart } => {
            let installed = controller.download_and_apply_update()?;
            println!("Installed version {installed}");
            if !no_restart {
                controller.restart_app()?;
            }
            Ok(())
        }
        Command::Autostart { action } => {
            match action {
                AutostartAction::On => controller.set_auto_start(true)?,
                AutostartAction::Off => controller.set_auto_start(false)?,
                AutostartAction::Status => {}
            }
            let state = if controller.get_auto_start_enabled()? { "on" } else { "off" };
            println!("Auto-start: {state}");
            Ok(())
        }
        Command::Version => {
            let info = controller.get_version_info();
            println!("QuickLaunch {} ({}, built {})", info.version, info.commit, info.build_time);
            Ok(())
        }
    }
}

/// Runs the startup update check and logs events until it has finished
fn run_host(controller: &AppController) -> Result<()> {
    let events = controller.subscribe();
    let Some(check) = controller.spawn_startup_update_check(STARTUP_CHECK_DELAY) else {
        info!("Nothing to do in the background");
        return Ok(());
    };

    while !check.is_finished() {
        if let Ok(event) = events.recv_timeout(Duration::from_millis(200)) {
            info!("Event: {}", event.name());
            println!("{}", event.name());
        }
    }
    while let Ok(event) = events.try_recv() {
        println!("{}", event.name());
    }

    if check.join().is_err() {
        bail!("startup update check panicked");
    }
    Ok(())
}

fn settings_patch(key: &str, value: &str) -> Result<SettingsPatch> {
    let mut patch = SettingsPatch::default();
    match key {
        "theme" => patch.theme = Some(value.parse::<Theme>().map_err(anyhow::Error::msg)?),
        "hotkey" => patch.hotkey = Some(value.to_string()),
        "position" => {
            patch.position = Some(value.parse::<PanelPosition>().map_err(anyhow::Error::msg)?);
        }
        "animation" => patch.animation = Some(parse_flag(value)?),
        "blur" => patch.blur = Some(parse_flag(value)?),
        "recentFoldersLimit" => {
            patch.recent_folders_limit = Some(value.parse().context("recentFoldersLimit must be a number")?);
        }
        "checkForUpdatesOnStartup" => patch.check_for_updates_on_startup = Some(parse_flag(value)?),
        "startWithWindows" => bail!("use `quicklaunch autostart on|off` to change {key}"),
        other => bail!("unknown setting: {other}"),
    }
    Ok(patch)
}

fn parse_flag(value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Ok(true),
        "false" | "off" | "no" | "0" => Ok(false),
        other => bail!("expected true or false, got {other}"),
    }
}

fn display_name(path: &str) -> String {
    path.trim_end_matches(['/', '\\'])
        .rsplit(['/', '\\'])
        .next()
        .filter(|name| !name.is_empty())
        .unwrap_or(path)
        .to_string()
}

fn print_tile(tile: &Tile) {
    let state = if tile.enabled { "" } else { "  (disabled)" };
    println!(
        "{:>3}  {}  {:<20} {:<10} {}{}",
        tile.order,
        tile.id,
        tile.name,
        tile.action.as_str(),
        tile.target,
        state
    );
}
