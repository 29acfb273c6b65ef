use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tokio::io::AsyncBufReadExt;
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

use canopy::config::AppConfig;
use canopy::error::DeleteError;
use canopy::state::{Identity, Scope, TreeId};
use canopy::submission::{SubmissionForm, SubmissionOutcome};
use canopy::sync::{DeleteOutcome, WriteOutcome};
use canopy::views::{MapView, ViewRefresher, ViewSnapshot};
use canopy::App;

/// Image extensions picked up by `import`
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "bmp", "gif"];

#[derive(Parser)]
#[command(name = "canopy")]
#[command(version, about = "Verify tree photos and keep them in sync")]
struct Cli {
    /// Config file (overrides CANOPY_CONFIG and the default location)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Verify a photo and record the tree
    Submit {
        image: PathBuf,
        #[command(flatten)]
        details: TreeDetails,
    },
    /// Submit every photo in a folder
    Import {
        folder: PathBuf,
        #[command(flatten)]
        details: TreeDetails,
    },
    /// List trees
    List {
        #[arg(default_value = "all")]
        scope: Scope,
    },
    /// Delete one of your trees
    Delete { id: String },
    /// Dashboard statistics
    Stats,
    /// Map markers
    Map {
        #[arg(default_value = "all")]
        scope: Scope,
    },
    /// Your trees, most recent first
    Gallery,
    /// Top planters
    Leaderboard,
    /// Remember who is submitting
    Login {
        #[arg(long)]
        user_id: Option<String>,
        #[arg(long)]
        name: String,
        #[arg(long, env = "CANOPY_TOKEN")]
        token: Option<String>,
    },
    Logout,
    /// Keep the views up to date; press Enter to refresh
    Watch,
}

#[derive(clap::Args, Clone)]
struct TreeDetails {
    #[arg(long, default_value = "")]
    species: String,
    #[arg(long, default_value = "")]
    planter: String,
    /// Named location from the location catalog
    #[arg(long)]
    location: Option<String>,
    #[arg(long, default_value = "")]
    description: String,
    #[arg(long, requires = "lng", allow_hyphen_values = true)]
    lat: Option<f64>,
    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    lng: Option<f64>,
}

impl TreeDetails {
    fn form(&self, image_path: PathBuf) -> SubmissionForm {
        SubmissionForm {
            image_path,
            species: self.species.clone(),
            planter_name: self.planter.clone(),
            location: self.location.clone(),
            description: self.description.clone(),
            coordinates: self.lat.zip(self.lng),
        }
    }
}

/// Result of a folder import
#[derive(Debug, Default)]
struct ImportResult {
    stored: usize,
    deferred: usize,
    rejected: usize,
    failed: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let app = App::init(config).context("Failed to start. Check permissions and disk space.")?;

    match cli.command {
        Command::Submit { image, details } => submit(&app, details.form(image)).await?,
        Command::Import { folder, details } => {
            let result = import_folder(&app, &folder, &details).await;
            println!(
                "✅ Import complete: {} stored, {} pending sync, {} rejected, {} failed",
                result.stored, result.deferred, result.rejected, result.failed
            );
        }
        Command::List { scope } => {
            for tree in app.engine.read(scope).await {
                println!(
                    "{}  {}  {}  {}",
                    tree.id,
                    tree.species,
                    if tree.verified { "verified" } else { "pending" },
                    tree.planter().unwrap_or("-")
                );
            }
            println!("({:?})", app.engine.state(scope));
        }
        Command::Delete { id } => delete(&app, &TreeId::parse(&id)).await?,
        Command::Stats => {
            let stats = app.views.dashboard().await;
            println!("🌳 Trees:     {}", stats.total);
            println!("✅ Verified:  {}", stats.verified);
            println!("🌿 Species:   {}", stats.species);
            println!("🌍 CO2/year:  {:.0} kg", stats.co2_offset_kg);
        }
        Command::Map { scope } => print_map(&app.views.map(scope).await),
        Command::Gallery => {
            let cards = app.views.gallery().await;
            if cards.is_empty() {
                println!("No trees yet. Submit one with `canopy submit <photo>`.");
            }
            for card in cards {
                println!(
                    "{}  {}  {:.1}%  {}{}{}",
                    card.id,
                    card.species,
                    card.confidence_percent,
                    card.planted_at.format("%Y-%m-%d"),
                    if card.pending_sync { "  (not synced)" } else { "" },
                    if card.can_delete { "  [delete]" } else { "" }
                );
            }
        }
        Command::Leaderboard => {
            for entry in app.views.leaderboard().await {
                println!(
                    "{:>3} {} {}  {} trees, {} verified, {} species",
                    entry.rank,
                    entry.medal.unwrap_or("  "),
                    entry.planter,
                    entry.trees,
                    entry.verified,
                    entry.species
                );
            }
        }
        Command::Login { user_id, name, token } => {
            app.session.login(Identity {
                user_id,
                display_name: Some(name.clone()),
                token,
            })?;
            println!("👋 Logged in as {}", name);
        }
        Command::Logout => {
            app.session.logout()?;
            println!("Logged out");
        }
        Command::Watch => watch(&app).await?,
    }

    Ok(())
}

async fn submit(app: &App, form: SubmissionForm) -> Result<()> {
    let mut submission = app.submission();
    let outcome = submission
        .run(form)
        .await
        .context("Submission failed")?;

    match outcome {
        SubmissionOutcome::Rejected(result) => {
            println!("❌ {}. Try a clearer photo of the tree.", result.message);
        }
        SubmissionOutcome::Stored { classification, write } => {
            println!("✅ {}", classification.message);
            match write {
                WriteOutcome::Confirmed(tree) => println!("🌳 Tree {} recorded", tree.id),
                WriteOutcome::Deferred { record, cause } => println!(
                    "⚠️  Saved locally as {} but the server is unavailable ({}). It will not sync on its own.",
                    record.id, cause
                ),
            }
        }
    }
    Ok(())
}

async fn import_folder(app: &App, folder: &Path, details: &TreeDetails) -> ImportResult {
    println!("🔍 Scanning folder: {}", folder.display());
    let mut result = ImportResult::default();

    let images = WalkDir::new(folder)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
                .unwrap_or(false)
        });

    for entry in images {
        let path = entry.path().to_path_buf();
        let mut submission = app.submission();

        match submission.run(details.form(path.clone())).await {
            Ok(SubmissionOutcome::Stored { write: WriteOutcome::Confirmed(_), .. }) => {
                result.stored += 1
            }
            Ok(SubmissionOutcome::Stored { write: WriteOutcome::Deferred { .. }, .. }) => {
                result.deferred += 1
            }
            Ok(SubmissionOutcome::Rejected(classification)) => {
                println!("❌ {}: {}", path.display(), classification.message);
                result.rejected += 1;
            }
            Err(e) => {
                eprintln!("⚠️  Error importing {}: {}", path.display(), e);
                result.failed += 1;
            }
        }
    }

    result
}

async fn delete(app: &App, id: &TreeId) -> Result<()> {
    match app.engine.delete(id).await {
        Ok(DeleteOutcome::Deleted) => println!("🗑️  Tree {} deleted", id),
        Ok(DeleteOutcome::LocallyRemoved { cause: None }) => {
            println!("🗑️  Unsynced tree {} removed", id)
        }
        Ok(DeleteOutcome::LocallyRemoved { cause: Some(cause) }) => println!(
            "⚠️  Server unavailable ({}). Tree {} removed locally only and may reappear.",
            cause, id
        ),
        Err(DeleteError::Unauthorized) => println!("⛔ Only the uploader can delete tree {}", id),
        Err(e) => return Err(e).context("Delete failed"),
    }
    Ok(())
}

fn print_map(view: &MapView) {
    println!("📍 Centre: {:.6}, {:.6}", view.center.0, view.center.1);
    for marker in &view.markers {
        println!(
            "{:>11.6} {:>11.6}  {:?}  {}  {}",
            marker.latitude,
            marker.longitude,
            marker.status,
            marker.species,
            marker.planter.as_deref().unwrap_or("-")
        );
    }
}

fn print_snapshot(snapshot: &ViewSnapshot) {
    let stats = &snapshot.dashboard;
    println!(
        "🌳 {} trees, {} verified, {} species, {:.0} kg CO2/year, {} markers, {} in gallery",
        stats.total,
        stats.verified,
        stats.species,
        stats.co2_offset_kg,
        snapshot.map.markers.len(),
        snapshot.gallery.len()
    );
    if let Some(leader) = snapshot.leaderboard.first() {
        println!("   Top planter: {} ({} trees)", leader.planter, leader.trees);
    }
}

async fn watch(app: &App) -> Result<()> {
    print_snapshot(&app.views.snapshot().await);

    let watcher = app.watch_storage();
    let refresher = ViewRefresher::spawn(app.views.clone(), |snapshot| print_snapshot(&snapshot));
    println!("👀 Watching for changes. Press Enter to refresh, Ctrl-C to stop.");

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => match line? {
                Some(_) => app.engine.events().focus_regained(),
                None => {
                    tokio::signal::ctrl_c().await?;
                    break;
                }
            },
        }
    }

    watcher.abort();
    refresher.abort();
    Ok(())
}
