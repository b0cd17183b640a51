use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use clipkeep_core::crypto::load_or_create_key_file;
use clipkeep_core::platform::{
    ensure_config_dir, get_archive_db_path, get_history_db_path, get_key_file_path,
    get_settings_key_path, get_settings_path,
};
use clipkeep_core::sync::DirectoryRemote;
use clipkeep_core::{
    ensure_data_dir, reencrypt_all, ArchiveStore, CapturePipeline, DerivationMode, HistoryEntry,
    HistorySearch, HistoryStore, KeyMaterial, PatternRule, RetentionEngine, RetentionMode,
    RetentionPolicy, Settings, SyncEngine, TokenKey,
};
use rpassword::prompt_password;
use std::io::Read;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const PREVIEW_CHARS: usize = 60;

/// Clipkeep - encrypted clipboard history
#[derive(Parser)]
#[command(name = "clipkeep")]
#[command(about = "Encrypted clipboard history vault", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture text into history (reads stdin when no text is given)
    Add {
        text: Option<String>,
    },

    /// List history, pinned entries first
    List {
        /// Only favorites
        #[arg(long)]
        favorites: bool,

        /// Maximum number of entries
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Search history: free text plus optional `date:YYYY-MM-DD` and `type:code|text`
    Search {
        query: Vec<String>,
    },

    /// Print the full text of an entry
    Show {
        id: i64,
    },

    /// Toggle the pinned flag
    Pin {
        id: i64,
    },

    /// Toggle the favorite flag
    Favorite {
        id: i64,
    },

    /// Delete an entry
    Delete {
        id: i64,
    },

    /// Run one retention pass
    Retention {
        /// Override the configured mode (keep, auto-delete, archive)
        #[arg(long)]
        mode: Option<String>,

        /// Override the configured threshold in days
        #[arg(long)]
        days: Option<u32>,
    },

    /// List archived entries
    Archive,

    /// Run one sync cycle against the configured sync directory
    Sync,

    /// Delete the remote snapshot
    PurgeRemote,

    /// Set a new personal password and re-encrypt history
    Passwd {
        /// Key derivation cost: normal or hard
        #[arg(long, default_value = "normal")]
        mode: String,
    },
}

/// Settings, keys and the history store for one invocation
struct App {
    settings: Settings,
    settings_key: TokenKey,
    keys: Arc<KeyMaterial>,
    history: HistoryStore,
}

impl App {
    fn open() -> Result<Self> {
        ensure_data_dir().context("creating data directory")?;
        ensure_config_dir().context("creating config directory")?;

        let settings_key = load_or_create_key_file(&get_settings_key_path())?;
        let mut settings = Settings::load(&get_settings_path(), Some(&settings_key))?;
        if settings.ensure_encryption_salt() {
            settings.save(&get_settings_path(), Some(&settings_key))?;
        }

        let keys = Arc::new(KeyMaterial::from_settings(&settings, &get_key_file_path())?);
        let history = HistoryStore::open(get_history_db_path())?;
        Ok(Self {
            settings,
            settings_key,
            keys,
            history,
        })
    }

    fn save_settings(&self) -> Result<()> {
        self.settings.save(&get_settings_path(), Some(&self.settings_key))?;
        Ok(())
    }

    fn sync_engine(&self) -> Result<SyncEngine> {
        let Some(dir) = self.settings.sync_dir.as_ref() else {
            bail!("No sync_dir configured in {}", get_settings_path().display());
        };
        Ok(SyncEngine::new(self.history.clone(), Arc::new(DirectoryRemote::new(dir))))
    }

    /// Decrypted text, or a marker for entries that no longer open
    fn reveal(&self, entry: &HistoryEntry) -> String {
        let text = self.keys.decrypt(&entry.ciphertext);
        if text.is_empty() {
            "<undecryptable>".to_string()
        } else {
            text
        }
    }
}

fn preview(text: &str) -> String {
    let line = text.lines().next().unwrap_or_default();
    let mut short: String = line.chars().take(PREVIEW_CHARS).collect();
    if short.len() < text.len() {
        short.push_str("...");
    }
    short
}

fn print_entry(entry: &HistoryEntry, text: &str) {
    let marks = format!(
        "{}{}{}",
        if entry.pinned { "P" } else { "-" },
        if entry.favorite { "F" } else { "-" },
        if entry.is_code { "C" } else { "-" },
    );
    println!("{:>6}  {}  {}  {}", entry.id, marks, entry.timestamp, preview(text));
}

fn print_entries(app: &App, entries: &[HistoryEntry]) {
    for entry in entries {
        print_entry(entry, &app.reveal(entry));
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();
    let mut app = App::open()?;

    match cli.command {
        Commands::Add { text } => {
            let text = match text {
                Some(text) => text,
                None => {
                    let mut buf = String::new();
                    std::io::stdin().read_to_string(&mut buf)?;
                    buf
                }
            };

            let mut pipeline = CapturePipeline::new(app.history.clone(), app.keys.clone());
            for rule in PatternRule::defaults() {
                pipeline = pipeline.with_matcher(Box::new(rule));
            }

            match pipeline.capture(&text)? {
                Some(outcome) => {
                    println!("Added entry {}", outcome.id);
                    if !outcome.matched_rules.is_empty() {
                        println!("Matched: {}", outcome.matched_rules.join(", "));
                    }
                }
                None => println!("Nothing to add"),
            }
        }
        Commands::List { favorites, limit } => {
            let mut entries = if favorites {
                app.history.list_favorites()?
            } else {
                app.history.list()?
            };
            if let Some(limit) = limit {
                entries.truncate(limit);
            }
            print_entries(&app, &entries);
        }
        Commands::Search { query } => {
            let search = HistorySearch::parse(&query.join(" "));
            for (entry, text) in app.history.search(&search, &app.keys)? {
                let text = if text.is_empty() { "<undecryptable>".to_string() } else { text };
                print_entry(&entry, &text);
            }
        }
        Commands::Show { id } => {
            let entry = app.history.get(id)?;
            println!("{}", app.reveal(&entry));
        }
        Commands::Pin { id } => {
            let pinned = app.history.toggle_pinned(id)?;
            println!("Entry {} {}", id, if pinned { "pinned" } else { "unpinned" });
        }
        Commands::Favorite { id } => {
            let favorite = app.history.toggle_favorite(id)?;
            println!(
                "Entry {} {}",
                id,
                if favorite { "marked favorite" } else { "no longer favorite" }
            );
        }
        Commands::Delete { id } => {
            app.history.delete_by_id(id)?;
            println!("Deleted entry {}", id);
        }
        Commands::Retention { mode, days } => {
            let mut policy = RetentionPolicy::from_settings(&app.settings);
            if let Some(mode) = mode {
                policy.mode = RetentionMode::parse(&mode);
            }
            if let Some(days) = days {
                policy.threshold_days = days;
            }

            let archive = ArchiveStore::open(get_archive_db_path())?;
            let engine = RetentionEngine::new(app.history.clone(), archive);
            let report = engine.run_pass(&policy)?;
            println!(
                "Retention ({}): {} deleted, {} archived",
                report.mode, report.deleted, report.archived
            );
        }
        Commands::Archive => {
            let archive = ArchiveStore::open(get_archive_db_path())?;
            print_entries(&app, &archive.list()?);
        }
        Commands::Sync => {
            let report = app.sync_engine()?.sync_cycle().await?;
            println!(
                "Synced: {} new, {} flag updates, {} skipped, {} uploaded",
                report.merge.inserted,
                report.merge.flags_updated,
                report.merge.skipped,
                report.uploaded_records
            );
        }
        Commands::PurgeRemote => {
            if app.sync_engine()?.purge_remote().await? {
                println!("Remote snapshot deleted");
            } else {
                println!("No remote snapshot to delete");
            }
        }
        Commands::Passwd { mode } => {
            let Some(mode) = DerivationMode::parse(&mode) else {
                bail!("Unknown mode '{}', expected normal or hard", mode);
            };

            let password = prompt_password("New personal password: ")?;
            let confirm = prompt_password("Confirm password: ")?;
            if password != confirm {
                bail!("Passwords do not match");
            }

            info!("Re-encrypting history with {} key derivation", mode);
            let report = reencrypt_all(&app.history, &app.keys, &password, mode)?;
            if !report.skipped.is_empty() {
                warn!("{} entries could not be decrypted and were left unchanged", report.skipped.len());
            }

            app.settings.encryption_enabled = true;
            app.settings.use_personal_key = true;
            app.settings.personal_key = password;
            app.settings.encryption_mode = report.mode;
            app.settings.set_encryption_salt(&report.salt);
            app.save_settings()?;

            println!(
                "Re-encrypted {} entries ({} left unchanged)",
                report.reencrypted.len(),
                report.skipped.len()
            );
        }
    }

    Ok(())
}
