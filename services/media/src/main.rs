use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use common::diary::{DeleteOutcome, DiaryScope, DiaryStore, LocalDiaryStore, MemoryDiaryStore, SortOrder};
use common::mood::IntensityLevel;
use common::presentation::{Notice, NoticeKind, chart_series};
use media::{MediaSample, MoodPipeline, MoodRequest, PipelineConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Detect your pet's mood from a photo or video and keep a diary of it
#[derive(Parser, Debug)]
#[command(name = "media", version)]
struct Cli {
    /// Pipeline configuration file
    #[arg(long, env = "PAWMOOD_CONFIG")]
    config: Option<PathBuf>,

    /// Diary file, overrides `diary_path` from the configuration
    #[arg(long)]
    diary: Option<PathBuf>,

    /// Keep the diary in memory for this run only
    #[arg(long)]
    ephemeral: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify an image or video and record the mood
    Detect {
        file: PathBuf,

        /// How strong the mood looks, 1 to 10
        #[arg(long)]
        intensity: Option<i64>,

        /// MIME type of the file, guessed from its name when omitted
        #[arg(long)]
        mime: Option<String>,
    },

    /// Inspect or edit the diary
    Diary {
        #[command(subcommand)]
        action: DiaryAction,
    },
}

#[derive(Subcommand, Debug)]
enum DiaryAction {
    /// Entries newest first
    List {
        #[arg(long, value_enum, default_value_t = Order::Desc)]
        order: Order,
    },
    /// Mood over time, oldest first
    Chart,
    /// Remove one entry
    Delete { id: Uuid },
    /// Remove every entry
    Clear,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Order {
    Asc,
    Desc,
}

impl From<Order> for SortOrder {
    fn from(order: Order) -> Self {
        match order {
            Order::Asc => SortOrder::Asc,
            Order::Desc => SortOrder::Desc,
        }
    }
}

fn print_notice(notice: &Notice) {
    match notice.kind {
        NoticeKind::Message => println!("{}", notice.text),
        NoticeKind::Error => eprintln!("error: {}", notice.text),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr, stdout carries the command output
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = PipelineConfig::load(cli.config.as_deref()).context("invalid configuration")?;

    let store: Arc<dyn DiaryStore> = if cli.ephemeral {
        Arc::new(MemoryDiaryStore::new())
    } else {
        let path = cli.diary.clone().unwrap_or_else(|| config.diary_path.clone());
        info!("Using diary file {}", path.display());
        Arc::new(LocalDiaryStore::new(path))
    };
    let scope = DiaryScope::Anonymous;

    match cli.command {
        Command::Detect {
            file,
            intensity,
            mime,
        } => {
            let intensity = intensity.map(IntensityLevel::try_from).transpose()?;
            let bytes = tokio::fs::read(&file)
                .await
                .with_context(|| format!("failed to read {}", file.display()))?;
            let file_name = file
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();

            let mut sample = MediaSample::from_file(bytes, file_name);
            if let Some(mime) = mime {
                sample.mime = mime;
            }

            let pipeline = MoodPipeline::from_config(&config, store.clone());
            let request = MoodRequest::new(scope, sample).with_intensity(intensity);

            match pipeline.run(request).await {
                Ok(reading) => {
                    let mood = &reading.entry.mood;
                    println!("Mood: {}", mood);
                    if let Some(intensity) = reading.entry.intensity {
                        println!("Intensity: {}", intensity);
                    }
                    println!("Tip: {}", config.tips.pick_random(mood));
                    print_notice(
                        &Notice::message(format!("Recorded entry {}", reading.entry.id))
                            .dismiss_after(config.notice_dismiss_ms),
                    );
                }
                Err(e) => {
                    error!("Mood detection failed: {}", e);
                    print_notice(
                        &Notice::error(e.to_string()).dismiss_after(config.notice_dismiss_ms),
                    );
                    std::process::exit(1);
                }
            }
        }
        Command::Diary { action } => match action {
            DiaryAction::List { order } => {
                for entry in store.list(scope, order.into()).await? {
                    match entry.intensity {
                        Some(intensity) => println!(
                            "{}  {}  {} ({}/10)",
                            entry.id,
                            entry.timestamp.to_rfc3339(),
                            entry.mood,
                            intensity
                        ),
                        None => println!(
                            "{}  {}  {}",
                            entry.id,
                            entry.timestamp.to_rfc3339(),
                            entry.mood
                        ),
                    }
                }
            }
            DiaryAction::Chart => {
                let entries = store.list(scope, SortOrder::Asc).await?;
                println!("{}", serde_json::to_string_pretty(&chart_series(&entries))?);
            }
            DiaryAction::Delete { id } => match store.delete(scope, id).await? {
                DeleteOutcome::Deleted => print_notice(&Notice::message(format!("Deleted {}", id))),
                DeleteOutcome::NotFound => {
                    print_notice(&Notice::error(format!("No diary entry {}", id)));
                    std::process::exit(1);
                }
            },
            DiaryAction::Clear => {
                let removed = store.clear(scope).await?;
                print_notice(&Notice::message(format!("Removed {} entries", removed)));
            }
        },
    }

    Ok(())
}
