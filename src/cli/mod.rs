// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Parses arguments with clap, opens the directory store and
// routes each subcommand to a Layer 2 use case. Nothing here
// computes; it only wires and prints.

pub mod commands;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use commands::{ChatArgs, Commands, GenerateArgs, MetricsArgs, TrainArgs};

use crate::application::files_use_case::FilesUseCase;
use crate::application::generate_use_case::GenerateUseCase;
use crate::application::session::TrainingSession;
use crate::application::train_use_case::{TrainConfig, TrainUseCase};
use crate::domain::model_record::ModelStatus;
use crate::domain::traits::{MetricSink, ModelStore};
use crate::infra::directory_store::DirectoryStore;

/// How often `train` polls the status snapshot.
const STATUS_POLL: Duration = Duration::from_millis(500);

#[derive(Parser, Debug)]
#[command(
    name = "charnn",
    version = "0.1.0",
    about = "Train a character-level LSTM + attention model on text files, then sample from it."
)]
pub struct Cli {
    /// Directory holding files, models and metrics (overrides the config file)
    #[arg(long, global = true)]
    pub store_dir: Option<PathBuf>,

    /// JSON file with training and generation settings
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

impl TryFrom<&Cli> for TrainConfig {
    type Error = anyhow::Error;

    fn try_from(cli: &Cli) -> Result<Self> {
        let mut config = match &cli.config {
            Some(path) => TrainConfig::load(path)?,
            None       => TrainConfig::default(),
        };
        if let Some(dir) = &cli.store_dir {
            config.store_dir = dir.display().to_string();
        }
        Ok(config)
    }
}

impl Cli {
    pub fn run(self) -> Result<()> {
        let mut config = TrainConfig::try_from(&self)?;
        let store = Arc::new(DirectoryStore::open(&config.store_dir)?);
        let session = TrainingSession::new();

        match &self.command {
            Commands::AddFile(args) => {
                let files = FilesUseCase::new(session, store);
                let id = files.add_path(&args.path)?;
                println!("Stored '{}' as file {}", args.path.display(), id);
            }
            Commands::Files => {
                let files = FilesUseCase::new(session, store);
                for f in files.list()? {
                    println!("{:>5}  {:<32} {}", f.id, f.filename, f.uploaded_at);
                }
            }
            Commands::RemoveFile(args) => {
                let files = FilesUseCase::new(session, store);
                if files.remove(args.id)? {
                    println!("Removed file {}", args.id);
                } else {
                    println!("No file with id {}", args.id);
                }
            }
            Commands::Train(args) => {
                args.apply(&mut config);
                run_train(config, session, store, args)?;
            }
            Commands::Generate(args) => run_generate(config, session, store, args)?,
            Commands::Chat(args)     => run_chat(config, session, store, args)?,
            Commands::Status         => run_status(store.as_ref())?,
            Commands::Metrics(args)  => run_metrics(store.as_ref(), args)?,
        }
        Ok(())
    }
}

/// Start training in the background and print each completed epoch.
fn run_train(
    config:  TrainConfig,
    session: TrainingSession,
    store:   Arc<DirectoryStore>,
    args:    &TrainArgs,
) -> Result<()> {
    let use_case = TrainUseCase::new(
        config,
        session.clone(),
        store.clone(),
        store.clone(),
        store,
    );
    let handle = use_case.start(args.into())?;
    tracing::info!("Training model {}", handle.model_id);

    let mut last_epoch = 0;
    while !handle.is_finished() {
        std::thread::sleep(STATUS_POLL);
        let status = session.status();
        if status.current_epoch != last_epoch {
            last_epoch = status.current_epoch;
            println!(
                "epoch {}/{}  loss {:.4}",
                status.current_epoch, status.total_epochs, status.loss
            );
        }
    }

    let model_id = handle.model_id;
    let record = handle
        .wait()
        .with_context(|| format!("training of model {model_id} failed"))?;
    println!(
        "Model {} ready after {} epochs (loss {:.4}, accuracy {:.4})",
        record.id,
        record.current_epoch,
        record.last_loss.unwrap_or(f64::NAN),
        record.accuracy.unwrap_or(f64::NAN),
    );
    Ok(())
}

fn run_generate(
    config:  TrainConfig,
    session: TrainingSession,
    store:   Arc<DirectoryStore>,
    args:    &GenerateArgs,
) -> Result<()> {
    let use_case = GenerateUseCase::new(config, session, store.clone());
    use_case.restore_latest(store.as_ref())?;
    let text = use_case.generate(&args.seed, args.length, args.temperature)?;
    println!("{}{}", args.seed, text);
    Ok(())
}

fn run_chat(
    config:  TrainConfig,
    session: TrainingSession,
    store:   Arc<DirectoryStore>,
    args:    &ChatArgs,
) -> Result<()> {
    let use_case = GenerateUseCase::new(config, session, store.clone());
    use_case.restore_latest(store.as_ref())?;
    println!("{}", use_case.reply(&args.message, args.temperature)?);
    Ok(())
}

fn run_status(models: &dyn ModelStore) -> Result<()> {
    let models = models.list_models()?;
    if models.is_empty() {
        println!("No models yet");
    }
    for m in models {
        let loss = m.last_loss.map(|l| format!("{l:.4}")).unwrap_or_else(|| "-".into());
        let acc = m.accuracy.map(|a| format!("{a:.4}")).unwrap_or_else(|| "-".into());
        println!(
            "{:>5}  {:<20} {:<8} epoch {}/{}  loss {}  acc {}",
            m.id, m.name, m.status.to_string(), m.current_epoch, m.total_epochs, loss, acc
        );
        if m.status == ModelStatus::Failed {
            if let Some(reason) = &m.failure_reason {
                println!("       reason: {reason}");
            }
        }
    }
    Ok(())
}

fn run_metrics(store: &DirectoryStore, args: &MetricsArgs) -> Result<()> {
    let model_id = match args.model_id {
        Some(id) => id,
        None => match store.list_models()?.first() {
            Some(m) => m.id,
            None    => {
                println!("No models yet");
                return Ok(());
            }
        },
    };
    println!("epoch,loss,accuracy,timestamp");
    for m in store.metrics_for(model_id)? {
        println!("{},{:.6},{:.6},{}", m.epoch, m.loss, m.accuracy, m.timestamp);
    }
    Ok(())
}
