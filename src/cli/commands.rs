// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// One subcommand per operation of the engine:
//
//   add-file / files / remove-file — corpus management
//   train                          — train a model on stored files
//   generate / chat                — sample from the newest model
//   status / metrics               — inspect stored models

use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::application::train_use_case::{TrainConfig, TrainRequest};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Store a UTF-8 text file for training
    AddFile(AddFileArgs),

    /// List stored files, newest first
    Files,

    /// Delete a stored file
    RemoveFile(RemoveFileArgs),

    /// Train a new model on stored files
    Train(TrainArgs),

    /// Continue a seed text with the newest ready model
    Generate(GenerateArgs),

    /// Send one chat message and print the model's reply
    Chat(ChatArgs),

    /// Show every stored model and its progress
    Status,

    /// Print the per-epoch metrics of a model
    Metrics(MetricsArgs),
}

#[derive(Args, Debug)]
pub struct AddFileArgs {
    /// Path of the text file to store
    pub path: PathBuf,
}

#[derive(Args, Debug)]
pub struct RemoveFileArgs {
    /// Id shown by `files`
    pub id: u64,
}

/// All arguments for the `train` command.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// File to train on; repeat to concatenate several files in order
    #[arg(long = "file-id", required = true)]
    pub file_ids: Vec<u64>,

    /// Epoch count; 0 or absent picks it from the corpus length
    #[arg(long)]
    pub epochs: Option<usize>,

    /// Display name of the model
    #[arg(long)]
    pub name: Option<String>,

    /// Samples per optimiser step; absent picks it from the corpus length
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Adam learning rate
    #[arg(long)]
    pub lr: Option<f64>,

    /// Seed for initialisation and shuffling
    #[arg(long)]
    pub seed: Option<u64>,
}

impl TrainArgs {
    /// Overlay the flags that were given onto `config`.
    pub fn apply(&self, config: &mut TrainConfig) {
        if let Some(batch_size) = self.batch_size {
            config.batch_size = Some(batch_size);
        }
        if let Some(lr) = self.lr {
            config.learning_rate = lr;
        }
        if let Some(seed) = self.seed {
            config.seed = Some(seed);
        }
    }
}

/// The application layer never sees clap types.
impl From<&TrainArgs> for TrainRequest {
    fn from(a: &TrainArgs) -> Self {
        TrainRequest {
            name:     a.name.clone(),
            file_ids: a.file_ids.clone(),
            epochs:   a.epochs,
        }
    }
}

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Text the generated characters continue
    #[arg(long, default_value = "")]
    pub seed: String,

    /// Number of characters to generate
    #[arg(long, default_value_t = 150)]
    pub length: usize,

    /// Sampling temperature; lower is more conservative
    #[arg(long, default_value_t = 0.7)]
    pub temperature: f32,
}

#[derive(Args, Debug)]
pub struct ChatArgs {
    /// The message to reply to
    pub message: String,

    /// Sampling temperature (default from the config, 0.7)
    #[arg(long)]
    pub temperature: Option<f32>,
}

#[derive(Args, Debug)]
pub struct MetricsArgs {
    /// Model id; defaults to the newest model
    #[arg(long)]
    pub model_id: Option<u64>,
}
