//! `gauntlet` CLI: replay instruction-following dialogs against a responder
//! and score the persisted results.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use gauntlet_core::Vocabulary;
use gauntlet_runtime::{
    aggregate, prompts, read_jsonl, CompletionConfig, DialogReplay, DialogTurn, JudgeClient,
    MetricsOptions, OpenAiProvider, ReplayConfig, StopReason,
};

#[derive(Parser)]
#[command(
    name = "gauntlet",
    version,
    about = "Evaluate multi-turn instruction following and how long a responder survives it"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay dialog files against a responder, evaluating every reply.
    Run(RunArgs),

    /// Aggregate corpus metrics over persisted eval files.
    Score(ScoreArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Directory containing dialog_<id>.jsonl files
    #[arg(long, default_value = "./dialog")]
    dialogs_dir: PathBuf,

    /// Output directory; records land in <output-dir>/<model-short-name>/
    #[arg(long, default_value = "./evaluation")]
    output_dir: PathBuf,

    /// Topic vocabulary table (JSONL)
    #[arg(long, default_value = "./data/topic_keywords.jsonl")]
    vocabulary: PathBuf,

    /// First conversation ID (inclusive)
    #[arg(long, default_value_t = 0)]
    start_id: u32,

    /// Last conversation ID (inclusive)
    #[arg(long, default_value_t = 205)]
    end_id: u32,

    /// Consecutive-failure budget; 0 disables early stopping
    #[arg(long, default_value_t = 3)]
    patience: u32,

    /// Prepend the fixed multi-task system preamble to every conversation
    #[arg(long)]
    system_preamble: bool,

    /// Responder model name
    #[arg(long, default_value = "llama-4-maverick")]
    model: String,

    /// Judge model name for rated constraints
    #[arg(long, default_value = "gpt-4.1")]
    judge_model: String,

    /// OpenAI-compatible base URL (defaults to the OpenAI API)
    #[arg(long)]
    base_url: Option<String>,
}

#[derive(Args)]
struct ScoreArgs {
    /// Directory of eval_<id>.jsonl files
    #[arg(long)]
    input_dir: PathBuf,

    /// First conversation ID (inclusive)
    #[arg(long, default_value_t = 0)]
    start_id: u32,

    /// Last conversation ID (inclusive)
    #[arg(long, default_value_t = 205)]
    end_id: u32,

    /// Aggregate over a random subset of this many dialogs
    #[arg(long)]
    sample: Option<usize>,

    /// Seed for the subset draw
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match Cli::parse().command {
        Command::Run(args) => run(args).await,
        Command::Score(args) => score(args),
    }
}

async fn run(args: RunArgs) -> anyhow::Result<()> {
    let vocabulary = Arc::new(
        Vocabulary::load(&args.vocabulary)
            .with_context(|| format!("loading vocabulary from {}", args.vocabulary.display()))?,
    );

    let mut provider = OpenAiProvider::from_env().context("configuring responder provider")?;
    if let Some(base_url) = &args.base_url {
        provider = provider.with_base_url(base_url.as_str());
    }
    let provider = Arc::new(provider);

    let judge = JudgeClient::new(
        provider.clone(),
        CompletionConfig::for_model(args.judge_model.as_str()),
    );
    let config = ReplayConfig {
        patience: (args.patience > 0).then_some(args.patience),
        system_preamble: args
            .system_preamble
            .then(|| prompts::SYSTEM_PROMPT.to_string()),
        responder: CompletionConfig::for_model(args.model.as_str()),
    };
    let replay = DialogReplay::new(provider, judge, vocabulary, config);

    // Records are grouped under the model's short name, as in
    // <output-dir>/<model-short-name>/eval_<id>.jsonl.
    let model_short = args.model.rsplit('/').next().unwrap_or(&args.model);
    let out_dir = args.output_dir.join(model_short);

    let mut processed = 0u32;
    for id in args.start_id..=args.end_id {
        let dialog_path = args.dialogs_dir.join(format!("dialog_{id}.jsonl"));
        if !dialog_path.exists() {
            tracing::debug!(id, "no dialog file; skipping");
            continue;
        }
        let turns: Vec<DialogTurn> = read_jsonl(&dialog_path)
            .with_context(|| format!("reading {}", dialog_path.display()))?;
        let out_path = out_dir.join(format!("eval_{id}.jsonl"));

        let summary = replay
            .run_dialog(&turns, &out_path)
            .await
            .with_context(|| format!("replaying dialog {id}"))?;
        match &summary.stop {
            StopReason::Completed => {
                tracing::info!(id, turns = summary.turns_evaluated, "dialog completed")
            }
            StopReason::PatienceExhausted => {
                tracing::info!(id, turns = summary.turns_evaluated, "patience exhausted")
            }
            StopReason::ResponderFailed(e) => {
                tracing::error!(id, error = %e, "responder failed; dialog abandoned")
            }
        }
        processed += 1;
    }

    tracing::info!(processed, "run finished");
    Ok(())
}

fn score(args: ScoreArgs) -> anyhow::Result<()> {
    let options = MetricsOptions {
        start_id: args.start_id,
        end_id: args.end_id,
        sample: args.sample,
        seed: args.seed,
    };
    let report = aggregate(&args.input_dir, &options)
        .with_context(|| format!("aggregating {}", args.input_dir.display()))?;
    println!("{}", args.input_dir.display());
    print!("{report}");
    Ok(())
}
