//! Developer CLI: run the judge pipeline locally against a problem
//! definition and a candidate source file, printing the `JudgeResult` as
//! JSON. Not part of the core contract (spec §6 scopes the HTTP/RPC API
//! surface out entirely) — this mirrors the teacher's worker `main.rs` in
//! spirit (init tracing, load config, run one pipeline) but loops zero or
//! one time over a locally-supplied job instead of polling Redis.

use std::path::PathBuf;

use clap::Parser;
use judge_core::sandbox::local::LocalSandbox;
use judge_core::{Filter, Judge, Problem};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "judge-cli", about = "Judge a candidate solution against a problem definition")]
struct Args {
    /// Path to a JSON-encoded `Problem`.
    #[arg(long)]
    problem: PathBuf,

    /// Path to the candidate's source file.
    #[arg(long)]
    candidate: PathBuf,

    /// Language the candidate is written in (must match a key in the
    /// problem's harness map, e.g. "python" or "cpp").
    #[arg(long)]
    language: String,

    /// Which tests to run.
    #[arg(long, value_enum, default_value = "all")]
    filter: FilterArg,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FilterArg {
    All,
    Visible,
}

impl From<FilterArg> for Filter {
    fn from(value: FilterArg) -> Self {
        match value {
            FilterArg::All => Filter::All,
            FilterArg::Visible => Filter::Visible,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let problem_json = std::fs::read_to_string(&args.problem)?;
    let problem: Problem = serde_json::from_str(&problem_json)?;
    let candidate_code = std::fs::read_to_string(&args.candidate)?;

    info!(problem_id = %problem.problem_id, language = %args.language, "judging submission");

    let sandbox = LocalSandbox::new();
    let judge = Judge::new(&sandbox);
    let result = judge
        .judge(&problem, &candidate_code, &args.language, args.filter.into())
        .await;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
