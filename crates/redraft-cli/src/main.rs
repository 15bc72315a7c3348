//! redraft - reward-guided revision of chapter drafts
//!
//! ## Commands
//!
//! - `run`: rewrite, score and keep improvements for N iterations
//! - `evaluate` / `evaluations`: score a single text, list past scores
//! - `approve`: store a reviewed draft as a new version
//! - `seed`: put the first draft into an empty corpus
//! - `versions` / `show`: inspect the corpus
//! - `leaderboard` / `diff` / `progression`: compare versions
//! - `stats` / `reset`: maintenance

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, Level};

use redraft_core::{
    EvaluationEntry, EvaluationLog, Leaderboard, LeaderboardEntry, ProgressionEntry,
    ProgressionLog, RevisionError, RewardEvaluator, SearchLoop, SearchReport, Settings,
    VersionMetadata, VersionOrigin, VersionStore,
};
use redraft_state::SurrealVersionStore;

#[derive(Parser)]
#[command(name = "redraft")]
#[command(author = "Redraft Maintainers")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Reward-guided iterative revision of chapter drafts", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON log lines and JSON command output
    #[arg(long, global = true)]
    json: bool,

    /// Config file (default: ./redraft.toml when present)
    #[arg(short, long, global = true, env = "REDRAFT_CONFIG")]
    config: Option<PathBuf>,

    /// Corpus location: mem://, a directory, or a SurrealDB URL
    #[arg(long, global = true)]
    store: Option<String>,

    /// Weight of the similarity component
    #[arg(long, global = true)]
    w_sim: Option<f64>,

    /// Weight of the readability component
    #[arg(long, global = true)]
    w_read: Option<f64>,

    /// Penalty per grammar error
    #[arg(long, global = true)]
    w_err: Option<f64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the revision search
    Run {
        /// Number of iterations
        #[arg(short = 'n', long)]
        iterations: Option<usize>,

        /// Stop after this many iterations without improvement
        #[arg(long)]
        patience: Option<usize>,

        /// Draft seeded when the corpus is empty
        #[arg(long)]
        draft: Option<PathBuf>,

        /// Reference text for the similarity component
        #[arg(long)]
        reference: Option<PathBuf>,

        /// Seconds to wait for one rewrite
        #[arg(long)]
        oracle_timeout: Option<u64>,

        /// Model used for rewriting
        #[arg(long)]
        model: Option<String>,
    },

    /// Score a text without adding it to the corpus
    Evaluate {
        /// Text file to score
        #[arg(short, long)]
        text: PathBuf,

        /// Reference text for the similarity component
        #[arg(long)]
        reference: Option<PathBuf>,
    },

    /// Show the most recent entries of the evaluation log
    Evaluations {
        /// Maximum number of entries to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Store a reviewed draft as a new version
    Approve {
        /// Text file to approve
        #[arg(short, long)]
        text: PathBuf,

        /// Reference text for the similarity component
        #[arg(long)]
        reference: Option<PathBuf>,

        /// Reviewer note kept with the version
        #[arg(long)]
        note: Option<String>,
    },

    /// Seed an empty corpus with its first draft
    Seed {
        /// Draft file (default: configured initial draft)
        #[arg(long)]
        draft: Option<PathBuf>,
    },

    /// List stored versions
    Versions,

    /// Print one version
    Show {
        /// Version number
        version: u64,
    },

    /// Rank versions by score
    Leaderboard {
        /// Maximum number of entries to show
        #[arg(short, long, default_value = "10")]
        limit: usize,

        /// Score versions that have no stored reward
        #[arg(long)]
        rescore: bool,
    },

    /// Unified diff between two versions
    Diff {
        /// Version to diff from
        a: u64,
        /// Version to diff to
        b: u64,
    },

    /// Score of each version in order
    Progression {
        /// Read the progression log file instead of the corpus
        #[arg(long)]
        log: bool,
    },

    /// Corpus summary
    Stats,

    /// Discard every stored version
    Reset {
        /// Confirm the reset
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    redraft_core::telemetry::init_tracing(cli.json, level);

    let mut settings =
        Settings::load(cli.config.as_deref()).context("Failed to load redraft configuration")?;
    apply_global_overrides(&mut settings, &cli);
    settings.validate()?;

    execute(cli.command, settings, cli.json).await
}

/// Open the corpus. Only commands that read or write versions call this.
async fn open_store(settings: &Settings) -> Result<Arc<dyn VersionStore>> {
    let target = settings.store_target();
    let store = SurrealVersionStore::connect(&target)
        .await
        .with_context(|| format!("Failed to open corpus at {target}"))?;
    Ok(Arc::new(store))
}

async fn execute(command: Commands, mut settings: Settings, json: bool) -> Result<()> {
    match command {
        Commands::Run {
            iterations,
            patience,
            draft,
            reference,
            oracle_timeout,
            model,
        } => {
            if let Some(n) = iterations {
                settings.search.iterations = n;
            }
            if patience.is_some() {
                settings.search.patience = patience;
            }
            if draft.is_some() {
                settings.search.initial_draft_file = draft;
            }
            if reference.is_some() {
                settings.search.reference_file = reference;
            }
            if let Some(secs) = oracle_timeout {
                settings.search.oracle_timeout_secs = secs;
            }
            if let Some(model) = model {
                settings.oracle.model = model;
            }
            settings.validate()?;

            let config = settings.search_config().await?;
            let oracle = Arc::new(settings.oracle()?);
            let evaluator = settings.evaluator()?;
            let store = open_store(&settings).await?;
            let search = SearchLoop::new(store, oracle, evaluator, config)
                .with_progression_log(settings.progression_log())
                .with_evaluation_log(settings.evaluation_log());
            let report = cmd_run(search).await?;
            print_report(&report, json)
        }
        Commands::Evaluate { text, reference } => {
            let evaluator = settings.evaluator()?;
            cmd_evaluate(
                &evaluator,
                &settings.evaluation_log(),
                &text,
                reference.as_deref(),
                json,
            )
            .await
        }
        Commands::Evaluations { limit } => {
            cmd_evaluations(&settings.evaluation_log(), limit, json).await
        }
        Commands::Approve {
            text,
            reference,
            note,
        } => {
            let evaluator = settings.evaluator()?;
            let store = open_store(&settings).await?;
            let version = cmd_approve(
                store.as_ref(),
                &evaluator,
                &settings.progression_log(),
                &text,
                reference.as_deref(),
                note.as_deref(),
            )
            .await?;
            println!("Approved as version {version}");
            Ok(())
        }
        Commands::Seed { draft } => {
            let evaluator = settings.evaluator()?;
            let content = match draft {
                Some(path) => read_text(&path).await?,
                None => settings.search_config().await?.initial_draft,
            };
            let reference = settings.reference_text().await?;
            let store = open_store(&settings).await?;
            let version =
                cmd_seed(store.as_ref(), &evaluator, &content, reference.as_deref()).await?;
            println!("Seeded version {version}");
            Ok(())
        }
        Commands::Versions => cmd_versions(open_store(&settings).await?.as_ref(), json).await,
        Commands::Show { version } => {
            cmd_show(open_store(&settings).await?.as_ref(), version, json).await
        }
        Commands::Leaderboard { limit, rescore } => {
            let mut board = Leaderboard::new(open_store(&settings).await?);
            if rescore {
                board = board.with_evaluator(settings.evaluator()?, settings.reference_text().await?);
            }
            let entries = cmd_leaderboard(&board, limit).await?;
            print_leaderboard(&entries, json)
        }
        Commands::Diff { a, b } => {
            let board = Leaderboard::new(open_store(&settings).await?);
            let diff = cmd_diff(&board, a, b).await?;
            if diff.is_empty() {
                println!("Versions {a} and {b} have identical content");
            } else {
                println!("{diff}");
            }
            Ok(())
        }
        Commands::Progression { log: true } => {
            cmd_progression_log(&settings.progression_log(), json).await
        }
        Commands::Progression { log: false } => {
            cmd_progression(&Leaderboard::new(open_store(&settings).await?), json).await
        }
        Commands::Stats => cmd_stats(open_store(&settings).await?, json).await,
        Commands::Reset { yes } => {
            if !yes {
                bail!("Refusing to discard the corpus without --yes");
            }
            cmd_reset(open_store(&settings).await?.as_ref(), yes).await
        }
    }
}

fn apply_global_overrides(settings: &mut Settings, cli: &Cli) {
    if let Some(store) = &cli.store {
        settings.storage.url = Some(store.clone());
    }
    if let Some(w) = cli.w_sim {
        settings.reward.similarity = w;
    }
    if let Some(w) = cli.w_read {
        settings.reward.readability = w;
    }
    if let Some(w) = cli.w_err {
        settings.reward.errors = w;
    }
}

async fn read_text(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))
}

async fn read_optional(path: Option<&Path>) -> Result<Option<String>> {
    match path {
        Some(path) => Ok(Some(read_text(path).await?)),
        None => Ok(None),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn preview(content: &str) -> String {
    let first = content.lines().next().unwrap_or_default();
    if first.chars().count() > 60 {
        format!("{}...", first.chars().take(57).collect::<String>())
    } else {
        first.to_string()
    }
}

/// Run the search loop; Ctrl-C stops it after the current iteration.
async fn cmd_run(search: SearchLoop) -> Result<SearchReport> {
    let stop = search.stop_signal();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, stopping after the current iteration");
            stop.stop();
        }
    });

    let report = search.run().await;
    watcher.abort();
    report.context("Revision search failed")
}

fn print_report(report: &SearchReport, json: bool) -> Result<()> {
    if json {
        return print_json(report);
    }
    println!("Run {}", report.run_id);
    if report.seeded {
        println!("  seeded version {}", report.initial_version);
    }
    println!(
        "  start: version {} score {}",
        report.initial_version, report.initial_score
    );
    println!(
        "  iterations: {} accepted, {} rejected, {} failed ({})",
        report.accepted(),
        report.rejected(),
        report.failed(),
        report.stop_reason.as_str()
    );
    println!(
        "  best: version {} score {}",
        report.best.version,
        report.best.score()
    );
    Ok(())
}

#[derive(Serialize)]
struct EvaluateOutput {
    similarity: f64,
    readability: f64,
    errors: u32,
    score: f64,
    degraded: Vec<&'static str>,
}

/// Score a text and record it in the evaluation log.
async fn cmd_evaluate(
    evaluator: &RewardEvaluator,
    log: &EvaluationLog,
    text: &Path,
    reference: Option<&Path>,
    json: bool,
) -> Result<()> {
    let content = read_text(text).await?;
    let reference = read_optional(reference).await?;
    let evaluation = evaluator
        .evaluate(&content, reference.as_deref())
        .await
        .with_context(|| format!("Failed to evaluate {}", text.display()))?;
    log.append(&EvaluationEntry::evaluated(
        &content,
        reference.as_deref(),
        &evaluation,
    ))
    .await
    .context("Failed to write evaluation log")?;

    let output = EvaluateOutput {
        similarity: evaluation.record.similarity,
        readability: evaluation.record.readability,
        errors: evaluation.record.errors,
        score: evaluation.record.score,
        degraded: evaluation.degraded.names(),
    };
    if json {
        return print_json(&output);
    }
    println!("Score:       {}", output.score);
    println!("Similarity:  {}", output.similarity);
    println!("Readability: {}", output.readability);
    println!("Errors:      {}", output.errors);
    if !output.degraded.is_empty() {
        println!("Degraded:    {}", output.degraded.join(", "));
    }
    Ok(())
}

#[derive(Serialize)]
struct EvaluationSummary {
    timestamp: String,
    source: redraft_core::EvaluationSource,
    decision: Option<redraft_core::Decision>,
    version: Option<u64>,
    score: f64,
    similarity: f64,
    readability: f64,
    errors: u32,
    preview: String,
}

async fn cmd_evaluations(log: &EvaluationLog, limit: usize, json: bool) -> Result<()> {
    let entries = log
        .recent(limit)
        .await
        .with_context(|| format!("Failed to read {}", log.path().display()))?;
    let summaries: Vec<EvaluationSummary> = entries
        .iter()
        .map(|e| EvaluationSummary {
            timestamp: e.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            source: e.source,
            decision: e.decision,
            version: e.version,
            score: e.record.score,
            similarity: e.record.similarity,
            readability: e.record.readability,
            errors: e.record.errors,
            preview: preview(&e.text),
        })
        .collect();

    if json {
        return print_json(&summaries);
    }
    if summaries.is_empty() {
        println!("No evaluations recorded");
        return Ok(());
    }
    for s in &summaries {
        let decision = match s.decision {
            Some(redraft_core::Decision::Accepted) => "accepted",
            Some(redraft_core::Decision::Rejected) => "rejected",
            None => "-",
        };
        println!(
            "{}  {:>8}  {:>8}  score {} (similarity {}, readability {}, errors {})  {}",
            s.timestamp,
            decision,
            s.version
                .map(|v| format!("v{v}"))
                .unwrap_or_else(|| "-".to_string()),
            s.score,
            s.similarity,
            s.readability,
            s.errors,
            s.preview
        );
    }
    Ok(())
}

/// Evaluate a reviewed draft and store it with origin `manual`.
async fn cmd_approve(
    store: &dyn VersionStore,
    evaluator: &RewardEvaluator,
    log: &ProgressionLog,
    text: &Path,
    reference: Option<&Path>,
    note: Option<&str>,
) -> Result<u64> {
    let content = read_text(text).await?;
    let reference = read_optional(reference).await?;
    let evaluation = evaluator
        .evaluate(&content, reference.as_deref())
        .await
        .with_context(|| format!("Failed to evaluate {}", text.display()))?;

    let mut metadata = VersionMetadata::new(VersionOrigin::Manual).with_reward(evaluation.record);
    if let Some(note) = note {
        metadata = metadata.with_note(note);
    }
    let version = store
        .append(&content, metadata)
        .await
        .context("Failed to store approved draft")?;
    log.append(&ProgressionEntry::new(version, evaluation.record))
        .await
        .context("Failed to write progression log")?;
    info!(version, score = evaluation.score(), "draft approved");
    Ok(version)
}

/// Store `content` as the first version of an empty corpus. The store
/// refuses the seed if any other writer got there first.
async fn cmd_seed(
    store: &dyn VersionStore,
    evaluator: &RewardEvaluator,
    content: &str,
    reference: Option<&str>,
) -> Result<u64> {
    if store.latest().await.context("Failed to read corpus")?.is_some() {
        return Err(RevisionError::CorpusNotEmpty.into());
    }
    let evaluation = evaluator.evaluate(content, reference).await?;
    let version = store
        .seed(
            content,
            VersionMetadata::new(VersionOrigin::Seed).with_reward(evaluation.record),
        )
        .await
        .map_err(RevisionError::from)
        .context("Failed to store seed draft")?;
    Ok(version)
}

#[derive(Serialize)]
struct VersionSummary {
    version: u64,
    created_at: String,
    origin: VersionOrigin,
    score: Option<f64>,
    digest: String,
    preview: String,
}

async fn cmd_versions(store: &dyn VersionStore, json: bool) -> Result<()> {
    let mut versions = store.list_all().await.context("Failed to list versions")?;
    versions.sort_by_key(|v| v.version_number);

    let summaries: Vec<VersionSummary> = versions
        .iter()
        .map(|v| VersionSummary {
            version: v.version_number,
            created_at: v.created_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            origin: v.metadata.origin,
            score: v.metadata.reward.map(|r| r.score),
            digest: v.content_digest.short().to_string(),
            preview: preview(&v.content),
        })
        .collect();

    if json {
        return print_json(&summaries);
    }
    if summaries.is_empty() {
        println!("No versions stored");
        return Ok(());
    }
    for s in &summaries {
        let score = s
            .score
            .map(|score| score.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:>4}  {}  {:<6}  {:>8}  {}  {}",
            s.version,
            s.created_at,
            s.origin.as_str(),
            score,
            s.digest,
            s.preview
        );
    }
    Ok(())
}

async fn cmd_show(store: &dyn VersionStore, version: u64, json: bool) -> Result<()> {
    let v = store
        .get(version)
        .await
        .map_err(RevisionError::from)
        .with_context(|| format!("Failed to load version {version}"))?;
    if json {
        return print_json(&v);
    }
    println!("version {}", v.version_number);
    println!("Date:   {}", v.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("Origin: {}", v.metadata.origin);
    println!("Digest: {}", v.content_digest);
    if let Some(reward) = v.metadata.reward {
        println!(
            "Score:  {} (similarity {}, readability {}, errors {})",
            reward.score, reward.similarity, reward.readability, reward.errors
        );
    }
    if let Some(note) = &v.metadata.note {
        println!("Note:   {note}");
    }
    println!();
    println!("{}", v.content);
    Ok(())
}

async fn cmd_leaderboard(board: &Leaderboard, limit: usize) -> Result<Vec<LeaderboardEntry>> {
    let mut entries = board.rank_all().await.context("Failed to rank versions")?;
    entries.truncate(limit);
    Ok(entries)
}

fn print_leaderboard(entries: &[LeaderboardEntry], json: bool) -> Result<()> {
    if json {
        return print_json(&entries);
    }
    if entries.is_empty() {
        println!("No scored versions");
        return Ok(());
    }
    println!(
        "{:>4}  {:>7}  {:>9}  {:>10}  {:>11}  {:>6}  {}",
        "rank", "version", "score", "similarity", "readability", "errors", "created"
    );
    for (rank, e) in entries.iter().enumerate() {
        println!(
            "{:>4}  {:>7}  {:>9}  {:>10}  {:>11}  {:>6}  {}{}",
            rank + 1,
            e.version,
            e.score,
            e.similarity,
            e.readability,
            e.errors,
            e.created_at.format("%Y-%m-%d %H:%M:%S"),
            if e.rescored { "  (rescored)" } else { "" }
        );
    }
    Ok(())
}

async fn cmd_diff(board: &Leaderboard, a: u64, b: u64) -> Result<String> {
    board
        .diff(a, b)
        .await
        .with_context(|| format!("Failed to diff version {a} against {b}"))
}

async fn cmd_progression(board: &Leaderboard, json: bool) -> Result<()> {
    let series = board
        .progression_series()
        .await
        .context("Failed to read score progression")?;
    if json {
        return print_json(&series);
    }
    if series.is_empty() {
        println!("No scored versions");
    }
    for (version, score) in series {
        println!("Version {version} | Score: {score}");
    }
    Ok(())
}

/// Print the accepted-version lines recorded in the progression log.
async fn cmd_progression_log(log: &ProgressionLog, json: bool) -> Result<()> {
    let entries = log
        .read_all()
        .await
        .with_context(|| format!("Failed to read {}", log.path().display()))?;
    if json {
        let rows: Vec<serde_json::Value> = entries
            .iter()
            .map(|e| {
                serde_json::json!({
                    "timestamp": e.timestamp,
                    "version": e.version,
                    "record": e.record,
                })
            })
            .collect();
        return print_json(&rows);
    }
    if entries.is_empty() {
        println!("No accepted versions logged in {}", log.path().display());
    }
    for entry in &entries {
        println!("{}", entry.to_line());
    }
    Ok(())
}

#[derive(Debug, Serialize, PartialEq)]
struct Stats {
    versions: usize,
    latest_version: Option<u64>,
    best_version: Option<u64>,
    best_score: Option<f64>,
}

async fn collect_stats(store: Arc<dyn VersionStore>) -> Result<Stats> {
    let versions = store.list_all().await.context("Failed to read corpus")?;
    let latest_version = versions.iter().map(|v| v.version_number).max();
    let best = Leaderboard::new(store)
        .best()
        .await
        .context("Failed to rank versions")?;
    Ok(Stats {
        versions: versions.len(),
        latest_version,
        best_version: best.as_ref().map(|e| e.version),
        best_score: best.as_ref().map(|e| e.score),
    })
}

async fn cmd_stats(store: Arc<dyn VersionStore>, json: bool) -> Result<()> {
    let stats = collect_stats(store).await?;
    if json {
        return print_json(&stats);
    }
    println!("Versions:       {}", stats.versions);
    match stats.latest_version {
        Some(v) => println!("Latest version: {v}"),
        None => println!("Latest version: -"),
    }
    if let (Some(v), Some(s)) = (stats.best_version, stats.best_score) {
        println!("Best version:   {v} (score {s})");
    }
    Ok(())
}

async fn cmd_reset(store: &dyn VersionStore, yes: bool) -> Result<()> {
    if !yes {
        bail!("Refusing to discard the corpus without --yes");
    }
    store.reset().await.context("Failed to reset corpus")?;
    println!("Corpus reset");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use async_trait::async_trait;
    use redraft_core::fakes::{FixedGrammar, FixedReadability, FixedSimilarity, ScriptedOracle};
    use redraft_core::{Decision, EvaluationSource, RewardRecord, SearchConfig, Version};
    use redraft_state::fakes::MemoryVersionStore;
    use redraft_state::StorageResult;

    fn evaluator(readability: f64) -> RewardEvaluator {
        RewardEvaluator::new(
            Arc::new(FixedSimilarity(0.0)),
            Arc::new(FixedReadability(readability)),
            Arc::new(FixedGrammar(0)),
        )
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_override_settings() {
        let cli = Cli::parse_from([
            "redraft", "--store", "mem://", "--w-err", "1.0", "stats",
        ]);
        let mut settings = Settings::default();
        apply_global_overrides(&mut settings, &cli);
        assert_eq!(settings.storage.url.as_deref(), Some("mem://"));
        assert_eq!(settings.reward.errors, 1.0);
        assert_eq!(settings.reward.similarity, 0.9);
    }

    #[tokio::test]
    async fn seed_then_approve_appends_versions() {
        let dir = tempfile::tempdir().unwrap();
        let draft = dir.path().join("edited.txt");
        tokio::fs::write(&draft, "An edited chapter.").await.unwrap();
        let log = ProgressionLog::new(dir.path().join("progression.log"));
        let store = MemoryVersionStore::new();

        let seeded = cmd_seed(&store, &evaluator(50.0), "First draft.", None)
            .await
            .unwrap();
        assert_eq!(seeded, 0);

        let approved = cmd_approve(&store, &evaluator(60.0), &log, &draft, None, Some("tightened"))
            .await
            .unwrap();
        assert_eq!(approved, 1);

        let v = store.get(1).await.unwrap();
        assert_eq!(v.metadata.origin, VersionOrigin::Manual);
        assert_eq!(v.metadata.note.as_deref(), Some("tightened"));
        assert_eq!(v.metadata.reward.map(|r| r.score), Some(54.0));
        assert_eq!(log.read_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn seed_refuses_non_empty_corpus() {
        let store = MemoryVersionStore::new();
        cmd_seed(&store, &evaluator(1.0), "one", None).await.unwrap();
        let err = cmd_seed(&store, &evaluator(1.0), "two", None)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RevisionError>(),
            Some(RevisionError::CorpusNotEmpty)
        ));
    }

    /// Reads always see an empty corpus, as if another writer appended
    /// right after the check.
    struct StaleReadStore {
        inner: MemoryVersionStore,
    }

    #[async_trait]
    impl VersionStore for StaleReadStore {
        async fn append(&self, content: &str, metadata: VersionMetadata) -> StorageResult<u64> {
            self.inner.append(content, metadata).await
        }

        async fn seed(&self, content: &str, metadata: VersionMetadata) -> StorageResult<u64> {
            self.inner.seed(content, metadata).await
        }

        async fn list_all(&self) -> StorageResult<Vec<Version>> {
            Ok(Vec::new())
        }

        async fn get(&self, version_number: u64) -> StorageResult<Version> {
            self.inner.get(version_number).await
        }

        async fn reset(&self) -> StorageResult<()> {
            self.inner.reset().await
        }
    }

    #[tokio::test]
    async fn seed_losing_a_race_is_refused_not_appended() {
        let store = StaleReadStore {
            inner: MemoryVersionStore::new(),
        };
        store
            .inner
            .append("approved elsewhere", VersionMetadata::new(VersionOrigin::Manual))
            .await
            .unwrap();

        let err = cmd_seed(&store, &evaluator(1.0), "late seed", None)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RevisionError>(),
            Some(RevisionError::CorpusNotEmpty)
        ));
        let versions = store.inner.list_all().await.unwrap();
        assert_eq!(versions.len(), 1);
        assert_eq!(versions[0].metadata.origin, VersionOrigin::Manual);
    }

    #[tokio::test]
    async fn approving_an_empty_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let draft = dir.path().join("blank.txt");
        tokio::fs::write(&draft, "  \n").await.unwrap();
        let log = ProgressionLog::new(dir.path().join("progression.log"));
        let store = MemoryVersionStore::new();

        let err = cmd_approve(&store, &evaluator(1.0), &log, &draft, None, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RevisionError>(),
            Some(RevisionError::EmptyText)
        ));
        assert!(store.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn run_reports_accepted_candidates() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn VersionStore> = Arc::new(MemoryVersionStore::new());
        let audit = EvaluationLog::new(dir.path().join("evaluations.jsonl"));
        let search = SearchLoop::new(
            store.clone(),
            Arc::new(ScriptedOracle::rewrites(["rewrite"])),
            evaluator(10.0),
            SearchConfig {
                iterations: 1,
                ..SearchConfig::default()
            },
        )
        .with_progression_log(ProgressionLog::new(dir.path().join("progression.log")))
        .with_evaluation_log(audit.clone());
        let report = cmd_run(search).await.unwrap();
        // Equal fixed scores: the seed stays the best version.
        assert!(report.seeded);
        assert_eq!(report.rejected(), 1);
        assert_eq!(store.list_all().await.unwrap().len(), 1);

        let entries = audit.recent(5).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].decision, Some(Decision::Rejected));
        assert_eq!(entries[0].text, "rewrite");
    }

    #[tokio::test]
    async fn evaluate_records_the_score() {
        let dir = tempfile::tempdir().unwrap();
        let text = dir.path().join("chapter.txt");
        tokio::fs::write(&text, "A short chapter.").await.unwrap();
        let log = EvaluationLog::new(dir.path().join("evaluations.jsonl"));

        cmd_evaluate(&evaluator(42.0), &log, &text, None, true)
            .await
            .unwrap();
        cmd_evaluations(&log, 5, true).await.unwrap();

        let entries = log.recent(5).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].source, EvaluationSource::Evaluate);
        assert_eq!(entries[0].text, "A short chapter.");
        assert_eq!(entries[0].record.score, 37.8);
    }

    #[tokio::test]
    async fn evaluate_does_not_need_the_corpus() {
        let dir = tempfile::tempdir().unwrap();
        let text = dir.path().join("chapter.txt");
        tokio::fs::write(&text, "The rain fell. She waited by the door.")
            .await
            .unwrap();

        let mut settings = Settings::default();
        settings.storage.url = Some("ws://127.0.0.1:1".to_string());
        settings.scorers.embedding_url = "http://127.0.0.1:1".to_string();
        settings.scorers.languagetool_url = "http://127.0.0.1:1".to_string();
        settings.scorers.timeout_secs = 1;
        settings.log.evaluation_log = dir.path().join("evaluations.jsonl");
        let log = settings.evaluation_log();

        execute(
            Commands::Evaluate {
                text,
                reference: None,
            },
            settings,
            true,
        )
        .await
        .unwrap();

        let entries = log.recent(5).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].degraded.grammar);
    }

    #[tokio::test]
    async fn progression_log_view_reads_logged_lines() {
        let dir = tempfile::tempdir().unwrap();
        let log = ProgressionLog::new(dir.path().join("progression.log"));
        cmd_progression_log(&log, false).await.unwrap();

        log.append(&ProgressionEntry::new(
            2,
            RewardRecord {
                similarity: 0.5,
                readability: 60.0,
                errors: 1,
                score: 54.15,
            },
        ))
        .await
        .unwrap();
        cmd_progression_log(&log, true).await.unwrap();
        assert_eq!(log.read_all().await.unwrap()[0].version, 2);
    }

    #[tokio::test]
    async fn leaderboard_respects_limit() {
        let store = Arc::new(MemoryVersionStore::new());
        for score in [1.0, 3.0, 2.0] {
            store
                .append(
                    &format!("draft {score}"),
                    VersionMetadata::new(VersionOrigin::Search).with_reward(
                        RewardRecord {
                            similarity: 0.0,
                            readability: score,
                            errors: 0,
                            score,
                        },
                    ),
                )
                .await
                .unwrap();
        }
        let entries = cmd_leaderboard(&Leaderboard::new(store.clone()), 2)
            .await
            .unwrap();
        assert_eq!(
            entries.iter().map(|e| e.version).collect::<Vec<_>>(),
            vec![1, 2]
        );

        let stats = collect_stats(store.clone()).await.unwrap();
        assert_eq!(
            stats,
            Stats {
                versions: 3,
                latest_version: Some(2),
                best_version: Some(1),
                best_score: Some(3.0),
            }
        );
    }

    #[tokio::test]
    async fn diff_of_missing_version_is_not_found() {
        let store = Arc::new(MemoryVersionStore::new());
        store
            .append("only", VersionMetadata::new(VersionOrigin::Seed))
            .await
            .unwrap();
        let err = cmd_diff(&Leaderboard::new(store), 0, 99).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RevisionError>(),
            Some(RevisionError::VersionNotFound(99))
        ));
    }

    #[tokio::test]
    async fn reset_requires_confirmation() {
        let store = MemoryVersionStore::new();
        store
            .append("keep me", VersionMetadata::new(VersionOrigin::Seed))
            .await
            .unwrap();
        assert!(cmd_reset(&store, false).await.is_err());
        assert_eq!(store.list_all().await.unwrap().len(), 1);
        cmd_reset(&store, true).await.unwrap();
        assert!(store.list_all().await.unwrap().is_empty());
    }
}
