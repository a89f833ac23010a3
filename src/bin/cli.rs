// Kivo CLI - Command-line interface for the topic research pipeline
//
// Usage: kivo <command> [options]

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use kivo::config::{get_settings_path, read_settings, write_settings};
use kivo::db::{self, StoredRun};
use kivo::export::{export_run, ExportFormat};
use kivo::housekeeping;
use kivo::models::{
    parse_raw_items, Confidence, RawItem, ResearchDepth, ResearchRequest, ResearchSummary,
    Source,
};
use kivo::pipeline::build_query_terms;
use kivo::{ResearchRunner, RunStatus};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Helper to safely serialize JSON for output. Returns error JSON if serialization fails.
fn to_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| format!("{{\"error\": \"JSON serialization failed: {}\"}}", e))
}

#[derive(Parser)]
#[command(
    name = "kivo",
    version = VERSION,
    about = "Topic research CLI - cluster Reddit and X discussions into pain points",
    long_about = None
)]
struct Cli {
    /// Output as JSON instead of formatted text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run research and inspect results
    Research {
        #[command(subcommand)]
        action: ResearchAction,
    },

    /// Browse, export and remove stored runs
    Runs {
        #[command(subcommand)]
        action: RunsAction,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Run history cleanup
    Housekeeping {
        #[command(subcommand)]
        action: HousekeepingAction,
    },
}

// ============================================================================
// Research Commands
// ============================================================================

#[derive(Subcommand)]
enum ResearchAction {
    /// Run research on a topic
    Run {
        /// Topic to research
        topic: String,
        /// Earliest post date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Latest post date (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,
        /// Source to include (repeatable: reddit, x)
        #[arg(short, long = "source")]
        sources: Vec<Source>,
        /// Maximum number of items to analyze
        #[arg(short, long)]
        limit: Option<u32>,
        /// Research depth (default or deep)
        #[arg(short, long, default_value = "default")]
        depth: ResearchDepth,
        /// JSON file with an array of collected posts
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
    /// Show the status of a run
    Status {
        /// Run ID (or unique prefix)
        id: String,
    },
    /// Show the summary of a completed run
    Summary {
        /// Run ID (or unique prefix)
        id: String,
    },
    /// Show the full payload of a completed run
    Payload {
        /// Run ID (or unique prefix)
        id: String,
    },
    /// Show the query terms derived from a topic
    Terms {
        /// Topic to expand
        topic: String,
    },
}

// ============================================================================
// Runs Commands
// ============================================================================

#[derive(Subcommand)]
enum RunsAction {
    /// List recent runs
    List {
        /// Maximum number of runs to show
        #[arg(short, long, default_value = "10")]
        limit: i64,
    },
    /// Export a run
    Export {
        /// Run ID (or unique prefix)
        id: String,
        /// Output format (markdown, json or csv)
        #[arg(short, long, default_value = "markdown")]
        format: ExportFormat,
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Remove a run from the history
    Remove {
        /// Run ID (or unique prefix)
        id: String,
    },
}

// ============================================================================
// Config Commands
// ============================================================================

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key
        key: String,
        /// Value to set
        value: String,
    },
}

// ============================================================================
// Housekeeping Commands
// ============================================================================

#[derive(Subcommand)]
enum HousekeepingAction {
    /// Delete runs older than the retention period
    Run {
        /// Dry run (show what would be deleted without deleting)
        #[arg(short, long)]
        dry_run: bool,
    },
    /// Show retention status (run counts, etc.)
    Status,
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt().with_target(false).init();

    let result = match cli.command {
        Commands::Research { action } => handle_research(action, cli.json).await,
        Commands::Runs { action } => handle_runs(action, cli.json).await,
        Commands::Config { action } => handle_config(action, cli.json).await,
        Commands::Housekeeping { action } => handle_housekeeping(action, cli.json).await,
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn short_id(id: &str) -> &str {
    if id.len() >= 8 {
        &id[..8]
    } else {
        id
    }
}

fn open_history() -> Result<rusqlite::Connection, String> {
    let settings = read_settings()?;
    db::get_connection(&settings).map_err(|e| format!("Database connection failed: {}", e))
}

fn load_run(conn: &rusqlite::Connection, id: &str) -> Result<StoredRun, String> {
    db::get_run(conn, id)?.ok_or_else(|| format!("Run '{}' not found", id))
}

fn read_items(path: &Path) -> Result<Vec<RawItem>, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    parse_raw_items(&content)
        .map_err(|e| format!("Failed to parse {}: {}", path.display(), e))
}

fn colored_status(status: &str) -> String {
    match status.parse::<RunStatus>() {
        Ok(RunStatus::Completed) => format!("✓ {}", status).green().to_string(),
        Ok(RunStatus::Failed) => format!("✗ {}", status).red().to_string(),
        Ok(RunStatus::Running) => format!("● {}", status).cyan().to_string(),
        _ => format!("○ {}", status).dimmed().to_string(),
    }
}

fn colored_confidence(confidence: Confidence) -> String {
    match confidence {
        Confidence::High => "high".green().to_string(),
        Confidence::Medium => "medium".yellow().to_string(),
        Confidence::Low => "low".red().to_string(),
    }
}

fn print_list(title: &str, lines: &[String]) {
    if lines.is_empty() {
        return;
    }
    println!("{}", title.bold());
    for line in lines {
        println!("  • {}", line);
    }
    println!();
}

fn print_summary(summary: &ResearchSummary) {
    println!("{} {}", "Topic:".bold(), summary.topic);
    println!(
        "{} {}",
        "Confidence:".bold(),
        colored_confidence(summary.confidence)
    );
    println!();
    println!("{}", summary.summary_text);
    println!();
    print_list("Top pain points", &summary.top_pain_points);
    print_list("Product hypotheses", &summary.product_hypotheses);
    print_list("Recommended actions", &summary.recommended_actions);
    print_list("Sources", &summary.top_sources);
}

// ============================================================================
// Research Handlers
// ============================================================================

async fn handle_research(action: ResearchAction, json: bool) -> Result<(), String> {
    match action {
        ResearchAction::Run {
            topic,
            from,
            to,
            sources,
            limit,
            depth,
            input,
        } => {
            let settings = read_settings()?;
            let conn = db::get_connection(&settings)
                .map_err(|e| format!("Database connection failed: {}", e))?;
            housekeeping::run_startup_cleanup(&conn, &settings);

            let raw_items = match &input {
                Some(path) => read_items(path)?,
                None => Vec::new(),
            };

            let mut request = ResearchRequest::new(topic);
            request.from_date = from;
            request.to_date = to;
            request.depth = depth;
            request.sample_limit = limit;
            if !sources.is_empty() {
                request.sources = sources;
            }

            let runner = ResearchRunner::from_settings(&settings);
            let item_count = raw_items.len();
            let run_id = runner.start_run(request, raw_items)?;

            let status = if json {
                runner.wait_for(&run_id, POLL_INTERVAL).await?
            } else {
                println!(
                    "{} Run {} started on {} item(s) ({} mode)",
                    "→".cyan(),
                    short_id(&run_id),
                    item_count,
                    runner.pipeline_mode().as_str()
                );

                let mut last_phase = String::new();
                loop {
                    let status = runner
                        .get_status(&run_id)?
                        .ok_or_else(|| format!("Run {} disappeared", run_id))?;

                    if status.current_phase != last_phase {
                        print!(
                            "\r{} {:<20} {:>3.0}%",
                            "→".cyan(),
                            status.current_phase,
                            status.progress * 100.0
                        );
                        std::io::stdout().flush().ok();
                        last_phase = status.current_phase.clone();
                    }

                    if status.status.is_terminal() {
                        println!();
                        break status;
                    }
                    tokio::time::sleep(POLL_INTERVAL).await;
                }
            };

            let record = runner
                .store()
                .get(&run_id)?
                .ok_or_else(|| format!("Run {} disappeared", run_id))?;
            db::save_run(&conn, &record)?;

            if status.status == RunStatus::Failed {
                return Err(format!(
                    "Run {} failed: {}",
                    short_id(&run_id),
                    status.message.as_deref().unwrap_or("unknown error")
                ));
            }

            match record.summary {
                Some(summary) if json => println!("{}", to_json(&summary)),
                Some(summary) => {
                    println!();
                    print_summary(&summary);
                    println!("{} Saved as run {}", "✓".green(), run_id);
                }
                None => return Err(format!("Run {} produced no summary", run_id)),
            }
        }

        ResearchAction::Status { id } => {
            let conn = open_history()?;
            let run = load_run(&conn, &id)?;

            if json {
                println!(
                    "{}",
                    to_json(&serde_json::json!({
                        "run_id": run.run_id,
                        "topic": run.topic,
                        "status": run.status,
                        "message": run.message,
                        "error_code": run.error_code,
                        "pipeline_mode": run.pipeline_mode,
                        "created_at": run.created_at,
                        "updated_at": run.updated_at,
                    }))
                );
            } else {
                let mut table = Table::new();
                table.load_preset(UTF8_FULL);
                table.set_content_arrangement(ContentArrangement::Dynamic);
                table.add_row(vec!["Run ID", &run.run_id]);
                table.add_row(vec!["Topic", &run.topic]);
                table.add_row(vec!["Status", &colored_status(&run.status)]);
                table.add_row(vec!["Mode", &run.pipeline_mode]);
                table.add_row(vec!["Created", &run.created_at]);
                table.add_row(vec!["Updated", &run.updated_at]);
                if let Some(message) = &run.message {
                    table.add_row(vec!["Message", message]);
                }
                if let Some(code) = &run.error_code {
                    table.add_row(vec!["Error code", code]);
                }
                println!("{}", table);
            }
        }

        ResearchAction::Summary { id } => {
            let conn = open_history()?;
            let run = load_run(&conn, &id)?;
            let summary = run
                .summary()?
                .ok_or_else(|| format!("Run {} has no summary ({})", short_id(&run.run_id), run.status))?;

            if json {
                println!("{}", to_json(&summary));
            } else {
                print_summary(&summary);
            }
        }

        ResearchAction::Payload { id } => {
            let conn = open_history()?;
            let run = load_run(&conn, &id)?;
            let payload = run
                .payload()?
                .ok_or_else(|| format!("Run {} has no payload ({})", short_id(&run.run_id), run.status))?;

            if json {
                println!("{}", to_json(&payload));
            } else {
                println!(
                    "{} {} item(s), {} cluster(s), query terms: {}",
                    "Payload:".bold(),
                    payload.items.len(),
                    payload.clusters.len(),
                    payload.query_terms.join(", ")
                );

                if !payload.clusters.is_empty() {
                    let mut table = Table::new();
                    table.load_preset(UTF8_FULL);
                    table.set_content_arrangement(ContentArrangement::Dynamic);
                    table.set_header(vec!["#", "Representative", "Count", "Share", "Tags"]);
                    for cluster in &payload.clusters {
                        table.add_row(vec![
                            cluster.cluster_id.to_string(),
                            cluster.representative_text.clone(),
                            cluster.count.to_string(),
                            format!("{:.0}%", cluster.percent_of_total * 100.0),
                            cluster.tags.join(", "),
                        ]);
                    }
                    println!("{}", table);
                }
            }
        }

        ResearchAction::Terms { topic } => {
            let terms = build_query_terms(&topic);

            if json {
                println!("{}", to_json(&serde_json::json!({ "topic": topic, "terms": terms })));
            } else if terms.is_empty() {
                println!("{}", "No query terms for this topic.".yellow());
            } else {
                for term in &terms {
                    println!("  • {}", term);
                }
            }
        }
    }

    Ok(())
}

// ============================================================================
// Runs Handlers
// ============================================================================

async fn handle_runs(action: RunsAction, json: bool) -> Result<(), String> {
    let conn = open_history()?;

    match action {
        RunsAction::List { limit } => {
            let runs = db::list_runs(&conn, limit)?;

            if json {
                println!("{}", to_json(&serde_json::json!({ "runs": runs })));
            } else if runs.is_empty() {
                println!("{}", "No runs yet.".yellow());
                println!("Start one with: kivo research run <topic> --input items.json");
            } else {
                let mut table = Table::new();
                table.load_preset(UTF8_FULL);
                table.set_content_arrangement(ContentArrangement::Dynamic);
                table.set_header(vec!["ID", "Topic", "Status", "Mode", "Created"]);

                for run in &runs {
                    let created = run.created_at.get(..16).unwrap_or(&run.created_at);
                    table.add_row(vec![
                        short_id(&run.run_id).to_string(),
                        run.topic.clone(),
                        colored_status(&run.status),
                        run.pipeline_mode.clone(),
                        created.replace('T', " "),
                    ]);
                }
                println!("{}", table);
            }
        }

        RunsAction::Export { id, format, output } => {
            let run = load_run(&conn, &id)?;
            let summary = run
                .summary()?
                .ok_or_else(|| format!("Run {} has nothing to export ({})", short_id(&run.run_id), run.status))?;
            let payload = run.payload()?;
            let rendered = export_run(format, &summary, payload.as_ref())?;

            match output {
                Some(path) => {
                    std::fs::write(&path, rendered)
                        .map_err(|e| format!("Failed to write {}: {}", path.display(), e))?;
                    if json {
                        println!(
                            "{}",
                            serde_json::json!({ "exported": run.run_id, "path": path })
                        );
                    } else {
                        println!("{} Exported to {}", "✓".green(), path.display());
                    }
                }
                None => print!("{}", rendered),
            }
        }

        RunsAction::Remove { id } => {
            let run = load_run(&conn, &id)?;
            let removed = db::delete_run(&conn, &run.run_id)?;

            if json {
                println!("{}", serde_json::json!({ "removed": removed, "run_id": run.run_id }));
            } else {
                println!("{} Removed run {} ({})", "✓".green(), short_id(&run.run_id), run.topic);
            }
        }
    }

    Ok(())
}

// ============================================================================
// Config Handlers
// ============================================================================

async fn handle_config(action: ConfigAction, json: bool) -> Result<(), String> {
    match action {
        ConfigAction::Show => {
            let settings = read_settings()?;

            if json {
                println!("{}", to_json(&settings));
            } else {
                let retention = settings
                    .retention_days
                    .map(|d| format!("{} days", d))
                    .unwrap_or_else(|| "never delete".to_string());

                let mut table = Table::new();
                table.load_preset(UTF8_FULL);
                table.set_content_arrangement(ContentArrangement::Dynamic);
                table.set_header(vec!["Setting", "Value"]);
                table.add_row(vec!["dedup_threshold", &settings.dedup_threshold.to_string()]);
                table.add_row(vec![
                    "cluster_threshold",
                    &settings.cluster_threshold.to_string(),
                ]);
                table.add_row(vec!["max_keywords", &settings.max_keywords.to_string()]);
                table.add_row(vec!["pipeline_mode", settings.pipeline_mode.as_str()]);
                table.add_row(vec![
                    "storage_path",
                    &settings.storage_dir().display().to_string(),
                ]);
                table.add_row(vec!["retention_days", &retention]);
                println!("{}", table);
                println!("Settings file: {}", get_settings_path().display());
            }
        }

        ConfigAction::Set { key, value } => {
            let mut settings = read_settings()?;
            settings.set_value(&key, &value)?;
            write_settings(&settings)?;

            if json {
                println!("{}", serde_json::json!({ "key": key, "value": value }));
            } else {
                println!("{} Set {} = {}", "✓".green(), key, value);
            }
        }
    }

    Ok(())
}

// ============================================================================
// Housekeeping Handlers
// ============================================================================

async fn handle_housekeeping(action: HousekeepingAction, json: bool) -> Result<(), String> {
    let settings = read_settings()?;
    let conn =
        db::get_connection(&settings).map_err(|e| format!("Database connection failed: {}", e))?;

    match action {
        HousekeepingAction::Run { dry_run } => {
            let result = housekeeping::run_cleanup(&conn, &settings, dry_run)?;

            if json {
                println!("{}", to_json(&result));
            } else if let Some(reason) = result.skipped_reason {
                println!("{} Skipped: {}", "ℹ".blue(), reason);
                println!("Enable cleanup with: kivo config set retention_days <days>");
            } else if result.dry_run {
                if result.deleted_count > 0 {
                    println!(
                        "{} {} run(s) would be deleted",
                        "Preview:".yellow(),
                        result.deleted_count
                    );
                    println!("\nRun without --dry-run to delete");
                } else {
                    println!("{} No runs to clean up", "✓".green());
                }
            } else if result.deleted_count > 0 {
                println!(
                    "{} Deleted {} run(s), {} remaining",
                    "✓".green(),
                    result.deleted_count,
                    result.remaining_count
                );
            } else {
                println!(
                    "{} No runs to clean up ({} total)",
                    "✓".green(),
                    result.remaining_count
                );
            }
        }

        HousekeepingAction::Status => {
            let status = housekeeping::retention_status(&conn, &settings)?;

            if json {
                println!("{}", to_json(&status));
            } else {
                let retention = status
                    .retention_days
                    .map(|d| format!("{} days", d))
                    .unwrap_or_else(|| "never delete".to_string());
                println!("{} {}", "Retention:".bold(), retention);
                println!("{} {}", "Stored runs:".bold(), status.total_runs);
                println!(
                    "{} {}",
                    "Cleanup candidates:".bold(),
                    status.cleanup_candidates
                );
                println!(
                    "{} {}",
                    "Database:".bold(),
                    db::get_db_path(&settings).display()
                );
            }
        }
    }

    Ok(())
}
