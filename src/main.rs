use std::io::IsTerminal;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use miette::{Context, IntoDiagnostic, Result};
use tracing_subscriber::EnvFilter;

use scout_core::{AnalysisRequest, CandidateProfile, JobPosting, OutputFormat, ScoutConfig};
use scout_match::budget::{CostBudgetPolicy, CostLedger};
use scout_match::cache::MemoryCache;
use scout_match::orchestrator::{select_strategy, MatchOrchestrator};
use scout_pipeline::notify::TracingNotifier;
use scout_pipeline::state::JobStatusStateMachine;
use scout_pipeline::store::{JobRecord, JobStore, SqliteStore};
use scout_providers::{adapter_for, CallCounters};

#[derive(Parser)]
#[command(
    name = "scout",
    version,
    about = "AI job-match orchestration",
    long_about = "Scout scores job postings against your profile with one or more LLM\n\
                   providers before you spend an evening on a cover letter.\n\n\
                   Postings move through a status pipeline: discovered -> analyzing ->\n\
                   ready_for_documents or analyzed_no_action.\n\n\
                   Examples:\n  \
                     scout init                          Create a .scout.toml config file\n  \
                     scout analyze --file posting.txt --company Acme --title 'Staff Engineer'\n  \
                     cat posting.txt | scout analyze --company Acme --title 'Staff Engineer'\n  \
                     scout show --id acme-staff-engineer Show a stored verdict\n  \
                     scout doctor                        Check setup and environment"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file (default: .scout.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        global = true,
        default_value = "text",
        long_help = "Output format for command results.\n\n\
                       Formats:\n  \
                         text      Human-readable summary (default)\n  \
                         json      Machine-readable JSON with camelCase keys\n  \
                         markdown  GitHub-flavored Markdown"
    )]
    format: OutputFormat,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    verbose: bool,

    /// When to use colors
    #[arg(long, global = true, default_value = "auto")]
    color: ColorChoice,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze a job posting against your profile
    #[command(long_about = "Analyze a job posting against your profile.\n\n\
        Reads the posting from a file or stdin, runs the configured analysis\n\
        strategy (direct, two-tier prescreen, ensemble, or fallback), and\n\
        routes the job's status from the verdict.\n\n\
        Examples:\n  scout analyze --file posting.txt --company Acme --title 'Staff Engineer'\n  \
        cat posting.txt | scout analyze --company Acme --title SRE")]
    Analyze {
        /// Read the posting from a file instead of stdin
        #[arg(long)]
        file: Option<PathBuf>,

        /// Hiring company
        #[arg(long)]
        company: String,

        /// Role title
        #[arg(long)]
        title: String,

        /// Job id (default: derived from company and title)
        #[arg(long)]
        id: Option<String>,

        /// Candidate profile TOML (summary, skills, years_experience)
        #[arg(long)]
        profile: Option<PathBuf>,

        /// Job store database path
        #[arg(long, default_value = ".scout/jobs.db")]
        db: PathBuf,
    },
    /// Show a stored job and its verdict
    #[command(long_about = "Show a stored job and its verdict.\n\n\
        Examples:\n  scout show --id acme-staff-engineer\n  scout show --id acme-staff-engineer --format json")]
    Show {
        /// Job id
        #[arg(long)]
        id: String,

        /// Job store database path
        #[arg(long, default_value = ".scout/jobs.db")]
        db: PathBuf,
    },
    /// Create a default .scout.toml configuration file
    #[command(long_about = "Create a default .scout.toml configuration file.\n\n\
        Generates a starter config with all common options.\n\
        Fails if .scout.toml already exists.")]
    Init,
    /// Check your Scout setup and environment
    #[command(long_about = "Check your Scout setup and environment.\n\n\
        Runs diagnostics for the config file, API key, analysis strategy,\n\
        and the job store. Use --format json for machine-readable output.")]
    Doctor {
        /// Job store database path
        #[arg(long, default_value = ".scout/jobs.db")]
        db: PathBuf,
    },
}

#[derive(Clone, PartialEq, Eq, ValueEnum)]
enum ColorChoice {
    /// Auto-detect based on terminal
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

fn print_welcome(use_color: bool) {
    let version = env!("CARGO_PKG_VERSION");

    if use_color {
        println!("\x1b[1m\x1b[33m\u{1f50e}\x1b[0m \x1b[1mscout\x1b[0m v{version} — score the posting before you write the cover letter\n");

        println!("Quick start:");
        println!("  \x1b[36mscout init\x1b[0m                    Create a .scout.toml config file");
        println!("  \x1b[36mscout analyze --file p.txt --company Acme --title SRE\x1b[0m");
        println!("  \x1b[36mscout doctor\x1b[0m                  Check your setup\n");

        println!("All commands:");
        println!("  \x1b[32manalyze\x1b[0m   Score a posting and route its status");
        println!("  \x1b[32mshow\x1b[0m      Show a stored job and its verdict");
        println!("  \x1b[32mdoctor\x1b[0m    Check your setup and environment");
        println!("  \x1b[32minit\x1b[0m      Create default configuration\n");
    } else {
        println!("scout v{version} — score the posting before you write the cover letter\n");

        println!("Quick start:");
        println!("  scout init                    Create a .scout.toml config file");
        println!("  scout analyze --file p.txt --company Acme --title SRE");
        println!("  scout doctor                  Check your setup\n");

        println!("All commands:");
        println!("  analyze   Score a posting and route its status");
        println!("  show      Show a stored job and its verdict");
        println!("  doctor    Check your setup and environment");
        println!("  init      Create default configuration\n");
    }

    println!("Run 'scout <command> --help' for details.");
}

fn read_posting_input(file: &Option<PathBuf>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .into_diagnostic()
            .wrap_err(format!("reading {}", path.display())),
        None => {
            let mut input = String::new();
            std::io::stdin()
                .read_to_string(&mut input)
                .into_diagnostic()
                .wrap_err("reading stdin")?;
            Ok(input)
        }
    }
}

fn read_profile(path: &Option<PathBuf>) -> Result<CandidateProfile> {
    match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .into_diagnostic()
                .wrap_err(format!("reading {}", path.display()))?;
            toml::from_str(&content)
                .into_diagnostic()
                .wrap_err("parsing candidate profile")
        }
        None => Ok(CandidateProfile::default()),
    }
}

fn slug(company: &str, title: &str) -> String {
    let mut out = String::new();
    for c in format!("{company} {title}").chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('-') && !out.is_empty() {
            out.push('-');
        }
    }
    out.trim_end_matches('-').to_string()
}

#[derive(serde::Serialize)]
struct CheckResult {
    name: &'static str,
    status: &'static str,
    detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<String>,
}

impl CheckResult {
    fn pass(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            status: "pass",
            detail: detail.into(),
            hint: None,
        }
    }

    fn fail(name: &'static str, detail: impl Into<String>, hint: impl Into<String>) -> Self {
        Self {
            name,
            status: "fail",
            detail: detail.into(),
            hint: Some(hint.into()),
        }
    }

    fn info(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            status: "info",
            detail: detail.into(),
            hint: None,
        }
    }

    fn symbol(&self) -> &'static str {
        match self.status {
            "pass" => "\u{2713}",
            "fail" => "\u{2717}",
            _ => "~",
        }
    }

    fn colored_symbol(&self) -> String {
        match self.status {
            "pass" => "\x1b[32m\u{2713}\x1b[0m".into(),
            "fail" => "\x1b[31m\u{2717}\x1b[0m".into(),
            _ => "\x1b[33m~\x1b[0m".into(),
        }
    }
}

fn run_doctor(
    config: &ScoutConfig,
    db: &Path,
    format: OutputFormat,
    use_color: bool,
) -> Result<()> {
    let mut checks: Vec<CheckResult> = Vec::new();

    if Path::new(".scout.toml").exists() {
        checks.push(CheckResult::pass("config_file", ".scout.toml found"));
    } else {
        checks.push(CheckResult::info(
            "config_file",
            "not found, using defaults (run 'scout init' to create)",
        ));
    }

    if config.resolved_api_key().is_some() {
        checks.push(CheckResult::pass(
            "api_key",
            format!("configured for provider '{}'", config.llm.provider),
        ));
    } else {
        let var = match config.llm.provider.as_str() {
            "anthropic" => "ANTHROPIC_API_KEY",
            _ => "OPENAI_API_KEY",
        };
        checks.push(CheckResult::fail(
            "api_key",
            "no API key configured",
            format!("export {var}=... or add api_key under [llm] in .scout.toml"),
        ));
    }

    match select_strategy(config) {
        Ok(strategy) => checks.push(CheckResult::pass(
            "strategy",
            format!("{} via {}", strategy.kind(), config.llm.provider),
        )),
        Err(err) => checks.push(CheckResult::fail(
            "strategy",
            err.to_string(),
            "fix the [ensemble] section in .scout.toml",
        )),
    }

    match SqliteStore::open(db) {
        Ok(_) => checks.push(CheckResult::pass(
            "job_store",
            format!("writable at {}", db.display()),
        )),
        Err(err) => checks.push(CheckResult::fail(
            "job_store",
            err.to_string(),
            "check permissions on the --db path",
        )),
    }

    checks.push(CheckResult::info(
        "cost_ceiling",
        format!("${:.2} per job", config.matching.max_cost_per_job),
    ));

    match format {
        OutputFormat::Json => {
            let version = env!("CARGO_PKG_VERSION");
            let json = serde_json::json!({
                "version": version,
                "checks": checks,
            });
            println!("{}", serde_json::to_string_pretty(&json).into_diagnostic()?);
        }
        _ => {
            let version = env!("CARGO_PKG_VERSION");
            println!("Scout v{version} — Environment Check\n");

            for check in &checks {
                let sym = if use_color {
                    check.colored_symbol()
                } else {
                    check.symbol().to_string()
                };
                let label = check.name.replace('_', " ");
                println!("  {sym} {label:<14} {}", check.detail);
                if let Some(hint) = &check.hint {
                    println!("    hint: {hint}");
                }
            }

            let passed = checks.iter().filter(|c| c.status == "pass").count();
            let failed = checks.iter().filter(|c| c.status == "fail").count();
            let info = checks.iter().filter(|c| c.status == "info").count();
            println!("\n{passed} checks passed, {failed} failed, {info} info");
        }
    }

    Ok(())
}

struct AnalyzeArgs {
    file: Option<PathBuf>,
    company: String,
    title: String,
    id: Option<String>,
    profile: Option<PathBuf>,
    db: PathBuf,
}

async fn run_analyze(config: ScoutConfig, args: AnalyzeArgs, format: OutputFormat) -> Result<()> {
    let description = read_posting_input(&args.file)?;
    if description.trim().is_empty() {
        miette::bail!("the posting text is empty");
    }
    let profile = read_profile(&args.profile)?;
    let job_id = args
        .id
        .unwrap_or_else(|| slug(&args.company, &args.title));

    let store = Arc::new(SqliteStore::open(&args.db).into_diagnostic()?);
    match store.load_job(&job_id) {
        Ok(existing) if existing.status.is_terminal() => {
            miette::bail!(miette::miette!(
                help = "run 'scout show --id {job_id}' to see the stored verdict",
                "job {job_id} is already {}",
                existing.status
            ));
        }
        Ok(_) => {}
        Err(scout_core::ScoutError::JobNotFound(_)) => {
            store.insert_job(&JobRecord::discovered(
                &job_id,
                &args.title,
                &args.company,
                &description,
            ))
            .into_diagnostic()?;
        }
        Err(err) => return Err(err).into_diagnostic(),
    }

    let mut llm = config.llm.clone();
    if llm.api_key.is_none() {
        llm.api_key = config.resolved_api_key();
    }
    if llm.api_key.is_none() {
        miette::bail!(miette::miette!(
            help = "export OPENAI_API_KEY / ANTHROPIC_API_KEY or run 'scout init' and set api_key",
            "no API key configured for provider '{}'",
            llm.provider
        ));
    }

    let counters = Arc::new(CallCounters::default());
    let adapter = adapter_for(&llm, Arc::clone(&counters)).into_diagnostic()?;
    let ledger = Arc::new(CostLedger::default());
    let policy = CostBudgetPolicy::new(Arc::clone(&ledger), config.matching.max_cost_per_job);
    let orchestrator = MatchOrchestrator::new(adapter, policy, config.clone())
        .with_cache(Arc::new(MemoryCache::default()));

    let machine = JobStatusStateMachine::new(
        Arc::clone(&store) as Arc<dyn JobStore>,
        Arc::new(TracingNotifier),
        config.matching.min_match_score,
    );

    machine.begin(&job_id).into_diagnostic()?;

    let spinner = if std::io::stderr().is_terminal() {
        let pb = indicatif::ProgressBar::new_spinner();
        pb.set_message(format!("analyzing {job_id}"));
        pb.enable_steady_tick(Duration::from_millis(120));
        Some(pb)
    } else {
        None
    };

    let request = AnalysisRequest::new(
        JobPosting {
            id: job_id.clone(),
            title: args.title,
            company: args.company,
            description,
            url: None,
        },
        profile,
    );
    let outcome = orchestrator.analyze(&request).await;

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    let verdict = match machine.apply(&job_id, outcome) {
        Ok(_) => {
            let record = store.load_job(&job_id).into_diagnostic()?;
            let blob = record
                .verdict_json
                .ok_or_else(|| miette::miette!("verdict missing after a committed analysis"))?;
            serde_json::from_str::<scout_core::MatchVerdict>(&blob).into_diagnostic()?
        }
        Err(err) => {
            return Err(err)
                .into_diagnostic()
                .wrap_err(format!("analysis failed for {job_id}; the job stays retryable"));
        }
    };

    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&verdict).into_diagnostic()?
        ),
        OutputFormat::Markdown => print!("{}", verdict.to_markdown()),
        OutputFormat::Text => print!("{verdict}"),
    }
    eprintln!(
        "session spend: ${:.4} across {} provider calls",
        ledger.session_total(),
        counters.total(),
    );
    Ok(())
}

fn run_show(id: &str, db: &Path, format: OutputFormat) -> Result<()> {
    let store = SqliteStore::open(db).into_diagnostic()?;
    let record = store.load_job(id).into_diagnostic()?;

    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&record).into_diagnostic()?
            );
        }
        _ => {
            println!("{} — {} at {}", record.id, record.title, record.company);
            println!("status: {}", record.display_status());
            if let Some(at) = record.analyzed_at {
                println!("analyzed: {}", at.format("%Y-%m-%d %H:%M UTC"));
            }
            if let Some(failure) = &record.last_failure {
                println!("last failure: {failure}");
            }
            if let Some(blob) = &record.verdict_json {
                let verdict: scout_core::MatchVerdict =
                    serde_json::from_str(blob).into_diagnostic()?;
                println!();
                if format == OutputFormat::Markdown {
                    print!("{}", verdict.to_markdown());
                } else {
                    print!("{verdict}");
                }
            }
        }
    }
    Ok(())
}

fn run_init() -> Result<()> {
    let path = Path::new(".scout.toml");
    if path.exists() {
        miette::bail!(".scout.toml already exists; delete it first to regenerate");
    }
    std::fs::write(path, ScoutConfig::starter_toml())
        .into_diagnostic()
        .wrap_err("writing .scout.toml")?;
    println!("Wrote .scout.toml");
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "scout=debug,scout_core=debug,scout_providers=debug,scout_match=debug,scout_pipeline=debug"
    } else {
        "warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))
    .expect("miette handler");
    human_panic::setup_panic!();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match &cli.config {
        Some(path) => ScoutConfig::from_file(path).into_diagnostic()?,
        None => {
            let default_path = Path::new(".scout.toml");
            if default_path.exists() {
                ScoutConfig::from_file(default_path).into_diagnostic()?
            } else {
                ScoutConfig::default()
            }
        }
    };

    let use_color = match cli.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => std::io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    };

    match cli.command {
        None => {
            print_welcome(use_color);
            Ok(())
        }
        Some(Command::Analyze {
            file,
            company,
            title,
            id,
            profile,
            db,
        }) => {
            run_analyze(
                config,
                AnalyzeArgs {
                    file,
                    company,
                    title,
                    id,
                    profile,
                    db,
                },
                cli.format,
            )
            .await
        }
        Some(Command::Show { ref id, ref db }) => run_show(id, db, cli.format),
        Some(Command::Init) => run_init(),
        Some(Command::Doctor { ref db }) => run_doctor(&config, db, cli.format, use_color),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_is_lowercase_kebab() {
        assert_eq!(
            slug("Acme Corp", "Staff Engineer"),
            "acme-corp-staff-engineer"
        );
        assert_eq!(slug("Acme!!", "SRE (Platform)"), "acme-sre-platform");
    }

    #[test]
    fn slug_collapses_separators() {
        assert_eq!(slug("A  B", "C - D"), "a-b-c-d");
    }
}
