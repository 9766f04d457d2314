mod config;
mod review_runner;

use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use codespan_reporting::diagnostic::{Diagnostic, Severity};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use tracing_subscriber::{EnvFilter, fmt};

use plannotator::review::ReviewSession;
use plannotator::share;

use crate::config::{AnnotationFile, Config};

const LOG_ENV: &str = "PLANNOTATOR_LOG";

#[derive(Parser)]
#[command(name = "plannotator", version, about = "Annotate plans and share reviews")]
struct Cli {
    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// More log output on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Config file (defaults to ./plannotator.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the blocks of a plan
    Blocks(BlocksArgs),

    /// Print a share URL for a plan and its annotations
    Share(ShareArgs),

    /// Restore a shared review and show its annotations
    Open(OpenArgs),

    /// Print the permission hook decision for a reviewed plan
    Decide(DecideArgs),

    /// Run .review.md fixtures
    Check(CheckArgs),
}

#[derive(clap::Args)]
struct BlocksArgs {
    /// Plan markdown file
    plan: PathBuf,

    /// Print blocks as JSON
    #[arg(long)]
    json: bool,
}

#[derive(clap::Args)]
struct ShareArgs {
    /// Plan markdown file
    plan: PathBuf,

    /// TOML file of annotations
    #[arg(short, long)]
    annotations: Option<PathBuf>,

    /// Share site base URL
    #[arg(long)]
    base_url: Option<String>,

    /// Print only the fragment, without `#`
    #[arg(long)]
    fragment_only: bool,
}

#[derive(clap::Args)]
struct OpenArgs {
    /// Share URL, `#fragment` or bare fragment
    input: String,

    /// Re-anchor the annotations against this plan instead of the shared one
    #[arg(long)]
    plan: Option<PathBuf>,

    /// Print the restored annotations as JSON
    #[arg(long)]
    json: bool,
}

#[derive(clap::Args)]
struct DecideArgs {
    /// Plan markdown file
    plan: PathBuf,

    /// TOML file of annotations
    #[arg(short, long)]
    annotations: Option<PathBuf>,

    #[command(flatten)]
    verdict: Verdict,

    /// Pretty-print the JSON
    #[arg(long)]
    pretty: bool,
}

#[derive(clap::Args)]
#[group(required = true, multiple = false)]
struct Verdict {
    /// Approve the plan
    #[arg(long)]
    approve: bool,

    /// Deny the plan with feedback
    #[arg(long)]
    deny: bool,
}

#[derive(clap::Args)]
struct CheckArgs {
    /// Path to a .review.md file or a directory containing them
    path: PathBuf,

    /// Run only fixtures in these categories (subfolder names). Repeatable.
    #[arg(short, long)]
    category: Vec<String>,

    /// List available categories and exit
    #[arg(long)]
    list_categories: bool,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.no_color);

    match run(cli) {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {:#}", e);
            process::exit(1);
        }
    }
}

fn init_tracing(verbose: u8, no_color: bool) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(!no_color)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<i32> {
    let color = if cli.no_color {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    };

    match cli.command {
        Command::Blocks(args) => do_blocks(args),
        Command::Share(args) => {
            let config = Config::load(cli.config.as_deref())?;
            do_share(args, &config, color)
        }
        Command::Open(args) => do_open(args, color),
        Command::Decide(args) => {
            let config = Config::load(cli.config.as_deref())?;
            do_decide(args, &config)
        }
        Command::Check(args) => {
            if args.list_categories {
                review_runner::list_categories(&args.path);
                return Ok(0);
            }
            Ok(review_runner::run_fixtures(
                &args.path,
                cli.no_color,
                &args.category,
            ))
        }
    }
}

fn read_plan(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("cannot read '{}'", path.display()))
}

/// Load a plan and apply an optional annotation file to it.
fn load_session(
    plan: &Path,
    annotations: Option<&Path>,
    default_author: Option<&str>,
) -> Result<ReviewSession> {
    let mut session = ReviewSession::new(read_plan(plan)?);
    if let Some(path) = annotations {
        let report = AnnotationFile::load(path)?.apply(&mut session, default_author)?;
        tracing::info!(
            anchored = report.anchored,
            global = report.global,
            orphaned = report.orphaned.len(),
            "annotations applied"
        );
    }
    Ok(session)
}

fn do_blocks(args: BlocksArgs) -> Result<i32> {
    let session = ReviewSession::new(read_plan(&args.plan)?);
    let blocks = &session.plan().blocks;

    if args.json {
        println!("{}", serde_json::to_string_pretty(blocks)?);
        return Ok(0);
    }

    for block in blocks {
        let first_line = block.content.lines().next().unwrap_or_default();
        let detail = match (block.level, &block.language, block.checked) {
            (Some(level), _, _) => format!(" h{}", level),
            (_, Some(lang), _) => format!(" {}", lang),
            (_, _, Some(true)) => " [x]".to_string(),
            (_, _, Some(false)) => " [ ]".to_string(),
            _ => String::new(),
        };
        println!(
            "{:>8} {:>4}  {}{}  {}",
            block.id, block.start_line, block.kind, detail, first_line
        );
    }
    Ok(0)
}

fn do_share(args: ShareArgs, config: &Config, color: ColorChoice) -> Result<i32> {
    let session = load_session(
        &args.plan,
        args.annotations.as_deref(),
        config.review.author.as_deref(),
    )?;

    // Orphans still go into the payload; the reviewer should know about them.
    let mut files = SimpleFiles::new();
    let file_id = files.add(args.plan.display().to_string(), session.source().to_string());
    let warnings: Vec<Diagnostic<usize>> = session
        .diagnostics(file_id)
        .into_iter()
        .filter(|d| d.severity == Severity::Warning)
        .collect();
    emit_diagnostics(color, &files, &warnings);

    let fragment = session
        .share_fragment()
        .context("cannot encode share data")?;
    if args.fragment_only {
        println!("{}", fragment);
    } else {
        let base = args.base_url.as_deref().unwrap_or(&config.share.base_url);
        println!("{}", share::share_url(base, &fragment));
    }
    Ok(0)
}

fn do_open(args: OpenArgs, color: ColorChoice) -> Result<i32> {
    let Some(mut session) = ReviewSession::from_share(&args.input) else {
        eprintln!("error: no valid share data");
        return Ok(1);
    };

    let mut name = "shared plan".to_string();
    if let Some(path) = &args.plan {
        session = session.with_plan(read_plan(path)?);
        name = path.display().to_string();
    }

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(session.annotations().as_slice())?
        );
    } else {
        let mut files = SimpleFiles::new();
        let file_id = files.add(name, session.source().to_string());
        emit_diagnostics(color, &files, &session.diagnostics(file_id));

        let orphans = session.orphans().count();
        eprintln!(
            "{} annotation(s), {} not found in the plan",
            session.annotations().len(),
            orphans
        );
        for path in session.global_attachments() {
            eprintln!("attachment: {}", path);
        }
    }
    Ok(0)
}

fn do_decide(args: DecideArgs, config: &Config) -> Result<i32> {
    let session = load_session(
        &args.plan,
        args.annotations.as_deref(),
        config.review.author.as_deref(),
    )?;

    let decision = decision::decide(
        args.verdict.approve,
        session.annotations().as_slice(),
        session.global_attachments(),
    );
    let output = decision::HookOutput::from(decision);
    let json = if args.pretty {
        output.to_json_pretty()?
    } else {
        output.to_json()?
    };
    println!("{}", json);
    Ok(0)
}

fn emit_diagnostics(
    color: ColorChoice,
    files: &SimpleFiles<String, String>,
    diagnostics: &[Diagnostic<usize>],
) {
    let writer = StandardStream::stderr(color);
    let config = term::Config::default();
    for diagnostic in diagnostics {
        let _ = term::emit_to_write_style(&mut writer.lock(), &config, files, diagnostic);
    }
}
