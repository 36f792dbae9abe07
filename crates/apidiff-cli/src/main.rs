//! Command-line front end for `apidiff-core`.
//!
//! Compares two JSON or YAML documents, or two directories of paired
//! documents, under a rules document plus ad hoc ignore flags. Exit status is
//! 0 when nothing survives filtering, 1 when differences remain and 2 on
//! errors.

use std::collections::{BTreeMap, BTreeSet};
use std::ffi::OsStr;
use std::fmt::Write as _;
use std::fs;
use std::io::{self, Write};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use apidiff_core::{
    CaseSensitivity, CompareOptions, Comparer, ComparisonResult, IgnoreRule, Node, Preset, RuleSet,
    SemanticGroup, SmartRule,
};
use clap::{ArgAction, Parser, ValueEnum};
use rayon::prelude::*;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "apidiff",
    version,
    about = "Structural diff for API responses with path and smart ignore rules.",
    after_help = "Exit status: 0 when equal, 1 when differences survive filtering, 2 on errors."
)]
struct Cli {
    /// Left document, or a directory of documents.
    left: PathBuf,

    /// Right document, or a directory of documents.
    right: PathBuf,

    /// Rules document (JSON, or YAML for .yaml/.yml files).
    #[arg(long, value_name = "FILE")]
    rules: Option<PathBuf>,

    /// Ignore a path and everything below it.
    #[arg(long = "ignore", value_name = "PATH")]
    ignore: Vec<String>,

    /// Compare the collection at PATH without regard to order.
    #[arg(long = "ignore-order", value_name = "PATH")]
    ignore_order: Vec<String>,

    /// Compare every collection without regard to order.
    #[arg(long, action = ArgAction::SetTrue)]
    ignore_collection_order: bool,

    /// Drop differences on fields with this leaf name.
    #[arg(long = "ignore-name", value_name = "NAME")]
    ignore_name: Vec<String>,

    /// Drop differences on fields whose leaf name matches this glob.
    #[arg(long = "ignore-name-pattern", value_name = "GLOB")]
    ignore_name_pattern: Vec<String>,

    /// Drop differences involving values of this type.
    #[arg(long = "ignore-type", value_name = "TYPE")]
    ignore_type: Vec<String>,

    /// Add a bundle of smart rules: identifiers, timestamps,
    /// identifiers-and-timestamps or collection-order.
    #[arg(long = "preset", value_name = "NAME")]
    preset: Vec<Preset>,

    /// Compare strings without regard to case.
    #[arg(long, action = ArgAction::SetTrue)]
    case_insensitive: bool,

    /// Report collections that match only after reordering.
    #[arg(long, action = ArgAction::SetTrue)]
    report_order_changes: bool,

    /// Stop after N raw differences per comparison.
    #[arg(long, value_name = "N")]
    max_differences: Option<usize>,

    /// Read documents as YAML regardless of extension.
    #[arg(long, action = ArgAction::SetTrue)]
    yaml: bool,

    /// Output format.
    #[arg(short = 'f', long, value_enum, default_value_t)]
    format: OutputFormat,

    /// Write output to FILE instead of STDOUT.
    #[arg(short = 'o', long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Worker threads for directory comparisons.
    #[arg(short = 'j', long, value_name = "N")]
    jobs: Option<NonZeroUsize>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short = 'v', long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match run(&cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            let _ = writeln!(io::stderr(), "error: {err:#}");
            std::process::exit(2);
        }
    }
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn run(cli: &Cli) -> Result<i32> {
    let comparer = Comparer::new(build_rules(cli)?, build_options(cli)?);
    tracing::info!(
        fingerprint = ?comparer.fingerprint().map(|fp| fp.to_string()),
        "rules loaded"
    );

    let directory_mode = match (cli.left.is_dir(), cli.right.is_dir()) {
        (true, true) => true,
        (false, false) => false,
        _ => bail!("cannot compare a directory with a file"),
    };
    let reports = if directory_mode {
        compare_directories(&comparer, cli)?
    } else {
        let name = cli.left.display().to_string();
        vec![compare_files(&comparer, name, &cli.left, &cli.right, cli.yaml)?]
    };

    let rendered = match cli.format {
        OutputFormat::Text => render_text(&reports, directory_mode),
        OutputFormat::Json => render_json(&reports, directory_mode)?,
    };
    write_output(cli.output.as_deref(), &rendered)?;

    let stats = serde_json::to_string(&comparer.stats().snapshot())
        .context("failed to serialize statistics")?;
    tracing::debug!(%stats, "comparison statistics");

    Ok(if reports.iter().all(Report::is_equal) { 0 } else { 1 })
}

fn build_rules(cli: &Cli) -> Result<RuleSet> {
    let mut rules = match &cli.rules {
        Some(path) => load_rules(path)?,
        None => RuleSet::new(),
    };
    for path in &cli.ignore {
        rules
            .add_ignore_rule(IgnoreRule::completely(path.as_str()))
            .with_context(|| format!("invalid --ignore pattern {path:?}"))?;
    }
    for path in &cli.ignore_order {
        rules
            .add_ignore_rule(IgnoreRule::collection_order(path.as_str()))
            .with_context(|| format!("invalid --ignore-order pattern {path:?}"))?;
    }
    if cli.ignore_collection_order {
        rules.set_global_ignore_collection_order(true);
    }

    let smart = cli
        .ignore_name
        .iter()
        .map(|name| SmartRule::by_exact_name(name.as_str()))
        .chain(cli.ignore_name_pattern.iter().map(|glob| SmartRule::by_name_pattern(glob.as_str())))
        .chain(cli.ignore_type.iter().map(|name| SmartRule::by_declared_type(name.as_str())));
    for rule in smart {
        let label = format!("{} {:?}", rule.kind(), rule.value());
        rules.add_smart_rule(rule).with_context(|| format!("invalid smart rule {label}"))?;
    }
    for preset in &cli.preset {
        rules.apply_preset(*preset).with_context(|| format!("failed to apply preset {preset}"))?;
    }
    Ok(rules)
}

fn load_rules(path: &Path) -> Result<RuleSet> {
    let text = read_text(path)?;
    let rules = if is_yaml(path) {
        RuleSet::from_yaml_str(&text)
    } else {
        RuleSet::from_json_str(&text)
    };
    rules.with_context(|| format!("invalid rules document {}", path.display()))
}

fn build_options(cli: &Cli) -> Result<CompareOptions> {
    let mut options =
        CompareOptions::default().with_report_order_changes(cli.report_order_changes)?;
    if cli.case_insensitive {
        options = options.with_case_sensitivity(CaseSensitivity::Insensitive)?;
    }
    options.with_max_differences(cli.max_differences).context("invalid --max-differences")
}

#[derive(Clone, Copy, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
enum Side {
    Left,
    Right,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
enum Report {
    Compared {
        name: String,
        result: ComparisonResult,
        groups: Vec<SemanticGroup>,
    },
    Unpaired {
        name: String,
        side: Side,
    },
}

impl Report {
    fn is_equal(&self) -> bool {
        match self {
            Self::Compared { result, .. } => result.are_equal(),
            Self::Unpaired { .. } => false,
        }
    }
}

fn compare_files(
    comparer: &Comparer,
    name: String,
    left: &Path,
    right: &Path,
    yaml: bool,
) -> Result<Report> {
    let left = read_document(left, yaml)?;
    let right = read_document(right, yaml)?;
    let result = comparer.compare(&left, &right);
    let groups = comparer.group(result.differences());
    Ok(Report::Compared { name, result, groups })
}

fn compare_directories(comparer: &Comparer, cli: &Cli) -> Result<Vec<Report>> {
    let left = documents(&cli.left)?;
    let right = documents(&cli.right)?;
    let names: BTreeSet<&String> = left.keys().chain(right.keys()).collect();
    let names: Vec<&String> = names.into_iter().collect();

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(cli.jobs.map_or(0, NonZeroUsize::get))
        .build()
        .context("failed to start worker pool")?;
    tracing::info!(
        pairs = names.len(),
        threads = pool.current_num_threads(),
        "comparing directories"
    );

    let reports: Vec<Result<Report>> = pool.install(|| {
        names
            .par_iter()
            .map(|name| match (left.get(*name), right.get(*name)) {
                (Some(l), Some(r)) => compare_files(comparer, (*name).clone(), l, r, cli.yaml),
                (Some(_), None) => Ok(Report::Unpaired { name: (*name).clone(), side: Side::Left }),
                (None, _) => Ok(Report::Unpaired { name: (*name).clone(), side: Side::Right }),
            })
            .collect()
    });
    reports.into_iter().collect()
}

fn documents(dir: &Path) -> Result<BTreeMap<String, PathBuf>> {
    let mut found = BTreeMap::new();
    let entries = fs::read_dir(dir).with_context(|| format!("failed to list {}", dir.display()))?;
    for entry in entries {
        let path = entry.with_context(|| format!("failed to list {}", dir.display()))?.path();
        if !path.is_file() || !is_document(&path) {
            continue;
        }
        if let Some(name) = path.file_name().and_then(OsStr::to_str) {
            found.insert(name.to_owned(), path);
        }
    }
    Ok(found)
}

fn extension(path: &Path) -> Option<String> {
    path.extension().and_then(OsStr::to_str).map(str::to_ascii_lowercase)
}

fn is_yaml(path: &Path) -> bool {
    matches!(extension(path).as_deref(), Some("yaml" | "yml"))
}

fn is_document(path: &Path) -> bool {
    is_yaml(path) || extension(path).as_deref() == Some("json")
}

fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn read_document(path: &Path, yaml: bool) -> Result<Node> {
    let text = read_text(path)?;
    let node = if yaml || is_yaml(path) {
        Node::from_yaml_str(&text)
    } else {
        Node::from_json_str(&text)
    };
    node.with_context(|| format!("failed to parse {}", path.display()))
}

fn render_text(reports: &[Report], directory_mode: bool) -> String {
    let mut out = String::new();
    for report in reports {
        match report {
            Report::Unpaired { name, side } => {
                let side = match side {
                    Side::Left => "left",
                    Side::Right => "right",
                };
                let _ = writeln!(out, "{name}: only in {side}");
            }
            Report::Compared { name, result, groups } => {
                if directory_mode {
                    let _ = match result.differences().len() {
                        0 => writeln!(out, "{name}: no differences"),
                        1 => writeln!(out, "{name}: 1 difference"),
                        n => writeln!(out, "{name}: {n} differences"),
                    };
                }
                for group in groups {
                    let _ = writeln!(
                        out,
                        "{} ({}, confidence {:.2})",
                        group.name(),
                        group.differences().len(),
                        group.confidence()
                    );
                    for difference in group.differences() {
                        let _ = writeln!(out, "  {difference}");
                    }
                }
                if result.is_truncated() {
                    let _ = writeln!(
                        out,
                        "  stopped after {} raw differences",
                        result.raw_difference_count()
                    );
                }
            }
        }
    }
    out
}

fn render_json(reports: &[Report], directory_mode: bool) -> Result<String> {
    let mut rendered = match (directory_mode, reports) {
        (false, [single]) => serde_json::to_string_pretty(single),
        _ => serde_json::to_string_pretty(reports),
    }
    .context("failed to serialize report")?;
    rendered.push('\n');
    Ok(rendered)
}

fn write_output(path: Option<&Path>, rendered: &str) -> Result<()> {
    match path {
        Some(path) => fs::write(path, rendered.as_bytes())
            .with_context(|| format!("failed to write output to {}", path.display())),
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(rendered.as_bytes()).context("failed to write to stdout")?;
            stdout.flush().context("failed to write to stdout")
        }
    }
}
