//! devplan CLI - Development-Plan Goal Tracking & Analytics
//!
//! Command-line interface for ingesting plan workbooks, deriving compliance,
//! querying goals and quota, and synchronizing with a plan server.

mod config;
mod diagnostics;
mod report;

use std::io;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand, ValueEnum};
use devplan_core::{ComplianceState, Diagnostic, DiagnosticCode, DiagnosticEmitter, PlanHorizon};
use devplan_engine::{GoalFilter, PlanEngine, UnitFilter};
use devplan_parser::{parse_workbook_path, ParsedWorkbook};
use devplan_sync::{HttpPlanStore, Synchronizer};
use serde_json::json;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::Config;
use crate::diagnostics::{DiagnosticConfig, ExitCode, JsonEmitter, TerminalEmitter};

#[derive(Parser)]
#[command(name = "devplan")]
#[command(author, version, about = "Development-plan goal tracking and analytics", long_about = None)]
struct Cli {
    /// Verbose logging (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file (default: ./devplan.toml when present)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    format: OutputFormat,

    /// Escalate warnings to errors and hints to warnings
    #[arg(long, global = true)]
    strict: bool,

    /// Only show error diagnostics
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Evaluate as of this calendar year (default: config, then today)
    #[arg(long, value_name = "YEAR", global = true)]
    year: Option<i32>,

    /// First calendar year of the plan (overrides config)
    #[arg(long, value_name = "YEAR", global = true)]
    start_year: Option<i32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Read a workbook and report what was found
    Check {
        /// Plan workbook (xlsx, xls, xlsb, ods)
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Compute compliance and plan analytics
    Analyze {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Start from the local snapshot when it is fresh
        #[arg(long)]
        cached: bool,
    },

    /// List goals, optionally filtered
    Goals {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        #[command(flatten)]
        filter: FilterArgs,

        #[arg(long)]
        cached: bool,
    },

    /// Show the unreserved quota of a goal for a calendar year
    Quota {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Product-indicator code
        #[arg(value_name = "GOAL")]
        goal: String,

        /// Calendar year
        #[arg(value_name = "YEAR")]
        calendar_year: i32,

        /// Leave this activity's reservation out (when editing it)
        #[arg(long, value_name = "ACTIVITY")]
        excluding: Option<String>,

        #[arg(long)]
        cached: bool,
    },

    /// Pull assignments and activities from the plan server
    Sync {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Server base URL (overrides config)
        #[arg(long, env = "DEVPLAN_SERVER")]
        server: Option<String>,

        /// Plan instance identifier (overrides config)
        #[arg(long)]
        plan: Option<String>,

        /// Do not write the local snapshot
        #[arg(long)]
        no_cache: bool,
    },
}

#[derive(Args, Debug, Default)]
struct FilterArgs {
    /// Sector name or code
    #[arg(long)]
    sector: Option<String>,

    /// Strategic line name
    #[arg(long)]
    line: Option<String>,

    /// ODS code
    #[arg(long)]
    ods: Option<String>,

    /// Assigned organizational unit
    #[arg(long, conflicts_with = "unassigned")]
    unit: Option<String>,

    /// Only goals without an assigned unit
    #[arg(long)]
    unassigned: bool,

    /// Compliance state (CUMPLIDA, EN_PROGRESO, POR_CUMPLIR, PENDIENTE, SIN_DEFINIR)
    #[arg(long, value_parser = parse_state)]
    state: Option<ComplianceState>,

    /// Only goals programmed in this calendar year; --state then applies to it
    #[arg(long, value_name = "YEAR")]
    in_year: Option<i32>,

    /// Text in code, product or indicator name
    #[arg(long)]
    search: Option<String>,
}

impl FilterArgs {
    fn to_filter(&self, horizon: PlanHorizon) -> Result<GoalFilter> {
        let mut filter = GoalFilter::new();
        filter.sector = self.sector.clone();
        filter.line = self.line.clone();
        filter.ods = self.ods.clone();
        filter.state = self.state;
        filter.search = self.search.clone();
        if self.unassigned {
            filter.unit = Some(UnitFilter::Unassigned);
        } else if let Some(unit) = &self.unit {
            filter.unit = Some(UnitFilter::Unit(unit.clone()));
        }
        if let Some(calendar_year) = self.in_year {
            let Some(year) = horizon.plan_year(calendar_year) else {
                bail!(
                    "{} is outside the plan ({}-{})",
                    calendar_year,
                    horizon.start_year,
                    horizon.end_year()
                );
            };
            filter.year = Some(year);
        }
        Ok(filter)
    }
}

fn parse_state(value: &str) -> Result<ComplianceState, String> {
    ComplianceState::parse(value).ok_or_else(|| {
        let known: Vec<&str> = ComplianceState::ALL.iter().map(|s| s.as_str()).collect();
        format!("unknown state '{}', expected one of {}", value, known.join(", "))
    })
}

fn main() -> process::ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli) {
        Ok(code) => code.into(),
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::Failure.into()
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

// ============================================================================
// Commands
// ============================================================================

/// What a command produced, before it is written out
struct Outcome {
    diagnostics: Vec<Diagnostic>,
    text: String,
    json: serde_json::Value,
}

/// Settings resolved from flags and config
struct Session {
    config: Config,
    horizon: PlanHorizon,
    current_year: i32,
}

impl Session {
    fn resolve(cli: &Cli) -> Result<Self> {
        let mut config = Config::load(cli.config.as_deref())?;
        if let Some(start) = cli.start_year {
            config.plan.start_year = start;
        }
        let current_year = cli
            .year
            .or(config.plan.current_year)
            .unwrap_or_else(devplan_engine::compliance::current_calendar_year);
        Ok(Self {
            horizon: config.horizon(),
            config,
            current_year,
        })
    }

    fn parse(&self, file: &Path) -> Result<ParsedWorkbook> {
        tracing::info!(file = %file.display(), start_year = self.horizon.start_year, "reading workbook");
        parse_workbook_path(file, self.horizon)
            .with_context(|| format!("cannot read workbook {}", file.display()))
    }

    /// Engine from a fresh snapshot when asked for, otherwise from the workbook
    fn engine(&self, file: &Path, cached: bool) -> Result<(PlanEngine, Vec<Diagnostic>)> {
        let mut diagnostics = Vec::new();
        if cached {
            let load = self.config.snapshot_cache()?.load(Utc::now());
            diagnostics.extend(load.diagnostic());
            if let Some(snapshot) = load.into_snapshot() {
                tracing::info!(saved_at = %snapshot.saved_at, "using cached snapshot");
                return Ok((PlanEngine::new(snapshot.model, self.current_year), diagnostics));
            }
        }
        let parsed = self.parse(file)?;
        diagnostics.extend(without_summaries(parsed.diagnostics));
        Ok((PlanEngine::new(parsed.model, self.current_year), diagnostics))
    }
}

fn without_summaries(diagnostics: Vec<Diagnostic>) -> Vec<Diagnostic> {
    diagnostics
        .into_iter()
        .filter(|d| d.code != DiagnosticCode::I001SheetSummary)
        .collect()
}

fn run(cli: &Cli) -> Result<ExitCode> {
    let ctx = Session::resolve(cli)?;
    let outcome = match &cli.command {
        Commands::Check { file } => check(&ctx, file)?,
        Commands::Analyze { file, cached } => analyze(&ctx, file, *cached)?,
        Commands::Goals {
            file,
            filter,
            cached,
        } => goals(&ctx, file, filter, *cached)?,
        Commands::Quota {
            file,
            goal,
            calendar_year,
            excluding,
            cached,
        } => quota(&ctx, file, goal, *calendar_year, excluding.as_deref(), *cached)?,
        Commands::Sync {
            file,
            server,
            plan,
            no_cache,
        } => sync(&ctx, file, server.clone(), plan.clone(), *no_cache)?,
    };
    finish(cli, outcome)
}

fn check(ctx: &Session, file: &Path) -> Result<Outcome> {
    let parsed = ctx.parse(file)?;
    let model = &parsed.model;
    let sheets: serde_json::Map<String, serde_json::Value> = parsed
        .sheets
        .iter()
        .map(|(kind, name)| (kind.canonical_name().to_string(), json!(name)))
        .collect();
    let json = json!({
        "file": file.display().to_string(),
        "sheets": sheets,
        "records": {
            "strategic_lines": model.lines.len(),
            "result_indicators": model.indicators.len(),
            "product_goals": model.goals.len(),
            "sgr_initiatives": model.sgr_initiatives.len(),
            "sgr_product_goals": model.sgr_goals.len(),
        },
    });
    Ok(Outcome {
        text: report::workbook_summary(&parsed),
        json,
        diagnostics: parsed.diagnostics,
    })
}

fn analyze(ctx: &Session, file: &Path, cached: bool) -> Result<Outcome> {
    let (engine, diagnostics) = ctx.engine(file, cached)?;
    let snapshot = engine.snapshot();
    Ok(Outcome {
        text: report::analysis(snapshot, engine.model().horizon),
        json: json!({ "snapshot": snapshot }),
        diagnostics,
    })
}

fn goals(ctx: &Session, file: &Path, args: &FilterArgs, cached: bool) -> Result<Outcome> {
    let (engine, diagnostics) = ctx.engine(file, cached)?;
    let horizon = engine.model().horizon;
    let filter = args.to_filter(horizon)?;
    let matches = engine.recompute(&filter);

    let rows: Vec<serde_json::Value> = matches
        .iter()
        .map(|goal| {
            json!({
                "code": goal.code,
                "sector": goal.sector,
                "line": goal.line,
                "product": goal.product,
                "indicator": goal.indicator_name,
                "states": goal.states,
                "progress": goal.progress,
                "overall_state": goal.overall_state,
                "overall_progress": goal.overall_progress,
                "assigned_unit": goal.assigned_unit,
                "activities": goal.activities.len(),
            })
        })
        .collect();
    Ok(Outcome {
        text: report::goal_table(&matches, horizon),
        json: json!({ "count": matches.len(), "goals": rows }),
        diagnostics,
    })
}

fn quota(
    ctx: &Session,
    file: &Path,
    code: &str,
    calendar_year: i32,
    excluding: Option<&str>,
    cached: bool,
) -> Result<Outcome> {
    let (engine, diagnostics) = ctx.engine(file, cached)?;
    let Some(available) = engine.available_quota(code, calendar_year, excluding) else {
        bail!("goal '{}' is not in the plan", code);
    };
    let horizon = engine.model().horizon;
    let (programmed, reserved) = match (engine.model().goal(code), horizon.plan_year(calendar_year)) {
        (Some(goal), Some(year)) => (
            goal.programmed[year],
            goal.reserved_quota(calendar_year, excluding),
        ),
        _ => (0.0, 0.0),
    };

    Ok(Outcome {
        text: format!(
            "{} {}: programmed {}, reserved {}, available {}\n",
            code, calendar_year, programmed, reserved, available
        ),
        json: json!({
            "goal": code,
            "year": calendar_year,
            "programmed": programmed,
            "reserved": reserved,
            "available": available,
        }),
        diagnostics,
    })
}

fn sync(
    ctx: &Session,
    file: &Path,
    server: Option<String>,
    plan: Option<String>,
    no_cache: bool,
) -> Result<Outcome> {
    let mut config = ctx.config.clone();
    if server.is_some() {
        config.server.base_url = server;
    }
    if let Some(plan) = plan {
        config.server.plan_id = plan;
    }

    let parsed = ctx.parse(file)?;
    let mut diagnostics = without_summaries(parsed.diagnostics);
    let mut engine = PlanEngine::new(parsed.model, ctx.current_year);

    let store = HttpPlanStore::new(config.client()?).context("cannot create HTTP client")?;
    let mut synchronizer = Synchronizer::new(store).with_batch_size(config.server.batch_size);
    if !no_cache {
        synchronizer = synchronizer.with_cache(config.snapshot_cache()?);
    }

    let runtime = tokio::runtime::Runtime::new().context("cannot start async runtime")?;
    let summary = runtime
        .block_on(synchronizer.sync(&mut engine))
        .context("sync failed")?;

    let text = format!(
        "{}\n{}",
        report::sync_report(&summary),
        report::analysis(engine.snapshot(), engine.model().horizon)
    );
    let json = json!({
        "sync": {
            "assignments": summary.assignments,
            "activities": summary.activities,
            "failed_batches": summary.failed_batches,
            "cached": summary.cached,
        },
        "snapshot": engine.snapshot(),
    });
    diagnostics.extend(summary.diagnostics);
    Ok(Outcome {
        diagnostics,
        text,
        json,
    })
}

// ============================================================================
// Output
// ============================================================================

fn finish(cli: &Cli, outcome: Outcome) -> Result<ExitCode> {
    let policy = DiagnosticConfig {
        strict: cli.strict,
        quiet: cli.quiet,
    };
    match cli.format {
        OutputFormat::Text => {
            let mut emitter = TerminalEmitter::new(io::stderr().lock(), policy);
            for diagnostic in outcome.diagnostics {
                emitter.emit(diagnostic);
            }
            print!("{}", outcome.text);
            Ok(emitter.exit_code())
        }
        OutputFormat::Json => {
            let mut emitter = JsonEmitter::new(policy);
            for diagnostic in outcome.diagnostics {
                emitter.emit(diagnostic);
            }
            let mut document = outcome.json;
            if let serde_json::Value::Object(map) = &mut document {
                map.insert("diagnostics".to_string(), emitter.to_json_value());
            }
            println!("{}", serde_json::to_string_pretty(&document)?);
            Ok(emitter.exit_code())
        }
    }
}
