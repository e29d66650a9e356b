// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;

use ucc_reconciler::logging::init_logging;
use ucc_reconciler::{
    export_report, MemberCodePolicy, Pipeline, ReconcileConfig, RowErrorPolicy, RunSummary,
    TracingObserver,
};

#[derive(Parser)]
#[command(name = "ucc-reconciler")]
#[command(about = "Flag CDSL BOIDs whose NSE/BSE client codes are missing or not permitted to trade")]
#[command(version)]
struct Cli {
    /// Debug-level logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile the three input files and write the report
    Run {
        /// NSE UCC extract (pipe-delimited, CLIENT_CODE and EXCHANGE_STATUS columns)
        #[arg(long)]
        nse: PathBuf,
        /// BSE UCC list (one code per line)
        #[arg(long)]
        bse: PathBuf,
        /// CDSL ledger (comma-separated, 112+ columns)
        #[arg(long)]
        cdsl: PathBuf,
        /// TOML configuration file
        #[arg(long)]
        config: Option<PathBuf>,
        /// Directory for the report (default: system temp dir)
        #[arg(long)]
        output_dir: Option<PathBuf>,
        /// Fail on a malformed row instead of stopping there
        #[arg(long)]
        strict: bool,
        /// last-write-wins, first-write-wins or reject-conflict
        #[arg(long)]
        member_codes: Option<MemberCodePolicy>,
        /// Copy the finished report here
        #[arg(long)]
        save_to: Option<PathBuf>,
        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
        /// Open the report viewer when done
        #[arg(long)]
        view: bool,
    },
    /// Browse an existing report
    View {
        report: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Run {
            nse,
            bse,
            cdsl,
            config,
            output_dir,
            strict,
            member_codes,
            save_to,
            json,
            view,
        } => {
            let mut config = match config {
                Some(path) => ReconcileConfig::load(&path)?,
                None => ReconcileConfig::default(),
            };
            if output_dir.is_some() {
                config.output_dir = output_dir;
            }
            if strict {
                config.row_error_policy = RowErrorPolicy::Strict;
            }
            if let Some(policy) = member_codes {
                config.member_code_policy = policy;
            }

            let summary = run_pipeline(config, &nse, &bse, &cdsl)?;

            if let Some(dest) = save_to {
                export_report(&summary.output_path, &dest)
                    .with_context(|| format!("Failed to save report to {}", dest.display()))?;
                info!("Report saved to {}", dest.display());
            }

            print_summary(&summary, json)?;

            if view {
                run_view(&summary.output_path)?;
            }
        }
        Commands::View { report } => run_view(&report)?,
    }

    Ok(())
}

fn run_pipeline(config: ReconcileConfig, nse: &Path, bse: &Path, cdsl: &Path) -> Result<RunSummary> {
    let mut observer = TracingObserver;
    let summary = Pipeline::new(config, &mut observer)
        .process_files(nse, bse, cdsl)
        .context("Reconciliation failed")?;
    Ok(summary)
}

fn print_summary(summary: &RunSummary, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }

    println!("📊 Reconciliation complete");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✓ NSE UCCs permitted:   {}", summary.nse_uccs);
    println!("✓ BSE UCCs listed:      {}", summary.bse_uccs);
    println!("✓ Ledger rows read:     {}", summary.ledger_rows);
    if summary.short_rows > 0 {
        println!("  skipped (short rows): {}", summary.short_rows);
    }
    println!("  skipped (non-CM):     {}", summary.other_segment_rows);
    println!("✓ BOIDs reconciled:     {}", summary.boids);
    println!("⚠️  BOIDs flagged:        {}", summary.flagged);
    println!("\n📄 Report: {}", summary.output_path.display());
    Ok(())
}

#[cfg(feature = "tui")]
fn run_view(report: &Path) -> Result<()> {
    let records = ucc_reconciler::read_report(report)
        .with_context(|| format!("Failed to read report {}", report.display()))?;

    let mut app = ui::App::new(report.display().to_string(), records);
    ui::run_ui(&mut app)?;
    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_view(_report: &Path) -> Result<()> {
    eprintln!("❌ Viewer not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    std::process::exit(1);
}
