use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use vatio::{
    aggregate,
    attribution::{AnalysisWindow, FunctionRegistry},
    batch,
    cli::{
        AttributeArgs, AvgPowerArgs, BatchArgs, Cli, Command, CompareArgs, ComparePowerArgs,
        MergeArgs, OutputArgs, PowerMatrixArgs, WindowArgs,
    },
    comparison,
    config::AnalysisConfig,
    csv_output::{self, FunctionCsvOutput},
    estimator::{self, RegistryReport},
    filter::FunctionFilter,
    json_output::JsonOutput,
    power::EnvironmentLog,
    store, summary,
    time_unit::TimeUnit,
};

/// Initialize tracing subscriber for debug output
fn init_tracing(debug: bool) {
    if debug {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into()),
            )
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .with_writer(std::io::stderr)
            .init();
    }
}

fn load_config(path: Option<&Path>) -> Result<AnalysisConfig> {
    match path {
        Some(path) => AnalysisConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(AnalysisConfig::default()),
    }
}

fn parse_filter(expr: Option<&str>) -> Result<FunctionFilter> {
    match expr {
        Some(expr) => FunctionFilter::from_expr(expr).context("invalid --filter expression"),
        None => Ok(FunctionFilter::all()),
    }
}

fn window_from(args: WindowArgs) -> AnalysisWindow {
    AnalysisWindow {
        begin: args.begin_ms.map(|ms| TimeUnit::from_millis(ms as i128)),
        end: args.end_ms.map(|ms| TimeUnit::from_millis(ms as i128)),
    }
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    std::fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}

/// Store, export and summarize one registry
///
/// The stored registry is always complete; `--filter` restricts the CSV,
/// JSON and summary views.
fn emit_registry(
    registry: &FunctionRegistry,
    config: &AnalysisConfig,
    output: &OutputArgs,
) -> Result<()> {
    if let Some(out) = &output.out {
        store::save_registry(out, registry)
            .with_context(|| format!("failed to store registry {}", out.display()))?;
    }

    let report = estimator::estimate_registry(registry, &config.estimation)?;
    let filter = parse_filter(output.filter.as_deref())?;

    if let Some(csv) = &output.csv {
        let rows = FunctionCsvOutput::new(&report).retain(|f| filter.matches(&f.names));
        write_file(csv, &rows.to_csv())?;
    }

    summary::print_summary(&report, &filter, output.top);

    if let Some(json) = &output.json {
        write_file(json, &JsonOutput::from_report(filtered(report, &filter)).to_json()?)?;
    }
    Ok(())
}

fn filtered(mut report: RegistryReport, filter: &FunctionFilter) -> RegistryReport {
    report.functions.retain(|f| filter.matches(&f.names));
    report
}

fn run_attribute(args: AttributeArgs, config: &AnalysisConfig) -> Result<()> {
    let registry = batch::analyze_trace(&args.trace, &args.power, config, window_from(args.window))
        .with_context(|| format!("failed to attribute {}", args.trace.display()))?;
    emit_registry(&registry, config, &args.output)
}

fn run_batch(args: BatchArgs, mut config: AnalysisConfig) -> Result<()> {
    if let Some(workers) = args.workers {
        config.batch.workers = workers;
    }

    let summary = batch::run_batch(&args.dir, &config, window_from(args.window))
        .with_context(|| format!("failed to scan {}", args.dir.display()))?;

    eprintln!(
        "Analysed {} traces ({} failed)",
        summary.registries.len() + summary.failed.len(),
        summary.failed.len()
    );
    for (trace, reason) in &summary.failed {
        eprintln!("  ✗ {}: {}", trace.display(), reason);
    }

    let merged = summary
        .merged
        .context("no trace in the directory could be analysed")?;
    emit_registry(&merged, &config, &args.output)
}

fn load_one(path: &Path) -> Result<FunctionRegistry> {
    store::load_registry(path)
        .with_context(|| format!("failed to load registry {}", path.display()))
}

fn load_all(paths: &[PathBuf]) -> Result<Vec<FunctionRegistry>> {
    paths.iter().map(|path| load_one(path)).collect()
}

fn run_merge(args: MergeArgs, config: &AnalysisConfig) -> Result<()> {
    if args.output.out.is_none() {
        anyhow::bail!("merge requires --out REG");
    }
    let registries = load_all(&args.registries)?;
    let merged =
        aggregate::merge_all(&registries).context("no registries given to merge")?;
    emit_registry(&merged, config, &args.output)
}

fn unmatched_path(csv: &Path) -> PathBuf {
    let stem = csv
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("comparison");
    csv.with_file_name(format!("{stem}.unmatched.csv"))
}

fn estimate_all(paths: &[PathBuf], config: &AnalysisConfig) -> Result<Vec<RegistryReport>> {
    load_all(paths)?
        .iter()
        .map(|r| estimator::estimate_registry(r, &config.estimation).map_err(anyhow::Error::from))
        .collect()
}

fn run_compare(args: CompareArgs, mut config: AnalysisConfig) -> Result<()> {
    if let Some(test) = args.test {
        config.comparison.test = test;
    }
    if let Some(match_by) = args.match_by {
        config.comparison.match_by = match_by;
    }
    if let Some(alpha) = args.alpha {
        config.comparison.significance_level = alpha;
    }
    config
        .comparison
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid comparison settings: {e}"))?;

    let filter = parse_filter(args.filter.as_deref())?;
    let baseline = estimate_all(&args.baseline, &config)?;
    let candidate = estimate_all(&args.candidate, &config)?;

    let report =
        comparison::compare_conditions(&baseline, &candidate, &filter, &config.comparison)?;
    println!("{}", report.to_report_string());

    if args.totals {
        match comparison::compare_trace_totals(&baseline, &candidate, &filter, &config.comparison)
        {
            Ok(test) => println!(
                "Whole-trace energy: baseline median {:.4}J, candidate median {:.4}J, p = {:.4}{}",
                test.baseline_median,
                test.candidate_median,
                test.pvalue,
                if test.is_significant(config.comparison.significance_level) {
                    " (significant)"
                } else {
                    ""
                }
            ),
            Err(e) => println!("Whole-trace energy: untestable ({e})"),
        }
    }

    if let Some(csv) = &args.csv {
        write_file(csv, &csv_output::comparison_csv(&report))?;
        write_file(&unmatched_path(csv), &csv_output::unmatched_csv(&report))?;
    }
    if let Some(json) = &args.json {
        write_file(json, &JsonOutput::from_comparison(report).to_json()?)?;
    }
    Ok(())
}

fn run_compare_power(args: ComparePowerArgs, mut config: AnalysisConfig) -> Result<()> {
    if let Some(alpha) = args.alpha {
        config.comparison.significance_level = alpha;
    }
    config
        .comparison
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid comparison settings: {e}"))?;

    let filter = parse_filter(args.filter.as_deref())?;
    let filter_duplicates = config.estimation.filter_duplicate_readings && !args.keep_duplicates;
    let report = comparison::compare_power(
        &load_one(&args.baseline)?,
        &load_one(&args.candidate)?,
        &filter,
        filter_duplicates,
        config.comparison.significance_level,
    );
    println!("{}", report.to_report_string());

    if let Some(csv) = &args.csv {
        write_file(csv, &csv_output::power_comparison_csv(&report))?;
    }
    if let Some(json) = &args.json {
        write_file(json, &JsonOutput::from_power_comparison(report).to_json()?)?;
    }
    Ok(())
}

fn run_power_matrix(args: PowerMatrixArgs, config: &AnalysisConfig) -> Result<()> {
    let traces = args
        .registries
        .iter()
        .map(|path| {
            let name = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            Ok((name, load_one(path)?))
        })
        .collect::<Result<Vec<_>>>()?;

    let filter_duplicates = config.estimation.filter_duplicate_readings && !args.keep_duplicates;
    let tsv = comparison::power_matrix(&traces, filter_duplicates).to_tsv(args.decimals);
    match &args.out {
        Some(out) => write_file(out, &tsv),
        None => {
            print!("{tsv}");
            Ok(())
        }
    }
}

fn run_avg_power(args: AvgPowerArgs, config: &AnalysisConfig) -> Result<()> {
    for path in &args.logs {
        let log = EnvironmentLog::from_file(path, config.power.current_divider)
            .with_context(|| format!("failed to parse power log {}", path.display()))?;
        let average = log
            .timeline()
            .time_weighted_average()
            .with_context(|| format!("no power readings in {}", path.display()))?;
        println!("{}\t{:.6} W", path.display(), average);
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Cli::parse();

    init_tracing(args.debug);

    let config = load_config(args.config.as_deref())?;

    match args.command {
        Command::Attribute(cmd) => run_attribute(cmd, &config),
        Command::Batch(cmd) => run_batch(cmd, config),
        Command::Merge(cmd) => run_merge(cmd, &config),
        Command::Compare(cmd) => run_compare(cmd, config),
        Command::ComparePower(cmd) => run_compare_power(cmd, config),
        Command::PowerMatrix(cmd) => run_power_matrix(cmd, &config),
        Command::AvgPower(cmd) => run_avg_power(cmd, &config),
    }
}
