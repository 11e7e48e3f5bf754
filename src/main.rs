use clap::Parser;
use colored::Colorize;
use miette::{IntoDiagnostic, Result, WrapErr};
use std::path::PathBuf;
use tracing::info;

use manifest_merger::config::{LibraryConfig, MergeConfig};
use manifest_merger::report::{ReportFormat, Reporter};
use manifest_merger::MergeType;

/// manifest-merger - Merge Android manifests with their overlays and libraries
#[derive(Parser, Debug)]
#[command(name = "manifest-merger")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Main AndroidManifest.xml
    #[arg(long, value_name = "FILE")]
    main: Option<PathBuf>,

    /// Flavor or build type manifest, highest priority first (repeatable)
    #[arg(long, value_name = "FILE")]
    overlay: Vec<PathBuf>,

    /// Library manifest as [NAME=]FILE, highest priority first (repeatable)
    #[arg(long = "lib", value_name = "[NAME=]FILE")]
    libs: Vec<String>,

    /// Kind of manifest being produced
    #[arg(long, value_enum)]
    merge_type: Option<CliMergeType>,

    /// Placeholder value as KEY=VALUE (repeatable)
    #[arg(long, value_name = "KEY=VALUE")]
    placeholder: Vec<String>,

    /// Force the manifest package
    #[arg(long)]
    package: Option<String>,

    /// Force android:versionCode
    #[arg(long)]
    version_code: Option<String>,

    /// Force android:versionName
    #[arg(long)]
    version_name: Option<String>,

    /// Force uses-sdk android:minSdkVersion
    #[arg(long)]
    min_sdk: Option<String>,

    /// Force uses-sdk android:targetSdkVersion
    #[arg(long)]
    target_sdk: Option<String>,

    /// Force uses-sdk android:maxSdkVersion
    #[arg(long)]
    max_sdk: Option<String>,

    /// Write the merged manifest here instead of stdout
    #[arg(long, value_name = "FILE")]
    out: Option<PathBuf>,

    /// Report format
    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,

    /// Report file (for json format)
    #[arg(long, value_name = "FILE")]
    report_output: Option<PathBuf>,

    /// Write the blame log to this file
    #[arg(long, value_name = "FILE")]
    blame: Option<PathBuf>,

    /// Keep a snapshot of the document after each merge step
    #[arg(long)]
    keep_stages: bool,

    /// Print file names instead of full paths
    #[arg(long)]
    simple_filenames: bool,

    /// Leave ${...} placeholders untouched
    #[arg(long)]
    no_placeholders: bool,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode - only output results
    #[arg(short, long)]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum CliMergeType {
    Application,
    Library,
}

impl From<CliMergeType> for MergeType {
    fn from(merge_type: CliMergeType) -> Self {
        match merge_type {
            CliMergeType::Application => MergeType::Application,
            CliMergeType::Library => MergeType::Library,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, Default)]
enum OutputFormat {
    #[default]
    Terminal,
    Json,
}

impl From<OutputFormat> for ReportFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Terminal => ReportFormat::Terminal,
            OutputFormat::Json => ReportFormat::Json,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.quiet);

    info!("manifest-merger v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&cli)?;
    let failed = run_merge(&config, &cli)?;

    if failed {
        std::process::exit(1);
    }
    Ok(())
}

fn init_logging(verbose: bool, quiet: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<MergeConfig> {
    let mut config = if let Some(config_path) = &cli.config {
        MergeConfig::from_file(config_path)?
    } else {
        let cwd = std::env::current_dir().into_diagnostic()?;
        MergeConfig::from_default_locations(&cwd)?
    };

    // Override with CLI arguments
    if let Some(main) = &cli.main {
        config.main = Some(main.clone());
    }
    if !cli.overlay.is_empty() {
        config.overlays = cli.overlay.clone();
    }
    if !cli.libs.is_empty() {
        config.libraries = cli.libs.iter().map(|l| parse_library(l)).collect();
    }
    if let Some(merge_type) = cli.merge_type {
        config.merge_type = merge_type.into();
    }
    for entry in &cli.placeholder {
        let (key, value) = entry
            .split_once('=')
            .ok_or_else(|| miette::miette!("Invalid placeholder '{}', expected KEY=VALUE", entry))?;
        config.placeholders.insert(key.to_string(), value.to_string());
    }

    let properties = &mut config.properties;
    let overrides = [
        (&mut properties.package, &cli.package),
        (&mut properties.version_code, &cli.version_code),
        (&mut properties.version_name, &cli.version_name),
        (&mut properties.min_sdk_version, &cli.min_sdk),
        (&mut properties.target_sdk_version, &cli.target_sdk),
        (&mut properties.max_sdk_version, &cli.max_sdk),
    ];
    for (slot, value) in overrides {
        if value.is_some() {
            *slot = value.clone();
        }
    }

    config.features.keep_intermediary_stages |= cli.keep_stages;
    config.features.print_simple_filenames |= cli.simple_filenames;
    config.features.no_placeholder_replacement |= cli.no_placeholders;

    if let Some(format) = cli.format {
        config.report.format = format.into();
    }
    if cli.report_output.is_some() {
        config.report.output = cli.report_output.clone();
    }
    if cli.blame.is_some() {
        config.report.blame = cli.blame.clone();
    }

    Ok(config)
}

/// `NAME=FILE`, or a bare `FILE` named after itself
fn parse_library(value: &str) -> LibraryConfig {
    match value.split_once('=') {
        Some((name, path)) if !name.is_empty() => LibraryConfig {
            name: name.to_string(),
            path: PathBuf::from(path),
        },
        _ => LibraryConfig {
            name: value.to_string(),
            path: PathBuf::from(value),
        },
    }
}

/// Run the merge and write its outputs. Returns true when the merge failed.
fn run_merge(config: &MergeConfig, cli: &Cli) -> Result<bool> {
    let invoker = config.to_invoker()?;
    let report = invoker.merge().into_diagnostic().wrap_err("Manifest merge failed")?;

    // Without --out, stdout is reserved for the merged manifest
    let manifest_on_stdout = cli.out.is_none() && config.report.format == ReportFormat::Terminal;

    if let Some(xml) = report.merged_xml() {
        match &cli.out {
            Some(out) => {
                std::fs::write(out, &xml)
                    .into_diagnostic()
                    .wrap_err_with(|| format!("Failed to write {}", out.display()))?;
                if !cli.quiet {
                    println!("{} {}", "Merged manifest written to".green(), out.display());
                }
            }
            None if manifest_on_stdout => print!("{}", xml),
            None => {}
        }
    }

    if let Some(blame) = &config.report.blame {
        std::fs::write(blame, report.blame())
            .into_diagnostic()
            .wrap_err_with(|| format!("Failed to write {}", blame.display()))?;
    }

    let stages = report.intermediary_stages();
    for (index, stage) in stages.iter().enumerate() {
        info!("Merge stage {}:\n{}", index + 1, stage);
    }

    if !cli.quiet || report.has_errors() {
        Reporter::new(config.report.format, config.report.output.clone())
            .with_info(cli.verbose)
            .to_stderr(manifest_on_stdout)
            .report(&report)?;
    }

    Ok(report.has_errors())
}
