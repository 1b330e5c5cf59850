//! gfwx-regress: differential regression harness for GFWX codec builds.
//!
//! Runs every image of a corpus through the codec under test, the
//! reference encoder and the pixel comparator, for every configuration of
//! a test matrix. Failing inputs are copied to a quarantine directory.
//!
//! # Usage
//!
//! ```text
//! gfwx-regress [OPTIONS] <CORPUS>
//! ```
//!
//! Exit status: 0 when every case passed, 1 when any case failed, 2 when
//! the run could not be carried out.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{ArgAction, Parser, ValueEnum};
use gfwx_regress_io::{OutputMode, ProcessInvoker, Session, Toolchain};
use gfwx_regress_pipeline::{
    ArtifactLayout, Configuration, IntentPolicy, PipelineMode, Quality, Reporter, TestMatrix, Tool,
};

/// Exit status when the run itself failed.
const EXIT_FATAL: u8 = 2;

/// Differential regression harness for GFWX codec builds.
///
/// Without any codec option, runs the built-in matrix (one lossless and two
/// lossy configurations). Passing --quality, --filter, --encoder or
/// --downsampling runs that single configuration instead.
#[derive(Parser)]
#[command(name = "gfwx-regress", version)]
struct Cli {
    /// Root directory of the PNG corpus.
    corpus: PathBuf,

    /// Quality, 1 (smallest) to 1024 (lossless).
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..=1024))]
    quality: Option<u16>,

    /// Wavelet filter.
    #[arg(long, value_enum)]
    filter: Option<Filter>,

    /// Entropy encoder.
    #[arg(long, value_enum)]
    encoder: Option<Encoder>,

    /// Downsampling level passed to the decompressor.
    #[arg(long)]
    downsampling: Option<u8>,

    /// Load the test matrix from a JSON file instead.
    ///
    /// The file holds an array of objects with a `name` and optional
    /// `quality`, `filter`, `encoder` and `downsampling`.
    #[arg(long, conflicts_with_all = ["quality", "filter", "encoder", "downsampling"])]
    matrix_json: Option<PathBuf>,

    /// Directory holding compress, decompress, compare,
    /// reference_test_app and test_app.
    #[arg(long, default_value = ".")]
    tools_dir: PathBuf,

    /// Codec compressor executable.
    #[arg(long)]
    compressor: Option<PathBuf>,

    /// Codec decompressor executable.
    #[arg(long)]
    decompressor: Option<PathBuf>,

    /// Image comparator executable.
    #[arg(long)]
    comparator: Option<PathBuf>,

    /// Reference encoder executable.
    #[arg(long)]
    reference: Option<PathBuf>,

    /// Combined compress/decompress test executable.
    #[arg(long)]
    combined_tool: Option<PathBuf>,

    /// Run the combined test tool instead of separate compress and
    /// decompress steps.
    #[arg(long)]
    combined: bool,

    /// When to pass `--intent bgr` to the compressor.
    #[arg(long, value_enum, default_value_t = Intent::Always)]
    intent: Intent,

    /// Root of all generated artifacts.
    #[arg(long, default_value = ArtifactLayout::DEFAULT_OUTPUT_DIR)]
    output_dir: PathBuf,

    /// Where failing inputs are copied.
    #[arg(long, default_value = ArtifactLayout::DEFAULT_QUARANTINE_DIR)]
    quarantine_dir: PathBuf,

    /// Number of cases run at once (default: available parallelism).
    #[arg(long)]
    jobs: Option<NonZeroUsize>,

    /// Per-tool time limit in seconds; 0 waits forever.
    #[arg(long, default_value_t = ProcessInvoker::DEFAULT_TIMEOUT.as_secs())]
    timeout: u64,

    /// Print the report as JSON.
    #[arg(long)]
    json: bool,

    /// Forward tool output to stderr instead of discarding it.
    #[arg(long)]
    show_tool_output: bool,

    /// More log output (-v info, -vv debug). `RUST_LOG` takes precedence.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

/// Wavelet filter selection.
#[derive(Clone, Copy, ValueEnum)]
enum Filter {
    Linear,
    Cubic,
}

/// Entropy encoder selection.
#[derive(Clone, Copy, ValueEnum)]
enum Encoder {
    Turbo,
    Fast,
    Contextual,
}

/// Intent flag policy.
#[derive(Clone, Copy, ValueEnum)]
enum Intent {
    /// On every compression.
    Always,
    /// Only for lossy configurations.
    LossyOnly,
    /// Never.
    Never,
}

const fn filter_to_pipeline(f: Filter) -> gfwx_regress_pipeline::Filter {
    match f {
        Filter::Linear => gfwx_regress_pipeline::Filter::Linear,
        Filter::Cubic => gfwx_regress_pipeline::Filter::Cubic,
    }
}

const fn encoder_to_pipeline(e: Encoder) -> gfwx_regress_pipeline::Encoder {
    match e {
        Encoder::Turbo => gfwx_regress_pipeline::Encoder::Turbo,
        Encoder::Fast => gfwx_regress_pipeline::Encoder::Fast,
        Encoder::Contextual => gfwx_regress_pipeline::Encoder::Contextual,
    }
}

/// Build the [`TestMatrix`] from CLI arguments.
///
/// `--matrix-json` wins; otherwise any codec flag selects a single
/// configuration (unset flags take their defaults); otherwise the built-in
/// matrix is used.
fn matrix_from_cli(cli: &Cli) -> Result<TestMatrix, String> {
    if let Some(ref path) = cli.matrix_json {
        let json = std::fs::read_to_string(path)
            .map_err(|e| format!("Error reading {}: {e}", path.display()))?;
        return serde_json::from_str(&json)
            .map_err(|e| format!("Error parsing {}: {e}", path.display()));
    }

    if cli.quality.is_none()
        && cli.filter.is_none()
        && cli.encoder.is_none()
        && cli.downsampling.is_none()
    {
        return Ok(TestMatrix::default());
    }

    let quality = match cli.quality {
        Some(q) => Quality::new(q).map_err(|e| e.to_string())?,
        None => Quality::default(),
    };
    let filter = cli
        .filter
        .map_or_else(gfwx_regress_pipeline::Filter::default, filter_to_pipeline);
    let encoder = cli
        .encoder
        .map_or_else(gfwx_regress_pipeline::Encoder::default, encoder_to_pipeline);
    let downsampling = cli.downsampling.unwrap_or(0);
    let kind = if quality.is_lossless() { "lossless" } else { "lossy" };
    let name = format!("{kind}_{filter}_{encoder}_q{quality}_d{downsampling}");
    Configuration::try_new(name, quality, filter, encoder, downsampling)
        .map(TestMatrix::single)
        .map_err(|e| e.to_string())
}

fn toolchain_from_cli(cli: &Cli) -> Toolchain {
    let overrides = [
        (Tool::Compressor, &cli.compressor),
        (Tool::Decompressor, &cli.decompressor),
        (Tool::Comparator, &cli.comparator),
        (Tool::Reference, &cli.reference),
        (Tool::Combined, &cli.combined_tool),
    ];
    let intent = match cli.intent {
        Intent::Always => IntentPolicy::Always,
        Intent::LossyOnly => IntentPolicy::LossyOnly,
        Intent::Never => IntentPolicy::Never,
    };
    overrides.into_iter().fold(
        Toolchain::in_dir(&cli.tools_dir).with_intent(intent),
        |tools, (tool, program)| match program {
            Some(program) => tools.with_program(tool, program),
            None => tools,
        },
    )
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        _ => log::LevelFilter::Debug,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp_millis()
        .init();
}

fn print_report(reporter: &Reporter, json: bool) -> Result<(), String> {
    if json {
        let json = serde_json::to_string_pretty(&reporter.summary())
            .map_err(|e| format!("Error serializing report: {e}"))?;
        println!("{json}");
    } else {
        print!("{}", reporter.render_text());
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let matrix = match matrix_from_cli(&cli) {
        Ok(m) => m,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::from(EXIT_FATAL);
        }
    };

    let invoker = ProcessInvoker::new()
        .with_timeout((cli.timeout > 0).then(|| Duration::from_secs(cli.timeout)))
        .with_output(if cli.show_tool_output {
            OutputMode::Forward
        } else {
            OutputMode::Discard
        });
    let mode = if cli.combined {
        PipelineMode::Combined
    } else {
        PipelineMode::Separate
    };
    let session = Session::new(&cli.corpus, matrix)
        .with_layout(ArtifactLayout::new(&cli.output_dir, &cli.quarantine_dir))
        .with_toolchain(toolchain_from_cli(&cli))
        .with_invoker(invoker)
        .with_mode(mode)
        .with_jobs(cli.jobs);

    let reporter = match session.run() {
        Ok(reporter) => reporter,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::from(EXIT_FATAL);
        }
    };

    if let Err(msg) = print_report(&reporter, cli.json) {
        eprintln!("{msg}");
        return ExitCode::from(EXIT_FATAL);
    }
    ExitCode::from(reporter.exit_status())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("gfwx-regress").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn no_codec_flags_runs_builtin_matrix() {
        let matrix = matrix_from_cli(&parse(&["corpus"])).unwrap();
        assert_eq!(matrix, TestMatrix::default());
        assert_eq!(matrix.len(), 3);
    }

    #[test]
    fn codec_flags_select_single_configuration() {
        let matrix =
            matrix_from_cli(&parse(&["corpus", "--quality", "64", "--filter", "cubic"])).unwrap();
        let [config] = matrix.configurations() else {
            unreachable!("single-config mode yields one configuration");
        };
        assert_eq!(config.quality().get(), 64);
        assert_eq!(config.filter(), gfwx_regress_pipeline::Filter::Cubic);
        assert_eq!(config.encoder(), gfwx_regress_pipeline::Encoder::Contextual);
        assert_eq!(config.name(), "lossy_cubic_contextual_q64_d0");
    }

    #[test]
    fn out_of_range_quality_is_rejected() {
        let args = ["gfwx-regress", "corpus", "--quality", "0"];
        assert!(Cli::try_parse_from(args).is_err());
        let args = ["gfwx-regress", "corpus", "--quality", "1025"];
        assert!(Cli::try_parse_from(args).is_err());
    }

    #[test]
    fn tool_overrides_replace_defaults() {
        let cli = parse(&[
            "corpus",
            "--tools-dir",
            "/opt/gfwx",
            "--reference",
            "/usr/bin/gfwx-ref",
            "--intent",
            "lossy-only",
        ]);
        let tools = toolchain_from_cli(&cli);
        assert_eq!(
            tools.program(Tool::Reference),
            std::path::Path::new("/usr/bin/gfwx-ref")
        );
        assert_eq!(
            tools.program(Tool::Compressor),
            std::path::Path::new("/opt/gfwx/compress")
        );
        assert_eq!(tools.intent(), IntentPolicy::LossyOnly);
    }

    #[test]
    fn matrix_json_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("matrix.json");
        std::fs::write(
            &path,
            r#"[{"name": "only", "quality": 512, "encoder": "fast"}]"#,
        )
        .unwrap();
        let cli = parse(&["corpus", "--matrix-json", path.to_str().unwrap()]);
        let matrix = matrix_from_cli(&cli).unwrap();
        assert_eq!(matrix.configurations()[0].name(), "only");
    }
}
