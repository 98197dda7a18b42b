use clap::{ArgAction, Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use perf_sweep::harness::{run_sweep, Profile, SweepConfig};
use perf_sweep::parser::{PayloadLocator, DEFAULT_SENTINEL};
use perf_sweep::plot::{self, PlotConfig, DEFAULT_HIGHLIGHT};
use perf_sweep::runner::ExternalBenchmark;
use perf_sweep::schema::{RunMeta, SweepReport, SCHEMA_VERSION};
use perf_sweep::{PayloadFormat, Result};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ProfileArg {
    Quick,
    Full,
}

impl From<ProfileArg> for Profile {
    fn from(v: ProfileArg) -> Self {
        match v {
            ProfileArg::Quick => Profile::Quick,
            ProfileArg::Full => Profile::Full,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "perf-sweep")]
#[command(about = "Run a timing executable over a range of sizes, average repeats, plot log-log")]
struct Args {
    /// Timing executable; invoked as `<exe> [--arg ...] <size> <data-file>`.
    #[arg(long, value_name = "PATH", env = "PERF_EXECUTABLE", default_value = "../performance")]
    executable: PathBuf,

    /// Extra argument placed before the size. Can be provided multiple times.
    #[arg(long = "arg", value_name = "ARG", allow_hyphen_values = true, action = ArgAction::Append)]
    leading_args: Vec<String>,

    /// Scratch file path handed through to the executable.
    #[arg(long, value_name = "PATH", env = "PERF_DATA_FILE", default_value = "test.dat")]
    data_file: PathBuf,

    /// quick: 3 repeats up to 1e6; full: 5 repeats up to 1e7.
    #[arg(long, value_enum, default_value_t = ProfileArg::Full)]
    profile: ProfileArg,

    /// Override the profile's repeat count.
    #[arg(long)]
    repeats: Option<u32>,

    /// Override the profile's test sizes (comma separated).
    #[arg(long, value_delimiter = ',', num_args = 1..)]
    sizes: Vec<u64>,

    /// Seed for the trial order shuffle.
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// How to find the JSON payload in the executable's stdout.
    #[arg(long, value_enum, default_value_t = PayloadFormat::Bracket)]
    format: PayloadFormat,

    /// Line prefix used with `--format sentinel`.
    #[arg(long, default_value = DEFAULT_SENTINEL)]
    sentinel: String,

    /// Measurement drawn as the thick reference line.
    #[arg(long, default_value = DEFAULT_HIGHLIGHT)]
    highlight: String,

    /// Also keep the SVG plot at this path. Without it the plot goes to a
    /// temporary file for the viewer (or `performance.svg` with `--no-open`).
    #[arg(long, value_name = "FILE")]
    plot: Option<PathBuf>,

    /// Skip rendering the plot.
    #[arg(long, default_value_t = false)]
    no_plot: bool,

    /// Render the plot without opening the system viewer.
    #[arg(long, default_value_t = false)]
    no_open: bool,

    /// Where to write the JSON report. If omitted, no report is written.
    #[arg(long, value_name = "FILE")]
    out: Option<PathBuf>,

    /// Hide the progress bar.
    #[arg(short, long, default_value_t = false)]
    quiet: bool,

    /// More log output (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn now_utc() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format!("unix:{secs}")
}

fn git_sha_short() -> Option<String> {
    // Set by CI or build scripts.
    std::env::var("GIT_SHA")
        .ok()
        .or_else(|| std::env::var("GITHUB_SHA").ok())
        .map(|s| s.chars().take(12).collect())
}

fn progress_bar(len: usize, quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let style = ProgressStyle::with_template(
        "[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} trials, {msg} (eta {eta})",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("=> ");
    let bar = ProgressBar::new(len as u64);
    bar.set_style(style);
    bar
}

fn run(args: &Args) -> Result<()> {
    let profile: Profile = args.profile.into();
    let mut sweep = SweepConfig::from_profile(profile, args.seed);
    if let Some(repeats) = args.repeats {
        sweep.repeats = repeats;
    }
    if !args.sizes.is_empty() {
        sweep.test_sizes = args.sizes.clone();
    }
    sweep.validate()?;

    let mut bench = ExternalBenchmark::new(args.executable.clone(), args.data_file.clone())
        .with_leading_args(args.leading_args.iter().cloned());
    let locator = PayloadLocator::new(args.format, args.sentinel.as_str());
    let plan = sweep.plan();

    info!(
        executable = %args.executable.display(),
        data_file = %args.data_file.display(),
        profile = sweep.profile_label(),
        repeats = sweep.repeats,
        sizes = ?sweep.test_sizes,
        seed = sweep.seed,
        "configured sweep"
    );

    let mut bar = progress_bar(plan.len(), args.quiet);
    let result = run_sweep(&mut bench, &plan, &locator, &mut bar);
    bar.finish_and_clear();
    let aggregated = result?;

    println!("{aggregated}");

    if let Some(out) = &args.out {
        let report = SweepReport::new(
            RunMeta {
                schema_version: SCHEMA_VERSION,
                bench_version: env!("CARGO_PKG_VERSION").to_string(),
                profile: sweep.profile_label().to_string(),
                seed: sweep.seed,
                timestamp_utc: now_utc(),
                git_sha: git_sha_short(),
                executable: args.executable.clone(),
                data_file: args.data_file.clone(),
                payload_format: args.format.to_string(),
                repeats: sweep.repeats,
                test_sizes: sweep.test_sizes.clone(),
            },
            aggregated.clone(),
        );
        let json = serde_json::to_string_pretty(&report)?;
        fs::write(out, json)?;
        info!(path = %out.display(), "report written");
    }

    if !args.no_plot {
        let open = !args.no_open;
        let cfg = PlotConfig {
            output: plot::resolve_output(args.plot.as_deref(), open)?,
            highlight: args.highlight.clone(),
            ..Default::default()
        };
        plot::render(&aggregated, &cfg)?;
        if open {
            plot::open_in_viewer(&cfg.output)?;
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_open_viewer_without_saving() {
        let args = Args::try_parse_from(["perf-sweep"]).unwrap();
        assert!(!args.no_open);
        assert!(!args.no_plot);
        assert!(args.plot.is_none());
    }

    #[test]
    fn test_headless_flags() {
        let args =
            Args::try_parse_from(["perf-sweep", "--no-open", "--plot", "out.svg"]).unwrap();
        assert!(args.no_open);
        assert_eq!(args.plot, Some(PathBuf::from("out.svg")));
    }

    #[test]
    fn test_overrides_parse() {
        let args = Args::try_parse_from([
            "perf-sweep",
            "--profile",
            "quick",
            "--sizes",
            "1,10,100",
            "--repeats",
            "3",
        ])
        .unwrap();
        assert_eq!(args.sizes, vec![1, 10, 100]);
        assert_eq!(args.repeats, Some(3));
    }
}
