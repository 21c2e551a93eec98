use std::path::PathBuf;
use std::process::ExitCode;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use silo::error::Result;
use silo::data::Dataset;
use silo::enrich::{Bucket, RunClock};
use silo::index::{IndexState, DAILY_QUOTA};

use crate::config::Config;

mod config;

pub const CONFIG_FILE: &str = "silo.toml";

mod flags {
    use std::path::PathBuf;

    xflags::xflags! {
        /// Generates locality landing-page silos.
        cmd silogen {
            /// The configuration file. Defaults to `silo.toml`.
            optional -c, --config path: PathBuf
            /// Logs at debug level unless `RUST_LOG` says otherwise.
            optional -v, --verbose

            /// Generates every page and sitemap.
            cmd generate {
                /// The output directory.
                optional -o, --output path: PathBuf
                /// The number of worker threads.
                optional -j, --jobs count: usize
                /// How long enrichment values stay stable: month, fortnight, or day.
                optional --bucket bucket: String
                /// Warns about unresolved placeholders instead of failing.
                optional --lenient
            }

            /// Converts a locality dataset to canonical JSON.
            cmd convert {
                required input: PathBuf
                required output: PathBuf
            }

            /// Checks a generated output tree.
            cmd audit {
                optional -o, --output path: PathBuf
            }

            /// Lists the URLs that would be submitted for indexing today.
            cmd index-plan {
                optional -o, --output path: PathBuf
                /// The indexing state file.
                optional --state path: PathBuf
            }
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info,silo=info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

fn generate(mut config: Config, cmd: flags::Generate) -> Result<()> {
    if let Some(output) = cmd.output {
        config.settings.output = output;
    }

    if let Some(bucket) = cmd.bucket {
        config.settings.bucket = bucket.parse::<Bucket>()?;
    }

    config.settings.jobs = cmd.jobs.or(config.settings.jobs);
    config.settings.strict &= !cmd.lenient;

    let dataset = Dataset::load(&config.sources(), &config.schema()?)?;
    let templates = config.templates()?;
    let summary = silo::generator::generate(
        &dataset,
        &templates,
        &config.options(),
        RunClock::system(),
        &config.settings.output,
    )?;

    println!("{} pages written to {}", summary.pages(), config.settings.output.display());
    for (path, count) in &summary.sitemaps {
        println!("  {}: {count} urls", path.display());
    }

    Ok(())
}

fn audit(config: Config, output: Option<PathBuf>) -> Result<()> {
    let root = output.unwrap_or(config.settings.output);
    let report = silo::audit::audit(&root)?.into_result()?;
    println!("{} pages and {} sitemap urls verified", report.pages, report.locs);
    Ok(())
}

fn index_plan(config: Config, cmd: flags::IndexPlan) -> Result<()> {
    let root = cmd.output.unwrap_or(config.settings.output);
    let state_path = cmd.state.unwrap_or(config.settings.index_state);

    let urls = silo::index::sitemap_urls(&root)?;
    let mut state = IndexState::load(&state_path)?;
    state.roll_over(RunClock::system().date());

    let plan = state.plan(&urls, DAILY_QUOTA);
    println!(
        "{} of {} urls pending, {} allowed today ({}/{DAILY_QUOTA} used)",
        urls.iter().filter(|url| !state.submitted.contains(url)).count(),
        urls.len(),
        plan.len(),
        state.today_count,
    );

    for url in plan {
        println!("{url}");
    }

    Ok(())
}

fn run(args: flags::Silogen) -> Result<()> {
    let config = Config::discover(args.config.as_deref())?;
    match args.subcommand {
        flags::SilogenCmd::Generate(cmd) => generate(config, cmd),
        flags::SilogenCmd::Convert(cmd) => {
            let rows = silo::data::convert(&cmd.input, &cmd.output, &config.schema()?)?;
            println!("{rows} rows written to {}", cmd.output.display());
            Ok(())
        }
        flags::SilogenCmd::Audit(cmd) => audit(config, cmd.output),
        flags::SilogenCmd::IndexPlan(cmd) => index_plan(config, cmd),
    }
}

pub fn main() -> ExitCode {
    let args = flags::Silogen::from_env_or_exit();
    init_logging(args.verbose);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
