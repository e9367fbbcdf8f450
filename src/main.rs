use anyhow::Result;
use ascension_core::metrics::init_logging;
use ascension_lib::app::shutdown::ShutdownReason;
use ascension_lib::app::{App, AppOptions};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// What to do
    #[arg(short, long, value_enum, default_value = "headless")]
    mode: Mode,

    /// TOML engine configuration (defaults are used when absent)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// World state file
    #[arg(short, long, default_value = "ascension_world.json")]
    state: PathBuf,

    /// RNG seed for a reproducible run
    #[arg(long)]
    seed: Option<u64>,

    /// Stop after this many seconds instead of waiting for Ctrl-C
    #[arg(long)]
    duration_secs: Option<u64>,

    /// Start with autonomous evolution enabled
    #[arg(long)]
    autonomous: bool,

    /// Skip the final world save on exit
    #[arg(long)]
    no_save: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum Mode {
    Headless,
    DumpConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let options = AppOptions {
        config: args.config,
        state: args.state,
        seed: args.seed,
        autonomous: args.autonomous,
        duration: args.duration_secs.map(Duration::from_secs),
    };

    match args.mode {
        Mode::DumpConfig => {
            let config = App::load_config(&options)?;
            print!("{}", config.to_toml()?);
        }
        Mode::Headless => {
            init_logging();
            let mut app = App::new(&options)?;
            app.shutdown.set_save_on_exit(!args.no_save);
            if let Err(e) = app.run().await {
                tracing::error!(error = %e, "Run failed");
                app.shutdown.request(ShutdownReason::Failed(e.to_string()));
            }
            std::process::exit(app.shutdown.exit_code());
        }
    }

    Ok(())
}
