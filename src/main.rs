use std::process::ExitCode;

use clap::Parser;

use gridwarp::cli::CliArgs;
use gridwarp::headless::{self, HeadlessOptions};
use gridwarp::{app, log_err, log_info, logger};

fn main() -> ExitCode {
    let args = CliArgs::parse();

    // Session log (overwrites the previous session's log)
    logger::init(args.verbose);
    log_info!("GridWarp {} starting", env!("CARGO_PKG_VERSION"));

    let config = match args.validate_host().and_then(|_| args.to_config()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            log_err!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    // -- Headless mode -------------------------------------------------
    if let Some(frames) = args.frames {
        let opts = HeadlessOptions {
            width: args.width,
            height: args.height,
            frames,
            sweep: args.sweep,
            output: args.output.clone(),
            gpu: args.gpu.clone(),
        };
        return match headless::run(config, &opts) {
            Ok(report) => {
                println!(
                    "{} frame(s) on {} → {} ({:.0}ms)",
                    report.frames_drawn,
                    report.adapter,
                    report.output.display(),
                    report.elapsed_ms
                );
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("error: {}", e);
                log_err!("Headless run failed: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    // -- Window mode ---------------------------------------------------
    let opts = app::WindowOptions {
        width: args.width,
        height: args.height,
        gpu: args.gpu.clone(),
    };
    match app::run(config, &opts) {
        Ok(()) => {
            log_info!("Session ended");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {}", e);
            if let Some(path) = logger::log_path() {
                eprintln!("see {} for details", path.display());
            }
            ExitCode::FAILURE
        }
    }
}
