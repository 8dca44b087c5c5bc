use clap::Parser;

use log::{error, info, warn};
use std::process::ExitCode;

use curetsd2yolo::analyze::analyze_labels;
use curetsd2yolo::visualize::visualize;
use curetsd2yolo::{run_stages, write_reports, Args, Command, DatasetLayout, Stage, StageReport};

fn main() -> ExitCode {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let layout = DatasetLayout::new(&args.root);
    let needs_root = !matches!(args.command, Command::Visualize(_));
    if needs_root && !layout.root.exists() {
        error!("The specified root does not exist: {}", layout.root.display());
        return ExitCode::FAILURE;
    }

    let stages: Vec<Stage> = match &args.command {
        Command::All(split) => Stage::all(*split).to_vec(),
        Command::Analyze => {
            return match analyze_labels(&layout) {
                Ok(_) => ExitCode::SUCCESS,
                Err(e) => {
                    error!("Failed to analyze labels: {}", e);
                    ExitCode::FAILURE
                }
            };
        }
        Command::Visualize(vis) => {
            return match visualize(vis) {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    error!("Failed to visualize {}: {}", vis.image.display(), e);
                    ExitCode::FAILURE
                }
            };
        }
        command => Stage::from_command(command).into_iter().collect(),
    };

    info!("Preparing dataset under {}...", layout.root.display());
    let (reports, aborted) = run_stages(&layout, &stages, None);

    if let Some(path) = &args.report_json {
        match write_reports(path, &reports) {
            Ok(()) => info!("Wrote report to {}", path.display()),
            Err(e) => error!("Failed to write report {}: {}", path.display(), e),
        }
    }

    match aborted {
        Some(_) => ExitCode::FAILURE,
        None if reports.iter().all(StageReport::is_clean) => {
            info!("Finished.");
            ExitCode::SUCCESS
        }
        None => {
            let failed: usize = reports.iter().map(|r| r.failed.len()).sum();
            warn!("Finished with {} failed item(s).", failed);
            ExitCode::SUCCESS
        }
    }
}
