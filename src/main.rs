// Tunedrop CLI - thin driver around the pipeline.
//
// Usage:
//   tunedrop <url> [--video] [--numbered]
//   tunedrop --ledger <file> [--video] [--numbered]
//
// While a run is in progress, single-letter commands on stdin are
// honored at item boundaries: r = restart, q = quit, a/v = audio/video,
// n/u = numbered/unnumbered.

use std::path::PathBuf;
use std::process::ExitCode;

use tracing::error;
use tracing_subscriber::EnvFilter;

use tunedrop::signal::StdinSignals;
use tunedrop::{DownloadOptions, LoopOutcome, MediaFormat, Pipeline, Settings};

struct Args {
    url: Option<String>,
    ledger: Option<PathBuf>,
    format: MediaFormat,
    numbered: bool,
}

fn parse_args() -> Option<Args> {
    let mut args = Args {
        url: None,
        ledger: None,
        format: MediaFormat::Audio,
        numbered: false,
    };

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--video" => args.format = MediaFormat::Video,
            "--numbered" => args.numbered = true,
            "--ledger" => args.ledger = Some(PathBuf::from(iter.next()?)),
            _ if arg.starts_with("--") => return None,
            _ => args.url = Some(arg),
        }
    }

    if args.url.is_some() || args.ledger.is_some() {
        Some(args)
    } else {
        None
    }
}

/// Best-effort browser launch; the URL is always printed as well.
fn present_auth_url(url: &str) {
    println!("Open this URL in your browser to sign in:\n\n  {}\n", url);

    #[cfg(target_os = "macos")]
    let opener = "open";
    #[cfg(not(target_os = "macos"))]
    let opener = "xdg-open";

    std::process::Command::new(opener).arg(url).spawn().ok();
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let Some(args) = parse_args() else {
        eprintln!("usage: tunedrop <url> [--video] [--numbered]");
        eprintln!("       tunedrop --ledger <file> [--video] [--numbered]");
        return ExitCode::FAILURE;
    };

    let pipeline = Pipeline::new(Settings::load());
    let mut signals = StdinSignals::spawn();
    let options = DownloadOptions {
        format: args.format,
        numbered: args.numbered,
    };

    // Resume straight from an existing ledger file
    if let Some(ledger_path) = &args.ledger {
        return match pipeline
            .download_ledger_file(ledger_path, options, &mut signals)
            .await
        {
            Ok(summary) => {
                println!(
                    "Downloaded {}/{} ({} failed)",
                    summary.completed, summary.total, summary.failed
                );
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!("{}", e);
                ExitCode::FAILURE
            }
        };
    }

    let url = args.url.unwrap_or_default();

    loop {
        let run = match pipeline
            .resolve_source(&url, &mut signals, present_auth_url)
            .await
        {
            Ok(run) => run,
            Err(e) => {
                error!("{}", e);
                return ExitCode::FAILURE;
            }
        };

        match run.summary.outcome {
            LoopOutcome::Quit => return ExitCode::SUCCESS,
            LoopOutcome::Restarted => continue,
            LoopOutcome::Completed => {}
        }

        println!(
            "Resolved {}/{} tracks of '{}' into {}",
            run.summary.found,
            run.summary.total,
            run.collection_name,
            run.ledger_path.display()
        );

        match pipeline.download_run(&run, options, &mut signals).await {
            Ok(summary) => match summary.outcome {
                LoopOutcome::Restarted => continue,
                _ => {
                    println!(
                        "Downloaded {}/{} ({} failed)",
                        summary.completed, summary.total, summary.failed
                    );
                    return ExitCode::SUCCESS;
                }
            },
            Err(e) => {
                error!("{}", e);
                return ExitCode::FAILURE;
            }
        }
    }
}
