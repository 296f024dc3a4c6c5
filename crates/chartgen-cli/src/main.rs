//! chartgen - render a HelmChart reference document into Kubernetes manifests

use clap::Parser;
use clap::error::ErrorKind;
use console::style;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

mod commands;
mod error;
mod exit_codes;
mod logging;
mod signal;

use commands::generate::GenerateOptions;

#[derive(Parser)]
#[command(name = "chartgen")]
#[command(version)]
#[command(about = "Render a HelmChart reference document into Kubernetes manifests", long_about = None)]
struct Cli {
    /// HelmChart document (apiVersion p1.dsop.io/v1beta1)
    file: PathBuf,

    /// Enable debug output on stderr
    #[arg(long, env = "CHARTGEN_DEBUG")]
    debug: bool,

    /// Deadline for cloning git chart sources
    #[arg(long, env = "CHARTGEN_GIT_TIMEOUT", default_value = "5m", value_parser = humantime_serde::re::humantime::parse_duration)]
    git_timeout: Duration,

    /// git executable used for chart.git sources
    #[arg(long, env = "CHARTGEN_GIT", default_value = "git")]
    git_binary: PathBuf,

    /// sops executable used for sopsValueFiles
    #[arg(long, env = "CHARTGEN_SOPS", default_value = "sops")]
    sops_binary: PathBuf,

    /// Repository configuration file (default: <config dir>/chartgen/repositories.yaml)
    #[arg(long, env = "CHARTGEN_REPOSITORY_CONFIG")]
    repository_config: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                    exit(exit_codes::SUCCESS)
                }
                _ => exit(exit_codes::USAGE_ERROR),
            };
        }
    };

    logging::init(cli.debug);

    let cancel = CancellationToken::new();
    if let Err(err) = signal::install(cancel.clone()) {
        tracing::warn!("cannot install interrupt handler: {err}");
    }

    let options = GenerateOptions {
        git_binary: cli.git_binary,
        git_timeout: cli.git_timeout,
        sops_binary: cli.sops_binary,
        repository_config: cli.repository_config,
    };

    let result = commands::generate::run(&cli.file, &options, &cancel).and_then(|output| {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(output.as_bytes())?;
        stdout.flush()?;
        Ok(())
    });

    match result {
        Ok(()) => exit(exit_codes::SUCCESS),
        Err(err) => {
            let code = err.exit_code();
            eprintln!("{} {err}", style("Error:").red().bold());
            if cli.debug {
                eprintln!("{:?}", err.report());
            }
            exit(code)
        }
    }
}

fn exit(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}
