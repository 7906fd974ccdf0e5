//! Long-running mode: callback URLs on stdin, state changes on stdout.

use std::process::ExitCode;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

use guia_comercial_app::state::AppState;
use guia_comercial_app::{AppConfig, ConfigError};

use crate::shell::{CliError, EXIT_CONFIG, Shell};

const DEEP_LINK_BUFFER: usize = 8;

/// Lines that re-read the configuration and start over.
const RETRY_COMMANDS: [&str; 2] = ["reintentar", "retry"];

const RETRY_HINT: &str = "Escribe \"reintentar\" para volver a leer la configuración.";

/// One line of stdin.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Blank,
    Retry,
    Link(&'a str),
}

fn parse_line(line: &str) -> Input<'_> {
    let line = line.trim();
    if line.is_empty() {
        Input::Blank
    } else if RETRY_COMMANDS
        .iter()
        .any(|command| line.eq_ignore_ascii_case(command))
    {
        Input::Retry
    } else {
        Input::Link(line)
    }
}

/// Forward every stdin line as a deep link until EOF, printing the summary
/// after each state change. A retry line reloads from the environment.
///
/// # Errors
///
/// Returns an error if stdin cannot be read or output fails.
pub async fn run(config: Result<AppConfig, ConfigError>) -> Result<ExitCode, CliError> {
    let (links, rx) = mpsc::channel(DEEP_LINK_BUFFER);
    let mut shell = Shell::start(config, Some(rx)).await;

    let result = forward(&mut shell, &links).await;
    shell.close().await;
    result
}

async fn forward(shell: &mut Shell, links: &mpsc::Sender<String>) -> Result<ExitCode, CliError> {
    let mut changes = shell.handle().subscribe();
    let initial = changes.borrow_and_update().clone();
    announce(shell, &initial)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                match parse_line(&line) {
                    Input::Blank => {}
                    Input::Retry => {
                        info!("Retrying with a fresh configuration");
                        shell.reload(AppConfig::from_env()).await;
                        let state = changes.borrow_and_update().clone();
                        announce(shell, &state)?;
                    }
                    Input::Link(url) => match links.try_send(url.to_string()) {
                        Ok(()) => {}
                        Err(TrySendError::Full(_)) => warn!("Deep-link queue full, link dropped"),
                        Err(TrySendError::Closed(_)) => break,
                    },
                }
            }
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = changes.borrow_and_update().clone();
                shell.print_summary(&state)?;
            }
        }
    }

    debug!("Input closed");
    if shell.is_unconfigured() {
        return Ok(ExitCode::from(EXIT_CONFIG));
    }
    Ok(ExitCode::SUCCESS)
}

/// Summary plus, on the configuration error screen, how to retry.
fn announce(shell: &Shell, state: &AppState) -> Result<(), CliError> {
    shell.print_summary(state)?;
    if shell.is_unconfigured() {
        shell.print(RETRY_HINT)?;
    }
    Ok(())
}
