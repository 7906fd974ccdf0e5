//! Sign-in, sign-up, sign-out and auth callbacks.

use std::process::ExitCode;

use askama::Template;
use secrecy::SecretString;
use tokio::io::{AsyncBufReadExt, BufReader};

use guia_comercial_app::pages::{AuthMode, AuthOutcome, AuthPage, Header};
use guia_comercial_app::views::AuthView;

use super::comercio;
use crate::shell::{CliError, Shell};

/// First line of stdin, without the line ending.
async fn read_password() -> Result<SecretString, CliError> {
    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    Ok(SecretString::from(password))
}

fn render_auth(shell: &Shell, page: &AuthPage) -> Result<(), CliError> {
    let state = shell.handle().state();
    let text = AuthView {
        header: Header::new(state.session(), state.profile()),
        page,
    }
    .render()?;
    shell.print(&text)?;
    Ok(())
}

/// Sign in with the password read from stdin, then show the dashboard.
///
/// # Errors
///
/// Returns an error if stdin cannot be read, the sign-in never reaches the
/// state, or rendering fails.
pub async fn login(shell: &Shell, email: String) -> Result<ExitCode, CliError> {
    let mut page = AuthPage::new(shell.redirect_url()?.clone());
    page.set_email(email);
    page.set_password(read_password().await?);

    match page.submit(shell.backend()?).await {
        AuthOutcome::Navigate(request) => {
            shell
                .wait_for("sign-in", |s| s.session().is_some() && s.is_settled())
                .await?;
            shell.handle().follow(request).await;
            comercio::dashboard(shell).await
        }
        AuthOutcome::ConfirmationPending | AuthOutcome::Failed => {
            render_auth(shell, &page)?;
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Create an account with the password read from stdin.
///
/// # Errors
///
/// Returns an error if stdin cannot be read or rendering fails.
pub async fn signup(shell: &Shell, email: String, nombre: String) -> Result<ExitCode, CliError> {
    let mut page = AuthPage::new(shell.redirect_url()?.clone());
    page.set_mode(AuthMode::SignUp);
    page.set_nombre(nombre);
    page.set_email(email);
    page.set_password(read_password().await?);

    let outcome = page.submit(shell.backend()?).await;
    render_auth(shell, &page)?;

    Ok(match outcome {
        AuthOutcome::ConfirmationPending | AuthOutcome::Navigate(_) => ExitCode::SUCCESS,
        AuthOutcome::Failed => ExitCode::FAILURE,
    })
}

/// Sign out and show the summary.
///
/// # Errors
///
/// Returns an error if the sign-out never reaches the state or rendering
/// fails.
pub async fn logout(shell: &Shell) -> Result<ExitCode, CliError> {
    let state = shell.handle().state();
    if state.session().is_none() {
        shell.print_summary(&state)?;
        return Ok(ExitCode::SUCCESS);
    }

    let request = Header::new(state.session(), state.profile())
        .sign_out(shell.backend()?)
        .await;
    let state = shell
        .wait_for("sign-out", |s| s.session().is_none())
        .await?;
    shell.handle().follow(request).await;

    shell.print_summary(&state)?;
    Ok(ExitCode::SUCCESS)
}

/// Exchange a callback URL for a session.
///
/// # Errors
///
/// Returns an error if the exchange never settles or rendering fails.
pub async fn open_url(shell: &Shell, url: &str) -> Result<ExitCode, CliError> {
    shell.handle().open_url(url).await;
    let state = shell.wait_for("verification", |s| s.is_settled()).await?;
    shell.print_summary(&state)?;

    Ok(if state.session().is_some() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
