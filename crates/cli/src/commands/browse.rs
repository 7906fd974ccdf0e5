//! Public browsing: status, listing and detail.

use std::process::ExitCode;

use askama::Template;

use guia_comercial_app::AppError;
use guia_comercial_app::navigation::{Page, PageKind};
use guia_comercial_app::pages::{ComercioDetailPage, Header, HomePage, NavigationRequest};
use guia_comercial_app::repo::ComercioRepository;
use guia_comercial_app::state::Screen;
use guia_comercial_app::supabase::SupabaseError;
use guia_comercial_app::views::{ComercioDetailView, HomeView};
use guia_comercial_core::ComercioId;

use crate::shell::{CliError, Shell};

/// Print the session summary.
///
/// # Errors
///
/// Returns an error if rendering or writing fails.
pub fn status(shell: &Shell) -> Result<ExitCode, CliError> {
    shell.print_summary(&shell.handle().state())?;
    Ok(ExitCode::SUCCESS)
}

/// Render the home page.
///
/// # Errors
///
/// Returns an error if rendering or writing fails.
pub async fn home(shell: &Shell) -> Result<ExitCode, CliError> {
    shell
        .handle()
        .follow(NavigationRequest::to(PageKind::Home))
        .await;

    let mut page = HomePage::new();
    page.load(shell.backend()?).await;

    let state = shell.handle().state();
    let text = HomeView {
        header: Header::new(state.session(), state.profile()),
        page: &page,
    }
    .render()?;
    shell.print(&text)?;

    Ok(if page.state().error().is_some() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

/// Open the detail page of listing `id`.
///
/// # Errors
///
/// Returns an error if the fetch fails for a reason other than a missing
/// listing, or if rendering fails.
pub async fn show(
    shell: &Shell,
    id: ComercioId,
    image: Option<usize>,
) -> Result<ExitCode, CliError> {
    let comercio = match ComercioRepository::new(shell.backend()?)
        .get_by_id(id)
        .await
    {
        Ok(comercio) => comercio,
        Err(SupabaseError::NotFound(_)) => {
            shell.print(&format!("No se encontró el comercio {id}."))?;
            return Ok(ExitCode::FAILURE);
        }
        Err(e) => return Err(AppError::from(e).into()),
    };

    shell.handle().follow(NavigationRequest::detail(comercio)).await;

    let state = shell.handle().state();
    let Screen::Page(Page::ComercioDetail(comercio)) = state.screen() else {
        shell.print_summary(&state)?;
        return Ok(ExitCode::FAILURE);
    };

    let mut page = ComercioDetailPage::new(comercio.clone());
    if let Some(image) = image {
        page.select_image(image.saturating_sub(1));
    }

    let text = ComercioDetailView {
        header: Header::new(state.session(), state.profile()),
        page: &page,
    }
    .render()?;
    shell.print(&text)?;
    Ok(ExitCode::SUCCESS)
}
