//! The owner's dashboard and the create form.

use std::process::ExitCode;

use askama::Template;
use clap::Args;

use guia_comercial_app::navigation::{Page, PageKind};
use guia_comercial_app::pages::{ComercioForm, DashboardPage, FormError, Header};
use guia_comercial_app::state::Screen;
use guia_comercial_app::views::{CreateComercioView, DashboardView};

use crate::shell::{CliError, Shell};

/// Fields of a new listing. Names and ids follow the stored columns.
#[derive(Args)]
pub struct CreateArgs {
    /// Business name
    #[arg(long)]
    pub nombre: String,

    /// What the business offers
    #[arg(long)]
    pub description: String,

    /// Street and number
    #[arg(long)]
    pub direccion: String,

    /// WhatsApp number with country and area code
    #[arg(long)]
    pub whatsapp: String,

    /// Province name
    #[arg(long)]
    pub provincia: Option<String>,

    /// City name
    #[arg(long)]
    pub ciudad: Option<String>,

    /// Category id
    #[arg(long)]
    pub rubro: Option<String>,

    /// Subcategory id
    #[arg(long)]
    pub sub_rubro: Option<String>,

    /// Advertising level, 0-100
    #[arg(long)]
    pub publicidad: Option<String>,
}

impl CreateArgs {
    fn into_form(self) -> ComercioForm {
        let mut form = ComercioForm::new();
        form.nombre = self.nombre;
        form.description = self.description;
        form.direccion = self.direccion;
        form.whatsapp = self.whatsapp;
        if let Some(provincia) = self.provincia {
            form.set_provincia(provincia);
        }
        if let Some(ciudad) = self.ciudad {
            form.set_ciudad(ciudad);
        }
        form.rubro_id = self.rubro.unwrap_or_default();
        form.sub_rubro_id = self.sub_rubro.unwrap_or_default();
        form.publicidad = self.publicidad.unwrap_or_default();
        form
    }
}

/// Print that the page needs a signed-in user with a profile.
fn not_signed_in(shell: &Shell) -> Result<ExitCode, CliError> {
    shell.print(&FormError::NotSignedIn.to_string())?;
    Ok(ExitCode::FAILURE)
}

/// Open the dashboard and list the user's listings.
///
/// # Errors
///
/// Returns an error if rendering or writing fails.
pub async fn dashboard(shell: &Shell) -> Result<ExitCode, CliError> {
    shell.handle().navigate(PageKind::Dashboard, None).await;

    let state = shell.handle().state();
    let Screen::Page(Page::Dashboard { session, profile }) = state.screen() else {
        return not_signed_in(shell);
    };

    let mut page = DashboardPage::new();
    page.load(shell.backend()?, session).await;

    let text = DashboardView {
        header: Header::new(Some(session), Some(profile)),
        page: &page,
    }
    .render()?;
    shell.print(&text)?;
    Ok(ExitCode::SUCCESS)
}

/// Submit the create form, then show the dashboard.
///
/// # Errors
///
/// Returns an error if rendering or writing fails.
pub async fn create(shell: &Shell, args: CreateArgs) -> Result<ExitCode, CliError> {
    shell.handle().navigate(PageKind::CreateComercio, None).await;

    let state = shell.handle().state();
    let Screen::Page(Page::CreateComercio { session, profile }) = state.screen() else {
        return not_signed_in(shell);
    };

    let mut form = args.into_form();
    if let Some(request) = form.submit(shell.backend()?, session).await {
        shell.handle().follow(request).await;
        return dashboard(shell).await;
    }

    let text = CreateComercioView {
        header: Header::new(Some(session), Some(profile)),
        form: &form,
    }
    .render()?;
    shell.print(&text)?;
    Ok(ExitCode::FAILURE)
}
