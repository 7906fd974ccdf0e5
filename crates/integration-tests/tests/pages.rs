//! Page flows driven through a mounted app.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use secrecy::SecretString;
use url::Url;

use guia_comercial_app::navigation::{Page, PageKind};
use guia_comercial_app::pages::create_comercio::CREATE_FAILED;
use guia_comercial_app::pages::{
    AuthMode, AuthOutcome, AuthPage, ComercioForm, DashboardPage, FormError, Header, HomePage,
};
use guia_comercial_app::repo::{COMERCIOS, PROFILES};
use guia_comercial_app::state::Screen;
use guia_comercial_app::testing::{FakeBackend, comercio_row, profile_row, test_session};
use guia_comercial_core::{ComercioId, UserId};
use guia_comercial_integration_tests::{mount_settled, within};

fn redirect() -> Url {
    Url::parse("com.guiacomercial.miapp://auth-callback").unwrap()
}

fn filled_form() -> ComercioForm {
    let mut form = ComercioForm::new();
    form.nombre = "Panadería El Buen Pan".to_string();
    form.description = "Pan casero todos los días".to_string();
    form.direccion = "Calle 7 N° 123".to_string();
    form.whatsapp = "+54 9 11 2345-6789".to_string();
    form.set_provincia("Buenos Aires");
    form.set_ciudad("La Plata");
    form
}

fn signed_in_backend(id: UserId) -> Arc<FakeBackend> {
    Arc::new(
        FakeBackend::new()
            .with_session(test_session(id))
            .with_row(PROFILES, profile_row(&id, "Ana", "comerciante")),
    )
}

// =============================================================================
// Home and detail
// =============================================================================

#[tokio::test]
async fn test_home_lists_by_publicidad_and_opens_detail() {
    let owner = UserId::random();
    let backend = Arc::new(
        FakeBackend::new()
            .with_row(COMERCIOS, comercio_row(1, &owner, "Kiosco", 10))
            .with_row(COMERCIOS, comercio_row(2, &owner, "Ferretería", 90))
            .with_row(COMERCIOS, comercio_row(3, &owner, "Librería", 50)),
    );
    let (handle, _) = mount_settled(&backend, None).await;

    let mut home = HomePage::new();
    home.load(backend.as_ref()).await;
    let order: Vec<i32> = home
        .state()
        .loaded()
        .unwrap()
        .iter()
        .map(|c| c.publicidad)
        .collect();
    assert_eq!(order, vec![90, 50, 10]);

    handle.follow(home.select(0).unwrap()).await;
    let state = handle.state();
    let Screen::Page(Page::ComercioDetail(comercio)) = state.screen() else {
        panic!("expected the detail page");
    };
    assert_eq!(comercio.id, ComercioId::new(2));

    handle.unmount().await;
}

#[tokio::test]
async fn test_navigating_without_listing_clears_selection() {
    let owner = UserId::random();
    let backend = Arc::new(
        FakeBackend::new().with_row(COMERCIOS, comercio_row(7, &owner, "Kiosco", 10)),
    );
    let (handle, _) = mount_settled(&backend, None).await;

    let mut home = HomePage::new();
    home.load(backend.as_ref()).await;
    handle.follow(home.select(0).unwrap()).await;
    assert!(handle.state().navigation().selected_comercio().is_some());

    handle.navigate(PageKind::Auth, None).await;
    assert!(handle.state().navigation().selected_comercio().is_none());

    // A detail page without a listing falls back to Home.
    handle.navigate(PageKind::ComercioDetail, None).await;
    assert_eq!(handle.state().screen(), Screen::Page(Page::Home));

    handle.unmount().await;
}

#[tokio::test]
async fn test_home_load_failure_shows_message() {
    let backend = Arc::new(FakeBackend::new());
    let (handle, _) = mount_settled(&backend, None).await;

    backend.fail_selects(Some("boom"));
    let mut home = HomePage::new();
    home.load(backend.as_ref()).await;
    assert!(home.state().error().is_some());
    assert!(home.cards().is_empty());

    handle.unmount().await;
}

// =============================================================================
// Auth
// =============================================================================

#[tokio::test]
async fn test_sign_in_reaches_dashboard() {
    let id = UserId::random();
    let backend = Arc::new(
        FakeBackend::new()
            .with_account("ana@example.com", "secreto", id)
            .with_row(PROFILES, profile_row(&id, "Ana", "comerciante")),
    );
    let (handle, _) = mount_settled(&backend, None).await;

    let mut page = AuthPage::new(redirect());
    page.set_email("ana@example.com");
    page.set_password(SecretString::from("secreto".to_string()));
    let AuthOutcome::Navigate(request) = page.submit(backend.as_ref()).await else {
        panic!("expected a navigation");
    };

    within(handle.wait_for(|s| s.profile().is_some())).await;
    handle.follow(request).await;
    assert!(matches!(
        handle.state().screen(),
        Screen::Page(Page::Dashboard { .. })
    ));

    handle.unmount().await;
}

#[tokio::test]
async fn test_sign_up_waits_for_confirmation() {
    let backend = Arc::new(FakeBackend::new());
    let (handle, _) = mount_settled(&backend, None).await;
    handle.navigate(PageKind::Auth, None).await;

    let mut page = AuthPage::new(redirect());
    page.set_mode(AuthMode::SignUp);
    page.set_email("nuevo@example.com");
    page.set_password(SecretString::from("secreto".to_string()));
    page.set_nombre("  Juan Pérez ");

    assert_eq!(
        page.submit(backend.as_ref()).await,
        AuthOutcome::ConfirmationPending
    );
    assert_eq!(page.confirmation_sent_to(), Some("nuevo@example.com"));
    assert_eq!(
        backend.sign_ups(),
        vec![("nuevo@example.com".to_string(), "Juan Pérez".to_string())]
    );

    handle.sync().await;
    let state = handle.state();
    assert!(state.session().is_none());
    assert_eq!(state.navigation().current_page(), PageKind::Auth);

    handle.unmount().await;
}

#[tokio::test]
async fn test_header_sign_out_returns_home() {
    let id = UserId::random();
    let backend = signed_in_backend(id);
    let (handle, state) = mount_settled(&backend, None).await;

    let request = Header::new(state.session(), state.profile())
        .sign_out(backend.as_ref())
        .await;
    within(handle.wait_for(|s| s.session().is_none())).await;
    handle.follow(request).await;

    let state = handle.state();
    assert!(state.profile().is_none());
    assert_eq!(state.screen(), Screen::Page(Page::Home));

    handle.unmount().await;
}

// =============================================================================
// Dashboard and create
// =============================================================================

#[tokio::test]
async fn test_create_inserts_once_and_returns_to_dashboard() {
    let id = UserId::random();
    let backend = signed_in_backend(id);
    let (handle, state) = mount_settled(&backend, None).await;
    let session = state.session().unwrap().clone();

    let mut dashboard = DashboardPage::new();
    dashboard.load(backend.as_ref(), &session).await;
    assert!(dashboard.comercios().is_empty());
    handle.follow(dashboard.create_request()).await;
    assert_eq!(
        handle.state().navigation().current_page(),
        PageKind::CreateComercio
    );

    let mut form = filled_form();
    let request = form.submit(backend.as_ref(), &session).await.unwrap();
    handle.follow(request).await;
    assert_eq!(
        handle.state().navigation().current_page(),
        PageKind::Dashboard
    );

    let inserts = backend.inserts();
    assert_eq!(inserts.len(), 1);
    let (table, row) = &inserts[0];
    assert_eq!(table, COMERCIOS);
    assert_eq!(row["usuario_id"], id.to_string());
    assert_eq!(row["whatsapp"], "5491123456789");
    assert_eq!(row["provincia_id"], "buenos-aires");

    handle.unmount().await;
}

#[tokio::test]
async fn test_short_whatsapp_is_rejected_without_insert() {
    let id = UserId::random();
    let backend = signed_in_backend(id);
    let (handle, state) = mount_settled(&backend, None).await;
    let session = state.session().unwrap().clone();

    let mut form = filled_form();
    form.whatsapp = "12345".to_string();
    assert!(matches!(
        form.validate(&session),
        Err(FormError::Whatsapp(_))
    ));
    assert!(form.submit(backend.as_ref(), &session).await.is_none());
    assert!(form.error().is_some());
    assert!(backend.inserts().is_empty());

    handle.unmount().await;
}

#[tokio::test]
async fn test_rejected_insert_keeps_form_with_message() {
    let id = UserId::random();
    let backend = signed_in_backend(id);
    let (handle, state) = mount_settled(&backend, None).await;
    let session = state.session().unwrap().clone();

    backend.fail_inserts(Some(""));
    let mut form = filled_form();
    assert!(form.submit(backend.as_ref(), &session).await.is_none());
    assert_eq!(form.error(), Some(CREATE_FAILED));
    assert_eq!(form.nombre, "Panadería El Buen Pan");

    handle.unmount().await;
}
