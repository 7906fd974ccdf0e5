//! Guía Comercial CLI - Terminal shell for the business directory.
//!
//! # Usage
//!
//! ```bash
//! # Show who is signed in and which page would open
//! guia status
//!
//! # Browse listings
//! guia home
//! guia show 42
//!
//! # Accounts (password is read from stdin)
//! echo "$PASSWORD" | guia login -e ana@example.com
//! echo "$PASSWORD" | guia signup -e ana@example.com -n "Ana Pérez"
//! guia logout
//!
//! # Manage your listings
//! guia dashboard
//! guia create --nombre "Panadería El Buen Pan" --description "Pan casero" \
//!     --direccion "Calle 7 N° 123" --whatsapp 5491123456789
//!
//! # Finish an email confirmation
//! guia open-url 'com.guiacomercial.miapp://auth-callback#access_token=...&refresh_token=...'
//!
//! # Forward callback URLs from stdin, printing every state change
//! # ("reintentar" re-reads the configuration)
//! guia listen
//! ```
//!
//! Exit status is 0 on success, 1 on a failed action and 2 when the client is
//! not configured.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use guia_comercial_app::AppConfig;
use guia_comercial_core::ComercioId;

mod commands;
mod shell;

use commands::comercio::CreateArgs;
use shell::{CliError, Shell};

#[derive(Parser)]
#[command(name = "guia")]
#[command(author, version, about = "Guía Comercial directory client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the session, profile and current page
    Status,
    /// List featured businesses
    Home,
    /// Show one business
    Show {
        /// Business id
        id: ComercioId,

        /// Gallery image to enlarge (1-based)
        #[arg(long)]
        image: Option<usize>,
    },
    /// Sign in; the password is read from stdin
    Login {
        /// Account email
        #[arg(short, long)]
        email: String,
    },
    /// Create an account; the password is read from stdin
    Signup {
        /// Account email
        #[arg(short, long)]
        email: String,

        /// Full name
        #[arg(short, long)]
        nombre: String,
    },
    /// Sign out
    Logout,
    /// List your businesses
    Dashboard,
    /// Publish a new business
    Create(CreateArgs),
    /// Exchange an auth callback URL for a session
    OpenUrl {
        /// Callback URL with tokens in the fragment or query
        url: String,
    },
    /// Forward callback URLs read from stdin and print every state change
    Listen,
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(dsn: Option<&str>) -> Option<sentry::ClientInitGuard> {
    let dsn = dsn?;

    let guard = sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // A configuration error is rendered as a screen, not a startup failure
    let config = AppConfig::from_env();

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(
        config
            .as_ref()
            .ok()
            .and_then(|config| config.sentry_dsn.as_deref()),
    );

    // Logs go to stderr; stdout carries the rendered screens
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "guia_comercial_app=info,guia=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let cli = Cli::parse();

    match run(cli, config).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("Command failed: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(
    cli: Cli,
    config: Result<AppConfig, guia_comercial_app::ConfigError>,
) -> Result<ExitCode, CliError> {
    if matches!(cli.command, Commands::Listen) {
        return commands::listen::run(config).await;
    }

    let shell = Shell::start(config, None).await;
    let result = dispatch(&shell, cli.command).await;
    shell.close().await;
    result
}

async fn dispatch(shell: &Shell, command: Commands) -> Result<ExitCode, CliError> {
    if let Some(code) = shell.show_gate()? {
        return Ok(code);
    }

    match command {
        Commands::Status => commands::browse::status(shell),
        Commands::Home => commands::browse::home(shell).await,
        Commands::Show { id, image } => commands::browse::show(shell, id, image).await,
        Commands::Login { email } => commands::account::login(shell, email).await,
        Commands::Signup { email, nombre } => {
            commands::account::signup(shell, email, nombre).await
        }
        Commands::Logout => commands::account::logout(shell).await,
        Commands::Dashboard => commands::comercio::dashboard(shell).await,
        Commands::Create(args) => commands::comercio::create(shell, args).await,
        Commands::OpenUrl { url } => commands::account::open_url(shell, &url).await,
        Commands::Listen => Ok(ExitCode::SUCCESS),
    }
}
