//! Fleetdesk CLI entry point

mod cli;

use crate::cli::{Cli, Commands};
use anyhow::{bail, Context, Result};
use clap::Parser;
use fleetdesk::auth::{Capability, RoleSet};
use fleetdesk::gate::{self, GateOutcome};
use fleetdesk::nav::{NavShell, Route};
use fleetdesk::session::{Credentials, FleetApi, HydrationPolicy, SessionController};
use fleetdesk::storage::{FileStore, SessionStore};
use fleetdesk::transport::AuthorizedClient;
use fleetdesk_client::{ClientConfig, FleetClient};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Initialize tracing; stdout is reserved for command output
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let state_file = match cli.state_file.clone() {
        Some(path) => path,
        None => default_state_file()?,
    };
    debug!(path = %state_file.display(), api_url = %cli.api_url, "Starting");

    let client = FleetClient::new(ClientConfig::new(cli.api_url.clone()))
        .context("Failed to build API client")?;
    let api = FleetApi::new(client.clone());
    let store = SessionStore::new(Arc::new(FileStore::new(state_file)));
    let policy = if cli.strict_hydration {
        HydrationPolicy::ForceLogoutOnUnauthorized
    } else {
        HydrationPolicy::Tolerate
    };
    let controller = SessionController::with_policy(store, Arc::new(api.clone()), policy);

    if let Commands::Logout = cli.command {
        controller.logout();
        println!("Signed out");
        return Ok(ExitCode::SUCCESS);
    }

    controller.hydrate().await;

    match cli.command {
        Commands::Login { email, password } => login(&controller, &api, email, password).await,
        Commands::Logout => Ok(ExitCode::SUCCESS),
        Commands::Whoami => whoami(&controller),
        Commands::Check { path, roles } => check(&controller, &path, roles),
        Commands::Menu => menu(&controller),
        Commands::Query { document, variables } => {
            query(AuthorizedClient::new(client, controller), document, variables).await
        }
    }
}

fn default_state_file() -> Result<PathBuf> {
    let home = std::env::var_os("HOME").context("HOME not set; pass --state-file")?;
    Ok(PathBuf::from(home).join(".fleetdesk").join("session.json"))
}

fn exit_code(outcome: GateOutcome) -> ExitCode {
    match outcome {
        GateOutcome::Allow => ExitCode::SUCCESS,
        GateOutcome::Redirect(_) => ExitCode::from(2),
        GateOutcome::Deny => ExitCode::from(3),
        GateOutcome::Pending => ExitCode::from(4),
    }
}

async fn login(
    controller: &SessionController,
    api: &FleetApi,
    email: String,
    password: Option<String>,
) -> Result<ExitCode> {
    let password = match password {
        Some(password) => password,
        None => read_password()?,
    };

    match controller
        .sign_in(api, &Credentials::new(email, password))
        .await
    {
        Ok(identity) => {
            println!("Signed in as {}", identity);
            println!("Continue at {}", Route::LANDING);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("Login failed: {}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn read_password() -> Result<String> {
    eprint!("Password: ");
    io::stderr().flush().ok();

    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read password")?;

    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        bail!("Empty password");
    }
    Ok(password)
}

fn whoami(controller: &SessionController) -> Result<ExitCode> {
    let session = controller.current_session();
    let user = match session.user().filter(|_| session.is_authenticated()) {
        Some(user) => user,
        None => {
            println!("Not signed in");
            return Ok(exit_code(gate::evaluate(&session, None)));
        }
    };

    println!("{}", user);
    println!("  id: {}", user.id());
    let capabilities: Vec<String> = Capability::granted_to(user)
        .iter()
        .map(|c| c.to_string())
        .collect();
    println!("  can: {}", capabilities.join(", "));
    Ok(ExitCode::SUCCESS)
}

fn check(controller: &SessionController, path: &str, roles: Option<RoleSet>) -> Result<ExitCode> {
    let route: Route = path.parse()?;
    let session = controller.current_session();

    let outcome = match roles {
        Some(roles) => gate::evaluate(&session, Some(&roles)),
        None => gate::evaluate_route(&session, &route),
    };

    match outcome {
        GateOutcome::Deny => println!("{}: {}", route, outcome.render()),
        _ => println!("{}: {}", route, outcome),
    }
    Ok(exit_code(outcome))
}

fn menu(controller: &SessionController) -> Result<ExitCode> {
    let session = controller.current_session();
    match NavShell::from_session(&session) {
        Some(shell) => {
            println!("{}", shell);
            Ok(ExitCode::SUCCESS)
        }
        None => {
            println!("Not signed in");
            Ok(exit_code(gate::evaluate(&session, None)))
        }
    }
}

async fn query(
    client: AuthorizedClient,
    document: String,
    variables: Option<String>,
) -> Result<ExitCode> {
    let document = match document.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read document: {}", path))?,
        None => document,
    };

    let variables: Option<serde_json::Value> = variables
        .map(|raw| serde_json::from_str(&raw))
        .transpose()
        .context("Invalid --variables JSON")?;

    let data: serde_json::Value = client
        .execute(&document, variables)
        .await
        .context("Query failed")?;

    println!("{}", serde_json::to_string_pretty(&data)?);
    Ok(ExitCode::SUCCESS)
}
