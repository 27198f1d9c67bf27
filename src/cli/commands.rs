//! CLI command definitions

use clap::{Parser, Subcommand};
use fleetdesk::auth::RoleSet;
use fleetdesk_client::DEFAULT_API_URL;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "fleetdesk")]
#[command(about = "Fleet admin console session tool", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// GraphQL endpoint of the fleet API
    #[arg(long, env = "FLEETDESK_API_URL", default_value = DEFAULT_API_URL, global = true)]
    pub api_url: String,

    /// File holding the persisted session
    /// (default: ~/.fleetdesk/session.json)
    #[arg(long, env = "FLEETDESK_STATE", global = true)]
    pub state_file: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, env = "FLEETDESK_LOG", default_value = "warn", global = true)]
    pub log_level: String,

    /// Sign out when the stored token is rejected at startup
    #[arg(long, env = "FLEETDESK_STRICT_HYDRATION", global = true)]
    pub strict_hydration: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in with email and password
    ///
    /// The password is read from stdin when not given.
    Login {
        #[arg(short, long)]
        email: String,

        #[arg(short, long, env = "FLEETDESK_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Sign out and forget the stored session
    Logout,

    /// Show the signed-in operator and what they may do
    Whoami,

    /// Check whether the current session may open a page
    ///
    /// Exit status: 0 allowed, 2 redirect to login, 3 denied.
    ///
    /// Examples:
    ///   fleetdesk check /vehicles/new
    ///   fleetdesk check /reports --roles Admin,Editor
    Check {
        /// Page path, e.g. /users
        path: String,

        /// Override the page's allowed roles
        #[arg(long, value_parser = parse_role_set)]
        roles: Option<RoleSet>,
    },

    /// Print the navigation menu for the current session
    Menu,

    /// Run a GraphQL document with the current session's token
    ///
    /// Examples:
    ///   fleetdesk query '{ vehicles { id plate } }'
    ///   fleetdesk query @report.graphql --variables '{"month": 5}'
    Query {
        /// Document text, or @path to read it from a file
        document: String,

        /// Variables as a JSON object
        #[arg(long)]
        variables: Option<String>,
    },
}

/// Parse a comma-separated role list for clap
fn parse_role_set(s: &str) -> Result<RoleSet, String> {
    RoleSet::parse_list(s).map_err(|e| e.to_string())
}
