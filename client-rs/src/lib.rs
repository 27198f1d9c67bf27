//! Fleet API Rust Client
//!
//! A small GraphQL-over-HTTP client for the fleet administration API. It knows
//! how to attach a bearer token, how to classify GraphQL and HTTP failures, and
//! the two operations the session layer needs: `me` and `login`.
//!
//! # Example
//!
//! ```no_run
//! use fleetdesk_client::{ClientConfig, FleetClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = FleetClient::new(ClientConfig::new("http://localhost:8080/query"))?;
//!
//!     let session = client.login("ops@fleet.test", "correct horse").await?;
//!     let me = client.me(&session.token).await?;
//!     println!("signed in as {}", me.email);
//!
//!     // Arbitrary operations with the same bearer token
//!     let vehicles: serde_json::Value = client
//!         .execute::<(), _>(Some(&session.token), "query { vehicles { id vin } }", None)
//!         .await?;
//!     println!("{}", vehicles);
//!
//!     Ok(())
//! }
//! ```

mod client;
mod config;
mod error;
mod messages;

pub use client::FleetClient;
pub use config::{ClientConfig, DEFAULT_API_URL};
pub use error::{ClientError, Result};
pub use messages::{
    GraphQlError, GraphQlRequest, GraphQlResponse, LoginPayload, RolePayload, UserPayload,
    LOGIN_MUTATION, ME_QUERY,
};
