//! # Callwright - A composable HTTP API client library
//!
//! Callwright builds outbound HTTP calls from small, composable pieces. A
//! long-lived [`Client`] holds shared policy (base URL, default modifiers,
//! authentication, default validators, JSON codecs) and every call site
//! derives a one-off [`RequestBuilder`] with its own overrides, without ever
//! mutating the client it came from.
//!
//! ## Quick Start
//!
//! ```no_run
//! use callwright::{Client, Modifiable, Modifier};
//! use serde::{Deserialize, Serialize};
//! use std::time::Duration;
//!
//! #[derive(Serialize)]
//! struct CreateUser {
//!     name: String,
//!     email: String,
//! }
//!
//! #[derive(Deserialize)]
//! struct User {
//!     id: u64,
//!     name: String,
//!     email: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), callwright::Error> {
//!     let client = Client::builder()
//!         .base_url("https://api.example.com")?
//!         .timeout(Duration::from_secs(30))
//!         .authentication(Modifier::bearer("secret-token"))
//!         .build()?;
//!
//!     // Make a GET request
//!     let user = client.get("/users/123").perform_json::<User>().await?;
//!     println!("User: {}", user.data.name);
//!     println!("Request took {:?}", user.latency);
//!
//!     // Make a POST request
//!     let new_user = CreateUser {
//!         name: "Alice".to_string(),
//!         email: "alice@example.com".to_string(),
//!     };
//!     let created: User = client
//!         .post("/users")
//!         .header("idempotency-key", "a1b2")
//!         .json(&new_user)
//!         .json_body()
//!         .await?;
//!     println!("Created user with ID: {}", created.id);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Composable modifiers** - Ordered, async request transformations that concatenate with [`compose`]
//! - **Composable validators** - Ordered response checks; the default accepts `200..300`
//! - **Immutable clients and builders** - Every "add" returns a new value, safe to share across tasks
//! - **Authentication chain** - Applied last, skipped entirely for anonymous calls
//! - **Phase-typed errors** - Modify, transport, validate or fatal, always with the originating request
//! - **Downloads** - Streamed to a temp file, validated, then moved into place; cancelled on drop
//! - **Pluggable transport** - `reqwest` by default, or any [`Transport`]; [`mock::MockClient`] for tests
//! - **Automatic logging** - Structured logging with `tracing` for observability
//!
//! ## Error Handling
//!
//! Errors are partitioned by the pipeline phase that failed:
//!
//! ```no_run
//! use callwright::{Client, Error, FatalError};
//!
//! # async fn example() -> Result<(), Error> {
//! # let client = Client::builder().base_url("https://api.example.com")?.build()?;
//! match client.get("/endpoint").perform_json::<serde_json::Value>().await {
//!     Ok(response) => {
//!         println!("Success: {:?}", response.data);
//!     }
//!     Err(Error::Validate { response, source, .. }) => {
//!         eprintln!("Rejected (status {}): {}", response.status, source);
//!     }
//!     Err(Error::Fatal(FatalError::Decode { response, source, expected_type, .. })) => {
//!         eprintln!("Not a {} (status {}): {}", expected_type, response.status, source);
//!     }
//!     Err(Error::Transport { source, .. }) => {
//!         eprintln!("Network failure: {}", source);
//!     }
//!     Err(e) => {
//!         eprintln!("Other error: {}", e);
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Deriving Clients
//!
//! ```no_run
//! use callwright::{Client, Modifiable, Modifier, Validatable};
//!
//! # async fn example() -> Result<(), callwright::Error> {
//! let root = Client::builder()
//!     .base_url("https://api.example.com")?
//!     .build()?;
//!
//! // Token is fetched on every call.
//! let authed = root.authentication_with(|| async {
//!     Ok::<_, std::io::Error>(Modifier::bearer("fresh-token"))
//! });
//!
//! // Accept redirects too, and tag every request.
//! let lenient = authed.status_range(200..400).header("x-client", "batch");
//!
//! lenient.get("/reports").query_item("year", Some("2024")).send().await?;
//! # Ok(())
//! # }
//! ```

mod builder;
mod client;
mod codec;
mod error;
pub mod metadata;
pub mod mock;
mod modifier;
pub mod modifiers;
pub mod multipart;
mod request;
mod response;
pub mod transport;
mod validator;

pub use builder::RequestBuilder;
pub use client::{Client, ClientBuilder};
pub use codec::{JsonDecoder, JsonEncoder};
pub use error::{BoxError, Error, FatalError, Phase, Result};
pub use metadata::RequestMetadata;
pub use mock::MockClient;
pub use modifier::{compose, Modifiable, Modifier, Modify};
pub use modifiers::{AuthorizationScheme, CachePolicy, ModifierError};
pub use multipart::FormField;
pub use request::Request;
pub use response::Response;
pub use transport::{ReqwestTransport, Transport};
pub use validator::{StatusCodeRangeError, Validatable, Validate, Validator};
