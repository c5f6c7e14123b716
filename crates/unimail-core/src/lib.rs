//! Client core for the unimail email templating API.
//!
//! Resolves configuration from options, `UNIMAIL_*` variables and an optional
//! config file; manages session tokens with an on-disk cache; and lists and
//! renders templates over HTTP.
//!
//! ```no_run
//! use unimail_core::{ClientOptions, Environment, RenderOptions, UnimailClient};
//!
//! # async fn run() -> Result<(), unimail_core::ApiError> {
//! let mut client = UnimailClient::new(ClientOptions::new(), Environment::capture())?;
//! for template in client.templates().index().await? {
//!     println!("{}", template.label());
//! }
//! let html = client.templates().render("welcome", &RenderOptions::new()).await?;
//! # let _ = html;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod models;

pub use api::{ApiError, Transport, UnimailClient};
pub use auth::{Credentials, SessionManager};
pub use cache::CredentialCache;
pub use config::{ClientOptions, Config, ConfigKey, Environment};
pub use models::{RenderOptions, Template};
