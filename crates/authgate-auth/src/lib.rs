//! Identity orchestration core for the Authgate gateway.
//!
//! Authgate fronts a Keycloak-style identity provider and a user-activity
//! microservice, driving four workflows: login, registration, password
//! reset, and authenticated password update. This crate holds everything
//! except process wiring:
//!
//! - [`identity`] - claim decoding and staged role resolution
//! - [`keycloak`] - token grants and admin REST calls
//! - [`activity`] - activity event publication
//! - [`audit`] - append-only audit trail
//! - [`mailer`] - password-change confirmation mail
//! - [`engine`] - the workflow orchestration itself
//! - [`http`] - axum routes over the engine
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use authgate_auth::config::GatewayConfig;
//! use authgate_auth::engine::AuthWorkflowService;
//!
//! let config = GatewayConfig::default().with_client("gateway", "s3cr3t");
//! config.validate()?;
//! let http = reqwest::Client::builder()
//!     .timeout(config.keycloak.request_timeout)
//!     .build()?;
//! // assemble TokenClient, UserDirectory, ... and hand them to
//! // AuthWorkflowService::new
//! ```

pub mod activity;
pub mod audit;
pub mod config;
pub mod engine;
pub mod error;
pub mod http;
pub mod identity;
pub mod keycloak;
pub mod mailer;

pub use engine::AuthWorkflowService;
pub use error::{Rejection, ServiceTokenError, WorkflowError};
pub use identity::{IdentityResolver, ResolvedIdentity};
