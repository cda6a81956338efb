//! Lightdash provider
//!
//! An infrastructure-as-code provider that manages a Lightdash organization:
//! project roles for users and groups, groups, spaces and their sharing,
//! scheduler settings, warehouse credentials and AI agents.
//!
//! # Overview
//!
//! - **[`ProviderService`]**: the operations a provider host drives
//!   (configure, plan, CRUD, import, data sources, functions)
//! - **[`LightdashProvider`]**: the implementation, backed by a
//!   [`client::LightdashApi`]
//! - **[`client::HttpClient`]**: the REST client, with bounded concurrency
//!   and retries
//! - **[`normalize_project_members`]**: collapses overlapping role lists so
//!   every member keeps only their highest project role
//! - **[`testing`]**: a tester and an in-memory Lightdash for tests
//!
//! # Quick Start
//!
//! ```ignore
//! use lightdash_provider::{init_logging, LightdashProvider, ProviderService};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     init_logging();
//!
//!     let provider = LightdashProvider::new();
//!     provider
//!         .configure(json!({"host": "https://app.lightdash.cloud", "token": "pat-..."}))
//!         .await?;
//!     let projects = provider.read_data_source("lightdash_projects", json!({})).await?;
//!     println!("{}", projects);
//!     Ok(())
//! }
//! ```
//!
//! # Project roles
//!
//! Lightdash project roles form a strict ladder:
//!
//! ```text
//! admin > developer > editor > interactive_viewer > viewer
//! ```
//!
//! A user listed under several roles is granted only the highest one;
//! see [`members`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod data_sources;
pub mod diff;
pub mod error;
pub mod functions;
pub mod id;
pub mod logging;
pub mod members;
pub mod plan;
pub mod provider;
pub mod resources;
pub mod schema;
pub mod testing;
pub mod types;
pub mod validation;

pub use config::{ClientSettings, ProviderConfig};
pub use error::ProviderError;
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use members::{normalize_project_members, ProjectMemberRole, ProjectMembers};
pub use provider::{LightdashProvider, ProviderService};
pub use schema::ProviderSchema;
pub use types::{AttributeChange, ChangeKind, ImportedResource, PlanResult, ProviderMetadata};
pub use validation::{is_valid, validate, validate_result};

pub use async_trait::async_trait;
pub use serde_json;
pub use tracing;
