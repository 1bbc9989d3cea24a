//! mod `api` assembles the interceptor chain and initializes the process.
//! There are three ways to perform initialization:
//!
//!  1. `init_default()`, using the default config, overridden by the system environment.
//!  2. `init_with_config(entity: config::ConfigEntity)`, using a customized config entity.
//!  3. `init_with_config_file(config_path: &mut String)`, using a YAML file.
//!
//! Each returns the [`ClientComponents`] shared by every stub of the process:
//!
//! ```ignore
//! use std::sync::Arc;
//! use topology_interceptors::{api, base::InterceptedClient};
//!
//! let components = api::init_default()?;
//! let client = InterceptedClient::new(Arc::new(transport), api::build_interceptors(&components));
//! let cell = client.request_response("/gitlab.cells.topology_service.CellService/GetCell", &request, Default::default())?;
//! ```

mod components;
mod init;

pub use components::*;
pub use init::*;

pub use crate::core::config;
