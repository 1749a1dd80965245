// src/config/mod.rs

//! Configuration loading and validation.
//!
//! - `model.rs`: serde model of the JSON documents and the validated types.
//! - `loader.rs`: reading the config file and `*.job` files.
//! - `validate.rs`: raw → validated conversion.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{
    DEFAULT_CONFIG_PATH, DEFAULT_JOBS_DIR, is_job_file_name, list_job_files, load_job_file,
    load_service_config, parse_service_config,
};
pub use model::{JobSpec, RawJobSpec, RawServiceConfig, ServiceConfig};
pub use validate::parse_job_value;
