//! Configuration for echo applications
//!
//! - Read-only YAML config loading with defaults for anything missing
//! - Standard config file location
//! - The [`EchoConfig`] file layout
//!
//! # Usage
//!
//! ```ignore
//! use echo_core::config::{default_config_path, load_config, EchoConfig};
//!
//! let config: EchoConfig = load_config(&default_config_path());
//! ```

mod io;
mod paths;
mod settings;

pub use io::{load_config, try_load_config};
pub use paths::{config_dir, default_config_path};
pub use settings::{AudioSettings, EchoConfig};
