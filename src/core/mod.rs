//! Core functionality shared by the extension and bootstrap layers:
//! configuration and bounded retry.

mod config;
mod retry;

pub use config::{
    expand_path, BootstrapConfig, Config, ExtensionsConfig, RegistryConfig, SocketConfig,
    ToolConfig, CONFIG_ENV,
};
pub use retry::{retry, RetryConfig, RetryResult};
