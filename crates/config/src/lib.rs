//! Configuration for the chain entitlement core
//!
//! [`ChainAuthConfig`] holds every knob the authorization engine and the
//! membership scrubber read. [`ConfigLoader`] assembles it from built-in
//! defaults, an optional JSON file and `CHAINAUTH_*` environment variables,
//! in that order of precedence, and validates it before returning.

pub mod loader;
pub mod settings;

pub use loader::{ConfigLoader, ConfigSource, LoadedConfig, CONFIG_FILE_ENV};
pub use settings::{CacheConfigSection, CacheTierSettings, ChainAuthConfig, ScrubbingConfig};
