//! Crate-wide constants.

pub const APP_NAME: &str = "strata";

/// Install prefix used when a definition does not declare one.
pub const DEFAULT_PREFIX: &str = "/usr";

/// Vendor field of the `TARGET` triple exported to build steps.
pub const TARGET_VENDOR: &str = "strata";

/// Synthetic identity exported as USER/USERNAME/LOGNAME inside the sandbox.
pub const BUILD_USER: &str = "strata";

/// File (relative to the definitions directory) holding the name -> tree map.
pub const TREES_FILENAME: &str = ".trees";

/// Extensions of definition documents picked up while loading.
pub const DEFINITION_EXTENSIONS: &[&str] = &["def", "morph"];

/// Suffix of the lazily unpacked copy of a cached artifact.
pub const UNPACKED_SUFFIX: &str = ".unpacked";

/// Suffix of per-component build logs.
pub const BUILD_LOG_SUFFIX: &str = ".build-log";
