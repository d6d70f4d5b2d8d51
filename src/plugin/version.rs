//! Plugin API Version
//!
//! The version of the scripting surface exposed to repository plugins is read
//! from Cargo.toml metadata at build time (package.metadata.gitpress.api_version),
//! so the same source always reports the same version.
//!
//! Version format: YYYYMMDD (e.g., 20261018 = 18 October 2026)

use super::error::{PluginError, PluginResult};

// Include the build-generated API version constant
include!(concat!(env!("OUT_DIR"), "/version_api.rs"));

/// Get the current plugin API version
pub fn get_api_version() -> i64 {
    PLUGIN_API_VERSION
}

/// Convert a YYYYMMDD version to a YYYY-MM-DD string
pub fn days_to_date_string(version: i64) -> String {
    if (10000000..=99999999).contains(&version) {
        let year = version / 10000;
        let month = (version % 10000) / 100;
        let day = version % 100;

        format!("{year:04}-{month:02}-{day:02}")
    } else {
        format!("unknown ({})", version)
    }
}

/// Version information as JSON
pub fn get_version_info() -> serde_json::Value {
    let version = get_api_version();
    serde_json::json!({
        "api_version": version,
        "release_date": days_to_date_string(version),
        "version_format": "YYYYMMDD",
    })
}

/// Check if a required API version is provided by this build
pub fn is_api_compatible(required_version: i64) -> bool {
    get_api_version() >= required_version
}

/// Fail with `ApiVersion` when a plugin needs a newer host
pub fn check_api(required_version: i64) -> PluginResult<()> {
    if is_api_compatible(required_version) {
        Ok(())
    } else {
        Err(PluginError::ApiVersion { required: required_version, provided: get_api_version() })
    }
}
