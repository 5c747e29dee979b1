//! Environment variable names used by this crate for convenient
//! configuration of the core and its mirror from services.
//!
//! These are purely helpers; the core and mirror types remain decoupled
//! from environment access.

/// Minimum level written to the primary sink, e.g. `info`.
pub const LOG_LEVEL_ENV: &str = "LOG_LEVEL";

/// `true`/`1` enables mirroring into the indexing backend.
pub const LOG_MIRROR_ENABLED_ENV: &str = "LOG_MIRROR_ENABLED";

/// Indexing backend DSN, e.g. `opensearch://127.0.0.1:9200`.
pub const LOG_MIRROR_DSN_ENV: &str = "LOG_MIRROR_DSN";

/// Explicit host identifier; skips interface detection when set.
pub const LOG_MIRROR_HOST_ENV: &str = "LOG_MIRROR_HOST";

/// Prefix for ordinary log indices.
pub const LOG_MIRROR_ORDINARY_PREFIX_ENV: &str = "LOG_MIRROR_ORDINARY_PREFIX";

/// Prefix for trace log indices.
pub const LOG_MIRROR_TRACE_PREFIX_ENV: &str = "LOG_MIRROR_TRACE_PREFIX";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Read a boolean flag; unset or unrecognised values yield `default`.
pub fn env_flag(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(value) => match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_variables_fall_back() {
        assert_eq!(env_or("LOG_CORE_MIRROR_TEST_UNSET", "info"), "info");
        assert!(env_flag("LOG_CORE_MIRROR_TEST_UNSET", true));
    }

    #[test]
    fn flags_accept_common_spellings() {
        std::env::set_var("LOG_CORE_MIRROR_TEST_FLAG", "Yes");
        assert!(env_flag("LOG_CORE_MIRROR_TEST_FLAG", false));
        std::env::set_var("LOG_CORE_MIRROR_TEST_FLAG", "off");
        assert!(!env_flag("LOG_CORE_MIRROR_TEST_FLAG", true));
        std::env::remove_var("LOG_CORE_MIRROR_TEST_FLAG");
    }
}
