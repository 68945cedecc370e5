//! Index naming.
//!
//! Pure functions deriving physical index identifiers from a context's name
//! and version counter.

/// Get the versioned physical index name for a context.
///
/// # Arguments
///
/// * `name` - The context name (also its primary alias)
/// * `version` - The version counter, starting at 1
///
/// # Returns
///
/// The physical index name (e.g., "lab1_v1")
pub fn physical_index_name(name: &str, version: u32) -> String {
    format!("{}_v{}", name, version)
}

/// Get the address of a context's physical index on the engine.
///
/// Trailing slashes on `base_host` are ignored.
pub fn endpoint(base_host: &str, name: &str, version: u32) -> String {
    format!(
        "{}/{}",
        base_host.trim_end_matches('/'),
        physical_index_name(name, version)
    )
}
