//! Native library version compatibility checks.
//!
//! Versions are dotted numeric strings; `.`, `+` and `-` all separate
//! components, so `1.10.4-rc1` has the components `1`, `10`, `4`, `rc1`.
//! Only the first `limit` components take part in a comparison.

use crate::error::VersionError;

/// Default comparison depth: major.minor.
pub const DEFAULT_COMPONENT_LIMIT: usize = 2;

/// Deepest supported comparison: major.minor.patch.
pub const MAX_COMPONENT_LIMIT: usize = 3;

fn components(version: &str, limit: usize) -> Option<Vec<u32>> {
    let parts: Vec<&str> = version.trim().split(['.', '+', '-']).collect();
    if parts.len() < limit {
        return None;
    }
    parts[..limit].iter().map(|p| p.parse().ok()).collect()
}

/// Returns whether `v1` is at least `v2`, comparing `limit` components.
///
/// A version that fails to parse, or has fewer than `limit` components, is
/// never compatible.
pub fn compare_versions(v1: &str, v2: &str, limit: usize) -> Result<bool, VersionError> {
    if !(1..=MAX_COMPONENT_LIMIT).contains(&limit) {
        return Err(VersionError::InvalidLimit { limit });
    }
    Ok(match (components(v1, limit), components(v2, limit)) {
        (Some(c1), Some(c2)) => c1 >= c2,
        _ => false,
    })
}

/// Case-insensitive comparison of two version strings.
pub fn versions_equal(v1: &str, v2: &str) -> bool {
    v1.trim().eq_ignore_ascii_case(v2.trim())
}

/// Fail with [`VersionError::Mismatch`] unless the runtime version satisfies
/// the application version.
pub fn check_version(runtime: &str, application: &str, limit: usize) -> Result<(), VersionError> {
    if compare_versions(runtime, application, limit)? {
        Ok(())
    } else {
        Err(VersionError::Mismatch {
            runtime: runtime.to_string(),
            application: application.to_string(),
        })
    }
}
