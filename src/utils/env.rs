/// Get environment variable with IMPERSONATE_ prefix, falling back to unprefixed version
///
/// This helper function checks for `IMPERSONATE_{key}` first, then falls back to `{key}`
/// for compatibility with standard environment variable naming.
///
/// # Examples
///
/// ```rust
/// use impersonate::utils::get_env_with_prefix;
///
/// // Checks IMPERSONATE_REDIRECT_URL first, then REDIRECT_URL
/// let url = get_env_with_prefix("REDIRECT_URL");
/// ```
pub fn get_env_with_prefix(key: &str) -> Option<String> {
    std::env::var(format!("IMPERSONATE_{}", key))
        .or_else(|_| std::env::var(key))
        .ok()
}

/// Parse a comma separated environment value into trimmed, non-empty items
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
