//! Filename and path-component sanitization.
//!
//! Generated keys are used verbatim as filesystem paths and S3 object keys,
//! so every caller-controlled fragment passes through here first:
//!
//! - `/ \ : * ? " < > |` and spaces become `_`
//! - a name made only of dots (`.`, `..`) becomes `_`
//! - path components are additionally lowercased
//!
//! Both functions are idempotent.

/// Characters replaced by `_` in any caller-supplied key fragment.
const UNSAFE_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|', ' '];

/// Make a file name safe to embed in an object key.
///
/// # Examples
///
/// ```
/// use cask_keys::sanitize_filename;
///
/// assert_eq!(sanitize_filename("my photo.JPG"), "my_photo.JPG");
/// assert_eq!(sanitize_filename("a/b\\c:d"), "a_b_c_d");
/// ```
pub fn sanitize_filename(name: &str) -> String {
    if !name.is_empty() && name.chars().all(|c| c == '.') {
        return "_".to_string();
    }
    name.chars()
        .map(|c| if UNSAFE_CHARS.contains(&c) { '_' } else { c })
        .collect()
}

/// Make a single path component (tenant, derivation type, variant) safe.
///
/// # Examples
///
/// ```
/// use cask_keys::sanitize_path_component;
///
/// assert_eq!(sanitize_path_component("Thumbnail"), "thumbnail");
/// assert_eq!(sanitize_path_component("256 X 256"), "256_x_256");
/// ```
pub fn sanitize_path_component(component: &str) -> String {
    sanitize_filename(component).to_lowercase()
}
