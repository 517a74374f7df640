//! Channel-input parsing: canonical ids, handles, and the URL shapes users
//! paste. The output is either a canonical `UC…` id, an `@handle`, or a bare
//! slug/username that only a search can resolve.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::PlatformError;

static CANONICAL_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^UC[A-Za-z0-9_-]{22}$").expect("canonical id regex"));
static CHANNEL_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"youtube\.com/channel/([\w-]+)").expect("channel url regex"));
static CUSTOM_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"youtube\.com/c/([\w-]+)").expect("custom url regex"));
static USER_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"youtube\.com/user/([\w-]+)").expect("user url regex"));
static HANDLE_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"youtube\.com/@([\w.-]+)").expect("handle url regex"));
static SHORT_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"youtu\.be/([\w-]+)").expect("short url regex"));

pub fn is_canonical_id(input: &str) -> bool {
    CANONICAL_ID.is_match(input)
}

/// Reduces whatever the user pasted to a lookup key.
///
/// Accepted forms: a canonical `UC…` id, an `@handle`, and URLs of the
/// shapes `…/channel/<id>`, `…/c/<slug>`, `…/user/<name>`, `…/@<handle>`,
/// and `youtu.be/<name>`. Anything else is `InvalidInput`.
pub fn extract_channel_input(input: &str) -> Result<String, PlatformError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(PlatformError::InvalidInput);
    }

    if is_canonical_id(input) {
        return Ok(input.to_string());
    }

    if input.starts_with('@') {
        return Ok(input.to_string());
    }

    if let Some(caps) = CHANNEL_URL.captures(input) {
        return Ok(caps[1].to_string());
    }
    // A /@handle URL keeps its @ so resolution can use the handle lookup.
    if let Some(caps) = HANDLE_URL.captures(input) {
        return Ok(format!("@{}", &caps[1]));
    }
    if let Some(caps) = CUSTOM_URL.captures(input) {
        return Ok(caps[1].to_string());
    }
    if let Some(caps) = USER_URL.captures(input) {
        return Ok(caps[1].to_string());
    }
    if let Some(caps) = SHORT_URL.captures(input) {
        return Ok(caps[1].to_string());
    }

    Err(PlatformError::InvalidInput)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_id_passes_through() {
        let id = "UCuAXFkgsw1L7xaCfnd5JJOw";
        assert!(is_canonical_id(id));
        assert_eq!(extract_channel_input(id).unwrap(), id);
    }

    #[test]
    fn canonical_id_shape_is_strict() {
        assert!(!is_canonical_id("UCshort"));
        assert!(!is_canonical_id("UNuAXFkgsw1L7xaCfnd5JJOw"));
        assert!(!is_canonical_id("UCuAXFkgsw1L7xaCfnd5JJOw-extra"));
    }

    #[test]
    fn bare_handle_passes_through() {
        assert_eq!(extract_channel_input("@Example").unwrap(), "@Example");
    }

    #[test]
    fn channel_url_yields_id() {
        assert_eq!(
            extract_channel_input("https://www.youtube.com/channel/UCuAXFkgsw1L7xaCfnd5JJOw")
                .unwrap(),
            "UCuAXFkgsw1L7xaCfnd5JJOw"
        );
    }

    #[test]
    fn handle_url_keeps_at_sign() {
        assert_eq!(
            extract_channel_input("https://www.youtube.com/@Example").unwrap(),
            "@Example"
        );
        assert_eq!(
            extract_channel_input("youtube.com/@some.handle").unwrap(),
            "@some.handle"
        );
    }

    #[test]
    fn custom_and_user_urls_yield_slugs() {
        assert_eq!(
            extract_channel_input("https://www.youtube.com/c/ExampleSlug").unwrap(),
            "ExampleSlug"
        );
        assert_eq!(
            extract_channel_input("https://www.youtube.com/user/olduser").unwrap(),
            "olduser"
        );
    }

    #[test]
    fn short_url_yields_name() {
        assert_eq!(
            extract_channel_input("https://youtu.be/somechannel").unwrap(),
            "somechannel"
        );
    }

    #[test]
    fn whitespace_is_trimmed() {
        assert_eq!(
            extract_channel_input("  @Example \n").unwrap(),
            "@Example"
        );
    }

    #[test]
    fn garbage_is_invalid() {
        assert!(matches!(
            extract_channel_input(""),
            Err(PlatformError::InvalidInput)
        ));
        assert!(matches!(
            extract_channel_input("   "),
            Err(PlatformError::InvalidInput)
        ));
        assert!(matches!(
            extract_channel_input("just a channel name"),
            Err(PlatformError::InvalidInput)
        ));
        assert!(matches!(
            extract_channel_input("https://example.com/channel/UCx"),
            Err(PlatformError::InvalidInput)
        ));
    }
}
