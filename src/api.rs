//! Contract with the storefront backend.

use thiserror::Error;

pub const GAMES_PATH: &str = "/api/games";
pub const ADD_TO_CART_PATH: &str = "/add_to_cart";
pub const CHAT_PATH: &str = "/chat";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("card id `{0}` is not a numeric game id")]
    InvalidCardId(String),
    #[error("request failed: {0}")]
    Network(String),
    #[error("backend answered with status {0}")]
    Status(u16),
    #[error("malformed screenshot list: {0}")]
    Decode(String),
}

/// Backend game routes only accept integer ids.
pub fn screenshots_path(card_id: &str) -> Result<String, FetchError> {
    if card_id.is_empty() || !card_id.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(FetchError::InvalidCardId(card_id.to_string()));
    }

    Ok(format!("/api/game/{card_id}/screenshots"))
}

/// Drops null and blank entries, keeping backend order.
pub fn clean_screenshots(raw: Vec<Option<String>>) -> Vec<String> {
    raw.into_iter()
        .flatten()
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn screenshots_path_requires_numeric_id() {
        assert_eq!(screenshots_path("7").as_deref(), Ok("/api/game/7/screenshots"));
        assert_eq!(
            screenshots_path("../admin"),
            Err(FetchError::InvalidCardId("../admin".to_string()))
        );
        assert!(screenshots_path("").is_err());
    }

    #[test]
    fn clean_screenshots_skips_blank_entries() {
        let cleaned = clean_screenshots(vec![
            Some("/s1.jpg".to_string()),
            None,
            Some("   ".to_string()),
            Some("/s2.jpg".to_string()),
        ]);
        assert_eq!(cleaned, vec!["/s1.jpg", "/s2.jpg"]);
    }
}
