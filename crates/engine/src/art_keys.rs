use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArtKeyError {
    #[error("art key must not be empty")]
    Empty,
    #[error("art key must not start with '/'")]
    LeadingSlash,
    #[error("art key must not end with '/'")]
    TrailingSlash,
    #[error("art key must not contain '\\\\'")]
    Backslash,
    #[error("art key must not contain '..'")]
    ParentTraversal,
    #[error("art key contains invalid character '{character}'")]
    InvalidCharacter { character: char },
}

/// Art keys name pose sprites, e.g. `people/sittingholding`.
pub(crate) fn validate_art_key(key: &str) -> Result<(), ArtKeyError> {
    if key.is_empty() {
        return Err(ArtKeyError::Empty);
    }
    if key.starts_with('/') {
        return Err(ArtKeyError::LeadingSlash);
    }
    if key.ends_with('/') {
        return Err(ArtKeyError::TrailingSlash);
    }
    if key.contains('\\') {
        return Err(ArtKeyError::Backslash);
    }
    if key.contains("..") {
        return Err(ArtKeyError::ParentTraversal);
    }
    if let Some(character) = key
        .chars()
        .find(|ch| !(ch.is_ascii_lowercase() || ch.is_ascii_digit() || matches!(ch, '_' | '/' | '-')))
    {
        return Err(ArtKeyError::InvalidCharacter { character });
    }
    Ok(())
}
