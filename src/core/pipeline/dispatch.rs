use regex::Regex;

/// How a requested token is retrieved from a tile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenRoute {
    /// Computed index (e.g. `ndvi`)
    Index,
    /// Raw band read at the target resolution (e.g. `B05`)
    RawBand,
    /// Neither; warned and skipped
    Unsupported,
}

/// Classify a token; index names match case-insensitively and take precedence over the
/// raw band pattern
pub fn classify_token<S: AsRef<str>>(
    token: &str,
    supported: &[S],
    raw_bands: &Regex,
) -> TokenRoute {
    if supported
        .iter()
        .any(|name| name.as_ref().eq_ignore_ascii_case(token))
    {
        TokenRoute::Index
    } else if raw_bands.is_match(token) {
        TokenRoute::RawBand
    } else {
        TokenRoute::Unsupported
    }
}
