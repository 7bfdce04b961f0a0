//! Label locales shipped with the BirdNET model.

/// Locale used when the configured one is not available.
pub const FALLBACK_LOCALE: &str = "en-us";

/// Every locale a label file exists for.
pub const SUPPORTED_LOCALES: &[&str] = &[
    "af", "ar", "bg", "ca", "cs", "da", "de", "el", "en-uk", "en-us", "es", "et", "fi", "fr",
    "he", "hr", "hu", "id", "is", "it", "ja", "ko", "lt", "lv", "ml", "nl", "no", "pl", "pt-br",
    "pt-pt", "ro", "ru", "sk", "sl", "sr", "sv", "th", "tr", "uk", "zh",
];

/// Maps a user-supplied locale onto a supported one.
///
/// Matching is case-insensitive and accepts `_` in place of `-`.  A bare
/// `en` or `pt` resolves to its most common regional variant.
pub fn normalize_locale(input: &str) -> Option<&'static str> {
    let wanted = input.trim().to_ascii_lowercase().replace('_', "-");
    let wanted = match wanted.as_str() {
        "en" => "en-us",
        "en-gb" => "en-uk",
        "pt" => "pt-pt",
        other => other,
    };
    SUPPORTED_LOCALES
        .iter()
        .copied()
        .find(|locale| *locale == wanted)
}
