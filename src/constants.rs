//! Application constants

/// Maximum accepted body size for media uploads (200 MB)
pub const MAX_MEDIA_UPLOAD_SIZE: usize = 200 * 1024 * 1024;

/// Pre-signed upload URL validity window (15 minutes)
pub const UPLOAD_URL_EXPIRY_SECS: i64 = 15 * 60;

/// Per-call timeout for remote platform APIs (seconds)
pub const PLATFORM_CALL_TIMEOUT_SECS: u64 = 30;

/// Prefix required on every API key
pub const API_KEY_PREFIX: &str = "sk_";
