/// Request classification
///
/// Every request the gateway sees falls into exactly one class, decided from
/// the path alone (the query string is ignored):
///
/// ```text
/// /api/<critical prefix>...     ApiCritical   network, cache fallback, workout queue
/// *.mp4, *.webm, ...            Video         network only
/// /, *.js, *.css, *.png, ...    Static        network first, cache fallback
/// anything else                 Passthrough   network only
/// ```

/// API prefixes the client needs while offline
pub const CRITICAL_API_PREFIXES: &[&str] = &[
    "/api/workouts",
    "/api/schedule",
    "/api/sessions",
    "/api/v1/gamification",
    "/api/auth/me",
];

pub const WORKOUTS_PATH: &str = "/api/workouts";

const STATIC_EXTENSIONS: &[&str] = &[
    "html", "js", "mjs", "css", "json", "webmanifest", "png", "jpg", "jpeg", "gif", "svg", "webp",
    "ico", "woff", "woff2", "ttf",
];

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "mov", "m4v", "ogv", "mkv"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
    ApiCritical,
    Static,
    Video,
    Passthrough,
}

impl RequestClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestClass::ApiCritical => "api_critical",
            RequestClass::Static => "static",
            RequestClass::Video => "video",
            RequestClass::Passthrough => "passthrough",
        }
    }
}

/// True if `path` is `prefix` or a sub-path of it
fn has_path_prefix(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

fn extension(path: &str) -> Option<String> {
    let last = path.rsplit('/').next()?;
    let (_, ext) = last.rsplit_once('.')?;
    Some(ext.to_ascii_lowercase())
}

/// Classifies a request path (with or without a query string)
pub fn classify(path_and_query: &str) -> RequestClass {
    let path = path_and_query.split('?').next().unwrap_or_default();

    if path.starts_with("/api/") {
        return if CRITICAL_API_PREFIXES.iter().any(|p| has_path_prefix(path, p)) {
            RequestClass::ApiCritical
        } else {
            RequestClass::Passthrough
        };
    }

    match extension(path) {
        Some(ext) if VIDEO_EXTENSIONS.contains(&ext.as_str()) => RequestClass::Video,
        Some(ext) if STATIC_EXTENSIONS.contains(&ext.as_str()) => RequestClass::Static,
        None if path == "/" => RequestClass::Static,
        _ => RequestClass::Passthrough,
    }
}

/// A workout write the gateway must keep for replay
pub fn is_workout_write(method: &str, path_and_query: &str) -> bool {
    let path = path_and_query.split('?').next().unwrap_or_default();
    method.eq_ignore_ascii_case("POST") && path.trim_end_matches('/') == WORKOUTS_PATH
}

/// Video responses are never cached, whatever the URL looked like
pub fn is_video_content_type(content_type: &str) -> bool {
    content_type.trim().to_ascii_lowercase().starts_with("video/")
}
