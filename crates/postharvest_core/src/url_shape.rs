//! Helpers that read meaning out of the shape of a URL.
use url::Url;

use crate::PageSource;

/// First path segments that name a site section rather than a profile.
const RESERVED_SEGMENTS: &[&str] = &[
    "p", "reel", "reels", "tv", "stories", "explore", "accounts", "direct",
];

/// Path markers that introduce a post identifier.
const POST_MARKERS: &[&str] = &["p", "reel", "tv"];

/// Name used when no profile can be read from a location.
pub const UNKNOWN_USERNAME: &str = "unknown";

fn path_segments(url: &Url) -> Vec<&str> {
    url.path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).collect())
        .unwrap_or_default()
}

fn is_reserved(segment: &str) -> bool {
    RESERVED_SEGMENTS
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(segment))
}

/// The profile a location belongs to: its first path segment unless that
/// segment names a site section.
pub fn profile_segment(url: &Url) -> Option<&str> {
    path_segments(url)
        .first()
        .copied()
        .filter(|segment| !is_reserved(segment))
}

/// Resolves the username of a target from its addressable location.
///
/// Returns `None` when the location is not a URL at all; a URL without a
/// profile segment resolves to [`UNKNOWN_USERNAME`].
pub fn username_from_location(location: &str) -> Option<String> {
    let url = Url::parse(location.trim()).ok()?;
    Some(
        profile_segment(&url)
            .map(ToOwned::to_owned)
            .unwrap_or_else(|| UNKNOWN_USERNAME.to_string()),
    )
}

/// Classifies the rendered surface from its URL.
pub fn classify_page(location: &str) -> PageSource {
    let Ok(url) = Url::parse(location.trim()) else {
        return PageSource::Other;
    };
    let segments = path_segments(&url);
    if segments.iter().any(|s| s.eq_ignore_ascii_case("reels")) {
        return PageSource::ReelsTab;
    }
    match segments.as_slice() {
        [profile] if !is_reserved(profile) => PageSource::ProfileGrid,
        _ => PageSource::Other,
    }
}

/// Canonical form of a post link: `<origin>/<marker>/<id>/`, without query or
/// fragment and without any profile prefix. Stories keep their two-level path.
///
/// Returns `None` if `href` does not point at a post, reel or story.
pub fn canonical_post_url(href: &str, base: Option<&Url>) -> Option<String> {
    let trimmed = href.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    let resolved = match Url::parse(trimmed) {
        Ok(url) => url,
        Err(_) => base?.join(trimmed).ok()?,
    };
    if !matches!(resolved.scheme(), "http" | "https") {
        return None;
    }
    let origin = resolved.origin().ascii_serialization();
    let segments = path_segments(&resolved);

    for (idx, segment) in segments.iter().enumerate() {
        let lower = segment.to_ascii_lowercase();
        if POST_MARKERS.contains(&lower.as_str()) {
            let id = segments.get(idx + 1)?;
            return Some(format!("{origin}/{lower}/{id}/"));
        }
        if lower == "stories" {
            let rest: Vec<&str> = segments.iter().skip(idx + 1).take(2).copied().collect();
            if rest.is_empty() {
                return None;
            }
            return Some(format!("{origin}/stories/{}/", rest.join("/")));
        }
    }
    None
}
