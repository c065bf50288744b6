use regex::Regex;
use std::sync::LazyLock;

static ANGLE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[<>]").expect("valid regex"));
static JS_SCHEME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)javascript:").expect("valid regex"));
static HANDLER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)on\w+=").expect("valid regex"));

/// Strip markup and inline script vectors from user-supplied query text.
pub fn sanitize_input(input: &str) -> String {
    let text = ANGLE_RE.replace_all(input, "");
    let text = JS_SCHEME_RE.replace_all(&text, "");
    let text = HANDLER_RE.replace_all(&text, "");
    text.trim().to_string()
}

/// True for absolute http(s) URLs with a host.
pub fn is_valid_url(candidate: &str) -> bool {
    match url::Url::parse(candidate) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https") && parsed.host_str().is_some(),
        Err(_) => false,
    }
}

/// Cut to at most `max_chars` characters, marking the cut with "...".
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
