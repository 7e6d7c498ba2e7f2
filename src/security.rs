use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Matches <script ...>...</script> blocks, case-insensitively, including
    // unclosed ones at the end of the input.
    static ref SCRIPT_RE: Regex =
        Regex::new(r"(?is)<script\b[^>]*>.*?(</script>|$)").unwrap();
    // Inline event handlers like onclick= / onerror= inside markup.
    static ref EVENT_HANDLER_RE: Regex = Regex::new(r"(?i)\bon\w+\s*=").unwrap();
}

/// Sanitizes free-text input against script injection before it is persisted.
///
/// Script blocks and inline event handlers are stripped, then any remaining
/// angle brackets are entity-escaped so the text is inert when rendered.
pub fn sanitize_text(input: &str) -> String {
    let no_scripts = SCRIPT_RE.replace_all(input, "");
    let no_handlers = EVENT_HANDLER_RE.replace_all(&no_scripts, "");

    no_handlers
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .trim()
        .to_string()
}
