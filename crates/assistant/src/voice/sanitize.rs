//! Strip markdown before text is handed to a speech synthesizer

use once_cell::sync::Lazy;
use regex::Regex;

static MARKUP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*\*|\*|_|#+|`+|>\s?").expect("valid markup regex"));
static LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[(.*?)\]\(.*?\)").expect("valid link regex"));
static NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n+").expect("valid newline regex"));

/// Speakable version of `text`; may be empty.
pub fn sanitize_for_speech(text: &str) -> String {
    let text = MARKUP.replace_all(text, "");
    let text = LINK.replace_all(&text, "$1");
    let text = NEWLINES.replace_all(&text, " ");
    text.trim().to_string()
}
