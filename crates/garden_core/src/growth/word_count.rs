//! Word counting over note content.
//!
//! A "word" is one CJK ideograph or one contiguous run of Latin letters,
//! counted after markup that carries no prose has been removed.

use once_cell::sync::Lazy;
use regex::Regex;

static FENCED_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```[\s\S]*?```").expect("valid fenced code regex"));
static INLINE_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"`[^`]*`").expect("valid inline code regex"));
static IMAGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!\[[^\]]*\]\([^)]+\)").expect("valid image regex"));
static LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]+)\]\([^)]+\)").expect("valid link regex"));
static HTML_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));
static ENTITY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(?:[A-Za-z]+|#[0-9]+);").expect("valid entity regex"));
static LINE_MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*(?:#+|[-*+]|>)[ \t]+").expect("valid marker regex"));
static CJK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\x{4e00}-\x{9fa5}]").expect("valid cjk regex"));
static LATIN_WORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z]+").expect("valid latin word regex"));

/// CJK character count plus Latin token count of `content`.
pub fn count_words(content: &str) -> u64 {
    if content.trim().is_empty() {
        return 0;
    }

    let cleaned = FENCED_CODE_RE.replace_all(content, " ");
    let cleaned = INLINE_CODE_RE.replace_all(&cleaned, " ");
    // Images before links: an image is a link pattern behind a `!`.
    let cleaned = IMAGE_RE.replace_all(&cleaned, " ");
    let cleaned = LINK_RE.replace_all(&cleaned, "$1");
    let cleaned = HTML_TAG_RE.replace_all(&cleaned, " ");
    let cleaned = ENTITY_RE.replace_all(&cleaned, " ");
    let cleaned = LINE_MARKER_RE.replace_all(&cleaned, "");

    let cjk = CJK_RE.find_iter(&cleaned).count() as u64;
    let latin_only = CJK_RE.replace_all(&cleaned, " ");
    let latin = LATIN_WORD_RE.find_iter(&latin_only).count() as u64;
    cjk + latin
}

#[cfg(test)]
mod tests {
    use super::count_words;

    #[test]
    fn counts_cjk_characters_and_latin_runs() {
        assert_eq!(count_words(""), 0);
        assert_eq!(count_words("hello world"), 2);
        assert_eq!(count_words("学习Rust语言"), 5);
        assert_eq!(count_words("don't stop"), 3);
        assert_eq!(count_words("123 456 !!!"), 0);
    }

    #[test]
    fn code_and_images_are_ignored() {
        assert_eq!(count_words("before ```let x = 1;``` after"), 2);
        assert_eq!(count_words("run `cargo test` now"), 2);
        assert_eq!(count_words("![diagram alt](pic.png) caption"), 1);
    }

    #[test]
    fn links_keep_their_text() {
        assert_eq!(count_words("[two words](https://example.com)"), 2);
    }

    #[test]
    fn markers_tags_and_entities_are_not_words() {
        assert_eq!(count_words("# Title\n- item\n> quote"), 3);
        assert_eq!(
            count_words(r#"<p>fish &amp; chips</p><a class="note-link" data-note-id="x">see</a>"#),
            3
        );
    }
}
