//! Text helpers: HTML stripping, keyword extraction and Jaccard similarity.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

/// Words ignored by keyword extraction, Indonesian and English.
///
/// Only words longer than three characters matter; shorter ones are dropped
/// by length anyway.
pub const STOP_WORDS: &[&str] = &[
    // Indonesian
    "adalah", "akan", "atau", "bagaimana", "bahwa", "banyak", "belum", "bisa", "dalam",
    "dapat", "dari", "dengan", "harus", "hanya", "juga", "kami", "karena", "kita", "lebih",
    "masih", "mereka", "oleh", "pada", "para", "saat", "sangat", "sebagai", "sedang",
    "sudah", "tanpa", "telah", "tersebut", "tentang", "tidak", "untuk", "yang", "anda",
    "ingin", "agar", "cara", "jika", "kalau", "semua", "setiap", "sini", "situ",
    // English
    "about", "after", "also", "been", "before", "being", "could", "does", "each", "from",
    "have", "here", "into", "just", "like", "more", "most", "only", "other", "over",
    "should", "some", "such", "than", "that", "their", "them", "then", "there", "these",
    "they", "this", "those", "very", "were", "what", "when", "where", "which", "while",
    "will", "with", "would", "your",
];

fn tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"<[^>]*>").expect("static pattern"))
}

fn numeric_entity_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"&#(x[0-9a-fA-F]+|[0-9]+);").expect("static pattern"))
}

fn non_word_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\W+").expect("static pattern"))
}

/// Plain text of an HTML fragment with common entities decoded and
/// whitespace collapsed.
pub fn strip_html(html: &str) -> String {
    let without_tags = tag_pattern().replace_all(html, " ");
    let decoded = decode_entities(&without_tags);
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn decode_entities(text: &str) -> String {
    let numeric = numeric_entity_pattern().replace_all(text, |caps: &regex::Captures| {
        let code = &caps[1];
        let parsed = match code.strip_prefix('x') {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => code.parse().ok(),
        };
        parsed
            .and_then(char::from_u32)
            .map_or_else(|| caps[0].to_string(), String::from)
    });

    numeric
        .replace("&nbsp;", " ")
        .replace("&hellip;", "\u{2026}")
        .replace("&quot;", "\"")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// Escapes plain text for inclusion in an HTML fragment.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// First `n` characters of `text`.
pub fn take_chars(text: &str, n: usize) -> &str {
    match text.char_indices().nth(n) {
        Some((byte, _)) => &text[..byte],
        None => text,
    }
}

/// Byte offset of the `n`th character, or the length if out of range.
pub fn char_to_byte(text: &str, n: usize) -> usize {
    text.char_indices().nth(n).map_or(text.len(), |(byte, _)| byte)
}

/// Lowercased words longer than three characters, minus stop words.
pub fn keywords(text: &str) -> HashSet<String> {
    let lower = text.to_lowercase();
    non_word_pattern()
        .split(&lower)
        .filter(|word| word.chars().count() > 3)
        .filter(|word| !STOP_WORDS.contains(word))
        .map(str::to_string)
        .collect()
}

/// |a ∩ b| / |a ∪ b|, 0 when both are empty.
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Jaccard similarity of the keyword sets of two texts.
pub fn keyword_similarity(a: &str, b: &str) -> f64 {
    jaccard(&keywords(a), &keywords(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_html() {
        assert_eq!(
            strip_html("<p>Hello <strong>world</strong></p>\n<p>again&#8217;s</p>"),
            "Hello world again\u{2019}s"
        );
        assert_eq!(strip_html("Tom &amp; Jerry&nbsp;&hellip;"), "Tom & Jerry \u{2026}");
        assert_eq!(strip_html(""), "");
    }

    #[test]
    fn test_keywords_filters_short_and_stop_words() {
        let words = keywords("Cara Migrasi WordPress yang Aman dengan Cepat, for the win!");

        assert!(words.contains("migrasi"));
        assert!(words.contains("wordpress"));
        assert!(words.contains("cepat"));
        assert!(!words.contains("yang"));
        assert!(!words.contains("dengan"));
        assert!(!words.contains("cara"));
        assert!(words.contains("aman"));
        assert!(!words.contains("the"));
        assert!(!words.contains("win"));
    }

    #[test]
    fn test_jaccard() {
        let a = keywords("hosting murah cepat");
        let b = keywords("hosting cepat stabil");

        assert!((jaccard(&a, &b) - 0.5).abs() < f64::EPSILON);
        assert_eq!(jaccard(&HashSet::new(), &HashSet::new()), 0.0);
        assert_eq!(keyword_similarity("hosting", "hosting"), 1.0);
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<img alt="a&b">"#),
            "&lt;img alt=&quot;a&amp;b&quot;&gt;"
        );
        assert_eq!(escape_html("plain"), "plain");
    }

    #[test]
    fn test_char_helpers_respect_multibyte() {
        let text = "héllo wörld";
        assert_eq!(take_chars(text, 5), "héllo");
        assert_eq!(take_chars(text, 100), text);
        assert_eq!(&text[char_to_byte(text, 6)..], "wörld");
    }
}
