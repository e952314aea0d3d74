//! Romanisation of Han characters before slugification.
//!
//! Han characters become toneless pinyin, one syllable per character,
//! separated by spaces, so "中国" reads as two words. Every other character
//! is copied as-is; Cyrillic and accented Latin are left to `slug::slugify`,
//! which transliterates through deunicode.
//!
//! Example:
//!   "学习 Rust" -> "xue xi Rust"
use pinyin::ToPinyin;

/// Replace Han characters in `text` with spaced pinyin syllables.
pub fn to_latin(text: &str) -> String {
    let mut out = String::with_capacity(text.len() * 2);

    // Syllables are kept apart from each other and from adjacent words.
    let mut last_was_hanzi = false;

    for ch in text.chars() {
        if let Some(py) = ch.to_pinyin() {
            if out.chars().last().is_some_and(char::is_alphanumeric) {
                out.push(' ');
            }
            out.push_str(py.plain());
            last_was_hanzi = true;
            continue;
        }
        if last_was_hanzi && ch.is_alphanumeric() {
            out.push(' ');
        }
        last_was_hanzi = false;
        out.push(ch);
    }

    out
}
