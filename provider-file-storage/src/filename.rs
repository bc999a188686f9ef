//! Filename derivation from note titles
//!
//! Titles become filenames, so everything a path cannot carry has to be
//! scrubbed out: separator and reserved characters, control characters,
//! and excessive length. Blank titles fall back to "Untitled".

/// Longest title part a derived filename may keep, in characters.
const MAX_STEM_CHARS: usize = 120;

const ILLEGAL_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Reduce a note title to a safe filename stem.
pub fn sanitize_title(title: &str) -> String {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return "Untitled".to_string();
    }

    let cleaned: String = trimmed
        .chars()
        .map(|c| {
            if ILLEGAL_CHARS.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .take(MAX_STEM_CHARS)
        .collect();

    // Scrubbing can leave nothing but whitespace behind.
    let cleaned = cleaned.trim().to_string();
    if cleaned.is_empty() {
        "Untitled".to_string()
    } else {
        cleaned
    }
}

/// File extension for a note.
pub fn extension(is_markdown: bool) -> &'static str {
    if is_markdown {
        "md"
    } else {
        "txt"
    }
}

/// Derived filename without collision handling.
pub fn file_name(title: &str, is_markdown: bool) -> String {
    format!("{}.{}", sanitize_title(title), extension(is_markdown))
}

/// Derived filename with a collision counter, e.g. `Groceries (2).md`.
pub fn file_name_with_suffix(title: &str, is_markdown: bool, counter: u32) -> String {
    format!(
        "{} ({}).{}",
        sanitize_title(title),
        counter,
        extension(is_markdown)
    )
}

/// Whether a directory entry name is a note file this backend owns.
pub fn is_note_file(name: &str) -> bool {
    !name.starts_with('.')
        && (name.to_ascii_lowercase().ends_with(".md")
            || name.to_ascii_lowercase().ends_with(".txt"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_illegal_characters_are_replaced() {
        assert_eq!(sanitize_title("a/b\\c:d*e?f"), "a_b_c_d_e_f");
        assert_eq!(sanitize_title("quotes \"here\""), "quotes _here_");
    }

    #[test]
    fn test_blank_titles_become_untitled() {
        assert_eq!(sanitize_title(""), "Untitled");
        assert_eq!(sanitize_title("   "), "Untitled");
        assert_eq!(sanitize_title("///"), "Untitled");
    }

    #[test]
    fn test_overlong_titles_are_capped() {
        let long = "x".repeat(500);
        assert_eq!(sanitize_title(&long).chars().count(), 120);
    }

    #[test]
    fn test_extension_follows_markdown_flag() {
        assert_eq!(file_name("Trip plan", true), "Trip plan.md");
        assert_eq!(file_name("Trip plan", false), "Trip plan.txt");
        assert_eq!(
            file_name_with_suffix("Trip plan", true, 2),
            "Trip plan (2).md"
        );
    }

    #[test]
    fn test_note_file_detection() {
        assert!(is_note_file("a.md"));
        assert!(is_note_file("B.TXT"));
        assert!(!is_note_file(".hidden.md"));
        assert!(!is_note_file("image.png"));
    }
}
