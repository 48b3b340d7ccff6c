//! URL slugs derived from resource titles.

use deunicode::deunicode;

const FALLBACK_SLUG: &str = "resource";
const MAX_SLUG_LEN: usize = 80;

/// Transliterates `title` to ASCII and reduces it to lowercase words joined by `-`.
///
/// Titles with no usable characters produce `resource`.
pub fn slugify(title: &str) -> String {
    let ascii = deunicode(title);
    let mut slug = String::with_capacity(ascii.len());
    let mut pending_dash = false;

    for ch in ascii.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
        if slug.len() >= MAX_SLUG_LEN {
            break;
        }
    }

    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_basic_title() {
        assert_eq!(slugify("Logan River: Daily Flow (2013)"), "logan-river-daily-flow-2013");
    }

    #[test]
    fn slugify_transliterates() {
        assert_eq!(slugify("Río Bravo Ökologie"), "rio-bravo-okologie");
    }

    #[test]
    fn slugify_falls_back_when_empty() {
        assert_eq!(slugify("!!!"), "resource");
        assert_eq!(slugify(""), "resource");
    }

    #[test]
    fn slugify_truncates_long_titles() {
        let title = "word ".repeat(40);
        let slug = slugify(&title);
        assert!(slug.len() <= MAX_SLUG_LEN);
        assert!(!slug.ends_with('-'));
    }
}
