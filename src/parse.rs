//! String-level parsing: abbreviated counter text, the `og:description`
//! preview line, phone numbers in bios, and file-name helpers.

use chrono::{DateTime, Local};
use regex::Regex;
use url::Url;

/// Aggregate counters parsed from a profile's link-preview description.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProfileCounters {
    pub followers: u64,
    pub following: u64,
    pub posts: u64,
}

/// Converts counter text like `"500"`, `"2K"` or `"1.5M"` to an integer.
///
/// Thousands separators (commas) are stripped, a trailing `K`/`M` multiplies
/// by 1e3/1e6, and the result is truncated. Unparseable input yields 0.
pub fn parse_count(text: &str) -> u64 {
    let cleaned = text.trim().replace(',', "");
    if cleaned.is_empty() {
        return 0;
    }

    let (digits, multiplier) = match cleaned.chars().last() {
        Some('M') | Some('m') => (&cleaned[..cleaned.len() - 1], 1_000_000f64),
        Some('K') | Some('k') => (&cleaned[..cleaned.len() - 1], 1_000f64),
        _ => (cleaned.as_str(), 1f64),
    };

    match digits.parse::<f64>() {
        Ok(value) if value >= 0.0 => (value * multiplier) as u64,
        _ => 0,
    }
}

/// Parses the Spanish-locale preview line Instagram embeds for link previews:
/// `"<n> seguidores, <n> siguiendo, <n> publicaciones - ..."`.
///
/// Segments are matched by keyword, so ordering changes are tolerated.
/// Missing or unparseable segments leave the corresponding counter at 0.
pub fn parse_meta_description(description: &str) -> ProfileCounters {
    let mut counters = ProfileCounters::default();

    let head = description.split(" - ").next().unwrap_or(description);
    for segment in head.split(',') {
        let Some(token) = segment.split_whitespace().next() else {
            continue;
        };
        if segment.contains("seguidor") {
            counters.followers = parse_count(token);
        } else if segment.contains("siguiendo") {
            counters.following = parse_count(token);
        } else if segment.contains("publicacion") {
            counters.posts = parse_count(token);
        }
    }

    counters
}

/// Extracts the candidate username from a profile link's `href`: the last
/// non-empty path segment, kept only if alphanumeric after stripping `.`/`_`.
pub fn username_from_href(href: &str) -> Option<String> {
    let absolute_path;
    let path: &str = match Url::parse(href) {
        Ok(url) => {
            absolute_path = url.path().to_string();
            &absolute_path
        }
        Err(_) => href.split(['?', '#']).next().unwrap_or(href),
    };
    let candidate = path.rsplit('/').find(|segment| !segment.is_empty())?;

    // Reject URL scheme remnants and surface paths like /accounts/login
    if candidate.contains(':') || candidate.contains('.') && candidate.contains("www") {
        return None;
    }

    let stripped: String = candidate.chars().filter(|c| *c != '.' && *c != '_').collect();
    if !stripped.is_empty() && stripped.chars().all(|c| c.is_ascii_alphanumeric()) {
        Some(candidate.to_string())
    } else {
        None
    }
}

/// Pulls phone numbers out of free-form bio text and normalizes them.
/// Bare Spanish 9-digit numbers get a `+34` prefix.
pub fn extract_phones(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }

    let patterns = [
        r"\+\d{1,4}[\s-]?\d{3}[\s-]?\d{3}[\s-]?\d{3}",
        r"\+\d{1,4}[\s-]?\d{9,12}",
        r"\b\d{3}[\s-]?\d{3}[\s-]?\d{3}\b",
        r"\b\d{9}\b",
    ];

    let mut phones = Vec::new();
    for pattern in patterns {
        let Ok(re) = Regex::new(pattern) else {
            continue;
        };
        for found in re.find_iter(text) {
            let normalized: String = found
                .as_str()
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '+')
                .collect();
            if normalized.len() < 9 {
                continue;
            }
            let normalized = if !normalized.starts_with('+') && normalized.len() == 9 {
                format!("+34{normalized}")
            } else {
                normalized
            };
            if !phones.contains(&normalized) {
                phones.push(normalized);
            }
        }
    }

    phones
}

/// Collapses whitespace runs and drops control characters.
pub fn clean_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_was_space = true;
    for c in text.trim().chars() {
        if c.is_control() {
            continue;
        }
        if c.is_whitespace() {
            if !last_was_space {
                out.push(' ');
            }
            last_was_space = true;
        } else {
            out.push(c);
            last_was_space = false;
        }
    }
    out.trim_end().to_string()
}

/// Timestamp suffix used in output file names.
pub fn file_timestamp(now: DateTime<Local>) -> String {
    now.format("%Y%m%d_%H%M%S").to_string()
}

/// Strips characters that are unsafe in file names and bounds the length.
pub fn sanitize_filename(filename: &str) -> String {
    let mut sanitized: String = filename
        .trim()
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_whitespace() => '_',
            c => c,
        })
        .collect();

    if sanitized.len() > 100 {
        let (name, ext) = match sanitized.rfind('.') {
            Some(idx) => (sanitized[..idx].to_string(), sanitized[idx..].to_string()),
            None => (sanitized.clone(), String::new()),
        };
        let mut cut = 95.min(name.len());
        while !name.is_char_boundary(cut) {
            cut -= 1;
        }
        sanitized = format!("{}{}", &name[..cut], ext);
    }

    sanitized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_parser_grid() {
        assert_eq!(parse_count("500"), 500);
        assert_eq!(parse_count("2K"), 2_000);
        assert_eq!(parse_count("1.5M"), 1_500_000);
        assert_eq!(parse_count("abc"), 0);
        assert_eq!(parse_count("1,234"), 1_234);
        assert_eq!(parse_count(""), 0);
        assert_eq!(parse_count("  3k "), 3_000);
    }

    #[test]
    fn meta_description_spanish() {
        let counters =
            parse_meta_description("150 seguidores, 80 siguiendo, 12 publicaciones - Foo (@foo)");
        assert_eq!(counters.followers, 150);
        assert_eq!(counters.following, 80);
        assert_eq!(counters.posts, 12);
    }

    #[test]
    fn meta_description_abbreviated() {
        let counters =
            parse_meta_description("1M seguidores, 747 siguiendo, 11K publicaciones - Bar");
        assert_eq!(counters.followers, 1_000_000);
        assert_eq!(counters.following, 747);
        assert_eq!(counters.posts, 11_000);
    }

    #[test]
    fn meta_description_garbage_is_zeroed() {
        let counters = parse_meta_description("not a counter line at all");
        assert_eq!(counters, ProfileCounters::default());
    }

    #[test]
    fn username_extraction() {
        assert_eq!(
            username_from_href("https://www.instagram.com/some.user_9/"),
            Some("some.user_9".to_string())
        );
        assert_eq!(username_from_href("/plainuser/"), Some("plainuser".to_string()));
        assert_eq!(username_from_href("https://example.com/a b/"), None);
        assert_eq!(username_from_href(""), None);
        assert_eq!(username_from_href("/._/"), None);
    }

    #[test]
    fn phone_extraction_and_normalization() {
        let phones = extract_phones("Pedidos: +34 612 345 678 o 912345678");
        assert_eq!(phones, vec!["+34612345678".to_string(), "+34912345678".to_string()]);
    }

    #[test]
    fn phone_extraction_deduplicates() {
        let phones = extract_phones("612345678 y otra vez 612 345 678");
        assert_eq!(phones, vec!["+34612345678".to_string()]);
    }

    #[test]
    fn phone_extraction_empty_bio() {
        assert!(extract_phones("").is_empty());
        assert!(extract_phones("sin contacto").is_empty());
    }

    #[test]
    fn clean_text_collapses_whitespace() {
        assert_eq!(clean_text("  hola\n\tmundo  "), "hola mundo");
    }

    #[test]
    fn filename_sanitization() {
        assert_eq!(sanitize_filename("a/b:c*d.xlsx"), "a_b_c_d.xlsx");
        let long = format!("{}.csv", "x".repeat(200));
        assert!(sanitize_filename(&long).len() <= 100);
    }
}
