mod macros;

pub use macros::*;

/// Folds `string` into a URL-safe slug.
///
/// Characters are transliterated to ASCII, then lowercased. Every run of
/// characters that aren't ASCII alphanumerics (whitespace, apostrophes,
/// underscores, punctuation) becomes a single `-`. Leading and trailing
/// separators are dropped. The output consists only of `[a-z0-9-]` and never
/// begins or ends with `-`, so `slugify(slugify(x)) == slugify(x)`.
pub fn slugify(string: &str) -> String {
    let mut output = String::with_capacity(string.len());

    let mut need_dash = false;
    for ch in string.chars() {
        for b in deunicode::deunicode_char(ch).unwrap_or("-").bytes() {
            match b {
                b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' => {
                    if need_dash {
                        output.push('-');
                        need_dash = false;
                    }

                    output.push(b.to_ascii_lowercase() as char);
                }
                _ => need_dash = !output.is_empty(),
            }
        }
    }

    output
}

/// Returns `true` if `slug` is already in the form [`slugify()`] produces.
pub fn is_slug(slug: &str) -> bool {
    !slug.is_empty()
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && !slug.contains("--")
        && slug.bytes().all(|b| matches!(b, b'a'..=b'z' | b'0'..=b'9' | b'-'))
}

/// Returns `true` if `input` contains a `{{` placeholder opener.
pub fn has_placeholder(input: &str) -> bool {
    let mut slice = input.as_bytes();
    while let Some(i) = memchr::memchr(b'{', slice) {
        match slice.get(i + 1) {
            Some(b'{') => return true,
            Some(_) => slice = &slice[(i + 1)..],
            None => return false,
        }
    }

    false
}

/// Uppercases the first character of every whitespace-separated word.
pub fn title_case(string: &str) -> String {
    string.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
