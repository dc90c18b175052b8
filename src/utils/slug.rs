/// Lowercases, replaces runs of non-alphanumeric characters with a single
/// hyphen, and trims leading/trailing hyphens. Empty input (or input with no
/// alphanumeric characters) produces an empty slug; callers decide whether
/// that is acceptable.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut last_was_hyphen = true;

    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            last_was_hyphen = false;
        } else if !last_was_hyphen {
            slug.push('-');
            last_was_hyphen = true;
        }
    }

    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Disambiguates a base slug against `taken`, the number of existing slugs
/// sharing that prefix. Zero collisions keeps the base; otherwise the count
/// plus one is appended directly, so the third "senior-engineer" becomes
/// "senior-engineer3".
pub fn dedupe_slug(base: &str, taken: i64) -> String {
    if taken > 0 {
        format!("{}{}", base, taken + 1)
    } else {
        base.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_lowercases_and_hyphenates() {
        assert_eq!(slugify("Senior Rust Engineer"), "senior-rust-engineer");
        assert_eq!(slugify("C++ / Embedded!!"), "c-embedded");
        assert_eq!(slugify("  spaced   out  "), "spaced-out");
    }

    #[test]
    fn slugify_handles_degenerate_input() {
        assert_eq!(slugify(""), "");
        assert_eq!(slugify("!!!"), "");
        assert_eq!(slugify("--already--slugged--"), "already-slugged");
    }

    #[test]
    fn dedupe_appends_count_plus_one() {
        assert_eq!(dedupe_slug("senior-engineer", 0), "senior-engineer");
        assert_eq!(dedupe_slug("senior-engineer", 1), "senior-engineer2");
        assert_eq!(dedupe_slug("senior-engineer", 2), "senior-engineer3");
    }
}
