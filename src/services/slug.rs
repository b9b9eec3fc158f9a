//! URL slugs

/// Derive a slug from a display name: lowercase, separators and punctuation
/// collapsed to single hyphens, no leading or trailing hyphen. Non-ASCII
/// letters are kept.
pub fn generate_slug(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_hyphen = false;

    for c in name.trim().to_lowercase().chars() {
        if c.is_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        } else {
            pending_hyphen = true;
        }
    }

    slug
}

/// Whether `slug` is already in canonical form
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty() && generate_slug(slug) == slug
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_generate_slug() {
        assert_eq!(generate_slug("Hello World"), "hello-world");
        assert_eq!(generate_slug("Hello, World!"), "hello-world");
        assert_eq!(generate_slug("  Acme   Labs  "), "acme-labs");
        assert_eq!(generate_slug("state_of_the_art"), "state-of-the-art");
        assert_eq!(generate_slug("Université Lyon 2"), "université-lyon-2");
        assert_eq!(generate_slug("!!!"), "");
    }

    #[test]
    fn test_is_valid_slug() {
        assert!(is_valid_slug("acme-labs"));
        assert!(!is_valid_slug("Acme Labs"));
        assert!(!is_valid_slug("-acme"));
        assert!(!is_valid_slug(""));
    }

    proptest! {
        #[test]
        fn generated_slugs_are_canonical(name in "\\PC{0,40}") {
            let slug = generate_slug(&name);
            prop_assert!(!slug.starts_with('-'));
            prop_assert!(!slug.ends_with('-'));
            prop_assert!(!slug.contains("--"));
            prop_assert_eq!(generate_slug(&slug), slug.clone());
        }
    }
}
