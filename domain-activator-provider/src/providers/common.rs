//! Name handling shared by the clients

/// Strip the trailing dot and lowercase a DNS name.
pub fn normalize_domain_name(name: &str) -> String {
    name.trim_end_matches('.').to_ascii_lowercase()
}

/// Compare two DNS names ignoring case and a trailing dot.
pub fn names_match(a: &str, b: &str) -> bool {
    normalize_domain_name(a) == normalize_domain_name(b)
}

/// Percent-encode a single path segment.
pub fn encode_segment(segment: &str) -> String {
    urlencoding::encode(segment).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_trailing_dot_and_case() {
        assert_eq!(normalize_domain_name("Acme-Demo.TEST."), "acme-demo.test");
        assert!(names_match("_dmarc.acme-demo.test.", "_DMARC.acme-demo.test"));
        assert!(!names_match("acme-demo.test", "www.acme-demo.test"));
    }

    #[test]
    fn encodes_path_segments() {
        assert_eq!(encode_segment("a b/c"), "a%20b%2Fc");
    }
}
