//! Shared tokenizer for BM25F and MMR's Jaccard fallback (§4.5): lowercase,
//! split on non-alphanumeric, drop empty tokens.

pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_and_lowercases() {
        assert_eq!(tokenize("Hello, World!"), vec!["hello", "world"]);
    }

    #[test]
    fn drops_empty_tokens() {
        assert_eq!(tokenize("  a--b  "), vec!["a", "b"]);
    }
}
