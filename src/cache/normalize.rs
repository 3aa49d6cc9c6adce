/// Canonical form used for every cache key: lowercase ASCII letters, digits and
/// single spaces.
pub fn normalize(input: &str) -> String {
    let lowered = input.to_lowercase();
    let kept: String = lowered
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c.is_whitespace())
        .collect();
    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Conservative word-overlap equivalence between two normalized instructions.
///
/// Word counts may differ by at most one and neither may exceed twice the other;
/// at least 80% of the shorter key's words must appear verbatim in the longer one.
pub fn fuzzy_equivalent(a: &str, b: &str) -> bool {
    let a_words: Vec<&str> = a.split_whitespace().collect();
    let b_words: Vec<&str> = b.split_whitespace().collect();
    if a_words.is_empty() || b_words.is_empty() {
        return false;
    }

    let (short, long) = if a_words.len() <= b_words.len() {
        (&a_words, &b_words)
    } else {
        (&b_words, &a_words)
    };
    if long.len() - short.len() > 1 || long.len() > short.len() * 2 {
        return false;
    }

    let shared = short.iter().filter(|w| long.contains(w)).count();
    shared as f64 / short.len() as f64 >= 0.8
}
