//! "Did you mean" suggestions for misspelled identifiers such as engine names.

/// Edit distance between two names, counted in characters.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=b.len()).collect();

    for (i, ca) in a.chars().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitute = diagonal + usize::from(ca != *cb);
            diagonal = row[j + 1];
            row[j + 1] = substitute.min(row[j] + 1).min(diagonal + 1);
        }
    }

    row[b.len()]
}

/// Closest candidate within `max_distance`. An exact match is not a
/// suggestion.
pub fn best_match(
    needle: &str,
    candidates: &[&'static str],
    max_distance: usize,
) -> Option<&'static str> {
    let needle = needle.to_ascii_lowercase();
    candidates
        .iter()
        .map(|c| (*c, levenshtein(&needle, c)))
        .min_by_key(|(_, dist)| *dist)
        .filter(|(_, dist)| (1..=max_distance).contains(dist))
        .map(|(c, _)| c)
}
