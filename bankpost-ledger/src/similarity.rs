//! Case, punctuation and word-order insensitive string similarity.

use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

static SDN_BHD_ABBREV: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bS\s*/\s*B\b").expect("valid regex"));

/// Canonical spelling used before comparing names.
pub fn normalize(text: &str) -> String {
    let upper = text.to_uppercase().replace("&AMP;", "&").replace('É', "E");
    let upper = SDN_BHD_ABBREV.replace_all(&upper, " SDN BHD ");

    let spaced: String = upper
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    spaced
        .split_whitespace()
        .flat_map(|tok| match tok {
            "SDNBHD" => vec!["SDN", "BHD"],
            "SDNBH" => vec!["SDN", "BHD"],
            "BH" => vec!["BHD"],
            other => vec![other],
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Sorted, de-duplicated tokens of the normalized text.
pub fn tokens(text: &str) -> BTreeSet<String> {
    normalize(text)
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Token-set similarity of a narration against a pattern, in `[0, 1]`.
///
/// Not symmetric: a pattern whose tokens all appear in the narration scores
/// 1.0, but a short narration contained in a longer pattern does not.
pub fn token_set_ratio(text: &BTreeSet<String>, pattern: &BTreeSet<String>) -> f64 {
    if text.is_empty() || pattern.is_empty() {
        return 0.0;
    }

    let shared = join(text.intersection(pattern));
    let only_text = join(text.difference(pattern));
    let only_pattern = join(pattern.difference(text));

    let with_text = concat(&shared, &only_text);
    let with_pattern = concat(&shared, &only_pattern);

    let mut best = ratio(&with_text, &with_pattern);
    if !shared.is_empty() {
        best = best.max(ratio(&shared, &with_pattern));
    }
    best
}

fn join<'a>(it: impl Iterator<Item = &'a String>) -> String {
    it.map(String::as_str).collect::<Vec<_>>().join(" ")
}

fn concat(head: &str, tail: &str) -> String {
    match (head.is_empty(), tail.is_empty()) {
        (true, _) => tail.to_string(),
        (_, true) => head.to_string(),
        _ => format!("{head} {tail}"),
    }
}

/// Normalized Levenshtein similarity.
pub fn ratio(s1: &str, s2: &str) -> f64 {
    if s1 == s2 {
        return 1.0;
    }
    let len1 = s1.chars().count();
    let len2 = s2.chars().count();
    if len1 == 0 || len2 == 0 {
        return 0.0;
    }
    let max_len = len1.max(len2);
    1.0 - (levenshtein(s1, s2) as f64 / max_len as f64)
}

fn levenshtein(s1: &str, s2: &str) -> usize {
    let b: Vec<char> = s2.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut cur = vec![0; b.len() + 1];

    for (i, ca) in s1.chars().enumerate() {
        cur[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            cur[j + 1] = (prev[j + 1] + 1).min(cur[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_unifies_company_suffixes() {
        assert_eq!(normalize("Abc Trading Sdn. Bhd."), "ABC TRADING SDN BHD");
        assert_eq!(normalize("ABC TRADING SDNBHD"), "ABC TRADING SDN BHD");
        assert_eq!(normalize("ABC TRADING S/B"), "ABC TRADING SDN BHD");
        assert_eq!(normalize("BUS/BAR SUPPLY"), "BUS BAR SUPPLY");
        assert_eq!(normalize("Tom &amp; Jerry"), "TOM JERRY");
        assert_eq!(normalize("CAFÉ  ÉTOILE"), "CAFE ETOILE");
    }

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("same", "same"), 0);
    }

    #[test]
    fn test_contained_pattern_scores_one() {
        let raw = tokens("ABC TRADING SDN BHD PAYMENT REF123");
        let pat = tokens("ABC TRADING SDN BHD");
        assert_eq!(token_set_ratio(&raw, &pat), 1.0);
    }

    #[test]
    fn test_word_order_and_case_ignored() {
        let a = tokens("bhd sdn trading abc");
        let b = tokens("ABC TRADING SDN BHD");
        assert_eq!(token_set_ratio(&a, &b), 1.0);
    }

    #[test]
    fn test_unrelated_names_score_low() {
        let a = tokens("ZENITH LOGISTICS");
        let b = tokens("ABC TRADING SDN BHD");
        assert!(token_set_ratio(&a, &b) < 0.5);
    }

    #[test]
    fn test_typo_scores_below_one() {
        let a = tokens("ABC TRADNG SDN BHD");
        let b = tokens("ABC TRADING SDN BHD");
        let score = token_set_ratio(&a, &b);
        assert!(score > 0.8 && score < 1.0, "{score}");
    }

    #[test]
    fn test_narration_inside_pattern_is_not_a_match() {
        let pat = tokens("LIM HARDWARE ENTERPRISE");
        assert!(token_set_ratio(&tokens("LIM"), &pat) < 0.5);
        assert!(token_set_ratio(&tokens("SDN BHD"), &tokens("ABC TRADING SDN BHD")) < 0.5);
        // The other direction still counts as contained.
        assert_eq!(token_set_ratio(&pat, &tokens("LIM")), 1.0);
    }

    #[test]
    fn test_empty_is_zero() {
        assert_eq!(token_set_ratio(&BTreeSet::new(), &tokens("ABC")), 0.0);
    }
}
