//! Term vectors for lexical similarity.
//!
//! Text is lowercased and split on anything that is not alphanumeric.
//! Single characters and a short list of English stopwords are dropped.
//! Vectors hold raw term frequencies; similarity is cosine.

use std::collections::BTreeMap;

const STOPWORDS: &[&str] = &[
    "about", "after", "all", "also", "an", "and", "are", "as", "at", "be", "but", "by", "can",
    "for", "from", "has", "have", "how", "if", "in", "into", "is", "it", "its", "not", "of", "on",
    "or", "our", "so", "that", "the", "their", "then", "there", "these", "this", "to", "was",
    "we", "what", "when", "which", "who", "why", "will", "with", "you", "your",
];

/// Sparse term-frequency vector.
pub type TermVector = BTreeMap<String, f64>;

/// Lowercased content tokens of `text`, in order.
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() > 1)
        .map(str::to_lowercase)
        .filter(|t| STOPWORDS.binary_search(&t.as_str()).is_err())
        .collect()
}

/// Term frequencies over every piece of text given.
#[must_use]
pub fn term_vector<'a, I>(texts: I) -> TermVector
where
    I: IntoIterator<Item = &'a str>,
{
    let mut tf = TermVector::new();
    for text in texts {
        for token in tokenize(text) {
            *tf.entry(token).or_insert(0.0) += 1.0;
        }
    }
    tf
}

/// Cosine similarity in `[0, 1]`. Empty vectors score 0.
#[must_use]
pub fn cosine(a: &TermVector, b: &TermVector) -> f64 {
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let dot: f64 = small
        .iter()
        .filter_map(|(term, x)| large.get(term).map(|y| x * y))
        .sum();
    if dot == 0.0 {
        return 0.0;
    }
    let norm = |v: &TermVector| v.values().map(|x| x * x).sum::<f64>().sqrt();
    (dot / (norm(a) * norm(b))).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stopword_list_is_sorted_for_binary_search() {
        assert!(STOPWORDS.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn tokenize_drops_stopwords_punctuation_and_case() {
        assert_eq!(
            tokenize("The Ownership of Rust's borrow-checker, a primer"),
            vec!["ownership", "rust", "borrow", "checker", "primer"]
        );
    }

    #[test]
    fn identical_text_has_cosine_one() {
        let a = term_vector(["graph theory basics"]);
        let b = term_vector(["Graph Theory: basics!"]);
        assert!((cosine(&a, &b) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn disjoint_or_empty_text_has_cosine_zero() {
        let a = term_vector(["tomatoes"]);
        let b = term_vector(["compilers"]);
        assert!(cosine(&a, &b).abs() < f64::EPSILON);
        assert!(cosine(&a, &TermVector::new()).abs() < f64::EPSILON);
    }

    #[test]
    fn partial_overlap_is_between_zero_and_one() {
        let a = term_vector(["rust ownership borrowing"]);
        let b = term_vector(["rust ownership borrowing rules"]);
        let sim = cosine(&a, &b);
        assert!((sim - 3.0 / (3.0_f64.sqrt() * 2.0)).abs() < 1e-12);
    }
}
