use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref RE: Regex = Regex::new(r"(?u)\p{L}[\p{L}\p{N}_']*|\p{N}+").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","about","above","after","again","against","all","am","an","and","any","are","as","at",
            "be","because","been","before","being","below","between","both","but","by",
            "can","cannot","could","did","do","does","doing","down","during",
            "each","few","for","from","further","had","has","have","having","he","her","here","hers",
            "herself","him","himself","his","how","i","if","in","into","is","it","its","itself",
            "me","more","most","my","myself","no","nor","not","of","off","on","once","only","or",
            "other","ought","our","ours","ourselves","out","over","own","same","she","should","so",
            "some","such","than","that","the","their","theirs","them","themselves","then","there",
            "these","they","this","those","through","to","too","under","until","up","very",
            "was","we","were","what","when","where","which","while","who","whom","why","with",
            "would","you","your","yours","yourself","yourselves"
        ];
        words.iter().copied().collect()
    };
}

/// Normalization switches. Both are off by default so every word stays searchable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenizerOptions {
    pub remove_stopwords: bool,
    pub stem: bool,
}

/// Marker for wildcard query terms.
pub const WILDCARD: char = '*';

fn is_stopword(token: &str) -> bool { STOPWORDS.contains(token) }

/// Tokenize with the default options.
pub fn tokenize(text: &str) -> Vec<(String, usize)> {
    tokenize_with(text, TokenizerOptions::default())
}

/// Tokenize text into (term, position) using NFKC normalization and lowercasing.
///
/// Positions count every extracted word, including dropped stopwords, so phrase
/// adjacency in the index matches adjacency in the source text.
pub fn tokenize_with(text: &str, options: TokenizerOptions) -> Vec<(String, usize)> {
    let normalized = text.nfkc().collect::<String>().to_lowercase();
    let mut tokens = Vec::new();
    for (pos, mat) in RE.find_iter(&normalized).enumerate() {
        let token = mat.as_str();
        if options.remove_stopwords && is_stopword(token) { continue; }
        let term = if options.stem { STEMMER.stem(token).to_string() } else { token.to_string() };
        tokens.push((term, pos));
    }
    tokens
}

/// Normalize one whitespace-separated query word into index terms.
///
/// Wildcard patterns are only lowercased; the k-gram index matches them verbatim.
pub fn normalize_query_word(word: &str, options: TokenizerOptions) -> Vec<String> {
    if word.contains(WILDCARD) {
        return vec![word.nfkc().collect::<String>().to_lowercase()];
    }
    tokenize_with(word, options).into_iter().map(|(t, _)| t).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_tokenize() {
        let t = tokenize("The cat sat");
        assert_eq!(t, vec![("the".into(), 0), ("cat".into(), 1), ("sat".into(), 2)]);
    }

    #[test]
    fn stopword_positions_leave_gaps() {
        let opts = TokenizerOptions { remove_stopwords: true, stem: false };
        let t = tokenize_with("the cat and the dog", opts);
        assert_eq!(t, vec![("cat".into(), 1), ("dog".into(), 4)]);
    }

    #[test]
    fn wildcard_words_are_kept_whole() {
        let opts = TokenizerOptions { remove_stopwords: true, stem: true };
        assert_eq!(normalize_query_word("Run*", opts), vec!["run*".to_string()]);
        assert_eq!(normalize_query_word("Running", opts), vec!["run".to_string()]);
    }
}
