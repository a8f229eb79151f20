use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref RE: Regex = Regex::new(r"(?u)[\p{L}\p{N}][\p{L}\p{N}_']*").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","about","above","after","again","against","all","am","an","and","any","are","aren't","as","at",
            "be","because","been","before","being","below","between","both","but","by",
            "can","can't","cannot","could","couldn't",
            "did","didn't","do","does","doesn't","doing","don't","down","during",
            "each","few","for","from","further",
            "had","hadn't","has","hasn't","have","haven't","having","he","he'd","he'll","he's","her","here","here's","hers","herself","him","himself","his","how","how's",
            "i","i'd","i'll","i'm","i've","if","in","into","is","isn't","it","it's","its","itself",
            "let's","me","more","most","mustn't","my","myself",
            "no","nor","not","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
            "same","she","she'd","she'll","she's","should","shouldn't","so","some","such",
            "than","that","that's","the","their","theirs","them","themselves","then","there","there's","these","they","they'd","they'll","they're","they've","this","those","through","to","too",
            "under","until","up","very",
            "was","wasn't","we","we'd","we'll","we're","we've","were","weren't","what","what's","when","when's","where","where's","which","while","who","who's","whom","why","why's","with","won't","would","wouldn't",
            "you","you'd","you'll","you're","you've","your","yours","yourself","yourselves"
        ];
        words.iter().copied().collect()
    };
}

fn is_stopword(token: &str) -> bool { STOPWORDS.contains(token) }

/// Analysis options. Recorded in the index manifest: readers always analyze
/// with the options the index was written with.
///
/// The default keeps every word unstemmed so phrase counts are exact. With
/// `stopwords` on, a dropped word leaves a gap that any word can fill; with
/// `stem` on, inflections of a word count as the same phrase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub stem: bool,
    pub stopwords: bool,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self { stem: false, stopwords: false }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Analyzer {
    config: AnalyzerConfig,
}

impl Analyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> AnalyzerConfig {
        self.config
    }

    /// Tokenize text into (term, position). Positions count removed stopwords
    /// too, so the gaps they leave are visible to phrase matching.
    pub fn analyze(&self, text: &str) -> Vec<(String, u32)> {
        self.analyze_with(text, self.config.stopwords)
    }

    /// Analyzed terms only, positions dropped.
    pub fn terms(&self, text: &str) -> Vec<String> {
        self.analyze(text).into_iter().map(|(t, _)| t).collect()
    }

    /// Terms for a bag-of-words query: stopwords are always dropped.
    pub fn query_terms(&self, text: &str) -> Vec<String> {
        self.analyze_with(text, true).into_iter().map(|(t, _)| t).collect()
    }

    fn analyze_with(&self, text: &str, drop_stopwords: bool) -> Vec<(String, u32)> {
        let normalized = fold(text);
        let mut tokens = Vec::new();
        for (pos, mat) in RE.find_iter(&normalized).enumerate() {
            let token = mat.as_str();
            if drop_stopwords && is_stopword(token) { continue; }
            let term = if self.config.stem { STEMMER.stem(token).into_owned() } else { token.to_string() };
            tokens.push((term, pos as u32));
        }
        tokens
    }
}

/// NFKD, strip combining marks, lowercase: "Café" and "cafe" meet on one term.
fn fold(text: &str) -> String {
    text.nfkd().filter(|c| !is_combining_mark(*c)).collect::<String>().to_lowercase()
}

/// Tokenize with the default analyzer.
pub fn tokenize(text: &str) -> Vec<(String, u32)> {
    Analyzer::default().analyze(text)
}
