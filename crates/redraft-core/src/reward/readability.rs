//! Flesch reading-ease, computed locally.
//!
//! `206.835 - 1.015 * (words / sentences) - 84.6 * (syllables / words)`

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;

use super::scorers::{ReadabilityScorer, ScorerError};

fn word_pattern() -> &'static Regex {
    static WORD: OnceLock<Regex> = OnceLock::new();
    WORD.get_or_init(|| Regex::new(r"[A-Za-z][A-Za-z'’-]*").expect("static word pattern"))
}

fn sentence_end_pattern() -> &'static Regex {
    static END: OnceLock<Regex> = OnceLock::new();
    END.get_or_init(|| Regex::new(r"[.!?]+").expect("static sentence pattern"))
}

/// Flesch reading-ease scorer with a vowel-group syllable heuristic.
#[derive(Debug, Clone, Copy, Default)]
pub struct FleschReadingEase;

impl FleschReadingEase {
    pub fn new() -> Self {
        Self
    }

    /// Synchronous core of the scorer.
    pub fn score(text: &str) -> Result<f64, ScorerError> {
        let words: Vec<&str> = word_pattern().find_iter(text).map(|m| m.as_str()).collect();
        if words.is_empty() {
            return Err(ScorerError::Unscorable("no words found".to_string()));
        }

        // Trailing text without terminal punctuation still counts as a sentence.
        let terminated = sentence_end_pattern().find_iter(text).count();
        let tail = sentence_end_pattern()
            .split(text)
            .last()
            .map(|rest| word_pattern().is_match(rest))
            .unwrap_or(false);
        let sentences = (terminated + usize::from(tail)).max(1);

        let syllables: usize = words.iter().map(|w| count_syllables(w)).sum();

        let words_n = words.len() as f64;
        let ease = 206.835
            - 1.015 * (words_n / sentences as f64)
            - 84.6 * (syllables as f64 / words_n);
        Ok(ease)
    }
}

#[async_trait]
impl ReadabilityScorer for FleschReadingEase {
    async fn readability(&self, text: &str) -> Result<f64, ScorerError> {
        Self::score(text)
    }
}

/// Estimate syllables by counting vowel groups, dropping a silent final `e`.
pub fn count_syllables(word: &str) -> usize {
    let lower: Vec<char> = word
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_lowercase())
        .collect();
    if lower.len() <= 3 {
        return 1;
    }

    let is_vowel = |c: char| matches!(c, 'a' | 'e' | 'i' | 'o' | 'u' | 'y');
    let mut groups = 0;
    let mut previous_vowel = false;
    for &c in &lower {
        let vowel = is_vowel(c);
        if vowel && !previous_vowel {
            groups += 1;
        }
        previous_vowel = vowel;
    }

    let n = lower.len();
    let silent_e = lower[n - 1] == 'e' && !(lower[n - 2] == 'l' && !is_vowel(lower[n - 3]));
    if silent_e && groups > 1 {
        groups -= 1;
    }
    groups.max(1)
}
