//! Case-insensitive phrase containment used for crisis keywords and for
//! explicit requests for a human.

pub const DEFAULT_CRISIS_KEYWORDS: &str = "suicide,kill myself,end it all,can't go on,hopeless";

pub const DEFAULT_HELP_PHRASES: &[&str] = &[
    "talk to someone",
    "speak to a person",
    "human help",
    "counselor",
    "therapist",
    "mentor",
    "real person",
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeywordMatcher {
    phrases: Vec<String>,
}

impl KeywordMatcher {
    /// Phrases are trimmed and lowercased; empties and duplicates are dropped,
    /// first occurrence wins.
    pub fn new<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out: Vec<String> = Vec::new();
        for p in phrases {
            let p = normalize(p.as_ref().trim());
            if !p.is_empty() && !out.contains(&p) {
                out.push(p);
            }
        }
        Self { phrases: out }
    }

    /// Parse a comma-separated list such as the `CRISIS_KEYWORDS` env value.
    pub fn from_csv(raw: &str) -> Self {
        Self::new(raw.split(','))
    }

    pub fn phrases(&self) -> &[String] {
        &self.phrases
    }

    /// Every configured phrase contained in `text`, in configured order.
    pub fn scan(&self, text: &str) -> Vec<String> {
        let haystack = normalize(text);
        self.phrases
            .iter()
            .filter(|p| haystack.contains(p.as_str()))
            .cloned()
            .collect()
    }

    pub fn matches_any(&self, text: &str) -> bool {
        let haystack = normalize(text);
        self.phrases.iter().any(|p| haystack.contains(p.as_str()))
    }
}

// Phones like to send typographic apostrophes ("can’t go on").
fn normalize(s: &str) -> String {
    s.to_lowercase().replace(['\u{2019}', '\u{2018}'], "'")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_is_case_insensitive_and_ordered() {
        let m = KeywordMatcher::from_csv(DEFAULT_CRISIS_KEYWORDS);
        let hits = m.scan("I feel HOPELESS and want to end it all");
        assert_eq!(hits, vec!["end it all".to_string(), "hopeless".to_string()]);
    }

    #[test]
    fn typographic_apostrophe_matches() {
        let m = KeywordMatcher::from_csv(DEFAULT_CRISIS_KEYWORDS);
        assert_eq!(m.scan("I can’t go on"), vec!["can't go on".to_string()]);
    }

    #[test]
    fn normalizes_and_dedups_list() {
        let m = KeywordMatcher::from_csv(" Suicide, ,suicide,Hopeless ");
        assert_eq!(m.phrases(), &["suicide".to_string(), "hopeless".to_string()]);
    }

    #[test]
    fn clean_text_has_no_hits() {
        let m = KeywordMatcher::new(DEFAULT_HELP_PHRASES);
        assert!(m.scan("had a good day at work").is_empty());
        assert!(m.matches_any("Can I talk to someone please"));
    }
}
