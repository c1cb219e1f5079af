use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::lexicon::Lexicon;
use super::record::{ClassificationResult, ClassificationSource, Email};
use super::text::{tokenize, truncate_with_ellipsis};

/// Keyword-based classification over a lexicon.
pub struct FallbackClassifier<'a> {
    lexicon: &'a Lexicon,
}

impl<'a> FallbackClassifier<'a> {
    pub fn new(lexicon: &'a Lexicon) -> Self {
        FallbackClassifier { lexicon }
    }

    /// Returns the category with the most trigger hits in `text`.
    ///
    /// Ties go to the category listed first in the lexicon; no hit at all
    /// gives the default category.
    pub fn classify(&self, text: &str) -> &'a str {
        let tokens = tokenize(text);
        let scores = self.lexicon.scores(&tokens);

        let mut best: Option<(usize, usize)> = None;
        for (index, score) in scores.into_iter().enumerate() {
            if score == 0 {
                continue;
            }
            match best {
                Some((_, best_score)) if best_score >= score => {}
                _ => best = Some((index, score)),
            }
        }

        match best {
            Some((index, score)) => {
                debug!("Fallback match: {} ({} hit(s))", self.lexicon.name_at(index), score);
                self.lexicon.name_at(index)
            }
            None => self.lexicon.default_category(),
        }
    }
}

/// Category and summary returned by the primary (AI) classifier, before
/// validation against the lexicon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryVerdict {
    pub category: String,
    pub summary: String,
}

/// Turns primary verdicts or their absence into classification results.
pub struct Triage {
    lexicon: Lexicon,
}

impl Triage {
    pub fn new(lexicon: Lexicon) -> Self {
        Triage { lexicon }
    }

    pub fn lexicon(&self) -> &Lexicon {
        &self.lexicon
    }

    /// Uses the primary verdict when there is one, the keyword fallback
    /// otherwise.
    pub fn classify_email(
        &self,
        email: &Email,
        primary: Option<PrimaryVerdict>,
    ) -> ClassificationResult {
        match primary {
            Some(verdict) => self.accept_verdict(email, verdict),
            None => self.fallback(email),
        }
    }

    /// Keyword classification with the generic summary.
    pub fn fallback(&self, email: &Email) -> ClassificationResult {
        let category = FallbackClassifier::new(&self.lexicon).classify(&email.full_text());
        ClassificationResult {
            category: category.to_string(),
            summary: format!(
                "Email from {} - {}",
                email.sender,
                truncate_with_ellipsis(&email.subject, 30)
            ),
            source: ClassificationSource::Fallback,
        }
    }

    fn accept_verdict(&self, email: &Email, verdict: PrimaryVerdict) -> ClassificationResult {
        let category = match self.lexicon.canonical(&verdict.category) {
            Some(category) => category.to_string(),
            None => {
                warn!(
                    "AI returned unknown category '{}', using '{}'",
                    verdict.category,
                    self.lexicon.default_category()
                );
                self.lexicon.default_category().to_string()
            }
        };

        let summary = match verdict.summary.trim() {
            "" => format!("Email from {} regarding {}", email.sender, email.subject),
            summary => summary.to_string(),
        };

        ClassificationResult {
            category,
            summary,
            source: ClassificationSource::Ai,
        }
    }
}
