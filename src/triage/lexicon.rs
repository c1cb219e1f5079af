use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::error::TriageError;
use super::text::tokenize;

/// One category of the lexicon as it appears in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub name: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl CategoryRule {
    pub fn new(name: &str, keywords: &[&str]) -> Self {
        CategoryRule {
            name: name.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone)]
struct CompiledCategory {
    name: String,
    /// Each trigger is a token sequence; single words have length 1.
    triggers: Vec<Vec<String>>,
}

/// Validated, ordered category set with its trigger words.
///
/// The position of a category in the lexicon is the tie-break order used by
/// the fallback classifier.
#[derive(Debug, Clone)]
pub struct Lexicon {
    categories: Vec<CompiledCategory>,
    default_index: usize,
}

impl Lexicon {
    /// Builds a lexicon from rules given in priority order.
    ///
    /// Every category other than the default needs at least one trigger word.
    pub fn new(rules: Vec<CategoryRule>, default_category: &str) -> Result<Self, TriageError> {
        if rules.is_empty() {
            return Err(TriageError::NoCategories);
        }

        let default_category = default_category.trim();
        let mut seen = HashSet::new();
        let mut categories = Vec::with_capacity(rules.len());

        for rule in rules {
            let name = rule.name.trim().to_string();
            if !seen.insert(name.clone()) {
                return Err(TriageError::DuplicateCategory(name));
            }

            let mut triggers: Vec<Vec<String>> = Vec::new();
            for keyword in &rule.keywords {
                let tokens = tokenize(keyword);
                if !tokens.is_empty() && !triggers.contains(&tokens) {
                    triggers.push(tokens);
                }
            }

            if triggers.is_empty() && name != default_category {
                return Err(TriageError::EmptyTriggerSet(name));
            }

            categories.push(CompiledCategory { name, triggers });
        }

        let default_index = categories
            .iter()
            .position(|c| c.name == default_category)
            .ok_or_else(|| TriageError::UnknownDefaultCategory(default_category.to_string()))?;

        Ok(Lexicon {
            categories,
            default_index,
        })
    }

    /// Builds a lexicon from a trigger map whose iteration order carries no
    /// meaning. The ordering is mandatory as soon as there is more than one
    /// category; every category of the map must have a position in it.
    pub fn from_unordered(
        triggers: HashMap<String, Vec<String>>,
        ordering: Option<&[String]>,
        default_category: &str,
    ) -> Result<Self, TriageError> {
        let ordering = match ordering {
            Some(ordering) => ordering.to_vec(),
            None if triggers.len() <= 1 => triggers.keys().cloned().collect(),
            None => {
                let mut names: Vec<&String> = triggers.keys().collect();
                names.sort();
                return Err(TriageError::MissingOrdering(names[0].clone()));
            }
        };

        let mut unplaced: Vec<&String> = triggers
            .keys()
            .filter(|name| !ordering.contains(*name))
            .collect();
        unplaced.sort();
        if let Some(name) = unplaced.first() {
            return Err(TriageError::MissingOrdering((*name).clone()));
        }

        let rules = ordering
            .into_iter()
            .map(|name| {
                let keywords = triggers.get(&name).cloned().unwrap_or_default();
                CategoryRule { name, keywords }
            })
            .collect();

        Self::new(rules, default_category)
    }

    /// Category names in priority order.
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(|c| c.name.as_str())
    }

    pub fn category_names(&self) -> Vec<String> {
        self.categories().map(str::to_string).collect()
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn default_category(&self) -> &str {
        &self.categories[self.default_index].name
    }

    pub fn contains(&self, category: &str) -> bool {
        self.categories.iter().any(|c| c.name == category)
    }

    /// Maps a loosely written category name (case, surrounding spaces) to the
    /// configured spelling.
    pub fn canonical(&self, category: &str) -> Option<&str> {
        let wanted = category.trim();
        self.categories
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(wanted))
            .map(|c| c.name.as_str())
    }

    /// Trigger hit count for every category, in lexicon order.
    pub(crate) fn scores(&self, tokens: &[String]) -> Vec<usize> {
        self.categories
            .iter()
            .map(|category| {
                category
                    .triggers
                    .iter()
                    .map(|trigger| count_occurrences(tokens, trigger))
                    .sum()
            })
            .collect()
    }

    pub(crate) fn name_at(&self, index: usize) -> &str {
        &self.categories[index].name
    }
}

fn count_occurrences(tokens: &[String], trigger: &[String]) -> usize {
    if trigger.is_empty() || tokens.len() < trigger.len() {
        return 0;
    }
    tokens.windows(trigger.len()).filter(|window| *window == trigger).count()
}
