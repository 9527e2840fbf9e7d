use std::{
    fs,
    path::Path,
    slice,
};

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

const BUILTIN_TEMPLATES: &str = include_str!("../data/templates.json");
const BUILTIN_EXPRESSIONS: &str = include_str!("../data/expressions.json");

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("failed to read or write the template catalog: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse the template catalog: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid expression pattern {pattern:?}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: Box<regex::Error>,
    },
}

/// A meme template known to the Imgflip API. The id is assigned remotely
/// and stable; the url points at the blank reference image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub id: u64,
    pub name: String,
    pub url: String,
}

/// Normalizes a string for fuzzy name matching: lower-case, every run of
/// non-word characters collapsed to a single hyphen, edge hyphens trimmed.
/// `codify("Y U No!!")` and `codify("y-u-no")` both yield `"y-u-no"`.
pub fn codify(input: &str) -> String {
    let mut key = String::new();
    let mut last_was_hyphen = false;

    for ch in input.chars() {
        if ch.is_alphanumeric() || ch == '_' {
            for lowered in ch.to_lowercase() {
                key.push(lowered);
            }
            last_was_hyphen = false;
        } else if !last_was_hyphen && !key.is_empty() {
            key.push('-');
            last_was_hyphen = true;
        }
    }

    if key.ends_with('-') {
        key.pop();
    }
    key
}

/// The ordered collection of known templates. Loaded once per invocation,
/// appended to only by the catalog updater, persisted sorted by id.
#[derive(Debug, Clone)]
pub struct TemplateStore {
    templates: Vec<Template>,
}

impl TemplateStore {
    /// The dataset shipped with the binary.
    pub fn builtin() -> Self {
        let templates = serde_json::from_str(BUILTIN_TEMPLATES)
            .expect("built-in template dataset parses");
        Self { templates }
    }

    /// Loads the persisted catalog, falling back to the built-in dataset
    /// when the file is missing, unreadable, or not valid JSON.
    pub fn load_or_builtin(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(templates) => {
                    debug!("loaded template catalog from {}", path.display());
                    Self { templates }
                }
                Err(error) => {
                    debug!(
                        "template catalog at {} is invalid ({error}), using built-ins",
                        path.display()
                    );
                    Self::builtin()
                }
            },
            Err(error) => {
                debug!("no persisted template catalog ({error}), using built-ins");
                Self::builtin()
            }
        }
    }

    pub fn from_templates(templates: Vec<Template>) -> Self {
        Self { templates }
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn iter(&self) -> slice::Iter<'_, Template> {
        self.templates.iter()
    }

    pub fn contains_id(&self, id: u64) -> bool {
        self.templates.iter().any(|template| template.id == id)
    }

    /// Appends every incoming template whose id is not already present,
    /// returning the names that were added in arrival order. Ids already in
    /// the store are never duplicated.
    pub fn merge<I>(&mut self, incoming: I) -> Vec<String>
    where
        I: IntoIterator<Item = Template>,
    {
        let mut added = Vec::new();
        for template in incoming {
            if !self.contains_id(template.id) {
                debug!("new template {} ({})", template.name, template.id);
                added.push(template.name.clone());
                self.templates.push(template);
            }
        }
        added
    }

    /// Sorts the catalog ascending by id and writes it out pretty-printed.
    /// Saving an unchanged store produces a byte-identical file.
    pub fn save(&mut self, path: &Path) -> Result<(), TemplateError> {
        self.templates.sort_by_key(|template| template.id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let serialized = serde_json::to_string_pretty(&self.templates)?;
        fs::write(path, serialized)?;
        Ok(())
    }
}

/// Wire form of a shorthand rule: a case-insensitive pattern with up to two
/// capture groups, mapped to a template id (which need not exist locally).
#[derive(Debug, Clone, Deserialize)]
pub struct ExpressionRule {
    pub id: u64,
    pub regex: String,
}

#[derive(Debug)]
struct CompiledRule {
    id: u64,
    pattern: Regex,
}

/// The ordered shorthand rule table, compiled once at load time and
/// read-only afterwards.
#[derive(Debug)]
pub struct ExpressionTable {
    rules: Vec<CompiledRule>,
}

impl ExpressionTable {
    pub fn builtin() -> Self {
        let rules: Vec<ExpressionRule> = serde_json::from_str(BUILTIN_EXPRESSIONS)
            .expect("built-in expression dataset parses");
        Self::from_rules(rules).expect("built-in expression patterns compile")
    }

    pub fn from_rules(rules: Vec<ExpressionRule>) -> Result<Self, TemplateError> {
        let mut compiled = Vec::with_capacity(rules.len());
        for rule in rules {
            let pattern = RegexBuilder::new(&rule.regex)
                .case_insensitive(true)
                .build()
                .map_err(|source| TemplateError::InvalidPattern {
                    pattern: rule.regex.clone(),
                    source: Box::new(source),
                })?;
            compiled.push(CompiledRule {
                id: rule.id,
                pattern,
            });
        }
        Ok(Self { rules: compiled })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Tests the phrase against every rule in table order and returns the
    /// first hit. Capture groups 1 and 2 become the top and bottom text; a
    /// group that does not exist or did not participate yields `None`.
    fn first_match(&self, phrase: &str) -> Option<ResolvedCaption> {
        for rule in &self.rules {
            if let Some(captures) = rule.pattern.captures(phrase) {
                debug!("shorthand rule matched template {}", rule.id);
                return Some(ResolvedCaption {
                    template_id: rule.id,
                    top: captures.get(1).map(|m| m.as_str().to_string()),
                    bottom: captures.get(2).map(|m| m.as_str().to_string()),
                });
            }
        }
        None
    }
}

/// A template id plus the caption text extracted for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCaption {
    pub template_id: u64,
    pub top: Option<String>,
    pub bottom: Option<String>,
}

/// Outcome of resolving user input against the store and rule table.
#[derive(Debug)]
pub enum Resolution<'a> {
    /// A single template was selected and caption text extracted.
    Matched(ResolvedCaption),
    /// Query mode without caption text: every matching template, in store
    /// order, for display.
    Candidates(Vec<&'a Template>),
    NoMatch,
}

/// Decides which template the input selects.
///
/// With an explicit query the store is searched by codified-name substring;
/// supplying top or bottom text narrows the result to the first match, while
/// supplying neither lists all matches. Without a query the free-form phrase
/// is run through the shorthand rule table, first match wins.
pub fn resolve<'a>(
    store: &'a TemplateStore,
    table: &ExpressionTable,
    phrase: Option<&str>,
    query: Option<&str>,
    top: Option<&str>,
    bottom: Option<&str>,
) -> Resolution<'a> {
    if let Some(query) = query {
        let key = codify(query);
        debug!("query mode, key {key:?}");

        if top.is_none() && bottom.is_none() {
            let candidates: Vec<&Template> = store
                .iter()
                .filter(|template| codify(&template.name).contains(&key))
                .collect();
            if candidates.is_empty() {
                return Resolution::NoMatch;
            }
            return Resolution::Candidates(candidates);
        }

        return match store
            .iter()
            .find(|template| codify(&template.name).contains(&key))
        {
            Some(template) => {
                debug!("query matched template {}", template.id);
                Resolution::Matched(ResolvedCaption {
                    template_id: template.id,
                    top: top.map(str::to_string),
                    bottom: bottom.map(str::to_string),
                })
            }
            None => Resolution::NoMatch,
        };
    }

    let Some(phrase) = phrase else {
        return Resolution::NoMatch;
    };
    if phrase.trim().is_empty() {
        return Resolution::NoMatch;
    }

    debug!("shorthand mode, phrase {phrase:?}");
    match table.first_match(phrase) {
        Some(resolved) => Resolution::Matched(resolved),
        None => Resolution::NoMatch,
    }
}
