// Recipe template extraction from platform.txt
// Isolates the flag zone of a recipe line, the generator supplies the
// compiler invocation and the input/output files itself

use crate::config_file::ConfigFile;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Build steps the engine resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecipeKind {
    CompileC,
    CompileCpp,
    Link,
}

impl RecipeKind {
    pub const ALL: [RecipeKind; 3] = [RecipeKind::CompileC, RecipeKind::CompileCpp, RecipeKind::Link];

    /// platform.txt key of the recipe.
    pub fn key(self) -> &'static str {
        match self {
            RecipeKind::CompileC => "recipe.c.o.pattern",
            RecipeKind::CompileCpp => "recipe.cpp.o.pattern",
            RecipeKind::Link => "recipe.c.combine.pattern",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RecipeKind::CompileC => "c",
            RecipeKind::CompileCpp => "cpp",
            RecipeKind::Link => "link",
        }
    }
}

impl fmt::Display for RecipeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Flag zone of a recipe, still holding `{key}` tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeTemplate(String);

impl RecipeTemplate {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for RecipeTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Placeholders that belong to the input/output file zone.
const IO_PLACEHOLDERS: &[&str] = &[
    "{source_file}",
    "{object_file}",
    "{object_files}",
    "{archive_file}",
    "{archive_file_path}",
    "{build.path}",
    "{build.project_name}",
];

#[derive(Debug, Clone, PartialEq, Eq)]
enum Span<'a> {
    Plain(&'a str),
    Quoted(String),
}

/// Split a recipe value into alternating plain and quoted spans.
/// `\"` inside a quoted span is kept as a literal quote. An unterminated
/// quote runs to the end of the value.
fn lex_spans(value: &str) -> Vec<Span<'_>> {
    let mut spans = Vec::new();
    let mut plain_start = 0;
    let mut chars = value.char_indices();

    while let Some((index, ch)) = chars.next() {
        if ch != '"' {
            continue;
        }
        if index > plain_start {
            spans.push(Span::Plain(&value[plain_start..index]));
        }

        let mut quoted = String::new();
        let mut end = value.len();
        while let Some((inner, ch)) = chars.next() {
            match ch {
                '\\' if value[inner + 1..].starts_with('"') => {
                    quoted.push('"');
                    chars.next();
                }
                '"' => {
                    end = inner + 1;
                    break;
                }
                _ => quoted.push(ch),
            }
        }
        spans.push(Span::Quoted(quoted));
        plain_start = end;
    }

    if plain_start < value.len() {
        spans.push(Span::Plain(&value[plain_start..]));
    }
    spans
}

/// Group spans into whitespace separated words, adjacent spans join.
fn words(spans: &[Span<'_>]) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();

    for span in spans {
        match span {
            Span::Plain(text) => {
                for ch in text.chars() {
                    if ch.is_whitespace() {
                        if !current.is_empty() {
                            words.push(std::mem::take(&mut current));
                        }
                    } else {
                        current.push(ch);
                    }
                }
            }
            Span::Quoted(text) => current.push_str(text),
        }
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn is_invocation(word: &str) -> bool {
    word.contains("{compiler.path}") || word.contains(".cmd}")
}

fn starts_file_zone(word: &str) -> bool {
    word == "-o" || IO_PLACEHOLDERS.iter().any(|p| word.contains(p))
}

/// Finds recipes in a platform file and isolates their flag zone.
pub struct RecipeTemplateExtractor;

impl RecipeTemplateExtractor {
    /// Template for the first line whose key is exactly `recipe_name`.
    /// `None` when the platform file has no such recipe.
    pub fn extract(recipe_name: &str, platform: &ConfigFile) -> Option<RecipeTemplate> {
        let entry = platform.first(recipe_name)?;
        let template = Self::extract_from_value(&entry.value);
        debug!(
            "Recipe {} (line {}): {}",
            recipe_name, entry.line, template
        );
        Some(template)
    }

    /// Flag zone of a recipe value: the words after the compiler invocation
    /// and before the first output flag or file placeholder.
    pub fn extract_from_value(value: &str) -> RecipeTemplate {
        let spans = lex_spans(value);
        let words = words(&spans);

        let skip = usize::from(words.first().is_some_and(|w| is_invocation(w)));
        let flags: Vec<&str> = words
            .iter()
            .skip(skip)
            .take_while(|w| !starts_file_zone(w))
            .map(String::as_str)
            .collect();

        RecipeTemplate::new(flags.join(" "))
    }
}
