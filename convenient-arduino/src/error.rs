//! Error and diagnostic types for flag resolution.
//!
//! Fatal conditions are `Err` values of the enums below. Everything the
//! caller may choose to tolerate is reported as a [`Diagnostic`] next to the
//! best-effort result instead.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Errors raised while validating or discovering scope prefixes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScopeError {
    #[error("Scope list contains an empty scope")]
    Empty,

    #[error("Scope '{0}' must end with '.'")]
    MissingSeparator(String),

    #[error("Board '{0}' is not declared in the board file")]
    UnknownBoard(String),

    #[error("Board '{board}' has no option '{option}' in menu '{menu}'")]
    UnknownMenuOption {
        board: String,
        menu: String,
        option: String,
    },
}

/// Errors raised by the fixed-point resolver.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("Resolution diverged after {passes} passes, still expanding: {}", tokens.join(", "))]
    Divergence { passes: usize, tokens: Vec<String> },
}

/// Fatal errors for one target resolution.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Configuration file not found: {}", path.display())]
    MissingConfigFile { path: PathBuf },

    #[error("Configuration file {} could not be read: {reason}", path.display())]
    UnreadableConfigFile { path: PathBuf, reason: String },

    #[error("Invalid scope selection: {0}")]
    Scope(#[from] ScopeError),
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Errors raised while loading a target profile.
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("Failed to read profile {0}: {1}")]
    Io(PathBuf, String),

    #[error("Failed to parse profile {0}: {1}")]
    Parse(String, String),

    #[error("Unknown built-in profile '{0}'")]
    UnknownProfile(String),
}

/// Non-fatal conditions collected during a resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// The target requires an override file and none was found.
    MissingOverrideFile { path: Option<PathBuf> },
    /// The override file exists but could not be read.
    UnreadableOverrideFile { path: PathBuf, reason: String },
    /// The platform file has no line for the recipe.
    RecipeNotFound { recipe: String, optional: bool },
    /// Tokens left in the flags after the fixed point was reached.
    UnresolvedTokens { recipe: String, tokens: Vec<String> },
    /// The pass cap was exceeded, most likely a reference cycle.
    ResolutionDivergence {
        recipe: String,
        passes: usize,
        tokens: Vec<String>,
    },
}

impl Diagnostic {
    /// Whether the condition leaves the target without usable flags.
    pub fn is_failure(&self) -> bool {
        match self {
            Diagnostic::RecipeNotFound { optional, .. } => !optional,
            Diagnostic::ResolutionDivergence { .. } => true,
            _ => false,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::MissingOverrideFile { path: Some(path) } => {
                write!(f, "required override file not found: {}", path.display())
            }
            Diagnostic::MissingOverrideFile { path: None } => {
                write!(f, "target requires an override file but none was given")
            }
            Diagnostic::UnreadableOverrideFile { path, reason } => {
                write!(f, "override file {} could not be read: {}", path.display(), reason)
            }
            Diagnostic::RecipeNotFound { recipe, optional } => {
                let kind = if *optional { "optional" } else { "required" };
                write!(f, "{} recipe '{}' not found in platform file", kind, recipe)
            }
            Diagnostic::UnresolvedTokens { recipe, tokens } => {
                write!(f, "'{}' has unresolved tokens: {}", recipe, tokens.join(" "))
            }
            Diagnostic::ResolutionDivergence {
                recipe,
                passes,
                tokens,
            } => write!(
                f,
                "'{}' did not converge after {} passes (cycling: {})",
                recipe,
                passes,
                tokens.join(" ")
            ),
        }
    }
}
