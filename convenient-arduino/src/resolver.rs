// Fixed-point substitution of {key} tokens
// Repeats full passes over the flag map until a pass changes nothing

use crate::error::ResolveError;
use crate::flag_map::FlagMap;
use crate::recipe::RecipeTemplate;
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

/// Upper bound for an expanded string. Self-referencing values that grow
/// on every pass hit this long before the pass cap.
pub const MAX_EXPANDED_LEN: usize = 1 << 20;

/// Constant pattern, exercised by the token scan tests.
static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([^{}\s]+)\}").expect("token pattern is valid"));

/// Result of resolving one template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub flags: String,
    /// Tokens with no flag map entry, braces included, first appearance order
    pub unresolved: Vec<String>,
    /// Passes that replaced something
    pub passes: usize,
}

impl Resolution {
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }
}

/// `{token}` sequences in `text`, deduplicated, in order of appearance.
pub fn unresolved_tokens(text: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    for token in TOKEN_RE.find_iter(text) {
        if !tokens.iter().any(|t| t == token.as_str()) {
            tokens.push(token.as_str().to_string());
        }
    }
    tokens
}

/// Expands `{key}` tokens against a flag map.
pub struct RecipeResolver<'a> {
    flag_map: &'a FlagMap,
    max_passes: usize,
}

impl<'a> RecipeResolver<'a> {
    /// An acyclic chain needs at most one replacing pass per key.
    pub fn new(flag_map: &'a FlagMap) -> Self {
        Self {
            flag_map,
            max_passes: flag_map.len() + 1,
        }
    }

    pub fn with_max_passes(mut self, max_passes: usize) -> Self {
        self.max_passes = max_passes;
        self
    }

    pub fn resolve(&self, template: &RecipeTemplate) -> Result<Resolution, ResolveError> {
        self.resolve_str(template.as_str())
    }

    /// Resolve any text, e.g. a single flag map value.
    pub fn resolve_str(&self, input: &str) -> Result<Resolution, ResolveError> {
        let mut text = input.to_string();
        let mut passes = 0;

        loop {
            let replaced = self.substitution_pass(&mut text, passes)?;
            if replaced == 0 {
                break;
            }
            passes += 1;
            debug!("Pass {}: {} keys replaced", passes, replaced);

            if passes > self.max_passes {
                return Err(self.divergence(passes, &text));
            }
        }

        let unresolved: Vec<String> = unresolved_tokens(&text)
            .into_iter()
            .filter(|token| !self.flag_map.contains_key(&token[1..token.len() - 1]))
            .collect();

        Ok(Resolution {
            flags: text,
            unresolved,
            passes,
        })
    }

    /// One pass over all keys in map order. Returns how many keys had a
    /// token in the text.
    fn substitution_pass(&self, text: &mut String, passes: usize) -> Result<usize, ResolveError> {
        let mut replaced = 0;

        for (key, value) in self.flag_map.iter() {
            let token = format!("{{{}}}", key);
            if !text.contains(&token) {
                continue;
            }

            *text = text.replace(&token, value);
            replaced += 1;

            if text.len() > MAX_EXPANDED_LEN {
                return Err(self.divergence(passes + 1, text));
            }
        }

        Ok(replaced)
    }

    fn divergence(&self, passes: usize, text: &str) -> ResolveError {
        let tokens: Vec<String> = unresolved_tokens(text)
            .into_iter()
            .filter(|token| self.flag_map.contains_key(&token[1..token.len() - 1]))
            .collect();
        debug!("Divergence after {} passes: {:?}", passes, tokens);
        ResolveError::Divergence { passes, tokens }
    }
}
