//! Adapts resolved flag strings to the build system that consumes them.
//!
//! Recipes describe a complete compiler command line. The generated build
//! compiles sources as object libraries and links archives itself, so a few
//! flags have to be removed or extended before they are handed over.

use serde::{Deserialize, Serialize};

/// Consumer of the resolved flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetSyntax {
    #[default]
    CMake,
    /// Flags exactly as resolved, whitespace normalised
    Verbatim,
}

/// What a rule matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagMatch {
    /// A whole whitespace separated word
    Word(&'static str),
    /// Every occurrence of a character
    Char(char),
}

/// A single rewrite applied to the resolved flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlagRule {
    pub matcher: FlagMatch,
    /// Empty to remove the match
    pub replacement: &'static str,
    pub rationale: &'static str,
}

pub const CMAKE_RULES: &[FlagRule] = &[
    FlagRule {
        matcher: FlagMatch::Char('"'),
        replacement: "",
        rationale: "quotes only delimited recipe fields in platform.txt",
    },
    FlagRule {
        matcher: FlagMatch::Word("-c"),
        replacement: "",
        rationale: "object library targets already compile without linking",
    },
    FlagRule {
        matcher: FlagMatch::Word("-fno-fat-lto-objects"),
        replacement: "-fno-fat-lto-objects -ffat-lto-objects",
        rationale: "archives must carry fat LTO objects for non-LTO link steps, the later flag wins in gcc",
    },
];

impl FlagRule {
    fn apply(&self, flags: &str) -> String {
        match self.matcher {
            FlagMatch::Char(ch) => flags.replace(ch, self.replacement),
            FlagMatch::Word(word) => flags
                .split_whitespace()
                .map(|w| if w == word { self.replacement } else { w })
                .filter(|w| !w.is_empty())
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

pub struct FlagPostProcessor {
    rules: &'static [FlagRule],
}

impl FlagPostProcessor {
    pub fn for_target(syntax: TargetSyntax) -> Self {
        let rules = match syntax {
            TargetSyntax::CMake => CMAKE_RULES,
            TargetSyntax::Verbatim => &[],
        };
        Self { rules }
    }

    pub fn rules(&self) -> &[FlagRule] {
        self.rules
    }

    /// Apply the rules in table order, then collapse whitespace.
    pub fn adapt(&self, flags: &str) -> String {
        let adapted = self
            .rules
            .iter()
            .fold(flags.to_string(), |acc, rule| rule.apply(&acc));
        normalize_whitespace(&adapted)
    }
}

fn normalize_whitespace(flags: &str) -> String {
    flags.split_whitespace().collect::<Vec<_>>().join(" ")
}
