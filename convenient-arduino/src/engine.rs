//! Resolution of one target: flag map, recipes, facts and toolchain paths.

use crate::config_file::ConfigFile;
use crate::error::{Diagnostic, EngineResult, ResolveError};
use crate::flag_map::{FlagMap, FlagMapBuilder, OverrideSource, VARIANT_KEY, load_mandatory};
use crate::postprocess::FlagPostProcessor;
use crate::profile::TargetProfile;
use crate::recipe::{RecipeKind, RecipeTemplateExtractor};
use crate::resolver::RecipeResolver;
use crate::scope::ScopePrefix;
use crate::toolchain::{StaticToolchain, TargetFacts, ToolchainLocator, ToolchainPaths};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info, warn};

const MCU_KEY: &str = "build.mcu";
const CORE_KEY: &str = "build.core";

/// Input files for one target.
#[derive(Debug, Clone, Default)]
pub struct TargetSources {
    pub platform: PathBuf,
    pub board: PathBuf,
    pub overrides: OverrideSource,
}

impl TargetSources {
    pub fn new(platform: impl Into<PathBuf>, board: impl Into<PathBuf>) -> Self {
        Self {
            platform: platform.into(),
            board: board.into(),
            overrides: OverrideSource::default(),
        }
    }

    pub fn with_overrides(mut self, overrides: OverrideSource) -> Self {
        self.overrides = overrides;
        self
    }
}

/// Merged flag map of a target together with the scopes it was built from.
#[derive(Debug, Clone, Serialize)]
pub struct TargetFlagMap {
    pub scopes: ScopePrefix,
    pub map: FlagMap,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecipeOutcome {
    Resolved { flags: String, unresolved: Vec<String> },
    Missing,
    Diverged { passes: usize },
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolvedTarget {
    pub profile: String,
    pub scopes: ScopePrefix,
    pub recipes: BTreeMap<RecipeKind, RecipeOutcome>,
    pub facts: TargetFacts,
    pub toolchain: ToolchainPaths,
    pub diagnostics: Vec<Diagnostic>,
}

impl ResolvedTarget {
    /// Final flags of a recipe, if it resolved.
    pub fn flags(&self, kind: RecipeKind) -> Option<&str> {
        match self.recipes.get(&kind)? {
            RecipeOutcome::Resolved { flags, .. } => Some(flags.as_str()),
            _ => None,
        }
    }

    pub fn has_failures(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_failure)
    }
}

/// Resolves targets described by a [`TargetProfile`].
///
/// Holds no state between calls; one engine can resolve several targets,
/// also from different threads.
#[derive(Debug, Clone)]
pub struct FlagEngine {
    profile: TargetProfile,
}

impl FlagEngine {
    pub fn new(profile: TargetProfile) -> Self {
        Self { profile }
    }

    pub fn profile(&self) -> &TargetProfile {
        &self.profile
    }

    /// Scopes the profile selects in the target's board file.
    pub fn scopes(&self, sources: &TargetSources) -> EngineResult<ScopePrefix> {
        let board = load_mandatory(&sources.board)?;
        self.profile.resolve_scopes(&board)
    }

    /// Build the merged flag map without resolving any recipe.
    pub fn flag_map(&self, sources: &TargetSources) -> EngineResult<TargetFlagMap> {
        let (_, flag_map) = self.load(sources)?;
        for diagnostic in &flag_map.diagnostics {
            warn!("{}: {}", self.profile.name, diagnostic);
        }
        Ok(flag_map)
    }

    fn load(&self, sources: &TargetSources) -> EngineResult<(ConfigFile, TargetFlagMap)> {
        let platform = load_mandatory(&sources.platform)?;
        let board = load_mandatory(&sources.board)?;
        let scopes = self.profile.resolve_scopes(&board)?;

        let build = FlagMapBuilder::new(self.profile.defaults.clone())
            .override_policy(self.profile.override_policy)
            .build_from(&platform, &board, &scopes, &sources.overrides);
        debug!("Flag map for '{}' has {} keys", self.profile.name, build.map.len());

        Ok((
            platform,
            TargetFlagMap {
                scopes,
                map: build.map,
                diagnostics: build.diagnostics,
            },
        ))
    }

    pub fn resolve(&self, sources: &TargetSources) -> EngineResult<ResolvedTarget> {
        self.resolve_with(sources, &StaticToolchain::default())
    }

    /// Resolve every recipe of the target and ask `locator` for its toolchain.
    pub fn resolve_with(
        &self,
        sources: &TargetSources,
        locator: &dyn ToolchainLocator,
    ) -> EngineResult<ResolvedTarget> {
        info!(
            "Resolving target '{}' from {} and {}",
            self.profile.name,
            sources.platform.display(),
            sources.board.display()
        );

        let (
            platform,
            TargetFlagMap {
                scopes,
                map: flag_map,
                mut diagnostics,
            },
        ) = self.load(sources)?;

        let resolver = RecipeResolver::new(&flag_map);
        let post = FlagPostProcessor::for_target(self.profile.target_syntax);
        let mut recipes = BTreeMap::new();

        for kind in RecipeKind::ALL {
            let recipe = kind.key();
            let Some(template) = RecipeTemplateExtractor::extract(recipe, &platform) else {
                diagnostics.push(Diagnostic::RecipeNotFound {
                    recipe: recipe.to_string(),
                    optional: self.profile.is_optional(kind),
                });
                recipes.insert(kind, RecipeOutcome::Missing);
                continue;
            };

            let outcome = match resolver.resolve(&template) {
                Ok(resolution) => {
                    if !resolution.unresolved.is_empty() {
                        diagnostics.push(Diagnostic::UnresolvedTokens {
                            recipe: recipe.to_string(),
                            tokens: resolution.unresolved.clone(),
                        });
                    }
                    RecipeOutcome::Resolved {
                        flags: post.adapt(&resolution.flags),
                        unresolved: resolution.unresolved,
                    }
                }
                Err(ResolveError::Divergence { passes, tokens }) => {
                    diagnostics.push(Diagnostic::ResolutionDivergence {
                        recipe: recipe.to_string(),
                        passes,
                        tokens,
                    });
                    RecipeOutcome::Diverged { passes }
                }
            };
            recipes.insert(kind, outcome);
        }

        let facts = TargetFacts {
            variant: resolve_fact(&resolver, VARIANT_KEY, flag_map.variant(), &mut diagnostics),
            mcu: resolve_fact(&resolver, MCU_KEY, flag_map.get(MCU_KEY), &mut diagnostics),
            core: resolve_fact(&resolver, CORE_KEY, flag_map.get(CORE_KEY), &mut diagnostics),
        };
        let toolchain = locator.locate(&facts);

        for diagnostic in &diagnostics {
            warn!("{}: {}", self.profile.name, diagnostic);
        }
        info!(
            "Target '{}' resolved with {} diagnostics",
            self.profile.name,
            diagnostics.len()
        );

        Ok(ResolvedTarget {
            profile: self.profile.name.clone(),
            scopes,
            recipes,
            facts,
            toolchain,
            diagnostics,
        })
    }
}

/// Resolve a single flag map value. A value that still holds tokens or
/// diverges is reported and left out, the locator only sees usable facts.
fn resolve_fact(
    resolver: &RecipeResolver<'_>,
    key: &str,
    value: Option<&str>,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<String> {
    match resolver.resolve_str(value?) {
        Ok(resolution) if resolution.is_complete() => Some(resolution.flags.trim().to_string()),
        Ok(resolution) => {
            diagnostics.push(Diagnostic::UnresolvedTokens {
                recipe: key.to_string(),
                tokens: resolution.unresolved,
            });
            None
        }
        Err(ResolveError::Divergence { passes, tokens }) => {
            diagnostics.push(Diagnostic::ResolutionDivergence {
                recipe: key.to_string(),
                passes,
                tokens,
            });
            None
        }
    }
}
