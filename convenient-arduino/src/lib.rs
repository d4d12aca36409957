//! Arduino build-flag resolution
//!
//! Turns an Arduino core's `platform.txt` / `boards.txt` plus a board and
//! menu selection into the compiler flags a generated (CMake) build needs:
//!
//! 1. **Flag map**: platform keys, scoped board keys, engine defaults and
//!    caller overrides merged by `FlagMapBuilder`
//! 2. **Recipe templates**: the flag zone of each compile/link recipe,
//!    isolated by `RecipeTemplateExtractor`
//! 3. **Resolution**: `{key}` tokens expanded to a fixed point by
//!    `RecipeResolver`
//! 4. **Post-processing**: flags adapted to the consuming build system by
//!    `FlagPostProcessor`
//!
//! `FlagEngine` runs all four steps for a `TargetProfile`.
//!
//! ## Usage
//!
//! ```no_run
//! use convenient_arduino::*;
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = FlagEngine::new(TargetProfile::dxcore());
//! let sources = TargetSources::new("DxCore/platform.txt", "DxCore/boards.txt")
//!     .with_overrides(OverrideSource::file("project/overrides.txt"));
//!
//! let target = engine.resolve(&sources)?;
//! if let Some(flags) = target.flags(RecipeKind::CompileCpp) {
//!     println!("CXX flags: {}", flags);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config_file;
pub mod defaults;
pub mod engine;
pub mod error;
pub mod flag_map;
pub mod postprocess;
pub mod profile;
pub mod recipe;
pub mod resolver;
pub mod scope;
pub mod toolchain;

pub use config_file::{ConfigEntry, ConfigFile, read_config_file};
pub use defaults::EngineDefaults;
pub use engine::{FlagEngine, RecipeOutcome, ResolvedTarget, TargetFlagMap, TargetSources};
pub use error::{Diagnostic, EngineError, EngineResult, ProfileError, ResolveError, ScopeError};
pub use flag_map::{FlagMap, FlagMapBuilder, FlagMapBuild, Layer, OverridePolicy, OverrideSource};
pub use postprocess::{FlagPostProcessor, TargetSyntax};
pub use profile::{BUILTIN_PROFILES, TargetProfile};
pub use recipe::{RecipeKind, RecipeTemplate, RecipeTemplateExtractor};
pub use resolver::{RecipeResolver, Resolution};
pub use scope::{MenuSelection, ScopePrefix, ScopedKeyMatcher};
pub use toolchain::{StaticToolchain, TargetFacts, ToolchainLocator, ToolchainPaths};
