// Toolchain location interface
// Finding installed toolchains is left to the caller, the engine only asks
// for the directories belonging to the resolved target

use serde::Serialize;
use std::path::PathBuf;

/// Resolved values identifying the target hardware.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TargetFacts {
    /// `build.variant`, e.g. "32pin-ddseries"
    pub variant: Option<String>,
    /// `build.mcu`, e.g. "avr64dd32"
    pub mcu: Option<String>,
    /// `build.core`, e.g. "arduino" or "DxCore:dxcore"
    pub core: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ToolchainPaths {
    pub compiler_bin_dir: Option<PathBuf>,
    pub core_dir: Option<PathBuf>,
    pub variant_dir: Option<PathBuf>,
    pub library_dirs: Vec<PathBuf>,
}

pub trait ToolchainLocator: Send + Sync {
    fn locate(&self, facts: &TargetFacts) -> ToolchainPaths;
}

/// Fixed directories handed in by the caller.
///
/// Core and variant directories live under `hardware_root` the way an
/// Arduino hardware package lays them out: `cores/<core>` and
/// `variants/<variant>`. A `vendor:core` reference uses the part after the
/// colon.
#[derive(Debug, Clone, Default)]
pub struct StaticToolchain {
    pub compiler_bin_dir: Option<PathBuf>,
    pub hardware_root: Option<PathBuf>,
    pub library_dirs: Vec<PathBuf>,
}

impl ToolchainLocator for StaticToolchain {
    fn locate(&self, facts: &TargetFacts) -> ToolchainPaths {
        let under_root = |dir: &str, name: Option<&String>| {
            let root = self.hardware_root.as_ref()?;
            let name = name?;
            Some(root.join(dir).join(name))
        };

        let core = facts
            .core
            .as_ref()
            .map(|core| core.rsplit(':').next().unwrap_or(core).to_string());

        ToolchainPaths {
            compiler_bin_dir: self.compiler_bin_dir.clone(),
            core_dir: under_root("cores", core.as_ref()),
            variant_dir: under_root("variants", facts.variant.as_ref()),
            library_dirs: self.library_dirs.clone(),
        }
    }
}
