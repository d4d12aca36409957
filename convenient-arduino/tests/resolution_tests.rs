//! End-to-end resolution against trimmed copies of the Arduino AVR and
//! DxCore board packages in `tests/fixtures`.

use convenient_arduino::{
    ConfigFile, Diagnostic, EngineDefaults, EngineError, FlagEngine, FlagMapBuilder,
    FlagPostProcessor, Layer, OverrideSource, RecipeKind, RecipeOutcome, RecipeResolver,
    RecipeTemplateExtractor, ScopePrefix, StaticToolchain, TargetProfile, TargetSources,
    TargetSyntax,
};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn fixture(package: &str, file: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(package)
        .join(file)
}

fn package_sources(package: &str) -> TargetSources {
    TargetSources::new(fixture(package, "platform.txt"), fixture(package, "boards.txt"))
}

/// Helper to write a platform/boards pair into a temp dir
fn write_package(dir: &TempDir, platform: &str, boards: &str) -> TargetSources {
    let platform_path = dir.path().join("platform.txt");
    let boards_path = dir.path().join("boards.txt");
    fs::write(&platform_path, platform).unwrap();
    fs::write(&boards_path, boards).unwrap();
    TargetSources::new(platform_path, boards_path)
}

fn scoped_profile(scopes: &str) -> TargetProfile {
    TargetProfile::from_yaml_str(&format!("name: test\nscopes: {}\n", scopes)).unwrap()
}

#[test]
fn test_compile_flags_without_invocation_or_files() {
    let temp = TempDir::new().unwrap();
    let sources = write_package(
        &temp,
        concat!(
            r#"recipe.c.o.pattern="{compiler.path}{compiler.c.cmd}" "-c" "{compiler.c.flags}" "{source_file}" -o "{object_file}""#,
            "\ncompiler.c.flags={compiler.warning_flags} -Os\n",
        ),
        "nano.compiler.warning_flags=-Wall\n",
    );

    let target = FlagEngine::new(scoped_profile("[\"nano.\"]"))
        .resolve(&sources)
        .unwrap();

    assert_eq!(target.flags(RecipeKind::CompileC), Some("-Wall -Os"));
}

#[test]
fn test_pipeline_steps_individually() {
    let platform = ConfigFile::parse(concat!(
        r#"recipe.c.o.pattern="{compiler.path}{compiler.c.cmd}" "-c" "{compiler.c.flags}" "{source_file}" -o "{object_file}""#,
        "\ncompiler.c.flags={compiler.warning_flags} -Os\n",
    ));
    let board = ConfigFile::parse("nano.compiler.warning_flags=-Wall\n");
    let scopes = ScopePrefix::new(["nano."]).unwrap();

    let build = FlagMapBuilder::new(EngineDefaults::avr()).build_from(
        &platform,
        &board,
        &scopes,
        &OverrideSource::default(),
    );
    let template = RecipeTemplateExtractor::extract(RecipeKind::CompileC.key(), &platform).unwrap();
    assert_eq!(template.as_str(), "-c {compiler.c.flags}");

    let resolution = RecipeResolver::new(&build.map).resolve(&template).unwrap();
    assert_eq!(resolution.flags, "-c -Wall -Os");

    let flags = FlagPostProcessor::for_target(TargetSyntax::CMake).adapt(&resolution.flags);
    assert_eq!(flags, "-Wall -Os");
}

#[test]
fn test_override_wins_over_platform() {
    let temp = TempDir::new().unwrap();
    let sources = write_package(
        &temp,
        "build.arch=AVR\nrecipe.c.o.pattern=\"{compiler.path}{compiler.c.cmd}\" -DARDUINO_ARCH_{build.arch} \"{source_file}\"\n",
        "nano.name=Arduino Nano\n",
    );
    let overrides = temp.path().join("overrides.txt");
    fs::write(&overrides, "build.arch=MEGAAVR\n").unwrap();

    let target = FlagEngine::new(scoped_profile("[\"nano.\"]"))
        .resolve(&sources.with_overrides(OverrideSource::file(&overrides)))
        .unwrap();

    assert_eq!(target.flags(RecipeKind::CompileC), Some("-DARDUINO_ARCH_MEGAAVR"));
}

#[test]
fn test_reference_cycle_is_reported_as_divergence() {
    let temp = TempDir::new().unwrap();
    let sources = write_package(
        &temp,
        "a={b}\nb={a}\nrecipe.c.o.pattern=\"{compiler.path}{compiler.c.cmd}\" {a} \"{source_file}\"\n",
        "nano.name=Arduino Nano\n",
    );

    let target = FlagEngine::new(scoped_profile("[\"nano.\"]"))
        .resolve(&sources)
        .unwrap();

    assert!(matches!(
        target.recipes[&RecipeKind::CompileC],
        RecipeOutcome::Diverged { .. }
    ));
    assert!(target.has_failures());
    assert!(target.diagnostics.iter().any(|d| matches!(
        d,
        Diagnostic::ResolutionDivergence { recipe, .. } if recipe == "recipe.c.o.pattern"
    )));
}

#[test]
fn test_missing_platform_is_fatal() {
    let temp = TempDir::new().unwrap();
    let sources = TargetSources::new(temp.path().join("platform.txt"), fixture("avr", "boards.txt"));

    let err = FlagEngine::new(TargetProfile::nano()).resolve(&sources).unwrap_err();
    assert!(matches!(err, EngineError::MissingConfigFile { .. }));
}

#[test]
fn test_avr_nano_target() {
    let target = FlagEngine::new(TargetProfile::nano())
        .resolve(&package_sources("avr"))
        .unwrap();

    assert_eq!(
        target.scopes.as_slice(),
        &["nano.menu.cpu.atmega328.".to_string(), "nano.".to_string()]
    );
    assert_eq!(
        target.flags(RecipeKind::CompileC),
        Some(
            "-g -Os -w -std=gnu11 -ffunction-sections -fdata-sections -MMD -flto -fno-fat-lto-objects -ffat-lto-objects -mmcu=atmega328p -DF_CPU=16000000L -DARDUINO=10607 -DARDUINO_AVR_NANO -DARDUINO_ARCH_AVR"
        )
    );
    let cpp = target.flags(RecipeKind::CompileCpp).unwrap();
    assert!(cpp.starts_with("-g -Os -w -std=gnu++11"));
    assert!(cpp.ends_with("-DARDUINO_ARCH_AVR"));

    let link = target.flags(RecipeKind::Link).unwrap();
    assert_eq!(
        link,
        "-w -Os -g -flto -fuse-linker-plugin -Wl,--gc-sections -mmcu=atmega328p"
    );

    assert_eq!(target.facts.variant.as_deref(), Some("eightanaloginputs"));
    assert_eq!(target.facts.core.as_deref(), Some("arduino"));
    assert!(target.diagnostics.is_empty());
}

#[test]
fn test_avr_menu_choice_changes_mcu() {
    let mut profile = TargetProfile::nano();
    profile.menu.insert("cpu".to_string(), "atmega168".to_string());

    let target = FlagEngine::new(profile).resolve(&package_sources("avr")).unwrap();
    assert_eq!(target.facts.mcu.as_deref(), Some("atmega168"));
    assert!(target.flags(RecipeKind::CompileC).unwrap().contains("-mmcu=atmega168"));
}

#[test]
fn test_dxcore_target_with_override_file() {
    let sources = package_sources("dxcore")
        .with_overrides(OverrideSource::file(fixture("dxcore", "overrides.txt")));
    let toolchain = StaticToolchain {
        compiler_bin_dir: Some(PathBuf::from("/opt/avr-gcc/bin")),
        hardware_root: Some(PathBuf::from("/opt/DxCore/megaavr/1.5.11")),
        library_dirs: Vec::new(),
    };

    let target = FlagEngine::new(TargetProfile::dxcore())
        .resolve_with(&sources, &toolchain)
        .unwrap();

    // the clock menu is not chosen, its first option applies
    assert_eq!(
        target.scopes.as_slice(),
        &[
            "avrdd.menu.chip.avr64dd32.".to_string(),
            "avrdd.menu.clock.24internal.".to_string(),
            "avrdd.".to_string(),
        ]
    );
    assert_eq!(
        target.flags(RecipeKind::CompileC),
        Some(
            "-g -Os -Wall -Wextra -std=gnu11 -ffunction-sections -fdata-sections -MMD -flto -fno-fat-lto-objects -ffat-lto-objects -mrelax -mmcu=avr64dd32 -DF_CPU=24000000L -DARDUINO=10607 -DARDUINO_AVR64DD32_CUSTOM -DARDUINO_ARCH_MEGAAVR -DMILLIS_USE_TIMERB1 -DCLOCK_SOURCE=0 -DCORE_ATTACH_ALL -DTWI_MORS_SINGLE -DLOCK_FLMAP -DFLMAPSECTION1"
        )
    );
    assert!(
        target
            .flags(RecipeKind::Link)
            .unwrap()
            .contains("-Wl,--section-start=.text=0x0 -DLOCK_FLMAP -DFLMAPSECTION1")
    );

    assert_eq!(target.facts.variant.as_deref(), Some("32pin-ddseries"));
    assert_eq!(
        target.toolchain.variant_dir,
        Some(PathBuf::from("/opt/DxCore/megaavr/1.5.11/variants/32pin-ddseries"))
    );
    assert_eq!(
        target.toolchain.core_dir,
        Some(PathBuf::from("/opt/DxCore/megaavr/1.5.11/cores/dxcore"))
    );
    assert!(target.diagnostics.is_empty());
}

#[test]
fn test_dxcore_without_override_file_is_diagnosed() {
    let target = FlagEngine::new(TargetProfile::dxcore())
        .resolve(&package_sources("dxcore"))
        .unwrap();

    assert_eq!(
        target.diagnostics,
        vec![Diagnostic::MissingOverrideFile { path: None }]
    );
    // the engine defaults still provide the menu-driven values
    assert!(
        target
            .flags(RecipeKind::CompileC)
            .unwrap()
            .contains("-DMILLIS_USE_TIMERB2")
    );
    assert!(!target.has_failures());
}

#[test]
fn test_flag_map_provenance() {
    let flag_map = FlagEngine::new(TargetProfile::dxcore())
        .flag_map(
            &package_sources("dxcore")
                .with_overrides(OverrideSource::file(fixture("dxcore", "overrides.txt"))),
        )
        .unwrap();
    let map = &flag_map.map;

    assert_eq!(map.layer_of("compiler.c.cmd"), Some(Layer::Platform));
    assert_eq!(map.layer_of("build.mcu"), Some(Layer::Board));
    assert_eq!(map.layer_of("build.arch"), Some(Layer::Default));
    assert_eq!(map.get("build.millistimer"), Some("B1"));
    assert_eq!(map.layer_of("build.millistimer"), Some(Layer::Override));
    assert_eq!(map.variant(), Some("32pin-ddseries"));
}

#[test]
fn test_unknown_menu_option_is_rejected() {
    let mut profile = TargetProfile::dxcore();
    profile.menu.insert("chip".to_string(), "avr128da64".to_string());

    let err = FlagEngine::new(profile)
        .resolve(&package_sources("dxcore"))
        .unwrap_err();
    assert!(matches!(err, EngineError::Scope(_)));
}

#[test]
fn test_flag_map_holds_only_selected_menu_option() {
    let flag_map = FlagEngine::new(TargetProfile::nano())
        .flag_map(&package_sources("avr"))
        .unwrap();
    let map = &flag_map.map;

    assert!(map.iter().all(|(key, _)| !key.starts_with("menu.")));
    assert_eq!(map.get("build.mcu"), Some("atmega328p"));
    // atmega328 upload speed, not the old bootloader's or the ATmega168's
    assert_eq!(map.get("upload.speed"), Some("115200"));
}
