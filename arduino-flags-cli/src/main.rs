use clap::{Args, Parser, Subcommand, ValueEnum, crate_version};
use convenient_arduino::{
    FlagEngine, OverrideSource, RecipeKind, RecipeOutcome, ResolvedTarget, ScopePrefix,
    StaticToolchain, TargetFlagMap, TargetProfile, TargetSources,
};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{Level, debug, error, span};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Resolve Arduino platform/board recipes into compiler flags.
#[derive(Parser)]
#[clap(version = crate_version!())]
struct Opts {
    /// Print debug information
    #[clap(short, long, global = true)]
    debug: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve the compile and link flags of a target
    Resolve(ResolveArgs),
    /// Print the merged flag map with the layer each value came from
    Map(TargetArgs),
    /// Print the scopes selected in the board file
    Scopes(TargetArgs),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Args)]
struct TargetArgs {
    /// Path to the core's platform.txt
    #[clap(short, long, env = "ARDUINO_PLATFORM_TXT")]
    platform: PathBuf,

    /// Path to the core's boards.txt
    #[clap(short, long, env = "ARDUINO_BOARDS_TXT")]
    boards: PathBuf,

    /// Built-in profile name (nano, dxcore) or path to a YAML profile
    #[clap(long, default_value = "nano", env = "ARDUINO_FLAGS_PROFILE")]
    profile: String,

    /// Board id, replaces the profile's board
    #[clap(long)]
    board_id: Option<String>,

    /// Menu choice as menu=option, may be repeated
    #[clap(short, long = "menu", value_parser = parse_key_value)]
    menu: Vec<(String, String)>,

    /// Explicit scope, most specific first; disables menu discovery
    #[clap(long = "scope")]
    scopes: Vec<String>,

    /// Project override file (key=value)
    #[clap(short = 'o', long = "override", env = "ARDUINO_FLAGS_OVERRIDE")]
    override_file: Option<PathBuf>,

    /// Override value as key=value, wins over the override file
    #[clap(short, long = "set", value_parser = parse_key_value)]
    set: Vec<(String, String)>,

    #[clap(short, long, value_enum, default_value_t = Format::Text)]
    format: Format,
}

#[derive(Args)]
struct ResolveArgs {
    #[clap(flatten)]
    target: TargetArgs,

    /// Directory holding the compiler binaries
    #[clap(long, env = "ARDUINO_COMPILER_BIN")]
    compiler_bin_dir: Option<PathBuf>,

    /// Hardware package root containing cores/ and variants/
    #[clap(long, env = "ARDUINO_HARDWARE_ROOT")]
    hardware_root: Option<PathBuf>,

    /// Library directory, may be repeated
    #[clap(long = "library-dir")]
    library_dirs: Vec<PathBuf>,
}

fn parse_key_value(input: &str) -> Result<(String, String), String> {
    let (key, value) = input
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", input))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{}'", input));
    }
    Ok((key.to_string(), value.to_string()))
}

impl TargetArgs {
    fn profile(&self) -> Result<TargetProfile, Box<dyn Error>> {
        let mut profile = if Path::new(&self.profile).is_file() {
            TargetProfile::load(&self.profile)?
        } else {
            TargetProfile::builtin(&self.profile)?
        };

        if let Some(board) = &self.board_id {
            profile.board = board.clone();
            profile.menu.clear();
        }
        profile.menu.extend(self.menu.iter().cloned());
        if !self.scopes.is_empty() {
            profile.scopes = Some(ScopePrefix::new(self.scopes.iter().cloned())?);
        }
        Ok(profile)
    }

    fn sources(&self) -> TargetSources {
        let mut overrides = match &self.override_file {
            Some(path) => OverrideSource::file(path),
            None => OverrideSource::default(),
        };
        overrides.values.extend(self.set.iter().cloned());
        TargetSources::new(&self.platform, &self.boards).with_overrides(overrides)
    }
}

fn print_target(target: &ResolvedTarget, format: Format) -> Result<(), Box<dyn Error>> {
    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(target)?),
        Format::Text => {
            for kind in RecipeKind::ALL {
                match target.recipes.get(&kind) {
                    Some(RecipeOutcome::Resolved { flags, .. }) => println!("{}: {}", kind, flags),
                    Some(RecipeOutcome::Diverged { passes }) => {
                        println!("{}: <diverged after {} passes>", kind, passes)
                    }
                    Some(RecipeOutcome::Missing) | None => println!("{}: <missing>", kind),
                }
            }
            let facts = [
                ("mcu", &target.facts.mcu),
                ("variant", &target.facts.variant),
                ("core", &target.facts.core),
            ];
            for (name, value) in facts {
                if let Some(value) = value {
                    println!("{}: {}", name, value);
                }
            }
        }
    }
    Ok(())
}

fn print_flag_map(flag_map: &TargetFlagMap, format: Format) -> Result<(), Box<dyn Error>> {
    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(flag_map)?),
        Format::Text => {
            for (key, value) in flag_map.map.iter_with_layer() {
                println!("{} = {}  [{}]", key, value.value, value.layer.as_str());
            }
        }
    }
    Ok(())
}

fn run(opts: Opts) -> Result<ExitCode, Box<dyn Error>> {
    match opts.command {
        Command::Resolve(args) => {
            let span = span!(Level::INFO, "resolve");
            let _enter = span.enter();

            let engine = FlagEngine::new(args.target.profile()?);
            let toolchain = StaticToolchain {
                compiler_bin_dir: args.compiler_bin_dir,
                hardware_root: args.hardware_root,
                library_dirs: args.library_dirs,
            };
            let target = engine.resolve_with(&args.target.sources(), &toolchain)?;
            print_target(&target, args.target.format)?;

            if target.has_failures() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Map(args) => {
            let engine = FlagEngine::new(args.profile()?);
            let flag_map = engine.flag_map(&args.sources())?;
            print_flag_map(&flag_map, args.format)?;
        }
        Command::Scopes(args) => {
            let engine = FlagEngine::new(args.profile()?);
            let scopes = engine.scopes(&args.sources())?;
            match args.format {
                Format::Json => println!("{}", serde_json::to_string_pretty(&scopes)?),
                Format::Text => scopes.iter().for_each(|scope| println!("{}", scope)),
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    let opts = Opts::parse();

    let default_filter = if opts.debug {
        "arduino_flags=debug,convenient_arduino=debug"
    } else {
        "arduino_flags=info,convenient_arduino=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    debug!("Starting arduino-flags {}", crate_version!());

    match run(opts) {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
