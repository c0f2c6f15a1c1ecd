pub mod algebra;
pub mod config;
pub mod defaults;
pub mod emit;
pub mod error;
pub mod resolver;
pub mod sequencer;
pub mod variant;

use globset::{Glob, GlobSet, GlobSetBuilder};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{Sender, channel};
use std::time::Duration;

pub use algebra::{VariantAlgebra, VariantLookup};
pub use config::{Config, ConfigError};
pub use defaults::DefaultTable;
pub use emit::emit_css;
pub use error::{Error, ResolveError, SequenceError};
pub use resolver::{
    Resolution, ResolveOptions, ResolvedOrder, UnknownPluginPolicy, UserVariantConfig,
    VariantOverride, resolve, resolve_partial, resolve_with_options,
};
pub use sequencer::{Declaration, GeneratedRule, RawRule, RawRuleTable, RuleStream, Sequencer, sequence};
pub use variant::{Breakpoint, UnknownVariantPolicy, VariantDefinition, VariantRegistry};

pub type VariantName = String;
pub type PluginId = String;
/// Ordered variant names. Order is emission order.
pub type VariantList = Vec<VariantName>;

/// Resolves the config's variant orders against the built-in table and
/// renders its raw rules as CSS.
pub fn build_css(config: &Config, minify: bool) -> Result<String, Error> {
    let resolved = resolve_with_options(
        &config.user_variants(),
        DefaultTable::builtin(),
        config.resolve_options(),
    )?;
    let registry = config.registry();
    let raw_rules = config.raw_rules();
    let rules = Sequencer::new(&registry, &config.breakpoints())
        .unknown_variants(config.unknown_variants)
        .sequence(&resolved, &raw_rules)?;
    Ok(emit_css(rules, minify))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Resolve {
        config: Option<String>,
        plugins: Vec<String>,
    },
    Build {
        config: String,
        out: Option<String>,
        minify: bool,
    },
    Watch {
        config: String,
        out: Option<String>,
        minify: bool,
        poll: bool,
        poll_interval_ms: u64,
    },
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliError {
    pub message: String,
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        Self {
            message: err.message,
        }
    }
}

impl From<Error> for CliError {
    fn from(err: Error) -> Self {
        Self {
            message: err.to_string(),
        }
    }
}

pub fn run(command: Command) -> Result<(), CliError> {
    match command {
        Command::Resolve { config, plugins } => run_resolve(config, plugins),
        Command::Build {
            config,
            out,
            minify,
        } => run_build(&config, out.as_deref(), minify),
        Command::Watch {
            config,
            out,
            minify,
            poll,
            poll_interval_ms,
        } => run_watch(WatchOptions {
            config,
            out,
            minify,
            poll,
            poll_interval_ms,
        }),
        Command::Help => {
            print_help();
            Ok(())
        }
    }
}

pub fn run_from_env() -> Result<(), CliError> {
    let command = parse_args(env::args().skip(1))?;
    run(command)
}

pub fn parse_args<I>(args: I) -> Result<Command, CliError>
where
    I: IntoIterator<Item = String>,
{
    let mut iter = args.into_iter();
    let Some(cmd) = iter.next() else {
        return Ok(Command::Help);
    };

    match cmd.as_str() {
        "resolve" => parse_resolve_args(iter.collect()),
        "build" => parse_build_args(iter.collect()),
        "watch" => parse_watch_args(iter.collect()),
        "-h" | "--help" | "help" => Ok(Command::Help),
        _ => Err(CliError {
            message: format!("unknown command: {}", cmd),
        }),
    }
}

fn parse_resolve_args(args: Vec<String>) -> Result<Command, CliError> {
    let mut config = None;
    let mut plugins = Vec::new();
    let mut idx = 0;

    while idx < args.len() {
        match args[idx].as_str() {
            "--config" | "-c" => {
                config = Some(flag_value(&args, &mut idx, "resolve", "--config")?);
            }
            "--plugin" | "-p" => {
                plugins.push(flag_value(&args, &mut idx, "resolve", "--plugin")?);
            }
            value => {
                return Err(CliError {
                    message: format!("resolve does not accept argument '{}'", value),
                });
            }
        }
        idx += 1;
    }

    Ok(Command::Resolve { config, plugins })
}

fn parse_build_args(args: Vec<String>) -> Result<Command, CliError> {
    let mut config = None;
    let mut out = None;
    let mut minify = false;
    let mut idx = 0;

    while idx < args.len() {
        match args[idx].as_str() {
            "--config" | "-c" => {
                config = Some(flag_value(&args, &mut idx, "build", "--config")?);
            }
            "--out" | "--output" | "-o" => {
                out = Some(flag_value(&args, &mut idx, "build", "--output")?);
            }
            "--minify" => {
                minify = true;
            }
            "--poll" | "--poll-interval" => {
                return Err(CliError {
                    message: format!("{} is only supported with watch", args[idx]),
                });
            }
            value => {
                return Err(CliError {
                    message: format!("build does not accept argument '{}'", value),
                });
            }
        }
        idx += 1;
    }

    let Some(config) = config else {
        return Err(CliError {
            message: "build requires --config".to_string(),
        });
    };

    Ok(Command::Build {
        config,
        out,
        minify,
    })
}

fn parse_watch_args(args: Vec<String>) -> Result<Command, CliError> {
    let mut config = None;
    let mut out = None;
    let mut minify = false;
    let mut poll = false;
    let mut poll_interval_ms = 500;
    let mut idx = 0;

    while idx < args.len() {
        match args[idx].as_str() {
            "--config" | "-c" => {
                config = Some(flag_value(&args, &mut idx, "watch", "--config")?);
            }
            "--out" | "--output" | "-o" => {
                out = Some(flag_value(&args, &mut idx, "watch", "--output")?);
            }
            "--minify" => {
                minify = true;
            }
            "--poll" => {
                poll = true;
            }
            "--poll-interval" => {
                let value = flag_value(&args, &mut idx, "watch", "--poll-interval")?;
                poll = true;
                poll_interval_ms = parse_interval_ms(&value)?;
            }
            value => {
                return Err(CliError {
                    message: format!("watch does not accept argument '{}'", value),
                });
            }
        }
        idx += 1;
    }

    let Some(config) = config else {
        return Err(CliError {
            message: "watch requires --config".to_string(),
        });
    };

    Ok(Command::Watch {
        config,
        out,
        minify,
        poll,
        poll_interval_ms,
    })
}

fn flag_value(
    args: &[String],
    idx: &mut usize,
    command: &str,
    flag: &str,
) -> Result<String, CliError> {
    *idx += 1;
    args.get(*idx).cloned().ok_or_else(|| CliError {
        message: format!("{} requires a value for {}", command, flag),
    })
}

fn run_resolve(config_path: Option<String>, plugins: Vec<String>) -> Result<(), CliError> {
    let config = match config_path.as_deref() {
        Some(path) => config::load(Path::new(path))?,
        None => Config::default(),
    };
    let filter = if plugins.is_empty() {
        None
    } else {
        Some(plugin_filter(&plugins)?)
    };

    let resolution = resolve_partial(
        &config.user_variants(),
        DefaultTable::builtin(),
        config.resolve_options(),
    )
    .map_err(|err| CliError {
        message: err.to_string(),
    })?;

    let mut printed = 0usize;
    for (plugin, variants) in resolution.order.iter() {
        if !plugin_selected(plugin, filter.as_ref()) {
            continue;
        }
        println!("{}: {}", plugin, variants.join(", "));
        printed += 1;
    }
    for err in &resolution.errors {
        if err.plugin().is_some_and(|plugin| plugin_selected(plugin, filter.as_ref())) {
            eprintln!("error: {}", err);
        }
    }

    eprintln!(
        "resolved {} plugins, {} failed",
        printed,
        resolution.errors.len()
    );

    if resolution.is_complete() {
        Ok(())
    } else {
        Err(CliError {
            message: format!(
                "{} plugins failed to resolve",
                resolution.errors.len()
            ),
        })
    }
}

fn plugin_selected(plugin: &str, filter: Option<&GlobSet>) -> bool {
    filter.is_none_or(|set| set.is_match(plugin))
}

fn run_build(config_path: &str, out: Option<&str>, minify: bool) -> Result<(), CliError> {
    let config = config::load(Path::new(config_path))?;
    let css = build_css(&config, minify)?;

    if let Some(out_path) = out {
        if let Some(parent) = Path::new(out_path).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|err| CliError {
                    message: format!("failed to create {}: {}", parent.display(), err),
                })?;
            }
        }
        fs::write(out_path, &css).map_err(|err| CliError {
            message: format!("failed to write output {}: {}", out_path, err),
        })?;
    } else {
        print!("{}", css);
    }

    eprintln!(
        "built {} plugins into {} bytes of css",
        config.rules.len(),
        css.len()
    );

    Ok(())
}

fn print_help() {
    println!("ironframe-variants");
    println!();
    println!("USAGE:");
    println!("  ironframe-variants resolve [--config <path>] [--plugin <glob>...]");
    println!("  ironframe-variants build --config <path> [--output <path>] [--minify]");
    println!(
        "  ironframe-variants watch --config <path> [--output <path>] [--minify] [--poll] [--poll-interval <ms>]"
    );
    println!();
    println!("EXAMPLES:");
    println!("  ironframe-variants resolve");
    println!("  ironframe-variants resolve -c variants.toml -p \"text*\" -p padding");
    println!("  ironframe-variants build -c variants.toml --output dist/variants.css");
    println!("  ironframe-variants watch -c variants.toml --poll --poll-interval 250");
    println!();
    println!("LOGGING:");
    println!("  IRONFRAME_LOG=debug ironframe-variants build -c variants.toml");
}

#[derive(Debug, Clone)]
struct WatchOptions {
    config: String,
    out: Option<String>,
    minify: bool,
    poll: bool,
    poll_interval_ms: u64,
}

// Editors emit several events per save; a rebuild waits for this much quiet.
const REBUILD_QUIET_PERIOD: Duration = Duration::from_millis(150);

fn run_watch(options: WatchOptions) -> Result<(), CliError> {
    let WatchOptions {
        config,
        out,
        minify,
        poll,
        poll_interval_ms,
    } = options;

    run_build(&config, out.as_deref(), minify)?;

    let (tx, rx) = channel();
    let mut watcher = start_watcher(tx, poll.then(|| Duration::from_millis(poll_interval_ms)))?;
    // Saving often replaces the file, so the directory is watched instead.
    let root = watch_root(&config);
    watcher
        .watch(&root, notify::RecursiveMode::NonRecursive)
        .map_err(|err| CliError {
            message: format!("cannot watch config directory {}: {}", root.display(), err),
        })?;
    eprintln!("rebuilding on changes to {} (Ctrl+C to stop)", config);

    let config_path = Path::new(&config);
    while let Ok(event) = rx.recv() {
        let relevant = match event {
            Ok(event) => touches_config(&event, config_path),
            Err(err) => {
                tracing::warn!(error = %err, "config watcher reported an error");
                false
            }
        };
        if !relevant {
            continue;
        }
        while rx.recv_timeout(REBUILD_QUIET_PERIOD).is_ok() {}

        eprintln!("{} changed, rebuilding", config);
        if let Err(err) = run_build(&config, out.as_deref(), minify) {
            eprintln!("rebuild failed, previous output kept: {}", err.message);
        }
    }

    Ok(())
}

fn start_watcher(
    tx: Sender<notify::Result<notify::Event>>,
    poll_interval: Option<Duration>,
) -> Result<Box<dyn notify::Watcher>, CliError> {
    let watcher_error = |err: notify::Error| CliError {
        message: format!("cannot start config watcher: {}", err),
    };
    let watcher: Box<dyn notify::Watcher> = match poll_interval {
        Some(interval) => Box::new(
            notify::PollWatcher::new(tx, notify::Config::default().with_poll_interval(interval))
                .map_err(watcher_error)?,
        ),
        None => Box::new(notify::recommended_watcher(tx).map_err(watcher_error)?),
    };
    Ok(watcher)
}

fn watch_root(config: &str) -> PathBuf {
    match Path::new(config).parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn touches_config(event: &notify::Event, config: &Path) -> bool {
    let Some(name) = config.file_name() else {
        return false;
    };
    event
        .paths
        .iter()
        .any(|path| path == config || path.file_name() == Some(name))
}

fn parse_interval_ms(value: &str) -> Result<u64, CliError> {
    value.parse::<u64>().map_err(|_| CliError {
        message: format!(
            "--poll-interval expects a whole number of milliseconds, got '{}'",
            value
        ),
    })
}

fn plugin_filter(patterns: &[String]) -> Result<GlobSet, CliError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|err| CliError {
            message: format!("invalid plugin pattern '{}': {}", pattern, err),
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|err| CliError {
        message: format!("cannot combine plugin patterns: {}", err),
    })
}
