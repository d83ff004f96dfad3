//! CLI module - Command-line interface definitions and handlers

use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use regex::Regex;

use prewarm::cache::key::InvalidationContext;
use prewarm::cache::store::{ArtifactKind, CompileCache};
use prewarm::core::config::{Config, ENV_CACHE_DIR, ENV_COMPILER, ENV_LOAD_PATH};
use prewarm::core::model::{ItemError, Meta, ResultItem, ResultSet};
use prewarm::core::paths::normalize_path;
use prewarm::core::render::{OutputFormat, RenderConfig, Renderer};
use prewarm::load_path::{scan, ObservedLoadPath, Resolution, ResolutionIndex};
use prewarm::precompile::{list_files, summary_line, work_loop, Precompiler, WorkerPool};

/// prewarm - warm and inspect the compile caches and the load-path index.
#[derive(Parser, Debug)]
#[command(name = "prewarm")]
#[command(
    author,
    version,
    about,
    long_about = r#"prewarm speeds up runtime startup with two caches:

- a compiled-artifact cache: one entry per source file, reused while the file's
  size and mtime are unchanged
- a load-path index: short names like "json/ext" resolved against an ordered
  list of search roots without probing the filesystem

Every command prints a ResultSet in the selected format (default: jsonl).

Examples:
    prewarm precompile app lib config --jobs 4
    prewarm resolve json/ext --load-path lib:vendor/lib
    prewarm inspect app/models/user.rb
    prewarm clear
"#
)]
pub struct Cli {
    /// Cache root directory.
    #[arg(
        long,
        global = true,
        env = ENV_CACHE_DIR,
        value_name = "DIR",
        long_help = "Root directory of all on-disk caches (defaults to tmp/cache).\n\n\
Compile caches live in compile-cache, compile-cache-yaml and compile-cache-json\n\
below it; the load-path scan cache is load-path-cache."
    )]
    pub cache_dir: Option<PathBuf>,

    /// Output format (jsonl/json/md).
    #[arg(
        long,
        global = true,
        default_value = "jsonl",
        value_name = "FORMAT",
        long_help = "Select the output format for ResultSet.\n\n\
Supported values:\n\
- jsonl (default)\n\
- json\n\
- md (markdown)"
    )]
    pub format: String,

    /// Pretty-print JSON/JSONL output with indentation.
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Verbose mode (debug diagnostics on stderr).
    #[arg(
        short,
        long,
        global = true,
        long_help = "Enable debug diagnostics on stderr. PREWARM_LOG overrides this with a\n\
full tracing filter (e.g. PREWARM_LOG=prewarm::cache=trace)."
    )]
    pub verbose: bool,

    /// Quiet mode (errors only).
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output (when applicable).
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Development mode: volatile roots expire and index misses fall back to a scan.
    #[arg(long, global = true)]
    pub development: bool,

    /// Refresh only the mtime of entries whose source size is unchanged.
    #[arg(
        long,
        global = true,
        long_help = "Revalidation mode: when only a source file's mtime changed, keep the\n\
cached payload and rewrite the entry's recorded mtime instead of recompiling.\n\n\
Useful after a fresh checkout, where every mtime differs but contents do not."
    )]
    pub revalidate: bool,

    /// Never write to the cache directory.
    #[arg(long, global = true)]
    pub readonly: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Precompile files into the compile caches.
    #[command(
        long_about = r#"Compile every .rb, .yml/.yaml and .json file under PATHS into its
compile cache, so the next boot only reads cached payloads.

Work is spread over --jobs worker processes; --jobs 0 compiles inline.
Exits with status 1 if any file failed to compile or any worker failed.

Examples:
    prewarm precompile app lib
    prewarm precompile config --kinds yaml,json
    prewarm precompile . --exclude '/(spec|test)/' --jobs 8
"#
    )]
    Precompile {
        /// Files or directories to precompile.
        #[arg(value_name = "PATH", num_args = 0.., default_value = ".")]
        paths: Vec<PathBuf>,

        /// Artifact kinds to precompile.
        #[arg(
            long,
            value_name = "KINDS",
            value_delimiter = ',',
            default_value = "source,yaml,json"
        )]
        kinds: Vec<ArtifactKind>,

        /// Skip paths matching this regular expression.
        #[arg(
            long,
            value_name = "REGEX",
            long_help = "Skip files and directories whose full path matches REGEX.\n\n\
A matching directory is not descended into."
        )]
        exclude: Option<String>,

        /// Number of worker processes (0 compiles inline).
        #[arg(short, long, value_name = "N")]
        jobs: Option<usize>,

        /// External compiler command for source files.
        #[arg(
            long,
            env = ENV_COMPILER,
            value_name = "CMD",
            long_help = "Shell command that compiles one source file: source bytes on stdin,\n\
compiled bytes on stdout, non-zero exit with a message on stderr for a syntax\n\
error. The source path is exported as PREWARM_SOURCE_PATH.\n\n\
Without a compiler, sources are cached verbatim."
        )]
        compiler: Option<String>,
    },

    /// Worker process for `precompile` (reads jobs from stdin).
    #[command(hide = true)]
    Worker {
        #[arg(long, value_name = "CMD")]
        compiler: Option<String>,
    },

    /// Resolve short names against a load path.
    #[command(
        long_about = r#"Resolve each NAME the way a require would, and print whether it was
found (with its absolute path), suppressed as a builtin, needs a fallback scan,
or was not found.

Examples:
    prewarm resolve json/ext set --load-path lib:vendor/lib
    PREWARM_LOAD_PATH=lib prewarm resolve app
"#
    )]
    Resolve {
        /// Names to resolve.
        #[arg(value_name = "NAME", required = true, num_args = 1..)]
        names: Vec<String>,

        /// Search roots, in precedence order.
        #[arg(
            long,
            env = ENV_LOAD_PATH,
            value_name = "DIRS",
            value_delimiter = ':'
        )]
        load_path: Vec<PathBuf>,
    },

    /// List the requirable files and directories under a search root.
    Scan {
        /// Search root to scan.
        #[arg(value_name = "ROOT")]
        root: PathBuf,

        /// Directories to leave out.
        #[arg(long, value_name = "DIR")]
        exclude: Vec<PathBuf>,
    },

    /// Show the cache entry for a file and what a fetch would do.
    #[command(
        long_about = r#"Print the cache entry location, the stored key, the current key of
FILE, and the decision a fetch would take (hit, revalidate, stale or miss).

Examples:
    prewarm inspect app/models/user.rb
    prewarm inspect config/settings.yml --format json --pretty
"#
    )]
    Inspect {
        /// Source file to inspect.
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Artifact kind (inferred from the extension when omitted).
        #[arg(long, value_name = "KIND")]
        kind: Option<ArtifactKind>,
    },

    /// Remove all compile caches and the load-path scan cache.
    Clear,
}

/// Run the CLI with parsed arguments
pub fn run(cli: Cli) -> Result<()> {
    let format: OutputFormat = cli.format.parse().unwrap_or_default();
    let render_config = RenderConfig::with_pretty(format, cli.pretty);

    if cli.no_color {
        colored::control::set_override(false);
    }

    let config = build_config(&cli);
    tracing::debug!(
        cache_dir = %config.cache_dir.display(),
        development = config.development_mode,
        revalidation = config.revalidation,
        readonly = config.readonly,
        "configuration"
    );

    match cli.command {
        Commands::Precompile {
            paths,
            kinds,
            exclude,
            jobs,
            compiler,
        } => run_precompile(
            &config,
            &paths,
            &kinds,
            exclude.as_deref(),
            jobs,
            compiler,
            cli.quiet,
            render_config,
        ),
        Commands::Worker { compiler } => run_worker(&config, compiler),
        Commands::Resolve { names, load_path } => {
            run_resolve(&config, &names, load_path, render_config)
        }
        Commands::Scan { root, exclude } => run_scan(&root, &exclude, render_config),
        Commands::Inspect { file, kind } => run_inspect(&config, &file, kind, render_config),
        Commands::Clear => run_clear(&config, render_config),
    }
}

/// Environment first, then explicit flags on top
fn build_config(cli: &Cli) -> Config {
    let mut config = Config::from_env();
    if let Some(dir) = &cli.cache_dir {
        config.cache_dir = dir.clone();
    }
    if cli.development {
        config = config.with_development_mode(true);
    }
    if cli.revalidate {
        config = config.with_revalidation(true);
    }
    if cli.readonly {
        config = config.with_readonly(true);
    }
    config
}

fn invalidation_context() -> Arc<InvalidationContext> {
    Arc::new(InvalidationContext::default())
}

#[allow(clippy::too_many_arguments)]
fn run_precompile(
    config: &Config,
    paths: &[PathBuf],
    kinds: &[ArtifactKind],
    exclude: Option<&str>,
    jobs: Option<usize>,
    compiler: Option<String>,
    quiet: bool,
    render_config: RenderConfig,
) -> Result<()> {
    let exclude = exclude
        .map(Regex::new)
        .transpose()
        .context("Invalid --exclude pattern")?;
    let files = list_files(paths, kinds, exclude.as_ref());
    let size = jobs.unwrap_or_else(default_jobs).min(files.len());
    tracing::info!(target: "prewarm::precompile", files = files.len(), workers = size, "precompiling");

    // Workers resolve paths against our cwd and must agree on the cache root.
    let cache_dir = std::env::current_dir()
        .map(|cwd| cwd.join(&config.cache_dir))
        .unwrap_or_else(|_| config.cache_dir.clone());
    let exe = std::env::current_exe().context("Failed to locate the prewarm executable")?;
    let worker_command = || {
        let mut command = Command::new(&exe);
        command.arg("worker").arg("--cache-dir").arg(&cache_dir);
        if config.revalidation {
            command.arg("--revalidate");
        }
        if config.readonly {
            command.arg("--readonly");
        }
        if config.development_mode {
            command.arg("--development");
        }
        if let Some(compiler) = &compiler {
            command.arg("--compiler").arg(compiler);
        }
        command
    };

    let precompiler = Precompiler::new(config, invalidation_context(), compiler.clone());
    let mut pool = WorkerPool::create(size, worker_command, |job| {
        precompiler.compile(job).map_err(|e| e.to_string())
    })
    .context("Failed to start worker processes")?;

    for job in files {
        pool.push(job).context("Failed to dispatch job to workers")?;
    }
    let report = pool.shutdown();

    let mut result_set = ResultSet::new();
    for outcome in &report.outcomes {
        let path = normalize_path(&outcome.job.path);
        let item = if outcome.ok {
            ResultItem::compile(path, "ok")
        } else {
            ResultItem::compile(path, "failed").with_error(ItemError::new(
                "UNCOMPILABLE",
                outcome.message.clone().unwrap_or_default(),
            ))
        };
        result_set.push(item);
    }
    result_set.sort();
    Renderer::with_config(render_config).print(&result_set);

    if !quiet {
        eprintln!("{}", summary_line(&report));
    }
    if !report.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn run_worker(config: &Config, compiler: Option<String>) -> Result<()> {
    let precompiler = Precompiler::new(config, invalidation_context(), compiler);
    let stdin = io::stdin();
    let all_ok = work_loop(BufReader::new(stdin.lock()), io::stdout().lock(), |job| {
        precompiler.compile(job).map_err(|e| e.to_string())
    })
    .context("Worker lost its job stream")?;

    if !all_ok {
        std::process::exit(1);
    }
    Ok(())
}

fn run_resolve(
    config: &Config,
    names: &[String],
    load_path: Vec<PathBuf>,
    render_config: RenderConfig,
) -> Result<()> {
    let index = Arc::new(ResolutionIndex::from_config(config));
    let load_path = ObservedLoadPath::new(index, load_path);

    let mut result_set = ResultSet::new();
    for name in names {
        let resolution = load_path.index().resolve(name);
        let mut item = ResultItem::resolution(name, resolution.as_str());
        if let Resolution::Found(path) = &resolution {
            item = item.with_path(normalize_path(path));
        }
        result_set.push(item);
    }
    Renderer::with_config(render_config).print(&result_set);
    Ok(())
}

fn run_scan(root: &Path, exclude: &[PathBuf], render_config: RenderConfig) -> Result<()> {
    if !root.is_dir() {
        bail!("Not a directory: {}", root.display());
    }
    let result = scan(root, exclude);

    let mut result_set = ResultSet::new();
    result_set.extend(result.requirables.into_iter().map(ResultItem::file));
    result_set.extend(result.dirs.into_iter().map(ResultItem::dir));
    result_set.sort();
    Renderer::with_config(render_config).print(&result_set);
    Ok(())
}

fn run_inspect(
    config: &Config,
    file: &Path,
    kind: Option<ArtifactKind>,
    render_config: RenderConfig,
) -> Result<()> {
    let Some(kind) = kind.or_else(|| ArtifactKind::for_path(file)) else {
        bail!(
            "Cannot infer artifact kind for {}; pass --kind",
            file.display()
        );
    };
    let cache = CompileCache::from_config(config, kind, invalidation_context());
    let inspection = cache
        .inspect(file, None)
        .with_context(|| format!("Failed to inspect {}", file.display()))?;

    let item = ResultItem::entry(normalize_path(&inspection.entry))
        .with_status(inspection.decision.as_str())
        .with_meta(Meta {
            mtime: Some(inspection.current.source_mtime),
            size: Some(inspection.current.source_size),
            hash: Some(inspection.hash.clone()),
        })
        .with_data(serde_json::to_value(&inspection).context("Failed to serialize inspection")?);

    let mut result_set = ResultSet::new();
    result_set.push(item);
    Renderer::with_config(render_config).print(&result_set);
    Ok(())
}

fn run_clear(config: &Config, render_config: RenderConfig) -> Result<()> {
    let mut result_set = ResultSet::new();
    let context = invalidation_context();
    for kind in ArtifactKind::ALL {
        let cache = CompileCache::new(&config.cache_dir, kind, Arc::clone(&context));
        cache
            .clear()
            .with_context(|| format!("Failed to clear {}", cache.dir().display()))?;
        result_set.push(ResultItem::entry(normalize_path(cache.dir())).with_status("cleared"));
    }

    let scan_cache = config.load_path_cache_file();
    match std::fs::remove_file(&scan_cache) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => {
            return Err(err).with_context(|| format!("Failed to remove {}", scan_cache.display()))
        }
    }
    result_set.push(ResultItem::entry(normalize_path(&scan_cache)).with_status("cleared"));

    Renderer::with_config(render_config).print(&result_set);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_precompile_defaults() {
        let cli = Cli::try_parse_from(["prewarm", "precompile"]).unwrap();
        match cli.command {
            Commands::Precompile { paths, kinds, jobs, .. } => {
                assert_eq!(paths, vec![PathBuf::from(".")]);
                assert_eq!(kinds, ArtifactKind::ALL.to_vec());
                assert_eq!(jobs, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_kind_rejected() {
        assert!(Cli::try_parse_from(["prewarm", "precompile", "--kinds", "toml"]).is_err());
    }

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::try_parse_from([
            "prewarm",
            "--cache-dir",
            "/tmp/x",
            "--readonly",
            "--revalidate",
            "clear",
        ])
        .unwrap();
        let config = build_config(&cli);
        assert_eq!(config.cache_dir, PathBuf::from("/tmp/x"));
        assert!(config.readonly);
        assert!(config.revalidation);
    }
}
