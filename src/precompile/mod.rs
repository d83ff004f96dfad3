//! Precompile module - Batch warm-up of the compile caches
//!
//! Lists the cacheable files under a set of paths and pushes each through the
//! matching [`CompileCache`], either inline or across a [`WorkerPool`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use colored::Colorize;
use regex::Regex;
use walkdir::WalkDir;

use crate::cache::handler::{CommandHandler, JsonHandler, PassthroughHandler, YamlHandler};
use crate::cache::key::InvalidationContext;
use crate::cache::store::{ArtifactKind, CompileCache};
use crate::core::config::Config;
use crate::core::paths::{is_hidden, normalize_path};
use crate::error::CacheError;

pub mod worker_pool;

pub use worker_pool::{work_loop, Job, JobOutcome, PoolReport, WorkerPool};

/// Every cacheable file under `paths` whose kind is in `kinds`, sorted.
///
/// Explicit file arguments are taken as-is when their kind is wanted. Hidden
/// entries are skipped while walking; `exclude` is matched against the full
/// path of both directories (pruning them) and files.
pub fn list_files(paths: &[PathBuf], kinds: &[ArtifactKind], exclude: Option<&Regex>) -> Vec<Job> {
    let excluded = |path: &Path| exclude.is_some_and(|re| re.is_match(&normalize_path(path)));
    let wanted = |path: &Path| ArtifactKind::for_path(path).filter(|kind| kinds.contains(kind));

    let mut jobs = Vec::new();
    for root in paths {
        if root.is_file() {
            if let Some(kind) = wanted(root).filter(|_| !excluded(root)) {
                jobs.push(Job::new(kind, root.clone()));
            }
            continue;
        }

        let walker = WalkDir::new(root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                entry.depth() == 0 || (!is_hidden(entry.path()) && !excluded(entry.path()))
            });

        for entry in walker.filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(kind) = wanted(entry.path()) {
                jobs.push(Job::new(kind, entry.into_path()));
            }
        }
    }

    jobs.sort_by(|a, b| a.path.cmp(&b.path));
    jobs.dedup();
    jobs
}

/// Fetches files into their compile caches; what a worker runs per job
pub struct Precompiler {
    caches: HashMap<ArtifactKind, CompileCache>,
    compiler: Option<CommandHandler>,
}

impl Precompiler {
    /// `compiler` is the external command for source files; without one,
    /// sources are stored verbatim.
    pub fn new(config: &Config, context: Arc<InvalidationContext>, compiler: Option<String>) -> Self {
        let caches = ArtifactKind::ALL
            .into_iter()
            .map(|kind| (kind, CompileCache::from_config(config, kind, Arc::clone(&context))))
            .collect();
        Self {
            caches,
            compiler: compiler.filter(|c| !c.trim().is_empty()).map(CommandHandler::new),
        }
    }

    pub fn cache(&self, kind: ArtifactKind) -> Option<&CompileCache> {
        self.caches.get(&kind)
    }

    /// Warm the cache entry for one file; the compiled output is discarded
    pub fn compile(&self, job: &Job) -> Result<(), CacheError> {
        let Some(cache) = self.caches.get(&job.kind) else {
            return Ok(());
        };
        tracing::debug!(
            target: "prewarm::precompile",
            kind = %job.kind,
            path = %job.path.display(),
            "precompiling"
        );
        match job.kind {
            ArtifactKind::Source => match &self.compiler {
                Some(handler) => cache.fetch(&job.path, handler, None).map(drop),
                None => cache.fetch(&job.path, &PassthroughHandler, None).map(drop),
            },
            ArtifactKind::Yaml => cache.fetch(&job.path, &YamlHandler, None).map(drop),
            ArtifactKind::Json => cache.fetch(&job.path, &JsonHandler, None).map(drop),
        }
    }
}

/// One-line human summary of a pool run, for stderr
pub fn summary_line(report: &PoolReport) -> String {
    let total = report.outcomes.len();
    let failed = report.failures();
    let compiled = format!("{} compiled", total - failed);
    if failed == 0 && report.exit_status.is_none() {
        format!("{} {}", "ok".green().bold(), compiled)
    } else {
        let mut line = format!("{} {}, {}", "error".red().bold(), compiled, format!("{failed} failed").red());
        if let Some(status) = report.exit_status {
            line.push_str(&format!(" (worker exited with status {status})"));
        }
        line
    }
}
