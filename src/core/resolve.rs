//! Purpose: Resolve `import` statements across ordered search roots and parse transitively.
//! Exports: `SourceLoader`, `FsLoader`, `Resolver`.
//! Role: Walks the import graph depth-first, memoized by resolved path.
//! Invariants: Roots are tried in the order given; the first existing match wins.
//! Invariants: Each resolved file is parsed exactly once (diamond imports are cheap).
//! Invariants: A file reached while still being resolved is a cyclic-import failure.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::core::ast::SourceUnit;
use crate::core::error::{Error, ErrorKind};
use crate::core::parser::parse_source;

/// File-reading seam. Production uses [`FsLoader`]; tests substitute
/// in-memory maps so resolution policy stays testable without a filesystem.
pub trait SourceLoader {
    /// `Ok(None)` means "no file at this path"; hard I/O failures are `Err`.
    fn load(&self, path: &Path) -> Result<Option<String>, Error>;
}

pub struct FsLoader;

impl SourceLoader for FsLoader {
    fn load(&self, path: &Path) -> Result<Option<String>, Error> {
        match std::fs::read_to_string(path) {
            Ok(source) => Ok(Some(source)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(Error::new(ErrorKind::Io)
                .with_message("failed to read schema file")
                .with_path(path)
                .with_source(err)),
        }
    }
}

pub struct Resolver<'a> {
    roots: Vec<PathBuf>,
    loader: &'a dyn SourceLoader,
    /// Memo of resolved paths; the value marks completion.
    done: HashMap<PathBuf, bool>,
    /// Depth-first stack of files currently being resolved.
    in_progress: Vec<PathBuf>,
    units: Vec<SourceUnit>,
}

impl<'a> Resolver<'a> {
    pub fn new(roots: Vec<PathBuf>, loader: &'a dyn SourceLoader) -> Self {
        Self {
            roots,
            loader,
            done: HashMap::new(),
            in_progress: Vec::new(),
            units: Vec::new(),
        }
    }

    /// Parse the root schema and every transitive import, returning the
    /// units in dependency-discovery order (root file first).
    pub fn resolve_root(mut self, root_file: &Path) -> Result<Vec<SourceUnit>, Error> {
        let (path, source) = self.locate_root(root_file)?;
        self.resolve_file(path, source)?;
        // Discovery order is depth-first with the root last; callers expect
        // the root first for reporting, so restore declaration order.
        self.units.reverse();
        Ok(self.units)
    }

    fn locate_root(&self, root_file: &Path) -> Result<(PathBuf, String), Error> {
        if let Some(source) = self.loader.load(root_file)? {
            return Ok((root_file.to_path_buf(), source));
        }
        for root in &self.roots {
            let candidate = root.join(root_file);
            if let Some(source) = self.loader.load(&candidate)? {
                return Ok((candidate, source));
            }
        }
        Err(Error::new(ErrorKind::Io)
            .with_message("schema file not found")
            .with_path(root_file))
    }

    fn resolve_file(&mut self, path: PathBuf, source: String) -> Result<(), Error> {
        if self.done.get(&path).copied().unwrap_or(false) {
            return Ok(());
        }
        debug!(file = %path.display(), "parsing schema file");
        let unit = parse_source(&path, &source)?;

        self.in_progress.push(path.clone());
        for import in &unit.imports {
            self.resolve_import(&path, &import.path)?;
        }
        self.in_progress.pop();

        self.done.insert(path, true);
        self.units.push(unit);
        Ok(())
    }

    fn resolve_import(&mut self, importer: &Path, import_path: &str) -> Result<(), Error> {
        let (resolved, source) = self.locate_import(importer, import_path)?;

        if self.in_progress.contains(&resolved) {
            let mut cycle: Vec<String> = self
                .in_progress
                .iter()
                .skip_while(|entry| **entry != resolved)
                .map(|entry| entry.display().to_string())
                .collect();
            cycle.push(resolved.display().to_string());
            return Err(Error::new(ErrorKind::CyclicImport)
                .with_message(format!("cyclic import: {}", cycle.join(" -> ")))
                .with_path(importer));
        }

        self.resolve_file(resolved, source)
            .map_err(|err| err.with_default_path(importer).with_hint_import(importer))
    }

    fn locate_import(
        &mut self,
        importer: &Path,
        import_path: &str,
    ) -> Result<(PathBuf, String), Error> {
        for root in &self.roots {
            let candidate = root.join(import_path);
            // Memoized files are re-resolved only to identify which path the
            // import refers to; the loader is not consulted again.
            if self.done.contains_key(&candidate) || self.in_progress.contains(&candidate) {
                return Ok((candidate, String::new()));
            }
            if let Some(source) = self.loader.load(&candidate)? {
                debug!(
                    import = import_path,
                    resolved = %candidate.display(),
                    "resolved import"
                );
                return Ok((candidate, source));
            }
        }
        let searched = self
            .roots
            .iter()
            .map(|root| root.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        Err(Error::new(ErrorKind::ImportNotFound)
            .with_message(format!(
                "import \"{import_path}\" not found (searched roots: [{searched}])"
            ))
            .with_path(importer))
    }
}

trait ImportContext {
    fn with_hint_import(self, importer: &Path) -> Self;
}

impl ImportContext for Error {
    fn with_hint_import(self, importer: &Path) -> Self {
        if self.hint().is_some() {
            return self;
        }
        self.with_hint(format!("Imported from {}.", importer.display()))
    }
}
