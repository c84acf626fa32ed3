// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Module resolution for `importar` statements.
//!
//! For each `importar syms de module`, the resolver locates the module's
//! source file, parses it, extracts its exported symbols, and splices the
//! requested nodes into the main statement list in place of the import.
//! Loaded modules are cached by canonical path, so two spellings of the
//! same file share one parse.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use solar_ast::stmt::{Stmt, StmtKind};
use solar_lexer::Lexer;
use solar_parser::Parser;
use solar_stdlib::BuiltinRegistry;

/// Source file extensions recognized for modules.
const SOURCE_EXTENSIONS: &[&str] = &["solar", "sl"];

/// A module that has been located and parsed.
#[derive(Debug)]
pub struct LoadedModule {
    pub name: String,
    /// Canonical path; `None` for synthetic standard-library modules.
    pub path: Option<PathBuf>,
    pub symbols: HashMap<String, ExportedSymbol>,
}

/// A function or variable exported from a module.
#[derive(Debug, Clone)]
pub struct ExportedSymbol {
    pub name: String,
    pub kind: SymbolKind,
    /// The statement to splice; `None` for compiler-provided built-ins.
    pub node: Option<Stmt>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Function,
    Variable,
    Builtin,
}

/// Locates, parses, and caches modules for one compilation invocation.
pub struct ModuleResolver<'a> {
    registry: &'a BuiltinRegistry,
    cache: HashMap<PathBuf, Rc<LoadedModule>>,
    search_paths: Vec<PathBuf>,
    /// The file whose imports are being resolved, for relative paths.
    source_file: Option<PathBuf>,
    /// Files currently being resolved; a repeat means an import cycle.
    resolving: HashSet<PathBuf>,
    /// NodeId counter continuing after the main program's ids.
    next_id: u32,
}

impl<'a> ModuleResolver<'a> {
    pub fn new(registry: &'a BuiltinRegistry) -> Self {
        Self {
            registry,
            cache: HashMap::new(),
            search_paths: vec![
                PathBuf::from("."),
                PathBuf::from("./stdlib"),
                PathBuf::from("./pacotes"),
            ],
            source_file: None,
            resolving: HashSet::new(),
            next_id: 0,
        }
    }

    /// Sets the main source file, used to resolve `./`-style imports.
    pub fn with_source_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.source_file = Some(path.into());
        self
    }

    pub fn add_search_path(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        if !self.search_paths.contains(&path) {
            self.search_paths.push(path);
        }
    }

    /// Number of distinct files loaded so far.
    pub fn cached_modules(&self) -> usize {
        self.cache.len()
    }

    /// Replaces every import statement with the requested exported nodes.
    ///
    /// `first_free_id` must be greater than every NodeId in `stmts` so that
    /// nodes parsed from module files get non-colliding ids.
    pub fn expand_program(
        &mut self,
        stmts: Vec<Stmt>,
        first_free_id: u32,
    ) -> Result<Vec<Stmt>, ResolveError> {
        self.next_id = self.next_id.max(first_free_id);
        let base = self.source_file.clone();
        self.expand(stmts, base.as_deref())
    }

    fn expand(&mut self, stmts: Vec<Stmt>, from_file: Option<&Path>) -> Result<Vec<Stmt>, ResolveError> {
        let mut out = Vec::with_capacity(stmts.len());
        for stmt in stmts {
            match stmt.kind {
                StmtKind::Import(ref import) => {
                    let module = self.resolve_module(&import.module, from_file)?;
                    for symbol in &import.symbols {
                        let exported = module.symbols.get(symbol).ok_or_else(|| {
                            ResolveError::SymbolNotExported {
                                symbol: symbol.clone(),
                                module: module.name.clone(),
                            }
                        })?;
                        // Built-in-backed symbols contribute no AST node
                        if let Some(node) = &exported.node {
                            out.push(node.clone());
                        }
                    }
                }
                _ => out.push(stmt),
            }
        }
        Ok(out)
    }

    /// Finds and loads a module by name or explicit path.
    pub fn resolve_module(
        &mut self,
        name: &str,
        from_file: Option<&Path>,
    ) -> Result<Rc<LoadedModule>, ResolveError> {
        let file = match self.find_module_file(name, from_file) {
            Ok(file) => file,
            // Well-known standard-library modules need no source file
            Err(err) => {
                if let Some(module) = self.synthetic_module(name) {
                    return Ok(module);
                }
                return Err(err);
            }
        };

        let canonical = file
            .canonicalize()
            .map_err(|source| ResolveError::Io { path: file.clone(), source })?;

        if let Some(module) = self.cache.get(&canonical) {
            return Ok(Rc::clone(module));
        }

        if !self.resolving.insert(canonical.clone()) {
            return Err(ResolveError::CircularImport { module: name.to_string() });
        }
        let loaded = self.load_module(name, &canonical);
        self.resolving.remove(&canonical);

        let module = Rc::new(loaded?);
        self.cache.insert(canonical, Rc::clone(&module));
        Ok(module)
    }

    fn load_module(&mut self, name: &str, path: &Path) -> Result<LoadedModule, ResolveError> {
        let source = std::fs::read_to_string(path)
            .map_err(|source| ResolveError::Io { path: path.to_path_buf(), source })?;

        let tokens = Lexer::new(&source, self.registry)
            .tokenize()
            .map_err(|err| ResolveError::InModule {
                module: name.to_string(),
                message: err.message,
            })?;

        let mut parser = Parser::with_first_id(tokens, self.next_id);
        let ast = parser.parse().map_err(|err| ResolveError::InModule {
            module: name.to_string(),
            message: err.message,
        })?;
        self.next_id = parser.next_unused_id();

        // Imports inside the module are expanded in turn, so transitive
        // dependencies become exports and cycles are observable.
        let ast = self.expand(ast, Some(path))?;

        let mut symbols = extract_exports(&ast);
        inject_well_known(name, &mut symbols);

        Ok(LoadedModule {
            name: name.to_string(),
            path: Some(path.to_path_buf()),
            symbols,
        })
    }

    /// A module provided entirely by the compiler, with no source file.
    fn synthetic_module(&self, name: &str) -> Option<Rc<LoadedModule>> {
        let mut symbols = HashMap::new();
        inject_well_known(name, &mut symbols);
        if symbols.is_empty() {
            return None;
        }
        Some(Rc::new(LoadedModule {
            name: name.to_string(),
            path: None,
            symbols,
        }))
    }

    fn find_module_file(
        &self,
        name: &str,
        from_file: Option<&Path>,
    ) -> Result<PathBuf, ResolveError> {
        let mut attempts = Vec::new();

        if is_explicit_path(name) {
            let mut base = PathBuf::from(name);
            if base.is_relative() {
                if let Some(dir) = from_file.and_then(Path::parent) {
                    base = dir.join(name);
                }
            }
            if let Some(found) = try_path_candidates(&base, &mut attempts) {
                return Ok(found);
            }
        } else {
            for root in &self.search_paths {
                if let Some(found) = try_path_candidates(&root.join(name), &mut attempts) {
                    return Ok(found);
                }
            }
        }

        Err(ResolveError::ModuleNotFound {
            module: name.to_string(),
            attempts,
        })
    }
}

/// Whether the import spelling is a path rather than a bare module name.
fn is_explicit_path(name: &str) -> bool {
    Path::new(name).is_absolute() || name.starts_with("./") || name.starts_with("..")
}

/// Tries the naming conventions for one base path: the literal path, the
/// path plus each extension, `<base>/<stem>.<ext>`, and `<base>/index.<ext>`.
fn try_path_candidates(base: &Path, attempts: &mut Vec<PathBuf>) -> Option<PathBuf> {
    let mut probe = |candidate: PathBuf| -> Option<PathBuf> {
        if candidate.is_file() {
            return Some(candidate);
        }
        attempts.push(candidate);
        None
    };

    if base.extension().is_some() {
        if let Some(found) = probe(base.to_path_buf()) {
            return Some(found);
        }
    }

    for ext in SOURCE_EXTENSIONS {
        if let Some(found) = probe(base.with_extension(ext)) {
            return Some(found);
        }
    }

    if let Some(stem) = base.file_name() {
        for ext in SOURCE_EXTENSIONS {
            let mut inner = base.join(stem);
            inner.set_extension(ext);
            if let Some(found) = probe(inner) {
                return Some(found);
            }
        }
    }

    for ext in SOURCE_EXTENSIONS {
        if let Some(found) = probe(base.join(format!("index.{}", ext))) {
            return Some(found);
        }
    }

    None
}

/// Every top-level function and global assignment is exported.
fn extract_exports(ast: &[Stmt]) -> HashMap<String, ExportedSymbol> {
    let mut symbols = HashMap::new();
    for stmt in ast {
        match &stmt.kind {
            StmtKind::Fn(decl) => {
                symbols.insert(
                    decl.name.clone(),
                    ExportedSymbol {
                        name: decl.name.clone(),
                        kind: SymbolKind::Function,
                        node: Some(stmt.clone()),
                    },
                );
            }
            StmtKind::Assign { name, .. } => {
                symbols.insert(
                    name.clone(),
                    ExportedSymbol {
                        name: name.clone(),
                        kind: SymbolKind::Variable,
                        node: Some(stmt.clone()),
                    },
                );
            }
            _ => {}
        }
    }
    symbols
}

/// Standard-library modules inject purely symbolic built-in entries.
fn inject_well_known(module: &str, symbols: &mut HashMap<String, ExportedSymbol>) {
    if module == "io" {
        symbols.insert(
            "imprime".to_string(),
            ExportedSymbol {
                name: "imprime".to_string(),
                kind: SymbolKind::Builtin,
                node: None,
            },
        );
    }
}

/// A module resolution error.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("module '{module}' not found (tried {})", format_attempts(attempts))]
    ModuleNotFound { module: String, attempts: Vec<PathBuf> },

    #[error("symbol '{symbol}' is not exported by module '{module}'")]
    SymbolNotExported { symbol: String, module: String },

    #[error("circular import of module '{module}'")]
    CircularImport { module: String },

    #[error("error in module '{module}': {message}")]
    InModule { module: String, message: String },

    #[error("cannot read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn format_attempts(attempts: &[PathBuf]) -> String {
    let paths: Vec<String> = attempts.iter().map(|p| p.display().to_string()).collect();
    paths.join(", ")
}
