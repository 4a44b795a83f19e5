//! The document graph. Owns every parsed/analyzed document, resolves
//! imports (relative paths, lockfile packages, registered virtual files),
//! injects the prelude's exports into every user document, and re-analyzes
//! dependents in dependency order when a public signature changes.
//!
//! All operations are synchronous transformations of the in-memory map; a
//! host driving this from an async loop prefetches file contents through the
//! pluggable loader.

use crate::fingerprint::{body_hashes, changed_symbols, signature_hashes};
use crate::lockfile::{resolve_package, Lockfile, LOCKFILE_NAME};
use lumina_ast::nodes::{Declaration, Location, Program};
use lumina_ast::parser::parse_with_max_errors;
use lumina_sema::{codes, Diagnostic, SemanticAnalyzer, SemanticResult, Symbol};
use lumina_types::Type;
use rustc_hash::{FxHashMap, FxHashSet};
use std::marker::PhantomData;

/// Reads a source file for a non-virtual URI. Returning `None` means the
/// file does not exist as far as this project is concerned.
pub type FileLoader = Box<dyn Fn(&str) -> Option<String>>;

pub const PRELUDE_SPEC: &str = "std/prelude.lm";

#[derive(Debug, Clone)]
pub struct ProjectConfig {
    pub max_errors: usize,
    pub prelude_spec: String,
    pub lockfile_name: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            max_errors: 25,
            prelude_spec: PRELUDE_SPEC.to_string(),
            lockfile_name: LOCKFILE_NAME.to_string(),
        }
    }
}

/// Result of one document update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub signature_changed: bool,
    pub changed_symbols: Vec<String>,
}

/// One import site as written in source, with its resolution result.
#[derive(Debug, Clone)]
pub struct ResolvedImport {
    pub spec: String,
    pub uri: Option<String>,
    pub names: Vec<String>,
    pub glob: bool,
    pub location: Location,
}

/// Per-document state, created on first update and mutated in place on
/// subsequent ones. Documents are never dropped implicitly; only
/// [`ProjectManager::remove_document`] deletes one.
pub struct Document {
    pub uri: String,
    pub text: String,
    pub version: i32,
    pub imports: Vec<ResolvedImport>,
    pub ast: Option<Program>,
    pub diagnostics: Vec<Diagnostic>,
    pub semantic: Option<SemanticResult>,
    pub signatures: FxHashMap<String, u64>,
    pub function_body_hashes: FxHashMap<String, u64>,
    pub inferred_returns: FxHashMap<String, Type>,
}

/// Builder states: configuration first, then an explicit transition once
/// the prelude is attached.
pub struct ProjectInitState;
pub struct ProjectReadyState;

pub struct ProjectBuilder<State = ProjectInitState> {
    config: ProjectConfig,
    loader: Option<FileLoader>,
    prelude_source: Option<String>,
    _state: PhantomData<State>,
}

impl Default for ProjectBuilder<ProjectInitState> {
    fn default() -> Self {
        Self::new()
    }
}

impl ProjectBuilder<ProjectInitState> {
    #[must_use]
    pub fn new() -> Self {
        Self { config: ProjectConfig::default(), loader: None, prelude_source: None, _state: PhantomData }
    }

    #[must_use]
    pub fn with_max_errors(mut self, max_errors: usize) -> Self {
        self.config.max_errors = max_errors;
        self
    }

    #[must_use]
    pub fn with_loader(mut self, loader: FileLoader) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Attaches the prelude source; its exports become visible in every
    /// user document without an explicit import.
    #[must_use]
    pub fn with_prelude(self, source: impl Into<String>) -> ProjectBuilder<ProjectReadyState> {
        ProjectBuilder {
            config: self.config,
            loader: self.loader,
            prelude_source: Some(source.into()),
            _state: PhantomData,
        }
    }

    /// Builds a manager with no prelude.
    #[must_use]
    pub fn build(self) -> ProjectManager {
        ProjectManager::from_parts(self.config, self.loader, None)
    }
}

impl ProjectBuilder<ProjectReadyState> {
    #[must_use]
    pub fn build(self) -> ProjectManager {
        ProjectManager::from_parts(self.config, self.loader, self.prelude_source)
    }
}

pub struct ProjectManager {
    config: ProjectConfig,
    loader: Option<FileLoader>,
    virtual_files: FxHashMap<String, String>,
    documents: FxHashMap<String, Document>,
    /// importer uri -> resolved importee uris
    dependencies: FxHashMap<String, Vec<String>>,
    /// Documents whose update is in flight; a document counts as loaded the
    /// moment parsing starts, which is what breaks import cycles.
    loading: FxHashSet<String>,
    prelude_uri: Option<String>,
}

impl Default for ProjectManager {
    fn default() -> Self {
        ProjectBuilder::new().build()
    }
}

impl ProjectManager {
    fn from_parts(config: ProjectConfig, loader: Option<FileLoader>, prelude_source: Option<String>) -> Self {
        let mut manager = Self {
            config,
            loader,
            virtual_files: FxHashMap::default(),
            documents: FxHashMap::default(),
            dependencies: FxHashMap::default(),
            loading: FxHashSet::default(),
            prelude_uri: None,
        };
        if let Some(source) = prelude_source {
            let spec = manager.config.prelude_spec.clone();
            manager.register_virtual_file(&spec, &source);
            let uri = format!("virtual://{spec}");
            manager.add_or_update(&uri, &source, None);
            manager.prelude_uri = Some(normalize_uri(&uri));
        }
        manager
    }

    /// Registers an in-memory dependency addressable by its bare spec.
    pub fn register_virtual_file(&mut self, spec: &str, text: &str) {
        self.virtual_files.insert(spec.to_string(), text.to_string());
    }

    /// Parses and analyzes one document, loading unseen dependencies along
    /// the way, and re-analyzes dependents when a public signature changed.
    pub fn add_or_update(&mut self, uri: &str, text: &str, version: Option<i32>) -> UpdateOutcome {
        let uri = normalize_uri(uri);
        tracing::debug!(uri = %uri, "document update");
        let mut visited = FxHashSet::default();
        self.update_document(&uri, text.to_string(), version, true, &mut visited)
    }

    pub fn remove_document(&mut self, uri: &str) {
        let uri = normalize_uri(uri);
        self.documents.remove(&uri);
        self.dependencies.remove(&uri);
    }

    #[must_use]
    pub fn get_diagnostics(&self, uri: &str) -> &[Diagnostic] {
        self.documents.get(&normalize_uri(uri)).map_or(&[], |d| &d.diagnostics)
    }

    #[must_use]
    pub fn get_document_ast(&self, uri: &str) -> Option<&Program> {
        self.documents.get(&normalize_uri(uri)).and_then(|d| d.ast.as_ref())
    }

    #[must_use]
    pub fn get_document(&self, uri: &str) -> Option<&Document> {
        self.documents.get(&normalize_uri(uri))
    }

    /// The document's exported (public, non-builtin) symbols.
    #[must_use]
    pub fn get_symbols(&self, uri: &str) -> Vec<(String, Symbol)> {
        self.documents
            .get(&normalize_uri(uri))
            .and_then(|d| d.semantic.as_ref())
            .map(|s| s.symbols.exported_symbols())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn get_dependencies(&self, uri: &str) -> &[String] {
        self.dependencies.get(&normalize_uri(uri)).map_or(&[], Vec::as_slice)
    }

    fn update_document(
        &mut self,
        uri: &str,
        text: String,
        version: Option<i32>,
        reuse_bodies: bool,
        visited: &mut FxHashSet<String>,
    ) -> UpdateOutcome {
        visited.insert(uri.to_string());
        self.loading.insert(uri.to_string());

        let parsed = parse_with_max_errors(&text, self.config.max_errors);
        let mut diagnostics: Vec<Diagnostic> = parsed
            .diagnostics
            .iter()
            .map(|e| Diagnostic::error(codes::PARSE_ERROR, e.message.clone(), e.location).with_source("parse"))
            .collect();

        let imports = self.resolve_imports(uri, &parsed.program, &mut diagnostics, visited);
        let externals = self.collect_externals(uri, &imports, &mut diagnostics);

        let new_body_hashes = body_hashes(&parsed.program, &text);
        // Dependent invalidation re-checks every body: the signatures this
        // document imported are exactly what changed.
        let skip = if reuse_bodies { self.reusable_bodies(uri, &new_body_hashes) } else { FxHashMap::default() };
        let semantic = SemanticAnalyzer::new()
            .with_externals(externals)
            .with_skipped_bodies(skip)
            .run(&parsed.program);
        diagnostics.extend(semantic.diagnostics.iter().cloned());

        let new_signatures = signature_hashes(&parsed.program);
        let outcome = match self.documents.get(uri) {
            Some(previous) => {
                let changed = changed_symbols(&previous.signatures, &new_signatures);
                UpdateOutcome { signature_changed: !changed.is_empty(), changed_symbols: changed }
            }
            None => UpdateOutcome::default(),
        };

        let document = Document {
            uri: uri.to_string(),
            text,
            version: version.unwrap_or_else(|| {
                self.documents.get(uri).map_or(1, |d| d.version + 1)
            }),
            imports: imports.clone(),
            ast: Some(parsed.program),
            diagnostics,
            inferred_returns: semantic.inferred_fn_returns.clone(),
            semantic: Some(semantic),
            signatures: new_signatures,
            function_body_hashes: new_body_hashes,
        };
        self.dependencies
            .insert(uri.to_string(), imports.iter().filter_map(|i| i.uri.clone()).collect());
        self.documents.insert(uri.to_string(), document);
        self.loading.remove(uri);

        if outcome.signature_changed {
            tracing::debug!(uri = %uri, changed = ?outcome.changed_symbols, "signature changed; re-analyzing dependents");
            self.reanalyze_dependents(uri, visited);
        }
        outcome
    }

    /// Re-runs analysis for every document that imports `uri`, in dependency
    /// order, visiting each node at most once per edit so cycles terminate.
    fn reanalyze_dependents(&mut self, uri: &str, visited: &mut FxHashSet<String>) {
        let dependents: Vec<String> = self
            .dependencies
            .iter()
            .filter(|(importer, importees)| importees.contains(&uri.to_string()) && !visited.contains(*importer))
            .map(|(importer, _)| importer.clone())
            .collect();
        for dependent in dependents {
            if let Some(text) = self.documents.get(&dependent).map(|d| d.text.clone()) {
                self.update_document(&dependent, text, None, false, visited);
            }
        }
    }

    fn resolve_imports(
        &mut self,
        importer: &str,
        program: &Program,
        diagnostics: &mut Vec<Diagnostic>,
        visited: &mut FxHashSet<String>,
    ) -> Vec<ResolvedImport> {
        let mut resolved = Vec::new();
        for decl in &program.declarations {
            let Declaration::Import(import) = decl else { continue };
            let mut entry = ResolvedImport {
                spec: import.source.clone(),
                uri: None,
                names: import.names.clone(),
                glob: import.glob,
                location: import.location,
            };
            match self.resolve_spec(importer, &import.source) {
                Ok(dep_uri) => {
                    self.ensure_loaded(&dep_uri, diagnostics, import.location, visited);
                    entry.uri = Some(dep_uri);
                }
                Err(err) => {
                    diagnostics.push(Diagnostic::error(err.code(), err.to_string(), import.location).with_source("project"));
                }
            }
            resolved.push(entry);
        }
        resolved
    }

    /// Maps an import spec onto a document URI. Registered virtual files win
    /// over everything; relative specs resolve against the importer's
    /// directory; bare specs consult the lockfile.
    fn resolve_spec(&self, importer: &str, spec: &str) -> Result<String, crate::lockfile::ResolveError> {
        if self.virtual_files.contains_key(spec) {
            return Ok(format!("virtual://{spec}"));
        }
        if spec.starts_with("./") || spec.starts_with("../") {
            let dir = importer.rsplit_once('/').map_or("", |(dir, _)| dir);
            let joined = if dir.is_empty() { spec.to_string() } else { format!("{dir}/{spec}") };
            return Ok(with_source_extension(&normalize_uri(&joined)));
        }
        let lockfile = self.load_lockfile();
        let path = resolve_package(lockfile.as_ref(), spec)?;
        // A lockfile entry may point at a registered in-memory source.
        if self.virtual_files.contains_key(&path) {
            Ok(format!("virtual://{path}"))
        } else {
            Ok(normalize_uri(&path))
        }
    }

    fn load_lockfile(&self) -> Option<Lockfile> {
        let text = self
            .virtual_files
            .get(&self.config.lockfile_name)
            .cloned()
            .or_else(|| self.loader.as_ref().and_then(|load| load(&self.config.lockfile_name)))?;
        Lockfile::parse(&text).ok()
    }

    fn ensure_loaded(
        &mut self,
        dep_uri: &str,
        diagnostics: &mut Vec<Diagnostic>,
        location: Location,
        visited: &mut FxHashSet<String>,
    ) {
        if self.documents.contains_key(dep_uri) || self.loading.contains(dep_uri) {
            return;
        }
        match self.read_source(dep_uri) {
            Some(text) => {
                self.update_document(dep_uri, text, None, true, visited);
            }
            None => diagnostics.push(
                Diagnostic::error(codes::PKG_001, format!("cannot load imported module `{dep_uri}`"), location)
                    .with_source("project"),
            ),
        }
    }

    fn read_source(&self, uri: &str) -> Option<String> {
        if let Some(spec) = uri.strip_prefix("virtual://") {
            return self.virtual_files.get(spec).cloned();
        }
        self.loader.as_ref().and_then(|load| load(uri))
    }

    /// The externals injected into one document's analysis: the prelude's
    /// exports plus whatever each import names (or everything, for a glob).
    /// Importing a private or missing name diagnoses at the import site.
    fn collect_externals(
        &self,
        uri: &str,
        imports: &[ResolvedImport],
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Vec<(String, Symbol)> {
        let mut externals = Vec::new();
        if let Some(prelude_uri) = &self.prelude_uri {
            if prelude_uri != uri {
                if let Some(prelude) = self.documents.get(prelude_uri).and_then(|d| d.semantic.as_ref()) {
                    externals.extend(prelude.symbols.exported_symbols());
                }
            }
        }
        for import in imports {
            let Some(dep_uri) = &import.uri else { continue };
            let Some(semantic) = self.documents.get(dep_uri).and_then(|d| d.semantic.as_ref()) else {
                continue;
            };
            if import.glob {
                externals.extend(semantic.symbols.exported_symbols());
                continue;
            }
            for name in &import.names {
                match semantic.symbols.root_symbol(name) {
                    Some(symbol) if symbol.is_public() => externals.push((name.clone(), symbol)),
                    Some(_) => diagnostics.push(
                        Diagnostic::error(
                            codes::VIS_PRIVATE,
                            format!("`{name}` is private in `{}`", import.spec),
                            import.location,
                        )
                        .with_source("project"),
                    ),
                    None => diagnostics.push(
                        Diagnostic::error(
                            codes::UNKNOWN_IDENT,
                            format!("`{}` does not export `{name}`", import.spec),
                            import.location,
                        )
                        .with_source("project"),
                    ),
                }
            }
        }
        externals
    }

    /// Function bodies whose span hash matches the previous update, paired
    /// with the return type cached back then.
    fn reusable_bodies(&self, uri: &str, new_hashes: &FxHashMap<String, u64>) -> FxHashMap<String, Type> {
        let Some(previous) = self.documents.get(uri) else { return FxHashMap::default() };
        new_hashes
            .iter()
            .filter(|(name, hash)| previous.function_body_hashes.get(*name) == Some(hash))
            .filter_map(|(name, _)| {
                previous.inferred_returns.get(name).map(|ty| (name.clone(), ty.clone()))
            })
            .collect()
    }
}

/// Collapses `.`/`..` segments and separator noise so file paths and
/// `virtual://` URIs address one namespace consistently.
#[must_use]
pub fn normalize_uri(uri: &str) -> String {
    if let Some(rest) = uri.strip_prefix("virtual://") {
        return format!("virtual://{}", normalize_path(rest));
    }
    normalize_path(&uri.replace('\\', "/"))
}

fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.last().is_some_and(|s| *s != "..") {
                    segments.pop();
                } else {
                    segments.push("..");
                }
            }
            other => segments.push(other),
        }
    }
    let joined = segments.join("/");
    if path.starts_with('/') {
        format!("/{joined}")
    } else {
        joined
    }
}

fn with_source_extension(uri: &str) -> String {
    let file = uri.rsplit_once('/').map_or(uri, |(_, file)| file);
    if file.contains('.') {
        uri.to_string()
    } else {
        format!("{uri}.lm")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_dot_segments() {
        assert_eq!(normalize_uri("src/./a/../b.lm"), "src/b.lm");
        assert_eq!(normalize_uri("virtual://std/./prelude.lm"), "virtual://std/prelude.lm");
        assert_eq!(normalize_uri("/abs//path.lm"), "/abs/path.lm");
    }

    #[test]
    fn first_update_reports_no_signature_change() {
        let mut project = ProjectManager::default();
        let outcome = project.add_or_update("main.lm", "pub fn f() -> i32 { return 1; }", None);
        assert!(!outcome.signature_changed);
        assert!(outcome.changed_symbols.is_empty());
    }

    #[test]
    fn body_edit_keeps_signature_unchanged() {
        let mut project = ProjectManager::default();
        project.add_or_update("main.lm", "pub fn f() -> i32 { return 1; }", None);
        let outcome = project.add_or_update("main.lm", "pub fn f() -> i32 { return 2; }", None);
        assert!(!outcome.signature_changed);
    }

    #[test]
    fn parameter_edit_changes_signature_and_names_symbol() {
        let mut project = ProjectManager::default();
        project.add_or_update("main.lm", "pub fn f() -> i32 { return 1; }", None);
        let outcome = project.add_or_update("main.lm", "pub fn f(x: i32) -> i32 { return x; }", None);
        assert!(outcome.signature_changed);
        assert_eq!(outcome.changed_symbols, vec!["f".to_string()]);
    }

    #[test]
    fn missing_lockfile_produces_pkg_004_at_import_site() {
        let mut project = ProjectManager::default();
        project.add_or_update("main.lm", "import { x } from \"pkg\";\nfn main() -> i32 { return 1; }", None);
        let diagnostics = project.get_diagnostics("main.lm");
        let pkg = diagnostics.iter().find(|d| d.code == Some(codes::PKG_004)).expect("PKG-004 reported");
        assert!(pkg.message.contains("lumina.lock.json not found"), "{}", pkg.message);
        assert_eq!(diagnostics.iter().filter(|d| d.code.is_some_and(|c| c.starts_with("PKG"))).count(), 1);
    }

    #[test]
    fn virtual_file_import_resolves_and_loads() {
        let mut project = ProjectManager::default();
        project.register_virtual_file("dep.lm", "pub fn helper() -> i32 { return 7; }");
        project.add_or_update(
            "main.lm",
            "import { helper } from \"dep.lm\";\nfn main() -> i32 { return helper(); }",
            None,
        );
        assert!(project.get_diagnostics("main.lm").is_empty(), "{:?}", project.get_diagnostics("main.lm"));
        assert_eq!(project.get_dependencies("main.lm"), ["virtual://dep.lm"]);
    }

    #[test]
    fn importing_private_symbol_reports_vis_private() {
        let mut project = ProjectManager::default();
        project.register_virtual_file("dep.lm", "fn secret() -> i32 { return 7; }");
        project.add_or_update("main.lm", "import { secret } from \"dep.lm\";", None);
        assert!(project
            .get_diagnostics("main.lm")
            .iter()
            .any(|d| d.code == Some(codes::VIS_PRIVATE)));
    }

    #[test]
    fn prelude_exports_are_visible_without_import() {
        let mut project = ProjectBuilder::new()
            .with_prelude("pub fn clamp01(x: i32) -> i32 { if x < 0 { return 0; } if x > 1 { return 1; } return x; }")
            .build();
        project.add_or_update("main.lm", "fn main() -> i32 { return clamp01(5); }", None);
        assert!(project.get_diagnostics("main.lm").is_empty(), "{:?}", project.get_diagnostics("main.lm"));
    }

    #[test]
    fn dependents_reanalyze_on_signature_change() {
        let mut project = ProjectManager::default();
        project.register_virtual_file("dep.lm", "pub fn helper() -> i32 { return 7; }");
        project.add_or_update(
            "main.lm",
            "import { helper } from \"dep.lm\";\nfn main() -> i32 { return helper(); }",
            None,
        );
        assert!(project.get_diagnostics("main.lm").is_empty());
        // Change helper's arity: main's call site no longer type-checks.
        let outcome =
            project.add_or_update("virtual://dep.lm", "pub fn helper(x: i32) -> i32 { return x; }", None);
        assert!(outcome.signature_changed);
        assert!(!project.get_diagnostics("main.lm").is_empty());
    }

    #[test]
    fn import_cycle_terminates() {
        let mut project = ProjectManager::default();
        project.register_virtual_file("a.lm", "import { b } from \"b.lm\";\npub fn a() -> i32 { return 1; }");
        project.register_virtual_file("b.lm", "import { a } from \"a.lm\";\npub fn b() -> i32 { return 2; }");
        project.add_or_update("virtual://a.lm", "import { b } from \"b.lm\";\npub fn a() -> i32 { return 1; }", None);
        assert!(project.get_document("virtual://a.lm").is_some());
        assert!(project.get_document("virtual://b.lm").is_some());
    }

    #[test]
    fn lockfile_backed_import_resolves_through_virtual_files() {
        let mut project = ProjectManager::default();
        project.register_virtual_file(
            "lumina.lock.json",
            r#"{"lockfileVersion":1,"packages":{"mathx":{"version":"0.1.0","resolved":"registry","lumina":"mathx/index.lm"}}}"#,
        );
        project.register_virtual_file("mathx/index.lm", "pub fn twice(x: i32) -> i32 { return x * 2; }");
        project.add_or_update(
            "main.lm",
            "import { twice } from \"mathx\";\nfn main() -> i32 { return twice(4); }",
            None,
        );
        let diagnostics = project.get_diagnostics("main.lm");
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
    }

    #[test]
    fn documents_survive_until_removed() {
        let mut project = ProjectManager::default();
        project.add_or_update("main.lm", "fn main() -> i32 { return 1; }", None);
        assert!(project.get_document_ast("main.lm").is_some());
        project.remove_document("main.lm");
        assert!(project.get_document_ast("main.lm").is_none());
    }
}
