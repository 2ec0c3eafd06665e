//! Import resolution.
//!
//! Libraries are inlined textually before translation starts. Every file's
//! lines are appended after everything already in the stream, breadth-first,
//! so a library's directives always run after the code that imported it.
//! Each library name is inlined at most once per run, which also makes
//! import cycles harmless.

use crate::error::{Location, TranslateError, TranslateResult};
use crate::parser::{self, Directive, Line};
use indexmap::IndexSet;
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;
use tracing::debug;

/// One line of the expanded program and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine {
    pub origin: Rc<str>,
    /// 1-based line number inside `origin`.
    pub number: usize,
    pub text: String,
}

impl SourceLine {
    pub fn location(&self) -> Location {
        Location::new(&*self.origin, self.number)
    }
}

/// Split a whole file into numbered lines.
pub fn source_lines(origin: &str, text: &str) -> Vec<SourceLine> {
    let origin: Rc<str> = Rc::from(origin);
    text.lines()
        .enumerate()
        .map(|(index, line)| SourceLine {
            origin: Rc::clone(&origin),
            number: index + 1,
            text: line.to_string(),
        })
        .collect()
}

/// A library located by a [`LibrarySource`].
#[derive(Debug, Clone)]
pub struct Library {
    /// Display name used in diagnostics.
    pub origin: String,
    pub text: String,
}

/// Where `import <name>` looks for library text.
pub trait LibrarySource {
    /// `Ok(None)` when no library of that name exists.
    fn load(&self, name: &str) -> TranslateResult<Option<Library>>;
}

// ========== FILESYSTEM ==========

/// Looks for `<dir>/<name>.<extension>` in each search path, in order.
#[derive(Debug, Clone)]
pub struct FsLibraries {
    search_paths: Vec<PathBuf>,
    extension: String,
}

impl FsLibraries {
    pub fn new(search_paths: Vec<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            search_paths,
            extension: extension.into(),
        }
    }
}

impl LibrarySource for FsLibraries {
    fn load(&self, name: &str) -> TranslateResult<Option<Library>> {
        let file_name = format!("{}.{}", name, self.extension);
        for dir in &self.search_paths {
            let candidate = dir.join(&file_name);
            if !candidate.is_file() {
                continue;
            }
            let text = fs::read_to_string(&candidate).map_err(|e| TranslateError::io(&candidate, e))?;
            return Ok(Some(Library {
                origin: candidate.display().to_string(),
                text,
            }));
        }
        Ok(None)
    }
}

// ========== IN MEMORY ==========

/// Fixed set of named libraries, mostly for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct MemoryLibraries {
    libraries: HashMap<String, String>,
}

impl MemoryLibraries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_library(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.insert(name, text);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, text: impl Into<String>) {
        self.libraries.insert(name.into(), text.into());
    }
}

impl LibrarySource for MemoryLibraries {
    fn load(&self, name: &str) -> TranslateResult<Option<Library>> {
        Ok(self.libraries.get(name).map(|text| Library {
            origin: format!("{}.ca", name),
            text: text.clone(),
        }))
    }
}

// ========== RESOLVER ==========

/// The fully expanded line stream.
#[derive(Debug, Clone, Default)]
pub struct Expanded {
    pub lines: Vec<SourceLine>,
    /// Libraries inlined, in inlining order.
    pub imported: Vec<String>,
    /// Imports that named no library, with the first place they appeared.
    pub missing: Vec<(String, Location)>,
}

pub struct ImportResolver;

impl ImportResolver {
    pub fn expand(source: &str, origin: &str, libraries: &dyn LibrarySource) -> TranslateResult<Expanded> {
        let mut expanded = Expanded::default();
        let mut seen: IndexSet<String> = IndexSet::new();
        let mut queue: VecDeque<(String, Location)> = VecDeque::new();

        Self::append(&mut expanded, source_lines(origin, source), &mut queue);

        while let Some((name, imported_at)) = queue.pop_front() {
            if !seen.insert(name.clone()) {
                continue;
            }
            match libraries.load(&name)? {
                Some(library) => {
                    debug!(library = %name, origin = %library.origin, "inlining import");
                    expanded.imported.push(name);
                    Self::append(&mut expanded, source_lines(&library.origin, &library.text), &mut queue);
                }
                None => expanded.missing.push((name, imported_at)),
            }
        }

        Ok(expanded)
    }

    /// Append a file's lines and queue the imports it names. Lines inside
    /// `asm { }` blocks are never scanned.
    fn append(expanded: &mut Expanded, lines: Vec<SourceLine>, queue: &mut VecDeque<(String, Location)>) {
        let mut in_block = false;
        for line in &lines {
            let trimmed = line.text.trim();
            if in_block {
                in_block = !parser::is_block_close(trimmed);
                continue;
            }
            if parser::is_block_open(trimmed) {
                in_block = true;
                continue;
            }
            if let Ok(Line::Directive(Directive::Import(name))) = parser::classify(trimmed) {
                queue.push_back((name, line.location()));
            }
        }
        expanded.lines.extend(lines);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(expanded: &Expanded) -> Vec<&str> {
        expanded.lines.iter().map(|l| l.text.as_str()).collect()
    }

    #[test]
    fn libraries_are_appended_after_main() {
        let libs = MemoryLibraries::new().with_library("io", "var nl \"\"\nprint nl");
        let expanded = ImportResolver::expand("import io\nexit", "main.ca", &libs).unwrap();

        assert_eq!(texts(&expanded), ["import io", "exit", "var nl \"\"", "print nl"]);
        assert_eq!(expanded.imported, ["io"]);
        let lib_line = &expanded.lines[3];
        assert_eq!(lib_line.location().to_string(), "io.ca:2");
    }

    #[test]
    fn repeated_and_cyclic_imports_are_inlined_once() {
        let libs = MemoryLibraries::new()
            .with_library("a", "import b\nprint 1")
            .with_library("b", "import a\nprint 2");
        let expanded = ImportResolver::expand("import a\nimport a\nimport b", "main.ca", &libs).unwrap();

        assert_eq!(expanded.imported, ["a", "b"]);
        assert_eq!(expanded.lines.len(), 3 + 2 + 2);
        assert!(expanded.missing.is_empty());
    }

    #[test]
    fn transitive_imports_are_breadth_first() {
        let libs = MemoryLibraries::new()
            .with_library("a", "import c\nprint 1")
            .with_library("b", "print 2")
            .with_library("c", "print 3");
        let expanded = ImportResolver::expand("import a\nimport b", "main.ca", &libs).unwrap();
        assert_eq!(expanded.imported, ["a", "b", "c"]);
    }

    #[test]
    fn missing_libraries_are_reported_once() {
        let expanded = ImportResolver::expand("import nope\nimport nope", "main.ca", &MemoryLibraries::new()).unwrap();
        assert_eq!(expanded.missing.len(), 1);
        assert_eq!(expanded.missing[0].0, "nope");
        assert_eq!(expanded.missing[0].1, Location::new("main.ca", 1));
    }

    #[test]
    fn asm_blocks_are_not_scanned() {
        let libs = MemoryLibraries::new().with_library("x", "print 1");
        let source = "asm {\nimport x\n}\n";
        let expanded = ImportResolver::expand(source, "main.ca", &libs).unwrap();
        assert!(expanded.imported.is_empty());
    }

    #[test]
    fn filesystem_lookup_walks_search_paths() {
        let root = std::env::temp_dir().join(format!("canasm-imports-{}", std::process::id()));
        let first = root.join("first");
        let second = root.join("second");
        fs::create_dir_all(&first).unwrap();
        fs::create_dir_all(&second).unwrap();
        fs::write(second.join("math.ca"), "var pi 3").unwrap();

        let libs = FsLibraries::new(vec![first, second.clone()], "ca");
        let found = libs.load("math").unwrap().unwrap();
        assert_eq!(found.text, "var pi 3");
        assert_eq!(found.origin, second.join("math.ca").display().to_string());
        assert!(libs.load("trig").unwrap().is_none());

        fs::remove_dir_all(&root).unwrap();
    }
}
