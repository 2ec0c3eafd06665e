// lib.rs - CA to NASM translator
pub mod backend;
pub mod bios;
pub mod cli;
pub mod compiler;
pub mod emitter;
pub mod error;
pub mod functions;
pub mod imports;
pub mod labels;
pub mod logging;
pub mod parser;
pub mod symbols;

// Re-export main components
pub use backend::{Backend, Profile};
pub use compiler::{
    translate_file, translate_source, translate_with_libraries, CompilerConfig, Translation, TranslationStats,
    Translator,
};
pub use error::{ErrorKind, Location, TranslateError, TranslateResult, Warning};
pub use imports::{FsLibraries, LibrarySource, MemoryLibraries};
