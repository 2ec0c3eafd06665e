//! Section assembler: collects `.data`, `.bss` and `.text` lines during the
//! pass and serializes them in fixed order at the end.

use crate::backend::Backend;
use crate::functions::FunctionTable;
use crate::symbols::{VarKind, Variable};
use indexmap::IndexMap;

#[derive(Debug, Default)]
pub struct NasmEmitter {
    /// Text variables and their quoted literals.
    data: IndexMap<String, String>,
    bss: IndexMap<String, String>,
    text: Vec<String>,
    /// Text variables read by `scan`, with the bytes they must hold.
    input_targets: IndexMap<String, usize>,
}

impl NasmEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place (or re-place) the storage entry for a variable. Text goes to
    /// `.data`, numeric to `.bss`; a redeclaration keeps the slot of the
    /// section it lands in and leaves the other one.
    pub fn place_variable(&mut self, var: &Variable) {
        match var.kind() {
            VarKind::Text => {
                self.bss.shift_remove(&var.name);
                self.data.insert(var.name.clone(), var.literal.clone());
            }
            VarKind::Numeric => {
                self.data.shift_remove(&var.name);
                self.bss.insert(var.name.clone(), format!("    {} resd 1", var.name));
            }
        }
    }

    /// Make a text variable's storage large enough for `capacity` bytes of
    /// input, terminator included. Sticks across redeclarations.
    pub fn reserve_input(&mut self, name: &str, capacity: usize) {
        let entry = self.input_targets.entry(name.to_string()).or_insert(0);
        *entry = (*entry).max(capacity);
    }

    pub fn push_text(&mut self, line: impl Into<String>) {
        self.text.push(line.into());
    }

    pub fn extend_text(&mut self, lines: impl IntoIterator<Item = String>) {
        self.text.extend(lines);
    }

    /// `.data` lines for the user's text variables.
    pub fn data_entries(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for (name, literal) in &self.data {
            lines.push(format!("    {} db {}, 0", name, literal));
            // Quoted bytes plus the terminator.
            let used = literal.len().saturating_sub(2) + 1;
            if let Some(&capacity) = self.input_targets.get(name).filter(|&&c| c > used) {
                lines.push(format!("    times {} db 0", capacity - used));
            }
        }
        lines
    }

    pub fn bss_entries(&self) -> impl Iterator<Item = &str> {
        self.bss.values().map(String::as_str)
    }

    /// Serialize the whole document: header, data, bss, then text with the
    /// entry label, program body, function bodies and runtime bundle.
    pub fn finish(&self, backend: &dyn Backend, functions: &FunctionTable) -> String {
        let mut code = String::new();

        for line in backend.header() {
            code.push_str(&line);
            code.push('\n');
        }
        code.push('\n');

        // ========== DATA ==========
        code.push_str("section .data\n");
        for line in backend.fixed_data() {
            code.push_str(&line);
            code.push('\n');
        }
        for line in self.data_entries() {
            code.push_str(&line);
            code.push('\n');
        }
        code.push('\n');

        // ========== BSS ==========
        code.push_str("section .bss\n");
        for line in backend.fixed_bss() {
            code.push_str(&line);
            code.push('\n');
        }
        if !self.bss.is_empty() {
            code.push_str("    alignb 4\n");
        }
        for line in self.bss.values() {
            code.push_str(line);
            code.push('\n');
        }
        code.push('\n');

        // ========== TEXT ==========
        code.push_str("section .text\n");
        for name in backend.externs() {
            code.push_str(&format!("    extern {}\n", name));
        }
        if backend.exports_entry() {
            code.push_str("    global _start\n");
        }
        code.push('\n');

        code.push_str("_start:\n");
        for line in backend.entry_prologue().iter().chain(self.text.iter()) {
            code.push_str(line);
            code.push('\n');
        }

        for function in functions.iter() {
            code.push('\n');
            code.push_str(&format!("{}:\n", function.name));
            for line in &function.body {
                code.push_str(line);
                code.push('\n');
            }
        }

        if let Some(runtime) = backend.runtime() {
            code.push('\n');
            code.push_str(runtime);
            if !runtime.ends_with('\n') {
                code.push('\n');
            }
        }

        let trailer = backend.trailer();
        if !trailer.is_empty() {
            code.push('\n');
            for line in trailer {
                code.push_str(&line);
                code.push('\n');
            }
        }

        code
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BareMetalBackend, HostedBackend};
    use crate::error::Location;

    fn var(name: &str, literal: &str) -> Variable {
        Variable {
            name: name.into(),
            literal: literal.into(),
        }
    }

    #[test]
    fn variables_land_in_section_by_kind() {
        let mut emitter = NasmEmitter::new();
        emitter.place_variable(&var("greeting", "\"hi\""));
        emitter.place_variable(&var("count", "5"));

        assert_eq!(emitter.data_entries(), ["    greeting db \"hi\", 0"]);
        assert_eq!(emitter.bss_entries().collect::<Vec<_>>(), ["    count resd 1"]);
    }

    #[test]
    fn redeclaration_moves_between_sections() {
        let mut emitter = NasmEmitter::new();
        emitter.place_variable(&var("x", "1"));
        emitter.place_variable(&var("x", "\"one\""));

        assert_eq!(emitter.bss_entries().count(), 0);
        assert_eq!(emitter.data_entries(), ["    x db \"one\", 0"]);
    }

    #[test]
    fn sections_serialize_in_fixed_order() {
        let mut emitter = NasmEmitter::new();
        emitter.place_variable(&var("n", "3"));
        emitter.push_text("    mov dword [n], 3");

        let mut functions = FunctionTable::new();
        functions.open("helper", Location::new("main.ca", 4), 0).unwrap();
        functions.close(vec!["    ret".into()]);

        let out = emitter.finish(&HostedBackend::new(256), &functions);
        let data = out.find("section .data").unwrap();
        let bss = out.find("section .bss").unwrap();
        let text = out.find("section .text").unwrap();
        let start = out.find("_start:\n    mov dword [n], 3").unwrap();
        let helper = out.find("helper:\n    ret").unwrap();
        assert!(data < bss && bss < text && text < start && start < helper);
        assert!(out.contains("    global _start\n"));
        assert!(out.contains("    extern printf\n"));
        assert!(out.contains("    alignb 4\n    n resd 1\n"));
        assert!(out.ends_with('\n'));
    }

    #[test]
    fn bare_metal_appends_runtime_after_functions() {
        let emitter = NasmEmitter::new();
        let out = emitter.finish(&BareMetalBackend::new(64), &FunctionTable::new());
        assert!(out.starts_with("bits 16\norg 0x7C00\n"));
        assert!(!out.contains("global _start"));
        assert!(out.contains("    cursor resw 1\n"));
        assert!(out.find("_start:").unwrap() < out.find("print_str:").unwrap());
        assert!(out.contains("    jmp hang\n\nsection .signature start=0x7DFE\n"));
        assert!(out.ends_with("    dw 0xAA55\n"));
    }

    #[test]
    fn scanned_text_variables_hold_a_full_line() {
        let mut emitter = NasmEmitter::new();
        emitter.place_variable(&var("name", "\"x\""));
        emitter.place_variable(&var("after", "\"keep\""));
        emitter.reserve_input("name", 256);

        assert_eq!(
            emitter.data_entries(),
            ["    name db \"x\", 0", "    times 254 db 0", "    after db \"keep\", 0"]
        );

        // Redeclaring keeps the reservation; a literal that already fits needs none.
        emitter.place_variable(&var("name", "\"abc\""));
        emitter.reserve_input("after", 4);
        assert_eq!(
            emitter.data_entries(),
            ["    name db \"abc\", 0", "    times 252 db 0", "    after db \"keep\", 0"]
        );
    }
}
