use crate::backend::{Backend, Profile};
use crate::emitter::NasmEmitter;
use crate::error::{ErrorKind, Location, TranslateError, TranslateResult, Warning};
use crate::functions::FunctionTable;
use crate::imports::{Expanded, FsLibraries, ImportResolver, LibrarySource, SourceLine};
use crate::labels::{self, endelse_label, endif_label, Frame, LabelAllocator};
use crate::parser::{self, Condition, Directive, Line};
use crate::symbols::{register_width, Operand, SymbolTable, VarKind};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

// ========== CONFIGURATION ==========

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    pub profile: Profile,
    /// Directories searched for `import`ed libraries, in order.
    pub library_paths: Vec<PathBuf>,
    pub library_extension: String,
    /// Turn warnings into errors.
    pub strict: bool,
    pub input_buffer_size: usize,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            profile: Profile::Hosted,
            library_paths: vec![PathBuf::from("libs")],
            library_extension: "ca".to_string(),
            strict: false,
            input_buffer_size: 256,
        }
    }
}

impl CompilerConfig {
    pub fn with_profile(mut self, profile: Profile) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.library_paths.push(path.into());
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_input_buffer_size(mut self, size: usize) -> Self {
        self.input_buffer_size = size;
        self
    }

    pub fn from_json_file(path: &Path) -> TranslateResult<Self> {
        let text = fs::read_to_string(path).map_err(|e| TranslateError::io(path, e))?;
        serde_json::from_str(&text).map_err(|e| {
            TranslateError::new(ErrorKind::Config, format!("{}: {}", path.display(), e))
        })
    }

    pub fn validate(&self) -> TranslateResult<()> {
        if self.input_buffer_size < 2 {
            return Err(TranslateError::new(
                ErrorKind::Config,
                format!("input_buffer_size must be at least 2, got {}", self.input_buffer_size),
            ));
        }
        if self.library_extension.is_empty() {
            return Err(TranslateError::new(ErrorKind::Config, "library_extension must not be empty"));
        }
        Ok(())
    }

    /// Library search path for a source file: the configured paths, then
    /// relative ones again under the source file's directory.
    pub fn search_paths_for(&self, source: &Path) -> Vec<PathBuf> {
        let mut paths = self.library_paths.clone();
        if let Some(dir) = source.parent().filter(|d| !d.as_os_str().is_empty()) {
            for path in self.library_paths.iter().filter(|p| p.is_relative()) {
                let under_source = dir.join(path);
                if !paths.contains(&under_source) {
                    paths.push(under_source);
                }
            }
        }
        paths
    }
}

// ========== RESULTS ==========

#[derive(Debug, Clone)]
pub struct Translation {
    pub assembly: String,
    pub profile: Profile,
    pub warnings: Vec<Warning>,
    pub stats: TranslationStats,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslationStats {
    /// Lines consumed, imported libraries included.
    pub source_lines: usize,
    pub assembly_lines: usize,
    pub variables: usize,
    pub functions: usize,
    /// Label sequence numbers handed out (`if` plus `while`).
    pub labels: u32,
    pub imports: usize,
}

// ========== TRANSLATOR ==========

/// Start of an open `asm { }` block.
#[derive(Debug, Clone)]
struct OpenBlock {
    location: Location,
    text: String,
}

/// Single-pass translation engine. Owns all bookkeeping for one run; the
/// backend profile is fixed when it is built.
pub struct Translator {
    config: CompilerConfig,
    backend: Box<dyn Backend>,
    symbols: SymbolTable,
    labels: LabelAllocator,
    functions: FunctionTable,
    emitter: NasmEmitter,
    warnings: Vec<Warning>,
    block: Option<OpenBlock>,
}

impl Translator {
    pub fn new(config: CompilerConfig) -> TranslateResult<Self> {
        config.validate()?;
        let backend = config.profile.backend(config.input_buffer_size);
        Ok(Self {
            config,
            backend,
            symbols: SymbolTable::new(),
            labels: LabelAllocator::new(),
            functions: FunctionTable::new(),
            emitter: NasmEmitter::new(),
            warnings: Vec::new(),
            block: None,
        })
    }

    pub fn profile(&self) -> Profile {
        self.backend.profile()
    }

    pub fn translate(mut self, expanded: Expanded) -> TranslateResult<Translation> {
        debug!(backend = self.backend.name(), lines = expanded.lines.len(), "translating");

        for (name, location) in &expanded.missing {
            self.report(Warning::new(
                ErrorKind::ImportNotFound,
                format!("library `{}` not found", name),
                Some(location.clone()),
            ))?;
        }

        for line in &expanded.lines {
            self.step(line)
                .map_err(|e| e.at(line.location(), line.text.trim()))?;
        }

        self.check_closed()?;

        let assembly = self.emitter.finish(self.backend.as_ref(), &self.functions);
        let stats = TranslationStats {
            source_lines: expanded.lines.len(),
            assembly_lines: assembly.lines().count(),
            variables: self.symbols.len(),
            functions: self.functions.len(),
            labels: self.labels.allocated(),
            imports: expanded.imported.len(),
        };

        info!(
            profile = %self.profile(),
            source_lines = stats.source_lines,
            assembly_lines = stats.assembly_lines,
            warnings = self.warnings.len(),
            "translation finished"
        );

        Ok(Translation {
            assembly,
            profile: self.profile(),
            warnings: self.warnings,
            stats,
        })
    }

    fn step(&mut self, line: &SourceLine) -> TranslateResult<()> {
        let text = line.text.trim();

        if self.block.is_some() {
            if parser::is_block_close(text) {
                self.block = None;
            } else if !text.is_empty() {
                self.emit(vec![format!("    {}", text)]);
            }
            return Ok(());
        }

        let location = line.location();
        match parser::classify(text)? {
            Line::Empty => Ok(()),
            Line::Unrecognized(keyword) => self.report(Warning::new(
                ErrorKind::UnrecognizedDirective,
                format!("unrecognized directive `{}`, line ignored", keyword),
                Some(location),
            )),
            Line::Directive(directive) => {
                debug!(at = %location, directive = directive.keyword(), "dispatch");
                self.dispatch(directive, &location, text)
            }
        }
    }

    fn dispatch(&mut self, directive: Directive, at: &Location, text: &str) -> TranslateResult<()> {
        match directive {
            // Already inlined by the resolver.
            Directive::Import(_) => {}
            Directive::Namespace(name) => self.emit(vec![format!("    ; Namespace: {}", name)]),
            Directive::Var { names, literal } => self.declare(&names, &literal, at)?,
            Directive::Func(name) => {
                self.check_name(&name, "function")?;
                if self.symbols.kind_of(&name).is_some() {
                    return Err(TranslateError::malformed(format!(
                        "`{}` is already a variable and cannot name a function",
                        name
                    )));
                }
                let depth = self.labels.depth();
                self.functions.open(&name, at.clone(), depth)?;
            }
            Directive::Return(raw) => self.function_return(&raw, at)?,
            Directive::EndFunc => self.end_function()?,
            Directive::If(condition) => {
                let id = self.labels.enter_if(at.clone());
                let code = self.compare(&condition, &endif_label(id), at)?;
                self.emit(code);
            }
            Directive::Else => self.else_branch()?,
            Directive::EndIf => self.end_if()?,
            Directive::While(condition) => {
                let ctx = self.labels.enter_while(at.clone());
                let mut code = vec![format!("{}:", ctx.start_label)];
                code.extend(self.compare(&condition, &ctx.end_label, at)?);
                self.emit(code);
            }
            Directive::EndWhile => {
                self.check_scope("endwhile", "while")?;
                let ctx = self
                    .labels
                    .exit_while()
                    .ok_or_else(|| self.unmatched_closer("endwhile", "while"))?;
                self.emit(vec![format!("    jmp {}", ctx.start_label), format!("{}:", ctx.end_label)]);
            }
            Directive::Print(raw) => {
                let operand = self.operand(&raw, at)?;
                let code = self.backend.print(&operand);
                self.emit(code);
            }
            Directive::Scan(raw) => {
                let target = self.operand(&raw, at)?;
                if let Operand::Variable {
                    name,
                    kind: VarKind::Text,
                } = &target
                {
                    self.emitter.reserve_input(name, self.config.input_buffer_size);
                }
                let code = self.backend.scan(&target);
                self.emit(code);
            }
            Directive::Exit => {
                let code = self.backend.exit();
                self.emit(code);
            }
            Directive::AsmOpen => {
                self.block = Some(OpenBlock {
                    location: at.clone(),
                    text: text.to_string(),
                });
            }
            Directive::AsmClose => {
                return Err(TranslateError::unmatched("`}` without an open `asm {` block"));
            }
        }
        Ok(())
    }

    // ========== DIRECTIVE HANDLERS ==========

    fn declare(&mut self, names: &[String], literal: &str, at: &Location) -> TranslateResult<()> {
        for name in names {
            self.check_name(name, "variable")?;
            if self.functions.contains(name) {
                return Err(TranslateError::malformed(format!(
                    "`{}` is already a function and cannot name a variable",
                    name
                )));
            }
        }

        let initial = match VarKind::of_literal(literal) {
            VarKind::Text => None,
            VarKind::Numeric => Some(self.operand(literal, at)?),
        };

        for var in self.symbols.declare(names, literal) {
            self.emitter.place_variable(&var);
            if let Some(value) = &initial {
                let code = store_initial(&var.name, value);
                self.emit(code);
            }
        }
        Ok(())
    }

    fn function_return(&mut self, raw: &str, at: &Location) -> TranslateResult<()> {
        let function_depth = match self.functions.current() {
            Some(function) => function.control_depth,
            None => {
                return Err(TranslateError::unmatched("`return` outside a function")
                    .with_help("open a function with `func <name>` first"))
            }
        };

        let operand = self.operand(raw, at)?;
        let mut code = load_accumulator(&operand);
        code.push("    ret".to_string());

        // Inside an if/while the function stays open: an early return.
        if self.labels.depth() > function_depth {
            self.emit(code);
        } else {
            self.functions.close(code);
        }
        Ok(())
    }

    fn end_function(&mut self) -> TranslateResult<()> {
        let function_depth = match self.functions.current() {
            Some(function) => function.control_depth,
            None => {
                debug!("endfunc without an open function");
                return Ok(());
            }
        };

        if self.labels.depth() > function_depth {
            if let Some(frame) = self.labels.innermost() {
                return Err(TranslateError::unmatched(format!(
                    "`endfunc` while the `{}` opened at {} is still open",
                    frame.keyword(),
                    frame.opened_at()
                )));
            }
        }

        self.functions.close(vec!["    ret".to_string()]);
        Ok(())
    }

    fn else_branch(&mut self) -> TranslateResult<()> {
        self.check_scope("else", "if")?;
        let id = match self.labels.current_if_mut() {
            Some(ctx) if ctx.has_else => {
                return Err(TranslateError::unmatched(format!(
                    "second `else` for the `if` opened at {}",
                    ctx.opened_at
                )))
            }
            Some(ctx) => {
                ctx.has_else = true;
                ctx.id
            }
            None => return Err(self.unmatched_closer("else", "if")),
        };

        self.emit(vec![format!("    jmp {}", endelse_label(id)), format!("{}:", endif_label(id))]);
        Ok(())
    }

    fn end_if(&mut self) -> TranslateResult<()> {
        self.check_scope("endif", "if")?;
        let ctx = self
            .labels
            .exit_if()
            .ok_or_else(|| self.unmatched_closer("endif", "if"))?;

        let mut code = Vec::new();
        if !ctx.has_else {
            code.push(format!("{}:", endif_label(ctx.id)));
        }
        code.push(format!("{}:", endelse_label(ctx.id)));
        self.emit(code);
        Ok(())
    }

    /// `cmp` plus the jump to `target` taken when the condition is false.
    fn compare(&mut self, condition: &Condition, target: &str, at: &Location) -> TranslateResult<Vec<String>> {
        let lhs = self.operand(&condition.lhs, at)?;
        let rhs = self.operand(&condition.rhs, at)?;
        debug!(%condition, label = target, "compare");

        // cmp needs a register or memory on the left, operands of one width
        // and at most one memory operand.
        let lhs_direct = match &lhs {
            Operand::Register { .. } | Operand::Unknown(_) => true,
            Operand::Variable { kind: VarKind::Numeric, .. } => !is_memory(&rhs),
            Operand::Variable { kind: VarKind::Text, .. } | Operand::Immediate(_) => false,
        };
        let same_width = match (operand_width(&lhs), operand_width(&rhs)) {
            (Some(l), Some(r)) => l == r,
            _ => true,
        };

        let mut code = Vec::new();
        if lhs_direct && same_width {
            code.push(format!("    cmp {}, {}", lhs.as_source(), rhs.as_source()));
        } else {
            // Both sides as 32-bit values: a register rhs goes to a scratch
            // register first, then the lhs into eax.
            let rhs_source = match &rhs {
                Operand::Register { .. } => {
                    let (reg32, reg64) = if is_counter_register(&lhs) {
                        ("edx", "rdx")
                    } else {
                        ("ecx", "rcx")
                    };
                    code.extend(load_register(&rhs, reg32, reg64));
                    reg32.to_string()
                }
                other => other.as_source(),
            };
            code.extend(load_register(&lhs, "eax", "rax"));
            code.push(format!("    cmp eax, {}", rhs_source));
        }
        code.push(format!("    {} {}", condition.op.inverse_jump(), target));
        Ok(code)
    }

    // ========== HELPERS ==========

    /// Route lines to the open function, or the program body.
    fn emit(&mut self, lines: Vec<String>) {
        match self.functions.current_mut() {
            Some(function) => function.body.extend(lines),
            None => self.emitter.extend_text(lines),
        }
    }

    /// Program-level names may not shadow registers, generated labels or
    /// anything the profile defines.
    fn check_name(&self, name: &str, what: &str) -> TranslateResult<()> {
        let clash = if register_width(name).is_some() {
            "a register"
        } else if name == "_start" || labels::is_generated_label(name) {
            "a generated label"
        } else if self.backend.reserves(name) {
            "defined by the target"
        } else {
            return Ok(());
        };
        Err(TranslateError::malformed(format!(
            "`{}` cannot name a {}: it is {}",
            name, what, clash
        ))
        .with_help(format!("pick another name for the {}", what)))
    }

    fn operand(&mut self, raw: &str, at: &Location) -> TranslateResult<Operand> {
        let operand = Operand::resolve(raw, &self.symbols);
        if let Operand::Unknown(name) = &operand {
            self.report(Warning::new(
                ErrorKind::UnknownIdentifier,
                format!("`{}` is not a declared variable, a register or a literal", name),
                Some(at.clone()),
            ))?;
        }
        Ok(operand)
    }

    fn report(&mut self, warning: Warning) -> TranslateResult<()> {
        if self.config.strict {
            return Err(warning.into_error());
        }
        warn!("{}", warning);
        self.warnings.push(warning);
        Ok(())
    }

    /// A closer inside a function may only close constructs opened in it.
    fn check_scope(&self, closer: &str, opener: &str) -> TranslateResult<()> {
        if let Some(function) = self.functions.current() {
            if self.labels.depth() <= function.control_depth {
                return Err(TranslateError::unmatched(format!(
                    "`{}` without an open `{}` inside function `{}`",
                    closer, opener, function.name
                )));
            }
        }
        Ok(())
    }

    fn unmatched_closer(&self, closer: &str, opener: &str) -> TranslateError {
        match self.labels.innermost() {
            Some(frame) => TranslateError::unmatched(format!(
                "`{}` found while the `{}` opened at {} is still open",
                closer,
                frame.keyword(),
                frame.opened_at()
            ))
            .with_help(format!("close it with `{}` first", closer_for(frame))),
            None => TranslateError::unmatched(format!("`{}` without an open `{}`", closer, opener)),
        }
    }

    /// End-of-input checks: nothing may be left open.
    fn check_closed(&self) -> TranslateResult<()> {
        if let Some(block) = &self.block {
            return Err(
                TranslateError::new(ErrorKind::UnterminatedBlock, "`asm {` block is never closed")
                    .at(block.location.clone(), &block.text)
                    .with_help("close the block with `}`"),
            );
        }

        if let Some(frame) = self.labels.innermost() {
            let mut err = TranslateError::unmatched(format!("`{}` is never closed", frame.keyword()))
                .with_help(format!("add `{}`", closer_for(frame)));
            err.location = Some(frame.opened_at().clone());
            return Err(err);
        }

        if let Some(function) = self.functions.current() {
            let mut err = TranslateError::new(
                ErrorKind::DanglingFunction,
                format!("function `{}` is never closed", function.name),
            )
            .with_help("end it with `return <operand>` or `endfunc`");
            err.location = Some(function.opened_at.clone());
            return Err(err);
        }

        Ok(())
    }
}

fn closer_for(frame: &Frame) -> &'static str {
    match frame {
        Frame::If(_) => "endif",
        Frame::While(_) => "endwhile",
    }
}

fn is_memory(operand: &Operand) -> bool {
    matches!(
        operand,
        Operand::Variable {
            kind: VarKind::Numeric,
            ..
        }
    )
}

/// Width in bits of a register or a numeric or address-sized operand.
/// Immediates and unknown names fit whatever they are compared with.
fn operand_width(operand: &Operand) -> Option<u8> {
    match operand {
        Operand::Register { bits, .. } => Some(*bits),
        Operand::Variable { .. } => Some(32),
        Operand::Immediate(_) | Operand::Unknown(_) => None,
    }
}

fn is_counter_register(operand: &Operand) -> bool {
    matches!(operand, Operand::Register { name, .. } if matches!(name.as_str(), "cl" | "ch" | "cx" | "ecx" | "rcx"))
}

/// Move an operand into a 32-bit register, widening narrow registers.
/// Nothing to do when it already lives there.
fn load_register(operand: &Operand, reg32: &str, reg64: &str) -> Vec<String> {
    let line = match operand {
        Operand::Register { name, .. } if name == reg32 || name == reg64 => return Vec::new(),
        Operand::Register { name, bits: 64 } => format!("    mov {}, {}", reg64, name),
        Operand::Register { name, bits: 8 | 16 } => format!("    movsx {}, {}", reg32, name),
        other => format!("    mov {}, {}", reg32, other.as_source()),
    };
    vec![line]
}

/// Move an operand into the return-value register.
fn load_accumulator(operand: &Operand) -> Vec<String> {
    load_register(operand, "eax", "rax")
}

/// Initialise a numeric variable at its declaration point.
fn store_initial(name: &str, value: &Operand) -> Vec<String> {
    match value {
        Operand::Immediate(_) | Operand::Unknown(_) | Operand::Register { bits: 32, .. } => {
            vec![format!("    mov dword [{}], {}", name, value.raw())]
        }
        other => {
            let mut code = load_accumulator(other);
            code.push(format!("    mov dword [{}], eax", name));
            code
        }
    }
}

// ========== ENTRY POINTS ==========

/// Translate source text, resolving imports from the given library source.
pub fn translate_with_libraries(
    source: &str,
    origin: &str,
    config: &CompilerConfig,
    libraries: &dyn LibrarySource,
) -> TranslateResult<Translation> {
    let translator = Translator::new(config.clone())?;
    let expanded = ImportResolver::expand(source, origin, libraries)?;
    translator.translate(expanded)
}

/// Translate source text, resolving imports from the configured directories.
pub fn translate_source(source: &str, origin: &str, config: &CompilerConfig) -> TranslateResult<Translation> {
    let libraries = FsLibraries::new(
        config.search_paths_for(Path::new(origin)),
        config.library_extension.clone(),
    );
    translate_with_libraries(source, origin, config, &libraries)
}

pub fn translate_file(path: &Path, config: &CompilerConfig) -> TranslateResult<Translation> {
    let source = fs::read_to_string(path).map_err(|e| TranslateError::io(path, e))?;
    translate_source(&source, &path.display().to_string(), config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imports::MemoryLibraries;

    fn translate(source: &str) -> TranslateResult<Translation> {
        translate_with_libraries(source, "main.ca", &CompilerConfig::default(), &MemoryLibraries::new())
    }

    fn body(translation: &Translation) -> Vec<&str> {
        let text = &translation.assembly;
        let start = text.find("_start:\n").unwrap() + "_start:\n".len();
        text[start..].lines().collect()
    }

    #[test]
    fn default_config_values() {
        let config = CompilerConfig::default();
        assert_eq!(config.profile, Profile::Hosted);
        assert_eq!(config.library_paths, [PathBuf::from("libs")]);
        assert_eq!(config.library_extension, "ca");
        assert!(!config.strict);
        assert_eq!(config.input_buffer_size, 256);
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: CompilerConfig =
            serde_json::from_str(r#"{ "profile": "bare-metal", "strict": true }"#).unwrap();
        assert_eq!(config.profile, Profile::BareMetal);
        assert!(config.strict);
        assert_eq!(config.input_buffer_size, 256);
    }

    #[test]
    fn tiny_input_buffer_is_rejected() {
        let config = CompilerConfig::default().with_input_buffer_size(1);
        let err = Translator::new(config).err().unwrap();
        assert_eq!(err.kind, ErrorKind::Config);
    }

    #[test]
    fn search_paths_include_source_directory() {
        let config = CompilerConfig::default().with_library_path("/opt/ca");
        let paths = config.search_paths_for(Path::new("project/main.ca"));
        assert_eq!(
            paths,
            [
                PathBuf::from("libs"),
                PathBuf::from("/opt/ca"),
                PathBuf::from("project/libs")
            ]
        );
    }

    #[test]
    fn numeric_var_is_initialised_in_place() {
        let out = translate("var a b 7\nvar c a").unwrap();
        assert_eq!(
            body(&out),
            [
                "    mov dword [a], 7",
                "    mov dword [b], 7",
                "    mov eax, dword [a]",
                "    mov dword [c], eax"
            ]
        );
        assert_eq!(out.stats.variables, 3);
    }

    #[test]
    fn if_else_labels() {
        let out = translate("if eax 1\nprint 1\nelse\nprint 2\nendif").unwrap();
        let lines = body(&out);
        assert_eq!(&lines[..2], ["    cmp eax, 1", "    jne endif_1"]);
        let jmp = lines.iter().position(|l| *l == "    jmp endelse_1").unwrap();
        assert_eq!(lines[jmp + 1], "endif_1:");
        assert_eq!(*lines.last().unwrap(), "endelse_1:");
    }

    #[test]
    fn if_without_else_defines_both_labels() {
        let out = translate("if ebx != 0\nexit\nendif").unwrap();
        let lines = body(&out);
        assert_eq!(lines[1], "    je endif_1");
        assert_eq!(&lines[lines.len() - 2..], ["endif_1:", "endelse_1:"]);
    }

    #[test]
    fn condition_operands_are_legal_for_cmp() {
        let out = translate("var a 1\nvar b 2\nif a b\nendif\nif 3 < a\nendif").unwrap();
        let lines = body(&out);
        assert!(lines.contains(&"    mov eax, dword [a]"));
        assert!(lines.contains(&"    cmp eax, dword [b]"));
        assert!(lines.contains(&"    mov eax, 3"));
        assert!(lines.contains(&"    jge endif_2"));
    }

    #[test]
    fn functions_follow_program_body() {
        let out = translate("func double\nvar t 2\nreturn t\nprint 1").unwrap();
        let text = &out.assembly;
        let start = text.find("_start:").unwrap();
        let func = text.find("double:\n    mov dword [t], 2\n    mov eax, dword [t]\n    ret").unwrap();
        assert!(start < func);
        assert!(text[start..func].contains("call printf"));
        assert_eq!(out.stats.functions, 1);
    }

    #[test]
    fn return_inside_if_keeps_function_open() {
        let out = translate("func f\nif eax 0\nreturn 1\nendif\nreturn 2").unwrap();
        let text = &out.assembly;
        let f = &text[text.find("f:\n").unwrap()..];
        assert_eq!(f.matches("    ret").count(), 2);
        assert!(f.contains("endelse_1:\n    mov eax, 2\n    ret"));
    }

    #[test]
    fn endfunc_without_function_is_ignored() {
        assert!(translate("endfunc\nexit").is_ok());
    }

    #[test]
    fn asm_block_is_copied_verbatim() {
        let out = translate("asm {\n  mov eax, 1\n\n  int 0x80 ; if exit\n}\nexit").unwrap();
        let lines = body(&out);
        assert_eq!(&lines[..2], ["    mov eax, 1", "    int 0x80 ; if exit"]);
        assert_eq!(out.stats.labels, 0);
    }

    #[test]
    fn namespace_emits_marker() {
        let out = translate("namespace math").unwrap();
        assert_eq!(body(&out), ["    ; Namespace: math"]);
    }

    #[test]
    fn unknown_identifiers_warn_then_fail_in_strict_mode() {
        let out = translate("print ghost").unwrap();
        assert_eq!(out.warnings.len(), 1);
        assert_eq!(out.warnings[0].kind, ErrorKind::UnknownIdentifier);
        assert!(out.assembly.contains("    mov esi, ghost"));

        let strict = CompilerConfig::default().with_strict(true);
        let err = translate_with_libraries("\nprint ghost", "main.ca", &strict, &MemoryLibraries::new()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnknownIdentifier);
        assert_eq!(err.location, Some(Location::new("main.ca", 2)));
        assert_eq!(err.source_text.as_deref(), Some("print ghost"));
    }

    #[test]
    fn unrecognized_lines_are_reported() {
        let out = translate("jump somewhere\nexit").unwrap();
        assert_eq!(out.warnings[0].kind, ErrorKind::UnrecognizedDirective);
    }

    #[test]
    fn structural_errors() {
        let cases = [
            ("endif", ErrorKind::UnmatchedControlStructure),
            ("else", ErrorKind::UnmatchedControlStructure),
            ("endwhile", ErrorKind::UnmatchedControlStructure),
            ("if eax 0\nelse\nelse\nendif", ErrorKind::UnmatchedControlStructure),
            ("if eax 0\nwhile eax 0\nendif", ErrorKind::UnmatchedControlStructure),
            ("while eax 0", ErrorKind::UnmatchedControlStructure),
            ("return eax", ErrorKind::UnmatchedControlStructure),
            ("}", ErrorKind::UnmatchedControlStructure),
            ("if eax 0\nfunc f\nendif", ErrorKind::UnmatchedControlStructure),
            ("func f\nif eax 0\nendfunc", ErrorKind::UnmatchedControlStructure),
            ("asm {\nnop", ErrorKind::UnterminatedBlock),
            ("func f\nfunc g", ErrorKind::DanglingFunction),
            ("func f", ErrorKind::DanglingFunction),
            ("func f\nendfunc\nfunc f\nendfunc", ErrorKind::DuplicateFunction),
            ("print", ErrorKind::MalformedDirective),
            ("var x", ErrorKind::MalformedDirective),
        ];
        for (source, kind) in cases {
            let err = translate(source).unwrap_err();
            assert_eq!(err.kind, kind, "source: {:?}", source);
            assert!(err.location.is_some(), "source: {:?}", source);
        }
    }

    #[test]
    fn unterminated_block_points_at_opener() {
        let err = translate("exit\nasm {\nnop").unwrap_err();
        assert_eq!(err.location, Some(Location::new("main.ca", 2)));
        assert_eq!(err.source_text.as_deref(), Some("asm {"));
    }

    #[test]
    fn scan_stores_through_backend() {
        let config = CompilerConfig::default().with_profile(Profile::BareMetal);
        let out = translate_with_libraries("var n 0\nscan n", "main.ca", &config, &MemoryLibraries::new()).unwrap();
        assert!(out.assembly.contains("    call scan\n    mov si, input_buffer\n    call atoi\n    mov dword [n], eax\n"));
        assert_eq!(out.profile, Profile::BareMetal);
    }

    #[test]
    fn registers_are_widened_against_memory() {
        let out = translate("var n 5\nif rax n\nendif\nwhile al n\nendwhile").unwrap();
        assert_eq!(
            body(&out)[..11],
            [
                "    mov dword [n], 5",
                "    cmp eax, dword [n]",
                "    jne endif_1",
                "endif_1:",
                "endelse_1:",
                "while_start_1:",
                "    movsx eax, al",
                "    cmp eax, dword [n]",
                "    jne while_end_1",
                "    jmp while_start_1",
                "while_end_1:",
            ]
        );
    }

    #[test]
    fn mixed_register_widths_compare_as_32_bits() {
        let cases: [(&str, &[&str]); 4] = [
            ("if al bl", &["    cmp al, bl"]),
            ("if al ebx", &["    mov ecx, ebx", "    movsx eax, al", "    cmp eax, ecx"]),
            ("if cx bl", &["    movsx edx, bl", "    movsx eax, cx", "    cmp eax, edx"]),
            ("if 5 eax", &["    mov ecx, eax", "    mov eax, 5", "    cmp eax, ecx"]),
        ];
        for (condition, expected) in cases {
            let out = translate(&format!("{}\nendif", condition)).unwrap();
            let lines = body(&out);
            assert_eq!(lines[..expected.len()], *expected, "condition: {}", condition);
            assert_eq!(lines[expected.len()], "    jne endif_1");
        }
    }

    #[test]
    fn reserved_names_are_rejected() {
        let bare_metal = CompilerConfig::default().with_profile(Profile::BareMetal);
        let hosted = CompilerConfig::default();
        let cases = [
            (&bare_metal, "var scan 1"),
            (&bare_metal, "var eax 2"),
            (&bare_metal, "func hang\nendfunc"),
            (&bare_metal, "while eax 0\nendwhile\nfunc while_start_1\nendfunc"),
            (&bare_metal, "var cursor 0"),
            (&bare_metal, "var input_buffer \"x\""),
            (&hosted, "var _start 0"),
            (&hosted, "var R8D 0"),
            (&hosted, "var endif_7 0"),
            (&hosted, "var printf 1"),
            (&hosted, "var fmt_int 1"),
            (&hosted, "func exit\nendfunc"),
            (&hosted, "var f 1\nfunc f\nendfunc"),
            (&hosted, "func f\nendfunc\nvar f 1"),
        ];
        for (config, source) in cases {
            let err = translate_with_libraries(source, "main.ca", config, &MemoryLibraries::new()).unwrap_err();
            assert_eq!(err.kind, ErrorKind::MalformedDirective, "source: {:?}", source);
            assert!(err.location.is_some(), "source: {:?}", source);
        }

        // Only the names a profile defines are off limits.
        assert!(translate("var hang 1\nvar cursor 2\nfunc endif\nendfunc").is_ok());
    }

    #[test]
    fn scanned_text_variable_holds_the_input_buffer() {
        let out = translate("var name \"x\"\nvar after \"keep\"\nscan name").unwrap();
        assert!(out
            .assembly
            .contains("    name db \"x\", 0\n    times 254 db 0\n    after db \"keep\", 0\n"));
        assert!(out.assembly.contains("    mov edx, 255\n"));

        let config = CompilerConfig::default()
            .with_profile(Profile::BareMetal)
            .with_input_buffer_size(16);
        let out = translate_with_libraries("var name \"\"\nscan name", "main.ca", &config, &MemoryLibraries::new())
            .unwrap();
        assert!(out.assembly.contains("    name db \"\", 0\n    times 15 db 0\n"));
        assert!(out.assembly.contains("    mov cx, 15\n"));
    }
}
