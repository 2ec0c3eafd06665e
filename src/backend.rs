use crate::bios;
use crate::symbols::{Operand, VarKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ========== PROFILES ==========

/// Target runtime environment. Fixed for the lifetime of one translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Profile {
    /// Linux x86-64 linked against the C library.
    #[default]
    Hosted,
    /// 16-bit boot sector, BIOS keyboard and text-mode video memory.
    BareMetal,
    /// Linux x86-64, raw `read`/`exit` syscalls.
    RawSyscall,
}

impl Profile {
    pub const ALL: [Profile; 3] = [Profile::Hosted, Profile::BareMetal, Profile::RawSyscall];

    pub fn name(&self) -> &'static str {
        match self {
            Profile::Hosted => "hosted",
            Profile::BareMetal => "bare-metal",
            Profile::RawSyscall => "raw-syscall",
        }
    }

    /// Build the code-generation strategy for this profile.
    pub fn backend(self, input_buffer_size: usize) -> Box<dyn Backend> {
        match self {
            Profile::Hosted => Box::new(HostedBackend::new(input_buffer_size)),
            Profile::BareMetal => Box::new(BareMetalBackend::new(input_buffer_size)),
            Profile::RawSyscall => Box::new(RawSyscallBackend::new(input_buffer_size)),
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Profile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Profile::ALL
            .into_iter()
            .find(|p| p.name() == s)
            .ok_or_else(|| format!("unknown target '{}' (expected hosted, bare-metal or raw-syscall)", s))
    }
}

// ========== BACKEND TRAIT ==========

/// Instruction templates a profile supplies to the translation engine.
///
/// Every method returns fully indented assembly lines; the engine decides
/// where they land (program body or the open function).
pub trait Backend {
    /// Backend name for diagnostics
    fn name(&self) -> &str;

    fn profile(&self) -> Profile;

    /// Output format to hand to `nasm -f`.
    fn format(&self) -> &'static str;

    /// Lines before the first section.
    fn header(&self) -> Vec<String>;

    /// Entries every `.data` section starts with.
    fn fixed_data(&self) -> Vec<String> {
        Vec::new()
    }

    /// Entries every `.bss` section starts with.
    fn fixed_bss(&self) -> Vec<String>;

    /// Library routines the program links against.
    fn externs(&self) -> &'static [&'static str] {
        &[]
    }

    /// Labels the profile defines itself (fixed storage, runtime routines).
    fn defined_symbols(&self) -> Vec<&'static str>;

    /// Whether a program-level name would collide with the profile's own.
    fn reserves(&self, name: &str) -> bool {
        self.externs().contains(&name) || self.defined_symbols().contains(&name)
    }

    /// Whether `_start` is exported with `global`.
    fn exports_entry(&self) -> bool {
        true
    }

    /// Instructions right after `_start:`.
    fn entry_prologue(&self) -> Vec<String> {
        Vec::new()
    }

    fn print(&self, operand: &Operand) -> Vec<String>;

    fn scan(&self, target: &Operand) -> Vec<String>;

    fn exit(&self) -> Vec<String>;

    /// Subroutines appended after all function bodies.
    fn runtime(&self) -> Option<&'static str> {
        None
    }

    /// Lines closing the document, after the runtime bundle.
    fn trailer(&self) -> Vec<String> {
        Vec::new()
    }
}

// ========== SHARED TEMPLATES ==========

fn line(text: impl Into<String>) -> String {
    format!("    {}", text.into())
}

/// Load a numeric operand into a 32-bit register, widening narrow registers.
fn load_numeric(operand: &Operand, reg32: &str, reg64: &str) -> String {
    match operand {
        Operand::Register { name, bits: 64 } => line(format!("mov {}, {}", reg64, name)),
        Operand::Register { name, bits: 8 | 16 } => line(format!("movsx {}, {}", reg32, name)),
        other => line(format!("mov {}, {}", reg32, other.as_source())),
    }
}

/// Store the 32-bit result in `eax` into a numeric scan target.
fn store_numeric(target: &Operand) -> String {
    match target {
        Operand::Register { name, bits: 64 } => line(format!("movsxd {}, eax", name)),
        Operand::Register { name, bits: 32 } => line(format!("mov {}, eax", name)),
        Operand::Register { name, bits: 16 } => line(format!("mov {}, ax", name)),
        Operand::Register { name, .. } => line(format!("mov {}, al", name)),
        other => line(format!("mov dword [{}], eax", other.raw())),
    }
}

/// `printf` with the format string picked by operand kind.
fn printf_call(operand: &Operand) -> Vec<String> {
    let mut code = Vec::new();
    match operand.kind() {
        VarKind::Text => {
            code.push(line(format!("mov rsi, {}", operand.raw())));
            code.push(line("mov rdi, fmt_str"));
        }
        VarKind::Numeric => {
            code.push(load_numeric(operand, "esi", "rsi"));
            code.push(line("mov rdi, fmt_int"));
        }
    }
    code.push(line("xor eax, eax"));
    code.push(line("call printf"));
    code
}

/// Clamp a negative read result to zero and NUL-terminate the buffer.
fn terminate_input() -> Vec<String> {
    vec![
        line("xor ecx, ecx"),
        line("test rax, rax"),
        line("cmovs rax, rcx"),
        line("mov byte [input_buffer + rax], 0"),
    ]
}

/// Move the terminated input buffer into the scan target via libc.
fn convert_input(target: &Operand) -> Vec<String> {
    match target.kind() {
        VarKind::Numeric => vec![
            line("mov rdi, input_buffer"),
            line("call atoi"),
            store_numeric(target),
        ],
        VarKind::Text => vec![
            line(format!("mov rdi, {}", target.raw())),
            line("mov rsi, input_buffer"),
            line("call strcpy"),
        ],
    }
}

/// Storage labels behind `printf_data` and `input_buffer`.
const PRINTF_SYMBOLS: [&str; 3] = ["fmt_int", "fmt_str", "input_buffer"];

fn printf_data() -> Vec<String> {
    vec![
        line("fmt_int db \"%d\", 10, 0"),
        line("fmt_str db \"%s\", 10, 0"),
    ]
}

fn input_buffer(size: usize) -> String {
    line(format!("input_buffer resb {}", size))
}

/// Bytes a read may fill, leaving room for the terminator.
fn read_limit(size: usize) -> usize {
    size.saturating_sub(1)
}

// ========== HOSTED ==========

pub struct HostedBackend {
    input_buffer_size: usize,
}

impl HostedBackend {
    pub fn new(input_buffer_size: usize) -> Self {
        Self { input_buffer_size }
    }
}

impl Backend for HostedBackend {
    fn name(&self) -> &str {
        "Hosted x86-64 (libc)"
    }

    fn profile(&self) -> Profile {
        Profile::Hosted
    }

    fn format(&self) -> &'static str {
        "elf64"
    }

    fn header(&self) -> Vec<String> {
        vec!["bits 64".to_string()]
    }

    fn fixed_data(&self) -> Vec<String> {
        printf_data()
    }

    fn fixed_bss(&self) -> Vec<String> {
        vec![input_buffer(self.input_buffer_size)]
    }

    fn externs(&self) -> &'static [&'static str] {
        &["printf", "read", "atoi", "strcpy", "exit"]
    }

    fn defined_symbols(&self) -> Vec<&'static str> {
        PRINTF_SYMBOLS.to_vec()
    }

    fn print(&self, operand: &Operand) -> Vec<String> {
        printf_call(operand)
    }

    fn scan(&self, target: &Operand) -> Vec<String> {
        let mut code = vec![
            line("xor edi, edi"),
            line("mov rsi, input_buffer"),
            line(format!("mov edx, {}", read_limit(self.input_buffer_size))),
            line("call read"),
        ];
        code.extend(terminate_input());
        code.extend(convert_input(target));
        code
    }

    fn exit(&self) -> Vec<String> {
        vec![line("xor edi, edi"), line("call exit")]
    }
}

// ========== RAW SYSCALL ==========

pub struct RawSyscallBackend {
    input_buffer_size: usize,
}

impl RawSyscallBackend {
    pub fn new(input_buffer_size: usize) -> Self {
        Self { input_buffer_size }
    }
}

impl Backend for RawSyscallBackend {
    fn name(&self) -> &str {
        "Linux x86-64 (raw syscalls)"
    }

    fn profile(&self) -> Profile {
        Profile::RawSyscall
    }

    fn format(&self) -> &'static str {
        "elf64"
    }

    fn header(&self) -> Vec<String> {
        vec!["bits 64".to_string()]
    }

    fn fixed_data(&self) -> Vec<String> {
        printf_data()
    }

    fn fixed_bss(&self) -> Vec<String> {
        vec![input_buffer(self.input_buffer_size)]
    }

    fn externs(&self) -> &'static [&'static str] {
        &["printf", "atoi", "strcpy", "fflush"]
    }

    fn defined_symbols(&self) -> Vec<&'static str> {
        PRINTF_SYMBOLS.to_vec()
    }

    fn print(&self, operand: &Operand) -> Vec<String> {
        printf_call(operand)
    }

    fn scan(&self, target: &Operand) -> Vec<String> {
        // sys_read(0, input_buffer, limit)
        let mut code = vec![
            line("xor eax, eax"),
            line("xor edi, edi"),
            line("mov rsi, input_buffer"),
            line(format!("mov edx, {}", read_limit(self.input_buffer_size))),
            line("syscall"),
        ];
        code.extend(terminate_input());
        code.extend(convert_input(target));
        code
    }

    fn exit(&self) -> Vec<String> {
        // stdio buffers must be flushed before sys_exit
        vec![
            line("xor edi, edi"),
            line("call fflush"),
            line("mov eax, 60"),
            line("xor edi, edi"),
            line("syscall"),
        ]
    }
}

// ========== BARE METAL ==========

pub struct BareMetalBackend {
    input_buffer_size: usize,
}

impl BareMetalBackend {
    pub fn new(input_buffer_size: usize) -> Self {
        Self { input_buffer_size }
    }
}

impl Backend for BareMetalBackend {
    fn name(&self) -> &str {
        "BIOS 16-bit real mode"
    }

    fn profile(&self) -> Profile {
        Profile::BareMetal
    }

    fn format(&self) -> &'static str {
        "bin"
    }

    fn header(&self) -> Vec<String> {
        vec![
            "bits 16".to_string(),
            format!("org 0x{:04X}", bios::LOAD_ADDRESS),
        ]
    }

    fn fixed_bss(&self) -> Vec<String> {
        vec![line("cursor resw 1"), input_buffer(self.input_buffer_size)]
    }

    fn defined_symbols(&self) -> Vec<&'static str> {
        let mut names = vec!["cursor", "input_buffer"];
        names.extend(bios::SUBROUTINES);
        names
    }

    fn exports_entry(&self) -> bool {
        false
    }

    fn entry_prologue(&self) -> Vec<String> {
        vec![
            line("cli"),
            line("xor ax, ax"),
            line("mov ds, ax"),
            line("mov ss, ax"),
            line(format!("mov sp, 0x{:04X}", bios::LOAD_ADDRESS)),
            line("sti"),
            line(format!("mov ax, 0x{:04X}", bios::VIDEO_SEGMENT)),
            line("mov es, ax"),
            line("cld"),
            line("mov word [cursor], 0"),
        ]
    }

    fn print(&self, operand: &Operand) -> Vec<String> {
        match operand.kind() {
            VarKind::Text => vec![
                line(format!("mov si, {}", operand.raw())),
                line("call print_str"),
            ],
            VarKind::Numeric => vec![load_numeric(operand, "eax", "eax"), line("call print_int")],
        }
    }

    fn scan(&self, target: &Operand) -> Vec<String> {
        let mut code = vec![
            line("mov di, input_buffer"),
            line(format!("mov cx, {}", read_limit(self.input_buffer_size))),
            line("call scan"),
        ];
        match target.kind() {
            VarKind::Numeric => {
                code.push(line("mov si, input_buffer"));
                code.push(line("call atoi"));
                code.push(store_numeric(target));
            }
            VarKind::Text => {
                code.push(line("mov si, input_buffer"));
                code.push(line(format!("mov di, {}", target.raw())));
                code.push(line("call copy_str"));
            }
        }
        code
    }

    fn exit(&self) -> Vec<String> {
        vec![line("jmp hang")]
    }

    fn runtime(&self) -> Option<&'static str> {
        Some(bios::RUNTIME)
    }

    /// The signature gets its own section at sector offset 510; NASM pads
    /// the gap after `.text` and `.data` and fails if they overrun it.
    fn trailer(&self) -> Vec<String> {
        let at = u32::from(bios::LOAD_ADDRESS) + u32::from(bios::SIGNATURE_OFFSET);
        vec![
            format!("section .signature start=0x{:04X}", at),
            line(format!("dw 0x{:04X}", bios::SIGNATURE)),
        ]
    }
}
