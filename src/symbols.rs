//! Symbol table and operand resolution.

use indexmap::IndexMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    Text,
    Numeric,
}

impl VarKind {
    /// A literal wrapped in double quotes is text, anything else is numeric.
    pub fn of_literal(literal: &str) -> Self {
        if literal.len() >= 2 && literal.starts_with('"') && literal.ends_with('"') {
            VarKind::Text
        } else {
            VarKind::Numeric
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub name: String,
    pub literal: String,
}

impl Variable {
    pub fn kind(&self) -> VarKind {
        VarKind::of_literal(&self.literal)
    }
}

/// Declared variables, in first-declaration order. Redeclaring a name
/// replaces its literal in place.
#[derive(Debug, Default)]
pub struct SymbolTable {
    vars: IndexMap<String, Variable>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record every name with the same literal; returns the new entries.
    pub fn declare(&mut self, names: &[String], literal: &str) -> Vec<Variable> {
        names
            .iter()
            .map(|name| {
                let var = Variable {
                    name: name.clone(),
                    literal: literal.to_string(),
                };
                self.vars.insert(name.clone(), var.clone());
                var
            })
            .collect()
    }

    pub fn kind_of(&self, name: &str) -> Option<VarKind> {
        self.vars.get(name).map(Variable::kind)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Variable> {
        self.vars.values()
    }
}

// ========== OPERANDS ==========

/// What a raw operand in a `print`/`scan`/`return`/condition refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Variable { name: String, kind: VarKind },
    /// x86 general-purpose register and its width in bits.
    Register { name: String, bits: u8 },
    Immediate(String),
    /// Not declared, not a register, not a literal. Passed through verbatim.
    Unknown(String),
}

impl Operand {
    pub fn resolve(raw: &str, symbols: &SymbolTable) -> Self {
        if let Some(kind) = symbols.kind_of(raw) {
            return Operand::Variable {
                name: raw.to_string(),
                kind,
            };
        }
        if let Some(bits) = register_width(raw) {
            return Operand::Register {
                name: raw.to_ascii_lowercase(),
                bits,
            };
        }
        if is_numeric_literal(raw) {
            return Operand::Immediate(raw.to_string());
        }
        Operand::Unknown(raw.to_string())
    }

    /// Only declared text variables are text; the fallback for everything
    /// else is numeric.
    pub fn kind(&self) -> VarKind {
        match self {
            Operand::Variable { kind, .. } => *kind,
            _ => VarKind::Numeric,
        }
    }

    pub fn raw(&self) -> &str {
        match self {
            Operand::Variable { name, .. } => name,
            Operand::Register { name, .. } => name,
            Operand::Immediate(value) => value,
            Operand::Unknown(raw) => raw,
        }
    }

    /// Operand spelling inside an instruction: numeric variables are
    /// memory references, text variables are their address.
    pub fn as_source(&self) -> String {
        match self {
            Operand::Variable {
                name,
                kind: VarKind::Numeric,
            } => format!("dword [{}]", name),
            other => other.raw().to_string(),
        }
    }
}

/// Width of an x86 general-purpose register, if `name` is one.
pub fn register_width(name: &str) -> Option<u8> {
    let lower = name.to_ascii_lowercase();
    let bits = match lower.as_str() {
        "al" | "bl" | "cl" | "dl" | "ah" | "bh" | "ch" | "dh" | "sil" | "dil" | "spl" | "bpl" => 8,
        "ax" | "bx" | "cx" | "dx" | "si" | "di" | "sp" | "bp" => 16,
        "eax" | "ebx" | "ecx" | "edx" | "esi" | "edi" | "esp" | "ebp" => 32,
        "rax" | "rbx" | "rcx" | "rdx" | "rsi" | "rdi" | "rsp" | "rbp" => 64,
        _ => return extended_register_width(&lower),
    };
    Some(bits)
}

/// r8..r15 with their b/w/d suffixes.
fn extended_register_width(name: &str) -> Option<u8> {
    let rest = name.strip_prefix('r')?;
    let digits_end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
    let number: u8 = rest[..digits_end].parse().ok()?;
    if !(8..=15).contains(&number) {
        return None;
    }
    match &rest[digits_end..] {
        "" => Some(64),
        "d" => Some(32),
        "w" => Some(16),
        "b" => Some(8),
        _ => None,
    }
}

/// Decimal (optionally negative), `0x` hex, `0b` binary or a quoted
/// character such as `'a'`.
pub fn is_numeric_literal(raw: &str) -> bool {
    let body = raw.strip_prefix('-').unwrap_or(raw);
    if body.is_empty() {
        return false;
    }
    if let Some(hex) = body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
        return !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit() || c == '_');
    }
    if let Some(bin) = body.strip_prefix("0b").or_else(|| body.strip_prefix("0B")) {
        return !bin.is_empty() && bin.chars().all(|c| c == '0' || c == '1' || c == '_');
    }
    if body.len() >= 3 && body.starts_with('\'') && body.ends_with('\'') {
        return true;
    }
    body.chars().all(|c| c.is_ascii_digit() || c == '_') && body.starts_with(|c: char| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_follows_literal_surface() {
        assert_eq!(VarKind::of_literal("\"hi\""), VarKind::Text);
        assert_eq!(VarKind::of_literal("42"), VarKind::Numeric);
        assert_eq!(VarKind::of_literal("\""), VarKind::Numeric);
        assert_eq!(VarKind::of_literal("eax"), VarKind::Numeric);
    }

    #[test]
    fn redeclaration_replaces_in_place() {
        let mut table = SymbolTable::new();
        table.declare(&["a".into(), "b".into()], "1");
        table.declare(&["a".into()], "\"text\"");

        assert_eq!(table.len(), 2);
        assert_eq!(table.kind_of("a"), Some(VarKind::Text));
        assert_eq!(table.kind_of("b"), Some(VarKind::Numeric));
        let order: Vec<_> = table.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(order, ["a", "b"]);
    }

    #[test]
    fn operand_resolution() {
        let mut table = SymbolTable::new();
        table.declare(&["greeting".into()], "\"hi\"");
        table.declare(&["count".into()], "3");

        assert_eq!(Operand::resolve("greeting", &table).kind(), VarKind::Text);
        assert_eq!(Operand::resolve("count", &table).as_source(), "dword [count]");
        assert_eq!(
            Operand::resolve("EAX", &table),
            Operand::Register {
                name: "eax".into(),
                bits: 32
            }
        );
        assert_eq!(Operand::resolve("-12", &table), Operand::Immediate("-12".into()));
        assert_eq!(Operand::resolve("mystery", &table), Operand::Unknown("mystery".into()));
        assert_eq!(Operand::resolve("mystery", &table).kind(), VarKind::Numeric);
    }

    #[test]
    fn register_widths() {
        assert_eq!(register_width("al"), Some(8));
        assert_eq!(register_width("si"), Some(16));
        assert_eq!(register_width("r10d"), Some(32));
        assert_eq!(register_width("r15"), Some(64));
        assert_eq!(register_width("r16"), None);
        assert_eq!(register_width("rip"), None);
    }

    #[test]
    fn numeric_literals() {
        assert!(is_numeric_literal("0"));
        assert!(is_numeric_literal("0x1F"));
        assert!(is_numeric_literal("0b101"));
        assert!(is_numeric_literal("'a'"));
        assert!(!is_numeric_literal("-"));
        assert!(!is_numeric_literal("x1"));
        assert!(!is_numeric_literal("0x"));
    }
}
