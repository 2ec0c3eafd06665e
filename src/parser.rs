//! Directive classifier for the line-oriented CA source notation.
//!
//! Each trimmed line maps to at most one [`Directive`]. There is no token
//! stream beyond the line split: the first whitespace-delimited word is the
//! keyword, the rest are operands separated by whitespace or commas.
//! Quoted characters (`','`) are kept whole.

use crate::error::{TranslateError, TranslateResult};
use std::fmt;

// ========== COMPARISONS ==========

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "==" => Some(CompareOp::Eq),
            "!=" => Some(CompareOp::Ne),
            "<" => Some(CompareOp::Lt),
            "<=" => Some(CompareOp::Le),
            ">" => Some(CompareOp::Gt),
            ">=" => Some(CompareOp::Ge),
            _ => None,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }

    /// Jump taken when the comparison is false (skips the guarded block).
    pub fn inverse_jump(&self) -> &'static str {
        match self {
            CompareOp::Eq => "jne",
            CompareOp::Ne => "je",
            CompareOp::Lt => "jge",
            CompareOp::Le => "jg",
            CompareOp::Gt => "jle",
            CompareOp::Ge => "jl",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub lhs: String,
    pub op: CompareOp,
    pub rhs: String,
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.lhs, self.op.symbol(), self.rhs)
    }
}

// ========== DIRECTIVES ==========

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    Import(String),
    Namespace(String),
    Var { names: Vec<String>, literal: String },
    Func(String),
    Return(String),
    EndFunc,
    If(Condition),
    Else,
    EndIf,
    While(Condition),
    EndWhile,
    Print(String),
    Scan(String),
    Exit,
    AsmOpen,
    AsmClose,
}

impl Directive {
    pub fn keyword(&self) -> &'static str {
        match self {
            Directive::Import(_) => "import",
            Directive::Namespace(_) => "namespace",
            Directive::Var { .. } => "var",
            Directive::Func(_) => "func",
            Directive::Return(_) => "return",
            Directive::EndFunc => "endfunc",
            Directive::If(_) => "if",
            Directive::Else => "else",
            Directive::EndIf => "endif",
            Directive::While(_) => "while",
            Directive::EndWhile => "endwhile",
            Directive::Print(_) => "print",
            Directive::Scan(_) => "scan",
            Directive::Exit => "exit",
            Directive::AsmOpen => "asm",
            Directive::AsmClose => "}",
        }
    }
}

/// Result of classifying one source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    /// Blank line or comment.
    Empty,
    Directive(Directive),
    /// Keyword that is not part of the directive set.
    Unrecognized(String),
}

// ========== CLASSIFIER ==========

/// `asm {` opens a passthrough block. Checked before anything else because
/// the block body must never be classified.
pub fn is_block_open(line: &str) -> bool {
    match line.strip_prefix("asm") {
        Some(rest) => rest.trim_start().starts_with('{'),
        None => false,
    }
}

pub fn is_block_close(line: &str) -> bool {
    line.starts_with('}')
}

pub fn is_comment(line: &str) -> bool {
    line.starts_with('#') || line.starts_with(';')
}

pub fn classify(raw: &str) -> TranslateResult<Line> {
    let line = raw.trim();

    if line.is_empty() || is_comment(line) {
        return Ok(Line::Empty);
    }

    if is_block_open(line) {
        let after = line["asm".len()..].trim_start()[1..].trim();
        if !after.is_empty() {
            return Err(TranslateError::malformed("`asm {` must be alone on its line")
                .with_help("put the assembly on the lines after `asm {`"));
        }
        return Ok(Line::Directive(Directive::AsmOpen));
    }

    if is_block_close(line) {
        return Ok(Line::Directive(Directive::AsmClose));
    }

    let (keyword, rest) = match line.split_once(char::is_whitespace) {
        Some((keyword, rest)) => (keyword, rest.trim()),
        None => (line, ""),
    };

    let directive = match keyword {
        "import" => Directive::Import(single_name(keyword, rest)?),
        "namespace" => Directive::Namespace(single_name(keyword, rest)?),
        "var" => parse_var(rest)?,
        "func" => Directive::Func(single_name(keyword, rest)?),
        "return" => Directive::Return(single_operand(keyword, rest)?),
        "endfunc" => bare(keyword, rest, Directive::EndFunc)?,
        "if" => Directive::If(parse_condition(keyword, rest)?),
        "else" => bare(keyword, rest, Directive::Else)?,
        "endif" => bare(keyword, rest, Directive::EndIf)?,
        "while" => Directive::While(parse_condition(keyword, rest)?),
        "endwhile" => bare(keyword, rest, Directive::EndWhile)?,
        "print" => Directive::Print(single_operand(keyword, rest)?),
        "scan" => Directive::Scan(single_name(keyword, rest)?),
        "exit" => bare(keyword, rest, Directive::Exit)?,
        "asm" => {
            return Err(TranslateError::malformed("`asm` must be followed by `{`"));
        }
        other => return Ok(Line::Unrecognized(other.to_string())),
    };

    Ok(Line::Directive(directive))
}

/// Split on whitespace and commas. A quoted character such as `','` or
/// `' '` stays one token.
fn operands(rest: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start = None;
    let mut quoted = false;
    for (i, c) in rest.char_indices() {
        if quoted {
            quoted = c != '\'';
            continue;
        }
        match c {
            '\'' => {
                start.get_or_insert(i);
                quoted = true;
            }
            c if c.is_whitespace() || c == ',' => {
                if let Some(from) = start.take() {
                    tokens.push(&rest[from..i]);
                }
            }
            _ => {
                start.get_or_insert(i);
            }
        }
    }
    if let Some(from) = start {
        tokens.push(&rest[from..]);
    }
    tokens
}

fn bare(keyword: &str, rest: &str, directive: Directive) -> TranslateResult<Directive> {
    if rest.is_empty() {
        Ok(directive)
    } else {
        Err(TranslateError::malformed(format!("`{}` takes no operands", keyword)))
    }
}

fn single_operand(keyword: &str, rest: &str) -> TranslateResult<String> {
    match operands(rest).as_slice() {
        [operand] => Ok(operand.to_string()),
        found => Err(TranslateError::malformed(format!(
            "`{}` takes exactly one operand, found {}",
            keyword,
            found.len()
        ))),
    }
}

fn single_name(keyword: &str, rest: &str) -> TranslateResult<String> {
    let name = single_operand(keyword, rest)?;
    if is_identifier(&name) {
        Ok(name)
    } else {
        Err(TranslateError::malformed(format!("`{}` is not a valid name for `{}`", name, keyword)))
    }
}

fn parse_condition(keyword: &str, rest: &str) -> TranslateResult<Condition> {
    match operands(rest).as_slice() {
        [lhs, rhs] => Ok(Condition {
            lhs: lhs.to_string(),
            op: CompareOp::Eq,
            rhs: rhs.to_string(),
        }),
        [lhs, op, rhs] => {
            let op = CompareOp::parse(op).ok_or_else(|| {
                TranslateError::malformed(format!("unknown comparison `{}` in `{}`", op, keyword))
                    .with_help("use one of == != < <= > >=")
            })?;
            Ok(Condition {
                lhs: lhs.to_string(),
                op,
                rhs: rhs.to_string(),
            })
        }
        found => Err(TranslateError::malformed(format!(
            "`{}` expects `<operand> [<cmp>] <operand>`, found {} operand(s)",
            keyword,
            found.len()
        ))),
    }
}

/// `var <name>+ <literal>`. A quoted literal may contain spaces; an
/// unquoted literal is the last token.
fn parse_var(rest: &str) -> TranslateResult<Directive> {
    let (names, literal) = match rest.find('"') {
        Some(quote) => {
            let literal = rest[quote..].trim_end();
            if literal.len() < 2 || !literal.ends_with('"') {
                return Err(TranslateError::malformed("unterminated string literal in `var`"));
            }
            (operands(&rest[..quote]), literal.to_string())
        }
        None => {
            let mut tokens = operands(rest);
            let literal = tokens
                .pop()
                .ok_or_else(|| TranslateError::malformed("`var` needs at least one name and a literal"))?;
            (tokens, literal.to_string())
        }
    };

    if names.is_empty() {
        return Err(TranslateError::malformed("`var` needs at least one name and a literal")
            .with_help("write `var <name>... <literal>`, e.g. `var count 0`"));
    }

    if let Some(bad) = names.iter().find(|n| !is_identifier(n)) {
        return Err(TranslateError::malformed(format!("`{}` is not a valid variable name", bad)));
    }

    Ok(Directive::Var {
        names: names.into_iter().map(str::to_string).collect(),
        literal,
    })
}

/// NASM-compatible identifier: starts with a letter, `_` or `.`, continues
/// with alphanumerics or `_ . $ # @ ~ ?`.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '.' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '$' | '#' | '@' | '~' | '?'))
}
