//! Label allocation for conditionals and loops.
//!
//! Two independent monotonic counters hand out sequence numbers, one for
//! `if` and one for `while`; numbers are never reused. Open constructs live
//! on a single stack so closers always match the innermost opener, across
//! kinds as well (`if ... while ... endif` is rejected).

use crate::error::Location;

pub fn endif_label(id: u32) -> String {
    format!("endif_{}", id)
}

pub fn endelse_label(id: u32) -> String {
    format!("endelse_{}", id)
}

pub fn while_start_label(id: u32) -> String {
    format!("while_start_{}", id)
}

pub fn while_end_label(id: u32) -> String {
    format!("while_end_{}", id)
}

/// Whether `name` has the shape of a label this module generates.
pub fn is_generated_label(name: &str) -> bool {
    ["endif_", "endelse_", "while_start_", "while_end_"].iter().any(|prefix| {
        name.strip_prefix(prefix)
            .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IfContext {
    pub id: u32,
    pub has_else: bool,
    pub opened_at: Location,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopContext {
    pub id: u32,
    pub start_label: String,
    pub end_label: String,
    pub opened_at: Location,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    If(IfContext),
    While(LoopContext),
}

impl Frame {
    pub fn keyword(&self) -> &'static str {
        match self {
            Frame::If(_) => "if",
            Frame::While(_) => "while",
        }
    }

    pub fn opened_at(&self) -> &Location {
        match self {
            Frame::If(ctx) => &ctx.opened_at,
            Frame::While(ctx) => &ctx.opened_at,
        }
    }
}

#[derive(Debug, Default)]
pub struct LabelAllocator {
    if_counter: u32,
    while_counter: u32,
    frames: Vec<Frame>,
}

impl LabelAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter_if(&mut self, opened_at: Location) -> u32 {
        self.if_counter += 1;
        self.frames.push(Frame::If(IfContext {
            id: self.if_counter,
            has_else: false,
            opened_at,
        }));
        self.if_counter
    }

    /// Innermost open construct, if it is an `if`.
    pub fn current_if_mut(&mut self) -> Option<&mut IfContext> {
        match self.frames.last_mut() {
            Some(Frame::If(ctx)) => Some(ctx),
            _ => None,
        }
    }

    /// Pops the innermost construct only if it is an `if`.
    pub fn exit_if(&mut self) -> Option<IfContext> {
        match self.frames.last() {
            Some(Frame::If(_)) => match self.frames.pop() {
                Some(Frame::If(ctx)) => Some(ctx),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn enter_while(&mut self, opened_at: Location) -> LoopContext {
        self.while_counter += 1;
        let id = self.while_counter;
        let ctx = LoopContext {
            id,
            start_label: while_start_label(id),
            end_label: while_end_label(id),
            opened_at,
        };
        self.frames.push(Frame::While(ctx.clone()));
        ctx
    }

    /// Pops the innermost construct only if it is a `while`.
    pub fn exit_while(&mut self) -> Option<LoopContext> {
        match self.frames.last() {
            Some(Frame::While(_)) => match self.frames.pop() {
                Some(Frame::While(ctx)) => Some(ctx),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn innermost(&self) -> Option<&Frame> {
        self.frames.last()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Total sequence numbers handed out so far.
    pub fn allocated(&self) -> u32 {
        self.if_counter + self.while_counter
    }
}
