//! Function table: per-function instruction bodies in declaration order.

use crate::error::{ErrorKind, Location, TranslateError, TranslateResult};
use indexmap::IndexMap;

#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    pub body: Vec<String>,
    pub opened_at: Location,
    /// Control-structure depth when the function was opened.
    pub control_depth: usize,
}

#[derive(Debug, Default)]
pub struct FunctionTable {
    functions: IndexMap<String, Function>,
    current: Option<String>,
}

impl FunctionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&mut self, name: &str, opened_at: Location, control_depth: usize) -> TranslateResult<()> {
        if let Some(open) = self.current() {
            return Err(TranslateError::new(
                ErrorKind::DanglingFunction,
                format!("`func {}` while `{}` (opened at {}) is still open", name, open.name, open.opened_at),
            )
            .with_help(format!("close `{}` with `endfunc` or `return`", open.name)));
        }
        if let Some(existing) = self.functions.get(name) {
            return Err(TranslateError::new(
                ErrorKind::DuplicateFunction,
                format!("function `{}` is already defined at {}", name, existing.opened_at),
            ));
        }

        self.functions.insert(
            name.to_string(),
            Function {
                name: name.to_string(),
                body: Vec::new(),
                opened_at,
                control_depth,
            },
        );
        self.current = Some(name.to_string());
        Ok(())
    }

    pub fn current(&self) -> Option<&Function> {
        self.current.as_ref().and_then(|name| self.functions.get(name))
    }

    pub fn current_mut(&mut self) -> Option<&mut Function> {
        match &self.current {
            Some(name) => self.functions.get_mut(name),
            None => None,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn is_open(&self) -> bool {
        self.current.is_some()
    }

    /// Close the open function after appending `tail` to its body.
    pub fn close(&mut self, tail: Vec<String>) -> Option<&Function> {
        let name = self.current.take()?;
        let function = self.functions.get_mut(&name)?;
        function.body.extend(tail);
        Some(function)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Function> {
        self.functions.values()
    }
}
