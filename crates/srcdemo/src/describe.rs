//! Human-readable rendering of decoded components.

use std::fmt::{self, Write};

use crate::datatables::ClassRegistry;
use crate::stringtables::StringTableTracker;

const INDENT: &str = "  ";

/// A component that can render itself as indented text.
pub trait Describe {
    /// Append a description of `self` to `out`.
    fn describe(&self, out: &mut Describer<'_>);
}

/// Indented text sink handed to [`Describe`] implementations.
///
/// Besides the text buffer it carries read-only views of the document's
/// class registry and string-table tracker, so components holding lookup
/// keys (a class index, a table id) can print the names they resolve to.
pub struct Describer<'a> {
    out: String,
    depth: usize,
    registry: &'a ClassRegistry,
    tables: &'a StringTableTracker,
}

impl<'a> Describer<'a> {
    /// Create an empty describer.
    pub fn new(registry: &'a ClassRegistry, tables: &'a StringTableTracker) -> Self {
        Self {
            out: String::new(),
            depth: 0,
            registry,
            tables,
        }
    }

    /// The class registry lookups resolve against.
    pub fn registry(&self) -> &'a ClassRegistry {
        self.registry
    }

    /// The string tables created so far.
    pub fn tables(&self) -> &'a StringTableTracker {
        self.tables
    }

    /// Write a line at the current depth.
    pub fn heading(&mut self, text: impl fmt::Display) {
        self.pad();
        // Writing into a String cannot fail.
        let _ = writeln!(self.out, "{}", text);
    }

    /// Write a `name: value` line at the current depth.
    pub fn field(&mut self, name: &str, value: impl fmt::Display) {
        self.pad();
        let _ = writeln!(self.out, "{}: {}", name, value);
    }

    /// Run `body` one level deeper.
    pub fn indented(&mut self, body: impl FnOnce(&mut Self)) {
        self.depth += 1;
        body(self);
        self.depth -= 1;
    }

    /// Consume the describer, returning the text.
    pub fn finish(self) -> String {
        self.out
    }

    fn pad(&mut self) {
        for _ in 0..self.depth {
            self.out.push_str(INDENT);
        }
    }
}

/// Describe a single component against empty lookup state.
pub fn describe_standalone(component: &impl Describe) -> String {
    let registry = ClassRegistry::default();
    let tables = StringTableTracker::default();
    let mut out = Describer::new(&registry, &tables);
    component.describe(&mut out);
    out.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Pair(u32, bool);

    impl Describe for Pair {
        fn describe(&self, out: &mut Describer<'_>) {
            out.heading("Pair");
            out.indented(|out| {
                out.field("count", self.0);
                out.field("flag", self.1);
            });
        }
    }

    #[test]
    fn test_indentation() {
        assert_eq!(
            describe_standalone(&Pair(3, true)),
            "Pair\n  count: 3\n  flag: true\n"
        );
    }
}
