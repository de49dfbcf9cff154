//! # Command Lists
//!
//! An argument vector whose strings and span table both live in the arena.

use volviewer_core::{Arena, DynArray, Span, Stream};

/// Program and arguments for a child process.
#[derive(Clone, Copy, Debug, Default)]
pub struct CommandList {
    args: DynArray<Span>,
}

impl CommandList {
    /// Creates an empty command.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            args: DynArray::new(),
        }
    }

    /// Appends arguments, copying each string into the arena.
    ///
    /// Returns `None` on a disabled arena.
    pub fn append(&mut self, arena: &mut Arena, args: &[&str]) -> Option<()> {
        // Reserve the table first so the string copies never force a relocation.
        self.args.reserve(arena, args.len())?;
        for arg in args {
            let span = arena.push_str(arg)?;
            self.args.push(arena, span)?;
        }
        Some(())
    }

    /// Number of arguments, program included.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.args.len()
    }

    /// Returns true if there is no program.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Forgets all arguments.
    pub fn clear(&mut self) {
        self.args.clear();
    }

    /// The program, if any.
    #[must_use]
    pub fn program<'a>(&self, arena: &'a Arena) -> Option<&'a str> {
        self.args.get(arena, 0).map(|span| arena.str(span))
    }

    /// Iterates over every argument, program first.
    pub fn args<'a>(&self, arena: &'a Arena) -> impl Iterator<Item = &'a str> + 'a {
        self.args
            .as_slice(arena)
            .iter()
            .map(move |span| arena.str(*span))
    }

    /// Renders the command line for logs, quoting arguments with spaces or
    /// double quotes. Empty arguments are skipped.
    pub fn write_display(&self, arena: &Arena, stream: &mut Stream<'_>) {
        let mut first = true;
        for arg in self.args(arena).filter(|arg| !arg.is_empty()) {
            if !first {
                stream.append_byte(b' ');
            }
            stream.append_quoted(arg);
            first = false;
        }
    }
}
