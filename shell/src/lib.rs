//! `shsh`, a small interactive shell.
//!
//! A command line is split into words, grouped into pipeline stages at
//! standalone `|` tokens and executed. A lone built-in runs inside the shell,
//! a lone program runs in a child process the shell waits for, and a pipeline
//! runs every stage in its own process connected by pipes.
//!
//! The main entry point is [`Interpreter`]. Built-ins live in a [`Registry`];
//! the public modules [`command`] and [`env`] expose the traits and types for
//! implementing more of them.

pub mod builtin;
pub mod command;
pub mod dispatch;
pub mod env;
pub mod external;
mod interpreter;
pub mod io_adapters;
pub mod lexer;
pub mod parser;
pub mod pipeline;
pub mod redirect;

pub use builtin::Registry;
pub use env::export_shell_identity;
pub use interpreter::{EXIT_SYNTAX_ERROR, ExecutionReport, Interpreter, Streams};
pub use io_adapters::{EditorLineReader, LineReader};
