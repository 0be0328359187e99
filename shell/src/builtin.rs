use crate::command::{CommandFactory, Continuation, ExecutableCommand};
use crate::env::Environment;
use crate::io_adapters::{BufLineReader, LineReader};
use crate::lexer::split_words;
use anyhow::{Result, anyhow};
use argh::{EarlyExit, FromArgs};
use std::fs;
use std::io::{self, BufRead, Write};
use std::marker::PhantomData;
use std::path::Path;

/// Names of the built-ins in [`Registry::default`], in registry order.
pub const BUILTIN_NAMES: [&str; 7] = ["cd", "cat", "echo", "help", "exit", "pwd", "sort"];

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed directly
/// in-process without spawning a child process.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "echo" or "cd".
    fn name() -> &'static str;

    /// Executes the command using provided IO streams and environment.
    ///
    /// An `Err` is a user error: it is reported and the shell keeps running.
    fn execute(
        self,
        stdin: &mut dyn BufRead,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<Continuation>;
}

impl<T: BuiltinCommand> ExecutableCommand for T {
    fn execute(
        self: Box<Self>,
        stdin: &mut dyn BufRead,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Continuation {
        match T::execute(*self, stdin, stdout, env) {
            Ok(x) => x,
            Err(e) => {
                let _ = writeln!(stderr, "shsh: {e:#}");
                Continuation::Continue
            }
        }
    }
}

/// Stands in for a built-in whose arguments argh rejected.
struct InvalidArgs {
    name: &'static str,
    output: String,
}

impl ExecutableCommand for InvalidArgs {
    fn execute(
        self: Box<Self>,
        _stdin: &mut dyn BufRead,
        _stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        _env: &mut Environment,
    ) -> Continuation {
        let _ = writeln!(stderr, "shsh: {}: {}", self.name, self.output.trim_end());
        Continuation::Continue
    }
}

/// Factory allows creating instances of a built-in from its name and arguments.
pub(crate) struct Factory<T> {
    _phantom: PhantomData<T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

impl<T: BuiltinCommand + 'static> CommandFactory for Factory<T> {
    fn name(&self) -> &'static str {
        T::name()
    }

    fn try_create(&self, name: &str, args: &[&str]) -> Option<Box<dyn ExecutableCommand>> {
        if name == T::name() {
            // Everything after the name is an operand, even when it starts with `-`.
            let operands: Vec<&str> = std::iter::once("--").chain(args.iter().copied()).collect();
            Some(match T::from_args(&[name], &operands) {
                Ok(cmd) => Box::new(cmd),
                Err(EarlyExit { output, .. }) => Box::new(InvalidArgs {
                    name: T::name(),
                    output,
                }),
            })
        } else {
            None
        }
    }
}

/// Immutable table of built-in commands, built once at startup and shared by
/// reference with everything that needs to tell built-ins from programs.
pub struct Registry {
    factories: Vec<Box<dyn CommandFactory>>,
}

impl Registry {
    /// Create a registry with a custom set of command factories.
    pub fn new(factories: Vec<Box<dyn CommandFactory>>) -> Self {
        Self { factories }
    }

    #[cfg(test)]
    pub fn contains(&self, name: &str) -> bool {
        self.factories.iter().any(|f| f.name() == name)
    }

    #[cfg(test)]
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.factories.iter().map(|f| f.name())
    }

    /// Creates the built-in called `name`, or `None` when it is not a built-in.
    pub fn try_create(&self, name: &str, args: &[&str]) -> Option<Box<dyn ExecutableCommand>> {
        self.factories
            .iter()
            .find_map(|factory| factory.try_create(name, args))
    }
}

impl Default for Registry {
    /// The shell's built-ins: `cd`, `cat`, `echo`, `help`, `exit`, `pwd`, `sort`.
    fn default() -> Self {
        Self::new(vec![
            Box::new(Factory::<Cd>::default()),
            Box::new(Factory::<Cat>::default()),
            Box::new(Factory::<Echo>::default()),
            Box::new(Factory::<Help>::default()),
            Box::new(Factory::<Exit>::default()),
            Box::new(Factory::<Pwd>::default()),
            Box::new(Factory::<Sort>::default()),
        ])
    }
}

#[derive(FromArgs)]
/// Print the current working directory to standard output.
pub struct Pwd {}

impl BuiltinCommand for Pwd {
    fn name() -> &'static str {
        "pwd"
    }

    fn execute(
        self,
        _stdin: &mut dyn BufRead,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<Continuation> {
        writeln!(stdout, "{}", env.current_dir()?.display())?;
        Ok(Continuation::Continue)
    }
}

#[derive(FromArgs)]
/// Change the current working directory.
pub struct Cd {
    #[argh(positional)]
    /// directory to switch to; absolute or relative to the current directory.
    pub target: Option<String>,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn execute(
        self,
        _stdin: &mut dyn BufRead,
        _stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<Continuation> {
        let target = self
            .target
            .filter(|t| !t.is_empty())
            .ok_or_else(|| anyhow!("expected argument to \"cd\""))?;
        env.change_dir(Path::new(&target))?;
        Ok(Continuation::Continue)
    }
}

#[derive(FromArgs)]
/// Exit the shell.
pub struct Exit {
    #[argh(positional, greedy)]
    /// ignored.
    pub _args: Vec<String>,
}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn execute(
        self,
        _stdin: &mut dyn BufRead,
        _stdout: &mut dyn Write,
        _env: &mut Environment,
    ) -> Result<Continuation> {
        Ok(Continuation::Terminate)
    }
}

#[derive(FromArgs)]
/// write the arguments to standard output, separated by spaces.
/// an argument of the form $NAME is replaced by the value of variable NAME.
pub struct Echo {
    #[argh(positional, greedy)]
    /// values to print, separated by spaces.
    pub args: Vec<String>,
}

impl BuiltinCommand for Echo {
    fn name() -> &'static str {
        "echo"
    }

    fn execute(
        self,
        _stdin: &mut dyn BufRead,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<Continuation> {
        let words: Vec<String> = self
            .args
            .into_iter()
            .map(|arg| {
                let value = arg
                    .strip_prefix('$')
                    .map(|var| env.get_var(var).unwrap_or_default());
                value.unwrap_or(arg)
            })
            .collect();
        writeln!(stdout, "{}", words.join(" "))?;
        Ok(Continuation::Continue)
    }
}

#[derive(FromArgs)]
/// print file(s) to stdout; stops at the first file that cannot be opened.
pub struct Cat {
    #[argh(positional, greedy)]
    /// files to print, in order.
    pub files: Vec<String>,
}

impl BuiltinCommand for Cat {
    fn name() -> &'static str {
        "cat"
    }

    fn execute(
        self,
        _stdin: &mut dyn BufRead,
        stdout: &mut dyn Write,
        _env: &mut Environment,
    ) -> Result<Continuation> {
        if self.files.is_empty() {
            return Err(anyhow!("usage: cat filename"));
        }
        for fname in self.files {
            let mut f =
                fs::File::open(&fname).map_err(|_| anyhow!("cat: {}: file not found", fname))?;
            io::copy(&mut f, stdout)?;
        }
        Ok(Continuation::Continue)
    }
}

#[derive(FromArgs)]
/// print a short description of the shell and its built-ins.
pub struct Help {}

impl BuiltinCommand for Help {
    fn name() -> &'static str {
        "help"
    }

    fn execute(
        self,
        _stdin: &mut dyn BufRead,
        stdout: &mut dyn Write,
        _env: &mut Environment,
    ) -> Result<Continuation> {
        writeln!(stdout, "shsh - a small shell with pipelines")?;
        writeln!(stdout, "Type program names and arguments, and hit enter.")?;
        writeln!(stdout, "Join commands with a standalone | to build a pipeline.")?;
        writeln!(stdout, "The following are built in:")?;
        for name in BUILTIN_NAMES {
            writeln!(stdout, "  {}", name)?;
        }
        writeln!(stdout, "Use the man command for information on other programs.")?;
        Ok(Continuation::Continue)
    }
}

#[derive(FromArgs)]
/// print the arguments sorted, one per line as "[n]: item".
/// without arguments the items are read from standard input until its end.
pub struct Sort {
    #[argh(positional, greedy)]
    /// items to sort.
    pub items: Vec<String>,
}

impl Sort {
    /// Collects every blank-separated word of every remaining input line.
    fn collect_input(reader: &mut dyn LineReader) -> Result<Vec<String>> {
        let mut items = Vec::new();
        while let Some(line) = reader.read_line()? {
            items.extend(split_words(&line).map(str::to_string));
        }
        Ok(items)
    }
}

impl BuiltinCommand for Sort {
    fn name() -> &'static str {
        "sort"
    }

    fn execute(
        self,
        stdin: &mut dyn BufRead,
        stdout: &mut dyn Write,
        _env: &mut Environment,
    ) -> Result<Continuation> {
        let mut items = if self.items.is_empty() {
            Self::collect_input(&mut BufLineReader::new(stdin))?
        } else {
            self.items
        };
        items.sort();
        for (i, item) in items.iter().enumerate() {
            writeln!(stdout, "[{}]: {}", i + 1, item)?;
        }
        Ok(Continuation::Continue)
    }
}
