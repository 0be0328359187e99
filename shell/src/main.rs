use argh::FromArgs;
use env_logger::{Builder, Env};
use shsh::command::ExitCode;
use shsh::{EditorLineReader, Interpreter, export_shell_identity};
use std::io::{self, IsTerminal, Write};

#[derive(FromArgs)]
/// A small interactive shell with pipelines.
struct ShellArgs {
    #[argh(option, short = 'c')]
    /// execute one command line and exit with its status.
    command: Option<String>,

    #[argh(option, default = "String::from(\"shsh!% \")")]
    /// prompt shown before each interactive line.
    prompt: String,

    #[argh(switch)]
    /// do not keep a history of entered lines.
    no_history: bool,
}

fn run(args: ShellArgs) -> anyhow::Result<ExitCode> {
    let mut sh = Interpreter::default();
    if let Some(line) = args.command {
        return Ok(sh.execute_line(&line).status);
    }
    if io::stdin().is_terminal() {
        let mut reader = EditorLineReader::new(args.prompt, !args.no_history)?;
        sh.repl(&mut reader)
    } else {
        sh.repl(&mut io::stdin())
    }
}

fn main() {
    Builder::from_env(Env::default().default_filter_or("warn")).init();
    let args: ShellArgs = argh::from_env();

    // SAFETY: called before anything else could read or write the environment
    // from another thread.
    unsafe { export_shell_identity() };

    let code = run(args).unwrap_or_else(|e| {
        eprintln!("shsh: {e:#}");
        1
    });
    let _ = io::stdout().flush();
    std::process::exit(code);
}
