use argh::FromArgs;
use pipesh::Interpreter;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter, e.g. `PIPESH_LOG=debug`.
const LOG_ENV: &str = "PIPESH_LOG";

#[derive(FromArgs)]
/// A small interactive command interpreter with pipes and redirections.
struct Args {
    /// run a single command line and exit with its status.
    #[argh(option, short = 'c')]
    command: Option<String>,

    /// prompt shown before each line.
    #[argh(option, default = "String::from(\"shell> \")")]
    prompt: String,

    /// file to load line history from and save it to.
    #[argh(option)]
    history: Option<PathBuf>,
}

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let args: Args = argh::from_env();
    init_logging();

    let mut interpreter = Interpreter::default();
    if let Some(line) = args.command {
        let code = match interpreter.run_line(&line) {
            Ok(outcome) => outcome.code(),
            Err(e) => {
                eprintln!("pipesh: {e}");
                2
            }
        };
        process::exit(code);
    }

    interpreter.repl(&args.prompt, args.history.as_deref())?;
    Ok(())
}
