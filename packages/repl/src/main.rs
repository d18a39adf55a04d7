use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

/// ichigo - Interactive terminal for the ichigo Lisp engine
#[derive(Parser, Debug)]
#[command(name = "ichigo")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Compiled engine module (.wasm or .wat)
    module: PathBuf,

    /// Engine debug level to set at startup
    #[arg(long, allow_negative_numbers = true)]
    debug_level: Option<i32>,

    /// JSON test suite to run with :test
    #[arg(long)]
    suite: Option<PathBuf>,

    /// Do not let the engine block for input mid-evaluation
    #[arg(long)]
    no_blocking_read: bool,

    /// Force vi editing mode
    #[arg(long)]
    vi: bool,

    /// Force emacs editing mode
    #[arg(long, conflicts_with = "vi")]
    emacs: bool,
}

fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    if args.vi {
        std::env::set_var("ICHIGO_EDIT_MODE", "vi");
    } else if args.emacs {
        std::env::set_var("ICHIGO_EDIT_MODE", "emacs");
    }

    let options = ichigo_repl::Options {
        module: args.module,
        debug_level: args.debug_level,
        suite: args.suite,
        blocking_read: !args.no_blocking_read,
    };

    if let Err(e) = ichigo_repl::run(&options) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
