use std::path::PathBuf;

use anyhow::{Context, Result};
use rustyline::{error::ReadlineError, Editor};
use structopt::StructOpt;
use tracing_subscriber::EnvFilter;

use pql::parse;

#[derive(StructOpt, Debug)]
#[structopt(name = "pql", about = "Parse program queries and print them back")]
struct Opt {
    /// Files of queries, one per line. Without any, starts an interactive prompt.
    #[structopt(name = "FILE", parse(from_os_str))]
    files: Vec<PathBuf>,

    /// Also print the clauses in evaluation order.
    #[structopt(long)]
    rank: bool,

    /// Do not record prompt input in the line editor history.
    #[structopt(long)]
    no_history: bool,
}

fn handle_input(opt: &Opt, code: &str) -> Result<String> {
    let query = parse(code)?;
    let mut out = query.to_string();
    if opt.rank {
        for (i, clause) in query.ranked_clauses().into_iter().enumerate() {
            out.push_str(&format!("\n  {}. {} [free: {}]", i + 1, clause, clause.free_slots()));
        }
    }
    Ok(out)
}

fn run_files(opt: &Opt) -> Result<()> {
    for path in &opt.files {
        let code = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let queries = code
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with("//"));

        for query in queries {
            match handle_input(opt, query) {
                Ok(text) => println!("{}", text),
                Err(e) => println!("Error: {}", e),
            }
        }
    }
    Ok(())
}

fn install_tracing_subscriber() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> Result<()> {
    install_tracing_subscriber();
    let opt = Opt::from_args();

    if !opt.files.is_empty() {
        return run_files(&opt);
    }

    let mut editor = Editor::<()>::new();
    loop {
        let readline = editor.readline("> ");
        match readline {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                if !opt.no_history {
                    editor.add_history_entry(line.as_str());
                }

                match handle_input(&opt, &line) {
                    Ok(text) => {
                        println!("{}", text);
                    }
                    Err(e) => {
                        println!("Error: {}", e);
                    }
                }
            }
            Err(ReadlineError::Interrupted) => break,
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                println!("Error: {}", err);
                break;
            }
        }
    }

    Ok(())
}
