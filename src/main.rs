//! CLI tool to highlight and run scripts the way the editor does.

use std::fs;
use std::path::Path;
use std::process::ExitCode;

use scriptpad::{
    Config, Error, Highlighter, OutputEntry, Palette, RunCoordinator, RunState, ScriptRunner,
    SessionUpdate, render_ansi, to_offset_clamped,
};

fn usage() -> ExitCode {
    eprintln!("Usage: scriptpad [--config FILE] <command> <file> [args...]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  highlight FILE          Print FILE with syntax colors");
    eprintln!("  tokens FILE             Print one token per line");
    eprintln!("  run FILE                Run FILE and print its annotated output");
    eprintln!("  locate FILE LINE COL    Print the clamped byte offset");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  scriptpad highlight script.kts");
    eprintln!("  scriptpad --config scriptpad.json run script.kts");
    eprintln!("  scriptpad locate script.kts 3 5");
    ExitCode::from(2)
}

fn main() -> ExitCode {
    // a second subscriber (tests, embedding) is not an error
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();

    let mut args: Vec<String> = std::env::args().skip(1).collect();

    let config_path = match args.iter().position(|a| a == "--config") {
        Some(i) if i + 1 < args.len() => {
            let path = args.remove(i + 1);
            args.remove(i);
            Some(path)
        }
        Some(_) => {
            eprintln!("Error: --config needs a file");
            return ExitCode::from(2);
        }
        None => None,
    };

    if args.len() < 2 || args[0] == "--help" || args[0] == "-h" {
        return usage();
    }

    match execute(config_path.as_deref(), &args) {
        Ok(code) => code,
        Err(e @ Error::Config(_)) => {
            eprintln!("Error: {e}");
            ExitCode::from(2)
        }
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn execute(config_path: Option<&str>, args: &[String]) -> Result<ExitCode, Error> {
    let config = Config::load(config_path.map(Path::new))?;

    let path = args[1].as_str();
    let content = fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.into(),
        source,
    })?;

    let code = match args[0].as_str() {
        "highlight" => {
            let highlighter = Highlighter::from_config(&config.highlight);
            print!("{}", render_ansi(&highlighter.highlight(&content)));
            ExitCode::SUCCESS
        }
        "tokens" => {
            let highlighter = Highlighter::from_config(&config.highlight);
            for token in highlighter.tokenizer().tokenize(&content) {
                println!("{}\t{:?}", token.class.name(), token.text);
            }
            ExitCode::SUCCESS
        }
        "run" => run(&config, content),
        "locate" => match locate(&content, &args[2..]) {
            Some(offset) => {
                println!("{offset}");
                ExitCode::SUCCESS
            }
            None => usage(),
        },
        command => {
            eprintln!("Unknown command: {command}");
            ExitCode::from(2)
        }
    };
    Ok(code)
}

fn locate(content: &str, args: &[String]) -> Option<usize> {
    let [line, column] = args else {
        return None;
    };
    let (Ok(line), Ok(column)) = (line.parse(), column.parse()) else {
        return None;
    };
    Some(to_offset_clamped(content, line, column))
}

fn run(config: &Config, script: String) -> ExitCode {
    let palette = config.highlight.palette;
    let coordinator = RunCoordinator::new(ScriptRunner::new(config.runner.clone()));
    let updates = coordinator.subscribe();
    let id = coordinator.run(script);

    for update in updates {
        match update {
            SessionUpdate::Output { id: from, entry } if from == id => {
                print_entry(&entry, &palette);
            }
            SessionUpdate::State { id: from, state } if from == id => match state {
                RunState::Completed { code } => {
                    match code {
                        Some(code) => eprintln!("Return code: {code}"),
                        None => eprintln!("Return code: none (killed)"),
                    }
                    return code
                        .and_then(|c| u8::try_from(c).ok())
                        .map_or(ExitCode::FAILURE, ExitCode::from);
                }
                RunState::Failed { reason } => {
                    eprintln!("Error: {reason}");
                    return ExitCode::from(127);
                }
                RunState::Idle | RunState::Running => {}
            },
            _ => {}
        }
    }

    ExitCode::FAILURE
}

fn print_entry(entry: &OutputEntry, palette: &Palette) {
    match entry {
        OutputEntry::Stdout(_) => println!("{}", entry.render_ansi(palette)),
        OutputEntry::Stderr(_) => eprintln!("{}", entry.render_ansi(palette)),
    }
}
