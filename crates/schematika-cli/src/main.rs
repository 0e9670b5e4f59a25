use std::{
    io::{self, Write},
    process::ExitCode,
};

use schematika::{Object, Session};

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 {
        // File execution mode.
        let path = &args[1];
        let source = match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("Error reading {path}: {e}");
                return ExitCode::FAILURE;
            }
        };
        let mut session = Session::new();
        match session.execute_all(&source) {
            Ok(results) => {
                for result in results {
                    if result != Object::Unspecified {
                        println!("{result}");
                    }
                }
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{e}");
                ExitCode::FAILURE
            }
        }
    } else {
        repl()
    }
}

/// Interactive mode: one expression per `;`, continuation prompt while a
/// construct is open, blank line to force-finish pending input.
fn repl() -> ExitCode {
    let mut session = Session::new();

    loop {
        let prompt = if session.needs_more_input() { "... " } else { ">>> " };
        let Some(line) = read_line(prompt) else {
            // EOF: give a trailing expression its chance, then stop.
            report(session.finish_input());
            println!();
            break;
        };

        if line.trim().is_empty() {
            if session.needs_more_input() {
                report(session.finish_input());
            }
            continue;
        }

        let mut owned = line;
        owned.push('\n');
        report(session.feed_line(&owned));
    }

    ExitCode::SUCCESS
}

fn report(outcome: Result<Vec<Object>, schematika::SessionError>) {
    match outcome {
        Ok(results) => {
            for result in results {
                if result != Object::Unspecified {
                    println!("{result}");
                }
            }
        }
        Err(e) => eprintln!("{e}"),
    }
}

fn read_line(prompt: &str) -> Option<String> {
    print!("{prompt}");
    io::stdout().flush().ok()?;
    let mut line = String::new();
    match io::stdin().read_line(&mut line) {
        Ok(0) => None,
        Ok(_) => Some(line.trim_end_matches(['\n', '\r']).to_owned()),
        Err(_) => None,
    }
}
