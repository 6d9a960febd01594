use std::io;
use std::io::{BufRead, Write};
use std::time::Instant;

use anyhow::Error;

use garnet_interpreter::{Interpreter, Scope, Value};

/// Launches an interactive Read-Eval-Print-Loop within the given interpreter.
///
/// Variables persist from one entry to the next, and `it` holds the last value.
pub fn interactive(interpreter: &Interpreter, verbose: bool) -> Result<(), Error> {
    let stdin = io::stdin();
    let mut stdin = stdin.lock();
    let stdout = io::stdout();
    let mut stdout = stdout.lock();

    let scope = Scope::new();
    let mut counter = 0;
    let mut line = String::new();
    let mut last_value = Value::Nil;
    loop {
        write!(&mut stdout, "({}) Garnet Shell | ", counter)?;
        stdout.flush()?;
        line.clear();
        stdin.read_line(&mut line)?;
        if line.is_empty() {
            writeln!(&mut stdout, "exit")?;
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "exit" {
            break;
        }

        let start = Instant::now();
        let program = match interpreter.parse(line) {
            Ok(program) => program,
            Err(err) => {
                writeln!(&mut stdout, "ERROR: {}", err)?;
                continue;
            }
        };
        let elapsed = start.elapsed();
        if verbose {
            writeln!(
                &mut stdout,
                "Parsing time: {} ms ({} µs)",
                elapsed.as_millis(),
                elapsed.as_micros(),
            )?;
        }

        scope.assign("it", last_value.clone());
        let start = Instant::now();
        let output = interpreter.interpret_in(&program, &scope);
        let elapsed = start.elapsed();
        if verbose {
            writeln!(
                &mut stdout,
                "Execution time: {} ms ({} µs)",
                elapsed.as_millis(),
                elapsed.as_micros(),
            )?;
            writeln!(&mut stdout)?;
        }

        match output {
            Ok(value) => {
                let rendered = interpreter
                    .inspect(&value)
                    .unwrap_or_else(|err| format!("<inspect failed: {}>", err));
                writeln!(&mut stdout, "=> {}", rendered)?;
                last_value = value;
            }
            Err(err) => writeln!(&mut stdout, "ERROR: {}", err)?,
        }
        counter += 1;
    }

    Ok(())
}
