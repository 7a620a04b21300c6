// ofsm-run: Evaluate symbol sequences against a lookup array.
//
// Reads one sequence per line from stdin, symbols separated by whitespace,
// and prints the code the array yields:
//   3 0 7 -> 12
// Invalid sequences yield 0. Lines with the wrong number of symbols, or a
// symbol past the widest alphabet, are reported on stderr and skipped.
//
// Usage:
//   ofsm-run [-v] FILE
//
// Options:
//   -v, --verbose   Print the array header to stderr
//   -h, --help      Print help

use std::io::{self, BufRead, Write};

use ofsm_build::OfsmArray;

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();

    if ofsm_cli::wants_help(&args) {
        println!("ofsm-run: Evaluate symbol sequences against a lookup array.");
        println!();
        println!("Usage: ofsm-run [-v] FILE");
        println!();
        println!("Reads whitespace-separated symbols from stdin, one sequence per");
        println!("line. Prints:");
        println!("  3 0 7 -> 12");
        println!();
        println!("Options:");
        println!("  -v, --verbose   Print the array header to stderr");
        println!("  -h, --help      Print this help");
        return;
    }

    let verbose = args.iter().any(|a| a == "-v" || a == "--verbose");
    let files: Vec<&String> = args.iter().filter(|a| !a.starts_with('-')).collect();
    let [path] = files.as_slice() else {
        ofsm_cli::fatal("expected exactly one array file");
    };

    ofsm_cli::init_logging(verbose);

    let data = std::fs::read(path.as_str())
        .unwrap_or_else(|e| ofsm_cli::fatal(&format!("failed to read {path}: {e}")));
    let array = OfsmArray::from_bytes(&data)
        .unwrap_or_else(|e| ofsm_cli::fatal(&format!("{path}: {e}")));
    if verbose {
        eprintln!(
            "{}: name={:?} flakes={} start_from={} cells={}",
            path,
            array.name(),
            array.qflakes(),
            array.start_from(),
            array.len()
        );
    }

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = io::BufWriter::new(stdout.lock());

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                eprintln!("error reading stdin: {e}");
                break;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match ofsm_cli::evaluate_line(&array, line) {
            Ok(code) => {
                let _ = writeln!(out, "{line} -> {code}");
            }
            Err(e) => eprintln!("skipping {line:?}: {e}"),
        }
    }
}
