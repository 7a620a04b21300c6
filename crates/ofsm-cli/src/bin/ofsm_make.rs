// ofsm-make: Build a lookup array from a step script.
//
// Runs the steps in order, prints the step log and a summary of the built
// machine, and writes the exported array when an output file is given.
//
// Usage:
//   ofsm-make [-o FILE] [--name NAME] [--delta N] [OPTIONS] STEP...
//
// Steps:
//   power:Q:N             N symbols over Q inputs, order kept
//   comb:Q:N              N distinct symbols over Q inputs, order ignored
//   product               Join the two most recently grown blocks
//   pack:sum[:raw]        Group terminal states by symbol sum
//   pack:sum-mod:M[:raw]  Group terminal states by symbol sum modulo M
//   optimize:F            Merge compatible states of flake F
//   optimize-all[:row]    Optimize every flake, last to first
//
// Options:
//   -o, --output FILE     Write the array to FILE
//   --name NAME           Array name stored in the header (max 16 bytes)
//   --delta N             Offset added to terminal codes (default 1)
//   --max-flakes N        Flake ceiling per machine (default 64)
//   --validate            Check machine invariants after every step
//   -v, --verbose         Log every step to stderr
//   -h, --help            Print help

use std::io::{self, Write};

use ofsm_build::{Script, StepStatus};

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();

    if args.is_empty() || ofsm_cli::wants_help(&args) {
        println!("ofsm-make: Build a lookup array from a step script.");
        println!();
        println!("Usage: ofsm-make [-o FILE] [--name NAME] [--delta N] [OPTIONS] STEP...");
        println!();
        println!("Steps:");
        println!("  power:Q:N             N symbols over Q inputs, order kept");
        println!("  comb:Q:N              N distinct symbols over Q inputs, order ignored");
        println!("  product               Join the two most recently grown blocks");
        println!("  pack:sum[:raw]        Group terminal states by symbol sum");
        println!("  pack:sum-mod:M[:raw]  Group terminal states by symbol sum modulo M");
        println!("  optimize:F            Merge compatible states of flake F");
        println!("  optimize-all[:row]    Optimize every flake, last to first");
        println!();
        println!("Options:");
        println!("  -o, --output FILE     Write the array to FILE");
        println!("  --name NAME           Array name stored in the header (max 16 bytes)");
        println!("  --delta N             Offset added to terminal codes (default 1)");
        println!("  --max-flakes N        Flake ceiling per machine (default 64)");
        println!("  --validate            Check machine invariants after every step");
        println!("  -v, --verbose         Log every step to stderr");
        println!("  -h, --help            Print this help");
        return;
    }

    let parsed = ofsm_cli::parse_make_args(&args).unwrap_or_else(|e| ofsm_cli::fatal(&e));
    ofsm_cli::init_logging(parsed.verbose);

    // Reject malformed steps before running anything.
    let steps = parsed
        .steps
        .iter()
        .map(|arg| ofsm_cli::parse_step(arg))
        .collect::<Result<Vec<_>, _>>()
        .unwrap_or_else(|e| ofsm_cli::fatal(&e));

    let mut script = Script::with_options(parsed.options);
    for step in steps {
        script.push(step);
    }

    let stdout = io::stdout();
    let mut out = io::BufWriter::new(stdout.lock());
    for (index, record) in script.steps().iter().enumerate() {
        let status = format!("{:?}", record.status);
        let _ = writeln!(out, "{index:>3}  {status:<12} {:?}", record.kind);
    }

    if script.status() != StepStatus::Done {
        let _ = out.flush();
        let msg = script
            .error()
            .map_or_else(|| "script did not complete".to_string(), |e| e.to_string());
        ofsm_cli::fatal(&msg);
    }

    let mut array = script
        .make_array(parsed.delta)
        .unwrap_or_else(|e| ofsm_cli::fatal(&e.to_string()));
    if let Some(name) = &parsed.name {
        array.set_name(name);
    }

    let machine = script.machine();
    let _ = writeln!(out, "flakes:     {}", machine.depth());
    let _ = writeln!(out, "states:     {}", machine.state_count());
    let _ = writeln!(out, "start_from: {}", array.start_from());
    let _ = writeln!(out, "cells:      {}", array.len());

    if let Some(path) = &parsed.output {
        if let Err(e) = std::fs::write(path, array.to_bytes()) {
            let _ = out.flush();
            ofsm_cli::fatal(&format!("failed to write {}: {e}", path.display()));
        }
        let _ = writeln!(out, "wrote {} ({})", path.display(), array.name());
    }
}
