// ofsm-cli: shared utilities for CLI tools.

use std::path::PathBuf;
use std::process;

use ofsm_build::optimize::exact_row_hash;
use ofsm_build::{BuildOptions, OfsmArray, PackMode, Step, Symbol};
use tracing::Level;

/// Terminal code offset applied by `ofsm-make` unless `--delta` is given.
pub const DEFAULT_DELTA: u32 = 1;

/// Parsed `ofsm-make` command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MakeArgs {
    pub output: Option<PathBuf>,
    pub name: Option<String>,
    pub delta: u32,
    pub verbose: bool,
    pub options: BuildOptions,
    pub steps: Vec<String>,
}

/// Parse `ofsm-make` arguments (without the program name).
///
/// Flags may appear anywhere; every other argument is a step.
pub fn parse_make_args(args: &[String]) -> Result<MakeArgs, String> {
    let mut parsed = MakeArgs {
        output: None,
        name: None,
        delta: DEFAULT_DELTA,
        verbose: false,
        options: BuildOptions::default(),
        steps: Vec::new(),
    };

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        let arg = arg.as_str();
        let mut value = |flag: &str| {
            iter.next()
                .cloned()
                .ok_or_else(|| format!("{flag} requires a value"))
        };
        match arg {
            "-o" | "--output" => parsed.output = Some(PathBuf::from(value(arg)?)),
            "--name" => parsed.name = Some(value(arg)?),
            "--delta" => parsed.delta = parse_number(&value(arg)?, "delta")?,
            "--max-flakes" => {
                let max_flakes = parse_number(&value(arg)?, "max-flakes")?;
                parsed.options = parsed.options.with_max_flakes(max_flakes);
            }
            "--validate" => parsed.options = parsed.options.with_validation(true),
            "-v" | "--verbose" => parsed.verbose = true,
            flag if flag.starts_with('-') => return Err(format!("unknown option: {flag}")),
            step => parsed.steps.push(step.to_string()),
        }
    }

    if parsed.steps.is_empty() {
        return Err("no steps given".to_string());
    }
    Ok(parsed)
}

fn parse_number<T: std::str::FromStr>(text: &str, what: &str) -> Result<T, String> {
    text.parse()
        .map_err(|_| format!("invalid {what}: {text:?}"))
}

/// Parse one step argument.
///
/// Grammar: `product`, `power:Q:N`, `comb:Q:N`, `pack:sum`,
/// `pack:sum-mod:M` (either pack may end in `:raw` to skip renumbering),
/// `optimize:F`, `optimize-all`, `optimize-all:row`.
pub fn parse_step(arg: &str) -> Result<Step, String> {
    let parts: Vec<&str> = arg.split(':').collect();
    let step = match parts.as_slice() {
        ["product"] => Step::Product,
        ["power", q, n] => Step::GrowPower {
            qinputs: parse_number(q, "input count")?,
            count: parse_number(n, "count")?,
        },
        ["comb", q, n] => Step::GrowComb {
            qinputs: parse_number(q, "input count")?,
            count: parse_number(n, "count")?,
        },
        ["pack", rest @ ..] => parse_pack(rest)?,
        ["optimize", f] => Step::Optimize {
            flake: parse_number(f, "flake index")?,
            hash: None,
        },
        ["optimize-all"] => Step::OptimizeAll { hash: None },
        ["optimize-all", "row"] => Step::OptimizeAll {
            hash: Some(Box::new(exact_row_hash)),
        },
        _ => return Err(format!("unknown step: {arg}")),
    };
    Ok(step)
}

fn parse_pack(parts: &[&str]) -> Result<Step, String> {
    let (parts, mode) = match parts.split_last() {
        Some((&"raw", rest)) => (rest, PackMode::SkipRenumbering),
        _ => (parts, PackMode::Renumber),
    };
    let value: ofsm_build::script::PackFn = match parts {
        ["sum"] => Box::new(|path: &[Symbol]| path.iter().map(|&s| s as u64).sum::<u64>()),
        ["sum-mod", m] => {
            let modulus: u64 = parse_number(m, "modulus")?;
            if modulus == 0 {
                return Err("modulus must be positive".to_string());
            }
            Box::new(move |path: &[Symbol]| {
                path.iter().map(|&s| s as u64).sum::<u64>() % modulus
            })
        }
        _ => return Err(format!("unknown pack value: {}", parts.join(":"))),
    };
    Ok(Step::Pack { value, mode })
}

/// Parse a whitespace-separated line of symbols.
pub fn parse_symbols(line: &str) -> Result<Vec<Symbol>, String> {
    line.split_whitespace()
        .map(|token| parse_number(token, "symbol"))
        .collect()
}

/// Evaluate one line of `ofsm-run` input against `array`.
///
/// The line must hold one symbol per flake, each below the array's entry
/// offset.
pub fn evaluate_line(array: &OfsmArray, line: &str) -> Result<u32, String> {
    let symbols = parse_symbols(line)?;
    array.run_checked(&symbols).map_err(|e| e.to_string())
}

/// Install a stderr fmt subscriber. Quiet runs only show warnings.
pub fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Print an error message and exit with code 1.
pub fn fatal(msg: &str) -> ! {
    eprintln!("error: {msg}");
    process::exit(1);
}

/// Check if `--help` or `-h` is in the args.
pub fn wants_help(args: &[String]) -> bool {
    args.iter().any(|a| a == "--help" || a == "-h")
}
