use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use luna::{Error, render_error};
use luna_core::asm;
use luna_core::vm::{BytecodeModule, VM, VmOptions};
use miette::{IntoDiagnostic, Result, WrapErr, miette};
use tracing::debug;

/// LUNA - assembler and register virtual machine
#[derive(Parser, Debug)]
#[command(name = "luna")]
#[command(about = "Tokenize, assemble or run LUNA programs", long_about = None)]
struct Args {
    #[command(flatten)]
    mode: Mode,

    /// Input file: assembly for --la/--as, a module for --vm
    file: PathBuf,

    /// Where --as writes the module
    #[arg(short, long, default_value = "a.lbin")]
    output: PathBuf,

    /// Print each function's disassembly before running
    #[arg(long)]
    dump: bool,

    /// Maximum number of registers across all frames
    #[arg(long, default_value_t = VmOptions::default().max_stack_slots)]
    max_stack: usize,

    /// Maximum number of nested calls
    #[arg(long, default_value_t = VmOptions::default().max_call_depth)]
    max_depth: usize,
}

#[derive(clap::Args, Debug)]
#[group(required = true, multiple = false)]
struct Mode {
    /// Print the token stream of an assembly file
    #[arg(long = "la")]
    lex: bool,

    /// Assemble a file into a binary module
    #[arg(long = "as")]
    assemble: bool,

    /// Load and execute a binary module
    #[arg(long = "vm")]
    run: bool,
}

/// Accepts the historical single-dash spellings `-la`, `-as` and `-vm`.
fn normalize_args(args: impl Iterator<Item = String>) -> Vec<String> {
    args.map(|arg| match arg.as_str() {
        "-la" | "-as" | "-vm" => format!("-{arg}"),
        _ => arg,
    })
    .collect()
}

fn read_source(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .into_diagnostic()
        .wrap_err_with(|| format!("cannot read {}", path.display()))
}

fn lex(path: &Path) -> Result<()> {
    let source = read_source(path)?;
    let tokens = asm::tokenize(&source).map_err(|e| {
        render_error(&Error::assembly(e, source.as_str()));
        miette!("could not tokenize {}", path.display())
    })?;
    for (token, span) in tokens {
        println!("{:>5}..{:<5} {token}", span.start, span.end);
    }
    Ok(())
}

fn assemble(path: &Path, output: &Path) -> Result<()> {
    let source = read_source(path)?;
    let module = asm::assemble(&source).map_err(|e| {
        render_error(&Error::assembly(e, source.as_str()));
        miette!("could not assemble {}", path.display())
    })?;
    let bytes = module.to_bytes();
    fs::write(output, &bytes)
        .into_diagnostic()
        .wrap_err_with(|| format!("cannot write {}", output.display()))?;
    debug!(
        functions = module.functions().len(),
        bytes = bytes.len(),
        "module written"
    );
    Ok(())
}

fn run(path: &Path, options: VmOptions, dump: bool) -> Result<()> {
    let bytes = fs::read(path)
        .into_diagnostic()
        .wrap_err_with(|| format!("cannot read {}", path.display()))?;
    let module = BytecodeModule::from_bytes(&bytes).map_err(|e| {
        render_error(&e.into());
        miette!("could not load {}", path.display())
    })?;

    if dump {
        for function in module.functions() {
            println!("{function:?}");
        }
    }

    let mut vm = VM::new(module, options).map_err(|e| {
        render_error(&e.into());
        miette!("could not start {}", path.display())
    })?;
    let returned = vm.run().map_err(|e| {
        render_error(&Error::from(e));
        miette!("execution of {} failed", path.display())
    })?;
    for (i, value) in returned.iter().enumerate() {
        println!("[{i}] {value}");
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse_from(normalize_args(std::env::args()));

    // RUST_LOG controls the log level, WARN by default.
    use tracing_subscriber::{EnvFilter, fmt};
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let Mode {
        lex: tokens,
        assemble: build,
        run: execute,
    } = args.mode;
    if tokens {
        lex(&args.file)
    } else if build {
        assemble(&args.file, &args.output)
    } else if execute {
        let options = VmOptions::default()
            .with_max_stack_slots(args.max_stack)
            .with_max_call_depth(args.max_depth);
        run(&args.file, options, args.dump)
    } else {
        Err(miette!("one of --la, --as or --vm is required"))
    }
}
