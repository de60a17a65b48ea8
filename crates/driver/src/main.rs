//! Demo CLI: builds a small reactive graph with [`GraphBuilder`], compiles
//! it to bytecode, and either prints a summary or writes a `.kjb` container.

use clap::Parser as ClapParser;
use sigflow_core::builder::GraphBuilder;
use sigflow_core::context::CompileFlags;
use sigflow_core::node::{DriverId, Uid};
use sigflow_core::reactive::ReactiveAnalysis;
use sigflow_core::types::{Scalar, Type};
use sigflow_driver::{Backend, Compiler};
use std::path::PathBuf;

#[derive(ClapParser)]
#[command(name = "sigflow")]
#[command(about = "sigflow — reactive signal-processing compiler driver")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Compile the built-in identity demo graph and print a summary.
    Demo,
    /// Compile the built-in identity demo graph to a `.kjb` file.
    Compile {
        #[arg(short, long)]
        output: PathBuf,
    },
    Version,
}

fn main() {
    env_logger::init();
    if let Err(e) = run() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Demo => {
            let program = compile_identity_demo()?;
            println!("compiled {} instructions across {} function(s)", program.main.instructions.len(), program.functions.len() + 1);
            Ok(())
        }
        Commands::Compile { output } => {
            let program = compile_identity_demo()?;
            let file = std::fs::File::create(&output).map_err(|e| format!("creating {}: {e}", output.display()))?;
            let mut writer = std::io::BufWriter::new(file);
            sigflow_backend_bytecode::write_kjb(&mut writer, &program).map_err(|e| format!("writing {}: {e}", output.display()))?;
            Ok(())
        }
        Commands::Version => {
            println!("sigflow {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// `f(x) = x` through one `RingBuffer` — scenario S1, "Identity" (§8).
fn compile_identity_demo() -> Result<sigflow_backend_bytecode::CompiledProgram, String> {
    let mut builder = GraphBuilder::new();
    let arg = builder.arg(Type::Scalar(Scalar::F32));
    let root = builder.ring_buffer(1, arg);
    let mut nodes = builder.nodes;

    let analysis = ReactiveAnalysis::new();
    let arg_rx = analysis.leaf();

    let mut compiler = Compiler::create_context(CompileFlags::default());
    compiler.register_driver(DriverId(Uid(0)), "default");

    match compiler
        .make(Backend::Bytecode, &mut nodes, root, arg_rx)
        .map_err(|e| e.to_string())?
    {
        sigflow_driver::CompiledClass::Bytecode(program) => Ok(program),
        sigflow_driver::CompiledClass::Native { .. } => unreachable!("bytecode backend was requested"),
    }
}
