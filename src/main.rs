//! Driver for poking at the middle tier without a front end attached: lowers
//! a small built-in module, prints diagnostics and (optionally) the MIR, and
//! can evaluate one of the lowered functions.

use clap::Parser;
use colored::Colorize;

use tarnc::{
    diagnostics::{DiagnosticEngine, codes},
    intern::InternedSymbol,
    interp::{EvalSettings, Interpreter, value::Value},
    middle::mir::{hir_lowering, pretty_print},
};

mod showcase;

#[derive(Parser)]
#[command(version, about = "Tarn compiler middle tier driver", long_about = None)]
struct Args {
    /// Print the lowered MIR for every function in the unit
    #[arg(long)]
    dump_mir: bool,

    /// Evaluate the named function after lowering
    #[arg(long)]
    eval: Option<String>,

    /// Comma-separated integer arguments for --eval
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    args: Vec<i64>,

    /// Abort evaluation after this many executed instructions
    #[arg(long)]
    budget: Option<u64>,

    /// Maximum call depth during evaluation
    #[arg(long, default_value_t = 256)]
    depth_limit: usize,
}

fn main() -> std::process::ExitCode {
    env_logger::init();

    let args = Args::parse();

    let module = showcase::module();
    let diagnostics = DiagnosticEngine::new();
    let unit = hir_lowering::lower_module(&module, &diagnostics);

    let failed = diagnostics.has_errors();

    for diagnostic in diagnostics.drain() {
        let severity = match diagnostic.severity {
            tarnc::diagnostics::Severity::Error => diagnostic.severity.to_string().red().bold(),
            tarnc::diagnostics::Severity::Warning => {
                diagnostic.severity.to_string().yellow().bold()
            }
            tarnc::diagnostics::Severity::Note => diagnostic.severity.to_string().cyan().bold(),
        };

        eprintln!("{severity}[{}]: {}", diagnostic.code, diagnostic.message);
    }

    if args.dump_mir {
        print!("{}", pretty_print::pretty_print_unit(&unit, &module.adts));
    }

    if let Some(name) = &args.eval {
        let Some(entry) = unit.function_id(InternedSymbol::new(name)) else {
            eprintln!("{}: no function named `{name}` in the unit", "error".red().bold());
            return std::process::ExitCode::FAILURE;
        };

        let settings = EvalSettings {
            instruction_budget: args.budget,
            max_depth: args.depth_limit,
        };

        let arguments = args.args.iter().copied().map(Value::Int).collect();

        match Interpreter::new(&unit, settings).evaluate(entry, arguments) {
            Ok(value) => println!("{name} = {value}"),
            Err(trap) => {
                eprintln!(
                    "{}[{}]: {trap}",
                    "error".red().bold(),
                    codes::EVALUATION_TRAP
                );
                return std::process::ExitCode::FAILURE;
            }
        }
    }

    if failed {
        return std::process::ExitCode::FAILURE;
    }

    std::process::ExitCode::SUCCESS
}
