//! PyNext Compiler CLI
//!
//! `pynext <file>` compiles and JIT-executes a source file's `main`;
//! `pynext test` does the same for a built-in sample program.

use clap::Parser;
use inkwell::context::Context;
use pynext::codegen::{jit, CodeGen};
use pynext::{lexer, parser, sema};
use std::fs;
use std::path::Path;

#[derive(Parser)]
#[command(name = "pynext")]
#[command(version = pynext::VERSION)]
#[command(about = "The PyNext compiler", long_about = None)]
struct Cli {
    /// Source file to compile and run, or "test" for the built-in sample
    #[arg(value_name = "FILE")]
    input: String,

    /// Emit tokens (for debugging)
    #[arg(long)]
    emit_tokens: bool,

    /// Emit AST (for debugging)
    #[arg(long)]
    emit_ast: bool,

    /// Emit LLVM IR (for debugging)
    #[arg(long)]
    emit_llvm: bool,
}

const SAMPLE: &str = r#"
extern def print_int(val: int)

def fib(n: int) -> int
    if n < 2
        return n
    end
    return fib(n-1) + fib(n-2)
end

def main()
    print_int(fib(10))
end
"#;

fn main() -> miette::Result<()> {
    let cli = Cli::parse();

    let (source, module_name) = if cli.input == "test" {
        (SAMPLE.to_string(), "test".to_string())
    } else {
        let source = fs::read_to_string(&cli.input)
            .map_err(|err| miette::miette!("Failed to read file '{}': {}", cli.input, err))?;
        let module_name = Path::new(&cli.input)
            .file_stem()
            .unwrap_or_default()
            .to_string_lossy()
            .into_owned();
        (source, module_name)
    };

    execute(&source, &module_name, &cli)
}

fn execute(source: &str, module_name: &str, cli: &Cli) -> miette::Result<()> {
    if cli.emit_tokens {
        for token in lexer::lex(source) {
            println!(
                "{:>4}:{:<3} {:12} {:?}",
                token.line,
                token.column,
                format!("{:?}", token.kind),
                token.text(source)
            );
        }
    }

    // A syntax error is fatal
    let mut program =
        parser::parse(source).map_err(|err| miette::miette!("Parse error: {}", err))?;

    if cli.emit_ast {
        println!("{:#?}", program);
    }

    // Semantic diagnostics are reported but do not stop the pipeline;
    // unresolved expressions degrade during code generation
    let mut checker = sema::TypeChecker::new();
    for diagnostic in checker.check(&mut program) {
        eprintln!("Type error: {}", diagnostic);
    }

    let context = Context::create();
    let mut codegen = CodeGen::new(&context, module_name);
    codegen.generate(&program);

    if cli.emit_llvm {
        println!("{}", codegen.module().print_to_string().to_string());
    }

    jit::run(&codegen).map_err(|err| miette::miette!("{}", err))?;
    Ok(())
}
