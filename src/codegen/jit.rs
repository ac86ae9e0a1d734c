//! JIT execution and the host runtime ABI
//!
//! The generated module may reference three host symbols: `print_int` and
//! `print_string` (defined here and mapped into the engine explicitly) and
//! `malloc` (resolved from the process after loading visible symbols).

use inkwell::support::load_visible_symbols;
use inkwell::targets::{InitializationConfig, Target};
use inkwell::OptimizationLevel;
use std::ffi::CStr;
use std::io::Write;
use std::os::raw::c_char;
use thiserror::Error;

use crate::codegen::CodeGen;

#[derive(Error, Debug)]
pub enum JitError {
    #[error("module verification failed: {0}")]
    Verify(String),

    #[error("failed to create execution engine: {0}")]
    Engine(String),

    #[error("function 'main' not found in module")]
    MissingMain,
}

/// Host hook for `print_int`
pub extern "C" fn print_int(value: i64) {
    println!("Output: {}", value);
    let _ = std::io::stdout().flush();
}

/// Host hook for `print_string`. The argument must be NUL-terminated;
/// generated string literals always are.
pub extern "C" fn print_string(value: *const c_char) {
    let text = unsafe { CStr::from_ptr(value) };
    println!("Output: {}", text.to_string_lossy());
    let _ = std::io::stdout().flush();
}

/// Verify the module, JIT it, and run `main`. Returns `main`'s result as
/// a 64-bit integer (0-like garbage for a void user `main`).
pub fn run(codegen: &CodeGen) -> Result<i64, JitError> {
    let module = codegen.module();
    module
        .verify()
        .map_err(|err| JitError::Verify(err.to_string()))?;

    Target::initialize_native(&InitializationConfig::default()).map_err(JitError::Engine)?;
    // Make libc (malloc) resolvable from the host process
    load_visible_symbols();

    let engine = module
        .create_jit_execution_engine(OptimizationLevel::None)
        .map_err(|err| JitError::Engine(err.to_string()))?;

    if let Some(function) = module.get_function("print_int") {
        engine.add_global_mapping(&function, print_int as usize);
    }
    if let Some(function) = module.get_function("print_string") {
        engine.add_global_mapping(&function, print_string as usize);
    }

    let main = module.get_function("main").ok_or(JitError::MissingMain)?;
    let result = unsafe { engine.run_function(main, &[]) };
    Ok(result.as_int(true) as i64)
}
