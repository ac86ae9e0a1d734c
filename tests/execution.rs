//! End-to-end execution tests
//!
//! Each test drives the whole pipeline (parse, check, lower, JIT) and
//! observes the program through `main`'s return value.

use inkwell::context::Context;
use pynext::codegen::{jit, CodeGen};
use pynext::parser;
use pynext::sema::TypeChecker;

fn run_program(source: &str) -> i64 {
    let mut program = parser::parse(source).expect("parse failed");

    let mut checker = TypeChecker::new();
    let errors = checker.check(&mut program);
    assert!(errors.is_empty(), "unexpected diagnostics: {:?}", errors);

    let context = Context::create();
    let mut codegen = CodeGen::new(&context, "e2e");
    codegen.generate(&program);

    jit::run(&codegen).expect("jit execution failed")
}

#[test]
fn arithmetic_with_precedence() {
    let result = run_program("def main() -> int return 1 + 2 end");
    assert_eq!(result, 3);

    let result = run_program("def main() -> int return 2 + 3 * 4 end");
    assert_eq!(result, 14);

    let result = run_program("def main() -> int return (2 + 3) * 4 end");
    assert_eq!(result, 20);

    let result = run_program("def main() -> int return 7 - 10 / 2 end");
    assert_eq!(result, 2);
}

#[test]
fn recursive_fibonacci() {
    let result = run_program(
        "def fib(n: int) -> int\n\
         if n < 2\n\
         return n\n\
         end\n\
         return fib(n-1) + fib(n-2)\n\
         end\n\
         def main() -> int return fib(10) end",
    );
    assert_eq!(result, 55);
}

#[test]
fn while_loop_accumulates() {
    let result = run_program(
        "def main() -> int\n\
         var i: int = 0\n\
         var s: int = 0\n\
         while i < 5\n\
         s = s + i\n\
         i = i + 1\n\
         end\n\
         return s\n\
         end",
    );
    assert_eq!(result, 10);
}

#[test]
fn struct_member_assignment() {
    let result = run_program(
        "struct Point x: int y: int end\n\
         def main() -> int\n\
         var p: Point\n\
         p.x = 3\n\
         p.y = 4\n\
         return p.x + p.y\n\
         end",
    );
    assert_eq!(result, 7);
}

#[test]
fn nested_struct_members() {
    let result = run_program(
        "struct Inner v: int end\n\
         struct Outer inner: Inner extra: int end\n\
         def main() -> int\n\
         var o: Outer\n\
         o.inner.v = 40\n\
         o.extra = 2\n\
         return o.inner.v + o.extra\n\
         end",
    );
    assert_eq!(result, 42);
}

#[test]
fn heap_array_literal_indexing() {
    let result = run_program(
        "def main() -> int\n\
         var a: int[] = [10, 20, 30]\n\
         return a[0] + a[2]\n\
         end",
    );
    assert_eq!(result, 40);
}

#[test]
fn array_element_assignment() {
    let result = run_program(
        "def main() -> int\n\
         var a: int[] = [1, 2, 3]\n\
         a[1] = 40\n\
         return a[0] + a[1] + a[2]\n\
         end",
    );
    assert_eq!(result, 44);
}

#[test]
fn array_field_of_struct() {
    // A struct field holding an array pointer: the member load yields the
    // pointer and indexing GEPs through it
    let result = run_program(
        "struct Holder items: int[] end\n\
         def main() -> int\n\
         var h: Holder\n\
         h.items = [5, 6, 7]\n\
         return h.items[0] + h.items[2]\n\
         end",
    );
    assert_eq!(result, 12);
}

#[test]
fn implicit_entry_runs_top_level_statements() {
    // No user main: the top-level code is the program
    let result = run_program("return 2 + 3 * 4");
    assert_eq!(result, 14);
}

#[test]
fn implicit_entry_returns_zero_without_explicit_return() {
    let result = run_program("var x = 1\nx = x + 1");
    assert_eq!(result, 0);
}

#[test]
fn top_level_mixes_with_function_calls() {
    let result = run_program(
        "def triple(n: int) -> int return n * 3 end\n\
         return triple(4) + 2",
    );
    assert_eq!(result, 14);
}

#[test]
fn comparisons_widen_in_conditions() {
    // `if` over an i64 condition compares against zero
    let result = run_program(
        "def pick(flag: int) -> int\n\
         if flag return 10 end\n\
         return 20\n\
         end\n\
         def main() -> int return pick(1) + pick(0) end",
    );
    assert_eq!(result, 30);
}

#[test]
fn if_else_branches() {
    let result = run_program(
        "def step(x: int) -> int\n\
         if x > 5 return 1 else return 0 end\n\
         end\n\
         def main() -> int return step(9) + step(3) end",
    );
    assert_eq!(result, 1);
}

#[test]
fn bool_literals_in_conditions() {
    let result = run_program(
        "def main() -> int\n\
         var r: int = 0\n\
         if true r = r + 1 end\n\
         if false r = r + 10 end\n\
         return r\n\
         end",
    );
    assert_eq!(result, 1);
}

#[test]
fn equality_operators() {
    let result = run_program(
        "def main() -> int\n\
         var r: int = 0\n\
         if 3 == 3 r = r + 1 end\n\
         if 3 != 4 r = r + 2 end\n\
         if 4 < 3 r = r + 100 end\n\
         return r\n\
         end",
    );
    assert_eq!(result, 3);
}

#[test]
fn assignment_chains_through_values() {
    let result = run_program(
        "def main() -> int\n\
         var a: int = 0\n\
         var b: int = 0\n\
         a = b = 21\n\
         return a + b\n\
         end",
    );
    assert_eq!(result, 42);
}

#[test]
fn print_hooks_are_callable_without_extern() {
    // Exercises the lazily declared host ABI end to end
    let result = run_program(
        "def main() -> int\n\
         print_int(3)\n\
         print_string(\"ok\")\n\
         return 0\n\
         end",
    );
    assert_eq!(result, 0);
}

#[test]
fn explicit_extern_prototype_still_works() {
    let result = run_program(
        "extern def print_int(val: int)\n\
         def main() -> int\n\
         print_int(55)\n\
         return 55\n\
         end",
    );
    assert_eq!(result, 55);
}

#[test]
fn module_shape_matches_entry_contract() {
    // The module contains `main` iff the user did not declare one;
    // otherwise both the user's `main` and `__init`
    let mut program = parser::parse("print_int(1)").unwrap();
    TypeChecker::new().check(&mut program);
    let context = Context::create();
    let mut codegen = CodeGen::new(&context, "shape");
    codegen.generate(&program);
    assert!(codegen.module().get_function("main").is_some());
    assert!(codegen.module().get_function("__init").is_none());

    let mut program = parser::parse("var x = 1\ndef main() print_int(x) end").unwrap();
    TypeChecker::new().check(&mut program);
    let context = Context::create();
    let mut codegen = CodeGen::new(&context, "shape");
    codegen.generate(&program);
    assert!(codegen.module().get_function("main").is_some());
    assert!(codegen.module().get_function("__init").is_some());
}
