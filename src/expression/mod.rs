//! Restricted scalar expression grammar.
//!
//! The grammar is a subset of WGSL expressions (arithmetic, parentheses, math built-ins, `pi`).
//! The host device compiles field and conversion expressions with it, and the optional
//! structural check runs it before any device build.

mod ast;
mod bytecode;
mod error;
mod lexer;
mod parser;
mod vm;

pub use bytecode::{ScalarProgram, compile_scalar, compile_vec3};
pub use error::ExprError;
pub use vm::VmError;

/// Check a field and conversion pair, returning rendered diagnostics for every failure.
pub fn check_surface_expressions(
    field: &str,
    field_vars: &[&str],
    conversion: &str,
    conversion_vars: &[&str],
) -> Result<(), String> {
    let mut diagnostics = Vec::new();
    if let Err(e) = compile_scalar(field, field_vars) {
        diagnostics.push(e.render("field", field));
    }
    if let Err(e) = compile_vec3(conversion, conversion_vars) {
        diagnostics.push(e.render("conversion", conversion));
    }
    if diagnostics.is_empty() {
        Ok(())
    } else {
        Err(diagnostics.join("\n"))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/expression/compile.rs"]
mod tests;
