//! The harness-owned restricted scripting language candidate solutions are
//! written in (SPEC_FULL.md §4.B'). A small, dynamically-typed,
//! Python-flavored language: function defs, control flow, a fixed table of
//! built-in list/dict/str methods, `raise`-able exception constructors, and
//! a static import allow-list check — standing in for embedding a real
//! interpreter, which is out of scope.

pub mod ast;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod stdlib;
pub mod value;

use ast::{Program, Stmt};

/// Collects every top-level and nested `import` module name referenced by a
/// program, for the static allow-list check performed before execution.
pub fn collect_imports(program: &Program) -> Vec<String> {
    let mut modules = Vec::new();
    collect_in_block(&program.statements, &mut modules);
    modules
}

fn collect_in_block(stmts: &[Stmt], out: &mut Vec<String>) {
    for stmt in stmts {
        match stmt {
            Stmt::Import { module } => out.push(module.split('.').next().unwrap_or(module).to_string()),
            Stmt::FunctionDef { body, .. } => collect_in_block(body, out),
            Stmt::If { branches, orelse } => {
                for (_, body) in branches {
                    collect_in_block(body, out);
                }
                collect_in_block(orelse, out);
            }
            Stmt::For { body, .. } => collect_in_block(body, out),
            Stmt::While { body, .. } => collect_in_block(body, out),
            _ => {}
        }
    }
}
