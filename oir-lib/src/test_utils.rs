use utils::DiagnosticEmitter;

use crate::{
    ir::{MethodId, Program, StmtRef, VarId},
    lexer::Lexer,
    parser::Parser,
};

/// Parse a program, returning the diagnostics on failure.
pub fn parse_string(source: &str) -> Result<Program, String> {
    let mut diag = DiagnosticEmitter::log_to_buffer();
    let lexed = Lexer::new(source, &mut diag).lex_all();
    let program = if lexed.tokens.is_empty() {
        None
    } else {
        Parser::new(lexed, &mut diag).parse()
    };
    program.ok_or_else(|| diag.out_buffer().unwrap() + &diag.err_buffer().unwrap())
}

pub fn parse(source: &str) -> Program {
    parse_string(source).unwrap_or_else(|err| panic!("Failed to parse:\n{err}"))
}

pub fn method(program: &Program, signature: &str) -> MethodId {
    program
        .method_by_signature(signature)
        .unwrap_or_else(|| panic!("No method {signature}"))
}

pub fn stmt(program: &Program, signature: &str, index: usize) -> StmtRef {
    StmtRef {
        method: method(program, signature),
        index,
    }
}

/// A variable of a method, looked up by name.
pub fn var(program: &Program, signature: &str, name: &str) -> VarId {
    let method = method(program, signature);
    program
        .method(method)
        .vars
        .iter()
        .copied()
        .find(|&v| program.var_name(v) == name)
        .unwrap_or_else(|| panic!("No variable {name} in {signature}"))
}
