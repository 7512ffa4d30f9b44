use super::lexer::*;
use utils::DiagnosticEmitter;

struct LexOutput {
    output: String,
    result: LexResult,
}

fn lex_string(source: &str) -> LexOutput {
    let mut diag = DiagnosticEmitter::log_to_buffer();
    let result = Lexer::new(source, &mut diag).lex_all();
    LexOutput {
        output: diag.out_buffer().unwrap() + &diag.err_buffer().unwrap(),
        result,
    }
}

fn to_token_values(tokens: &[Token]) -> Vec<TokenValue> {
    tokens.iter().map(|tok| tok.value).collect()
}

use TokenValue::*;

#[test]
fn test_empty_input() {
    let LexOutput { output, result } = lex_string("");
    assert_eq!(to_token_values(&result.tokens), vec![EndOfFile]);
    assert_eq!(output, "");

    let LexOutput { output, result } = lex_string("  \n\t\n");
    assert_eq!(to_token_values(&result.tokens), vec![EndOfFile]);
    assert_eq!(result.tokens[0].line_num, Location(3));
    assert_eq!(output, "");
}

#[test]
fn test_keywords_and_types() {
    let LexOutput { output, result } =
        lex_string("abstract class interface extends implements static field method var");
    let expected = vec![
        Abstract, Class, Interface, Extends, Implements, Static, Field, Method, Var, EndOfFile,
    ];
    assert_eq!(to_token_values(&result.tokens), expected);
    assert_eq!(output, "");

    let LexOutput { result, .. } =
        lex_string("int boolean byte short char long float double void");
    let expected = vec![
        Int, Boolean, Byte, Short, Char, Long, Float, Double, Void, EndOfFile,
    ];
    assert_eq!(to_token_values(&result.tokens), expected);

    let LexOutput { result, .. } = lex_string(
        "new if goto switch case default return nop staticinvoke specialinvoke virtualinvoke interfaceinvoke dynamicinvoke",
    );
    let expected = vec![
        New,
        If,
        Goto,
        Switch,
        Case,
        Default,
        Return,
        Nop,
        StaticInvoke,
        SpecialInvoke,
        VirtualInvoke,
        InterfaceInvoke,
        DynamicInvoke,
        EndOfFile,
    ];
    assert_eq!(to_token_values(&result.tokens), expected);
}

#[test]
fn test_operators() {
    let LexOutput { output, result } =
        lex_string("+ - * / % & | ^ << >> >>> == != < > <= >= = ( ) { } [ ] : ; , .");
    let expected = vec![
        Plus,
        Minus,
        Star,
        Slash,
        Percent,
        Amp,
        Pipe,
        Caret,
        Shl,
        Shr,
        Ushr,
        EqEq,
        NotEq,
        Less,
        Greater,
        LessEq,
        GreaterEq,
        Assign,
        LeftParen,
        RightParen,
        LeftBrace,
        RightBrace,
        LeftBracket,
        RightBracket,
        Colon,
        Semicolon,
        Comma,
        Dot,
        EndOfFile,
    ];
    assert_eq!(to_token_values(&result.tokens), expected);
    assert_eq!(output, "");
}

#[test]
fn test_identifiers_and_integers() {
    let LexOutput { output, result } = lex_string("x = 42; y$1 = -7; _z");
    let tokens = to_token_values(&result.tokens);
    let x = result.identifiers.lookup("x").unwrap();
    let y = result.identifiers.lookup("y$1").unwrap();
    let z = result.identifiers.lookup("_z").unwrap();
    let expected = vec![
        Ident(x),
        Assign,
        Integer(42),
        Semicolon,
        Ident(y),
        Assign,
        Integer(-7),
        Semicolon,
        Ident(z),
        EndOfFile,
    ];
    assert_eq!(tokens, expected);
    assert_eq!(output, "");

    // The same name is interned once.
    let LexOutput { result, .. } = lex_string("a a b");
    assert_eq!(result.tokens[0].value, result.tokens[1].value);
    assert_ne!(result.tokens[0].value, result.tokens[2].value);
}

#[test]
fn test_signatures() {
    let LexOutput { output, result } =
        lex_string("virtualinvoke a.<A: int foo(int, B)>(x); <init> <clinit>");
    assert_eq!(output, "");
    let tokens = &result.tokens;
    let Signature(sig) = tokens[3].value else {
        panic!("Signature expected, found {:?}", tokens[3].value);
    };
    assert_eq!(result.identifiers.get_name(sig), "A: int foo(int, B)");
    assert_eq!(tokens[4].value, LeftParen);

    let init = result.identifiers.lookup("<init>").unwrap();
    let clinit = result.identifiers.lookup("<clinit>").unwrap();
    assert_eq!(tokens[8].value, Ident(init));
    assert_eq!(tokens[9].value, Ident(clinit));

    // Without a colon this is a comparison.
    let LexOutput { result, .. } = lex_string("if a <b goto L;");
    let values = to_token_values(&result.tokens);
    assert_eq!(values[2], Less);
}

#[test]
fn test_comments_and_lines() {
    let source = r"# hash comment
x // line comment
/* block
comment */ y";
    let LexOutput { output, result } = lex_string(source);
    assert_eq!(output, "");
    assert_eq!(result.tokens.len(), 3);
    assert_eq!(result.tokens[0].line_num, Location(2));
    assert_eq!(result.tokens[1].line_num, Location(4));
}

#[test]
fn test_lex_errors() {
    let LexOutput { output, result } = lex_string("x = @;");
    assert!(result.tokens.is_empty());
    assert_eq!(output, "[line 1] Error: Unexpected token: '@'.\n");

    let LexOutput { output, .. } = lex_string("x = 99999999999;");
    assert_eq!(output, "[line 1] Error: Integer literal out of range.\n");

    let LexOutput { output, .. } = lex_string("x /* never closed");
    assert_eq!(output, "[line 1] Error: Multiline comment not closed.\n");

    let LexOutput { output, .. } = lex_string("x = \u{e9};");
    assert_eq!(output, "[line 1] Error: Only ASCII input is supported.\n");
}
