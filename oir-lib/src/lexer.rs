use std::collections::HashMap;

use utils::DiagnosticEmitter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Identifier(pub usize);

#[derive(Clone, Debug, Copy, Eq, PartialEq, Hash)]
pub struct Location(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenValue {
    Ident(Identifier),
    Integer(i32),
    /// The text between the angle brackets of `<C: T m(P1,P2)>`.
    Signature(Identifier),

    // Declarations
    Class,
    Interface,
    Abstract,
    Extends,
    Implements,
    Static,
    Field,
    Method,
    Var,

    // Statements
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

    // Builtin types
    Int,
    Boolean,
    Byte,
    Short,
    Char,
    Long,
    Float,
    Double,
    Void,

    // Arithmetic and bitwise operators
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

    // Comparisons
    EqEq,
    NotEq,
    Less,
    Greater,
    LessEq,
    GreaterEq,

    // Separators
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
}

use TokenValue::*;

fn keyword(ident: &str) -> Option<TokenValue> {
    let value = match ident {
        "class" => Class,
        "interface" => Interface,
        "abstract" => Abstract,
        "extends" => Extends,
        "implements" => Implements,
        "static" => Static,
        "field" => Field,
        "method" => Method,
        "var" => Var,
        "new" => New,
        "if" => If,
        "goto" => Goto,
        "switch" => Switch,
        "case" => Case,
        "default" => Default,
        "return" => Return,
        "nop" => Nop,
        "staticinvoke" => StaticInvoke,
        "specialinvoke" => SpecialInvoke,
        "virtualinvoke" => VirtualInvoke,
        "interfaceinvoke" => InterfaceInvoke,
        "dynamicinvoke" => DynamicInvoke,
        "int" => Int,
        "boolean" => Boolean,
        "byte" => Byte,
        "short" => Short,
        "char" => Char,
        "long" => Long,
        "float" => Float,
        "double" => Double,
        "void" => Void,
        _ => return None,
    };
    Some(value)
}

impl core::fmt::Display for TokenValue {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        let text = match *self {
            Ident(i) => return write!(f, "ident_{}", i.0),
            Integer(i) => return write!(f, "{i}"),
            Signature(i) => return write!(f, "signature_{}", i.0),

            Class => "class",
            Interface => "interface",
            Abstract => "abstract",
            Extends => "extends",
            Implements => "implements",
            Static => "static",
            Field => "field",
            Method => "method",
            Var => "var",

            New => "new",
            If => "if",
            Goto => "goto",
            Switch => "switch",
            Case => "case",
            Default => "default",
            Return => "return",
            Nop => "nop",
            StaticInvoke => "staticinvoke",
            SpecialInvoke => "specialinvoke",
            VirtualInvoke => "virtualinvoke",
            InterfaceInvoke => "interfaceinvoke",
            DynamicInvoke => "dynamicinvoke",

            Int => "int",
            Boolean => "boolean",
            Byte => "byte",
            Short => "short",
            Char => "char",
            Long => "long",
            Float => "float",
            Double => "double",
            Void => "void",

            Plus => "+",
            Minus => "-",
            Star => "*",
            Slash => "/",
            Percent => "%",
            Amp => "&",
            Pipe => "|",
            Caret => "^",
            Shl => "<<",
            Shr => ">>",
            Ushr => ">>>",

            EqEq => "==",
            NotEq => "!=",
            Less => "<",
            Greater => ">",
            LessEq => "<=",
            GreaterEq => ">=",

            Assign => "=",
            LeftParen => "(",
            RightParen => ")",
            LeftBrace => "{",
            RightBrace => "}",
            LeftBracket => "[",
            RightBracket => "]",
            Colon => ":",
            Semicolon => ";",
            Comma => ",",
            Dot => ".",

            EndOfFile => "END_OF_FILE",
        };
        write!(f, "{text}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub value: TokenValue,

    pub line_num: Location,
}

#[derive(Debug, Clone, Default)]
pub struct IdentifierTable {
    names: Vec<String>,
    index: HashMap<String, Identifier>,
}

impl IdentifierTable {
    pub fn lookup(&self, ident: &str) -> Option<Identifier> {
        self.index.get(ident).copied()
    }

    fn get_identifier(&mut self, ident: &str) -> Identifier {
        if let Some(id) = self.lookup(ident) {
            return id;
        }
        let id = Identifier(self.names.len());
        self.names.push(ident.to_owned());
        self.index.insert(ident.to_owned(), id);
        id
    }

    pub fn get_name(&self, id: Identifier) -> &str {
        &self.names[id.0]
    }

    /// The source text of a token, used in diagnostics.
    pub fn describe(&self, value: TokenValue) -> String {
        match value {
            Ident(id) => self.get_name(id).to_owned(),
            Signature(id) => format!("<{}>", self.get_name(id)),
            other => other.to_string(),
        }
    }
}

/// Names of initializers that are lexed as identifiers even though they
/// start with an angle bracket.
const SPECIAL_METHOD_NAMES: [&str; 2] = ["<init>", "<clinit>"];

pub struct Lexer<'src> {
    source: &'src str,
    start: usize,
    current: usize,
    line_num: u32,
    has_error: bool,
    diagnostic_emitter: &'src mut DiagnosticEmitter,
    identifiers: IdentifierTable,
}

#[derive(Debug, Clone, Default)]
pub struct LexResult {
    pub tokens: Vec<Token>,
    pub identifiers: IdentifierTable,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str, diagnostic_emitter: &'src mut DiagnosticEmitter) -> Self {
        Lexer {
            source,
            start: 0,
            current: 0,
            line_num: 1,
            has_error: false,
            diagnostic_emitter,
            identifiers: IdentifierTable::default(),
        }
    }

    /// Returns an empty token list after reporting the first lexical error.
    pub fn lex_all(mut self) -> LexResult {
        if !self.source.is_ascii() {
            self.diagnostic_emitter
                .error(self.line_num, "Only ASCII input is supported.");
            return LexResult::default();
        }

        let mut tokens = Vec::new();
        while !self.is_at_end() {
            if let Some(tok) = self.lex() {
                tokens.push(tok);
            } else if self.has_error {
                return LexResult::default();
            }
        }

        tokens.push(Token {
            value: EndOfFile,
            line_num: Location(self.line_num),
        });

        LexResult {
            tokens,
            identifiers: self.identifiers,
        }
    }

    fn token(&self, value: TokenValue) -> Option<Token> {
        Some(Token {
            value,
            line_num: Location(self.line_num),
        })
    }

    fn lex(&mut self) -> Option<Token> {
        loop {
            if self.is_at_end() {
                return None;
            }

            self.start = self.current;
            let value = match self.advance() {
                '(' => LeftParen,
                ')' => RightParen,
                '{' => LeftBrace,
                '}' => RightBrace,
                '[' => LeftBracket,
                ']' => RightBracket,
                ':' => Colon,
                ';' => Semicolon,
                ',' => Comma,
                '.' => Dot,
                '+' => Plus,
                '*' => Star,
                '%' => Percent,
                '&' => Amp,
                '|' => Pipe,
                '^' => Caret,
                '=' if self.match_char('=') => EqEq,
                '=' => Assign,
                '!' if self.match_char('=') => NotEq,
                '>' if self.match_char('=') => GreaterEq,
                '>' if self.match_char('>') => {
                    if self.match_char('>') {
                        Ushr
                    } else {
                        Shr
                    }
                }
                '>' => Greater,
                '<' => return self.lex_angle_bracket(),

                // Whitespace
                '\n' => {
                    self.line_num += 1;
                    continue;
                }
                ' ' | '\t' | '\r' => continue,

                // Comments
                '#' => {
                    self.skip_line();
                    continue;
                }
                '/' if self.match_char('/') => {
                    self.skip_line();
                    continue;
                }
                '/' if self.match_char('*') => {
                    self.skip_block_comment()?;
                    continue;
                }
                '/' => Slash,

                '-' if self.peek().is_ascii_digit() => return self.lex_number(),
                '-' => Minus,
                c if c.is_ascii_digit() => return self.lex_number(),
                c if c.is_ascii_alphabetic() || c == '_' => return self.lex_word(),
                _ => {
                    self.diagnostic_emitter.error(
                        self.line_num,
                        &format!(
                            "Unexpected token: '{}'.",
                            &self.source[self.start..self.current]
                        ),
                    );
                    self.has_error = true;
                    return None;
                }
            };
            return self.token(value);
        }
    }

    /// A `<` starts either an operator, an initializer name, or a method
    /// signature like `<A: void foo(int)>`.
    fn lex_angle_bracket(&mut self) -> Option<Token> {
        let rest = &self.source[self.start..];
        if let Some(name) = SPECIAL_METHOD_NAMES.iter().find(|n| rest.starts_with(**n)) {
            self.current = self.start + name.len();
            let id = self.identifiers.get_identifier(name);
            return self.token(Ident(id));
        }

        if self.peek().is_ascii_alphabetic() {
            if let Some(len) = signature_length(rest) {
                let text = &self.source[self.start + 1..self.start + len - 1];
                self.current = self.start + len;
                let id = self.identifiers.get_identifier(text.trim());
                return self.token(Signature(id));
            }
        }

        let value = if self.match_char('=') {
            LessEq
        } else if self.match_char('<') {
            Shl
        } else {
            Less
        };
        self.token(value)
    }

    fn lex_number(&mut self) -> Option<Token> {
        while self.peek().is_ascii_digit() {
            self.advance();
        }

        let Ok(value) = self.source[self.start..self.current].parse::<i32>() else {
            self.diagnostic_emitter
                .error(self.line_num, "Integer literal out of range.");
            self.has_error = true;
            return None;
        };
        self.token(Integer(value))
    }

    fn lex_word(&mut self) -> Option<Token> {
        while self.peek().is_ascii_alphanumeric() || matches!(self.peek(), '_' | '$') {
            self.advance();
        }

        let word = &self.source[self.start..self.current];
        let value = keyword(word).unwrap_or_else(|| Ident(self.identifiers.get_identifier(word)));
        self.token(value)
    }

    fn skip_line(&mut self) {
        while !self.is_at_end() && self.peek() != '\n' {
            self.advance();
        }
    }

    fn skip_block_comment(&mut self) -> Option<()> {
        loop {
            if self.is_at_end() {
                self.diagnostic_emitter
                    .error(self.line_num, "Multiline comment not closed.");
                self.has_error = true;
                return None;
            }
            match self.advance() {
                '\n' => self.line_num += 1,
                '*' if self.match_char('/') => return Some(()),
                _ => {}
            }
        }
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    fn peek(&self) -> char {
        self.source
            .as_bytes()
            .get(self.current)
            .map_or('\0', |&b| b as char)
    }

    fn advance(&mut self) -> char {
        let prev = self.peek();
        self.current += 1;
        prev
    }

    fn match_char(&mut self, expected: char) -> bool {
        if !self.is_at_end() && self.peek() == expected {
            self.current += 1;
            true
        } else {
            false
        }
    }
}

/// The length of a balanced `<...>` prefix of `text` that contains a colon
/// and stays on a single statement. Nested brackets come from initializer
/// names like `<init>`.
fn signature_length(text: &str) -> Option<usize> {
    let mut depth = 0;
    let mut has_colon = false;
    for (pos, c) in text.char_indices() {
        match c {
            '<' => depth += 1,
            '>' => {
                depth -= 1;
                if depth == 0 {
                    return has_colon.then_some(pos + 1);
                }
            }
            ':' => has_colon = true,
            ';' | '\n' | '{' | '}' | '=' => return None,
            _ => {}
        }
    }
    None
}
