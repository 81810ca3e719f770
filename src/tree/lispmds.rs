use std::fmt;

use crate::error::{ChartError, Result};

/// A LISPMDS save file must begin with this form.
pub const WINDOW_FORM: &str = "MAKE-MASTER-MDS-WINDOW";

// ---------------------------------------------------------------------------
// Sexp – the Lisp-like value tree
// ---------------------------------------------------------------------------

/// Minimal symbolic-expression tree covering the subset of Lisp syntax the
/// LISPMDS save format uses.
#[derive(Debug, Clone, PartialEq)]
pub enum Sexp {
    Nil,
    Bool(bool),
    Number(f64),
    String(String),
    Symbol(String),
    Keyword(String),
    List(Vec<Sexp>),
}

impl Sexp {
    pub fn as_list(&self) -> Result<&[Sexp]> {
        match self {
            Sexp::List(items) => Ok(items),
            other => Err(ChartError::Parse(format!("expected list, found {other}"))),
        }
    }

    /// Text of a String or Symbol leaf.
    pub fn as_text(&self) -> Result<&str> {
        match self {
            Sexp::String(s) | Sexp::Symbol(s) => Ok(s),
            other => Err(ChartError::Parse(format!(
                "expected string or symbol, found {other}"
            ))),
        }
    }
}

impl fmt::Display for Sexp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sexp::Nil => write!(f, "NIL"),
            Sexp::Bool(b) => write!(f, "{}", if *b { "T" } else { "NIL" }),
            Sexp::Number(n) => write!(f, "{n}"),
            Sexp::String(s) => write!(f, "{s:?}"),
            Sexp::Symbol(s) => write!(f, "{s}"),
            Sexp::Keyword(k) => write!(f, ":{k}"),
            Sexp::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Keyword lookup
// ---------------------------------------------------------------------------

/// Find the value following a `:keyword` leaf in `list`, if present.
/// Keywords compare case-insensitively (Lisp readers upcase bare symbols).
pub fn keyword_value_opt<'a>(list: &'a [Sexp], keyword: &str) -> Option<&'a Sexp> {
    list.iter()
        .position(|item| matches!(item, Sexp::Keyword(k) if k.eq_ignore_ascii_case(keyword)))
        .and_then(|pos| list.get(pos + 1))
}

/// Like [`keyword_value_opt`] but an absent keyword, or a keyword with no
/// following value, is a parse error.
pub fn keyword_value<'a>(list: &'a [Sexp], keyword: &str) -> Result<&'a Sexp> {
    keyword_value_opt(list, keyword)
        .ok_or_else(|| ChartError::Parse(format!("keyword :{keyword} not found")))
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq)]
enum Token {
    Open,
    Close,
    Atom(Sexp),
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
}

impl Lexer {
    fn new(src: &str) -> Self {
        Lexer {
            chars: src.chars().collect(),
            pos: 0,
        }
    }

    fn next_token(&mut self) -> Result<Option<Token>> {
        loop {
            match self.chars.get(self.pos) {
                None => return Ok(None),
                Some(c) if c.is_whitespace() => self.pos += 1,
                // line comment
                Some(';') => {
                    while !matches!(self.chars.get(self.pos), None | Some('\n')) {
                        self.pos += 1;
                    }
                }
                // quote markers carry no structure here
                Some('\'') | Some('`') => self.pos += 1,
                Some('(') => {
                    self.pos += 1;
                    return Ok(Some(Token::Open));
                }
                Some(')') => {
                    self.pos += 1;
                    return Ok(Some(Token::Close));
                }
                Some('"') => return self.quoted_string().map(Some),
                Some('|') => return self.barred_symbol().map(Some),
                Some(':') => {
                    self.pos += 1;
                    let word = self.bare_token();
                    return Ok(Some(Token::Atom(Sexp::Keyword(word))));
                }
                Some(_) => {
                    let word = self.bare_token();
                    return Ok(Some(Token::Atom(classify_bare(&word))));
                }
            }
        }
    }

    fn quoted_string(&mut self) -> Result<Token> {
        let start = self.pos;
        self.pos += 1;
        let mut out = String::new();
        loop {
            match self.chars.get(self.pos) {
                None => {
                    return Err(ChartError::Parse(format!(
                        "unterminated string starting at offset {start}"
                    )))
                }
                Some('"') => {
                    self.pos += 1;
                    return Ok(Token::Atom(Sexp::String(out)));
                }
                Some('\\') => {
                    if let Some(&next) = self.chars.get(self.pos + 1) {
                        out.push(next);
                        self.pos += 2;
                    } else {
                        self.pos += 1;
                    }
                }
                Some(&c) => {
                    out.push(c);
                    self.pos += 1;
                }
            }
        }
    }

    fn barred_symbol(&mut self) -> Result<Token> {
        let start = self.pos;
        self.pos += 1;
        let mut out = String::new();
        loop {
            match self.chars.get(self.pos) {
                None => {
                    return Err(ChartError::Parse(format!(
                        "unterminated |symbol| starting at offset {start}"
                    )))
                }
                Some('|') => {
                    self.pos += 1;
                    return Ok(Token::Atom(Sexp::Symbol(out)));
                }
                Some(&c) => {
                    out.push(c);
                    self.pos += 1;
                }
            }
        }
    }

    fn bare_token(&mut self) -> String {
        let start = self.pos;
        while let Some(&c) = self.chars.get(self.pos) {
            if c.is_whitespace() || matches!(c, '(' | ')' | ';' | '"') {
                break;
            }
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    /// The last few characters before the current position, for error
    /// messages.
    fn context(&self) -> String {
        let end = self.pos.min(self.chars.len());
        let start = end.saturating_sub(40);
        self.chars[start..end].iter().collect()
    }
}

/// Numbers (with Lisp `D`/`d` exponent markers normalised to `e`), NIL, T,
/// everything else a bare symbol.
fn classify_bare(word: &str) -> Sexp {
    if word.eq_ignore_ascii_case("nil") {
        return Sexp::Nil;
    }
    if word.eq_ignore_ascii_case("t") {
        return Sexp::Bool(true);
    }
    if word.starts_with(|c: char| c.is_ascii_digit() || c == '-' || c == '+' || c == '.') {
        let normalised: String = word
            .chars()
            .map(|c| if c == 'D' || c == 'd' { 'e' } else { c })
            .collect();
        if let Ok(n) = normalised.parse::<f64>() {
            return Sexp::Number(n);
        }
    }
    Sexp::Symbol(word.to_string())
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Parse a LISPMDS save file into its top-level `(MAKE-MASTER-MDS-WINDOW …)`
/// list. Fails on unbalanced parentheses or a different leading form.
pub fn parse(text: &str) -> Result<Sexp> {
    let mut lexer = Lexer::new(text);
    // stack of open lists; the bottom collects finished top-level forms
    let mut stack: Vec<Vec<Sexp>> = vec![Vec::new()];

    while let Some(token) = lexer.next_token()? {
        match token {
            Token::Open => stack.push(Vec::new()),
            Token::Close => {
                if stack.len() == 1 {
                    return Err(ChartError::Parse(format!(
                        "unbalanced `)` near …{}",
                        lexer.context()
                    )));
                }
                let done = stack.pop().unwrap_or_default();
                if let Some(top) = stack.last_mut() {
                    top.push(Sexp::List(done));
                }
            }
            Token::Atom(atom) => {
                if let Some(top) = stack.last_mut() {
                    top.push(atom);
                }
            }
        }
    }

    if stack.len() != 1 {
        return Err(ChartError::Parse(format!(
            "unbalanced parentheses: {} list(s) still open at end of input",
            stack.len() - 1
        )));
    }

    let window = stack
        .into_iter()
        .next()
        .and_then(|forms| forms.into_iter().next())
        .ok_or_else(|| ChartError::Parse("empty LISPMDS input".into()))?;

    match &window {
        Sexp::List(items)
            if matches!(items.first(), Some(Sexp::Symbol(name)) if name.eq_ignore_ascii_case(WINDOW_FORM)) =>
        {
            Ok(window)
        }
        _ => Err(ChartError::Parse(format!(
            "LISPMDS input does not begin with ({WINDOW_FORM}"
        ))),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
