/// Structured-value trees recovered from the legacy text formats.
///
/// ```text
///  ACE text   ──────────────────────► serde_json::Value
///  ACD1 text  ──► acd1 rewrite ─────► serde_json::Value
///  LISPMDS    ──► lispmds parser ───► Sexp
/// ```
///
/// ACE payloads are already standard JSON; ACD1 is a Python dict literal
/// rewritten into JSON in one pass; LISPMDS is a parenthesized symbolic
/// expression with its own minimal lexer/parser.

pub mod acd1;
pub mod lispmds;
