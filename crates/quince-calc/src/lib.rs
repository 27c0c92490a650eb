//! Sample arithmetic calculator driven by the quince parser generator.
//!
//! The grammar is the classic left-recursive one, so `-` and `/` associate
//! to the left:
//!
//! ```text
//! expr -> expr + term | expr - term | term
//! term -> term * fact | term / fact | fact
//! fact -> ( expr ) | number
//! ```

use quince::{Grammar, GrammarDefError, LexerError, ParseError, Parser, RegexLexer, Value};

/// Build the calculator parser. The callbacks evaluate on the way up, so a
/// successful parse *is* the evaluation.
pub fn calculator() -> Result<Parser<i64>, GrammarDefError> {
    fn int(value: Option<Value<i64>>) -> i64 {
        match value {
            Some(Value::User(n)) => n,
            value => unreachable!("operands evaluate to integers, got {:?}", value),
        }
    }

    fn binary(
        mut children: Vec<Value<i64>>,
        apply: impl Fn(i64, i64) -> i64,
    ) -> Value<i64> {
        let rhs = int(children.pop());
        children.pop();
        let lhs = int(children.pop());
        Value::User(apply(lhs, rhs))
    }

    fn passthrough(mut children: Vec<Value<i64>>) -> Value<i64> {
        children.pop().expect("pass-through bodies have one element")
    }

    let grammar = Grammar::define(|g| {
        let expr = g.nonterminal("expr");
        let term = g.nonterminal("term");
        let fact = g.nonterminal("fact");
        let plus = g.terminal("+");
        let minus = g.terminal("-");
        let star = g.terminal("*");
        let slash = g.terminal("/");
        let lparen = g.terminal("(");
        let rparen = g.terminal(")");
        let number = g.terminal("number");

        g.start_symbol(expr)?;

        g.rule_with(expr, [expr, plus, term], |c| binary(c, |l, r| l + r))?;
        g.rule_with(expr, [expr, minus, term], |c| binary(c, |l, r| l - r))?;
        g.rule_with(expr, [term], passthrough)?;

        g.rule_with(term, [term, star, fact], |c| binary(c, |l, r| l * r))?;
        g.rule_with(term, [term, slash, fact], |c| binary(c, |l, r| l / r))?;
        g.rule_with(term, [fact], passthrough)?;

        g.rule_with(fact, [lparen, expr, rparen], |mut children| {
            children.pop();
            let inner = children.pop().expect("parenthesized expression");
            children.pop();
            inner
        })?;
        g.rule_with(fact, [number], |mut children| {
            let token = match children.pop() {
                Some(Value::Token(token)) => token,
                value => unreachable!("fact body is a single terminal, got {:?}", value),
            };
            Value::User(token.value.parse().expect("number tokens are digits"))
        })?;

        Ok(())
    })?;

    Ok(Parser::new(grammar))
}

/// The token patterns the grammar's terminal signatures refer to.
pub fn lexer() -> Result<RegexLexer, LexerError> {
    let mut lexer = RegexLexer::new();
    lexer.add_pattern("+", r"\+")?;
    lexer.add_pattern("-", "-")?;
    lexer.add_pattern("*", r"\*")?;
    lexer.add_pattern("/", "/")?;
    lexer.add_pattern("(", r"\(")?;
    lexer.add_pattern(")", r"\)")?;
    lexer.add_pattern("number", r"\d+")?;
    Ok(lexer)
}

/// Evaluate one arithmetic expression.
pub fn eval(parser: &Parser<i64>, lexer: &mut RegexLexer, input: &str) -> Result<i64, ParseError> {
    tracing::debug!(input, "evaluating");
    match parser.parse(lexer, input)? {
        Value::User(n) => Ok(n),
        value => unreachable!("the calculator reduces to an integer, got {:?}", value),
    }
}
