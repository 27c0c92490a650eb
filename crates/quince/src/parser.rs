//! The LR(1) parse driver.

use crate::{
    grammar::{Grammar, SymbolID, Value},
    lexer::{RegexLexer, Token},
    lr1::{Automaton, StateID},
    parse_table::{Action, Conflict, ParseTable},
};
use indexmap::IndexMap;

/// A parser for one grammar: the augmented grammar plus its ACTION and GOTO
/// tables, built once and read-only afterwards. A `Parser` may be shared
/// across threads; each call to [`Parser::parse`] owns its own stacks and
/// borrows its own lexer.
#[derive(Debug)]
pub struct Parser<T> {
    grammar: Grammar<T>,
    table: ParseTable,
}

impl<T: 'static> Parser<T> {
    /// Run the construction phase for `grammar`. Conflicts resolved while
    /// populating ACTION never fail construction; they are available from
    /// [`Parser::conflicts`].
    pub fn new(grammar: Grammar<T>) -> Self {
        let automaton = Automaton::generate(&grammar);
        let table = ParseTable::generate(&grammar, &automaton);
        tracing::debug!(
            states = automaton.len(),
            conflicts = table.conflicts().len(),
            "parse tables constructed"
        );
        Self { grammar, table }
    }

    pub fn grammar(&self) -> &Grammar<T> {
        &self.grammar
    }

    pub fn table(&self) -> &ParseTable {
        &self.table
    }

    /// The conflicts observed during table construction.
    pub fn conflicts(&self) -> &[Conflict] {
        self.table.conflicts()
    }

    /// Parse `input`, pulling tokens from `lexer` and reducing bottom-up to
    /// the semantic value of the start symbol.
    pub fn parse(&self, lexer: &mut RegexLexer, input: &str) -> Result<Value<T>, ParseError> {
        lexer.set_input(input);

        // Token names resolve to the first terminal with that signature.
        let mut terminals: IndexMap<&str, SymbolID> = IndexMap::default();
        for id in self.grammar.terminals() {
            terminals
                .entry(self.grammar.symbol(id).name())
                .or_insert(id);
        }

        let mut states = vec![StateID::START];
        let mut values: Vec<Value<T>> = Vec::new();

        let mut token = lexer.next_token();
        let mut current = resolve(&terminals, &token)?;

        loop {
            let state = *states.last().unwrap();
            let Some(action) = self.table.action(state, current) else {
                return Err(self.syntax_error(lexer, state, &token));
            };

            match action {
                Action::Shift(next) => {
                    tracing::trace!("shift `{}` into state {}", token.value, next);
                    states.push(next);
                    values.push(Value::Token(token));
                    token = lexer.next_token();
                    current = resolve(&terminals, &token)?;
                }

                Action::Reduce(id) => {
                    let production = self.grammar.production(id);
                    tracing::trace!("reduce by {}", production.display(&self.grammar));

                    // An ε-body pops nothing; `split_off` keeps the children
                    // in left-to-right body order.
                    let arity = production.body().len();
                    states.truncate(states.len() - arity);
                    let children = values.split_off(values.len() - arity);

                    let top = *states.last().unwrap();
                    let Some(next) = self.table.goto(top, production.head()) else {
                        return Err(self.syntax_error(lexer, top, &token));
                    };
                    states.push(next);

                    values.push(match production.callback() {
                        Some(callback) => callback(children),
                        None => Value::List(children),
                    });
                }

                Action::Accept => {
                    tracing::trace!("accept");
                    return Ok(values.pop().expect("accept follows a goto on start"));
                }
            }
        }
    }

    fn syntax_error(&self, lexer: &RegexLexer, state: StateID, token: &Token) -> ParseError {
        let (line, column) = lexer.current_position();
        let expected = self
            .table
            .expected_terminals(state)
            .into_iter()
            .map(|id| self.grammar.symbol(id).name().to_owned())
            .collect();
        ParseError::Syntax {
            line,
            // The lexer points past the token; step back to its start.
            column: column.saturating_sub(token.value.chars().count()),
            expected,
            found: token.value.clone(),
        }
    }
}

fn resolve(terminals: &IndexMap<&str, SymbolID>, token: &Token) -> Result<SymbolID, ParseError> {
    if token.name == "$" {
        return Ok(SymbolID::EOI);
    }
    terminals
        .get(token.name.as_str())
        .copied()
        .ok_or_else(|| ParseError::UnknownToken {
            name: token.name.clone(),
            value: token.value.clone(),
        })
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("unknown token `{value}`: no terminal is named `{name}`")]
    UnknownToken { name: String, value: String },

    #[error(
        "syntax error at line {line}, column {column}: expected one of [{}], found `{found}`",
        .expected.join(", ")
    )]
    Syntax {
        line: usize,
        column: usize,
        expected: Vec<String>,
        found: String,
    },
}
