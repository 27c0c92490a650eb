//! ACTION and GOTO table construction.

use crate::{
    grammar::{Grammar, ProductionID, SymbolID},
    lr1::{Automaton, StateID},
};
use indexmap::IndexMap;
use std::fmt;

/// The move the driver makes on a `(state, terminal)` pair. Absent cells
/// mean a syntax error.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Action {
    Shift(StateID),
    Reduce(ProductionID),
    Accept,
}

/// A conflict found while populating ACTION, resolved per the table's
/// policy and kept for the caller to inspect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub state: StateID,
    pub symbol: SymbolID,
    pub kind: ConflictKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictKind {
    /// Shift/reduce: the shift was kept, the reduction discarded.
    ShiftReduce {
        shift: StateID,
        reduce: ProductionID,
    },
    /// Reduce/reduce: the first-written reduction was kept.
    ReduceReduce {
        kept: ProductionID,
        discarded: ProductionID,
    },
}

/// The ACTION and GOTO tables of one grammar, plus every conflict observed
/// while they were populated. Conflicts never abort construction; they are
/// reported here so the caller decides how loud to be about them.
#[derive(Debug)]
pub struct ParseTable {
    actions: IndexMap<StateID, IndexMap<SymbolID, Action>>,
    gotos: IndexMap<StateID, IndexMap<SymbolID, StateID>>,
    conflicts: Vec<Conflict>,
}

impl ParseTable {
    pub fn generate<T>(grammar: &Grammar<T>, automaton: &Automaton) -> Self {
        let mut table = Self {
            actions: automaton
                .states()
                .map(|(id, _)| (id, IndexMap::default()))
                .collect(),
            gotos: automaton
                .states()
                .map(|(id, _)| (id, IndexMap::default()))
                .collect(),
            conflicts: Vec::new(),
        };

        for (id, state) in automaton.states() {
            // Edges over terminals shift; edges over nonterminals go to GOTO.
            for (symbol, target) in state.edges() {
                if grammar.symbol(symbol).is_terminal() {
                    table.set_action(grammar, id, symbol, Action::Shift(target));
                } else {
                    table.gotos[&id].insert(symbol, target);
                }
            }

            // Complete items reduce on their lookahead; the complete
            // augmented item accepts on `$`.
            for item in state.items() {
                let production = grammar.production(item.production);
                if item.dot < production.body().len() {
                    continue;
                }
                if item.production == ProductionID::ACCEPT {
                    if item.lookahead == SymbolID::EOI {
                        table.set_action(grammar, id, SymbolID::EOI, Action::Accept);
                    }
                } else {
                    table.set_action(
                        grammar,
                        id,
                        item.lookahead,
                        Action::Reduce(item.production),
                    );
                }
            }
        }

        table
    }

    /// Write one ACTION cell. Empty cells take any write; shift/reduce
    /// collisions keep the shift, reduce/reduce collisions keep the first
    /// reduction written. Either way the conflict is recorded.
    fn set_action<T>(
        &mut self,
        grammar: &Grammar<T>,
        state: StateID,
        symbol: SymbolID,
        action: Action,
    ) {
        let row = &mut self.actions[&state];
        let existing = row.get(&symbol).copied();
        let kind = match (existing, action) {
            (None, action) => {
                row.insert(symbol, action);
                return;
            }
            (Some(Action::Reduce(reduce)), Action::Shift(shift)) => {
                row.insert(symbol, action);
                ConflictKind::ShiftReduce { shift, reduce }
            }
            (Some(Action::Shift(shift)), Action::Reduce(reduce)) => {
                ConflictKind::ShiftReduce { shift, reduce }
            }
            (Some(Action::Reduce(kept)), Action::Reduce(discarded)) if kept != discarded => {
                ConflictKind::ReduceReduce { kept, discarded }
            }
            _ => return,
        };

        tracing::warn!(
            "conflict at state {} on `{}`: {}",
            state,
            grammar.symbol(symbol).name(),
            match &kind {
                ConflictKind::ShiftReduce { reduce, .. } => format!(
                    "preferring shift over `{}`",
                    grammar.production(*reduce).display(grammar)
                ),
                ConflictKind::ReduceReduce { discarded, .. } => format!(
                    "keeping the first reduction, dropping `{}`",
                    grammar.production(*discarded).display(grammar)
                ),
            }
        );
        self.conflicts.push(Conflict {
            state,
            symbol,
            kind,
        });
    }

    pub fn action(&self, state: StateID, terminal: SymbolID) -> Option<Action> {
        self.actions.get(&state)?.get(&terminal).copied()
    }

    pub fn goto(&self, state: StateID, nonterminal: SymbolID) -> Option<StateID> {
        self.gotos.get(&state)?.get(&nonterminal).copied()
    }

    /// The terminals with a defined ACTION in this state, in table order.
    /// This is the expected-token set reported on a syntax error.
    pub fn expected_terminals(&self, state: StateID) -> Vec<SymbolID> {
        self.actions
            .get(&state)
            .map(|row| row.keys().copied().collect())
            .unwrap_or_default()
    }

    pub fn conflicts(&self) -> &[Conflict] {
        &self.conflicts
    }

    pub fn display<'g, T>(&'g self, grammar: &'g Grammar<T>) -> impl fmt::Display + 'g {
        ParseTableDisplay {
            grammar,
            table: self,
        }
    }
}

struct ParseTableDisplay<'g, T> {
    grammar: &'g Grammar<T>,
    table: &'g ParseTable,
}

impl<T> fmt::Display for ParseTableDisplay<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self { grammar, table } = self;
        for (state, row) in &table.actions {
            writeln!(f, "#### State {:02}", state)?;
            for (symbol, action) in row {
                let name = grammar.symbol(*symbol).name();
                match action {
                    Action::Shift(next) => writeln!(f, "- {} => shift({:02})", name, next)?,
                    Action::Reduce(production) => writeln!(
                        f,
                        "- {} => reduce({})",
                        name,
                        grammar.production(*production).display(grammar)
                    )?,
                    Action::Accept => writeln!(f, "- {} => accept", name)?,
                }
            }
            for (symbol, next) in &table.gotos[state] {
                writeln!(
                    f,
                    "- {} => goto({:02})",
                    grammar.symbol(*symbol).name(),
                    next
                )?;
            }
        }
        Ok(())
    }
}
