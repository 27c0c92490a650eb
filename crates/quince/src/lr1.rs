//! The LR(1) item machine: closure, GOTO, and the canonical collection.

use crate::{
    first_sets::FirstSets,
    grammar::{Grammar, ProductionID, SymbolID},
};
use indexmap::IndexMap;
use std::{
    collections::{BTreeSet, VecDeque},
    fmt,
};

/// An LR(1) item `A -> α · β, a`: a production, a dot position, and a
/// single-terminal lookahead. Items compare structurally on all fields.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Item {
    pub production: ProductionID,
    pub dot: usize,
    pub lookahead: SymbolID,
}

impl Item {
    pub fn display<'g, T>(&self, grammar: &'g Grammar<T>) -> ItemDisplay<'g, T> {
        ItemDisplay {
            grammar,
            item: *self,
        }
    }
}

pub struct ItemDisplay<'g, T> {
    grammar: &'g Grammar<T>,
    item: Item,
}

impl<T> fmt::Display for ItemDisplay<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self { grammar, item } = self;
        let production = grammar.production(item.production);
        write!(f, "{} ->", grammar.symbol(production.head()).name())?;
        for (i, symbol) in production.body().iter().enumerate() {
            if i == item.dot {
                f.write_str(" .")?;
            }
            write!(f, " {}", grammar.symbol(*symbol).name())?;
        }
        if item.dot == production.body().len() {
            f.write_str(" .")?;
        }
        write!(f, "  [{}]", grammar.symbol(item.lookahead).name())
    }
}

/// An unordered, duplicate-free collection of items. `BTreeSet` gives the
/// structural equality and hashing the canonical collection is keyed on.
pub type ItemSet = BTreeSet<Item>;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct StateID {
    raw: usize,
}

impl StateID {
    /// The state holding the closure of `[S' -> · start, $]`.
    pub const START: Self = Self { raw: 0 };

    const fn new(raw: usize) -> Self {
        Self { raw }
    }

    pub(crate) fn index(self) -> usize {
        self.raw
    }
}

impl fmt::Display for StateID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.raw, f)
    }
}

/// One member of the canonical collection: an item set plus the GOTO edges
/// leaving it, one per grammar symbol that appears after a dot.
#[derive(Debug)]
pub struct State {
    items: ItemSet,
    edges: IndexMap<SymbolID, StateID>,
}

impl State {
    pub fn items(&self) -> impl Iterator<Item = &Item> + '_ {
        self.items.iter()
    }

    pub fn edges(&self) -> impl Iterator<Item = (SymbolID, StateID)> + '_ {
        self.edges.iter().map(|(symbol, id)| (*symbol, *id))
    }

    /// The successor reached by crossing `symbol`, if any.
    pub fn edge(&self, symbol: SymbolID) -> Option<StateID> {
        self.edges.get(&symbol).copied()
    }
}

/// The canonical collection of LR(1) item sets. The index of a set in the
/// collection is the state number used by the parse tables.
#[derive(Debug)]
pub struct Automaton {
    states: Vec<State>,
}

impl Automaton {
    pub fn generate<T>(grammar: &Grammar<T>) -> Self {
        let first_sets = FirstSets::new(grammar);

        let mut start = ItemSet::new();
        start.insert(Item {
            production: ProductionID::ACCEPT,
            dot: 0,
            lookahead: SymbolID::EOI,
        });
        closure(grammar, &first_sets, &mut start);

        // The collection is keyed by item-set content so membership tests
        // are hash lookups; the insertion index is the state number.
        let mut states: IndexMap<ItemSet, IndexMap<SymbolID, StateID>> = IndexMap::default();
        states.insert(start, IndexMap::default());

        let mut pending = VecDeque::from([StateID::START]);
        while let Some(id) = pending.pop_front() {
            let items = states
                .get_index(id.index())
                .map(|(items, _)| items.clone())
                .unwrap();

            let mut edges = IndexMap::default();
            for (symbol, mut kernel) in transitions(grammar, &items) {
                closure(grammar, &first_sets, &mut kernel);
                let next = match states.get_index_of(&kernel) {
                    Some(index) => StateID::new(index),
                    None => {
                        let next = StateID::new(states.len());
                        states.insert(kernel, IndexMap::default());
                        pending.push_back(next);
                        next
                    }
                };
                edges.insert(symbol, next);
            }
            *states.get_index_mut(id.index()).unwrap().1 = edges;
        }

        let states = states
            .into_iter()
            .map(|(items, edges)| State { items, edges })
            .collect();
        tracing::debug!("canonical LR(1) collection generated");
        Self { states }
    }

    pub fn states(&self) -> impl Iterator<Item = (StateID, &State)> + '_ {
        self.states
            .iter()
            .enumerate()
            .map(|(index, state)| (StateID::new(index), state))
    }

    pub fn state(&self, id: StateID) -> &State {
        &self.states[id.index()]
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn display<'g, T>(&'g self, grammar: &'g Grammar<T>) -> impl fmt::Display + 'g {
        AutomatonDisplay {
            grammar,
            automaton: self,
        }
    }
}

struct AutomatonDisplay<'g, T> {
    grammar: &'g Grammar<T>,
    automaton: &'g Automaton,
}

impl<T> fmt::Display for AutomatonDisplay<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self { grammar, automaton } = self;
        for (i, (id, state)) in automaton.states().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            writeln!(f, "#### State {:02}", id)?;
            writeln!(f, "## items")?;
            for item in state.items() {
                writeln!(f, "- {}", item.display(grammar))?;
            }
            writeln!(f, "## transitions")?;
            for (symbol, next) in state.edges() {
                writeln!(f, "- {} => {:02}", grammar.symbol(symbol).name(), next)?;
            }
        }
        Ok(())
    }
}

/// Expand `items` in place until the LR(1) closure rule adds nothing: for
/// every `A -> α · B β, a` with `B` nonterminal, every production of `B`
/// gains a fresh item for each lookahead in `First(β a)`.
fn closure<T>(grammar: &Grammar<T>, first_sets: &FirstSets, items: &mut ItemSet) {
    let mut changed = true;
    while changed {
        changed = false;

        let mut added = Vec::new();
        for item in items.iter() {
            let production = grammar.production(item.production);

            // [A -> α · B β, a] where B is a nonterminal
            let (b, beta) = match &production.body()[item.dot..] {
                [b, beta @ ..] if grammar.symbol(*b).is_nonterminal() => (*b, beta),
                _ => continue,
            };

            let lookaheads = first_sets.first_of_string(beta, item.lookahead);
            for (id, _) in grammar.productions_of(b) {
                for lookahead in &lookaheads {
                    added.push(Item {
                        production: id,
                        dot: 0,
                        lookahead: *lookahead,
                    });
                }
            }
        }

        for item in added {
            changed |= items.insert(item);
        }
    }
}

/// Group the dot-advanced kernels of `items` by the symbol crossed. Closing
/// a kernel yields `goto(items, symbol)`; symbols that never appear after a
/// dot simply have no entry.
fn transitions<T>(grammar: &Grammar<T>, items: &ItemSet) -> IndexMap<SymbolID, ItemSet> {
    let mut next: IndexMap<SymbolID, ItemSet> = IndexMap::default();
    for item in items {
        let body = grammar.production(item.production).body();
        let Some(label) = body.get(item.dot) else {
            // The dot has reached the end; the item has no successor.
            continue;
        };
        next.entry(*label).or_default().insert(Item {
            dot: item.dot + 1,
            ..*item
        });
    }
    next
}
