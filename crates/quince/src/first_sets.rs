//! FIRST and nullable analysis.

use crate::grammar::{Grammar, SymbolID};
use indexmap::{IndexMap, IndexSet};

/// FIRST sets over every symbol of an augmented grammar, computed once by
/// iterating to a fixpoint. The fixpoint discipline is what keeps the
/// computation total on left-recursive grammars.
#[derive(Debug)]
pub struct FirstSets {
    nulls: IndexSet<SymbolID>,
    first: IndexMap<SymbolID, IndexSet<SymbolID>>,
}

impl FirstSets {
    pub fn new<T>(grammar: &Grammar<T>) -> Self {
        let nulls = nulls_set(grammar);
        let first = first_map(grammar, &nulls);
        Self { nulls, first }
    }

    /// Whether `symbol` derives the empty string.
    pub fn nullable(&self, symbol: SymbolID) -> bool {
        self.nulls.contains(&symbol)
    }

    /// `First(X)`, with ε included iff `X` is nullable.
    pub fn first_of(&self, symbol: SymbolID) -> IndexSet<SymbolID> {
        let mut set = self.first.get(&symbol).cloned().unwrap_or_default();
        if self.nulls.contains(&symbol) {
            set.insert(SymbolID::EPSILON);
        }
        set
    }

    /// `First(prefix a)` for a symbol string followed by a concrete
    /// lookahead: scan left to right, stop at the first non-nullable symbol.
    pub fn first_of_string(&self, prefix: &[SymbolID], lookahead: SymbolID) -> IndexSet<SymbolID> {
        let mut set = IndexSet::default();
        for symbol in prefix.iter().chain(Some(&lookahead)) {
            let first = self.first.get(symbol).expect("unregistered symbol");
            set.extend(first.iter().copied());
            if !self.nulls.contains(symbol) {
                break;
            }
        }
        set
    }
}

/// Calculate the set of nullable symbols in this grammar.
fn nulls_set<T>(grammar: &Grammar<T>) -> IndexSet<SymbolID> {
    // ε is trivially nullable; heads of ε-productions follow from the start.
    let mut nulls: IndexSet<SymbolID> = Some(SymbolID::EPSILON)
        .into_iter()
        .chain(
            grammar
                .productions()
                .filter_map(|(_, p)| p.body().is_empty().then_some(p.head())),
        )
        .collect();

    // Propagate until no head changes.
    let mut changed = true;
    while changed {
        changed = false;
        for (_, production) in grammar.productions() {
            if nulls.contains(&production.head()) {
                continue;
            }
            if production.body().iter().all(|s| nulls.contains(s)) {
                nulls.insert(production.head());
                changed = true;
            }
        }
    }

    nulls
}

fn first_map<T>(
    grammar: &Grammar<T>,
    nulls: &IndexSet<SymbolID>,
) -> IndexMap<SymbolID, IndexSet<SymbolID>> {
    let mut map: IndexMap<SymbolID, IndexSet<SymbolID>> = IndexMap::default();

    // First(t) = {t} for terminal symbols, `$` included.
    map.insert(SymbolID::EOI, Some(SymbolID::EOI).into_iter().collect());
    for id in grammar.terminals() {
        map.insert(id, Some(id).into_iter().collect());
    }
    for id in grammar.nonterminals() {
        map.insert(id, IndexSet::default());
    }

    // For a production X -> Y1 Y2 ... Yn, First(X) ⊇ First(Yi) holds for
    // every Yi up to and including the first non-nullable symbol.
    #[derive(Debug)]
    struct Constraint {
        sup: SymbolID,
        sub: SymbolID,
    }
    let mut constraints = vec![];
    for (_, production) in grammar.productions() {
        for symbol in production.body() {
            if *symbol != production.head() {
                constraints.push(Constraint {
                    sup: production.head(),
                    sub: *symbol,
                });
            }
            if !nulls.contains(symbol) {
                break;
            }
        }
    }

    // Resolve the constraints by propagation until no set grows.
    let mut changed = true;
    while changed {
        changed = false;

        for Constraint { sup, sub } in &constraints {
            let mut superset = map.swap_remove(sup).unwrap();
            let subset = map.get(sub).unwrap();

            for tok in subset {
                if !superset.contains(tok) {
                    superset.insert(*tok);
                    changed = true;
                }
            }

            map.insert(*sup, superset);
        }
    }

    map
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Arith {
        grammar: Grammar<()>,
        expr: SymbolID,
        term: SymbolID,
        fact: SymbolID,
        lparen: SymbolID,
        number: SymbolID,
    }

    fn arithmetic() -> Arith {
        let mut ids = None;
        let grammar = Grammar::define(|g| {
            let expr = g.nonterminal("expr");
            let term = g.nonterminal("term");
            let fact = g.nonterminal("fact");
            let plus = g.terminal("+");
            let star = g.terminal("*");
            let lparen = g.terminal("(");
            let rparen = g.terminal(")");
            let number = g.terminal("number");

            g.rule(expr, [expr, plus, term])?;
            g.rule(expr, [term])?;
            g.rule(term, [term, star, fact])?;
            g.rule(term, [fact])?;
            g.rule(fact, [lparen, expr, rparen])?;
            g.rule(fact, [number])?;

            ids = Some((expr, term, fact, lparen, number));
            Ok(())
        })
        .unwrap();
        let (expr, term, fact, lparen, number) = ids.unwrap();
        Arith {
            grammar,
            expr,
            term,
            fact,
            lparen,
            number,
        }
    }

    #[test]
    fn first_of_terminal_is_itself() {
        let arith = arithmetic();
        let first = FirstSets::new(&arith.grammar);
        let set = first.first_of(arith.number);
        assert_eq!(set.len(), 1);
        assert!(set.contains(&arith.number));
    }

    #[test]
    fn first_of_epsilon_is_epsilon() {
        let arith = arithmetic();
        let first = FirstSets::new(&arith.grammar);
        assert!(first.nullable(SymbolID::EPSILON));
        let set = first.first_of(SymbolID::EPSILON);
        assert_eq!(set.len(), 1);
        assert!(set.contains(&SymbolID::EPSILON));
    }

    #[test]
    fn left_recursion_terminates() {
        // `expr` and `term` are left-recursive; the fixpoint must still
        // settle on First = { (, number }.
        let arith = arithmetic();
        let first = FirstSets::new(&arith.grammar);
        for symbol in [arith.expr, arith.term, arith.fact] {
            let set = first.first_of(symbol);
            assert_eq!(set.len(), 2, "First({})", arith.grammar.symbol(symbol).name());
            assert!(set.contains(&arith.lparen));
            assert!(set.contains(&arith.number));
        }
    }

    #[test]
    fn nullability_propagates_through_chains() {
        let mut ids = None;
        let grammar: Grammar<()> = Grammar::define(|g| {
            let s = g.nonterminal("s");
            let a = g.nonterminal("a");
            let b = g.nonterminal("b");
            let x = g.terminal("x");
            g.rule(s, [a, b])?;
            g.rule(a, [])?;
            g.rule(b, [a])?;
            g.rule(b, [x])?;
            ids = Some((s, a, b, x));
            Ok(())
        })
        .unwrap();
        let (s, a, b, x) = ids.unwrap();

        let first = FirstSets::new(&grammar);
        assert!(first.nullable(a));
        assert!(first.nullable(b));
        assert!(first.nullable(s));

        // ε appears in first_of exactly for the nullable symbols.
        assert!(first.first_of(s).contains(&SymbolID::EPSILON));
        assert!(!first.first_of(x).contains(&SymbolID::EPSILON));
        assert!(first.first_of(s).contains(&x));
    }

    #[test]
    fn first_of_string_stops_at_non_nullable() {
        let mut ids = None;
        let grammar: Grammar<()> = Grammar::define(|g| {
            let s = g.nonterminal("s");
            let opt = g.nonterminal("opt");
            let x = g.terminal("x");
            let y = g.terminal("y");
            g.rule(s, [opt, x])?;
            g.rule(opt, [])?;
            g.rule(opt, [y])?;
            ids = Some((opt, x, y));
            Ok(())
        })
        .unwrap();
        let (opt, x, y) = ids.unwrap();

        let first = FirstSets::new(&grammar);

        // opt is nullable, so the scan reaches `x` but not the lookahead.
        let set = first.first_of_string(&[opt, x], SymbolID::EOI);
        assert!(set.contains(&x));
        assert!(set.contains(&y));
        assert!(!set.contains(&SymbolID::EOI));

        // An all-nullable prefix lets the lookahead through.
        let set = first.first_of_string(&[opt], SymbolID::EOI);
        assert!(set.contains(&SymbolID::EOI));
    }
}
