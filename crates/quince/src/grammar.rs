//! Grammar types.

use crate::lexer::Token;
use indexmap::{IndexMap, IndexSet};
use std::{borrow::Cow, fmt};

const SYMBOL_ID_OFFSET: u64 = 0x4;
const PRODUCTION_ID_OFFSET: u64 = 0x4;

/// A semantic value travelling on the parse stack.
///
/// Shifted terminals enter the stack as [`Value::Token`]. A reduction
/// replaces the values of the body symbols with whatever the production's
/// callback returns, or with a [`Value::List`] of the children when no
/// callback was registered. `T` is the caller-chosen semantic domain.
#[derive(Debug, PartialEq)]
pub enum Value<T> {
    Token(Token),
    List(Vec<Value<T>>),
    User(T),
}

/// A reduction callback: the semantic values of the body symbols in
/// left-to-right order, mapped to the value of the head.
pub type ReduceFn<T> = dyn Fn(Vec<Value<T>>) -> Value<T> + Send + Sync;

#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct SymbolID {
    raw: u64,
}

impl SymbolID {
    /// Reserved symbol standing for an absent body element.
    pub const EPSILON: Self = Self::new(0);
    /// Reserved terminal symbol that means the end of input.
    pub const EOI: Self = Self::new(1);
    /// Reserved nonterminal `S'` introduced by augmentation.
    pub const ACCEPT: Self = Self::new(2);

    #[inline]
    const fn new(raw: u64) -> Self {
        Self { raw }
    }
}

impl fmt::Debug for SymbolID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for SymbolID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            &Self::EPSILON => write!(f, "ε"),
            &Self::EOI => write!(f, "$"),
            &Self::ACCEPT => write!(f, "S'"),
            Self { raw } => write!(f, "SymbolID({})", raw),
        }
    }
}

/// The classification of a grammar symbol.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SymbolKind {
    Terminal,
    Nonterminal,
    /// The ε singleton.
    Empty,
    /// The `$` singleton.
    EndOfInput,
}

/// A named grammar symbol. Symbols compare by [`SymbolID`], never by name;
/// registering the same name twice yields two distinct symbols.
#[derive(Debug)]
pub struct Symbol {
    name: Cow<'static, str>,
    kind: SymbolKind,
}

impl Symbol {
    const EPSILON: Self = Self {
        name: Cow::Borrowed("ε"),
        kind: SymbolKind::Empty,
    };
    const EOI: Self = Self {
        name: Cow::Borrowed("$"),
        kind: SymbolKind::EndOfInput,
    };
    const ACCEPT: Self = Self {
        name: Cow::Borrowed("S'"),
        kind: SymbolKind::Nonterminal,
    };

    /// The display name; for terminals this is the lexer pattern name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> SymbolKind {
        self.kind
    }

    /// Whether this symbol may appear as a lookahead, `$` included.
    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, SymbolKind::Terminal | SymbolKind::EndOfInput)
    }

    pub fn is_nonterminal(&self) -> bool {
        matches!(self.kind, SymbolKind::Nonterminal)
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ProductionID {
    raw: u64,
}

impl ProductionID {
    /// Reserved ID of the augmented production `S' -> start`.
    pub const ACCEPT: Self = Self::new(0);

    #[inline]
    const fn new(raw: u64) -> Self {
        Self { raw }
    }
}

impl fmt::Debug for ProductionID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for ProductionID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            &Self::ACCEPT => write!(f, "accept"),
            Self { raw } => fmt::Display::fmt(raw, f),
        }
    }
}

/// A production rule with an optional reduction callback.
pub struct Production<T> {
    head: SymbolID,
    body: Vec<SymbolID>,
    callback: Option<Box<ReduceFn<T>>>,
}

impl<T> Production<T> {
    pub fn head(&self) -> SymbolID {
        self.head
    }

    /// The body symbols. An ε-body is stored as the empty slice.
    pub fn body(&self) -> &[SymbolID] {
        &self.body
    }

    pub(crate) fn callback(&self) -> Option<&ReduceFn<T>> {
        self.callback.as_deref()
    }

    pub fn display<'g>(&'g self, grammar: &'g Grammar<T>) -> impl fmt::Display + 'g {
        ProductionDisplay {
            grammar,
            production: self,
        }
    }
}

impl<T> fmt::Debug for Production<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Production")
            .field("head", &self.head)
            .field("body", &self.body)
            .field("callback", &self.callback.as_ref().map(|_| ".."))
            .finish()
    }
}

struct ProductionDisplay<'g, T> {
    grammar: &'g Grammar<T>,
    production: &'g Production<T>,
}

impl<T> fmt::Display for ProductionDisplay<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            grammar,
            production,
        } = self;
        write!(f, "{} ->", grammar.symbol(production.head).name())?;
        if production.body.is_empty() {
            f.write_str(" ε")?;
        }
        for symbol in &production.body {
            write!(f, " {}", grammar.symbol(*symbol).name())?;
        }
        Ok(())
    }
}

/// The grammar definition used to derive the parser tables.
///
/// Built through [`Grammar::define`]; the finished grammar is already
/// augmented with `S' -> start` and is read-only from then on.
#[derive(Debug)]
pub struct Grammar<T> {
    symbols: IndexMap<SymbolID, Symbol>,
    productions: IndexMap<ProductionID, Production<T>>,
    start: SymbolID,
    accept_production: Production<T>,
}

impl<T> Grammar<T> {
    /// Define a grammar using the specified function.
    pub fn define<F>(f: F) -> Result<Self, GrammarDefError>
    where
        T: 'static,
        F: FnOnce(&mut GrammarDef<T>) -> Result<(), GrammarDefError>,
    {
        let mut def = GrammarDef {
            symbols: IndexMap::default(),
            productions: IndexMap::default(),
            start: None,
            next_symbol_id: SYMBOL_ID_OFFSET,
            next_production_id: PRODUCTION_ID_OFFSET,
        };

        f(&mut def)?;

        def.end()
    }

    /// The start symbol of the unaugmented grammar.
    pub fn start_symbol(&self) -> SymbolID {
        self.start
    }

    pub fn symbol(&self, id: SymbolID) -> &Symbol {
        match id {
            SymbolID::EPSILON => &Symbol::EPSILON,
            SymbolID::EOI => &Symbol::EOI,
            SymbolID::ACCEPT => &Symbol::ACCEPT,
            id => &self.symbols[&id],
        }
    }

    pub fn production(&self, id: ProductionID) -> &Production<T> {
        match id {
            ProductionID::ACCEPT => &self.accept_production,
            id => &self.productions[&id],
        }
    }

    /// All productions of the augmented grammar, the accept production first.
    pub fn productions(&self) -> impl Iterator<Item = (ProductionID, &Production<T>)> + '_ {
        Some((ProductionID::ACCEPT, &self.accept_production))
            .into_iter()
            .chain(self.productions.iter().map(|(id, p)| (*id, p)))
    }

    pub fn productions_of(
        &self,
        head: SymbolID,
    ) -> impl Iterator<Item = (ProductionID, &Production<T>)> + '_ {
        self.productions().filter(move |(_, p)| p.head == head)
    }

    /// The bodies of every production with this head.
    pub fn body_sets_of(&self, head: SymbolID) -> Vec<&[SymbolID]> {
        self.productions_of(head).map(|(_, p)| p.body()).collect()
    }

    /// The unique production matching head and body element-wise. A `[ε]`
    /// body matches a production with an empty body.
    pub fn production_of(&self, head: SymbolID, body: &[SymbolID]) -> Option<ProductionID> {
        let body: &[SymbolID] = if matches!(body, [SymbolID::EPSILON]) {
            &[]
        } else {
            body
        };
        self.productions()
            .find_map(|(id, p)| (p.head == head && p.body() == body).then_some(id))
    }

    /// The symbols appearing in any production, head or body, in order of
    /// first appearance.
    pub fn symbols(&self) -> IndexSet<SymbolID> {
        let mut set = IndexSet::default();
        for (_, production) in self.productions() {
            set.insert(production.head);
            set.extend(production.body.iter().copied());
        }
        set
    }

    pub fn terminals(&self) -> IndexSet<SymbolID> {
        self.symbols()
            .into_iter()
            .filter(|id| self.symbol(*id).is_terminal())
            .collect()
    }

    pub fn nonterminals(&self) -> IndexSet<SymbolID> {
        self.symbols()
            .into_iter()
            .filter(|id| self.symbol(*id).is_nonterminal())
            .collect()
    }
}

impl<T> fmt::Display for Grammar<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "terminals: ")?;
        for (i, sym) in self.terminals().iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", self.symbol(*sym).name())?;
        }
        write!(f, "\nnonterminals: ")?;
        for (i, sym) in self.nonterminals().iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", self.symbol(*sym).name())?;
        }
        writeln!(f, "\nstart: {}", self.symbol(self.start).name())?;
        writeln!(f, "productions:")?;
        for (id, production) in self.productions() {
            writeln!(f, "  [{:02}] {}", id, production.display(self))?;
        }
        Ok(())
    }
}

/// The contextual values for building a [`Grammar`].
pub struct GrammarDef<T> {
    symbols: IndexMap<SymbolID, Symbol>,
    productions: IndexMap<ProductionID, Production<T>>,
    start: Option<SymbolID>,
    next_symbol_id: u64,
    next_production_id: u64,
}

impl<T> GrammarDef<T> {
    fn add_symbol(&mut self, name: Cow<'static, str>, kind: SymbolKind) -> SymbolID {
        let id = SymbolID::new(self.next_symbol_id);
        self.next_symbol_id += 1;
        self.symbols.insert(id, Symbol { name, kind });
        id
    }

    /// Register a terminal symbol. The name links the symbol to the lexer
    /// pattern with the same name.
    pub fn terminal(&mut self, name: impl Into<Cow<'static, str>>) -> SymbolID {
        self.add_symbol(name.into(), SymbolKind::Terminal)
    }

    /// Register a nonterminal symbol.
    pub fn nonterminal(&mut self, name: impl Into<Cow<'static, str>>) -> SymbolID {
        self.add_symbol(name.into(), SymbolKind::Nonterminal)
    }

    /// Append a production without a callback. Its reductions push the
    /// collected child values as a [`Value::List`].
    pub fn rule<I>(&mut self, head: SymbolID, body: I) -> Result<ProductionID, GrammarDefError>
    where
        I: IntoIterator<Item = SymbolID>,
    {
        self.add_production(head, body.into_iter().collect(), None)
    }

    /// Append a production whose reductions push `callback(children)`.
    pub fn rule_with<I, F>(
        &mut self,
        head: SymbolID,
        body: I,
        callback: F,
    ) -> Result<ProductionID, GrammarDefError>
    where
        I: IntoIterator<Item = SymbolID>,
        F: Fn(Vec<Value<T>>) -> Value<T> + Send + Sync + 'static,
    {
        self.add_production(head, body.into_iter().collect(), Some(Box::new(callback)))
    }

    fn add_production(
        &mut self,
        head: SymbolID,
        mut body: Vec<SymbolID>,
        callback: Option<Box<ReduceFn<T>>>,
    ) -> Result<ProductionID, GrammarDefError> {
        if self
            .symbols
            .get(&head)
            .map_or(true, |sym| !sym.is_nonterminal())
        {
            return Err(GrammarDefError::NonterminalHeadRequired);
        }

        // A sole ε is the explicit spelling of the empty body.
        if matches!(body.as_slice(), [SymbolID::EPSILON]) {
            body.clear();
        }
        for symbol in &body {
            if *symbol == SymbolID::EPSILON {
                return Err(GrammarDefError::MisplacedEpsilon);
            }
            if !self.symbols.contains_key(symbol) {
                return Err(GrammarDefError::UnknownSymbol);
            }
        }

        let id = ProductionID::new(self.next_production_id);
        self.next_production_id += 1;
        self.productions.insert(
            id,
            Production {
                head,
                body,
                callback,
            },
        );

        Ok(id)
    }

    /// Select the start symbol. Defaults to the first registered nonterminal.
    pub fn start_symbol(&mut self, symbol: SymbolID) -> Result<(), GrammarDefError> {
        if self
            .symbols
            .get(&symbol)
            .map_or(true, |sym| !sym.is_nonterminal())
        {
            return Err(GrammarDefError::InvalidStartSymbol);
        }
        self.start.replace(symbol);
        Ok(())
    }

    fn end(mut self) -> Result<Grammar<T>, GrammarDefError>
    where
        T: 'static,
    {
        let start = match self.start.take() {
            Some(start) => start,
            None => self
                .symbols
                .iter()
                .find_map(|(id, sym)| sym.is_nonterminal().then_some(*id))
                .ok_or(GrammarDefError::NoStartSymbol)?,
        };

        let grammar = Grammar {
            symbols: self.symbols,
            productions: self.productions,
            start,
            accept_production: Production {
                head: SymbolID::ACCEPT,
                body: vec![start],
                callback: Some(Box::new(|mut children: Vec<Value<T>>| {
                    children.pop().expect("the augmented body has one element")
                })),
            },
        };

        // Every nonterminal reachable from a body must be derivable.
        for (_, production) in grammar.productions() {
            for symbol in production.body() {
                if grammar.symbol(*symbol).is_nonterminal()
                    && grammar.productions_of(*symbol).next().is_none()
                {
                    return Err(GrammarDefError::MissingProductions {
                        name: grammar.symbol(*symbol).name().to_owned(),
                    });
                }
            }
        }

        Ok(grammar)
    }
}

impl<T> fmt::Debug for GrammarDef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GrammarDef")
            .field("symbols", &self.symbols)
            .field("start", &self.start)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GrammarDefError {
    #[error("rule heads must be registered nonterminals")]
    NonterminalHeadRequired,

    #[error("rule bodies may only use registered symbols")]
    UnknownSymbol,

    #[error("ε is only allowed as the sole body element")]
    MisplacedEpsilon,

    #[error("the start symbol must be a registered nonterminal")]
    InvalidStartSymbol,

    #[error("the grammar registers no nonterminal to start from")]
    NoStartSymbol,

    #[error("nonterminal `{name}` appears in a body but has no productions")]
    MissingProductions { name: String },
}
