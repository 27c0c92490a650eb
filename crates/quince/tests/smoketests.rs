use quince::{
    grammar::{Grammar, GrammarDef, Value},
    lexer::RegexLexer,
    parser::Parser,
};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// A little statement language exercising ε-bodies, nested callbacks and the
// dangling-else shift preference end to end.
//
//   block -> stmt block | ε
//   stmt  -> if cond then stmt
//          | if cond then stmt else stmt
//          | print cond ;
#[derive(Debug, PartialEq)]
enum Stmt {
    If(Box<Stmt>, Option<Box<Stmt>>),
    Print(String),
}

fn stmt_parser() -> Parser<Vec<Stmt>> {
    fn stmt(value: Value<Vec<Stmt>>) -> Box<Stmt> {
        match value {
            Value::User(mut stmts) => {
                assert_eq!(stmts.len(), 1);
                Box::new(stmts.pop().unwrap())
            }
            _ => unreachable!("stmt reductions produce a single statement"),
        }
    }

    let grammar = Grammar::define(|g: &mut GrammarDef<Vec<Stmt>>| {
        let block = g.nonterminal("block");
        let stmt_n = g.nonterminal("stmt");
        let t_if = g.terminal("if");
        let t_then = g.terminal("then");
        let t_else = g.terminal("else");
        let t_print = g.terminal("print");
        let t_semi = g.terminal(";");
        let cond = g.terminal("cond");

        g.start_symbol(block)?;

        g.rule_with(block, [stmt_n, block], |mut children| {
            let rest = match children.pop() {
                Some(Value::User(rest)) => rest,
                _ => unreachable!(),
            };
            let mut stmts = match children.pop() {
                Some(Value::User(stmts)) => stmts,
                _ => unreachable!(),
            };
            stmts.extend(rest);
            Value::User(stmts)
        })?;
        g.rule_with(block, [], |_| Value::User(Vec::new()))?;

        g.rule_with(stmt_n, [t_if, cond, t_then, stmt_n], |mut children| {
            let body = stmt(children.pop().unwrap());
            Value::User(vec![Stmt::If(body, None)])
        })?;
        g.rule_with(
            stmt_n,
            [t_if, cond, t_then, stmt_n, t_else, stmt_n],
            |mut children| {
                let alt = stmt(children.pop().unwrap());
                children.pop();
                let body = stmt(children.pop().unwrap());
                Value::User(vec![Stmt::If(body, Some(alt))])
            },
        )?;
        g.rule_with(stmt_n, [t_print, cond, t_semi], |mut children| {
            children.pop();
            let name = match children.pop() {
                Some(Value::Token(token)) => token.value,
                _ => unreachable!(),
            };
            Value::User(vec![Stmt::Print(name)])
        })?;

        Ok(())
    })
    .unwrap();

    Parser::new(grammar)
}

fn stmt_lexer() -> RegexLexer {
    let mut lexer = RegexLexer::new();
    lexer.add_pattern("if", "if").unwrap();
    lexer.add_pattern("then", "then").unwrap();
    lexer.add_pattern("else", "else").unwrap();
    lexer.add_pattern("print", "print").unwrap();
    lexer.add_pattern(";", ";").unwrap();
    lexer.add_pattern("cond", "[a-z]+").unwrap();
    lexer
}

fn run(input: &str) -> Vec<Stmt> {
    let parser = stmt_parser();
    let mut lexer = stmt_lexer();
    match parser.parse(&mut lexer, input).unwrap() {
        Value::User(stmts) => stmts,
        value => panic!("unexpected parse result: {:?}", value),
    }
}

#[test]
fn statements_parse_in_order() {
    init_tracing();
    let stmts = run("print x ; print y ;");
    assert_eq!(
        stmts,
        [
            Stmt::Print("x".into()),
            Stmt::Print("y".into()),
        ]
    );
}

#[test]
fn empty_input_is_the_empty_block() {
    init_tracing();
    assert_eq!(run(""), []);
}

#[test]
fn dangling_else_binds_to_the_inner_if() {
    init_tracing();
    let parser = stmt_parser();
    assert!(!parser.conflicts().is_empty());

    let stmts = run("if a then if b then print x ; else print y ;");
    assert_eq!(
        stmts,
        [Stmt::If(
            Box::new(Stmt::If(
                Box::new(Stmt::Print("x".into())),
                Some(Box::new(Stmt::Print("y".into()))),
            )),
            None,
        )]
    );
}

fn unparse(stmts: &[Stmt]) -> String {
    fn one(stmt: &Stmt, out: &mut String) {
        match stmt {
            Stmt::If(body, alt) => {
                out.push_str("if c then ");
                one(body, out);
                if let Some(alt) = alt {
                    out.push_str(" else ");
                    one(alt, out);
                }
            }
            Stmt::Print(name) => {
                out.push_str("print ");
                out.push_str(name);
                out.push_str(" ;");
            }
        }
    }
    let mut out = String::new();
    for stmt in stmts {
        one(stmt, &mut out);
        out.push(' ');
    }
    out
}

#[test]
fn reparsing_the_unparsed_block_is_identity() {
    init_tracing();
    let stmts = run("if a then if b then print x ; else print y ; print z ;");
    assert_eq!(run(&unparse(&stmts)), stmts);
}

#[test]
fn results_are_identical_across_runs() {
    init_tracing();
    let parser_a = stmt_parser();
    let parser_b = stmt_parser();
    let mut lexer = stmt_lexer();

    let input = "if a then print x ; else print";
    let err_a = parser_a.parse(&mut lexer, input).unwrap_err();
    let err_b = parser_b.parse(&mut lexer, input).unwrap_err();
    assert_eq!(err_a, err_b);
}

#[test]
fn reserved_symbols_never_leak_into_expected_sets() {
    init_tracing();
    let parser = stmt_parser();
    let mut lexer = stmt_lexer();
    let err = parser.parse(&mut lexer, "if a if").unwrap_err();
    match err {
        quince::ParseError::Syntax { expected, .. } => {
            assert_eq!(expected, ["then"]);
        }
        err => panic!("unexpected error: {:?}", err),
    }
}
