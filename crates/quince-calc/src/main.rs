use anyhow::Context as _;
use std::env;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let parser = quince_calc::calculator().context("building the calculator grammar")?;
    let mut lexer = quince_calc::lexer().context("registering token patterns")?;

    let mut inputs = env::args().skip(1).peekable();
    anyhow::ensure!(inputs.peek().is_some(), "missing input expression");

    for input in inputs {
        match quince_calc::eval(&parser, &mut lexer, &input) {
            Ok(value) => println!("{} = {}", input, value),
            Err(err) => eprintln!("{}: {}", input, err),
        }
    }

    Ok(())
}
