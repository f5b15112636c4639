mod cli;
mod handlers;

use clap::Parser;
use cli::Cli;
use colored::*;
use handlers::run::handle_run;

fn main() {
    let cli = Cli::parse();
    chainrunner::logger::init_logging(cli.verbose, cli.quiet);

    if let Err(e) = handle_run(&cli) {
        eprintln!("{} {:#}", "❌".red(), e);
        std::process::exit(1);
    }
}
