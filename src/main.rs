use std::process;

use canasm::cli;

fn main() {
    if let Err(e) = cli::run() {
        eprint!("{}", e.render());
        process::exit(1);
    }
}
