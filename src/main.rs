use clap::Parser;
use surgetrader::cli::{log_level, run, Cli};
use surgetrader::logging;

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    logging::init(&log_level(&cli));
    run(cli)
}
