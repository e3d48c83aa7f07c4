use clap::Parser;
use devscan::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    env_logger::Builder::new()
        .filter(None, log::LevelFilter::Warn)
        .filter(Some("devscan"), log::LevelFilter::Info)
        .parse_default_env()
        .init();
    run(Cli::parse())
}
