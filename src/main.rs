use clap::Parser;
use env_logger::Env;
use log::{debug, error};
use snafu::ErrorCompat;

mod args;
mod report;

fn main() {
    let args = args::Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_level)).init();
    debug!("args: {:?}", args);

    if let Err(e) = report::run_report(&args) {
        error!("An error occured: {}", e);
        if let Some(bt) = ErrorCompat::backtrace(&*e) {
            error!("{:?}", bt);
        }
        std::process::exit(1);
    }
}
