use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use log::debug;
use spidev_test::cli::Cli;
use spidev_test::SpiTestError;
use std::io;
use std::process;

const EXIT_USAGE: i32 = 1;
const EXIT_DEVICE: i32 = 2;

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => EXIT_USAGE,
            };
            let _ = e.print();
            process::exit(code);
        }
    };

    init_logger(cli.verbose);

    let config = match cli.into_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {:#}", e);
            process::exit(EXIT_USAGE);
        }
    };
    debug!("Resolved configuration: {:?}", config);

    let stdout = io::stdout();
    if let Err(e) = spidev_test::run(&config, &mut stdout.lock()) {
        if let Some(spi_error) = e.downcast_ref::<SpiTestError>() {
            debug!("Failed at step '{}'", spi_error.step());
        }
        eprintln!("{}", Cli::command().render_usage());
        eprintln!("{}", spidev_test::diagnostic(&e));
        process::exit(EXIT_DEVICE);
    }
}

fn init_logger(verbose: u8) {
    // RUST_LOG wins; otherwise stay quiet so stdout only carries the report.
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}
