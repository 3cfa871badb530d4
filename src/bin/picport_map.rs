extern crate clap;
#[macro_use] extern crate log;
extern crate fern;
extern crate chrono;

use clap::{Arg, ArgMatches, App, AppSettings, SubCommand};

use std::fs;
use std::path::Path;

use picport::assembler::parse_file;
use picport::mapping;

fn main() {
    let args = process_arguments();
    initialize_logging(args.occurrences_of("verbose"));

    let mappings = match args.subcommand() {
        ("bits", Some(sub)) => {
            let device = mapping::parse_ini(&read_or_exit(sub.value_of("ini").unwrap_or_default()));
            let inc_path = sub.value_of("inc").unwrap_or_default();
            let inc = match parse_file(&read_or_exit(inc_path)) {
                Ok(program) => program,
                Err(err) => {
                    error!("fatal: {}: {}", inc_path, err);
                    std::process::exit(1);
                }
            };
            match mapping::bit_mappings(&inc, &device) {
                Ok(mappings) => mappings,
                Err(err) => {
                    error!("fatal: {}", err);
                    std::process::exit(1);
                }
            }
        }
        ("registers", Some(sub)) => {
            let device = mapping::parse_ini(&read_or_exit(sub.value_of("ini").unwrap_or_default()));
            mapping::register_mappings(&device)
        }
        _ => Vec::new(),
    };

    info!("built {} mapping(s)", mappings.len());
    for (key, value) in mappings {
        println!("{}={}", key, value);
    }
}

fn read_or_exit(path: &str) -> String {
    match fs::read_to_string(Path::new(path)) {
        Ok(text) => text,
        Err(err) => {
            error!("fatal: unable to read `{}`: {}", path, err);
            std::process::exit(1);
        }
    }
}

fn ini_arg() -> Arg<'static, 'static> {
    Arg::with_name("ini")
        .long("ini")
        .takes_value(true)
        .required(true)
        .help("the device's .ini register description")
}

fn process_arguments() -> ArgMatches<'static> {
    App::new("picport-map")
        .version(env!("CARGO_PKG_VERSION"))
        .author(env!("CARGO_PKG_AUTHORS"))
        .about("Builds picport mapping files from device descriptions")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(Arg::with_name("verbose")
            .short("v")
            .multiple(true)
            .takes_value(false)
            .global(true)
            .help("Sets the level of verbosity"))
        .subcommand(SubCommand::with_name("bits")
            .about("prints REG.BIT=FIELD mappings for --map")
            .arg(Arg::with_name("inc")
                .long("inc")
                .takes_value(true)
                .required(true)
                .help("the device's legacy MPASM .inc header"))
            .arg(ini_arg()))
        .subcommand(SubCommand::with_name("registers")
            .about("prints 16-bit to 8-bit register renames for --replacements")
            .arg(ini_arg()))
        .get_matches()
}

/// Logs go to STDERR, STDOUT carries the mappings.
fn initialize_logging(verbosity: u64) {
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}[{}][{}] {}",
                chrono::Local::now().format("[%Y-%m-%d][%H:%M:%S]"),
                record.target(),
                record.level(),
                message
            ))
        })
        .level(match verbosity {
            0 => log::LevelFilter::Error,
            1 => log::LevelFilter::Warn,
            2 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .chain(std::io::stderr())
        .apply().ok();
}
