extern crate clap;
#[macro_use] extern crate log;
extern crate fern;
extern crate chrono;
extern crate term_grid;

use clap::{Arg, ArgMatches, App};
use term_grid::{Grid, GridOptions, Direction, Filling, Cell};

use std::path::Path;

use picport::assembler::unparser::Unparser;
use picport::assembler::UnparseOptions;
use picport::config::{self, RunContext, DEFAULT_DEFINES_FILE};
use picport::project::{Project, ProjectError};

fn main() {
    let args = process_arguments();
    initialize_logging(args.occurrences_of("verbose"));

    let input = Path::new(args.value_of("INPUT").unwrap_or_default());
    let output = Path::new(args.value_of("OUTPUT").unwrap_or_default());
    let extensions: Vec<String> = args.value_of("extensions")
        .unwrap_or("asm,inc")
        .split(',')
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
        .collect();

    debug!("Arguments:\n\tVerbosity: {}\n\tInput: {}\n\tOutput: {}\n\tExtensions: {}",
        match args.occurrences_of("verbose") {
            0 => log::LevelFilter::Error.to_string(),
            1 => log::LevelFilter::Warn.to_string(),
            2 => log::LevelFilter::Info.to_string(),
            _ => log::LevelFilter::Debug.to_string(),
        },
        input.display(),
        output.display(),
        extensions.join(",")
    );

    if !input.is_dir() {
        error!("fatal: input directory `{}` does not exist", input.display());
        std::process::exit(1);
    }

    let mut project = match Project::load(input) {
        Ok(project) => project,
        Err(err) => {
            error!("fatal: unable to read input: {}", err);
            std::process::exit(1);
        }
    };

    let mut context = build_context(&args);
    context.files_in_project = project.file_names();

    let mut errors: Vec<ProjectError> = project.parse(&extensions);
    errors.extend(project.run_passes(&context));
    if let Err(err) = project.inject_defines(&context) {
        errors.push(err);
    }

    for err in &errors {
        error!("{}", err);
    }
    if !errors.is_empty() {
        error!("Stopped translation due to {} error(s).", errors.len());
        std::process::exit(1);
    }

    let options = UnparseOptions {
        comment_marker: "//".to_string(),
        force_label_colons: true,
        ..UnparseOptions::default()
    };

    if args.is_present("show") {
        show(&project, &options);
    }

    project.unparse(&options);
    if let Err(err) = project.write(output) {
        error!("fatal: unable to write output: {}", err);
        std::process::exit(1);
    }
}

/// Builds the run context from mapping files and inline pairs. A mapping
/// file that cannot be read is fatal.
fn build_context(args: &ArgMatches) -> RunContext {
    let mut context = RunContext::new();

    if let Some(path) = args.value_of("map") {
        context.add_register_mappings(load_or_exit(path));
    }
    if let Some(pairs) = args.values_of("inline-map") {
        for pair in pairs {
            context.add_register_mappings(config::parse_pairs(pair));
        }
    }
    if let Some(path) = args.value_of("replacements") {
        context.add_replacements(load_or_exit(path));
    }
    if let Some(pairs) = args.values_of("define") {
        for pair in pairs {
            context.add_defines(config::parse_pairs(pair));
        }
    }
    context.defines_file_name = args.value_of("defines-file-name").unwrap_or(DEFAULT_DEFINES_FILE).to_string();

    debug!("{} register mapping(s), {} replacement(s), {} define(s)",
        context.register_map.len(), context.replacement_map.len(), context.defines.len());
    context
}

fn load_or_exit(path: &str) -> Vec<(String, String)> {
    match config::load_mapping_file(Path::new(path)) {
        Ok(pairs) => pairs,
        Err(err) => {
            error!("fatal: {}", err);
            std::process::exit(1);
        }
    }
}

/// Prints every parsed file as a grid of line number, line kind and
/// canonical text.
fn show(project: &Project, options: &UnparseOptions) {
    let unparser = Unparser::new(options.clone());

    for file in &project.files {
        let program = match &file.program {
            Some(program) => program,
            None => continue,
        };

        let mut grid = Grid::new(GridOptions {
            filling:     Filling::Spaces(1),
            direction:   Direction::LeftToRight,
        });

        let gutter = unparser.gutter(program);
        for (idx, line) in program.lines.iter().enumerate() {
            grid.add(Cell::from(format!("{:04}:", idx + 1)));
            grid.add(Cell::from(line.kind_name().to_string()));
            grid.add(Cell::from(unparser.render(line, gutter)));
        }

        println!("{}", file.relative_path().display());
        println!("{}", grid.fit_into_columns(3));
    }
}

fn process_arguments() -> ArgMatches<'static> {
    App::new(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .author(env!("CARGO_PKG_AUTHORS"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .arg(Arg::with_name("INPUT")
            .help("Sets the input directory to translate")
            .required(true)
            .multiple(false)
            .index(1))
        .arg(Arg::with_name("OUTPUT")
            .help("Sets the directory to write translated files to")
            .required(true)
            .multiple(false)
            .index(2))
        .arg(Arg::with_name("verbose")
            .short("v")
            .multiple(true)
            .takes_value(false)
            .help("Sets the level of verbosity"))
        .arg(Arg::with_name("extensions")
            .short("e")
            .long("extensions")
            .takes_value(true)
            .default_value("asm,inc")
            .help("comma separated list of file extensions to translate"))
        .arg(Arg::with_name("map")
            .long("map")
            .takes_value(true)
            .help("file of REG.BIT=REPLACEMENT register mappings"))
        .arg(Arg::with_name("inline-map")
            .short("m")
            .long("inline-map")
            .takes_value(true)
            .multiple(true)
            .number_of_values(1)
            .help("a single REG.BIT=REPLACEMENT register mapping"))
        .arg(Arg::with_name("replacements")
            .long("replacements")
            .takes_value(true)
            .help("file of NAME=REPLACEMENT identifier replacements"))
        .arg(Arg::with_name("define")
            .short("d")
            .long("define")
            .takes_value(true)
            .multiple(true)
            .number_of_values(1)
            .help("a NAME=VALUE symbol written to the defines file"))
        .arg(Arg::with_name("defines-file-name")
            .long("defines-file-name")
            .takes_value(true)
            .default_value(DEFAULT_DEFINES_FILE)
            .help("name of the generated defines file"))
        .arg(Arg::with_name("show")
            .short("s")
            .long("show")
            .takes_value(false)
            .help("prints every translated file as a table to STDOUT"))
        .get_matches()
}

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
        .chain(std::io::stdout())
        .apply().ok();
}
