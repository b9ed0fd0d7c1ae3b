use std::env;
use std::fs;
use std::io::{self, Read, Write};

use anyhow::Error;
use clap::{values_t, App, AppSettings, Arg};
use env_logger::{fmt, Builder, Target};
use log::{error, info};
use log::{Level, LevelFilter, Record};

use colorcut::config::{SolverConfig, SolverConfigUpdate};
use colorcut::{ColoringSolver, SolveStatus};

fn main() {
    let exit_code = match main_with_err() {
        Err(err) => {
            error!("{}", err);
            1
        }
        Ok(exit_code) => exit_code,
    };
    std::process::exit(exit_code);
}

fn init_logging() {
    let format = |buf: &mut fmt::Formatter, record: &Record| {
        if record.level() == Level::Info {
            writeln!(buf, "c {}", record.args())
        } else {
            writeln!(buf, "c {}: {}", record.level(), record.args())
        }
    };

    let mut builder = Builder::new();
    builder
        .target(Target::Stdout)
        .format(format)
        .filter(None, LevelFilter::Info);

    if let Ok(ref env_var) = env::var("COLORCUT_LOG") {
        builder.parse_filters(env_var);
    }

    builder.init();
}

fn banner() {
    info!("This is colorcut {}", env!("COLORCUT_VERSION"));
    info!(
        "  {} build - {}",
        env!("COLORCUT_PROFILE"),
        env!("COLORCUT_RUSTC_VERSION")
    );
}

fn main_with_err() -> Result<i32, Error> {
    let matches = App::new("colorcut")
        .version(env!("COLORCUT_VERSION"))
        .setting(AppSettings::DisableHelpSubcommand)
        .arg_from_usage("[INPUT] 'The DIMACS edge format graph to color (stdin if omitted)'")
        .arg_from_usage("[config-file] --config=[FILE] 'Read parameters from configuration file'")
        .arg(
            Arg::from_usage("[config-option] -C --config-option")
                .value_name("OPTION>=<VALUE")
                .help(
                    "Specify a single config option, see 'colorcut -C help' for a list of options.",
                )
                .multiple(true)
                .number_of_values(1),
        )
        .arg_from_usage("--no-cuts 'Disable clique cut separation'")
        .get_matches();

    if values_t!(matches, "config-option", String)
        .unwrap_or(vec![])
        .iter()
        .any(|option| option == "help")
    {
        print!("{}", SolverConfig::help());
        return Ok(0);
    }

    init_logging();
    banner();

    let mut config_update = SolverConfigUpdate::new();

    if let Some(config_path) = matches.value_of("config-file") {
        let mut config_contents = String::new();
        fs::File::open(config_path)?.read_to_string(&mut config_contents)?;

        config_update.merge(toml::from_str(&config_contents)?);
    }

    for config_option in values_t!(matches, "config-option", String).unwrap_or(vec![]) {
        config_update.merge(toml::from_str(&config_option)?);
    }

    if matches.is_present("no-cuts") {
        config_update.clique_cuts = Some(false);
    }

    let mut solver = ColoringSolver::new();

    solver.config(&config_update)?;

    let stdin = io::stdin();

    let mut locked_stdin;
    let mut opened_file;

    let file = match matches.value_of("INPUT") {
        Some(path) => {
            info!("Reading file '{}'", path);
            opened_file = fs::File::open(path)?;
            &mut opened_file as &mut dyn io::Read
        }
        None => {
            info!("Reading from stdin");
            locked_stdin = stdin.lock();
            &mut locked_stdin as &mut dyn io::Read
        }
    };

    solver.add_dimacs_graph(file)?;

    let report = solver.solve()?;

    let (status, exit_code) = match report.status {
        SolveStatus::Optimal => ("OPTIMAL", 0),
        SolveStatus::Feasible => ("FEASIBLE", 10),
        SolveStatus::Infeasible => ("INFEASIBLE", 20),
        SolveStatus::Unknown => ("UNKNOWN", 30),
    };

    println!("s {}", status);
    if let Some(chromatic_number) = report.chromatic_number {
        println!("o {}", chromatic_number);
    }
    println!("b {}", report.best_bound);
    println!("t {:.3}", report.elapsed.as_secs_f64());
    println!("k {}", report.cuts_generated);
    if let Some(coloring) = report.coloring {
        print!("v");
        for color in coloring {
            print!(" {}", color + 1);
        }
        println!();
    }

    Ok(exit_code)
}
