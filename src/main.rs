//! Run a command and report the CO2 emitted by the host while it ran.

use clap::{ArgAction, Parser};
use co2_tracker::exporters::stdout::StdoutExporter;
use co2_tracker::location::Locator;
use co2_tracker::sensors::{tdp::ConstantPowerSensor, Hardware};
use co2_tracker::{track_co2_with, AppConfig, Tracker, TrackerConfig};
use colored::Colorize;
use std::process::{self, Command};

// the struct below defines the main co2-tracker command-line interface
/// Track the energy consumption and the carbon emissions of a command.
#[derive(Parser)]
#[command(author, version)]
struct Cli {
    #[command(flatten)]
    tracker: TrackerConfig,

    /// Increase the verbosity level
    #[arg(short, action = ArgAction::Count, default_value_t = 0)]
    verbose: u8,

    /// Don't print the header to the standard output
    #[arg(long, default_value_t = false)]
    no_header: bool,

    /// Count a constant CPU power, in Watts, instead of reading the RAPL counters
    #[arg(long, value_name = "WATTS")]
    cpu_watts: Option<f64>,

    /// The command to track, with its arguments
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

fn main() {
    let cli = Cli::parse();
    loggerv::init_with_verbosity(cli.verbose.into()).expect("unable to initialize the logger");

    if !cli.no_header {
        print_header(&cli.tracker.project_name);
    }

    let mut tracker = build_tracker(&cli);
    tracker.add_exporter(Box::new(StdoutExporter::new()));

    let (program, args) = match cli.command.split_first() {
        Some(split) => split,
        None => unreachable!("clap requires a command"),
    };
    let status = match track_co2_with(tracker, || Command::new(program).args(args).status()) {
        Ok(status) => status,
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            process::exit(2);
        }
    };
    match status {
        Ok(status) => process::exit(status.code().unwrap_or(1)),
        Err(e) => {
            eprintln!("{} couldn't run {}: {}", "error:".red().bold(), program, e);
            process::exit(127);
        }
    }
}

fn build_tracker(cli: &Cli) -> Tracker {
    let config = cli.tracker.clone();
    match cli.cpu_watts {
        Some(watts) => {
            let app = AppConfig::default();
            let locator = Locator::from_app_config(&app);
            let mut hardware = Hardware::detect();
            hardware.cpu = Box::new(ConstantPowerSensor::new(watts));
            Tracker::with_collaborators(config, app, hardware, locator)
        }
        None => Tracker::new(config),
    }
}

fn print_header(project_name: &str) {
    let title = format!("co2-tracker {}", co2_tracker::crate_version());
    println!("{}", title.green().bold());
    println!("Tracking the emissions of {project_name}");
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_help() {
        match Cli::try_parse_from(["co2-tracker", "--help"]) {
            Ok(_) => panic!("The CLI didn't generate a help message"),
            Err(e) => assert_eq!(
                e.kind(),
                clap::error::ErrorKind::DisplayHelp,
                "The CLI emitted an error:\n{e}"
            ),
        };
    }

    #[test]
    fn command_is_required() {
        assert!(Cli::try_parse_from(["co2-tracker", "--offline"]).is_err());
    }

    #[test]
    fn tracker_options_and_command_are_split() {
        let cli = Cli::try_parse_from([
            "co2-tracker",
            "--offline",
            "--country",
            "Canada",
            "--no-save-to-file",
            "--measure-power-secs",
            "1",
            "python",
            "train.py",
            "--epochs",
            "3",
        ])
        .unwrap();
        assert!(cli.tracker.offline);
        assert!(!cli.tracker.save_to_file);
        assert_eq!(cli.tracker.country.as_deref(), Some("Canada"));
        assert_eq!(cli.tracker.measure_power_secs, 1.0);
        assert_eq!(cli.command, vec!["python", "train.py", "--epochs", "3"]);
    }

    #[test]
    fn defaults_match_the_library_ones() {
        let cli = Cli::try_parse_from(["co2-tracker", "true"]).unwrap();
        assert_eq!(cli.tracker, TrackerConfig::default());
    }
}

//  Copyright 2020 The co2-tracker authors.
//
//  Licensed under the Apache License, Version 2.0 (the "License");
//  you may not use this file except in compliance with the License.
//  You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
