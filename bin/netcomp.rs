/*
 * Copyright (c) 2020-2020 Thomas Kramer.
 *
 * This file is part of LibrEDA
 * (see https://codeberg.org/libreda).
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as
 * published by the Free Software Foundation, either version 3 of the
 * License, or (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <http://www.gnu.org/licenses/>.
 */
//! Thin illustrative wrapper around [`netcmp::engine::Engine`] (SPEC_FULL.md §6a).
//!
//! Real netlist file parsing is out of scope for this crate, so this binary compares the two
//! cells of a small built-in demo library rather than reading SPICE/Verilog-A input. It exists to
//! exercise the engine's public interface end to end the way a real `netcomp` wrapper would,
//! not as the deliverable itself.

use std::env;
use std::process::ExitCode;

use log::error;

use netcmp::prelude::*;

fn usage() -> ! {
    eprintln!("usage: netcomp [-i] [-v] [-q] <top-cell-1> <top-cell-2>");
    std::process::exit(2);
}

fn main() -> ExitCode {
    let mut ignore_parasitics = false;
    let mut verbose = false;
    let mut quiet = false;
    let mut cells = Vec::new();

    for arg in env::args().skip(1) {
        match arg.as_str() {
            "-i" => ignore_parasitics = true,
            "-v" => verbose = true,
            "-q" => quiet = true,
            other if other.starts_with('-') => usage(),
            other => cells.push(other.to_string()),
        }
    }
    if cells.len() != 2 {
        usage();
    }

    let level = if quiet {
        log::LevelFilter::Warn
    } else if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new().filter_level(level).init();

    let mut library = demo_library();
    if ignore_parasitics {
        library.ignore_class("resistor", 1, false);
        library.ignore_class("resistor", 2, false);
        library.ignore_class("capacitor", 1, false);
        library.ignore_class("capacitor", 2, false);
    }

    let mut engine = Engine::new(library, EngineConfig::default());
    let report = match engine.compare(&cells[0], 1, &cells[1], 2) {
        Ok(report) => report,
        Err(err) => {
            error!("compare failed: {err}");
            return ExitCode::from(1);
        }
    };

    println!(
        "devices: {}/{}  nets: {}/{}",
        report.device_count.0, report.device_count.1, report.net_count.0, report.net_count.1
    );
    match report.verdict {
        MatchVerdict::Perfect => {
            println!("circuits match.");
            ExitCode::SUCCESS
        }
        MatchVerdict::Automorphisms(k) => {
            println!("circuits match, with {k} unresolved automorphism(s).");
            ExitCode::from(1)
        }
        MatchVerdict::Mismatch => {
            println!(
                "circuits do not match: {} mismatched device class(es), {} mismatched net class(es).",
                report.mismatched_devices.len(),
                report.mismatched_nets.len()
            );
            ExitCode::from(1)
        }
    }
}

/// A two-resistor-divider demo cell, registered once per file tag, so the binary has something to
/// compare without a netlist parser.
fn demo_library() -> CellLibrary {
    let mut library = CellLibrary::new();
    for tag in [1u8, 2u8] {
        let cell = CellDefinition::new("divider")
            .with_pin("vin", Direction::Input)
            .with_pin("vout", Direction::Output)
            .with_pin("gnd", Direction::InOut)
            .with_global("gnd")
            .with_device(DeviceInstanceDef::new(
                "R1",
                DeviceKind::Primitive(PrimitiveClass::Resistor),
                vec![("1", Some("vin".to_string())), ("2", Some("vout".to_string()))],
                PropertyRecord::new().with("R", PropertyValue::Double(1000.0)),
            ))
            .with_device(DeviceInstanceDef::new(
                "R2",
                DeviceKind::Primitive(PrimitiveClass::Resistor),
                vec![("1", Some("vout".to_string())), ("2", Some("gnd".to_string()))],
                PropertyRecord::new().with("R", PropertyValue::Double(1000.0)),
            ));
        library.insert(tag, cell);
    }
    library
}
