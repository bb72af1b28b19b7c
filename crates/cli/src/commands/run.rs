use std::process;

use cadence_eval::{simulate, SimulationOutcome, SimulationReport};

use super::{load_config, print_json, print_trace, read_bundle};
use crate::{fail, LoadArgs, OutputFormat, SampleArgs};

pub(crate) fn cmd_run(
    load: &LoadArgs,
    sample: &SampleArgs,
    invariants: Vec<String>,
    temporal: bool,
    output: OutputFormat,
    quiet: bool,
) {
    let bundle = read_bundle(&load.bundle, output, quiet);
    let mut config = match load_config(load, Some(sample)) {
        Ok(c) => c,
        Err(msg) => fail(&msg, output, quiet),
    };
    if !invariants.is_empty() {
        config.invariants = invariants;
    }
    config.temporal |= temporal;

    let report = match simulate(&bundle, &config) {
        Ok(r) => r,
        Err(e) => fail(&format!("error: {}", e), output, quiet),
    };

    match output {
        OutputFormat::Json => print_json(&report),
        OutputFormat::Text => print_text(&report, quiet),
    }
    if !report.is_ok() {
        process::exit(1);
    }
}

fn print_text(report: &SimulationReport, quiet: bool) {
    if !quiet {
        println!(
            "module {}: {} sample(s) of up to {} step(s), seed {}",
            report.module, report.samples, report.max_steps, report.seed
        );
        if !report.invariants.is_empty() {
            println!("invariants: {}", report.invariants.join(", "));
        }
    }

    match &report.outcome {
        SimulationOutcome::Ok { trace, deadlocks } => {
            println!("[ok] no invariant violation found");
            if *deadlocks > 0 {
                println!("  {} sample(s) deadlocked before the step bound", deadlocks);
            }
            if !quiet {
                print_trace(trace);
            }
        }
        SimulationOutcome::Violation {
            sample,
            seed,
            invariant,
            index,
            trace,
        } => {
            println!(
                "[violation] invariant '{}' violated at state {} (sample {}, seed {})",
                invariant, index, sample, seed
            );
            print_trace(trace);
            print_replay_hint(*seed, quiet);
        }
        SimulationOutcome::Inconclusive {
            sample,
            seed,
            invariant,
            index,
            error,
            trace,
        } => {
            println!(
                "[inconclusive] invariant '{}' could not be evaluated at state {} (sample {}, seed {}): {}",
                invariant, index, sample, seed, error
            );
            print_trace(trace);
            print_replay_hint(*seed, quiet);
        }
        SimulationOutcome::RunFailed {
            sample,
            seed,
            failure,
        } => {
            println!("[error] sample {} (seed {}): {}", sample, seed, failure);
            let path = failure.action_path();
            if !path.is_empty() {
                println!("  action path: {}", path.join(" > "));
            }
            print_trace(&failure.trace);
            print_replay_hint(*seed, quiet);
        }
    }

    for t in &report.temporal {
        println!("temporal '{}': {} (sample {})", t.name, t.verdict, t.sample);
    }
}

fn print_replay_hint(seed: u64, quiet: bool) {
    if !quiet {
        println!("  replay with: --seed {} --max-samples 1", seed);
    }
}
