use std::process;

use cadence_eval::{run_tests, TestOutcome, TestReport};

use super::{load_config, print_json, print_trace, read_bundle};
use crate::{fail, LoadArgs, OutputFormat, SampleArgs};

pub(crate) fn cmd_test(
    load: &LoadArgs,
    sample: &SampleArgs,
    filter: Option<&str>,
    output: OutputFormat,
    quiet: bool,
) {
    let bundle = read_bundle(&load.bundle, output, quiet);
    let config = match load_config(load, Some(sample)) {
        Ok(c) => c,
        Err(msg) => fail(&msg, output, quiet),
    };

    let reports = match run_tests(&bundle, &config, filter) {
        Ok(r) => r,
        Err(e) => fail(&format!("error: {}", e), output, quiet),
    };
    let failed = reports.iter().filter(|r| !r.passed()).count();

    match output {
        OutputFormat::Json => print_json(&reports),
        OutputFormat::Text => print_text(&reports, failed, quiet),
    }
    if failed > 0 {
        process::exit(1);
    }
}

fn print_text(reports: &[TestReport], failed: usize, quiet: bool) {
    if reports.is_empty() {
        println!("no runs matched");
        return;
    }
    for report in reports {
        match &report.outcome {
            TestOutcome::Passed { .. } => {
                if !quiet {
                    println!(
                        "ok   {} ({} sample(s), seed {})",
                        report.name, report.samples, report.seed
                    );
                }
            }
            TestOutcome::Failed {
                sample,
                seed,
                failure,
            } => {
                println!(
                    "FAIL {} (sample {}, seed {}): {}",
                    report.name, sample, seed, failure
                );
                let path = failure.action_path();
                if !path.is_empty() {
                    println!("  action path: {}", path.join(" > "));
                }
                if !quiet {
                    print_trace(&failure.trace);
                }
            }
        }
    }
    println!(
        "{} passed, {} failed",
        reports.len() - failed,
        failed
    );
}
