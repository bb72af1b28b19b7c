use std::path::Path;

use cadence_eval::itf::value_from_json;
use cadence_eval::{load, Executor, Program, State, Successors};
use serde::Serialize;

use super::{load_config, print_json, read_bundle};
use crate::{fail, LoadArgs, OutputFormat};

#[derive(Serialize)]
struct SuccessorsReport<'a> {
    action: &'a str,
    explored: usize,
    truncated: bool,
    states: Vec<&'a State>,
}

pub(crate) fn cmd_successors(
    args: &LoadArgs,
    action: Option<&str>,
    from: Option<&Path>,
    limit: Option<usize>,
    output: OutputFormat,
    quiet: bool,
) {
    let bundle = read_bundle(&args.bundle, output, quiet);
    let config = match load_config(args, None) {
        Ok(c) => c,
        Err(msg) => fail(&msg, output, quiet),
    };
    let program = match load(&bundle, &config) {
        Ok(p) => p,
        Err(e) => fail(&format!("error: {}", e), output, quiet),
    };

    let (state, default_action) = match from {
        Some(path) => match read_state(path, &program) {
            Ok(s) => (s, program.step.as_str()),
            Err(msg) => fail(&msg, output, quiet),
        },
        None => (State::new(), program.init.as_str()),
    };
    let action = action.unwrap_or(default_action);
    let limit = limit.unwrap_or(config.max_successors);

    let result = match Executor::new(&program).successors_named(action, vec![], &state, limit) {
        Ok(r) => r,
        Err(e) => fail(&format!("error: {}", e), output, quiet),
    };

    match output {
        OutputFormat::Json => print_json(&SuccessorsReport {
            action,
            explored: result.explored,
            truncated: result.truncated,
            states: result.states.iter().collect(),
        }),
        OutputFormat::Text => print_text(action, &result, quiet),
    }
}

fn print_text(action: &str, result: &Successors, quiet: bool) {
    if !quiet {
        println!(
            "{} successor state(s) of '{}' ({} choice sequence(s) explored)",
            result.states.len(),
            action,
            result.explored
        );
    }
    for state in &result.states {
        println!("  {}", state);
    }
    if result.truncated {
        println!("  (truncated: raise --limit to explore further)");
    }
}

/// Decode a state from ITF JSON: a state object, or a trace document whose
/// last state is used. Only declared variables are read.
fn read_state(path: &Path, program: &Program) -> Result<State, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("error reading state '{}': {}", path.display(), e))?;
    let json: serde_json::Value = serde_json::from_str(&text)
        .map_err(|e| format!("error: invalid JSON in {}: {}", path.display(), e))?;
    let obj = match json.get("states").and_then(|s| s.as_array()) {
        Some(states) => states.last(),
        None => Some(&json),
    }
    .and_then(|s| s.as_object())
    .ok_or_else(|| format!("error: {} does not contain a state object", path.display()))?;

    let mut state = State::new();
    for var in program.var_names() {
        let value = obj
            .get(var)
            .ok_or_else(|| format!("error: state is missing variable '{}'", var))?;
        let value = value_from_json(value).map_err(|e| format!("error: variable '{}': {}", var, e))?;
        state.insert(var, value);
    }
    Ok(state)
}
