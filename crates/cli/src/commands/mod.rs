pub(crate) mod run;
pub(crate) mod successors;
pub(crate) mod test;

use std::path::Path;

use cadence_eval::{SimConfig, Trace};
use serde::Serialize;
use tracing::debug;

use crate::{fail, LoadArgs, OutputFormat, SampleArgs};

/// Read and parse a bundle file, exiting on failure.
pub(crate) fn read_bundle(path: &Path, output: OutputFormat, quiet: bool) -> serde_json::Value {
    let text = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(_) => fail(
            &format!("error: bundle file not found: {}", path.display()),
            output,
            quiet,
        ),
    };
    match serde_json::from_str(&text) {
        Ok(v) => v,
        Err(e) => fail(
            &format!("error: invalid JSON in {}: {}", path.display(), e),
            output,
            quiet,
        ),
    }
}

/// Build the effective configuration: defaults, then the `--config` file,
/// then command-line flags.
pub(crate) fn load_config(load: &LoadArgs, sample: Option<&SampleArgs>) -> Result<SimConfig, String> {
    let mut config = match &load.config {
        Some(path) => {
            debug!("loading configuration from {}", path.display());
            let text = std::fs::read_to_string(path)
                .map_err(|e| format!("error reading config '{}': {}", path.display(), e))?;
            toml::from_str::<SimConfig>(&text)
                .map_err(|e| format!("error: invalid config '{}': {}", path.display(), e))?
        }
        None => SimConfig::default(),
    };

    if let Some(module) = &load.module {
        config.module = Some(module.clone());
    }
    for arg in &load.constants {
        let (name, value) = parse_const(arg)?;
        config.constants.insert(name, value);
    }
    if let Some(sample) = sample {
        if let Some(n) = sample.max_steps {
            config.max_steps = n;
        }
        if let Some(n) = sample.max_samples {
            config.max_samples = n;
        }
        if sample.seed.is_some() {
            config.seed = sample.seed;
        }
    }
    Ok(config)
}

/// Split `NAME=JSON` into the constant name and its encoded value.
fn parse_const(arg: &str) -> Result<(String, serde_json::Value), String> {
    let (name, json) = arg
        .split_once('=')
        .ok_or_else(|| format!("error: invalid --const '{}': expected NAME=JSON", arg))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("error: invalid --const '{}': empty name", arg));
    }
    let value = serde_json::from_str(json)
        .map_err(|e| format!("error: invalid --const '{}': {}", arg, e))?;
    Ok((name.to_string(), value))
}

pub(crate) fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string_pretty(value)
            .unwrap_or_else(|e| format!("serialization error: {}", e))
    );
}

/// Print a trace indented under a report line.
pub(crate) fn print_trace(trace: &Trace) {
    for line in trace.to_string().lines() {
        println!("  {}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn const_specs_split_on_first_equals() {
        assert_eq!(parse_const("N=3").unwrap(), ("N".to_string(), json!(3)));
        assert_eq!(
            parse_const("S={\"#set\": [\"a=b\"]}").unwrap(),
            ("S".to_string(), json!({ "#set": ["a=b"] }))
        );
        assert!(parse_const("N").is_err());
        assert!(parse_const("=3").is_err());
        assert!(parse_const("N=not json").is_err());
    }
}
