//! Translation of a declarative configuration into the exact `docker run`
//! command line.
//!
//! The result is a whitespace-joined string handed to the spawn capability;
//! option values containing spaces are not supported by this surface.

use crate::config::{ManagerConfig, OptionValue};

/// Serialize one option into its command-line tokens.
///
/// Single-character names get a `-` prefix, longer names `--`. A
/// [`OptionValue::Values`] entry expands to one token per element, element
/// order preserved.
pub fn serialize_option(name: &str, value: &OptionValue) -> Vec<String> {
    let flag = if name.chars().count() == 1 {
        format!("-{name}")
    } else {
        format!("--{name}")
    };
    match value {
        OptionValue::Switch => vec![flag],
        OptionValue::Value(v) => vec![format!("{flag} {v}")],
        OptionValue::Values(vs) => vs.iter().map(|v| format!("{flag} {v}")).collect(),
    }
}

/// Serialize all options in insertion order, flattening multi-token entries
/// in place.
pub fn serialize_options(options: &[(String, OptionValue)]) -> Vec<String> {
    options
        .iter()
        .flat_map(|(name, value)| serialize_option(name, value))
        .collect()
}

/// Build the full `docker run` invocation:
///
/// `docker run --cidfile <path> --rm <options...> <image> [command] [args]`
///
/// `--cidfile` and `--rm` always precede user options; command and args, when
/// both present, appear in that order after the image.
pub fn build_run_command(config: &ManagerConfig) -> String {
    let mut parts = vec![
        "docker run".to_string(),
        format!("--cidfile {}", config.cidfile_path().display()),
        "--rm".to_string(),
    ];
    parts.extend(serialize_options(&config.options));
    parts.push(config.image.clone());
    if let Some(command) = &config.command {
        parts.push(command.clone());
    }
    if let Some(args) = &config.args {
        parts.push(args.clone());
    }
    parts.join(" ")
}
