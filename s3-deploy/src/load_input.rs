/// `load_input` module: collects the raw deployment input from the environment.
///
/// The core schema takes a plain `field -> value` mapping. This module builds
/// that mapping from prefixed environment variables (`INPUT_SOURCE`,
/// `INPUT_TARGET`, ...), optionally filling gaps from a dotenv-style file.
///
/// # Responsibilities
/// - Map `<prefix><FIELD>` variables onto the schema's field names
/// - Read `--env-file` with `dotenvy` without touching the process environment
/// - Leave all validation to `s3_deploy_core::config::parse_input`
///
/// # Precedence
/// A variable set in the process environment wins over the same key in the
/// env file.
use anyhow::{Context, Result};
use s3_deploy_core::config::INPUT_FIELDS;
use std::collections::HashMap;
use std::path::Path;
use tracing::{error, info};

/// Prefix used by CI runners that expose step inputs as `INPUT_<NAME>`.
pub const DEFAULT_PREFIX: &str = "INPUT_";

/// Environment variable name for a schema field, e.g. `INPUT_BALANCEDLIMIT`.
pub fn env_key(prefix: &str, field: &str) -> String {
    format!("{prefix}{}", field.to_ascii_uppercase())
}

/// Pick the schema fields out of a set of variables. Unknown variables are ignored.
pub fn input_from_vars<I, K, V>(prefix: &str, vars: I) -> HashMap<String, String>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    let vars: HashMap<String, String> = vars
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect();
    INPUT_FIELDS
        .iter()
        .filter_map(|field| {
            vars.get(&env_key(prefix, field))
                .map(|value| (field.to_string(), value.clone()))
        })
        .collect()
}

/// Build the input mapping from explicit process variables plus an optional env file.
pub fn load_input_from<I>(
    prefix: &str,
    process_vars: I,
    env_file: Option<&Path>,
) -> Result<HashMap<String, String>>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut vars: Vec<(String, String)> = match env_file {
        Some(path) => read_env_file(path)?,
        None => Vec::new(),
    };
    // Later entries win when collected into the map.
    vars.extend(process_vars);

    let input = input_from_vars(prefix, vars);
    info!(
        prefix,
        fields = ?input.keys().collect::<Vec<_>>(),
        "Collected deployment input"
    );
    Ok(input)
}

/// Build the input mapping from the current process environment.
pub fn load_input(prefix: &str, env_file: Option<&Path>) -> Result<HashMap<String, String>> {
    let process_vars = std::env::vars_os()
        .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)));
    load_input_from(prefix, process_vars, env_file)
}

fn read_env_file(path: &Path) -> Result<Vec<(String, String)>> {
    info!(env_file = ?path, "Reading env file");
    let entries = dotenvy::from_path_iter(path)
        .and_then(|iter| iter.collect::<Result<Vec<_>, _>>())
        .map_err(|e| {
            error!(error = ?e, env_file = ?path, "Failed to read env file");
            e
        })
        .with_context(|| format!("Failed to read env file {}", path.display()))?;
    Ok(entries)
}
