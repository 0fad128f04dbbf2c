use std::path::PathBuf;

use race::ParseDurationError;

const TIMEOUT_HELP: &str = "Limit for the whole lookup, e.g. 300ms, -1.5h or 2h45m. \
Valid units are ns, us (or µs), ms, s, m and h [default: 1s, or the configured timeout]";

/// Looks a CEP up on every provider at once and prints the first answer.
#[derive(Debug, clap::Parser)]
#[command(name = "cep", version)]
pub struct Cli {
    /// CEP to look up
    #[arg(long, env = "CEP_ID", value_parser = parse_cep)]
    pub cep: String,

    #[arg(long, help = TIMEOUT_HELP, allow_hyphen_values = true, value_parser = parse_timeout)]
    pub timeout: Option<time::Duration>,

    /// Configuration file, `cep.toml` is read when present otherwise
    #[arg(long)]
    pub config: Option<PathBuf>,
}

fn parse_cep(value: &str) -> Result<String, String> {
    if value.trim().is_empty() {
        return Err("cep must not be empty".into());
    }

    Ok(value.to_owned())
}

fn parse_timeout(value: &str) -> Result<time::Duration, ParseDurationError> {
    race::parse_duration(value)
}
