//! Task parameters and job mode, as handed to the block by its runner.

use aspectum_stac::{QueryValidator, StacQuery};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::BlockError;

/// Environment variable holding the task parameters as a JSON object.
pub const TASK_PARAMETERS_ENV: &str = "UP42_TASK_PARAMETERS";

/// Environment variable holding the job mode.
pub const JOB_MODE_ENV: &str = "UP42_JOB_MODE";

/// How the block should run.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockMode {
    /// Fetch data and write results.
    #[default]
    Default,
    /// Write result metadata only, without touching storage.
    DryRun,
}

impl BlockMode {
    /// Parses a raw job mode value. Missing or unknown values fall back to
    /// [`BlockMode::Default`].
    #[must_use]
    pub fn from_raw(raw: Option<&str>) -> Self {
        match raw.map(str::parse::<Self>) {
            Some(Ok(mode)) => mode,
            Some(Err(_)) => {
                log::warn!("Unknown job mode {raw:?}, using {}", Self::Default);
                Self::Default
            }
            None => Self::Default,
        }
    }
}

/// Reads the job mode from `UP42_JOB_MODE`.
#[must_use]
pub fn block_mode() -> BlockMode {
    BlockMode::from_raw(std::env::var(JOB_MODE_ENV).ok().as_deref())
}

/// Reads the task parameters from `UP42_TASK_PARAMETERS`.
///
/// # Errors
///
/// Returns [`BlockError::Params`] if the variable is set but is not a JSON
/// object.
pub fn load_params() -> Result<Map<String, Value>, BlockError> {
    let raw = std::env::var(TASK_PARAMETERS_ENV).ok();
    log::debug!("Raw task parameters from {TASK_PARAMETERS_ENV}: {raw:?}");
    parse_params(raw.as_deref())
}

/// Reads the task parameters and builds the query, running `validator`
/// over the raw parameters first.
///
/// # Errors
///
/// * [`BlockError::Params`] if the parameters are not a JSON object
/// * [`BlockError::Query`] if the parameters are not a valid query
pub fn load_query<V>(validator: &V) -> Result<StacQuery, BlockError>
where
    V: QueryValidator + ?Sized,
{
    let params = load_params()?;
    Ok(StacQuery::from_map_with(&params, validator)?)
}

/// Parses raw task parameters. Missing or empty input means no parameters.
pub(crate) fn parse_params(raw: Option<&str>) -> Result<Map<String, Value>, BlockError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(Map::new()),
        Some(text) => serde_json::from_str(text).map_err(BlockError::Params),
    }
}

#[cfg(test)]
mod tests {
    use aspectum_stac::AcceptAll;
    use serde_json::json;

    use super::*;

    #[test]
    fn missing_params_are_empty() {
        assert!(parse_params(None).unwrap().is_empty());
        assert!(parse_params(Some("")).unwrap().is_empty());
        assert!(parse_params(Some("  ")).unwrap().is_empty());
    }

    #[test]
    fn parses_params_object() {
        let params = parse_params(Some(r#"{"bbox": [1, 2, 3, 4], "file_name": "a.tif"}"#)).unwrap();
        assert_eq!(params.get("file_name"), Some(&json!("a.tif")));

        let query = StacQuery::from_map_with(&params, &AcceptAll).unwrap();
        assert!(query.bbox().is_some());
    }

    #[test]
    fn rejects_non_object_params() {
        assert!(matches!(
            parse_params(Some("[1, 2]")),
            Err(BlockError::Params(_))
        ));
        assert!(matches!(
            parse_params(Some("{oops")),
            Err(BlockError::Params(_))
        ));
    }

    #[test]
    fn parses_known_modes() {
        assert_eq!(BlockMode::from_raw(Some("DRY_RUN")), BlockMode::DryRun);
        assert_eq!(BlockMode::from_raw(Some("DEFAULT")), BlockMode::Default);
    }

    #[test]
    fn unknown_mode_falls_back_to_default() {
        assert_eq!(BlockMode::from_raw(None), BlockMode::Default);
        assert_eq!(BlockMode::from_raw(Some("dry_run")), BlockMode::Default);
        assert_eq!(BlockMode::from_raw(Some("FAST")), BlockMode::Default);
    }

    #[test]
    fn mode_displays_as_env_value() {
        assert_eq!(BlockMode::DryRun.to_string(), "DRY_RUN");
        assert_eq!(BlockMode::Default.as_ref(), "DEFAULT");
    }
}
