/*!
The YAML configuration envelope. Loading YAML itself is an external collaborator; what belongs
here is the shape every config file shares and the selection of the active named configuration.

```yaml
version: "0.4"
active: default
configurations:
  default:
    $schema: "https://wheelly.example/schema/robot.json"
    ...
```
*/

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::errors::{WheellyError, WheellyErrorKind, WheellyResult};

pub const ENVELOPE_VERSION: &str = "0.4";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ConfigEnvelope<T> {
    pub version: String,
    pub active: String,
    pub configurations: BTreeMap<String, T>,
}

/// Load `path` as YAML, validate the envelope version, and return the `active` configuration.
/// `T::validate` is run afterwards so the same entry point surfaces `ConfigInvalid` for both
/// malformed YAML and configurations that parse but violate a field constraint.
pub fn load_active<T>(path: &Path) -> WheellyResult<T>
where
    T: DeserializeOwned + Validate + Debug,
{
    let contents = fs::read_to_string(path).map_err(|e| {
        WheellyError::new(WheellyErrorKind::ConfigInvalid, format!("cannot read {}: {e}", path.display()))
    })?;
    let envelope: ConfigEnvelope<T> = serde_path_to_error::deserialize(serde_yaml::Deserializer::from_str(&contents))
        .map_err(|e| WheellyError::new(WheellyErrorKind::ConfigInvalid, format!("{}: {e}", path.display())))?;
    if envelope.version != ENVELOPE_VERSION {
        return Err(WheellyError::new(
            WheellyErrorKind::ConfigInvalid,
            format!(
                "{}: unsupported envelope version {} (expected {ENVELOPE_VERSION})",
                path.display(),
                envelope.version
            ),
        ));
    }
    let active = envelope.configurations.get(&envelope.active).ok_or_else(|| {
        WheellyError::new(
            WheellyErrorKind::ConfigInvalid,
            format!(
                "{}: active configuration '{}' not found among {:?}",
                path.display(),
                envelope.active,
                envelope.configurations.keys().collect::<Vec<_>>()
            ),
        )
    })?;
    active.validate().map_err(|e| e.chain(path.display().to_string()))?;
    // `active` was borrowed from the map only to validate it before moving it out.
    let active = envelope.configurations.into_iter().find(|(k, _)| *k == envelope.active).unwrap().1;
    Ok(active)
}

/// Field-constraint validation, replacing a `config-checker`-style derive macro: every config
/// type enumerates its own invariants explicitly instead of relying on a `#[check(...)]`
/// annotation.
pub trait Validate {
    fn validate(&self) -> WheellyResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[derive(Debug, Serialize, Deserialize)]
    struct Dummy {
        value: i32,
    }

    impl Validate for Dummy {
        fn validate(&self) -> WheellyResult<()> {
            if self.value < 0 {
                return Err(WheellyError::new(WheellyErrorKind::ConfigInvalid, "value must be >= 0"));
            }
            Ok(())
        }
    }

    #[test]
    fn loads_active_configuration() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, "version: \"0.4\"\nactive: a\nconfigurations:\n  a:\n    value: 3\n  b:\n    value: -1\n").unwrap();
        let cfg: Dummy = load_active(f.path()).unwrap();
        assert_eq!(cfg.value, 3);
    }

    #[test]
    fn rejects_invalid_active_configuration() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, "version: \"0.4\"\nactive: b\nconfigurations:\n  a:\n    value: 3\n  b:\n    value: -1\n").unwrap();
        let err = load_active::<Dummy>(f.path()).unwrap_err();
        assert_eq!(err.kind(), WheellyErrorKind::ConfigInvalid);
    }

    #[test]
    fn rejects_unknown_active_name() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, "version: \"0.4\"\nactive: missing\nconfigurations:\n  a:\n    value: 3\n").unwrap();
        let err = load_active::<Dummy>(f.path()).unwrap_err();
        assert_eq!(err.kind(), WheellyErrorKind::ConfigInvalid);
    }
}
