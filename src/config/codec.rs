//! Document encoding and decoding.
//!
//! The format follows the location: `.json` is JSON, everything else is
//! YAML. YAML is a superset of JSON, so a JSON document behind a `.yml`
//! name still decodes.

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Yaml,
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Format {
    /// Pick the format for a file path or URL.
    pub fn for_location(location: &str) -> Self {
        let path = location.split(['?', '#']).next().unwrap_or(location);
        let is_json = path
            .rsplit_once('.')
            .map(|(_, ext)| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        if is_json {
            Format::Json
        } else {
            Format::Yaml
        }
    }

    pub fn decode<T: DeserializeOwned>(self, bytes: &[u8]) -> Result<T, CodecError> {
        Ok(match self {
            Format::Json => serde_json::from_slice(bytes)?,
            Format::Yaml => serde_yaml::from_slice(bytes)?,
        })
    }

    pub fn encode<T: Serialize>(self, value: &T) -> Result<Vec<u8>, CodecError> {
        Ok(match self {
            Format::Json => serde_json::to_vec_pretty(value)?,
            Format::Yaml => serde_yaml::to_string(value)?.into_bytes(),
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::Yaml => "yaml",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::ConfigDto;

    #[test]
    fn test_format_from_location() {
        assert_eq!(Format::for_location("conf/config.json"), Format::Json);
        assert_eq!(Format::for_location("CONFIG.JSON"), Format::Json);
        assert_eq!(Format::for_location("https://host/conf.json?version=2"), Format::Json);
        assert_eq!(Format::for_location("conf/config.yml"), Format::Yaml);
        assert_eq!(Format::for_location("conf/config.yaml"), Format::Yaml);
        assert_eq!(Format::for_location("conf/config"), Format::Yaml);
        assert_eq!(Format::for_location("https://host/json/config"), Format::Yaml);
    }

    #[test]
    fn test_yaml_accepts_json_text() {
        let json = br#"{ "storage": { "local": { "type": "local", "path": "/tmp" } } }"#;
        let config: ConfigDto = Format::Yaml.decode(json).unwrap();
        assert_eq!(config.storage["local"].path.as_deref(), Some("/tmp"));
    }

    #[test]
    fn test_encode_decode() {
        let yaml = b"backup-policies:\n  p:\n    parallel: 4\n";
        let config: ConfigDto = Format::Yaml.decode(yaml).unwrap();

        for format in [Format::Json, Format::Yaml] {
            let bytes = format.encode(&config).unwrap();
            let decoded: ConfigDto = format.decode(&bytes).unwrap();
            assert_eq!(decoded, config, "{}", format.name());
        }
    }

    #[test]
    fn test_decode_error_kind() {
        let err = Format::Json.decode::<ConfigDto>(b"{ not json").unwrap_err();
        assert!(matches!(err, CodecError::Json(_)));

        let err = Format::Yaml.decode::<ConfigDto>(b"storage: [1, 2").unwrap_err();
        assert!(matches!(err, CodecError::Yaml(_)));
    }
}
