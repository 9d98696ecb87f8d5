//! Connection settings.

use std::env;

/// Environment variable holding the store URI.
pub const URI_VAR: &str = "DOCMODEL_URI";
/// Environment variable holding the database name.
pub const DATABASE_VAR: &str = "DOCMODEL_DATABASE";

pub const DEFAULT_URI: &str = "mongodb://localhost:27017";
pub const DEFAULT_DATABASE: &str = "docmodel";

/// Where to connect and which database to use.
///
/// The URI scheme selects the backend: `memory://` for the in-process store,
/// `mongodb://` or `mongodb+srv://` for a MongoDB deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub uri: String,
    pub database: String,
}

impl ConnectionConfig {
    pub fn new(uri: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            database: database.into(),
        }
    }

    /// Reads [`URI_VAR`] and [`DATABASE_VAR`], falling back to the defaults for unset or
    /// empty variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str, default: &str| {
            lookup(key)
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        Self {
            uri: read(URI_VAR, DEFAULT_URI),
            database: read(DATABASE_VAR, DEFAULT_DATABASE),
        }
    }

    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = uri.into();
        self
    }

    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// The scheme of the URI, without the `://` separator.
    pub fn scheme(&self) -> Option<&str> {
        self.uri.split_once("://").map(|(scheme, _)| scheme)
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self::new(DEFAULT_URI, DEFAULT_DATABASE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_apply_to_missing_and_empty_variables() {
        let vars = HashMap::from([(DATABASE_VAR, "")]);
        let config = ConnectionConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config, ConnectionConfig::default());
    }

    #[test]
    fn test_variables_override_defaults() {
        let vars = HashMap::from([(URI_VAR, "memory://"), (DATABASE_VAR, "shop")]);
        let config = ConnectionConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.uri, "memory://");
        assert_eq!(config.database, "shop");
        assert_eq!(config.scheme(), Some("memory"));
    }

    #[test]
    fn test_scheme() {
        assert_eq!(ConnectionConfig::default().scheme(), Some("mongodb"));
        assert_eq!(ConnectionConfig::default().uri("localhost").scheme(), None);
        assert_eq!(
            ConnectionConfig::default().uri("mongodb+srv://cluster0.example.net").scheme(),
            Some("mongodb+srv")
        );
    }
}
