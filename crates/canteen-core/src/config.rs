/// Trait for loading service configuration from environment variables.
///
/// Implementors derive `serde::Deserialize` (field `database_url` reads
/// `DATABASE_URL`) and then call `Config::from_env()` at startup.
///
/// # Panics
///
/// Panics if any required env var is missing or cannot be deserialized.
pub trait Config: Sized + serde::de::DeserializeOwned {
    fn from_env() -> Self {
        Self::from_iter(std::env::vars())
    }

    /// Load from an explicit set of variables. Used by tests.
    fn from_iter<I>(vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::from_iter(vars).unwrap_or_else(|e| panic!("failed to load config: {e}"))
    }
}
