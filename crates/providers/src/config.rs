/// Provider credentials loaded from environment variables.
///
/// Missing keys are not a startup error; the affected client answers
/// every call with [`crate::ProviderError::NotConfigured`].
#[derive(Debug, Clone, Default)]
pub struct ProviderSettings {
    pub heygen_api_key: String,
    pub fal_key: String,
    pub runway_api_key: String,
    pub shotstack_api_key: String,
    /// Override for the Shotstack edit API (sandbox stage by default).
    pub shotstack_base_url: Option<String>,
}

impl ProviderSettings {
    /// | Env Var              | Default                                  |
    /// |----------------------|------------------------------------------|
    /// | `HEYGEN_API_KEY`     | empty                                    |
    /// | `FAL_KEY`            | empty                                    |
    /// | `RUNWAYML_API_KEY`   | empty                                    |
    /// | `SHOTSTACK_API_KEY`  | empty                                    |
    /// | `SHOTSTACK_BASE_URL` | `https://api.shotstack.io/edit/stage`    |
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).unwrap_or_default();

        Self {
            heygen_api_key: var("HEYGEN_API_KEY"),
            fal_key: var("FAL_KEY"),
            runway_api_key: var("RUNWAYML_API_KEY"),
            shotstack_api_key: var("SHOTSTACK_API_KEY"),
            shotstack_base_url: std::env::var("SHOTSTACK_BASE_URL")
                .ok()
                .filter(|s| !s.trim().is_empty()),
        }
    }

    /// Names of the keys that are unset, for a startup warning.
    pub fn missing_keys(&self) -> Vec<&'static str> {
        [
            ("HEYGEN_API_KEY", &self.heygen_api_key),
            ("FAL_KEY", &self.fal_key),
            ("RUNWAYML_API_KEY", &self.runway_api_key),
            ("SHOTSTACK_API_KEY", &self.shotstack_api_key),
        ]
        .into_iter()
        .filter(|(_, v)| v.trim().is_empty())
        .map(|(k, _)| k)
        .collect()
    }
}
