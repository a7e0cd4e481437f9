use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::errors::KeywardError;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    pub backend: Backend,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct Backend {
    /// Management API base URL, e.g. https://api.descope.com
    pub base_url: String,
    pub project_id: Option<String>,
    pub management_key: Option<String>,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for Backend {
    fn default() -> Self {
        Self {
            base_url: "https://api.descope.com".to_string(),
            project_id: None,
            management_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

// Keep the management key out of logs.
impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend")
            .field("base_url", &self.base_url)
            .field("project_id", &self.project_id)
            .field(
                "management_key",
                &self.management_key.as_ref().map(|_| "<redacted>"),
            )
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Settings {
    pub fn load(path: &str) -> Result<Self, KeywardError> {
        let mut builder = config::Config::builder()
            .set_default("backend.base_url", Backend::default().base_url)?
            .set_default("backend.timeout_secs", Backend::default().timeout_secs)?;

        // Optional file
        if Path::new(path).exists() {
            builder = builder.add_source(config::File::with_name(path));
        }

        // Environment overrides: KEYWARD__BACKEND__PROJECT_ID=P123, etc.
        builder = builder.add_source(config::Environment::with_prefix("KEYWARD").separator("__"));

        let cfg = builder.build()?;
        let mut s: Settings = cfg.try_deserialize()?;

        s.backend.project_id = non_blank(s.backend.project_id);
        s.backend.management_key = non_blank(s.backend.management_key);

        url::Url::parse(&s.backend.base_url).map_err(|e| {
            KeywardError::BadRequest(format!(
                "Invalid backend base_url `{}`: {e}",
                s.backend.base_url
            ))
        })?;

        Ok(s)
    }

    /// Apply credentials given on the command line over file and env values.
    pub fn with_overrides(
        mut self,
        project_id: Option<String>,
        management_key: Option<String>,
    ) -> Self {
        if let Some(id) = non_blank(project_id) {
            self.backend.project_id = Some(id);
        }
        if let Some(key) = non_blank(management_key) {
            self.backend.management_key = Some(key);
        }
        self
    }

    pub fn credentials(&self) -> Result<(&str, &str), KeywardError> {
        let project_id = self.backend.project_id.as_deref().ok_or_else(|| {
            KeywardError::BadRequest(
                "Project ID is required (--project-id or KEYWARD__BACKEND__PROJECT_ID)".into(),
            )
        })?;
        let management_key = self.backend.management_key.as_deref().ok_or_else(|| {
            KeywardError::BadRequest(
                "Management key is required (--management-key or KEYWARD__BACKEND__MANAGEMENT_KEY)"
                    .into(),
            )
        })?;
        Ok((project_id, management_key))
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
