use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use report_router_client::{ClientConfig, ReportClient, DEFAULT_API_BASE};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{debug, info};

pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod policy;
pub mod registry;
pub mod render;
pub mod rules;
pub mod state;
pub mod taxonomy;
pub mod transport;

#[cfg(test)]
mod testing;

use error::SettingsError;
use handlers::FetchContext;
use registry::HandlerRegistry;
use rules::{domain, RuleEngine};
use taxonomy::Taxonomy;

/// Runtime settings, deserializable from a config file or environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Base URL of the record service.
    pub api_base: String,
    /// Rows rendered per table; fetched rows beyond this are kept but not rendered.
    pub safe_max_rows: usize,
    pub fetch_timeout_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// YAML file with extra domain rules.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rules_file: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            safe_max_rows: policy::SAFE_MAX_ROWS,
            fetch_timeout_secs: report_router_client::DEFAULT_TIMEOUT.as_secs(),
            user_agent: None,
            rules_file: None,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.api_base.trim().is_empty() {
            return Err(SettingsError::EmptyApiBase);
        }
        if self.safe_max_rows == 0 {
            return Err(SettingsError::ZeroRowCap);
        }
        if self.fetch_timeout_secs == 0 {
            return Err(SettingsError::ZeroTimeout);
        }
        Ok(())
    }

    #[must_use]
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    fn client_config(&self) -> ClientConfig {
        let defaults = ClientConfig::default();
        ClientConfig {
            api_base: self.api_base.trim().to_string(),
            timeout: self.fetch_timeout(),
            user_agent: self.user_agent.clone().unwrap_or(defaults.user_agent),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CoreRuntime {
    settings: Settings,
    boot_timestamp: OffsetDateTime,
    dispatcher: Arc<Dispatcher>,
}

impl CoreRuntime {
    #[must_use]
    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        self.dispatcher.clone()
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    #[must_use]
    pub fn boot_timestamp(&self) -> OffsetDateTime {
        self.boot_timestamp
    }

    pub async fn serve(&self) -> Result<()> {
        transport::serve_stdio(self.dispatcher.clone()).await
    }
}

/// Wires taxonomy, client, handlers and rules into a ready dispatcher.
///
/// Rule order is built-in domain rules, then rules from `settings.rules_file`,
/// then one generated rule per intent.
pub async fn bootstrap(settings: Settings) -> Result<CoreRuntime> {
    let boot_timestamp = OffsetDateTime::now_utc();
    settings.validate().context("invalid settings")?;

    let taxonomy = Arc::new(Taxonomy::builtin().context("built-in taxonomy is inconsistent")?);

    let client = ReportClient::with_config(settings.client_config())
        .context("failed to build record service client")?;
    debug!(
        target: "report_router_core",
        api_base = %client.config().api_base,
        "record service client initialized"
    );

    let registry = HandlerRegistry::default();
    handlers::register_builtin(&registry);

    let mut domain_rules = domain::builtin_rules();
    if let Some(path) = &settings.rules_file {
        let extra = domain::load_rules_file(path).await?;
        info!(
            target: "report_router_core",
            path = %path.display(),
            rules = extra.len(),
            "custom rules loaded"
        );
        domain_rules.extend(extra);
    }
    let generated = rules::generated_rules(&taxonomy, &registry);
    let engine = RuleEngine::new(taxonomy, rules::aggregate(domain_rules, generated))
        .context("failed to compile routing rules")?;

    let context = FetchContext::new(Arc::new(client));
    let dispatcher = Dispatcher::builder(Arc::new(engine), registry, context)
        .safe_max_rows(settings.safe_max_rows)
        .fetch_timeout(settings.fetch_timeout())
        .build();

    info!(
        target: "report_router_core",
        handlers = dispatcher.registry().len(),
        rules = dispatcher.engine().rules().len(),
        safe_max_rows = settings.safe_max_rows,
        boot_timestamp = %boot_timestamp,
        "report router ready"
    );

    Ok(CoreRuntime {
        settings,
        boot_timestamp,
        dispatcher: Arc::new(dispatcher),
    })
}

pub use dispatcher::{
    DispatchOutcome, DispatchRequest, DispatchTarget, Dispatcher, DispatcherBuilder, DEFAULT_LIMIT,
};
pub use error::{DispatchError, ErrorKind};
pub use handlers::{FetchResult, QueryHandler, ResourceHandler};
pub use rules::{Classification, HeuristicRule};
pub use taxonomy::Intent;

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[tokio::test]
    async fn bootstrap_wires_every_builtin_handler() {
        let runtime = bootstrap(Settings::default()).await.expect("bootstrap succeeds");
        let dispatcher = runtime.dispatcher();
        assert_eq!(dispatcher.registry().len(), 8);
        assert_eq!(dispatcher.safe_max_rows(), policy::SAFE_MAX_ROWS);
        assert_eq!(
            dispatcher.engine().classify("how many students are in grade 3"),
            Some(Intent::StudentCounts)
        );
        assert_eq!(
            dispatcher.engine().classify("show me the course catalog"),
            Some(Intent::Subjects)
        );
    }

    #[tokio::test]
    async fn custom_rules_file_is_loaded_after_builtin_rules() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(
            file,
            "rules:\n  - name: field_trips\n    intent: permission_slips\n    priority: 40\n    keywords: [\"field trip\"]"
        )
        .expect("write rules");

        let settings = Settings {
            rules_file: Some(file.path().to_path_buf()),
            ..Settings::default()
        };
        let runtime = bootstrap(settings).await.expect("bootstrap succeeds");
        let engine = runtime.dispatcher().engine().clone();
        let found = engine.explain("Field Trip list").expect("classified");
        assert_eq!(found.intent, Intent::Waivers);
        assert_eq!(found.rule, "field_trips");
    }

    #[tokio::test]
    async fn broken_rules_file_fails_bootstrap() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "rules:\n  - name: bad\n    intent: cafeteria").expect("write rules");
        let settings = Settings {
            rules_file: Some(file.path().to_path_buf()),
            ..Settings::default()
        };
        assert!(bootstrap(settings).await.is_err());
    }

    #[test]
    fn settings_validation_rejects_degenerate_values() {
        assert_eq!(Settings::default().validate(), Ok(()));
        let empty = Settings {
            api_base: "  ".into(),
            ..Settings::default()
        };
        assert_eq!(empty.validate(), Err(SettingsError::EmptyApiBase));
        let zero_rows = Settings {
            safe_max_rows: 0,
            ..Settings::default()
        };
        assert_eq!(zero_rows.validate(), Err(SettingsError::ZeroRowCap));
        let zero_timeout = Settings {
            fetch_timeout_secs: 0,
            ..Settings::default()
        };
        assert_eq!(zero_timeout.validate(), Err(SettingsError::ZeroTimeout));
    }

    #[test]
    fn settings_fill_missing_fields_with_defaults() {
        let settings: Settings =
            serde_json::from_value(serde_json::json!({ "safe_max_rows": 50 })).expect("parse");
        assert_eq!(settings.safe_max_rows, 50);
        assert_eq!(settings.api_base, DEFAULT_API_BASE);
        assert_eq!(settings.fetch_timeout_secs, 10);
    }
}
