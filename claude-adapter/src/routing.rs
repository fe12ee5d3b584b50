//! Provider selection: which endpoint and token the CLI is pointed at.

use crate::types::ClientConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Lowercase substrings that mark a model as served by the GLM provider.
pub const GLM_MODEL_TOKENS: &[&str] = &["glm"];

/// Proxy bypass applied for router-backed models.
pub const ROUTER_NO_PROXY: &str = "127.0.0.1";

/// Backend family a model is served by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    /// The local claude-code-router proxy.
    Router,
    /// Zhipu's Anthropic-compatible GLM endpoint, reached directly.
    Glm,
}

impl Provider {
    /// Classifies `model` by case-insensitive substring match.
    #[must_use]
    pub fn for_model(model: &str) -> Self {
        let model = model.to_lowercase();
        if GLM_MODEL_TOKENS.iter().any(|t| model.contains(t)) {
            Self::Glm
        } else {
            Self::Router
        }
    }

    /// Short label for logs.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Router => "Router",
            Self::Glm => "GLM",
        }
    }
}

/// Endpoint settings for one invocation.
#[derive(Clone, PartialEq, Eq)]
pub struct Route {
    /// Selected provider.
    pub provider: Provider,
    /// Value for `ANTHROPIC_BASE_URL`.
    pub base_url: String,
    /// Value for `ANTHROPIC_AUTH_TOKEN`, when one is available.
    pub auth_token: Option<String>,
    /// Value for `NO_PROXY`.
    pub no_proxy: String,
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "***"))
            .field("no_proxy", &self.no_proxy)
            .finish()
    }
}

/// Model slots of the router's `Router` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteSlot {
    /// Everyday requests.
    Default,
    /// Background work.
    Background,
    /// Reasoning-heavy requests.
    Think,
    /// Requests above the long-context threshold.
    LongContext,
    /// Requests that use web search.
    WebSearch,
    /// Image input.
    Image,
    /// Video input.
    Video,
}

/// `Router` section of the claude-code-router config.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouterSlots {
    /// Fallback model for every other slot.
    pub default: Option<String>,
    /// Model for background work.
    pub background: Option<String>,
    /// Model for reasoning-heavy requests.
    pub think: Option<String>,
    /// Model for long-context requests.
    pub long_context: Option<String>,
    /// Model for web-search requests.
    pub web_search: Option<String>,
    /// Model for image input.
    pub image: Option<String>,
    /// Model for video input.
    pub video: Option<String>,
}

/// The parts of `~/.claude-code-router/config.json` this crate reads.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RouterConfig {
    /// Key the router expects as bearer token.
    #[serde(rename = "APIKEY")]
    pub api_key: Option<String>,
    /// Per-slot model routing.
    #[serde(rename = "Router")]
    pub router: Option<RouterSlots>,
}

impl RouterConfig {
    /// Model configured for `slot`.
    ///
    /// An unset slot resolves to the router's `default`; an unset `default`
    /// resolves to `fallback`.
    #[must_use]
    pub fn model_for<'a>(&'a self, slot: RouteSlot, fallback: &'a str) -> &'a str {
        let Some(slots) = &self.router else {
            return fallback;
        };
        let chosen = match slot {
            RouteSlot::Default => None,
            RouteSlot::Background => slots.background.as_deref(),
            RouteSlot::Think => slots.think.as_deref(),
            RouteSlot::LongContext => slots.long_context.as_deref(),
            RouteSlot::WebSearch => slots.web_search.as_deref(),
            RouteSlot::Image => slots.image.as_deref(),
            RouteSlot::Video => slots.video.as_deref(),
        };
        let non_empty = |m: &&str| !m.is_empty();
        chosen
            .filter(non_empty)
            .or_else(|| slots.default.as_deref().filter(non_empty))
            .unwrap_or(fallback)
    }
}

/// Default location of the router config file.
#[must_use]
pub fn default_router_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".claude-code-router").join("config.json"))
}

/// Reads the router config. Any failure yields `None` and a warning.
pub async fn read_router_config(path: &Path) -> Option<RouterConfig> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Could not read router config");
            return None;
        }
    };
    match serde_json::from_str(&content) {
        Ok(config) => Some(config),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Could not parse router config");
            None
        }
    }
}

/// Picks the endpoint and token for `model`.
///
/// Router-backed models read the token from the router config file on every
/// call; GLM models use [`ClientConfig::glm_api_key`].
pub async fn select_route(model: &str, config: &ClientConfig) -> Route {
    let provider = Provider::for_model(model);
    let route = match provider {
        Provider::Glm => Route {
            provider,
            base_url: config.glm_base_url.clone(),
            auth_token: config.glm_api_key.clone().filter(|k| !k.is_empty()),
            no_proxy: String::new(),
        },
        Provider::Router => {
            let path = config
                .router_config_path
                .clone()
                .or_else(default_router_config_path);
            let auth_token = match path {
                Some(path) => read_router_config(&path)
                    .await
                    .and_then(|c| c.api_key)
                    .filter(|k| !k.is_empty()),
                None => None,
            };
            Route {
                provider,
                base_url: config.router_base_url.clone(),
                auth_token,
                no_proxy: ROUTER_NO_PROXY.to_string(),
            }
        }
    };
    tracing::info!(
        model,
        provider = provider.label(),
        base_url = %route.base_url,
        token = route.auth_token.is_some(),
        "Selected provider route"
    );
    route
}
