use serde::Deserialize;
use std::path::PathBuf;
use std::str::FromStr;

/// Connection and quota settings for one AI text-generation provider.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    pub endpoint: String,
    pub model_id: String,
    pub api_key: Option<String>,
    /// When false the client never touches the network and always answers from its template.
    pub enabled: bool,
    pub requests_per_window: usize,
    pub window_ms: u64,
}

/// Response schema spoken by a registry mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrySchema {
    ReceitaWs,
    BrasilApi,
    CnpjWs,
    /// Unknown mirror: probe every field name we know about.
    Generic,
}

impl FromStr for RegistrySchema {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "receitaws" => RegistrySchema::ReceitaWs,
            "brasilapi" => RegistrySchema::BrasilApi,
            "cnpjws" | "cnpj.ws" => RegistrySchema::CnpjWs,
            _ => RegistrySchema::Generic,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegistryMirror {
    pub name: String,
    /// Queried as `{base_url}{14-digit tax id}`.
    pub base_url: String,
    pub schema: RegistrySchema,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    pub mirrors: Vec<RegistryMirror>,
    pub requests_per_window: usize,
    pub window_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeocodingConfig {
    /// Free-text search geocoder (Nominatim-compatible).
    pub search_url: String,
    /// Reverse geocoder (Nominatim-compatible).
    pub reverse_url: String,
    /// Postal-code lookup (ViaCEP-compatible), queried as `{url}/{cep}/json/`.
    pub postal_code_url: String,
    /// Nearby places (Overpass-compatible interpreter endpoint).
    pub nearby_url: String,
    /// Road routing (OSRM-compatible).
    pub routing_url: String,
    pub country_code: String,
    pub user_agent: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SocialConfig {
    pub instagram_oembed_url: String,
    pub instagram_profile_url: String,
    pub graph_api_url: String,
    pub graph_access_token: Option<String>,
    /// URL prefixes tried in order for HTML fetches. An empty prefix fetches directly.
    pub proxies: Vec<String>,
    /// Fixed seed for the heuristic estimator; entropy-seeded when absent.
    pub seed: Option<u64>,
}

/// Time-to-live per cache namespace, in seconds.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheTtls {
    pub company_secs: u64,
    pub social_secs: u64,
    pub ai_secs: u64,
    pub geocoding_secs: u64,
    pub menu_secs: u64,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            company_secs: 86_400,
            social_secs: 3_600,
            ai_secs: 7_200,
            geocoding_secs: 86_400,
            menu_secs: 3_600,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub grok: ProviderConfig,
    pub gemini: ProviderConfig,
    pub registry: RegistryConfig,
    pub geocoding: GeocodingConfig,
    pub social: SocialConfig,
    pub cache_ttls: CacheTtls,
    pub request_timeout_secs: u64,
    pub history_path: PathBuf,
    /// Entries kept in the history file. Counters cover every analysis.
    pub history_max_entries: usize,
    /// Competitor data file; the built-in table is used when unset.
    pub competitors_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            grok: ProviderConfig {
                endpoint: "https://api.x.ai/v1".to_string(),
                model_id: "grok-2-1212".to_string(),
                api_key: None,
                enabled: false,
                requests_per_window: 50,
                window_ms: 60_000,
            },
            gemini: ProviderConfig {
                endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
                model_id: "gemini-1.5-flash".to_string(),
                api_key: None,
                enabled: false,
                requests_per_window: 30,
                window_ms: 60_000,
            },
            registry: RegistryConfig {
                mirrors: vec![
                    RegistryMirror {
                        name: "receitaws".to_string(),
                        base_url: "https://receitaws.com.br/v1/cnpj/".to_string(),
                        schema: RegistrySchema::ReceitaWs,
                    },
                    RegistryMirror {
                        name: "brasilapi".to_string(),
                        base_url: "https://brasilapi.com.br/api/cnpj/v1/".to_string(),
                        schema: RegistrySchema::BrasilApi,
                    },
                    RegistryMirror {
                        name: "cnpjws".to_string(),
                        base_url: "https://publica.cnpj.ws/cnpj/".to_string(),
                        schema: RegistrySchema::CnpjWs,
                    },
                ],
                requests_per_window: 2,
                window_ms: 60_000,
            },
            geocoding: GeocodingConfig {
                search_url: "https://nominatim.openstreetmap.org/search".to_string(),
                reverse_url: "https://nominatim.openstreetmap.org/reverse".to_string(),
                postal_code_url: "https://viacep.com.br/ws".to_string(),
                nearby_url: "https://overpass-api.de/api/interpreter".to_string(),
                routing_url: "https://router.project-osrm.org".to_string(),
                country_code: "br".to_string(),
                user_agent: "PMG-ProspecPro/1.0 (contato@pmg.com.br)".to_string(),
            },
            social: SocialConfig {
                instagram_oembed_url: "https://api.instagram.com/oembed/".to_string(),
                instagram_profile_url: "https://www.instagram.com".to_string(),
                graph_api_url: "https://graph.facebook.com/v18.0".to_string(),
                graph_access_token: None,
                proxies: vec![
                    String::new(),
                    "https://api.allorigins.win/raw?url=".to_string(),
                ],
                seed: None,
            },
            cache_ttls: CacheTtls::default(),
            request_timeout_secs: 10,
            history_path: PathBuf::from("prospect_history.json"),
            history_max_entries: crate::history::DEFAULT_MAX_ENTRIES,
            competitors_path: None,
        }
    }
}

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.trim().is_empty())
}

fn env_url(name: &str, default: &str) -> anyhow::Result<String> {
    match env_opt(name) {
        Some(url) => {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                anyhow::bail!("{} must start with http:// or https://", name);
            }
            Ok(url)
        }
        None => Ok(default.to_string()),
    }
}

fn env_parse<T: FromStr>(name: &str, default: T) -> anyhow::Result<T> {
    match env_opt(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{} has an invalid value: {}", name, raw)),
        None => Ok(default),
    }
}

fn env_bool(name: &str, default: bool) -> bool {
    match env_opt(name) {
        Some(v) => matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        None => default,
    }
}

fn provider_from_env(prefix: &str, defaults: &ProviderConfig) -> anyhow::Result<ProviderConfig> {
    let api_key = env_opt(&format!("{}_API_KEY", prefix));
    // A provider with no key can only ever fail, so it starts disabled.
    let enabled = env_bool(&format!("{}_ENABLED", prefix), true) && api_key.is_some();
    if !enabled {
        tracing::warn!("{} provider disabled (no API key or {}_ENABLED=false)", prefix, prefix);
    }

    let window_ms: u64 = env_parse(&format!("{}_WINDOW_MS", prefix), defaults.window_ms)?;
    if window_ms == 0 {
        anyhow::bail!("{}_WINDOW_MS must be greater than zero", prefix);
    }

    Ok(ProviderConfig {
        endpoint: env_url(&format!("{}_BASE_URL", prefix), &defaults.endpoint)?,
        model_id: env_opt(&format!("{}_MODEL", prefix)).unwrap_or_else(|| defaults.model_id.clone()),
        api_key,
        enabled,
        requests_per_window: env_parse(
            &format!("{}_REQUESTS_PER_WINDOW", prefix),
            defaults.requests_per_window,
        )?,
        window_ms,
    })
}

/// Parses `schema=url,schema=url` into registry mirrors, preserving order.
pub fn parse_mirrors(raw: &str) -> anyhow::Result<Vec<RegistryMirror>> {
    let mut mirrors = Vec::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (name, url) = match entry.split_once('=') {
            Some((name, url)) => (name.trim().to_string(), url.trim().to_string()),
            None => ("generic".to_string(), entry.to_string()),
        };
        if !url.starts_with("http://") && !url.starts_with("https://") {
            anyhow::bail!("REGISTRY_MIRRORS entry must be an http(s) URL: {}", entry);
        }
        let schema = name.parse().unwrap_or(RegistrySchema::Generic);
        mirrors.push(RegistryMirror {
            name,
            base_url: url,
            schema,
        });
    }
    if mirrors.is_empty() {
        anyhow::bail!("REGISTRY_MIRRORS cannot be empty");
    }
    Ok(mirrors)
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Config::default();

        let registry = RegistryConfig {
            mirrors: match env_opt("REGISTRY_MIRRORS") {
                Some(raw) => parse_mirrors(&raw)?,
                None => defaults.registry.mirrors.clone(),
            },
            requests_per_window: env_parse(
                "REGISTRY_REQUESTS_PER_WINDOW",
                defaults.registry.requests_per_window,
            )?,
            window_ms: env_parse("REGISTRY_WINDOW_MS", defaults.registry.window_ms)?,
        };

        let geocoding = GeocodingConfig {
            search_url: env_url("GEOCODER_SEARCH_URL", &defaults.geocoding.search_url)?,
            reverse_url: env_url("GEOCODER_REVERSE_URL", &defaults.geocoding.reverse_url)?,
            postal_code_url: env_url("POSTAL_CODE_URL", &defaults.geocoding.postal_code_url)?,
            nearby_url: env_url("NEARBY_PLACES_URL", &defaults.geocoding.nearby_url)?,
            routing_url: env_url("ROUTING_URL", &defaults.geocoding.routing_url)?,
            country_code: env_opt("GEOCODER_COUNTRY")
                .unwrap_or_else(|| defaults.geocoding.country_code.clone()),
            user_agent: env_opt("HTTP_USER_AGENT")
                .unwrap_or_else(|| defaults.geocoding.user_agent.clone()),
        };

        let social = SocialConfig {
            instagram_oembed_url: env_url(
                "INSTAGRAM_OEMBED_URL",
                &defaults.social.instagram_oembed_url,
            )?,
            instagram_profile_url: env_url(
                "INSTAGRAM_PROFILE_URL",
                &defaults.social.instagram_profile_url,
            )?,
            graph_api_url: env_url("FACEBOOK_GRAPH_URL", &defaults.social.graph_api_url)?,
            graph_access_token: env_opt("FACEBOOK_ACCESS_TOKEN"),
            proxies: match env_opt("SCRAPE_PROXIES") {
                Some(raw) => raw
                    .split(',')
                    .map(|p| p.trim().trim_matches('"').to_string())
                    .collect(),
                None => defaults.social.proxies.clone(),
            },
            seed: match env_opt("SOCIAL_SEED") {
                Some(raw) => Some(
                    raw.parse()
                        .map_err(|_| anyhow::anyhow!("SOCIAL_SEED must be an integer"))?,
                ),
                None => None,
            },
        };

        let config = Self {
            grok: provider_from_env("GROK", &defaults.grok)?,
            gemini: provider_from_env("GEMINI", &defaults.gemini)?,
            registry,
            geocoding,
            social,
            cache_ttls: defaults.cache_ttls.clone(),
            request_timeout_secs: env_parse("REQUEST_TIMEOUT_SECS", defaults.request_timeout_secs)?,
            history_path: env_opt("HISTORY_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.history_path),
            history_max_entries: env_parse("HISTORY_MAX_ENTRIES", defaults.history_max_entries)?,
            competitors_path: env_opt("COMPETITORS_DATA_PATH").map(PathBuf::from),
        };

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!(
            "Registry mirrors: {:?}",
            config
                .registry
                .mirrors
                .iter()
                .map(|m| m.name.as_str())
                .collect::<Vec<_>>()
        );
        tracing::debug!(
            "AI providers: grok={} gemini={}",
            config.grok.enabled,
            config.gemini.enabled
        );
        tracing::debug!("History path: {}", config.history_path.display());

        Ok(config)
    }
}
