//! Instagram / Facebook presence estimation.
//!
//! Each platform runs an ordered list of [`SocialStrategy`] implementations;
//! the first one yielding a profile wins and a failing strategy never aborts
//! the cascade. The last strategy is a heuristic simulation, so the client
//! always returns a profile. Numbers that were not observed are tagged
//! [`DataSource::Estimated`] with confidence at most 0.6.

use crate::cache::TtlCache;
use crate::clock::SharedClock;
use crate::config::{Config, SocialConfig};
use crate::errors::AppError;
use crate::models::{DataSource, Platform, SocialProfile, SocialSummary};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use regex::Regex;
use reqwest::Client;
use serde_json::Value;
use std::sync::{Arc, LazyLock, Mutex};
use std::time::Duration;

const SCRAPE_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";
const MAX_ESTIMATED_FOLLOWERS: u64 = 50_000;

static IG_URL_USER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"instagram\.com/@?([A-Za-z0-9_.]+)").expect("valid regex"));
static IG_BARE_USER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^@?([A-Za-z0-9_.]+)").expect("valid regex"));
static FB_PAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"facebook\.com/(?:pg/)?([^/?#]+)").expect("valid regex"));
static FB_BARE_PAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z0-9._-]+)$").expect("valid regex"));
static HTML_TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<title>([^<]+)</title>").expect("valid regex"));
static META_DESCRIPTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta\s+name="description"\s+content="([^"]+)""#).expect("valid regex")
});
static OG_TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta\s+property="og:title"\s+content="([^"]+)""#).expect("valid regex")
});
static OG_DESCRIPTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta\s+property="og:description"\s+content="([^"]+)""#)
        .expect("valid regex")
});
static SHARED_DATA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"window\._sharedData\s*=\s*(\{.*?\});\s*</script>").expect("valid regex")
});
static FOLLOWER_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)([\d.,]+)\s*(?:mil\s+)?(?:seguidores|followers|curtidas|likes)")
        .expect("valid regex")
});

// ============ Estimation ============

/// Heuristic follower and engagement estimates over an injectable RNG.
pub struct Estimator {
    rng: Mutex<StdRng>,
}

impl Estimator {
    /// Seeded for reproducible output, entropy-seeded otherwise.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        Self {
            rng: Mutex::new(rng),
        }
    }

    /// `len(identifier) * 73 + [100, 2100)`, capped at 50 000.
    pub fn followers(&self, identifier: &str) -> u64 {
        let base = if identifier.is_empty() {
            500
        } else {
            identifier.chars().count() as u64 * 73
        };
        let jitter = self.with_rng(|rng| rng.gen_range(100..2100));
        (base + jitter).min(MAX_ESTIMATED_FOLLOWERS)
    }

    /// Engagement percentage in [1, 5], two decimals.
    pub fn engagement(&self) -> f64 {
        let raw: f64 = self.with_rng(|rng| rng.gen_range(1.0..=5.0));
        (raw * 100.0).round() / 100.0
    }

    fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut rng)
    }
}

// ============ Strategies ============

struct Shared {
    client: Client,
    config: SocialConfig,
    estimator: Estimator,
}

impl Shared {
    fn instagram_profile_url(&self, username: &str) -> String {
        format!(
            "{}/{}/",
            self.config.instagram_profile_url.trim_end_matches('/'),
            username
        )
    }

    /// Fetches `url` through each configured proxy in order. An empty proxy means a direct request.
    async fn fetch_html(&self, url: &str) -> Result<Option<String>, AppError> {
        let mut last_error = None;
        for proxy in &self.config.proxies {
            let target = format!("{}{}", proxy, url);
            let response = self
                .client
                .get(&target)
                .header("User-Agent", SCRAPE_USER_AGENT)
                .send()
                .await;
            match response {
                Ok(r) if r.status().is_success() => return Ok(Some(r.text().await?)),
                Ok(r) => {
                    tracing::debug!("Proxy '{}' returned {}", proxy, r.status());
                    last_error = Some(AppError::provider_status(
                        "scrape",
                        r.status().as_u16(),
                        "proxy fetch failed",
                    ));
                }
                Err(e) => {
                    tracing::debug!("Proxy '{}' failed: {}", proxy, e);
                    last_error = Some(e.into());
                }
            }
        }
        match last_error {
            Some(e) => Err(e),
            None => Ok(None),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn estimated_profile(
        &self,
        platform: Platform,
        handle: &str,
        display_name: String,
        profile_url: String,
        content_category: String,
        bio: Option<String>,
        confidence: f64,
        strategy: &str,
    ) -> SocialProfile {
        SocialProfile {
            platform,
            handle: handle.to_string(),
            display_name,
            profile_url,
            followers: self.estimator.followers(handle),
            engagement_rate_pct: self.estimator.engagement(),
            content_category,
            bio,
            data_source: DataSource::Estimated,
            confidence: confidence.min(0.6),
            strategy: strategy.to_string(),
        }
    }
}

/// One step of a platform cascade. `Ok(None)` and `Err` both move on to the next step.
#[async_trait]
pub trait SocialStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    async fn fetch(&self, target: &str) -> Result<Option<SocialProfile>, AppError>;
}

struct InstagramOEmbed(Arc<Shared>);
struct InstagramScrape(Arc<Shared>);
struct InstagramSimulation(Arc<Shared>);
struct FacebookGraph(Arc<Shared>);
struct FacebookScrape(Arc<Shared>);
struct FacebookSimulation(Arc<Shared>);

#[async_trait]
impl SocialStrategy for InstagramOEmbed {
    fn name(&self) -> &'static str {
        "oembed"
    }

    async fn fetch(&self, username: &str) -> Result<Option<SocialProfile>, AppError> {
        let s = &self.0;
        let profile_url = s.instagram_profile_url(username);
        let response = s
            .client
            .get(&s.config.instagram_oembed_url)
            .query(&[("url", profile_url.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::provider_status(
                "instagram_oembed",
                response.status().as_u16(),
                "oEmbed não disponível",
            ));
        }

        let body: Value = response.json().await?;
        let title = body.get("title").and_then(Value::as_str).unwrap_or_default();
        let author = body
            .get("author_name")
            .and_then(Value::as_str)
            .unwrap_or(username)
            .to_string();

        Ok(Some(s.estimated_profile(
            Platform::Instagram,
            username,
            author,
            profile_url,
            content_type(title),
            None,
            0.6,
            self.name(),
        )))
    }
}

#[async_trait]
impl SocialStrategy for InstagramScrape {
    fn name(&self) -> &'static str {
        "scrape"
    }

    async fn fetch(&self, username: &str) -> Result<Option<SocialProfile>, AppError> {
        let s = &self.0;
        let profile_url = s.instagram_profile_url(username);
        let Some(html) = s.fetch_html(&profile_url).await? else {
            return Ok(None);
        };
        let page = parse_instagram_html(&html);

        let display_name = page
            .full_name
            .clone()
            .or_else(|| page.title.as_ref().map(|t| title_name(t)))
            .unwrap_or_else(|| username.to_string());
        let bio = page.biography.clone().or(page.description.clone());
        let category = content_type(bio.as_deref().or(page.title.as_deref()).unwrap_or(""));

        let profile = match page.followers {
            Some(followers) => SocialProfile {
                platform: Platform::Instagram,
                handle: username.to_string(),
                display_name,
                profile_url,
                followers,
                engagement_rate_pct: s.estimator.engagement(),
                content_category: category,
                bio,
                data_source: DataSource::Scraped,
                confidence: 0.8,
                strategy: self.name().to_string(),
            },
            None => s.estimated_profile(
                Platform::Instagram,
                username,
                display_name,
                profile_url,
                category,
                bio,
                0.6,
                self.name(),
            ),
        };
        Ok(Some(profile))
    }
}

#[async_trait]
impl SocialStrategy for InstagramSimulation {
    fn name(&self) -> &'static str {
        "simulation"
    }

    async fn fetch(&self, username: &str) -> Result<Option<SocialProfile>, AppError> {
        Ok(Some(self.simulate(username)))
    }
}

#[async_trait]
impl SocialStrategy for FacebookGraph {
    fn name(&self) -> &'static str {
        "graph_api"
    }

    async fn fetch(&self, page: &str) -> Result<Option<SocialProfile>, AppError> {
        let s = &self.0;
        let Some(token) = s.config.graph_access_token.as_deref() else {
            return Ok(None);
        };

        let url = format!("{}/{}", s.config.graph_api_url.trim_end_matches('/'), page);
        tracing::debug!("Graph API request: {}?access_token=[REDACTED]", url);

        let response = s
            .client
            .get(&url)
            .query(&[
                ("fields", "name,about,category,link,fan_count"),
                ("access_token", token),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::provider_status(
                "facebook_graph",
                response.status().as_u16(),
                "Facebook API não disponível",
            ));
        }

        let body: Value = response.json().await?;
        let Some(followers) = body.get("fan_count").and_then(Value::as_u64) else {
            return Err(AppError::provider("facebook_graph", "resposta sem fan_count"));
        };
        let text = |k: &str| body.get(k).and_then(Value::as_str).map(str::to_string);
        let about = text("about");

        Ok(Some(SocialProfile {
            platform: Platform::Facebook,
            handle: page.to_string(),
            display_name: text("name").unwrap_or_else(|| page.to_string()),
            profile_url: text("link").unwrap_or_else(|| facebook_url(page)),
            followers,
            engagement_rate_pct: s.estimator.engagement(),
            content_category: text("category")
                .unwrap_or_else(|| business_category(about.as_deref().unwrap_or(""))),
            bio: about,
            data_source: DataSource::Live,
            confidence: 0.95,
            strategy: self.name().to_string(),
        }))
    }
}

#[async_trait]
impl SocialStrategy for FacebookScrape {
    fn name(&self) -> &'static str {
        "scrape"
    }

    async fn fetch(&self, page: &str) -> Result<Option<SocialProfile>, AppError> {
        let s = &self.0;
        let url = facebook_url(page);
        let Some(html) = s.fetch_html(&url).await? else {
            return Ok(None);
        };

        let title = capture(&OG_TITLE, &html).or_else(|| capture(&HTML_TITLE, &html));
        let about = capture(&OG_DESCRIPTION, &html);
        let display_name = title
            .as_ref()
            .map(|t| title_name(t))
            .unwrap_or_else(|| page_display_name(page));
        let category = business_category(about.as_deref().or(title.as_deref()).unwrap_or(""));

        let followers = about
            .as_deref()
            .and_then(|a| FOLLOWER_TEXT.captures(a))
            .and_then(|c| c.get(0).map(|m| m.as_str().to_string()))
            .and_then(|m| parse_count(&m));

        let profile = match followers {
            Some(followers) => SocialProfile {
                platform: Platform::Facebook,
                handle: page.to_string(),
                display_name,
                profile_url: url,
                followers,
                engagement_rate_pct: s.estimator.engagement(),
                content_category: category,
                bio: about,
                data_source: DataSource::Scraped,
                confidence: 0.75,
                strategy: self.name().to_string(),
            },
            None => s.estimated_profile(
                Platform::Facebook,
                page,
                display_name,
                url,
                category,
                about,
                0.55,
                self.name(),
            ),
        };
        Ok(Some(profile))
    }
}

#[async_trait]
impl SocialStrategy for FacebookSimulation {
    fn name(&self) -> &'static str {
        "simulation"
    }

    async fn fetch(&self, page: &str) -> Result<Option<SocialProfile>, AppError> {
        Ok(Some(self.simulate(page)))
    }
}

// ============ Client ============

pub struct SocialClient {
    shared: Arc<Shared>,
    instagram: Vec<Box<dyn SocialStrategy>>,
    facebook: Vec<Box<dyn SocialStrategy>>,
    cache: TtlCache<SocialProfile>,
}

impl SocialClient {
    pub fn new(config: &Config, clock: SharedClock) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| AppError::provider("social", format!("Failed to create client: {}", e)))?;

        let shared = Arc::new(Shared {
            client,
            config: config.social.clone(),
            estimator: Estimator::new(config.social.seed),
        });

        let instagram: Vec<Box<dyn SocialStrategy>> = vec![
            Box::new(InstagramOEmbed(shared.clone())),
            Box::new(InstagramScrape(shared.clone())),
            Box::new(InstagramSimulation(shared.clone())),
        ];
        let facebook: Vec<Box<dyn SocialStrategy>> = vec![
            Box::new(FacebookGraph(shared.clone())),
            Box::new(FacebookScrape(shared.clone())),
            Box::new(FacebookSimulation(shared.clone())),
        ];

        Ok(Self {
            shared,
            instagram,
            facebook,
            cache: TtlCache::new("social", config.cache_ttls.social_secs, clock),
        })
    }

    pub async fn analyze_instagram(&self, input: &str) -> SocialProfile {
        let username = extract_instagram_username(input).unwrap_or_default();
        let key = format!("instagram_{}", normalize_key(&username));
        if let Some(cached) = self.cache.get(&key).await {
            return cached;
        }

        let profile = match run_cascade(&self.instagram, &username).await {
            Some(p) => p,
            None => InstagramSimulation(self.shared.clone()).simulate(&username),
        };
        self.cache.set(&key, profile.clone()).await;
        profile
    }

    pub async fn analyze_facebook(&self, input: &str) -> SocialProfile {
        let page = extract_facebook_page(input).unwrap_or_default();
        let key = format!("facebook_{}", normalize_key(input));
        if let Some(cached) = self.cache.get(&key).await {
            return cached;
        }

        let profile = match run_cascade(&self.facebook, &page).await {
            Some(p) => p,
            None => FacebookSimulation(self.shared.clone()).simulate(&page),
        };
        self.cache.set(&key, profile.clone()).await;
        profile
    }

    /// Analyzes every provided handle concurrently and aggregates the result.
    pub async fn analyze(&self, instagram: Option<&str>, facebook: Option<&str>) -> SocialSummary {
        let instagram = instagram.map(str::trim).filter(|s| !s.is_empty());
        let facebook = facebook.map(str::trim).filter(|s| !s.is_empty());

        let (ig, fb) = tokio::join!(
            async {
                match instagram {
                    Some(h) => Some(self.analyze_instagram(h).await),
                    None => None,
                }
            },
            async {
                match facebook {
                    Some(f) => Some(self.analyze_facebook(f).await),
                    None => None,
                }
            }
        );

        summarize(ig, fb)
    }
}

impl InstagramSimulation {
    fn simulate(&self, username: &str) -> SocialProfile {
        let s = &self.0;
        s.estimated_profile(
            Platform::Instagram,
            username,
            username.to_string(),
            s.instagram_profile_url(username),
            business_type_from_handle(username),
            Some(format!("Perfil comercial de {}", username)),
            0.6,
            "simulation",
        )
    }
}

impl FacebookSimulation {
    fn simulate(&self, page: &str) -> SocialProfile {
        let s = &self.0;
        let name = page_display_name(page);
        s.estimated_profile(
            Platform::Facebook,
            page,
            if name.is_empty() {
                "Página do Facebook".to_string()
            } else {
                name
            },
            facebook_url(page),
            "Negócio Local".to_string(),
            Some("Página comercial no Facebook".to_string()),
            0.5,
            "simulation",
        )
    }
}

async fn run_cascade(strategies: &[Box<dyn SocialStrategy>], target: &str) -> Option<SocialProfile> {
    for strategy in strategies {
        match strategy.fetch(target).await {
            Ok(Some(profile)) => {
                tracing::info!(
                    "Social profile '{}' resolved by {} ({:?})",
                    target,
                    strategy.name(),
                    profile.data_source
                );
                return Some(profile);
            }
            Ok(None) => tracing::debug!("Strategy {} yielded nothing for '{}'", strategy.name(), target),
            Err(e) => tracing::warn!("Strategy {} failed for '{}': {}", strategy.name(), target, e),
        }
    }
    None
}

/// Aggregates per-platform profiles. The estimated tag survives aggregation.
pub fn summarize(instagram: Option<SocialProfile>, facebook: Option<SocialProfile>) -> SocialSummary {
    let profiles: Vec<&SocialProfile> = [instagram.as_ref(), facebook.as_ref()]
        .into_iter()
        .flatten()
        .collect();

    let platforms = profiles.iter().map(|p| p.platform).collect();
    let total_followers = profiles.iter().map(|p| p.followers).sum();
    let engagement = if profiles.is_empty() {
        0.0
    } else {
        let mean =
            profiles.iter().map(|p| p.engagement_rate_pct).sum::<f64>() / profiles.len() as f64;
        (mean * 100.0).round() / 100.0
    };
    let estimated = profiles
        .iter()
        .any(|p| p.data_source == DataSource::Estimated);
    let main_content_type = profiles
        .first()
        .map(|p| p.content_category.clone())
        .unwrap_or_else(|| "Alimentício".to_string());

    let mut summary = SocialSummary {
        platforms,
        total_followers,
        engagement_rate_pct: engagement,
        hashtags: hashtags_for(&main_content_type),
        main_content_type,
        estimated,
        recommendations: Vec::new(),
        instagram: None,
        facebook: None,
    };
    if summary.has_presence() {
        summary.recommendations = recommendations(&summary);
    }
    summary.instagram = instagram;
    summary.facebook = facebook;
    summary
}

fn recommendations(summary: &SocialSummary) -> Vec<String> {
    let mut out = Vec::new();

    if summary.total_followers < 1_000 {
        out.push("Foque em crescer sua base de seguidores com conteúdo regular e use hashtags relevantes".to_string());
    } else if summary.total_followers < 5_000 {
        out.push("Continue postando regularmente e interaja mais com seus seguidores".to_string());
    } else {
        out.push("Considere parcerias com influenciadores locais para expandir seu alcance".to_string());
    }

    if summary.engagement_rate_pct < 2.0 {
        out.push("Melhore o engajamento fazendo mais perguntas e respondendo aos comentários".to_string());
    } else if summary.engagement_rate_pct > 4.0 {
        out.push("Excelente engajamento! Continue com o mesmo tipo de conteúdo".to_string());
    }

    if summary.main_content_type == "Restaurante" {
        out.push("Poste mais fotos dos pratos e do ambiente do restaurante".to_string());
        out.push("Considere fazer stories mostrando o preparo dos pratos".to_string());
    }

    out
}

// ============ Parsing helpers ============

#[derive(Debug, Default)]
struct InstagramPage {
    title: Option<String>,
    description: Option<String>,
    full_name: Option<String>,
    biography: Option<String>,
    followers: Option<u64>,
}

fn parse_instagram_html(html: &str) -> InstagramPage {
    let mut page = InstagramPage {
        title: capture(&HTML_TITLE, html),
        description: capture(&META_DESCRIPTION, html),
        ..Default::default()
    };

    let user = capture(&SHARED_DATA, html)
        .and_then(|json| serde_json::from_str::<Value>(&json).ok())
        .and_then(|data| {
            data.pointer("/entry_data/ProfilePage/0/graphql/user")
                .cloned()
        });

    if let Some(user) = user {
        page.followers = user
            .pointer("/edge_followed_by/count")
            .and_then(Value::as_u64);
        page.full_name = user
            .get("full_name")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        page.biography = user
            .get("biography")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
    }
    page
}

fn capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// "Name • Instagram photos" -> "Name".
fn title_name(title: &str) -> String {
    title
        .split(['•', '|'])
        .next()
        .unwrap_or(title)
        .trim()
        .to_string()
}

/// "1.234 curtidas" -> 1234, "12 mil seguidores" -> 12000,
/// "1,5 mil" -> 1500. `.` groups thousands and `,` marks decimals,
/// except a comma followed by exactly three digits, which groups thousands.
fn parse_count(text: &str) -> Option<u64> {
    let lower = text.to_lowercase();
    let number: String = lower
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();
    let thousands = lower[number.len()..].trim_start().starts_with("mil");

    let (whole, fraction) = match number.rsplit_once(',') {
        Some((w, f)) if thousands || f.len() != 3 => (w, f),
        _ => (number.as_str(), ""),
    };
    let whole: String = whole.chars().filter(char::is_ascii_digit).collect();
    let n: u64 = whole.parse().ok()?;
    if !thousands {
        return Some(n);
    }

    let mut millis: String = fraction.chars().filter(char::is_ascii_digit).take(3).collect();
    while millis.len() < 3 {
        millis.push('0');
    }
    let millis: u64 = millis.parse().ok()?;
    n.checked_mul(1_000)?.checked_add(millis)
}

pub fn extract_instagram_username(input: &str) -> Option<String> {
    let input = input.trim();
    IG_URL_USER
        .captures(input)
        .or_else(|| IG_BARE_USER.captures(input))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim_end_matches('.').to_string())
        .filter(|u| !u.is_empty())
}

pub fn extract_facebook_page(input: &str) -> Option<String> {
    let input = input.trim().trim_end_matches('/');
    FB_PAGE
        .captures(input)
        .or_else(|| FB_BARE_PAGE.captures(input))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

fn facebook_url(page: &str) -> String {
    format!("https://www.facebook.com/{}", page)
}

fn page_display_name(page: &str) -> String {
    page.replace(['.', '_', '-'], " ").trim().to_string()
}

fn normalize_key(raw: &str) -> String {
    raw.to_lowercase()
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect()
}

/// Content type from free text (title, bio).
pub fn content_type(text: &str) -> String {
    const TABLE: &[(&str, &[&str])] = &[
        ("Restaurante", &["restaurante", "comida", "prato", "sabor", "culinária"]),
        ("Pizzaria", &["pizza", "pizzaria", "italiana", "massa"]),
        ("Lanchonete", &["lanche", "hambúrguer", "sanduíche", "fast food"]),
        ("Padaria", &["pão", "padaria", "doce", "bolo", "confeitaria"]),
        ("Bar", &["bar", "bebida", "cerveja", "drinks", "happy hour"]),
    ];
    if text.trim().is_empty() {
        return "Geral".to_string();
    }
    let lower = text.to_lowercase();
    TABLE
        .iter()
        .find(|(_, words)| words.iter().any(|w| lower.contains(w)))
        .map(|(kind, _)| kind.to_string())
        .unwrap_or_else(|| "Alimentício".to_string())
}

/// Business type guessed from a handle.
pub fn business_type_from_handle(handle: &str) -> String {
    let name = handle.to_lowercase();
    let kind = if name.contains("pizza") {
        "Pizzaria"
    } else if name.contains("burger") || name.contains("lanche") {
        "Lanchonete"
    } else if name.contains("padaria") || name.contains("pao") {
        "Padaria"
    } else if name.contains("bar") || name.contains("drink") {
        "Bar"
    } else if name.contains("restaurante") || name.contains("food") {
        "Restaurante"
    } else {
        "Alimentício"
    };
    kind.to_string()
}

/// Facebook page category from its description.
pub fn business_category(text: &str) -> String {
    const TABLE: &[(&str, &[&str])] = &[
        ("Restaurante", &["restaurante", "culinária", "gastronomia"]),
        ("Comida e Bebida", &["comida", "bebida", "alimentação"]),
        ("Serviços Locais", &["serviços", "atendimento", "local"]),
        ("Varejo", &["loja", "venda", "produto"]),
    ];
    let lower = text.to_lowercase();
    TABLE
        .iter()
        .find(|(_, words)| words.iter().any(|w| lower.contains(w)))
        .map(|(kind, _)| kind.to_string())
        .unwrap_or_else(|| "Negócio Local".to_string())
}

pub fn hashtags_for(content_type: &str) -> Vec<String> {
    let tags: &[&str] = match content_type {
        "Pizzaria" => &["#pizzaria", "#pizza", "#italiana", "#massa", "#forno"],
        "Lanchonete" => &["#lanchonete", "#hamburger", "#lanche", "#fastfood", "#sanduiche"],
        "Padaria" => &["#padaria", "#paes", "#doces", "#bolos", "#confeitaria"],
        "Bar" => &["#bar", "#drinks", "#cerveja", "#happyhour", "#bebidas"],
        _ => &["#restaurante", "#gastronomia", "#sabor", "#culinaria", "#pratos"],
    };
    tags.iter().map(|t| t.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(platform: Platform, followers: u64, engagement: f64, source: DataSource) -> SocialProfile {
        SocialProfile {
            platform,
            handle: "x".into(),
            display_name: "x".into(),
            profile_url: "x".into(),
            followers,
            engagement_rate_pct: engagement,
            content_category: "Restaurante".into(),
            bio: None,
            data_source: source,
            confidence: 0.6,
            strategy: "test".into(),
        }
    }

    #[test]
    fn test_estimator_bounds() {
        let est = Estimator::new(Some(7));
        let long = "x".repeat(5_000);
        for handle in ["", "a", "pizzaria_do_ze", long.as_str()] {
            let f = est.followers(handle);
            assert!(f >= 100 && f <= MAX_ESTIMATED_FOLLOWERS, "{}", f);
            let e = est.engagement();
            assert!((1.0..=5.0).contains(&e), "{}", e);
        }
        assert_eq!(est.followers(&long), MAX_ESTIMATED_FOLLOWERS);
    }

    #[test]
    fn test_seeded_estimator_is_reproducible() {
        let a = Estimator::new(Some(42));
        let b = Estimator::new(Some(42));
        assert_eq!(a.followers("bella"), b.followers("bella"));
        assert_eq!(a.engagement(), b.engagement());
    }

    #[test]
    fn test_username_extraction() {
        assert_eq!(extract_instagram_username("@bella.pizza").as_deref(), Some("bella.pizza"));
        assert_eq!(
            extract_instagram_username("https://www.instagram.com/bella_pizza/").as_deref(),
            Some("bella_pizza")
        );
        assert_eq!(extract_instagram_username("   ").as_deref(), None);
    }

    #[test]
    fn test_facebook_page_extraction() {
        assert_eq!(
            extract_facebook_page("https://www.facebook.com/bar.do.ze/").as_deref(),
            Some("bar.do.ze")
        );
        assert_eq!(
            extract_facebook_page("facebook.com/123456?ref=x").as_deref(),
            Some("123456")
        );
        assert_eq!(extract_facebook_page("bardoze").as_deref(), Some("bardoze"));
        assert_eq!(page_display_name("bar.do_ze"), "bar do ze");
    }

    #[test]
    fn test_parse_instagram_html_shared_data() {
        let html = r#"<html><head><title>Bella Pizza • Instagram</title>
<meta name="description" content="A melhor pizza da cidade">
<script>window._sharedData = {"entry_data":{"ProfilePage":[{"graphql":{"user":{"edge_followed_by":{"count":12345},"full_name":"Bella Pizza","biography":"Pizzaria artesanal"}}}]}};</script>
</head></html>"#;
        let page = parse_instagram_html(html);
        assert_eq!(page.followers, Some(12_345));
        assert_eq!(page.full_name.as_deref(), Some("Bella Pizza"));
        assert_eq!(page.description.as_deref(), Some("A melhor pizza da cidade"));
        assert_eq!(title_name(page.title.as_deref().unwrap_or("")), "Bella Pizza");
    }

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count("1.234 curtidas"), Some(1_234));
        assert_eq!(parse_count("12 mil seguidores"), Some(12_000));
        assert_eq!(parse_count("1,5 mil seguidores"), Some(1_500));
        assert_eq!(parse_count("2,25 mil"), Some(2_250));
        assert_eq!(parse_count("1,234 followers"), Some(1_234));
        assert_eq!(parse_count("99999999999999999 mil seguidores"), None);
        assert_eq!(parse_count("99999999999999999999999 curtidas"), None);
        assert_eq!(parse_count("curtidas"), None);
    }

    #[test]
    fn test_keyword_classifiers() {
        assert_eq!(content_type(""), "Geral");
        assert_eq!(content_type("Forno a lenha, pizza napolitana"), "Pizzaria");
        assert_eq!(content_type("Loja de roupas"), "Alimentício");
        assert_eq!(business_type_from_handle("zeburger"), "Lanchonete");
        assert_eq!(business_category("Gastronomia mineira"), "Restaurante");
        assert_eq!(business_category(""), "Negócio Local");
        assert_eq!(hashtags_for("Desconhecido")[0], "#restaurante");
    }

    #[test]
    fn test_summary_keeps_estimated_tag() {
        let summary = summarize(
            Some(profile(Platform::Instagram, 800, 1.5, DataSource::Scraped)),
            Some(profile(Platform::Facebook, 100, 2.5, DataSource::Estimated)),
        );
        assert!(summary.estimated);
        assert_eq!(summary.total_followers, 900);
        assert_eq!(summary.engagement_rate_pct, 2.0);
        assert_eq!(summary.platforms, vec![Platform::Instagram, Platform::Facebook]);
        assert!(summary.recommendations[0].starts_with("Foque em crescer"));
        assert!(summary
            .recommendations
            .iter()
            .any(|r| r.contains("fotos dos pratos")));
    }

    #[test]
    fn test_empty_summary() {
        let summary = summarize(None, None);
        assert!(!summary.has_presence());
        assert!(!summary.estimated);
        assert!(summary.recommendations.is_empty());
    }
}
