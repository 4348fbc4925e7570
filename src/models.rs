use crate::competitors::CompetitorReport;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

// ============ Company Registry ============

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// Registration status reported by the federal registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Situation {
    Active,
    Inactive,
    Suspended,
    Unknown,
}

impl Situation {
    /// Maps registry wording ("ATIVA", "BAIXADA", "SUSPENSA", ...) to a status.
    pub fn from_registry(raw: &str) -> Self {
        let upper = raw.trim().to_uppercase();
        if upper.is_empty() {
            Situation::Unknown
        } else if upper.starts_with("ATIV") || upper == "ACTIVE" {
            Situation::Active
        } else if upper.starts_with("SUSPENS") {
            Situation::Suspended
        } else if ["INAPTA", "BAIXADA", "NULA", "INATIVA", "INACTIVE"]
            .iter()
            .any(|s| upper.starts_with(s))
        {
            Situation::Inactive
        } else {
            Situation::Unknown
        }
    }
}

/// Company size derived from declared share capital.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SizeClass {
    Micro,
    Small,
    Medium,
    Large,
    Unknown,
}

impl SizeClass {
    /// Capital thresholds in BRL: 81k / 300k / 3.6M. Zero or non-finite is unknown.
    pub fn from_capital(capital: f64) -> Self {
        if !capital.is_finite() || capital <= 0.0 {
            SizeClass::Unknown
        } else if capital <= 81_000.0 {
            SizeClass::Micro
        } else if capital <= 300_000.0 {
            SizeClass::Small
        } else if capital <= 3_600_000.0 {
            SizeClass::Medium
        } else {
            SizeClass::Large
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SizeClass::Micro => "Microempresa",
            SizeClass::Small => "Empresa de Pequeno Porte",
            SizeClass::Medium => "Empresa de Médio Porte",
            SizeClass::Large => "Empresa de Grande Porte",
            SizeClass::Unknown => "Não informado",
        }
    }

    /// Estimated headcount band for the size class.
    pub fn employee_range(&self) -> Option<&'static str> {
        match self {
            SizeClass::Micro => Some("1-9"),
            SizeClass::Small => Some("10-49"),
            SizeClass::Medium => Some("50-249"),
            SizeClass::Large => Some("250+"),
            SizeClass::Unknown => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Partner {
    pub name: String,
    pub role: String,
    pub document: Option<String>,
}

/// Normalized company data, built from the first registry mirror that answered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyRecord {
    pub tax_id: String,
    pub tax_id_formatted: String,
    pub legal_name: String,
    pub trade_name: String,
    pub main_activity: String,
    pub secondary_activities: Vec<String>,
    pub address: String,
    /// Postal code as reported by the registry (digits only).
    pub postal_code: Option<String>,
    pub coordinates: Option<Coordinates>,
    pub phone: String,
    /// E.164 form of `phone` when it is a valid Brazilian number.
    pub phone_e164: Option<String>,
    pub email: String,
    pub situation: Situation,
    pub opening_date: Option<NaiveDate>,
    pub last_update: Option<NaiveDate>,
    pub capital: f64,
    pub capital_display: String,
    pub size_class: SizeClass,
    pub employee_range: Option<String>,
    pub is_mei: bool,
    pub simples_optant: bool,
    pub legal_nature: String,
    pub partners: Vec<Partner>,
    /// Name of the registry mirror that produced this record.
    pub source: String,
    /// Raw mirror payload, retained for diagnostics.
    pub raw: serde_json::Value,
}

impl CompanyRecord {
    /// Trade name when registered, legal name otherwise.
    pub fn display_name(&self) -> &str {
        if self.trade_name.trim().is_empty() {
            &self.legal_name
        } else {
            &self.trade_name
        }
    }
}

/// Formats a BRL amount as `R$ 1.234,56`.
pub fn format_brl(value: f64) -> String {
    let value = if value.is_finite() { value } else { 0.0 };
    let cents = (value.abs() * 100.0).round() as u64;
    let int_part = (cents / 100).to_string();
    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }
    let sign = if value < 0.0 && cents > 0 { "-" } else { "" };
    format!("{}R$ {},{:02}", sign, grouped, cents % 100)
}

// ============ Social ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Platform {
    Instagram,
    Facebook,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Instagram => write!(f, "Instagram"),
            Platform::Facebook => write!(f, "Facebook"),
        }
    }
}

/// Where a social metric came from. Estimated data never masquerades as live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataSource {
    Live,
    Scraped,
    Estimated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocialProfile {
    pub platform: Platform,
    pub handle: String,
    pub display_name: String,
    pub profile_url: String,
    pub followers: u64,
    pub engagement_rate_pct: f64,
    pub content_category: String,
    pub bio: Option<String>,
    pub data_source: DataSource,
    /// In [0, 1]; at most 0.6 when `data_source` is `Estimated`.
    pub confidence: f64,
    /// Strategy that produced the profile (oembed, graph_api, scrape, simulation).
    pub strategy: String,
}

/// Aggregate of every analyzed platform.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SocialSummary {
    pub platforms: Vec<Platform>,
    pub instagram: Option<SocialProfile>,
    pub facebook: Option<SocialProfile>,
    pub total_followers: u64,
    pub engagement_rate_pct: f64,
    pub main_content_type: String,
    pub hashtags: Vec<String>,
    pub recommendations: Vec<String>,
    /// True when any contributing profile is estimated rather than observed.
    pub estimated: bool,
}

impl SocialSummary {
    pub fn has_presence(&self) -> bool {
        !self.platforms.is_empty()
    }

    /// Profile with the highest confidence, used as the recommendation signal.
    pub fn primary_profile(&self) -> Option<&SocialProfile> {
        [self.instagram.as_ref(), self.facebook.as_ref()]
            .into_iter()
            .flatten()
            .fold(None, |best: Option<&SocialProfile>, p| match best {
                Some(b) if b.confidence >= p.confidence => Some(b),
                _ => Some(p),
            })
    }
}

// ============ Menu ============

/// Menu categories in matching priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MenuCategory {
    #[serde(rename = "pizzas")]
    Pizzas,
    #[serde(rename = "hamburgueres")]
    Burgers,
    #[serde(rename = "massas")]
    Pasta,
    #[serde(rename = "carnes")]
    Meats,
    #[serde(rename = "frutos_do_mar")]
    Seafood,
    #[serde(rename = "sobremesas")]
    Desserts,
    #[serde(rename = "bebidas")]
    Drinks,
    #[serde(rename = "entradas")]
    Starters,
    #[serde(rename = "outros")]
    Other,
}

impl MenuCategory {
    pub fn key(&self) -> &'static str {
        match self {
            MenuCategory::Pizzas => "pizzas",
            MenuCategory::Burgers => "hamburgueres",
            MenuCategory::Pasta => "massas",
            MenuCategory::Meats => "carnes",
            MenuCategory::Seafood => "frutos_do_mar",
            MenuCategory::Desserts => "sobremesas",
            MenuCategory::Drinks => "bebidas",
            MenuCategory::Starters => "entradas",
            MenuCategory::Other => "outros",
        }
    }

    /// Accepts our keys plus the accented/plural forms AI providers tend to return.
    pub fn from_key(raw: &str) -> Option<Self> {
        let k = raw.trim().to_lowercase();
        let k = k.as_str();
        Some(match k {
            "pizzas" | "pizza" => MenuCategory::Pizzas,
            "hamburgueres" | "hambúrgueres" | "hamburguers" | "lanches" | "burgers" => {
                MenuCategory::Burgers
            }
            "massas" | "massa" | "pasta" => MenuCategory::Pasta,
            "carnes" | "carne" => MenuCategory::Meats,
            "frutos_do_mar" | "frutos do mar" | "peixes" => MenuCategory::Seafood,
            "sobremesas" | "sobremesa" | "doces" => MenuCategory::Desserts,
            "bebidas" | "bebida" | "drinks" => MenuCategory::Drinks,
            "entradas" | "entrada" | "porções" | "porcoes" => MenuCategory::Starters,
            "outros" | "other" => MenuCategory::Other,
            _ => return None,
        })
    }
}

impl fmt::Display for MenuCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuItem {
    pub name: String,
    /// Price in BRL, rounded to cents. Always > 0 for extracted items.
    pub price: f64,
    pub category: Option<MenuCategory>,
    pub description: Option<String>,
}

/// Item counts per price band (upper bounds inclusive).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceDistribution {
    #[serde(rename = "0-15")]
    pub up_to_15: usize,
    #[serde(rename = "15-30")]
    pub up_to_30: usize,
    #[serde(rename = "30-50")]
    pub up_to_50: usize,
    #[serde(rename = "50-100")]
    pub up_to_100: usize,
    #[serde(rename = "100+")]
    pub above_100: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceStatistics {
    pub min: f64,
    pub max: f64,
    pub average: f64,
    pub median: f64,
    pub distribution: PriceDistribution,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngredientCount {
    pub ingredient: String,
    pub count: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MenuAnalysis {
    pub items: Vec<MenuItem>,
    pub categories: BTreeMap<MenuCategory, Vec<MenuItem>>,
    pub price_statistics: PriceStatistics,
    pub ingredients: Vec<IngredientCount>,
}

impl MenuAnalysis {
    /// Categories present, in priority order.
    pub fn category_keys(&self) -> Vec<MenuCategory> {
        self.categories.keys().copied().collect()
    }
}

// ============ AI ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI-chat-compatible endpoint.
    Grok,
    /// Google generative-content-compatible endpoint.
    Gemini,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Grok => write!(f, "grok"),
            ProviderKind::Gemini => write!(f, "gemini"),
        }
    }
}

/// How a piece of generated text was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "provider", rename_all = "snake_case")]
pub enum TextOrigin {
    Provider(ProviderKind),
    Cache(ProviderKind),
    Template,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiText {
    pub text: String,
    pub origin: TextOrigin,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    pub min: f64,
    pub max: f64,
    pub average: f64,
}

/// Structured reading of a menu, from an AI provider or the local analyzer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MenuInsights {
    pub categories: Vec<MenuCategory>,
    pub price_range: Option<PriceRange>,
    pub establishment_type: String,
    pub ingredients: Vec<String>,
    /// Catalog codes proposed by the provider, if any.
    pub suggested_products: Vec<String>,
    pub confidence: f64,
    pub origin: TextOrigin,
}

// ============ Recommendations ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SuggestionSource {
    BusinessType,
    MenuAnalysis,
    MlPrediction,
    AiSuggestion,
}

impl SuggestionSource {
    pub fn weight(&self) -> f64 {
        match self {
            SuggestionSource::AiSuggestion => 1.3,
            SuggestionSource::MlPrediction => 1.2,
            SuggestionSource::MenuAnalysis => 1.1,
            SuggestionSource::BusinessType => 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSuggestion {
    pub product_code: String,
    pub priority: u32,
    pub reason: String,
    pub confidence: f64,
    pub source: SuggestionSource,
    /// `priority × confidence × source weight`.
    pub score: f64,
}

impl ProductSuggestion {
    pub fn new(
        product_code: impl Into<String>,
        priority: u32,
        reason: impl Into<String>,
        confidence: f64,
        source: SuggestionSource,
    ) -> Self {
        let score = f64::from(priority) * confidence * source.weight();
        Self {
            product_code: product_code.into(),
            priority,
            reason: reason.into(),
            confidence,
            source,
            score,
        }
    }
}

// ============ Business type ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusinessType {
    Restaurant,
    Bakery,
    SnackBar,
    Pizzeria,
    Bar,
    FoodService,
}

impl BusinessType {
    /// Keyword match against the registry activity, first hit wins.
    pub fn classify(activity: &str) -> Self {
        let activity = activity.to_lowercase();
        if activity.contains("restaurante") {
            BusinessType::Restaurant
        } else if activity.contains("padaria") {
            BusinessType::Bakery
        } else if activity.contains("lanchonete") {
            BusinessType::SnackBar
        } else if activity.contains("pizza") {
            BusinessType::Pizzeria
        } else if activity.contains("bar") {
            BusinessType::Bar
        } else {
            BusinessType::FoodService
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BusinessType::Restaurant => "Restaurante",
            BusinessType::Bakery => "Padaria",
            BusinessType::SnackBar => "Lanchonete",
            BusinessType::Pizzeria => "Pizzaria",
            BusinessType::Bar => "Bar/Lancheria",
            BusinessType::FoodService => "Alimentício",
        }
    }
}

// ============ Prospect ============

/// What the operator submits for one prospect.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProspectInput {
    pub tax_id: String,
    pub instagram: Option<String>,
    pub facebook: Option<String>,
    pub website: Option<String>,
    pub menu_text: Option<String>,
}

impl ProspectInput {
    pub fn has_menu(&self) -> bool {
        self.menu_text
            .as_deref()
            .map(|m| !m.trim().is_empty())
            .unwrap_or(false)
    }

    pub fn has_social(&self) -> bool {
        [self.instagram.as_deref(), self.facebook.as_deref()]
            .into_iter()
            .flatten()
            .any(|s| !s.trim().is_empty())
    }
}

/// One prospect analysis. Built once by the orchestrator, never mutated by a client afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub id: Uuid,
    pub company: CompanyRecord,
    pub business_type: BusinessType,
    pub social: SocialSummary,
    pub menu: Option<MenuAnalysis>,
    pub menu_insights: Option<MenuInsights>,
    pub suggestions: Vec<ProductSuggestion>,
    pub analysis: AiText,
    pub sales_script: AiText,
    pub competition: Option<CompetitorReport>,
    pub generated_at: DateTime<Utc>,
}
