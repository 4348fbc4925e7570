//! Competitor and market positioning for a prospect.
//!
//! Distributor competitors come from a JSON data file, or from a built-in
//! table when the file is absent or unreadable. Establishments found around
//! the prospect by the nearby-places query add local signals; an empty list
//! means "unknown", never an error.

use crate::errors::{AppError, ResultExt};
use crate::geocoding::NearbyPlace;
use crate::models::{BusinessType, MenuCategory, SizeClass};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;

/// Radius of the local competition query, in meters.
pub const LOCAL_RADIUS_M: u32 = 1_000;

const BASE_SCORE: f64 = 5.0;
const MAX_SCORE: f64 = 10.0;
const STRONG_SCORE: f64 = 7.5;
const MAX_LOCAL_NAMES: usize = 5;

const ENTRY_BARRIERS: &[&str] = &[
    "Necessidade de capital inicial alto",
    "Relacionamento estabelecido com fornecedores",
    "Logística e distribuição complexa",
    "Regulamentações sanitárias",
    "Economia de escala dos grandes players",
];

/// `(segment, market size, growth potential)`
const SEGMENTS: &[(&str, &str, &str)] = &[
    ("Food Service - Restaurantes", "R$ 45 bilhões", "Alto - crescimento de delivery"),
    ("Food Service - Padarias", "R$ 25 bilhões", "Médio - mercado consolidado"),
    ("Food Service - Lanchonetes", "R$ 15 bilhões", "Alto - fast food em crescimento"),
    ("Food Service - Hotéis", "R$ 8 bilhões", "Médio - recuperação pós-pandemia"),
    ("Varejo Alimentar", "R$ 120 bilhões", "Médio - mercado maduro"),
];

/// `(activity keyword, segment)`, first match wins.
const ACTIVITY_SEGMENTS: &[(&str, &str)] = &[
    ("restaurante", "Food Service - Restaurantes"),
    ("padaria", "Food Service - Padarias"),
    ("lanchonete", "Food Service - Lanchonetes"),
    ("hotel", "Food Service - Hotéis"),
    ("escola", "Food Service - Instituições"),
];

// ============ Data ============

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Presence {
    Nacional,
    Regional,
    #[default]
    Local,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Competitor {
    pub id: String,
    pub name: String,
    #[serde(default, rename = "type")]
    pub kind: String,
    /// Percent, 0-100.
    #[serde(default)]
    pub market_share: f64,
    #[serde(default = "base_score")]
    pub competitive_score: f64,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub weaknesses: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub target_audience: Vec<String>,
    /// Percent of our catalog the competitor also sells.
    #[serde(default)]
    pub products_overlap: f64,
    #[serde(default)]
    pub pricing_strategy: String,
    #[serde(default)]
    pub segment: Option<String>,
    #[serde(default)]
    pub geographical_presence: Presence,
}

fn base_score() -> f64 {
    BASE_SCORE
}

/// Accepts `"restaurantes"` as well as `["restaurantes", "padarias"]`.
fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        Some(OneOrMany::One(s)) => vec![s],
        Some(OneOrMany::Many(v)) => v,
        None => Vec::new(),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketData {
    #[serde(default)]
    pub total_market_size: String,
    #[serde(default)]
    pub growth_rate: String,
    #[serde(default)]
    pub opportunities: Vec<String>,
    #[serde(default)]
    pub threats: Vec<String>,
}

impl Default for MarketData {
    fn default() -> Self {
        Self {
            total_market_size: "R$ 850 bilhões".to_string(),
            growth_rate: "8.5%".to_string(),
            opportunities: vec!["digitalização".to_string(), "sustentabilidade".to_string()],
            threats: vec!["concorrência".to_string(), "inflação".to_string()],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Positioning {
    #[serde(default)]
    pub pmg_opportunities: Vec<String>,
    #[serde(default)]
    pub recommended_strategy: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetitorData {
    #[serde(default)]
    pub competitors: Vec<Competitor>,
    #[serde(default, rename = "market_analysis")]
    pub market: MarketData,
    #[serde(default)]
    pub positioning: Positioning,
}

impl Default for CompetitorData {
    fn default() -> Self {
        Self {
            competitors: vec![
                national_wholesaler(
                    "atacadao",
                    "Atacadão",
                    25.0,
                    8.2,
                    &["preços baixos", "variedade"],
                    &["atendimento"],
                ),
                national_wholesaler(
                    "assai",
                    "Assaí",
                    20.0,
                    7.9,
                    &["tecnologia", "logística"],
                    &["marca nova"],
                ),
            ],
            market: MarketData::default(),
            positioning: Positioning::default(),
        }
    }
}

fn national_wholesaler(
    id: &str,
    name: &str,
    market_share: f64,
    competitive_score: f64,
    strengths: &[&str],
    weaknesses: &[&str],
) -> Competitor {
    Competitor {
        id: id.to_string(),
        name: name.to_string(),
        kind: "atacadista".to_string(),
        market_share,
        competitive_score,
        strengths: strengths.iter().map(|s| s.to_string()).collect(),
        weaknesses: weaknesses.iter().map(|s| s.to_string()).collect(),
        target_audience: Vec::new(),
        products_overlap: 0.0,
        pricing_strategy: String::new(),
        segment: None,
        geographical_presence: Presence::Nacional,
    }
}

impl CompetitorData {
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&raw).map_err(|e| {
            AppError::Storage(format!(
                "dados de concorrentes ilegíveis em {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Built-in table when no path is configured or the file cannot be read.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };
        match Self::load(path) {
            Ok(data) => {
                tracing::info!(
                    "Loaded {} competitor(s) from {}",
                    data.competitors.len(),
                    path.display()
                );
                data
            }
            Err(e) => {
                tracing::warn!("⚠️ Competitor data unavailable, using defaults: {}", e);
                Self::default()
            }
        }
    }
}

// ============ Report ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Intensity {
    High,
    Medium,
    Low,
}

impl Intensity {
    pub fn label(&self) -> &'static str {
        match self {
            Intensity::High => "Alta",
            Intensity::Medium => "Média",
            Intensity::Low => "Baixa",
        }
    }

    fn from_count(count: usize, high: usize, medium: usize) -> Self {
        if count >= high {
            Intensity::High
        } else if count >= medium {
            Intensity::Medium
        } else {
            Intensity::Low
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedCompetitor {
    pub competitor: Competitor,
    /// Score adjusted to this prospect, capped at 10.
    pub competitive_score: f64,
    pub relevance: f64,
    pub threats: Vec<String>,
    pub opportunities: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketPosition {
    pub segment: String,
    pub size_estimate: String,
    pub growth_potential: String,
    pub competitive_intensity: Intensity,
    pub entry_barriers: Vec<String>,
}

/// Similar establishments around the prospect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalCompetition {
    pub radius_m: u32,
    pub count: usize,
    pub intensity: Intensity,
    pub names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetitorReport {
    pub generated_at: DateTime<Utc>,
    /// Sorted by descending relevance.
    pub competitors: Vec<RankedCompetitor>,
    pub market_position: MarketPosition,
    pub local: Option<LocalCompetition>,
    pub opportunities: Vec<String>,
    pub threats: Vec<String>,
    pub recommendations: Vec<String>,
}

/// What the analysis knows about the prospect.
#[derive(Debug, Clone, Copy)]
pub struct MarketContext<'a> {
    pub activity: &'a str,
    pub has_address: bool,
    pub size_class: SizeClass,
    pub menu_categories: &'a [MenuCategory],
    pub social_platforms: usize,
    pub nearby: &'a [NearbyPlace],
}

pub struct CompetitorAnalyzer {
    data: CompetitorData,
}

impl CompetitorAnalyzer {
    pub fn new(data: CompetitorData) -> Self {
        Self { data }
    }

    pub fn data(&self) -> &CompetitorData {
        &self.data
    }

    pub fn analyze(&self, ctx: &MarketContext, generated_at: DateTime<Utc>) -> CompetitorReport {
        let mut competitors: Vec<RankedCompetitor> = self
            .data
            .competitors
            .iter()
            .map(|c| RankedCompetitor {
                competitive_score: competitive_score(c, ctx),
                relevance: relevance(c),
                threats: competitor_threats(c),
                opportunities: competitor_opportunities(c),
                competitor: c.clone(),
            })
            .collect();
        competitors.sort_by(|a, b| b.relevance.total_cmp(&a.relevance));

        let segment = market_segment(ctx.activity);
        let local = local_competition(ctx.nearby);
        let market_position = MarketPosition {
            size_estimate: market_size(segment).to_string(),
            growth_potential: growth_potential(segment).to_string(),
            competitive_intensity: competitive_intensity(segment, &self.data.competitors),
            entry_barriers: ENTRY_BARRIERS.iter().map(|s| s.to_string()).collect(),
            segment: segment.to_string(),
        };

        let report = CompetitorReport {
            generated_at,
            opportunities: self.opportunities(ctx, local.as_ref()),
            threats: self.threats(local.as_ref()),
            recommendations: self.recommendations(ctx, segment),
            competitors,
            market_position,
            local,
        };
        tracing::debug!(
            "Competitor analysis: segment '{}', {} competitor(s), intensity {}",
            report.market_position.segment,
            report.competitors.len(),
            report.market_position.competitive_intensity.label()
        );
        report
    }

    fn opportunities(&self, ctx: &MarketContext, local: Option<&LocalCompetition>) -> Vec<String> {
        let mut out = Vec::new();
        if ctx.size_class == SizeClass::Micro {
            out.push("Atendimento personalizado para pequenos negócios".to_string());
        }
        if ctx.menu_categories.contains(&MenuCategory::Pizzas) {
            out.push("Especialização em produtos para pizzarias".to_string());
        }
        if ctx.social_platforms > 0 {
            out.push(
                "Cliente ativo em redes sociais - potencial para parceria digital".to_string(),
            );
        }
        if let Some(local) = local.filter(|l| l.intensity != Intensity::Low) {
            out.push(format!(
                "{} estabelecimentos similares em {} m - potencial para rota de entrega compartilhada",
                local.count, local.radius_m
            ));
        }
        out.extend(self.data.positioning.pmg_opportunities.iter().cloned());
        out
    }

    fn threats(&self, local: Option<&LocalCompetition>) -> Vec<String> {
        let mut out = Vec::new();
        let strong = self
            .data
            .competitors
            .iter()
            .filter(|c| c.competitive_score > STRONG_SCORE)
            .count();
        if strong > 2 {
            out.push("Múltiplos concorrentes fortes na região".to_string());
        }
        let price = self
            .data
            .competitors
            .iter()
            .filter(|c| c.pricing_strategy == "competitivo")
            .count();
        if price > 1 {
            out.push("Pressão competitiva nos preços".to_string());
        }
        if local.is_some_and(|l| l.intensity == Intensity::High) {
            out.push("Alta concentração de concorrentes diretos do prospect".to_string());
        }
        out.extend(self.data.market.threats.iter().cloned());
        out
    }

    fn recommendations(&self, ctx: &MarketContext, segment: &str) -> Vec<String> {
        let mut out: Vec<String> = self.data.positioning.recommended_strategy.clone();
        if segment.contains("Restaurantes") {
            out.push("Desenvolver linha específica para restaurantes".to_string());
            out.push("Oferecer consultoria em gestão de custos".to_string());
        }
        if segment.contains("Padarias") {
            out.push("Foco em produtos de panificação de alta qualidade".to_string());
            out.push("Treinamentos técnicos para padeiros".to_string());
        }
        if ctx.size_class == SizeClass::Micro {
            out.push("Programa especial para micro empresas".to_string());
            out.push("Condições de pagamento flexíveis".to_string());
        }
        out
    }
}

fn has(list: &[String], word: &str) -> bool {
    list.iter().any(|s| s.eq_ignore_ascii_case(word))
}

/// Base score plus activity and national-reach bonuses, capped at 10.
pub fn competitive_score(c: &Competitor, ctx: &MarketContext) -> f64 {
    let activity = ctx.activity.to_lowercase();
    let mut score = c.competitive_score;
    for (keyword, audience) in [
        ("restaurante", "restaurantes"),
        ("padaria", "padarias"),
        ("lanchonete", "lanchonetes"),
    ] {
        if activity.contains(keyword) && has(&c.target_audience, audience) {
            score += 0.5;
        }
    }
    if ctx.has_address && c.geographical_presence == Presence::Nacional {
        score += 0.3;
    }
    score.min(MAX_SCORE)
}

/// Product overlap, market share and reach, capped at 10.
pub fn relevance(c: &Competitor) -> f64 {
    let reach = match c.geographical_presence {
        Presence::Nacional => 1.0,
        Presence::Regional => 0.5,
        Presence::Local => 0.0,
    };
    (BASE_SCORE + c.products_overlap / 100.0 * 3.0 + c.market_share / 100.0 * 2.0 + reach)
        .min(MAX_SCORE)
}

fn competitor_threats(c: &Competitor) -> Vec<String> {
    let mut out = Vec::new();
    if c.market_share > 20.0 {
        out.push("Grande participação de mercado".to_string());
    }
    if c.pricing_strategy == "competitivo" {
        out.push("Preços muito competitivos".to_string());
    }
    if has(&c.strengths, "variedade") {
        out.push("Amplo portfólio de produtos".to_string());
    }
    if has(&c.strengths, "localização") {
        out.push("Melhor localização geográfica".to_string());
    }
    out
}

fn competitor_opportunities(c: &Competitor) -> Vec<String> {
    let mut out = Vec::new();
    if has(&c.weaknesses, "atendimento") {
        out.push("Diferenciação por qualidade no atendimento".to_string());
    }
    if has(&c.weaknesses, "qualidade variável") {
        out.push("Foco na qualidade consistente dos produtos".to_string());
    }
    if has(&c.weaknesses, "localização limitada") {
        out.push("Cobertura geográfica superior".to_string());
    }
    out
}

pub fn market_segment(activity: &str) -> &'static str {
    if activity.trim().is_empty() {
        return "Geral";
    }
    let activity = activity.to_lowercase();
    ACTIVITY_SEGMENTS
        .iter()
        .find(|(keyword, _)| activity.contains(keyword))
        .map(|(_, segment)| *segment)
        .unwrap_or("Varejo Alimentar")
}

fn market_size(segment: &str) -> &'static str {
    SEGMENTS
        .iter()
        .find(|(s, _, _)| *s == segment)
        .map(|(_, size, _)| *size)
        .unwrap_or("R$ 10 bilhões")
}

fn growth_potential(segment: &str) -> &'static str {
    SEGMENTS
        .iter()
        .find(|(s, _, _)| *s == segment)
        .map(|(_, _, growth)| *growth)
        .unwrap_or("Médio")
}

/// Competitors serving the segment's audience (the part after " - "),
/// or tagged as food-sector players.
pub fn competitive_intensity(segment: &str, competitors: &[Competitor]) -> Intensity {
    let audience = segment
        .rsplit(" - ")
        .next()
        .unwrap_or(segment)
        .to_lowercase();
    let count = competitors
        .iter()
        .filter(|c| {
            c.target_audience
                .iter()
                .any(|a| a.to_lowercase().contains(&audience))
                || c.segment.as_deref() == Some("alimenticio")
        })
        .count();
    Intensity::from_count(count, 4, 2)
}

/// `None` when nothing was found, since the query fails soft.
pub fn local_competition(nearby: &[NearbyPlace]) -> Option<LocalCompetition> {
    if nearby.is_empty() {
        return None;
    }
    Some(LocalCompetition {
        radius_m: LOCAL_RADIUS_M,
        count: nearby.len(),
        intensity: Intensity::from_count(nearby.len(), 10, 4),
        names: nearby
            .iter()
            .map(|p| p.name.clone())
            .filter(|n| !n.is_empty())
            .take(MAX_LOCAL_NAMES)
            .collect(),
    })
}

/// Amenity queried around the prospect for its business type.
pub fn amenity_for(business_type: BusinessType) -> &'static str {
    match business_type {
        BusinessType::SnackBar => "fast_food",
        BusinessType::Bar => "bar",
        BusinessType::Bakery => "cafe",
        BusinessType::Restaurant | BusinessType::Pizzeria | BusinessType::FoodService => {
            "restaurant"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Coordinates;
    use chrono::TimeZone;

    fn place(name: &str) -> NearbyPlace {
        NearbyPlace {
            id: 1,
            name: name.to_string(),
            kind: Some("restaurant".to_string()),
            cuisine: None,
            coordinates: Coordinates { lat: -30.03, lng: -51.23 },
            address: String::new(),
            phone: None,
            website: None,
            opening_hours: None,
        }
    }

    fn ctx<'a>(activity: &'a str, nearby: &'a [NearbyPlace]) -> MarketContext<'a> {
        MarketContext {
            activity,
            has_address: true,
            size_class: SizeClass::Micro,
            menu_categories: &[MenuCategory::Pizzas],
            social_platforms: 1,
            nearby,
        }
    }

    fn when() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_data_file_shapes() {
        let data: CompetitorData = serde_json::from_str(
            r#"{
                "competitors": [
                    {"id": "a", "name": "A", "market_share": 30, "target_audience": "restaurantes",
                     "geographical_presence": "regional", "pricing_strategy": "competitivo"},
                    {"id": "b", "name": "B", "target_audience": ["padarias", "restaurantes"]}
                ],
                "positioning": {"recommended_strategy": ["Entrega em 24h"]}
            }"#,
        )
        .unwrap();
        assert_eq!(data.competitors[0].target_audience, vec!["restaurantes"]);
        assert_eq!(data.competitors[0].geographical_presence, Presence::Regional);
        assert_eq!(data.competitors[1].competitive_score, BASE_SCORE);
        assert_eq!(data.competitors[1].geographical_presence, Presence::Local);
        assert_eq!(data.market, MarketData::default());
        assert_eq!(data.positioning.recommended_strategy, vec!["Entrega em 24h"]);
    }

    #[test]
    fn test_scores_are_adjusted_and_capped() {
        let mut c = CompetitorData::default().competitors.remove(0);
        c.target_audience = vec!["Restaurantes".to_string()];
        let score = competitive_score(&c, &ctx("Restaurantes e similares", &[]));
        assert!((score - 9.0).abs() < 1e-9, "got {}", score);

        c.competitive_score = 9.9;
        assert_eq!(competitive_score(&c, &ctx("restaurante", &[])), MAX_SCORE);

        c.products_overlap = 60.0;
        // 5 + 1.8 + 0.5 + 1.0
        assert!((relevance(&c) - 8.3).abs() < 1e-9);
    }

    #[test]
    fn test_default_report_for_restaurant() {
        let analyzer = CompetitorAnalyzer::new(CompetitorData::default());
        let report = analyzer.analyze(&ctx("Restaurantes e similares", &[]), when());

        assert_eq!(report.competitors[0].competitor.id, "atacadao");
        assert_eq!(
            report.competitors[0].threats,
            vec!["Grande participação de mercado", "Amplo portfólio de produtos"]
        );
        assert_eq!(
            report.competitors[0].opportunities,
            vec!["Diferenciação por qualidade no atendimento"]
        );

        let market = &report.market_position;
        assert_eq!(market.segment, "Food Service - Restaurantes");
        assert_eq!(market.size_estimate, "R$ 45 bilhões");
        assert_eq!(market.growth_potential, "Alto - crescimento de delivery");
        assert_eq!(market.competitive_intensity, Intensity::Low);
        assert_eq!(market.entry_barriers.len(), 5);

        assert_eq!(report.local, None);
        assert!(report
            .opportunities
            .contains(&"Especialização em produtos para pizzarias".to_string()));
        assert_eq!(report.threats, vec!["concorrência", "inflação"]);
        assert!(report
            .recommendations
            .contains(&"Oferecer consultoria em gestão de custos".to_string()));
        assert!(report
            .recommendations
            .contains(&"Programa especial para micro empresas".to_string()));
    }

    #[test]
    fn test_segment_fallbacks() {
        assert_eq!(market_segment(""), "Geral");
        assert_eq!(market_segment("Escola de idiomas"), "Food Service - Instituições");
        assert_eq!(market_segment("Comércio varejista"), "Varejo Alimentar");
        assert_eq!(market_size("Geral"), "R$ 10 bilhões");
        assert_eq!(growth_potential("Food Service - Instituições"), "Médio");
    }

    #[test]
    fn test_intensity_counts_segment_audience() {
        let mut data = CompetitorData::default();
        for c in &mut data.competitors {
            c.target_audience = vec!["restaurantes".to_string()];
        }
        assert_eq!(
            competitive_intensity("Food Service - Restaurantes", &data.competitors),
            Intensity::Medium
        );
        assert_eq!(
            competitive_intensity("Food Service - Padarias", &data.competitors),
            Intensity::Low
        );
    }

    #[test]
    fn test_local_competition_from_nearby_places() {
        let nearby: Vec<NearbyPlace> = (0..12).map(|i| place(&format!("Cantina {}", i))).collect();
        let local = local_competition(&nearby).unwrap();
        assert_eq!(local.count, 12);
        assert_eq!(local.intensity, Intensity::High);
        assert_eq!(local.names.len(), MAX_LOCAL_NAMES);

        let analyzer = CompetitorAnalyzer::new(CompetitorData::default());
        let report = analyzer.analyze(&ctx("restaurante", &nearby), when());
        assert!(report
            .threats
            .contains(&"Alta concentração de concorrentes diretos do prospect".to_string()));
        assert!(report.opportunities.iter().any(|o| o.starts_with("12 estabelecimentos")));

        assert_eq!(local_competition(&[place("Bar do Zé")]).unwrap().intensity, Intensity::Low);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        assert!(CompetitorData::load(&missing).is_err());
        assert_eq!(
            CompetitorData::load_or_default(Some(&missing)),
            CompetitorData::default()
        );

        let garbage = dir.path().join("garbage.json");
        std::fs::write(&garbage, "{").unwrap();
        assert!(matches!(CompetitorData::load(&garbage), Err(AppError::Storage(_))));
    }
}
