//! Product recommendations fused from business type, menu categories, an
//! associative predictor and optional AI suggestions.
//!
//! Scoring is deterministic: the same inputs always give the same ranking.

use crate::catalog;
use crate::models::{CompanyRecord, MenuCategory, ProductSuggestion, SocialProfile, SuggestionSource};

const MAX_SUGGESTIONS: usize = 12;

/// `(code, priority, reason)`
type Rule = (&'static str, u32, &'static str);

const BUSINESS_RULES: &[(&str, &[Rule])] = &[
    (
        "restaurante",
        &[
            ("334", 9, "Queijo para pratos principais"),
            ("5167", 8, "Carne bovina de qualidade"),
            ("597", 7, "Farinha multiuso"),
        ],
    ),
    (
        "lanchonete",
        &[
            ("5167", 9, "Carne para hambúrgueres"),
            ("271", 8, "Bacon para lanches"),
            ("597", 7, "Farinha para pães"),
        ],
    ),
    (
        "pizzaria",
        &[
            ("597", 10, "Farinha específica para pizza"),
            ("334", 9, "Queijo mozzarella"),
            ("277", 8, "Molho de tomate"),
        ],
    ),
    (
        "padaria",
        &[
            ("597", 10, "Farinha para panificação"),
            ("318", 9, "Fermento biológico"),
            ("48", 7, "Banha para massa"),
        ],
    ),
];

const BUSINESS_CONFIDENCE: f64 = 0.8;

/// `(code, priority, reason, confidence)`
type MenuRule = (&'static str, u32, &'static str, f64);

const MENU_RULES: &[(MenuCategory, &[MenuRule])] = &[
    (
        MenuCategory::Pizzas,
        &[
            ("597", 10, "Farinha para pizza", 0.95),
            ("334", 9, "Queijo mozzarella", 0.90),
            ("277", 8, "Molho de tomate", 0.85),
        ],
    ),
    (
        MenuCategory::Burgers,
        &[
            ("5167", 9, "Carne bovina", 0.90),
            ("271", 8, "Bacon", 0.85),
            ("334", 7, "Queijo", 0.80),
        ],
    ),
    (
        MenuCategory::Pasta,
        &[
            ("8563", 8, "Massa fresca", 0.85),
            ("334", 7, "Queijo para massas", 0.80),
            ("277", 6, "Molho de tomate", 0.75),
        ],
    ),
];

/// `(business type, products, association strength)`
const ASSOCIATIONS: &[(&str, &[&str], f64)] = &[
    ("pizzaria", &["597", "334", "277"], 0.9),
    ("lanchonete", &["5167", "271", "597"], 0.85),
    ("padaria", &["597", "318", "319"], 0.9),
    ("restaurante", &["334", "5167", "506"], 0.8),
];

const ASSOCIATION_PRIORITY: u32 = 8;
const AI_PRIORITY: u32 = 8;
const AI_CONFIDENCE: f64 = 0.7;

/// Signals the predictor reads.
#[derive(Debug, Clone)]
pub struct Features<'a> {
    pub menu_categories: &'a [MenuCategory],
    pub activity: &'a str,
    pub social_content: Option<&'a str>,
}

impl Features<'_> {
    /// Menu evidence first, then registry activity, then social content.
    pub fn business_type(&self) -> &'static str {
        if self.menu_categories.contains(&MenuCategory::Pizzas) {
            return "pizzaria";
        }
        if self.menu_categories.contains(&MenuCategory::Burgers) {
            return "lanchonete";
        }
        if self.activity.to_lowercase().contains("padaria") {
            return "padaria";
        }
        match self.social_content {
            Some("Pizzaria") => "pizzaria",
            Some("Lanchonete") => "lanchonete",
            Some("Padaria") => "padaria",
            _ => "restaurante",
        }
    }
}

/// Rules keyed on the registry activity. First matching type only.
pub fn business_type_suggestions(activity: &str) -> Vec<ProductSuggestion> {
    let activity = activity.to_lowercase();
    BUSINESS_RULES
        .iter()
        .find(|(kind, _)| activity.contains(kind))
        .map(|(_, rules)| {
            rules
                .iter()
                .map(|(code, priority, reason)| {
                    ProductSuggestion::new(
                        *code,
                        *priority,
                        *reason,
                        BUSINESS_CONFIDENCE,
                        SuggestionSource::BusinessType,
                    )
                })
                .collect()
        })
        .unwrap_or_default()
}

pub fn menu_suggestions(categories: &[MenuCategory]) -> Vec<ProductSuggestion> {
    categories
        .iter()
        .filter_map(|c| MENU_RULES.iter().find(|(rule_cat, _)| rule_cat == c))
        .flat_map(|(_, rules)| rules.iter())
        .map(|(code, priority, reason, confidence)| {
            ProductSuggestion::new(
                *code,
                *priority,
                *reason,
                *confidence,
                SuggestionSource::MenuAnalysis,
            )
        })
        .collect()
}

pub fn predicted_suggestions(features: &Features) -> Vec<ProductSuggestion> {
    let business_type = features.business_type();
    ASSOCIATIONS
        .iter()
        .find(|(kind, _, _)| *kind == business_type)
        .map(|(kind, products, strength)| {
            let confidence = (strength * 0.9).min(0.95);
            products
                .iter()
                .map(|code| {
                    ProductSuggestion::new(
                        *code,
                        ASSOCIATION_PRIORITY,
                        format!("Produto recomendado para {}", kind),
                        confidence,
                        SuggestionSource::MlPrediction,
                    )
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Codes proposed by an AI provider. Unknown catalog codes are dropped.
pub fn ai_suggestions(codes: &[String]) -> Vec<ProductSuggestion> {
    codes
        .iter()
        .map(|c| c.trim())
        .filter(|c| catalog::contains(c))
        .map(|code| {
            ProductSuggestion::new(
                code,
                AI_PRIORITY,
                "Sugerido pela análise de IA",
                AI_CONFIDENCE,
                SuggestionSource::AiSuggestion,
            )
        })
        .collect()
}

/// Sorts by score descending (stable for ties) and keeps the top 12.
pub fn rank(mut suggestions: Vec<ProductSuggestion>) -> Vec<ProductSuggestion> {
    suggestions.sort_by(|a, b| b.score.total_cmp(&a.score));
    suggestions.truncate(MAX_SUGGESTIONS);
    suggestions
}

/// Ranked suggestions for a prospect. The same product may appear once per source.
pub fn suggest(
    company: &CompanyRecord,
    menu_categories: &[MenuCategory],
    social: Option<&SocialProfile>,
    ai_codes: &[String],
) -> Vec<ProductSuggestion> {
    let features = Features {
        menu_categories,
        activity: &company.main_activity,
        social_content: social.map(|p| p.content_category.as_str()),
    };

    let mut all = business_type_suggestions(&company.main_activity);
    all.extend(menu_suggestions(menu_categories));
    all.extend(predicted_suggestions(&features));
    all.extend(ai_suggestions(ai_codes));

    tracing::debug!(
        "Ranking {} candidate suggestions (predicted type: {})",
        all.len(),
        features.business_type()
    );
    rank(all)
}
