//! One prospect, end to end.
//!
//! Registry lookup is the only stage allowed to fail the analysis. Every
//! later stage degrades to estimates or templates instead.

use crate::ai::{AiClient, AnalysisBrief, ProviderHealth, SalesContext};
use crate::clock::SharedClock;
use crate::competitors::{self, CompetitorAnalyzer, CompetitorData, MarketContext};
use crate::config::Config;
use crate::errors::AppError;
use crate::geocoding::GeocodingClient;
use crate::menu;
use crate::models::{AnalysisResult, BusinessType, MenuCategory, ProspectInput};
use crate::recommendation;
use crate::registry::CompanyRegistryClient;
use crate::social::SocialClient;
use uuid::Uuid;

const SCRIPT_PRODUCTS: usize = 5;
const MISSING_ADDRESS: &str = "Endereço não informado";

pub struct ProspectAnalyzer {
    registry: CompanyRegistryClient,
    geocoding: GeocodingClient,
    social: SocialClient,
    ai: AiClient,
    competitors: CompetitorAnalyzer,
    health: ProviderHealth,
    clock: SharedClock,
}

impl ProspectAnalyzer {
    pub fn new(config: &Config, clock: SharedClock) -> Result<Self, AppError> {
        Ok(Self {
            registry: CompanyRegistryClient::new(config, clock.clone())?,
            geocoding: GeocodingClient::new(config, clock.clone())?,
            social: SocialClient::new(config, clock.clone())?,
            ai: AiClient::new(config, clock.clone())?,
            competitors: CompetitorAnalyzer::new(CompetitorData::load_or_default(
                config.competitors_path.as_deref(),
            )),
            health: ProviderHealth::from_config(config),
            clock,
        })
    }

    /// Current provider health, as updated by earlier analyses.
    pub fn health(&self) -> ProviderHealth {
        self.health
    }

    pub async fn analyze(&mut self, input: ProspectInput) -> Result<AnalysisResult, AppError> {
        tracing::info!("🔍 Analyzing prospect {}", input.tax_id);

        let mut company = self.registry.get_company_data(&input.tax_id).await?;
        let business_type = BusinessType::classify(&company.main_activity);

        let locate = async {
            if company.coordinates.is_some() || company.address == MISSING_ADDRESS {
                return None;
            }
            self.geocoding.get_coordinates(&company.address).await
        };
        let (coordinates, social) = tokio::join!(
            locate,
            self.social
                .analyze(input.instagram.as_deref(), input.facebook.as_deref())
        );
        if coordinates.is_some() {
            company.coordinates = coordinates;
        }
        tracing::info!(
            "Stage social done: {} platform(s), estimated={}",
            social.platforms.len(),
            social.estimated
        );

        let (menu_analysis, menu_insights) = match input.menu_text.as_deref() {
            Some(text) if input.has_menu() => {
                let local = menu::analyze(text);
                let insights = self.ai.analyze_menu(text, &mut self.health).await;
                tracing::info!(
                    "Stage menu done: {} item(s), {} categor(ies)",
                    local.items.len(),
                    local.categories.len()
                );
                (Some(local), Some(insights))
            }
            _ => (None, None),
        };

        let mut menu_categories: Vec<MenuCategory> = menu_analysis
            .as_ref()
            .map(|local| local.category_keys())
            .unwrap_or_default();
        if let Some(insights) = &menu_insights {
            for category in &insights.categories {
                if !menu_categories.contains(category) {
                    menu_categories.push(*category);
                }
            }
        }
        let ai_codes: &[String] = menu_insights
            .as_ref()
            .map(|i| i.suggested_products.as_slice())
            .unwrap_or_default();

        let suggestions = recommendation::suggest(
            &company,
            &menu_categories,
            social.primary_profile(),
            ai_codes,
        );

        let nearby = match company.coordinates {
            Some(center) => {
                self.geocoding
                    .nearby_places(
                        center,
                        competitors::amenity_for(business_type),
                        competitors::LOCAL_RADIUS_M,
                    )
                    .await
            }
            None => Vec::new(),
        };
        let generated_at = self.clock.now();
        let competition = self.competitors.analyze(
            &MarketContext {
                activity: &company.main_activity,
                has_address: company.address != MISSING_ADDRESS,
                size_class: company.size_class,
                menu_categories: &menu_categories,
                social_platforms: social.platforms.len(),
                nearby: &nearby,
            },
            generated_at,
        );
        tracing::info!(
            "Stage competition done: segment '{}', {} nearby establishment(s)",
            competition.market_position.segment,
            nearby.len()
        );

        let brief = AnalysisBrief::new(&input, Some(&company));
        let analysis = self.ai.analyze_prospect(&brief, &mut self.health).await;

        let mut products: Vec<String> = Vec::new();
        for s in &suggestions {
            if !products.contains(&s.product_code) {
                products.push(s.product_code.clone());
            }
            if products.len() == SCRIPT_PRODUCTS {
                break;
            }
        }
        let context = SalesContext {
            company_name: company.display_name().to_string(),
            activity: company.main_activity.clone(),
            address: company.address.clone(),
            menu_categories,
            platforms: social.platforms.clone(),
            products,
        };
        let sales_script = self.ai.generate_sales_script(&context, &mut self.health).await;

        tracing::info!(
            "✓ Prospect {} analyzed: {} suggestion(s), analysis via {:?}",
            company.tax_id,
            suggestions.len(),
            analysis.origin
        );

        Ok(AnalysisResult {
            id: Uuid::new_v4(),
            company,
            business_type,
            social,
            menu: menu_analysis,
            menu_insights,
            suggestions,
            analysis,
            sales_script,
            competition: Some(competition),
            generated_at,
        })
    }
}
