//! Text generation through two interchangeable providers.
//!
//! Grok speaks the OpenAI chat-completions dialect, Gemini the Google
//! generative-content one. Each sits behind its own rate limiter and an
//! enabled flag held in [`ProviderHealth`]. Nothing here fails outward:
//! a disabled, throttled or broken provider degrades to a local template
//! or heuristic parser.

use crate::cache::TtlCache;
use crate::catalog;
use crate::clock::SharedClock;
use crate::config::{Config, ProviderConfig};
use crate::errors::AppError;
use crate::menu;
use crate::models::{
    AiText, BusinessType, CompanyRecord, MenuCategory, MenuInsights, Platform, PriceRange,
    ProspectInput, ProviderKind, TextOrigin,
};
use crate::rate_limiter::RateLimiter;
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::sync::LazyLock;
use std::time::Duration;

const ANALYST_ROLE: &str =
    "Você é um especialista em análise comercial para o atacado alimentício PMG. Seja prático e objetivo.";
const SALES_ROLE: &str = "Você é um especialista em vendas B2B para o setor alimentício. \
Analise as informações do prospect e forneça insights acionáveis para a equipe comercial da PMG Atacadista.";

const ANALYSIS_MAX_TOKENS: u32 = 1000;
const QUERY_MAX_TOKENS: u32 = 800;

const JSON_CONFIDENCE: f64 = 0.85;
const TEXT_CONFIDENCE: f64 = 0.7;
const LOCAL_CONFIDENCE: f64 = 0.5;

static PRICE_MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"R\$\s*(\d+(?:[.,]\d{1,2})?)").expect("valid regex"));

const TEXT_CATEGORIES: &[(MenuCategory, &[&str])] = &[
    (MenuCategory::Pizzas, &["pizza", "pizzaria"]),
    (MenuCategory::Burgers, &["hambúrguer", "burger", "lanche"]),
    (MenuCategory::Pasta, &["massa", "espaguete", "lasanha", "macarrão"]),
    (MenuCategory::Meats, &["carne", "bife", "frango", "peixe"]),
    (MenuCategory::Desserts, &["sobremesa", "doce", "pudim", "torta"]),
    (MenuCategory::Drinks, &["bebida", "refrigerante", "suco", "água"]),
];

const ESTABLISHMENT_TYPES: &[(&str, &[&str])] = &[
    ("pizzaria", &["pizza"]),
    ("lanchonete", &["lanche", "hambúrguer"]),
    ("restaurante", &["restaurante", "prato"]),
    ("padaria", &["pão", "padaria"]),
    ("sorveteria", &["sorvete", "açaí"]),
];

const COMMON_INGREDIENTS: &[&str] = &[
    "queijo", "tomate", "cebola", "alho", "carne", "frango", "massa", "farinha", "leite", "ovo",
    "azeite", "tempero",
];

/// Which providers may still be called. Owned by the caller so a 403 is
/// remembered across calls without any process-wide state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderHealth {
    pub grok_enabled: bool,
    pub gemini_enabled: bool,
}

impl ProviderHealth {
    /// A provider starts enabled only if configured so and it has a key.
    pub fn from_config(config: &Config) -> Self {
        Self {
            grok_enabled: config.grok.enabled && config.grok.api_key.is_some(),
            gemini_enabled: config.gemini.enabled && config.gemini.api_key.is_some(),
        }
    }

    pub fn all_disabled() -> Self {
        Self {
            grok_enabled: false,
            gemini_enabled: false,
        }
    }

    pub fn is_enabled(&self, kind: ProviderKind) -> bool {
        match kind {
            ProviderKind::Grok => self.grok_enabled,
            ProviderKind::Gemini => self.gemini_enabled,
        }
    }

    pub fn disable(&mut self, kind: ProviderKind) {
        match kind {
            ProviderKind::Grok => self.grok_enabled = false,
            ProviderKind::Gemini => self.gemini_enabled = false,
        }
    }
}

/// One prompt-in, text-out backend.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Returns the generated text. An empty or malformed body is an error.
    async fn generate(
        &self,
        role: Option<&str>,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<String, AppError>;
}

/// OpenAI-chat-compatible endpoint.
pub struct GrokProvider {
    client: Client,
    config: ProviderConfig,
}

impl GrokProvider {
    pub fn new(client: Client, config: ProviderConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl TextGenerator for GrokProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Grok
    }

    async fn generate(
        &self,
        role: Option<&str>,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<String, AppError> {
        let url = format!("{}/chat/completions", self.config.endpoint.trim_end_matches('/'));
        tracing::debug!("Grok request: {}", url);

        let mut messages = Vec::new();
        if let Some(role) = role {
            messages.push(json!({ "role": "system", "content": role }));
        }
        messages.push(json!({ "role": "user", "content": prompt }));

        let body = json!({
            "model": self.config.model_id,
            "messages": messages,
            "temperature": 0.7,
            "max_tokens": max_tokens,
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.config.api_key.as_deref().unwrap_or_default())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::provider_status(
                "grok",
                status.as_u16(),
                format!("returned {}", status),
            ));
        }

        let data: Value = response.json().await?;
        non_empty(
            "grok",
            data.pointer("/choices/0/message/content").and_then(Value::as_str),
        )
    }
}

/// Google generative-content-compatible endpoint.
pub struct GeminiProvider {
    client: Client,
    config: ProviderConfig,
}

impl GeminiProvider {
    pub fn new(client: Client, config: ProviderConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl TextGenerator for GeminiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    async fn generate(
        &self,
        role: Option<&str>,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<String, AppError> {
        let base = format!(
            "{}/models/{}:generateContent",
            self.config.endpoint.trim_end_matches('/'),
            self.config.model_id
        );
        tracing::debug!("Gemini request: {}?key=***", base);

        let text = match role {
            Some(role) => format!("{}\n\n{}", role, prompt),
            None => prompt.to_string(),
        };
        let body = json!({
            "contents": [{ "parts": [{ "text": text }] }],
            "generationConfig": {
                "temperature": 0.8,
                "maxOutputTokens": max_tokens,
                "topP": 0.8,
                "topK": 10,
            },
        });

        let response = self
            .client
            .post(&base)
            .query(&[("key", self.config.api_key.as_deref().unwrap_or_default())])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::provider_status(
                "gemini",
                status.as_u16(),
                format!("returned {}", status),
            ));
        }

        let data: Value = response.json().await?;
        non_empty(
            "gemini",
            data.pointer("/candidates/0/content/parts/0/text")
                .and_then(Value::as_str),
        )
    }
}

fn non_empty(provider: &str, text: Option<&str>) -> Result<String, AppError> {
    match text.map(str::trim) {
        Some(t) if !t.is_empty() => Ok(t.to_string()),
        _ => Err(AppError::provider(provider, "Resposta inválida da API")),
    }
}

/// Prospect fields the analysis prompt and template are built from.
#[derive(Debug, Clone, Default)]
pub struct AnalysisBrief {
    pub tax_id: String,
    pub company_name: Option<String>,
    pub activity: Option<String>,
    pub instagram: Option<String>,
    pub facebook: Option<String>,
    pub website: Option<String>,
    pub menu_text: Option<String>,
}

impl AnalysisBrief {
    pub fn new(input: &ProspectInput, company: Option<&CompanyRecord>) -> Self {
        Self {
            tax_id: input.tax_id.clone(),
            company_name: company.map(|c| c.display_name().to_string()),
            activity: company
                .map(|c| c.main_activity.clone())
                .filter(|a| !a.is_empty()),
            instagram: input.instagram.clone(),
            facebook: input.facebook.clone(),
            website: input.website.clone(),
            menu_text: input.menu_text.clone(),
        }
    }

    fn has_menu(&self) -> bool {
        present(&self.menu_text)
    }

    fn has_social(&self) -> bool {
        present(&self.instagram) || present(&self.facebook)
    }
}

/// Inputs for a sales script.
#[derive(Debug, Clone, Default)]
pub struct SalesContext {
    pub company_name: String,
    pub activity: String,
    pub address: String,
    pub menu_categories: Vec<MenuCategory>,
    pub platforms: Vec<Platform>,
    /// Catalog codes to pitch, best first.
    pub products: Vec<String>,
}

fn present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

fn or_missing(value: &Option<String>) -> &str {
    value
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or("Não informado")
}

struct ProviderSlot {
    generator: Box<dyn TextGenerator>,
    limiter: RateLimiter,
}

pub struct AiClient {
    grok: ProviderSlot,
    gemini: ProviderSlot,
    cache: TtlCache<String>,
    menu_cache: TtlCache<MenuInsights>,
    clock: SharedClock,
}

impl AiClient {
    pub fn new(config: &Config, clock: SharedClock) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| AppError::provider("ai", format!("Failed to create client: {}", e)))?;

        Ok(Self::with_generators(
            config,
            Box::new(GrokProvider::new(client.clone(), config.grok.clone())),
            Box::new(GeminiProvider::new(client, config.gemini.clone())),
            clock,
        ))
    }

    /// Builds the client around arbitrary generators (rate limits still come from `config`).
    pub fn with_generators(
        config: &Config,
        grok: Box<dyn TextGenerator>,
        gemini: Box<dyn TextGenerator>,
        clock: SharedClock,
    ) -> Self {
        Self {
            grok: ProviderSlot {
                generator: grok,
                limiter: RateLimiter::new(
                    config.grok.requests_per_window,
                    config.grok.window_ms,
                    clock.clone(),
                ),
            },
            gemini: ProviderSlot {
                generator: gemini,
                limiter: RateLimiter::new(
                    config.gemini.requests_per_window,
                    config.gemini.window_ms,
                    clock.clone(),
                ),
            },
            cache: TtlCache::new("ai", config.cache_ttls.ai_secs, clock.clone()),
            menu_cache: TtlCache::new("menu", config.cache_ttls.menu_secs, clock.clone()),
            clock,
        }
    }

    fn slot(&self, kind: ProviderKind) -> &ProviderSlot {
        match kind {
            ProviderKind::Grok => &self.grok,
            ProviderKind::Gemini => &self.gemini,
        }
    }

    /// Prospect analysis from one provider, or the template.
    ///
    /// A disabled or throttled provider is never called. HTTP 403 disables
    /// the provider in `health`; 429 leaves it enabled.
    pub async fn analyze(
        &self,
        kind: ProviderKind,
        brief: &AnalysisBrief,
        health: &mut ProviderHealth,
    ) -> AiText {
        match self.provider_analysis(kind, brief, health).await {
            Some(text) => text,
            None => self.template(brief),
        }
    }

    /// Grok, then Gemini, then the template.
    pub async fn analyze_prospect(
        &self,
        brief: &AnalysisBrief,
        health: &mut ProviderHealth,
    ) -> AiText {
        for kind in [ProviderKind::Grok, ProviderKind::Gemini] {
            if let Some(text) = self.provider_analysis(kind, brief, health).await {
                return text;
            }
        }
        tracing::info!("No AI provider available, using template analysis");
        self.template(brief)
    }

    async fn provider_analysis(
        &self,
        kind: ProviderKind,
        brief: &AnalysisBrief,
        health: &mut ProviderHealth,
    ) -> Option<AiText> {
        if !health.is_enabled(kind) {
            tracing::debug!("{} disabled, skipping analysis", kind);
            return None;
        }
        if !self.slot(kind).limiter.can_make_request() {
            tracing::warn!("⚠️ Rate limit reached for {}", kind);
            return None;
        }

        let key = cache_key(kind, brief);
        if let Some(text) = self.cache.get(&key).await {
            tracing::debug!("AI cache hit: {}", key);
            return Some(AiText {
                text,
                origin: TextOrigin::Cache(kind),
            });
        }

        let role = match kind {
            ProviderKind::Grok => ANALYST_ROLE,
            ProviderKind::Gemini => SALES_ROLE,
        };
        let text = self
            .query(kind, Some(role), &analysis_prompt(brief), ANALYSIS_MAX_TOKENS, health)
            .await
            .ok()?;

        self.cache.set(&key, text.clone()).await;
        Some(AiText {
            text,
            origin: TextOrigin::Provider(kind),
        })
    }

    /// One guarded provider call. Records the request on success.
    async fn query(
        &self,
        kind: ProviderKind,
        role: Option<&str>,
        prompt: &str,
        max_tokens: u32,
        health: &mut ProviderHealth,
    ) -> Result<String, AppError> {
        if !health.is_enabled(kind) {
            return Err(AppError::provider(kind.to_string(), "disabled"));
        }
        let slot = self.slot(kind);
        if !slot.limiter.can_make_request() {
            return Err(AppError::RateLimited(format!("Limite de requisições para {}", kind)));
        }

        match slot.generator.generate(role, prompt, max_tokens).await {
            Ok(text) => {
                slot.limiter.record_request();
                Ok(text)
            }
            Err(e) => {
                if e.is_auth_failure() {
                    tracing::warn!("🚫 {} access denied (403), disabling provider", kind);
                    health.disable(kind);
                } else if e.is_throttled() {
                    tracing::warn!("🚫 {} throttled upstream (429)", kind);
                } else {
                    tracing::warn!("⚠️ {} failed: {}", kind, e);
                }
                Err(e)
            }
        }
    }

    /// Tries `order` in turn; the first provider that answers wins.
    async fn first_answer(
        &self,
        order: [ProviderKind; 2],
        prompt: &str,
        health: &mut ProviderHealth,
    ) -> Option<(ProviderKind, String)> {
        for kind in order {
            if let Ok(text) = self.query(kind, None, prompt, QUERY_MAX_TOKENS, health).await {
                return Some((kind, text));
            }
        }
        None
    }

    /// Personalized pitch. Grok, then Gemini, then a local script.
    pub async fn generate_sales_script(
        &self,
        context: &SalesContext,
        health: &mut ProviderHealth,
    ) -> AiText {
        let prompt = sales_prompt(context);
        match self
            .first_answer([ProviderKind::Grok, ProviderKind::Gemini], &prompt, health)
            .await
        {
            Some((kind, text)) => AiText {
                text,
                origin: TextOrigin::Provider(kind),
            },
            None => AiText {
                text: basic_script(context),
                origin: TextOrigin::Template,
            },
        }
    }

    /// Structured menu reading. Gemini, then Grok, then the local analyzer.
    pub async fn analyze_menu(&self, menu_text: &str, health: &mut ProviderHealth) -> MenuInsights {
        let key = hash16(menu_text);
        if let Some(cached) = self.menu_cache.get(&key).await {
            tracing::debug!("Menu insights cache hit: {}", key);
            return cached;
        }

        let insights = match self
            .first_answer([ProviderKind::Gemini, ProviderKind::Grok], &menu_prompt(menu_text), health)
            .await
        {
            Some((kind, answer)) => parse_menu_response(&answer, TextOrigin::Provider(kind)),
            None => {
                tracing::info!("Both AI providers unavailable, using local menu analysis");
                local_menu_insights(menu_text)
            }
        };

        if insights.origin != TextOrigin::Template {
            self.menu_cache.set(&key, insights.clone()).await;
        }
        insights
    }

    /// The canonical offline report, dated from the injected clock.
    pub fn template(&self, brief: &AnalysisBrief) -> AiText {
        AiText {
            text: template_analysis(brief, &self.clock.now().format("%d/%m/%Y").to_string()),
            origin: TextOrigin::Template,
        }
    }
}

/// `{provider}_{first 16 hex chars of sha256(cnpj, has_menu, has_social)}`
pub fn cache_key(kind: ProviderKind, brief: &AnalysisBrief) -> String {
    let material = json!({
        "cnpj": brief.tax_id,
        "hasMenu": brief.has_menu(),
        "hasSocial": brief.has_social(),
    });
    format!("{}_{}", kind, hash16(&material.to_string()))
}

fn hash16(text: &str) -> String {
    let mut hex = hex::encode(Sha256::digest(text.as_bytes()));
    hex.truncate(16);
    hex
}

fn analysis_prompt(brief: &AnalysisBrief) -> String {
    format!(
        "Analise o seguinte prospect comercial:\n\n\
DADOS DA EMPRESA:\n\
- CNPJ: {}\n\
- Empresa: {}\n\
- Atividade: {}\n\
- Instagram: {}\n\
- Facebook: {}\n\
- Website: {}\n\n\
CARDÁPIO/PRODUTOS:\n{}\n\n\
Forneça:\n\
1. Perfil do cliente (tipo de negócio, porte, público-alvo)\n\
2. Oportunidades de venda identificadas\n\
3. Produtos PMG recomendados com justificativa\n\
4. Estratégia de abordagem sugerida\n\
5. Pontos de atenção ou riscos\n\n\
Seja específico e prático nas recomendações.",
        if brief.tax_id.is_empty() { "Não informado" } else { &brief.tax_id },
        or_missing(&brief.company_name),
        or_missing(&brief.activity),
        or_missing(&brief.instagram),
        or_missing(&brief.facebook),
        or_missing(&brief.website),
        brief
            .menu_text
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or("Não fornecido"),
    )
}

/// Fixed-structure report built only from the brief.
pub fn template_analysis(brief: &AnalysisBrief, date: &str) -> String {
    let business_type = match brief.activity.as_deref() {
        Some(activity) => BusinessType::classify(activity).label(),
        None => "Comercial geral",
    };

    format!(
        "**🔍 ANÁLISE PMG - {date}**\n\n\
**📋 PERFIL DO CLIENTE:**\n\
• Empresa: {name}\n\
• Atividade: {activity}\n\
• CNPJ: {tax_id}\n\n\
**📊 ANÁLISE INICIAL:**\n\
• Cardápio fornecido: {menu}\n\
• Redes sociais: {social}\n\
• Tipo de negócio: {business_type}\n\n\
**🎯 RECOMENDAÇÕES PMG:**\n\
• Apresentar produtos de alta qualidade da linha PMG\n\
• Destacar nossa experiência de 30 anos no mercado\n\
• Propor condições comerciais competitivas\n\
• Agendar visita técnica para avaliação detalhada\n\n\
**💡 PRÓXIMOS PASSOS:**\n\
1. Apresentar portfólio completo PMG\n\
2. Fazer cotação personalizada\n\
3. Propor teste de produtos\n\
4. Definir condições de entrega\n\n\
*Análise gerada automaticamente pelo sistema PMG ProspecPro*",
        name = brief.company_name.as_deref().unwrap_or("Prospect identificado"),
        activity = brief.activity.as_deref().unwrap_or("Estabelecimento comercial"),
        tax_id = if brief.tax_id.is_empty() { "Não informado" } else { &brief.tax_id },
        menu = if brief.has_menu() { "✅ Sim" } else { "❌ Não" },
        social = if brief.has_social() { "✅ Presente" } else { "⚠️ Ausente" },
    )
}

fn sales_prompt(context: &SalesContext) -> String {
    let categories = if context.menu_categories.is_empty() {
        "Não analisado".to_string()
    } else {
        join(&context.menu_categories)
    };
    let platforms = if context.platforms.is_empty() {
        "Não informado".to_string()
    } else {
        join(&context.platforms)
    };
    let products: Vec<String> = context
        .products
        .iter()
        .map(|code| format!("- {}", catalog::describe(code)))
        .collect();

    format!(
        "Crie um script de vendas personalizado para:\n\n\
EMPRESA: {}\n\
ATIVIDADE: {}\n\
LOCALIZAÇÃO: {}\n\n\
ANÁLISE DO NEGÓCIO:\n\
- Cardápio identificado: {}\n\
- Redes sociais: {}\n\n\
PRODUTOS SELECIONADOS:\n{}\n\n\
INSTRUÇÕES:\n\
1. Crie uma abordagem personalizada e consultiva\n\
2. Destaque os benefícios específicos para o tipo de negócio\n\
3. Inclua argumentos de valor baseados na análise\n\
4. Use um tom profissional mas próximo\n\
5. Inclua perguntas abertas para engajamento\n\
6. Forneça próximos passos claros\n\n\
Formato: Script direto, pronto para uso.",
        non_blank(&context.company_name, "Empresa"),
        non_blank(&context.activity, "Não informado"),
        non_blank(&context.address, "Não informado"),
        categories,
        platforms,
        products.join("\n"),
    )
}

fn join<T: std::fmt::Display>(values: &[T]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn non_blank<'a>(value: &'a str, default: &'a str) -> &'a str {
    if value.trim().is_empty() {
        default
    } else {
        value
    }
}

/// Local sales script used when neither provider answers.
pub fn basic_script(context: &SalesContext) -> String {
    let products: Vec<String> = context
        .products
        .iter()
        .map(|code| format!("  • {} - Qualidade PMG garantida", catalog::describe(code)))
        .collect();

    format!(
        "🎯 SCRIPT PERSONALIZADO - {name}\n\n\
Olá! Meu nome é [SEU NOME], represento a PMG Atacadista, empresa com mais de 30 anos \
fornecendo ingredientes de qualidade para o setor alimentício.\n\n\
📍 Localização: Vejo que vocês estão em {address}, área que conhecemos bem e onde temos \
vários clientes satisfeitos.\n\n\
💡 Oportunidade identificada: analisando o perfil do seu negócio, identifiquei alguns produtos \
que podem otimizar seus custos e melhorar a qualidade:\n\
{products}\n\n\
🚚 Vantagens PMG:\n\
  ✅ Entrega programada\n\
  ✅ Preços competitivos no atacado\n\
  ✅ 30 anos de tradição\n\
  ✅ Suporte técnico especializado\n\n\
🤝 Próximo passo: que tal agendarmos uma visita para apresentar nossa linha completa e fazer \
uma cotação personalizada?\n\n\
Quando seria o melhor dia e horário para você?",
        name = non_blank(&context.company_name, "PROSPECT"),
        address = non_blank(&context.address, "uma excelente região"),
        products = products.join("\n"),
    )
}

fn menu_prompt(menu_text: &str) -> String {
    format!(
        "Analise o seguinte cardápio e forneça:\n\
1. Categorias principais de produtos\n\
2. Faixa de preços identificada\n\
3. Tipo de estabelecimento provável\n\
4. Ingredientes mais utilizados\n\
5. Sugestões de produtos PMG que fariam sentido (códigos do catálogo)\n\n\
CARDÁPIO:\n{}\n\n\
Responda em formato JSON com as chaves: categorias, faixa_precos (min, max, media), \
tipo_estabelecimento, ingredientes, produtos_sugeridos.",
        menu_text
    )
}

/// Reads an AI answer: the first `{...}` block as JSON, else keyword extraction.
pub fn parse_menu_response(answer: &str, origin: TextOrigin) -> MenuInsights {
    if let Some(insights) = json_block(answer).and_then(|v| insights_from_json(&v, origin)) {
        return insights;
    }

    MenuInsights {
        categories: text_categories(answer),
        price_range: price_range(answer),
        establishment_type: establishment_type(answer),
        ingredients: text_ingredients(answer),
        suggested_products: Vec::new(),
        confidence: TEXT_CONFIDENCE,
        origin,
    }
}

fn json_block(answer: &str) -> Option<Value> {
    let start = answer.find('{')?;
    let end = answer.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&answer[start..=end]).ok()
}

fn first_field<'a>(v: &'a Value, names: &[&str]) -> Option<&'a Value> {
    names.iter().find_map(|n| v.get(*n))
}

fn strings(v: Option<&Value>) -> Vec<String> {
    v.and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|x| match x {
                    Value::String(s) => Some(s.trim().to_string()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

fn number(v: Option<&Value>) -> Option<f64> {
    match v? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => menu::parse_price(s.trim_start_matches("R$").trim()),
        _ => None,
    }
}

fn insights_from_json(v: &Value, origin: TextOrigin) -> Option<MenuInsights> {
    if !v.is_object() {
        return None;
    }

    let mut categories: Vec<MenuCategory> = strings(first_field(v, &["categorias", "categories"]))
        .iter()
        .map(|c| MenuCategory::from_key(c).unwrap_or_else(|| menu::category_for(c)))
        .collect();
    categories.sort();
    categories.dedup();

    let price_range = first_field(v, &["faixa_precos", "price_range", "priceRange"]).and_then(|p| {
        let min = number(p.get("min"))?;
        let max = number(p.get("max"))?;
        let average = number(first_field(p, &["media", "average"])).unwrap_or((min + max) / 2.0);
        Some(PriceRange { min, max, average })
    });

    Some(MenuInsights {
        categories,
        price_range,
        establishment_type: first_field(
            v,
            &["tipo_estabelecimento", "establishment_type", "establishmentType"],
        )
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| "estabelecimento alimentício".to_string()),
        ingredients: strings(first_field(v, &["ingredientes", "ingredients"])),
        suggested_products: strings(first_field(
            v,
            &["produtos_sugeridos", "suggested_products", "suggestedProducts"],
        )),
        confidence: JSON_CONFIDENCE,
        origin,
    })
}

fn text_categories(text: &str) -> Vec<MenuCategory> {
    let lower = text.to_lowercase();
    TEXT_CATEGORIES
        .iter()
        .filter(|(_, words)| words.iter().any(|w| lower.contains(w)))
        .map(|(c, _)| *c)
        .collect()
}

fn price_range(text: &str) -> Option<PriceRange> {
    let values: Vec<f64> = PRICE_MENTION
        .captures_iter(text)
        .filter_map(|c| menu::parse_price(&c[1]))
        .collect();
    if values.is_empty() {
        return None;
    }
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let average = values.iter().sum::<f64>() / values.len() as f64;
    Some(PriceRange {
        min,
        max,
        average: (average * 100.0).round() / 100.0,
    })
}

/// First establishment type whose keywords appear in the text.
pub fn establishment_type(text: &str) -> String {
    let lower = text.to_lowercase();
    ESTABLISHMENT_TYPES
        .iter()
        .find(|(_, words)| words.iter().any(|w| lower.contains(w)))
        .map(|(kind, _)| kind.to_string())
        .unwrap_or_else(|| "estabelecimento alimentício".to_string())
}

fn text_ingredients(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    COMMON_INGREDIENTS
        .iter()
        .filter(|i| lower.contains(*i))
        .map(|i| i.to_string())
        .collect()
}

/// Offline menu insights from the local analyzer.
pub fn local_menu_insights(menu_text: &str) -> MenuInsights {
    let analysis = menu::analyze(menu_text);
    let price_range = (!analysis.items.is_empty()).then(|| PriceRange {
        min: analysis.price_statistics.min,
        max: analysis.price_statistics.max,
        average: analysis.price_statistics.average,
    });

    let mut categories = analysis.category_keys();
    for category in text_categories(menu_text) {
        if !categories.contains(&category) {
            categories.push(category);
        }
    }

    MenuInsights {
        categories,
        price_range,
        establishment_type: establishment_type(menu_text),
        ingredients: analysis.ingredients.into_iter().map(|i| i.ingredient).collect(),
        suggested_products: Vec::new(),
        confidence: LOCAL_CONFIDENCE,
        origin: TextOrigin::Template,
    }
}
