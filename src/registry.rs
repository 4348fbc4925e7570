//! Company registry lookup across several public CNPJ mirrors.
//!
//! Mirrors are tried in configured order. Any non-2xx status, error field in
//! the body, timeout or unparseable payload is a soft failure: it is logged,
//! remembered, and the next mirror is tried. Each mirror schema has its own
//! adapter producing the canonical [`CompanyRecord`].

use crate::cache::TtlCache;
use crate::circuit_breaker::{create_mirror_circuit_breaker, record_outcome, MirrorBreaker};
use crate::clock::SharedClock;
use crate::cnpj;
use crate::config::{Config, RegistryMirror, RegistrySchema};
use crate::errors::AppError;
use crate::models::{format_brl, CompanyRecord, Partner, Situation, SizeClass};
use crate::rate_limiter::RateLimiter;
use chrono::NaiveDate;
use phonenumber::country::Id as CountryId;
use phonenumber::Mode;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

pub struct CompanyRegistryClient {
    client: Client,
    mirrors: Vec<(RegistryMirror, MirrorBreaker)>,
    cache: TtlCache<CompanyRecord>,
    limiter: RateLimiter,
}

impl CompanyRegistryClient {
    pub fn new(config: &Config, clock: SharedClock) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(config.geocoding.user_agent.clone())
            .build()
            .map_err(|e| AppError::provider("registry", format!("Failed to create client: {}", e)))?;

        let mirrors = config
            .registry
            .mirrors
            .iter()
            .cloned()
            .map(|m| (m, create_mirror_circuit_breaker()))
            .collect();

        Ok(Self {
            client,
            mirrors,
            cache: TtlCache::new("cnpj", config.cache_ttls.company_secs, clock.clone()),
            limiter: RateLimiter::new(
                config.registry.requests_per_window,
                config.registry.window_ms,
                clock,
            ),
        })
    }

    /// Looks up a company by CNPJ (punctuation allowed).
    ///
    /// Cache hits never consume rate-limit quota. Only a successful mirror
    /// response is counted against the limiter.
    pub async fn get_company_data(&self, raw_tax_id: &str) -> Result<CompanyRecord, AppError> {
        let tax_id = cnpj::clean(raw_tax_id);
        if !cnpj::validate(&tax_id) {
            return Err(AppError::InvalidInput(format!("CNPJ inválido: {}", raw_tax_id)));
        }

        if let Some(record) = self.cache.get(&tax_id).await {
            return Ok(record);
        }

        if !self.limiter.can_make_request() {
            tracing::warn!("Registry rate limit reached, refusing lookup for {}", tax_id);
            return Err(AppError::RateLimited(
                "Limite de consultas de CNPJ atingido. Aguarde um minuto.".to_string(),
            ));
        }

        let mut last_error: Option<AppError> = None;

        for (mirror, breaker) in &self.mirrors {
            if !breaker.is_call_permitted() {
                tracing::warn!("Mirror {} skipped: circuit open", mirror.name);
                last_error = Some(AppError::provider(&mirror.name, "circuit open"));
                continue;
            }

            match self.query_mirror(mirror, &tax_id).await {
                Ok(raw) => {
                    record_outcome(breaker, true);
                    let record = normalize(mirror.schema, &mirror.name, &tax_id, raw);
                    tracing::info!(
                        "✓ CNPJ {} resolved via {} ({})",
                        tax_id,
                        mirror.name,
                        record.legal_name
                    );
                    self.cache.set(&tax_id, record.clone()).await;
                    self.limiter.record_request();
                    return Ok(record);
                }
                Err(e) => {
                    record_outcome(breaker, false);
                    tracing::warn!("Mirror {} failed for {}: {}", mirror.name, tax_id, e);
                    last_error = Some(e);
                }
            }
        }

        let last = last_error
            .unwrap_or_else(|| AppError::provider("registry", "no mirrors configured"));
        tracing::error!("All registry mirrors failed for {}", tax_id);
        Err(AppError::AllProvidersFailed {
            last: Box::new(last),
        })
    }

    async fn query_mirror(&self, mirror: &RegistryMirror, tax_id: &str) -> Result<Value, AppError> {
        let url = format!("{}{}", mirror.base_url, tax_id);
        tracing::debug!("Registry request: {}", url);

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::provider_status(
                &mirror.name,
                status.as_u16(),
                format!("returned {}", status),
            ));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| AppError::provider(&mirror.name, format!("malformed body: {}", e)))?;

        if let Some(message) = body_error(&body) {
            return Err(AppError::provider(&mirror.name, message));
        }

        Ok(body)
    }
}

/// Error carried inside a 2xx body, if any.
fn body_error(body: &Value) -> Option<String> {
    if !body.is_object() {
        return Some("body is not a JSON object".to_string());
    }
    if body.get("status").and_then(Value::as_str) == Some("ERROR") {
        return Some(
            text(body, "message").unwrap_or_else(|| "registry reported ERROR".to_string()),
        );
    }
    for key in ["erro", "error"] {
        match body.get(key) {
            None | Some(Value::Null) | Some(Value::Bool(false)) => {}
            Some(v) => {
                return Some(
                    v.as_str()
                        .map(str::to_string)
                        .or_else(|| text(body, "message"))
                        .unwrap_or_else(|| format!("{} field present", key)),
                )
            }
        }
    }
    None
}

// ============ Schema adapters ============

/// Fields every mirror schema is mapped into before building the record.
#[derive(Debug, Default)]
struct RegistryFields {
    legal_name: String,
    trade_name: String,
    main_activity: String,
    secondary_activities: Vec<String>,
    street: Vec<String>,
    city: String,
    state: String,
    postal_code: String,
    phone: String,
    email: String,
    situation: String,
    opening_date: String,
    last_update: String,
    capital: Option<Value>,
    size: String,
    legal_nature: String,
    simples: bool,
    mei: bool,
    partners: Vec<Partner>,
}

/// Runs the schema adapter for `schema` and builds the canonical record.
pub fn normalize(schema: RegistrySchema, source: &str, tax_id: &str, raw: Value) -> CompanyRecord {
    let fields = match schema {
        RegistrySchema::ReceitaWs => from_receitaws(&raw),
        RegistrySchema::BrasilApi => from_brasilapi(&raw),
        RegistrySchema::CnpjWs => from_cnpjws(&raw),
        RegistrySchema::Generic => from_generic(&raw),
    };
    build_record(fields, source, tax_id, raw)
}

fn from_receitaws(raw: &Value) -> RegistryFields {
    RegistryFields {
        legal_name: text_or_empty(raw, "nome"),
        trade_name: text_or_empty(raw, "fantasia"),
        main_activity: activity_text(raw.get("atividade_principal")),
        secondary_activities: activity_list(raw.get("atividades_secundarias"), "text"),
        street: ["logradouro", "numero", "complemento", "bairro"]
            .iter()
            .filter_map(|k| text(raw, k))
            .collect(),
        city: text_or_empty(raw, "municipio"),
        state: text_or_empty(raw, "uf"),
        postal_code: text_or_empty(raw, "cep"),
        // "(11) 1234-5678 / (11) 2345-6789"
        phone: text(raw, "telefone")
            .and_then(|p| p.split('/').next().map(|s| s.trim().to_string()))
            .unwrap_or_default(),
        email: text_or_empty(raw, "email"),
        situation: text_or_empty(raw, "situacao"),
        opening_date: text_or_empty(raw, "abertura"),
        last_update: text_or_empty(raw, "ultima_atualizacao"),
        capital: raw.get("capital_social").cloned(),
        size: text_or_empty(raw, "porte"),
        legal_nature: text_or_empty(raw, "natureza_juridica"),
        simples: nested_flag(raw, "simples", "optante"),
        mei: nested_flag(raw, "simei", "optante"),
        partners: partners(raw.get("qsa"), "nome", "qual", None),
    }
}

fn from_brasilapi(raw: &Value) -> RegistryFields {
    RegistryFields {
        legal_name: text_or_empty(raw, "razao_social"),
        trade_name: text_or_empty(raw, "nome_fantasia"),
        main_activity: text_or_empty(raw, "cnae_fiscal_descricao"),
        secondary_activities: activity_list(raw.get("cnaes_secundarios"), "descricao"),
        street: ["logradouro", "numero", "complemento", "bairro"]
            .iter()
            .filter_map(|k| text(raw, k))
            .collect(),
        city: text_or_empty(raw, "municipio"),
        state: text_or_empty(raw, "uf"),
        postal_code: text_or_empty(raw, "cep"),
        phone: text_or_empty(raw, "ddd_telefone_1"),
        email: text_or_empty(raw, "email"),
        situation: text_or_empty(raw, "descricao_situacao_cadastral"),
        opening_date: text_or_empty(raw, "data_inicio_atividade"),
        last_update: text_or_empty(raw, "data_situacao_cadastral"),
        capital: raw.get("capital_social").cloned(),
        size: text_or_empty(raw, "porte"),
        legal_nature: text_or_empty(raw, "natureza_juridica"),
        simples: raw.get("opcao_pelo_simples").and_then(Value::as_bool).unwrap_or(false),
        mei: raw.get("opcao_pelo_mei").and_then(Value::as_bool).unwrap_or(false),
        partners: partners(
            raw.get("qsa"),
            "nome_socio",
            "qualificacao_socio",
            Some("cnpj_cpf_do_socio"),
        ),
    }
}

fn from_cnpjws(raw: &Value) -> RegistryFields {
    let null = Value::Null;
    let est = raw.get("estabelecimento").unwrap_or(&null);

    let phone = match (text(est, "ddd1"), text(est, "telefone1")) {
        (Some(ddd), Some(number)) => format!("{}{}", ddd, number),
        (None, Some(number)) => number,
        _ => String::new(),
    };

    let street_name = match (text(est, "tipo_logradouro"), text(est, "logradouro")) {
        (Some(kind), Some(name)) => Some(format!("{} {}", kind, name)),
        (None, Some(name)) => Some(name),
        _ => None,
    };
    let street = street_name
        .into_iter()
        .chain(
            ["numero", "complemento", "bairro"]
                .iter()
                .filter_map(|k| text(est, k)),
        )
        .collect();

    let socios = raw.get("socios").and_then(Value::as_array);
    let partners = socios
        .map(|list| {
            list.iter()
                .filter_map(|s| {
                    let name = text(s, "nome")?;
                    Some(Partner {
                        name,
                        role: s
                            .get("qualificacao_socio")
                            .map(|q| text_or_empty(q, "descricao"))
                            .unwrap_or_default(),
                        document: text(s, "cpf_cnpj_socio"),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let simples = raw.get("simples").unwrap_or(&null);

    RegistryFields {
        legal_name: text_or_empty(raw, "razao_social"),
        trade_name: text_or_empty(est, "nome_fantasia"),
        main_activity: est
            .get("atividade_principal")
            .map(|a| text_or_empty(a, "descricao"))
            .unwrap_or_default(),
        secondary_activities: activity_list(est.get("atividades_secundarias"), "descricao"),
        street,
        city: est
            .get("cidade")
            .map(|c| text_or_empty(c, "nome"))
            .unwrap_or_default(),
        state: est
            .get("estado")
            .map(|e| text_or_empty(e, "sigla"))
            .unwrap_or_default(),
        postal_code: text_or_empty(est, "cep"),
        phone,
        email: text_or_empty(est, "email"),
        situation: text_or_empty(est, "situacao_cadastral"),
        opening_date: text_or_empty(est, "data_inicio_atividade"),
        last_update: text_or_empty(est, "atualizado_em"),
        capital: raw.get("capital_social").cloned(),
        size: raw
            .get("porte")
            .map(|p| text_or_empty(p, "descricao"))
            .unwrap_or_default(),
        legal_nature: raw
            .get("natureza_juridica")
            .map(|n| text_or_empty(n, "descricao"))
            .unwrap_or_default(),
        simples: yes_flag(simples.get("simples")),
        mei: yes_flag(simples.get("mei")),
        partners,
    }
}

/// Probes ReceitaWS names first, then BrasilAPI names.
fn from_generic(raw: &Value) -> RegistryFields {
    let receita = from_receitaws(raw);
    let brasil = from_brasilapi(raw);
    let pick = |a: String, b: String| if a.is_empty() { b } else { a };

    RegistryFields {
        legal_name: pick(receita.legal_name, brasil.legal_name),
        trade_name: pick(receita.trade_name, brasil.trade_name),
        main_activity: pick(receita.main_activity, brasil.main_activity),
        secondary_activities: if receita.secondary_activities.is_empty() {
            brasil.secondary_activities
        } else {
            receita.secondary_activities
        },
        street: receita.street,
        city: receita.city,
        state: receita.state,
        postal_code: receita.postal_code,
        phone: pick(receita.phone, brasil.phone),
        email: receita.email,
        situation: pick(
            pick(receita.situation, text_or_empty(raw, "status")),
            brasil.situation,
        ),
        opening_date: pick(
            pick(receita.opening_date, text_or_empty(raw, "data_abertura")),
            brasil.opening_date,
        ),
        last_update: receita.last_update,
        capital: receita.capital,
        size: receita.size,
        legal_nature: receita.legal_nature,
        simples: receita.simples || brasil.simples,
        mei: receita.mei || brasil.mei,
        partners: if receita.partners.is_empty() {
            brasil.partners
        } else {
            receita.partners
        },
    }
}

fn build_record(fields: RegistryFields, source: &str, tax_id: &str, raw: Value) -> CompanyRecord {
    let capital = fields.capital.as_ref().map(parse_capital).unwrap_or(0.0);
    let is_mei = fields.mei || fields.size.to_lowercase().contains("mei");
    let size_class = if is_mei {
        SizeClass::Micro
    } else {
        SizeClass::from_capital(capital)
    };
    let postal_digits = cnpj::clean(&fields.postal_code);
    let phone_e164 = normalize_phone_e164(&fields.phone);

    CompanyRecord {
        tax_id: tax_id.to_string(),
        tax_id_formatted: cnpj::format(tax_id),
        address: format_address(
            &fields.street,
            &fields.city,
            &fields.state,
            &fields.postal_code,
        ),
        postal_code: (postal_digits.len() == 8).then_some(postal_digits),
        coordinates: None,
        phone: format_phone(&fields.phone),
        phone_e164,
        email: fields.email.to_lowercase(),
        situation: Situation::from_registry(&fields.situation),
        opening_date: parse_date(&fields.opening_date),
        last_update: parse_date(&fields.last_update),
        capital,
        capital_display: format_brl(capital),
        size_class,
        employee_range: size_class.employee_range().map(str::to_string),
        is_mei,
        simples_optant: fields.simples,
        legal_nature: fields.legal_nature,
        partners: fields.partners,
        legal_name: fields.legal_name,
        trade_name: fields.trade_name,
        main_activity: fields.main_activity,
        secondary_activities: fields.secondary_activities,
        source: source.to_string(),
        raw,
    }
}

// ============ Field helpers ============

/// String (or number rendered as string) at `key`, trimmed, empty treated as absent.
fn text(v: &Value, key: &str) -> Option<String> {
    let s = match v.get(key)? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!s.is_empty()).then_some(s)
}

fn text_or_empty(v: &Value, key: &str) -> String {
    text(v, key).unwrap_or_default()
}

/// `atividade_principal` arrives as an array of objects or as a single object.
fn activity_text(v: Option<&Value>) -> String {
    let entry = match v {
        Some(Value::Array(list)) => list.first(),
        Some(obj @ Value::Object(_)) => Some(obj),
        Some(Value::String(s)) => return s.trim().to_string(),
        _ => None,
    };
    entry
        .and_then(|e| text(e, "text").or_else(|| text(e, "descricao")))
        .unwrap_or_default()
}

fn activity_list(v: Option<&Value>, key: &str) -> Vec<String> {
    v.and_then(Value::as_array)
        .map(|list| list.iter().filter_map(|e| text(e, key)).collect())
        .unwrap_or_default()
}

fn partners(v: Option<&Value>, name_key: &str, role_key: &str, doc_key: Option<&str>) -> Vec<Partner> {
    v.and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter_map(|p| {
                    Some(Partner {
                        name: text(p, name_key)?,
                        role: text_or_empty(p, role_key),
                        document: doc_key.and_then(|k| text(p, k)),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

fn nested_flag(v: &Value, outer: &str, inner: &str) -> bool {
    v.get(outer)
        .and_then(|o| o.get(inner))
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

fn yes_flag(v: Option<&Value>) -> bool {
    match v {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.trim().eq_ignore_ascii_case("sim"),
        _ => false,
    }
}

/// Accepts numbers, `"1000.00"`, `"1.234,56"` and `"R$ 1.234,56"`.
pub fn parse_capital(v: &Value) -> f64 {
    match v {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => {
            let kept: String = s
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
                .collect();
            let normalized = if kept.contains(',') {
                kept.replace('.', "").replace(',', ".")
            } else if kept.matches('.').count() > 1 {
                kept.replace('.', "")
            } else {
                kept
            };
            normalized.parse::<f64>().unwrap_or(0.0)
        }
        _ => 0.0,
    }
}

/// `dd/mm/yyyy`, `yyyy-mm-dd`, or an ISO timestamp (date part only).
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(raw, "%d/%m/%Y")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .ok()
        .or_else(|| {
            raw.get(..10)
                .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        })
}

/// 10 digits -> `(DD) DDDD-DDDD`, 11 digits -> `(DD) DDDDD-DDDD`, else unchanged.
pub fn format_phone(raw: &str) -> String {
    let digits = cnpj::clean(raw);
    match digits.len() {
        10 => format!("({}) {}-{}", &digits[..2], &digits[2..6], &digits[6..]),
        11 => format!("({}) {}-{}", &digits[..2], &digits[2..7], &digits[7..]),
        _ => raw.trim().to_string(),
    }
}

/// E.164 form of a Brazilian phone, `None` when it does not validate.
pub fn normalize_phone_e164(raw: &str) -> Option<String> {
    if raw.trim().is_empty() || raw.len() < 8 {
        return None;
    }
    match phonenumber::parse(Some(CountryId::BR), raw) {
        Ok(number) if phonenumber::is_valid(&number) => {
            Some(number.format().mode(Mode::E164).to_string())
        }
        Ok(_) => {
            tracing::debug!("Invalid BR phone number: {}", raw);
            None
        }
        Err(e) => {
            tracing::debug!("Failed to parse BR phone '{}': {:?}", raw, e);
            None
        }
    }
}

/// `street, number, complement, district, City/UF - CEP: xxxxx-xxx`.
/// Eight-digit CEPs are normalised so the geocoder can extract them.
fn format_address(street: &[String], city: &str, state: &str, postal_code: &str) -> String {
    let mut address = street.join(", ");
    if !city.is_empty() {
        if !address.is_empty() {
            address.push_str(", ");
        }
        address.push_str(city);
    }
    if !state.is_empty() {
        address.push('/');
        address.push_str(state);
    }
    let digits = cnpj::clean(postal_code);
    if digits.len() == 8 {
        address.push_str(&format!(" - CEP: {}-{}", &digits[..5], &digits[5..]));
    } else if !postal_code.is_empty() {
        address.push_str(" - CEP: ");
        address.push_str(postal_code);
    }
    if address.is_empty() {
        "Endereço não informado".to_string()
    } else {
        address
    }
}
