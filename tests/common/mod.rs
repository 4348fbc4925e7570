//! Shared fixtures: a configuration whose every endpoint points at one mock server.

#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use pmg_prospector::clock::{ManualClock, SharedClock};
use pmg_prospector::config::{Config, RegistryMirror, RegistrySchema};
use std::sync::Arc;

pub const VALID_CNPJ: &str = "11222333000181";
pub const OTHER_VALID_CNPJ: &str = "11444777000161";

pub fn test_config(base: &str) -> Config {
    let mut config = Config::default();

    config.registry.mirrors = vec![
        mirror("receitaws", base, "/receitaws/", RegistrySchema::ReceitaWs),
        mirror("brasilapi", base, "/brasilapi/", RegistrySchema::BrasilApi),
        mirror("cnpjws", base, "/cnpjws/", RegistrySchema::CnpjWs),
    ];

    config.grok.endpoint = format!("{}/grok", base);
    config.grok.api_key = Some("grok-test-key".to_string());
    config.grok.enabled = true;
    config.gemini.endpoint = format!("{}/gemini", base);
    config.gemini.api_key = Some("gemini-test-key".to_string());
    config.gemini.enabled = true;

    config.geocoding.search_url = format!("{}/search", base);
    config.geocoding.reverse_url = format!("{}/reverse", base);
    config.geocoding.postal_code_url = format!("{}/cep", base);
    config.geocoding.nearby_url = format!("{}/overpass", base);
    config.geocoding.routing_url = format!("{}/osrm", base);

    config.social.instagram_oembed_url = format!("{}/oembed", base);
    config.social.instagram_profile_url = format!("{}/ig", base);
    config.social.graph_api_url = format!("{}/graph", base);
    config.social.graph_access_token = None;
    // Every scrape goes through the mock server, never the real network.
    config.social.proxies = vec![format!("{}/proxy?url=", base)];
    config.social.seed = Some(42);

    config.request_timeout_secs = 5;
    config
}

fn mirror(name: &str, base: &str, path: &str, schema: RegistrySchema) -> RegistryMirror {
    RegistryMirror {
        name: name.to_string(),
        base_url: format!("{}{}", base, path),
        schema,
    }
}

pub fn manual_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap(),
    ))
}

pub fn shared(clock: &Arc<ManualClock>) -> SharedClock {
    clock.clone()
}

pub fn receitaws_body() -> serde_json::Value {
    serde_json::json!({
        "status": "OK",
        "cnpj": "11.222.333/0001-81",
        "nome": "CANTINA BELLA LTDA",
        "fantasia": "CANTINA BELLA",
        "atividade_principal": [
            {"code": "56.11-2-01", "text": "Restaurantes e similares"}
        ],
        "atividades_secundarias": [
            {"code": "56.11-2-03", "text": "Lanchonetes, casas de chá, de sucos e similares"}
        ],
        "logradouro": "RUA DOS ANDRADAS",
        "numero": "1000",
        "bairro": "CENTRO HISTORICO",
        "municipio": "PORTO ALEGRE",
        "uf": "RS",
        "cep": "90.020-008",
        "telefone": "(51) 3222-1234",
        "email": "contato@cantinabella.com.br",
        "situacao": "ATIVA",
        "abertura": "15/03/2010",
        "capital_social": "150000.00",
        "porte": "EMPRESA DE PEQUENO PORTE",
        "natureza_juridica": "206-2 - Sociedade Empresária Limitada",
        "qsa": [
            {"nome": "MARIA BELLA", "qual": "49-Sócio-Administrador"}
        ]
    })
}
