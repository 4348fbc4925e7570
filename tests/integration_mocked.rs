/// Integration tests with mocked external APIs.
/// Every HTTP boundary (registry mirrors, AI providers, geocoder, social) runs against wiremock.
mod common;

use common::{manual_clock, receitaws_body, shared, test_config, OTHER_VALID_CNPJ, VALID_CNPJ};
use pmg_prospector::ai::{AiClient, AnalysisBrief, ProviderHealth};
use pmg_prospector::errors::AppError;
use pmg_prospector::geocoding::{GeocodingClient, Location};
use pmg_prospector::models::{
    Coordinates, DataSource, Platform, ProviderKind, Situation, SizeClass, TextOrigin,
};
use pmg_prospector::registry::CompanyRegistryClient;
use pmg_prospector::social::SocialClient;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============ Registry ============

#[tokio::test]
async fn test_registry_falls_back_on_body_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("/receitaws/{}", VALID_CNPJ)))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "ERROR",
            "message": "Too many requests, please try again later."
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/brasilapi/{}", VALID_CNPJ)))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "cnpj": VALID_CNPJ,
            "razao_social": "CANTINA BELLA LTDA",
            "nome_fantasia": "",
            "cnae_fiscal_descricao": "Restaurantes e similares",
            "municipio": "PORTO ALEGRE",
            "uf": "RS",
            "ddd_telefone_1": "5132221234",
            "descricao_situacao_cadastral": "ATIVA",
            "capital_social": 50000,
            "opcao_pelo_mei": false
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server.uri());
    let client = CompanyRegistryClient::new(&config, shared(&manual_clock())).unwrap();

    let record = client.get_company_data("11.222.333/0001-81").await.unwrap();

    assert_eq!(record.source, "brasilapi");
    assert_eq!(record.tax_id, VALID_CNPJ);
    assert_eq!(record.display_name(), "CANTINA BELLA LTDA");
    assert_eq!(record.main_activity, "Restaurantes e similares");
    assert_eq!(record.phone, "(51) 3222-1234");
    assert_eq!(record.situation, Situation::Active);
    assert_eq!(record.size_class, SizeClass::Micro);
}

#[tokio::test]
async fn test_registry_all_mirrors_fail_keeps_last_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("/receitaws/{}", VALID_CNPJ)))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/brasilapi/{}", VALID_CNPJ)))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "erro": "CNPJ não encontrado"
        })))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/cnpjws/{}", VALID_CNPJ)))
        .respond_with(ResponseTemplate::new(429))
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server.uri());
    let client = CompanyRegistryClient::new(&config, shared(&manual_clock())).unwrap();

    match client.get_company_data(VALID_CNPJ).await {
        Err(AppError::AllProvidersFailed { last }) => assert_eq!(last.status(), Some(429)),
        other => panic!("expected AllProvidersFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_registry_timeout_moves_to_next_mirror() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("/receitaws/{}", VALID_CNPJ)))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(receitaws_body())
                .set_delay(Duration::from_secs(3)),
        )
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/brasilapi/{}", VALID_CNPJ)))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "cnpj": VALID_CNPJ,
            "razao_social": "CANTINA BELLA LTDA",
            "cnae_fiscal_descricao": "Restaurantes e similares",
            "municipio": "PORTO ALEGRE",
            "uf": "RS"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut config = test_config(&mock_server.uri());
    config.request_timeout_secs = 1;
    let client = CompanyRegistryClient::new(&config, shared(&manual_clock())).unwrap();

    let record = client.get_company_data(VALID_CNPJ).await.unwrap();
    assert_eq!(record.source, "brasilapi");
    assert_eq!(record.legal_name, "CANTINA BELLA LTDA");
}

#[tokio::test]
async fn test_registry_invalid_cnpj_makes_no_request() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(receitaws_body()))
        .expect(0)
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server.uri());
    let client = CompanyRegistryClient::new(&config, shared(&manual_clock())).unwrap();

    let err = client.get_company_data("11.222.333/0001-82").await.unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));

    let err = client.get_company_data("00000000000000").await.unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));
}

#[tokio::test]
async fn test_registry_cache_hit_skips_network_and_quota() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("/receitaws/{}", VALID_CNPJ)))
        .respond_with(ResponseTemplate::new(200).set_body_json(receitaws_body()))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/receitaws/{}", OTHER_VALID_CNPJ)))
        .respond_with(ResponseTemplate::new(200).set_body_json(receitaws_body()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut config = test_config(&mock_server.uri());
    config.registry.requests_per_window = 2;
    let client = CompanyRegistryClient::new(&config, shared(&manual_clock())).unwrap();

    let first = client.get_company_data(VALID_CNPJ).await.unwrap();
    for _ in 0..5 {
        let again = client.get_company_data("11.222.333/0001-81").await.unwrap();
        assert_eq!(again.legal_name, first.legal_name);
    }

    // Cache hits did not consume quota, so a second company still fits in the window.
    client.get_company_data(OTHER_VALID_CNPJ).await.unwrap();
}

#[tokio::test]
async fn test_registry_rate_limit_and_window_reset() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(receitaws_body()))
        .mount(&mock_server)
        .await;

    let mut config = test_config(&mock_server.uri());
    config.registry.requests_per_window = 1;
    config.registry.window_ms = 60_000;
    let clock = manual_clock();
    let client = CompanyRegistryClient::new(&config, shared(&clock)).unwrap();

    client.get_company_data(VALID_CNPJ).await.unwrap();
    let err = client.get_company_data(OTHER_VALID_CNPJ).await.unwrap_err();
    assert!(matches!(err, AppError::RateLimited(_)));

    clock.advance_ms(60_001);
    client.get_company_data(OTHER_VALID_CNPJ).await.unwrap();
}

// ============ AI providers ============

fn brief() -> AnalysisBrief {
    AnalysisBrief {
        tax_id: VALID_CNPJ.to_string(),
        company_name: Some("CANTINA BELLA".to_string()),
        activity: Some("Restaurantes e similares".to_string()),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_grok_wire_format_and_cache() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/grok/chat/completions"))
        .and(header("authorization", "Bearer grok-test-key"))
        .and(body_partial_json(serde_json::json!({
            "model": "grok-2-1212",
            "max_tokens": 1000
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "Perfil: restaurante familiar."}}]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server.uri());
    let ai = AiClient::new(&config, shared(&manual_clock())).unwrap();
    let mut health = ProviderHealth::from_config(&config);

    let first = ai.analyze(ProviderKind::Grok, &brief(), &mut health).await;
    assert_eq!(first.origin, TextOrigin::Provider(ProviderKind::Grok));
    assert_eq!(first.text, "Perfil: restaurante familiar.");

    let second = ai.analyze(ProviderKind::Grok, &brief(), &mut health).await;
    assert_eq!(second.origin, TextOrigin::Cache(ProviderKind::Grok));
}

#[tokio::test]
async fn test_gemini_wire_format() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/gemini/models/gemini-1.5-flash:generateContent"))
        .and(query_param("key", "gemini-test-key"))
        .and(body_partial_json(serde_json::json!({
            "generationConfig": {"topK": 10}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "candidates": [{"content": {"parts": [{"text": "Oportunidade: farinha e queijo."}]}}]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server.uri());
    let ai = AiClient::new(&config, shared(&manual_clock())).unwrap();
    let mut health = ProviderHealth::from_config(&config);

    let out = ai.analyze(ProviderKind::Gemini, &brief(), &mut health).await;
    assert_eq!(out.origin, TextOrigin::Provider(ProviderKind::Gemini));
    assert_eq!(out.text, "Oportunidade: farinha e queijo.");
}

#[tokio::test]
async fn test_grok_403_disables_for_process() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/grok/chat/completions"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server.uri());
    let ai = AiClient::new(&config, shared(&manual_clock())).unwrap();
    let mut health = ProviderHealth::from_config(&config);

    let out = ai.analyze(ProviderKind::Grok, &brief(), &mut health).await;
    assert_eq!(out.origin, TextOrigin::Template);
    assert!(out.text.contains("CANTINA BELLA"));
    assert!(!health.is_enabled(ProviderKind::Grok));

    // No second request reaches the server.
    ai.analyze(ProviderKind::Grok, &brief(), &mut health).await;
}

#[tokio::test]
async fn test_malformed_body_falls_back_to_template() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/grok/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})))
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server.uri());
    let ai = AiClient::new(&config, shared(&manual_clock())).unwrap();
    let mut health = ProviderHealth::from_config(&config);

    let out = ai.analyze(ProviderKind::Grok, &brief(), &mut health).await;
    assert_eq!(out.origin, TextOrigin::Template);
    assert!(health.is_enabled(ProviderKind::Grok));
}

#[tokio::test]
async fn test_disabled_config_never_touches_network() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let mut config = test_config(&mock_server.uri());
    config.grok.enabled = false;
    config.gemini.enabled = false;
    let ai = AiClient::new(&config, shared(&manual_clock())).unwrap();
    let mut health = ProviderHealth::from_config(&config);

    let out = ai.analyze_prospect(&brief(), &mut health).await;
    assert_eq!(out.origin, TextOrigin::Template);
    assert!(out.text.contains("ANÁLISE PMG - 03/06/2024"));
}

// ============ Geocoding ============

#[tokio::test]
async fn test_geocoder_primary_search() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("countrycodes", "br"))
        .and(query_param("limit", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"lat": "-30.0277", "lon": "-51.2287", "display_name": "Porto Alegre, RS, Brasil"}
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server.uri());
    let geo = GeocodingClient::new(&config, shared(&manual_clock())).unwrap();

    let point = geo.get_coordinates("Rua dos Andradas, 1000, Porto Alegre/RS").await;
    assert_eq!(point, Some(Coordinates { lat: -30.0277, lng: -51.2287 }));

    // Second lookup is served from cache.
    let again = geo.get_coordinates("Rua dos Andradas, 1000, Porto Alegre/RS").await;
    assert_eq!(again, point);
}

#[tokio::test]
async fn test_geocoder_postal_code_fallback() {
    let mock_server = MockServer::start().await;
    let canonical = "Rua dos Andradas, Centro Histórico, Porto Alegre, RS, Brasil";

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", canonical))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"lat": -30.03, "lon": -51.23, "display_name": canonical}
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .with_priority(10)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cep/90020008/json/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "cep": "90020-008",
            "logradouro": "Rua dos Andradas",
            "bairro": "Centro Histórico",
            "localidade": "Porto Alegre",
            "uf": "RS"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server.uri());
    let geo = GeocodingClient::new(&config, shared(&manual_clock())).unwrap();

    let point = geo
        .get_coordinates("Endereço desconhecido - CEP 90020-008")
        .await;
    assert_eq!(point, Some(Coordinates { lat: -30.03, lng: -51.23 }));
}

#[tokio::test]
async fn test_registry_address_reaches_postal_code_fallback() {
    let mock_server = MockServer::start().await;
    let canonical = "Rua dos Andradas, Centro Histórico, Porto Alegre, RS, Brasil";

    Mock::given(method("GET"))
        .and(path(format!("/receitaws/{}", VALID_CNPJ)))
        .respond_with(ResponseTemplate::new(200).set_body_json(receitaws_body()))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", canonical))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"lat": -30.03, "lon": -51.23, "display_name": canonical}
        ])))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .with_priority(10)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cep/90020008/json/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "logradouro": "Rua dos Andradas",
            "bairro": "Centro Histórico",
            "localidade": "Porto Alegre",
            "uf": "RS"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server.uri());
    let registry = CompanyRegistryClient::new(&config, shared(&manual_clock())).unwrap();
    let geo = GeocodingClient::new(&config, shared(&manual_clock())).unwrap();

    let company = registry.get_company_data(VALID_CNPJ).await.unwrap();
    assert!(company.address.ends_with("CEP: 90020-008"), "{}", company.address);

    let point = geo.get_coordinates(&company.address).await;
    assert_eq!(point, Some(Coordinates { lat: -30.03, lng: -51.23 }));
}

#[tokio::test]
async fn test_unresolvable_endpoint_is_an_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server.uri());
    let geo = GeocodingClient::new(&config, shared(&manual_clock())).unwrap();

    assert_eq!(geo.get_coordinates("Lugar nenhum").await, None);

    let err = geo
        .calculate_distance(
            &Location::from("Lugar nenhum"),
            &Location::from(Coordinates { lat: -23.55, lng: -46.63 }),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::UnresolvableLocation(_)));
}

#[tokio::test]
async fn test_routing_provider_and_straight_line_fallback() {
    let mock_server = MockServer::start().await;
    let poa = Coordinates { lat: -30.03, lng: -51.23 };
    let sp = Coordinates { lat: -23.55, lng: -46.63 };

    Mock::given(method("GET"))
        .and(path("/osrm/route/v1/driving/-51.23,-30.03;-46.63,-23.55"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": "Ok",
            "routes": [{"distance": 1_134_567.0, "duration": 50_400.0}]
        })))
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server.uri());
    let geo = GeocodingClient::new(&config, shared(&manual_clock())).unwrap();

    let route = geo
        .get_routing_info(&Location::from(poa), &Location::from(sp), "driving")
        .await
        .unwrap();
    assert_eq!(route.distance_km, 1134.57);
    assert_eq!(route.duration_min, Some(840));
    assert_eq!(route.mode, "driving");

    // No mock for the walking profile: the server answers 404.
    let fallback = geo
        .get_routing_info(&Location::from(poa), &Location::from(sp), "walking")
        .await
        .unwrap();
    assert_eq!(fallback.mode, "straight_line");
    assert_eq!(fallback.duration_min, None);
    assert!(fallback.distance_km > 800.0 && fallback.distance_km < 900.0);
}

#[tokio::test]
async fn test_nearby_places_empty_on_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/overpass"))
        .respond_with(ResponseTemplate::new(504))
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server.uri());
    let geo = GeocodingClient::new(&config, shared(&manual_clock())).unwrap();

    let places = geo
        .nearby_places(Coordinates { lat: -30.03, lng: -51.23 }, "restaurant", 1000)
        .await;
    assert!(places.is_empty());
}

// ============ Social ============

#[tokio::test]
async fn test_instagram_oembed_is_still_estimated() {
    let mock_server = MockServer::start().await;
    let profile_url = format!("{}/ig/cantinabella/", mock_server.uri());

    Mock::given(method("GET"))
        .and(path("/oembed"))
        .and(query_param("url", profile_url.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "title": "Cantina Bella - massas e pizzas",
            "author_name": "Cantina Bella"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server.uri());
    let social = SocialClient::new(&config, shared(&manual_clock())).unwrap();

    let profile = social.analyze_instagram("@cantinabella").await;
    assert_eq!(profile.platform, Platform::Instagram);
    assert_eq!(profile.handle, "cantinabella");
    assert_eq!(profile.display_name, "Cantina Bella");
    assert_eq!(profile.strategy, "oembed");
    assert_eq!(profile.data_source, DataSource::Estimated);
    assert!(profile.confidence <= 0.6);
    assert!(profile.followers <= 50_000);

    // Cached for the hour.
    let again = social.analyze_instagram("https://instagram.com/cantinabella").await;
    assert_eq!(again.followers, profile.followers);
}

#[tokio::test]
async fn test_social_cascade_degrades_to_simulation() {
    let mock_server = MockServer::start().await;
    let config = test_config(&mock_server.uri());
    let social = SocialClient::new(&config, shared(&manual_clock())).unwrap();

    let summary = social
        .analyze(Some("pizzariadonapaula"), Some("facebook.com/pizzariadonapaula"))
        .await;

    assert_eq!(summary.platforms, vec![Platform::Instagram, Platform::Facebook]);
    assert!(summary.estimated);
    for profile in [summary.instagram.as_ref(), summary.facebook.as_ref()]
        .into_iter()
        .flatten()
    {
        assert_eq!(profile.strategy, "simulation");
        assert_eq!(profile.data_source, DataSource::Estimated);
        assert!(profile.confidence >= 0.5 && profile.confidence <= 0.6);
        assert!(profile.followers <= 50_000);
        assert!((1.0..=5.0).contains(&profile.engagement_rate_pct));
    }
    assert_eq!(
        summary.total_followers,
        summary.instagram.as_ref().map_or(0, |p| p.followers)
            + summary.facebook.as_ref().map_or(0, |p| p.followers)
    );
}

#[tokio::test]
async fn test_facebook_graph_is_live() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/graph/cantinabella"))
        .and(query_param("access_token", "graph-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "name": "Cantina Bella",
            "category": "Restaurante italiano",
            "fan_count": 12840
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut config = test_config(&mock_server.uri());
    config.social.graph_access_token = Some("graph-token".to_string());
    let social = SocialClient::new(&config, shared(&manual_clock())).unwrap();

    let profile = social
        .analyze_facebook("https://www.facebook.com/cantinabella/")
        .await;
    assert_eq!(profile.data_source, DataSource::Live);
    assert_eq!(profile.followers, 12_840);
    assert_eq!(profile.content_category, "Restaurante italiano");
    assert_eq!(profile.strategy, "graph_api");
}

#[tokio::test]
async fn test_facebook_graph_without_fan_count_falls_through_to_scrape() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/graph/cantinabella"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "name": "Cantina Bella",
            "category": "Restaurante italiano"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/proxy"))
        .and(query_param("url", "https://www.facebook.com/cantinabella"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><head>
<meta property="og:title" content="Cantina Bella">
<meta property="og:description" content="Cantina Bella - 1,5 mil curtidas - Restaurante italiano">
</head></html>"#,
        ))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut config = test_config(&mock_server.uri());
    config.social.graph_access_token = Some("graph-token".to_string());
    let social = SocialClient::new(&config, shared(&manual_clock())).unwrap();

    let profile = social.analyze_facebook("cantinabella").await;
    assert_eq!(profile.strategy, "scrape");
    assert_eq!(profile.data_source, DataSource::Scraped);
    assert_eq!(profile.followers, 1_500);
    assert_eq!(profile.display_name, "Cantina Bella");
}
