//! Address → coordinates resolution with a postal-code fallback, plus
//! reverse geocoding, nearby places and road routing.

use crate::cache::TtlCache;
use crate::clock::SharedClock;
use crate::config::{Config, GeocodingConfig};
use crate::errors::AppError;
use crate::models::Coordinates;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::LazyLock;
use std::time::Duration;

const EARTH_RADIUS_KM: f64 = 6371.0;

static CEP_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{2}\.?\d{3}-?\d{3}").expect("valid CEP regex"));

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AddressComponents {
    pub street: Option<String>,
    pub number: Option<String>,
    pub neighborhood: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodedAddress {
    pub coordinates: Coordinates,
    pub display_name: String,
    pub components: AddressComponents,
}

/// Either end of a distance or route query.
#[derive(Debug, Clone)]
pub enum Location {
    Address(String),
    Point(Coordinates),
}

impl From<&str> for Location {
    fn from(s: &str) -> Self {
        Location::Address(s.to_string())
    }
}

impl From<Coordinates> for Location {
    fn from(c: Coordinates) -> Self {
        Location::Point(c)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteInfo {
    pub distance_km: f64,
    /// Minutes; `None` for straight-line estimates.
    pub duration_min: Option<u64>,
    pub origin: Coordinates,
    pub destination: Coordinates,
    /// Routing profile used, or `straight_line`.
    pub mode: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearbyPlace {
    pub id: i64,
    pub name: String,
    pub kind: Option<String>,
    pub cuisine: Option<String>,
    pub coordinates: Coordinates,
    pub address: String,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub opening_hours: Option<String>,
}

pub struct GeocodingClient {
    client: Client,
    config: GeocodingConfig,
    cache: TtlCache<Option<GeocodedAddress>>,
    reverse_cache: TtlCache<GeocodedAddress>,
}

impl GeocodingClient {
    pub fn new(config: &Config, clock: SharedClock) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(config.geocoding.user_agent.clone())
            .build()
            .map_err(|e| AppError::provider("geocoding", format!("Failed to create client: {}", e)))?;

        Ok(Self {
            client,
            config: config.geocoding.clone(),
            cache: TtlCache::new("coords", config.cache_ttls.geocoding_secs, clock.clone()),
            reverse_cache: TtlCache::new("reverse", config.cache_ttls.geocoding_secs, clock),
        })
    }

    /// Coordinates for a free-text address, `None` when nothing resolves it.
    pub async fn get_coordinates(&self, address: &str) -> Option<Coordinates> {
        self.geocode(address).await.map(|g| g.coordinates)
    }

    /// Full geocoding result. Falls back once through the postal code found in
    /// the address text; the fallback never recurses further.
    pub async fn geocode(&self, address: &str) -> Option<GeocodedAddress> {
        let address = address.trim();
        if address.is_empty() {
            return None;
        }

        let key: String = url::form_urlencoded::byte_serialize(address.as_bytes()).collect();
        if let Some(cached) = self.cache.get(&key).await {
            return cached;
        }

        let result = match self.search(address).await {
            Ok(Some(found)) => Some(found),
            Ok(None) => {
                tracing::debug!("Geocoder found nothing for '{}'", address);
                self.postal_code_fallback(address).await
            }
            Err(e) => {
                tracing::warn!("Geocoder failed for '{}': {}", address, e);
                self.postal_code_fallback(address).await
            }
        };

        if result.is_some() {
            self.cache.set(&key, result.clone()).await;
        }
        result
    }

    async fn search(&self, address: &str) -> Result<Option<GeocodedAddress>, AppError> {
        let response = self
            .client
            .get(&self.config.search_url)
            .query(&[
                ("q", address),
                ("format", "json"),
                ("limit", "1"),
                ("countrycodes", self.config.country_code.as_str()),
                ("addressdetails", "1"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::provider_status(
                "geocoder",
                status.as_u16(),
                format!("returned {}", status),
            ));
        }

        let body: Value = response.json().await?;
        Ok(body
            .as_array()
            .and_then(|list| list.first())
            .and_then(parse_place))
    }

    async fn postal_code_fallback(&self, address: &str) -> Option<GeocodedAddress> {
        let cep = extract_postal_code(address)?;
        let canonical = match self.lookup_postal_code(&cep).await {
            Ok(a) => a,
            Err(e) => {
                tracing::warn!("Postal code lookup failed for {}: {}", cep, e);
                return None;
            }
        };

        tracing::info!("Retrying geocoder with postal-code address: {}", canonical);
        match self.search(&canonical).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!("Geocoder retry failed for '{}': {}", canonical, e);
                None
            }
        }
    }

    /// Resolves a CEP to `street, district, city, UF, Brasil`.
    pub async fn lookup_postal_code(&self, cep: &str) -> Result<String, AppError> {
        let digits: String = cep.chars().filter(|c| c.is_ascii_digit()).collect();
        let url = format!("{}/{}/json/", self.config.postal_code_url.trim_end_matches('/'), digits);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::provider_status(
                "postal_code",
                status.as_u16(),
                "CEP não encontrado",
            ));
        }

        let body: Value = response.json().await?;
        if body.get("erro").is_some_and(|e| !matches!(e, Value::Bool(false) | Value::Null)) {
            return Err(AppError::provider("postal_code", "CEP inválido"));
        }

        let field = |k: &str| body.get(k).and_then(Value::as_str).unwrap_or("").to_string();
        Ok(format!(
            "{}, {}, {}, {}, Brasil",
            field("logradouro"),
            field("bairro"),
            field("localidade"),
            field("uf")
        ))
    }

    pub async fn reverse_geocode(&self, point: Coordinates) -> Option<GeocodedAddress> {
        let key = format!("{}_{}", point.lat, point.lng);
        if let Some(cached) = self.reverse_cache.get(&key).await {
            return Some(cached);
        }

        let lat = point.lat.to_string();
        let lng = point.lng.to_string();
        let response = self
            .client
            .get(&self.config.reverse_url)
            .query(&[
                ("lat", lat.as_str()),
                ("lon", lng.as_str()),
                ("format", "json"),
                ("addressdetails", "1"),
            ])
            .send()
            .await;

        let body: Value = match response {
            Ok(r) if r.status().is_success() => match r.json().await {
                Ok(b) => b,
                Err(e) => {
                    tracing::warn!("Reverse geocoding returned malformed body: {}", e);
                    return None;
                }
            },
            Ok(r) => {
                tracing::warn!("Reverse geocoding returned {}", r.status());
                return None;
            }
            Err(e) => {
                tracing::warn!("Reverse geocoding failed: {}", e);
                return None;
            }
        };

        let result = GeocodedAddress {
            coordinates: point,
            display_name: body
                .get("display_name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            components: parse_address_components(&body),
        };
        self.reverse_cache.set(&key, result.clone()).await;
        Some(result)
    }

    async fn resolve(&self, location: &Location) -> Result<Coordinates, AppError> {
        match location {
            Location::Point(c) => Ok(*c),
            Location::Address(a) => self.get_coordinates(a).await.ok_or_else(|| {
                AppError::UnresolvableLocation(format!("Não foi possível geocodificar: {}", a))
            }),
        }
    }

    /// Great-circle distance in km, rounded to 2 decimals.
    pub async fn calculate_distance(
        &self,
        origin: &Location,
        destination: &Location,
    ) -> Result<f64, AppError> {
        let a = self.resolve(origin).await?;
        let b = self.resolve(destination).await?;
        Ok(haversine_km(a, b))
    }

    /// Road route when the routing service answers, straight line otherwise.
    pub async fn get_routing_info(
        &self,
        origin: &Location,
        destination: &Location,
        mode: &str,
    ) -> Result<RouteInfo, AppError> {
        let a = self.resolve(origin).await?;
        let b = self.resolve(destination).await?;

        match self.route(a, b, mode).await {
            Ok(Some(route)) => Ok(route),
            Ok(None) => Ok(straight_line(a, b)),
            Err(e) => {
                tracing::warn!("Routing unavailable, using straight line: {}", e);
                Ok(straight_line(a, b))
            }
        }
    }

    async fn route(
        &self,
        a: Coordinates,
        b: Coordinates,
        mode: &str,
    ) -> Result<Option<RouteInfo>, AppError> {
        let url = format!(
            "{}/route/v1/{}/{},{};{},{}",
            self.config.routing_url.trim_end_matches('/'),
            mode,
            a.lng,
            a.lat,
            b.lng,
            b.lat
        );
        let response = self
            .client
            .get(&url)
            .query(&[("overview", "false"), ("steps", "false")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::provider_status("routing", status.as_u16(), "routing failed"));
        }

        let body: Value = response.json().await?;
        let Some(route) = body
            .get("routes")
            .and_then(Value::as_array)
            .and_then(|r| r.first())
        else {
            return Ok(None);
        };

        let meters = route.get("distance").and_then(Value::as_f64).unwrap_or(0.0);
        let seconds = route.get("duration").and_then(Value::as_f64).unwrap_or(0.0);
        Ok(Some(RouteInfo {
            distance_km: round2(meters / 1000.0),
            duration_min: Some((seconds / 60.0).round() as u64),
            origin: a,
            destination: b,
            mode: mode.to_string(),
        }))
    }

    /// Places of an amenity `kind` within `radius_m`. Empty on any failure.
    pub async fn nearby_places(
        &self,
        center: Coordinates,
        kind: &str,
        radius_m: u32,
    ) -> Vec<NearbyPlace> {
        let query = format!(
            "[out:json][timeout:25];(node[\"amenity\"=\"{k}\"](around:{r},{lat},{lng});way[\"amenity\"=\"{k}\"](around:{r},{lat},{lng});relation[\"amenity\"=\"{k}\"](around:{r},{lat},{lng}););out center;",
            k = kind,
            r = radius_m,
            lat = center.lat,
            lng = center.lng
        );

        let response = self
            .client
            .post(&self.config.nearby_url)
            .form(&[("data", query.as_str())])
            .send()
            .await;

        let body: Value = match response {
            Ok(r) if r.status().is_success() => match r.json().await {
                Ok(b) => b,
                Err(e) => {
                    tracing::warn!("Nearby places returned malformed body: {}", e);
                    return Vec::new();
                }
            },
            Ok(r) => {
                tracing::warn!("Nearby places returned {}", r.status());
                return Vec::new();
            }
            Err(e) => {
                tracing::warn!("Nearby places failed: {}", e);
                return Vec::new();
            }
        };

        body.get("elements")
            .and_then(Value::as_array)
            .map(|elements| elements.iter().filter_map(parse_element).collect())
            .unwrap_or_default()
    }
}

fn parse_place(place: &Value) -> Option<GeocodedAddress> {
    let coord = |k: &str| -> Option<f64> {
        match place.get(k)? {
            Value::String(s) => s.parse().ok(),
            Value::Number(n) => n.as_f64(),
            _ => None,
        }
    };
    Some(GeocodedAddress {
        coordinates: Coordinates {
            lat: coord("lat")?,
            lng: coord("lon")?,
        },
        display_name: place
            .get("display_name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        components: parse_address_components(place),
    })
}

fn parse_address_components(place: &Value) -> AddressComponents {
    let Some(addr) = place.get("address") else {
        return AddressComponents::default();
    };
    let first = |keys: &[&str]| {
        keys.iter()
            .find_map(|k| addr.get(*k).and_then(Value::as_str))
            .map(str::to_string)
    };
    AddressComponents {
        street: first(&["road", "pedestrian", "street"]),
        number: first(&["house_number"]),
        neighborhood: first(&["suburb", "neighbourhood", "quarter"]),
        city: first(&["city", "town", "village", "municipality"]),
        state: first(&["state"]),
        postal_code: first(&["postcode"]),
        country: first(&["country"]),
    }
}

fn parse_element(element: &Value) -> Option<NearbyPlace> {
    let empty = Value::Null;
    let tags = element.get("tags").unwrap_or(&empty);
    let tag = |k: &str| tags.get(k).and_then(Value::as_str).map(str::to_string);

    let lat = element
        .get("lat")
        .or_else(|| element.get("center").and_then(|c| c.get("lat")))
        .and_then(Value::as_f64)?;
    let lng = element
        .get("lon")
        .or_else(|| element.get("center").and_then(|c| c.get("lon")))
        .and_then(Value::as_f64)?;

    let address = ["addr:street", "addr:housenumber", "addr:neighbourhood", "addr:city"]
        .iter()
        .filter_map(|k| tag(k))
        .collect::<Vec<_>>()
        .join(", ");

    Some(NearbyPlace {
        id: element.get("id").and_then(Value::as_i64).unwrap_or_default(),
        name: tag("name").unwrap_or_else(|| "Nome não disponível".to_string()),
        kind: tag("amenity"),
        cuisine: tag("cuisine"),
        coordinates: Coordinates { lat, lng },
        address,
        phone: tag("phone"),
        website: tag("website"),
        opening_hours: tag("opening_hours"),
    })
}

/// First CEP-shaped token in the text.
pub fn extract_postal_code(text: &str) -> Option<String> {
    CEP_REGEX.find(text).map(|m| m.as_str().to_string())
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Haversine distance in km, rounded to 2 decimals.
pub fn haversine_km(a: Coordinates, b: Coordinates) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    round2(EARTH_RADIUS_KM * c)
}

fn straight_line(a: Coordinates, b: Coordinates) -> RouteInfo {
    RouteInfo {
        distance_km: haversine_km(a, b),
        duration_min: None,
        origin: a,
        destination: b,
        mode: "straight_line".to_string(),
    }
}

pub fn map_url(point: Coordinates, zoom: u8) -> String {
    format!(
        "https://www.openstreetmap.org/?mlat={}&mlon={}&zoom={}",
        point.lat, point.lng, zoom
    )
}

pub fn directions_url(origin: &Location, destination: &Location) -> String {
    let part = |l: &Location| -> String {
        let raw = match l {
            Location::Address(a) => a.clone(),
            Location::Point(c) => format!("{},{}", c.lat, c.lng),
        };
        url::form_urlencoded::byte_serialize(raw.as_bytes())
            .collect::<String>()
            .replace('+', "%20")
    };
    format!(
        "https://www.google.com/maps/dir/{}/{}",
        part(origin),
        part(destination)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SAO_PAULO: Coordinates = Coordinates {
        lat: -23.5505,
        lng: -46.6333,
    };
    const RIO: Coordinates = Coordinates {
        lat: -22.9068,
        lng: -43.1729,
    };

    #[test]
    fn test_haversine_known_distance() {
        let d = haversine_km(SAO_PAULO, RIO);
        assert!((d - 360.75).abs() < 1.0, "got {}", d);
        assert_eq!(haversine_km(SAO_PAULO, SAO_PAULO), 0.0);
    }

    #[test]
    fn test_extract_postal_code() {
        assert_eq!(
            extract_postal_code("Rua A, 10 - CEP: 01001-000").as_deref(),
            Some("01001-000")
        );
        assert_eq!(extract_postal_code("CEP 01001000").as_deref(), Some("01001000"));
        assert_eq!(
            extract_postal_code("PORTO ALEGRE/RS - CEP: 90.020-008").as_deref(),
            Some("90.020-008")
        );
        assert_eq!(extract_postal_code("sem cep"), None);
    }

    #[test]
    fn test_parse_place_with_string_coordinates() {
        let place = json!({
            "lat": "-23.5505",
            "lon": "-46.6333",
            "display_name": "São Paulo, Brasil",
            "address": {"road": "Praça da Sé", "city": "São Paulo", "postcode": "01001-000"}
        });
        let parsed = parse_place(&place).expect("parsed");
        assert_eq!(parsed.coordinates, SAO_PAULO);
        assert_eq!(parsed.components.street.as_deref(), Some("Praça da Sé"));
        assert_eq!(parsed.components.city.as_deref(), Some("São Paulo"));
    }

    #[test]
    fn test_parse_element_uses_center_for_ways() {
        let element = json!({
            "id": 7,
            "center": {"lat": -23.0, "lon": -46.0},
            "tags": {"amenity": "restaurant", "addr:street": "Rua B", "addr:city": "SP"}
        });
        let place = parse_element(&element).expect("place");
        assert_eq!(place.name, "Nome não disponível");
        assert_eq!(place.address, "Rua B, SP");
        assert_eq!(place.coordinates.lat, -23.0);

        assert!(parse_element(&json!({"id": 1, "tags": {}})).is_none());
    }

    #[test]
    fn test_urls() {
        assert_eq!(
            map_url(SAO_PAULO, 15),
            "https://www.openstreetmap.org/?mlat=-23.5505&mlon=-46.6333&zoom=15"
        );
        let url = directions_url(&Location::from("Rua A 1"), &Location::Point(RIO));
        assert_eq!(
            url,
            "https://www.google.com/maps/dir/Rua%20A%201/-22.9068%2C-43.1729"
        );
    }

    #[test]
    fn test_straight_line_has_no_duration() {
        let route = straight_line(SAO_PAULO, RIO);
        assert_eq!(route.mode, "straight_line");
        assert!(route.duration_min.is_none());
    }
}
