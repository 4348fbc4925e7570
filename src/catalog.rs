//! Wholesale catalog entries referenced by recommendations and sales scripts.

use crate::models::format_brl;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CatalogProduct {
    pub code: &'static str,
    pub name: &'static str,
    pub unit: &'static str,
    pub price: f64,
    pub group: &'static str,
}

const CATALOG: &[CatalogProduct] = &[
    CatalogProduct { code: "48", name: "BANHA SUÍNA REFINADA 1 KG", unit: "PC", price: 14.90, group: "gorduras" },
    CatalogProduct { code: "271", name: "BACON EM CUBOS DEFUMADO 1 KG", unit: "KG", price: 39.80, group: "frios" },
    CatalogProduct { code: "277", name: "MOLHO DE TOMATE TRADICIONAL BAG 1,7 KG", unit: "BAG", price: 16.45, group: "molhos" },
    CatalogProduct { code: "318", name: "FERMENTO BIOLÓGICO SECO 500 G", unit: "PC", price: 21.30, group: "panificação" },
    CatalogProduct { code: "319", name: "MELHORADOR DE FARINHA 300 G", unit: "PC", price: 12.70, group: "panificação" },
    CatalogProduct { code: "334", name: "QUEIJO MUÇARELA PEÇA 4 KG", unit: "KG", price: 34.90, group: "laticínios" },
    CatalogProduct { code: "506", name: "ÓLEO DE SOJA 900 ML", unit: "UN", price: 7.85, group: "óleos" },
    CatalogProduct { code: "597", name: "FARINHA DE TRIGO TIPO 1 25 KG", unit: "SC", price: 98.50, group: "farinhas" },
    CatalogProduct { code: "740", name: "ABACAXI EM CALDA RODELAS 400 G", unit: "LT", price: 18.65, group: "conservas" },
    CatalogProduct { code: "5167", name: "ACÉM BOVINO RESFRIADO 8 KG", unit: "KG", price: 28.64, group: "carnes" },
    CatalogProduct { code: "8563", name: "MASSA FRESCA TALHARIM 1 KG", unit: "PC", price: 17.20, group: "massas" },
];

pub fn lookup(code: &str) -> Option<&'static CatalogProduct> {
    CATALOG.iter().find(|p| p.code == code)
}

pub fn contains(code: &str) -> bool {
    lookup(code).is_some()
}

/// One line for reports: `NAME (UNIT) - R$ 0,00`, or a placeholder for unknown codes.
pub fn describe(code: &str) -> String {
    match lookup(code) {
        Some(p) => format!("{} ({}) - {}", p.name, p.unit, format_brl(p.price)),
        None => format!("Produto {}", code),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_and_describe() {
        assert_eq!(lookup("597").map(|p| p.group), Some("farinhas"));
        assert!(contains("5167"));
        assert!(!contains("0"));
        assert_eq!(describe("740"), "ABACAXI EM CALDA RODELAS 400 G (LT) - R$ 18,65");
        assert_eq!(describe("999"), "Produto 999");
    }

    #[test]
    fn test_codes_are_unique() {
        let mut codes: Vec<&str> = CATALOG.iter().map(|p| p.code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), CATALOG.len());
    }
}
