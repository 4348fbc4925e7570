//! Local menu parsing: line items, categories, price statistics and
//! ingredient frequency. Pure functions, no I/O.

use crate::models::{
    IngredientCount, MenuAnalysis, MenuCategory, MenuItem, PriceDistribution, PriceStatistics,
};
use regex::{Captures, Regex};
use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;

// "R$ 1.234,56", "R$ 35", or a bare "35,00" / "35.00"
const PRICE: &str = r"(?:R\$\s*(?P<price_rs>\d{1,3}(?:\.\d{3})+(?:,\d{1,2})?|\d+(?:[.,]\d{1,2})?)|(?P<price_bare>\d+[.,]\d{2}))";

static NUMBERED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"^\s*\d+\s*[.)\-]\s*(?P<name>.+?)\s*[-–:.…]*\s*{}\s*$",
        PRICE
    ))
    .expect("valid regex")
});

static DESCRIBED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"^\s*(?P<name>.+?)\s+[-–]\s+(?P<desc>.+?)\s+[-–]\s+{}\s*$",
        PRICE
    ))
    .expect("valid regex")
});

static PLAIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^\s*(?P<name>.+?)\s*[-–:.…]*\s*{}\s*$", PRICE)).expect("valid regex")
});

const CATEGORY_KEYWORDS: &[(MenuCategory, &[&str])] = &[
    (
        MenuCategory::Pizzas,
        &["pizza", "margherita", "calabresa", "portuguesa", "pepperoni", "mozzarella"],
    ),
    (
        MenuCategory::Burgers,
        &["hambúrguer", "hamburguer", "burger", "x-bacon", "x-tudo", "cheeseburger", "sanduíche"],
    ),
    (
        MenuCategory::Pasta,
        &["espaguete", "lasanha", "macarrão", "macarrao", "penne", "ravioli", "nhoque", "talharim"],
    ),
    (
        MenuCategory::Meats,
        &["bife", "picanha", "alcatra", "frango", "costela", "file", "filé", "carne"],
    ),
    (
        MenuCategory::Seafood,
        &["camarão", "camarao", "peixe", "salmão", "salmao", "bacalhau", "lula", "polvo"],
    ),
    (
        MenuCategory::Desserts,
        &["pudim", "torta", "sorvete", "mousse", "brigadeiro", "doce", "açaí", "acai"],
    ),
    (
        MenuCategory::Drinks,
        &["refrigerante", "suco", "água", "agua", "cerveja", "vinho", "caipirinha", "drink"],
    ),
    (
        MenuCategory::Starters,
        &["salada", "bruschetta", "antipasto", "entrada", "aperitivo", "porção", "porcao"],
    ),
];

const INGREDIENTS: &[&str] = &[
    "queijo", "mozzarella", "cheddar", "gorgonzola", "parmesão",
    "tomate", "cebola", "alho", "manjericão", "orégano",
    "carne", "frango", "bacon", "presunto", "calabresa",
    "camarão", "salmão", "atum", "bacalhau",
    "batata", "brócolis", "cogumelo", "azeitona", "pimentão",
    "molho", "azeite", "vinagre", "mostarda", "maionese",
];

/// Runs the full local analysis over raw menu text.
pub fn analyze(text: &str) -> MenuAnalysis {
    let items: Vec<MenuItem> = extract_items(text)
        .into_iter()
        .map(|item| MenuItem {
            category: Some(category_for(&item.name)),
            ..item
        })
        .collect();
    let categories = categorize(&items);

    MenuAnalysis {
        price_statistics: price_statistics(&items),
        ingredients: extract_ingredients(text),
        categories,
        items,
    }
}

/// Extracts priced line items. Per line the numbered, described and plain
/// patterns are tried in that order; duplicates (case-insensitive) keep the first.
pub fn extract_items(text: &str) -> Vec<MenuItem> {
    let mut seen = HashSet::new();
    let mut items = Vec::new();

    for line in text.lines() {
        let Some(item) = parse_line(line) else {
            continue;
        };
        if item.name.chars().count() <= 3 || item.price <= 0.0 {
            continue;
        }
        if seen.insert(item.name.to_lowercase()) {
            items.push(item);
        }
    }
    items
}

fn parse_line(line: &str) -> Option<MenuItem> {
    if line.trim().is_empty() {
        return None;
    }
    [&*NUMBERED, &*DESCRIBED, &*PLAIN]
        .iter()
        .find_map(|re| re.captures(line))
        .and_then(|caps| item_from(&caps))
}

fn item_from(caps: &Captures) -> Option<MenuItem> {
    let name = caps
        .name("name")?
        .as_str()
        .trim()
        .trim_end_matches(['-', '–', ':', '.', '…'])
        .trim()
        .to_string();
    let raw_price = caps.name("price_rs").or_else(|| caps.name("price_bare"))?;
    let description = caps
        .name("desc")
        .map(|d| d.as_str().trim().to_string())
        .filter(|d| !d.is_empty());

    Some(MenuItem {
        name,
        price: parse_price(raw_price.as_str())?,
        category: None,
        description,
    })
}

/// Brazilian price notation to a cents-rounded float.
pub fn parse_price(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    let normalized = if raw.contains(',') {
        raw.replace('.', "").replace(',', ".")
    } else if raw.matches('.').count() > 1 || raw.split('.').nth(1).is_some_and(|d| d.len() == 3) {
        raw.replace('.', "")
    } else {
        raw.to_string()
    };
    normalized.parse::<f64>().ok().map(round2)
}

/// Category of an item name: first keyword table that matches, else `Other`.
pub fn category_for(name: &str) -> MenuCategory {
    let lower = name.to_lowercase();
    CATEGORY_KEYWORDS
        .iter()
        .find(|(_, words)| words.iter().any(|w| lower.contains(w)))
        .map(|(category, _)| *category)
        .unwrap_or(MenuCategory::Other)
}

/// Groups items by category. Empty categories are omitted.
pub fn categorize(items: &[MenuItem]) -> BTreeMap<MenuCategory, Vec<MenuItem>> {
    let mut grouped: BTreeMap<MenuCategory, Vec<MenuItem>> = BTreeMap::new();
    for item in items {
        let category = category_for(&item.name);
        grouped.entry(category).or_default().push(MenuItem {
            category: Some(category),
            ..item.clone()
        });
    }
    grouped
}

pub fn price_statistics(items: &[MenuItem]) -> PriceStatistics {
    if items.is_empty() {
        return PriceStatistics::default();
    }

    let mut prices: Vec<f64> = items.iter().map(|i| i.price).collect();
    prices.sort_by(|a, b| a.total_cmp(b));

    let n = prices.len();
    let average = prices.iter().sum::<f64>() / n as f64;
    let median = if n % 2 == 0 {
        (prices[n / 2 - 1] + prices[n / 2]) / 2.0
    } else {
        prices[n / 2]
    };

    PriceStatistics {
        min: round2(prices[0]),
        max: round2(prices[n - 1]),
        average: round2(average),
        median: round2(median),
        distribution: price_distribution(&prices),
    }
}

fn price_distribution(prices: &[f64]) -> PriceDistribution {
    let mut d = PriceDistribution::default();
    for &price in prices {
        if price <= 15.0 {
            d.up_to_15 += 1;
        } else if price <= 30.0 {
            d.up_to_30 += 1;
        } else if price <= 50.0 {
            d.up_to_50 += 1;
        } else if price <= 100.0 {
            d.up_to_100 += 1;
        } else {
            d.above_100 += 1;
        }
    }
    d
}

/// Vocabulary hits in the text, most frequent first (stable for ties).
pub fn extract_ingredients(text: &str) -> Vec<IngredientCount> {
    let lower = text.to_lowercase();
    let mut found: Vec<IngredientCount> = INGREDIENTS
        .iter()
        .filter_map(|ingredient| {
            let count = lower.matches(ingredient).count();
            (count > 0).then(|| IngredientCount {
                ingredient: ingredient.to_string(),
                count,
            })
        })
        .collect();
    found.sort_by(|a, b| b.count.cmp(&a.count));
    found
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
