use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pmg_prospector::catalog;
use pmg_prospector::clock::system_clock;
use pmg_prospector::cnpj;
use pmg_prospector::config::Config;
use pmg_prospector::history::HistoryStore;
use pmg_prospector::menu;
use pmg_prospector::models::{format_brl, AnalysisResult, ProspectInput, TextOrigin};
use pmg_prospector::prospect::ProspectAnalyzer;

#[derive(Parser)]
#[command(name = "pmg-prospector", version, about = "Análise de prospects PMG Atacadista")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analisa um prospect completo
    Analyze {
        #[arg(long)]
        cnpj: String,
        #[arg(long)]
        instagram: Option<String>,
        #[arg(long)]
        facebook: Option<String>,
        #[arg(long)]
        website: Option<String>,
        /// Arquivo de texto com o cardápio
        #[arg(long)]
        menu_file: Option<PathBuf>,
        /// Imprime o resultado completo em JSON
        #[arg(long)]
        json: bool,
        /// Não grava no histórico
        #[arg(long)]
        no_history: bool,
    },
    /// Valida os dígitos verificadores de um CNPJ
    Validate { cnpj: String },
    /// Analisa um cardápio localmente, sem IA
    Menu { file: PathBuf },
    /// Mostra o histórico e as estatísticas
    History,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pmg_prospector=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Validate { cnpj: raw } => {
            let digits = cnpj::clean(&raw);
            if cnpj::validate(&digits) {
                println!("✅ CNPJ válido: {}", cnpj::format(&digits));
            } else {
                println!("❌ CNPJ inválido: {}", raw);
                std::process::exit(1);
            }
        }
        Command::Menu { file } => {
            let text = std::fs::read_to_string(&file)?;
            let analysis = menu::analyze(&text);
            println!("{}", serde_json::to_string_pretty(&analysis)?);
        }
        Command::History => {
            let config = Config::from_env()?;
            let store = HistoryStore::open(&config.history_path)?;
            let stats = store.stats();
            println!("📊 Total de análises: {}", stats.total_analyses);
            for (kind, count) in &stats.by_business_type {
                println!("   {}: {}", kind, count);
            }
            for (source, count) in &stats.by_data_source {
                println!("   dados sociais {}: {}", source, count);
            }
            for entry in store.entries().iter().rev().take(20) {
                println!(
                    "{}  {}  {}  ({})",
                    entry.timestamp.format("%d/%m/%Y %H:%M"),
                    cnpj::format(&entry.tax_id),
                    entry.company_name,
                    entry.business_type
                );
            }
        }
        Command::Analyze {
            cnpj,
            instagram,
            facebook,
            website,
            menu_file,
            json,
            no_history,
        } => {
            let config = Config::from_env()?;

            let menu_text = match menu_file {
                Some(path) => Some(std::fs::read_to_string(path)?),
                None => None,
            };

            let mut analyzer = ProspectAnalyzer::new(&config, system_clock())?;
            let result = analyzer
                .analyze(ProspectInput {
                    tax_id: cnpj,
                    instagram,
                    facebook,
                    website,
                    menu_text,
                })
                .await?;

            if !no_history {
                let mut store = HistoryStore::open(&config.history_path)?
                    .with_max_entries(config.history_max_entries);
                if let Err(e) = store.record(&result) {
                    tracing::warn!("Failed to save history: {}", e);
                }
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_report(&result);
            }
        }
    }

    Ok(())
}

fn origin_label(origin: TextOrigin) -> String {
    match origin {
        TextOrigin::Provider(p) => format!("IA ({})", p),
        TextOrigin::Cache(p) => format!("IA ({}, cache)", p),
        TextOrigin::Template => "modelo local".to_string(),
    }
}

fn print_report(result: &AnalysisResult) {
    let c = &result.company;
    println!("🏢 {} ({})", c.display_name(), c.tax_id_formatted);
    println!("   Razão social: {}", c.legal_name);
    println!("   Atividade: {}", c.main_activity);
    println!("   Endereço: {}", c.address);
    if let Some(point) = c.coordinates {
        println!("   Coordenadas: {:.5}, {:.5}", point.lat, point.lng);
    }
    println!(
        "   Porte: {}  Capital: {}  Situação: {:?}",
        c.size_class.label(),
        c.capital_display,
        c.situation
    );
    println!("   Tipo de negócio: {}", result.business_type.label());

    if result.social.has_presence() {
        println!();
        println!(
            "📱 Redes sociais{}",
            if result.social.estimated { " (estimado)" } else { "" }
        );
        for profile in [result.social.instagram.as_ref(), result.social.facebook.as_ref()]
            .into_iter()
            .flatten()
        {
            println!(
                "   {} @{}: {} seguidores, {:.2}% engajamento, {} [{:?}, confiança {:.2}]",
                profile.platform,
                profile.handle,
                profile.followers,
                profile.engagement_rate_pct,
                profile.content_category,
                profile.data_source,
                profile.confidence
            );
        }
        for r in &result.social.recommendations {
            println!("   • {}", r);
        }
    }

    if let Some(menu) = &result.menu {
        println!();
        println!(
            "🍕 Cardápio: {} itens, preço médio {}",
            menu.items.len(),
            format_brl(menu.price_statistics.average)
        );
        let keys: Vec<&str> = menu.categories.keys().map(|k| k.key()).collect();
        println!("   Categorias: {}", keys.join(", "));
    }

    println!();
    println!("🎯 Produtos recomendados");
    for s in &result.suggestions {
        println!(
            "   {:>6.2}  {}  ({}, {:?})",
            s.score,
            catalog::describe(&s.product_code),
            s.reason,
            s.source
        );
    }

    if let Some(competition) = &result.competition {
        let market = &competition.market_position;
        println!();
        println!(
            "🏁 Mercado: {} ({}, crescimento {}, concorrência {})",
            market.segment,
            market.size_estimate,
            market.growth_potential,
            market.competitive_intensity.label()
        );
        for ranked in competition.competitors.iter().take(3) {
            println!(
                "   {}  score {:.1}  relevância {:.1}  {}",
                ranked.competitor.name,
                ranked.competitive_score,
                ranked.relevance,
                ranked.threats.join("; ")
            );
        }
        if let Some(local) = &competition.local {
            println!(
                "   {} estabelecimentos similares em {} m ({}): {}",
                local.count,
                local.radius_m,
                local.intensity.label(),
                local.names.join(", ")
            );
        }
        for r in &competition.recommendations {
            println!("   • {}", r);
        }
    }

    println!();
    println!("📋 Análise [{}]", origin_label(result.analysis.origin));
    println!("{}", result.analysis.text);
    println!();
    println!("🗣️ Script de vendas [{}]", origin_label(result.sales_script.origin));
    println!("{}", result.sales_script.text);
}
