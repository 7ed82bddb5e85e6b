//! ordreg-demo - run the intake pipeline over sample data
//!
//! Processes a handful of representative order messages against a small
//! bundled catalog (in-memory database) and prints the resulting golden
//! records. Useful for demonstrating the pipeline without standing up
//! the HTTP service.

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use ordreg_common::events::EventBus;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use ordreg_intake::catalog::{parse_entries, CatalogHandle, CatalogIndex};
use ordreg_intake::db;
use ordreg_intake::extract::PatternExtractor;
use ordreg_intake::ledger::InboundRequest;
use ordreg_intake::pipeline::{IntakeOutcome, IntakePipeline};

/// Bundled sample catalog (plumbing/electrical wholesale)
const SAMPLE_CATALOG: &str = r#"[
    {
        "sku_id": "PVC-2IN",
        "name": "pvc pipe 2in",
        "synonyms": ["2\" pvc", "2 inch pvc pipe", "pvc 2in"],
        "permitted_uoms": ["each", "m"],
        "price_band": { "min": 3.0, "max": 6.0 }
    },
    {
        "sku_id": "CU-15",
        "name": "copper cable 1.5mm",
        "synonyms": ["1.5mm wire", "copper cable 1.5", "cu cable 1.5"],
        "permitted_uoms": ["m", "roll"],
        "price_band": { "min": 0.4, "max": 1.2 }
    },
    {
        "sku_id": "SW-8P",
        "name": "8 port switch",
        "synonyms": ["8p switch", "switch 8 port"],
        "permitted_uoms": ["each"],
        "price_band": { "min": 18.0, "max": 35.0 }
    },
    {
        "sku_id": "PVC-4IN",
        "name": "pvc pipe 4in",
        "synonyms": ["4\" pvc"],
        "permitted_uoms": ["each", "m"],
        "price_band": { "min": 5.0, "max": 9.0 },
        "active": false
    }
]"#;

/// Sample messages mirroring real channel traffic
fn demo_messages() -> Vec<(&'static str, &'static str, &'static str)> {
    vec![
        (
            "Acme Steel",
            "line_oa",
            "Need 2x PVC pipe 2in and 5 copper cable 1.5 for Monday",
        ),
        (
            "Bright Energy",
            "email",
            "Order: 3 pcs 8p switch, 50m 1.5mm wire",
        ),
        ("Acme Steel", "line_oa", "repeat last order of 2\" pvc"),
    ]
}

/// Demo runner for the order intake pipeline
#[derive(Parser, Debug)]
#[command(name = "ordreg-demo", version, about)]
struct Args {
    /// Print full golden records as JSON instead of the summary view
    #[arg(long)]
    json: bool,

    /// Log level (off to keep the output clean)
    #[arg(long, default_value = "warn")]
    log: Level,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let subscriber = FmtSubscriber::builder().with_max_level(args.log).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let pool = db::init_memory_pool().await?;
    let catalog = Arc::new(CatalogHandle::new(CatalogIndex::build(
        parse_entries(SAMPLE_CATALOG)?,
        1,
    )));
    let pipeline = IntakePipeline::new(
        pool.clone(),
        Arc::new(PatternExtractor::new()),
        catalog,
        EventBus::new(100),
    );

    println!("=== ORDREG Intake Demo ===");

    let mut record_ids = Vec::new();
    for (customer, channel, message) in demo_messages() {
        let outcome = pipeline
            .process(InboundRequest {
                customer_id: customer.to_string(),
                channel: channel.to_string(),
                text: message.to_string(),
                attachments: vec![],
                promised_date: None,
                received_at: Utc::now(),
            })
            .await?;

        match outcome {
            IntakeOutcome::Processed {
                record_id,
                order_id,
                status,
                line_count,
            } => {
                println!("\nRequest {} from {} via {}", order_id, customer, channel);
                println!("Status: {} ({} lines)", status.as_str(), line_count);

                let record = db::records::fetch_record(&pool, record_id).await?;
                for line in &record.lines {
                    let sku_display = line.sku_id.as_deref().unwrap_or("<no match>");
                    println!(
                        "  - {} x {} -> {} ({}; composite {:.2}, {})",
                        line.quantity,
                        line.description,
                        sku_display,
                        line.match_tier.map(|t| t.as_str()).unwrap_or("-"),
                        line.composite,
                        line.decision.as_str(),
                    );
                    for outcome in &line.validations {
                        if outcome.status != ordreg_intake::types::RuleStatus::Pass {
                            println!(
                                "      [{}] {}: {}",
                                outcome.status.as_str(),
                                outcome.rule,
                                outcome.message
                            );
                        }
                    }
                }
                record_ids.push(record_id);
            }
            IntakeOutcome::Duplicate { prior_record_id } => {
                println!(
                    "\nDuplicate delivery from {} via {} (prior record {})",
                    customer, channel, prior_record_id
                );
            }
        }
    }

    if args.json {
        println!("\nDashboard snapshot:");
        for record_id in record_ids {
            let record = db::records::fetch_record(&pool, record_id).await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
    }

    Ok(())
}
