//! One-shot investigation from the command line; prints the result as JSON.
//!
//! ```text
//! investigate-probe "Tem um buraco enorme na rua" --theme zeladoria \
//!     --keywords buraco,rua --scope national
//! investigate-probe "..." --scope local --lat -23.55 --lon -46.63
//! ```

use clap::Parser;
use coral_investigator::cache::{ItemStore, MemoryItemStore};
use coral_investigator::similarity::{DemandIndex, MemoryDemandIndex};
use coral_investigator::storage::PgStore;
use coral_investigator::telemetry::init_tracing;
use coral_investigator::{
    Classification, Coordinates, Dependencies, InvestigationConfig, Investigator, Location,
    ScopeLevel,
};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "investigate-probe")]
#[command(about = "Run one investigation and print the result as JSON")]
struct Cli {
    /// Report text (several words are joined with spaces)
    #[arg(required = true, num_args = 1..)]
    text: Vec<String>,

    /// Theme hint from the classifier
    #[arg(long)]
    theme: Option<String>,

    /// Comma-separated keywords
    #[arg(long, value_delimiter = ',')]
    keywords: Vec<String>,

    /// local | regional | national (or 1..3)
    #[arg(long, default_value = "national")]
    scope: ScopeLevel,

    #[arg(long)]
    city: Option<String>,

    #[arg(long)]
    state: Option<String>,

    #[arg(long, allow_negative_numbers = true, requires = "lon")]
    lat: Option<f64>,

    #[arg(long, allow_negative_numbers = true, requires = "lat")]
    lon: Option<f64>,
}

impl Cli {
    fn text(&self) -> String {
        self.text.join(" ")
    }

    fn classification(&self) -> Classification {
        Classification::new(
            self.theme.as_deref(),
            self.keywords
                .iter()
                .map(|k| k.trim())
                .filter(|k| !k.is_empty()),
        )
    }

    fn location(&self) -> Option<Location> {
        let location = Location {
            city: self.city.clone(),
            state: self.state.clone(),
            coordinates: self.lat.zip(self.lon).map(|(lat, lon)| Coordinates::new(lat, lon)),
            ..Location::default()
        };
        (location != Location::default()).then_some(location)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let cfg = InvestigationConfig::load()?;

    let (demands, items): (Arc<dyn DemandIndex>, Arc<dyn ItemStore>) = match cfg.database.url.as_deref() {
        Some(url) => {
            let store = PgStore::connect(url, cfg.database.max_connections).await?;
            if cfg.database.ensure_schema {
                store.ensure_schema().await?;
            }
            let store = Arc::new(store);
            let demands: Arc<dyn DemandIndex> = store.clone();
            let items: Arc<dyn ItemStore> = store;
            (demands, items)
        }
        None => {
            info!("no database configured, using in-memory stores");
            let demands: Arc<dyn DemandIndex> = Arc::new(MemoryDemandIndex::new());
            let items: Arc<dyn ItemStore> = Arc::new(MemoryItemStore::new());
            (demands, items)
        }
    };

    let investigator = Investigator::new(&cfg, Dependencies::from_config(&cfg, demands, items)?);
    let location = cli.location();
    let result = investigator
        .investigate(&cli.text(), &cli.classification(), cli.scope, location.as_ref())
        .await;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
