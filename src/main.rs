// ============================================================================
// CryptoQuotes - Pipeline EL CoinMarketCap -> DuckDB
// ============================================================================
// Récupère les dernières cotations de BTC, ETH et LTC, les charge dans la
// table quotes_data.latest_quotes_data d'un fichier DuckDB local, puis
// affiche le contenu de la table.
//
// Pas d'arguments : `cryptoquotes` exécute le pipeline puis la relecture.
// Toute erreur termine le process avec un code non nul.
// ============================================================================

use anyhow::{Context, Result};
use tracing::{error, info};

use cryptoquotes::config::Config;
use cryptoquotes::pipeline::{query_data, run_pipeline};

// ============================================================================
// Initialisation du logging
// ============================================================================

/// Initialise le logging vers stderr et vers ./logs/cryptoquotes.log
///
/// Le fichier tourne chaque jour (cryptoquotes.log.2024-11-01, ...).
///
/// ```bash
/// RUST_LOG=debug cargo run
/// RUST_LOG=cryptoquotes=trace cargo run
/// ```
fn init_logging() -> Result<()> {
    use tracing_appender::rolling::{RollingFileAppender, Rotation};
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let log_dir = std::path::PathBuf::from("./logs");
    std::fs::create_dir_all(&log_dir).context("Échec de la création du répertoire de logs")?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, log_dir.clone(), "cryptoquotes.log");

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false) // Pas de codes couleur dans le fichier
                .with_target(true)
                .with_line_number(true),
        )
        .with(
            // Par défaut : debug pour cryptoquotes, info pour les dépendances
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cryptoquotes=debug,info".into()),
        )
        .init();

    info!(?log_dir, "Logging initialisé");
    Ok(())
}

// ============================================================================
// Point d'entrée du programme
// ============================================================================
// main() reste synchrone : le client HTTP async est exécuté via block_on,
// une seule requête, sans concurrence.
// ============================================================================

fn main() -> Result<()> {
    init_logging().unwrap_or_else(|e| {
        eprintln!("⚠️  Warning: Failed to initialize logging: {}", e);
        eprintln!("   Continuing without logging...");
    });

    let config = Config::load().context("Configuration invalide")?;
    info!(?config, "Configuration loaded");

    let runtime = tokio::runtime::Runtime::new().context("Échec de la création du runtime tokio")?;
    let result = runtime.block_on(run_pipeline(&config)).and_then(|load_info| {
        println!("{}", load_info);
        let table = query_data(&config)?;
        println!("{}", table);
        Ok(())
    });

    if let Err(e) = &result {
        error!(error = ?e, "Pipeline failed");
    }

    result
}
