// ============================================================================
// Pipeline : extraction -> mise en forme -> chargement
// ============================================================================
// Enchaîne les trois étapes d'une exécution :
// 1. fetch des cotations (API CoinMarketCap)
// 2. aplatissement + filtrage des enregistrements vides
// 3. chargement dans DuckDB
// puis permet de relire la table de destination.
// ============================================================================

use anyhow::{Context, Result};
use tracing::{info, instrument};

use crate::api::{CoinMarketCapClient, QuoteRequest};
use crate::config::Config;
use crate::models::shape_quotes;
use crate::storage::{query_table, DuckDbLoader, LoadInfo, QueryResult};

/// Exécute le pipeline complet une fois et retourne le résumé du chargement
#[instrument(skip(config), fields(pipeline = %config.pipeline_name))]
pub async fn run_pipeline(config: &Config) -> Result<LoadInfo> {
    // 1. Extraction : une requête authentifiée pour BTC, ETH, LTC en USD
    let client = CoinMarketCapClient::new(&config.base_url, &config.api_key)?;
    let request = QuoteRequest::default();

    let response = client.fetch_latest_quotes(&request).await?;

    // 2. Mise en forme : les entrées sans métrique sont ignorées (warning)
    let shaped = shape_quotes(&response.data, &request.convert);
    info!(
        records = shaped.len(),
        skipped = shaped.skipped.len(),
        "Quotes shaped"
    );

    // 3. Chargement : `shaped` est consommé (move), un nouveau run
    //    nécessite un nouveau fetch
    let mut loader = DuckDbLoader::open(&config.duckdb_path, &config.pipeline_name, &config.dataset_name)?;
    let load_info = loader
        .load(&config.table_name, shaped)
        .context("Échec du chargement dans DuckDB")?;

    info!(%load_info, "Pipeline run completed");
    Ok(load_info)
}

/// Relit la table de destination (SELECT *)
pub fn query_data(config: &Config) -> Result<QueryResult> {
    query_table(&config.duckdb_path, &config.dataset_name, &config.table_name)
}

// ============================================================================
// Tests unitaires
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::coinmarketcap::tests::serve_once;

    fn config_for(base_url: String, dir: &tempfile::TempDir) -> Config {
        let mut config = Config::new("test-key", dir.path().join("crypto_quotes.db"));
        config.base_url = base_url;
        config
    }

    #[tokio::test]
    async fn test_run_then_query() {
        let body = r#"{"data":{
            "BTC":{"symbol":"BTC","quote":{"USD":{"price":67000.5,"volume_24h":1e9,"market_cap":1.3e12,"last_updated":"2024-11-01T00:00:00Z"}}},
            "ETH":{"symbol":"ETH","quote":{"USD":{"price":2500.25,"volume_24h":5e8,"market_cap":3e11,"last_updated":"2024-11-01T00:00:00Z"}}},
            "XRP":{"symbol":"XRP","quote":{"USD":{}}}
        }}"#;
        let (base_url, _rx) = serve_once("200 OK", body.to_string()).await;
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(base_url, &dir);

        let load_info = run_pipeline(&config).await.unwrap();
        assert_eq!(load_info.row_count, 2);
        assert_eq!(load_info.pipeline_name, "crypto_quotes_pipeline");

        let result = query_data(&config).unwrap();
        assert_eq!(result.len(), 2);
        let text = result.to_string();
        assert!(text.contains("BTC"));
        assert!(text.contains("67000.5"));
        assert!(!text.contains("XRP"));
    }

    #[tokio::test]
    async fn test_http_failure_loads_nothing() {
        let (base_url, _rx) = serve_once("500 Internal Server Error", "down".to_string()).await;
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(base_url, &dir);

        let err = run_pipeline(&config).await.unwrap_err();
        assert!(err.to_string().contains("500"));
        assert!(!config.duckdb_path.exists());
    }

    #[tokio::test]
    async fn test_empty_data_loads_zero_rows() {
        let (base_url, _rx) = serve_once("200 OK", r#"{"data":{}}"#.to_string()).await;
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(base_url, &dir);

        let load_info = run_pipeline(&config).await.unwrap();
        assert_eq!(load_info.row_count, 0);
        assert!(query_data(&config).unwrap().is_empty());
    }
}
