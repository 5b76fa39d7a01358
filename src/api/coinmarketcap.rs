// ============================================================================
// API Client : CoinMarketCap
// ============================================================================
// Récupère les dernières cotations des cryptomonnaies depuis l'API Pro
//
// Endpoint : GET {base_url}/cryptocurrency/quotes/latest?symbol=...&convert=...
// Authentification : header X-CMC_PRO_API_KEY
//
// Une seule requête par exécution, pas de retry : un statut différent de 200
// est loggé (statut + corps) puis remonté comme erreur.
// ============================================================================

use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, error, info, instrument, warn};

/// Nom du header d'authentification requis par l'API
pub const API_KEY_HEADER: &str = "X-CMC_PRO_API_KEY";

/// Symboles récupérés par défaut
pub const DEFAULT_SYMBOLS: [&str; 3] = ["BTC", "ETH", "LTC"];

/// Devise de conversion par défaut
pub const DEFAULT_CONVERT: &str = "USD";

// ============================================================================
// Structures pour parser la réponse JSON
// ============================================================================
// Seul `data` nous intéresse. On le garde en Map JSON brute (ordre préservé)
// car chaque coin est aplati plus tard, champ par champ, sans échouer sur
// les valeurs manquantes.
// ============================================================================

/// Réponse de /cryptocurrency/quotes/latest
#[derive(Debug, Deserialize)]
pub struct LatestQuotesResponse {
    /// Symbole (ou id) -> objet coin
    pub data: Map<String, Value>,
}

/// Paramètres de la requête de cotations
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteRequest {
    pub symbols: Vec<String>,
    pub convert: String,
}

impl Default for QuoteRequest {
    fn default() -> Self {
        Self {
            symbols: DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect(),
            convert: DEFAULT_CONVERT.to_string(),
        }
    }
}

impl QuoteRequest {
    /// Valeur du paramètre `symbol` (ex: "BTC,ETH,LTC")
    pub fn symbol_param(&self) -> String {
        self.symbols.join(",")
    }
}

// ============================================================================
// Client
// ============================================================================

/// Client HTTP authentifié pour l'API CoinMarketCap
#[derive(Debug, Clone)]
pub struct CoinMarketCapClient {
    http: reqwest::Client,
    base_url: String,
}

impl CoinMarketCapClient {
    /// Construit un client avec la clé API en header par défaut
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        if api_key.trim().is_empty() {
            anyhow::bail!("La clé API CoinMarketCap est vide");
        }

        let mut key = HeaderValue::from_str(api_key).context("Clé API invalide pour un header HTTP")?;
        key.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, key);

        let http = reqwest::Client::builder()
            .user_agent(concat!("cryptoquotes/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()
            .context("Échec de la création du client HTTP")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// URL de l'endpoint des dernières cotations
    pub fn latest_quotes_url(&self) -> String {
        format!("{}/cryptocurrency/quotes/latest", self.base_url)
    }

    /// Récupère les dernières cotations pour les symboles demandés
    ///
    /// # Erreurs
    /// * échec réseau
    /// * statut HTTP différent de 200 (loggé avec le corps de la réponse)
    /// * corps JSON invalide ou sans `data`
    #[instrument(skip(self), fields(symbols = %request.symbol_param(), convert = %request.convert))]
    pub async fn fetch_latest_quotes(&self, request: &QuoteRequest) -> Result<LatestQuotesResponse> {
        // Construit l'URL de l'endpoint
        // La clé API est déjà dans les headers par défaut du client
        let url = self.latest_quotes_url();
        debug!(url = %url, "Sending HTTP request to CoinMarketCap");

        // Requête GET unique, sans retry
        // CONCEPT RUST : .query()
        // - reqwest encode les paramètres (la virgule devient %2C)
        // - ? propage l'erreur réseau avec le contexte ajouté par .context()
        let symbol_param = request.symbol_param();
        let response = self
            .http
            .get(&url)
            .query(&[("symbol", symbol_param.as_str()), ("convert", request.convert.as_str())])
            .send()
            .await
            .context("Échec de la requête HTTP vers CoinMarketCap")?;

        let status = response.status();
        debug!(status = %status, "Received HTTP response");

        // Seul 200 est un succès : tout autre statut est loggé avec le corps
        // de la réponse (message d'erreur de l'API) puis remonté
        if status != StatusCode::OK {
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    // Le statut reste l'information principale, on note juste
                    // que le corps n'a pas pu être lu
                    warn!(error = %e, "Failed to read error response body");
                    format!("<corps illisible : {}>", e)
                }
            };
            error!(status = status.as_u16(), body = %body, "CoinMarketCap API call failed");
            anyhow::bail!(
                "CoinMarketCap a retourné une erreur : HTTP {} : {}",
                status,
                body
            );
        }

        // Parse la réponse JSON
        // - `data` doit être présent, sinon erreur
        // - l'ordre des symboles est conservé (serde_json preserve_order)
        let parsed: LatestQuotesResponse = response
            .json()
            .await
            .context("Échec du parsing JSON de la réponse CoinMarketCap")?;

        info!(coins = parsed.data.len(), "Successfully fetched latest quotes");
        Ok(parsed)
    }
}

// ============================================================================
// Tests unitaires
// ============================================================================
// Un petit serveur TCP local joue le rôle de l'API : il lit la requête,
// la renvoie au test via un channel et répond avec un statut + corps fixés.
// ============================================================================
