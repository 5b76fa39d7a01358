// ============================================================================
// Module : config
// ============================================================================
// Configuration explicite du programme, résolue une seule fois au démarrage
// puis passée au fetcher et au loader sous forme de struct.
//
// Sources (par ordre de priorité) :
// 1. Variables d'environnement (un fichier .env est chargé via dotenvy)
// 2. Fichier de secrets TOML (par défaut .dlt/secrets.toml)
//
// Format du fichier de secrets :
//   [coinmarketcap]
//   api_key = "..."
//
//   [destination]
//   duckdb_path = "crypto_quotes.db"
// ============================================================================

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://pro-api.coinmarketcap.com/v1";
pub const DEFAULT_PIPELINE_NAME: &str = "crypto_quotes_pipeline";
pub const DEFAULT_DATASET_NAME: &str = "quotes_data";
pub const DEFAULT_TABLE_NAME: &str = "latest_quotes_data";
pub const DEFAULT_SECRETS_PATH: &str = ".dlt/secrets.toml";

pub const API_KEY_ENV_VAR: &str = "CMC_API_KEY";
pub const DUCKDB_PATH_ENV_VAR: &str = "DUCKDB_PATH";
pub const BASE_URL_ENV_VAR: &str = "CMC_BASE_URL";
pub const SECRETS_PATH_ENV_VAR: &str = "CRYPTO_QUOTES_SECRETS";

// ============================================================================
// Fichier de secrets
// ============================================================================

/// Contenu du fichier de secrets TOML (toutes les sections sont optionnelles)
#[derive(Debug, Default, Deserialize)]
pub struct SecretsFile {
    #[serde(default)]
    pub coinmarketcap: CoinMarketCapSecrets,
    #[serde(default)]
    pub destination: DestinationSecrets,
}

#[derive(Debug, Default, Deserialize)]
pub struct CoinMarketCapSecrets {
    pub api_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DestinationSecrets {
    pub duckdb_path: Option<String>,
}

impl SecretsFile {
    /// Parse le contenu d'un fichier de secrets
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Fichier de secrets TOML invalide")
    }

    /// Lit le fichier de secrets s'il existe
    ///
    /// Un fichier absent n'est pas une erreur : retourne Ok(None).
    pub fn read_optional(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            debug!(path = %path.display(), "No secrets file found");
            return Ok(None);
        }

        let content = std::fs::read_to_string(path).with_context(|| {
            format!("Échec de la lecture du fichier de secrets {}", path.display())
        })?;
        let secrets = Self::parse(&content)
            .with_context(|| format!("Erreur dans {}", path.display()))?;

        debug!(path = %path.display(), "Secrets file loaded");
        Ok(Some(secrets))
    }
}

// ============================================================================
// Structure : Config
// ============================================================================

/// Configuration complète d'une exécution du pipeline
#[derive(Clone)]
pub struct Config {
    /// Clé API CoinMarketCap (secret, jamais affichée)
    pub api_key: String,

    /// Chemin du fichier DuckDB de destination
    pub duckdb_path: PathBuf,

    /// URL de base de l'API (sans slash final)
    pub base_url: String,

    /// Identité du pipeline, enregistrée avec chaque chargement
    pub pipeline_name: String,

    /// Nom du schéma DuckDB
    pub dataset_name: String,

    /// Nom de la table de destination
    pub table_name: String,
}

impl Config {
    /// Crée une configuration avec les valeurs par défaut pour le reste
    pub fn new(api_key: impl Into<String>, duckdb_path: impl Into<PathBuf>) -> Self {
        Self {
            api_key: api_key.into(),
            duckdb_path: duckdb_path.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            pipeline_name: DEFAULT_PIPELINE_NAME.to_string(),
            dataset_name: DEFAULT_DATASET_NAME.to_string(),
            table_name: DEFAULT_TABLE_NAME.to_string(),
        }
    }

    /// Charge la configuration depuis l'environnement et le fichier de secrets
    pub fn load() -> Result<Self> {
        // .env est optionnel
        if let Ok(path) = dotenvy::dotenv() {
            debug!(path = %path.display(), "Loaded .env file");
        }

        let secrets_path = std::env::var(SECRETS_PATH_ENV_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_SECRETS_PATH));
        let secrets = SecretsFile::read_optional(&secrets_path)?;

        Self::resolve(|key| std::env::var(key).ok(), secrets.as_ref())
    }

    /// Résout la configuration à partir d'une source de variables et des secrets
    ///
    /// L'environnement est prioritaire sur le fichier de secrets.
    pub fn resolve<F>(env: F, secrets: Option<&SecretsFile>) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let api_key = lookup(API_KEY_ENV_VAR)
            .or_else(|| {
                secrets
                    .and_then(|s| s.coinmarketcap.api_key.clone())
                    .filter(|v| !v.trim().is_empty())
            })
            .with_context(|| {
                format!(
                    "Clé API manquante : définir {} ou coinmarketcap.api_key",
                    API_KEY_ENV_VAR
                )
            })?;

        let duckdb_path = lookup(DUCKDB_PATH_ENV_VAR)
            .or_else(|| {
                secrets
                    .and_then(|s| s.destination.duckdb_path.clone())
                    .filter(|v| !v.trim().is_empty())
            })
            .with_context(|| {
                format!(
                    "Chemin DuckDB manquant : définir {} ou destination.duckdb_path",
                    DUCKDB_PATH_ENV_VAR
                )
            })?;

        let mut config = Self::new(api_key.trim(), duckdb_path.trim());
        if let Some(base_url) = lookup(BASE_URL_ENV_VAR) {
            config.base_url = base_url.trim().trim_end_matches('/').to_string();
        }

        Ok(config)
    }
}

// La clé API ne doit jamais apparaître dans les logs
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &"<redacted>")
            .field("duckdb_path", &self.duckdb_path)
            .field("base_url", &self.base_url)
            .field("pipeline_name", &self.pipeline_name)
            .field("dataset_name", &self.dataset_name)
            .field("table_name", &self.table_name)
            .finish()
    }
}

// ============================================================================
// Tests unitaires
// ============================================================================
