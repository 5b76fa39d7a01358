// ============================================================================
// CryptoQuotes - Library
// ============================================================================
// Expose les modules publics pour le binaire et les tests
// ============================================================================

pub mod api;      // API CoinMarketCap
pub mod config;   // Configuration explicite (env + secrets.toml)
pub mod models;   // Cotations aplaties
pub mod pipeline; // Orchestration fetch -> shape -> load -> query
pub mod storage;  // DuckDB

#[cfg(test)]
mod test_support; // Capture des logs pour les tests
