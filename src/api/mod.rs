// ============================================================================
// Module : api
// ============================================================================
// Clients API pour récupérer les données de marché (CoinMarketCap)
// ============================================================================

pub mod coinmarketcap; // Client API CoinMarketCap

// Re-export des éléments principaux
pub use coinmarketcap::{CoinMarketCapClient, LatestQuotesResponse, QuoteRequest};
