// ============================================================================
// Structure : QuoteRecord
// ============================================================================
// Enregistrement plat d'une cotation, prêt à être chargé dans DuckDB.
//
// L'API renvoie un JSON imbriqué :
//   { "symbol": "BTC", "quote": { "USD": { "price": ..., ... } } }
// On l'aplatit en :
//   { symbol, price, volume_24h, market_cap, last_updated }
//
// Règle de filtrage : un enregistrement n'est émis que si au moins une des
// quatre métriques est "vraie" (non nulle, non zéro, non vide). Le symbole
// ne compte pas dans ce test :
// - symbole seul, métriques vides -> ignoré (warning)
// - symbole absent, une métrique présente -> conservé
// - métriques toutes à 0 -> ignoré
// Un zéro accompagné d'une autre métrique vraie est conservé tel quel.
// ============================================================================

use serde_json::{Map, Value};
use tracing::warn;

/// Cotation aplatie pour une cryptomonnaie
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteRecord {
    /// Symbole (ex: "BTC"), lu sur l'objet coin lui-même
    pub symbol: Option<String>,

    /// Prix dans la devise de conversion
    pub price: Option<f64>,

    /// Volume échangé sur 24h
    pub volume_24h: Option<f64>,

    /// Capitalisation de marché
    pub market_cap: Option<f64>,

    /// Horodatage ISO-8601 tel que renvoyé par l'API
    pub last_updated: Option<String>,
}

impl QuoteRecord {
    /// Extrait un enregistrement depuis un objet coin de la réponse API
    ///
    /// Les chemins absents (`quote`, `quote.<convert>`) sont traités comme
    /// des objets vides, les champs de mauvais type comme null.
    pub fn from_coin_data(coin_data: &Value, convert: &str) -> Self {
        let quote = coin_data
            .get("quote")
            .and_then(|q| q.get(convert))
            .and_then(Value::as_object);

        let number = |field: &str| quote.and_then(|q| q.get(field)).and_then(Value::as_f64);

        Self {
            symbol: coin_data
                .get("symbol")
                .and_then(Value::as_str)
                .map(str::to_string),
            price: number("price"),
            volume_24h: number("volume_24h"),
            market_cap: number("market_cap"),
            last_updated: quote
                .and_then(|q| q.get("last_updated"))
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        }
    }

    /// Vrai si au moins une des quatre métriques est renseignée
    ///
    /// Un nombre compte s'il est différent de zéro, une chaîne si elle est
    /// non vide (les chaînes vides sont déjà ramenées à None).
    pub fn has_values(&self) -> bool {
        let truthy = |v: Option<f64>| matches!(v, Some(x) if x != 0.0);

        truthy(self.price)
            || truthy(self.volume_24h)
            || truthy(self.market_cap)
            || self.last_updated.is_some()
    }
}

// ============================================================================
// Mise en forme d'une réponse complète
// ============================================================================

/// Résultat de la mise en forme : enregistrements émis + symboles ignorés
///
/// Se consomme une seule fois via `into_iter()` ; pour régénérer les
/// enregistrements il faut refaire un fetch.
#[derive(Debug, Default)]
pub struct ShapedQuotes {
    pub records: Vec<QuoteRecord>,

    /// Symbole de chaque entrée ignorée (None si l'entrée n'avait pas de symbole)
    pub skipped: Vec<Option<String>>,
}

impl ShapedQuotes {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl IntoIterator for ShapedQuotes {
    type Item = QuoteRecord;
    type IntoIter = std::vec::IntoIter<QuoteRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

/// Aplatit le mapping `data` de la réponse en enregistrements
///
/// L'ordre de sortie est celui de la réponse API.
pub fn shape_quotes(data: &Map<String, Value>, convert: &str) -> ShapedQuotes {
    let mut shaped = ShapedQuotes::default();

    for coin_data in data.values() {
        let record = QuoteRecord::from_coin_data(coin_data, convert);

        if record.has_values() {
            shaped.records.push(record);
        } else {
            warn!(
                symbol = record.symbol.as_deref().unwrap_or("<unknown>"),
                "Skipped empty quote record"
            );
            shaped.skipped.push(record.symbol);
        }
    }

    shaped
}

// ============================================================================
// Tests unitaires
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::capture_logs;
    use serde_json::json;

    fn data_of(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_btc_scenario() {
        let data = data_of(json!({
            "1": {
                "symbol": "BTC",
                "quote": {"USD": {
                    "price": 67000.5,
                    "volume_24h": 1e9,
                    "market_cap": 1.3e12,
                    "last_updated": "2024-11-01T00:00:00Z"
                }}
            }
        }));

        let shaped = shape_quotes(&data, "USD");
        assert!(shaped.skipped.is_empty());
        assert_eq!(
            shaped.records,
            vec![QuoteRecord {
                symbol: Some("BTC".to_string()),
                price: Some(67000.5),
                volume_24h: Some(1e9),
                market_cap: Some(1.3e12),
                last_updated: Some("2024-11-01T00:00:00Z".to_string()),
            }]
        );
    }

    #[test]
    fn test_empty_quote_is_skipped() {
        let data = data_of(json!({"52": {"symbol": "XRP", "quote": {"USD": {}}}}));

        let shaped = shape_quotes(&data, "USD");
        assert!(shaped.is_empty());
        assert_eq!(shaped.skipped, vec![Some("XRP".to_string())]);
    }

    #[test]
    fn test_empty_data_mapping() {
        let shaped = shape_quotes(&Map::new(), "USD");
        assert!(shaped.is_empty());
        assert!(shaped.skipped.is_empty());
    }

    #[test]
    fn test_missing_quote_path_is_empty() {
        let data = data_of(json!({
            "1": {"symbol": "BTC"},
            "2": {"symbol": "ETH", "quote": {"EUR": {"price": 1.0}}},
            "3": {"symbol": "LTC", "quote": null}
        }));

        let shaped = shape_quotes(&data, "USD");
        assert!(shaped.is_empty());
        assert_eq!(shaped.skipped.len(), 3);
    }

    #[test]
    fn test_missing_symbol_with_one_metric_is_kept() {
        let data = data_of(json!({"1": {"quote": {"USD": {"market_cap": 42.0}}}}));

        let records: Vec<_> = shape_quotes(&data, "USD").into_iter().collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].symbol, None);
        assert_eq!(records[0].market_cap, Some(42.0));
        assert_eq!(records[0].price, None);
    }

    #[test]
    fn test_partial_metrics_and_null_fields() {
        let data = data_of(json!({
            "1": {"symbol": "ETH", "quote": {"USD": {
                "price": null,
                "volume_24h": null,
                "market_cap": null,
                "last_updated": "2024-11-01T00:00:00Z"
            }}}
        }));

        let shaped = shape_quotes(&data, "USD");
        assert_eq!(shaped.len(), 1);
        assert_eq!(shaped.records[0].price, None);
        assert_eq!(
            shaped.records[0].last_updated.as_deref(),
            Some("2024-11-01T00:00:00Z")
        );
    }

    #[test]
    fn test_empty_timestamp_and_wrong_types_count_as_null() {
        let data = data_of(json!({
            "1": {"symbol": "LTC", "quote": {"USD": {
                "price": "not a number",
                "last_updated": ""
            }}}
        }));

        let shaped = shape_quotes(&data, "USD");
        assert!(shaped.is_empty());
        assert_eq!(shaped.skipped, vec![Some("LTC".to_string())]);
    }

    #[test]
    fn test_zero_only_metrics_are_skipped() {
        let data = data_of(json!({
            "1": {"symbol": "DEAD", "quote": {"USD": {"price": 0, "volume_24h": 0.0}}}
        }));

        let shaped = shape_quotes(&data, "USD");
        assert!(shaped.is_empty());
        assert_eq!(shaped.skipped, vec![Some("DEAD".to_string())]);
    }

    #[test]
    fn test_zero_price_kept_next_to_truthy_metric() {
        let data = data_of(json!({
            "1": {"symbol": "DEAD", "quote": {"USD": {"price": 0, "market_cap": 12.5}}}
        }));

        let shaped = shape_quotes(&data, "USD");
        assert_eq!(shaped.len(), 1);
        assert_eq!(shaped.records[0].price, Some(0.0));
        assert_eq!(shaped.records[0].market_cap, Some(12.5));
    }

    #[test]
    fn test_order_follows_response() {
        let data = data_of(json!({
            "2": {"symbol": "LTC", "quote": {"USD": {"price": 70.0}}},
            "1": {"symbol": "BTC", "quote": {"USD": {"price": 67000.0}}},
            "1027": {"symbol": "ETH", "quote": {"USD": {"price": 2500.0}}}
        }));

        let symbols: Vec<_> = shape_quotes(&data, "USD")
            .into_iter()
            .map(|r| r.symbol.unwrap())
            .collect();
        assert_eq!(symbols, vec!["LTC", "BTC", "ETH"]);
    }

    #[test]
    fn test_skipped_record_warns_once_with_symbol() {
        let (logs, _guard) = capture_logs();
        let data = data_of(json!({
            "1": {"symbol": "BTC", "quote": {"USD": {"price": 67000.5}}},
            "52": {"symbol": "XRP", "quote": {"USD": {}}}
        }));

        let shaped = shape_quotes(&data, "USD");
        assert_eq!(shaped.len(), 1);

        let warnings = logs.lines_at("WARN");
        assert_eq!(warnings.len(), 1, "warnings: {:?}", warnings);
        assert!(warnings[0].contains("XRP"));
        assert!(warnings[0].contains("Skipped empty quote record"));
        assert!(!logs.contents().contains("BTC"));
    }

    #[test]
    fn test_empty_data_mapping_logs_nothing() {
        let (logs, _guard) = capture_logs();

        let shaped = shape_quotes(&Map::new(), "USD");
        assert!(shaped.is_empty());
        assert!(logs.lines_at("WARN").is_empty());
        assert!(logs.lines_at("ERROR").is_empty());
    }
}
