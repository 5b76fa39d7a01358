// ============================================================================
// Module : models
// ============================================================================
// Structures de données du pipeline : cotations aplaties et leur mise en
// forme depuis la réponse JSON de l'API
// ============================================================================

pub mod quote_record; // Enregistrement plat + règle de filtrage

pub use quote_record::{shape_quotes, QuoteRecord, ShapedQuotes};
