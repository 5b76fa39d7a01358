// ============================================================================
// Module : storage
// ============================================================================
// Persistance DuckDB : chargement des cotations et relecture de la table
// ============================================================================

pub mod duckdb_loader; // Chargement transactionnel des enregistrements
pub mod query; // Relecture (SELECT *) et affichage

pub use duckdb_loader::{DuckDbLoader, LoadInfo};
pub use query::{query_table, QueryResult};

use anyhow::{Context, Result};
use duckdb::{params, Connection};

/// Entoure un identifiant SQL de guillemets doubles
pub(crate) fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// `"schema"."table"`
pub(crate) fn qualified_name(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(table))
}

/// Noms des colonnes d'une table, dans l'ordre de définition
///
/// Retourne une liste vide si la table n'existe pas.
pub(crate) fn existing_columns(conn: &Connection, schema: &str, table: &str) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare(
            "SELECT column_name FROM information_schema.columns \
             WHERE table_schema = ? AND table_name = ? \
             ORDER BY ordinal_position",
        )
        .context("Échec de la lecture du schéma de la table")?;

    let columns = stmt
        .query_map(params![schema, table], |row| row.get::<_, String>(0))?
        .collect::<duckdb::Result<Vec<_>>>()
        .with_context(|| format!("Échec de la lecture des colonnes de {}.{}", schema, table))?;

    Ok(columns)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("quotes_data"), "\"quotes_data\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(qualified_name("a", "b"), "\"a\".\"b\"");
    }

    #[test]
    fn test_existing_columns_of_missing_table() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(existing_columns(&conn, "nope", "nothing").unwrap().is_empty());
    }
}
