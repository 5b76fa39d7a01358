// ============================================================================
// Relecture de la table de destination
// ============================================================================
// Ouvre une connexion dédiée, exécute SELECT * sur la table et rend le
// résultat sous forme de tableau texte. La connexion est libérée à la fin
// de la fonction, en cas de succès comme d'erreur (RAII).
// ============================================================================

use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use duckdb::types::Value;
use duckdb::{params, Connection};
use tracing::{debug, instrument};

use super::{existing_columns, qualified_name};

/// Résultat d'une requête : noms de colonnes + valeurs brutes
#[derive(Debug, Clone)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl QueryResult {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index d'une colonne par son nom
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

/// Exécute `SELECT * FROM "<dataset>"."<table>"` sur le fichier DuckDB
#[instrument]
pub fn query_table(path: &Path, dataset: &str, table: &str) -> Result<QueryResult> {
    if !path.exists() {
        anyhow::bail!("Base DuckDB introuvable : {}", path.display());
    }

    let conn = Connection::open(path)
        .with_context(|| format!("Échec de l'ouverture de DuckDB {}", path.display()))?;

    let columns = existing_columns(&conn, dataset, table)?;
    if columns.is_empty() {
        anyhow::bail!("Table {}.{} introuvable dans {}", dataset, table, path.display());
    }

    let mut stmt = conn
        .prepare(&format!("SELECT * FROM {}", qualified_name(dataset, table)))
        .context("Échec de la préparation de la requête")?;

    let width = columns.len();
    let rows = stmt
        .query_map(params![], |row| {
            (0..width)
                .map(|i| row.get::<_, Value>(i))
                .collect::<duckdb::Result<Vec<_>>>()
        })?
        .collect::<duckdb::Result<Vec<_>>>()
        .with_context(|| format!("Échec de la lecture de {}.{}", dataset, table))?;

    debug!(rows = rows.len(), "Query finished");
    Ok(QueryResult { columns, rows })
}

// ============================================================================
// Affichage en tableau
// ============================================================================

/// Rend une valeur DuckDB en texte (NULL pour les valeurs absentes)
pub fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::Int(v) => v.to_string(),
        Value::BigInt(v) => v.to_string(),
        Value::Double(v) => v.to_string(),
        Value::Float(v) => v.to_string(),
        Value::Text(s) => s.clone(),
        other => format!("{:?}", other),
    }
}

impl fmt::Display for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cells: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| row.iter().map(format_value).collect())
            .collect();

        let widths: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, name)| {
                cells
                    .iter()
                    .map(|row| row[i].chars().count())
                    .chain(std::iter::once(name.chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let border = |left: &str, mid: &str, right: &str| {
            let parts: Vec<String> = widths.iter().map(|w| "─".repeat(w + 2)).collect();
            format!("{}{}{}", left, parts.join(mid), right)
        };
        let line = |values: &[String]| {
            let parts: Vec<String> = values
                .iter()
                .zip(&widths)
                .map(|(v, w)| format!(" {:<width$} ", v, width = w))
                .collect();
            format!("│{}│", parts.join("│"))
        };

        writeln!(f, "{}", border("┌", "┬", "┐"))?;
        writeln!(f, "{}", line(&self.columns))?;
        writeln!(f, "{}", border("├", "┼", "┤"))?;
        for row in &cells {
            writeln!(f, "{}", line(row))?;
        }
        writeln!(f, "{}", border("└", "┴", "┘"))?;
        write!(f, "{} rows", self.rows.len())
    }
}

// ============================================================================
// Tests unitaires
// ============================================================================
