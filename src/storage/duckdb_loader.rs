// ============================================================================
// Loader : DuckDB
// ============================================================================
// Charge les cotations aplaties dans une table DuckDB locale.
//
// Un chargement =
// 1. CREATE SCHEMA IF NOT EXISTS <dataset>
// 2. création de la table si absente, ajout des colonnes manquantes sinon
// 3. insertion de tous les enregistrements avec le _load_id du run
// 4. trace du chargement dans <dataset>._loads
//
// Le tout dans UNE transaction : soit tout est commité, soit rien.
// Les données sont ajoutées (append), jamais dédupliquées.
// ============================================================================

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use duckdb::{params, Connection, Transaction};
use tracing::{debug, info, instrument};

use super::{existing_columns, qualified_name, quote_ident};
use crate::models::QuoteRecord;

/// Table de suivi des chargements (dans le schéma du dataset)
pub const LOADS_TABLE: &str = "_loads";

/// Colonnes de la table de cotations, dans l'ordre
pub const QUOTE_COLUMNS: [(&str, &str); 6] = [
    ("symbol", "VARCHAR"),
    ("price", "DOUBLE"),
    ("volume_24h", "DOUBLE"),
    ("market_cap", "DOUBLE"),
    ("last_updated", "VARCHAR"),
    ("_load_id", "VARCHAR"),
];

const LOADS_COLUMNS: [(&str, &str); 6] = [
    ("load_id", "VARCHAR"),
    ("pipeline_name", "VARCHAR"),
    ("table_name", "VARCHAR"),
    ("row_count", "BIGINT"),
    ("status", "VARCHAR"),
    ("inserted_at", "VARCHAR"),
];

// ============================================================================
// Structure : LoadInfo
// ============================================================================

/// Résumé d'un chargement terminé
#[derive(Debug, Clone, PartialEq)]
pub struct LoadInfo {
    pub pipeline_name: String,
    pub database_path: PathBuf,
    pub dataset_name: String,
    pub table_name: String,
    pub load_id: String,
    pub row_count: usize,
    pub started_at: DateTime<Utc>,
}

impl fmt::Display for LoadInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pipeline {} loaded {} rows into {}.{} at {} (load_id {}, started {})",
            self.pipeline_name,
            self.row_count,
            self.dataset_name,
            self.table_name,
            self.database_path.display(),
            self.load_id,
            self.started_at.to_rfc3339()
        )
    }
}

// ============================================================================
// Structure : DuckDbLoader
// ============================================================================

/// Destination DuckDB d'un pipeline
pub struct DuckDbLoader {
    conn: Connection,
    path: PathBuf,
    pipeline_name: String,
    dataset_name: String,
}

impl DuckDbLoader {
    /// Ouvre (ou crée) le fichier DuckDB de destination
    pub fn open(path: &Path, pipeline_name: &str, dataset_name: &str) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Échec de la création du répertoire {}", parent.display())
            })?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Échec de l'ouverture de DuckDB {}", path.display()))?;
        debug!(path = %path.display(), "DuckDB connection opened");

        Ok(Self {
            conn,
            path: path.to_path_buf(),
            pipeline_name: pipeline_name.to_string(),
            dataset_name: dataset_name.to_string(),
        })
    }

    /// Charge les enregistrements dans `<dataset>.<table>`
    ///
    /// Les enregistrements sont consommés au fil de l'insertion.
    #[instrument(skip(self, records), fields(pipeline = %self.pipeline_name, dataset = %self.dataset_name))]
    pub fn load<I>(&mut self, table: &str, records: I) -> Result<LoadInfo>
    where
        I: IntoIterator<Item = QuoteRecord>,
    {
        let started_at = Utc::now();

        // Une seule transaction pour tout le chargement
        // CONCEPT RUST : RAII
        // - Si on sort par une erreur (?), `tx` est droppée sans commit
        // - Le drop fait un rollback : rien n'est écrit à moitié
        let tx = self
            .conn
            .transaction()
            .context("Échec de l'ouverture de la transaction DuckDB")?;

        // Schéma (dataset) puis tables : créées au premier run, complétées ensuite
        tx.execute_batch(&format!(
            "CREATE SCHEMA IF NOT EXISTS {};",
            quote_ident(&self.dataset_name)
        ))
        .context("Échec de la création du schéma")?;

        ensure_table(&tx, &self.dataset_name, table, &QUOTE_COLUMNS)?;
        ensure_table(&tx, &self.dataset_name, LOADS_TABLE, &LOADS_COLUMNS)?;

        // L'identifiant doit être unique même si deux loads tombent sur la
        // même microseconde : on le vérifie contre _loads
        let load_id = next_load_id(&tx, &self.dataset_name, started_at.timestamp_micros())?;
        debug!(load_id = %load_id, "Load id allocated");

        // Insertion : les enregistrements sont consommés un par un
        let row_count = insert_records(&tx, &self.dataset_name, table, &load_id, records)?;

        // Trace du chargement, commitée avec les données
        tx.execute(
            &format!(
                "INSERT INTO {} (load_id, pipeline_name, table_name, row_count, status, inserted_at) \
                 VALUES (?, ?, ?, ?, ?, ?)",
                qualified_name(&self.dataset_name, LOADS_TABLE)
            ),
            params![
                load_id,
                self.pipeline_name,
                table,
                row_count as i64,
                "loaded",
                Utc::now().to_rfc3339()
            ],
        )
        .context("Échec de l'enregistrement du chargement")?;

        tx.commit().context("Échec du commit DuckDB")?;

        let load_info = LoadInfo {
            pipeline_name: self.pipeline_name.clone(),
            database_path: self.path.clone(),
            dataset_name: self.dataset_name.clone(),
            table_name: table.to_string(),
            load_id,
            row_count,
            started_at,
        };

        info!(rows = row_count, load_id = %load_info.load_id, "Load committed");
        Ok(load_info)
    }
}

/// Premier identifiant libre dans `_loads` à partir de `micros`
fn next_load_id(tx: &Transaction<'_>, dataset: &str, micros: i64) -> Result<String> {
    let sql = format!(
        "SELECT count(*) FROM {} WHERE load_id = ?",
        qualified_name(dataset, LOADS_TABLE)
    );

    let mut candidate = micros;
    loop {
        let id = candidate.to_string();
        let taken: i64 = tx
            .query_row(&sql, params![id], |row| row.get(0))
            .context("Échec de la vérification du load_id")?;
        if taken == 0 {
            return Ok(id);
        }
        candidate += 1;
    }
}

/// Crée la table si besoin, sinon ajoute les colonnes manquantes
fn ensure_table(tx: &Transaction<'_>, dataset: &str, table: &str, columns: &[(&str, &str)]) -> Result<()> {
    let column_defs: Vec<String> = columns
        .iter()
        .map(|(name, ty)| format!("{} {}", quote_ident(name), ty))
        .collect();

    tx.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {} ({});",
        qualified_name(dataset, table),
        column_defs.join(", ")
    ))
    .with_context(|| format!("Échec de la création de la table {}.{}", dataset, table))?;

    let existing = existing_columns(tx, dataset, table)?;
    for (name, ty) in columns {
        if existing.iter().any(|c| c == name) {
            continue;
        }

        debug!(table = %table, column = %name, "Adding missing column");
        tx.execute_batch(&format!(
            "ALTER TABLE {} ADD COLUMN {} {};",
            qualified_name(dataset, table),
            quote_ident(name),
            ty
        ))
        .with_context(|| format!("Échec de l'ajout de la colonne {} à {}", name, table))?;
    }

    Ok(())
}

fn insert_records<I>(tx: &Transaction<'_>, dataset: &str, table: &str, load_id: &str, records: I) -> Result<usize>
where
    I: IntoIterator<Item = QuoteRecord>,
{
    let mut stmt = tx
        .prepare(&format!(
            "INSERT INTO {} (symbol, price, volume_24h, market_cap, last_updated, _load_id) \
             VALUES (?, ?, ?, ?, ?, ?)",
            qualified_name(dataset, table)
        ))
        .context("Échec de la préparation de l'insertion")?;

    let mut count = 0;
    for record in records {
        stmt.execute(params![
            record.symbol,
            record.price,
            record.volume_24h,
            record.market_cap,
            record.last_updated,
            load_id
        ])
        .with_context(|| format!("Échec de l'insertion de {:?}", record.symbol))?;
        count += 1;
    }

    Ok(count)
}

// ============================================================================
// Tests unitaires
// ============================================================================
