//! Export vers PostgreSQL/PostGIS
//!
//! Chargement en deux temps: `COPY` vers une table de staging non journalisée,
//! puis fusion vers la table cible dans une transaction.

use anyhow::{Context, Result};
use deadpool_postgres::{Pool, Transaction};
use futures::SinkExt;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::mirror::{
    quote_ident, GeometryColumn, MirrorError, MirrorLayout, MirrorMode, PrimaryKey, TargetTable,
    GEOMETRY_COLUMN, HASH_COLUMN,
};

/// Chunk CSV pré-formaté pour COPY
#[derive(Debug)]
pub struct CopyChunk {
    pub data: bytes::Bytes,
    pub rows: u64,
}

/// Résultat de la fusion staging → cible
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeCounts {
    pub inserted: u64,
    pub updated: u64,
    pub unchanged: u64,
    /// Lignes ignorées: clé en double ou NULL
    pub duplicates: u64,
}

/// Crée le schéma si besoin et vérifie l'extension PostGIS
pub async fn ensure_schema(pool: &Pool, schema: &str) -> Result<()> {
    let client = pool.get().await?;

    let exists = client
        .query_opt("SELECT 1 FROM pg_namespace WHERE nspname = $1", &[&schema])
        .await?
        .is_some();
    if !exists {
        info!(schema, "Schema does not exist, creating it");
        client
            .execute(&format!("CREATE SCHEMA IF NOT EXISTS {}", quote_ident(schema)), &[])
            .await
            .context("Failed to create schema")?;
    }

    // CREATE EXTENSION peut nécessiter des droits superuser: si l'extension
    // est déjà installée, on continue.
    match client
        .execute("CREATE EXTENSION IF NOT EXISTS postgis", &[])
        .await
    {
        Ok(_) => {}
        Err(e) => {
            warn!("CREATE EXTENSION postgis failed (will check if already installed): {e}");
            let installed = client
                .query_opt("SELECT 1 FROM pg_extension WHERE extname = 'postgis'", &[])
                .await
                .context("Failed to check pg_extension")?
                .is_some();
            if !installed {
                return Err(anyhow::anyhow!(
                    "PostGIS extension is not installed and could not be created: {e}"
                ));
            }
        }
    }

    Ok(())
}

/// Définition de la table de staging (sans contraintes, géométrie non typée)
pub fn staging_table_sql(layout: &MirrorLayout) -> String {
    let mut columns: Vec<String> = layout
        .columns
        .iter()
        .map(|c| format!("{} {}", quote_ident(&c.name), c.pg_type()))
        .collect();
    columns.push(format!("{} geometry", GEOMETRY_COLUMN));
    columns.push(format!("{} BYTEA", HASH_COLUMN));

    format!(
        "CREATE UNLOGGED TABLE {} ({})",
        layout.target.staging().qualified(),
        columns.join(", ")
    )
}

/// Définition de la table cible
pub fn create_table_sql(layout: &MirrorLayout, geometry: &GeometryColumn, if_not_exists: bool) -> String {
    let mut columns = Vec::with_capacity(layout.columns.len() + 3);
    if layout.primary_key == PrimaryKey::Generated {
        columns.push(format!("{} BIGSERIAL PRIMARY KEY", quote_ident(layout.pk_column())));
    }
    for c in &layout.columns {
        let pk = matches!(&layout.primary_key, PrimaryKey::Field(name) if *name == c.name);
        columns.push(format!(
            "{} {}{}",
            quote_ident(&c.name),
            c.pg_type(),
            if pk { " PRIMARY KEY" } else { "" }
        ));
    }
    columns.push(format!("{} {}", GEOMETRY_COLUMN, geometry.sql_type()));
    columns.push(format!("{} BYTEA", HASH_COLUMN));

    format!(
        "CREATE TABLE {}{} (\n    {}\n)",
        if if_not_exists { "IF NOT EXISTS " } else { "" },
        layout.target.qualified(),
        columns.join(",\n    ")
    )
}

/// Commande COPY vers la staging
pub fn copy_sql(layout: &MirrorLayout) -> String {
    let columns: Vec<String> = layout.copy_columns().iter().map(|c| quote_ident(c)).collect();
    format!(
        "COPY {} ({}) FROM STDIN WITH (FORMAT csv, DELIMITER '|', QUOTE '\"', ESCAPE '\"', NULL '')",
        layout.target.staging().qualified(),
        columns.join(", ")
    )
}

/// Requête de transfert staging → cible selon le mode
pub fn merge_sql(
    layout: &MirrorLayout,
    geometry: &GeometryColumn,
    mode: MirrorMode,
    promote_to_multi: bool,
) -> String {
    let target_cols: Vec<String> = layout.copy_columns().iter().map(|c| quote_ident(c)).collect();
    let mut source_cols: Vec<String> = layout.columns.iter().map(|c| quote_ident(&c.name)).collect();
    source_cols.push(geometry.select_expr(promote_to_multi));
    source_cols.push(HASH_COLUMN.to_string());

    let staging = layout.target.staging().qualified();
    let target = layout.target.qualified();

    let PrimaryKey::Field(pk) = &layout.primary_key else {
        return format!(
            "INSERT INTO {} ({}) SELECT {} FROM {}",
            target,
            target_cols.join(", "),
            source_cols.join(", "),
            staging
        );
    };
    let pk = quote_ident(pk);

    match mode {
        MirrorMode::Replace | MirrorMode::Append => format!(
            "INSERT INTO {} ({}) SELECT {} FROM {} WHERE {} IS NOT NULL ON CONFLICT DO NOTHING",
            target,
            target_cols.join(", "),
            source_cols.join(", "),
            staging,
            pk
        ),
        MirrorMode::Upsert => {
            let updates: Vec<String> = target_cols
                .iter()
                .filter(|c| **c != pk)
                .map(|c| format!("{c} = EXCLUDED.{c}"))
                .collect();
            format!(
                "INSERT INTO {target} AS t ({cols}) \
                 SELECT DISTINCT ON ({pk}) {src} FROM {staging} WHERE {pk} IS NOT NULL ORDER BY {pk} \
                 ON CONFLICT ({pk}) DO UPDATE SET {updates} \
                 WHERE t.{hash} IS DISTINCT FROM EXCLUDED.{hash} \
                 RETURNING (xmax = 0) AS inserted",
                target = target,
                cols = target_cols.join(", "),
                pk = pk,
                src = source_cols.join(", "),
                staging = staging,
                updates = updates.join(", "),
                hash = HASH_COLUMN,
            )
        }
    }
}

/// (Re)crée la table de staging vide
pub async fn create_staging_table(pool: &Pool, layout: &MirrorLayout) -> Result<()> {
    let client = pool.get().await?;
    let staging = layout.target.staging();

    client
        .execute(&format!("DROP TABLE IF EXISTS {}", staging.qualified()), &[])
        .await
        .with_context(|| format!("Failed to drop staging table {}", staging))?;
    client
        .execute(&staging_table_sql(layout), &[])
        .await
        .with_context(|| format!("Failed to create staging table {}", staging))?;

    debug!(table = %staging, "Created staging table");
    Ok(())
}

pub async fn drop_staging_table(pool: &Pool, layout: &MirrorLayout) -> Result<()> {
    let client = pool.get().await?;
    let staging = layout.target.staging();
    client
        .execute(&format!("DROP TABLE IF EXISTS {}", staging.qualified()), &[])
        .await
        .with_context(|| format!("Failed to drop staging table {}", staging))?;
    Ok(())
}

/// Insère des lignes CSV pré-formatées via COPY (pipeline streaming).
///
/// Chaque chunk doit contenir des lignes terminées par `\n` et correspondre
/// exactement au layout de colonnes utilisé par la commande COPY.
pub async fn copy_csv_chunks(
    pool: &Pool,
    layout: &MirrorLayout,
    mut rx: mpsc::Receiver<CopyChunk>,
) -> Result<u64> {
    let mut client = pool.get().await?;
    let tx = client.transaction().await?;

    let copy_in = tx.copy_in(&copy_sql(layout)).await?;
    let mut pinned = std::pin::pin!(copy_in);

    let mut total_rows: u64 = 0;

    while let Some(chunk) = rx.recv().await {
        if chunk.data.is_empty() {
            continue;
        }
        pinned
            .as_mut()
            .send(chunk.data)
            .await
            .context("Failed to send COPY chunk")?;
        total_rows += chunk.rows;
    }

    pinned.close().await?;
    tx.commit().await?;

    Ok(total_rows)
}

/// Dimension maximale et types géométriques présents dans la staging
pub async fn staged_geometry_stats(
    tx: &Transaction<'_>,
    layout: &MirrorLayout,
) -> Result<(i32, Vec<String>)> {
    let sql = format!(
        "SELECT COALESCE(max(ST_NDims({geom})), 2)::int4, \
         COALESCE(array_agg(DISTINCT GeometryType({geom})) FILTER (WHERE {geom} IS NOT NULL), '{{}}')::text[] \
         FROM {staging}",
        geom = GEOMETRY_COLUMN,
        staging = layout.target.staging().qualified()
    );
    let row = tx
        .query_one(&sql, &[])
        .await
        .context("Failed to inspect staged geometries")?;
    Ok((row.get(0), row.get(1)))
}

/// Colonnes d'une table existante (vide si la table n'existe pas)
pub async fn existing_columns(tx: &Transaction<'_>, target: &TargetTable) -> Result<Vec<String>> {
    let rows = tx
        .query(
            "SELECT column_name::text FROM information_schema.columns \
             WHERE table_schema = $1 AND table_name = $2 ORDER BY ordinal_position",
            &[&target.schema, &target.table],
        )
        .await
        .with_context(|| format!("Failed to read columns of {}", target))?;
    Ok(rows.iter().map(|r| r.get(0)).collect())
}

/// Colonnes de la staging absentes de la table existante
pub fn missing_columns(layout: &MirrorLayout, existing: &[String]) -> Vec<String> {
    layout
        .copy_columns()
        .into_iter()
        .filter(|c| !existing.contains(c))
        .collect()
}

/// Fusionne la staging dans la table cible selon le mode
pub async fn merge_staging(
    tx: &Transaction<'_>,
    layout: &MirrorLayout,
    geometry: &GeometryColumn,
    mode: MirrorMode,
    promote_to_multi: bool,
    staged: u64,
) -> Result<MergeCounts> {
    let target = &layout.target;

    match mode {
        MirrorMode::Replace => {
            tx.execute(&format!("DROP TABLE IF EXISTS {} CASCADE", target.qualified()), &[])
                .await
                .with_context(|| format!("Failed to drop table {}", target))?;
            tx.execute(&create_table_sql(layout, geometry, false), &[])
                .await
                .with_context(|| format!("Failed to create table {}", target))?;
            info!(table = %target, geometry = %geometry.sql_type(), "Created table");
        }
        MirrorMode::Append | MirrorMode::Upsert => {
            let existing = existing_columns(tx, target).await?;
            if existing.is_empty() {
                tx.execute(&create_table_sql(layout, geometry, true), &[])
                    .await
                    .with_context(|| format!("Failed to create table {}", target))?;
                info!(table = %target, geometry = %geometry.sql_type(), "Created table");
            } else {
                let missing = missing_columns(layout, &existing);
                if !missing.is_empty() {
                    return Err(MirrorError::MissingColumns {
                        table: target.to_string(),
                        columns: missing,
                    }
                    .into());
                }
            }
        }
    }

    let sql = merge_sql(layout, geometry, mode, promote_to_multi);
    debug!(sql = %sql, "Merging staging table");

    let counts = match (mode, &layout.primary_key) {
        (MirrorMode::Upsert, PrimaryKey::Field(pk)) => {
            let candidates: i64 = tx
                .query_one(
                    &format!(
                        "SELECT count(DISTINCT {pk}) FROM {} WHERE {pk} IS NOT NULL",
                        target.staging().qualified(),
                        pk = quote_ident(pk)
                    ),
                    &[],
                )
                .await?
                .get(0);
            let rows = tx
                .query(&sql, &[])
                .await
                .with_context(|| format!("Failed to upsert into {}", target))?;
            let inserted = rows.iter().filter(|r| r.get::<_, bool>(0)).count() as u64;
            let updated = rows.len() as u64 - inserted;
            let candidates = candidates.max(0) as u64;
            MergeCounts {
                inserted,
                updated,
                unchanged: candidates.saturating_sub(inserted + updated),
                duplicates: staged.saturating_sub(candidates),
            }
        }
        _ => {
            let inserted = tx
                .execute(&sql, &[])
                .await
                .with_context(|| format!("Failed to merge staging into {}", target))?;
            MergeCounts {
                inserted,
                duplicates: staged.saturating_sub(inserted),
                ..Default::default()
            }
        }
    };

    Ok(counts)
}

/// Index spatial, créé après le chargement
pub async fn create_indexes(pool: &Pool, target: &TargetTable) -> Result<()> {
    let client = pool.get().await?;

    client
        .execute(
            &format!(
                "CREATE INDEX IF NOT EXISTS {} ON {} USING GIST ({})",
                quote_ident(&format!("{}_{}_idx", target.table, GEOMETRY_COLUMN)),
                target.qualified(),
                GEOMETRY_COLUMN
            ),
            &[],
        )
        .await
        .with_context(|| format!("Failed to create geometry index on {}", target))?;

    client
        .execute(&format!("ANALYZE {}", target.qualified()), &[])
        .await
        .with_context(|| format!("Failed to analyze {}", target))?;

    Ok(())
}

pub async fn count_rows(pool: &Pool, target: &TargetTable) -> Result<u64> {
    let client = pool.get().await?;
    let count: i64 = client
        .query_one(&format!("SELECT count(*) FROM {}", target.qualified()), &[])
        .await
        .with_context(|| format!("Failed to count rows of {}", target))?
        .get(0);
    Ok(count.max(0) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mirror::tests::airports;
    use crate::mirror::{Dimension, TargetTable};

    fn layout(fid: Option<&str>) -> MirrorLayout {
        let target = TargetTable::resolve(&airports(), None, Some("airports")).unwrap();
        MirrorLayout::build(&airports(), target, fid).unwrap()
    }

    fn point_column() -> GeometryColumn {
        GeometryColumn::resolve("Point", &[], 2, Dimension::Auto, false, 3005)
    }

    #[test]
    fn test_staging_sql() {
        let sql = staging_table_sql(&layout(None));
        assert!(sql.starts_with(
            r#"CREATE UNLOGGED TABLE "whse_imagery_and_base_maps"."_staging_airports" ("#
        ));
        assert!(sql.contains(r#""open_date" DATE"#));
        assert!(sql.contains("geom geometry, row_hash BYTEA"));
        assert!(!sql.contains("PRIMARY KEY"));
    }

    #[test]
    fn test_create_table_generated_key() {
        let sql = create_table_sql(&layout(None), &point_column(), false);
        assert!(sql.starts_with(r#"CREATE TABLE "whse_imagery_and_base_maps"."airports""#));
        assert!(sql.contains(r#""ogc_fid" BIGSERIAL PRIMARY KEY"#));
        assert!(sql.contains("geom geometry(Point,3005)"));
        assert_eq!(sql.matches("PRIMARY KEY").count(), 1);
    }

    #[test]
    fn test_create_table_fid() {
        let sql = create_table_sql(&layout(Some("SEQUENCE_ID")), &point_column(), true);
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS"));
        assert!(sql.contains(r#""sequence_id" INTEGER PRIMARY KEY"#));
        assert!(!sql.contains("ogc_fid"));
    }

    #[test]
    fn test_copy_sql() {
        let sql = copy_sql(&layout(None));
        assert!(sql.contains(r#""airport_name", "elevation", "open_date", "is_public", "geom", "row_hash""#));
        assert!(sql.contains("FORMAT csv, DELIMITER '|'"));
    }

    #[test]
    fn test_merge_sql_generated_key() {
        let sql = merge_sql(&layout(None), &point_column(), MirrorMode::Replace, false);
        assert!(sql.starts_with(r#"INSERT INTO "whse_imagery_and_base_maps"."airports" ("#));
        assert!(sql.contains("ST_Force2D(geom), row_hash FROM"));
        assert!(!sql.contains("ON CONFLICT"));
    }

    #[test]
    fn test_merge_sql_append_with_key() {
        let sql = merge_sql(&layout(Some("SEQUENCE_ID")), &point_column(), MirrorMode::Append, true);
        assert!(sql.contains(r#"WHERE "sequence_id" IS NOT NULL ON CONFLICT DO NOTHING"#));
        assert!(sql.contains("ST_Multi(ST_Force2D(geom))"));
    }

    #[test]
    fn test_merge_sql_upsert() {
        let sql = merge_sql(&layout(Some("SEQUENCE_ID")), &point_column(), MirrorMode::Upsert, false);
        assert!(sql.contains(r#"SELECT DISTINCT ON ("sequence_id")"#));
        assert!(sql.contains(r#"ON CONFLICT ("sequence_id") DO UPDATE SET"#));
        assert!(sql.contains(r#""airport_name" = EXCLUDED."airport_name""#));
        assert!(!sql.contains(r#""sequence_id" = EXCLUDED"#));
        assert!(sql.contains("WHERE t.row_hash IS DISTINCT FROM EXCLUDED.row_hash"));
        assert!(sql.ends_with("RETURNING (xmax = 0) AS inserted"));
    }

    #[test]
    fn test_missing_columns() {
        let layout = layout(None);
        let mut existing = layout.copy_columns();
        assert!(missing_columns(&layout, &existing).is_empty());
        existing.retain(|c| c != "elevation" && c != "row_hash");
        assert_eq!(missing_columns(&layout, &existing), vec!["elevation", "row_hash"]);
    }
}
