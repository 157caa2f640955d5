use std::sync::Mutex;

use rusqlite::{Connection, OptionalExtension, TransactionBehavior};
use tracing::debug;

use imagemeta_core::{MetadataAttributes, ModelUuid};

use crate::error::StorageError;
use crate::schema::{DEFAULT_COLLECTION, init_schema};
use crate::traits::{Assertion, Collection, DocChange, Filter, ImageDoc, StoredDoc, TxnOp};

const COLUMNS: &str = "doc_id, model_uuid, stream, region, series, arch, virtual_type, root_storage_type, root_storage_size, image_id, revision";

/// Convert Vec<u8> to fixed-size array with proper error handling.
fn to_array<const N: usize>(v: Vec<u8>, label: &str) -> Result<[u8; N], StorageError> {
    v.try_into()
        .map_err(|_| StorageError::Serialization(format!("invalid {label} length")))
}

/// SQLite-backed collection stored in one table of the database. The
/// connection is serialized behind a mutex; transactions take the write lock
/// up front so assertion checks and writes see one consistent snapshot.
pub struct SqliteCollection {
    conn: Mutex<Connection>,
    table: String,
}

impl SqliteCollection {
    /// Opens the default `cloudimagemetadata` collection at `path`.
    pub fn open(path: &str) -> Result<Self, StorageError> {
        Self::open_collection(path, DEFAULT_COLLECTION)
    }

    /// Opens (creating if needed) the collection `name` at `path`. Several
    /// collections can share one database file.
    pub fn open_collection(path: &str, name: &str) -> Result<Self, StorageError> {
        Self::with_connection(Connection::open(path)?, name)
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::with_connection(Connection::open_in_memory()?, DEFAULT_COLLECTION)
    }

    fn with_connection(conn: Connection, name: &str) -> Result<Self, StorageError> {
        init_schema(&conn, name)?;
        Ok(Self {
            conn: Mutex::new(conn),
            table: name.to_string(),
        })
    }

    fn select(&self) -> String {
        format!("SELECT {COLUMNS} FROM {}", self.table)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StorageError> {
        self.conn
            .lock()
            .map_err(|_| StorageError::Poisoned("sqlite connection"))
    }
}

type RawRow = (String, Vec<u8>, [String; 7], String, i64);

fn read_raw(row: &rusqlite::Row) -> rusqlite::Result<RawRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        [
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
            row.get(6)?,
            row.get(7)?,
            row.get(8)?,
        ],
        row.get(9)?,
        row.get(10)?,
    ))
}

fn into_stored(raw: RawRow) -> Result<StoredDoc, StorageError> {
    let (id, model_bytes, fields, image_id, revision) = raw;
    let model_uuid = ModelUuid::from_bytes(to_array::<16>(model_bytes, "model_uuid")?);
    let [stream, region, series, arch, virtual_type, root_storage_type, root_storage_size] =
        fields;
    let revision = u64::try_from(revision)
        .map_err(|_| StorageError::Serialization(format!("negative revision on {id}")))?;
    Ok(StoredDoc {
        doc: ImageDoc {
            id,
            model_uuid,
            attributes: MetadataAttributes {
                stream,
                region,
                series,
                arch,
                virtual_type,
                root_storage_type,
                root_storage_size,
            },
            image_id,
        },
        revision,
    })
}

fn current_revision(
    tx: &rusqlite::Transaction,
    table: &str,
    doc_id: &str,
) -> Result<Option<u64>, StorageError> {
    let revision: Option<i64> = tx
        .query_row(
            &format!("SELECT revision FROM {table} WHERE doc_id = ?1"),
            rusqlite::params![doc_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(revision.map(|r| r as u64))
}

fn assertion_holds(assert: Assertion, current: Option<u64>) -> bool {
    match (assert, current) {
        (Assertion::DocMissing, None) => true,
        (Assertion::Revision(want), Some(have)) => want == have,
        _ => false,
    }
}

fn apply_op(tx: &rusqlite::Transaction, table: &str, op: &TxnOp) -> Result<(), StorageError> {
    match &op.change {
        DocChange::Insert(doc) => {
            let a = &doc.attributes;
            let result = tx.execute(
                &format!("INSERT INTO {table} ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 1)"),
                rusqlite::params![
                    doc.id,
                    doc.model_uuid.as_bytes().as_slice(),
                    a.stream,
                    a.region,
                    a.series,
                    a.arch,
                    a.virtual_type,
                    a.root_storage_type,
                    a.root_storage_size,
                    doc.image_id,
                ],
            );
            // Assertions were already checked under the write lock, so this is
            // never a lost race: a duplicate within the batch or a CHECK failure.
            match result {
                Ok(_) => {}
                Err(rusqlite::Error::SqliteFailure(err, msg))
                    if err.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    return Err(StorageError::ConstraintViolation(format!(
                        "insert of {}: {}",
                        op.doc_id,
                        msg.unwrap_or_else(|| err.to_string())
                    )));
                }
                Err(e) => return Err(StorageError::Sqlite(e)),
            }
        }

        DocChange::Update(doc) => {
            let a = &doc.attributes;
            let changed = tx.execute(
                &format!("UPDATE {table} SET stream = ?1, region = ?2, series = ?3, arch = ?4, virtual_type = ?5, root_storage_type = ?6, root_storage_size = ?7, image_id = ?8, revision = revision + 1 WHERE doc_id = ?9"),
                rusqlite::params![
                    a.stream,
                    a.region,
                    a.series,
                    a.arch,
                    a.virtual_type,
                    a.root_storage_type,
                    a.root_storage_size,
                    doc.image_id,
                    doc.id,
                ],
            )?;
            if changed != 1 {
                return Err(StorageError::ConstraintViolation(format!(
                    "update of missing document {}",
                    doc.id
                )));
            }
        }
    }
    Ok(())
}

impl Collection for SqliteCollection {
    fn get(&self, doc_id: &str) -> Result<Option<StoredDoc>, StorageError> {
        let conn = self.lock()?;
        let raw = conn
            .query_row(
                &format!("{} WHERE doc_id = ?1", self.select()),
                rusqlite::params![doc_id],
                read_raw,
            )
            .optional()?;
        raw.map(into_stored).transpose()
    }

    fn find(&self, filter: &Filter) -> Result<Vec<StoredDoc>, StorageError> {
        let clauses = filter.criteria.clauses();

        let mut sql = format!("{} WHERE model_uuid = ?1", self.select());
        for (i, (field, _)) in clauses.iter().enumerate() {
            sql.push_str(&format!(" AND {} = ?{}", field.column(), i + 2));
        }

        let mut params: Vec<&dyn rusqlite::ToSql> = Vec::with_capacity(clauses.len() + 1);
        let model_bytes = filter.model_uuid.as_bytes().as_slice();
        params.push(&model_bytes);
        for (_, value) in &clauses {
            params.push(value);
        }

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params.as_slice(), read_raw)?;

        let mut result = Vec::new();
        for row in rows {
            result.push(into_stored(row?)?);
        }
        Ok(result)
    }

    fn run(&self, ops: &[TxnOp]) -> Result<(), StorageError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        for op in ops {
            let current = current_revision(&tx, &self.table, &op.doc_id)?;
            if !assertion_holds(op.assert, current) {
                debug!(
                    collection = %self.table,
                    doc_id = %op.doc_id,
                    ?current,
                    assert = ?op.assert,
                    "assertion failed"
                );
                // Dropping `tx` rolls back.
                return Err(StorageError::Aborted {
                    doc_id: op.doc_id.clone(),
                });
            }
        }

        for op in ops {
            apply_op(&tx, &self.table, op)?;
        }

        tx.commit()?;
        Ok(())
    }
}
