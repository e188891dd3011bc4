use super::{MasterStore, PersistenceError, PersistenceResult, missing_master};
use crate::admin::AdminEdit;
use crate::error::ValidatorResult;
use crate::model::{MasterTable, StoreMaster};
use log::info;
use parking_lot::Mutex;
use rusqlite::{Connection, Transaction, TransactionBehavior, params};

pub struct SqliteMasterStore {
    connection: Mutex<Connection>,
    label: String,
}

impl SqliteMasterStore {
    pub fn new<P: AsRef<std::path::Path>>(path: P) -> PersistenceResult<Self> {
        let label = path.as_ref().display().to_string();
        let connection = Connection::open(path)?;
        Self::initialize_schema(&connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
            label,
        })
    }

    pub fn in_memory() -> PersistenceResult<Self> {
        let connection = Connection::open_in_memory()?;
        Self::initialize_schema(&connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
            label: ":memory:".to_string(),
        })
    }

    fn initialize_schema(connection: &Connection) -> PersistenceResult<()> {
        let ddl = r#"
            CREATE TABLE IF NOT EXISTS stores (
                store_id INTEGER PRIMARY KEY,
                position INTEGER NOT NULL,
                name TEXT NOT NULL,
                zone TEXT NOT NULL,
                delivery_spec TEXT NOT NULL,
                distribution_center TEXT,
                format TEXT
            );
        "#;
        connection.execute_batch(ddl)?;
        Ok(())
    }

    fn read_table(conn: &Connection) -> PersistenceResult<MasterTable> {
        let mut stmt = conn.prepare(
            "SELECT store_id, name, zone, delivery_spec, distribution_center, format
             FROM stores ORDER BY position ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(StoreMaster {
                store_id: row.get(0)?,
                name: row.get(1)?,
                zone: row.get(2)?,
                delivery_spec: row.get(3)?,
                distribution_center: row.get(4)?,
                format: row.get(5)?,
            })
        })?;

        let mut table = MasterTable::new();
        for store in rows {
            table
                .add_store(store?)
                .map_err(|err| PersistenceError::InvalidData(err.to_string()))?;
        }
        Ok(table)
    }

    fn write_store(tx: &Transaction, position: usize, store: &StoreMaster) -> PersistenceResult<()> {
        tx.execute(
            "INSERT INTO stores (store_id, position, name, zone, delivery_spec, distribution_center, format)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(store_id) DO UPDATE SET
                name = excluded.name,
                zone = excluded.zone,
                delivery_spec = excluded.delivery_spec,
                distribution_center = excluded.distribution_center,
                format = excluded.format",
            params![
                store.store_id,
                position as i64,
                store.name,
                store.zone,
                store.delivery_spec,
                store.distribution_center,
                store.format,
            ],
        )?;
        Ok(())
    }
}

impl MasterStore for SqliteMasterStore {
    fn describe(&self) -> String {
        format!("sqlite:{}", self.label)
    }

    fn load_master(&self) -> PersistenceResult<MasterTable> {
        let conn = self.connection.lock();
        let table = Self::read_table(&conn)?;
        if table.is_empty() {
            return Err(PersistenceError::NotFound);
        }
        Ok(table)
    }

    fn save_master(&self, table: &MasterTable) -> PersistenceResult<()> {
        let mut conn = self.connection.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute("DELETE FROM stores", [])?;
        for (position, store) in table.stores().iter().enumerate() {
            Self::write_store(&tx, position, store)?;
        }
        tx.commit()?;
        info!("saved {} store(s) to {}", table.len(), self.describe());
        Ok(())
    }

    fn apply_edit(&self, edit: &AdminEdit) -> ValidatorResult<StoreMaster> {
        let mut conn = self.connection.lock();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(PersistenceError::from)?;
        let mut table = Self::read_table(&tx)?;
        if table.is_empty() {
            return Err(missing_master(self, PersistenceError::NotFound));
        }
        let edited = edit.apply_to(&mut table)?;
        let position = table
            .stores()
            .iter()
            .position(|s| s.store_id == edited.store_id)
            .unwrap_or(table.len());
        Self::write_store(&tx, position, &edited)?;
        tx.commit().map_err(PersistenceError::from)?;
        Ok(edited)
    }
}
