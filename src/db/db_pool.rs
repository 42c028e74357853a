use duckdb::Connection;
use r2d2::ManageConnection;
use std::sync::Mutex;

/// r2d2 manager for one DuckDB database. The database is opened once and
/// every pooled connection is a clone of that root connection, so pooled
/// connections share one instance (in-memory databases included).
pub struct DuckDBConnectionManager {
    path: String,
    root: Mutex<Option<Connection>>,
}

impl DuckDBConnectionManager {
    pub fn new(path: String) -> Self {
        Self {
            path,
            root: Mutex::new(None),
        }
    }

    fn open(&self) -> Result<Connection, duckdb::Error> {
        if self.path.is_empty() || self.path == ":memory:" {
            Connection::open_in_memory()
        } else {
            Connection::open(&self.path)
        }
    }
}

impl ManageConnection for DuckDBConnectionManager {
    type Connection = Connection;
    type Error = duckdb::Error;

    fn connect(&self) -> Result<Self::Connection, Self::Error> {
        let mut root = self.root.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(conn) = root.as_ref() {
            return conn.try_clone();
        }

        let conn = self.open()?;
        let handle = conn.try_clone()?;
        *root = Some(conn);
        Ok(handle)
    }

    fn is_valid(&self, conn: &mut Self::Connection) -> Result<(), Self::Error> {
        conn.execute_batch("SELECT 1")
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}
