use std::path::Path;

use rusqlite::{Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::remote::{Document, JsonMap, RemoteDataService, RemoteError};

/// The daemon's concrete Remote Data Service: identity accounts with salted
/// sha2 credentials, a generic document table per collection, and a
/// single-row session table so a restarted process restores the signed-in
/// principal.
pub struct SqliteBackend {
    conn: Connection,
}

pub fn open_backend(workspace: &Path) -> anyhow::Result<SqliteBackend> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("classroom.sqlite3");
    let conn = Connection::open(db_path)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS accounts(
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            salt TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS documents(
            collection TEXT NOT NULL,
            id TEXT NOT NULL,
            fields TEXT NOT NULL,
            PRIMARY KEY(collection, id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection)",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS auth_session(
            slot INTEGER PRIMARY KEY CHECK(slot = 0),
            account_id TEXT
        )",
        [],
    )?;
    conn.execute(
        "INSERT OR IGNORE INTO auth_session(slot, account_id) VALUES (0, NULL)",
        [],
    )?;

    Ok(SqliteBackend { conn })
}

fn db_err(err: rusqlite::Error) -> RemoteError {
    RemoteError::backend(err.to_string())
}

fn hash_password(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

impl RemoteDataService for SqliteBackend {
    fn register(&self, email: &str, password: &str) -> Result<String, RemoteError> {
        let exists = self
            .conn
            .query_row("SELECT 1 FROM accounts WHERE email = ?", [email], |r| {
                r.get::<_, i64>(0)
            })
            .optional()
            .map_err(db_err)?
            .is_some();
        if exists {
            return Err(RemoteError::DuplicateEmail {
                email: email.to_string(),
            });
        }
        let id = Uuid::new_v4().to_string();
        let salt = Uuid::new_v4().to_string();
        self.conn
            .execute(
                "INSERT INTO accounts(id, email, password_hash, salt) VALUES (?, ?, ?, ?)",
                rusqlite::params![id, email, hash_password(password, &salt), salt],
            )
            .map_err(db_err)?;
        Ok(id)
    }

    fn sign_in(&self, email: &str, password: &str) -> Result<String, RemoteError> {
        let row = self
            .conn
            .query_row(
                "SELECT id, password_hash, salt FROM accounts WHERE email = ?",
                [email],
                |r| {
                    Ok((
                        r.get::<_, String>(0)?,
                        r.get::<_, String>(1)?,
                        r.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()
            .map_err(db_err)?;
        let Some((id, stored_hash, salt)) = row else {
            return Err(RemoteError::InvalidCredentials);
        };
        if hash_password(password, &salt) != stored_hash {
            return Err(RemoteError::InvalidCredentials);
        }
        self.conn
            .execute(
                "UPDATE auth_session SET account_id = ? WHERE slot = 0",
                [id.as_str()],
            )
            .map_err(db_err)?;
        Ok(id)
    }

    fn sign_out(&self) -> Result<(), RemoteError> {
        self.conn
            .execute("UPDATE auth_session SET account_id = NULL WHERE slot = 0", [])
            .map_err(db_err)?;
        Ok(())
    }

    fn current_session(&self) -> Result<Option<String>, RemoteError> {
        self.conn
            .query_row("SELECT account_id FROM auth_session WHERE slot = 0", [], |r| {
                r.get::<_, Option<String>>(0)
            })
            .optional()
            .map(|v| v.flatten())
            .map_err(db_err)
    }

    fn create(&self, collection: &str, fields: JsonMap) -> Result<String, RemoteError> {
        let id = Uuid::new_v4().to_string();
        self.put(collection, &id, fields)?;
        Ok(id)
    }

    fn put(&self, collection: &str, id: &str, fields: JsonMap) -> Result<(), RemoteError> {
        let payload = serde_json::Value::Object(fields).to_string();
        self.conn
            .execute(
                "INSERT OR REPLACE INTO documents(collection, id, fields) VALUES (?, ?, ?)",
                [collection, id, payload.as_str()],
            )
            .map_err(db_err)?;
        Ok(())
    }

    fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, RemoteError> {
        let raw = self
            .conn
            .query_row(
                "SELECT fields FROM documents WHERE collection = ? AND id = ?",
                [collection, id],
                |r| r.get::<_, String>(0),
            )
            .optional()
            .map_err(db_err)?;
        let Some(raw) = raw else { return Ok(None) };
        Ok(Some(Document {
            id: id.to_string(),
            fields: parse_fields(collection, id, &raw)?,
        }))
    }

    fn get_all(&self, collection: &str) -> Result<Vec<Document>, RemoteError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, fields FROM documents WHERE collection = ? ORDER BY rowid")
            .map_err(db_err)?;
        let rows = stmt
            .query_map([collection], |r| {
                Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
            })
            .and_then(|it| it.collect::<Result<Vec<_>, _>>())
            .map_err(db_err)?;
        let mut docs = Vec::with_capacity(rows.len());
        for (id, raw) in rows {
            let fields = parse_fields(collection, &id, &raw)?;
            docs.push(Document { id, fields });
        }
        Ok(docs)
    }

    fn update(&self, collection: &str, id: &str, patch: &JsonMap) -> Result<(), RemoteError> {
        let Some(existing) = self.get(collection, id)? else {
            return Err(RemoteError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        };
        let mut fields = existing.fields;
        for (key, value) in patch {
            fields.insert(key.clone(), value.clone());
        }
        self.put(collection, id, fields)
    }

    fn delete(&self, collection: &str, id: &str) -> Result<(), RemoteError> {
        let affected = self
            .conn
            .execute(
                "DELETE FROM documents WHERE collection = ? AND id = ?",
                [collection, id],
            )
            .map_err(db_err)?;
        if affected == 0 {
            return Err(RemoteError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }
}

fn parse_fields(collection: &str, id: &str, raw: &str) -> Result<JsonMap, RemoteError> {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(_) => Err(RemoteError::backend(format!(
            "{collection}/{id}: stored fields are not an object"
        ))),
        Err(e) => Err(RemoteError::backend(format!(
            "{collection}/{id}: corrupt fields: {e}"
        ))),
    }
}
