//! Session state: who is logged in and the bearer token sent with every
//! request. The token survives restarts through a [`TokenStore`].

use rusqlite::Connection;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};

use crate::error::Result;
use crate::models::User;

const TOKEN_KEY: &str = "token";

/// Durable key-value home for the credential token.
pub trait TokenStore: Send + Sync {
    fn load(&self) -> Result<Option<String>>;
    fn save(&self, token: &str) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

pub struct SqliteTokenStore {
    conn: Mutex<Connection>,
}

impl SqliteTokenStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS session (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;

        Ok(SqliteTokenStore {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl TokenStore for SqliteTokenStore {
    fn load(&self) -> Result<Option<String>> {
        match self.conn().query_row(
            "SELECT value FROM session WHERE key = ?1",
            [TOKEN_KEY],
            |row| row.get::<_, String>(0),
        ) {
            Ok(token) => Ok(Some(token)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, token: &str) -> Result<()> {
        self.conn().execute(
            "INSERT OR REPLACE INTO session (key, value, updated_at)
             VALUES (?1, ?2, CURRENT_TIMESTAMP)",
            [TOKEN_KEY, token],
        )?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.conn()
            .execute("DELETE FROM session WHERE key = ?1", [TOKEN_KEY])?;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<String>> {
        Ok(self.token.lock().unwrap_or_else(|p| p.into_inner()).clone())
    }

    fn save(&self, token: &str) -> Result<()> {
        *self.token.lock().unwrap_or_else(|p| p.into_inner()) = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.token.lock().unwrap_or_else(|p| p.into_inner()) = None;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub token: Option<String>,
    pub user: Option<User>,
}

/// Shared session context handed to the API client at construction.
#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<RwLock<Session>>,
    store: Arc<dyn TokenStore>,
}

impl SessionHandle {
    /// Rebuild the session from whatever token the store holds. The user
    /// stays unknown until it is fetched again.
    pub fn restore(store: Arc<dyn TokenStore>) -> Result<Self> {
        let token = store.load()?;
        if token.is_some() {
            log::debug!("Restored stored session token");
        }
        Ok(SessionHandle {
            inner: Arc::new(RwLock::new(Session { token, user: None })),
            store,
        })
    }

    pub fn in_memory() -> Self {
        SessionHandle {
            inner: Arc::new(RwLock::new(Session::default())),
            store: Arc::new(MemoryTokenStore::default()),
        }
    }

    pub fn snapshot(&self) -> Session {
        self.inner.read().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn token(&self) -> Option<String> {
        self.inner
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .token
            .clone()
    }

    pub fn user(&self) -> Option<User> {
        self.inner
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .user
            .clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }

    pub fn login(&self, user: User, token: String) -> Result<()> {
        self.store.save(&token)?;
        let mut session = self.inner.write().unwrap_or_else(|p| p.into_inner());
        log::info!("Logged in as {}", user.username);
        session.token = Some(token);
        session.user = Some(user);
        Ok(())
    }

    pub fn set_user(&self, user: User) {
        self.inner.write().unwrap_or_else(|p| p.into_inner()).user = Some(user);
    }

    /// Forget the session in memory and on disk. Memory is cleared even if
    /// the store fails.
    pub fn logout(&self) -> Result<()> {
        {
            let mut session = self.inner.write().unwrap_or_else(|p| p.into_inner());
            *session = Session::default();
        }
        log::info!("Logged out");
        self.store.clear()
    }
}
