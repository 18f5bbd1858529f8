use crate::config::Config;
use crate::guild::GuildConfig;
use rusqlite::{Connection, OptionalExtension, Result};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

mod schema;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAuthRecord {
    pub user_id: String,
    pub app_id: String,
    pub auth_token: String,
    pub created_at: String,
}

#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn new(config: &Config) -> Result<Self> {
        if config.database_url != ":memory:" {
            if let Some(parent) = Path::new(&config.database_url).parent() {
                if !parent.as_os_str().is_empty() {
                    let _ = std::fs::create_dir_all(parent);
                }
            }
        }
        let conn = Connection::open(&config.database_url)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn execute_init(&self) -> anyhow::Result<()> {
        info!("Database: Initializing schema...");
        let conn = self.lock()?;
        conn.execute_batch(schema::SCHEMA)?;
        debug!("Database: Schema initialized successfully");
        Ok(())
    }

    fn lock(&self) -> anyhow::Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("database connection mutex poisoned"))
    }

    /// Run a synchronous database call off the async executor.
    pub async fn run_blocking<T, F>(&self, f: F) -> anyhow::Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || f(&db)).await?
    }

    // --- Guild config ---

    pub fn load_guild_config(&self, guild_id: u64) -> anyhow::Result<Option<GuildConfig>> {
        let conn = self.lock()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT data FROM guild_config WHERE guild_id = ?1",
                [guild_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;

        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    pub fn save_guild_config(&self, guild_id: u64, config: &GuildConfig) -> anyhow::Result<()> {
        let json = serde_json::to_string(config)?;
        debug!("Database: Saving config for guild {}", guild_id);
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO guild_config (guild_id, data, updated_at)
             VALUES (?1, ?2, CURRENT_TIMESTAMP)
             ON CONFLICT(guild_id) DO UPDATE SET data = ?2, updated_at = CURRENT_TIMESTAMP",
            (guild_id.to_string(), json),
        )?;
        Ok(())
    }

    pub fn list_guild_configs(&self) -> anyhow::Result<Vec<(u64, GuildConfig)>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT guild_id, data FROM guild_config")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut results = Vec::new();
        for row in rows {
            let (guild_id, json) = row?;
            let Ok(guild_id) = guild_id.parse::<u64>() else {
                continue;
            };
            results.push((guild_id, serde_json::from_str(&json)?));
        }
        Ok(results)
    }

    // --- User auth ---

    pub fn get_user_auth(&self, user_id: &str) -> anyhow::Result<Option<UserAuthRecord>> {
        let conn = self.lock()?;
        let record = conn
            .query_row(
                "SELECT user_id, app_id, auth_token, created_at FROM user_auth WHERE user_id = ?1",
                [user_id],
                |row| {
                    Ok(UserAuthRecord {
                        user_id: row.get(0)?,
                        app_id: row.get(1)?,
                        auth_token: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    pub fn set_user_auth(&self, user_id: &str, app_id: &str, auth_token: &str) -> anyhow::Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO user_auth (user_id, app_id, auth_token, created_at)
             VALUES (?1, ?2, ?3, CURRENT_TIMESTAMP)
             ON CONFLICT(user_id) DO UPDATE SET app_id = ?2, auth_token = ?3, created_at = CURRENT_TIMESTAMP",
            (user_id, app_id, auth_token),
        )?;
        Ok(())
    }

    pub fn delete_user_auth(&self, user_id: &str) -> anyhow::Result<usize> {
        let conn = self.lock()?;
        let count = conn.execute("DELETE FROM user_auth WHERE user_id = ?1", [user_id])?;
        Ok(count)
    }
}
