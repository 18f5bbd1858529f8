pub const SCHEMA: &str = "
    -- One JSON document per guild
    CREATE TABLE IF NOT EXISTS guild_config (
        guild_id TEXT PRIMARY KEY,
        data TEXT NOT NULL,
        updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
    );

    -- Per-user Shapes credentials from /auth
    CREATE TABLE IF NOT EXISTS user_auth (
        user_id TEXT PRIMARY KEY,
        app_id TEXT NOT NULL,
        auth_token TEXT NOT NULL,
        created_at DATETIME DEFAULT CURRENT_TIMESTAMP
    );
";
