use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Json { path: PathBuf },
    Postgres { url: String, max_connections: u32 },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub store: StoreBackend,
    pub jwt_secret: String,
    pub port: u16,
    pub log_file: String,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| dotenv::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let store = match var("STORE_BACKEND").as_deref().unwrap_or("json") {
            "json" => StoreBackend::Json {
                path: var("DB_FILE").unwrap_or("db.json".to_string()).into(),
            },
            "postgres" => StoreBackend::Postgres {
                // mandatory for this backend
                url: var("DATABASE_URL").ok_or("DATABASE_URL must be set for the postgres backend")?,
                max_connections: var("MAX_CONNECTION_POOLING")
                    .unwrap_or("5".to_string())
                    .parse::<u32>()
                    .map_err(|err| format!("Invalid MAX_CONNECTION_POOLING: {err}"))?,
            },
            other => return Err(format!("Unknown STORE_BACKEND: {other}")),
        };

        Ok(Self {
            store,
            jwt_secret: var("ADMIN_JWT_SECRET").unwrap_or("your-jwt-secret".to_string()),
            port: var("PORT")
                .unwrap_or("3000".to_string())
                .parse::<u16>()
                .map_err(|err| format!("Invalid PORT: {err}"))?,
            log_file: var("LOG_FILE").unwrap_or("app.log".to_string()),
        })
    }
}
