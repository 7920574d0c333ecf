//! Connection parameters handed to a [`ConnectionFactory`](crate::ConnectionFactory)

use serde::{Deserialize, Serialize};

/// Everything a factory needs to open one database connection.
///
/// The pool stores these on `open` and reuses them whenever a slot has to be
/// (re)filled, so every connection in a pool shares the same parameters.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ConnectParams {
    /// Host address (empty for local sockets or file-based databases)
    pub host: String,
    /// Username
    pub user: Option<String>,
    /// Password, never serialized back out
    #[serde(skip_serializing)]
    pub password: Option<String>,
    /// Database name or file path
    pub database: Option<String>,
    /// Port number (0 for the driver default)
    pub port: u16,
    /// Path of a unix socket, if the driver should use one instead of TCP
    pub unix_socket: Option<String>,
    /// Driver-specific client flags
    pub client_flags: u64,
    /// Autocommit mode applied right after the connection is established
    pub autocommit: bool,
}

impl ConnectParams {
    /// Parameters for a TCP connection to `host:port`
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            host: host.to_string(),
            port,
            ..Self::default()
        }
    }

    /// Parameters for a file-based database (or `:memory:`)
    pub fn for_database(database: &str) -> Self {
        Self::default().with_database(database)
    }

    pub fn with_user(mut self, user: &str) -> Self {
        self.user = Some(user.to_string());
        self
    }

    pub fn with_password(mut self, password: &str) -> Self {
        self.password = Some(password.to_string());
        self
    }

    pub fn with_database(mut self, database: &str) -> Self {
        self.database = Some(database.to_string());
        self
    }

    pub fn with_unix_socket(mut self, path: &str) -> Self {
        self.unix_socket = Some(path.to_string());
        self
    }

    pub fn with_client_flags(mut self, flags: u64) -> Self {
        self.client_flags = flags;
        self
    }

    pub fn with_autocommit(mut self, autocommit: bool) -> Self {
        self.autocommit = autocommit;
        self
    }

    /// A short description for logs, without credentials
    pub fn display_target(&self) -> String {
        match (&self.unix_socket, &self.database) {
            (Some(socket), Some(db)) => format!("{}/{}", socket, db),
            (Some(socket), None) => socket.clone(),
            (None, Some(db)) if self.host.is_empty() => db.clone(),
            (None, Some(db)) => format!("{}:{}/{}", self.host, self.port, db),
            (None, None) => format!("{}:{}", self.host, self.port),
        }
    }
}

impl Default for ConnectParams {
    /// Defaults: no host, port 0, autocommit on
    fn default() -> Self {
        Self {
            host: String::new(),
            user: None,
            password: None,
            database: None,
            port: 0,
            unix_socket: None,
            client_flags: 0,
            autocommit: true,
        }
    }
}

impl std::fmt::Debug for ConnectParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectParams")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("database", &self.database)
            .field("port", &self.port)
            .field("unix_socket", &self.unix_socket)
            .field("client_flags", &self.client_flags)
            .field("autocommit", &self.autocommit)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let params = ConnectParams::new("db.internal", 3306)
            .with_user("app")
            .with_password("hunter2")
            .with_database("orders")
            .with_autocommit(false);

        assert_eq!(params.host, "db.internal");
        assert_eq!(params.port, 3306);
        assert_eq!(params.user.as_deref(), Some("app"));
        assert_eq!(params.database.as_deref(), Some("orders"));
        assert!(!params.autocommit);
        assert_eq!(params.display_target(), "db.internal:3306/orders");
    }

    #[test]
    fn test_debug_redacts_password() {
        let params = ConnectParams::for_database("app.db").with_password("hunter2");
        let debug = format!("{:?}", params);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_password_is_not_serialized() {
        let params = ConnectParams::new("localhost", 5432).with_password("hunter2");
        let json = serde_json::to_string(&params).expect("serialize");
        assert!(!json.contains("hunter2"));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let params: ConnectParams = toml::from_str(
            r#"
            database = "/var/lib/app/app.db"
            password = "from-file"
            "#,
        )
        .expect("parse");

        assert_eq!(params.database.as_deref(), Some("/var/lib/app/app.db"));
        assert_eq!(params.password.as_deref(), Some("from-file"));
        assert!(params.autocommit);
        assert_eq!(params.port, 0);
        assert_eq!(params.display_target(), "/var/lib/app/app.db");
    }
}
