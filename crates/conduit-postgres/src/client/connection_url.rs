use conduit_core::context::{RelationalContext, RelationalKind};
use conduit_core::{Error, Result};
use url::Url;

/// Builds a `postgres://` URL from a relational context.
///
/// An explicit connection string wins over the individual parameters.
/// Requesting TLS adds `sslmode=prefer` unless the connection string already
/// names an `sslmode`.
pub fn connection_url(context: &RelationalContext) -> Result<Url> {
    if context.kind() != RelationalKind::Postgresql {
        return Err(Error::config_mismatch(
            context.name(),
            "postgresql",
            context.kind().to_string(),
        ));
    }

    let mut url = match context.connection_string() {
        Some(connection_string) => Url::parse(connection_string)
            .map_err(|e| Error::invalid_config(format!("invalid postgres connection string: {e}")))?,
        None => from_parts(context)?,
    };

    if !matches!(url.scheme(), "postgres" | "postgresql") {
        return Err(Error::invalid_config(format!(
            "unsupported connection scheme '{}'",
            url.scheme()
        )));
    }

    if context.ssl() && !url.query_pairs().any(|(key, _)| key == "sslmode") {
        url.query_pairs_mut().append_pair("sslmode", "prefer");
    }

    Ok(url)
}

fn from_parts(context: &RelationalContext) -> Result<Url> {
    let mut url = Url::parse("postgres://localhost")
        .map_err(|e| Error::invalid_config(format!("invalid postgres URL: {e}")))?;

    url.set_host(Some(context.host()))
        .map_err(|e| Error::invalid_config(format!("invalid postgres host '{}': {e}", context.host())))?;
    url.set_port(context.port())
        .map_err(|()| Error::invalid_config("postgres URL cannot carry a port"))?;

    if let Some(username) = context.username() {
        url.set_username(username)
            .map_err(|()| Error::invalid_config("postgres URL cannot carry a username"))?;
    }
    if let Some(password) = context.password() {
        url.set_password(Some(password))
            .map_err(|()| Error::invalid_config("postgres URL cannot carry a password"))?;
    }
    if let Some(database) = context.database() {
        url.path_segments_mut()
            .map_err(|()| Error::invalid_config("postgres URL cannot carry a database"))?
            .push(database);
    }

    Ok(url)
}

/// Replaces the password of `url` for safe logging.
pub(crate) fn masked(url: &Url) -> String {
    let mut masked = url.clone();
    if masked.password().is_some() {
        // Only fails for cannot-be-a-base URLs, which never carry a password.
        let _ = masked.set_password(Some("***"));
    }
    masked.to_string()
}

#[cfg(test)]
mod tests {
    use conduit_core::context::DatasourceContext;

    use super::*;

    fn context() -> RelationalContext {
        RelationalContext::postgres(DatasourceContext::new("users-db"))
    }

    #[test]
    fn test_url_from_parts() {
        let url = connection_url(
            &context()
                .with_host("db.internal")
                .with_credentials("app", "s3cr:t@")
                .with_database("users"),
        )
        .unwrap();

        assert_eq!(url.host_str(), Some("db.internal"));
        assert_eq!(url.port(), Some(5432));
        assert_eq!(url.username(), "app");
        assert_eq!(url.password(), Some("s3cr%3At%40"));
        assert_eq!(url.path(), "/users");
        assert_eq!(url.query(), None);
    }

    #[test]
    fn test_connection_string_wins() {
        let url = connection_url(
            &context()
                .with_connection_string("postgres://u:p@primary:6432/orders")
                .with_host("ignored")
                .with_database("ignored"),
        )
        .unwrap();

        assert_eq!(url.host_str(), Some("primary"));
        assert_eq!(url.port(), Some(6432));
        assert_eq!(url.path(), "/orders");
    }

    #[test]
    fn test_ssl_adds_sslmode_once() {
        let url = connection_url(&context().with_database("users").with_ssl(true)).unwrap();
        assert_eq!(url.query(), Some("sslmode=prefer"));

        let url = connection_url(
            &context()
                .with_connection_string("postgres://primary/orders?sslmode=require")
                .with_ssl(true),
        )
        .unwrap();
        assert_eq!(url.query(), Some("sslmode=require"));
    }

    #[test]
    fn test_rejects_other_engines() {
        let context = RelationalContext::new(DatasourceContext::new("db"), RelationalKind::Mysql)
            .with_database("users");
        assert!(matches!(
            connection_url(&context),
            Err(Error::ConfigMismatch { expected: "postgresql", .. })
        ));

        let context = context_with_scheme("mysql://localhost/users");
        assert!(matches!(connection_url(&context), Err(Error::InvalidConfig { .. })));
    }

    #[test]
    fn test_masked_hides_password() {
        let url = Url::parse("postgres://app:hunter2@db/users").unwrap();
        assert_eq!(masked(&url), "postgres://app:***@db/users");
    }

    fn context_with_scheme(connection_string: &str) -> RelationalContext {
        context().with_connection_string(connection_string)
    }
}
