use conduit_core::context::RedisOptions;
use conduit_core::{Error, Result};
use url::Url;

/// Builds a `redis://` URL from connection options.
///
/// Credentials are percent-encoded, so passwords may contain any character.
pub fn connection_url(options: &RedisOptions) -> Result<Url> {
    let mut url = Url::parse("redis://localhost")
        .map_err(|e| Error::invalid_config(format!("invalid redis URL: {e}")))?;

    url.set_host(Some(options.host.as_str()))
        .map_err(|e| Error::invalid_config(format!("invalid redis host '{}': {e}", options.host)))?;
    url.set_port(Some(options.port))
        .map_err(|()| Error::invalid_config("redis URL cannot carry a port"))?;

    if let Some(username) = &options.username {
        url.set_username(username)
            .map_err(|()| Error::invalid_config("redis URL cannot carry a username"))?;
    }
    if let Some(password) = &options.password {
        url.set_password(Some(password))
            .map_err(|()| Error::invalid_config("redis URL cannot carry a password"))?;
    }
    if let Some(database) = options.database {
        url.set_path(&format!("/{database}"));
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let url = connection_url(&RedisOptions::default()).unwrap();
        assert_eq!(url.as_str(), "redis://127.0.0.1:6379");
    }

    #[test]
    fn test_credentials_are_encoded() {
        let options = RedisOptions::new("cache.internal", 6380)
            .with_credentials("svc", "p@ss:word")
            .with_database(2);
        let url = connection_url(&options).unwrap();

        assert_eq!(url.host_str(), Some("cache.internal"));
        assert_eq!(url.port(), Some(6380));
        assert_eq!(url.username(), "svc");
        assert_eq!(url.password(), Some("p%40ss%3Aword"));
        assert_eq!(url.path(), "/2");
    }

    #[test]
    fn test_password_without_username() {
        let options = RedisOptions::default().with_credentials("", "secret");
        let url = connection_url(&options).unwrap();

        assert_eq!(url.username(), "");
        assert_eq!(url.password(), Some("secret"));
    }
}
