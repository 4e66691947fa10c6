use cvt_domain::error::Error;

/// Map reqwest errors into our error type, distinguishing timeouts.
pub fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

/// Read the provider API key from the configured environment variable.
pub fn resolve_api_key(env_name: &str) -> Result<String, Error> {
    std::env::var(env_name)
        .map_err(|_| Error::Config(format!("missing API key env var {env_name}")))
}
