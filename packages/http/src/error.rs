use mosaic_federation::ImportError;
use url::Url;

#[derive(thiserror::Error, Debug)]
pub enum HttpError {
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}

/// Classify a failed request for the loader's retry logic.
pub(crate) fn import_error(url: &Url, error: reqwest::Error) -> ImportError {
    if error.is_timeout() {
        ImportError::Timeout {
            url: url.to_string(),
        }
    } else if let Some(status) = error.status() {
        ImportError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        }
    } else {
        ImportError::Network {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}
