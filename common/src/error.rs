use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Error while deserializing JSON response: {0}")]
    JsonDeserialization(#[from] serde_json::Error),
    #[error("API error {0}: {1}")]
    Api(reqwest::StatusCode, String),
}
