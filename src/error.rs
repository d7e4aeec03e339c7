use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The frame source could not be opened or failed mid-stream.
    #[error("capture device error: {0}")]
    Capture(String),

    /// The pose model could not be loaded or run.
    #[error("pose inference error: {0}")]
    Inference(String),

    #[error("frame encoding failed: {0}")]
    Encode(#[from] image::ImageError),

    #[error("invalid overlay font: {0}")]
    Font(String),

    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("configuration could not be serialized: {0}")]
    ConfigWrite(#[from] toml::ser::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A configured backend was compiled out of this build.
    #[error("{0} is not available in this build (enable the `vision` feature)")]
    BackendUnavailable(&'static str),
}

#[cfg(feature = "vision")]
impl From<opencv::Error> for Error {
    fn from(err: opencv::Error) -> Self {
        Error::Capture(err.to_string())
    }
}

#[cfg(feature = "vision")]
impl From<ort::Error> for Error {
    fn from(err: ort::Error) -> Self {
        Error::Inference(err.to_string())
    }
}
