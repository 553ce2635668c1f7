use std::io;

#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("Failed to open {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: serialport::Error,
    },

    #[error("Failed to write to {port}: {source}")]
    Write {
        port: String,
        #[source]
        source: io::Error,
    },

    #[error("Incomplete write to {port}")]
    IncompleteWrite { port: String },

    #[error("Channel {port} is closed")]
    Closed { port: String },

    #[error("Failed to enumerate serial ports: {0}")]
    Enumerate(#[from] serialport::Error),
}
