use std::{io, net};

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error, PartialEq)]
#[non_exhaustive]
pub enum Error {
    #[error("service discovery: failed to join multicast group")]
    ErrJoiningMulticastGroup,
    #[error("service discovery: endpoint is closed")]
    ErrConnectionClosed,
    #[error("service discovery: service name must not be empty")]
    ErrEmptyServiceName,
    #[error("service discovery: service name must not contain '{0:?}' or '{1:?}'")]
    ErrReservedByteInServiceName(char, char),
    #[error("parse addr: {0}")]
    ParseIp(#[from] net::AddrParseError),
    #[error("{0}")]
    Io(#[source] IoError),
    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error)]
#[error("io error: {0}")]
pub struct IoError(#[from] pub io::Error);

// Workaround for wanting PartialEq for io::Error.
impl PartialEq for IoError {
    fn eq(&self, other: &Self) -> bool {
        self.0.kind() == other.0.kind()
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(IoError(e))
    }
}
