use std::{io, net::SocketAddr};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed to bind REST listener on {addr}: {cause}")]
    Bind { addr: SocketAddr, cause: io::Error },
}
