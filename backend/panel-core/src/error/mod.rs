pub mod catalogue;
pub mod codec;
pub mod config;
pub mod engine;
pub mod ipc;
pub mod proxy;
pub mod spawn;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Codec(#[from] codec::CodecError),

    #[error(transparent)]
    Ipc(#[from] ipc::IpcError),

    #[error(transparent)]
    Spawn(#[from] spawn::SpawnError),

    #[error(transparent)]
    Catalogue(#[from] catalogue::CatalogueError),

    #[error(transparent)]
    Engine(#[from] engine::EngineError),

    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Proxy(#[from] proxy::ProxyError),
}
