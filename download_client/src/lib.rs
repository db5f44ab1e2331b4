pub mod api;
pub mod client_config;
pub mod errors;
pub mod file_info;
pub mod open_file_writer;
pub mod poller;
pub mod session;
pub mod types;
pub mod utils;
pub mod view;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{ReqwestApi, RetrievedFile, ServiceApi};
pub use session::{CompletedDownload, DownloadSession};
