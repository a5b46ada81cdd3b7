pub mod app;
pub mod cli;
pub mod config;
pub mod credential;
pub mod executor;
pub mod report;
pub mod target;
pub mod transport;
pub mod utils;

pub use cli::{SshArgs, UploadArgs};
pub use config::{BatchConfig, ConfigError, Operation};
pub use credential::Credential;
pub use executor::{BatchReport, Dispatcher};
pub use report::Reporter;
pub use target::Target;
pub use transport::{Connection, SshTransport, Transport};
