//! Concrete source adapters.
//!
//! Each adapter encodes one upstream's query dialect and response envelope.
//! All of them speak the [`HttpTransport`](crate::transport::HttpTransport)
//! seam so canned transports can stand in for the network.

mod archive;
mod breach_database;
mod cert_transparency;
mod code_repository;
mod corporate_registry;
mod domain_registry;
mod search_engine;
mod social_media;

pub use archive::WebArchiveConnector;
pub use breach_database::BreachDirectoryConnector;
pub use cert_transparency::CertTransparencyConnector;
pub use code_repository::CodeRepositoryConnector;
pub use corporate_registry::CorporateRegistryConnector;
pub use domain_registry::WhoisConnector;
pub use search_engine::WebSearchConnector;
pub use social_media::SocialProfileConnector;
