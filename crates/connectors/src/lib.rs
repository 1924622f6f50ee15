pub mod adapters;
pub mod error;
pub mod registry;
pub mod security;
pub mod traits;
pub mod transport;

pub use adapters::{
    BreachDirectoryConnector, CertTransparencyConnector, CodeRepositoryConnector,
    CorporateRegistryConnector, SocialProfileConnector, WebArchiveConnector, WebSearchConnector,
    WhoisConnector,
};
pub use error::{ConnectorError, ConnectorResult};
pub use registry::ConnectorRegistry;
pub use security::QueryScreen;
pub use traits::{ConnectorDescriptor, SearchContext, SourceConnector};
pub use transport::{
    HttpTransport, ReqwestTransport, StaticTransport, TransportRequest, TransportResponse,
};
