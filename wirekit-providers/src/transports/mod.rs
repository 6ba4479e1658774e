pub(crate) mod common;
pub use common::{Authorization, JsonRpcError};

mod http;
pub use self::http::{ClientBuildError as HttpClientError, Provider as Http};

mod mock;
pub use mock::{MockResponse, MockTransport};
