//! Port interfaces
//!
//! These traits define the boundaries between the SDK core and whatever
//! the host application plugs in: key-value persistence, the HTTP stack,
//! and the browser. The clock port lives in `tenantlink-common` and is
//! re-exported here.

mod navigator;
mod storage;
mod transport;

pub use navigator::{LogNavigator, Navigator, NavigatorError};
pub use storage::{MemoryStorage, Storage, StorageError};
pub use tenantlink_common::{Clock, SystemClock};
pub use transport::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, TransportError};
