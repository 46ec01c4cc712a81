mod http;
mod local;
mod registry;

pub use http::HttpExecutor;
pub use local::LocalExecutor;
pub use registry::LocalExecutorRegistry;
