//! Standard interceptors.

mod logging;
mod timeout;

pub use logging::LoggingInterceptor;
pub use timeout::TimeoutInterceptor;
