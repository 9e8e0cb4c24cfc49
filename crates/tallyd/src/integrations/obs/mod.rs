mod client;
mod protocol;

pub use client::run;
pub use client::ObsConfig;
pub use client::RECONNECT_BACKOFF;
