mod client;
mod protocol;

pub use client::DeviceAddr;
pub use client::DeviceCommands;
pub use client::HttpDeviceClient;
pub use client::DEVICE_TIMEOUT;
pub use protocol::AckResponse;
pub use protocol::DeviceInfo;
pub use protocol::SetResponse;
pub use protocol::StateEntry;

#[cfg(test)]
pub use client::mock::MockDeviceClient;
