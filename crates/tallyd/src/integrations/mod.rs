pub mod mdns;
pub mod obs;
