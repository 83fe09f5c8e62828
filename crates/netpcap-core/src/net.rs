//! Network address values.

/// An IPv4 address and its netmask, as returned by the native library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NetIp4Address {
    address: u32,
    netmask: u32,
}

impl NetIp4Address {
    pub const fn new(address: u32, netmask: u32) -> Self {
        Self { address, netmask }
    }

    pub const fn address(&self) -> u32 {
        self.address
    }

    pub const fn netmask(&self) -> u32 {
        self.netmask
    }
}
