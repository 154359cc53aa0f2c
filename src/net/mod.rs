pub mod address;
pub mod port;

// Re-export main types and functions
pub use address::{AddressExpr, address_matches};
pub use port::{PortRange, port_matches};
