//! Identifier newtypes for switch entities.
//!
//! These wrap the raw integers handed around by hardware SDKs so that a port
//! id cannot be passed where a router id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! define_id {
    ($(#[$doc:meta])* $name:ident, $prefix:literal) => {
        $(#[$doc])*
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            Default,
            Serialize,
            Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(u32);

        impl $name {
            pub const fn new(id: u32) -> Self {
                $name(id)
            }

            pub const fn as_u32(&self) -> u32 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}{}", $prefix, self.0)
            }
        }

        impl From<u32> for $name {
            fn from(id: u32) -> Self {
                $name(id)
            }
        }

        impl From<$name> for u32 {
            fn from(id: $name) -> u32 {
                id.0
            }
        }
    };
}

define_id!(
    /// A front-panel (or CPU) port identifier.
    PortId,
    "port"
);

define_id!(
    /// A virtual-routing-context identifier. Router 0 is the default VRF.
    RouterId,
    "vrf"
);

define_id!(
    /// A layer-3 interface identifier.
    InterfaceId,
    "intf"
);

impl RouterId {
    /// The default virtual router.
    pub const DEFAULT: RouterId = RouterId(0);
}
