//! Integer handles shared between the host tree and the window core.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            /// Raw integer value of the handle.
            #[must_use]
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }
    };
}

handle!(
    /// Node handle issued by the host tree. Not stable across host re-renders.
    NodeId,
    "node"
);

handle!(
    /// Stable item identity, assigned by the window on first discovery.
    ItemId,
    "item"
);

handle!(
    /// Placeholder token handle. Valid from collapse until expand.
    TokenId,
    "token"
);

handle!(
    /// Mutation-observer subscription handle.
    SubscriptionId,
    "sub"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_display() {
        assert_eq!(NodeId(3).to_string(), "node#3");
        assert_eq!(TokenId(12).to_string(), "token#12");
    }

    #[test]
    fn test_handle_serializes_transparently() {
        let json = serde_json::to_string(&ItemId(42)).unwrap();
        assert_eq!(json, "42");
        let back: ItemId = serde_json::from_str(&json).unwrap();
        assert_eq!(back.get(), 42);
    }
}
