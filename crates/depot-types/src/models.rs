use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Returned when a stored or submitted string does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Declares a snake_case, string-backed enum. The same strings are used in
/// SQLite columns and in JSON payloads.
macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        $name:ident ($kind:literal) { $($variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

string_enum! {
    /// The single group a user belongs to.
    Role ("role") {
        Admin => "admin",
        Operator => "operator",
        Courier => "courier",
        Store => "store",
    }
}

impl Role {
    /// Internal administrators manage users, stores, protocols and stock.
    pub fn is_staff(&self) -> bool {
        matches!(self, Self::Admin)
    }

    /// Roles allowed to create and change routes, stops and transfers.
    pub fn manages_logistics(&self) -> bool {
        matches!(self, Self::Admin | Self::Operator)
    }

    pub fn is_courier(&self) -> bool {
        matches!(self, Self::Courier)
    }

    pub fn is_store(&self) -> bool {
        matches!(self, Self::Store)
    }

    /// Couriers confirm protocols on delivery; admins may do it on their behalf.
    pub fn can_confirm_protocols(&self) -> bool {
        matches!(self, Self::Admin | Self::Courier)
    }
}

string_enum! {
    TransferKind ("transfer kind") {
        Entry => "entry",
        Exit => "exit",
    }
}

string_enum! {
    TransferStatus ("transfer status") {
        Pending => "pending",
        InTransit => "in_transit",
        Confirmed => "confirmed",
    }
}

impl TransferStatus {
    /// A courier can only collect a load that is still waiting at its origin.
    pub fn can_pick_up(&self) -> bool {
        matches!(self, Self::Pending)
    }

    /// Delivery is only confirmed for loads that were collected first.
    pub fn can_receive(&self) -> bool {
        matches!(self, Self::InTransit)
    }

    pub fn is_final(&self) -> bool {
        matches!(self, Self::Confirmed)
    }
}

string_enum! {
    /// Vehicle class needed to move a transfer.
    LoadSize ("load size") {
        Small => "small",
        Medium => "medium",
        Large => "large",
    }
}

string_enum! {
    RouteStatus ("route status") {
        Open => "open",
        EnRoute => "en_route",
        Finished => "finished",
    }
}

string_enum! {
    StopStatus ("stop status") {
        Pending => "pending",
        Collected => "collected",
    }
}

string_enum! {
    /// What the route detail shows for a stop, derived from the transfers on the route.
    StopProgress ("stop progress") {
        Pending => "pending",
        Collected => "collected",
        Delivered => "delivered",
    }
}

string_enum! {
    ProtocolStatus ("protocol status") {
        Pending => "pending",
        Confirmed => "confirmed",
    }
}

string_enum! {
    MovementKind ("movement kind") {
        Entry => "entry",
        Exit => "exit",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parses_from_column_text() {
        assert_eq!("courier".parse::<Role>().unwrap(), Role::Courier);
        assert_eq!(Role::Operator.as_str(), "operator");

        let err = "motoboy".parse::<Role>().unwrap_err();
        assert_eq!(err.kind, "role");
        assert_eq!(err.to_string(), "unknown role: motoboy");
    }

    #[test]
    fn role_capabilities() {
        assert!(Role::Admin.is_staff());
        assert!(!Role::Operator.is_staff());
        assert!(Role::Operator.manages_logistics());
        assert!(!Role::Courier.manages_logistics());
        assert!(!Role::Store.manages_logistics());
        assert!(Role::Courier.can_confirm_protocols());
        assert!(!Role::Operator.can_confirm_protocols());
    }

    #[test]
    fn transfer_status_transitions() {
        assert!(TransferStatus::Pending.can_pick_up());
        assert!(!TransferStatus::InTransit.can_pick_up());
        assert!(!TransferStatus::Pending.can_receive());
        assert!(TransferStatus::InTransit.can_receive());
        assert!(!TransferStatus::Confirmed.can_receive());
        assert!(TransferStatus::Confirmed.is_final());
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&TransferStatus::InTransit).unwrap();
        assert_eq!(json, "\"in_transit\"");
        let size: LoadSize = serde_json::from_str("\"large\"").unwrap();
        assert_eq!(size, LoadSize::Large);
    }
}
