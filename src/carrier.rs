//! Carriers hold assemblies while they travel between stock, workstations and
//! transports. Where a carrier currently is belongs to an external service,
//! reached through [`CarrierLocator`].

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CarrierType {
    pub name: String,
}

impl CarrierType {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Carrier {
    pub id: String,
    pub carrier_type: CarrierType,
}

impl Carrier {
    pub fn new(carrier_type: CarrierType) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            carrier_type,
        }
    }
}

/// Physical place a carrier can be at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Location {
    Stock,
    Workstation(String),
    Transport(String),
}

impl Location {
    pub fn is_transport(&self) -> bool {
        matches!(self, Location::Transport(_))
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Stock => write!(f, "stock"),
            Location::Workstation(name) => write!(f, "workstation {name}"),
            Location::Transport(name) => write!(f, "transport {name}"),
        }
    }
}

/// Answers where a carrier currently is.
pub trait CarrierLocator {
    fn location(&self, carrier: &Carrier) -> Option<Location>;
}

/// Fixed carrier → location table, used by the CLI demo and tests.
#[derive(Debug, Default, Clone)]
pub struct StaticLocator {
    locations: HashMap<String, Location>,
}

impl StaticLocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn place(&mut self, carrier: &Carrier, location: Location) {
        self.locations.insert(carrier.id.clone(), location);
    }
}

impl CarrierLocator for StaticLocator {
    fn location(&self, carrier: &Carrier) -> Option<Location> {
        self.locations.get(&carrier.id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_locator_returns_placed_location() {
        let carrier = Carrier::new(CarrierType::new("tray"));
        let mut locator = StaticLocator::new();
        assert_eq!(locator.location(&carrier), None);

        locator.place(&carrier, Location::Transport("cart-1".into()));
        assert!(locator.location(&carrier).unwrap().is_transport());
    }

    #[test]
    fn location_display() {
        assert_eq!(Location::Stock.to_string(), "stock");
        assert_eq!(
            Location::Workstation("oven".into()).to_string(),
            "workstation oven"
        );
    }
}
