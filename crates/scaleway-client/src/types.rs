//! Region and zone identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A Scaleway region (e.g. `fr-par`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region(pub String);

/// A Scaleway availability zone (e.g. `fr-par-1`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Zone(pub String);

impl Region {
    /// All zones of this region. Regions unknown to the client are assumed
    /// to have a single zone.
    pub fn zones(&self) -> Vec<Zone> {
        let count = match self.0.as_str() {
            "fr-par" | "nl-ams" | "pl-waw" => 3,
            _ => 1,
        };

        (1..=count)
            .map(|n| Zone(format!("{}-{}", self.0, n)))
            .collect()
    }

    /// First zone of the region. Useful when no zone is provided but at
    /// least one is needed.
    pub fn default_zone(&self) -> Zone {
        Zone(format!("{}-1", self.0))
    }
}

impl Zone {
    /// Region this zone belongs to.
    pub fn region(&self) -> Region {
        match self.0.rsplit_once('-') {
            Some((region, _)) => Region(region.to_string()),
            None => Region(self.0.clone()),
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Region {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<&str> for Zone {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_region_has_three_zones() {
        let zones = Region::from("fr-par").zones();
        assert_eq!(
            zones,
            vec![
                Zone::from("fr-par-1"),
                Zone::from("fr-par-2"),
                Zone::from("fr-par-3")
            ]
        );
    }

    #[test]
    fn unknown_region_falls_back_to_single_zone() {
        assert_eq!(Region::from("xx-yyy").zones(), vec![Zone::from("xx-yyy-1")]);
    }

    #[test]
    fn zone_region_roundtrip() {
        assert_eq!(Zone::from("nl-ams-2").region(), Region::from("nl-ams"));
    }
}
