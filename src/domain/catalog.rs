//! Route catalog - static display metadata paired with synthesized geometries by index

use crate::domain::types::{RouteTier, TrafficLevel};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("route catalog is empty")]
    Empty,
    #[error("route catalog has {descriptors} descriptors but synthesis has {offsets} offsets")]
    LengthMismatch { descriptors: usize, offsets: usize },
    #[error("default route index {index} outside catalog of {len}")]
    DefaultOutOfRange { index: usize, len: usize },
}

/// Static record describing one route slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteDescriptor {
    pub label: String,
    pub duration_mins: u32,
    pub cost: u32,
    pub traffic: TrafficLevel,
    pub tier: RouteTier,
}

impl RouteDescriptor {
    /// "4h 15m", "50m"
    pub fn duration_label(&self) -> String {
        let hours = self.duration_mins / 60;
        let mins = self.duration_mins % 60;
        if hours == 0 {
            format!("{}m", mins)
        } else {
            format!("{}h {}m", hours, mins)
        }
    }
}

/// Fixed, ordered lookup from route index to descriptor
#[derive(Debug, Clone)]
pub struct RouteCatalog {
    descriptors: Vec<RouteDescriptor>,
    default_index: usize,
    currency_symbol: String,
}

impl Default for RouteCatalog {
    fn default() -> Self {
        Self {
            descriptors: default_descriptors(),
            default_index: 0,
            currency_symbol: "₹".to_string(),
        }
    }
}

pub fn default_descriptors() -> Vec<RouteDescriptor> {
    vec![
        RouteDescriptor {
            label: "Smartest".to_string(),
            duration_mins: 255,
            cost: 450,
            traffic: TrafficLevel::Low,
            tier: RouteTier::Smartest,
        },
        RouteDescriptor {
            label: "Fastest".to_string(),
            duration_mins: 230,
            cost: 650,
            traffic: TrafficLevel::Moderate,
            tier: RouteTier::Fastest,
        },
        RouteDescriptor {
            label: "Scenic".to_string(),
            duration_mins: 330,
            cost: 300,
            traffic: TrafficLevel::Low,
            tier: RouteTier::Scenic,
        },
    ]
}

impl RouteCatalog {
    pub fn new(
        descriptors: Vec<RouteDescriptor>,
        default_index: usize,
        currency_symbol: impl Into<String>,
    ) -> Result<Self, CatalogError> {
        if descriptors.is_empty() {
            return Err(CatalogError::Empty);
        }
        if default_index >= descriptors.len() {
            return Err(CatalogError::DefaultOutOfRange {
                index: default_index,
                len: descriptors.len(),
            });
        }
        Ok(Self { descriptors, default_index, currency_symbol: currency_symbol.into() })
    }

    /// Startup check that every synthesized geometry gets exactly one descriptor
    pub fn validate_against(&self, offset_count: usize) -> Result<(), CatalogError> {
        if self.descriptors.len() != offset_count {
            return Err(CatalogError::LengthMismatch {
                descriptors: self.descriptors.len(),
                offsets: offset_count,
            });
        }
        Ok(())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&RouteDescriptor> {
        self.descriptors.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &RouteDescriptor)> {
        self.descriptors.iter().enumerate()
    }

    pub fn default_index(&self) -> usize {
        self.default_index
    }

    pub fn cost_label(&self, descriptor: &RouteDescriptor) -> String {
        format!("{}{}", self.currency_symbol, descriptor.cost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog() {
        let catalog = RouteCatalog::default();
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.default_index(), 0);

        let smartest = catalog.get(0).unwrap();
        assert_eq!(smartest.label, "Smartest");
        assert_eq!(smartest.duration_label(), "4h 15m");
        assert_eq!(catalog.cost_label(smartest), "₹450");
        assert_eq!(smartest.traffic.as_str(), "Low");

        let fastest = catalog.get(1).unwrap();
        assert_eq!(fastest.duration_label(), "3h 50m");
        assert_eq!(fastest.traffic, TrafficLevel::Moderate);

        assert_eq!(catalog.get(2).unwrap().tier, RouteTier::Scenic);
        assert!(catalog.get(3).is_none());
    }

    #[test]
    fn test_validate_against_offsets() {
        let catalog = RouteCatalog::default();
        assert!(catalog.validate_against(3).is_ok());
        assert_eq!(
            catalog.validate_against(2),
            Err(CatalogError::LengthMismatch { descriptors: 3, offsets: 2 })
        );
    }

    #[test]
    fn test_new_rejects_bad_default() {
        assert_eq!(
            RouteCatalog::new(default_descriptors(), 3, "₹").unwrap_err(),
            CatalogError::DefaultOutOfRange { index: 3, len: 3 }
        );
        assert_eq!(RouteCatalog::new(vec![], 0, "₹").unwrap_err(), CatalogError::Empty);
    }

    #[test]
    fn test_duration_label_under_an_hour() {
        let mut d = default_descriptors().remove(0);
        d.duration_mins = 50;
        assert_eq!(d.duration_label(), "50m");
    }
}
