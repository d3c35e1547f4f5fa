//! Categorized store of navigation facilities with nearest-match queries.
//!
//! One backend's facility-loaded feed populates the index; many consumers
//! query it concurrently. Writes are category-at-a-time: `populate` builds
//! the replacement list off to the side and swaps it in atomically, so a
//! reader never observes a partially rebuilt category.

mod geo;

pub use geo::haversine_nm;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use parking_lot::RwLock;
use tracing::debug;

/// Facility categories, each with its own default search threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FacilityCategory {
    Airport,
    Waypoint,
    Vor,
    Ndb,
}

impl FacilityCategory {
    pub const ALL: [FacilityCategory; 4] = [
        FacilityCategory::Airport,
        FacilityCategory::Waypoint,
        FacilityCategory::Vor,
        FacilityCategory::Ndb,
    ];

    /// Default nearest-match threshold in nautical miles.
    ///
    /// Airports and waypoints are dense, so the default is tight; VOR and
    /// NDB stations are sparse and get a wider net. Callers may override
    /// per query.
    pub fn default_threshold_nm(&self) -> f64 {
        match self {
            FacilityCategory::Airport | FacilityCategory::Waypoint => 10.0,
            FacilityCategory::Vor | FacilityCategory::Ndb => 40.0,
        }
    }
}

impl fmt::Display for FacilityCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Airport => write!(f, "airport"),
            Self::Waypoint => write!(f, "waypoint"),
            Self::Vor => write!(f, "vor"),
            Self::Ndb => write!(f, "ndb"),
        }
    }
}

impl FromStr for FacilityCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "airport" => Ok(Self::Airport),
            "waypoint" => Ok(Self::Waypoint),
            "vor" => Ok(Self::Vor),
            "ndb" => Ok(Self::Ndb),
            other => Err(format!("unknown facility category: {other}")),
        }
    }
}

/// One immutable navigation reference point.
#[derive(Debug, Clone, PartialEq)]
pub struct Facility {
    pub category: FacilityCategory,
    pub identifier: String,
    pub region: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// Categorized facility store with nearest-match queries.
pub struct FacilityIndex {
    categories: RwLock<HashMap<FacilityCategory, Vec<Facility>>>,
}

impl FacilityIndex {
    pub fn new() -> Self {
        Self {
            categories: RwLock::new(HashMap::new()),
        }
    }

    /// Empty one category. A `clear` followed by zero `add`s behaves
    /// identically to never having added anything.
    pub fn clear(&self, category: FacilityCategory) {
        self.categories.write().remove(&category);
    }

    /// Append one facility to its category.
    pub fn add(
        &self,
        category: FacilityCategory,
        identifier: impl Into<String>,
        region: impl Into<String>,
        latitude: f64,
        longitude: f64,
    ) {
        let facility = Facility {
            category,
            identifier: identifier.into(),
            region: region.into(),
            latitude,
            longitude,
        };
        self.categories
            .write()
            .entry(category)
            .or_default()
            .push(facility);
    }

    /// Replace one category wholesale.
    ///
    /// The replacement list is built before the write lock is taken, so
    /// readers see either the old category or the new one, never a partial
    /// rebuild. This is the refresh-feed path.
    pub fn populate(
        &self,
        category: FacilityCategory,
        facilities: impl IntoIterator<Item = Facility>,
    ) {
        let fresh: Vec<Facility> = facilities
            .into_iter()
            .filter(|facility| facility.category == category)
            .collect();
        debug!(category = %category, count = fresh.len(), "Facility category replaced");
        self.categories.write().insert(category, fresh);
    }

    /// Apply a mixed facility batch from the refresh feed: each category
    /// mentioned in the batch is replaced wholesale.
    pub fn refresh_from(&self, facilities: impl IntoIterator<Item = Facility>) {
        let mut grouped: HashMap<FacilityCategory, Vec<Facility>> = HashMap::new();
        for facility in facilities {
            grouped.entry(facility.category).or_default().push(facility);
        }
        for (category, batch) in grouped {
            self.populate(category, batch);
        }
    }

    /// Number of facilities in one category.
    pub fn len(&self, category: FacilityCategory) -> usize {
        self.categories
            .read()
            .get(&category)
            .map_or(0, Vec::len)
    }

    pub fn is_empty(&self, category: FacilityCategory) -> bool {
        self.len(category) == 0
    }

    /// Identifier of the closest facility in a category within
    /// `max_distance_nm`, or `None` if the category is empty or the nearest
    /// candidate is beyond the threshold.
    ///
    /// Stable linear scan: on an exact distance tie the first-inserted
    /// facility wins.
    pub fn find_nearest(
        &self,
        category: FacilityCategory,
        latitude: f64,
        longitude: f64,
        max_distance_nm: f64,
    ) -> Option<String> {
        let categories = self.categories.read();
        let facilities = categories.get(&category)?;

        let mut best: Option<(&Facility, f64)> = None;
        for facility in facilities {
            let distance = haversine_nm(latitude, longitude, facility.latitude, facility.longitude);
            // Strict less-than keeps the first-inserted facility on ties.
            if best.map_or(true, |(_, best_distance)| distance < best_distance) {
                best = Some((facility, distance));
            }
        }

        best.and_then(|(facility, distance)| {
            (distance <= max_distance_nm).then(|| facility.identifier.clone())
        })
    }

    /// [`find_nearest`](Self::find_nearest) with the category's default
    /// threshold.
    pub fn find_nearest_default(
        &self,
        category: FacilityCategory,
        latitude: f64,
        longitude: f64,
    ) -> Option<String> {
        self.find_nearest(category, latitude, longitude, category.default_threshold_nm())
    }
}

impl Default for FacilityIndex {
    fn default() -> Self {
        Self::new()
    }
}
