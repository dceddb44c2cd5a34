use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BookingMode {
    /// Bookable at any time.
    Free,
    /// Bookable only inside one of the resource's recurring slots.
    SlotOnly,
}

impl BookingMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::SlotOnly => "slotOnly",
        }
    }
}

impl Display for BookingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingMode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(Self::Free),
            "slotOnly" => Ok(Self::SlotOnly),
            other => Err(DomainError::UnknownBookingMode(other.to_owned())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub id: Uuid,
    pub name: String,
    /// The composite resource this one is a part of, e.g. the whole field
    /// for one of its halves.
    pub parent_id: Option<Uuid>,
    pub is_composite: bool,
    pub booking_mode: BookingMode,
}

/// All resources of a facility, indexed for composition lookups.
#[derive(Debug, Default, Clone)]
pub struct ResourceIndex {
    resources: HashMap<Uuid, Resource>,
    children: HashMap<Uuid, Vec<Uuid>>,
}

impl ResourceIndex {
    pub fn new(resources: impl IntoIterator<Item = Resource>) -> Self {
        let resources: HashMap<Uuid, Resource> = resources
            .into_iter()
            .map(|resource| (resource.id, resource))
            .collect();
        let mut children: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        for resource in resources.values() {
            if let Some(parent_id) = resource.parent_id {
                if resources.contains_key(&parent_id) {
                    children.entry(parent_id).or_default().push(resource.id);
                }
            }
        }
        for ids in children.values_mut() {
            ids.sort_unstable();
        }
        Self {
            resources,
            children,
        }
    }

    #[must_use]
    pub fn get(&self, id: Uuid) -> Option<&Resource> {
        self.resources.get(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// The composite this resource is part of. Parents that are not marked
    /// composite or are not indexed are ignored.
    #[must_use]
    pub fn parent(&self, id: Uuid) -> Option<&Resource> {
        self.get(id)
            .and_then(|resource| resource.parent_id)
            .and_then(|parent_id| self.get(parent_id))
            .filter(|parent| parent.is_composite)
    }

    pub fn children(&self, id: Uuid) -> impl Iterator<Item = &Resource> + '_ {
        let composite = self.get(id).is_some_and(|resource| resource.is_composite);
        self.children
            .get(&id)
            .filter(|_| composite)
            .into_iter()
            .flatten()
            .filter_map(|child_id| self.get(*child_id))
    }

    /// Every resource whose bookings keep `id` from being booked at the same
    /// time: the resource itself, the whole it belongs to and, for a
    /// composite, all of its parts. Sibling parts do not block each other.
    #[must_use]
    pub fn blocking_resources(&self, id: Uuid) -> Vec<Uuid> {
        if self.get(id).is_none() {
            return Vec::new();
        }
        let mut blocking = vec![id];
        blocking.extend(self.parent(id).map(|parent| parent.id));
        blocking.extend(self.children(id).map(|child| child.id));
        blocking
    }
}
