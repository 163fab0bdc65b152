use std::collections::HashMap;

use tracing::{debug, warn};

use crate::datetime::{Zone, parse_timezone};
use crate::wcif::{Competition, RoomId, VenueId};

#[derive(Debug, Clone)]
struct VenueZone {
    id: VenueId,
    name: String,
    zone: Zone,
}

/// Result of resolving a leaf's timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedZone {
    pub zone: Zone,
    /// Position of the venue in document order, if any venue applied.
    pub venue: Option<usize>,
    /// The owning venue was not found and the first venue was used instead.
    pub fallback: bool,
}

/// Room → venue index. Rooms carry no back reference to their venue, so
/// this is built once per document and consulted per leaf.
#[derive(Debug, Clone, Default)]
pub struct VenueIndex {
    venues: Vec<VenueZone>,
    by_room: HashMap<RoomId, usize>,
}

impl VenueIndex {
    #[tracing::instrument(skip_all, fields(competition = %competition.id))]
    pub fn build(competition: &Competition) -> Self {
        let mut venues = Vec::with_capacity(competition.venues().len());
        let mut by_room = HashMap::new();

        for (idx, venue) in competition.venues().iter().enumerate() {
            let source = format!("venue:{}", venue.id);
            let zone = match parse_timezone(&venue.timezone, &source) {
                Some(tz) => Zone::Named(tz),
                None => {
                    warn!(
                        venue = venue.id,
                        timezone = %venue.timezone,
                        "venue has no usable timezone"
                    );
                    Zone::Unspecified
                }
            };

            for room in &venue.rooms {
                by_room.entry(room.id).or_insert(idx);
            }

            venues.push(VenueZone {
                id: venue.id,
                name: venue.name.clone(),
                zone,
            });
        }

        debug!(
            venues = venues.len(),
            rooms = by_room.len(),
            "built venue index"
        );
        Self { venues, by_room }
    }

    pub fn resolve(&self, room: Option<RoomId>) -> ResolvedZone {
        if let Some(idx) = room.and_then(|id| self.by_room.get(&id).copied()) {
            return ResolvedZone {
                zone: self.venues[idx].zone,
                venue: Some(idx),
                fallback: false,
            };
        }

        match self.venues.first() {
            Some(first) => {
                debug!(room = ?room, venue = first.id, "room has no owning venue; using first venue");
                ResolvedZone {
                    zone: first.zone,
                    venue: Some(0),
                    fallback: true,
                }
            }
            None => ResolvedZone {
                zone: Zone::Unspecified,
                venue: None,
                fallback: true,
            },
        }
    }

    pub fn venue_name(&self, idx: usize) -> Option<&str> {
        self.venues.get(idx).map(|venue| venue.name.as_str())
    }
}
