use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::datetime::parse_instant;

pub type VenueId = u64;
pub type RoomId = u64;
pub type ActivityId = u64;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Competition {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub schedule: CompetitionSchedule,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompetitionSchedule {
    #[serde(default)]
    pub start_date: Option<String>,

    #[serde(default)]
    pub number_of_days: Option<u32>,

    #[serde(default)]
    pub venues: Vec<Venue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Venue {
    pub id: VenueId,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub timezone: String,

    #[serde(default)]
    pub rooms: Vec<Room>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: RoomId,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub color: Option<String>,

    #[serde(default)]
    pub activities: Vec<Activity>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: ActivityId,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub activity_code: String,

    /// Raw ISO-8601 instant; parsed lazily so one bad value does not reject
    /// the whole document.
    #[serde(default)]
    pub start_time: String,

    #[serde(default)]
    pub end_time: String,

    #[serde(default)]
    pub child_activities: Vec<Activity>,
}

impl Competition {
    pub fn venues(&self) -> &[Venue] {
        &self.schedule.venues
    }

    pub fn rooms(&self) -> impl Iterator<Item = (&Venue, &Room)> {
        self.schedule
            .venues
            .iter()
            .flat_map(|venue| venue.rooms.iter().map(move |room| (venue, room)))
    }

    pub fn room(&self, id: RoomId) -> Option<&Room> {
        self.rooms()
            .find(|(_, room)| room.id == id)
            .map(|(_, room)| room)
    }
}

impl Activity {
    pub fn is_leaf(&self) -> bool {
        self.child_activities.is_empty()
    }

    pub fn start(&self) -> Option<DateTime<Utc>> {
        parse_instant(&self.start_time)
    }

    pub fn end(&self) -> Option<DateTime<Utc>> {
        parse_instant(&self.end_time)
    }
}
