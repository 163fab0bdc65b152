use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::activity_code::ActivityCode;
use crate::datetime::{DateLabeler, Zone};
use crate::days::{DayKey, RepresentativeInstant, build_day_sequence, instant_order};
use crate::tree::{ActivityTree, LeafActivity};
use crate::venue::VenueIndex;
use crate::wcif::{ActivityId, Competition, RoomId};

#[derive(Debug, Clone, Default)]
pub struct TimetableOptions {
    pub labeler: DateLabeler,
    pub representative: RepresentativeInstant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomRef {
    pub id: RoomId,
    pub name: String,
    pub color: Option<String>,
    pub venue: String,
}

/// A leaf activity projected for display.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduledActivity {
    pub activity_id: ActivityId,
    pub name: String,
    pub activity_code: String,
    #[serde(skip)]
    pub code: Option<ActivityCode>,
    pub start_time: String,
    pub end_time: String,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub timezone: String,
    #[serde(skip)]
    pub zone: Zone,
    pub timezone_fallback: bool,
    pub day: String,
    pub local_start: String,
    pub local_end: String,
    pub room: Option<RoomRef>,
    pub venue: Option<String>,
    #[serde(skip)]
    ordinal: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DayBucket {
    pub label: String,
    pub representative: Option<DateTime<Utc>>,
    pub activities: Vec<ScheduledActivity>,
}

#[derive(Debug, Clone)]
pub struct RoomAgenda<'a> {
    /// `None` collects activities without a known room.
    pub room: Option<&'a RoomRef>,
    pub activities: Vec<&'a ScheduledActivity>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Timetable {
    pub competition_id: String,
    pub competition_name: String,
    pub show_room: bool,
    pub days: Vec<DayBucket>,
    #[serde(skip)]
    rooms: Vec<RoomRef>,
}

/// Nearest room on the leaf's chain: own room, then parent's, then
/// further up.
pub fn effective_room(tree: &ActivityTree, leaf: &LeafActivity) -> Option<RoomId> {
    std::iter::once(leaf.node)
        .chain(leaf.ancestors.iter().copied())
        .find_map(|id| tree.node(id).room)
}

/// Room labels only matter when the competition has more than one room.
pub fn show_room(competition: &Competition) -> bool {
    competition.rooms().nth(1).is_some()
}

fn bucket_order(a: &ScheduledActivity, b: &ScheduledActivity) -> Ordering {
    a.day
        .cmp(&b.day)
        .then_with(|| time_order(a, b))
}

fn time_order(a: &ScheduledActivity, b: &ScheduledActivity) -> Ordering {
    instant_order(a.start)
        .cmp(&instant_order(b.start))
        .then_with(|| instant_order(a.end).cmp(&instant_order(b.end)))
        .then_with(|| a.ordinal.cmp(&b.ordinal))
}

impl Timetable {
    #[tracing::instrument(skip_all, fields(competition = %competition.id))]
    pub fn materialize(competition: &Competition, options: &TimetableOptions) -> Self {
        let tree = ActivityTree::from_competition(competition);
        let venues = VenueIndex::build(competition);

        let mut rooms: Vec<RoomRef> = Vec::new();
        let mut room_lookup: HashMap<RoomId, usize> = HashMap::new();
        for (venue, room) in competition.rooms() {
            room_lookup.entry(room.id).or_insert_with(|| {
                rooms.push(RoomRef {
                    id: room.id,
                    name: room.name.clone(),
                    color: room.color.clone(),
                    venue: venue.name.clone(),
                });
                rooms.len() - 1
            });
        }

        let leaves = tree.leaves();
        let mut keys = Vec::with_capacity(leaves.len());
        let mut entries = Vec::with_capacity(leaves.len());

        for (ordinal, leaf) in leaves.iter().enumerate() {
            let node = tree.node(leaf.node);
            let room_id = effective_room(&tree, leaf);
            let resolved = venues.resolve(room_id);
            let key = DayKey::new(&options.labeler, node.start, resolved.zone);

            entries.push(ScheduledActivity {
                activity_id: node.activity_id,
                name: node.name.clone(),
                activity_code: node.activity_code.clone(),
                code: ActivityCode::parse(&node.activity_code),
                start_time: node.start_time.clone(),
                end_time: node.end_time.clone(),
                start: node.start,
                end: node.end,
                timezone: resolved.zone.name().to_string(),
                zone: resolved.zone,
                timezone_fallback: resolved.fallback,
                day: key.label.clone(),
                local_start: options.labeler.clock(node.start, resolved.zone),
                local_end: options.labeler.clock(node.end, resolved.zone),
                room: room_id
                    .and_then(|id| room_lookup.get(&id))
                    .map(|&idx| rooms[idx].clone()),
                venue: resolved
                    .venue
                    .and_then(|idx| venues.venue_name(idx))
                    .map(ToString::to_string),
                ordinal,
            });
            keys.push(key);
        }

        let slots = build_day_sequence(&keys, options.representative);
        let positions: HashMap<String, usize> = slots
            .iter()
            .enumerate()
            .map(|(idx, slot)| (slot.label.clone(), idx))
            .collect();
        let mut days: Vec<DayBucket> = slots
            .into_iter()
            .map(|slot| DayBucket {
                label: slot.label,
                representative: slot.representative,
                activities: Vec::new(),
            })
            .collect();

        for entry in entries {
            if let Some(&idx) = positions.get(&entry.day) {
                days[idx].activities.push(entry);
            }
        }
        for day in &mut days {
            day.activities.sort_by(bucket_order);
        }

        let show_room = show_room(competition);
        info!(
            days = days.len(),
            activities = leaves.len(),
            show_room,
            "materialized timetable"
        );

        Self {
            competition_id: competition.id.clone(),
            competition_name: competition.name.clone(),
            show_room,
            days,
            rooms,
        }
    }

    pub fn show_room(&self) -> bool {
        self.show_room
    }

    pub fn days(&self) -> &[DayBucket] {
        &self.days
    }

    pub fn day_labels(&self) -> Vec<&str> {
        self.days.iter().map(|day| day.label.as_str()).collect()
    }

    pub fn day(&self, label: &str) -> Option<&DayBucket> {
        self.days.iter().find(|day| day.label == label)
    }

    /// Leaves whose label equals `label`, in start-time order.
    pub fn activities_on(&self, label: &str) -> &[ScheduledActivity] {
        self.day(label)
            .map(|day| day.activities.as_slice())
            .unwrap_or_default()
    }

    pub fn activities(&self) -> impl Iterator<Item = &ScheduledActivity> {
        self.days.iter().flat_map(|day| day.activities.iter())
    }

    /// Leaves grouped by effective room in document room order; activities
    /// with no known room come last.
    pub fn by_room(&self) -> Vec<RoomAgenda<'_>> {
        let mut out: Vec<RoomAgenda<'_>> = self
            .rooms
            .iter()
            .map(|room| RoomAgenda {
                room: Some(room),
                activities: Vec::new(),
            })
            .collect();
        let positions: HashMap<RoomId, usize> = self
            .rooms
            .iter()
            .enumerate()
            .map(|(idx, room)| (room.id, idx))
            .collect();
        let mut unassigned = Vec::new();

        for activity in self.activities() {
            match activity.room.as_ref().and_then(|room| positions.get(&room.id)) {
                Some(&idx) => out[idx].activities.push(activity),
                None => unassigned.push(activity),
            }
        }

        for agenda in &mut out {
            agenda.activities.sort_by(|a, b| time_order(a, b));
        }
        if !unassigned.is_empty() {
            unassigned.sort_by(|a, b| time_order(a, b));
            out.push(RoomAgenda {
                room: None,
                activities: unassigned,
            });
        }
        out
    }

    /// Keeps matching activities and drops days left empty.
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&ScheduledActivity) -> bool,
    {
        let before = self.activities().count();
        for day in &mut self.days {
            day.activities.retain(|activity| keep(activity));
        }
        self.days.retain(|day| !day.activities.is_empty());
        debug!(
            before,
            after = self.activities().count(),
            "filtered timetable"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use serde_json::{Value, json};

    use super::{Timetable, TimetableOptions, effective_room, show_room};
    use crate::datetime::DateLabeler;
    use crate::days::RepresentativeInstant;
    use crate::tree::ActivityTree;
    use crate::wcif::{Activity, Competition};

    fn options() -> TimetableOptions {
        TimetableOptions {
            labeler: DateLabeler::default().with_fallback(Some(chrono_tz::UTC)),
            representative: RepresentativeInstant::Earliest,
        }
    }

    fn leaf(id: u64, name: &str, start: &str, end: &str) -> Value {
        json!({
            "id": id, "name": name, "activityCode": "other-misc",
            "startTime": start, "endTime": end, "childActivities": []
        })
    }

    fn competition(venues: Value) -> Competition {
        serde_json::from_value(json!({
            "id": "Test2024",
            "name": "Test 2024",
            "schedule": { "venues": venues }
        }))
        .expect("valid wcif")
    }

    fn two_day_event() -> Competition {
        competition(json!([{
            "id": 1, "name": "Hall", "timezone": "America/New_York",
            "rooms": [
                { "id": 1, "name": "Red", "activities": [
                    { "id": 10, "name": "3x3 R1", "activityCode": "333-r1",
                      "startTime": "2024-03-02T14:00:00Z", "endTime": "2024-03-02T15:00:00Z",
                      "childActivities": [
                        { "id": 12, "name": "3x3 R1 G2", "activityCode": "333-r1-g2",
                          "startTime": "2024-03-02T14:30:00Z", "endTime": "2024-03-02T15:00:00Z",
                          "childActivities": [] },
                        { "id": 11, "name": "3x3 R1 G1", "activityCode": "333-r1-g1",
                          "startTime": "2024-03-02T14:00:00Z", "endTime": "2024-03-02T14:30:00Z",
                          "childActivities": [] }
                    ]},
                    leaf(20, "Late session", "2024-03-03T04:30:00Z", "2024-03-03T04:55:00Z"),
                    leaf(30, "Sunday finals", "2024-03-03T15:00:00Z", "2024-03-03T16:00:00Z")
                ]},
                { "id": 2, "name": "Blue", "activities": [] }
            ]
        }]))
    }

    #[test]
    fn buckets_by_local_date_in_start_order() {
        let timetable = Timetable::materialize(&two_day_event(), &options());
        assert_eq!(
            timetable.day_labels(),
            vec!["Saturday, March 2, 2024", "Sunday, March 3, 2024"]
        );

        let saturday: Vec<u64> = timetable
            .activities_on("Saturday, March 2, 2024")
            .iter()
            .map(|activity| activity.activity_id)
            .collect();
        // 04:30Z on March 3 is 23:30 on March 2 in New York.
        assert_eq!(saturday, vec![11, 12, 20]);

        let late = &timetable.activities_on("Saturday, March 2, 2024")[2];
        assert_eq!(late.local_start, "23:30");
        assert_eq!(late.timezone, "America/New_York");
        assert!(!late.timezone_fallback);
        assert!(timetable.activities_on("Monday, March 4, 2024").is_empty());
    }

    #[test]
    fn every_leaf_lands_in_exactly_one_bucket() {
        let comp = two_day_event();
        let timetable = Timetable::materialize(&comp, &options());
        let tree = ActivityTree::from_competition(&comp);

        let expected: BTreeSet<u64> = tree
            .leaves()
            .iter()
            .map(|leaf| tree.node(leaf.node).activity_id)
            .collect();
        let seen: Vec<u64> = timetable
            .activities()
            .map(|activity| activity.activity_id)
            .collect();
        assert_eq!(seen.len(), expected.len());
        assert_eq!(seen.into_iter().collect::<BTreeSet<_>>(), expected);
    }

    #[test]
    fn materialize_is_idempotent() {
        let comp = two_day_event();
        let first = Timetable::materialize(&comp, &options());
        let second = Timetable::materialize(&comp, &options());
        assert_eq!(first.day_labels(), second.day_labels());
        for label in first.day_labels() {
            let a: Vec<u64> = first.activities_on(label).iter().map(|x| x.activity_id).collect();
            let b: Vec<u64> = second.activities_on(label).iter().map(|x| x.activity_id).collect();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn room_visibility_counts_empty_rooms() {
        assert!(show_room(&two_day_event()));

        let single = competition(json!([{
            "id": 1, "timezone": "UTC",
            "rooms": [{ "id": 1, "name": "Only", "activities": [
                leaf(1, "Open", "2024-03-02T09:00:00Z", "2024-03-02T10:00:00Z")
            ]}]
        }]));
        assert!(!show_room(&single));
        assert!(!Timetable::materialize(&single, &options()).show_room());
    }

    #[test]
    fn effective_room_walks_to_parent() {
        let mut tree = ActivityTree::default();
        let parent_activity = Activity {
            id: 1,
            name: "Round".to_string(),
            activity_code: "333-r1".to_string(),
            start_time: "2024-03-02T09:00:00Z".to_string(),
            end_time: "2024-03-02T10:00:00Z".to_string(),
            child_activities: vec![],
        };
        let mut child_activity = parent_activity.clone();
        child_activity.id = 2;

        let top = tree.insert(None, Some(42), &parent_activity).expect("top");
        let round = tree.insert(Some(top), Some(7), &parent_activity).expect("round");
        tree.insert(Some(round), None, &child_activity).expect("group");

        let leaves = tree.leaves();
        assert_eq!(leaves.len(), 1);
        assert_eq!(effective_room(&tree, &leaves[0]), Some(7));
    }

    #[test]
    fn no_venues_still_produces_days() {
        let comp = Competition::default();
        let timetable = Timetable::materialize(&comp, &options());
        assert!(timetable.days().is_empty());
        assert!(timetable.by_room().is_empty());
    }

    #[test]
    fn by_room_groups_in_document_room_order() {
        let comp = competition(json!([{
            "id": 1, "name": "Hall", "timezone": "Europe/Paris",
            "rooms": [
                { "id": 1, "name": "Main", "activities": [
                    leaf(2, "Later", "2024-03-02T12:00:00Z", "2024-03-02T13:00:00Z"),
                    leaf(1, "Earlier", "2024-03-02T08:00:00Z", "2024-03-02T09:00:00Z")
                ]},
                { "id": 2, "name": "Side", "activities": [
                    leaf(3, "Side event", "2024-03-03T08:00:00Z", "2024-03-03T09:00:00Z")
                ]}
            ]
        }]));

        let timetable = Timetable::materialize(&comp, &options());
        let agenda = timetable.by_room();
        assert_eq!(agenda.len(), 2);
        assert_eq!(agenda[0].room.map(|room| room.name.as_str()), Some("Main"));
        let main: Vec<u64> = agenda[0].activities.iter().map(|a| a.activity_id).collect();
        assert_eq!(main, vec![1, 2]);
        assert_eq!(agenda[1].activities[0].room.as_ref().map(|r| r.venue.as_str()), Some("Hall"));
    }

    #[test]
    fn retain_drops_emptied_days() {
        let mut timetable = Timetable::materialize(&two_day_event(), &options());
        timetable.retain(|activity| activity.activity_id != 30);
        assert_eq!(timetable.day_labels(), vec!["Saturday, March 2, 2024"]);
    }

    #[test]
    fn invalid_start_lands_in_invalid_bucket_last() {
        let comp = competition(json!([{
            "id": 1, "timezone": "UTC",
            "rooms": [{ "id": 1, "name": "A", "activities": [
                leaf(1, "Broken", "garbage", "2024-03-02T10:00:00Z"),
                leaf(2, "Fine", "2024-03-02T09:00:00Z", "2024-03-02T10:00:00Z")
            ]}]
        }]));
        let timetable = Timetable::materialize(&comp, &options());
        assert_eq!(
            timetable.day_labels(),
            vec!["Saturday, March 2, 2024", "Invalid Date"]
        );
        assert_eq!(timetable.activities_on("Invalid Date")[0].local_start, "Invalid Date");
    }

    #[test]
    fn export_serializes_days_and_rooms() {
        let timetable = Timetable::materialize(&two_day_event(), &options());
        let value = serde_json::to_value(&timetable).expect("serialize");
        assert_eq!(value["competition_id"], "Test2024");
        assert_eq!(value["show_room"], true);
        assert_eq!(value["days"][0]["activities"][0]["room"]["name"], "Red");
        assert!(value["days"][0]["activities"][0].get("ordinal").is_none());
    }
}
