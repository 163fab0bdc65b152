use std::collections::BTreeSet;
use std::fs;

use compsched_core::datetime::DateLabeler;
use compsched_core::days::RepresentativeInstant;
use compsched_core::document::{load_competition, write_json_atomic};
use compsched_core::filter::Filter;
use compsched_core::{Timetable, TimetableOptions};
use serde_json::{Value, json};
use tempfile::tempdir;

fn options() -> TimetableOptions {
    TimetableOptions {
        labeler: DateLabeler::default().with_fallback(Some(chrono_tz::UTC)),
        representative: RepresentativeInstant::Earliest,
    }
}

fn activity(id: u64, name: &str, code: &str, start: &str, end: &str, children: Value) -> Value {
    json!({
        "id": id, "name": name, "activityCode": code,
        "startTime": start, "endTime": end, "childActivities": children
    })
}

fn world_open() -> Value {
    json!({
        "formatVersion": "1.0",
        "id": "PacificOpen2024",
        "name": "Pacific Open 2024",
        "schedule": {
            "startDate": "2024-03-02",
            "numberOfDays": 2,
            "venues": [
                { "id": 1, "name": "Atoll Hall", "timezone": "Pacific/Kiritimati", "rooms": [
                    { "id": 1, "name": "Main Stage", "color": "#304a96", "activities": [
                        activity(1, "3x3x3 Cube, Round 1", "333-r1",
                            "2024-03-01T23:50:00Z", "2024-03-02T01:00:00Z", json!([
                                activity(2, "3x3x3 Cube, Round 1, Group 1", "333-r1-g1",
                                    "2024-03-01T23:50:00Z", "2024-03-02T00:20:00Z", json!([])),
                                activity(3, "3x3x3 Cube, Round 1, Group 2", "333-r1-g2",
                                    "2024-03-02T00:20:00Z", "2024-03-02T01:00:00Z", json!([]))
                            ])),
                        activity(4, "Lunch", "other-lunch",
                            "2024-03-02T22:00:00Z", "2024-03-02T23:00:00Z", json!([]))
                    ]},
                    { "id": 2, "name": "Side Room", "activities": [
                        activity(5, "2x2x2 Cube, Round 1", "222-r1",
                            "2024-03-02T09:55:00Z", "2024-03-02T10:30:00Z", json!([]))
                    ]}
                ]}
            ]
        }
    })
}

fn materialize(doc: &Value) -> Timetable {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("wcif.json");
    fs::write(&path, doc.to_string()).expect("write wcif");
    let comp = load_competition(&path).expect("load competition");
    Timetable::materialize(&comp, &options())
}

#[test]
fn labels_follow_venue_local_date() {
    let timetable = materialize(&world_open());

    // 23:50Z on March 1 is 13:50 on March 2 at UTC+14.
    let first = timetable.activities().next().expect("first activity");
    assert_eq!(first.activity_id, 2);
    assert_eq!(first.day, "Saturday, March 2, 2024");
    assert_eq!(first.local_start, "13:50");
    assert_eq!(first.timezone, "Pacific/Kiritimati");

    assert_eq!(
        timetable.day_labels(),
        vec!["Saturday, March 2, 2024", "Sunday, March 3, 2024"]
    );
    // 09:55Z is 23:55 local, still Saturday.
    let saturday: Vec<u64> = timetable
        .activities_on("Saturday, March 2, 2024")
        .iter()
        .map(|activity| activity.activity_id)
        .collect();
    assert_eq!(saturday, vec![2, 3, 5]);
}

#[test]
fn every_leaf_appears_once_and_parents_never() {
    let timetable = materialize(&world_open());
    let ids: Vec<u64> = timetable.activities().map(|a| a.activity_id).collect();
    let unique: BTreeSet<u64> = ids.iter().copied().collect();
    assert_eq!(ids.len(), unique.len());
    assert_eq!(unique, BTreeSet::from([2, 3, 4, 5]));
}

#[test]
fn groups_take_their_round_room() {
    let timetable = materialize(&world_open());
    assert!(timetable.show_room());
    let group = timetable
        .activities()
        .find(|activity| activity.activity_id == 3)
        .expect("group 2");
    assert_eq!(group.room.as_ref().map(|room| room.name.as_str()), Some("Main Stage"));
    assert_eq!(group.venue.as_deref(), Some("Atoll Hall"));
    assert!(!group.timezone_fallback);
}

#[test]
fn repeated_materialization_is_stable() {
    let doc = world_open();
    let a = serde_json::to_value(materialize(&doc)).expect("serialize");
    let b = serde_json::to_value(materialize(&doc)).expect("serialize");
    assert_eq!(a, b);
}

#[test]
fn venue_without_timezone_uses_configured_fallback() {
    let doc = json!({
        "id": "Nowhere2024",
        "schedule": { "venues": [{ "id": 1, "name": "Tent", "timezone": "", "rooms": [
            { "id": 1, "name": "Only", "activities": [
                activity(1, "Open", "other-misc",
                    "2024-03-01T20:00:00Z", "2024-03-01T21:00:00Z", json!([]))
            ]}
        ]}]}
    });
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("wcif.json");
    fs::write(&path, doc.to_string()).expect("write wcif");
    let comp = load_competition(&path).expect("load");

    let tokyo = TimetableOptions {
        labeler: DateLabeler::default().with_fallback(Some(chrono_tz::Asia::Tokyo)),
        ..TimetableOptions::default()
    };
    let timetable = Timetable::materialize(&comp, &tokyo);
    assert!(!timetable.show_room());
    assert_eq!(timetable.day_labels(), vec!["Saturday, March 2, 2024"]);
    assert_eq!(timetable.activities().next().expect("open").local_start, "05:00");
}

#[test]
fn filter_and_export_round_out_the_flow() {
    let mut timetable = materialize(&world_open());
    let filter = Filter::parse(&["event:333".to_string()]).expect("filter");
    timetable.retain(|activity| filter.matches(activity));
    assert_eq!(timetable.day_labels(), vec!["Saturday, March 2, 2024"]);
    assert_eq!(timetable.activities().count(), 2);

    let temp = tempdir().expect("tempdir");
    let out = temp.path().join("timetable.json");
    write_json_atomic(&out, &timetable).expect("export");
    let exported: Value =
        serde_json::from_str(&fs::read_to_string(&out).expect("read")).expect("json");
    assert_eq!(exported["competition_id"], "PacificOpen2024");
    assert_eq!(exported["days"][0]["label"], "Saturday, March 2, 2024");
    assert_eq!(exported["days"][0]["activities"][1]["local_end"], "15:00");
}
