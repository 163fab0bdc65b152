use std::collections::HashMap;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::datetime::{DateLabeler, Zone};

/// Grouping label of one leaf plus the raw instant used to order days.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayKey {
    pub label: String,
    pub instant: Option<DateTime<Utc>>,
}

impl DayKey {
    pub fn new(labeler: &DateLabeler, instant: Option<DateTime<Utc>>, zone: Zone) -> Self {
        Self {
            label: labeler.date_label(instant, zone),
            instant,
        }
    }
}

/// Orders valid instants ascending and invalid ones last.
pub fn instant_order(instant: Option<DateTime<Utc>>) -> (bool, Option<DateTime<Utc>>) {
    (instant.is_none(), instant)
}

/// Which instant stands for a day label when days are ordered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RepresentativeInstant {
    /// Minimum instant among every activity sharing the label.
    #[default]
    Earliest,
    /// Instant of the first activity seen with the label, in flattener order.
    FirstSeen,
}

impl FromStr for RepresentativeInstant {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "earliest" | "min" | "minimum" => Ok(Self::Earliest),
            "first" | "first-seen" | "firstseen" => Ok(Self::FirstSeen),
            other => Err(anyhow!(
                "invalid day.representative setting: {other} (expected earliest or first)"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DaySlot {
    pub label: String,
    pub representative: Option<DateTime<Utc>>,
}

/// Distinct labels ordered by their representative instant. Equal instants
/// keep first-seen order.
#[tracing::instrument(skip(keys))]
pub fn build_day_sequence<'a, I>(keys: I, policy: RepresentativeInstant) -> Vec<DaySlot>
where
    I: IntoIterator<Item = &'a DayKey>,
{
    let mut slots: Vec<DaySlot> = Vec::new();
    let mut positions: HashMap<&'a str, usize> = HashMap::new();

    for key in keys {
        match positions.get(key.label.as_str()).copied() {
            None => {
                positions.insert(key.label.as_str(), slots.len());
                slots.push(DaySlot {
                    label: key.label.clone(),
                    representative: key.instant,
                });
            }
            Some(idx) => {
                let slot = &mut slots[idx];
                if policy == RepresentativeInstant::Earliest
                    && instant_order(key.instant) < instant_order(slot.representative)
                {
                    slot.representative = key.instant;
                }
            }
        }
    }

    slots.sort_by_key(|slot| instant_order(slot.representative));
    debug!(days = slots.len(), "built day sequence");
    slots
}
