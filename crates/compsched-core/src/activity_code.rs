use std::fmt;

use regex::Regex;

/// Parsed WCIF activity code, e.g. `333-r1-g2` or `other-lunch`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityCode {
    Event {
        event_id: String,
        round: Option<u32>,
        group: Option<u32>,
        attempt: Option<u32>,
    },
    Other(String),
}

impl ActivityCode {
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if let Some(kind) = raw.strip_prefix("other-") {
            if kind.is_empty() {
                return None;
            }
            return Some(Self::Other(kind.to_string()));
        }

        let re = Regex::new(
            r"^(?P<event>[a-z0-9]+)(?:-r(?P<round>\d+))?(?:-g(?P<group>\d+))?(?:-a(?P<attempt>\d+))?$",
        )
        .ok()?;
        let caps = re.captures(raw)?;
        let number = |name: &str| {
            caps.name(name)
                .and_then(|m| m.as_str().parse::<u32>().ok())
        };

        Some(Self::Event {
            event_id: caps.name("event")?.as_str().to_string(),
            round: number("round"),
            group: number("group"),
            attempt: number("attempt"),
        })
    }

    pub fn event_id(&self) -> Option<&str> {
        match self {
            Self::Event { event_id, .. } => Some(event_id),
            Self::Other(_) => None,
        }
    }

    pub fn round(&self) -> Option<u32> {
        match self {
            Self::Event { round, .. } => *round,
            Self::Other(_) => None,
        }
    }

    pub fn group(&self) -> Option<u32> {
        match self {
            Self::Event { group, .. } => *group,
            Self::Other(_) => None,
        }
    }

    pub fn attempt(&self) -> Option<u32> {
        match self {
            Self::Event { attempt, .. } => *attempt,
            Self::Other(_) => None,
        }
    }
}

impl fmt::Display for ActivityCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Other(kind) => write!(f, "other-{kind}"),
            Self::Event {
                event_id,
                round,
                group,
                attempt,
            } => {
                write!(f, "{event_id}")?;
                if let Some(round) = round {
                    write!(f, "-r{round}")?;
                }
                if let Some(group) = group {
                    write!(f, "-g{group}")?;
                }
                if let Some(attempt) = attempt {
                    write!(f, "-a{attempt}")?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ActivityCode;

    #[test]
    fn parses_group_codes() {
        let code = ActivityCode::parse("333-r1-g2").expect("group code");
        assert_eq!(code.event_id(), Some("333"));
        assert_eq!(code.round(), Some(1));
        assert_eq!(code.group(), Some(2));
        assert_eq!(code.attempt(), None);
        assert_eq!(code.to_string(), "333-r1-g2");
    }

    #[test]
    fn parses_attempt_codes() {
        let code = ActivityCode::parse("333fm-r1-a2").expect("attempt code");
        assert_eq!(code.event_id(), Some("333fm"));
        assert_eq!(code.group(), None);
        assert_eq!(code.attempt(), Some(2));
    }

    #[test]
    fn parses_other_activities() {
        let code = ActivityCode::parse("other-lunch").expect("other code");
        assert_eq!(code, ActivityCode::Other("lunch".to_string()));
        assert_eq!(code.event_id(), None);
        assert!(ActivityCode::parse("other-").is_none());
    }

    #[test]
    fn rejects_garbage() {
        assert!(ActivityCode::parse("").is_none());
        assert!(ActivityCode::parse("333 r1").is_none());
        assert!(ActivityCode::parse("333-rX").is_none());
    }
}
