use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::timetable::{DayBucket, ScheduledActivity, Timetable};

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let wanted = match cfg.get("color") {
            None => true,
            Some(raw) => cfg
                .get_bool("color")
                .ok_or_else(|| anyhow!("invalid color setting: {raw}"))?,
        };

        Ok(Self {
            color: wanted && io::stdout().is_terminal(),
        })
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    #[tracing::instrument(skip(self, timetable))]
    pub fn print_timetable(&mut self, timetable: &Timetable) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        self.write_timetable(&mut out, timetable)
    }

    #[tracing::instrument(skip(self, timetable, day), fields(day = %day.label))]
    pub fn print_day(&mut self, timetable: &Timetable, day: &DayBucket) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        self.write_day(&mut out, timetable.show_room(), day)
    }

    #[tracing::instrument(skip(self, timetable))]
    pub fn print_day_labels(&mut self, timetable: &Timetable) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        for label in timetable.day_labels() {
            writeln!(out, "{label}")?;
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, timetable))]
    pub fn print_rooms(&mut self, timetable: &Timetable) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        self.write_rooms(&mut out, timetable)
    }

    pub fn write_timetable<W: Write>(
        &self,
        out: &mut W,
        timetable: &Timetable,
    ) -> anyhow::Result<()> {
        if timetable.days().is_empty() {
            writeln!(out, "No activities scheduled.")?;
            return Ok(());
        }

        for (idx, day) in timetable.days().iter().enumerate() {
            if idx > 0 {
                writeln!(out)?;
            }
            self.write_day(out, timetable.show_room(), day)?;
        }
        Ok(())
    }

    pub fn write_day<W: Write>(
        &self,
        out: &mut W,
        show_room: bool,
        day: &DayBucket,
    ) -> anyhow::Result<()> {
        writeln!(out, "{}", self.paint(&day.label, "1"))?;

        let mut headers = vec!["Start".to_string(), "End".to_string(), "Activity".to_string()];
        if show_room {
            headers.push("Room".to_string());
        }

        let rows = day
            .activities
            .iter()
            .map(|activity| {
                let mut row = self.time_cells(activity);
                row.push(activity.name.clone());
                if show_room {
                    row.push(room_cell(activity));
                }
                row
            })
            .collect();

        write_table(out, headers, rows)
    }

    pub fn write_rooms<W: Write>(&self, out: &mut W, timetable: &Timetable) -> anyhow::Result<()> {
        for (idx, agenda) in timetable.by_room().iter().enumerate() {
            if idx > 0 {
                writeln!(out)?;
            }
            let title = match agenda.room {
                Some(room) if room.venue.is_empty() => room.name.clone(),
                Some(room) => format!("{} ({})", room.name, room.venue),
                None => "Unassigned".to_string(),
            };
            writeln!(out, "{}", self.paint(&title, "1"))?;

            if agenda.activities.is_empty() {
                writeln!(out, "  no activities")?;
                continue;
            }

            let headers = vec![
                "Day".to_string(),
                "Start".to_string(),
                "End".to_string(),
                "Activity".to_string(),
            ];
            let rows = agenda
                .activities
                .iter()
                .map(|activity| {
                    let mut row = vec![activity.day.clone()];
                    row.extend(self.time_cells(activity));
                    row.push(activity.name.clone());
                    row
                })
                .collect();
            write_table(&mut *out, headers, rows)?;
        }
        Ok(())
    }

    fn time_cells(&self, activity: &ScheduledActivity) -> Vec<String> {
        vec![
            self.paint(&activity.local_start, "33"),
            activity.local_end.clone(),
        ]
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn room_cell(activity: &ScheduledActivity) -> String {
    activity
        .room
        .as_ref()
        .map(|room| room.name.clone())
        .unwrap_or_default()
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for idx in 0..column_count {
            let cell = &row[idx];
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
