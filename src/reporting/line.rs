//! The line reporter: one `<broker> <topic> <alarmName> "<message>"` line
//! per changed presence/alarm, written to stdout or an append-only log file.

use super::Reporter;
use crate::error::Result;
use crate::track::DeviceReport;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

enum Sink {
    Stdout,
    File(Mutex<BufWriter<File>>),
}

/// Writes one line per changed tracking tuple. Presence lines are written
/// before alarm lines, matching the original tool's ordering.
pub struct LineReporter {
    sink: Sink,
}

impl LineReporter {
    pub fn stdout() -> Self {
        LineReporter { sink: Sink::Stdout }
    }

    pub fn to_file(path: impl Into<PathBuf>) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path.into())?;
        Ok(LineReporter {
            sink: Sink::File(Mutex::new(BufWriter::new(file))),
        })
    }

    fn write_line(&self, line: &str) -> Result<()> {
        match &self.sink {
            Sink::Stdout => {
                println!("{}", line);
                Ok(())
            }
            Sink::File(writer) => {
                let mut writer = writer.lock();
                writeln!(writer, "{}", line)?;
                writer.flush()?;
                Ok(())
            }
        }
    }
}

fn render_message(message: Option<&str>) -> String {
    match message {
        Some(text) => text.to_string(),
        None => "Is OK now".to_string(),
    }
}

impl Reporter for LineReporter {
    fn name(&self) -> &'static str {
        "line"
    }

    fn report(&self, report: &DeviceReport) -> Result<()> {
        if !report.has_any_changes() {
            return Ok(());
        }

        if let Some((declared, track)) = report.presence() {
            if track.updated {
                self.write_line(&format!(
                    "{} {} Presence \"{}\"",
                    declared.identifier.broker,
                    declared.identifier.topic,
                    render_message(track.message.as_deref())
                ))?;
            }
        }

        for alarm in report.changed_alarms() {
            self.write_line(&format!(
                "{} {} {} \"{}\"",
                alarm.identifier.broker,
                alarm.identifier.topic,
                alarm.alarm_name,
                render_message(alarm.track.message.as_deref())
            ))?;
        }

        Ok(())
    }
}
