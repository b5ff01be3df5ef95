use std::io;

use chrono::NaiveDate;
use clap::ValueEnum;
use serde::Serialize;

use crate::models::{BreakdownRow, DetailBreakdown, WeeklyPoint};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportKind {
    Weekly,
    Subjects,
    Classes,
}

#[derive(Serialize)]
struct WeeklyCsvRow {
    week: String,
    week_start: Option<NaiveDate>,
    lessons: i64,
    quizzes: i64,
    assessments: i64,
}

/// Writes one CSV table for the selected teacher and returns the row count.
pub fn write_csv<W: io::Write>(
    out: W,
    kind: ExportKind,
    weekly: &[WeeklyPoint],
    details: Option<&DetailBreakdown>,
) -> anyhow::Result<usize> {
    let mut writer = csv::Writer::from_writer(out);

    let written = match kind {
        ExportKind::Weekly => {
            for point in weekly {
                writer.serialize(WeeklyCsvRow {
                    week: point.label(),
                    week_start: point.week_start(),
                    lessons: point.lessons,
                    quizzes: point.quizzes,
                    assessments: point.assessments,
                })?;
            }
            if weekly.is_empty() {
                writer.write_record(["week", "week_start", "lessons", "quizzes", "assessments"])?;
            }
            weekly.len()
        }
        ExportKind::Subjects => {
            let rows = details.map(|d| d.subjects.as_slice()).unwrap_or(&[]);
            write_breakdown(&mut writer, "subject", rows)?
        }
        ExportKind::Classes => {
            let rows = details.map(|d| d.classes.as_slice()).unwrap_or(&[]);
            write_breakdown(&mut writer, "class", rows)?
        }
    };

    writer.flush()?;
    Ok(written)
}

fn write_breakdown<W: io::Write>(
    writer: &mut csv::Writer<W>,
    label_header: &str,
    rows: &[BreakdownRow],
) -> anyhow::Result<usize> {
    writer.write_record([label_header, "total", "lessons", "quizzes", "assessments"])?;
    for row in rows {
        writer.write_record([
            row.label.clone(),
            row.total.to_string(),
            row.lessons.to_string(),
            row.quizzes.to_string(),
            row.assessments.to_string(),
        ])?;
    }
    Ok(rows.len())
}
