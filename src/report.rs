use std::fmt::Write;

use chrono::NaiveDate;

use crate::dashboard::Dashboard;
use crate::models::{BreakdownRow, DetailBreakdown, TeacherSummary, Totals, User, WeeklyPoint};
use crate::session::KeyValueStorage;

pub const NO_WEEKLY_DATA: &str = "No weekly data available for this teacher.";
pub const NO_BREAKDOWN: &str = "No subject or class breakdown available for this teacher.";
pub const NOT_SIGNED_IN: &str = "Not signed in. Run `teacher-insights login` first.";

const BAR_WIDTH: i64 = 24;

pub fn user_initials(user: Option<&User>) -> String {
    let Some(email) = user.and_then(|user| user.email.as_deref()) else {
        return "PR".to_string();
    };
    let local = email.split('@').next().unwrap_or_default();
    local
        .split(['.', '-', '_', ' '])
        .filter(|part| !part.is_empty())
        .take(2)
        .filter_map(|part| part.chars().next())
        .flat_map(char::to_uppercase)
        .collect()
}

pub fn render_summary_cards(totals: &Totals) -> String {
    let cards = [
        ("Lessons created", totals.lessons),
        ("Quizzes conducted", totals.quizzes),
        ("Assessments made", totals.assessments),
    ];

    let mut output = String::new();
    for (label, value) in cards {
        let _ = writeln!(output, "- {label}: **{value}** (This week)");
    }
    output
}

pub fn render_teacher_selector(teachers: &[TeacherSummary], selected: Option<&str>) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "Teacher:");
    let marker = |active: bool| if active { "[x]" } else { "[ ]" };

    let _ = writeln!(output, "- {} All teachers", marker(selected.is_none()));
    for teacher in teachers {
        let _ = writeln!(
            output,
            "- {} {} (`{}`)",
            marker(selected == Some(teacher.teacher_id.as_str())),
            teacher.teacher_name,
            teacher.teacher_id
        );
    }
    output
}

fn bar(value: i64, max: i64) -> String {
    if value <= 0 || max <= 0 {
        return String::new();
    }
    let (value, max) = (i128::from(value), i128::from(max));
    let len = (value * i128::from(BAR_WIDTH) + max - 1) / max;
    "#".repeat(len as usize)
}

pub fn render_weekly_chart(points: &[WeeklyPoint]) -> String {
    let mut output = String::new();
    if points.is_empty() {
        let _ = writeln!(output, "{NO_WEEKLY_DATA}");
        return output;
    }

    let _ = writeln!(output, "### Weekly activity (ISO weeks)");
    let _ = writeln!(output);
    let _ = writeln!(output, "| Week | Week of | Lessons | Quizzes | Assessments |");
    let _ = writeln!(output, "| --- | --- | ---: | ---: | ---: |");
    for point in points {
        let week_of = point
            .week_start()
            .map(|date: NaiveDate| date.to_string())
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            output,
            "| {} | {} | {} | {} | {} |",
            point.label(),
            week_of,
            point.lessons,
            point.quizzes,
            point.assessments
        );
    }

    let max = points
        .iter()
        .flat_map(|point| [point.lessons, point.quizzes, point.assessments])
        .max()
        .unwrap_or(0);
    let label_width = points
        .iter()
        .map(|point| point.label().len())
        .max()
        .unwrap_or(0);

    let _ = writeln!(output);
    let _ = writeln!(output, "```");
    for point in points {
        let series = [
            ("lessons", point.lessons),
            ("quizzes", point.quizzes),
            ("assessments", point.assessments),
        ];
        for (index, (name, value)) in series.into_iter().enumerate() {
            let week = if index == 0 { point.label() } else { String::new() };
            let _ = writeln!(
                output,
                "{week:<label_width$}  {name:<11} {} {value}",
                bar(value, max)
            );
        }
    }
    let _ = writeln!(output, "```");
    output
}

fn render_table(output: &mut String, title: &str, label_header: &str, rows: &[BreakdownRow]) {
    let _ = writeln!(output, "### {title}");
    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "| {label_header} | Total | Lessons | Quizzes | Assessments |"
    );
    let _ = writeln!(output, "| --- | ---: | ---: | ---: | ---: |");
    for row in rows {
        let _ = writeln!(
            output,
            "| {} | {} | {} | {} | {} |",
            row.label, row.total, row.lessons, row.quizzes, row.assessments
        );
    }
}

pub fn render_details_tables(details: Option<&DetailBreakdown>) -> String {
    let mut output = String::new();
    let Some(details) = details.filter(|details| !details.is_empty()) else {
        let _ = writeln!(output, "{NO_BREAKDOWN}");
        return output;
    };

    if !details.subjects.is_empty() {
        render_table(&mut output, "By subject", "Subject", &details.subjects);
    }
    if !details.classes.is_empty() {
        if !details.subjects.is_empty() {
            let _ = writeln!(output);
        }
        render_table(&mut output, "By class", "Class", &details.classes);
    }
    output
}

pub fn render_app_shell(user: Option<&User>, body: &str) -> String {
    let mut output = String::new();
    let email = user
        .and_then(|user| user.email.as_deref())
        .unwrap_or("Principal");
    let role = user
        .and_then(|user| user.role.as_deref())
        .unwrap_or("admin");

    let _ = writeln!(output, "# Teacher Insights: Admin Companion");
    let _ = writeln!(output, "See what's happening across your school.");
    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "[{}] {email} (Signed in as {role})",
        user_initials(user)
    );
    let _ = writeln!(output);
    output.push_str(body);
    output
}

fn render_sign_in<S: KeyValueStorage>(dashboard: &Dashboard<S>) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "# Teacher Insights");
    let _ = writeln!(output, "Principal dashboard for teacher activity insights.");
    let _ = writeln!(output);
    for message in [dashboard.error(), dashboard.auth_error()].into_iter().flatten() {
        let _ = writeln!(output, "> {message}");
        let _ = writeln!(output);
    }
    let _ = writeln!(output, "{NOT_SIGNED_IN}");
    output
}

/// Renders the whole dashboard for its current state.
pub fn build_report<S: KeyValueStorage>(dashboard: &Dashboard<S>) -> String {
    if !dashboard.is_authenticated() {
        return render_sign_in(dashboard);
    }

    let mut body = String::new();
    if let Some(error) = dashboard.error() {
        let _ = writeln!(body, "> {error}");
        let _ = writeln!(body);
    }

    let _ = writeln!(body, "## Insights");
    let overview = match dashboard.selected_teacher() {
        Some(teacher) => format!("Overview for {}", teacher.teacher_name),
        None => "Overview across all teachers".to_string(),
    };
    let _ = writeln!(body, "{overview}.");
    let _ = writeln!(body);
    body.push_str(&render_summary_cards(&dashboard.totals()));
    if dashboard.summary_loading() {
        let _ = writeln!(body, "Loading data...");
    }
    let _ = writeln!(body);
    body.push_str(&render_teacher_selector(
        dashboard.teachers(),
        dashboard.selected_id(),
    ));

    let _ = writeln!(body);
    body.push_str(&render_weekly_chart(dashboard.weekly()));
    if dashboard.teacher_loading() {
        let _ = writeln!(body, "Loading weekly data...");
    }

    let _ = writeln!(body);
    let _ = writeln!(body, "## Per-teacher breakdown");
    let _ = writeln!(
        body,
        "Subject-wise and class-wise activity for the selected teacher."
    );
    let _ = writeln!(body);
    body.push_str(&render_details_tables(dashboard.details()));

    render_app_shell(dashboard.user(), &body)
}
