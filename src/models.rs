use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct User {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Session {
    pub token: Option<String>,
    pub user: Option<User>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeacherSummary {
    #[serde(deserialize_with = "id_as_string")]
    pub teacher_id: String,
    #[serde(default)]
    pub teacher_name: String,
    #[serde(default, deserialize_with = "zero_if_null")]
    pub lessons: i64,
    #[serde(default, deserialize_with = "zero_if_null")]
    pub quizzes: i64,
    #[serde(default, deserialize_with = "zero_if_null")]
    pub assessments: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyPoint {
    pub year: i32,
    pub week: u32,
    #[serde(default, deserialize_with = "zero_if_null")]
    pub lessons: i64,
    #[serde(default, deserialize_with = "zero_if_null")]
    pub quizzes: i64,
    #[serde(default, deserialize_with = "zero_if_null")]
    pub assessments: i64,
}

impl WeeklyPoint {
    pub fn label(&self) -> String {
        format!("{}-W{}", self.year, self.week)
    }

    /// Monday of the ISO week, when the year/week pair is valid.
    pub fn week_start(&self) -> Option<NaiveDate> {
        NaiveDate::from_isoywd_opt(self.year, self.week, Weekday::Mon)
    }
}

/// One row of a breakdown table. The API names the label column `subject` or
/// `class` depending on the table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakdownRow {
    #[serde(alias = "subject", alias = "class")]
    pub label: String,
    #[serde(default, deserialize_with = "zero_if_null")]
    pub total: i64,
    #[serde(default, deserialize_with = "zero_if_null")]
    pub lessons: i64,
    #[serde(default, deserialize_with = "zero_if_null")]
    pub quizzes: i64,
    #[serde(default, deserialize_with = "zero_if_null")]
    pub assessments: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DetailBreakdown {
    #[serde(default, deserialize_with = "empty_if_null")]
    pub subjects: Vec<BreakdownRow>,
    #[serde(default, deserialize_with = "empty_if_null")]
    pub classes: Vec<BreakdownRow>,
}

impl DetailBreakdown {
    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty() && self.classes.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Totals {
    pub lessons: i64,
    pub quizzes: i64,
    pub assessments: i64,
}

#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    #[serde(default)]
    pub user: Option<User>,
}

#[derive(Debug, Deserialize)]
pub struct SummaryEnvelope {
    #[serde(default, deserialize_with = "empty_if_null")]
    pub data: Vec<TeacherSummary>,
}

#[derive(Debug, Deserialize)]
pub struct WeeklyEnvelope {
    #[serde(default, deserialize_with = "empty_if_null")]
    pub weeks: Vec<WeeklyPoint>,
}

fn zero_if_null<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<i64>::deserialize(deserializer)?.unwrap_or(0))
}

fn empty_if_null<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

// Teacher ids arrive as strings or bare integers depending on the backend.
fn id_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(value) => value,
        RawId::Number(value) => value.to_string(),
    })
}
