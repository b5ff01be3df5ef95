use crate::models::{TeacherSummary, Totals};

pub fn overall_totals(teachers: &[TeacherSummary]) -> Totals {
    teachers.iter().fold(Totals::default(), |acc, teacher| Totals {
        lessons: acc.lessons.saturating_add(teacher.lessons),
        quizzes: acc.quizzes.saturating_add(teacher.quizzes),
        assessments: acc.assessments.saturating_add(teacher.assessments),
    })
}

/// The summary entry for `selected`, if it is present in the collection.
pub fn selected_teacher<'a>(
    teachers: &'a [TeacherSummary],
    selected: Option<&str>,
) -> Option<&'a TeacherSummary> {
    let selected = selected?;
    teachers.iter().find(|teacher| teacher.teacher_id == selected)
}

/// Totals for the current view: the selected teacher's own counts, or the sum
/// across all teachers when nothing (or an unknown id) is selected.
pub fn current_totals(teachers: &[TeacherSummary], selected: Option<&str>) -> Totals {
    match selected_teacher(teachers, selected) {
        Some(teacher) => Totals {
            lessons: teacher.lessons,
            quizzes: teacher.quizzes,
            assessments: teacher.assessments,
        },
        None => overall_totals(teachers),
    }
}
