use chrono::NaiveDate;
use serde::Serialize;

use crate::models::{AttendanceRecord, AttendanceStatus, Student, Task, TaskStatus};

/// Aggregate counts the dashboard renders, computed purely from the cached
/// collections for a reference date.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub students: usize,
    pub tasks: usize,
    pub tasks_completed: usize,
    pub tasks_pending: usize,
    pub completion_rate: f64,
    pub present: usize,
    pub absent: usize,
    pub late: usize,
    pub attendance_today: usize,
    pub attendance_rate_today: f64,
}

pub fn summarize(
    students: &[Student],
    tasks: &[Task],
    records: &[AttendanceRecord],
    today: NaiveDate,
) -> DashboardSummary {
    let tasks_completed = tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Completed)
        .count();
    let tasks_pending = tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Pending)
        .count();
    let present = records
        .iter()
        .filter(|r| r.status == AttendanceStatus::Present)
        .count();
    let absent = records
        .iter()
        .filter(|r| r.status == AttendanceStatus::Absent)
        .count();
    let late = records
        .iter()
        .filter(|r| r.status == AttendanceStatus::Late)
        .count();
    let attendance_today = records
        .iter()
        .filter(|r| r.date.date_naive() == today)
        .count();

    let completion_rate = if tasks.is_empty() {
        0.0
    } else {
        tasks_completed as f64 / tasks.len() as f64 * 100.0
    };
    let attendance_rate_today = if students.is_empty() {
        0.0
    } else {
        attendance_today as f64 / students.len() as f64 * 100.0
    };

    DashboardSummary {
        students: students.len(),
        tasks: tasks.len(),
        tasks_completed,
        tasks_pending,
        completion_rate,
        present,
        absent,
        late,
        attendance_today,
        attendance_rate_today,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn student(id: &str) -> Student {
        let at = Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap();
        Student {
            id: id.to_string(),
            name: id.to_string(),
            email: format!("{id}@x.com"),
            grade: "9A".to_string(),
            created_at: at,
            updated_at: at,
        }
    }

    fn task(id: &str, status: TaskStatus) -> Task {
        let at = Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap();
        Task {
            id: id.to_string(),
            title: id.to_string(),
            description: String::new(),
            due_date: at,
            status,
            created_at: at,
            updated_at: at,
        }
    }

    fn record(id: &str, day: u32, status: AttendanceStatus) -> AttendanceRecord {
        let at = Utc.with_ymd_and_hms(2024, 4, day, 8, 0, 0).unwrap();
        AttendanceRecord {
            id: id.to_string(),
            student_id: "s1".to_string(),
            date: at,
            status,
            notes: None,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn empty_collections_yield_zero_rates() {
        let summary = summarize(&[], &[], &[], NaiveDate::from_ymd_opt(2024, 4, 21).unwrap());
        assert_eq!(summary.students, 0);
        assert_eq!(summary.completion_rate, 0.0);
        assert_eq!(summary.attendance_rate_today, 0.0);
    }

    #[test]
    fn counts_and_rates_line_up() {
        let students = vec![student("s1"), student("s2")];
        let tasks = vec![
            task("t1", TaskStatus::Completed),
            task("t2", TaskStatus::Pending),
            task("t3", TaskStatus::Pending),
        ];
        let records = vec![
            record("a1", 21, AttendanceStatus::Present),
            record("a2", 21, AttendanceStatus::Late),
            record("a3", 20, AttendanceStatus::Absent),
        ];
        let today = NaiveDate::from_ymd_opt(2024, 4, 21).unwrap();
        let summary = summarize(&students, &tasks, &records, today);

        assert_eq!(summary.students, 2);
        assert_eq!(summary.tasks, 3);
        assert_eq!(summary.tasks_completed, 1);
        assert_eq!(summary.tasks_pending, 2);
        assert!((summary.completion_rate - 100.0 / 3.0).abs() < 1e-9);
        assert_eq!(summary.present, 1);
        assert_eq!(summary.absent, 1);
        assert_eq!(summary.late, 1);
        assert_eq!(summary.attendance_today, 2);
        assert!((summary.attendance_rate_today - 100.0).abs() < 1e-9);
    }
}
