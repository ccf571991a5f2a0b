use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::remote::{millis_to_timestamp, timestamp_to_millis, Document, JsonMap};
use crate::store::{Entity, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Teacher,
    Student,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Teacher => "teacher",
            Role::Student => "student",
        }
    }

    pub fn parse(raw: &str) -> Option<Role> {
        match raw {
            "teacher" => Some(Role::Teacher),
            "student" => Some(Role::Student),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An authenticated identity joined with its authorization role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub name: String,
    pub email: String,
    pub grade: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Completed,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Completed => "completed",
        }
    }

    pub fn parse(raw: &str) -> Option<TaskStatus> {
        match raw {
            "pending" => Some(TaskStatus::Pending),
            "completed" => Some(TaskStatus::Completed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,
    pub due_date: DateTime<Utc>,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
}

impl AttendanceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
            AttendanceStatus::Late => "late",
        }
    }

    pub fn parse(raw: &str) -> Option<AttendanceStatus> {
        match raw {
            "present" => Some(AttendanceStatus::Present),
            "absent" => Some(AttendanceStatus::Absent),
            "late" => Some(AttendanceStatus::Late),
            _ => None,
        }
    }
}

/// `student_id` is a lookup key only; deleting a student does not cascade
/// here.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: String,
    pub student_id: String,
    pub date: DateTime<Utc>,
    pub status: AttendanceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub task_id: String,
    pub student_name: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn malformed<E>(doc: &Document, collection: &str, message: impl Into<String>) -> Result<E, StoreError> {
    Err(StoreError::Malformed {
        collection: collection.to_string(),
        id: doc.id.clone(),
        message: message.into(),
    })
}

fn field_str(doc: &Document, collection: &str, key: &str) -> Result<String, StoreError> {
    match doc.fields.get(key).and_then(|v| v.as_str()) {
        Some(s) => Ok(s.to_string()),
        None => malformed(doc, collection, format!("missing or non-string {key}")),
    }
}

fn field_opt_str(doc: &Document, key: &str) -> Option<String> {
    doc.fields
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

fn field_time(doc: &Document, collection: &str, key: &str) -> Result<DateTime<Utc>, StoreError> {
    let millis = match doc.fields.get(key).and_then(|v| v.as_i64()) {
        Some(ms) => ms,
        None => return malformed(doc, collection, format!("missing or non-integer {key}")),
    };
    match millis_to_timestamp(millis) {
        Some(at) => Ok(at),
        None => malformed(doc, collection, format!("{key} out of range: {millis}")),
    }
}

impl Entity for Student {
    const COLLECTION: &'static str = "students";

    fn id(&self) -> &str {
        &self.id
    }

    fn from_document(doc: &Document) -> Result<Self, StoreError> {
        Ok(Student {
            id: doc.id.clone(),
            name: field_str(doc, Self::COLLECTION, "name")?,
            email: field_str(doc, Self::COLLECTION, "email")?,
            grade: field_str(doc, Self::COLLECTION, "grade")?,
            created_at: field_time(doc, Self::COLLECTION, "createdAt")?,
            updated_at: field_time(doc, Self::COLLECTION, "updatedAt")?,
        })
    }

    fn to_fields(&self) -> JsonMap {
        let mut fields = JsonMap::new();
        fields.insert("name".into(), json!(self.name));
        fields.insert("email".into(), json!(self.email));
        fields.insert("grade".into(), json!(self.grade));
        fields.insert("createdAt".into(), json!(timestamp_to_millis(self.created_at)));
        fields.insert("updatedAt".into(), json!(timestamp_to_millis(self.updated_at)));
        fields
    }
}

impl Entity for Task {
    const COLLECTION: &'static str = "tasks";

    fn id(&self) -> &str {
        &self.id
    }

    fn from_document(doc: &Document) -> Result<Self, StoreError> {
        let status_raw = field_str(doc, Self::COLLECTION, "status")?;
        let Some(status) = TaskStatus::parse(&status_raw) else {
            return malformed(doc, Self::COLLECTION, format!("bad status: {status_raw}"));
        };
        Ok(Task {
            id: doc.id.clone(),
            title: field_str(doc, Self::COLLECTION, "title")?,
            description: field_str(doc, Self::COLLECTION, "description")?,
            due_date: field_time(doc, Self::COLLECTION, "dueDate")?,
            status,
            created_at: field_time(doc, Self::COLLECTION, "createdAt")?,
            updated_at: field_time(doc, Self::COLLECTION, "updatedAt")?,
        })
    }

    fn to_fields(&self) -> JsonMap {
        let mut fields = JsonMap::new();
        fields.insert("title".into(), json!(self.title));
        fields.insert("description".into(), json!(self.description));
        fields.insert("dueDate".into(), json!(timestamp_to_millis(self.due_date)));
        fields.insert("status".into(), json!(self.status.as_str()));
        fields.insert("createdAt".into(), json!(timestamp_to_millis(self.created_at)));
        fields.insert("updatedAt".into(), json!(timestamp_to_millis(self.updated_at)));
        fields
    }
}

impl Entity for AttendanceRecord {
    const COLLECTION: &'static str = "attendance";

    fn id(&self) -> &str {
        &self.id
    }

    fn from_document(doc: &Document) -> Result<Self, StoreError> {
        let status_raw = field_str(doc, Self::COLLECTION, "status")?;
        let Some(status) = AttendanceStatus::parse(&status_raw) else {
            return malformed(doc, Self::COLLECTION, format!("bad status: {status_raw}"));
        };
        Ok(AttendanceRecord {
            id: doc.id.clone(),
            student_id: field_str(doc, Self::COLLECTION, "studentId")?,
            date: field_time(doc, Self::COLLECTION, "date")?,
            status,
            notes: field_opt_str(doc, "notes"),
            created_at: field_time(doc, Self::COLLECTION, "createdAt")?,
            updated_at: field_time(doc, Self::COLLECTION, "updatedAt")?,
        })
    }

    fn to_fields(&self) -> JsonMap {
        let mut fields = JsonMap::new();
        fields.insert("studentId".into(), json!(self.student_id));
        fields.insert("date".into(), json!(timestamp_to_millis(self.date)));
        fields.insert("status".into(), json!(self.status.as_str()));
        if let Some(notes) = &self.notes {
            fields.insert("notes".into(), json!(notes));
        }
        fields.insert("createdAt".into(), json!(timestamp_to_millis(self.created_at)));
        fields.insert("updatedAt".into(), json!(timestamp_to_millis(self.updated_at)));
        fields
    }
}

impl Entity for Comment {
    const COLLECTION: &'static str = "comments";

    fn id(&self) -> &str {
        &self.id
    }

    fn from_document(doc: &Document) -> Result<Self, StoreError> {
        Ok(Comment {
            id: doc.id.clone(),
            task_id: field_str(doc, Self::COLLECTION, "taskId")?,
            student_name: field_str(doc, Self::COLLECTION, "studentName")?,
            content: field_str(doc, Self::COLLECTION, "content")?,
            created_at: field_time(doc, Self::COLLECTION, "createdAt")?,
            updated_at: field_time(doc, Self::COLLECTION, "updatedAt")?,
        })
    }

    fn to_fields(&self) -> JsonMap {
        let mut fields = JsonMap::new();
        fields.insert("taskId".into(), json!(self.task_id));
        fields.insert("studentName".into(), json!(self.student_name));
        fields.insert("content".into(), json!(self.content));
        fields.insert("createdAt".into(), json!(timestamp_to_millis(self.created_at)));
        fields.insert("updatedAt".into(), json!(timestamp_to_millis(self.updated_at)));
        fields
    }
}
