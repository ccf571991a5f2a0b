use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_classroomd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn classroomd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn login_teacher(stdin: &mut ChildStdin, reader: &mut BufReader<ChildStdout>, workspace: &PathBuf) {
    let _ = request_ok(
        stdin,
        reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request_ok(
        stdin,
        reader,
        "reg",
        "auth.register",
        json!({
            "email": "t1@x.com",
            "password": "pw",
            "name": "Teacher One",
            "role": "teacher"
        }),
    );
    let _ = request_ok(
        stdin,
        reader,
        "login",
        "auth.login",
        json!({ "email": "t1@x.com", "password": "pw", "role": "teacher" }),
    );
}

#[test]
fn add_list_roundtrip_update_merge_and_double_delete() {
    let workspace = temp_dir("classroom-students-crud");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    login_teacher(&mut stdin, &mut reader, &workspace);

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "students.create",
        json!({ "name": "Ana", "email": "a@x.com", "grade": "9A" }),
    );
    let student = created.get("student").expect("student");
    let student_id = student
        .get("id")
        .and_then(|v| v.as_str())
        .expect("id")
        .to_string();
    let created_at = student
        .get("createdAt")
        .and_then(|v| v.as_str())
        .expect("createdAt")
        .to_string();

    // Round-trip: the listed entity carries the same id and fields.
    let listed = request_ok(&mut stdin, &mut reader, "2", "students.list", json!({}));
    let students = listed
        .get("students")
        .and_then(|v| v.as_array())
        .expect("students array");
    assert_eq!(students.len(), 1);
    assert_eq!(
        students[0].get("id").and_then(|v| v.as_str()),
        Some(student_id.as_str())
    );
    assert_eq!(students[0].get("name").and_then(|v| v.as_str()), Some("Ana"));
    assert_eq!(
        students[0].get("email").and_then(|v| v.as_str()),
        Some("a@x.com")
    );
    assert_eq!(students[0].get("grade").and_then(|v| v.as_str()), Some("9A"));

    // Update merges only the patched field plus updatedAt.
    let updated = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "students.update",
        json!({ "id": student_id, "patch": { "grade": "9B" } }),
    );
    let merged = updated.get("student").expect("merged student");
    assert_eq!(merged.get("grade").and_then(|v| v.as_str()), Some("9B"));
    assert_eq!(merged.get("name").and_then(|v| v.as_str()), Some("Ana"));
    assert_eq!(
        merged.get("email").and_then(|v| v.as_str()),
        Some("a@x.com")
    );
    assert_eq!(
        merged.get("createdAt").and_then(|v| v.as_str()),
        Some(created_at.as_str())
    );

    // Unknown patch fields are rejected.
    let bad = request(
        &mut stdin,
        &mut reader,
        "4",
        "students.update",
        json!({ "id": student_id, "patch": { "favouriteColor": "blue" } }),
    );
    assert_eq!(
        bad.pointer("/error/code").and_then(|v| v.as_str()),
        Some("bad_params")
    );

    // Delete, then delete again: the second call reports not_found and the
    // list stays empty either way.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "students.delete",
        json!({ "id": student_id }),
    );
    let listed = request_ok(&mut stdin, &mut reader, "6", "students.list", json!({}));
    assert_eq!(
        listed
            .get("students")
            .and_then(|v| v.as_array())
            .map(|a| a.len()),
        Some(0)
    );
    let second = request(
        &mut stdin,
        &mut reader,
        "7",
        "students.delete",
        json!({ "id": student_id }),
    );
    assert_eq!(
        second.pointer("/error/code").and_then(|v| v.as_str()),
        Some("not_found")
    );
    let listed = request_ok(&mut stdin, &mut reader, "8", "students.list", json!({}));
    assert_eq!(
        listed
            .get("students")
            .and_then(|v| v.as_array())
            .map(|a| a.len()),
        Some(0)
    );

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn task_update_touches_only_patched_fields() {
    let workspace = temp_dir("classroom-task-merge");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    login_teacher(&mut stdin, &mut reader, &workspace);

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "tasks.create",
        json!({
            "title": "Algebra exercises",
            "description": "Problems 1-10",
            "dueDate": "2024-04-30"
        }),
    );
    let task = created.get("task").expect("task");
    let task_id = task
        .get("id")
        .and_then(|v| v.as_str())
        .expect("id")
        .to_string();
    assert_eq!(task.get("status").and_then(|v| v.as_str()), Some("pending"));
    let due_date = task
        .get("dueDate")
        .and_then(|v| v.as_str())
        .expect("dueDate")
        .to_string();

    let updated = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "tasks.update",
        json!({ "id": task_id, "patch": { "status": "completed" } }),
    );
    let merged = updated.get("task").expect("merged task");
    assert_eq!(
        merged.get("status").and_then(|v| v.as_str()),
        Some("completed")
    );
    assert_eq!(
        merged.get("title").and_then(|v| v.as_str()),
        Some("Algebra exercises")
    );
    assert_eq!(
        merged.get("description").and_then(|v| v.as_str()),
        Some("Problems 1-10")
    );
    assert_eq!(
        merged.get("dueDate").and_then(|v| v.as_str()),
        Some(due_date.as_str())
    );

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
