//! Checklist task rendering
//!
//! Notes carry an ordered list of checklist tasks as structured data, but
//! both sync backends transport a note as a single body string. Tasks are
//! rendered as markdown task-list lines appended after the body content and
//! parsed back out on read.
//!
//! A task line looks like `- [ ] buy milk` or `- [x] call bank`, indented
//! two spaces per nesting level. Only a trailing run of task lines is
//! treated as the checklist; task-syntax lines embedded in the middle of
//! the body stay part of the content.

use crate::models::NoteTask;

const INDENT: &str = "  ";

/// Render tasks as markdown task-list lines.
pub fn render_tasks(tasks: &[NoteTask]) -> String {
    let mut out = String::new();
    for task in tasks {
        for _ in 0..task.indent.max(0) {
            out.push_str(INDENT);
        }
        out.push_str(if task.done { "- [x] " } else { "- [ ] " });
        out.push_str(&task.text);
        out.push('\n');
    }
    // Drop the trailing newline so rendering composes cleanly
    if out.ends_with('\n') {
        out.pop();
    }
    out
}

/// Compose a transport body from note content and tasks.
///
/// Content and checklist are separated by one blank line. A note without
/// tasks round-trips as its plain content.
pub fn render_body(content: &str, tasks: &[NoteTask]) -> String {
    if tasks.is_empty() {
        return content.to_string();
    }

    let rendered = render_tasks(tasks);
    if content.trim().is_empty() {
        rendered
    } else {
        format!("{}\n\n{}", content.trim_end_matches('\n'), rendered)
    }
}

/// Split a transport body into content and trailing checklist tasks.
pub fn parse_body(body: &str) -> (String, Vec<NoteTask>) {
    let lines: Vec<&str> = body.lines().collect();

    // Walk backwards over the trailing task block
    let mut start = lines.len();
    while start > 0 {
        if parse_task_line(lines[start - 1]).is_some() {
            start -= 1;
        } else {
            break;
        }
    }

    if start == lines.len() {
        return (body.to_string(), Vec::new());
    }

    let tasks = lines[start..]
        .iter()
        .filter_map(|line| parse_task_line(line))
        .collect();

    let content = lines[..start].join("\n").trim_end().to_string();
    (content, tasks)
}

/// Parse a single markdown task-list line.
///
/// Returns `None` for anything that is not task syntax.
pub fn parse_task_line(line: &str) -> Option<NoteTask> {
    let trimmed = line.trim_start();
    let leading = line.len() - trimmed.len();

    // Only even two-space indentation counts as nesting
    if line[..leading].contains('\t') {
        return None;
    }
    let indent = (leading / 2) as i64;

    let rest = trimmed.strip_prefix("- [")?;
    let (done, rest) = if let Some(rest) = rest.strip_prefix("x] ") {
        (true, rest)
    } else if let Some(rest) = rest.strip_prefix(" ] ") {
        (false, rest)
    } else {
        return None;
    };

    Some(NoteTask {
        text: rest.to_string(),
        done,
        indent,
    })
}
