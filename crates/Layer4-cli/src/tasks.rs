//! `huddle task` - task store commands

use anyhow::{bail, Result};
use huddle_foundation::{ChatroomId, Role};
use huddle_supervisor::HuddleContext;
use huddle_task::{next_statuses, Task, TaskFilter, TaskId, TaskLifecycle, TaskOrigin, TaskStatus};

/// Full uuid, or a prefix matching exactly one task
fn resolve_id(lifecycle: &TaskLifecycle, raw: &str) -> Result<TaskId> {
    if let Ok(id) = raw.parse::<TaskId>() {
        return Ok(id);
    }
    let prefix = raw.trim().to_ascii_lowercase();
    if prefix.is_empty() {
        bail!("Task id is empty");
    }
    let matches: Vec<TaskId> = lifecycle
        .store()
        .list(&TaskFilter::new())?
        .into_iter()
        .map(|t| t.id)
        .filter(|id| id.to_string().starts_with(&prefix))
        .collect();
    match matches.as_slice() {
        [id] => Ok(*id),
        [] => bail!("No task matches '{}'", raw),
        _ => bail!("'{}' matches {} tasks; use a longer prefix", raw, matches.len()),
    }
}

fn print_row(task: &Task) {
    println!(
        "{:<10} {:<16} {:<8} {:<22} {:<10} {}",
        task.id.short(),
        task.chatroom_id.as_str(),
        task.origin.as_str(),
        task.status.as_str(),
        task.assigned_role.map(|r| r.as_str()).unwrap_or("-"),
        truncate(&task.content, 40)
    );
}

fn truncate(s: &str, max_chars: usize) -> String {
    let flat = s.replace('\n', " ");
    if flat.chars().count() <= max_chars {
        flat
    } else {
        let cut: String = flat.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}

pub fn create(
    context: &HuddleContext,
    chatroom_id: ChatroomId,
    origin: TaskOrigin,
    content: &str,
) -> Result<()> {
    if content.trim().is_empty() {
        bail!("Task content is empty");
    }
    let task = context.lifecycle()?.create(chatroom_id, origin, content)?;
    println!("{}", task.id);
    Ok(())
}

pub fn move_task(
    context: &HuddleContext,
    raw_id: &str,
    to: TaskStatus,
    actor: Role,
    assign: Option<Role>,
) -> Result<()> {
    let lifecycle = context.lifecycle()?;
    let id = resolve_id(&lifecycle, raw_id)?;
    let transition = lifecycle.transition(id, to, actor, assign)?;
    println!(
        "{}: {} -> {}",
        transition.task.id.short(),
        transition.from,
        transition.task.status
    );
    Ok(())
}

pub fn claim(context: &HuddleContext, raw_id: &str, actor: Role) -> Result<()> {
    let lifecycle = context.lifecycle()?;
    let id = resolve_id(&lifecycle, raw_id)?;
    let transition = lifecycle.claim(id, actor)?;
    println!(
        "{}: claimed by {} ({})",
        transition.task.id.short(),
        actor,
        transition.task.status
    );
    Ok(())
}

pub fn list(
    context: &HuddleContext,
    chatroom_id: Option<ChatroomId>,
    origin: Option<TaskOrigin>,
    status: Option<TaskStatus>,
    json: bool,
) -> Result<()> {
    let mut filter = TaskFilter::new();
    if let Some(chatroom_id) = chatroom_id {
        filter = filter.chatroom(chatroom_id);
    }
    if let Some(origin) = origin {
        filter = filter.origin(origin);
    }
    if let Some(status) = status {
        filter = filter.status(status);
    }
    let tasks = context.lifecycle()?.store().list(&filter)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&tasks)?);
        return Ok(());
    }
    if tasks.is_empty() {
        println!("No tasks found.");
        return Ok(());
    }

    println!(
        "{:<10} {:<16} {:<8} {:<22} {:<10} {}",
        "ID", "Chatroom", "Origin", "Status", "Assignee", "Content"
    );
    println!("{}", "-".repeat(100));
    for task in &tasks {
        print_row(task);
    }
    Ok(())
}

pub fn show(context: &HuddleContext, raw_id: &str, json: bool) -> Result<()> {
    let lifecycle = context.lifecycle()?;
    let task = lifecycle.get(resolve_id(&lifecycle, raw_id)?)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&task)?);
        return Ok(());
    }

    let next: Vec<&str> = next_statuses(task.origin, task.status)
        .iter()
        .map(|s| s.as_str())
        .collect();
    println!("ID:        {}", task.id);
    println!("Chatroom:  {}", task.chatroom_id);
    println!("Origin:    {}", task.origin);
    println!("Status:    {}", task.status);
    println!(
        "Assignee:  {}",
        task.assigned_role.map(|r| r.as_str()).unwrap_or("-")
    );
    println!("Created:   {}", task.created_at.to_rfc3339());
    println!("Updated:   {}", task.updated_at.to_rfc3339());
    if next.is_empty() {
        println!("Next:      (terminal)");
    } else {
        println!("Next:      {}", next.join(", "));
    }
    println!();
    println!("{}", task.content);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a\nb", 10), "a b");
        assert_eq!(truncate("abcdefghijkl", 8), "abcde...");
    }

    #[test]
    fn test_resolve_by_prefix() {
        let lifecycle =
            TaskLifecycle::new(std::sync::Arc::new(huddle_task::InMemoryTaskStore::new()));
        let task = lifecycle
            .create(ChatroomId::new("room"), TaskOrigin::Chat, "x")
            .unwrap();
        let full = task.id.to_string();

        assert_eq!(resolve_id(&lifecycle, &full).unwrap(), task.id);
        assert_eq!(resolve_id(&lifecycle, &full[..8]).unwrap(), task.id);
        assert!(resolve_id(&lifecycle, "zzzz").is_err());
        assert!(resolve_id(&lifecycle, "").is_err());
    }
}
