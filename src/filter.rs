use serde::{Deserialize, Serialize};

use crate::models::{Category, Priority, Task, Timestamp};

/// The search box plus the category/priority/tag selectors. `None` means "all".
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TaskFilter {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub tag: Option<String>,
}

impl TaskFilter {
    pub fn matches(&self, task: &Task) -> bool {
        let query = self.query.trim().to_lowercase();
        let matches_search = query.is_empty() || task.text.to_lowercase().contains(&query);
        let matches_category = self.category.map_or(true, |c| task.category == c);
        let matches_priority = self.priority.map_or(true, |p| task.priority == p);
        let matches_tag = match self.tag.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(tag) => task.tags.iter().any(|t| t == tag),
        };
        matches_search && matches_category && matches_priority && matches_tag
    }

    /// Visible subset, in store order.
    pub fn apply(&self, tasks: &[Task]) -> Vec<Task> {
        tasks.iter().filter(|t| self.matches(t)).cloned().collect()
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TaskSummary {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
    pub overdue: usize,
}

pub fn summarize(tasks: &[Task], now: Timestamp) -> TaskSummary {
    let completed = tasks.iter().filter(|t| t.completed).count();
    TaskSummary {
        total: tasks.len(),
        completed,
        pending: tasks.len() - completed,
        overdue: tasks.iter().filter(|t| t.is_overdue(now)).count(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Reminder;
    use chrono::{Duration, TimeZone, Utc};

    fn make_task(id: &str, text: &str, category: Category, priority: Priority) -> Task {
        Task {
            id: id.to_string(),
            text: text.to_string(),
            completed: false,
            category,
            priority,
            due_date: None,
            subtasks: Vec::new(),
            tags: Vec::new(),
            reminder: Reminder::default(),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn category_and_priority_compose_with_and() {
        let a = make_task("a", "Ship report", Category::Work, Priority::High);
        let b = make_task("b", "Call mom", Category::Personal, Priority::Low);
        let filter = TaskFilter {
            category: Some(Category::Work),
            priority: Some(Priority::High),
            ..TaskFilter::default()
        };
        let visible = filter.apply(&[a.clone(), b]);
        assert_eq!(visible, vec![a]);
    }

    #[test]
    fn empty_filter_shows_everything_in_order() {
        let tasks = vec![
            make_task("a", "one", Category::Work, Priority::High),
            make_task("b", "two", Category::Health, Priority::Medium),
        ];
        let visible = TaskFilter::default().apply(&tasks);
        assert_eq!(visible, tasks);
    }

    #[test]
    fn query_is_case_insensitive_substring() {
        let tasks = vec![
            make_task("a", "Buy Groceries", Category::Shopping, Priority::Low),
            make_task("b", "gym", Category::Health, Priority::Low),
        ];
        let filter = TaskFilter {
            query: "  groc ".into(),
            ..TaskFilter::default()
        };
        let visible = filter.apply(&tasks);
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, "a");
    }

    #[test]
    fn tag_must_match_exactly() {
        let mut a = make_task("a", "x", Category::Work, Priority::Low);
        a.tags = vec!["urgent".into()];
        let b = make_task("b", "y", Category::Work, Priority::Low);
        let filter = TaskFilter {
            tag: Some("urgent".into()),
            ..TaskFilter::default()
        };
        assert_eq!(filter.apply(&[a.clone(), b.clone()]), vec![a.clone()]);

        let partial = TaskFilter {
            tag: Some("urg".into()),
            ..TaskFilter::default()
        };
        assert!(partial.apply(&[a, b]).is_empty());
    }

    #[test]
    fn summary_counts_overdue_open_tasks_only() {
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 12, 0, 0).unwrap();
        let mut late = make_task("a", "late", Category::Work, Priority::High);
        late.due_date = Some(now - Duration::hours(2));
        let mut done_late = late.clone();
        done_late.id = "b".into();
        done_late.completed = true;
        let mut future = make_task("c", "future", Category::Work, Priority::High);
        future.due_date = Some(now + Duration::hours(2));

        let summary = summarize(&[late, done_late, future], now);
        assert_eq!(
            summary,
            TaskSummary {
                total: 3,
                completed: 1,
                pending: 2,
                overdue: 1,
            }
        );
    }
}
