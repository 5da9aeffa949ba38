//! Template selection and rendering for announcements.

use std::path::{Path, PathBuf};

use minijinja::{Environment, ErrorKind, Template, UndefinedBehavior, context};
use tracing::{debug, warn};

use crate::base::{
    config::Config,
    templates,
    types::{Event, Res},
};

/// Resolve a template by name: configured directories first, then the built-in set.
fn load_template(dirs: &[PathBuf], name: &str) -> Result<Option<String>, minijinja::Error> {
    // Names come off the bus, so never let them escape the template directories.
    let is_plain_name = !name.is_empty() && !name.starts_with('.') && !name.contains(['/', '\\']);

    if is_plain_name {
        for dir in dirs {
            if let Some(source) = read_template(&dir.join(name))? {
                debug!("loaded template {} from {}", name, dir.display());
                return Ok(Some(source));
            }
        }
    }

    Ok(templates::builtin(name).map(str::to_string))
}

fn read_template(path: &Path) -> Result<Option<String>, minijinja::Error> {
    match std::fs::read_to_string(path) {
        Ok(source) => Ok(Some(source)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(minijinja::Error::new(ErrorKind::InvalidOperation, format!("could not read template {}", path.display())).with_source(e)),
    }
}

/// Split rendered output into deliverable lines, dropping empty ones.
pub fn split_lines(rendered: &str) -> Vec<String> {
    rendered.lines().filter(|line| !line.is_empty()).map(str::to_string).collect()
}

/// Maps events to templates and renders them into chat lines.
pub struct TemplateSelector {
    env: Environment<'static>,
}

impl TemplateSelector {
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        let mut env = Environment::new();
        // Webhook payloads vary by event and action, so missing fields render empty.
        env.set_undefined_behavior(UndefinedBehavior::Chainable);
        env.set_loader(move |name| load_template(&dirs, name));

        Self { env }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.template_dirs.clone())
    }

    /// Return the first template that exists among `names`.
    pub fn select(&self, names: &[&str]) -> Res<Option<Template<'_, '_>>> {
        for name in names {
            match self.env.get_template(name) {
                Ok(template) => return Ok(Some(template)),
                Err(e) if e.kind() == ErrorKind::TemplateNotFound => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Ok(None)
    }

    /// Render `event` with the most specific template available.
    ///
    /// Returns `None` when no template exists for the event name or class.
    pub fn render(&self, event: &Event) -> Res<Option<Vec<String>>> {
        let Some(template) = self.select(&[&event.name, &event.class])? else {
            warn!("no template available for {} event", event.name);
            return Ok(None);
        };

        let rendered = template.render(context! {
            event_name => &event.name,
            event => &event.payload,
        })?;

        debug!("msgs = {:?}", rendered);

        Ok(Some(split_lines(&rendered)))
    }
}

// Tests.

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_split_lines_drops_blank_lines() {
        assert_eq!(split_lines("\none\n\ntwo\r\n\n"), vec!["one", "two"]);
        assert!(split_lines("\n\n").is_empty());
    }

    #[test]
    fn test_qualified_name_is_preferred() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("issues"), "generic {{ event_name }}").unwrap();
        std::fs::write(dir.path().join("issues:opened"), "opened #{{ event.issue.number }}").unwrap();

        let selector = TemplateSelector::new(vec![dir.path().to_path_buf()]);

        let opened = Event::from_payload("issues", json!({"action": "opened", "issue": {"number": 7}}));
        assert_eq!(selector.render(&opened).unwrap().unwrap(), vec!["opened #7"]);

        let closed = Event::from_payload("issues", json!({"action": "closed"}));
        assert_eq!(selector.render(&closed).unwrap().unwrap(), vec!["generic issues:closed"]);
    }

    #[test]
    fn test_directories_are_searched_in_order() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        std::fs::write(first.path().join("push"), "first").unwrap();
        std::fs::write(second.path().join("push"), "second").unwrap();

        let selector = TemplateSelector::new(vec![first.path().to_path_buf(), second.path().to_path_buf()]);
        let event = Event::from_payload("push", json!({}));

        assert_eq!(selector.render(&event).unwrap().unwrap(), vec!["first"]);
    }

    #[test]
    fn test_directory_overrides_builtin() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ping"), "pong").unwrap();

        let selector = TemplateSelector::new(vec![dir.path().to_path_buf()]);
        let event = Event::from_payload("ping", json!({"zen": "Keep it simple."}));

        assert_eq!(selector.render(&event).unwrap().unwrap(), vec!["pong"]);
    }

    #[test]
    fn test_builtin_fallback() {
        let selector = TemplateSelector::new(vec![]);
        let event = Event::from_payload(
            "pull_request",
            json!({
                "action": "opened",
                "sender": {"login": "octocat"},
                "repository": {"full_name": "acme/widgets"},
                "pull_request": {"number": 42, "title": "Add gears", "html_url": "https://example.com/pr/42"},
            }),
        );

        let lines = selector.render(&event).unwrap().unwrap();

        assert_eq!(lines, vec!["[acme/widgets] octocat opened pull request #42: Add gears https://example.com/pr/42"]);
    }

    #[test]
    fn test_missing_payload_fields_render_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("push"), "by {{ event.pusher.name }}.").unwrap();

        let selector = TemplateSelector::new(vec![dir.path().to_path_buf()]);
        let event = Event::from_payload("push", json!({}));

        assert_eq!(selector.render(&event).unwrap().unwrap(), vec!["by ."]);
    }

    #[test]
    fn test_missing_template_is_none() {
        let selector = TemplateSelector::new(vec![]);
        let event = Event::from_payload("unknown_event", json!({}));

        assert!(selector.render(&event).unwrap().is_none());
    }

    #[test]
    fn test_path_like_names_stay_inside_directories() {
        let dir = tempfile::tempdir().unwrap();
        let templates = dir.path().join("templates");
        std::fs::create_dir(&templates).unwrap();
        std::fs::write(dir.path().join("secret"), "leaked").unwrap();

        let selector = TemplateSelector::new(vec![templates]);
        let event = Event::from_payload("../secret", json!({}));

        assert!(selector.render(&event).unwrap().is_none());
    }

    #[test]
    fn test_rendered_blank_lines_are_not_delivered() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("push"), "one\n\n{% if false %}hidden{% endif %}\ntwo\n").unwrap();

        let selector = TemplateSelector::new(vec![dir.path().to_path_buf()]);
        let event = Event::from_payload("push", json!({}));

        assert_eq!(selector.render(&event).unwrap().unwrap(), vec!["one", "two"]);
    }

    fn render_builtin(class: &str, payload: serde_json::Value) -> Vec<String> {
        let selector = TemplateSelector::new(vec![]);

        selector.render(&Event::from_payload(class, payload)).unwrap().unwrap()
    }

    fn repo_and_sender() -> serde_json::Value {
        json!({"repository": {"full_name": "acme/widgets"}, "sender": {"login": "octocat"}})
    }

    fn with(mut base: serde_json::Value, extra: serde_json::Value) -> serde_json::Value {
        if let (Some(base), Some(extra)) = (base.as_object_mut(), extra.as_object()) {
            base.extend(extra.clone());
        }
        base
    }

    #[test]
    fn test_builtin_push() {
        let payload = json!({
            "ref": "refs/heads/main",
            "compare": "https://x/compare",
            "pusher": {"name": "alice"},
            "repository": {"full_name": "acme/widgets"},
            "commits": [
                {"id": "0123456789abcdef", "message": "first line\n\nbody"},
                {"id": "fedcba9876543210", "message": "fix"},
            ],
        });

        assert_eq!(
            render_builtin("push", payload),
            vec!["[acme/widgets] alice pushed 2 commit(s) to main: https://x/compare", "  01234567 first line", "  fedcba98 fix"]
        );
    }

    #[test]
    fn test_builtin_push_tolerates_missing_commit_message() {
        let payload = json!({
            "ref": "refs/heads/main",
            "compare": "https://x/compare",
            "pusher": {"name": "alice"},
            "repository": {"full_name": "acme/widgets"},
            "commits": [
                {"id": "0123456789abcdef", "message": "first line"},
                {"id": "fedcba9876543210"},
            ],
        });

        assert_eq!(
            render_builtin("push", payload),
            vec!["[acme/widgets] alice pushed 2 commit(s) to main: https://x/compare", "  01234567 first line", "  fedcba98 "]
        );
    }

    #[test]
    fn test_builtin_push_shows_at_most_three_commits() {
        let commits: Vec<_> = (0..5).map(|i| json!({"id": format!("{i}000000000"), "message": format!("change {i}")})).collect();
        let payload = json!({"ref": "refs/heads/dev", "pusher": {"name": "bob"}, "repository": {"full_name": "a/b"}, "commits": commits});

        let lines = render_builtin("push", payload);

        assert_eq!(lines.len(), 4);
        assert!(lines[0].contains("pushed 5 commit(s) to dev"));
        assert_eq!(lines[3], "  20000000 change 2");
    }

    #[test]
    fn test_builtin_issues() {
        let payload = with(
            repo_and_sender(),
            json!({"action": "opened", "issue": {"number": 7, "title": "Broken gears", "html_url": "https://x/issues/7"}}),
        );

        assert_eq!(render_builtin("issues", payload), vec!["[acme/widgets] octocat opened issue #7: Broken gears https://x/issues/7"]);
    }

    #[test]
    fn test_builtin_issue_comment() {
        let payload = with(
            repo_and_sender(),
            json!({
                "action": "created",
                "issue": {"number": 7, "title": "Broken gears"},
                "comment": {"html_url": "https://x/issues/7#c1"},
            }),
        );

        assert_eq!(render_builtin("issue_comment", payload), vec!["[acme/widgets] octocat commented on #7: Broken gears https://x/issues/7#c1"]);
    }

    #[test]
    fn test_builtin_create_and_delete() {
        let created = with(repo_and_sender(), json!({"ref_type": "branch", "ref": "feature"}));
        let deleted = with(repo_and_sender(), json!({"ref_type": "tag", "ref": "v0.1"}));

        assert_eq!(render_builtin("create", created), vec!["[acme/widgets] octocat created branch feature"]);
        assert_eq!(render_builtin("delete", deleted), vec!["[acme/widgets] octocat deleted tag v0.1"]);
    }

    #[test]
    fn test_builtin_release() {
        let payload = with(
            repo_and_sender(),
            json!({"action": "published", "release": {"tag_name": "v1.0", "html_url": "https://x/releases/v1.0"}}),
        );

        assert_eq!(render_builtin("release", payload), vec!["[acme/widgets] octocat published release v1.0: https://x/releases/v1.0"]);
    }

    #[test]
    fn test_builtin_fork() {
        let payload = with(repo_and_sender(), json!({"forkee": {"full_name": "octocat/widgets"}}));

        assert_eq!(render_builtin("fork", payload), vec!["[acme/widgets] octocat forked the repository to octocat/widgets"]);
    }

    #[test]
    fn test_builtin_watch_and_ping() {
        let starred = with(repo_and_sender(), json!({"action": "started"}));
        let ping = json!({"zen": "Keep it simple."});

        assert_eq!(render_builtin("watch", starred), vec!["[acme/widgets] octocat starred the repository"]);
        assert_eq!(render_builtin("ping", ping), vec!["[github] webhook installed: Keep it simple."]);
    }
}
