//! Built-in announcement templates for common GitHub webhook events.
//!
//! Templates are looked up by the qualified event name (`pull_request:opened`) first,
//! then by the bare event class (`pull_request`). Each rendered line becomes one chat
//! message; blank lines are dropped.

/// `push` events.
pub const PUSH: &str = r#####"
{%- set branch = event.ref | default("") | replace("refs/heads/", "") -%}
{%- set commits = event.commits or [] -%}
[{{ event.repository.full_name }}] {{ event.pusher.name }} pushed {{ commits | length }} commit(s) to {{ branch }}: {{ event.compare }}
{% for commit in commits[:3] %}
  {{ commit.id[:8] }} {{ commit.message | default("") | lines | first }}
{% endfor %}
"#####;

/// `pull_request` events.
pub const PULL_REQUEST: &str = r#####"
[{{ event.repository.full_name }}] {{ event.sender.login }} {{ event.action | replace("_", " ") }} pull request #{{ event.pull_request.number }}: {{ event.pull_request.title }} {{ event.pull_request.html_url }}
"#####;

/// `issues` events.
pub const ISSUES: &str = r#####"
[{{ event.repository.full_name }}] {{ event.sender.login }} {{ event.action | replace("_", " ") }} issue #{{ event.issue.number }}: {{ event.issue.title }} {{ event.issue.html_url }}
"#####;

/// `issue_comment` events.
pub const ISSUE_COMMENT: &str = r#####"
[{{ event.repository.full_name }}] {{ event.sender.login }} commented on #{{ event.issue.number }}: {{ event.issue.title }} {{ event.comment.html_url }}
"#####;

/// `create` events.
pub const CREATE: &str = r#####"
[{{ event.repository.full_name }}] {{ event.sender.login }} created {{ event.ref_type }} {{ event.ref }}
"#####;

/// `delete` events.
pub const DELETE: &str = r#####"
[{{ event.repository.full_name }}] {{ event.sender.login }} deleted {{ event.ref_type }} {{ event.ref }}
"#####;

/// `release` events.
pub const RELEASE: &str = r#####"
[{{ event.repository.full_name }}] {{ event.sender.login }} {{ event.action }} release {{ event.release.tag_name }}: {{ event.release.html_url }}
"#####;

/// `fork` events.
pub const FORK: &str = r#####"
[{{ event.repository.full_name }}] {{ event.sender.login }} forked the repository to {{ event.forkee.full_name }}
"#####;

/// `watch` events (stars).
pub const WATCH: &str = r#####"
[{{ event.repository.full_name }}] {{ event.sender.login }} starred the repository
"#####;

/// `ping` events, sent by GitHub when a hook is first installed.
pub const PING: &str = r#####"
[{{ event.repository.full_name | default("github") }}] webhook installed: {{ event.zen }}
"#####;

/// Look up a built-in template by name.
pub fn builtin(name: &str) -> Option<&'static str> {
    match name {
        "push" => Some(PUSH),
        "pull_request" => Some(PULL_REQUEST),
        "issues" => Some(ISSUES),
        "issue_comment" => Some(ISSUE_COMMENT),
        "create" => Some(CREATE),
        "delete" => Some(DELETE),
        "release" => Some(RELEASE),
        "fork" => Some(FORK),
        "watch" => Some(WATCH),
        "ping" => Some(PING),
        _ => None,
    }
}
