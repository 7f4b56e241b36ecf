//! Command tokens appended to object ids, e.g.
//! `/general/<GroupBy:userid>/<Show:userid:alice>`.
//!
//! Tokens are stripped from the id before the resolver sees it and applied to
//! the base listing afterwards, so every provider gets grouping and filtering
//! for free.

use std::collections::HashMap;

use hierarchy_model::WPObject;

const GROUP_CLASS: &str = "WPGroup";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    GroupBy { prop: String },
    Show { prop: String, value: String },
    Search { prop: String, needle: String },
    Unknown(String),
}

impl Command {
    fn parse(token: &str) -> Self {
        let mut parts = token.splitn(3, ':');
        let command = parts.next().unwrap_or_default();
        let prop = parts.next();
        let value = parts.next();
        match (command, prop, value) {
            ("GroupBy", Some(prop), _) => Self::GroupBy {
                prop: prop.to_string(),
            },
            ("Show", Some(prop), Some(value)) => Self::Show {
                prop: prop.to_string(),
                value: value.to_string(),
            },
            // `<Search:prop:needle>`; a needle of the form `prop:needle` wins
            ("Search", prop, value) => match value.and_then(|v| v.split_once(':')) {
                Some((prop, needle)) => Self::Search {
                    prop: prop.to_string(),
                    needle: needle.to_string(),
                },
                None => Self::Search {
                    prop: prop.unwrap_or("all").to_string(),
                    needle: value.unwrap_or_default().to_string(),
                },
            },
            _ => Self::Unknown(token.to_string()),
        }
    }

    fn keeps(&self, object: &WPObject) -> bool {
        match self {
            Self::Show { prop, value } => object.field_text(prop).as_deref() == Some(value),
            Self::Search { prop, needle } => object.matches(prop, needle),
            Self::GroupBy { .. } | Self::Unknown(_) => false,
        }
    }
}

/// An object id split into the resolvable base and its trailing commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandPath {
    pub base: String,
    pub commands: Vec<Command>,
}

impl CommandPath {
    #[must_use]
    pub fn parse(id: &str) -> Self {
        let mut base = id.trim_start_matches('/');
        let mut tokens = Vec::new();
        while base.ends_with('>') {
            if let Some((head, tail)) = base.rsplit_once("/<") {
                tokens.push(&tail[..tail.len() - 1]);
                base = head;
            } else if base.starts_with('<') {
                tokens.push(&base[1..base.len() - 1]);
                base = "";
            } else {
                break;
            }
        }
        tokens.reverse();

        let base = if base.is_empty() {
            "/".to_string()
        } else {
            format!("/{base}")
        };
        let commands = collapse_drill_through(tokens.into_iter().map(Command::parse).collect());
        Self { base, commands }
    }

    #[must_use]
    pub fn has_commands(&self) -> bool {
        !self.commands.is_empty()
    }

    /// Apply the commands to the listing of `base`. `request_id` is the full
    /// id that was asked for; group ids are derived from it.
    #[must_use]
    pub fn apply(
        &self,
        request_id: &str,
        objects: Vec<WPObject>,
        group_icon: Option<&str>,
    ) -> Vec<WPObject> {
        let Some((last, filters)) = self.commands.split_last() else {
            return objects;
        };

        // GroupBy:P ... Show:P:V drills into the group when no other GroupBy
        // comes between them; the GroupBy is then moot
        if let Command::Show { prop, .. } = last
            && let Some(group) = filters
                .iter()
                .rposition(|c| matches!(c, Command::GroupBy { .. }))
            && matches!(&filters[group], Command::GroupBy { prop: p } if p == prop)
        {
            if filters
                .iter()
                .enumerate()
                .any(|(i, c)| i != group && !matches!(c, Command::Show { .. }))
            {
                return Vec::new();
            }
            return objects
                .into_iter()
                .filter(|o| {
                    self.commands
                        .iter()
                        .filter(|c| matches!(c, Command::Show { .. }))
                        .all(|c| c.keeps(o))
                })
                .collect();
        }

        if filters.iter().any(|c| !matches!(c, Command::Show { .. })) {
            return Vec::new();
        }
        let filtered = objects
            .into_iter()
            .filter(|o| filters.iter().all(|c| c.keeps(o)));

        match last {
            Command::GroupBy { prop } => group_by(request_id, filtered, prop, group_icon),
            Command::Show { .. } | Command::Search { .. } => {
                filtered.filter(|o| last.keeps(o)).collect()
            }
            Command::Unknown(_) => Vec::new(),
        }
    }
}

fn collapse_drill_through(commands: Vec<Command>) -> Vec<Command> {
    let mut collapsed = Vec::with_capacity(commands.len());
    let mut iter = commands.into_iter().peekable();
    while let Some(command) = iter.next() {
        if let Command::GroupBy { prop } = &command
            && matches!(iter.peek(), Some(Command::Show { prop: next, .. }) if next == prop)
        {
            continue;
        }
        collapsed.push(command);
    }
    collapsed
}

fn group_by(
    request_id: &str,
    objects: impl Iterator<Item = WPObject>,
    prop: &str,
    group_icon: Option<&str>,
) -> Vec<WPObject> {
    let mut order: Vec<(String, u64)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for value in objects.filter_map(|o| o.field_text(prop)) {
        if let Some(&slot) = index.get(&value) {
            order[slot].1 += 1;
        } else {
            index.insert(value.clone(), order.len());
            order.push((value, 1));
        }
    }

    let prefix = request_id.trim_end_matches('/');
    order
        .into_iter()
        .map(|(value, count)| {
            let id = format!("{prefix}/<Show:{prop}:{value}>");
            WPObject::new(GROUP_CLASS, id, value)
                .with_icon(group_icon.map(str::to_string))
                .with_children(count)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(id: &str, user: &str, cpus: u64) -> WPObject {
        WPObject::new("WPSlurmJob", format!("/general/{id}"), id)
            .with_field("userid", user)
            .with_field("cpus", cpus)
    }

    fn jobs() -> Vec<WPObject> {
        vec![
            job("1", "alice", 16),
            job("2", "bob", 16),
            job("3", "alice", 4),
        ]
    }

    #[test]
    fn plain_ids_have_no_commands() {
        let path = CommandPath::parse("/ComputeSystems/Quartz");

        assert_eq!(path.base, "/ComputeSystems/Quartz");
        assert!(!path.has_commands());
    }

    #[test]
    fn parses_tokens_left_to_right() {
        let path = CommandPath::parse("/general/<Show:cpus:16>/<GroupBy:userid>");

        assert_eq!(path.base, "/general");
        assert_eq!(
            path.commands,
            [
                Command::Show {
                    prop: "cpus".to_string(),
                    value: "16".to_string()
                },
                Command::GroupBy {
                    prop: "userid".to_string()
                },
            ]
        );
    }

    #[test]
    fn leading_token_without_base_resolves_root() {
        let path = CommandPath::parse("/<Show:userid:alice>");

        assert_eq!(path.base, "/");
        assert_eq!(path.commands.len(), 1);
    }

    #[test]
    fn group_by_counts_members_in_first_seen_order() {
        let request = "/general/<GroupBy:userid>";
        let groups = CommandPath::parse(request).apply(request, jobs(), None);

        let summary: Vec<_> = groups
            .iter()
            .map(|g| (g.title.as_str(), g.objects, g.id.as_str()))
            .collect();
        assert_eq!(
            summary,
            [
                ("alice", 2, "/general/<GroupBy:userid>/<Show:userid:alice>"),
                ("bob", 1, "/general/<GroupBy:userid>/<Show:userid:bob>"),
            ]
        );
        assert!(groups.iter().all(|g| g.class == GROUP_CLASS));
    }

    #[test]
    fn group_ids_resolve_to_exactly_their_members() {
        let request = "/general/<GroupBy:userid>";
        let groups = CommandPath::parse(request).apply(request, jobs(), None);

        for group in groups {
            let members = CommandPath::parse(&group.id).apply(&group.id, jobs(), None);
            assert_eq!(members.len() as u64, group.objects, "group {}", group.id);
            assert!(members.iter().all(|m| m.field_text("userid").as_deref() == Some(group.title.as_str())));
        }
    }

    #[test]
    fn show_filters_then_groups() {
        let request = "/general/<Show:cpus:16>/<GroupBy:userid>";
        let groups = CommandPath::parse(request).apply(request, jobs(), None);

        assert_eq!(groups.len(), 2);
        assert!(groups.iter().all(|g| g.objects == 1));
    }

    #[test]
    fn non_adjacent_group_and_show_drill_into_the_group() {
        let request = "/general/<GroupBy:userid>/<Show:cpus:16>/<Show:userid:alice>";
        let members = CommandPath::parse(request).apply(request, jobs(), None);

        assert_eq!(members.len(), 1);
        assert_eq!(members[0].title, "1");
    }

    #[test]
    fn show_only_drills_into_the_nearest_group() {
        let request = "/general/<GroupBy:cpus>/<GroupBy:userid>/<Show:cpus:16>";

        assert!(CommandPath::parse(request).apply(request, jobs(), None).is_empty());
    }

    #[test]
    fn search_token_matches_case_insensitively() {
        let request = "/general/<Search:userid:ALI>";
        let found = CommandPath::parse(request).apply(request, jobs(), None);
        assert_eq!(found.len(), 2);

        let request = "/general/<Search:all:bob>";
        let found = CommandPath::parse(request).apply(request, jobs(), None);
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn intermediate_group_by_yields_nothing() {
        let request = "/general/<GroupBy:userid>/<GroupBy:cpus>";

        assert!(CommandPath::parse(request).apply(request, jobs(), None).is_empty());
    }

    #[test]
    fn unknown_command_yields_nothing() {
        let request = "/general/<Sort:cpus>";

        assert!(CommandPath::parse(request).apply(request, jobs(), None).is_empty());
    }
}
