use anyhow::Result;
use dephealth_engine::{FilterDimension, GroupingDimension};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Collapse(String),
    Expand(String),
    CollapseAll,
    ExpandAll,
    Grouping(bool),
    Dimension(GroupingDimension),
    /// Toggles one filter value.
    Filter(FilterDimension, String),
    FilterReset,
    /// Normalized RFC 3339 time.
    History(String),
    Live,
    Refresh,
    Status,
    Quit,
}

pub const HELP: &str = "commands: collapse <group> | expand <group> | collapse-all | expand-all | \
grouping on|off | dimension namespace|group | filter <type|state|status|service> <value> | \
filter reset | history <rfc3339> | live | refresh | status | quit";

pub fn parse(line: &str) -> Result<Command> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        anyhow::bail!("empty command");
    };
    let rest: Vec<&str> = words.collect();

    let cmd = match (head, rest.as_slice()) {
        ("collapse", [name]) => Command::Collapse(name.to_string()),
        ("expand", [name]) => Command::Expand(name.to_string()),
        ("collapse-all", []) => Command::CollapseAll,
        ("expand-all", []) => Command::ExpandAll,
        ("grouping", ["on"]) => Command::Grouping(true),
        ("grouping", ["off"]) => Command::Grouping(false),
        ("dimension", [value]) => {
            let Some(dim) = GroupingDimension::parse(value) else {
                anyhow::bail!("invalid dimension: {value} (expected namespace|group)");
            };
            Command::Dimension(dim)
        }
        ("filter", ["reset"]) => Command::FilterReset,
        ("filter", [dimension, value]) => {
            let Some(dim) = FilterDimension::parse(dimension) else {
                anyhow::bail!("invalid filter: {dimension} (expected type|state|status|service)");
            };
            Command::Filter(dim, value.to_string())
        }
        ("history", [time]) => Command::History(parse_time(time)?),
        ("live", []) => Command::Live,
        ("refresh", []) => Command::Refresh,
        ("status", []) => Command::Status,
        ("quit" | "exit", []) => Command::Quit,
        _ => anyhow::bail!("unknown command: {}", line.trim()),
    };
    Ok(cmd)
}

fn parse_time(input: &str) -> Result<String> {
    let parsed = chrono::DateTime::parse_from_rfc3339(input)
        .map_err(|e| anyhow::anyhow!("invalid time {input}: {e}"))?;
    Ok(parsed.with_timezone(&chrono::Utc).to_rfc3339())
}
