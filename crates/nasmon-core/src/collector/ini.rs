//! `key=value` parsing shared by share configs, the shares ini and `.notify` files.

use std::collections::HashMap;

/// Strips one pair of surrounding double quotes.
fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

/// Parses `key=value` lines. Values may be double-quoted.
///
/// Lines without `=`, blank lines and `#` comments are skipped. A repeated key
/// keeps its last value.
pub fn parse_key_values(content: &str) -> HashMap<String, String> {
    let mut values = HashMap::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        values.insert(key.trim().to_string(), unquote(value.trim()).to_string());
    }
    values
}

/// One `[header]` section with its `key=value` body.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Section {
    /// Value of the header, e.g. `appdata` for `[shareName="appdata"]`.
    /// Empty for headers without `=`.
    pub name: String,
    pub values: HashMap<String, String>,
}

/// Parses an ini file whose headers look like `[kind="name"]`.
///
/// Lines before the first header are ignored.
pub fn parse_sections(content: &str) -> Vec<Section> {
    let mut sections: Vec<Section> = Vec::new();

    for line in content.lines() {
        let line = line.trim();
        if let Some(header) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            let name = header
                .split_once('=')
                .map(|(_, v)| unquote(v.trim()).to_string())
                .unwrap_or_default();
            sections.push(Section {
                name,
                values: HashMap::new(),
            });
            continue;
        }

        let Some(current) = sections.last_mut() else {
            continue;
        };
        if let Some((key, value)) = line.split_once('=') {
            current
                .values
                .insert(key.trim().to_string(), unquote(value.trim()).to_string());
        }
    }

    sections
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_values() {
        let content = "\
# generated
shareComment=\"Media files\"
shareUseCache=yes

shareExport=-e
broken line
";
        let kv = parse_key_values(content);
        assert_eq!(kv["shareComment"], "Media files");
        assert_eq!(kv["shareUseCache"], "yes");
        assert_eq!(kv["shareExport"], "-e");
        assert_eq!(kv.len(), 3);
    }

    #[test]
    fn test_value_may_contain_equals() {
        let kv = parse_key_values("link=/Settings?tab=1\n");
        assert_eq!(kv["link"], "/Settings?tab=1");
    }

    #[test]
    fn test_parse_sections() {
        let content = "\
orphan=\"ignored\"
[shareName=\"appdata\"]
name=\"appdata\"
size=\"1000\"
[shareName=\"isos\"]
name=\"isos\"
free=\"500\"
";
        let sections = parse_sections(content);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].name, "appdata");
        assert_eq!(sections[0].values["size"], "1000");
        assert_eq!(sections[1].name, "isos");
        assert_eq!(sections[1].values["free"], "500");
        assert!(!sections[0].values.contains_key("orphan"));
    }
}
