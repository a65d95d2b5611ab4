use std::sync::OnceLock;

use regex::Regex;

static NON_IDENT_REGEX: OnceLock<Regex> = OnceLock::new();

fn non_ident_regex() -> &'static Regex {
    NON_IDENT_REGEX.get_or_init(|| Regex::new(r"[^a-zA-Z0-9_]").unwrap())
}

/// Turn `name` into a valid C identifier: drop every character other than
/// ASCII letters, digits and underscores, and prefix `_` if it would start
/// with a digit.
pub fn sanitize_name(name: &str) -> String {
    let mut sanitized = non_ident_regex().replace_all(name, "").into_owned();
    if sanitized
        .chars()
        .next()
        .is_some_and(|c| !c.is_ascii_alphabetic() && c != '_')
    {
        sanitized.insert(0, '_');
    }
    sanitized
}

pub fn lower_first_char(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

static NAMESPACE_NAME_REGEX: OnceLock<Regex> = OnceLock::new();

fn namespace_name_regex() -> &'static Regex {
    NAMESPACE_NAME_REGEX.get_or_init(|| Regex::new(r"UA/([^/]+)").unwrap())
}

/// Lowercase short name of a companion specification, such as `di` for
/// `http://opcfoundation.org/UA/DI/`. Empty for the base namespace.
pub fn namespace_short_name(uri: &str) -> String {
    namespace_name_regex()
        .captures(uri)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_lowercase())
        .unwrap_or_default()
}

/// Folder that holds a model's files below the nodeset root: the last path
/// segment of the URI, with the base namespace living under `Schema`.
pub fn model_folder_name(uri: &str) -> String {
    let segment = uri
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default();
    if segment == "UA" {
        "Schema".to_owned()
    } else {
        segment.to_owned()
    }
}

/// Text between a begin and an end marker line in a previously generated
/// file. Each line is trimmed, lines are joined with `\n`. A region without
/// an end marker runs to the end of the file.
pub fn user_code_segment(source: &str, begin_marker: &str, end_marker: &str) -> String {
    let mut lines = Vec::new();
    let mut inside = false;
    for line in source.lines() {
        let line = line.trim();
        if !inside {
            if line == begin_marker {
                inside = true;
            }
            continue;
        }
        if line == end_marker {
            break;
        }
        lines.push(line);
    }
    lines.join("\n").trim().to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize() {
        assert_eq!(sanitize_name("Speed_6001"), "Speed_6001");
        assert_eq!(sanitize_name("Flow Rate-1_6002"), "FlowRate1_6002");
        assert_eq!(sanitize_name("2ndStage_7"), "_2ndStage_7");
        assert_eq!(sanitize_name("<Pump>"), "Pump");
        assert_eq!(sanitize_name("::"), "");
    }

    #[test]
    fn lower_first() {
        assert_eq!(lower_first_char("Speed"), "speed");
        assert_eq!(lower_first_char("s"), "s");
        assert_eq!(lower_first_char(""), "");
    }

    #[test]
    fn short_names() {
        assert_eq!(namespace_short_name("http://opcfoundation.org/UA/"), "");
        assert_eq!(namespace_short_name("http://opcfoundation.org/UA/DI/"), "di");
        assert_eq!(namespace_short_name("http://example.org/UA/Pump/"), "pump");
        assert_eq!(model_folder_name("http://opcfoundation.org/UA/"), "Schema");
        assert_eq!(model_folder_name("http://opcfoundation.org/UA/DI/"), "DI");
        assert_eq!(model_folder_name("http://example.org/UA/Motor"), "Motor");
    }

    #[test]
    fn user_code() {
        let source = "int x;\n  //BEGIN user code read Speed_6001\n    value = 4;\n  return value;\n//END user code read Speed_6001\n//BEGIN user code Start_7001\n";
        assert_eq!(
            user_code_segment(
                source,
                "//BEGIN user code read Speed_6001",
                "//END user code read Speed_6001"
            ),
            "value = 4;\nreturn value;"
        );
        assert_eq!(
            user_code_segment(source, "//BEGIN user code Start_7001", "//END user code Start_7001"),
            ""
        );
        assert_eq!(user_code_segment(source, "//BEGIN nothing", "//END nothing"), "");
    }

    #[test]
    fn unterminated_user_code_runs_to_end() {
        let source = "//BEGIN user code Start_7001\n  start_motor();\n\n";
        assert_eq!(
            user_code_segment(source, "//BEGIN user code Start_7001", "//END user code Start_7001"),
            "start_motor();"
        );
    }
}
