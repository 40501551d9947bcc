use std::collections::HashMap;
use thiserror::Error;

/// Renders a prompt template: substitutes `{{.name}}`
/// placeholders with literal string values from `arguments`. No conditional
/// or looping constructs are supported — those are adapter-internal, not a
/// core concern. `{{` / `}}` with no matching placeholder name are passed
/// through literally rather than escaped, since the grammar has no other use
/// for a brace pair.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unknown placeholder '{0}' in template")]
    UnknownPlaceholder(String),
    #[error("unterminated placeholder starting at byte {0}")]
    Unterminated(usize),
}

pub fn render(template: &str, arguments: &HashMap<String, String>) -> Result<String, TemplateError> {
    let mut output = String::with_capacity(template.len());
    let bytes = template.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if template[i..].starts_with("{{.") {
            let rest = &template[i + 3..];
            let end = rest.find("}}").ok_or(TemplateError::Unterminated(i))?;
            let name = &rest[..end];
            let value = arguments
                .get(name)
                .ok_or_else(|| TemplateError::UnknownPlaceholder(name.to_string()))?;
            output.push_str(value);
            i += 3 + end + 2;
        } else {
            let ch = template[i..].chars().next().unwrap();
            output.push(ch);
            i += ch.len_utf8();
        }
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_named_placeholder() {
        let args = HashMap::from([("city".to_string(), "Seattle".to_string())]);
        let result = render("weather for {{.city}} please", &args).unwrap();
        assert_eq!(result, "weather for Seattle please");
    }

    #[test]
    fn unknown_placeholder_is_an_error() {
        let args = HashMap::new();
        let err = render("{{.missing}}", &args).unwrap_err();
        assert_eq!(err, TemplateError::UnknownPlaceholder("missing".to_string()));
    }

    #[test]
    fn no_placeholders_returns_template_verbatim() {
        let args = HashMap::new();
        assert_eq!(render("plain text", &args).unwrap(), "plain text");
    }

    #[test]
    fn multiple_placeholders_all_substituted() {
        let args = HashMap::from([
            ("lat".to_string(), "37.77".to_string()),
            ("lon".to_string(), "-122.42".to_string()),
        ]);
        let result = render("({{.lat}}, {{.lon}})", &args).unwrap();
        assert_eq!(result, "(37.77, -122.42)");
    }
}
