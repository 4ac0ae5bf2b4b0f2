//! `{name}` placeholder templates used by filenames, log lines and group overrides.
//!
//! Syntax: `{name}` is replaced by the value bound to `name`; `{{` and `}}`
//! produce literal braces. Anything else inside braces is an error, so a
//! template either renders completely or not at all.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unknown placeholder {{{0}}}")]
    UnknownPlaceholder(String),

    #[error("unbalanced brace at byte {0}")]
    Unbalanced(usize),
}

/// Render `template`, looking placeholders up in `vars`.
pub fn render(template: &str, vars: &[(&str, &str)]) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    let mut offset = 0;

    while let Some(idx) = rest.find(['{', '}']) {
        out.push_str(&rest[..idx]);
        let tail = &rest[idx..];

        if tail.starts_with("{{") {
            out.push('{');
            rest = &tail[2..];
            offset += idx + 2;
            continue;
        }
        if tail.starts_with("}}") {
            out.push('}');
            rest = &tail[2..];
            offset += idx + 2;
            continue;
        }
        if tail.starts_with('}') {
            return Err(TemplateError::Unbalanced(offset + idx));
        }

        let close = tail
            .find('}')
            .ok_or(TemplateError::Unbalanced(offset + idx))?;
        let name = &tail[1..close];
        if name.contains('{') {
            return Err(TemplateError::Unbalanced(offset + idx));
        }
        let value = vars
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| *value)
            .ok_or_else(|| TemplateError::UnknownPlaceholder(name.to_string()))?;
        out.push_str(value);

        rest = &tail[close + 1..];
        offset += idx + close + 1;
    }

    out.push_str(rest);
    Ok(out)
}

/// Check that `template` only uses the placeholders in `allowed`.
pub fn validate(template: &str, allowed: &[&str]) -> Result<(), TemplateError> {
    let vars: Vec<(&str, &str)> = allowed.iter().map(|name| (*name, "")).collect();
    render(template, &vars).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_substitutes_placeholders() {
        let out = render(
            "{original_name}_{video_id}",
            &[("original_name", "movie1"), ("video_id", "abc123")],
        )
        .unwrap();
        assert_eq!(out, "movie1_abc123");
    }

    #[test]
    fn test_render_without_placeholders_is_identity() {
        assert_eq!(render("plain text", &[("code", "x")]).unwrap(), "plain text");
        assert_eq!(render("", &[]).unwrap(), "");
    }

    #[test]
    fn test_escaped_braces() {
        assert_eq!(render("{{code}} {code}", &[("code", "A")]).unwrap(), "{code} A");
    }

    #[test]
    fn test_unknown_placeholder_fails() {
        assert_eq!(
            render("{code}/{other}", &[("code", "A")]),
            Err(TemplateError::UnknownPlaceholder("other".to_string()))
        );
    }

    #[test]
    fn test_unbalanced_braces_fail() {
        assert!(matches!(render("abc{code", &[("code", "A")]), Err(TemplateError::Unbalanced(3))));
        assert!(matches!(render("abc}", &[]), Err(TemplateError::Unbalanced(3))));
    }

    #[test]
    fn test_multibyte_text_is_preserved() {
        let out = render("강의_{code}_끝", &[("code", "01")]).unwrap();
        assert_eq!(out, "강의_01_끝");
    }

    #[test]
    fn test_validate() {
        assert!(validate("- [{file_name_without_ext}]({url})", &["file_name_without_ext", "url"]).is_ok());
        assert!(validate("{title}", &["url"]).is_err());
    }
}
