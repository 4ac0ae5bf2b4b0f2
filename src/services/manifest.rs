//! Manifest link parsing.
//!
//! Two markdown link forms are recognised:
//! - direct: `[title](https://youtu.be/<videoId>)`
//! - positional: `[title](https://<position_host>/.../<signedIndex>)`
//!
//! Positional links are only recognised on the configured position host, so
//! ordinary links that happen to end in a number are left alone. An empty
//! host turns positional parsing off.
//!
//! Both are alternatives of one regex, direct first, so at any position the
//! direct form wins when both could match.

use crate::models::{ManifestConfig, ManifestReference, ReferenceKind};
use regex::Regex;

#[derive(Debug, Clone)]
pub struct ManifestParser {
    link_pattern: Regex,
    direct_link_base: String,
}

impl ManifestParser {
    pub fn new(config: &ManifestConfig) -> Result<Self, regex::Error> {
        let direct = format!(
            r"{}(?P<vid>[A-Za-z0-9_-]+)",
            regex::escape(&config.direct_link_base)
        );
        let target = if config.position_host.is_empty() {
            tracing::warn!("No manifest position host configured, positional links are ignored");
            direct
        } else {
            format!(
                r"{direct}|https?://{host}/(?:[^)\s]*/)?(?P<pos>-?\d+)",
                host = regex::escape(&config.position_host),
            )
        };
        let pattern = format!(r"\[(?P<title>[^\]\n]+)\]\((?:{target})\)");

        Ok(Self {
            link_pattern: Regex::new(&pattern)?,
            direct_link_base: config.direct_link_base.clone(),
        })
    }

    /// All references in `text`, in document order
    pub fn parse(&self, text: &str) -> Vec<ManifestReference> {
        let mut references = Vec::new();

        for caps in self.link_pattern.captures_iter(text) {
            let Some(whole) = caps.get(0) else { continue };
            let title = caps["title"].to_string();

            let kind = if let Some(vid) = caps.name("vid") {
                ReferenceKind::Direct(vid.as_str().to_string())
            } else if let Some(pos) = caps.name("pos") {
                match pos.as_str().parse::<i64>() {
                    Ok(index) => ReferenceKind::Positional(index),
                    Err(e) => {
                        tracing::debug!("Ignoring link {} with bad index: {}", whole.as_str(), e);
                        continue;
                    }
                }
            } else {
                continue;
            };

            references.push(ManifestReference {
                kind,
                title,
                matched: whole.as_str().to_string(),
                span: whole.range(),
            });
        }

        references
    }

    /// Direct-link form of a reference
    pub fn canonical_link(&self, title: &str, video_id: &str) -> String {
        format!("[{title}]({}{video_id})", self.direct_link_base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> ManifestParser {
        ManifestParser::new(&ManifestConfig::default()).unwrap()
    }

    #[test]
    fn test_direct_link() {
        let refs = parser().parse("- [Intro](https://youtu.be/dQw4w9WgXcQ)\n");
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].kind, ReferenceKind::Direct("dQw4w9WgXcQ".to_string()));
        assert_eq!(refs[0].title, "Intro");
        assert_eq!(refs[0].matched, "[Intro](https://youtu.be/dQw4w9WgXcQ)");
        assert_eq!(refs[0].span, 2..39);
    }

    #[test]
    fn test_positional_links() {
        let refs = parser().parse(
            "[A](https://indirect.example/x/1) [B](https://indirect.example/-1) [C](http://indirect.example/a/b/-3)",
        );
        let kinds: Vec<_> = refs.iter().map(|r| r.kind.clone()).collect();
        assert_eq!(
            kinds,
            vec![
                ReferenceKind::Positional(1),
                ReferenceKind::Positional(-1),
                ReferenceKind::Positional(-3),
            ]
        );
    }

    #[test]
    fn test_direct_wins_over_positional() {
        let refs = parser().parse("[Num](https://youtu.be/12345)");
        assert_eq!(refs[0].kind, ReferenceKind::Direct("12345".to_string()));
    }

    #[test]
    fn test_unrelated_links_ignored() {
        let refs = parser().parse("[Docs](https://example.com/guide) [Img](https://x.y/z.png)");
        assert!(refs.is_empty());
    }

    #[test]
    fn test_position_host_restricts_matches() {
        let parser = ManifestParser::new(&ManifestConfig {
            position_host: "pos.example".to_string(),
            ..ManifestConfig::default()
        })
        .unwrap();

        let refs = parser.parse("[A](https://other.example/1) [B](https://pos.example/list/2)");
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].kind, ReferenceKind::Positional(2));
    }

    #[test]
    fn test_numbered_link_on_other_host_ignored() {
        let text = "- [Lecture 1](https://youtu.be/v1)\n\nSee [bug report](https://github.com/org/repo/issues/2) for errata.\n";
        let refs = parser().parse(text);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].kind, ReferenceKind::Direct("v1".to_string()));
    }

    #[test]
    fn test_empty_position_host_disables_positional() {
        let parser = ManifestParser::new(&ManifestConfig {
            position_host: String::new(),
            ..ManifestConfig::default()
        })
        .unwrap();

        let refs = parser.parse("[A](https://indirect.example/1) [B](https://youtu.be/v2)");
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].kind, ReferenceKind::Direct("v2".to_string()));
    }

    #[test]
    fn test_huge_index_skipped() {
        let refs = parser().parse("[A](https://indirect.example/99999999999999999999999)");
        assert!(refs.is_empty());
    }

    #[test]
    fn test_canonical_link() {
        assert_eq!(parser().canonical_link("Intro", "v1"), "[Intro](https://youtu.be/v1)");
    }
}
