//! Wire-level text: identity tags and command formatting.
//!
//! The external record format has no native concept of a remote identity,
//! so identity rides on the textual keyword field using a bracketed tag
//! grammar: `KEYWORD:{stream_id:<id>}{app_id:<id>}`. This module owns that
//! grammar plus the fixed write/delete command forms built from it.

use crate::record::{CacheRecord, CommandKind};
use crate::types::StreamId;

/// A keyword field with its embedded identity tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedKeyword {
    /// The raw keyword text, possibly version-suffixed, without tags.
    pub keyword: String,
    /// The embedded stream id, if present.
    pub stream_id: Option<String>,
    /// The embedded application id, if present.
    pub application_id: Option<String>,
}

impl TaggedKeyword {
    /// Creates a tagged keyword.
    #[must_use]
    pub fn new(
        keyword: impl Into<String>,
        stream_id: Option<String>,
        application_id: Option<String>,
    ) -> Self {
        Self {
            keyword: keyword.into(),
            stream_id,
            application_id,
        }
    }

    /// Parses a keyword field, splitting off any identity tags.
    ///
    /// Parsing is lenient: a malformed tag section is ignored and treated
    /// as "no identity" rather than an error.
    #[must_use]
    pub fn parse(field: &str) -> Self {
        let field = field.trim();
        let Some((keyword, tags)) = field.split_once(':') else {
            return Self::new(field, None, None);
        };

        let mut stream_id = None;
        let mut application_id = None;
        let mut rest = tags;
        while let Some(open) = rest.find('{') {
            let Some(close) = rest[open..].find('}') else {
                break;
            };
            let body = &rest[open + 1..open + close];
            if let Some((name, value)) = body.split_once(':') {
                match name {
                    "stream_id" if !value.is_empty() => stream_id = Some(value.to_string()),
                    "app_id" if !value.is_empty() => application_id = Some(value.to_string()),
                    _ => {}
                }
            }
            rest = &rest[open + close + 1..];
        }

        Self::new(keyword, stream_id, application_id)
    }

    /// Formats the field with its tags re-attached.
    #[must_use]
    pub fn format(&self) -> String {
        let mut out = self.keyword.clone();
        if self.stream_id.is_some() || self.application_id.is_some() {
            out.push(':');
            if let Some(stream) = &self.stream_id {
                out.push_str(&format!("{{stream_id:{stream}}}"));
            }
            if let Some(app) = &self.application_id {
                out.push_str(&format!("{{app_id:{app}}}"));
            }
        }
        out
    }
}

/// Replaces the stream id inside an existing `{stream_id:...}` tag.
///
/// Used when relocating a record to a new stream; the record body is left
/// untouched. Text without a stream tag is returned unchanged.
#[must_use]
pub fn replace_stream_tag(text: &str, stream: &StreamId) -> String {
    const OPEN: &str = "{stream_id:";
    let Some(start) = text.find(OPEN) else {
        return text.to_string();
    };
    let Some(close) = text[start..].find('}') else {
        return text.to_string();
    };
    let mut out = String::with_capacity(text.len());
    out.push_str(&text[..start + OPEN.len()]);
    out.push_str(stream.as_str());
    out.push_str(&text[start + close..]);
    out
}

/// Formats the external write command for a latest record.
#[must_use]
pub fn write_command(record: &CacheRecord) -> String {
    let field = TaggedKeyword::new(
        record.keyword().as_str(),
        record.stream_id().map(|s| s.as_str().to_string()),
        record.application_id().map(|a| a.as_str().to_string()),
    )
    .format();
    match record.kind() {
        CommandKind::Indexed => {
            format!("SET\t{field}\t{}\t{}", record.index(), record.payload())
        }
        CommandKind::Positional => {
            format!("SET_AT\t{}\t{field}\t{}", record.index(), record.payload())
        }
    }
}

/// Formats the external delete command for a record.
#[must_use]
pub fn delete_command(record: &CacheRecord) -> String {
    match record.kind() {
        CommandKind::Indexed => {
            format!("DELETE\t{}\t{}", record.keyword(), record.index())
        }
        CommandKind::Positional => {
            format!("DELETE_AT\t{}\t{}", record.index(), record.keyword())
        }
    }
}

/// A record line decoded from a bulk read or a write command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLine {
    /// The keyword field, tags included.
    pub field: TaggedKeyword,
    /// The positional index.
    pub index: u32,
    /// The record body.
    pub payload: String,
    /// The addressing kind implied by the line form.
    pub kind: CommandKind,
}

/// Parses one raw line from the external system.
///
/// Accepts the `SET` / `SET_AT` command forms as well as verb-less bulk
/// read lines (`<keyword field>\t<index>\t<payload>`). Returns `None` for
/// lines that do not carry a record.
#[must_use]
pub fn parse_line(line: &str) -> Option<ParsedLine> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.is_empty() {
        return None;
    }
    let mut parts = line.split('\t');
    let first = parts.next()?;

    match first {
        "SET" => {
            let field = TaggedKeyword::parse(parts.next()?);
            let index: u32 = parts.next()?.trim().parse().ok()?;
            let payload = join_rest(parts);
            Some(ParsedLine {
                field,
                index,
                payload,
                kind: CommandKind::Indexed,
            })
        }
        "SET_AT" => {
            let index: u32 = parts.next()?.trim().parse().ok()?;
            let field = TaggedKeyword::parse(parts.next()?);
            let payload = join_rest(parts);
            Some(ParsedLine {
                field,
                index,
                payload,
                kind: CommandKind::Positional,
            })
        }
        _ => {
            let field = TaggedKeyword::parse(first);
            let index: u32 = parts.next()?.trim().parse().ok()?;
            let payload = join_rest(parts);
            Some(ParsedLine {
                field,
                index,
                payload,
                kind: CommandKind::Indexed,
            })
        }
    }
}

fn join_rest<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    parts.collect::<Vec<_>>().join("\t")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyword::{AliasTable, Keyword};
    use crate::types::{AppId, RecordIndex};

    fn record(kind: CommandKind) -> CacheRecord {
        let mut rec = CacheRecord::new(
            Keyword::canonical("NODE", &AliasTable::new()).unwrap(),
            RecordIndex::new(4),
            "X,1,2,3".to_string(),
            AppId::normalize("a1"),
            None,
            kind,
        );
        rec.set_stream_id(StreamId::new("s1"));
        rec
    }

    #[test]
    fn tag_round_trip() {
        let tagged = TaggedKeyword::new("NODE.3", Some("s1".into()), Some("a1".into()));
        let text = tagged.format();
        assert_eq!(text, "NODE.3:{stream_id:s1}{app_id:a1}");
        assert_eq!(TaggedKeyword::parse(&text), tagged);
    }

    #[test]
    fn parse_without_tags() {
        let tagged = TaggedKeyword::parse("NODE.3");
        assert_eq!(tagged.keyword, "NODE.3");
        assert!(tagged.stream_id.is_none());
        assert!(tagged.application_id.is_none());
    }

    #[test]
    fn parse_app_tag_only() {
        let tagged = TaggedKeyword::parse("PROP:{app_id:p9}");
        assert_eq!(tagged.keyword, "PROP");
        assert_eq!(tagged.application_id.as_deref(), Some("p9"));
        assert!(tagged.stream_id.is_none());
    }

    #[test]
    fn malformed_tags_ignored() {
        let tagged = TaggedKeyword::parse("NODE:{app_id");
        assert_eq!(tagged.keyword, "NODE");
        assert!(tagged.application_id.is_none());
    }

    #[test]
    fn replace_stream_preserves_body() {
        let cmd = "SET\tNODE:{stream_id:old}{app_id:a1}\t4\tX,old,3";
        let out = replace_stream_tag(cmd, &StreamId::new("new"));
        assert_eq!(out, "SET\tNODE:{stream_id:new}{app_id:a1}\t4\tX,old,3");
    }

    #[test]
    fn replace_stream_without_tag_is_identity() {
        let cmd = "SET\tNODE\t4\tX";
        assert_eq!(replace_stream_tag(cmd, &StreamId::new("new")), cmd);
    }

    #[test]
    fn indexed_write_command() {
        let cmd = write_command(&record(CommandKind::Indexed));
        assert_eq!(cmd, "SET\tNODE:{stream_id:s1}{app_id:a1}\t4\tX,1,2,3");
    }

    #[test]
    fn positional_write_command() {
        let cmd = write_command(&record(CommandKind::Positional));
        assert_eq!(cmd, "SET_AT\t4\tNODE:{stream_id:s1}{app_id:a1}\tX,1,2,3");
    }

    #[test]
    fn delete_commands() {
        assert_eq!(delete_command(&record(CommandKind::Indexed)), "DELETE\tNODE\t4");
        assert_eq!(
            delete_command(&record(CommandKind::Positional)),
            "DELETE_AT\t4\tNODE"
        );
    }

    #[test]
    fn parse_set_line_round_trip() {
        let parsed = parse_line("SET\tNODE:{stream_id:s1}{app_id:a1}\t4\tX,1,2,3").unwrap();
        assert_eq!(parsed.field.keyword, "NODE");
        assert_eq!(parsed.field.stream_id.as_deref(), Some("s1"));
        assert_eq!(parsed.field.application_id.as_deref(), Some("a1"));
        assert_eq!(parsed.index, 4);
        assert_eq!(parsed.payload, "X,1,2,3");
        assert_eq!(parsed.kind, CommandKind::Indexed);
    }

    #[test]
    fn parse_set_at_line() {
        let parsed = parse_line("SET_AT\t2\tLIST\tfirst\tsecond").unwrap();
        assert_eq!(parsed.kind, CommandKind::Positional);
        assert_eq!(parsed.index, 2);
        assert_eq!(parsed.payload, "first\tsecond");
    }

    #[test]
    fn parse_verbless_bulk_line() {
        let parsed = parse_line("NODE.3\t7\tX,1,2,3").unwrap();
        assert_eq!(parsed.field.keyword, "NODE.3");
        assert_eq!(parsed.index, 7);
        assert_eq!(parsed.kind, CommandKind::Indexed);
    }

    #[test]
    fn parse_rejects_junk() {
        assert!(parse_line("").is_none());
        assert!(parse_line("NODE").is_none());
        assert!(parse_line("NODE\tnot-a-number\tbody").is_none());
    }
}
