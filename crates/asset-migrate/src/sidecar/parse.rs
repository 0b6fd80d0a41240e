//! YAML text to [`SidecarNode`] trees.

use serde::Deserialize;
use serde_yaml::Value;

use super::{SidecarError, SidecarNode};

const DOCUMENT_START: &str = "---";

/// Parse the first document of a YAML stream.
pub fn parse(text: &str) -> Result<SidecarNode, SidecarError> {
    parse_documents(text)?
        .into_iter()
        .next()
        .ok_or(SidecarError::Empty)
}

/// Parse every non-empty document of a YAML stream.
pub fn parse_documents(text: &str) -> Result<Vec<SidecarNode>, SidecarError> {
    let prepared = prepare(text);
    let mut documents = Vec::new();
    for document in serde_yaml::Deserializer::from_str(&prepared) {
        let value = Value::deserialize(document)?;
        if value.is_null() {
            continue;
        }
        documents.push(SidecarNode::from(value));
    }
    Ok(documents)
}

/// Normalize serializer quirks that a conforming YAML parser rejects or
/// would reinterpret.
///
/// Document headers such as `--- !u!21 &2100000 stripped` are reduced to
/// `---`: the `%TAG` directive that defines `!u!` only applies to the first
/// document of a stream. Directives before the first header are dropped
/// with it. Number-like plain values are quoted so that their text
/// survives verbatim.
fn prepare(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 64);
    let mut scan = ScanState::default();
    let mut in_document = false;
    for line in text.lines() {
        if line == DOCUMENT_START || line.starts_with("--- ") {
            in_document = true;
            scan = ScanState::default();
            out.push_str(DOCUMENT_START);
        } else if line.starts_with('%') && !in_document {
            continue;
        } else {
            quote_line(line, &mut scan, &mut out);
        }
        out.push('\n');
    }
    out
}

/// Scanner state carried from one line to the next.
#[derive(Debug, Default)]
struct ScanState {
    /// Open quote character of a scalar spanning lines.
    quote: Option<u8>,
    /// Nesting of `{`/`[` flow collections.
    flow: usize,
    /// Indentation of the line that opened a `|`/`>` block scalar.
    block: Option<usize>,
}

fn indentation(line: &str) -> usize {
    line.bytes().take_while(|b| *b == b' ').count()
}

/// Copy `line` to `out`, quoting number-like plain values.
///
/// Values start after `: `, after a `- ` sequence marker at the start of a
/// line, and after `{`, `[` or `,` inside flow collections.
fn quote_line(line: &str, state: &mut ScanState, out: &mut String) {
    let indent = indentation(line);
    if let Some(block) = state.block {
        if line.trim().is_empty() || indent > block {
            out.push_str(line);
            return;
        }
        state.block = None;
    }

    let bytes = line.as_bytes();
    let mut copied = 0;
    let mut i = 0;
    let mut value_at = None;

    if state.quote.is_none() && state.flow == 0 {
        i = indent;
        let mut sequence = false;
        while bytes[i..].starts_with(b"- ") {
            sequence = true;
            i += 2;
            while i < bytes.len() && bytes[i] == b' ' {
                i += 1;
            }
        }
        if sequence {
            value_at = Some(i);
        } else if matches!(bytes.get(i), Some(b'"' | b'\'')) {
            // Quoted key.
            state.quote = Some(bytes[i]);
            i += 1;
        }
    }

    while i < bytes.len() {
        if let Some(start) = value_at.take() {
            match bytes.get(start) {
                Some(q @ (b'"' | b'\'')) => {
                    state.quote = Some(*q);
                    i = start + 1;
                }
                Some(b'{' | b'[') => {
                    state.flow += 1;
                    value_at = Some(skip_spaces(bytes, start + 1));
                    i = start + 1;
                }
                Some(_) => {
                    let len = plain_token_len(&line[start..], state.flow > 0);
                    if is_number_like(&line[start..start + len]) {
                        out.push_str(&line[copied..start]);
                        out.push('"');
                        out.push_str(&line[start..start + len]);
                        out.push('"');
                        copied = start + len;
                        i = copied;
                    } else {
                        i = start;
                    }
                }
                None => i = start,
            }
            continue;
        }

        let b = bytes[i];
        if let Some(q) = state.quote {
            if q == b'"' && b == b'\\' {
                i += 2;
                continue;
            }
            if b == q {
                state.quote = None;
            }
            i += 1;
            continue;
        }

        match b {
            b':' if matches!(bytes.get(i + 1), None | Some(b' ')) => {
                value_at = Some(skip_spaces(bytes, i + 1));
            }
            b',' if state.flow > 0 => value_at = Some(skip_spaces(bytes, i + 1)),
            b'}' | b']' if state.flow > 0 => state.flow -= 1,
            b'#' if i == 0 || bytes[i - 1] == b' ' => break,
            _ => {}
        }
        i += 1;
    }

    out.push_str(&line[copied..]);

    if state.quote.is_none() && state.flow == 0 && opens_block_scalar(line) {
        state.block = Some(indent);
    }
}

fn skip_spaces(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && bytes[i] == b' ' {
        i += 1;
    }
    i
}

/// Byte length of the plain scalar at the start of `rest`, without
/// trailing spaces or a comment.
fn plain_token_len(rest: &str, in_flow: bool) -> usize {
    let mut end = rest.len();
    if in_flow {
        if let Some(pos) = rest.find([',', '}', ']']) {
            end = pos;
        }
    }
    if let Some(pos) = rest[..end].find(" #") {
        end = pos;
    }
    rest[..end].trim_end().len()
}

/// Text a YAML 1.2 resolver could turn into a number: `1.10`, `007`,
/// `-0.5e3`, `.inf`, or a 32-digit guid.
fn is_number_like(token: &str) -> bool {
    let Some(first) = token.bytes().next() else {
        return false;
    };
    let lower = token.to_ascii_lowercase();
    (first.is_ascii_digit() || matches!(first, b'+' | b'-' | b'.'))
        && token
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'+' | b'-' | b'_'))
        && (token.bytes().any(|b| b.is_ascii_digit())
            || lower.ends_with("inf")
            || lower.ends_with("nan"))
}

fn opens_block_scalar(line: &str) -> bool {
    let trimmed = line.trim_end();
    let Some((head, last)) = trimmed.rsplit_once(' ') else {
        return false;
    };
    !head.trim().is_empty()
        && (head.ends_with(':') || head.trim_start().ends_with('-'))
        && matches!(last, "|" | ">" | "|-" | ">-" | "|+" | ">+")
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEXTURE_META: &str = r#"fileFormatVersion: 2
guid: 9fb7c1a2d4e34b0f8c1d2e3f4a5b6c7d
TextureImporter:
  mipmaps:
    enableMipMap: 1
    sRGBTexture: 1
  textureType: 0
  alphaUsage: 1
userData:
assetBundleName:
"#;

    const MATERIAL: &str = r#"%YAML 1.1
%TAG !u! tag:unity3d.com,2011:
--- !u!21 &2100000
Material:
  serializedVersion: 6
  m_Name: Brick
  m_Shader: {fileID: 46, guid: 0000000000000000f000000000000000, type: 0}
  m_Parent: {fileID: 0}
  m_SavedProperties:
    m_TexEnvs:
    - _MainTex:
        m_Texture: {fileID: 2800000, guid: 0000000000000000e000000000000000, type: 3}
        m_Scale: {x: 1, y: 1}
    m_Floats:
    - _Glossiness: 0.5
"#;

    #[test]
    fn test_parse_meta() {
        let node = parse(TEXTURE_META).unwrap();
        assert_eq!(
            node.child("guid").unwrap().as_str().unwrap(),
            "9fb7c1a2d4e34b0f8c1d2e3f4a5b6c7d"
        );
        let importer = node.child("TextureImporter").unwrap();
        assert_eq!(
            importer
                .child("mipmaps")
                .unwrap()
                .child("enableMipMap")
                .unwrap()
                .as_i64()
                .unwrap(),
            1
        );
        // Empty values come through as empty scalars.
        assert_eq!(node.child("userData").unwrap().as_str().unwrap(), "");
    }

    #[test]
    fn test_parse_tagged_document() {
        let docs = parse_documents(MATERIAL).unwrap();
        assert_eq!(docs.len(), 1);
        let material = docs[0].child("Material").unwrap();
        assert_eq!(material.child("m_Name").unwrap().as_str().unwrap(), "Brick");
        let shader = material.child("m_Shader").unwrap();
        assert_eq!(shader.child("fileID").unwrap().as_i64().unwrap(), 46);
    }

    #[test]
    fn test_guid_survives_numeric_lookalike() {
        let docs = parse_documents(MATERIAL).unwrap();
        let texture = docs[0]
            .child("Material")
            .unwrap()
            .child("m_SavedProperties")
            .unwrap()
            .child("m_TexEnvs")
            .unwrap()
            .entries()
            .unwrap()[0]
            .1
            .child("m_Texture")
            .unwrap()
            .child("guid")
            .unwrap()
            .as_str()
            .unwrap()
            .to_string();
        assert_eq!(texture, "0000000000000000e000000000000000");

        let digits = parse("guid: 12345678901234567890123456789012\n").unwrap();
        assert_eq!(
            digits.child("guid").unwrap().as_str().unwrap(),
            "12345678901234567890123456789012"
        );
    }

    #[test]
    fn test_stripped_header_and_multiple_documents() {
        let text = "%YAML 1.1\n%TAG !u! tag:unity3d.com,2011:\n\
                    --- !u!1 &100\nGameObject:\n  m_Name: Root\n\
                    --- !u!4 &200 stripped\nTransform:\n  m_Father: {fileID: 0}\n";
        let docs = parse_documents(text).unwrap();
        assert_eq!(docs.len(), 2);
        assert!(docs[0].child("GameObject").is_ok());
        assert!(docs[1].child("Transform").is_ok());
    }

    #[test]
    fn test_malformed_yaml() {
        assert!(matches!(
            parse("invalid: yaml: content: ["),
            Err(SidecarError::Parse(_))
        ));
    }

    #[test]
    fn test_empty_stream() {
        assert!(matches!(parse(""), Err(SidecarError::Empty)));
    }

    #[test]
    fn test_directives_apply_to_every_document() {
        let text = "%YAML 1.1\n%TAG !u! tag:unity3d.com,2011:\n\
                    --- !u!21 &2100000\nMaterial:\n  m_Name: Brick\n\
                    --- !u!114 &5\nMonoBehaviour:\n  version: 7\n";
        let docs = parse_documents(text).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(
            docs[0]
                .child("Material")
                .unwrap()
                .child("m_Name")
                .unwrap()
                .as_str()
                .unwrap(),
            "Brick"
        );
        let behaviour = docs[1].child("MonoBehaviour").unwrap();
        assert_eq!(behaviour.child("version").unwrap().as_i64().unwrap(), 7);

        let first = parse(text).unwrap();
        assert!(first.child("Material").is_ok());
    }

    #[test]
    fn test_scalar_text_kept_verbatim() {
        let text = "m_Name: 1.10\n\
                    code: 007\n\
                    m_Scale: {x: 1.50, y: 2}\n\
                    m_Offsets:\n- 0.10\n- -1e3\n\
                    m_Label: \"size: 5\"\n\
                    m_Comment: 2.50 # trailing\n";
        let node = parse(text).unwrap();
        let text_of = |key: &str| node.child(key).unwrap().as_str().unwrap().to_string();
        assert_eq!(text_of("m_Name"), "1.10");
        assert_eq!(text_of("code"), "007");
        assert_eq!(text_of("m_Label"), "size: 5");
        assert_eq!(text_of("m_Comment"), "2.50");
        let scale = node.child("m_Scale").unwrap();
        assert_eq!(scale.child("x").unwrap().as_str().unwrap(), "1.50");
        assert_eq!(scale.child("y").unwrap().as_i64().unwrap(), 2);
        let offsets = node.child("m_Offsets").unwrap().as_sequence().unwrap();
        assert_eq!(offsets[0].as_str().unwrap(), "0.10");
        assert_eq!(offsets[1].as_f64().unwrap(), -1000.0);
    }

    #[test]
    fn test_prepare_leaves_strings_and_blocks_alone() {
        let text = "m_Text: |\n  width: 1.0\n  - 2.0\nm_Name: 'it''s 3.0'\nm_Key: 3.0\n";
        assert_eq!(
            prepare(text),
            "m_Text: |\n  width: 1.0\n  - 2.0\nm_Name: 'it''s 3.0'\nm_Key: \"3.0\"\n"
        );
        assert_eq!(prepare("guid: abc\n"), "guid: abc\n");
        assert_eq!(prepare("--- !u!1 &1 stripped\n"), "---\n");
    }
}
