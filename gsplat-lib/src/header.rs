use crate::error::SplatError;
use foldhash::{HashMap, HashMapExt};
use memchr::memmem;

/// The end-of-header marker must appear within this many bytes.
pub const HEADER_SCAN_LIMIT: usize = 10 * 1024;

const END_HEADER: &[u8] = b"end_header\n";
const ELEMENT_VERTEX: &[u8] = b"element vertex ";
const ELEMENT: &[u8] = b"element ";
const PROPERTY: &[u8] = b"property ";

/// Schema of a splat .ply: byte offset of every vertex property within a row.
#[derive(Debug, Default, Clone)]
pub struct PlyHeader {
    pub field_offsets: HashMap<String, usize>,
    pub row_stride: usize,
    pub vertex_count: usize,
    /// Byte length of the text header including the end marker; vertex rows
    /// start here.
    pub header_len: usize,
}

impl PlyHeader {
    #[inline]
    pub fn offset(&self, name: &str) -> Option<usize> {
        self.field_offsets.get(name).copied()
    }

    #[inline]
    pub fn has(&self, name: &str) -> bool {
        self.field_offsets.contains_key(name)
    }

    /// Fields ordered by row offset, for diagnostics.
    pub fn fields_by_offset(&self) -> Vec<(&str, usize)> {
        let mut fields: Vec<(&str, usize)> = self
            .field_offsets
            .iter()
            .map(|(name, &offset)| (name.as_str(), offset))
            .collect();
        fields.sort_by_key(|&(_, offset)| offset);
        fields
    }
}

#[inline]
fn next_line<'b>(buffer: &'b [u8], offset: &mut usize) -> Option<&'b [u8]> {
    if *offset >= buffer.len() {
        return None;
    }
    let start = *offset;

    match memchr::memchr(b'\n', &buffer[*offset..]) {
        Some(pos) => {
            *offset = start + pos + 1;
            Some(&buffer[start..start + pos])
        }
        None => {
            *offset = buffer.len();
            Some(&buffer[start..])
        }
    }
}

#[inline]
fn property_width(ty: &str) -> usize {
    match ty {
        "double" => 8,
        "float" | "int" | "uint" => 4,
        "short" | "ushort" => 2,
        _ => 1,
    }
}

/// Parses the text header of a splat .ply buffer.
///
/// Only properties of the vertex element contribute to the row stride; lines
/// the schema does not care about (`ply`, `format`, `comment`, free-form) are
/// ignored.
pub fn parse_header(raw_data: &[u8]) -> Result<PlyHeader, SplatError> {
    let scan_end = raw_data.len().min(HEADER_SCAN_LIMIT);
    let marker =
        memmem::find(&raw_data[..scan_end], END_HEADER).ok_or(SplatError::HeaderNotFound)?;
    let header_len = marker + END_HEADER.len();

    let mut field_offsets: HashMap<String, usize> = HashMap::new();
    let mut row_stride = 0usize;
    let mut vertex_count: Option<usize> = None;

    let text = &raw_data[..marker];
    let mut offset = 0;
    while let Some(line) = next_line(text, &mut offset) {
        if vertex_count.is_none() {
            // Anything before the vertex element, properties included, is
            // not part of the vertex rows.
            if let Some(rest) = line.strip_prefix(ELEMENT_VERTEX) {
                let s = std::str::from_utf8(rest)
                    .map_err(|e| {
                        SplatError::MalformedHeader(format!("UTF-8 error in vertex count: {}", e))
                    })?
                    .trim();
                let count: usize = s.parse().map_err(|e| {
                    SplatError::MalformedHeader(format!("Bad vertex count {:?}: {}", s, e))
                })?;
                vertex_count = Some(count);
            }
            continue;
        }

        // A later element ends the vertex property list
        if line.starts_with(ELEMENT) {
            break;
        }

        let rest = match line.strip_prefix(PROPERTY) {
            Some(r) => r,
            None => continue,
        };
        let rest = match std::str::from_utf8(rest) {
            Ok(s) => s,
            Err(_) => continue,
        };
        let mut tokens = rest.split_whitespace();
        let ty = match tokens.next() {
            Some(t) => t,
            None => continue,
        };
        let name = match tokens.last() {
            Some(n) => n,
            None => continue,
        };
        field_offsets.insert(name.to_string(), row_stride);
        row_stride += property_width(ty);
    }

    let vertex_count = vertex_count.ok_or_else(|| {
        SplatError::MalformedHeader("No 'element vertex' line in header".to_string())
    })?;

    Ok(PlyHeader {
        field_offsets,
        row_stride,
        vertex_count,
        header_len,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_offsets_in_declared_order() {
        let header = b"ply\n\
format binary_little_endian 1.0\n\
element vertex 42\n\
property float scale_1\n\
property float x\n\
property float rot_3\n\
property float opacity\n\
property float f_dc_0\n\
property float y\n\
property float z\n\
end_header\n";
        let parsed = parse_header(header).expect("parse_header failed");

        assert_eq!(parsed.vertex_count, 42);
        assert_eq!(parsed.row_stride, 7 * 4);
        assert_eq!(parsed.header_len, header.len());
        assert_eq!(parsed.offset("scale_1"), Some(0));
        assert_eq!(parsed.offset("x"), Some(4));
        assert_eq!(parsed.offset("rot_3"), Some(8));
        assert_eq!(parsed.offset("opacity"), Some(12));
        assert_eq!(parsed.offset("f_dc_0"), Some(16));
        assert_eq!(parsed.offset("y"), Some(20));
        assert_eq!(parsed.offset("z"), Some(24));
        assert_eq!(parsed.offset("missing"), None);
        assert!(parsed.has("x") && !parsed.has("w"));
    }

    #[test]
    fn test_property_width_table() {
        let header = b"ply\n\
element vertex 1\n\
property double x\n\
property uchar red\n\
property short flags\n\
property uint id\n\
property ushort half_id\n\
property int signed_id\n\
property exotic mystery\n\
end_header\n";
        let parsed = parse_header(header).expect("parse_header failed");

        assert_eq!(parsed.offset("x"), Some(0));
        assert_eq!(parsed.offset("red"), Some(8));
        assert_eq!(parsed.offset("flags"), Some(9));
        assert_eq!(parsed.offset("id"), Some(11));
        assert_eq!(parsed.offset("half_id"), Some(15));
        assert_eq!(parsed.offset("signed_id"), Some(17));
        // Unknown types fall back to a single byte
        assert_eq!(parsed.offset("mystery"), Some(21));
        assert_eq!(parsed.row_stride, 22);
    }

    #[test]
    fn test_missing_marker_is_header_not_found() {
        let data = b"ply\nelement vertex 3\nproperty float x\n";
        match parse_header(data) {
            Err(SplatError::HeaderNotFound) => {}
            other => panic!("Expected HeaderNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_marker_past_scan_window_is_header_not_found() {
        let mut data = vec![b'c'; HEADER_SCAN_LIMIT + 256];
        data.extend_from_slice(b"\nelement vertex 1\nend_header\n");
        assert!(matches!(
            parse_header(&data),
            Err(SplatError::HeaderNotFound)
        ));
    }

    #[test]
    fn test_missing_vertex_element_is_malformed() {
        let data = b"ply\nformat binary_little_endian 1.0\nproperty float x\nend_header\n";
        assert!(matches!(
            parse_header(data),
            Err(SplatError::MalformedHeader(_))
        ));
    }

    #[test]
    fn test_bad_vertex_count_is_malformed() {
        let data = b"ply\nelement vertex lots\nend_header\n";
        assert!(matches!(
            parse_header(data),
            Err(SplatError::MalformedHeader(_))
        ));
    }

    #[test]
    fn test_only_vertex_element_properties_count() {
        let header = b"ply\n\
comment made up for this test\n\
element camera 1\n\
property float focal\n\
element vertex 7\n\
property float x\n\
property float y\n\
element face 9\n\
property float nx\n\
end_header\n";
        let parsed = parse_header(header).expect("parse_header failed");

        assert_eq!(parsed.vertex_count, 7);
        // focal (before) and nx (after) stay out of the vertex stride
        assert_eq!(parsed.row_stride, 8);
        assert_eq!(parsed.offset("focal"), None);
        assert_eq!(parsed.offset("nx"), None);
        assert_eq!(parsed.offset("x"), Some(0));
        assert_eq!(parsed.offset("y"), Some(4));
    }

    #[test]
    fn test_header_len_points_at_first_row() {
        let mut data = b"ply\nelement vertex 1\nproperty float x\nend_header\n".to_vec();
        let text_len = data.len();
        data.extend_from_slice(&9.5f32.to_le_bytes());

        let parsed = parse_header(&data).expect("parse_header failed");
        assert_eq!(parsed.header_len, text_len);
        assert_eq!(
            f32::from_le_bytes([
                data[parsed.header_len],
                data[parsed.header_len + 1],
                data[parsed.header_len + 2],
                data[parsed.header_len + 3]
            ]),
            9.5
        );
    }

    #[test]
    fn test_fields_by_offset_sorted() {
        let header = b"ply\nelement vertex 1\nproperty float b\nproperty float a\nend_header\n";
        let parsed = parse_header(header).expect("parse_header failed");
        assert_eq!(parsed.fields_by_offset(), vec![("b", 0), ("a", 4)]);
    }
}
