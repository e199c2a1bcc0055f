//! EXIF handling for face crops: reading the capture date of a source photo,
//! and writing/reading the face annotation stored in `UserComment`.

use chrono::NaiveDate;
use exif::experimental::Writer;
use exif::{Field, In, Tag, Value};
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use std::io::Cursor;

use crate::error::{PipelineError, Result};
use crate::vision::FaceAnnotation;

/// Stands in for the capture date when a photo carries none. The spelling
/// is relied upon by existing crop filenames.
pub const UNKNOWN_CREATION_DATE: &str = "UNKONWN_TIME";

const APP1_MARKER: [u8; 2] = [0xFF, 0xE1];
const APP0_MARKER: [u8; 2] = [0xFF, 0xE0];
const SOI_MARKER: [u8; 2] = [0xFF, 0xD8];
const EXIF_HEADER: &[u8; 6] = b"Exif\0\0";

/// 8-byte character code prefixes `UserComment` may start with.
const CHARSET_PREFIXES: [&[u8; 8]; 4] = [
    b"ASCII\0\0\0",
    b"UNICODE\0",
    b"JIS\0\0\0\0\0",
    b"\0\0\0\0\0\0\0\0",
];

/// Capture date of an encoded photo as `YYYY-MM-DD`, or
/// [`UNKNOWN_CREATION_DATE`] when it has no usable `DateTimeOriginal`.
pub fn creation_date(bytes: &[u8]) -> String {
    read_exif(bytes)
        .and_then(|exif| {
            exif.get_field(Tag::DateTimeOriginal, In::PRIMARY)
                .and_then(|field| match field.value {
                    Value::Ascii(ref values) => values.first().and_then(|raw| format_exif_date(raw)),
                    _ => None,
                })
        })
        .unwrap_or_else(|| UNKNOWN_CREATION_DATE.to_string())
}

/// `2022:10:16 09:12:00` becomes `2022-10-16`.
fn format_exif_date(raw: &[u8]) -> Option<String> {
    let date = std::str::from_utf8(raw.get(..10)?).ok()?;
    NaiveDate::parse_from_str(date, "%Y:%m:%d")
        .ok()
        .map(|date| date.format("%Y-%m-%d").to_string())
}

fn read_exif(bytes: &[u8]) -> Option<exif::Exif> {
    exif::Reader::new()
        .read_from_container(&mut Cursor::new(bytes))
        .ok()
}

/// The `UserComment` field carrying `json` verbatim.
pub fn user_comment_field(json: &str) -> Field {
    Field {
        tag: Tag::UserComment,
        ifd_num: In::PRIMARY,
        value: Value::Undefined(json.as_bytes().to_vec(), 0),
    }
}

/// Serialize a TIFF-structured EXIF block holding only `fields`.
pub fn exif_block(fields: &[Field]) -> Result<Vec<u8>> {
    let mut writer = Writer::new();
    for field in fields {
        writer.push_field(field);
    }

    let mut tiff = Cursor::new(Vec::new());
    writer.write(&mut tiff, false)?;
    Ok(tiff.into_inner())
}

/// Splice `tiff` into `jpeg` as an APP1 EXIF segment, after the JFIF header
/// when there is one.
pub fn insert_exif_segment(jpeg: &[u8], tiff: &[u8]) -> Result<Vec<u8>> {
    if jpeg.get(..2) != Some(&SOI_MARKER[..]) {
        return Err(PipelineError::Image(image::ImageError::Decoding(
            image::error::DecodingError::new(
                image::ImageFormat::Jpeg.into(),
                "missing start-of-image marker",
            ),
        )));
    }

    let segment_len = 2 + EXIF_HEADER.len() + tiff.len();
    let segment_len = u16::try_from(segment_len).map_err(|_| PipelineError::MetadataTooLarge(tiff.len()))?;

    let mut insert_at = 2;
    if jpeg.get(2..4) == Some(&APP0_MARKER[..]) {
        if let Some(len) = jpeg.get(4..6) {
            let app0_len = usize::from(u16::from_be_bytes([len[0], len[1]]));
            if 4 + app0_len <= jpeg.len() {
                insert_at = 4 + app0_len;
            }
        }
    }

    let mut out = Vec::with_capacity(jpeg.len() + usize::from(segment_len) + 2);
    out.extend_from_slice(&jpeg[..insert_at]);
    out.extend_from_slice(&APP1_MARKER);
    out.extend_from_slice(&segment_len.to_be_bytes());
    out.extend_from_slice(EXIF_HEADER);
    out.extend_from_slice(tiff);
    out.extend_from_slice(&jpeg[insert_at..]);
    Ok(out)
}

/// Encode `image` as JPEG carrying a fresh EXIF block made of `fields` only.
pub fn encode_jpeg(image: &DynamicImage, quality: u8, fields: &[Field]) -> Result<Vec<u8>> {
    let rgb = image.to_rgb8();
    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, quality).encode_image(&rgb)?;

    if fields.is_empty() {
        return Ok(jpeg);
    }
    insert_exif_segment(&jpeg, &exif_block(fields)?)
}

/// Text stored in the `UserComment` field of an encoded image, without any
/// character code prefix.
pub fn read_user_comment(bytes: &[u8]) -> Result<Option<String>> {
    let exif = match exif::Reader::new().read_from_container(&mut Cursor::new(bytes)) {
        Ok(exif) => exif,
        Err(exif::Error::NotFound(_)) => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let raw = match exif.get_field(Tag::UserComment, In::PRIMARY).map(|f| &f.value) {
        Some(Value::Undefined(raw, _)) => raw.as_slice(),
        _ => return Ok(None),
    };

    let text = CHARSET_PREFIXES
        .iter()
        .find_map(|prefix| raw.strip_prefix(&prefix[..]))
        .unwrap_or(raw);

    String::from_utf8(text.to_vec())
        .map(Some)
        .map_err(|e| PipelineError::MalformedResult(format!("UserComment is not UTF-8: {}", e)))
}

/// Recover the face annotation embedded in a face crop.
pub fn read_face_annotation(bytes: &[u8]) -> Result<Option<FaceAnnotation>> {
    match read_user_comment(bytes)? {
        Some(json) => Ok(Some(serde_json::from_str(&json)?)),
        None => Ok(None),
    }
}
