//! Content-safety classification of inbound uploads.

use crate::config::ForbiddenSets;
use std::io::Cursor;

/// How many leading bytes are fed to the media-type sniffer.
const SNIFF_LEN: usize = 2048;

/// Classifies inbound content as allowed or forbidden using the filename,
/// the declared media type, the sniffed media type, and (for zip archives)
/// the member names one level deep.
pub struct ContentFilter {
    sets: ForbiddenSets,
}

impl ContentFilter {
    pub fn new(sets: ForbiddenSets) -> Self {
        Self { sets }
    }

    pub fn digest_forbidden(&self, digest: &str) -> bool {
        self.sets.digest_forbidden(digest)
    }

    /// Returns true when the content must be rejected.
    ///
    /// The declared media type is untrusted client input; the type sniffed
    /// from the first 2048 bytes is authoritative for the media-type check.
    pub fn is_forbidden(&self, filename: &str, declared_type: &str, body: &[u8]) -> bool {
        if self.filename_forbidden(filename) {
            return true;
        }
        if self.sets.media_type_forbidden(declared_type) {
            return true;
        }
        let sniffed_type = sniff_media_type(body);
        if let Some(sniffed) = &sniffed_type {
            if self.sets.media_type_forbidden(sniffed) {
                return true;
            }
        }

        let looks_like_zip = filename.to_ascii_uppercase().ends_with(".ZIP")
            || declared_type.eq_ignore_ascii_case("application/zip")
            || sniffed_type.as_deref() == Some("application/zip");
        if looks_like_zip && self.archive_member_forbidden(body) {
            return true;
        }

        false
    }

    fn filename_forbidden(&self, filename: &str) -> bool {
        extensions(filename)
            .iter()
            .any(|ext| self.sets.extension_forbidden(ext))
    }

    /// Scan member names one level deep; nested archives are not opened.
    /// A corrupt archive cannot itself execute, so unreadable input passes.
    fn archive_member_forbidden(&self, body: &[u8]) -> bool {
        let Ok(archive) = zip::ZipArchive::new(Cursor::new(body)) else {
            return false;
        };
        archive.file_names().any(|name| self.filename_forbidden(name))
    }
}

/// Up to two extensions taken from the right of the filename, so double
/// extensions like `invoice.pdf.exe` cannot hide the executable one.
fn extensions(filename: &str) -> Vec<&str> {
    let parts: Vec<&str> = filename.rsplitn(3, '.').collect();
    if parts.len() < 2 {
        return Vec::new();
    }
    parts[..parts.len() - 1].to_vec()
}

fn sniff_media_type(body: &[u8]) -> Option<String> {
    let head = &body[..body.len().min(SNIFF_LEN)];
    infer::get(head).map(|kind| kind.mime_type().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    // Truncated PE header used as sniffing fixture.
    const EXE_HEADER_HEX: &str = "4D5A90000300000004000000FFFF0000B8000000000000004000000000000000\
         00000000000000000000000000000000000000000000000000000000E8000000\
         0E1FBA0E00B409CD21B8014CCD21546869732070726F6772616D2063616E6E6F\
         742062652072756E20696E20444F53206D6F64652E0D0D0A2400000000000000";

    fn filter() -> ContentFilter {
        ContentFilter::new(ForbiddenSets::default())
    }

    fn zip_with_member(name: &str) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        writer.start_file(name, options).unwrap();
        writer.write_all(b"member payload").unwrap();
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn rejects_forbidden_extension() {
        assert!(filter().is_forbidden("x.exe", "application/octet-stream", b"content"));
        assert!(filter().is_forbidden("X.EXE", "application/octet-stream", b"content"));
        assert!(filter().is_forbidden("invoice.pdf.exe", "application/pdf", b"content"));
        assert!(!filter().is_forbidden("notes.txt", "text/plain", b"content"));
    }

    #[test]
    fn rejects_forbidden_declared_type() {
        assert!(filter().is_forbidden("download", "application/x-msdownload", b"content"));
    }

    #[test]
    fn sniffed_type_overrides_innocent_name() {
        let body = hex::decode(EXE_HEADER_HEX.replace(char::is_whitespace, "")).unwrap();
        assert!(filter().is_forbidden("file.txt", "text/plain", &body));
    }

    #[test]
    fn rejects_zip_with_forbidden_member() {
        let body = zip_with_member("y.exe");
        assert!(filter().is_forbidden("bundle.zip", "application/zip", &body));
    }

    #[test]
    fn scans_zip_detected_only_by_sniffing() {
        let body = zip_with_member("y.exe");
        assert!(filter().is_forbidden("data.bin", "application/octet-stream", &body));
    }

    #[test]
    fn accepts_zip_with_clean_members() {
        let body = zip_with_member("report.pdf");
        assert!(!filter().is_forbidden("bundle.zip", "application/zip", &body));
    }

    #[test]
    fn corrupt_archive_passes() {
        assert!(!filter().is_forbidden("file.zip", "application/zip", b"Bad Zip File"));
    }
}
