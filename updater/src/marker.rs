//! Reading the `version.txt` shipped next to the executable. The file is
//! produced by different tools over time, so its encoding varies.

use crate::Version;
use encoding_rs::Encoding;
use encoding_rs::UTF_8;
use encoding_rs::UTF_16BE;
use encoding_rs::UTF_16LE;
use std::path::Path;

pub const VERSION_FILE_NAME: &str = "version.txt";

/// Decodes UTF-8 (with or without BOM) and UTF-16 (with BOM, or without one
/// when NUL placement gives the byte order away).
pub fn decode_marker(bytes: &[u8]) -> String {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        let (text, _) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
        return text.into_owned();
    }
    let encoding = sniff_utf16(bytes).unwrap_or(UTF_8);
    let (text, _) = encoding.decode_without_bom_handling(bytes);
    text.into_owned()
}

fn sniff_utf16(bytes: &[u8]) -> Option<&'static Encoding> {
    if bytes.len() < 2 {
        return None;
    }
    let (mut even_nuls, mut odd_nuls) = (0usize, 0usize);
    for (idx, byte) in bytes.iter().enumerate() {
        if *byte == 0 {
            if idx % 2 == 0 {
                even_nuls += 1;
            } else {
                odd_nuls += 1;
            }
        }
    }
    let pairs = bytes.len() / 2;
    if odd_nuls * 2 > pairs && odd_nuls > even_nuls {
        Some(UTF_16LE)
    } else if even_nuls * 2 > pairs && even_nuls > odd_nuls {
        Some(UTF_16BE)
    } else {
        None
    }
}

/// Prefers a `RemoteHand version: x.y.z` line and falls back to the first
/// line that is a bare version.
pub fn parse_marker(text: &str) -> Option<Version> {
    let labelled = text.lines().find_map(|line| {
        let lower = line.to_lowercase();
        if !(lower.contains("remotehand") && lower.contains("ver")) {
            return None;
        }
        let (_, value) = line.rsplit_once(':')?;
        Version::parse(value).ok()
    });
    labelled.or_else(|| text.lines().find_map(|line| Version::parse(line).ok()))
}

/// Local version from the marker, or `fallback` when the marker is missing
/// or does not contain a version.
pub fn read_local_version(path: &Path, fallback: &Version) -> Version {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::debug!(
                "version marker {} unavailable ({err}); using {fallback}",
                path.display()
            );
            return fallback.clone();
        }
    };
    match parse_marker(&decode_marker(&bytes)) {
        Some(version) => version,
        None => {
            tracing::warn!(
                "version marker {} has no version; using {fallback}",
                path.display()
            );
            fallback.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    const MARKER: &str = "RemoteHand\r\nRemoteHand Version: 1.0.14\r\nBuild: release\r\n";

    fn utf16le(text: &str) -> Vec<u8> {
        text.encode_utf16().flat_map(u16::to_le_bytes).collect()
    }

    fn utf16be(text: &str) -> Vec<u8> {
        text.encode_utf16().flat_map(u16::to_be_bytes).collect()
    }

    fn expected() -> Version {
        Version::parse("1.0.14").expect("version")
    }

    #[test]
    fn all_supported_encodings_yield_the_same_version() {
        let mut utf8_bom = vec![0xEF, 0xBB, 0xBF];
        utf8_bom.extend_from_slice(MARKER.as_bytes());
        let mut le_bom = vec![0xFF, 0xFE];
        le_bom.extend(utf16le(MARKER));
        let mut be_bom = vec![0xFE, 0xFF];
        be_bom.extend(utf16be(MARKER));

        let variants = [
            ("utf-8", MARKER.as_bytes().to_vec()),
            ("utf-8 bom", utf8_bom),
            ("utf-16le bom", le_bom),
            ("utf-16be bom", be_bom),
            ("utf-16le bare", utf16le(MARKER)),
            ("utf-16be bare", utf16be(MARKER)),
        ];
        for (label, bytes) in variants {
            assert_eq!(
                parse_marker(&decode_marker(&bytes)),
                Some(expected()),
                "{label}"
            );
        }
    }

    #[test]
    fn bare_version_line_is_accepted() {
        assert_eq!(parse_marker("\n1.2.3\n"), Version::parse("1.2.3").ok());
    }

    #[test]
    fn missing_marker_falls_back() {
        let dir = TempDir::new().expect("tempdir");
        let fallback = Version::parse("1.0.0").expect("version");
        let version = read_local_version(&dir.path().join(VERSION_FILE_NAME), &fallback);
        assert_eq!(version, fallback);
    }

    #[test]
    fn marker_without_version_falls_back() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join(VERSION_FILE_NAME);
        std::fs::write(&path, "RemoteHand version: unknown\n").expect("write");
        let fallback = Version::parse("2.0").expect("version");
        assert_eq!(read_local_version(&path, &fallback), fallback);
    }
}
