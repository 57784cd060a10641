//! Minimal media-playlist parsing.
//!
//! A segmented manifest is a text playlist: comment/tag lines start with `#`,
//! every other non-empty line is a segment URI, in playback order. URIs may
//! be relative to the manifest's own URL.

use url::Url;

use crate::error::FetchError;

/// Parses the ordered list of segment URLs out of a manifest body,
/// resolving relative URIs against `base` (the manifest URL).
pub fn parse_segment_urls(manifest: &str, base: &Url) -> Result<Vec<String>, FetchError> {
    let mut out = Vec::new();
    for line in manifest.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let resolved = base
            .join(line)
            .map_err(|e| FetchError::Manifest(format!("bad segment URI {:?}: {}", line, e)))?;
        out.push(resolved.to_string());
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://cdn.example.com/v/720/playlist.m3u8").unwrap()
    }

    #[test]
    fn parses_relative_and_absolute_uris_in_order() {
        let manifest = "\
#EXTM3U
#EXT-X-VERSION:3
#EXT-X-TARGETDURATION:6
#EXTINF:6.0,
seg_000.ts
#EXTINF:6.0,
seg_001.ts
#EXTINF:4.2,
https://other.example.com/seg_002.ts
#EXT-X-ENDLIST
";
        let urls = parse_segment_urls(manifest, &base()).unwrap();
        assert_eq!(
            urls,
            vec![
                "https://cdn.example.com/v/720/seg_000.ts",
                "https://cdn.example.com/v/720/seg_001.ts",
                "https://other.example.com/seg_002.ts",
            ]
        );
    }

    #[test]
    fn blank_lines_and_tags_skipped() {
        let manifest = "#EXTM3U\n\n   \n#EXT-X-ENDLIST\n";
        let urls = parse_segment_urls(manifest, &base()).unwrap();
        assert!(urls.is_empty());
    }

    #[test]
    fn rootless_relative_uri_resolves_against_directory() {
        let urls = parse_segment_urls("../480/seg_000.ts\n", &base()).unwrap();
        assert_eq!(urls, vec!["https://cdn.example.com/v/480/seg_000.ts"]);
    }
}
