use tracing::{debug, warn};

use crate::source::MediaSource;

/// Extensions accepted without looking at the file contents.
pub const ALLOWED_EXTENSIONS: [&str; 7] = ["mp3", "mp4", "m4a", "m4r", "ogg", "flac", "mov"];

/// Leading bytes inspected when the extension is not recognized.
pub const SIGNATURE_PROBE_LEN: usize = 16;

/// Decides whether a source looks like supported media.
///
/// A known extension accepts immediately. Otherwise the first
/// [`SIGNATURE_PROBE_LEN`] bytes must match a known container signature.
/// Read failures reject the source.
pub fn accepts(source: &dyn MediaSource) -> bool {
    if has_allowed_extension(source.name()) {
        return true;
    }
    match source.read_head(SIGNATURE_PROBE_LEN) {
        Ok(head) => {
            let accepted = matches_known_signature(&head);
            debug!(name = source.name(), accepted, "checked file signature");
            accepted
        }
        Err(err) => {
            warn!(name = source.name(), %err, "could not read file signature");
            false
        }
    }
}

pub fn has_allowed_extension(name: &str) -> bool {
    name.rsplit_once('.').is_some_and(|(_, extension)| {
        ALLOWED_EXTENSIONS
            .iter()
            .any(|allowed| extension.eq_ignore_ascii_case(allowed))
    })
}

/// Ogg, FLAC, ID3-tagged MP3, ISO-BMFF (`ftyp` at offset 4) or an MPEG
/// audio frame sync.
pub fn matches_known_signature(head: &[u8]) -> bool {
    head.starts_with(b"OggS")
        || head.starts_with(b"fLaC")
        || head.starts_with(b"ID3")
        || head.get(4..8) == Some(b"ftyp".as_slice())
        || matches!(head, [0xFF, second, ..] if second & 0xE0 == 0xE0)
}

#[cfg(test)]
mod tests {
    use super::{accepts, has_allowed_extension, matches_known_signature};
    use crate::source::MemorySource;

    #[test]
    fn extension_check_is_case_insensitive() {
        assert!(has_allowed_extension("Track.MP3"));
        assert!(has_allowed_extension("ringtone.m4r"));
        assert!(!has_allowed_extension("notes.txt"));
        assert!(!has_allowed_extension("mp3"));
        assert!(!has_allowed_extension("trailing."));
    }

    #[test]
    fn known_signatures_are_recognized() {
        assert!(matches_known_signature(b"OggS\0\x02"));
        assert!(matches_known_signature(b"fLaC\0\0\0\x22"));
        assert!(matches_known_signature(b"ID3\x04\0\0"));
        assert!(matches_known_signature(b"\0\0\0\x20ftypM4A "));
        assert!(matches_known_signature(&[0xFF, 0xFB, 0x90, 0x64]));
    }

    #[test]
    fn unknown_or_short_heads_are_rejected() {
        assert!(!matches_known_signature(b""));
        assert!(!matches_known_signature(&[0xFF]));
        assert!(!matches_known_signature(&[0xFF, 0x1F]));
        assert!(!matches_known_signature(b"\0\0\0\x20ftx"));
        assert!(!matches_known_signature(b"RIFF\0\0\0\0WAVE"));
    }

    #[test]
    fn unrecognized_extension_falls_back_to_signature() {
        assert!(accepts(&MemorySource::new("upload.bin", b"ID3\x03rest".to_vec())));
        assert!(!accepts(&MemorySource::new("upload.bin", b"plain text".to_vec())));
        assert!(accepts(&MemorySource::new("song.mp3", Vec::new())));
    }
}
