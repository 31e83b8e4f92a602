//! Plain-text decoding and the last-resort printable-run scavenger.

/// Shortest ASCII run the scavenger keeps. Random binary rarely produces runs
/// this long, real embedded text nearly always does.
const MIN_PRINTABLE_RUN: usize = 8;

/// Decodes a text file. Honours UTF-8/UTF-16 byte-order marks and otherwise
/// falls back to lossy UTF-8. Control characters are left for the cleaner.
pub fn decode_text(bytes: &[u8]) -> Result<String, &'static str> {
    if bytes.is_empty() {
        return Err("empty input");
    }

    let text = if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        String::from_utf8_lossy(rest).into_owned()
    } else if let Some(rest) = bytes.strip_prefix(&[0xFF, 0xFE]) {
        decode_utf16(rest, u16::from_le_bytes)
    } else if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        decode_utf16(rest, u16::from_be_bytes)
    } else {
        String::from_utf8_lossy(bytes).into_owned()
    };

    if text.trim().is_empty() {
        return Err("no text content");
    }
    Ok(text)
}

pub fn decode_utf16(bytes: &[u8], to_unit: fn([u8; 2]) -> u16) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| to_unit([pair[0], pair[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}

fn is_printable_ascii(b: u8) -> bool {
    (0x20..=0x7E).contains(&b) || b == b'\t'
}

/// Collects runs of printable ASCII of at least [`MIN_PRINTABLE_RUN`] bytes that
/// contain a letter, one run per line, in file order.
pub fn printable_runs(bytes: &[u8]) -> Result<String, &'static str> {
    let runs: Vec<&str> = bytes
        .split(|b| !is_printable_ascii(*b))
        .filter(|run| run.len() >= MIN_PRINTABLE_RUN)
        .filter(|run| run.iter().any(u8::is_ascii_alphabetic))
        .filter_map(|run| std::str::from_utf8(run).ok())
        .map(str::trim)
        .filter(|run| !run.is_empty())
        .collect();

    if runs.is_empty() {
        return Err("no printable text runs");
    }
    Ok(runs.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_utf8() {
        let text = decode_text("Jane Doe\nSoftware Engineer".as_bytes()).unwrap();
        assert_eq!(text, "Jane Doe\nSoftware Engineer");
    }

    #[test]
    fn test_decode_strips_utf8_bom() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice(b"Jane");
        assert_eq!(decode_text(&bytes).unwrap(), "Jane");
    }

    #[test]
    fn test_decode_utf16_le_and_be() {
        let mut le = vec![0xFF, 0xFE];
        let mut be = vec![0xFE, 0xFF];
        for unit in "Résumé".encode_utf16() {
            le.extend_from_slice(&unit.to_le_bytes());
            be.extend_from_slice(&unit.to_be_bytes());
        }
        assert_eq!(decode_text(&le).unwrap(), "Résumé");
        assert_eq!(decode_text(&be).unwrap(), "Résumé");
    }

    #[test]
    fn test_decode_invalid_utf8_is_lossy() {
        let text = decode_text(b"Jane \xFF Doe").unwrap();
        assert!(text.starts_with("Jane "));
        assert!(text.ends_with(" Doe"));
    }

    #[test]
    fn test_decode_empty_fails() {
        assert!(decode_text(b"").is_err());
        assert!(decode_text(b"   \n").is_err());
    }

    #[test]
    fn test_printable_runs_keeps_long_text_runs() {
        let bytes = b"\x00\x01Jane Doe, Engineer\x00\x02ab\x03\x04Skills: Rust\xFF12345678";
        let text = printable_runs(bytes).unwrap();
        assert_eq!(text, "Jane Doe, Engineer\nSkills: Rust");
    }

    #[test]
    fn test_printable_runs_fails_on_binary() {
        let bytes: Vec<u8> = (0u8..32).chain(128u8..=255).collect();
        assert!(printable_runs(&bytes).is_err());
    }
}
