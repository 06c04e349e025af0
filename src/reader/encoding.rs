//! Candidate encodings for uploaded CSV files, in the order they are tried.

use encoding_rs::{Encoding, EUC_JP, ISO_2022_JP, SHIFT_JIS, UTF_8};
use std::borrow::Cow;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// `ESC ( I`: switches ISO-2022-JP to JIS X 0201 katakana, which plain
/// ISO-2022-JP does not allow.
const HALFWIDTH_KATAKANA_ESCAPE: &[u8] = b"\x1B(I";

/// Code points where the Windows tables and JIS X 0208 disagree, as
/// (Windows, JIS X 0208).
const WINDOWS_TO_JIS: [(char, char); 6] = [
    ('\u{FF5E}', '\u{301C}'), // ～ → 〜
    ('\u{2225}', '\u{2016}'), // ∥ → ‖
    ('\u{FF0D}', '\u{2212}'), // － → −
    ('\u{FFE0}', '\u{00A2}'), // ￠ → ¢
    ('\u{FFE1}', '\u{00A3}'), // ￡ → £
    ('\u{FFE2}', '\u{00AC}'), // ￢ → ¬
];

/// One encoding in the fallback chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Candidate {
    /// UTF-8, with one leading byte order mark removed if present
    Utf8Sig,
    Utf8,
    /// JIS X 0208 Shift_JIS without the Windows extensions
    ShiftJis,
    /// Windows-31J (Shift_JIS plus NEC/IBM extensions)
    Cp932,
    Iso2022Jp,
    EucJp,
}

/// Fixed priority order. The first candidate that decodes wins, even when a
/// later one would have been the "right" encoding.
pub const CANDIDATES: [Candidate; 6] = [
    Candidate::Utf8Sig,
    Candidate::Utf8,
    Candidate::ShiftJis,
    Candidate::Cp932,
    Candidate::Iso2022Jp,
    Candidate::EucJp,
];

impl Candidate {
    pub fn name(self) -> &'static str {
        match self {
            Candidate::Utf8Sig => "utf-8-sig",
            Candidate::Utf8 => "utf-8",
            Candidate::ShiftJis => "shift_jis",
            Candidate::Cp932 => "cp932",
            Candidate::Iso2022Jp => "iso-2022-jp",
            Candidate::EucJp => "euc-jp",
        }
    }

    /// Decode the whole input, or `None` if any byte sequence is invalid.
    /// Never substitutes replacement characters.
    pub fn decode(self, bytes: &[u8]) -> Option<Cow<'_, str>> {
        match self {
            Candidate::Utf8Sig => strict(UTF_8, bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes)),
            Candidate::Utf8 => strict(UTF_8, bytes),
            Candidate::ShiftJis => {
                if uses_windows_extensions(bytes) {
                    None
                } else {
                    strict(SHIFT_JIS, bytes).map(jis_x0208_mapping)
                }
            }
            Candidate::Cp932 => strict(SHIFT_JIS, bytes),
            Candidate::Iso2022Jp => {
                if bytes.windows(3).any(|w| w == HALFWIDTH_KATAKANA_ESCAPE) {
                    None
                } else {
                    strict(ISO_2022_JP, bytes).map(jis_x0208_mapping)
                }
            }
            Candidate::EucJp => strict(EUC_JP, bytes).map(jis_x0208_mapping),
        }
    }
}

fn strict<'a>(encoding: &'static Encoding, bytes: &'a [u8]) -> Option<Cow<'a, str>> {
    encoding.decode_without_bom_handling_and_without_replacement(bytes)
}

/// encoding_rs decodes every Japanese encoding with the Windows tables; map
/// the handful of differing characters back to their JIS X 0208 code points.
fn jis_x0208_mapping(text: Cow<'_, str>) -> Cow<'_, str> {
    let windows_only = |c: char| WINDOWS_TO_JIS.iter().any(|&(w, _)| w == c);
    if !text.contains(windows_only) {
        return text;
    }
    let mapped = text
        .chars()
        .map(|c| {
            WINDOWS_TO_JIS
                .iter()
                .find(|&&(w, _)| w == c)
                .map_or(c, |&(_, jis)| jis)
        })
        .collect();
    Cow::Owned(mapped)
}

/// True if the bytes use anything outside JIS X 0208 Shift_JIS: the lone 0x80
/// byte, NEC row 13 (lead 0x87), or lead bytes 0xED..=0xFC (IBM extensions and
/// the user-defined area). `encoding_rs` only implements the Windows superset,
/// so plain Shift_JIS is approximated by rejecting these up front.
fn uses_windows_extensions(bytes: &[u8]) -> bool {
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            0x80 => return true,
            0x87 | 0xED..=0xFC => return true,
            0x81..=0x9F | 0xE0..=0xEC => i += 2,
            _ => i += 1,
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf8_sig_strips_bom() {
        let text = Candidate::Utf8Sig.decode(b"\xEF\xBB\xBFa,b").unwrap();
        assert_eq!(text, "a,b");
    }

    #[test]
    fn test_plain_utf8_keeps_bom() {
        let text = Candidate::Utf8.decode(b"\xEF\xBB\xBFa").unwrap();
        assert_eq!(text, "\u{FEFF}a");
    }

    #[test]
    fn test_utf8_rejects_shift_jis_bytes() {
        // "名前" in Shift_JIS
        let bytes = b"\x96\xBC\x91\x4F";
        assert!(Candidate::Utf8Sig.decode(bytes).is_none());
        assert!(Candidate::Utf8.decode(bytes).is_none());
        assert_eq!(Candidate::ShiftJis.decode(bytes).unwrap(), "名前");
    }

    #[test]
    fn test_nec_row13_only_decodes_as_cp932() {
        // "①" is 0x8740 in CP932
        let bytes = b"\x87\x40";
        assert!(Candidate::ShiftJis.decode(bytes).is_none());
        assert_eq!(Candidate::Cp932.decode(bytes).unwrap(), "①");
    }

    #[test]
    fn test_ibm_extension_only_decodes_as_cp932() {
        // "ⅰ" is 0xFA40 in CP932
        let bytes = b"\xFA\x40";
        assert!(Candidate::ShiftJis.decode(bytes).is_none());
        assert_eq!(Candidate::Cp932.decode(bytes).unwrap(), "ⅰ");
    }

    #[test]
    fn test_trail_byte_in_extension_range_is_not_a_lead() {
        // 0x8A 0xED is a valid two-byte character; 0xED here is a trail byte
        assert!(!uses_windows_extensions(b"\x8A\xED"));
    }

    #[test]
    fn test_iso_2022_jp_escape_sequences() {
        // ESC $ B "名前" ESC ( B
        let bytes = b"\x1B$BL>A0\x1B(B";
        assert_eq!(Candidate::Iso2022Jp.decode(bytes).unwrap(), "名前");
    }

    #[test]
    fn test_euc_jp() {
        let bytes = b"\xCC\xBE\xC1\xB0";
        assert_eq!(Candidate::EucJp.decode(bytes).unwrap(), "名前");
    }

    #[test]
    fn test_invalid_in_every_candidate() {
        let bytes = b"\xFF\xFE\xFD";
        for candidate in CANDIDATES {
            assert!(candidate.decode(bytes).is_none(), "{}", candidate.name());
        }
    }

    #[test]
    fn test_shift_jis_uses_jis_x0208_code_points() {
        // 〜 ‖ − ¢ £ ¬
        let bytes = b"10\x81\x6020\x81\x61\x81\x7C\x81\x91\x81\x92\x81\xCA";
        assert_eq!(
            Candidate::ShiftJis.decode(bytes).unwrap(),
            "10\u{301C}20\u{2016}\u{2212}\u{A2}\u{A3}\u{AC}"
        );
        assert_eq!(
            Candidate::Cp932.decode(bytes).unwrap(),
            "10\u{FF5E}20\u{2225}\u{FF0D}\u{FFE0}\u{FFE1}\u{FFE2}"
        );
    }

    #[test]
    fn test_euc_jp_wave_dash() {
        assert_eq!(Candidate::EucJp.decode(b"\xA1\xC1").unwrap(), "\u{301C}");
    }

    #[test]
    fn test_iso_2022_jp_wave_dash() {
        let bytes = b"\x1B$B!A\x1B(B";
        assert_eq!(Candidate::Iso2022Jp.decode(bytes).unwrap(), "\u{301C}");
    }

    #[test]
    fn test_iso_2022_jp_rejects_halfwidth_katakana_escape() {
        // ESC ( I "ｱ" ESC ( B
        let bytes = b"\x1B(I1\x1B(B";
        assert!(Candidate::Iso2022Jp.decode(bytes).is_none());
    }

    #[test]
    fn test_unaffected_text_is_borrowed() {
        let text = jis_x0208_mapping(Cow::Borrowed("名前"));
        assert!(matches!(text, Cow::Borrowed(_)));
    }

    #[test]
    fn test_candidate_order() {
        let names: Vec<_> = CANDIDATES.iter().map(|c| c.name()).collect();
        assert_eq!(
            names,
            ["utf-8-sig", "utf-8", "shift_jis", "cp932", "iso-2022-jp", "euc-jp"]
        );
    }
}
