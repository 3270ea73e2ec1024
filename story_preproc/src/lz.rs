//! Reversible LZ78 compression behind `TOLZ()` and `LZ()`.
//!
//! The input is processed as UTF-16 code units. Compressed text starts with
//! [`HEADER`] and continues with `(prefix code, unit)` pairs, each value
//! written as one `char`. A final phrase that is already in the dictionary is
//! written as a lone prefix code.
//!
//! Values are mapped to chars starting at [`BASE`] and skip the surrogate
//! range, so compressed text holds no ASCII and no whitespace. It can be
//! stored in a definition and expanded again without being mangled.

use std::collections::HashMap;
use tracing::debug;

use crate::error::LzError;

/// Marker char at the start of every compressed string.
pub const HEADER: char = '\u{FDD0}';

/// First char used for encoded values.
const BASE: u32 = 0x4E00;

const SURROGATE_START: u32 = 0xD800;
const SURROGATE_LEN: u32 = 0x800;

/// Largest dictionary code; the dictionary stops growing once it is reached.
const MAX_CODE: u32 = 0x10FFFF - SURROGATE_LEN - BASE;

fn encode_value(value: u32) -> char {
    let mut cp = BASE + value;
    if cp >= SURROGATE_START {
        cp += SURROGATE_LEN;
    }
    // values never exceed MAX_CODE, so cp is always a valid scalar
    char::from_u32(cp).unwrap_or(char::REPLACEMENT_CHARACTER)
}

fn decode_value(c: char, position: usize) -> Result<u32, LzError> {
    let mut cp = c as u32;
    if cp < BASE {
        return Err(LzError::Corrupt(position));
    }
    if cp >= SURROGATE_START + SURROGATE_LEN {
        cp -= SURROGATE_LEN;
    }
    Ok(cp - BASE)
}

/// Check whether text carries the compression header.
pub fn is_compressed(text: &str) -> bool {
    text.starts_with(HEADER)
}

/// Compress text.
pub fn compress(text: &str) -> String {
    let mut dictionary: HashMap<(u32, u16), u32> = HashMap::new();
    let mut next_code: u32 = 1;
    let mut prefix: u32 = 0;

    let mut out = String::new();
    out.push(HEADER);

    for unit in text.encode_utf16() {
        match dictionary.get(&(prefix, unit)) {
            Some(&code) => prefix = code,
            None => {
                out.push(encode_value(prefix));
                out.push(encode_value(unit as u32));
                if next_code <= MAX_CODE {
                    dictionary.insert((prefix, unit), next_code);
                    next_code += 1;
                }
                prefix = 0;
            }
        }
    }
    if prefix != 0 {
        out.push(encode_value(prefix));
    }

    debug!(
        input_units = text.encode_utf16().count(),
        output_chars = out.chars().count(),
        "Compressed text"
    );
    out
}

/// Decompress text produced by [`compress`].
pub fn decompress(text: &str) -> Result<String, LzError> {
    let mut chars = text.chars();
    if chars.next() != Some(HEADER) {
        return Err(LzError::MissingHeader);
    }

    let codes = chars
        .enumerate()
        .map(|(i, c)| decode_value(c, i))
        .collect::<Result<Vec<_>, _>>()?;

    // entries[code] = (prefix code, last unit); entry 0 is the empty phrase
    let mut entries: Vec<(u32, u16)> = vec![(0, 0)];
    let mut units: Vec<u16> = Vec::new();
    let mut phrase: Vec<u16> = Vec::new();

    for (pair_index, pair) in codes.chunks(2).enumerate() {
        let position = pair_index * 2;
        let prefix = pair[0];
        if prefix as usize >= entries.len() {
            return Err(LzError::Corrupt(position));
        }

        phrase.clear();
        let mut code = prefix;
        while code != 0 {
            let (parent, unit) = entries[code as usize];
            phrase.push(unit);
            code = parent;
        }
        phrase.reverse();

        if let Some(&value) = pair.get(1) {
            let unit = u16::try_from(value).map_err(|_| LzError::Corrupt(position + 1))?;
            phrase.push(unit);
            if entries.len() as u32 <= MAX_CODE {
                entries.push((prefix, unit));
            }
        }
        units.extend_from_slice(&phrase);
    }

    String::from_utf16(&units).map_err(|_| LzError::InvalidUtf16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        for text in [
            "",
            "a",
            "aaaaaaaa",
            "The knight rode north. The knight rode south.",
            "Ünïcödé ✓ and 🐉 dragons",
            "{braces} (parens), \"quotes\"\nand newlines",
        ] {
            let packed = compress(text);
            assert!(is_compressed(&packed));
            assert_eq!(decompress(&packed).unwrap(), text);
        }
    }

    #[test]
    fn test_long_repetition() {
        let text = "abcabcabd".repeat(600);
        let packed = compress(&text);
        assert!(packed.chars().count() < text.len() / 4);
        assert_eq!(decompress(&packed).unwrap(), text);
    }

    #[test]
    fn test_output_has_no_ascii_or_whitespace() {
        let packed = compress("hello world, {X} (y)\n");
        assert!(packed.chars().all(|c| !c.is_ascii() && !c.is_whitespace()));
    }

    #[test]
    fn test_missing_header() {
        assert_eq!(decompress("plain text"), Err(LzError::MissingHeader));
        assert_eq!(decompress(""), Err(LzError::MissingHeader));
    }

    #[test]
    fn test_corrupt_input() {
        let corrupt = format!("{}{}", HEADER, encode_value(5));
        assert_eq!(decompress(&corrupt), Err(LzError::Corrupt(0)));
        assert!(decompress(&format!("{}abc", HEADER)).is_err());
    }
}
