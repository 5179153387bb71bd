//! Canonicalization of request data and markup snippets.
//!
//! Containment checks must be robust against encoding tricks: the same
//! payload may arrive percent-encoded (possibly multiple times), with
//! `%uXXXX` escapes, or padded with characters browsers ignore. Both sides
//! of every containment test are therefore reduced to a canonical form:
//! escapes are decoded until stable and characters irrelevant to script
//! injection are stripped. Decode and strip are iterated together to a
//! fixpoint, because stripping can expose a new escape sequence (e.g.
//! `%/41` becomes `%41`); this is what makes `canonicalize` idempotent.

/// Characters that cannot influence whether a snippet parses as script.
///
/// Original values are never mutated; this form exists purely for
/// containment testing.
#[inline]
fn is_non_canonical(ch: char) -> bool {
    !ch.is_ascii() || matches!(ch, '\\' | '0' | '\0' | '/' | '?')
}

#[inline]
fn hex_digit(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

fn hex4(bytes: &[u8]) -> Option<u32> {
    let mut code = 0u32;

    for &b in bytes {
        code = code * 16 + u32::from(hex_digit(b)?);
    }

    Some(code)
}

/// One pass of `%XX` / `%uXXXX` decoding.
fn decode_pass(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = String::with_capacity(s.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' {
            if i + 6 <= bytes.len() && (bytes[i + 1] | 0x20) == b'u' {
                if let Some(code) = hex4(&bytes[i + 2..i + 6]) {
                    out.push(char::from_u32(code).unwrap_or('\u{fffd}'));
                    i += 6;
                    continue;
                }
            }

            if i + 3 <= bytes.len() {
                if let (Some(hi), Some(lo)) = (hex_digit(bytes[i + 1]), hex_digit(bytes[i + 2])) {
                    out.push(char::from(hi * 16 + lo));
                    i += 3;
                    continue;
                }
            }
        }

        // `i` is always on a char boundary here: escapes are pure ASCII
        // and multi-byte chars are copied whole.
        match s[i..].chars().next() {
            Some(ch) => {
                out.push(ch);
                i += ch.len_utf8();
            }
            None => break,
        }
    }

    out
}

/// Decodes escapes until the string stops changing.
pub(crate) fn fully_decode(s: &str) -> String {
    let mut current = s.to_owned();

    loop {
        let next = decode_pass(&current);

        if next == current {
            return current;
        }

        current = next;
    }
}

fn strip_pass(s: &str) -> String {
    s.chars().filter(|&ch| !is_non_canonical(ch)).collect()
}

/// Reduces `s` to its canonical form for containment testing.
pub(crate) fn canonicalize(s: &str) -> String {
    let mut current = s.to_owned();

    loop {
        let stripped = strip_pass(&fully_decode(&current));

        // Length is non-increasing, so this terminates.
        if stripped == current {
            return stripped;
        }

        current = stripped;
    }
}

/// Form-submission bodies encode spaces as `+`.
pub(crate) fn canonicalize_body(s: &str) -> String {
    canonicalize(&s.replace('+', " "))
}
