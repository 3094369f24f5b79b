/// Decode the small set of character references that show up in real pages.
///
/// - Named: `&amp;`, `&lt;`, `&gt;`, `&quot;`, `&apos;`, `&nbsp;`.
/// - Numeric, semicolon-terminated: `&#123;` and `&#x1F4A9;`.
///
/// Anything else (unknown names, missing `;`, invalid scalars) passes through
/// unchanged.
pub(crate) fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        match decode_one(tail) {
            Some((ch, consumed)) => {
                out.push(ch);
                rest = &tail[consumed..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

// Longest reference we accept: `&#x10FFFF;`.
const MAX_REFERENCE_LEN: usize = 10;

fn decode_one(tail: &str) -> Option<(char, usize)> {
    let semi = tail
        .char_indices()
        .take(MAX_REFERENCE_LEN)
        .find(|&(_, c)| c == ';')
        .map(|(i, _)| i)?;
    let body = &tail[1..semi];
    let consumed = semi + 1;
    let ch = match body {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{a0}',
        _ => {
            let digits = body.strip_prefix('#')?;
            let value = match digits.strip_prefix(['x', 'X']) {
                Some(hex) if !hex.is_empty() => u32::from_str_radix(hex, 16).ok()?,
                Some(_) => return None,
                None if !digits.is_empty() => digits.parse::<u32>().ok()?,
                None => return None,
            };
            char::from_u32(value)?
        }
    };
    Some((ch, consumed))
}
