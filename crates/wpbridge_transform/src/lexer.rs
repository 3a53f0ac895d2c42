//! Keyword-level source scanner.
//!
//! The scanner does not build a token stream for parsing; it only reports the
//! words a transformer could be keyed on:
//!
//! - identifiers (`wp_mail`, `global`, `echo`)
//! - variables including the sigil (`$wpdb`, `$GLOBALS`)
//! - qualified names (`\WC_Order`), reported in full and per segment
//!
//! Comments, numbers, single-quoted strings, nowdocs and inline HTML are
//! skipped. Double-quoted strings, backtick strings and heredocs report the
//! variables they interpolate. The cost is linear in the source length.

/// Calls `emit` for every keyword-level token of `source`, in order.
pub fn for_each_token<'a>(source: &'a str, mut emit: impl FnMut(&'a str)) {
    let bytes = source.as_bytes();
    let len = bytes.len();
    let mut i = 0;

    while i < len {
        let b = bytes[i];

        if is_ident_start(b) || (b == b'\\' && i + 1 < len && is_ident_start(bytes[i + 1])) {
            i = scan_name(source, i, &mut emit);
            continue;
        }

        match b {
            b'$' if i + 1 < len && is_ident_start(bytes[i + 1]) => {
                let end = scan_ident(bytes, i + 1);
                emit(&source[i..end]);
                i = end;
            }
            b'0'..=b'9' => {
                i += 1;
                while i < len && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_' || bytes[i] == b'.') {
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => i = skip_line_comment(bytes, i + 2),
            b'#' if bytes.get(i + 1) != Some(&b'[') => i = skip_line_comment(bytes, i + 1),
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = find(bytes, i + 2, b"*/").map_or(len, |end| end + 2);
            }
            b'\'' => i = skip_quoted(bytes, i + 1, b'\''),
            b'"' | b'`' => {
                // An unclosed string runs to the end of the source.
                let close = closing_quote(bytes, i + 1, b);
                emit_interpolations(source, i + 1, close.unwrap_or(len), &mut emit);
                i = close.map_or(len, |close| close + 1);
            }
            b'<' if bytes[i..].starts_with(b"<<<") => i = scan_heredoc(source, i, &mut emit),
            b'?' if bytes.get(i + 1) == Some(&b'>') => i = skip_inline_html(bytes, i + 2),
            _ => i += 1,
        }
    }
}

/// Collects the tokens of `source`.
pub fn tokenize(source: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    for_each_token(source, |token| tokens.push(token));
    tokens
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b >= 0x80
}

fn is_ident_char(b: u8) -> bool {
    is_ident_start(b) || b.is_ascii_digit()
}

fn scan_ident(bytes: &[u8], start: usize) -> usize {
    let mut i = start;
    while i < bytes.len() && is_ident_char(bytes[i]) {
        i += 1;
    }
    i
}

/// Scans a plain or qualified name starting at `start`.
fn scan_name<'a>(source: &'a str, start: usize, emit: &mut impl FnMut(&'a str)) -> usize {
    let bytes = source.as_bytes();
    let mut i = start;
    let mut segments = 0;

    loop {
        if bytes.get(i) == Some(&b'\\') {
            match bytes.get(i + 1) {
                Some(&next) if is_ident_start(next) => i += 1,
                _ => break,
            }
        }
        let end = scan_ident(bytes, i);
        emit(&source[i..end]);
        segments += 1;
        i = end;

        if !(bytes.get(i) == Some(&b'\\') && bytes.get(i + 1).is_some_and(|&n| is_ident_start(n))) {
            break;
        }
    }

    if segments > 1 || bytes[start] == b'\\' {
        emit(&source[start..i]);
    }
    i
}

/// Skips a `//` or `#` comment. The comment ends at a newline or at `?>`,
/// which is left for the caller.
fn skip_line_comment(bytes: &[u8], start: usize) -> usize {
    let mut i = start;
    while i < bytes.len() {
        match bytes[i] {
            b'\n' => return i + 1,
            b'?' if bytes.get(i + 1) == Some(&b'>') => return i,
            _ => i += 1,
        }
    }
    i
}

/// Index of the unescaped `quote` closing a string that starts at `start`.
fn closing_quote(bytes: &[u8], start: usize, quote: u8) -> Option<usize> {
    let mut i = start;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == quote => return Some(i),
            _ => i += 1,
        }
    }
    None
}

/// Returns the index just past the closing `quote`.
fn skip_quoted(bytes: &[u8], start: usize, quote: u8) -> usize {
    closing_quote(bytes, start, quote).map_or(bytes.len(), |close| close + 1)
}

/// Reports `$name` interpolations in `source[start..end]`.
fn emit_interpolations<'a>(source: &'a str, start: usize, end: usize, emit: &mut impl FnMut(&'a str)) {
    let bytes = source.as_bytes();
    let end = end.min(bytes.len());
    let mut i = start;
    while i < end {
        match bytes[i] {
            b'\\' => i += 2,
            b'$' if i + 1 < end && is_ident_start(bytes[i + 1]) => {
                let mut ident_end = scan_ident(bytes, i + 1).min(end);
                while !source.is_char_boundary(ident_end) {
                    ident_end -= 1;
                }
                emit(&source[i..ident_end]);
                i = ident_end;
            }
            _ => i += 1,
        }
    }
}

/// Scans `<<<LABEL`, `<<<"LABEL"` or `<<<'LABEL'`. Anything else is treated
/// as a shift operator.
fn scan_heredoc<'a>(source: &'a str, start: usize, emit: &mut impl FnMut(&'a str)) -> usize {
    let bytes = source.as_bytes();
    let mut i = start + 3;
    while i < bytes.len() && (bytes[i] == b' ' || bytes[i] == b'\t') {
        i += 1;
    }

    let quote = match bytes.get(i) {
        Some(&q @ (b'\'' | b'"')) => {
            i += 1;
            Some(q)
        }
        _ => None,
    };

    if !bytes.get(i).is_some_and(|&b| is_ident_start(b)) {
        return start + 3;
    }
    let label_start = i;
    i = scan_ident(bytes, i);
    let label = &bytes[label_start..i];

    if let Some(q) = quote {
        if bytes.get(i) != Some(&q) {
            return start + 3;
        }
        i += 1;
    }
    if bytes.get(i) == Some(&b'\r') {
        i += 1;
    }
    if bytes.get(i) != Some(&b'\n') {
        return start + 3;
    }

    let body_start = i + 1;
    let mut line_start = body_start;
    while line_start < bytes.len() {
        let mut j = line_start;
        while j < bytes.len() && (bytes[j] == b' ' || bytes[j] == b'\t') {
            j += 1;
        }
        let closes = bytes[j..].starts_with(label)
            && !bytes.get(j + label.len()).is_some_and(|&b| is_ident_char(b));
        if closes {
            if quote != Some(b'\'') {
                emit_interpolations(source, body_start, line_start, emit);
            }
            return j + label.len();
        }
        line_start = match find(bytes, line_start, b"\n") {
            Some(nl) => nl + 1,
            None => bytes.len(),
        };
    }

    // Unterminated: the rest of the file is the body.
    if quote != Some(b'\'') {
        emit_interpolations(source, body_start, bytes.len(), emit);
    }
    bytes.len()
}

/// Skips inline HTML up to and including the next open tag.
fn skip_inline_html(bytes: &[u8], start: usize) -> usize {
    match find(bytes, start, b"<?") {
        Some(open) => {
            let rest = &bytes[open + 2..];
            if rest.len() >= 3 && rest[..3].eq_ignore_ascii_case(b"php") {
                open + 5
            } else if rest.first() == Some(&b'=') {
                open + 3
            } else {
                open + 2
            }
        }
        None => bytes.len(),
    }
}

fn find(bytes: &[u8], start: usize, needle: &[u8]) -> Option<usize> {
    if start >= bytes.len() {
        return None;
    }
    bytes[start..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|pos| pos + start)
}
