//! Command text normalisation and compound-command splitting

/// Strip control characters, collapse whitespace runs, trim
///
/// Tabs and line breaks become spaces; other control characters are dropped.
pub fn sanitize(command: &str) -> String {
    let cleaned: String = command
        .chars()
        .filter_map(|c| match c {
            '\t' | '\n' | '\r' => Some(' '),
            c if c.is_control() => None,
            c => Some(c),
        })
        .collect();

    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split a command on `|`, `||`, `&&`, `;` and `&` outside quotes
///
/// Redirections such as `2>&1` and `&>` are not separators. Empty segments
/// are dropped.
pub fn split_segments(command: &str) -> Vec<String> {
    let chars: Vec<char> = command.chars().collect();
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut in_single = false;
    let mut in_double = false;
    let mut escaped = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        if escaped {
            current.push(c);
            escaped = false;
            i += 1;
            continue;
        }

        match c {
            '\\' if !in_single => {
                escaped = true;
                current.push(c);
            }
            '\'' if !in_double => {
                in_single = !in_single;
                current.push(c);
            }
            '"' if !in_single => {
                in_double = !in_double;
                current.push(c);
            }
            '|' | ';' if !in_single && !in_double => {
                push_segment(&mut segments, &mut current);
                if c == '|' && next == Some('|') {
                    i += 1;
                }
            }
            '&' if !in_single && !in_double => {
                let prev = i.checked_sub(1).map(|p| chars[p]);
                let is_redirect = matches!(prev, Some('>') | Some('<')) || next == Some('>');
                if is_redirect {
                    current.push(c);
                } else {
                    push_segment(&mut segments, &mut current);
                    if next == Some('&') {
                        i += 1;
                    }
                }
            }
            _ => current.push(c),
        }
        i += 1;
    }
    push_segment(&mut segments, &mut current);

    segments
}

fn push_segment(segments: &mut Vec<String>, current: &mut String) {
    let segment = current.trim();
    if !segment.is_empty() {
        segments.push(segment.to_string());
    }
    current.clear();
}
