//! Line-oriented reader for server-sent event bodies.

use std::io::{BufRead, BufReader, Read};

pub(crate) enum Flow {
    Continue,
    Break,
}

/// Walks an SSE stream, handing the payload of each `data:` line to `f`.
/// Comment lines, blank keep-alives, and `event:` lines are skipped — the
/// providers repeat the event type inside the data payload.
pub(crate) fn for_each_data<R: Read>(
    body: R,
    mut f: impl FnMut(&str) -> Flow,
) -> std::io::Result<()> {
    let reader = BufReader::new(body);
    for line in reader.lines() {
        let line = line?;
        let line = line.trim_end_matches('\r');
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        if let Some(data) = line.strip_prefix("data:") {
            if let Flow::Break = f(data.trim_start()) {
                break;
            }
        }
    }
    Ok(())
}
