//! `Accept` header negotiation over a route's response encodings.

use crate::spec::Encoding;

struct MediaRange<'a> {
    range: &'a str,
    q: f32,
}

fn parse_accept(accept: &str) -> Vec<MediaRange<'_>> {
    accept
        .split(',')
        .filter_map(|part| {
            let mut pieces = part.split(';');
            let range = pieces.next()?.trim();
            if range.is_empty() {
                return None;
            }
            let q = pieces
                .filter_map(|p| p.trim().strip_prefix("q="))
                .find_map(|v| v.trim().parse::<f32>().ok())
                .unwrap_or(1.0)
                .clamp(0.0, 1.0);
            Some(MediaRange { range, q })
        })
        .collect()
}

/// How specifically `range` names `encoding`: 2 exact, 1 `type/*`, 0 `*/*`.
fn specificity(range: &str, encoding: Encoding) -> Option<u8> {
    if range == "*/*" {
        return Some(0);
    }
    if let Some(kind) = range.strip_suffix("/*") {
        let mime = encoding.mime();
        return mime
            .split('/')
            .next()
            .filter(|t| t.eq_ignore_ascii_case(kind))
            .map(|_| 1);
    }
    (Encoding::from_media_type(range) == Some(encoding)).then_some(2)
}

/// Quality the client assigns to `encoding`, taken from the most specific
/// matching range.
fn quality(ranges: &[MediaRange<'_>], encoding: Encoding) -> f32 {
    ranges
        .iter()
        .filter_map(|r| specificity(r.range, encoding).map(|s| (s, r.q)))
        .max_by_key(|(s, _)| *s)
        .map_or(0.0, |(_, q)| q)
}

/// Pick the response encoding for an `Accept` header.
///
/// Ties go to the earlier entry in `offered`. Without an `Accept` header, or
/// when nothing offered is acceptable but `fallback` is offered, `fallback`
/// is used. `None` means the client cannot be satisfied.
#[must_use]
pub fn negotiate(accept: Option<&str>, offered: &[Encoding], fallback: Encoding) -> Option<Encoding> {
    let default = if offered.contains(&fallback) {
        Some(fallback)
    } else {
        None
    };
    let Some(accept) = accept.filter(|a| !a.trim().is_empty()) else {
        return default.or_else(|| offered.first().copied());
    };

    let ranges = parse_accept(accept);
    let mut best: Option<(Encoding, f32)> = None;
    for &encoding in offered {
        let q = quality(&ranges, encoding);
        if q > 0.0 && best.map_or(true, |(_, bq)| q > bq) {
            best = Some((encoding, q));
        }
    }
    best.map(|(e, _)| e).or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOTH: [Encoding; 2] = [Encoding::Json, Encoding::Xml];

    #[test]
    fn missing_accept_defaults_to_json() {
        assert_eq!(negotiate(None, &BOTH, Encoding::Json), Some(Encoding::Json));
        assert_eq!(negotiate(Some(""), &[Encoding::Xml], Encoding::Json), Some(Encoding::Xml));
    }

    #[test]
    fn q_values_are_honoured() {
        let accept = "application/json;q=0.5, application/xml";
        assert_eq!(negotiate(Some(accept), &BOTH, Encoding::Json), Some(Encoding::Xml));
    }

    #[test]
    fn most_specific_range_sets_quality() {
        let accept = "*/*;q=0.9, application/json;q=0";
        assert_eq!(negotiate(Some(accept), &BOTH, Encoding::Json), Some(Encoding::Xml));
        assert_eq!(
            negotiate(Some("application/*"), &BOTH, Encoding::Json),
            Some(Encoding::Json)
        );
    }

    #[test]
    fn unsatisfiable_falls_back_only_when_json_offered() {
        assert_eq!(negotiate(Some("text/html"), &BOTH, Encoding::Json), Some(Encoding::Json));
        assert_eq!(negotiate(Some("text/html"), &[Encoding::Xml], Encoding::Json), None);
    }
}
