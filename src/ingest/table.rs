// Reads sensor rows out of the rendered sensor network page.
//
// Only the shape `table > tbody > tr > td` matters; everything else in the
// document is ignored. Server-rendered HTML may omit `<tbody>`, in which case
// rows are read straight from `table > tr`. Tag matching is ASCII
// case-insensitive and does not handle nested tables.

use crate::ingest::{EXPECTED_COLUMNS, ExtractError};
use crate::model::RawRow;

/// Parses every `tbody` row with at least five cells into a [`RawRow`].
/// Without any `tbody`, the rows of each `table` are read instead.
///
/// Column order: name, observation time, normal level, current value,
/// description. Shorter rows, including `th`-only header rows, are skipped.
pub fn parse_sensor_table(html: &str) -> Result<Vec<RawRow>, ExtractError> {
    let mut bodies = tag_blocks(html, "tbody");
    if bodies.is_empty() {
        bodies = tag_blocks(html, "table");
    }
    if bodies.is_empty() {
        return Err(ExtractError::StructureNotFound("table".to_string()));
    }

    let mut rows = Vec::new();
    let mut widest = 0;
    let mut seen_rows = 0;

    for body in bodies {
        for tr in tag_blocks(body, "tr") {
            seen_rows += 1;
            let cells: Vec<String> = tag_blocks(tr, "td").into_iter().map(cell_text).collect();
            widest = widest.max(cells.len());
            if cells.len() < EXPECTED_COLUMNS {
                continue;
            }
            let mut cells = cells.into_iter();
            let mut next = || cells.next().unwrap_or_default();
            let sensor_name = next();
            let secondary_field = next();
            let normal_level = next();
            let current_value = next();
            let description = next();
            rows.push(RawRow {
                sensor_name,
                secondary_field,
                normal_level,
                current_value,
                description,
            });
        }
    }

    if rows.is_empty() {
        if seen_rows > 0 {
            return Err(ExtractError::SchemaDrift {
                expected: EXPECTED_COLUMNS,
                found: widest,
            });
        }
        return Err(ExtractError::Empty);
    }
    Ok(rows)
}

/// Inner content of each non-nested `<tag ...>...</tag>` block in `s`.
fn tag_blocks<'a>(s: &'a str, tag: &str) -> Vec<&'a str> {
    let lower = s.to_ascii_lowercase();
    let open = format!("<{}", tag);
    let close = format!("</{}", tag);

    let mut blocks = Vec::new();
    let mut from = 0;
    while let Some(rel) = lower[from..].find(&open) {
        let start = from + rel;
        let after_name = start + open.len();
        // `<tr` must not match `<track`.
        match lower.as_bytes().get(after_name) {
            Some(b'>') | Some(b' ') | Some(b'\t') | Some(b'\n') | Some(b'\r') | Some(b'/') => {}
            _ => {
                from = after_name;
                continue;
            }
        }
        let Some(open_end) = lower[start..].find('>').map(|i| start + i + 1) else {
            break;
        };
        let Some(close_start) = lower[open_end..].find(&close).map(|i| open_end + i) else {
            break;
        };
        blocks.push(&s[open_end..close_start]);
        from = lower[close_start..]
            .find('>')
            .map(|i| close_start + i + 1)
            .unwrap_or(lower.len());
    }
    blocks
}

fn cell_text(cell: &str) -> String {
    let mut out = String::with_capacity(cell.len());
    let mut in_tag = false;
    for ch in cell.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    normalize_ws(&decode_entities(&out))
}

fn decode_entities(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&amp;", "&")
}

fn normalize_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
        <table class="sensors">
          <thead><tr><th>Sensor</th><th>Obs time</th><th>Normal</th><th>Current</th><th>Status</th></tr></thead>
          <TBODY>
            <tr class="row">
              <td><a href="/s/1">Libis</a></td>
              <td>2024-09-01 08:00</td>
              <td>0.50m</td>
              <td><span class="lvl">0.35m</span></td>
              <td>Passable to all&nbsp;vehicles</td>
            </tr>
            <tr><td>QCPU</td><td>2024-09-01 08:00</td><td></td><td>2.5</td><td>Light   rain</td></tr>
            <tr><td colspan="5">Loading&hellip;</td></tr>
          </TBODY>
        </table>
        </body></html>
    "#;

    #[test]
    fn test_parses_rows_in_column_order() {
        let rows = parse_sensor_table(PAGE).expect("page has a sensor table");
        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[0],
            RawRow::new("Libis", "2024-09-01 08:00", "0.50m", "0.35m", "Passable to all vehicles")
        );
        assert_eq!(rows[1].sensor_name, "QCPU");
        assert_eq!(rows[1].normal_level, "");
        assert_eq!(rows[1].description, "Light rain");
    }

    #[test]
    fn test_header_rows_outside_tbody_are_ignored() {
        let rows = parse_sensor_table(PAGE).unwrap();
        assert!(rows.iter().all(|r| r.sensor_name != "Sensor"));
    }

    #[test]
    fn test_missing_table_is_structure_not_found() {
        let result = parse_sensor_table("<html><div id=\"app\"></div></html>");
        assert!(matches!(result, Err(ExtractError::StructureNotFound(_))));
    }

    #[test]
    fn test_table_without_tbody_reads_rows_directly() {
        let html = "<table>\
                    <tr><th>Sensor</th><th>Obs</th><th>Normal</th><th>Current</th><th>Status</th></tr>\
                    <tr><td>Libis</td><td>08:00</td><td>0.50m</td><td>0.35m</td><td>Passable</td></tr>\
                    </table>";
        let rows = parse_sensor_table(html).unwrap();
        assert_eq!(rows, vec![RawRow::new("Libis", "08:00", "0.50m", "0.35m", "Passable")]);
    }

    #[test]
    fn test_empty_tbody_is_empty() {
        let result = parse_sensor_table("<table><tbody>\n</tbody></table>");
        assert_eq!(result, Err(ExtractError::Empty));
    }

    #[test]
    fn test_narrow_rows_only_is_schema_drift() {
        let html = "<table><tbody><tr><td>Libis</td><td>0.35m</td><td>ok</td></tr></tbody></table>";
        assert_eq!(
            parse_sensor_table(html),
            Err(ExtractError::SchemaDrift { expected: 5, found: 3 })
        );
    }

    #[test]
    fn test_tr_does_not_match_track() {
        let html = "<table><tbody><track src=\"x\"></track>\
                    <tr><td>A</td><td>t</td><td>n</td><td>c</td><td>d</td></tr></tbody></table>";
        let rows = parse_sensor_table(html).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].sensor_name, "A");
    }

    #[test]
    fn test_entities_are_decoded() {
        assert_eq!(cell_text("N.S. Amoranto &amp; Kalantiaw"), "N.S. Amoranto & Kalantiaw");
        assert_eq!(cell_text("<b> Sta&nbsp;Cruz </b>"), "Sta Cruz");
    }
}
