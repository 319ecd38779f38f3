/// Minimal CSV assembly for admin exports. Fields containing commas, quotes
/// or newlines are quoted per RFC 4180; everything else passes through.
pub fn escape_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

pub fn to_csv(header: &[&str], rows: &[Vec<String>]) -> String {
    let mut out = String::new();
    out.push_str(
        &header
            .iter()
            .map(|h| escape_field(h))
            .collect::<Vec<_>>()
            .join(","),
    );
    out.push('\n');
    for row in rows {
        out.push_str(
            &row.iter()
                .map(|f| escape_field(f))
                .collect::<Vec<_>>()
                .join(","),
        );
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_fields_are_untouched() {
        assert_eq!(escape_field("hello"), "hello");
        assert_eq!(escape_field("4"), "4");
    }

    #[test]
    fn commas_and_quotes_are_quoted() {
        assert_eq!(escape_field("a,b"), "\"a,b\"");
        assert_eq!(escape_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape_field("line\nbreak"), "\"line\nbreak\"");
    }

    #[test]
    fn rows_are_joined_with_header() {
        let csv = to_csv(
            &["id", "comment"],
            &[
                vec!["1".into(), "fine work".into()],
                vec!["2".into(), "slow, but thorough".into()],
            ],
        );
        assert_eq!(csv, "id,comment\n1,fine work\n2,\"slow, but thorough\"\n");
    }
}
