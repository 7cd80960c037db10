use crate::csi::CSI_MARKER;
use crate::support::{ErrorKind, PlkgError, PlkgResult};

/// Extracts the integer vector of a CSI record: a line carrying the
/// `CSI_DATA` marker and a bracketed, comma-separated list of signed decimal
/// integers. Odd-length vectors are accepted here; the aggregator decides
/// whether the frame is usable.
pub fn parse_line(line: &str) -> PlkgResult<Vec<i32>> {
    if !line.contains(CSI_MARKER) {
        return Err(PlkgError::Fatal(ErrorKind::MalformedFrame));
    }

    let open = line.find('[').ok_or(PlkgError::Fatal(ErrorKind::MalformedFrame))?;
    let close = line[open..]
        .find(']')
        .map(|idx| open + idx)
        .ok_or(PlkgError::Fatal(ErrorKind::MalformedFrame))?;

    let body = &line[open + 1..close];

    let mut values = Vec::new();
    for field in body.split(',') {
        let field = field.trim();

        if field.is_empty() {
            continue;
        }

        let value: i32 = field
            .parse()
            .map_err(|_| PlkgError::Fatal(ErrorKind::MalformedFrame))?;
        values.push(value);
    }

    if values.is_empty() {
        return Err(PlkgError::Fatal(ErrorKind::MalformedFrame));
    }

    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_record() {
        let line = "CSI_DATA,0,aa:bb:cc:dd:ee:ff,[1,-2, 3,4]";

        assert_eq!(parse_line(line).unwrap(), vec![1, -2, 3, 4]);
    }

    #[test]
    fn test_parse_tolerates_prefix_noise() {
        let line = "I (1234) wifi: CSI_DATA [7,-8,9,10]";

        assert_eq!(parse_line(line).unwrap(), vec![7, -8, 9, 10]);
    }

    #[test]
    fn test_parse_accepts_odd_length() {
        assert_eq!(parse_line("CSI_DATA [1,2,3]").unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_parse_rejects_missing_marker() {
        assert_eq!(
            parse_line("MSG_RECV [1,2]"),
            Err(PlkgError::Fatal(ErrorKind::MalformedFrame))
        );
    }

    #[test]
    fn test_parse_rejects_missing_brackets() {
        assert_eq!(
            parse_line("CSI_DATA 1,2,3"),
            Err(PlkgError::Fatal(ErrorKind::MalformedFrame))
        );
        assert_eq!(
            parse_line("CSI_DATA [1,2,3"),
            Err(PlkgError::Fatal(ErrorKind::MalformedFrame))
        );
    }

    #[test]
    fn test_parse_rejects_non_numeric() {
        assert_eq!(
            parse_line("CSI_DATA [1,x,3]"),
            Err(PlkgError::Fatal(ErrorKind::MalformedFrame))
        );
    }

    #[test]
    fn test_parse_rejects_empty_brackets() {
        assert_eq!(
            parse_line("CSI_DATA []"),
            Err(PlkgError::Fatal(ErrorKind::MalformedFrame))
        );
    }
}
