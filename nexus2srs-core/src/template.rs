//! printf-style numbered file templates such as `%05d.tif`.

/// Substitute `number` into the first `%d`, `%Nd` or `%0Nd` placeholder of `template`.
///
/// A template without a recognised placeholder is returned unchanged.
#[must_use]
pub fn render_template(template: &str, number: usize) -> String {
    let Some(start) = template.find('%') else {
        return template.to_owned();
    };
    let spec = &template[start + 1..];
    let Some(end) = spec.find('d') else {
        return template.to_owned();
    };
    let flags = &spec[..end];
    if !flags.chars().all(|c| c.is_ascii_digit()) {
        return template.to_owned();
    }
    let width: usize = flags.parse().unwrap_or(0);
    let digits = if flags.starts_with('0') {
        format!("{number:0width$}")
    } else {
        format!("{number:width$}")
    };
    format!("{}{}{}", &template[..start], digits, &spec[end + 1..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_padded() {
        assert_eq!(render_template("scan-pil-files/%05d.tif", 21), "scan-pil-files/00021.tif");
    }

    #[test]
    fn test_plain_and_width() {
        assert_eq!(render_template("img_%d.tif", 7), "img_7.tif");
        assert_eq!(render_template("img_%3d.tif", 7), "img_  7.tif");
    }

    #[test]
    fn test_no_placeholder() {
        assert_eq!(render_template("fixed.tif", 3), "fixed.tif");
        assert_eq!(render_template("100%.tif", 3), "100%.tif");
    }
}
