//! USDA text formatting.

use nalgebra::{Quaternion, Vector3};

/// Indented line builder for USDA output.
#[derive(Debug, Default)]
pub(crate) struct UsdaText {
    output: String,
    indent: usize,
}

impl UsdaText {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn line(&mut self, line: &str) {
        if !line.is_empty() {
            for _ in 0..self.indent {
                self.output.push_str("    ");
            }
        }
        self.output.push_str(line);
        self.output.push('\n');
    }

    /// Write `{` and indent.
    pub(crate) fn open(&mut self) {
        self.line("{");
        self.indent += 1;
    }

    /// Dedent and write `}`.
    pub(crate) fn close(&mut self) {
        self.indent = self.indent.saturating_sub(1);
        self.line("}");
    }

    /// Write the layer header with its metadata lines.
    pub(crate) fn header(&mut self, metadata: &[String]) {
        self.output.push_str("#usda 1.0\n");
        if metadata.is_empty() {
            return;
        }
        self.output.push_str("(\n");
        for entry in metadata {
            self.output.push_str("    ");
            self.output.push_str(entry);
            self.output.push('\n');
        }
        self.output.push_str(")\n");
    }

    pub(crate) fn finish(self) -> String {
        self.output
    }
}

/// Format a real number for USD output.
pub fn format_real(value: f64) -> String {
    if value == 0.0 {
        "0".to_string()
    } else if !value.is_finite() {
        if value.is_nan() {
            "nan".to_string()
        } else if value > 0.0 {
            "inf".to_string()
        } else {
            "-inf".to_string()
        }
    } else if value.abs() < 1e-4 || value.abs() >= 1e9 {
        format!("{value:e}")
    } else if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        let s = format!("{value:.9}");
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

/// `(x, y, z)` tuple.
pub fn format_vec3(v: &Vector3<f64>) -> String {
    format!(
        "({}, {}, {})",
        format_real(v.x),
        format_real(v.y),
        format_real(v.z)
    )
}

/// `(w, x, y, z)` quaternion tuple.
pub fn format_quat(q: &Quaternion<f64>) -> String {
    format!(
        "({}, {}, {}, {})",
        format_real(q.w),
        format_real(q.i),
        format_real(q.j),
        format_real(q.k)
    )
}

/// Escape a string for USD output.
pub fn escape_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => result.push_str("\\\""),
            '\\' => result.push_str("\\\\"),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            _ => result.push(c),
        }
    }
    result
}

/// `@path@` asset literal.
pub fn format_asset(path: &str) -> String {
    format!("@{}@", path.replace('@', ""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_real() {
        assert_eq!(format_real(0.0), "0");
        assert_eq!(format_real(-0.0), "0");
        assert_eq!(format_real(1.0), "1");
        assert_eq!(format_real(-90.0), "-90");
        assert_eq!(format_real(3.14159), "3.14159");
        assert_eq!(format_real(0.5), "0.5");
        assert_eq!(format_real(1e-6), "1e-6");
        assert_eq!(format_real(f64::INFINITY), "inf");
    }

    #[test]
    fn test_format_tuples() {
        assert_eq!(format_vec3(&Vector3::new(0.5, 0.0, -2.0)), "(0.5, 0, -2)");
        assert_eq!(format_quat(&Quaternion::identity()), "(1, 0, 0, 0)");
    }

    #[test]
    fn test_escape_string() {
        assert_eq!(escape_string("hello"), "hello");
        assert_eq!(escape_string("say \"hi\""), "say \\\"hi\\\"");
        assert_eq!(escape_string("line1\nline2"), "line1\\nline2");
    }

    #[test]
    fn test_text_indentation() {
        let mut text = UsdaText::new();
        text.header(&["upAxis = \"Z\"".to_string()]);
        text.line("def Xform \"a\"");
        text.open();
        text.line("double size = 1");
        text.close();
        assert_eq!(
            text.finish(),
            "#usda 1.0\n(\n    upAxis = \"Z\"\n)\ndef Xform \"a\"\n{\n    double size = 1\n}\n"
        );
    }
}
