//! Utility functions shared across shader assembly.

/// Format an f32 as a GLSL float literal.
///
/// GLSL requires a decimal point in float literals, so whole values keep a
/// trailing `.0` (`1.0`, not `1`).
pub fn fmt_glsl_f32(v: f32) -> String {
    if v.is_finite() {
        let s = format!("{v:.9}");
        let s = s.trim_end_matches('0');
        if s.ends_with('.') {
            format!("{s}0")
        } else {
            s.to_string()
        }
    } else {
        "0.0".to_string()
    }
}

/// Sanitize a string to be a valid GLSL identifier.
pub fn sanitize_glsl_ident(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        if ch.is_ascii_alphanumeric() || ch == '_' {
            out.push(ch);
        } else {
            out.push('_');
        }
    }
    if out.is_empty() || out.as_bytes()[0].is_ascii_digit() {
        out.insert(0, '_');
    }
    out
}

/// Column-major 3x3 matrix, the layout GLSL `mat3` expects.
pub type Mat3 = [f32; 9];

/// The identity matrix.
pub const MAT3_IDENTITY: Mat3 = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];

/// Build a translation matrix.
pub fn mat3_translate(tx: f32, ty: f32) -> Mat3 {
    [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, tx, ty, 1.0]
}

/// Build a scale matrix.
pub fn mat3_scale(sx: f32, sy: f32) -> Mat3 {
    [sx, 0.0, 0.0, 0.0, sy, 0.0, 0.0, 0.0, 1.0]
}

/// Multiply two matrices, `a * b` (apply `b` first).
pub fn mat3_concat(a: &Mat3, b: &Mat3) -> Mat3 {
    let mut out = [0.0_f32; 9];
    for col in 0..3 {
        for row in 0..3 {
            let mut acc = 0.0;
            for k in 0..3 {
                acc += a[k * 3 + row] * b[col * 3 + k];
            }
            out[col * 3 + row] = acc;
        }
    }
    out
}

/// Map a point through an affine matrix, ignoring the projective row.
pub fn mat3_map_point(m: &Mat3, p: [f32; 2]) -> [f32; 2] {
    [
        m[0] * p[0] + m[3] * p[1] + m[6],
        m[1] * p[0] + m[4] * p[1] + m[7],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glsl_float_literals_keep_decimal_point() {
        assert_eq!(fmt_glsl_f32(1.0), "1.0");
        assert_eq!(fmt_glsl_f32(0.5), "0.5");
        assert_eq!(fmt_glsl_f32(-2.0), "-2.0");
        assert_eq!(fmt_glsl_f32(0.0), "0.0");
        assert_eq!(fmt_glsl_f32(f32::NAN), "0.0");
    }

    #[test]
    fn sanitize_replaces_invalid_chars() {
        assert_eq!(sanitize_glsl_ident("a-b.c"), "a_b_c");
        assert_eq!(sanitize_glsl_ident(""), "_");
        assert_eq!(sanitize_glsl_ident("9lives"), "_9lives");
    }

    #[test]
    fn concat_applies_right_matrix_first() {
        let t = mat3_translate(10.0, 0.0);
        let s = mat3_scale(2.0, 2.0);
        // scale then translate
        let m = mat3_concat(&t, &s);
        assert_eq!(mat3_map_point(&m, [1.0, 1.0]), [12.0, 2.0]);
        // translate then scale
        let m = mat3_concat(&s, &t);
        assert_eq!(mat3_map_point(&m, [1.0, 1.0]), [22.0, 2.0]);
    }
}
