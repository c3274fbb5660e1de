//! Human-facing number and shape formatting
//!
//! Draft contracts and consistency issues are read by people who know the
//! data from `h5py`/numpy sessions, so shapes print as tuples (`(600, 400)`),
//! floats print in shortest round-trip form with a trailing `.0`, and counts
//! carry thousands separators.

use serde_json::Value;

/// Shape as a tuple: `()`, `(5,)`, `(600, 400)`.
#[must_use]
pub fn shape_tuple(shape: &[usize]) -> String {
    match shape {
        [] => "()".to_string(),
        [n] => format!("({n},)"),
        dims => {
            let parts: Vec<String> = dims.iter().map(ToString::to_string).collect();
            format!("({})", parts.join(", "))
        }
    }
}

/// Integer with `,` thousands separators.
#[must_use]
pub fn thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Float in shortest round-trip form (`1.0`, `0.25`, `1e-05`, `1e+20`).
///
/// Non-finite values print as `NaN`, `inf` and `-inf`.
#[must_use]
pub fn float(x: f64) -> String {
    if x.is_nan() {
        return "NaN".to_string();
    }
    if x.is_infinite() {
        return if x < 0.0 { "-inf" } else { "inf" }.to_string();
    }
    let magnitude = x.abs();
    if magnitude != 0.0 && !(1e-4..1e16).contains(&magnitude) {
        return exponent_form(&format!("{x:e}"));
    }
    let plain = format!("{x}");
    if plain.contains('.') {
        plain
    } else {
        format!("{plain}.0")
    }
}

/// Float with four significant digits, trailing zeros removed (`0.05`,
/// `1.235e+05`).
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn general4(x: f64) -> String {
    if x.is_nan() {
        return "nan".to_string();
    }
    if x.is_infinite() {
        return if x < 0.0 { "-inf" } else { "inf" }.to_string();
    }
    if x == 0.0 {
        return "0".to_string();
    }
    let scientific = format!("{x:.3e}");
    let exponent: i32 = scientific
        .rsplit_once('e')
        .and_then(|(_, e)| e.parse().ok())
        .unwrap_or(0);
    if !(-4..4).contains(&exponent) {
        let (mantissa, _) = scientific.split_once('e').unwrap_or((&scientific, ""));
        return format!("{}{}", trim_zeros(mantissa), exponent_suffix(exponent));
    }
    let decimals = (3 - exponent) as usize;
    trim_zeros(&format!("{x:.decimals$}")).to_string()
}

/// Render a native value the way it reads in a draft contract: strings
/// bare at top level, quoted inside lists and maps.
#[must_use]
pub fn value(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => nested_value(other),
    }
}

fn nested_value(v: &Value) -> String {
    match v {
        Value::Null => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Number(n) => match (n.as_i64(), n.as_u64(), n.as_f64()) {
            (Some(i), _, _) => i.to_string(),
            (None, Some(u), _) => u.to_string(),
            (None, None, Some(f)) => float(f),
            (None, None, None) => n.to_string(),
        },
        Value::String(s) => format!("'{s}'"),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().map(nested_value).collect();
            format!("[{}]", parts.join(", "))
        }
        Value::Object(map) => {
            let parts: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("'{k}': {}", nested_value(v)))
                .collect();
            format!("{{{}}}", parts.join(", "))
        }
    }
}

/// Set of names as `{'a', 'b'}` (sorted).
#[must_use]
pub fn name_set<'a>(names: impl IntoIterator<Item = &'a String>) -> String {
    let mut names: Vec<&String> = names.into_iter().collect();
    names.sort();
    let parts: Vec<String> = names.iter().map(|n| format!("'{n}'")).collect();
    format!("{{{}}}", parts.join(", "))
}

fn exponent_form(rust_exp: &str) -> String {
    let (mantissa, exponent) = rust_exp.split_once('e').unwrap_or((rust_exp, "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    format!("{mantissa}{}", exponent_suffix(exponent))
}

fn exponent_suffix(exponent: i32) -> String {
    let sign = if exponent < 0 { '-' } else { '+' };
    format!("e{sign}{:02}", exponent.abs())
}

fn trim_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}
