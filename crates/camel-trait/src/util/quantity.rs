//! Kubernetes resource quantities
//!
//! `k8s-openapi` keeps quantities as strings. The traits only need to
//! validate them and to read memory sizes in decimal megabytes, so this
//! module parses the canonical forms: a decimal number followed by a binary
//! suffix (`Ki`..`Ei`), a decimal suffix (`n`, `u`, `m`, `k`, `M`..`E`) or
//! an exponent (`1e3`).

use camel_common::{Error, Result};

const BINARY_SUFFIXES: &[(&str, f64)] = &[
    ("Ki", 1024.0),
    ("Mi", 1_048_576.0),
    ("Gi", 1_073_741_824.0),
    ("Ti", 1_099_511_627_776.0),
    ("Pi", 1_125_899_906_842_624.0),
    ("Ei", 1_152_921_504_606_846_976.0),
];

const DECIMAL_SUFFIXES: &[(&str, f64)] = &[
    ("n", 1e-9),
    ("u", 1e-6),
    ("m", 1e-3),
    ("", 1.0),
    ("k", 1e3),
    ("M", 1e6),
    ("G", 1e9),
    ("T", 1e12),
    ("P", 1e15),
    ("E", 1e18),
];

fn invalid(quantity: &str) -> Error {
    Error::validation(format!("invalid quantity {quantity:?}"))
}

/// Value of a quantity in base units (bytes, cores)
pub fn parse_quantity(quantity: &str) -> Result<f64> {
    let quantity = quantity.trim();
    let split = quantity
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '+' || c == '-'))
        .unwrap_or(quantity.len());
    let (number, suffix) = quantity.split_at(split);
    if number.is_empty() {
        return Err(invalid(quantity));
    }
    let number: f64 = number.parse().map_err(|_| invalid(quantity))?;

    let multiplier = if let Some(exponent) = suffix
        .strip_prefix(['e', 'E'])
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_digit() || c == '-'))
    {
        let exponent: i32 = exponent.parse().map_err(|_| invalid(quantity))?;
        10f64.powi(exponent)
    } else {
        BINARY_SUFFIXES
            .iter()
            .chain(DECIMAL_SUFFIXES)
            .find(|(s, _)| *s == suffix)
            .map(|(_, m)| *m)
            .ok_or_else(|| invalid(quantity))?
    };
    Ok(number * multiplier)
}

/// Size in decimal megabytes, rounded up
pub fn to_megabytes(quantity: &str) -> Result<i64> {
    let bytes = parse_quantity(quantity)?;
    Ok((bytes / 1e6).ceil() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_and_decimal_suffixes() {
        assert_eq!(parse_quantity("1Ki").unwrap(), 1024.0);
        assert_eq!(parse_quantity("2M").unwrap(), 2e6);
        assert_eq!(parse_quantity("500m").unwrap(), 0.5);
        assert_eq!(parse_quantity("3").unwrap(), 3.0);
        assert_eq!(parse_quantity("1e3").unwrap(), 1000.0);
        assert_eq!(parse_quantity("1E").unwrap(), 1e18);
        assert_eq!(parse_quantity("1Ei").unwrap(), 1_152_921_504_606_846_976.0);
    }

    #[test]
    fn megabytes_round_up() {
        assert_eq!(to_megabytes("1000Mi").unwrap(), 1049);
        assert_eq!(to_megabytes("300M").unwrap(), 300);
        assert_eq!(to_megabytes("256Mi").unwrap(), 269);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(parse_quantity("").is_err());
        assert!(parse_quantity("Mi").is_err());
        assert!(parse_quantity("12XB").is_err());
        assert!(parse_quantity("1.2.3").is_err());
    }
}
