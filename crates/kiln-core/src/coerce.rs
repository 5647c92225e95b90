//! Argument coercion
//!
//! Turns the free-form text a user types for each constructor or message
//! argument into [`Primitive`] values, then encodes those primitives against
//! the declared ABI types.
//!
//! Two policies exist. [`CoercionPolicy::Heuristic`] guesses from the shape of
//! the text alone:
//!
//! 1. all ASCII digits: integer
//! 2. digits, one dot, digits: decimal
//! 3. wrapped in double quotes: the text between them
//! 4. anything else: the raw text
//!
//! so a string argument that looks numeric comes out as an integer.
//! [`CoercionPolicy::Typed`] parses each value according to its declared type
//! descriptor and reports the exact mismatch.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use alloy::dyn_abi::{DynSolType, DynSolValue};
use alloy::primitives::{Address, Bytes, FixedBytes, I256, U256};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{ArgSpec, ConstructorSpec, Primitive};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoercionPolicy {
    #[default]
    Heuristic,
    Typed,
}

impl CoercionPolicy {
    /// Coerce every declared argument, looking each raw value up by label.
    ///
    /// Missing entries coerce from the empty string. Either every argument
    /// coerces or the first failure is returned.
    pub fn coerce(&self, args: &[ArgSpec], raw: &HashMap<String, String>) -> Result<Vec<Primitive>> {
        args.iter()
            .map(|arg| {
                let value = raw.get(&arg.label).map(String::as_str).unwrap_or("");
                self.coerce_value(arg, value)
            })
            .collect()
    }

    /// Coerce positional values; the count must match the declared arguments
    pub fn coerce_positional(&self, args: &[ArgSpec], raw: &[String]) -> Result<Vec<Primitive>> {
        if raw.len() != args.len() {
            return Err(Error::invalid_param(
                "args",
                format!("expected {} arguments, got {}", args.len(), raw.len()),
            ));
        }
        args.iter()
            .zip(raw)
            .map(|(arg, value)| self.coerce_value(arg, value))
            .collect()
    }

    pub fn coerce_value(&self, arg: &ArgSpec, raw: &str) -> Result<Primitive> {
        match self {
            CoercionPolicy::Heuristic => heuristic(&arg.label, raw),
            CoercionPolicy::Typed => {
                let ty = parse_type(&arg.label, &arg.type_descriptor)?;
                typed(&arg.label, &ty, raw)
            }
        }
    }
}

impl FromStr for CoercionPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "heuristic" => Ok(CoercionPolicy::Heuristic),
            "typed" => Ok(CoercionPolicy::Typed),
            other => Err(Error::invalid_param(
                "coercion.policy",
                format!("unknown policy '{}' (expected heuristic or typed)", other),
            )),
        }
    }
}

impl fmt::Display for CoercionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoercionPolicy::Heuristic => f.write_str("heuristic"),
            CoercionPolicy::Typed => f.write_str("typed"),
        }
    }
}

/// Coerce constructor inputs with the default heuristic policy
pub fn coerce(spec: &ConstructorSpec, raw: &HashMap<String, String>) -> Result<Vec<Primitive>> {
    CoercionPolicy::Heuristic.coerce(&spec.args, raw)
}

// =============================================================================
// Heuristic
// =============================================================================

fn heuristic(label: &str, raw: &str) -> Result<Primitive> {
    if is_digits(raw) {
        return U256::from_str_radix(raw, 10)
            .map(Primitive::Integer)
            .map_err(|_| Error::coercion(label, format!("integer {} is out of range", raw)));
    }
    if let Some((whole, frac)) = raw.split_once('.') {
        if is_digits(whole) && is_digits(frac) {
            return raw
                .parse::<f64>()
                .map(Primitive::Decimal)
                .map_err(|e| Error::coercion(label, e.to_string()));
        }
    }
    if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        return Ok(Primitive::Text(raw[1..raw.len() - 1].to_string()));
    }
    Ok(Primitive::Text(raw.to_string()))
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

// =============================================================================
// Typed
// =============================================================================

fn parse_type(label: &str, descriptor: &str) -> Result<DynSolType> {
    DynSolType::parse(descriptor)
        .map_err(|e| Error::coercion(label, format!("unknown type '{}': {}", descriptor, e)))
}

fn typed(label: &str, ty: &DynSolType, raw: &str) -> Result<Primitive> {
    let raw = raw.trim();
    match ty {
        DynSolType::Uint(bits) => {
            let n = raw
                .parse::<U256>()
                .map_err(|_| Error::coercion(label, format!("expected uint{}, got '{}'", bits, raw)))?;
            check_uint(label, n, *bits)?;
            Ok(Primitive::Integer(n))
        }
        DynSolType::Int(bits) => {
            let n = raw
                .parse::<I256>()
                .map_err(|_| Error::coercion(label, format!("expected int{}, got '{}'", bits, raw)))?;
            check_int(label, n, *bits)?;
            Ok(Primitive::Signed(n))
        }
        DynSolType::Bool => match raw {
            "true" => Ok(Primitive::Bool(true)),
            "false" => Ok(Primitive::Bool(false)),
            _ => Err(Error::coercion(label, format!("expected true or false, got '{}'", raw))),
        },
        DynSolType::Address => raw
            .parse::<Address>()
            .map(Primitive::Address)
            .map_err(|e| Error::coercion(label, format!("invalid address '{}': {}", raw, e))),
        DynSolType::String => Ok(Primitive::Text(unquote(raw).to_string())),
        DynSolType::Bytes => parse_bytes(label, raw).map(Primitive::Bytes),
        DynSolType::FixedBytes(size) => {
            let bytes = parse_bytes(label, raw)?;
            if bytes.len() != *size {
                return Err(Error::coercion(
                    label,
                    format!("expected {} bytes, got {}", size, bytes.len()),
                ));
            }
            Ok(Primitive::Bytes(bytes))
        }
        DynSolType::Array(inner) => {
            let items = json_items(label, raw)?;
            typed_items(label, items.iter().map(|_| inner.as_ref()), &items)
        }
        DynSolType::FixedArray(inner, len) => {
            let items = json_items(label, raw)?;
            if items.len() != *len {
                return Err(Error::coercion(
                    label,
                    format!("expected {} elements, got {}", len, items.len()),
                ));
            }
            typed_items(label, items.iter().map(|_| inner.as_ref()), &items)
        }
        DynSolType::Tuple(types) => {
            let items = json_items(label, raw)?;
            if items.len() != types.len() {
                return Err(Error::coercion(
                    label,
                    format!("expected {} tuple fields, got {}", types.len(), items.len()),
                ));
            }
            typed_items(label, types.iter(), &items)
        }
        other => Err(Error::coercion(label, format!("unsupported type {}", other))),
    }
}

fn typed_items<'a>(
    label: &str,
    types: impl Iterator<Item = &'a DynSolType>,
    items: &[String],
) -> Result<Primitive> {
    types
        .zip(items)
        .enumerate()
        .map(|(i, (ty, item))| typed(&format!("{}[{}]", label, i), ty, item))
        .collect::<Result<Vec<_>>>()
        .map(Primitive::List)
}

/// Split a JSON array literal into raw element strings
fn json_items(label: &str, raw: &str) -> Result<Vec<String>> {
    let value: serde_json::Value = serde_json::from_str(raw)
        .map_err(|_| Error::coercion(label, format!("expected a JSON array, got '{}'", raw)))?;
    let serde_json::Value::Array(items) = value else {
        return Err(Error::coercion(label, format!("expected a JSON array, got '{}'", raw)));
    };
    Ok(items
        .into_iter()
        .map(|item| match item {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        })
        .collect())
}

fn parse_bytes(label: &str, raw: &str) -> Result<Bytes> {
    raw.parse::<Bytes>()
        .map_err(|e| Error::coercion(label, format!("invalid hex '{}': {}", raw, e)))
}

fn unquote(raw: &str) -> &str {
    if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        &raw[1..raw.len() - 1]
    } else {
        raw
    }
}

fn check_uint(label: &str, n: U256, bits: usize) -> Result<()> {
    if n.bit_len() > bits {
        return Err(Error::coercion(label, format!("{} does not fit in uint{}", n, bits)));
    }
    Ok(())
}

fn check_int(label: &str, n: I256, bits: usize) -> Result<()> {
    if bits >= 256 {
        return Ok(());
    }
    let limit = U256::from(1u8) << (bits - 1);
    let abs = n.unsigned_abs();
    let fits = if n.is_negative() { abs <= limit } else { abs < limit };
    if !fits {
        return Err(Error::coercion(label, format!("{} does not fit in int{}", n, bits)));
    }
    Ok(())
}

// =============================================================================
// Encoding
// =============================================================================

/// Match coerced primitives against the declared argument types
pub fn encode_args(args: &[ArgSpec], values: &[Primitive]) -> Result<Vec<DynSolValue>> {
    if args.len() != values.len() {
        return Err(Error::invalid_param(
            "args",
            format!("expected {} arguments, got {}", args.len(), values.len()),
        ));
    }
    args.iter()
        .zip(values)
        .map(|(arg, value)| {
            let ty = parse_type(&arg.label, &arg.type_descriptor)?;
            to_sol_value(&arg.label, &ty, value)
        })
        .collect()
}

/// ABI-encode arguments as a parameter list (no selector)
pub fn abi_encode_args(args: &[ArgSpec], values: &[Primitive]) -> Result<Vec<u8>> {
    let encoded = encode_args(args, values)?;
    if encoded.is_empty() {
        return Ok(Vec::new());
    }
    Ok(DynSolValue::Tuple(encoded).abi_encode_params())
}

fn to_sol_value(label: &str, ty: &DynSolType, value: &Primitive) -> Result<DynSolValue> {
    match (ty, value) {
        (DynSolType::Uint(bits), Primitive::Integer(n)) => {
            check_uint(label, *n, *bits)?;
            Ok(DynSolValue::Uint(*n, *bits))
        }
        (DynSolType::Uint(bits), Primitive::Signed(n)) if !n.is_negative() => {
            let n = n.unsigned_abs();
            check_uint(label, n, *bits)?;
            Ok(DynSolValue::Uint(n, *bits))
        }
        (DynSolType::Int(bits), Primitive::Integer(n)) => {
            let signed = I256::try_from(*n)
                .map_err(|_| Error::coercion(label, format!("{} does not fit in int{}", n, bits)))?;
            check_int(label, signed, *bits)?;
            Ok(DynSolValue::Int(signed, *bits))
        }
        (DynSolType::Int(bits), Primitive::Signed(n)) => {
            check_int(label, *n, *bits)?;
            Ok(DynSolValue::Int(*n, *bits))
        }
        (DynSolType::Bool, Primitive::Bool(b)) => Ok(DynSolValue::Bool(*b)),
        (DynSolType::Address, Primitive::Address(a)) => Ok(DynSolValue::Address(*a)),
        (DynSolType::String, Primitive::Text(s)) => Ok(DynSolValue::String(s.clone())),
        (DynSolType::Bytes, Primitive::Bytes(b)) => Ok(DynSolValue::Bytes(b.to_vec())),
        (DynSolType::FixedBytes(size), Primitive::Bytes(b)) => {
            if b.len() != *size {
                return Err(Error::coercion(
                    label,
                    format!("expected {} bytes, got {}", size, b.len()),
                ));
            }
            Ok(DynSolValue::FixedBytes(FixedBytes::right_padding_from(b), *size))
        }
        (DynSolType::Array(inner), Primitive::List(items)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| to_sol_value(&format!("{}[{}]", label, i), inner, item))
            .collect::<Result<Vec<_>>>()
            .map(DynSolValue::Array),
        (DynSolType::FixedArray(inner, len), Primitive::List(items)) => {
            if items.len() != *len {
                return Err(Error::coercion(
                    label,
                    format!("expected {} elements, got {}", len, items.len()),
                ));
            }
            items
                .iter()
                .enumerate()
                .map(|(i, item)| to_sol_value(&format!("{}[{}]", label, i), inner, item))
                .collect::<Result<Vec<_>>>()
                .map(DynSolValue::FixedArray)
        }
        (DynSolType::Tuple(types), Primitive::List(items)) => {
            if items.len() != types.len() {
                return Err(Error::coercion(
                    label,
                    format!("expected {} tuple fields, got {}", types.len(), items.len()),
                ));
            }
            types
                .iter()
                .zip(items)
                .enumerate()
                .map(|(i, (ty, item))| to_sol_value(&format!("{}[{}]", label, i), ty, item))
                .collect::<Result<Vec<_>>>()
                .map(DynSolValue::Tuple)
        }
        // raw text for a non-string type: parse it against the declared type
        (_, Primitive::Text(s)) => {
            let parsed = typed(label, ty, s)?;
            to_sol_value(label, ty, &parsed)
        }
        (_, Primitive::Decimal(d)) => Err(Error::coercion(
            label,
            format!("decimal {} cannot be encoded as {}", d, ty),
        )),
        (DynSolType::String, other) => Err(Error::coercion(
            label,
            format!(
                "got {} for a string argument; quote the value or use the typed policy",
                other.kind()
            ),
        )),
        (_, other) => Err(Error::coercion(
            label,
            format!("cannot encode {} as {}", other.kind(), ty),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn spec(args: &[(&str, &str)]) -> ConstructorSpec {
        ConstructorSpec {
            label: "constructor".into(),
            args: args.iter().map(|(l, t)| ArgSpec::new(*l, *t)).collect(),
            is_default: true,
            docs: Vec::new(),
            payable: false,
        }
    }

    #[test]
    fn test_heuristic_scenarios() {
        let spec = spec(&[("a", "uint256"), ("b", "uint256"), ("c", "string"), ("d", "string")]);
        let values = coerce(
            &spec,
            &raw(&[("a", "42"), ("b", "3.14"), ("c", "\"hello\""), ("d", "world")]),
        )
        .unwrap();

        assert_eq!(
            values,
            vec![
                Primitive::Integer(U256::from(42u64)),
                Primitive::Decimal("3.14".parse().unwrap()),
                Primitive::Text("hello".into()),
                Primitive::Text("world".into()),
            ]
        );
    }

    #[test]
    fn test_missing_input_is_empty_string() {
        let spec = spec(&[("name", "string"), ("supply", "uint256")]);
        let values = coerce(&spec, &raw(&[("supply", "1000")])).unwrap();
        assert_eq!(values.len(), spec.args.len());
        assert_eq!(values[0], Primitive::Text(String::new()));
    }

    #[test]
    fn test_heuristic_ignores_declared_type() {
        // numeric-looking text for a string argument still becomes an integer
        let spec = spec(&[("label", "string")]);
        let values = coerce(&spec, &raw(&[("label", "2024")])).unwrap();
        assert_eq!(values, vec![Primitive::Integer(U256::from(2024u64))]);
    }

    #[test]
    fn test_heuristic_edge_shapes() {
        let arg = ArgSpec::new("x", "string");
        let policy = CoercionPolicy::Heuristic;
        assert_eq!(policy.coerce_value(&arg, "-5").unwrap(), Primitive::Text("-5".into()));
        assert_eq!(policy.coerce_value(&arg, "1.").unwrap(), Primitive::Text("1.".into()));
        assert_eq!(policy.coerce_value(&arg, "\"").unwrap(), Primitive::Text("\"".into()));
        assert_eq!(policy.coerce_value(&arg, "\"\"").unwrap(), Primitive::Text(String::new()));
    }

    #[test]
    fn test_heuristic_integer_overflow_names_argument() {
        let spec = spec(&[("supply", "uint256")]);
        let huge = "9".repeat(100);
        let err = coerce(&spec, &raw(&[("supply", &huge)])).unwrap_err();
        match err {
            Error::Coercion { argument, .. } => assert_eq!(argument, "supply"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_typed_policy() {
        let policy = CoercionPolicy::Typed;
        let args = vec![
            ArgSpec::new("label", "string"),
            ArgSpec::new("count", "uint8"),
            ArgSpec::new("delta", "int16"),
            ArgSpec::new("enabled", "bool"),
            ArgSpec::new("owners", "address[]"),
        ];
        let values = policy
            .coerce(
                &args,
                &raw(&[
                    ("label", "2024"),
                    ("count", "255"),
                    ("delta", "-300"),
                    ("enabled", "true"),
                    ("owners", r#"["0x0000000000000000000000000000000000000001"]"#),
                ]),
            )
            .unwrap();

        assert_eq!(values[0], Primitive::Text("2024".into()));
        assert_eq!(values[1], Primitive::Integer(U256::from(255u64)));
        assert_eq!(values[2], Primitive::Signed(I256::try_from(-300i64).unwrap()));
        assert_eq!(values[3], Primitive::Bool(true));
        assert_eq!(
            values[4],
            Primitive::List(vec![Primitive::Address(Address::with_last_byte(1))])
        );
    }

    #[test]
    fn test_typed_policy_reports_mismatch() {
        let policy = CoercionPolicy::Typed;
        let err = policy
            .coerce_value(&ArgSpec::new("count", "uint8"), "256")
            .unwrap_err();
        assert!(err.to_string().contains("uint8"));

        let err = policy
            .coerce_value(&ArgSpec::new("flag", "bool"), "yes")
            .unwrap_err();
        assert!(matches!(err, Error::Coercion { argument, .. } if argument == "flag"));
    }

    #[test]
    fn test_typed_tuple_from_json() {
        let policy = CoercionPolicy::Typed;
        let value = policy
            .coerce_value(&ArgSpec::new("cfg", "(uint256,bool)"), "[7, true]")
            .unwrap();
        assert_eq!(
            value,
            Primitive::List(vec![Primitive::Integer(U256::from(7u64)), Primitive::Bool(true)])
        );
    }

    #[test]
    fn test_encode_args() {
        let args = vec![ArgSpec::new("name", "string"), ArgSpec::new("supply", "uint256")];
        let values = vec![
            Primitive::Text("Kiln".into()),
            Primitive::Integer(U256::from(1000u64)),
        ];
        let encoded = encode_args(&args, &values).unwrap();
        assert_eq!(
            encoded,
            vec![
                DynSolValue::String("Kiln".into()),
                DynSolValue::Uint(U256::from(1000u64), 256)
            ]
        );
    }

    #[test]
    fn test_encode_text_parses_against_declared_type() {
        let args = vec![ArgSpec::new("owner", "address")];
        let values = vec![Primitive::Text(
            "0x0000000000000000000000000000000000000002".into(),
        )];
        let encoded = encode_args(&args, &values).unwrap();
        assert_eq!(encoded, vec![DynSolValue::Address(Address::with_last_byte(2))]);
    }

    #[test]
    fn test_encode_rejects_decimal() {
        let args = vec![ArgSpec::new("price", "uint256")];
        let err = encode_args(&args, &[Primitive::Decimal(2.5)]).unwrap_err();
        assert!(matches!(err, Error::Coercion { argument, .. } if argument == "price"));
    }

    #[test]
    fn test_encode_rejects_integer_for_string() {
        let args = vec![ArgSpec::new("label", "string")];
        let err = encode_args(&args, &[Primitive::Integer(U256::from(1u64))]).unwrap_err();
        assert!(err.to_string().contains("quote the value"));
    }

    #[test]
    fn test_encode_argument_count_mismatch() {
        let args = vec![ArgSpec::new("a", "uint256")];
        assert!(matches!(
            encode_args(&args, &[]),
            Err(Error::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_abi_encode_empty() {
        assert!(abi_encode_args(&[], &[]).unwrap().is_empty());
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("Typed".parse::<CoercionPolicy>().unwrap(), CoercionPolicy::Typed);
        assert!("strict".parse::<CoercionPolicy>().is_err());
        assert_eq!(CoercionPolicy::default(), CoercionPolicy::Heuristic);
    }
}
